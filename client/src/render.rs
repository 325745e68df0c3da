use std::f64::consts::PI;

use drawboard_shared::{Shape, ShapeKind};
use web_sys::CanvasRenderingContext2d;

use crate::batcher::Clock;
use crate::controller::DiagramController;
use crate::tools::bounds;
use crate::viewport::Viewport;

fn draw_dot(ctx: &CanvasRenderingContext2d, viewport: &Viewport, x: i32, y: i32, shape: &Shape) {
    let (x, y) = viewport.to_screen(x, y);
    ctx.set_fill_style_str(&shape.color);
    ctx.begin_path();
    let _ = ctx.arc(
        x,
        y,
        f64::from(shape.width) * viewport.scale / 2.0,
        0.0,
        PI * 2.0,
    );
    ctx.fill();
}

fn draw_polyline(ctx: &CanvasRenderingContext2d, viewport: &Viewport, data: &[i32]) {
    ctx.begin_path();
    for (index, pair) in data.chunks_exact(2).enumerate() {
        let (x, y) = viewport.to_screen(pair[0], pair[1]);
        if index == 0 {
            ctx.move_to(x, y);
        } else {
            ctx.line_to(x, y);
        }
    }
    ctx.stroke();
}

pub fn draw_shape(ctx: &CanvasRenderingContext2d, viewport: &Viewport, shape: &Shape) {
    if shape.data.len() < 2 {
        return;
    }
    if shape.kind == ShapeKind::Freehand && shape.point_count() == 1 {
        draw_dot(ctx, viewport, shape.data[0], shape.data[1], shape);
        return;
    }
    ctx.set_stroke_style_str(&shape.color);
    ctx.set_line_width(f64::from(shape.width) * viewport.scale);
    match shape.kind {
        ShapeKind::Freehand | ShapeKind::Line => draw_polyline(ctx, viewport, &shape.data),
        ShapeKind::Rect => {
            if let Some((left, top, width, height)) = bounds(&shape.data) {
                let (x, y) = viewport.to_screen(left, top);
                ctx.stroke_rect(
                    x,
                    y,
                    f64::from(width) * viewport.scale,
                    f64::from(height) * viewport.scale,
                );
            }
        }
        ShapeKind::Ellipse => {
            if let Some((left, top, width, height)) = bounds(&shape.data) {
                let (x, y) = viewport.to_screen(left, top);
                let rx = f64::from(width) * viewport.scale / 2.0;
                let ry = f64::from(height) * viewport.scale / 2.0;
                ctx.begin_path();
                let _ = ctx.ellipse(x + rx, y + ry, rx, ry, 0.0, 0.0, PI * 2.0);
                ctx.stroke();
            }
        }
    }
}

pub fn redraw<C: Clock>(
    ctx: &CanvasRenderingContext2d,
    width: f64,
    height: f64,
    controller: &DiagramController<C>,
) {
    ctx.clear_rect(0.0, 0.0, width, height);
    let viewport = controller.viewport();
    for (_, shape) in controller.shapes() {
        draw_shape(ctx, viewport, shape);
    }
}
