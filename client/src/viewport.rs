/// Pan/zoom state. Shapes live in a fixed logical space; only this mapping
/// changes when the user pans or zooms.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    pub offset_x: f64,
    pub offset_y: f64,
    pub scale: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            offset_x: 0.0,
            offset_y: 0.0,
            scale: 1.0,
        }
    }
}

impl Viewport {
    /// `logical = offset + pointer / scale`, rounded to whole units.
    pub fn to_logical(&self, x: f64, y: f64) -> (i32, i32) {
        (
            (self.offset_x + x / self.scale).round() as i32,
            (self.offset_y + y / self.scale).round() as i32,
        )
    }

    pub fn to_screen(&self, x: i32, y: i32) -> (f64, f64) {
        (
            (f64::from(x) - self.offset_x) * self.scale,
            (f64::from(y) - self.offset_y) * self.scale,
        )
    }

    /// Shifts the view by a screen-space delta.
    pub fn pan(&mut self, dx: f64, dy: f64) {
        if !(dx.is_finite() && dy.is_finite()) {
            return;
        }
        self.offset_x += dx / self.scale;
        self.offset_y += dy / self.scale;
    }

    pub fn zoom(&mut self, factor: f64) {
        if factor.is_finite() && factor > 0.0 {
            self.scale *= factor;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pointer_maps_through_offset_and_scale() {
        let mut viewport = Viewport::default();
        assert_eq!(viewport.to_logical(10.4, 20.6), (10, 21));

        viewport.zoom(2.0);
        viewport.pan(100.0, 50.0);
        assert_eq!(viewport.offset_x, 50.0);
        assert_eq!(viewport.offset_y, 25.0);
        assert_eq!(viewport.to_logical(10.0, 10.0), (55, 30));
        assert_eq!(viewport.to_screen(55, 30), (10.0, 10.0));
    }

    #[test]
    fn rejects_degenerate_input() {
        let mut viewport = Viewport::default();
        viewport.zoom(0.0);
        viewport.zoom(f64::NAN);
        viewport.pan(f64::INFINITY, 1.0);
        assert_eq!(viewport, Viewport::default());
    }
}
