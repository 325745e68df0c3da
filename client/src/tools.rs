use drawboard_shared::ShapeKind;

/// Initial coordinates for a shape started at `(x, y)`.
pub fn start(kind: ShapeKind, x: i32, y: i32) -> Vec<i32> {
    match kind {
        ShapeKind::Freehand => vec![x, y],
        ShapeKind::Line | ShapeKind::Rect | ShapeKind::Ellipse => vec![x, y, x, y],
    }
}

/// Moves the pointer to `(x, y)`. Additive kinds append the point and return
/// it as the delta; two-corner kinds rewrite their second corner and return
/// `None` so the caller resends the whole shape.
pub fn advance(kind: ShapeKind, x: i32, y: i32, data: &mut Vec<i32>) -> Option<Vec<i32>> {
    if kind.is_additive() {
        data.extend([x, y]);
        return Some(vec![x, y]);
    }
    if data.len() < 2 {
        data.clear();
        data.extend([x, y]);
    }
    data.truncate(2);
    data.extend([x, y]);
    None
}

/// Normalized `(left, top, width, height)` of a two-corner shape.
pub fn bounds(data: &[i32]) -> Option<(i32, i32, u32, u32)> {
    let &[x0, y0, x1, y1] = data.get(..4)? else {
        return None;
    };
    Some((x0.min(x1), y0.min(y1), x1.abs_diff(x0), y1.abs_diff(y0)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn freehand_appends_and_reports_delta() {
        let mut data = start(ShapeKind::Freehand, 1, 2);
        assert_eq!(advance(ShapeKind::Freehand, 3, 4, &mut data), Some(vec![3, 4]));
        assert_eq!(advance(ShapeKind::Freehand, 5, 6, &mut data), Some(vec![5, 6]));
        assert_eq!(data, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn corner_tools_rewrite_the_second_corner() {
        for kind in [ShapeKind::Line, ShapeKind::Rect, ShapeKind::Ellipse] {
            let mut data = start(kind, 10, 10);
            assert_eq!(data, vec![10, 10, 10, 10]);
            assert_eq!(advance(kind, 20, 5, &mut data), None);
            assert_eq!(advance(kind, 30, 40, &mut data), None);
            assert_eq!(data, vec![10, 10, 30, 40]);
        }
    }

    #[test]
    fn bounds_are_normalized() {
        assert_eq!(bounds(&[30, 40, 10, 10]), Some((10, 10, 20, 30)));
        assert_eq!(bounds(&[1, 2]), None);
    }

    #[test]
    fn bounds_span_the_whole_coordinate_range() {
        assert_eq!(
            bounds(&[i32::MIN, i32::MAX, i32::MAX, i32::MIN]),
            Some((i32::MIN, i32::MIN, u32::MAX, u32::MAX))
        );
    }
}
