use drawboard_shared::Shape;

/// Undo/redo stacks. `past` holds ids of shapes this client drew, `future`
/// holds the models of undone shapes; most recent last in both.
#[derive(Debug, Default)]
pub struct History {
    past: Vec<String>,
    future: Vec<Shape>,
}

impl History {
    /// A new action invalidates the redo branch.
    pub fn record(&mut self, id: String) {
        self.future.clear();
        self.past.push(id);
    }

    pub fn pop_past(&mut self) -> Option<String> {
        self.past.pop()
    }

    pub fn push_future(&mut self, shape: Shape) {
        self.future.push(shape);
    }

    pub fn pop_future(&mut self) -> Option<Shape> {
        self.future.pop()
    }

    /// Re-adds a redone shape without touching the redo branch.
    pub fn push_past(&mut self, id: String) {
        self.past.push(id);
    }

    pub fn can_undo(&self) -> bool {
        !self.past.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.future.is_empty()
    }

    pub fn clear(&mut self) {
        self.past.clear();
        self.future.clear();
    }
}

#[cfg(test)]
mod tests {
    use drawboard_shared::ShapeKind;

    use super::*;

    #[test]
    fn recording_drops_the_redo_branch() {
        let mut history = History::default();
        history.record("a".into());
        history.pop_past();
        history.push_future(Shape::new(ShapeKind::Line, "#000", 1, vec![0, 0, 1, 1]));
        assert!(history.can_redo());

        history.record("b".into());
        assert!(!history.can_redo());
        assert_eq!(history.pop_past().as_deref(), Some("b"));
        assert!(!history.can_undo());
    }
}
