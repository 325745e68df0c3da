//! Local mirror of the shared diagram and the drawing state machine.
//!
//! Local edits apply immediately and queue the matching events in an outbox;
//! remote events overwrite local state for the same id.

use std::collections::HashMap;
use std::time::Duration;

use drawboard_shared::{sanitize_color, sanitize_width, DiagramEvent, Shape, ShapeKind};
use log::debug;
use serde::Serialize;

use crate::batcher::{Clock, PatchBatcher, SystemClock, DEFAULT_THROTTLE_WINDOW};
use crate::history::History;
use crate::tools;
use crate::util::make_id;
use crate::viewport::Viewport;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DrawMode {
    Idle,
    Drawing { id: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub author: String,
    pub name: String,
    pub text: String,
}

pub struct DiagramController<C: Clock = SystemClock> {
    clock: C,
    mode: DrawMode,
    shapes: HashMap<String, Shape>,
    /// Paint order, oldest first.
    order: Vec<String>,
    viewport: Viewport,
    batcher: PatchBatcher,
    history: History,
    background: Option<String>,
    user_count: u64,
    chat: Vec<ChatMessage>,
    outbox: Vec<DiagramEvent>,
}

impl DiagramController<SystemClock> {
    pub fn new() -> Self {
        Self::with_clock(SystemClock, DEFAULT_THROTTLE_WINDOW)
    }
}

impl Default for DiagramController<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> DiagramController<C> {
    pub fn with_clock(clock: C, throttle_window: Duration) -> Self {
        Self {
            clock,
            mode: DrawMode::Idle,
            shapes: HashMap::new(),
            order: Vec::new(),
            viewport: Viewport::default(),
            batcher: PatchBatcher::new(throttle_window),
            history: History::default(),
            background: None,
            user_count: 0,
            chat: Vec::new(),
            outbox: Vec::new(),
        }
    }

    pub fn mode(&self) -> &DrawMode {
        &self.mode
    }

    pub fn is_drawing(&self) -> bool {
        matches!(self.mode, DrawMode::Drawing { .. })
    }

    pub fn shape(&self, id: &str) -> Option<&Shape> {
        self.shapes.get(id)
    }

    /// Shapes in paint order.
    pub fn shapes(&self) -> impl Iterator<Item = (&str, &Shape)> {
        self.order
            .iter()
            .filter_map(|id| self.shapes.get(id).map(|shape| (id.as_str(), shape)))
    }

    pub fn shape_count(&self) -> usize {
        self.shapes.len()
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn background(&self) -> Option<&str> {
        self.background.as_deref()
    }

    pub fn user_count(&self) -> u64 {
        self.user_count
    }

    pub fn chat(&self) -> &[ChatMessage] {
        &self.chat
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Drains the events produced since the last call, in emission order.
    pub fn take_outgoing(&mut self) -> Vec<DiagramEvent> {
        std::mem::take(&mut self.outbox)
    }

    fn insert(&mut self, id: String, shape: Shape) {
        if self.shapes.insert(id.clone(), shape).is_none() {
            self.order.push(id);
        }
    }

    fn remove(&mut self, id: &str) -> Option<Shape> {
        let shape = self.shapes.remove(id)?;
        self.order.retain(|entry| entry != id);
        Some(shape)
    }

    /// Starts a shape at a screen position. Returns the new id, or `None` if a
    /// shape is already being drawn.
    pub fn start_shape(
        &mut self,
        kind: ShapeKind,
        color: &str,
        width: u32,
        x: f64,
        y: f64,
    ) -> Option<String> {
        if self.is_drawing() {
            return None;
        }
        let id = make_id();
        let (x, y) = self.viewport.to_logical(x, y);
        let shape = Shape::new(
            kind,
            sanitize_color(color.to_string()),
            sanitize_width(width),
            tools::start(kind, x, y),
        );
        self.insert(id.clone(), shape.clone());
        self.history.record(id.clone());
        self.batcher.begin(&id);
        self.outbox.push(DiagramEvent::ShapeUpdated {
            id: id.clone(),
            shape,
        });
        self.mode = DrawMode::Drawing { id: id.clone() };
        Some(id)
    }

    pub fn draw_shape(&mut self, x: f64, y: f64) {
        let DrawMode::Drawing { id } = &self.mode else {
            return;
        };
        let (x, y) = self.viewport.to_logical(x, y);
        let Some(shape) = self.shapes.get_mut(id) else {
            return;
        };
        let now = self.clock.now();
        match tools::advance(shape.kind, x, y, &mut shape.data) {
            Some(delta) => {
                if let Some(event) = self.batcher.push(&delta, now) {
                    self.outbox.push(event);
                }
            }
            None => {
                if self.batcher.admit(now) {
                    self.outbox.push(DiagramEvent::ShapeUpdated {
                        id: id.clone(),
                        shape: shape.clone(),
                    });
                }
            }
        }
    }

    pub fn end_shape(&mut self) {
        let DrawMode::Drawing { id } = std::mem::replace(&mut self.mode, DrawMode::Idle) else {
            return;
        };
        match self.batcher.flush() {
            Some(event) => self.outbox.push(event),
            None => {
                if let Some(shape) = self.shapes.get(&id) {
                    self.outbox.push(DiagramEvent::ShapeUpdated {
                        id,
                        shape: shape.clone(),
                    });
                }
            }
        }
    }

    /// Emits a patch batch whose window has elapsed without further movement.
    pub fn tick(&mut self) {
        if let Some(event) = self.batcher.poll(self.clock.now()) {
            self.outbox.push(event);
        }
    }

    /// Applies an event received from the server.
    pub fn apply_remote(&mut self, event: DiagramEvent) {
        match event {
            DiagramEvent::ShapeUpdated { id, shape } => self.insert(id, shape),
            DiagramEvent::ShapePatched { id, data } => match self.shapes.get_mut(&id) {
                Some(shape) => shape.data.extend(data),
                None => debug!("ignoring patch for unknown shape {id}"),
            },
            DiagramEvent::ShapeRemoved { id } => {
                if matches!(&self.mode, DrawMode::Drawing { id: active } if *active == id) {
                    self.mode = DrawMode::Idle;
                    self.batcher.reset();
                }
                self.remove(&id);
            }
            DiagramEvent::Clear => self.clear_board(),
            DiagramEvent::BackgroundUpdated { id } => self.background = Some(id),
            DiagramEvent::UserUpdated { count } => self.user_count = count,
            DiagramEvent::NewMessage { author, name, text } => {
                self.chat.push(ChatMessage { author, name, text })
            }
        }
    }

    fn clear_board(&mut self) {
        self.mode = DrawMode::Idle;
        self.shapes.clear();
        self.order.clear();
        self.history.clear();
        self.batcher.reset();
        self.background = None;
    }

    /// Empties the diagram for everyone.
    pub fn clear(&mut self) {
        self.clear_board();
        self.outbox.push(DiagramEvent::Clear);
    }

    /// Forgets all diagram state ahead of a resync, without emitting anything.
    pub fn reset(&mut self) {
        self.clear_board();
        self.user_count = 0;
        self.outbox.clear();
    }

    pub fn send_message(&mut self, author: &str, name: &str, text: &str) {
        let message = ChatMessage {
            author: author.to_string(),
            name: name.to_string(),
            text: text.to_string(),
        };
        self.outbox.push(DiagramEvent::NewMessage {
            author: message.author.clone(),
            name: message.name.clone(),
            text: message.text.clone(),
        });
        self.chat.push(message);
    }

    /// Removes this client's most recent shape that still exists.
    pub fn undo(&mut self) {
        if self.is_drawing() {
            return;
        }
        while let Some(id) = self.history.pop_past() {
            if let Some(shape) = self.remove(&id) {
                self.history.push_future(shape);
                self.outbox.push(DiagramEvent::ShapeRemoved { id });
                return;
            }
        }
    }

    /// Restores the last undone shape under a fresh id.
    pub fn redo(&mut self) {
        if self.is_drawing() {
            return;
        }
        let Some(shape) = self.history.pop_future() else {
            return;
        };
        let id = make_id();
        self.insert(id.clone(), shape.clone());
        self.outbox.push(DiagramEvent::ShapeUpdated {
            id: id.clone(),
            shape,
        });
        self.history.push_past(id);
    }

    pub fn pan(&mut self, dx: f64, dy: f64) {
        self.viewport.pan(dx, dy);
    }

    pub fn zoom(&mut self, factor: f64) {
        self.viewport.zoom(factor);
    }
}
