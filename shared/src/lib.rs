use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};

mod error;
pub mod wire;

pub use error::WireError;
pub use wire::{
    decode_binary, decode_text, encode, encode_batch, Frame, WireFormat, MAX_FRAME_BYTES,
};

pub const MAX_ID_LEN: usize = 64;
pub const MAX_COLOR_LEN: usize = 32;
pub const DEFAULT_COLOR: &str = "#1f1f1f";
pub const MIN_WIDTH: u32 = 1;
pub const MAX_WIDTH: u32 = 60;

#[derive(Serialize, Deserialize, Encode, Decode, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ShapeKind {
    Freehand,
    Line,
    Rect,
    Ellipse,
}

impl ShapeKind {
    /// Whether moving the pointer only ever appends points to the shape.
    ///
    /// Additive kinds are streamed as `shapePatched` deltas; every other kind
    /// is resent whole as `shapeUpdated`.
    pub fn is_additive(self) -> bool {
        matches!(self, ShapeKind::Freehand)
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "freehand" => Some(ShapeKind::Freehand),
            "line" => Some(ShapeKind::Line),
            "rect" => Some(ShapeKind::Rect),
            "ellipse" => Some(ShapeKind::Ellipse),
            _ => None,
        }
    }
}

/// A drawable entity. `data` holds flattened `x, y` pairs in logical space.
#[derive(Serialize, Deserialize, Encode, Decode, Clone, Debug, PartialEq, Eq)]
pub struct Shape {
    pub kind: ShapeKind,
    pub color: String,
    pub width: u32,
    pub data: Vec<i32>,
}

impl Shape {
    pub fn new(kind: ShapeKind, color: impl Into<String>, width: u32, data: Vec<i32>) -> Self {
        Self {
            kind,
            color: color.into(),
            width,
            data,
        }
    }

    /// Normalizes style fields and rejects shapes whose coordinates are not
    /// whole pairs.
    pub fn sanitized(mut self) -> Option<Self> {
        if self.data.len() % 2 != 0 {
            return None;
        }
        self.color = sanitize_color(self.color);
        self.width = sanitize_width(self.width);
        Some(self)
    }

    pub fn point_count(&self) -> usize {
        self.data.len() / 2
    }
}

#[derive(Serialize, Deserialize, Encode, Decode, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "name", content = "data", rename_all = "camelCase")]
pub enum DiagramEvent {
    ShapeUpdated { id: String, shape: Shape },
    ShapePatched { id: String, data: Vec<i32> },
    ShapeRemoved { id: String },
    Clear,
    BackgroundUpdated { id: String },
    UserUpdated { count: u64 },
    NewMessage {
        author: String,
        name: String,
        text: String,
    },
}

impl DiagramEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            DiagramEvent::ShapeUpdated { .. } => "shapeUpdated",
            DiagramEvent::ShapePatched { .. } => "shapePatched",
            DiagramEvent::ShapeRemoved { .. } => "shapeRemoved",
            DiagramEvent::Clear => "clear",
            DiagramEvent::BackgroundUpdated { .. } => "backgroundUpdated",
            DiagramEvent::UserUpdated { .. } => "userUpdated",
            DiagramEvent::NewMessage { .. } => "newMessage",
        }
    }

    /// Events only the server may originate.
    pub fn is_server_only(&self) -> bool {
        matches!(
            self,
            DiagramEvent::BackgroundUpdated { .. } | DiagramEvent::UserUpdated { .. }
        )
    }
}

pub fn valid_id(id: &str) -> bool {
    !id.is_empty() && id.len() <= MAX_ID_LEN
}

pub fn sanitize_color(mut color: String) -> String {
    if color.is_empty() {
        return DEFAULT_COLOR.to_string();
    }
    if color.len() > MAX_COLOR_LEN {
        let mut end = MAX_COLOR_LEN;
        while !color.is_char_boundary(end) {
            end -= 1;
        }
        color.truncate(end);
    }
    color
}

pub fn sanitize_width(width: u32) -> u32 {
    width.clamp(MIN_WIDTH, MAX_WIDTH)
}
