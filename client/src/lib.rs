mod app;
mod batcher;
mod controller;
mod history;
mod net;
mod render;
mod tools;
mod util;
mod viewport;
mod ws;

pub use app::{run, Whiteboard};
pub use batcher::{Clock, PatchBatcher, SystemClock, DEFAULT_THROTTLE_WINDOW};
pub use controller::{ChatMessage, DiagramController, DrawMode};
pub use viewport::Viewport;
