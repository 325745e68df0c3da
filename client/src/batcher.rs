//! Rate limiting for the shape being drawn.
//!
//! Deltas accumulate in a buffer that is only ever emitted, never dropped. At
//! most one emission happens per window while the gesture continues; the end
//! of the gesture flushes whatever is left regardless of the window.

use std::time::Duration;

use drawboard_shared::DiagramEvent;
use web_time::Instant;

pub const DEFAULT_THROTTLE_WINDOW: Duration = Duration::from_millis(250);

pub trait Clock {
    fn now(&self) -> Instant;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

#[derive(Debug)]
pub struct PatchBatcher {
    window: Duration,
    shape_id: Option<String>,
    buffer: Vec<i32>,
    last_emit: Option<Instant>,
}

impl Default for PatchBatcher {
    fn default() -> Self {
        Self::new(DEFAULT_THROTTLE_WINDOW)
    }
}

impl PatchBatcher {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            shape_id: None,
            buffer: Vec::new(),
            last_emit: None,
        }
    }

    /// Binds the batcher to a freshly started shape.
    pub fn begin(&mut self, shape_id: &str) {
        self.shape_id = Some(shape_id.to_string());
        self.buffer.clear();
        self.last_emit = None;
    }

    pub fn reset(&mut self) {
        self.shape_id = None;
        self.buffer.clear();
        self.last_emit = None;
    }

    #[cfg(test)]
    fn has_pending(&self) -> bool {
        !self.buffer.is_empty()
    }

    fn due(&self, now: Instant) -> bool {
        match self.last_emit {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.window,
        }
    }

    /// Buffers a delta and emits the whole buffer if the window allows it.
    pub fn push(&mut self, delta: &[i32], now: Instant) -> Option<DiagramEvent> {
        self.shape_id.as_ref()?;
        self.buffer.extend_from_slice(delta);
        self.poll(now)
    }

    /// Emits the buffer if it is non-empty and the window has elapsed.
    pub fn poll(&mut self, now: Instant) -> Option<DiagramEvent> {
        if self.buffer.is_empty() || !self.due(now) {
            return None;
        }
        self.last_emit = Some(now);
        self.drain()
    }

    /// Claims the current window for a whole-shape update. Returns `false`
    /// when the previous emission was too recent.
    pub fn admit(&mut self, now: Instant) -> bool {
        if self.shape_id.is_none() || !self.due(now) {
            return false;
        }
        self.last_emit = Some(now);
        true
    }

    /// Emits any buffered data immediately and unbinds the shape.
    pub fn flush(&mut self) -> Option<DiagramEvent> {
        let event = self.drain();
        self.reset();
        event
    }

    fn drain(&mut self) -> Option<DiagramEvent> {
        if self.buffer.is_empty() {
            return None;
        }
        let id = self.shape_id.clone()?;
        Some(DiagramEvent::ShapePatched {
            id,
            data: std::mem::take(&mut self.buffer),
        })
    }
}
