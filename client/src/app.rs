use std::cell::RefCell;
use std::rc::Rc;

use drawboard_shared::ShapeKind;
use js_sys::Function;
use log::{info, warn};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement, Window};

use crate::controller::DiagramController;
use crate::net::background_url;
use crate::render::redraw;
use crate::ws::{connect_ws, WsEvent, WsSender};

const TICK_INTERVAL_MS: i32 = 50;
const RECONNECT_DELAY_MS: i32 = 1000;

#[wasm_bindgen(start)]
pub fn run() {
    console_error_panic_hook::set_once();
    let _ = console_log::init_with_level(log::Level::Info);
}

struct Inner {
    window: Window,
    canvas: HtmlCanvasElement,
    ctx: CanvasRenderingContext2d,
    controller: DiagramController,
    sender: Option<Rc<WsSender>>,
    on_change: Option<Function>,
    closed: bool,
}

impl Inner {
    fn send_outgoing(&mut self) {
        let events = self.controller.take_outgoing();
        let Some(sender) = &self.sender else {
            return;
        };
        for event in &events {
            sender.send(event);
        }
    }

    fn redraw(&self) {
        redraw(
            &self.ctx,
            f64::from(self.canvas.width()),
            f64::from(self.canvas.height()),
            &self.controller,
        );
    }
}

/// Sends pending events, repaints and then notifies the page. The callback
/// runs after the borrow is released so it may call back into the board.
fn settle(inner: &Rc<RefCell<Inner>>) {
    let callback = {
        let mut state = inner.borrow_mut();
        state.send_outgoing();
        state.redraw();
        state.on_change.clone()
    };
    if let Some(callback) = callback {
        if let Err(err) = callback.call0(&JsValue::NULL) {
            warn!("change callback failed: {err:?}");
        }
    }
}

fn open_socket(inner: &Rc<RefCell<Inner>>) -> Result<(), JsValue> {
    let window = inner.borrow().window.clone();
    let handle = Rc::downgrade(inner);
    let sender = connect_ws(&window, move |event| {
        let Some(inner) = handle.upgrade() else {
            return;
        };
        match event {
            WsEvent::Open => {
                info!("connected, waiting for resync");
                inner.borrow_mut().controller.reset();
            }
            WsEvent::Message(events) => {
                let mut state = inner.borrow_mut();
                for event in events {
                    state.controller.apply_remote(event);
                }
            }
            WsEvent::Close | WsEvent::Error => {
                let (closed, window) = {
                    let mut state = inner.borrow_mut();
                    state.sender = None;
                    (state.closed, state.window.clone())
                };
                if !closed {
                    warn!("connection lost, retrying in {RECONNECT_DELAY_MS}ms");
                    schedule_reconnect(&window, Rc::downgrade(&inner));
                }
            }
        }
        settle(&inner);
    })?;
    inner.borrow_mut().sender = Some(sender);
    Ok(())
}

fn schedule_reconnect(window: &Window, handle: std::rc::Weak<RefCell<Inner>>) {
    let retry = Closure::once_into_js(move || {
        let Some(inner) = handle.upgrade() else {
            return;
        };
        if inner.borrow().sender.is_some() || inner.borrow().closed {
            return;
        }
        if let Err(err) = open_socket(&inner) {
            warn!("reconnect failed: {err:?}");
            let window = inner.borrow().window.clone();
            schedule_reconnect(&window, Rc::downgrade(&inner));
        }
    });
    let _ = window.set_timeout_with_callback_and_timeout_and_arguments_0(
        retry.unchecked_ref(),
        RECONNECT_DELAY_MS,
    );
}

/// Browser entry point: a canvas bound to the shared diagram.
#[wasm_bindgen]
pub struct Whiteboard {
    inner: Rc<RefCell<Inner>>,
    _ticker: Closure<dyn FnMut()>,
    ticker_id: i32,
}

#[wasm_bindgen]
impl Whiteboard {
    #[wasm_bindgen(constructor)]
    pub fn new(canvas_id: &str) -> Result<Whiteboard, JsValue> {
        let window = web_sys::window().ok_or_else(|| JsValue::from_str("Missing window"))?;
        let document = window
            .document()
            .ok_or_else(|| JsValue::from_str("Missing document"))?;
        let canvas = document
            .get_element_by_id(canvas_id)
            .ok_or_else(|| JsValue::from_str(&format!("Missing element: {canvas_id}")))?
            .dyn_into::<HtmlCanvasElement>()
            .map_err(|_| JsValue::from_str(&format!("Invalid element type: {canvas_id}")))?;
        let ctx = canvas
            .get_context("2d")?
            .ok_or_else(|| JsValue::from_str("Missing canvas context"))?
            .dyn_into::<CanvasRenderingContext2d>()?;
        ctx.set_line_cap("round");
        ctx.set_line_join("round");

        let inner = Rc::new(RefCell::new(Inner {
            window: window.clone(),
            canvas,
            ctx,
            controller: DiagramController::new(),
            sender: None,
            on_change: None,
            closed: false,
        }));

        let handle = Rc::downgrade(&inner);
        let ticker = Closure::<dyn FnMut()>::new(move || {
            let Some(inner) = handle.upgrade() else {
                return;
            };
            let pending = {
                let mut state = inner.borrow_mut();
                state.controller.tick();
                state.send_outgoing();
                state.controller.is_drawing()
            };
            if pending {
                inner.borrow().redraw();
            }
        });
        let ticker_id = window.set_interval_with_callback_and_timeout_and_arguments_0(
            ticker.as_ref().unchecked_ref(),
            TICK_INTERVAL_MS,
        )?;

        open_socket(&inner)?;
        Ok(Whiteboard {
            inner,
            _ticker: ticker,
            ticker_id,
        })
    }

    /// Called after every change to the diagram, chat or user count.
    #[wasm_bindgen(js_name = onChange)]
    pub fn on_change(&self, callback: Function) {
        self.inner.borrow_mut().on_change = Some(callback);
    }

    #[wasm_bindgen(js_name = startShape)]
    pub fn start_shape(
        &self,
        kind: &str,
        color: &str,
        width: u32,
        x: f64,
        y: f64,
    ) -> Result<Option<String>, JsValue> {
        let kind = ShapeKind::from_name(kind)
            .ok_or_else(|| JsValue::from_str(&format!("Unknown shape kind: {kind}")))?;
        let id = self
            .inner
            .borrow_mut()
            .controller
            .start_shape(kind, color, width, x, y);
        settle(&self.inner);
        Ok(id)
    }

    #[wasm_bindgen(js_name = drawShape)]
    pub fn draw_shape(&self, x: f64, y: f64) {
        self.inner.borrow_mut().controller.draw_shape(x, y);
        settle(&self.inner);
    }

    #[wasm_bindgen(js_name = endShape)]
    pub fn end_shape(&self) {
        self.inner.borrow_mut().controller.end_shape();
        settle(&self.inner);
    }

    pub fn undo(&self) {
        self.inner.borrow_mut().controller.undo();
        settle(&self.inner);
    }

    pub fn redo(&self) {
        self.inner.borrow_mut().controller.redo();
        settle(&self.inner);
    }

    #[wasm_bindgen(js_name = canUndo)]
    pub fn can_undo(&self) -> bool {
        self.inner.borrow().controller.can_undo()
    }

    #[wasm_bindgen(js_name = canRedo)]
    pub fn can_redo(&self) -> bool {
        self.inner.borrow().controller.can_redo()
    }

    pub fn clear(&self) {
        self.inner.borrow_mut().controller.clear();
        settle(&self.inner);
    }

    pub fn pan(&self, dx: f64, dy: f64) {
        self.inner.borrow_mut().controller.pan(dx, dy);
        settle(&self.inner);
    }

    pub fn zoom(&self, factor: f64) {
        self.inner.borrow_mut().controller.zoom(factor);
        settle(&self.inner);
    }

    /// Repaints after the page resizes the canvas.
    pub fn resize(&self, width: u32, height: u32) {
        {
            let state = self.inner.borrow();
            state.canvas.set_width(width);
            state.canvas.set_height(height);
        }
        self.inner.borrow().redraw();
    }

    #[wasm_bindgen(js_name = sendMessage)]
    pub fn send_message(&self, author: &str, name: &str, text: &str) {
        self.inner
            .borrow_mut()
            .controller
            .send_message(author, name, text);
        settle(&self.inner);
    }

    /// Chat log as a JSON array of `{author, name, text}`.
    pub fn messages(&self) -> Result<String, JsValue> {
        serde_json::to_string(self.inner.borrow().controller.chat())
            .map_err(|err| JsValue::from_str(&err.to_string()))
    }

    #[wasm_bindgen(js_name = userCount)]
    pub fn user_count(&self) -> f64 {
        self.inner.borrow().controller.user_count() as f64
    }

    /// URL of the current background image, if one has been uploaded.
    #[wasm_bindgen(js_name = backgroundUrl)]
    pub fn background_url(&self) -> Option<String> {
        self.inner
            .borrow()
            .controller
            .background()
            .map(background_url)
    }

    pub fn connected(&self) -> bool {
        self.inner
            .borrow()
            .sender
            .as_ref()
            .is_some_and(|sender| sender.is_open())
    }

    /// Stops the tick timer and closes the socket for good.
    pub fn close(&self) {
        let mut state = self.inner.borrow_mut();
        state.closed = true;
        state.window.clear_interval_with_handle(self.ticker_id);
        if let Some(sender) = state.sender.take() {
            sender.close();
        }
    }
}
