use std::cell::{Cell, RefCell};
use std::rc::Rc;

use drawboard_shared::{decode_binary, decode_text, encode, DiagramEvent, Frame, WireFormat};
use js_sys::{Reflect, Uint8Array};
use log::{error, warn};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{CloseEvent, Event, MessageEvent, WebSocket, Window};

use crate::net::websocket_url;

#[derive(Debug)]
pub enum WsEvent {
    Open,
    Close,
    Error,
    Message(Vec<DiagramEvent>),
}

pub struct WsSender {
    socket: WebSocket,
}

impl WsSender {
    pub fn is_open(&self) -> bool {
        self.socket.ready_state() == WebSocket::OPEN
    }

    pub fn send(&self, event: &DiagramEvent) {
        if !self.is_open() {
            return;
        }
        match encode(event, WireFormat::Bincode) {
            Ok(Frame::Binary(payload)) => {
                let _ = self.socket.send_with_u8_array(&payload);
            }
            Ok(Frame::Text(text)) => {
                let _ = self.socket.send_with_str(&text);
            }
            Err(err) => warn!("failed to encode {}: {err}", event.kind()),
        }
    }

    pub fn close(&self) {
        let _ = self.socket.close();
    }
}

fn window_user_agent(window: &Window) -> Option<String> {
    let navigator = Reflect::get(window.as_ref(), &JsValue::from_str("navigator")).ok()?;
    Reflect::get(&navigator, &JsValue::from_str("userAgent"))
        .ok()?
        .as_string()
}

fn navigator_max_touch_points(window: &Window) -> Option<u32> {
    let navigator = Reflect::get(window.as_ref(), &JsValue::from_str("navigator")).ok()?;
    Reflect::get(&navigator, &JsValue::from_str("maxTouchPoints"))
        .ok()?
        .as_f64()
        .map(|value| value as u32)
}

// Mobile Safari can leave a websocket stuck in CONNECTING until some other
// request goes out on the page.
fn should_kick_safari_ws(window: &Window) -> bool {
    let ua = window_user_agent(window).unwrap_or_default();
    let is_safari = ua.contains("Safari")
        && !ua.contains("Chrome")
        && !ua.contains("CriOS")
        && !ua.contains("FxiOS")
        && !ua.contains("Edg")
        && !ua.contains("OPR");
    let touch = navigator_max_touch_points(window).unwrap_or(0) > 1;
    is_safari && touch
}

fn ping_url() -> String {
    let now = js_sys::Date::now() as u64;
    format!("/ping?t={now}")
}

fn decode_message(event: &MessageEvent) -> Option<Vec<DiagramEvent>> {
    let data = event.data();
    if let Ok(buffer) = data.clone().dyn_into::<js_sys::ArrayBuffer>() {
        let bytes = Uint8Array::new(&buffer).to_vec();
        return match decode_binary(&bytes) {
            Ok(event) => Some(vec![event]),
            Err(err) => {
                error!("WS message bincode parse error: {err}");
                None
            }
        };
    }
    if let Some(text) = data.as_string() {
        return match decode_text(&text) {
            Ok(events) => Some(events),
            Err(err) => {
                let snippet: String = text.chars().take(200).collect();
                error!("WS message JSON parse error: {err} payload={snippet:?}");
                None
            }
        };
    }
    error!("WS message data is not a string or arraybuffer");
    None
}

pub fn connect_ws(
    window: &Window,
    on_event: impl 'static + FnMut(WsEvent),
) -> Result<Rc<WsSender>, JsValue> {
    let ws_url = websocket_url(window)?;
    let socket = WebSocket::new(&ws_url)?;
    socket.set_binary_type(web_sys::BinaryType::Arraybuffer);

    let sender = Rc::new(WsSender {
        socket: socket.clone(),
    });

    let on_event = Rc::new(RefCell::new(on_event));
    let open_reported = Rc::new(Cell::new(false));

    {
        let on_event = on_event.clone();
        let open_reported = open_reported.clone();
        let onopen = Closure::<dyn FnMut(Event)>::new(move |_| {
            open_reported.set(true);
            on_event.borrow_mut()(WsEvent::Open);
        });
        socket.set_onopen(Some(onopen.as_ref().unchecked_ref()));
        onopen.forget();
    }

    {
        let on_event = on_event.clone();
        let open_reported = open_reported.clone();
        let onclose = Closure::<dyn FnMut(CloseEvent)>::new(move |_| {
            open_reported.set(false);
            on_event.borrow_mut()(WsEvent::Close);
        });
        socket.set_onclose(Some(onclose.as_ref().unchecked_ref()));
        onclose.forget();
    }

    {
        let on_event = on_event.clone();
        let open_reported = open_reported.clone();
        let onerror = Closure::<dyn FnMut(Event)>::new(move |_| {
            open_reported.set(false);
            on_event.borrow_mut()(WsEvent::Error);
        });
        socket.set_onerror(Some(onerror.as_ref().unchecked_ref()));
        onerror.forget();
    }

    {
        let on_event = on_event.clone();
        let open_reported = open_reported.clone();
        let onmessage = Closure::<dyn FnMut(MessageEvent)>::new(move |event: MessageEvent| {
            if !open_reported.replace(true) {
                on_event.borrow_mut()(WsEvent::Open);
            }
            if let Some(events) = decode_message(&event) {
                on_event.borrow_mut()(WsEvent::Message(events));
            }
        });
        socket.set_onmessage(Some(onmessage.as_ref().unchecked_ref()));
        onmessage.forget();
    }

    if should_kick_safari_ws(window) {
        for delay_ms in [250, 6000] {
            let socket = socket.clone();
            let window_cb = window.clone();
            let onkick = Closure::<dyn FnMut()>::new(move || {
                if socket.ready_state() == WebSocket::CONNECTING {
                    let _ = window_cb.fetch_with_str(&ping_url());
                }
            });
            let _ = window.set_timeout_with_callback_and_timeout_and_arguments_0(
                onkick.as_ref().unchecked_ref(),
                delay_ms,
            );
            onkick.forget();
        }
    }

    Ok(sender)
}
