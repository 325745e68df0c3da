use wasm_bindgen::JsValue;
use web_sys::Window;

pub fn websocket_url(window: &Window) -> Result<String, JsValue> {
    let location = window.location();
    let protocol = location.protocol()?;
    let host = location.host()?;
    let scheme = if protocol == "https:" { "wss" } else { "ws" };
    Ok(format!("{scheme}://{host}/ws?format=bincode"))
}

pub fn background_url(id: &str) -> String {
    format!("/background/{id}")
}
