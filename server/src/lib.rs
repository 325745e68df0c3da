//! Collaborative diagram relay: keeps one shared diagram in memory, replays it
//! to every new connection and relays client edits to everyone else, either
//! over websockets it terminates itself or through an external broker.

use std::path::PathBuf;

use axum::extract::DefaultBodyLimit;
use axum::http::header::CACHE_CONTROL;
use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::Router;
use tower_http::services::ServeDir;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

pub mod dispatch;
pub mod error;
pub mod handlers;
pub mod ids;
pub mod logic;
pub mod resync;
pub mod state;
pub mod store;
pub mod transport;

pub use state::{AppState, Transport};

use crate::handlers::{
    background_handler, health_handler, ping_handler, upload_background, ws_handler,
};
use crate::transport::webhook::{
    client_url_handler, connect_handler, disconnect_handler, message_handler,
};

const MAX_BACKGROUND_BYTES: usize = 16 * 1024 * 1024;

pub fn router(state: AppState, public_dir: Option<PathBuf>) -> Router {
    let mut app = Router::new()
        .route("/ping", get(ping_handler))
        .route("/health", get(health_handler))
        .route(
            "/background/upload",
            post(upload_background).layer(DefaultBodyLimit::max(MAX_BACKGROUND_BYTES)),
        )
        .route(
            "/background/:id",
            get(background_handler).layer(SetResponseHeaderLayer::overriding(
                CACHE_CONTROL,
                HeaderValue::from_static("no-store"),
            )),
        );

    app = match &state.transport {
        Transport::Direct(_) => app.route("/ws", get(ws_handler)),
        Transport::Broker(broker) => {
            let base = format!("/{}", broker.hub());
            app.route(&base, get(client_url_handler))
                .route(&format!("{base}/connect"), post(connect_handler))
                .route(&format!("{base}/disconnect"), post(disconnect_handler))
                .route(&format!("{base}/message"), post(message_handler))
        }
    };

    if let Some(public_dir) = public_dir {
        app = app.fallback_service(ServeDir::new(public_dir).append_index_html_on_directories(true));
    }

    app.layer(TraceLayer::new_for_http()).with_state(state)
}
