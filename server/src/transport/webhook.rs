//! Inbound webhook calls from the broker: connect, disconnect and message.
//!
//! A connection being accepted is not reachable through the broker's REST API
//! until the connect call returns, so everything addressed to it during the
//! resync is collected and sent back as the connect reply body.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use drawboard_shared::{decode_text, encode_batch, DiagramEvent};
use tracing::{info, warn};

use crate::dispatch::Dispatcher;
use crate::logic::handle_client_event;
use crate::resync;
use crate::state::{AppState, Transport};
use crate::transport::broker::BrokerClient;

pub const CONNECTION_ID_HEADER: HeaderName = HeaderName::from_static("x-asrs-connection-id");
pub const USER_ID_HEADER: HeaderName = HeaderName::from_static("x-asrs-user-id");

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WebhookContext {
    pub connection_id: String,
    pub user_id: Option<String>,
}

impl WebhookContext {
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let header = |name: &HeaderName| {
            headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        };
        Some(Self {
            connection_id: header(&CONNECTION_ID_HEADER)?,
            user_id: header(&USER_ID_HEADER),
        })
    }
}

/// Wraps a dispatcher while one connection is being accepted, diverting
/// everything that should reach that connection into the reply.
pub struct ConnectReply {
    inner: Arc<dyn Dispatcher>,
    context: WebhookContext,
    captured: Mutex<Vec<DiagramEvent>>,
}

impl ConnectReply {
    pub fn new(inner: Arc<dyn Dispatcher>, context: WebhookContext) -> Self {
        Self {
            inner,
            context,
            captured: Mutex::new(Vec::new()),
        }
    }

    fn capture(&self, event: &DiagramEvent) {
        self.captured
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
    }

    pub fn into_events(self) -> Vec<DiagramEvent> {
        self.captured
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Dispatcher for ConnectReply {
    async fn to_all(&self, event: &DiagramEvent) {
        self.capture(event);
        self.inner.to_all(event).await;
    }

    async fn to_others(&self, sender: &str, event: &DiagramEvent) {
        if sender != self.context.connection_id {
            self.capture(event);
        }
        self.inner.to_others(sender, event).await;
    }

    async fn to_connection(&self, connection_id: &str, event: &DiagramEvent) {
        if connection_id == self.context.connection_id {
            self.capture(event);
        } else {
            self.inner.to_connection(connection_id, event).await;
        }
    }

    async fn to_group(&self, group: &str, event: &DiagramEvent) {
        self.inner.to_group(group, event).await;
    }

    async fn to_user(&self, user_id: &str, event: &DiagramEvent) {
        if self.context.user_id.as_deref() == Some(user_id) {
            self.capture(event);
        }
        self.inner.to_user(user_id, event).await;
    }

    async fn add_to_group(&self, connection_id: &str, group: &str) {
        self.inner.add_to_group(connection_id, group).await;
    }
}

fn broker(state: &AppState) -> Option<Arc<BrokerClient>> {
    match &state.transport {
        Transport::Broker(broker) => Some(broker.clone()),
        Transport::Direct(_) => None,
    }
}

pub async fn client_url_handler(State(state): State<AppState>) -> Response {
    match broker(&state) {
        Some(broker) => broker.client_url().into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

pub async fn connect_handler(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let Some(broker) = broker(&state) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let Some(context) = WebhookContext::from_headers(&headers) else {
        return StatusCode::BAD_REQUEST.into_response();
    };

    let reply = ConnectReply::new(broker, context.clone());
    resync::on_connect(&state.store, &reply, &context.connection_id).await;
    let events = reply.into_events();

    let mut response = if events.is_empty() {
        StatusCode::NO_CONTENT.into_response()
    } else {
        match encode_batch(&events) {
            Ok(body) => ([(CONTENT_TYPE, "application/json")], body).into_response(),
            Err(error) => {
                warn!(conn = %context.connection_id, %error, "failed to encode connect reply");
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        }
    };
    if let Some(value) = context
        .user_id
        .as_deref()
        .and_then(|user| HeaderValue::from_str(user).ok())
    {
        response.headers_mut().insert(USER_ID_HEADER, value);
    }
    info!(conn = %context.connection_id, "connected via broker");
    response
}

pub async fn disconnect_handler(State(state): State<AppState>, headers: HeaderMap) -> StatusCode {
    let Some(broker) = broker(&state) else {
        return StatusCode::NOT_FOUND;
    };
    let Some(context) = WebhookContext::from_headers(&headers) else {
        return StatusCode::BAD_REQUEST;
    };
    resync::on_disconnect(&state.store, broker.as_ref(), &context.connection_id).await;
    StatusCode::OK
}

pub async fn message_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> StatusCode {
    let Some(broker) = broker(&state) else {
        return StatusCode::NOT_FOUND;
    };
    let Some(context) = WebhookContext::from_headers(&headers) else {
        return StatusCode::BAD_REQUEST;
    };
    let events = match decode_text(&body) {
        Ok(events) => events,
        Err(error) => {
            warn!(conn = %context.connection_id, %error, "dropping undecodable message");
            return StatusCode::BAD_REQUEST;
        }
    };
    for event in events {
        handle_client_event(&state.store, broker.as_ref(), &context.connection_id, event).await;
    }
    StatusCode::OK
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::testing::{Recorder, Target};

    fn context() -> WebhookContext {
        WebhookContext {
            connection_id: "new".into(),
            user_id: Some("alice".into()),
        }
    }

    #[test]
    fn context_requires_connection_id() {
        let mut headers = HeaderMap::new();
        assert!(WebhookContext::from_headers(&headers).is_none());
        headers.insert(CONNECTION_ID_HEADER, HeaderValue::from_static("c1"));
        assert_eq!(
            WebhookContext::from_headers(&headers),
            Some(WebhookContext {
                connection_id: "c1".into(),
                user_id: None
            })
        );
        headers.insert(USER_ID_HEADER, HeaderValue::from_static("u1"));
        assert_eq!(
            WebhookContext::from_headers(&headers).unwrap().user_id.as_deref(),
            Some("u1")
        );
    }

    #[tokio::test]
    async fn events_for_the_new_connection_are_captured() {
        let recorder = Arc::new(Recorder::default());
        let reply = ConnectReply::new(recorder.clone(), context());

        let shape_removed = DiagramEvent::ShapeRemoved { id: "s".into() };
        let count = DiagramEvent::UserUpdated { count: 2 };
        reply.to_connection("new", &shape_removed).await;
        reply.to_connection("other", &shape_removed).await;
        reply.to_all(&count).await;
        reply.to_others("new", &DiagramEvent::Clear).await;
        reply.to_user("alice", &DiagramEvent::Clear).await;
        reply.to_group("g", &DiagramEvent::Clear).await;

        assert_eq!(
            recorder.sent(),
            vec![
                (Target::Connection("other".into()), shape_removed.clone()),
                (Target::All, count.clone()),
                (Target::Others("new".into()), DiagramEvent::Clear),
                (Target::User("alice".into()), DiagramEvent::Clear),
                (Target::Group("g".into()), DiagramEvent::Clear),
            ]
        );
        assert_eq!(
            reply.into_events(),
            vec![shape_removed, count, DiagramEvent::Clear]
        );
    }
}
