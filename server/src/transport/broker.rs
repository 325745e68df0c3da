//! Dispatcher backed by an externally hosted websocket broker.
//!
//! The broker owns the client sockets; this process only receives webhook
//! calls and pushes events back through the broker's REST API.

use std::str::FromStr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use drawboard_shared::DiagramEvent;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::{Client, Method};
use serde::Serialize;
use tracing::{debug, warn};
use url::Url;

use crate::dispatch::Dispatcher;
use crate::error::BrokerError;

const TOKEN_LIFETIME: Duration = Duration::from_secs(60 * 60);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub endpoint: String,
    pub access_key: String,
}

impl FromStr for ConnectionInfo {
    type Err = BrokerError;

    /// Parses `Endpoint=<url>;AccessKey=<key>;Version=1.0;`.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let mut endpoint = None;
        let mut access_key = None;
        for part in value.split(';').filter(|part| !part.is_empty()) {
            let (key, val) = part
                .split_once('=')
                .ok_or(BrokerError::InvalidConnectionString)?;
            match key.trim() {
                "Endpoint" => {
                    let url = val.trim().trim_end_matches('/');
                    if Url::parse(url).map_or(true, |parsed| parsed.cannot_be_a_base()) {
                        return Err(BrokerError::InvalidConnectionString);
                    }
                    endpoint = Some(url.to_string());
                }
                "AccessKey" => access_key = Some(val.trim().to_string()),
                "Version" if val.trim() != "1.0" => {
                    return Err(BrokerError::InvalidConnectionString)
                }
                _ => {}
            }
        }
        match (endpoint, access_key) {
            (Some(endpoint), Some(access_key)) if !endpoint.is_empty() => Ok(Self {
                endpoint,
                access_key,
            }),
            _ => Err(BrokerError::InvalidConnectionString),
        }
    }
}

#[derive(Serialize)]
struct Claims<'a> {
    aud: &'a str,
    exp: u64,
}

pub struct BrokerClient {
    http: Client,
    info: ConnectionInfo,
    hub: String,
}

impl BrokerClient {
    pub fn new(info: ConnectionInfo, hub: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            info,
            hub: hub.into(),
        }
    }

    pub fn hub(&self) -> &str {
        &self.hub
    }

    /// Websocket URL browsers use to reach the broker for this hub.
    pub fn client_url(&self) -> String {
        let endpoint = &self.info.endpoint;
        let socket_base = match endpoint.strip_prefix("http") {
            Some(rest) => format!("ws{rest}"),
            None => endpoint.clone(),
        };
        format!("{socket_base}/ws/client/hubs/{}", self.hub)
    }

    /// REST URL under this hub; each of `segments` is percent-encoded as a
    /// single path segment.
    fn api_url(&self, segments: &[&str]) -> Result<Url, BrokerError> {
        let mut url = Url::parse(&self.info.endpoint)?;
        url.path_segments_mut()
            .map_err(|()| BrokerError::InvalidConnectionString)?
            .pop_if_empty()
            .extend(["ws", "api", "v1", "hubs", self.hub.as_str()])
            .extend(segments);
        Ok(url)
    }

    fn token(&self, audience: &str) -> Result<String, BrokerError> {
        let exp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .saturating_add(TOKEN_LIFETIME)
            .as_secs();
        let claims = Claims { aud: audience, exp };
        Ok(encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.info.access_key.as_bytes()),
        )?)
    }

    pub async fn invoke(
        &self,
        method: Method,
        segments: &[&str],
        query: &[(&str, &str)],
        event: Option<&DiagramEvent>,
    ) -> Result<(), BrokerError> {
        let url = self.api_url(segments)?;
        let token = self.token(url.as_str())?;
        debug!(%method, %url, "broker request");
        let mut request = self
            .http
            .request(method, url)
            .header(AUTHORIZATION, format!("Bearer {token}"));
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(event) = event {
            request = request
                .header(CONTENT_TYPE, "text/plain")
                .body(serde_json::to_string(event).map_err(drawboard_shared::WireError::from)?);
        }
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(BrokerError::Status(status));
        }
        Ok(())
    }

    async fn deliver(&self, segments: &[&str], query: &[(&str, &str)], event: &DiagramEvent) {
        if let Err(error) = self.invoke(Method::POST, segments, query, Some(event)).await {
            let route = segments.join("/");
            warn!(%route, event = event.kind(), %error, "broker delivery failed");
        }
    }
}

#[async_trait]
impl Dispatcher for BrokerClient {
    async fn to_all(&self, event: &DiagramEvent) {
        self.deliver(&[], &[], event).await;
    }

    async fn to_others(&self, sender: &str, event: &DiagramEvent) {
        self.deliver(&[], &[("excluded", sender)], event).await;
    }

    async fn to_connection(&self, connection_id: &str, event: &DiagramEvent) {
        self.deliver(&["connections", connection_id], &[], event)
            .await;
    }

    async fn to_group(&self, group: &str, event: &DiagramEvent) {
        self.deliver(&["groups", group], &[], event).await;
    }

    async fn to_user(&self, user_id: &str, event: &DiagramEvent) {
        self.deliver(&["users", user_id], &[], event).await;
    }

    async fn add_to_group(&self, connection_id: &str, group: &str) {
        let segments = ["groups", group, "connections", connection_id];
        if let Err(error) = self.invoke(Method::PUT, &segments, &[], None).await {
            warn!(route = %segments.join("/"), %error, "broker add_to_group failed");
        }
    }
}
