use axum::http::StatusCode;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    /// A patch named a shape that was never created. The sender must upsert first.
    #[error("shape {0} does not exist")]
    ShapeNotFound(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("{0} may only be sent by the server")]
    ServerOnly(&'static str),
    #[error("invalid shape id")]
    InvalidId,
    #[error("shape {0} has an odd number of coordinates")]
    OddCoordinates(String),
}

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("connection string must look like `Endpoint=...;AccessKey=...;Version=1.0;`")]
    InvalidConnectionString,
    #[error("invalid broker endpoint: {0}")]
    Endpoint(#[from] url::ParseError),
    #[error("failed to sign broker token: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
    #[error("broker request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("failed to encode event: {0}")]
    Wire(#[from] drawboard_shared::WireError),
    #[error("broker rejected request with status {0}")]
    Status(StatusCode),
}
