use thiserror::Error;

#[derive(Debug, Error)]
pub enum WireError {
    #[error("malformed JSON frame: {0}")]
    Json(#[from] serde_json::Error),
    #[error("malformed binary frame: {0}")]
    Decode(#[from] bincode::error::DecodeError),
    #[error("failed to encode binary frame: {0}")]
    Encode(#[from] bincode::error::EncodeError),
}
