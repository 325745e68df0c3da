//! Frame encoding for the live channel.
//!
//! Text frames carry the JSON `{name, data}` envelope; a text frame may also
//! hold a JSON array of envelopes. Binary frames carry exactly one
//! bincode-encoded event.

use serde::{Deserialize, Serialize};

use crate::{DiagramEvent, WireError};

/// Largest frame the live channel accepts in either format. Binary decoding
/// never allocates past this, whatever length prefixes a frame claims.
pub const MAX_FRAME_BYTES: usize = 1 << 20;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WireFormat {
    #[default]
    Json,
    Bincode,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
}

pub fn encode(event: &DiagramEvent, format: WireFormat) -> Result<Frame, WireError> {
    match format {
        WireFormat::Json => Ok(Frame::Text(serde_json::to_string(event)?)),
        WireFormat::Bincode => Ok(Frame::Binary(bincode::encode_to_vec(
            event,
            bincode::config::standard(),
        )?)),
    }
}

/// Encodes several events as one JSON array, the shape of a webhook reply.
pub fn encode_batch(events: &[DiagramEvent]) -> Result<String, WireError> {
    Ok(serde_json::to_string(events)?)
}

pub fn decode_text(text: &str) -> Result<Vec<DiagramEvent>, WireError> {
    if text.trim_start().starts_with('[') {
        return Ok(serde_json::from_str::<Vec<DiagramEvent>>(text)?);
    }
    Ok(vec![serde_json::from_str::<DiagramEvent>(text)?])
}

pub fn decode_binary(bytes: &[u8]) -> Result<DiagramEvent, WireError> {
    let config = bincode::config::standard().with_limit::<MAX_FRAME_BYTES>();
    let (event, _) = bincode::decode_from_slice(bytes, config)?;
    Ok(event)
}
