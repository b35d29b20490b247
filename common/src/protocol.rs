//! Protocol definition for the data socket.
//!
use serde::{Deserialize, Serialize};

/// Definition of protocol messages.
#[derive(Debug, Deserialize, PartialEq, Serialize)]
pub enum ProtoMsg {
    ConnectReq(String),
    Sample(SampleMsg),
}

/// One classification result for the channel `id`.
///
/// The receiving side stamps the sample on arrival, so no timestamp travels
/// over the wire.
#[derive(Debug, Deserialize, PartialEq, Serialize)]
pub struct SampleMsg {
    pub id: String,
    pub label: String,
    pub confidence: f32,
}

impl SampleMsg {
    pub fn new(id: String, label: String, confidence: f32) -> Self {
        Self {
            id,
            label,
            confidence,
        }
    }
}

impl ProtoMsg {
    pub fn serialize(&self) -> Result<Vec<u8>, Box<bincode::ErrorKind>> {
        bincode::serialize(self)
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self, Box<bincode::ErrorKind>> {
        bincode::deserialize(bytes)
    }
}
