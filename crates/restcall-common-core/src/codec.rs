//! JSON serialization of request and response payloads.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::diagnostics::{Fault, FaultKind};
use crate::encoding::TextEncoding;

/// Payload (de)serialization failure.
#[derive(Debug, thiserror::Error)]
pub enum SerializationFault {
    #[error("failed to serialize payload: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("failed to deserialize payload: {0}")]
    Deserialize(#[source] serde_json::Error),
}

impl From<SerializationFault> for Fault {
    fn from(fault: SerializationFault) -> Self {
        Fault::new(FaultKind::Serialization, fault.to_string())
    }
}

/// Serialize a value to a JSON string.
pub fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String, SerializationFault> {
    serde_json::to_string(value).map_err(SerializationFault::Serialize)
}

/// Deserialize JSON text that was decoded with `encoding`.
///
/// The text is encoded back to bytes first so the parser sees exactly what
/// the wire carried for single-byte encodings.
pub fn from_json<T: DeserializeOwned>(
    text: &str,
    encoding: TextEncoding,
) -> Result<T, SerializationFault> {
    let bytes = match encoding {
        TextEncoding::Utf8 | TextEncoding::Utf16Le | TextEncoding::Utf16Be => {
            text.as_bytes().to_vec()
        }
        TextEncoding::Ascii | TextEncoding::Latin1 => {
            TextEncoding::Utf8.encode(&encoding.decode(&encoding.encode(text)))
        }
    };
    serde_json::from_slice(&bytes).map_err(SerializationFault::Deserialize)
}
