//! Restcall common core types and utilities.

pub mod codec;
pub mod content_type;
pub mod diagnostics;
pub mod encoding;

pub use codec::{from_json, to_json, SerializationFault};
pub use diagnostics::{Category, Fault, FaultKind, Log, DEFAULT_DELIMITER};
pub use encoding::TextEncoding;
