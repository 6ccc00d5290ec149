//! Pluggable request/response body serialization.
//!
//! Actor calls carry their arguments and results as opaque bytes. The
//! [`MessageCodec`] trait decides how typed values become those bytes;
//! [`JsonCodec`] is the default and keeps payloads human-readable.
//!
//! ```rust
//! use moonpool_leaderboard::actors::{JsonCodec, MessageCodec};
//!
//! let codec = JsonCodec;
//! let bytes = codec.encode(&3u32).unwrap();
//! assert_eq!(&bytes, b"3");
//! let back: u32 = codec.decode(&bytes).unwrap();
//! assert_eq!(back, 3);
//! ```

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Error type for codec operations.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Failed to encode a value to bytes.
    #[error("encode error: {0}")]
    Encode(#[source] Box<dyn std::error::Error + Send + Sync>),
    /// Failed to decode bytes to a value.
    #[error("decode error: {0}")]
    Decode(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Pluggable message serialization format.
///
/// The trait requires `Clone + 'static` so codec instances can be stored in
/// routers and handed to every activation context.
pub trait MessageCodec: Clone + 'static {
    /// Encode a serializable value to bytes.
    fn encode<T: Serialize>(&self, msg: &T) -> Result<Vec<u8>, CodecError>;

    /// Decode bytes to a deserializable value.
    fn decode<T: DeserializeOwned>(&self, buf: &[u8]) -> Result<T, CodecError>;
}

/// JSON codec using serde_json.
#[derive(Clone, Default, Debug, Copy)]
pub struct JsonCodec;

impl MessageCodec for JsonCodec {
    fn encode<T: Serialize>(&self, msg: &T) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(msg).map_err(|e| CodecError::Encode(Box::new(e)))
    }

    fn decode<T: DeserializeOwned>(&self, buf: &[u8]) -> Result<T, CodecError> {
        serde_json::from_slice(buf).map_err(|e| CodecError::Decode(Box::new(e)))
    }
}
