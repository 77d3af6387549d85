//! Error types
//!
//! Failures raised while parsing persisted data: item and pack nodes,
//! binary-encoded trees, payload encodings. Revision-level operations
//! never return these; they skip the broken part and log instead.
//!
//! Author: Moroya Sakamoto

use thiserror::Error;

/// Result type alias for this crate
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced while reading persisted trees
#[derive(Debug, Error)]
pub enum Error {
    /// Node has the wrong type tag
    #[error("unexpected node tag: expected {expected}, found {found}")]
    UnexpectedTag {
        /// Tag the reader was looking for
        expected: &'static str,
        /// Tag actually present
        found: String,
    },

    /// Required property absent from a node
    #[error("missing property: {0}")]
    MissingProperty(&'static str),

    /// Property could not be parsed as a UUID
    #[error("invalid uuid: {0}")]
    InvalidUuid(String),

    /// Unknown revision item type tag
    #[error("unknown revision item kind: {0}")]
    UnknownItemKind(String),

    /// Payload text is not valid base64
    #[error("encoding error: {0}")]
    Encoding(#[from] base64::DecodeError),

    /// Binary input ended early
    #[error("truncated input at byte {0}")]
    Truncated(usize),

    /// String field is not UTF-8
    #[error("invalid utf-8 at byte {0}")]
    InvalidUtf8(usize),

    /// Varint longer than a u32
    #[error("varint overflow at byte {0}")]
    VarintOverflow(usize),

    /// Input continues after the root node
    #[error("{0} trailing bytes after root node")]
    TrailingBytes(usize),

    /// Length or count does not fit the u32 varint width
    #[error("length {0} exceeds u32 range")]
    TooLarge(usize),

    /// Tree nested deeper than the decoder allows
    #[error("tree nesting exceeds {0} levels")]
    TooDeep(usize),

    /// JSON (de)serialization failure
    #[cfg(feature = "json")]
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_unexpected_tag() {
        let err = Error::UnexpectedTag {
            expected: "revisionItem",
            found: "note".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("revisionItem"));
        assert!(msg.contains("note"));
    }

    #[test]
    fn test_error_display_truncated() {
        let msg = Error::Truncated(17).to_string();
        assert!(msg.contains("truncated"));
        assert!(msg.contains("17"));
    }

    #[test]
    fn test_error_display_too_large() {
        let msg = Error::TooLarge(5_000_000_000).to_string();
        assert!(msg.contains("5000000000"));
        assert!(msg.contains("u32"));
    }

    #[test]
    fn test_error_from_base64() {
        use base64::Engine;
        let decode_err = base64::engine::general_purpose::STANDARD
            .decode("###")
            .unwrap_err();
        let err: Error = decode_err.into();
        assert!(matches!(err, Error::Encoding(_)));
    }
}
