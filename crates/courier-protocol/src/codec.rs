//! Codec for encoding and decoding Courier envelopes.
//!
//! Envelopes travel as JSON text, one per WebSocket message, so no framing
//! or length prefix is involved; the codec is the serde boundary plus the
//! protocol error taxonomy.

use thiserror::Error;

use crate::envelope::Envelope;

/// Protocol errors that can occur during encoding/decoding.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// JSON encoding error.
    #[error("encoding error: {0}")]
    Encode(#[source] serde_json::Error),

    /// JSON decoding error.
    #[error("decoding error: {0}")]
    Decode(#[source] serde_json::Error),
}

/// Encode an envelope to its JSON wire form.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn encode(envelope: &Envelope) -> Result<String, ProtocolError> {
    serde_json::to_string(envelope).map_err(ProtocolError::Encode)
}

/// Decode an envelope from raw bytes.
///
/// # Errors
///
/// Returns an error if the bytes are not a valid envelope.
pub fn decode(data: &[u8]) -> Result<Envelope, ProtocolError> {
    serde_json::from_slice(data).map_err(ProtocolError::Decode)
}

/// Decode an envelope from a text frame.
///
/// # Errors
///
/// Returns an error if the text is not a valid envelope.
pub fn decode_str(text: &str) -> Result<Envelope, ProtocolError> {
    serde_json::from_str(text).map_err(ProtocolError::Decode)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode_roundtrip() {
        let envelopes = vec![
            Envelope::join("alice", "room1", "pk-alice"),
            Envelope::leave("alice"),
            Envelope::pubkey("bob", "room1", "pk-bob"),
            Envelope::chat("alice", "room1", "ciphertext"),
            Envelope::chat_to("bob", "ciphertext"),
            Envelope::clear("room1"),
            Envelope::error("username taken in this room"),
        ];

        for envelope in envelopes {
            let encoded = encode(&envelope).unwrap();
            let decoded = decode_str(&encoded).unwrap();
            assert_eq!(envelope, decoded);
        }
    }

    #[test]
    fn test_decode_bytes() {
        let envelope = Envelope::chat_to("bob", "hi");
        let encoded = encode(&envelope).unwrap();
        assert_eq!(decode(encoded.as_bytes()).unwrap(), envelope);
    }

    #[test]
    fn test_decode_invalid_json() {
        assert!(matches!(
            decode_str("{invalid-json"),
            Err(ProtocolError::Decode(_))
        ));
        assert!(decode(b"").is_err());
    }

    #[test]
    fn test_decode_non_object() {
        assert!(decode_str(r#""join""#).is_err());
        assert!(decode_str("[1,2,3]").is_err());
    }
}
