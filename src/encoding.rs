//! Base64 helpers for wire encodings.

use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::error::ShareResult;

/// Encode bytes as standard padded base64
pub fn encode(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decode standard padded base64
pub fn decode(text: &str) -> ShareResult<Vec<u8>> {
    Ok(STANDARD.decode(text.trim())?)
}

/// `#[serde(with = ...)]` adapter for `Vec<u8>` fields carried as base64
pub mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        STANDARD.decode(text.trim()).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_protocol_salt() {
        assert_eq!(decode("c2FsdA==").unwrap(), b"salt");
        assert!(decode("not base64!").is_err());
    }
}
