//! ALFA Media Share - Public Key Codec
//!
//! Normalizes P-256 public keys between raw SEC1 points and DER/SPKI.
//! Everything downstream (HKDF info, signed data, DTOs) sees the raw form.

use p256::ecdsa::VerifyingKey;
use p256::pkcs8::{DecodePublicKey, EncodePublicKey};
use serde::{Deserialize, Serialize};

use super::keys::{encode_point, AgreementKeyPair, RawPublicKey, SigningKeyPair, RAW_PUBLIC_KEY_LEN};
use crate::error::{ShareError, ShareResult};

/// Explicit encoding tag for a transmitted public key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublicKeyFormat {
    /// 65-byte uncompressed SEC1 point
    Raw,
    /// DER-encoded SubjectPublicKeyInfo
    Spki,
}

/// Tagged public key as carried in key-distribution responses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedPublicKey {
    pub format: PublicKeyFormat,
    #[serde(with = "crate::encoding::base64_bytes")]
    pub bytes: Vec<u8>,
}

impl EncodedPublicKey {
    /// Tag raw point bytes
    pub fn raw(bytes: &[u8]) -> Self {
        Self {
            format: PublicKeyFormat::Raw,
            bytes: bytes.to_vec(),
        }
    }

    /// Tag SPKI DER bytes
    pub fn spki(bytes: &[u8]) -> Self {
        Self {
            format: PublicKeyFormat::Spki,
            bytes: bytes.to_vec(),
        }
    }

    /// Import honouring the declared format, without length inference
    pub fn import(&self) -> ShareResult<ImportedPublicKey> {
        match self.format {
            PublicKeyFormat::Raw => import_raw(&self.bytes),
            PublicKeyFormat::Spki => import_spki(&self.bytes),
        }
    }
}

/// A validated P-256 public key together with its raw encoding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedPublicKey {
    raw: RawPublicKey,
    key: p256::PublicKey,
}

impl ImportedPublicKey {
    /// Raw uncompressed point
    pub fn raw(&self) -> &RawPublicKey {
        &self.raw
    }

    /// Key usable as an ECDH peer
    pub fn key(&self) -> &p256::PublicKey {
        &self.key
    }

    /// Key usable for ECDSA verification
    pub fn verifying_key(&self) -> VerifyingKey {
        VerifyingKey::from(&self.key)
    }

    /// Re-encode as DER/SPKI
    pub fn to_spki(&self) -> ShareResult<Vec<u8>> {
        let doc = self
            .key
            .to_public_key_der()
            .map_err(|e| ShareError::KeyImport(format!("SPKI export failed: {}", e)))?;
        Ok(doc.as_bytes().to_vec())
    }
}

/// Import a public key whose encoding is inferred from its length.
///
/// 65 bytes are taken as a raw point; anything else must be DER/SPKI.
pub fn import_public_key(bytes: &[u8]) -> ShareResult<ImportedPublicKey> {
    if bytes.len() == RAW_PUBLIC_KEY_LEN {
        import_raw(bytes)
    } else {
        import_spki(bytes)
    }
}

fn import_raw(bytes: &[u8]) -> ShareResult<ImportedPublicKey> {
    if bytes.len() != RAW_PUBLIC_KEY_LEN || bytes[0] != 0x04 {
        return Err(ShareError::KeyImport(format!(
            "raw key must be a {}-byte uncompressed point, got {} bytes",
            RAW_PUBLIC_KEY_LEN,
            bytes.len()
        )));
    }
    let key = p256::PublicKey::from_sec1_bytes(bytes)
        .map_err(|_| ShareError::KeyImport("point is not on P-256".into()))?;
    Ok(ImportedPublicKey {
        raw: encode_point(&key),
        key,
    })
}

fn import_spki(bytes: &[u8]) -> ShareResult<ImportedPublicKey> {
    let key = p256::PublicKey::from_public_key_der(bytes)
        .map_err(|e| ShareError::KeyImport(format!("malformed SPKI ({} bytes): {}", bytes.len(), e)))?;
    Ok(ImportedPublicKey {
        raw: encode_point(&key),
        key,
    })
}

/// Recover the raw public half of an agreement private key
pub fn derive_agreement_public(pair: &AgreementKeyPair) -> RawPublicKey {
    *pair.public_raw()
}

/// Recover the raw public signature key of a signing private key
pub fn derive_signing_public(pair: &SigningKeyPair) -> RawPublicKey {
    *pair.public_raw()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spki_import_to_raw() {
        let pair = AgreementKeyPair::generate();
        let spki = import_public_key(pair.public_raw()).unwrap().to_spki().unwrap();
        assert_eq!(spki.len(), 91);

        let imported = import_public_key(&spki).unwrap();
        assert_eq!(imported.raw().len(), 65);
        assert_eq!(imported.raw()[0], 0x04);
        assert_eq!(imported.raw(), pair.public_raw());
    }

    #[test]
    fn test_raw_and_spki_agree_on_shared_secret() {
        let me = AgreementKeyPair::generate();
        let peer = AgreementKeyPair::generate();

        let from_raw = import_public_key(peer.public_raw()).unwrap();
        let from_spki = import_public_key(&from_raw.to_spki().unwrap()).unwrap();

        assert_eq!(*me.agree(&from_raw), *me.agree(&from_spki));
    }

    #[test]
    fn test_bad_encodings_rejected() {
        assert!(matches!(import_public_key(&[0u8; 10]), Err(ShareError::KeyImport(_))));
        assert!(matches!(import_public_key(&[0u8; 65]), Err(ShareError::KeyImport(_))));

        let mut not_on_curve = [0xFFu8; 65];
        not_on_curve[0] = 0x04;
        assert!(import_public_key(&not_on_curve).is_err());
    }

    #[test]
    fn test_tagged_import_does_not_infer() {
        let pair = SigningKeyPair::generate();
        let tagged = EncodedPublicKey::spki(pair.public_raw());
        assert!(tagged.import().is_err());

        let tagged = EncodedPublicKey::raw(pair.public_raw());
        assert_eq!(tagged.import().unwrap().raw(), &derive_signing_public(&pair));
    }

    #[test]
    fn test_encoded_key_json_shape() {
        let pair = AgreementKeyPair::generate();
        let json = serde_json::to_value(EncodedPublicKey::raw(pair.public_raw())).unwrap();
        assert_eq!(json["format"], "raw");
        assert!(json["bytes"].is_string());
    }
}
