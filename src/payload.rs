//! ALFA Media Share - Shareable Payload Protocol
//!
//! Wraps opaque data (a content key) for exactly one recipient:
//!
//! ```text
//! ephemeral ECDH(P-256) ──► shared secret
//!        │
//!        ▼
//! HKDF(secret, salt, info = eph ‖ receiver ‖ sender_sig) ──► wrapping key
//!        │
//!        ▼
//! AES-256-GCM(data) ──► ciphertext
//!        │
//!        ▼
//! ECDSA(ciphertext ‖ eph ‖ receiver) ──► signature
//! ```
//!
//! Unwrapping verifies the signature before anything else touches the
//! ciphertext.

use std::fmt;

use log::debug;
use p256::ecdh::EphemeralSecret;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::crypto::{
    aead, derive_wrapping_key, encode_point, fingerprint, import_public_key, signing, AgreementKeyPair,
    SigningKeyPair, RAW_PUBLIC_KEY_LEN,
};
use crate::error::{ShareError, ShareResult};

/// Domain tag prepended to v2 signed data
const V2_SIGNATURE_TAG: &[u8] = b"ALFA-SHARE:v2";

// ---------------------------------------------------------------------------
// Protocol inputs
// ---------------------------------------------------------------------------

/// Deployment-wide HKDF salt issued by the server
#[derive(Clone, PartialEq, Eq)]
pub struct ProtocolSalt {
    bytes: Vec<u8>,
}

impl ProtocolSalt {
    /// Parse the base64 form served by the key-distribution endpoint
    pub fn from_base64(encoded: &str) -> ShareResult<Self> {
        let bytes = crate::encoding::decode(encoded)
            .map_err(|e| ShareError::UnsupportedSaltOrInfo(format!("salt is not base64: {}", e)))?;
        Self::from_bytes(bytes)
    }

    /// Wrap already-decoded salt bytes
    pub fn from_bytes(bytes: Vec<u8>) -> ShareResult<Self> {
        if bytes.is_empty() {
            return Err(ShareError::UnsupportedSaltOrInfo("salt is empty".into()));
        }
        Ok(Self { bytes })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn to_base64(&self) -> String {
        crate::encoding::encode(&self.bytes)
    }
}

impl fmt::Debug for ProtocolSalt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProtocolSalt({} bytes)", self.bytes.len())
    }
}

/// Layout of the signed data
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum ProtocolVersion {
    /// Signs `ciphertext ‖ eph ‖ receiver`
    #[default]
    V1,
    /// Additionally binds a version tag and the salt into the signature
    V2,
}

impl ProtocolVersion {
    pub fn as_u8(self) -> u8 {
        match self {
            ProtocolVersion::V1 => 1,
            ProtocolVersion::V2 => 2,
        }
    }

    pub(crate) fn is_v1(&self) -> bool {
        *self == ProtocolVersion::V1
    }
}

impl From<ProtocolVersion> for u8 {
    fn from(version: ProtocolVersion) -> u8 {
        version.as_u8()
    }
}

impl TryFrom<u8> for ProtocolVersion {
    type Error = ShareError;

    fn try_from(value: u8) -> ShareResult<Self> {
        match value {
            1 => Ok(ProtocolVersion::V1),
            2 => Ok(ProtocolVersion::V2),
            other => Err(ShareError::UnsupportedProtocolVersion {
                found: other,
                minimum: ProtocolVersion::V1.as_u8(),
            }),
        }
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.as_u8())
    }
}

// ---------------------------------------------------------------------------
// ShareablePayload
// ---------------------------------------------------------------------------

/// One content key wrapped for one recipient
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareablePayload {
    #[serde(with = "crate::encoding::base64_bytes")]
    pub ephemeral_public_key: Vec<u8>,
    /// `IV ‖ AES-GCM ciphertext ‖ tag`
    #[serde(with = "crate::encoding::base64_bytes")]
    pub ciphertext: Vec<u8>,
    #[serde(with = "crate::encoding::base64_bytes")]
    pub signature: Vec<u8>,
    #[serde(default, skip_serializing_if = "ProtocolVersion::is_v1")]
    pub version: ProtocolVersion,
}

/// Wrap `data` for `receiver_public_key` (raw or SPKI) using the v1 layout
pub fn wrap(
    data: &[u8],
    receiver_public_key: &[u8],
    sender: &SigningKeyPair,
    salt: &ProtocolSalt,
) -> ShareResult<ShareablePayload> {
    wrap_versioned(data, receiver_public_key, sender, salt, ProtocolVersion::V1)
}

/// Wrap `data` for `receiver_public_key` with an explicit signed-data layout
pub fn wrap_versioned(
    data: &[u8],
    receiver_public_key: &[u8],
    sender: &SigningKeyPair,
    salt: &ProtocolSalt,
    version: ProtocolVersion,
) -> ShareResult<ShareablePayload> {
    let receiver = import_public_key(receiver_public_key)?;

    let ephemeral = EphemeralSecret::random(&mut OsRng);
    let ephemeral_raw = encode_point(&ephemeral.public_key());
    let shared = ephemeral.diffie_hellman(receiver.key());

    let info = build_info(&ephemeral_raw, receiver.raw(), sender.public_raw());
    let wrapping_key = derive_wrapping_key(shared.raw_secret_bytes(), salt.as_bytes(), &info)?;
    let ciphertext = aead::encrypt(data, &wrapping_key)?;

    let signed = signed_data(version, salt, &ciphertext, &ephemeral_raw, receiver.raw());
    let signature = signing::sign(sender, &signed);

    debug!(
        "Wrapped {} bytes for receiver {} ({})",
        data.len(),
        fingerprint(receiver.raw()),
        version
    );

    Ok(ShareablePayload {
        ephemeral_public_key: ephemeral_raw.to_vec(),
        ciphertext,
        signature,
        version,
    })
}

/// Unwrap a payload addressed to `receiver`, accepting any known version
pub fn unwrap(
    payload: &ShareablePayload,
    receiver: &AgreementKeyPair,
    sender_public_signature: &[u8],
    salt: &ProtocolSalt,
) -> ShareResult<Zeroizing<Vec<u8>>> {
    unwrap_with_minimum(payload, receiver, sender_public_signature, salt, ProtocolVersion::V1)
}

/// Unwrap a payload, rejecting layouts older than `minimum`
pub fn unwrap_with_minimum(
    payload: &ShareablePayload,
    receiver: &AgreementKeyPair,
    sender_public_signature: &[u8],
    salt: &ProtocolSalt,
    minimum: ProtocolVersion,
) -> ShareResult<Zeroizing<Vec<u8>>> {
    if payload.version < minimum {
        return Err(ShareError::UnsupportedProtocolVersion {
            found: payload.version.as_u8(),
            minimum: minimum.as_u8(),
        });
    }

    let sender = import_public_key(sender_public_signature)?;
    let receiver_raw = receiver.public_raw();

    // Signature first, over the ephemeral key bytes exactly as transmitted.
    let signed = signed_data(
        payload.version,
        salt,
        &payload.ciphertext,
        &payload.ephemeral_public_key,
        receiver_raw,
    );
    signing::verify(&sender, &signed, &payload.signature)?;

    let ephemeral = import_public_key(&payload.ephemeral_public_key)?;
    let shared = receiver.agree(&ephemeral);

    let info = build_info(ephemeral.raw(), receiver_raw, sender.raw());
    let wrapping_key = derive_wrapping_key(&*shared, salt.as_bytes(), &info)?;
    let data = aead::decrypt(&payload.ciphertext, &wrapping_key)?;

    debug!("Unwrapped payload from sender {}", fingerprint(sender.raw()));

    Ok(Zeroizing::new(data))
}

/// HKDF info: `eph ‖ receiver ‖ sender_sig`
fn build_info(ephemeral: &[u8], receiver: &[u8], sender_signature: &[u8]) -> Vec<u8> {
    let mut info = Vec::with_capacity(3 * RAW_PUBLIC_KEY_LEN);
    info.extend_from_slice(ephemeral);
    info.extend_from_slice(receiver);
    info.extend_from_slice(sender_signature);
    info
}

fn signed_data(
    version: ProtocolVersion,
    salt: &ProtocolSalt,
    ciphertext: &[u8],
    ephemeral: &[u8],
    receiver: &[u8],
) -> Vec<u8> {
    let mut data = Vec::with_capacity(ciphertext.len() + ephemeral.len() + receiver.len() + 64);
    if version == ProtocolVersion::V2 {
        data.extend_from_slice(V2_SIGNATURE_TAG);
        data.extend_from_slice(&(salt.as_bytes().len() as u32).to_be_bytes());
        data.extend_from_slice(salt.as_bytes());
    }
    data.extend_from_slice(ciphertext);
    data.extend_from_slice(ephemeral);
    data.extend_from_slice(receiver);
    data
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
