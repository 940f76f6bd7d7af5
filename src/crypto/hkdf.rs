//! ALFA Media Share - HKDF Key Derivation
//!
//! Extract plus a single expand block (counter 0x01). Outputs are capped at
//! one HMAC-SHA256 block; stored payloads depend on this exact construction.

use ::hkdf::Hkdf;
use sha2::Sha256;
use zeroize::Zeroizing;

use super::keys::KEY_LEN;
use crate::error::{ShareError, ShareResult};

/// Largest output a single expand block can produce
pub const MAX_OUTPUT_LEN: usize = 32;

/// Derive `length` bytes from `ikm` with `salt` and `info`
pub fn hkdf(ikm: &[u8], salt: &[u8], info: &[u8], length: usize) -> ShareResult<Zeroizing<Vec<u8>>> {
    if salt.is_empty() {
        return Err(ShareError::UnsupportedSaltOrInfo("salt is empty".into()));
    }
    if length == 0 || length > MAX_OUTPUT_LEN {
        return Err(ShareError::KeyDerivationFailed(format!(
            "output length {} outside 1..={}",
            length, MAX_OUTPUT_LEN
        )));
    }

    let hk = Hkdf::<Sha256>::new(Some(salt), ikm);
    let mut okm = Zeroizing::new(vec![0u8; length]);
    hk.expand(info, &mut okm)
        .map_err(|e| ShareError::KeyDerivationFailed(e.to_string()))?;

    Ok(okm)
}

/// Derive a 256-bit wrapping key
pub fn derive_wrapping_key(ikm: &[u8], salt: &[u8], info: &[u8]) -> ShareResult<Zeroizing<[u8; KEY_LEN]>> {
    let okm = hkdf(ikm, salt, info, KEY_LEN)?;
    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    key.copy_from_slice(&okm);
    Ok(key)
}
