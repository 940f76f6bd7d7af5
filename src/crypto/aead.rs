//! ALFA Media Share - AEAD Encryption
//!
//! AES-256-GCM with the IV prepended: `IV(12) ‖ ciphertext ‖ tag(16)`.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};

use super::keys::{generate_nonce, KEY_LEN, NONCE_LEN, TAG_LEN};
use crate::error::{ShareError, ShareResult};

/// Bytes added to every plaintext
pub const OVERHEAD: usize = NONCE_LEN + TAG_LEN;

/// Encrypt with a fresh random IV
pub fn encrypt(plaintext: &[u8], key: &[u8; KEY_LEN]) -> ShareResult<Vec<u8>> {
    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| ShareError::EncryptionFailed(e.to_string()))?;

    let nonce_bytes = generate_nonce();
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| ShareError::EncryptionFailed(e.to_string()))?;

    let mut output = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    output.extend_from_slice(&nonce_bytes);
    output.extend_from_slice(&ciphertext);
    Ok(output)
}

/// Decrypt an `IV ‖ ciphertext ‖ tag` blob
pub fn decrypt(blob: &[u8], key: &[u8; KEY_LEN]) -> ShareResult<Vec<u8>> {
    if blob.len() < OVERHEAD {
        return Err(ShareError::AeadDecryption);
    }

    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| ShareError::AeadDecryption)?;
    let (nonce_bytes, ciphertext) = blob.split_at(NONCE_LEN);

    cipher
        .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
        .map_err(|_| ShareError::AeadDecryption)
}
