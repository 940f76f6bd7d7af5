//! ECDSA P-256 / SHA-256 signatures.
//!
//! Signatures are emitted in the fixed 64-byte `r ‖ s` form; DER is accepted
//! on verification.

use p256::ecdsa::{
    signature::{Signer as _, Verifier as _},
    Signature,
};

use super::codec::ImportedPublicKey;
use super::keys::SigningKeyPair;
use crate::error::{ShareError, ShareResult};

/// Fixed-size signature length
pub const SIGNATURE_LEN: usize = 64;

/// Sign a message
pub fn sign(signer: &SigningKeyPair, message: &[u8]) -> Vec<u8> {
    let signature: Signature = signer.signing_key().sign(message);
    signature.to_bytes().to_vec()
}

/// Verify a signature; any malformed input counts as a failed verification
pub fn verify(public_signature: &ImportedPublicKey, message: &[u8], signature: &[u8]) -> ShareResult<()> {
    let signature = if signature.len() == SIGNATURE_LEN {
        Signature::from_slice(signature)
    } else {
        Signature::from_der(signature)
    }
    .map_err(|_| ShareError::SignatureVerification)?;

    public_signature
        .verifying_key()
        .verify(message, &signature)
        .map_err(|_| ShareError::SignatureVerification)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::codec::import_public_key;

    #[test]
    fn test_sign_verify() {
        let signer = SigningKeyPair::generate();
        let public = import_public_key(signer.public_raw()).unwrap();

        let sig = sign(&signer, b"ciphertext|ephemeral|receiver");
        assert_eq!(sig.len(), SIGNATURE_LEN);
        assert!(verify(&public, b"ciphertext|ephemeral|receiver", &sig).is_ok());
        assert!(matches!(
            verify(&public, b"ciphertext|ephemeral|other", &sig),
            Err(ShareError::SignatureVerification)
        ));
    }

    #[test]
    fn test_der_signature_accepted() {
        let signer = SigningKeyPair::generate();
        let public = import_public_key(signer.public_raw()).unwrap();

        let fixed = sign(&signer, b"message");
        let der = Signature::from_slice(&fixed).unwrap().to_der();
        assert!(verify(&public, b"message", der.as_bytes()).is_ok());
    }

    #[test]
    fn test_wrong_signer_rejected() {
        let signer = SigningKeyPair::generate();
        let other = SigningKeyPair::generate();
        let sig = sign(&signer, b"message");

        let public = import_public_key(other.public_raw()).unwrap();
        assert!(verify(&public, b"message", &sig).is_err());
        assert!(verify(&public, b"message", &[0u8; 3]).is_err());
    }
}
