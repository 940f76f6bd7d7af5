//! ALFA Media Share - Key Material
//!
//! Content keys, P-256 agreement/signing key pairs and ECDH.

use p256::ecdsa::SigningKey;
use p256::elliptic_curve::sec1::ToEncodedPoint;
use rand::rngs::OsRng;
use rand::RngCore;
use secrecy::{ExposeSecret, Secret};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use super::codec::ImportedPublicKey;
use crate::error::{ShareError, ShareResult};

/// Key length for AES-256 and the HKDF output
pub const KEY_LEN: usize = 32;

/// Nonce length for AES-GCM
pub const NONCE_LEN: usize = 12;

/// GCM authentication tag length
pub const TAG_LEN: usize = 16;

/// Length of an uncompressed SEC1 P-256 point (0x04 ‖ X ‖ Y)
pub const RAW_PUBLIC_KEY_LEN: usize = 65;

/// Length of a P-256 private scalar
pub const PRIVATE_KEY_LEN: usize = 32;

/// Raw uncompressed P-256 public key
pub type RawPublicKey = [u8; RAW_PUBLIC_KEY_LEN];

/// Per-asset-version symmetric key, zeroized when dropped
pub struct ContentKey {
    inner: Secret<[u8; KEY_LEN]>,
}

impl ContentKey {
    /// Create a content key from bytes
    pub fn new(bytes: [u8; KEY_LEN]) -> Self {
        Self {
            inner: Secret::new(bytes),
        }
    }

    /// Generate a fresh random content key
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_LEN];
        OsRng.fill_bytes(&mut bytes);
        Self::new(bytes)
    }

    /// Rebuild a content key from unwrapped bytes
    pub fn from_slice(bytes: &[u8]) -> ShareResult<Self> {
        let array: [u8; KEY_LEN] = bytes.try_into().map_err(|_| ShareError::InvalidKeyLength {
            expected: KEY_LEN,
            actual: bytes.len(),
        })?;
        Ok(Self::new(array))
    }

    /// Expose the key bytes (use with caution)
    pub fn expose(&self) -> &[u8; KEY_LEN] {
        self.inner.expose_secret()
    }
}

/// ECDH P-256 key pair of a principal
#[derive(Clone)]
pub struct AgreementKeyPair {
    secret: p256::SecretKey,
    public_raw: RawPublicKey,
}

impl AgreementKeyPair {
    /// Generate a random agreement key pair
    pub fn generate() -> Self {
        Self::from_secret(p256::SecretKey::random(&mut OsRng))
    }

    /// Load from a 32-byte private scalar
    pub fn from_secret_bytes(bytes: &[u8]) -> ShareResult<Self> {
        check_private_len(bytes)?;
        let secret = p256::SecretKey::from_slice(bytes)
            .map_err(|_| ShareError::KeyImport("invalid P-256 agreement scalar".into()))?;
        Ok(Self::from_secret(secret))
    }

    fn from_secret(secret: p256::SecretKey) -> Self {
        let public_raw = encode_point(&secret.public_key());
        Self { secret, public_raw }
    }

    /// Private half
    pub fn secret(&self) -> &p256::SecretKey {
        &self.secret
    }

    /// Raw uncompressed public half
    pub fn public_raw(&self) -> &RawPublicKey {
        &self.public_raw
    }

    /// Export the private scalar (for identity files only)
    pub fn secret_bytes(&self) -> Zeroizing<Vec<u8>> {
        Zeroizing::new(self.secret.to_bytes().to_vec())
    }

    /// ECDH with a peer public key
    pub fn agree(&self, peer: &ImportedPublicKey) -> Zeroizing<[u8; KEY_LEN]> {
        let shared = p256::ecdh::diffie_hellman(self.secret.to_nonzero_scalar(), peer.key().as_affine());
        let mut out = Zeroizing::new([0u8; KEY_LEN]);
        out.copy_from_slice(shared.raw_secret_bytes());
        out
    }
}

/// ECDSA P-256 key pair of a principal
#[derive(Clone)]
pub struct SigningKeyPair {
    signing: SigningKey,
    public_raw: RawPublicKey,
}

impl SigningKeyPair {
    /// Generate a random signing key pair
    pub fn generate() -> Self {
        Self::from_signing_key(SigningKey::random(&mut OsRng))
    }

    /// Load from a 32-byte private scalar
    pub fn from_secret_bytes(bytes: &[u8]) -> ShareResult<Self> {
        check_private_len(bytes)?;
        let signing = SigningKey::from_slice(bytes)
            .map_err(|_| ShareError::KeyImport("invalid P-256 signing scalar".into()))?;
        Ok(Self::from_signing_key(signing))
    }

    fn from_signing_key(signing: SigningKey) -> Self {
        let point = signing.verifying_key().to_encoded_point(false);
        let mut public_raw = [0u8; RAW_PUBLIC_KEY_LEN];
        public_raw.copy_from_slice(point.as_bytes());
        Self { signing, public_raw }
    }

    /// Private half
    pub fn signing_key(&self) -> &SigningKey {
        &self.signing
    }

    /// Raw uncompressed public signature key
    pub fn public_raw(&self) -> &RawPublicKey {
        &self.public_raw
    }

    /// Export the private scalar (for identity files only)
    pub fn secret_bytes(&self) -> Zeroizing<Vec<u8>> {
        Zeroizing::new(self.signing.to_bytes().to_vec())
    }
}

/// Encode a public key as a raw uncompressed point
pub fn encode_point(key: &p256::PublicKey) -> RawPublicKey {
    let point = key.to_encoded_point(false);
    let mut raw = [0u8; RAW_PUBLIC_KEY_LEN];
    raw.copy_from_slice(point.as_bytes());
    raw
}

/// Short hex fingerprint of a public key, safe for logs
pub fn fingerprint(raw: &[u8]) -> String {
    let digest = Sha256::digest(raw);
    hex::encode(&digest[..8])
}

/// Generate a random nonce for AES-GCM
pub fn generate_nonce() -> [u8; NONCE_LEN] {
    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);
    nonce
}

fn check_private_len(bytes: &[u8]) -> ShareResult<()> {
    if bytes.len() != PRIVATE_KEY_LEN {
        return Err(ShareError::InvalidKeyLength {
            expected: PRIVATE_KEY_LEN,
            actual: bytes.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::codec::import_public_key;

    #[test]
    fn test_content_keys_are_fresh() {
        let k1 = ContentKey::generate();
        let k2 = ContentKey::generate();
        assert_ne!(k1.expose(), k2.expose());
    }

    #[test]
    fn test_content_key_length_checked() {
        assert!(ContentKey::from_slice(&[0u8; 32]).is_ok());
        assert!(matches!(
            ContentKey::from_slice(&[0u8; 16]),
            Err(ShareError::InvalidKeyLength { expected: 32, actual: 16 })
        ));
    }

    #[test]
    fn test_key_pair_reload() {
        let pair = AgreementKeyPair::generate();
        let reloaded = AgreementKeyPair::from_secret_bytes(&pair.secret_bytes()).unwrap();
        assert_eq!(pair.public_raw(), reloaded.public_raw());
        assert_eq!(pair.public_raw()[0], 0x04);

        let signer = SigningKeyPair::generate();
        let reloaded = SigningKeyPair::from_secret_bytes(&signer.secret_bytes()).unwrap();
        assert_eq!(signer.public_raw(), reloaded.public_raw());
    }

    #[test]
    fn test_ecdh_is_symmetric() {
        let alice = AgreementKeyPair::generate();
        let bob = AgreementKeyPair::generate();

        let alice_view = alice.agree(&import_public_key(bob.public_raw()).unwrap());
        let bob_view = bob.agree(&import_public_key(alice.public_raw()).unwrap());

        assert_eq!(*alice_view, *bob_view);
    }

    #[test]
    fn test_bad_scalar_rejected() {
        assert!(AgreementKeyPair::from_secret_bytes(&[0u8; 32]).is_err());
        assert!(SigningKeyPair::from_secret_bytes(&[1u8; 31]).is_err());
    }
}
