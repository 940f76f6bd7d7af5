//! ALFA Media Share - Error Types

use thiserror::Error;

/// Result type for share operations
pub type ShareResult<T> = Result<T, ShareError>;

/// Share error types
#[derive(Error, Debug)]
pub enum ShareError {
    // ═══════════════════════════════════════════════════════════════
    // CRYPTO ERRORS
    // ═══════════════════════════════════════════════════════════════

    #[error("Key import failed: {0}")]
    KeyImport(String),

    #[error("Signature verification failed - payload tampered or wrong sender")]
    SignatureVerification,

    #[error("AEAD decryption failed - wrong key, corrupted IV or tampered ciphertext")]
    AeadDecryption,

    #[error("Unsupported salt or info: {0}")]
    UnsupportedSaltOrInfo(String),

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Key derivation failed: {0}")]
    KeyDerivationFailed(String),

    #[error("Invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    // ═══════════════════════════════════════════════════════════════
    // PROTOCOL ERRORS
    // ═══════════════════════════════════════════════════════════════

    #[error("Unsupported protocol version: {found} (minimum: {minimum})")]
    UnsupportedProtocolVersion { found: u8, minimum: u8 },

    #[error("Asset version not found: {0}")]
    VersionNotFound(String),

    #[error("Asset version supplied more than once: {0}")]
    DuplicateVersion(String),

    // ═══════════════════════════════════════════════════════════════
    // SERVICE ERRORS
    // ═══════════════════════════════════════════════════════════════

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Worker task failed: {0}")]
    TaskFailed(String),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    // ═══════════════════════════════════════════════════════════════
    // SERIALIZATION / IO ERRORS
    // ═══════════════════════════════════════════════════════════════

    #[error("Invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl ShareError {
    /// Check if this error indicates tampering or a key mismatch
    pub fn is_security_critical(&self) -> bool {
        matches!(
            self,
            ShareError::SignatureVerification
                | ShareError::AeadDecryption
                | ShareError::UnsupportedProtocolVersion { .. }
        )
    }

    /// Check if retrying the same unit could succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ShareError::TaskFailed(_) | ShareError::Cancelled | ShareError::IoError(_)
        )
    }
}

impl From<serde_json::Error> for ShareError {
    fn from(e: serde_json::Error) -> Self {
        ShareError::SerializationError(e.to_string())
    }
}

impl From<tokio::task::JoinError> for ShareError {
    fn from(e: tokio::task::JoinError) -> Self {
        ShareError::TaskFailed(e.to_string())
    }
}
