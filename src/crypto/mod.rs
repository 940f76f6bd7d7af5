//! ALFA Media Share - Cryptographic Core
//!
//! P-256 key handling, single-block HKDF, AES-256-GCM and ECDSA.

pub mod keys;
pub mod codec;
pub mod hkdf;
pub mod aead;
pub mod signing;

pub use keys::*;
pub use codec::*;
pub use self::hkdf::{hkdf, derive_wrapping_key};
