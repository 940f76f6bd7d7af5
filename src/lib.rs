//! # ALFA Media Share
//!
//! Hybrid-encrypted media with per-recipient key wrapping.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                    ALFA MEDIA SHARE                       │
//! │  ┌─────────────┐  ┌─────────────┐  ┌──────────────────┐  │
//! │  │   UPLOAD    │  │    READ     │  │   VISIBILITY     │  │
//! │  │  asset.rs   │  │  reader.rs  │  │  visibility.rs   │  │
//! │  └──────┬──────┘  └──────┬──────┘  └────────┬─────────┘  │
//! │         │                │                   │            │
//! │  ┌──────┴────────────────┴───────────────────┴─────────┐ │
//! │  │        SHAREABLE PAYLOAD  (payload.rs)               │ │
//! │  │  ephemeral ECDH → HKDF → AES-GCM wrap + ECDSA sign   │ │
//! │  └──────────────────────────────────────────────────────┘ │
//! │                                                           │
//! │  ┌─────────────┐  ┌─────────────┐  ┌──────────────────┐  │
//! │  │  KEY CODEC  │  │  HKDF/AEAD  │  │  SESSION + CONFIG│  │
//! │  │  raw / SPKI │  │  AES-256-GCM│  │  server bundle   │  │
//! │  └─────────────┘  └─────────────┘  └──────────────────┘  │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Security Model
//!
//! - Every asset version has its own random 256-bit content key
//! - Bodies are sealed once with AES-256-GCM and never re-encrypted
//! - Content keys are wrapped separately for owner and server (P-256 ECDH)
//! - Wraps are signed by the owner and verified before any decryption
//! - Key material and plaintext are zeroized after use

pub mod asset;
pub mod config;
pub mod crypto;
pub mod dto;
pub mod encoding;
pub mod error;
pub mod payload;
pub mod reader;
pub mod report;
pub mod session;
pub mod visibility;

pub use asset::{AssetEncryptionService, AssetFile, AssetManifest, AssetVersionName, EncryptedAsset, Recipient};
pub use config::{ServerKeyBundle, ShareConfig};
pub use error::{ShareError, ShareResult};
pub use payload::{ProtocolSalt, ProtocolVersion, ShareablePayload};
pub use reader::{AssetReader, CancellationFlag, HandleRegistry, PlaintextHandle, ReadOutcome};
pub use report::{BatchReport, UnitFailure, UnitId};
pub use session::{OwnerIdentity, SessionContext};
pub use visibility::{Visibility, VisibilityService};

/// ALFA Media Share version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// ALFA Media Share signature
pub const SIGNATURE: &str = "ALFA_MEDIA_SHARE_v1";
