//! ALFA Media Share - Configuration
//!
//! Service tuning plus the key-distribution bundle handed out by the server.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::asset::AssetVersionName;
use crate::crypto::{EncodedPublicKey, ImportedPublicKey};
use crate::error::{ShareError, ShareResult};
use crate::payload::{ProtocolSalt, ProtocolVersion};

/// Environment override for `max_concurrency`
pub const ENV_MAX_CONCURRENCY: &str = "ALFA_SHARE_MAX_CONCURRENCY";

/// Environment override for `protocol_version`
pub const ENV_PROTOCOL_VERSION: &str = "ALFA_SHARE_PROTOCOL_VERSION";

/// Share service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShareConfig {
    /// Upper bound on versions/files processed at once
    pub max_concurrency: usize,
    /// Signed-data layout used for new wraps
    pub protocol_version: ProtocolVersion,
    /// Oldest layout accepted when unwrapping
    pub min_protocol_version: ProtocolVersion,
    /// Versions produced on upload
    pub version_names: Vec<AssetVersionName>,
}

impl Default for ShareConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 4,
            protocol_version: ProtocolVersion::V1,
            min_protocol_version: ProtocolVersion::V1,
            version_names: vec![AssetVersionName::Preview, AssetVersionName::Original],
        }
    }
}

impl ShareConfig {
    /// Load from a JSON file; missing fields take defaults
    pub fn load<P: AsRef<Path>>(path: P) -> ShareResult<Self> {
        let data = std::fs::read(path.as_ref())?;
        let config: ShareConfig = serde_json::from_slice(&data)
            .map_err(|e| ShareError::ConfigError(format!("{}: {}", path.as_ref().display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from the process environment
    pub fn apply_env(mut self) -> ShareResult<Self> {
        if let Ok(value) = std::env::var(ENV_MAX_CONCURRENCY) {
            self.max_concurrency = value
                .parse()
                .map_err(|_| ShareError::ConfigError(format!("{}={} is not a number", ENV_MAX_CONCURRENCY, value)))?;
        }
        if let Ok(value) = std::env::var(ENV_PROTOCOL_VERSION) {
            let raw: u8 = value
                .parse()
                .map_err(|_| ShareError::ConfigError(format!("{}={} is not a number", ENV_PROTOCOL_VERSION, value)))?;
            self.protocol_version = ProtocolVersion::try_from(raw)?;
        }
        self.validate()?;
        Ok(self)
    }

    /// Reject settings the services cannot run with
    pub fn validate(&self) -> ShareResult<()> {
        if self.max_concurrency == 0 {
            return Err(ShareError::ConfigError("max_concurrency must be at least 1".into()));
        }
        if self.protocol_version < self.min_protocol_version {
            return Err(ShareError::ConfigError(format!(
                "protocol_version {} is below min_protocol_version {}",
                self.protocol_version, self.min_protocol_version
            )));
        }
        if self.version_names.is_empty() {
            return Err(ShareError::ConfigError("version_names is empty".into()));
        }
        Ok(())
    }
}

/// Server public key and protocol salt, as served by key distribution
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerKeyBundle {
    pub public_key: EncodedPublicKey,
    /// Base64 salt shared by the whole deployment
    pub protocol_salt: String,
}

impl ServerKeyBundle {
    /// Load from a JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> ShareResult<Self> {
        let data = std::fs::read(path.as_ref())?;
        Ok(serde_json::from_slice(&data)?)
    }

    /// Validate and import both fields
    pub fn import(&self) -> ShareResult<(ImportedPublicKey, ProtocolSalt)> {
        let key = self.public_key.import()?;
        let salt = ProtocolSalt::from_base64(&self.protocol_salt)?;
        Ok((key, salt))
    }
}
