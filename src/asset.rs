//! ALFA Media Share - Asset Encryption
//!
//! Upload-time encryption. Each asset version gets its own content key; the
//! bytes are sealed once and the key is wrapped twice:
//!
//! ```text
//! version bytes ──AES-256-GCM(content key)──► encrypted body (object storage)
//! content key ──wrap(owner)──► selfEncryption
//! content key ──wrap(server)─► serverEncryption
//! ```

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::ShareConfig;
use crate::crypto::{aead, ContentKey};
use crate::dto::AssetVersionInputDTO;
use crate::error::{ShareError, ShareResult};
use crate::payload::ShareablePayload;
use crate::report::{run_bounded, BatchReport, UnitId};
use crate::session::SessionContext;

/// Named rendition of an asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetVersionName {
    Thumbnail,
    /// Low-resolution preview
    Preview,
    /// Full resolution
    Original,
}

impl AssetVersionName {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Thumbnail => "thumbnail",
            Self::Preview => "preview",
            Self::Original => "original",
        }
    }
}

impl fmt::Display for AssetVersionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Plaintext rendition supplied by the upload UI
pub struct AssetVersionSource {
    pub name: AssetVersionName,
    pub bytes: Vec<u8>,
}

/// Plaintext asset with its renditions
pub struct AssetFile {
    pub id: Uuid,
    pub versions: Vec<AssetVersionSource>,
}

impl AssetFile {
    /// New asset with a random global identifier
    pub fn new() -> Self {
        Self::with_id(Uuid::new_v4())
    }

    pub fn with_id(id: Uuid) -> Self {
        Self {
            id,
            versions: Vec::new(),
        }
    }

    /// Add a rendition
    pub fn version(mut self, name: AssetVersionName, bytes: Vec<u8>) -> Self {
        self.versions.push(AssetVersionSource { name, bytes });
        self
    }

    pub fn version_names(&self) -> Vec<AssetVersionName> {
        self.versions.iter().map(|v| v.name).collect()
    }
}

impl Default for AssetFile {
    fn default() -> Self {
        Self::new()
    }
}

/// Which party a wrap is addressed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Recipient {
    Owner,
    Server,
}

/// Sealed rendition with its two key wraps
#[derive(Debug, Clone)]
pub struct EncryptedAssetVersion {
    pub version_name: AssetVersionName,
    /// `IV ‖ ciphertext ‖ tag`, uploaded as an opaque octet stream
    pub encrypted_bytes: Vec<u8>,
    pub self_encryption: ShareablePayload,
    pub server_encryption: ShareablePayload,
}

impl EncryptedAssetVersion {
    pub fn wrap_for(&self, recipient: Recipient) -> &ShareablePayload {
        match recipient {
            Recipient::Owner => &self.self_encryption,
            Recipient::Server => &self.server_encryption,
        }
    }
}

/// An asset whose renditions have been sealed
#[derive(Debug, Clone)]
pub struct EncryptedAsset {
    pub id: Uuid,
    pub versions: Vec<EncryptedAssetVersion>,
}

impl EncryptedAsset {
    pub fn version(&self, name: AssetVersionName) -> ShareResult<&EncryptedAssetVersion> {
        self.versions
            .iter()
            .find(|v| v.version_name == name)
            .ok_or_else(|| ShareError::VersionNotFound(format!("{}/{}", self.id, name)))
    }

    /// Upload DTOs for one recipient, one per version
    pub fn input_dtos(&self, recipient: Recipient) -> Vec<AssetVersionInputDTO> {
        self.versions
            .iter()
            .map(|v| AssetVersionInputDTO::from_payload(v.version_name, v.wrap_for(recipient)))
            .collect()
    }

    /// Key-only view persisted next to the encrypted bodies
    pub fn manifest(&self) -> AssetManifest {
        AssetManifest {
            asset_global_identifier: self.id,
            versions: self
                .versions
                .iter()
                .map(|v| VersionKeys {
                    version_name: v.version_name,
                    encrypted_size: v.encrypted_bytes.len() as u64,
                    self_encryption: v.self_encryption.clone(),
                    server_encryption: Some(v.server_encryption.clone()),
                })
                .collect(),
        }
    }
}

/// Wraps of one version, without the body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionKeys {
    pub version_name: AssetVersionName,
    pub encrypted_size: u64,
    pub self_encryption: ShareablePayload,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_encryption: Option<ShareablePayload>,
}

/// Wraps of every version of one asset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetManifest {
    pub asset_global_identifier: Uuid,
    pub versions: Vec<VersionKeys>,
}

impl AssetManifest {
    pub fn version(&self, name: AssetVersionName) -> ShareResult<&VersionKeys> {
        self.versions
            .iter()
            .find(|v| v.version_name == name)
            .ok_or_else(|| ShareError::VersionNotFound(format!("{}/{}", self.asset_global_identifier, name)))
    }
}

/// Seal one rendition and wrap its content key for owner and server
pub fn encrypt_version(
    session: &SessionContext,
    version_name: AssetVersionName,
    bytes: &[u8],
) -> ShareResult<EncryptedAssetVersion> {
    let content_key = ContentKey::generate();
    let encrypted_bytes = aead::encrypt(bytes, content_key.expose())?;

    let owner_public = *session.owner_agreement().public_raw();
    let self_encryption = session.wrap_for(content_key.expose(), &owner_public)?;
    let server_encryption = session.wrap_for(content_key.expose(), session.server_public_key().raw())?;

    debug!(
        "Sealed {} ({} -> {} bytes)",
        version_name,
        bytes.len(),
        encrypted_bytes.len()
    );

    Ok(EncryptedAssetVersion {
        version_name,
        encrypted_bytes,
        self_encryption,
        server_encryption,
    })
}

/// Upload-time encryption service
pub struct AssetEncryptionService {
    session: Arc<SessionContext>,
    max_concurrency: usize,
    version_names: Vec<AssetVersionName>,
}

impl AssetEncryptionService {
    pub fn new(session: Arc<SessionContext>, config: &ShareConfig) -> Self {
        Self {
            session,
            max_concurrency: config.max_concurrency,
            version_names: config.version_names.clone(),
        }
    }

    /// Encrypt every configured version of one asset
    pub async fn encrypt_asset(&self, file: AssetFile) -> BatchReport<EncryptedAssetVersion> {
        let id = file.id;
        let report = self.encrypt_files(vec![file]).await;

        let mut out = BatchReport {
            succeeded: Vec::new(),
            failed: report.failed,
        };
        for asset in report.succeeded {
            debug_assert_eq!(asset.id, id);
            out.succeeded.extend(asset.versions);
        }
        out
    }

    /// Encrypt many assets, versions running concurrently up to the configured bound
    pub async fn encrypt_files(&self, files: Vec<AssetFile>) -> BatchReport<EncryptedAsset> {
        let mut report = BatchReport::default();
        let mut jobs = Vec::new();
        let mut order = Vec::new();

        for file in files {
            order.push(file.id);

            for name in &self.version_names {
                if !file.versions.iter().any(|v| v.name == *name) {
                    let unit = UnitId {
                        asset_id: file.id,
                        version_name: *name,
                    };
                    report.push_failure(unit, ShareError::VersionNotFound(unit.to_string()));
                }
            }

            let mut seen = HashSet::new();
            for source in file.versions {
                if !self.version_names.contains(&source.name) {
                    warn!("Skipping unconfigured version {}/{}", file.id, source.name);
                    continue;
                }
                let unit = UnitId {
                    asset_id: file.id,
                    version_name: source.name,
                };
                // First copy wins
                if !seen.insert(source.name) {
                    report.push_failure(unit, ShareError::DuplicateVersion(unit.to_string()));
                    continue;
                }
                let session = self.session.clone();
                jobs.push((unit, move || {
                    encrypt_version(&session, source.name, &source.bytes).map(|v| (unit.asset_id, v))
                }));
            }
        }

        let sealed = run_bounded(jobs, self.max_concurrency).await;
        report.failed.extend(sealed.failed);

        let mut by_asset: HashMap<Uuid, Vec<EncryptedAssetVersion>> = HashMap::new();
        for (asset_id, version) in sealed.succeeded {
            by_asset.entry(asset_id).or_default().push(version);
        }

        for id in order {
            if let Some(mut versions) = by_asset.remove(&id) {
                versions.sort_by_key(|v| v.version_name);
                report.succeeded.push(EncryptedAsset { id, versions });
            }
        }

        info!(
            "Encrypted {} assets, {} version failures",
            report.succeeded.len(),
            report.failed.len()
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload;
    use crate::session::tests::session_with_server;

    #[test]
    fn test_both_wraps_hold_same_content_key() {
        let (session, server) = session_with_server(&ShareConfig::default());
        let photo = b"FAKE JPEG DATA 1234567890".to_vec();

        let version = encrypt_version(&session, AssetVersionName::Original, &photo).unwrap();

        let owner_key = session.unwrap_as(&version.self_encryption, session.owner_agreement()).unwrap();
        let server_key = session.unwrap_as(&version.server_encryption, &server).unwrap();
        assert_eq!(owner_key.as_slice(), server_key.as_slice());

        assert_ne!(version.self_encryption, version.server_encryption);
        assert_ne!(version.self_encryption.ciphertext, version.server_encryption.ciphertext);
        assert_ne!(version.self_encryption.signature, version.server_encryption.signature);
        assert_ne!(
            version.self_encryption.ephemeral_public_key,
            version.server_encryption.ephemeral_public_key
        );

        let key = ContentKey::from_slice(&owner_key).unwrap();
        assert_eq!(aead::decrypt(&version.encrypted_bytes, key.expose()).unwrap(), photo);
    }

    #[test]
    fn test_wraps_are_not_interchangeable() {
        let (session, server) = session_with_server(&ShareConfig::default());
        let version = encrypt_version(&session, AssetVersionName::Preview, b"preview").unwrap();

        let result = payload::unwrap(
            &version.self_encryption,
            &server,
            session.owner_signing().public_raw(),
            session.salt(),
        );
        assert!(matches!(result, Err(ShareError::SignatureVerification)));
    }

    #[tokio::test]
    async fn test_encrypt_asset_all_versions() {
        let (session, _server) = session_with_server(&ShareConfig::default());
        let service = AssetEncryptionService::new(Arc::new(session), &ShareConfig::default());

        let file = AssetFile::new()
            .version(AssetVersionName::Original, vec![1u8; 4096])
            .version(AssetVersionName::Preview, vec![2u8; 512]);

        let report = service.encrypt_asset(file).await;
        assert!(report.is_complete());
        assert_eq!(report.succeeded.len(), 2);
        assert_eq!(report.succeeded[0].version_name, AssetVersionName::Preview);
        assert_eq!(report.succeeded[1].encrypted_bytes.len(), 4096 + aead::OVERHEAD);
    }

    #[tokio::test]
    async fn test_missing_version_reported_per_unit() {
        let (session, _server) = session_with_server(&ShareConfig::default());
        let service = AssetEncryptionService::new(Arc::new(session), &ShareConfig::default());

        let file = AssetFile::new().version(AssetVersionName::Original, vec![1u8; 64]);
        let id = file.id;

        let report = service.encrypt_asset(file).await;
        assert_eq!(report.succeeded.len(), 1);
        assert_eq!(
            report.retry_units(),
            vec![UnitId {
                asset_id: id,
                version_name: AssetVersionName::Preview
            }]
        );
    }

    #[tokio::test]
    async fn test_repeated_version_name_rejected() {
        let (session, _server) = session_with_server(&ShareConfig::default());
        let service = AssetEncryptionService::new(Arc::new(session), &ShareConfig::default());

        let file = AssetFile::new()
            .version(AssetVersionName::Original, vec![1u8; 64])
            .version(AssetVersionName::Original, vec![2u8; 64])
            .version(AssetVersionName::Preview, vec![3u8; 16]);
        let id = file.id;

        let report = service.encrypt_asset(file).await;
        assert_eq!(report.succeeded.len(), 2);
        assert_eq!(
            report.succeeded.iter().map(|v| v.version_name).collect::<Vec<_>>(),
            vec![AssetVersionName::Preview, AssetVersionName::Original]
        );
        assert_eq!(report.failed.len(), 1);
        assert!(matches!(report.failed[0].error, ShareError::DuplicateVersion(_)));
        assert_eq!(
            report.failed[0].unit,
            UnitId {
                asset_id: id,
                version_name: AssetVersionName::Original
            }
        );

        let session = &service.session;
        let original = &report.succeeded[1];
        let key = session.unwrap_as(&original.self_encryption, session.owner_agreement()).unwrap();
        let key = ContentKey::from_slice(&key).unwrap();
        assert_eq!(aead::decrypt(&original.encrypted_bytes, key.expose()).unwrap(), vec![1u8; 64]);
    }

    #[tokio::test]
    async fn test_encrypt_many_files_bounded() {
        let config = ShareConfig {
            max_concurrency: 2,
            ..Default::default()
        };
        let (session, _server) = session_with_server(&config);
        let service = AssetEncryptionService::new(Arc::new(session), &config);

        let files: Vec<AssetFile> = (0..5)
            .map(|i| {
                AssetFile::new()
                    .version(AssetVersionName::Original, vec![i as u8; 256])
                    .version(AssetVersionName::Preview, vec![i as u8; 32])
            })
            .collect();
        let ids: Vec<Uuid> = files.iter().map(|f| f.id).collect();

        let report = service.encrypt_files(files).await;
        assert!(report.is_complete());
        assert_eq!(report.succeeded.iter().map(|a| a.id).collect::<Vec<_>>(), ids);
        assert!(report.succeeded.iter().all(|a| a.versions.len() == 2));
    }

    #[test]
    fn test_manifest_and_dtos() {
        let (session, _server) = session_with_server(&ShareConfig::default());
        let asset = EncryptedAsset {
            id: Uuid::new_v4(),
            versions: vec![encrypt_version(&session, AssetVersionName::Original, b"data").unwrap()],
        };

        let manifest = asset.manifest();
        let version = manifest.version(AssetVersionName::Original).unwrap();
        assert_eq!(version.encrypted_size, (4 + aead::OVERHEAD) as u64);
        assert!(manifest.version(AssetVersionName::Thumbnail).is_err());

        let dtos = asset.input_dtos(Recipient::Server);
        assert_eq!(dtos.len(), 1);
        assert_eq!(dtos[0].to_payload().unwrap(), asset.versions[0].server_encryption);
    }
}
