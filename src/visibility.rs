//! ALFA Media Share - Visibility Re-Encryption
//!
//! When a collection leaves `Private`, the server needs to decrypt its assets.
//! Each version's content key is recovered from the owner's own wrap and
//! re-wrapped for the server. Encrypted bodies are never read or rewritten,
//! so the cost depends only on the number of versions.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use log::info;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::asset::AssetManifest;
use crate::config::ShareConfig;
use crate::dto::{AssetDecryptionDetailsDTO, AssetVersionInputDTO, CollectionChangeVisibilityDTO};
use crate::error::ShareResult;
use crate::payload::ShareablePayload;
use crate::reader::recover_content_key_with_minimum;
use crate::report::{run_bounded, BatchReport, UnitFailure, UnitId};
use crate::session::SessionContext;

/// Access-policy tier of a collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Visibility {
    /// Owner only
    Private,
    /// Owner and server custodian
    Confidential,
    /// Served to anyone through the server
    Public,
}

impl Visibility {
    /// Whether the server must be able to decrypt
    pub fn requires_server_access(&self) -> bool {
        !matches!(self, Visibility::Private)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Private => "private",
            Visibility::Confidential => "confidential",
            Visibility::Public => "public",
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The owner's wrap of one stored version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetKeyRecord {
    pub unit: UnitId,
    pub self_encryption: ShareablePayload,
}

impl AssetManifest {
    /// Owner wraps of every version
    pub fn key_records(&self) -> Vec<AssetKeyRecord> {
        self.versions
            .iter()
            .map(|v| AssetKeyRecord {
                unit: UnitId {
                    asset_id: self.asset_global_identifier,
                    version_name: v.version_name,
                },
                self_encryption: v.self_encryption.clone(),
            })
            .collect()
    }

    /// Store new server wraps for matching versions; returns how many applied
    pub fn apply_server_wraps(&mut self, wraps: &[ServerWrap]) -> usize {
        let mut applied = 0;
        for wrap in wraps.iter().filter(|w| w.unit.asset_id == self.asset_global_identifier) {
            if let Some(version) = self
                .versions
                .iter_mut()
                .find(|v| v.version_name == wrap.unit.version_name)
            {
                version.server_encryption = Some(wrap.payload.clone());
                applied += 1;
            }
        }
        applied
    }
}

/// Freshly created server wrap for one version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerWrap {
    pub unit: UnitId,
    pub payload: ShareablePayload,
}

/// Result of a visibility change: the request body plus units to retry
#[derive(Debug)]
pub struct VisibilityChange {
    pub dto: CollectionChangeVisibilityDTO,
    pub wraps: Vec<ServerWrap>,
    pub failed: Vec<UnitFailure>,
}

impl VisibilityChange {
    /// Store the new server wraps in local manifests; returns how many applied
    pub fn apply_to(&self, manifests: &mut [AssetManifest]) -> usize {
        manifests.iter_mut().map(|m| m.apply_server_wraps(&self.wraps)).sum()
    }
}

/// Recover a version's content key as owner and wrap it for the server
pub fn rewrap_for_server(session: &SessionContext, record: &AssetKeyRecord) -> ShareResult<ServerWrap> {
    let content_key = recover_content_key_with_minimum(
        &record.self_encryption,
        session.owner_agreement(),
        session.owner_signing().public_raw(),
        session.salt(),
        session.min_protocol_version(),
    )?;
    let payload = session.wrap_for(content_key.expose(), session.server_public_key().raw())?;

    Ok(ServerWrap {
        unit: record.unit,
        payload,
    })
}

/// Group server wraps into the change-visibility request body
pub fn build_change_visibility(
    visibility: Visibility,
    wraps: &[ServerWrap],
    delete_orphaned_versions: bool,
) -> CollectionChangeVisibilityDTO {
    let mut by_asset: BTreeMap<Uuid, Vec<&ServerWrap>> = BTreeMap::new();
    for wrap in wraps {
        by_asset.entry(wrap.unit.asset_id).or_default().push(wrap);
    }

    let asset_decryption_details = by_asset
        .into_iter()
        .map(|(asset_global_identifier, mut wraps)| {
            wraps.sort_by_key(|w| w.unit.version_name);
            AssetDecryptionDetailsDTO {
                asset_global_identifier,
                version_decryption_details: wraps
                    .into_iter()
                    .map(|w| AssetVersionInputDTO::from_payload(w.unit.version_name, &w.payload))
                    .collect(),
            }
        })
        .collect();

    CollectionChangeVisibilityDTO {
        visibility,
        asset_decryption_details,
        delete_orphaned_versions,
    }
}

/// Access-policy change service
pub struct VisibilityService {
    session: Arc<SessionContext>,
    max_concurrency: usize,
}

impl VisibilityService {
    pub fn new(session: Arc<SessionContext>, config: &ShareConfig) -> Self {
        Self {
            session,
            max_concurrency: config.max_concurrency,
        }
    }

    /// Re-wrap every record for the server; failures are reported per version
    pub async fn grant_server_access(&self, records: Vec<AssetKeyRecord>) -> BatchReport<ServerWrap> {
        let jobs = records
            .into_iter()
            .map(|record| {
                let session = self.session.clone();
                (record.unit, move || rewrap_for_server(&session, &record))
            })
            .collect();

        let report = run_bounded(jobs, self.max_concurrency).await;
        info!(
            "Granted server access to {}/{} versions",
            report.succeeded.len(),
            report.total()
        );
        report
    }

    /// Move a collection to `target`, producing the request body for the server
    pub async fn change_visibility(
        &self,
        manifests: &[AssetManifest],
        target: Visibility,
        delete_orphaned_versions: bool,
    ) -> VisibilityChange {
        if !target.requires_server_access() {
            return VisibilityChange {
                dto: build_change_visibility(target, &[], delete_orphaned_versions),
                wraps: Vec::new(),
                failed: Vec::new(),
            };
        }

        let records = manifests.iter().flat_map(|m| m.key_records()).collect();
        let report = self.grant_server_access(records).await;

        VisibilityChange {
            dto: build_change_visibility(target, &report.succeeded, delete_orphaned_versions),
            wraps: report.succeeded,
            failed: report.failed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::{encrypt_version, AssetVersionName, EncryptedAsset};
    use crate::crypto::{aead, ContentKey};
    use crate::error::ShareError;
    use crate::session::tests::session_with_server;

    fn sealed_asset(session: &SessionContext) -> EncryptedAsset {
        EncryptedAsset {
            id: Uuid::new_v4(),
            versions: vec![
                encrypt_version(session, AssetVersionName::Preview, b"small preview").unwrap(),
                encrypt_version(session, AssetVersionName::Original, &[7u8; 2048]).unwrap(),
            ],
        }
    }

    #[test]
    fn test_visibility_tiers() {
        assert!(!Visibility::Private.requires_server_access());
        assert!(Visibility::Confidential.requires_server_access());
        assert!(Visibility::Public.requires_server_access());
    }

    #[tokio::test]
    async fn test_rewrap_twice_is_non_interfering() {
        let config = ShareConfig::default();
        let (session, server) = session_with_server(&config);
        let session = Arc::new(session);
        let asset = sealed_asset(&session);
        let before = asset.clone();
        let records = asset.manifest().key_records();

        let service = VisibilityService::new(session.clone(), &config);
        let first = service.grant_server_access(records.clone()).await;
        let second = service.grant_server_access(records.clone()).await;
        assert!(first.is_complete() && second.is_complete());

        for version in &asset.versions {
            let owner_key = session.unwrap_as(&version.self_encryption, session.owner_agreement()).unwrap();

            let pick = |report: &BatchReport<ServerWrap>| {
                report
                    .succeeded
                    .iter()
                    .find(|w| w.unit.version_name == version.version_name)
                    .unwrap()
                    .payload
                    .clone()
            };
            let (a, b) = (pick(&first), pick(&second));
            assert_ne!(a, b);

            let key_a = session.unwrap_as(&a, &server).unwrap();
            let key_b = session.unwrap_as(&b, &server).unwrap();
            assert_eq!(key_a.as_slice(), owner_key.as_slice());
            assert_eq!(key_b.as_slice(), owner_key.as_slice());

            let key = ContentKey::from_slice(&key_a).unwrap();
            assert!(aead::decrypt(&version.encrypted_bytes, key.expose()).is_ok());
        }

        assert_eq!(asset.versions.len(), before.versions.len());
        for (now, then) in asset.versions.iter().zip(&before.versions) {
            assert_eq!(now.encrypted_bytes, then.encrypted_bytes);
            assert_eq!(now.self_encryption, then.self_encryption);
        }
        assert_eq!(asset.manifest().key_records(), records);
    }

    #[tokio::test]
    async fn test_one_bad_version_does_not_abort_others() {
        let config = ShareConfig::default();
        let (session, _server) = session_with_server(&config);
        let session = Arc::new(session);

        let mut manifest = sealed_asset(&session).manifest();
        manifest.versions[0].self_encryption.ciphertext[0] ^= 0x01;
        let broken = UnitId {
            asset_id: manifest.asset_global_identifier,
            version_name: manifest.versions[0].version_name,
        };

        let service = VisibilityService::new(session, &config);
        let change = service
            .change_visibility(&[manifest.clone()], Visibility::Public, false)
            .await;

        assert_eq!(change.failed.len(), 1);
        assert_eq!(change.failed[0].unit, broken);
        assert!(matches!(change.failed[0].error, ShareError::SignatureVerification));

        let details = &change.dto.asset_decryption_details;
        assert_eq!(details.len(), 1);
        assert_eq!(details[0].version_decryption_details.len(), 1);
        assert_eq!(
            details[0].version_decryption_details[0].version_name,
            AssetVersionName::Original
        );
    }

    #[tokio::test]
    async fn test_private_needs_no_wraps() {
        let config = ShareConfig::default();
        let (session, _server) = session_with_server(&config);
        let session = Arc::new(session);
        let manifest = sealed_asset(&session).manifest();

        let service = VisibilityService::new(session, &config);
        let change = service.change_visibility(&[manifest], Visibility::Private, true).await;

        assert!(change.failed.is_empty());
        assert!(change.dto.asset_decryption_details.is_empty());
        assert!(change.dto.delete_orphaned_versions);
    }

    #[tokio::test]
    async fn test_change_updates_local_manifests() {
        let config = ShareConfig::default();
        let (session, server) = session_with_server(&config);
        let session = Arc::new(session);

        let mut manifests = vec![sealed_asset(&session).manifest(), sealed_asset(&session).manifest()];
        let before = manifests.clone();
        manifests[1].versions[1].self_encryption.signature[0] ^= 0x01;

        let service = VisibilityService::new(session.clone(), &config);
        let change = service.change_visibility(&manifests, Visibility::Confidential, false).await;
        assert_eq!(change.wraps.len(), 3);
        assert_eq!(change.failed.len(), 1);

        assert_eq!(change.apply_to(&mut manifests), 3);
        assert_ne!(manifests[0].versions[0].server_encryption, before[0].versions[0].server_encryption);
        assert_eq!(manifests[1].versions[1].server_encryption, before[1].versions[1].server_encryption);

        for manifest in &manifests {
            for version in &manifest.versions {
                let wrap = version.server_encryption.as_ref().unwrap();
                assert!(session.unwrap_as(wrap, &server).is_ok());
            }
        }
    }

    #[tokio::test]
    async fn test_apply_server_wraps_to_manifest() {
        let config = ShareConfig::default();
        let (session, server) = session_with_server(&config);
        let session = Arc::new(session);

        let mut manifest = sealed_asset(&session).manifest();
        for version in manifest.versions.iter_mut() {
            version.server_encryption = None;
        }

        let service = VisibilityService::new(session.clone(), &config);
        let report = service.grant_server_access(manifest.key_records()).await;
        assert_eq!(manifest.apply_server_wraps(&report.succeeded), 2);

        for version in &manifest.versions {
            let wrap = version.server_encryption.as_ref().unwrap();
            assert!(session.unwrap_as(wrap, &server).is_ok());
        }
    }
}
