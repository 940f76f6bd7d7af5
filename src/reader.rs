//! ALFA Media Share - Decryption at Read Time
//!
//! A viewer holding either the owner's or the server's agreement key recovers
//! the content key from its own wrap, then opens the encrypted body. Decrypted
//! bytes live in a [`PlaintextHandle`] that is zeroized and unregistered
//! exactly once, whether the read completes, fails or is cancelled.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, warn};
use parking_lot::Mutex;
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::asset::{AssetManifest, AssetVersionName, Recipient, VersionKeys};
use crate::crypto::{aead, AgreementKeyPair, ContentKey};
use crate::error::{ShareError, ShareResult};
use crate::payload::{self, ProtocolSalt, ProtocolVersion, ShareablePayload};
use crate::session::SessionContext;

/// Recover a content key from a wrap addressed to `viewer`
pub fn recover_content_key(
    wrapped: &ShareablePayload,
    viewer: &AgreementKeyPair,
    sender_public_signature: &[u8],
    salt: &ProtocolSalt,
) -> ShareResult<ContentKey> {
    recover_content_key_with_minimum(wrapped, viewer, sender_public_signature, salt, ProtocolVersion::V1)
}

/// As [`recover_content_key`], rejecting wraps older than `minimum`
pub fn recover_content_key_with_minimum(
    wrapped: &ShareablePayload,
    viewer: &AgreementKeyPair,
    sender_public_signature: &[u8],
    salt: &ProtocolSalt,
    minimum: ProtocolVersion,
) -> ShareResult<ContentKey> {
    let data = payload::unwrap_with_minimum(wrapped, viewer, sender_public_signature, salt, minimum)?;
    ContentKey::from_slice(&data)
}

/// Open an encrypted body
pub fn recover_asset(encrypted_bytes: &[u8], content_key: &ContentKey) -> ShareResult<Zeroizing<Vec<u8>>> {
    aead::decrypt(encrypted_bytes, content_key.expose()).map(Zeroizing::new)
}

// ═══════════════════════════════════════════════════════════════
// Cancellation
// ═══════════════════════════════════════════════════════════════

/// Cooperative cancellation shared with the UI resource that owns a read
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// ═══════════════════════════════════════════════════════════════
// Plaintext handles
// ═══════════════════════════════════════════════════════════════

/// Tracks decrypted buffers that are still alive
#[derive(Debug, Default)]
pub struct HandleRegistry {
    live: Mutex<HashSet<Uuid>>,
}

impl HandleRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Take ownership of a decrypted buffer
    pub fn register(self: &Arc<Self>, bytes: Zeroizing<Vec<u8>>) -> PlaintextHandle {
        let id = Uuid::new_v4();
        self.live.lock().insert(id);
        PlaintextHandle {
            id,
            bytes,
            registry: Arc::clone(self),
        }
    }

    /// Number of buffers not yet released
    pub fn live_count(&self) -> usize {
        self.live.lock().len()
    }

    fn unregister(&self, id: Uuid) {
        if !self.live.lock().remove(&id) {
            warn!("Plaintext handle {} released twice", id);
        }
    }
}

/// Decrypted bytes of one version; zeroized when released or dropped
pub struct PlaintextHandle {
    id: Uuid,
    bytes: Zeroizing<Vec<u8>>,
    registry: Arc<HandleRegistry>,
}

impl PlaintextHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Release now instead of at end of scope
    pub fn release(self) {}
}

impl Drop for PlaintextHandle {
    fn drop(&mut self) {
        debug!("Releasing plaintext handle {} ({} bytes)", self.id, self.bytes.len());
        self.registry.unregister(self.id);
    }
}

impl std::fmt::Debug for PlaintextHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaintextHandle")
            .field("id", &self.id)
            .field("len", &self.bytes.len())
            .finish()
    }
}

// ═══════════════════════════════════════════════════════════════
// Reader
// ═══════════════════════════════════════════════════════════════

/// What the UI shows for one version
#[derive(Debug)]
pub enum ReadOutcome {
    Ready(PlaintextHandle),
    Cancelled,
    /// Undecryptable; render a placeholder
    Placeholder(ShareError),
}

impl ReadOutcome {
    pub fn is_ready(&self) -> bool {
        matches!(self, ReadOutcome::Ready(_))
    }
}

/// Read-time decryption for one viewer
pub struct AssetReader {
    session: Arc<SessionContext>,
    viewer: AgreementKeyPair,
    role: Recipient,
    registry: Arc<HandleRegistry>,
}

impl AssetReader {
    /// Reader for the session owner
    pub fn owner(session: Arc<SessionContext>, registry: Arc<HandleRegistry>) -> Self {
        let viewer = session.owner_agreement().clone();
        Self {
            session,
            viewer,
            role: Recipient::Owner,
            registry,
        }
    }

    /// Reader for the server custodian
    pub fn server(session: Arc<SessionContext>, server: AgreementKeyPair, registry: Arc<HandleRegistry>) -> Self {
        Self {
            session,
            viewer: server,
            role: Recipient::Server,
            registry,
        }
    }

    pub fn role(&self) -> Recipient {
        self.role
    }

    pub fn registry(&self) -> &Arc<HandleRegistry> {
        &self.registry
    }

    fn wrap_for_role<'a>(&self, keys: &'a VersionKeys) -> ShareResult<&'a ShareablePayload> {
        match self.role {
            Recipient::Owner => Ok(&keys.self_encryption),
            Recipient::Server => keys
                .server_encryption
                .as_ref()
                .ok_or_else(|| ShareError::VersionNotFound(format!("server wrap for {}", keys.version_name))),
        }
    }

    /// Decrypt one version's body
    pub async fn load_version(
        &self,
        keys: &VersionKeys,
        encrypted_bytes: Vec<u8>,
        cancel: &CancellationFlag,
    ) -> ReadOutcome {
        if cancel.is_cancelled() {
            return ReadOutcome::Cancelled;
        }

        let wrapped = match self.wrap_for_role(keys) {
            Ok(w) => w.clone(),
            Err(e) => return ReadOutcome::Placeholder(e),
        };

        let viewer = self.viewer.clone();
        let sender = *self.session.owner_signing().public_raw();
        let session = self.session.clone();
        let opened = tokio::task::spawn_blocking(move || {
            let content_key = recover_content_key_with_minimum(
                &wrapped,
                &viewer,
                &sender,
                session.salt(),
                session.min_protocol_version(),
            )?;
            recover_asset(&encrypted_bytes, &content_key)
        })
        .await
        .map_err(ShareError::from)
        .and_then(|r| r);

        match opened {
            Ok(bytes) => {
                let handle = self.registry.register(bytes);
                if cancel.is_cancelled() {
                    handle.release();
                    return ReadOutcome::Cancelled;
                }
                ReadOutcome::Ready(handle)
            }
            Err(e) => {
                warn!("Cannot open {} as {:?}: {}", keys.version_name, self.role, e);
                ReadOutcome::Placeholder(e)
            }
        }
    }

    /// Decrypt several versions of one asset; each succeeds or fails on its own
    pub async fn load_versions(
        &self,
        manifest: &AssetManifest,
        bodies: Vec<(AssetVersionName, Vec<u8>)>,
        cancel: &CancellationFlag,
    ) -> Vec<(AssetVersionName, ReadOutcome)> {
        let mut out = Vec::with_capacity(bodies.len());
        for (name, body) in bodies {
            let outcome = match manifest.version(name) {
                Ok(keys) => self.load_version(keys, body, cancel).await,
                Err(e) => ReadOutcome::Placeholder(e),
            };
            out.push((name, outcome));
        }
        out
    }
}
