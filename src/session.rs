//! ALFA Media Share - Session Context
//!
//! Everything a client needs for one logged-in session: the owner's key pairs
//! (supplied by the login handshake), the server key and the protocol salt.
//! Callers own the context and share it by `Arc`; nothing here is global.

use std::path::Path;

use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use zeroize::{Zeroize, Zeroizing};

use crate::config::{ServerKeyBundle, ShareConfig};
use crate::crypto::{fingerprint, AgreementKeyPair, ImportedPublicKey, SigningKeyPair};
use crate::error::ShareResult;
use crate::payload::{self, ProtocolSalt, ProtocolVersion, ShareablePayload};

/// Per-session key material and protocol parameters
pub struct SessionContext {
    id: Uuid,
    opened_at: DateTime<Utc>,
    owner_agreement: AgreementKeyPair,
    owner_signing: SigningKeyPair,
    server_public_key: ImportedPublicKey,
    salt: ProtocolSalt,
    protocol_version: ProtocolVersion,
    min_protocol_version: ProtocolVersion,
}

impl SessionContext {
    /// Open a session from the owner's keys and the server's key bundle
    pub fn open(
        owner_agreement: AgreementKeyPair,
        owner_signing: SigningKeyPair,
        bundle: &ServerKeyBundle,
        config: &ShareConfig,
    ) -> ShareResult<Self> {
        config.validate()?;
        let (server_public_key, salt) = bundle.import()?;
        Ok(Self::new(owner_agreement, owner_signing, server_public_key, salt, config))
    }

    /// Assemble a session from already-validated parts
    pub fn new(
        owner_agreement: AgreementKeyPair,
        owner_signing: SigningKeyPair,
        server_public_key: ImportedPublicKey,
        salt: ProtocolSalt,
        config: &ShareConfig,
    ) -> Self {
        let session = Self {
            id: Uuid::new_v4(),
            opened_at: Utc::now(),
            owner_agreement,
            owner_signing,
            server_public_key,
            salt,
            protocol_version: config.protocol_version,
            min_protocol_version: config.min_protocol_version,
        };

        info!(
            "Session {} opened (owner {}, server {}, {})",
            session.id,
            fingerprint(session.owner_agreement.public_raw()),
            fingerprint(session.server_public_key.raw()),
            session.protocol_version
        );

        session
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn opened_at(&self) -> DateTime<Utc> {
        self.opened_at
    }

    pub fn owner_agreement(&self) -> &AgreementKeyPair {
        &self.owner_agreement
    }

    pub fn owner_signing(&self) -> &SigningKeyPair {
        &self.owner_signing
    }

    pub fn server_public_key(&self) -> &ImportedPublicKey {
        &self.server_public_key
    }

    pub fn salt(&self) -> &ProtocolSalt {
        &self.salt
    }

    pub fn protocol_version(&self) -> ProtocolVersion {
        self.protocol_version
    }

    pub fn min_protocol_version(&self) -> ProtocolVersion {
        self.min_protocol_version
    }

    /// Wrap data as the owner for `receiver_public_key`
    pub fn wrap_for(&self, data: &[u8], receiver_public_key: &[u8]) -> ShareResult<ShareablePayload> {
        payload::wrap_versioned(
            data,
            receiver_public_key,
            &self.owner_signing,
            &self.salt,
            self.protocol_version,
        )
    }

    /// Unwrap a payload signed by the owner, addressed to `receiver`
    pub fn unwrap_as(
        &self,
        wrapped: &ShareablePayload,
        receiver: &AgreementKeyPair,
    ) -> ShareResult<Zeroizing<Vec<u8>>> {
        payload::unwrap_with_minimum(
            wrapped,
            receiver,
            self.owner_signing.public_raw(),
            &self.salt,
            self.min_protocol_version,
        )
    }

    /// End the session; key material is zeroized as it drops
    pub fn close(self) {
        info!("Session {} closed", self.id);
    }
}

/// Owner key material as stored by `alfa-share keygen`
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerIdentity {
    pub created_at: DateTime<Utc>,
    #[serde(with = "crate::encoding::base64_bytes")]
    pub agreement_private_key: Vec<u8>,
    #[serde(with = "crate::encoding::base64_bytes")]
    pub signing_private_key: Vec<u8>,
    #[serde(with = "crate::encoding::base64_bytes")]
    pub agreement_public_key: Vec<u8>,
    #[serde(with = "crate::encoding::base64_bytes")]
    pub public_signature: Vec<u8>,
}

impl OwnerIdentity {
    /// Generate fresh agreement and signing key pairs
    pub fn generate() -> Self {
        let agreement = AgreementKeyPair::generate();
        let signing = SigningKeyPair::generate();
        Self {
            created_at: Utc::now(),
            agreement_private_key: agreement.secret_bytes().to_vec(),
            signing_private_key: signing.secret_bytes().to_vec(),
            agreement_public_key: agreement.public_raw().to_vec(),
            public_signature: signing.public_raw().to_vec(),
        }
    }

    /// Rebuild the key pairs
    pub fn key_pairs(&self) -> ShareResult<(AgreementKeyPair, SigningKeyPair)> {
        let agreement = AgreementKeyPair::from_secret_bytes(&self.agreement_private_key)?;
        let signing = SigningKeyPair::from_secret_bytes(&self.signing_private_key)?;
        Ok((agreement, signing))
    }

    pub fn load<P: AsRef<Path>>(path: P) -> ShareResult<Self> {
        let data = Zeroizing::new(std::fs::read(path.as_ref())?);
        Ok(serde_json::from_slice(&data)?)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> ShareResult<()> {
        let data = Zeroizing::new(serde_json::to_vec_pretty(self)?);
        std::fs::write(path.as_ref(), &*data)?;
        Ok(())
    }
}

impl Drop for OwnerIdentity {
    fn drop(&mut self) {
        self.agreement_private_key.zeroize();
        self.signing_private_key.zeroize();
    }
}
