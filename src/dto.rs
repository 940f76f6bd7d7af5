//! Wire DTOs exchanged with the server.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::asset::AssetVersionName;
use crate::error::{ShareError, ShareResult};
use crate::payload::{ProtocolVersion, ShareablePayload};
use crate::visibility::Visibility;

/// One wrapped content key for one (version × recipient)
///
/// `publicSignature` carries the payload's ECDSA signature; the sender's
/// public signature key is known to the server from the account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetVersionInputDTO {
    pub version_name: AssetVersionName,
    #[serde(with = "crate::encoding::base64_bytes")]
    pub sender_encrypted_secret: Vec<u8>,
    #[serde(with = "crate::encoding::base64_bytes")]
    pub ephemeral_public_key: Vec<u8>,
    #[serde(with = "crate::encoding::base64_bytes")]
    pub public_signature: Vec<u8>,
    #[serde(default, skip_serializing_if = "ProtocolVersion::is_v1")]
    pub protocol_version: ProtocolVersion,
}

impl AssetVersionInputDTO {
    pub fn from_payload(version_name: AssetVersionName, payload: &ShareablePayload) -> Self {
        Self {
            version_name,
            sender_encrypted_secret: payload.ciphertext.clone(),
            ephemeral_public_key: payload.ephemeral_public_key.clone(),
            public_signature: payload.signature.clone(),
            protocol_version: payload.version,
        }
    }

    pub fn to_payload(&self) -> ShareResult<ShareablePayload> {
        if self.sender_encrypted_secret.is_empty()
            || self.ephemeral_public_key.is_empty()
            || self.public_signature.is_empty()
        {
            return Err(ShareError::SerializationError(format!(
                "incomplete wrap for version {}",
                self.version_name
            )));
        }
        Ok(ShareablePayload {
            ephemeral_public_key: self.ephemeral_public_key.clone(),
            ciphertext: self.sender_encrypted_secret.clone(),
            signature: self.public_signature.clone(),
            version: self.protocol_version,
        })
    }
}

/// New wraps for every version of one asset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetDecryptionDetailsDTO {
    pub asset_global_identifier: Uuid,
    pub version_decryption_details: Vec<AssetVersionInputDTO>,
}

/// Body of a collection visibility change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionChangeVisibilityDTO {
    pub visibility: Visibility,
    pub asset_decryption_details: Vec<AssetDecryptionDetailsDTO>,
    pub delete_orphaned_versions: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_payload() -> ShareablePayload {
        ShareablePayload {
            ephemeral_public_key: vec![4u8; 65],
            ciphertext: vec![1u8; 60],
            signature: vec![2u8; 64],
            version: ProtocolVersion::V1,
        }
    }

    #[test]
    fn test_input_dto_field_names() {
        let dto = AssetVersionInputDTO::from_payload(AssetVersionName::Preview, &sample_payload());
        let json = serde_json::to_value(&dto).unwrap();

        assert_eq!(json["versionName"], "preview");
        assert!(json["senderEncryptedSecret"].is_string());
        assert!(json["ephemeralPublicKey"].is_string());
        assert!(json["publicSignature"].is_string());
        assert!(json.get("protocolVersion").is_none());

        assert_eq!(dto.to_payload().unwrap(), sample_payload());
    }

    #[test]
    fn test_change_visibility_shape() {
        let dto = CollectionChangeVisibilityDTO {
            visibility: Visibility::Confidential,
            asset_decryption_details: vec![AssetDecryptionDetailsDTO {
                asset_global_identifier: Uuid::nil(),
                version_decryption_details: vec![AssetVersionInputDTO::from_payload(
                    AssetVersionName::Original,
                    &sample_payload(),
                )],
            }],
            delete_orphaned_versions: true,
        };

        let json = serde_json::to_value(&dto).unwrap();
        assert_eq!(json["visibility"], "CONFIDENTIAL");
        assert_eq!(json["deleteOrphanedVersions"], true);
        assert_eq!(
            json["assetDecryptionDetails"][0]["assetGlobalIdentifier"],
            "00000000-0000-0000-0000-000000000000"
        );
        assert_eq!(
            json["assetDecryptionDetails"][0]["versionDecryptionDetails"][0]["versionName"],
            "original"
        );

        let parsed: CollectionChangeVisibilityDTO = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, dto);
    }
}
