//! Typed surface of the remote volume API.
//!
//! Lifecycle handlers never hold a concrete HTTP client. They talk to the
//! platform through [`VolumeApi`] and pick the right client through
//! [`ClientResolver`], so tests can drive the whole lifecycle against an
//! in-memory fake (see [`crate::testing`]).

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

/// Lifecycle tag the platform reports for a volume.
///
/// The wire value is a plain lowercase string; tags this provider has no
/// opinion about land in [`VolumeState::Other`] instead of failing
/// deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum VolumeState {
    /// The volume is being provisioned.
    Creating,
    /// The volume is attached and in use.
    Active,
    /// The volume is on its way out of `active`.
    Deactivating,
    /// The volume exists but is not attached.
    Inactive,
    /// The volume has been detached from its host.
    Detached,
    /// A removal request has been accepted and is in flight.
    Removing,
    /// The platform has torn the volume down.
    Removed,
    /// The platform has purged the removed volume's record.
    Purged,
    /// A tag this provider does not know about.
    Other(String),
}

impl VolumeState {
    /// The wire representation of the tag.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Creating => "creating",
            Self::Active => "active",
            Self::Deactivating => "deactivating",
            Self::Inactive => "inactive",
            Self::Detached => "detached",
            Self::Removing => "removing",
            Self::Removed => "removed",
            Self::Purged => "purged",
            Self::Other(tag) => tag,
        }
    }

    /// Whether the tag marks a volume the platform has already torn down.
    pub fn is_removed(&self) -> bool {
        matches!(self, Self::Removed | Self::Purged)
    }
}

impl From<&str> for VolumeState {
    fn from(tag: &str) -> Self {
        match tag {
            "creating" => Self::Creating,
            "active" => Self::Active,
            "deactivating" => Self::Deactivating,
            "inactive" => Self::Inactive,
            "detached" => Self::Detached,
            "removing" => Self::Removing,
            "removed" => Self::Removed,
            "purged" => Self::Purged,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for VolumeState {
    fn from(tag: String) -> Self {
        Self::from(tag.as_str())
    }
}

impl From<VolumeState> for String {
    fn from(state: VolumeState) -> Self {
        state.as_str().to_string()
    }
}

impl fmt::Display for VolumeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A volume as reported by the platform. Observed, never mutated locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Volume {
    /// Opaque identifier assigned by the platform.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Storage driver backing the volume.
    pub driver: String,
    /// Id of the environment that owns the volume.
    pub account_id: String,
    /// Current lifecycle tag.
    pub state: VolumeState,
    /// Removal timestamp, set once the platform has torn the volume down.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub removed: Option<String>,
}

/// Fields sent when creating a volume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct VolumeSpec {
    /// Display name.
    pub name: String,
    /// Free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Storage driver to provision with.
    pub driver: String,
}

/// Fields a volume update may change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct VolumePatch {
    /// New display name.
    pub name: String,
    /// New description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Client for the volume endpoints visible to one environment.
#[async_trait::async_trait]
pub trait VolumeApi: Send + Sync {
    /// Create a volume. Returns the platform's view of it, including the
    /// assigned id; the volume keeps settling after this call returns.
    async fn create_volume(&self, spec: &VolumeSpec) -> Result<Volume, ProviderError>;

    /// Fetch a volume by id. `Ok(None)` means the platform does not know the
    /// id, which is distinct from a transport failure.
    async fn volume_by_id(&self, id: &str) -> Result<Option<Volume>, ProviderError>;

    /// Apply a patch to an existing volume.
    async fn update_volume(
        &self,
        volume: &Volume,
        patch: &VolumePatch,
    ) -> Result<Volume, ProviderError>;

    /// Ask the platform to remove the volume. Removal completes
    /// asynchronously; callers wait for it separately.
    async fn remove_volume(&self, volume: &Volume) -> Result<(), ProviderError>;
}

/// Yields API clients scoped to an environment, or an unscoped one.
#[async_trait::async_trait]
pub trait ClientResolver: Send + Sync {
    /// A client bound to the given environment.
    async fn environment_client(
        &self,
        environment_id: &str,
    ) -> Result<Arc<dyn VolumeApi>, ProviderError>;

    /// A client that can see volumes across environments. Only needed when an
    /// import id does not carry the owning environment.
    async fn global_client(&self) -> Result<Arc<dyn VolumeApi>, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_state_round_trip() {
        for tag in [
            "creating",
            "active",
            "deactivating",
            "inactive",
            "detached",
            "removing",
            "removed",
            "purged",
        ] {
            let state = VolumeState::from(tag);
            assert!(!matches!(state, VolumeState::Other(_)), "unmapped: {}", tag);
            assert_eq!(state.as_str(), tag);
        }

        let state = VolumeState::from("restoring");
        assert_eq!(state, VolumeState::Other("restoring".to_string()));
        assert_eq!(state.to_string(), "restoring");
    }

    #[test]
    fn test_removed_tags() {
        assert!(VolumeState::Removed.is_removed());
        assert!(VolumeState::Purged.is_removed());
        assert!(!VolumeState::Removing.is_removed());
        assert!(!VolumeState::Inactive.is_removed());
    }

    #[test]
    fn test_volume_wire_format() {
        let volume: Volume = serde_json::from_value(json!({
            "id": "1v7",
            "name": "foo",
            "driver": "rancher-nfs",
            "accountId": "1a5",
            "state": "inactive",
        }))
        .unwrap();

        assert_eq!(volume.account_id, "1a5");
        assert_eq!(volume.state, VolumeState::Inactive);
        assert_eq!(volume.description, None);
        assert_eq!(volume.removed, None);

        let encoded = serde_json::to_value(&volume).unwrap();
        assert_eq!(encoded["accountId"], "1a5");
        assert_eq!(encoded["state"], "inactive");
        assert!(encoded.get("removed").is_none());
    }
}
