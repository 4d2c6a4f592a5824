//! Declared state for the volume resource.
//!
//! The host runtime persists one flat string-keyed bag per resource. Inside
//! the provider everything works on [`DeclaredVolume`]; the bag round-trip
//! lives here and nowhere else.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::api::Volume;
use crate::error::ProviderError;

/// Flat attribute bag, as persisted by the host runtime.
pub type AttributeBag = BTreeMap<String, String>;

/// The declared fields of the volume resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DeclaredVolume {
    /// Remote id. Unset until the volume exists, cleared once it is gone.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Display name.
    pub name: String,
    /// Storage driver.
    pub driver: String,
    /// Optional description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Environment the volume lives in. Immutable after creation.
    pub environment_id: String,
}

impl DeclaredVolume {
    /// Decode the declared fields out of a host attribute bag.
    ///
    /// `environment_id` must be present; every operation needs it to pick a
    /// client. `name` and `driver` decode to empty strings when absent; a
    /// bag produced by import carries neither, and the operations that send
    /// them to the platform check them first.
    pub fn from_attrs(attrs: &AttributeBag) -> Result<Self, ProviderError> {
        let environment_id = match attrs.get("environment_id") {
            Some(value) if !value.is_empty() => value.clone(),
            _ => return Err(ProviderError::MissingAttribute("environment_id")),
        };
        Ok(Self {
            id: optional(attrs, "id"),
            name: attrs.get("name").cloned().unwrap_or_default(),
            driver: attrs.get("driver").cloned().unwrap_or_default(),
            description: optional(attrs, "description"),
            environment_id,
        })
    }

    /// Write the declared fields back into a host attribute bag.
    ///
    /// Unset optional fields are dropped from the bag, so a cleared id tells
    /// the host runtime the volume no longer exists.
    pub fn write_attrs(&self, attrs: &mut AttributeBag) {
        write_optional(attrs, "id", self.id.as_deref());
        attrs.insert("name".to_string(), self.name.clone());
        attrs.insert("driver".to_string(), self.driver.clone());
        write_optional(attrs, "description", self.description.as_deref());
        attrs.insert("environment_id".to_string(), self.environment_id.clone());
    }

    /// The declared fields as a fresh attribute bag.
    pub fn to_attrs(&self) -> AttributeBag {
        let mut attrs = AttributeBag::new();
        self.write_attrs(&mut attrs);
        attrs
    }

    /// Project a remote volume's fields onto the declared state.
    pub fn absorb(&mut self, volume: &Volume) {
        self.name = volume.name.clone();
        self.driver = volume.driver.clone();
        self.description = volume.description.clone();
        self.environment_id = volume.account_id.clone();
    }

    /// Forget the remote volume. The host runtime drops a resource whose id
    /// comes back unset.
    pub fn clear_id(&mut self) {
        self.id = None;
    }
}

fn optional(attrs: &AttributeBag, key: &str) -> Option<String> {
    attrs.get(key).filter(|value| !value.is_empty()).cloned()
}

fn write_optional(attrs: &mut AttributeBag, key: &str, value: Option<&str>) {
    match value {
        Some(value) => {
            attrs.insert(key.to_string(), value.to_string());
        }
        None => {
            attrs.remove(key);
        }
    }
}
