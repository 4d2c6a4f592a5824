//! Lifecycle handlers for the volume resource.
//!
//! Each callback is a short sequence: resolve a scoped client, make at most
//! one mutating API call, hand the volume to a convergence wait, then project
//! the remote fields back into the declared state. The host runtime drives
//! these through [`ResourceLifecycle`] and persists the attribute bag that
//! comes back.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tracing::{debug, info};

use crate::api::{ClientResolver, Volume, VolumeApi, VolumePatch, VolumeSpec, VolumeState};
use crate::converge::{AbsentPolicy, StateChange};
use crate::error::{ProviderError, WaitPhase};
use crate::schema::{Attribute, Schema};
use crate::types::{AttributeBag, DeclaredVolume};

/// The lifecycle callbacks the host runtime invokes, one implementation per
/// resource type.
///
/// State crosses the boundary as a flat attribute bag; the bag a callback
/// leaves behind is persisted as the resource's authoritative state. A
/// callback that fails must leave the bag untouched.
#[async_trait::async_trait]
pub trait ResourceLifecycle: Send + Sync + 'static {
    /// Declared attribute schema for the resource type.
    fn schema(&self) -> Schema;

    /// Create the remote resource described by `attrs` and wait for it to
    /// settle.
    async fn create(&self, attrs: &mut AttributeBag) -> Result<(), ProviderError>;

    /// Refresh `attrs` from the remote resource. A resource that is gone
    /// clears its id instead of failing.
    async fn read(&self, attrs: &mut AttributeBag) -> Result<(), ProviderError>;

    /// Push changed declared fields to the remote resource.
    async fn update(&self, attrs: &mut AttributeBag) -> Result<(), ProviderError>;

    /// Tear the remote resource down and wait until it is gone.
    async fn delete(&self, attrs: &mut AttributeBag) -> Result<(), ProviderError>;

    /// Translate an import id into one or more attribute bags.
    async fn import(&self, raw_id: &str) -> Result<Vec<AttributeBag>, ProviderError>;
}

/// Volume resource handler.
///
/// Holds nothing but the injected resolver; every invocation runs to
/// completion on its own, so concurrent invocations on independent resources
/// share no mutable state.
pub struct VolumeResource<R> {
    resolver: R,
}

impl<R: ClientResolver> VolumeResource<R> {
    /// A handler backed by the given client resolver.
    pub fn new(resolver: R) -> Self {
        Self { resolver }
    }

    async fn create_volume(&self, declared: &mut DeclaredVolume) -> Result<(), ProviderError> {
        require_field("name", &declared.name)?;
        require_field("driver", &declared.driver)?;
        info!(name = %declared.name, "creating volume");
        let client = self
            .resolver
            .environment_client(&declared.environment_id)
            .await?;

        let spec = VolumeSpec {
            name: declared.name.clone(),
            description: declared.description.clone(),
            driver: declared.driver.clone(),
        };
        let created = client.create_volume(&spec).await?;

        create_settle(&created.id)
            .wait_for(volume_refresh(Arc::clone(&client), created.id.clone()))
            .await
            .map_err(|source| ProviderError::Wait {
                id: created.id.clone(),
                phase: WaitPhase::Created,
                source,
            })?;

        declared.id = Some(created.id.clone());
        info!(id = %created.id, "volume created");

        self.read_volume(declared).await
    }

    async fn read_volume(&self, declared: &mut DeclaredVolume) -> Result<(), ProviderError> {
        let id = declared_id(declared)?;
        debug!(id = %id, "refreshing volume");
        let client = self
            .resolver
            .environment_client(&declared.environment_id)
            .await?;

        let volume = match client.volume_by_id(&id).await? {
            Some(volume) => volume,
            None => {
                info!(id = %id, "volume not found, dropping from state");
                declared.clear_id();
                return Ok(());
            }
        };

        if volume.state.is_removed() {
            info!(id = %id, removed = ?volume.removed, "volume was removed, dropping from state");
            declared.clear_id();
            return Ok(());
        }

        declared.absorb(&volume);
        Ok(())
    }

    async fn update_volume(&self, declared: &mut DeclaredVolume) -> Result<(), ProviderError> {
        require_field("name", &declared.name)?;
        let id = declared_id(declared)?;
        info!(id = %id, "updating volume");
        let client = self
            .resolver
            .environment_client(&declared.environment_id)
            .await?;

        let volume = client
            .volume_by_id(&id)
            .await?
            .ok_or_else(|| ProviderError::NotFound(id.clone()))?;

        let patch = VolumePatch {
            name: declared.name.clone(),
            description: declared.description.clone(),
        };
        client.update_volume(&volume, &patch).await?;

        self.read_volume(declared).await
    }

    async fn delete_volume(&self, declared: &mut DeclaredVolume) -> Result<(), ProviderError> {
        let id = declared_id(declared)?;
        info!(id = %id, "deleting volume");
        let client = self
            .resolver
            .environment_client(&declared.environment_id)
            .await?;

        client
            .volume_by_id(&id)
            .await?
            .ok_or_else(|| ProviderError::NotFound(id.clone()))?;

        // The platform only accepts a removal request once the volume has
        // left its attached state.
        debug!(id = %id, "waiting for volume to be detached or inactive");
        drain(&id)
            .wait_for(volume_refresh(Arc::clone(&client), id.clone()))
            .await
            .map_err(|source| ProviderError::Wait {
                id: id.clone(),
                phase: WaitPhase::DetachedOrInactive,
                source,
            })?;

        // Re-read so the removal action is issued against the drained volume.
        let volume = client
            .volume_by_id(&id)
            .await
            .map_err(|err| ProviderError::Refresh {
                id: id.clone(),
                source: Box::new(err),
            })?
            .ok_or_else(|| ProviderError::NotFound(id.clone()))?;

        client
            .remove_volume(&volume)
            .await
            .map_err(|err| ProviderError::Remove {
                id: id.clone(),
                source: Box::new(err),
            })?;

        debug!(id = %id, "waiting for volume to be removed");
        removal(&id)
            .wait_for(volume_refresh(Arc::clone(&client), id.clone()))
            .await
            .map_err(|source| ProviderError::Wait {
                id: id.clone(),
                phase: WaitPhase::Removed,
                source,
            })?;

        declared.clear_id();
        Ok(())
    }

    async fn import_volume(&self, raw_id: &str) -> Result<DeclaredVolume, ProviderError> {
        let (environment_id, id) = split_scoped_id(raw_id);
        info!(id = %id, "importing volume");
        let mut declared = DeclaredVolume {
            id: Some(id.to_string()),
            ..DeclaredVolume::default()
        };

        match environment_id {
            Some(environment_id) => declared.environment_id = environment_id.to_string(),
            None => {
                // A bare id does not say which environment owns the volume;
                // only an unscoped client can look that up.
                let client = self.resolver.global_client().await?;
                let volume = client
                    .volume_by_id(id)
                    .await?
                    .ok_or_else(|| ProviderError::NotFound(id.to_string()))?;
                declared.environment_id = volume.account_id;
            }
        }

        Ok(declared)
    }
}

#[async_trait::async_trait]
impl<R> ResourceLifecycle for VolumeResource<R>
where
    R: ClientResolver + 'static,
{
    fn schema(&self) -> Schema {
        Schema::v0()
            .with_attribute("id", Attribute::computed_string())
            .with_attribute("name", Attribute::required_string())
            .with_attribute("driver", Attribute::required_string())
            .with_attribute("description", Attribute::optional_string())
            .with_attribute("environment_id", Attribute::required_string().force_new())
    }

    async fn create(&self, attrs: &mut AttributeBag) -> Result<(), ProviderError> {
        let mut declared = DeclaredVolume::from_attrs(attrs)?;
        self.create_volume(&mut declared).await?;
        declared.write_attrs(attrs);
        Ok(())
    }

    async fn read(&self, attrs: &mut AttributeBag) -> Result<(), ProviderError> {
        let mut declared = DeclaredVolume::from_attrs(attrs)?;
        self.read_volume(&mut declared).await?;
        declared.write_attrs(attrs);
        Ok(())
    }

    async fn update(&self, attrs: &mut AttributeBag) -> Result<(), ProviderError> {
        let mut declared = DeclaredVolume::from_attrs(attrs)?;
        self.update_volume(&mut declared).await?;
        declared.write_attrs(attrs);
        Ok(())
    }

    async fn delete(&self, attrs: &mut AttributeBag) -> Result<(), ProviderError> {
        let mut declared = DeclaredVolume::from_attrs(attrs)?;
        self.delete_volume(&mut declared).await?;
        declared.write_attrs(attrs);
        Ok(())
    }

    async fn import(&self, raw_id: &str) -> Result<Vec<AttributeBag>, ProviderError> {
        let declared = self.import_volume(raw_id).await?;
        Ok(vec![declared.to_attrs()])
    }
}

// Convergence call sites. Timings are shared: a ten minute budget, a one
// second head start, a three second poll floor.

/// Post-create settle: ride through provisioning until the volume first
/// reports `inactive`.
fn create_settle(id: &str) -> StateChange {
    StateChange::new(id)
        .pending([VolumeState::Creating, VolumeState::Inactive])
        .target([VolumeState::Inactive])
}

/// Pre-delete drain: wait for the volume to leave its attached state.
fn drain(id: &str) -> StateChange {
    StateChange::new(id)
        .pending([VolumeState::Active, VolumeState::Deactivating])
        .target([VolumeState::Inactive, VolumeState::Detached])
}

/// Post-remove confirmation: wait for the platform to finish tearing the
/// volume down. A volume that disappears outright counts as removed.
fn removal(id: &str) -> StateChange {
    StateChange::new(id)
        .pending([
            VolumeState::Inactive,
            VolumeState::Detached,
            VolumeState::Removed,
            VolumeState::Removing,
        ])
        .target([VolumeState::Removed])
        .absent(AbsentPolicy::Converged)
}

type RefreshFuture = Pin<Box<dyn Future<Output = Result<Option<Volume>, ProviderError>> + Send>>;

/// The refresh function for one volume, in the shape
/// [`StateChange::wait_for`] expects.
fn volume_refresh(client: Arc<dyn VolumeApi>, id: String) -> impl FnMut() -> RefreshFuture {
    move || {
        let client = Arc::clone(&client);
        let id = id.clone();
        let refresh: RefreshFuture = Box::pin(async move { client.volume_by_id(&id).await });
        refresh
    }
}

fn declared_id(declared: &DeclaredVolume) -> Result<String, ProviderError> {
    declared
        .id
        .clone()
        .ok_or(ProviderError::MissingAttribute("id"))
}

fn require_field(key: &'static str, value: &str) -> Result<(), ProviderError> {
    if value.is_empty() {
        return Err(ProviderError::MissingAttribute(key));
    }
    Ok(())
}

/// Split an import id of the form `<environment>/<volume>`. A bare id has no
/// environment part.
fn split_scoped_id(raw: &str) -> (Option<&str>, &str) {
    match raw.split_once('/') {
        Some((environment_id, id)) => (Some(environment_id), id),
        None => (None, raw),
    }
}
