//! Test doubles for driving the lifecycle handlers without a live platform.
//!
//! [`FakeRancher`] is an in-memory [`VolumeApi`] whose `volume_by_id` answers
//! can be scripted per volume, so a test shapes the exact state sequence a
//! convergence wait observes. [`FakeResolver`] hands the same fake out for
//! every environment and records which clients were asked for.
//! [`LifecycleTester`] drives a [`ResourceLifecycle`] the way the host
//! runtime does.
//!
//! Everything here takes its collaborators by injection; there are no shared
//! singletons between tests.
//!
//! # Example
//!
//! ```
//! use rancher_volume_provider::testing::{attrs, FakeRancher, FakeResolver, Observation};
//! use rancher_volume_provider::{ResourceLifecycle, VolumeResource, VolumeState};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let api = FakeRancher::new("env1");
//! api.script("1v1", [Observation::State(VolumeState::Inactive)]);
//! let resource = VolumeResource::new(FakeResolver::new(api.clone()));
//!
//! let mut bag = attrs([
//!     ("name", "foo"),
//!     ("driver", "rancher-nfs"),
//!     ("environment_id", "env1"),
//! ]);
//! resource.create(&mut bag).await.unwrap();
//! assert_eq!(api.create_calls(), 1);
//! # }
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use crate::api::{ClientResolver, Volume, VolumeApi, VolumePatch, VolumeSpec, VolumeState};
use crate::error::ProviderError;
use crate::resource::ResourceLifecycle;
use crate::schema::Schema;
use crate::types::AttributeBag;

/// One scripted `volume_by_id` answer.
#[derive(Debug, Clone)]
pub enum Observation {
    /// Report the volume in the given state.
    State(VolumeState),
    /// Report the volume as missing.
    Gone,
    /// Fail the call with a transport error.
    Error(String),
}

#[derive(Default)]
struct Inner {
    volumes: HashMap<String, Volume>,
    scripts: HashMap<String, VecDeque<Observation>>,
    next_id: u32,
    create_calls: u32,
    remove_calls: u32,
    by_id_calls: u32,
}

/// In-memory volume API.
///
/// Created volumes get ids `1v1`, `1v2`, ... and belong to the account the
/// fake was built with. While a volume has scripted observations queued,
/// `volume_by_id` consumes them in order and applies each state to the stored
/// volume; once the script drains, the last state sticks.
pub struct FakeRancher {
    account_id: String,
    inner: Mutex<Inner>,
}

impl FakeRancher {
    /// A fake whose volumes belong to the given environment.
    pub fn new(account_id: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            account_id: account_id.into(),
            inner: Mutex::new(Inner::default()),
        })
    }

    /// Store a volume the fake already knows about.
    pub fn seed(&self, volume: Volume) {
        let mut inner = self.inner.lock().unwrap();
        inner.volumes.insert(volume.id.clone(), volume);
    }

    /// Queue `volume_by_id` observations for a volume. Scripting works for
    /// ids that do not exist yet, which lets a test stage the settle
    /// sequence of a volume it is about to create.
    pub fn script(&self, id: &str, observations: impl IntoIterator<Item = Observation>) {
        let mut inner = self.inner.lock().unwrap();
        inner
            .scripts
            .entry(id.to_string())
            .or_default()
            .extend(observations);
    }

    /// The fake's current view of a volume.
    pub fn volume(&self, id: &str) -> Option<Volume> {
        self.inner.lock().unwrap().volumes.get(id).cloned()
    }

    /// How many volumes have been created.
    pub fn create_calls(&self) -> u32 {
        self.inner.lock().unwrap().create_calls
    }

    /// How many removal actions have been issued.
    pub fn remove_calls(&self) -> u32 {
        self.inner.lock().unwrap().remove_calls
    }

    /// How many `volume_by_id` lookups have been made.
    pub fn by_id_calls(&self) -> u32 {
        self.inner.lock().unwrap().by_id_calls
    }
}

#[async_trait::async_trait]
impl VolumeApi for FakeRancher {
    async fn create_volume(&self, spec: &VolumeSpec) -> Result<Volume, ProviderError> {
        let mut inner = self.inner.lock().unwrap();
        inner.create_calls += 1;
        inner.next_id += 1;
        let volume = Volume {
            id: format!("1v{}", inner.next_id),
            name: spec.name.clone(),
            description: spec.description.clone(),
            driver: spec.driver.clone(),
            account_id: self.account_id.clone(),
            state: VolumeState::Creating,
            removed: None,
        };
        inner.volumes.insert(volume.id.clone(), volume.clone());
        Ok(volume)
    }

    async fn volume_by_id(&self, id: &str) -> Result<Option<Volume>, ProviderError> {
        let mut inner = self.inner.lock().unwrap();
        inner.by_id_calls += 1;

        let scripted = inner
            .scripts
            .get_mut(id)
            .and_then(|script| script.pop_front());
        match scripted {
            Some(Observation::State(state)) => {
                let account_id = self.account_id.clone();
                let volume = inner
                    .volumes
                    .entry(id.to_string())
                    .or_insert_with(|| Volume {
                        id: id.to_string(),
                        name: String::new(),
                        description: None,
                        driver: String::new(),
                        account_id,
                        state: state.clone(),
                        removed: None,
                    });
                volume.state = state;
                if volume.state.is_removed() && volume.removed.is_none() {
                    volume.removed = Some("2020-01-01T00:00:00Z".to_string());
                }
                Ok(Some(volume.clone()))
            }
            Some(Observation::Gone) => Ok(None),
            Some(Observation::Error(message)) => Err(ProviderError::Transport(message)),
            None => Ok(inner.volumes.get(id).cloned()),
        }
    }

    async fn update_volume(
        &self,
        volume: &Volume,
        patch: &VolumePatch,
    ) -> Result<Volume, ProviderError> {
        let mut inner = self.inner.lock().unwrap();
        let stored = inner
            .volumes
            .get_mut(&volume.id)
            .ok_or_else(|| ProviderError::NotFound(volume.id.clone()))?;
        stored.name = patch.name.clone();
        stored.description = patch.description.clone();
        Ok(stored.clone())
    }

    async fn remove_volume(&self, volume: &Volume) -> Result<(), ProviderError> {
        let mut inner = self.inner.lock().unwrap();
        inner.remove_calls += 1;
        if let Some(stored) = inner.volumes.get_mut(&volume.id) {
            stored.state = VolumeState::Removing;
        }
        Ok(())
    }
}

/// Resolver that hands the same [`FakeRancher`] out for every environment.
#[derive(Clone)]
pub struct FakeResolver {
    api: Arc<FakeRancher>,
    environment_requests: Arc<Mutex<Vec<String>>>,
    global_requests: Arc<AtomicU32>,
}

impl FakeResolver {
    /// A resolver backed by the given fake.
    pub fn new(api: Arc<FakeRancher>) -> Self {
        Self {
            api,
            environment_requests: Arc::new(Mutex::new(Vec::new())),
            global_requests: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Environment ids that scoped clients were requested for, in order.
    pub fn environment_requests(&self) -> Vec<String> {
        self.environment_requests.lock().unwrap().clone()
    }

    /// How many times the global client was requested.
    pub fn global_requests(&self) -> u32 {
        self.global_requests.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ClientResolver for FakeResolver {
    async fn environment_client(
        &self,
        environment_id: &str,
    ) -> Result<Arc<dyn VolumeApi>, ProviderError> {
        self.environment_requests
            .lock()
            .unwrap()
            .push(environment_id.to_string());
        Ok(Arc::clone(&self.api) as Arc<dyn VolumeApi>)
    }

    async fn global_client(&self) -> Result<Arc<dyn VolumeApi>, ProviderError> {
        self.global_requests.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::clone(&self.api) as Arc<dyn VolumeApi>)
    }
}

/// Harness that drives a [`ResourceLifecycle`] the way the host runtime
/// does: bag in, bag out.
pub struct LifecycleTester<L: ResourceLifecycle> {
    lifecycle: L,
}

impl<L: ResourceLifecycle> LifecycleTester<L> {
    /// A tester for the given lifecycle implementation.
    pub fn new(lifecycle: L) -> Self {
        Self { lifecycle }
    }

    /// The wrapped lifecycle implementation.
    pub fn lifecycle(&self) -> &L {
        &self.lifecycle
    }

    /// The declared schema.
    pub fn schema(&self) -> Schema {
        self.lifecycle.schema()
    }

    /// Create a resource from a configuration bag and return the persisted
    /// state.
    pub async fn create(&self, mut attrs: AttributeBag) -> Result<AttributeBag, ProviderError> {
        self.lifecycle.create(&mut attrs).await?;
        Ok(attrs)
    }

    /// Refresh a state bag.
    pub async fn read(&self, mut attrs: AttributeBag) -> Result<AttributeBag, ProviderError> {
        self.lifecycle.read(&mut attrs).await?;
        Ok(attrs)
    }

    /// Update a resource and return the persisted state.
    pub async fn update(&self, mut attrs: AttributeBag) -> Result<AttributeBag, ProviderError> {
        self.lifecycle.update(&mut attrs).await?;
        Ok(attrs)
    }

    /// Delete a resource and return what is left of its state.
    pub async fn delete(&self, mut attrs: AttributeBag) -> Result<AttributeBag, ProviderError> {
        self.lifecycle.delete(&mut attrs).await?;
        Ok(attrs)
    }

    /// Import a resource by raw id.
    pub async fn import(&self, raw_id: &str) -> Result<Vec<AttributeBag>, ProviderError> {
        self.lifecycle.import(raw_id).await
    }

    /// Create then immediately refresh, like the host runtime's
    /// create-then-read sequence.
    pub async fn lifecycle_create(
        &self,
        attrs: AttributeBag,
    ) -> Result<AttributeBag, ProviderError> {
        let created = self.create(attrs).await?;
        self.read(created).await
    }
}

/// Build an attribute bag from key/value pairs.
pub fn attrs<const N: usize>(pairs: [(&str, &str); N]) -> AttributeBag {
    pairs
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::VolumeResource;

    #[tokio::test]
    async fn test_script_applies_then_sticks() {
        let api = FakeRancher::new("env1");
        api.seed(Volume {
            id: "1v7".to_string(),
            name: "foo".to_string(),
            description: None,
            driver: "rancher-nfs".to_string(),
            account_id: "env1".to_string(),
            state: VolumeState::Creating,
            removed: None,
        });
        api.script("1v7", [Observation::State(VolumeState::Inactive)]);

        let first = api.volume_by_id("1v7").await.unwrap().unwrap();
        assert_eq!(first.state, VolumeState::Inactive);

        // Script drained: the last state sticks.
        let second = api.volume_by_id("1v7").await.unwrap().unwrap();
        assert_eq!(second.state, VolumeState::Inactive);
        assert_eq!(api.by_id_calls(), 2);
    }

    #[tokio::test]
    async fn test_scripted_errors_and_absence() {
        let api = FakeRancher::new("env1");
        api.script(
            "1v7",
            [
                Observation::Error("connection reset".to_string()),
                Observation::Gone,
            ],
        );

        let err = api.volume_by_id("1v7").await.unwrap_err();
        assert!(matches!(err, ProviderError::Transport(_)));

        assert!(api.volume_by_id("1v7").await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_tester_drives_a_full_lifecycle() {
        let api = FakeRancher::new("env1");
        // Settles on the first poll; FakeRancher creates volumes in
        // "creating", so script the arrival.
        api.script("1v1", [Observation::State(VolumeState::Inactive)]);
        let resolver = FakeResolver::new(Arc::clone(&api));
        let tester = LifecycleTester::new(VolumeResource::new(resolver.clone()));

        let state = tester
            .lifecycle_create(attrs([
                ("name", "foo"),
                ("driver", "rancher-nfs"),
                ("environment_id", "env1"),
            ]))
            .await
            .unwrap();

        assert_eq!(state.get("id").map(String::as_str), Some("1v1"));
        assert_eq!(resolver.environment_requests()[0], "env1");

        // Drain instantly, then let the removal report through.
        api.script(
            "1v1",
            [
                Observation::State(VolumeState::Inactive),
                Observation::State(VolumeState::Inactive),
                Observation::State(VolumeState::Inactive),
                Observation::State(VolumeState::Removed),
            ],
        );
        let remains = tester.delete(state).await.unwrap();
        assert!(!remains.contains_key("id"));
        assert_eq!(api.remove_calls(), 1);
    }
}
