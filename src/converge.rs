//! State convergence for remote volumes.
//!
//! A volume mutation returns before the volume has finished moving through
//! its lifecycle, so every mutating phase is followed by a wait. Callers
//! describe the transition they expect as two state sets: the `pending`
//! states the volume may pass through and the `target` states that satisfy
//! the wait. [`StateChange::wait_for`] polls a refresh function at a bounded
//! cadence until the volume lands in a target state, the wall-clock budget
//! runs out, or the volume shows up somewhere neither set allows.
//!
//! The loop is purely observational. It never mutates the remote volume and
//! never retries a failed refresh: transport failures belong to the API
//! client, not to the convergence contract.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::{sleep, Instant};
use tracing::debug;

use crate::api::{Volume, VolumeState};
use crate::error::ProviderError;

/// How a wait classifies an observed state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateClass {
    /// The state satisfies the wait.
    Target,
    /// The state is transient; keep polling.
    Pending,
    /// The state is in neither set. Polling cannot recover from this.
    Unexpected,
}

/// Policy for a refresh that reports the volume as missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AbsentPolicy {
    /// A missing volume fails the wait.
    #[default]
    Error,
    /// A missing volume satisfies the wait. Used when waiting for removal:
    /// the volume disappearing outright is as good as observing `removed`.
    Converged,
}

/// Errors surfaced by [`StateChange::wait_for`].
#[derive(Debug, Error)]
pub enum ConvergeError {
    /// The refresh call itself failed.
    #[error("refreshing state: {0}")]
    Refresh(#[source] Box<ProviderError>),

    /// The volume disappeared while [`AbsentPolicy::Error`] was in effect.
    #[error("volume ({id}) no longer exists")]
    Gone {
        /// Id of the missing volume.
        id: String,
    },

    /// The volume was observed in a state outside both sets.
    #[error("volume ({id}) entered unexpected state \"{state}\"")]
    UnexpectedState {
        /// Id of the offending volume.
        id: String,
        /// The state that was observed.
        state: VolumeState,
    },

    /// The wall-clock budget ran out while the volume was still pending.
    #[error("timeout after {elapsed:?} waiting for volume ({id}), last seen \"{last}\"")]
    Timeout {
        /// Id of the stuck volume.
        id: String,
        /// The state the volume was last observed in.
        last: VolumeState,
        /// How long the wait ran before giving up.
        elapsed: Duration,
    },
}

/// One awaited volume transition.
///
/// Each lifecycle phase builds one of these with its own `(pending, target)`
/// pair; the timing knobs default to the values every phase uses.
#[derive(Debug, Clone)]
pub struct StateChange {
    volume_id: String,
    pending: Vec<VolumeState>,
    target: Vec<VolumeState>,
    timeout: Duration,
    delay: Duration,
    min_interval: Duration,
    absent: AbsentPolicy,
}

impl StateChange {
    /// Default overall deadline for a single wait.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10 * 60);
    /// Default pause before the first refresh.
    pub const DEFAULT_DELAY: Duration = Duration::from_secs(1);
    /// Default floor on the pause between consecutive refreshes.
    pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_secs(3);

    /// Start describing a wait for the given volume.
    pub fn new(volume_id: impl Into<String>) -> Self {
        Self {
            volume_id: volume_id.into(),
            pending: Vec::new(),
            target: Vec::new(),
            timeout: Self::DEFAULT_TIMEOUT,
            delay: Self::DEFAULT_DELAY,
            min_interval: Self::DEFAULT_MIN_INTERVAL,
            absent: AbsentPolicy::Error,
        }
    }

    /// States the volume may pass through while the wait continues.
    pub fn pending(mut self, states: impl IntoIterator<Item = VolumeState>) -> Self {
        self.pending = states.into_iter().collect();
        self
    }

    /// States that satisfy the wait.
    pub fn target(mut self, states: impl IntoIterator<Item = VolumeState>) -> Self {
        self.target = states.into_iter().collect();
        self
    }

    /// Overall wall-clock budget.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Pause before the first refresh.
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Floor on the pause between consecutive refreshes.
    pub fn min_interval(mut self, interval: Duration) -> Self {
        self.min_interval = interval;
        self
    }

    /// Policy when a refresh reports the volume as missing.
    pub fn absent(mut self, policy: AbsentPolicy) -> Self {
        self.absent = policy;
        self
    }

    /// Classify an observed state.
    ///
    /// Target membership wins when a state is listed in both sets; the
    /// create phase relies on that to treat its settle state as arrival.
    pub fn classify(&self, state: &VolumeState) -> StateClass {
        if self.target.contains(state) {
            StateClass::Target
        } else if self.pending.contains(state) {
            StateClass::Pending
        } else {
            StateClass::Unexpected
        }
    }

    /// Poll `refresh` until the volume reaches a target state.
    ///
    /// Sleeps [`delay`](Self::delay) once up front, then refreshes with
    /// [`min_interval`](Self::min_interval) between polls. Returns the
    /// snapshot that satisfied the wait, or `None` when the volume vanished
    /// under [`AbsentPolicy::Converged`]. A target observed on the first
    /// refresh returns immediately, without a single interval sleep.
    pub async fn wait_for<F, Fut>(&self, mut refresh: F) -> Result<Option<Volume>, ConvergeError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Option<Volume>, ProviderError>>,
    {
        let started = Instant::now();
        sleep(self.delay).await;

        loop {
            let snapshot = refresh()
                .await
                .map_err(|err| ConvergeError::Refresh(Box::new(err)))?;

            let volume = match snapshot {
                Some(volume) => volume,
                None => {
                    return match self.absent {
                        AbsentPolicy::Converged => Ok(None),
                        AbsentPolicy::Error => Err(ConvergeError::Gone {
                            id: self.volume_id.clone(),
                        }),
                    }
                }
            };

            match self.classify(&volume.state) {
                StateClass::Target => return Ok(Some(volume)),
                StateClass::Unexpected => {
                    return Err(ConvergeError::UnexpectedState {
                        id: self.volume_id.clone(),
                        state: volume.state,
                    })
                }
                StateClass::Pending => {
                    let elapsed = started.elapsed();
                    if elapsed >= self.timeout {
                        return Err(ConvergeError::Timeout {
                            id: self.volume_id.clone(),
                            last: volume.state,
                            elapsed,
                        });
                    }
                    debug!(
                        volume = %self.volume_id,
                        state = %volume.state,
                        "volume still pending"
                    );
                }
            }

            sleep(self.min_interval).await;
        }
    }
}
