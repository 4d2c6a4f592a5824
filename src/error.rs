//! Error types surfaced to the host runtime.

use std::fmt;

use thiserror::Error;

use crate::converge::ConvergeError;

/// Errors a lifecycle callback can return.
///
/// Everything propagates to the host runtime verbatim; the only wrapping that
/// happens is the phase-identifying context added by the create and delete
/// paths so operators can tell which wait a stuck volume failed.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Network or API failure talking to the platform.
    #[error("transport error: {0}")]
    Transport(String),

    /// A volume a mutating operation needs does not exist.
    #[error("volume ({0}) not found")]
    NotFound(String),

    /// The attribute bag handed over by the host runtime lacks a declared
    /// field the operation cannot do without.
    #[error("missing required attribute \"{0}\"")]
    MissingAttribute(&'static str),

    /// A convergence wait failed during the named lifecycle phase.
    #[error("error waiting for volume ({id}) to be {phase}: {source}")]
    Wait {
        /// Id of the volume the wait was tracking.
        id: String,
        /// Which lifecycle wait failed.
        phase: WaitPhase,
        /// The underlying convergence failure.
        source: ConvergeError,
    },

    /// Refreshing the volume between delete's drain and removal phases
    /// failed.
    #[error("failed to refresh state of detached or inactive volume ({id}): {source}")]
    Refresh {
        /// Id of the volume being deleted.
        id: String,
        /// The refresh failure.
        #[source]
        source: Box<ProviderError>,
    },

    /// The platform rejected the removal action.
    #[error("error removing volume ({id}): {source}")]
    Remove {
        /// Id of the volume being deleted.
        id: String,
        /// The rejection.
        #[source]
        source: Box<ProviderError>,
    },
}

/// The convergence waits a volume can be stuck in, named the way the wrapped
/// error message reports them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitPhase {
    /// Post-create settle.
    Created,
    /// Pre-delete drain.
    DetachedOrInactive,
    /// Post-remove confirmation.
    Removed,
}

impl fmt::Display for WaitPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Created => "created",
            Self::DetachedOrInactive => "detached or inactive",
            Self::Removed => "removed",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::VolumeState;

    #[test]
    fn test_error_display() {
        let err = ProviderError::NotFound("1v42".to_string());
        assert_eq!(format!("{}", err), "volume (1v42) not found");

        let err = ProviderError::MissingAttribute("driver");
        assert_eq!(format!("{}", err), "missing required attribute \"driver\"");

        let err = ProviderError::Transport("connection refused".to_string());
        assert_eq!(format!("{}", err), "transport error: connection refused");
    }

    #[test]
    fn test_wait_phase_wrapping() {
        let err = ProviderError::Wait {
            id: "1v42".to_string(),
            phase: WaitPhase::Created,
            source: ConvergeError::UnexpectedState {
                id: "1v42".to_string(),
                state: VolumeState::Removed,
            },
        };
        assert_eq!(
            format!("{}", err),
            "error waiting for volume (1v42) to be created: \
             volume (1v42) entered unexpected state \"removed\""
        );
    }

    #[test]
    fn test_delete_phase_wraps() {
        let err = ProviderError::Remove {
            id: "1v42".to_string(),
            source: Box::new(ProviderError::Transport("502".to_string())),
        };
        assert_eq!(
            format!("{}", err),
            "error removing volume (1v42): transport error: 502"
        );

        let err = ProviderError::Refresh {
            id: "1v42".to_string(),
            source: Box::new(ProviderError::NotFound("1v42".to_string())),
        };
        assert!(format!("{}", err).starts_with("failed to refresh state"));
    }

    #[test]
    fn test_wait_phase_names() {
        assert_eq!(WaitPhase::Created.to_string(), "created");
        assert_eq!(
            WaitPhase::DetachedOrInactive.to_string(),
            "detached or inactive"
        );
        assert_eq!(WaitPhase::Removed.to_string(), "removed");
    }
}
