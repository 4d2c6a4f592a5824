//! Volume lifecycle handler for a Rancher provider plugin.
//!
//! This crate implements one resource type, the storage volume, for a
//! declarative configuration tool's provider plugin. The host runtime calls
//! the [`ResourceLifecycle`] entry points with a flat attribute bag and
//! persists whatever bag comes back; everything the crate does in between is
//! orchestration around the remote volume API.
//!
//! The interesting part is [`converge`]: a volume mutation returns before the
//! volume has finished moving, so each lifecycle phase describes the
//! transition it expects as a pending/target state-set pair and polls until
//! the volume arrives, the budget runs out, or the volume strays somewhere
//! neither set allows.
//!
//! # Quick Start
//!
//! ```ignore
//! use rancher_volume_provider::{init_logging, ResourceLifecycle, VolumeResource};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     init_logging();
//!
//!     // `resolver` implements ClientResolver over your API credentials.
//!     let volumes = VolumeResource::new(resolver);
//!
//!     // The host runtime drives the lifecycle; shown here by hand.
//!     let mut attrs = host.planned_attributes();
//!     volumes.create(&mut attrs).await?;
//!     host.persist(attrs);
//!     Ok(())
//! }
//! ```
//!
//! # Collaborators
//!
//! Three seams, all traits, all injected:
//!
//! - [`VolumeApi`]: the remote volume endpoints (create, fetch by id,
//!   update, remove).
//! - [`ClientResolver`]: picks the API client for an environment, or an
//!   unscoped one for import's scope recovery.
//! - [`ResourceLifecycle`]: what this crate exposes to the host runtime.
//!
//! Authentication, schema validation, diffing and planning all live on the
//! host side of these seams.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod api;
pub mod converge;
pub mod error;
pub mod logging;
pub mod resource;
pub mod schema;
pub mod testing;
pub mod types;

pub use api::{ClientResolver, Volume, VolumeApi, VolumePatch, VolumeSpec, VolumeState};
pub use converge::{AbsentPolicy, ConvergeError, StateChange, StateClass};
pub use error::{ProviderError, WaitPhase};
pub use logging::{init_logging, try_init_logging};
pub use resource::{ResourceLifecycle, VolumeResource};
pub use schema::{Attribute, AttributeKind, AttributeType, Schema};
pub use types::{AttributeBag, DeclaredVolume};

// Re-export async_trait for implementors of the client traits.
pub use async_trait::async_trait;

// Re-export commonly used external crates.
pub use serde_json;
pub use tracing;
