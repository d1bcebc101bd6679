//! Poop Host -- collaborator interfaces between the spawning core and a game server.
//!
//! Everything the core needs from the outside world lives here, behind narrow
//! interfaces:
//!
//! - **`entity`**: generational [`EntityHandle`]s and the [`HandleTable`]
//!   indirection from handle to live record.
//! - **`host`**: [`EntityHost`] (validity, destruction, colour) and
//!   [`EntityFactory`] (spawning), plus the in-memory [`SimHost`].
//! - **`scheduler`**: the [`Scheduler`] trait and the poll-driven
//!   [`TimerQueue`], where timers are task records keyed by [`TimerId`].
//! - **`clock`**: [`Clock`] with wall-clock and manual implementations.
//! - **`round`**: [`RoundEvent`].
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use poop_host::prelude::*;
//!
//! let mut host = SimHost::new();
//! let prop = host.spawn_prop(ActorId(7), 1.25).unwrap();
//!
//! let mut timers = TimerQueue::new();
//! let id = timers.schedule_once(Duration::from_secs(30), prop, true);
//! assert!(timers.is_valid(id));
//!
//! let fired = timers.poll(Duration::from_secs(30));
//! assert_eq!(fired[0].task, prop);
//! host.destroy(prop).unwrap();
//! assert!(!host.is_valid(prop));
//! ```

#![deny(unsafe_code)]

pub mod clock;
pub mod entity;
pub mod host;
pub mod round;
pub mod scheduler;

pub use clock::{Clock, ManualClock, SystemClock};
pub use entity::{EntityHandle, HandleTable};
pub use host::{ActorId, EntityFactory, EntityHost, Rgb, SimHost, SimProp};
pub use round::RoundEvent;
pub use scheduler::{FiredTimer, Scheduler, TimerId, TimerQueue};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors reported by host collaborators.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    /// The handle does not refer to a live entity.
    #[error("entity {entity} does not exist (stale or never spawned)")]
    StaleHandle { entity: EntityHandle },

    /// The host refused an operation on a live entity.
    #[error("host rejected {operation} on entity {entity}")]
    Rejected {
        entity: EntityHandle,
        operation: &'static str,
    },

    /// The host could not create the entity.
    #[error("spawn failed: {0}")]
    SpawnFailed(String),
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::clock::{Clock, ManualClock, SystemClock};
    pub use crate::entity::{EntityHandle, HandleTable};
    pub use crate::host::{ActorId, EntityFactory, EntityHost, Rgb, SimHost, SimProp};
    pub use crate::round::RoundEvent;
    pub use crate::scheduler::{FiredTimer, Scheduler, TimerId, TimerQueue};
    pub use crate::HostError;
}
