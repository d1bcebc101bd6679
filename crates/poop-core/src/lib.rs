//! Poop Core -- weighted prop generation, timed lifecycle and rainbow animation.
//!
//! This crate is the logic island of the spawning plugin. It talks to the game
//! server only through the collaborator traits in [`poop_host`]:
//!
//! - **`size`**: [`SizeGenerator`] draws a prop size from a tiered,
//!   nested-probability [`SizeTable`].
//! - **`cooldown`**: [`CooldownTracker`] rate-limits commands per actor.
//! - **`lifecycle`**: [`LifecycleManager`] tracks spawned props, enforces the
//!   per-round cap and schedules expiry.
//! - **`rainbow`**: [`RainbowTracker`] animates one shared hue across every
//!   rainbow prop from a single repeating timer.
//! - **`plugin`**: [`PoopPlugin`] wires the four together and drives them from
//!   the host's tick and round events.
//!
//! Everything runs on the host's main loop. Nothing blocks, and nothing here
//! is fatal to the host: failures are logged and the unit of work skipped.
//!
//! # Quick Start
//!
//! ```
//! use std::time::Duration;
//! use poop_core::prelude::*;
//!
//! let config = PluginConfig::default();
//! let mut plugin = PoopPlugin::with_seed(config, SimHost::new(), 42).unwrap();
//!
//! let spawned = plugin.try_spawn(ActorId(1), true).unwrap();
//! assert_eq!(plugin.lifecycle().count(), 1);
//! assert!(plugin.host().is_valid(spawned.entity));
//!
//! // Default lifetime is 60 seconds.
//! plugin.advance(Duration::from_secs(61));
//! assert_eq!(plugin.lifecycle().count(), 0);
//! assert!(!plugin.host().is_valid(spawned.entity));
//! ```

#![deny(unsafe_code)]

pub mod color;
pub mod config;
pub mod cooldown;
pub mod lifecycle;
pub mod plugin;
pub mod rainbow;
pub mod size;

pub use poop_host;

use poop_host::{EntityHandle, HostError};

/// Command name of the spawn command, used as its cooldown key.
pub const POOP_COMMAND: &str = "poop";

// ---------------------------------------------------------------------------
// TimerTask
// ---------------------------------------------------------------------------

/// Work items this crate schedules on the host's timers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerTask {
    /// A prop's lifetime ran out.
    Expire(EntityHandle),
    /// Advance the rainbow hue and repaint.
    RainbowTick,
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by core operations.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// The handle does not refer to a live entity.
    #[error("entity {entity} is not valid")]
    InvalidEntity { entity: EntityHandle },

    /// The entity is already being tracked.
    #[error("entity {entity} is already tracked")]
    AlreadyTracked { entity: EntityHandle },

    /// The actor used the command too recently.
    #[error("command '{command}' is on cooldown for {remaining_secs:.1}s")]
    OnCooldown {
        command: String,
        remaining_secs: f64,
    },

    /// The per-round spawn cap has been reached.
    #[error("round cap of {cap} spawns reached")]
    RoundCapReached { cap: i64 },

    /// A host collaborator failed.
    #[error(transparent)]
    Host(#[from] HostError),

    /// Configuration failed validation.
    #[error(transparent)]
    Config(#[from] config::ConfigError),
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use poop_host::prelude::*;

    pub use crate::color::{hsv_to_rgb, HueColorCache};
    pub use crate::config::{ConfigError, LifecycleConfig, PluginConfig, RainbowConfig};
    pub use crate::cooldown::CooldownTracker;
    pub use crate::lifecycle::LifecycleManager;
    pub use crate::plugin::{AdvanceReport, PluginStats, PoopPlugin, Spawned};
    pub use crate::rainbow::{RainbowTracker, TickReport};
    pub use crate::size::{GenerationTier, SizeCategory, SizeGenerator, SizeTable, SubTier};
    pub use crate::{CoreError, TimerTask, POOP_COMMAND};
}

pub use prelude::{
    CooldownTracker, LifecycleManager, PluginConfig, PoopPlugin, RainbowTracker, SizeGenerator,
    SizeTable,
};
