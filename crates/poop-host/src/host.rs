//! Entity collaborator interfaces and an in-memory host.
//!
//! The core never creates or mutates game objects directly. It goes through
//! [`EntityHost`] (validity, destruction, colour) and [`EntityFactory`]
//! (spawning). [`SimHost`] implements both on top of a [`HandleTable`] so that
//! tests and the simulation binary can run without a game server.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::entity::{EntityHandle, HandleTable};
use crate::HostError;

// ---------------------------------------------------------------------------
// Rgb
// ---------------------------------------------------------------------------

/// An 8-bit-per-channel colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const WHITE: Rgb = Rgb::new(255, 255, 255);

    #[inline]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

// ---------------------------------------------------------------------------
// ActorId
// ---------------------------------------------------------------------------

/// Stable identity of the player issuing a command (e.g. a platform account id).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActorId(pub u64);

impl std::fmt::Display for ActorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "actor:{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Collaborator traits
// ---------------------------------------------------------------------------

/// Host-side operations on spawned entities.
pub trait EntityHost {
    /// Returns `true` if the handle still refers to a live entity.
    fn is_valid(&self, entity: EntityHandle) -> bool;

    /// Destroy the entity. Errors are reported, never retried by the caller.
    fn destroy(&mut self, entity: EntityHandle) -> Result<(), HostError>;

    /// Set the render colour of the entity.
    fn set_color(&mut self, entity: EntityHandle, color: Rgb) -> Result<(), HostError>;
}

/// Host-side entity creation.
pub trait EntityFactory {
    /// Spawn a prop of the given size on behalf of `owner`.
    fn spawn_prop(&mut self, owner: ActorId, size: f64) -> Result<EntityHandle, HostError>;
}

// ---------------------------------------------------------------------------
// SimHost
// ---------------------------------------------------------------------------

/// A spawned prop as seen by [`SimHost`].
#[derive(Debug, Clone, PartialEq)]
pub struct SimProp {
    pub owner: ActorId,
    pub size: f64,
    pub color: Rgb,
    /// Number of `set_color` calls received.
    pub color_updates: u32,
}

/// In-memory [`EntityHost`] + [`EntityFactory`] with failure injection.
#[derive(Debug, Default)]
pub struct SimHost {
    props: HandleTable<SimProp>,
    failing_destroy: HashSet<EntityHandle>,
    failing_color: HashSet<EntityHandle>,
    destroyed: u64,
}

impl SimHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every future `destroy` of `entity` fail with [`HostError::Rejected`].
    ///
    /// The prop stays alive, mirroring a host that refused the request.
    pub fn fail_destroy_of(&mut self, entity: EntityHandle) {
        self.failing_destroy.insert(entity);
    }

    /// Make every future `set_color` on `entity` fail.
    pub fn fail_color_of(&mut self, entity: EntityHandle) {
        self.failing_color.insert(entity);
    }

    /// Destroy a prop behind the core's back, as a map change or another
    /// plugin would. Returns `true` if it was alive.
    pub fn despawn_externally(&mut self, entity: EntityHandle) -> bool {
        self.props.remove(entity).is_some()
    }

    pub fn prop(&self, entity: EntityHandle) -> Option<&SimProp> {
        self.props.get(entity)
    }

    /// Number of live props.
    pub fn live_count(&self) -> usize {
        self.props.len()
    }

    /// Number of successful `destroy` calls so far.
    pub fn destroyed_count(&self) -> u64 {
        self.destroyed
    }
}

impl EntityHost for SimHost {
    fn is_valid(&self, entity: EntityHandle) -> bool {
        self.props.contains(entity)
    }

    fn destroy(&mut self, entity: EntityHandle) -> Result<(), HostError> {
        if self.failing_destroy.contains(&entity) {
            return Err(HostError::Rejected {
                entity,
                operation: "destroy",
            });
        }
        match self.props.remove(entity) {
            Some(_) => {
                self.destroyed += 1;
                Ok(())
            }
            None => Err(HostError::StaleHandle { entity }),
        }
    }

    fn set_color(&mut self, entity: EntityHandle, color: Rgb) -> Result<(), HostError> {
        if self.failing_color.contains(&entity) {
            return Err(HostError::Rejected {
                entity,
                operation: "set_color",
            });
        }
        let prop = self
            .props
            .get_mut(entity)
            .ok_or(HostError::StaleHandle { entity })?;
        prop.color = color;
        prop.color_updates += 1;
        Ok(())
    }
}

impl EntityFactory for SimHost {
    fn spawn_prop(&mut self, owner: ActorId, size: f64) -> Result<EntityHandle, HostError> {
        if !size.is_finite() || size <= 0.0 {
            return Err(HostError::SpawnFailed(format!("invalid prop size {size}")));
        }
        Ok(self.props.insert(SimProp {
            owner,
            size,
            color: Rgb::WHITE,
            color_updates: 0,
        }))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spawn_and_destroy() {
        let mut host = SimHost::new();
        let e = host.spawn_prop(ActorId(1), 1.0).unwrap();
        assert!(host.is_valid(e));
        host.destroy(e).unwrap();
        assert!(!host.is_valid(e));
        assert_eq!(host.destroyed_count(), 1);
    }

    #[test]
    fn destroy_stale_handle_errors() {
        let mut host = SimHost::new();
        let e = host.spawn_prop(ActorId(1), 1.0).unwrap();
        host.destroy(e).unwrap();
        assert!(matches!(
            host.destroy(e),
            Err(HostError::StaleHandle { .. })
        ));
    }

    #[test]
    fn injected_destroy_failure_keeps_prop() {
        let mut host = SimHost::new();
        let e = host.spawn_prop(ActorId(1), 1.0).unwrap();
        host.fail_destroy_of(e);
        assert!(host.destroy(e).is_err());
        assert!(host.is_valid(e));
    }

    #[test]
    fn set_color_records_update() {
        let mut host = SimHost::new();
        let e = host.spawn_prop(ActorId(2), 1.5).unwrap();
        host.set_color(e, Rgb::new(255, 0, 0)).unwrap();
        let prop = host.prop(e).unwrap();
        assert_eq!(prop.color, Rgb::new(255, 0, 0));
        assert_eq!(prop.color_updates, 1);
    }

    #[test]
    fn spawn_rejects_non_positive_size() {
        let mut host = SimHost::new();
        assert!(host.spawn_prop(ActorId(1), 0.0).is_err());
        assert!(host.spawn_prop(ActorId(1), f64::NAN).is_err());
    }
}
