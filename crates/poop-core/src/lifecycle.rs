//! Tracking, expiry and cleanup of spawned props.
//!
//! Each tracked prop moves through
//! `Untracked -> Tracked (with or without an expiry timer) -> Removed`.
//! Removal is reachable from four paths (expiry, manual removal, bulk cleanup
//! at round end, shutdown) and all of them funnel through one routine, so a
//! timer is cancelled at most once and the record always disappears even if
//! the host fails to destroy the prop.

use std::collections::BTreeMap;
use std::time::Duration;

use poop_host::{EntityHandle, EntityHost, Scheduler, TimerId};
use tracing::{debug, warn};

use crate::config::LifecycleConfig;
use crate::{CoreError, TimerTask};

/// Owns the set of tracked props and the per-round spawn counter.
#[derive(Debug, Clone)]
pub struct LifecycleManager {
    config: LifecycleConfig,
    /// Tracked props and their pending expiry timer, if any.
    tracked: BTreeMap<EntityHandle, Option<TimerId>>,
    round_count: u64,
}

impl LifecycleManager {
    pub fn new(config: LifecycleConfig) -> Self {
        Self {
            config,
            tracked: BTreeMap::new(),
            round_count: 0,
        }
    }

    /// Start tracking a freshly spawned prop.
    ///
    /// Counts towards the round cap. With a positive lifetime an expiry task
    /// is scheduled, flagged to be cancelled by the scheduler at round end.
    pub fn track<H, S>(
        &mut self,
        entity: EntityHandle,
        host: &H,
        scheduler: &mut S,
    ) -> Result<(), CoreError>
    where
        H: EntityHost + ?Sized,
        S: Scheduler<TimerTask> + ?Sized,
    {
        if !host.is_valid(entity) {
            warn!(%entity, "refusing to track invalid entity");
            return Err(CoreError::InvalidEntity { entity });
        }
        if self.tracked.contains_key(&entity) {
            warn!(%entity, "entity is already tracked");
            return Err(CoreError::AlreadyTracked { entity });
        }

        self.round_count += 1;
        let timer = self.lifetime().map(|lifetime| {
            scheduler.schedule_once(lifetime, TimerTask::Expire(entity), true)
        });
        self.tracked.insert(entity, timer);
        debug!(%entity, ?timer, round_count = self.round_count, "entity tracked");
        Ok(())
    }

    /// Stop tracking and destroy a prop. Returns `false` if it was not tracked.
    pub fn remove<H, S>(&mut self, entity: EntityHandle, host: &mut H, scheduler: &mut S) -> bool
    where
        H: EntityHost + ?Sized,
        S: Scheduler<TimerTask> + ?Sized,
    {
        let Some(timer) = self.tracked.remove(&entity) else {
            return false;
        };
        if let Some(id) = timer {
            if scheduler.is_valid(id) {
                scheduler.cancel(id);
            }
        }
        if let Err(error) = host.destroy(entity) {
            warn!(%entity, %error, "failed to destroy entity, dropping it from tracking anyway");
        }
        debug!(%entity, "entity removed");
        true
    }

    /// Remove every tracked prop. Returns how many were removed.
    pub fn remove_all<H, S>(&mut self, host: &mut H, scheduler: &mut S) -> usize
    where
        H: EntityHost + ?Sized,
        S: Scheduler<TimerTask> + ?Sized,
    {
        let snapshot: Vec<EntityHandle> = self.tracked.keys().copied().collect();
        let mut removed = 0;
        for entity in snapshot {
            if self.remove(entity, host, scheduler) {
                removed += 1;
            }
        }
        removed
    }

    /// Handle a fired [`TimerTask::Expire`].
    ///
    /// The fired timer is not cancelled again. A firing that does not match
    /// the entity's current timer (the entity was removed, or removed and
    /// tracked again) is ignored.
    pub fn on_expired<H, S>(
        &mut self,
        timer: TimerId,
        entity: EntityHandle,
        host: &mut H,
        scheduler: &mut S,
    ) -> bool
    where
        H: EntityHost + ?Sized,
        S: Scheduler<TimerTask> + ?Sized,
    {
        match self.tracked.get_mut(&entity) {
            Some(slot) if *slot == Some(timer) => {
                *slot = None;
                debug!(%entity, "entity lifetime expired");
                self.remove(entity, host, scheduler)
            }
            _ => {
                debug!(%entity, %timer, "ignoring stale expiry");
                false
            }
        }
    }

    /// Reset the per-round counter. Tracked props are kept.
    pub fn on_round_start(&mut self) {
        self.round_count = 0;
    }

    /// Bulk cleanup if configured. Otherwise forget timers the scheduler has
    /// already cancelled, leaving those props tracked without expiry.
    pub fn on_round_end<H, S>(&mut self, host: &mut H, scheduler: &mut S) -> usize
    where
        H: EntityHost + ?Sized,
        S: Scheduler<TimerTask> + ?Sized,
    {
        if self.config.clear_on_round_end {
            let removed = self.remove_all(host, scheduler);
            debug!(removed, "round ended, tracked entities cleared");
            return removed;
        }
        for timer in self.tracked.values_mut() {
            if timer.is_some_and(|id| !scheduler.is_valid(id)) {
                *timer = None;
            }
        }
        0
    }

    /// Remove everything on plugin unload.
    pub fn shutdown<H, S>(&mut self, host: &mut H, scheduler: &mut S) -> usize
    where
        H: EntityHost + ?Sized,
        S: Scheduler<TimerTask> + ?Sized,
    {
        self.remove_all(host, scheduler)
    }

    pub fn count(&self) -> usize {
        self.tracked.len()
    }

    pub fn is_tracked(&self, entity: EntityHandle) -> bool {
        self.tracked.contains_key(&entity)
    }

    /// Pending expiry timer of a tracked prop.
    pub fn timer_of(&self, entity: EntityHandle) -> Option<TimerId> {
        self.tracked.get(&entity).copied().flatten()
    }

    /// Successful registrations since the last round start.
    pub fn round_count(&self) -> u64 {
        self.round_count
    }

    /// `true` once the round counter reaches a positive cap.
    pub fn has_reached_round_cap(&self) -> bool {
        let cap = self.config.max_per_round;
        cap > 0 && self.round_count >= cap as u64
    }

    pub fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    fn lifetime(&self) -> Option<Duration> {
        let secs = self.config.lifetime_secs;
        if secs > 0.0 {
            Duration::try_from_secs_f64(secs).ok()
        } else {
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use poop_host::{ActorId, EntityFactory, SimHost, TimerQueue};

    fn config(lifetime_secs: f64, cap: i64, clear: bool) -> LifecycleConfig {
        LifecycleConfig {
            max_per_round: cap,
            lifetime_secs,
            clear_on_round_end: clear,
        }
    }

    fn spawn(host: &mut SimHost) -> EntityHandle {
        host.spawn_prop(ActorId(1), 1.0).unwrap()
    }

    #[test]
    fn track_then_remove_leaves_nothing() {
        let mut host = SimHost::new();
        let mut timers = TimerQueue::new();
        let mut lc = LifecycleManager::new(config(30.0, 0, false));
        let e = spawn(&mut host);

        lc.track(e, &host, &mut timers).unwrap();
        let timer = lc.timer_of(e).unwrap();
        assert!(timers.is_valid(timer));

        assert!(lc.remove(e, &mut host, &mut timers));
        assert_eq!(lc.count(), 0);
        assert!(!timers.is_valid(timer));
        assert!(!host.is_valid(e));
    }

    #[test]
    fn remove_is_idempotent() {
        let mut host = SimHost::new();
        let mut timers = TimerQueue::new();
        let mut lc = LifecycleManager::new(config(30.0, 0, false));
        let e = spawn(&mut host);
        lc.track(e, &host, &mut timers).unwrap();
        assert!(lc.remove(e, &mut host, &mut timers));
        assert!(!lc.remove(e, &mut host, &mut timers));
        assert_eq!(host.destroyed_count(), 1);
    }

    #[test]
    fn invalid_entity_is_rejected_without_counting() {
        let mut host = SimHost::new();
        let mut timers = TimerQueue::new();
        let mut lc = LifecycleManager::new(config(30.0, 0, false));
        let e = spawn(&mut host);
        host.despawn_externally(e);
        assert!(matches!(
            lc.track(e, &host, &mut timers),
            Err(CoreError::InvalidEntity { .. })
        ));
        assert_eq!(lc.round_count(), 0);
        assert!(timers.is_empty());
    }

    #[test]
    fn double_track_is_rejected() {
        let mut host = SimHost::new();
        let mut timers = TimerQueue::new();
        let mut lc = LifecycleManager::new(config(30.0, 0, false));
        let e = spawn(&mut host);
        lc.track(e, &host, &mut timers).unwrap();
        assert!(matches!(
            lc.track(e, &host, &mut timers),
            Err(CoreError::AlreadyTracked { .. })
        ));
        assert_eq!(lc.round_count(), 1);
        assert_eq!(timers.len(), 1);
    }

    #[test]
    fn infinite_lifetime_schedules_nothing() {
        let mut host = SimHost::new();
        let mut timers = TimerQueue::new();
        let mut lc = LifecycleManager::new(config(0.0, 0, false));
        let e = spawn(&mut host);
        lc.track(e, &host, &mut timers).unwrap();
        assert!(lc.timer_of(e).is_none());
        assert!(timers.is_empty());
        assert_eq!(lc.remove_all(&mut host, &mut timers), 1);
    }

    #[test]
    fn expiry_removes_entity() {
        let mut host = SimHost::new();
        let mut timers = TimerQueue::new();
        let mut lc = LifecycleManager::new(config(5.0, 0, false));
        let e = spawn(&mut host);
        lc.track(e, &host, &mut timers).unwrap();

        let fired = timers.poll(Duration::from_secs(5));
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].task, TimerTask::Expire(e));
        assert!(lc.on_expired(fired[0].id, e, &mut host, &mut timers));
        assert_eq!(lc.count(), 0);
        assert!(!host.is_valid(e));
    }

    #[test]
    fn stale_expiry_after_manual_removal_is_ignored() {
        let mut host = SimHost::new();
        let mut timers = TimerQueue::new();
        let mut lc = LifecycleManager::new(config(5.0, 0, false));
        let e = spawn(&mut host);
        lc.track(e, &host, &mut timers).unwrap();
        let timer = lc.timer_of(e).unwrap();
        lc.remove(e, &mut host, &mut timers);
        assert!(!lc.on_expired(timer, e, &mut host, &mut timers));
    }

    #[test]
    fn remove_all_isolates_destroy_failures() {
        let mut host = SimHost::new();
        let mut timers = TimerQueue::new();
        let mut lc = LifecycleManager::new(config(30.0, 0, false));
        let entities: Vec<_> = (0..5).map(|_| spawn(&mut host)).collect();
        for e in &entities {
            lc.track(*e, &host, &mut timers).unwrap();
        }
        host.fail_destroy_of(entities[2]);

        assert_eq!(lc.remove_all(&mut host, &mut timers), 5);
        assert_eq!(lc.count(), 0);
        assert!(timers.is_empty());
        assert_eq!(host.live_count(), 1);
    }

    #[test]
    fn round_cap() {
        let mut host = SimHost::new();
        let mut timers = TimerQueue::new();
        let mut lc = LifecycleManager::new(config(0.0, 2, false));
        assert!(!lc.has_reached_round_cap());
        for _ in 0..2 {
            let e = spawn(&mut host);
            lc.track(e, &host, &mut timers).unwrap();
        }
        assert!(lc.has_reached_round_cap());
        lc.on_round_start();
        assert!(!lc.has_reached_round_cap());
        assert_eq!(lc.count(), 2, "round start must not clear entities");
    }

    #[test]
    fn zero_or_negative_cap_is_unlimited() {
        let mut host = SimHost::new();
        let mut timers = TimerQueue::new();
        for cap in [0, -3] {
            let mut lc = LifecycleManager::new(config(0.0, cap, false));
            for _ in 0..50 {
                let e = spawn(&mut host);
                lc.track(e, &host, &mut timers).unwrap();
            }
            assert!(!lc.has_reached_round_cap());
        }
    }

    #[test]
    fn round_end_without_clear_keeps_entities_untimed() {
        let mut host = SimHost::new();
        let mut timers = TimerQueue::new();
        let mut lc = LifecycleManager::new(config(30.0, 0, false));
        let e = spawn(&mut host);
        lc.track(e, &host, &mut timers).unwrap();

        timers.on_round_end();
        assert_eq!(lc.on_round_end(&mut host, &mut timers), 0);
        assert!(lc.is_tracked(e));
        assert!(lc.timer_of(e).is_none());
    }

    #[test]
    fn round_end_with_clear_removes_everything() {
        let mut host = SimHost::new();
        let mut timers = TimerQueue::new();
        let mut lc = LifecycleManager::new(config(30.0, 0, true));
        for _ in 0..3 {
            let e = spawn(&mut host);
            lc.track(e, &host, &mut timers).unwrap();
        }
        assert_eq!(lc.on_round_end(&mut host, &mut timers), 3);
        assert_eq!(lc.count(), 0);
        assert_eq!(host.live_count(), 0);
    }

    #[test]
    fn retrack_after_removal_is_a_fresh_lifecycle() {
        let mut host = SimHost::new();
        let mut timers = TimerQueue::new();
        let mut lc = LifecycleManager::new(config(0.0, 0, false));
        let e = spawn(&mut host);
        host.fail_destroy_of(e);
        lc.track(e, &host, &mut timers).unwrap();
        lc.remove(e, &mut host, &mut timers);
        // Destruction failed, so the handle is still valid and may be tracked again.
        lc.track(e, &host, &mut timers).unwrap();
        assert!(lc.is_tracked(e));
        assert_eq!(lc.round_count(), 2);
    }
}
