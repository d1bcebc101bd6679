//! Animated rainbow colour shared by all rainbow props.
//!
//! One repeating timer drives one global hue, no matter how many props are
//! tracked. Each tick advances the hue by `base_speed * speed_multiplier(hue)`,
//! resolves the colour through a [`HueColorCache`] and pushes it to every
//! tracked prop. Props that are gone, or that have been tracked for longer
//! than [`MAX_TRACKED_AGE`], are dropped after the pass.
//!
//! The timer only runs while at least one prop is tracked.

use std::collections::BTreeMap;
use std::time::Duration;

use poop_host::{EntityHandle, EntityHost, Scheduler, TimerId};
use tracing::{debug, trace, warn};

use crate::color::HueColorCache;
use crate::config::RainbowConfig;
use crate::TimerTask;

/// Interval of the animation timer.
pub const TICK_INTERVAL: Duration = Duration::from_millis(100);

/// Props tracked for longer than this are dropped even if still valid, in
/// case their removal was never reported.
pub const MAX_TRACKED_AGE: Duration = Duration::from_secs(3_600);

/// Hue speed factor for the 60° band containing `hue`.
///
/// Red→yellow dwells longest, magenta→red passes quickest.
pub fn speed_multiplier(hue: f64) -> f64 {
    let hue = hue.rem_euclid(360.0);
    if hue < 60.0 {
        0.5
    } else if hue < 120.0 {
        0.8
    } else if hue < 180.0 {
        1.0
    } else if hue < 240.0 {
        1.0
    } else if hue < 300.0 {
        1.2
    } else {
        1.5
    }
}

/// Next hue after one tick, in `[0, 360)`.
pub fn advance_hue(hue: f64, base_speed: f64) -> f64 {
    let next = (hue + base_speed * speed_multiplier(hue)).rem_euclid(360.0);
    // rem_euclid can round up to exactly 360.0 for tiny negative inputs.
    if next >= 360.0 {
        0.0
    } else {
        next
    }
}

/// Outcome of one animation tick.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TickReport {
    /// Props that received the new colour.
    pub pushed: usize,
    /// Props dropped as invalid or too old.
    pub dropped: usize,
}

/// Tracks rainbow props and animates their shared colour.
#[derive(Debug, Clone)]
pub struct RainbowTracker {
    enabled: bool,
    base_speed: f64,
    hue: f64,
    /// Tracked props and when they started being tracked.
    entries: BTreeMap<EntityHandle, Duration>,
    cache: HueColorCache,
    timer: Option<TimerId>,
}

impl RainbowTracker {
    pub fn new(config: &RainbowConfig) -> Self {
        Self {
            enabled: config.enabled,
            base_speed: config.base_speed,
            hue: 0.0,
            entries: BTreeMap::new(),
            cache: HueColorCache::new(),
            timer: None,
        }
    }

    /// Start animating `entity`. Starts the timer for the first prop, or
    /// restarts it if the scheduler has dropped it.
    ///
    /// Returns `false` if the effect is disabled or the prop already tracked.
    pub fn track<S>(&mut self, entity: EntityHandle, now: Duration, scheduler: &mut S) -> bool
    where
        S: Scheduler<TimerTask> + ?Sized,
    {
        if !self.enabled || self.entries.contains_key(&entity) {
            return false;
        }
        self.entries.insert(entity, now);
        if !self.timer.is_some_and(|id| scheduler.is_valid(id)) {
            self.timer = Some(scheduler.schedule_repeating(
                TICK_INTERVAL,
                TimerTask::RainbowTick,
                true,
            ));
            debug!("rainbow animation started");
        }
        true
    }

    /// Stop animating `entity`. Stops the timer when nothing is left.
    pub fn untrack<S>(&mut self, entity: EntityHandle, scheduler: &mut S) -> bool
    where
        S: Scheduler<TimerTask> + ?Sized,
    {
        let removed = self.entries.remove(&entity).is_some();
        if self.entries.is_empty() {
            self.stop_timer(scheduler);
        }
        removed
    }

    /// Drop every prop, reset the hue and stop the timer.
    pub fn clear_all<S>(&mut self, scheduler: &mut S)
    where
        S: Scheduler<TimerTask> + ?Sized,
    {
        self.entries.clear();
        self.hue = 0.0;
        self.stop_timer(scheduler);
    }

    pub fn on_round_end<S>(&mut self, scheduler: &mut S)
    where
        S: Scheduler<TimerTask> + ?Sized,
    {
        self.clear_all(scheduler);
    }

    /// One animation step, run when the timer fires.
    pub fn tick<H, S>(&mut self, now: Duration, host: &mut H, scheduler: &mut S) -> TickReport
    where
        H: EntityHost + ?Sized,
        S: Scheduler<TimerTask> + ?Sized,
    {
        if self.entries.is_empty() {
            self.stop_timer(scheduler);
            return TickReport::default();
        }

        self.hue = advance_hue(self.hue, self.base_speed);
        let color = self.cache.resolve(self.hue);

        let mut report = TickReport::default();
        let mut stale = Vec::new();
        for (&entity, &since) in &self.entries {
            if !host.is_valid(entity) || now.saturating_sub(since) > MAX_TRACKED_AGE {
                stale.push(entity);
                continue;
            }
            match host.set_color(entity, color) {
                Ok(()) => report.pushed += 1,
                Err(error) => warn!(%entity, %error, "failed to push rainbow colour"),
            }
        }

        for entity in &stale {
            self.entries.remove(entity);
        }
        report.dropped = stale.len();
        if self.entries.is_empty() {
            self.stop_timer(scheduler);
        }

        trace!(hue = self.hue, pushed = report.pushed, dropped = report.dropped, "rainbow tick");
        report
    }

    pub fn tracked_count(&self) -> usize {
        self.entries.len()
    }

    pub fn is_tracked(&self, entity: EntityHandle) -> bool {
        self.entries.contains_key(&entity)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// `true` while the animation timer is scheduled.
    pub fn is_running(&self) -> bool {
        self.timer.is_some()
    }

    /// Id of the animation timer, if running.
    pub fn timer(&self) -> Option<TimerId> {
        self.timer
    }

    pub fn current_hue(&self) -> f64 {
        self.hue
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    fn stop_timer<S>(&mut self, scheduler: &mut S)
    where
        S: Scheduler<TimerTask> + ?Sized,
    {
        if let Some(id) = self.timer.take() {
            if scheduler.is_valid(id) {
                scheduler.cancel(id);
            }
            debug!("rainbow animation stopped");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
