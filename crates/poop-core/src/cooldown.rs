//! Per-command, per-actor rate limiting.
//!
//! The cooldown window starts at the last *successful* check: a refused
//! [`CooldownTracker::can_execute`] call does not extend the wait.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use poop_host::ActorId;
use tracing::debug;

/// Tracks the last successful use of each command by each actor.
#[derive(Debug, Clone, Default)]
pub struct CooldownTracker {
    windows: HashMap<String, Duration>,
    last_use: HashMap<String, HashMap<ActorId, Duration>>,
}

impl CooldownTracker {
    /// Build from per-command cooldowns in seconds.
    ///
    /// Negative or non-finite values are treated as no cooldown; config
    /// validation rejects them before they get here.
    pub fn new(cooldowns: &BTreeMap<String, f64>) -> Self {
        let mut tracker = Self::default();
        for (command, secs) in cooldowns {
            tracker.set_cooldown(command, *secs);
        }
        tracker
    }

    /// Set (or replace) the cooldown of `command`.
    pub fn set_cooldown(&mut self, command: &str, secs: f64) {
        let window = Duration::try_from_secs_f64(secs).unwrap_or(Duration::ZERO);
        self.windows.insert(command.to_owned(), window);
    }

    /// Returns `true` and stamps `now` if `actor` may run `command`.
    ///
    /// Commands without a configured cooldown are always allowed.
    pub fn can_execute(&mut self, command: &str, actor: ActorId, now: Duration) -> bool {
        let Some(window) = self.windows.get(command).copied() else {
            return true;
        };
        let remaining = self.remaining(command, actor, now, window);
        if remaining > Duration::ZERO {
            debug!(command, %actor, remaining_secs = remaining.as_secs_f64(), "command on cooldown");
            return false;
        }
        self.last_use
            .entry(command.to_owned())
            .or_default()
            .insert(actor, now);
        true
    }

    /// Seconds until `actor` may run `command` again. Never negative.
    pub fn remaining_seconds(&self, command: &str, actor: ActorId, now: Duration) -> f64 {
        match self.windows.get(command) {
            Some(window) => self.remaining(command, actor, now, *window).as_secs_f64(),
            None => 0.0,
        }
    }

    /// Forget every recorded use.
    pub fn on_round_start(&mut self) {
        self.last_use.clear();
    }

    fn remaining(&self, command: &str, actor: ActorId, now: Duration, window: Duration) -> Duration {
        let Some(last) = self.last_use.get(command).and_then(|m| m.get(&actor)) else {
            return Duration::ZERO;
        };
        let elapsed = now.saturating_sub(*last);
        window.saturating_sub(elapsed)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
