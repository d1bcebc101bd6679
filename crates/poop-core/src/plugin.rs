//! The plugin driver: spawn flow, timer dispatch and round fan-out.
//!
//! [`PoopPlugin`] owns the four components, the timer queue and the host
//! collaborator, and is driven from the host's main loop:
//!
//! 1. [`try_spawn`](PoopPlugin::try_spawn) runs the spawn command: round cap,
//!    cooldown, size draw, host spawn, then registration for expiry and
//!    (optionally) the rainbow effect.
//! 2. [`advance`](PoopPlugin::advance) is called once per host tick. It first
//!    applies round events queued through
//!    [`round_event_sender`](PoopPlugin::round_event_sender), then polls the
//!    timer queue and dispatches every fired [`TimerTask`].
//!
//! Round events may be produced on any thread; they only take effect inside
//! `advance`, on the thread that owns the plugin.
//!
//! # Round fan-out order
//!
//! - **Start**: lifecycle counter reset, cooldown records cleared.
//! - **End**: the timer queue cancels round-scoped timers first, then the
//!   lifecycle manager runs its cleanup and the rainbow tracker clears. The
//!   components see their timers already invalid and do not cancel them a
//!   second time.

use std::sync::mpsc::{self, Receiver, Sender};
use std::time::Duration;

use poop_host::{
    ActorId, EntityFactory, EntityHandle, EntityHost, FiredTimer, RoundEvent, TimerQueue,
};
use tracing::{debug, info, warn};

use crate::config::PluginConfig;
use crate::cooldown::CooldownTracker;
use crate::lifecycle::LifecycleManager;
use crate::rainbow::RainbowTracker;
use crate::size::SizeGenerator;
use crate::{CoreError, TimerTask, POOP_COMMAND};

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// A successful spawn.
#[derive(Debug, Clone, PartialEq)]
pub struct Spawned {
    pub entity: EntityHandle,
    pub size: f64,
    /// Localisation key of the size category, if any category matched.
    pub category: Option<String>,
    /// Whether the prop joined the rainbow animation.
    pub rainbow: bool,
}

/// What happened during one [`PoopPlugin::advance`] call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdvanceReport {
    /// Round events applied.
    pub round_events: usize,
    /// Props removed because their lifetime ran out.
    pub expired: usize,
    /// Rainbow colour pushes across all ticks.
    pub colors_pushed: usize,
}

/// Counters for the current session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PluginStats {
    pub spawned: u64,
    pub expired: u64,
    pub rejected_cooldown: u64,
    pub rejected_round_cap: u64,
    pub failed_spawns: u64,
    pub largest_size: Option<f64>,
}

// ---------------------------------------------------------------------------
// PoopPlugin
// ---------------------------------------------------------------------------

/// Coordinates size generation, cooldowns, lifecycle and animation.
pub struct PoopPlugin<H> {
    config: PluginConfig,
    host: H,
    timers: TimerQueue<TimerTask>,
    sizes: SizeGenerator,
    cooldowns: CooldownTracker,
    lifecycle: LifecycleManager,
    rainbow: RainbowTracker,
    events_tx: Sender<RoundEvent>,
    events_rx: Receiver<RoundEvent>,
    now: Duration,
    stats: PluginStats,
}

impl<H: EntityHost + EntityFactory> PoopPlugin<H> {
    /// Create a plugin with an entropy-seeded size generator.
    ///
    /// `config` is validated (and its categories sorted) first.
    pub fn new(mut config: PluginConfig, host: H) -> Result<Self, CoreError> {
        config.validate()?;
        let sizes = SizeGenerator::from_entropy(config.size.clone());
        Ok(Self::with_generator(config, host, sizes))
    }

    /// Create a plugin whose size draws are reproducible from `seed`.
    pub fn with_seed(mut config: PluginConfig, host: H, seed: u64) -> Result<Self, CoreError> {
        config.validate()?;
        let sizes = SizeGenerator::seeded(config.size.clone(), seed);
        Ok(Self::with_generator(config, host, sizes))
    }

    fn with_generator(config: PluginConfig, host: H, sizes: SizeGenerator) -> Self {
        let (events_tx, events_rx) = mpsc::channel();
        Self {
            cooldowns: CooldownTracker::new(&config.cooldowns),
            lifecycle: LifecycleManager::new(config.lifecycle.clone()),
            rainbow: RainbowTracker::new(&config.rainbow),
            timers: TimerQueue::new(),
            sizes,
            config,
            host,
            events_tx,
            events_rx,
            now: Duration::ZERO,
            stats: PluginStats::default(),
        }
    }

    /// Run the spawn command for `actor`.
    ///
    /// The cap is checked before the cooldown so that a capped attempt does
    /// not consume the actor's cooldown.
    pub fn try_spawn(&mut self, actor: ActorId, rainbow: bool) -> Result<Spawned, CoreError> {
        if self.lifecycle.has_reached_round_cap() {
            self.stats.rejected_round_cap += 1;
            return Err(CoreError::RoundCapReached {
                cap: self.config.lifecycle.max_per_round,
            });
        }
        if !self.cooldowns.can_execute(POOP_COMMAND, actor, self.now) {
            self.stats.rejected_cooldown += 1;
            return Err(CoreError::OnCooldown {
                command: POOP_COMMAND.to_owned(),
                remaining_secs: self.cooldowns.remaining_seconds(POOP_COMMAND, actor, self.now),
            });
        }

        let size = self.sizes.generate();
        let entity = match self.host.spawn_prop(actor, size) {
            Ok(entity) => entity,
            Err(error) => {
                self.stats.failed_spawns += 1;
                warn!(%actor, size, %error, "prop spawn failed");
                return Err(error.into());
            }
        };
        if let Err(error) = self.lifecycle.track(entity, &self.host, &mut self.timers) {
            // Do not leave an untracked prop behind.
            if let Err(destroy_error) = self.host.destroy(entity) {
                warn!(%entity, %destroy_error, "failed to roll back untracked prop");
            }
            self.stats.failed_spawns += 1;
            return Err(error);
        }
        let rainbow = rainbow && self.rainbow.track(entity, self.now, &mut self.timers);

        self.stats.spawned += 1;
        self.stats.largest_size = Some(self.stats.largest_size.map_or(size, |l| l.max(size)));
        let category = self.sizes.classify(size).map(|c| c.label_key.clone());
        debug!(%actor, %entity, size, ?category, rainbow, "prop spawned");

        Ok(Spawned {
            entity,
            size,
            category,
            rainbow,
        })
    }

    /// Remove a prop on request (e.g. an admin cleanup command).
    pub fn remove(&mut self, entity: EntityHandle) -> bool {
        self.rainbow.untrack(entity, &mut self.timers);
        self.lifecycle.remove(entity, &mut self.host, &mut self.timers)
    }

    /// Sender for round events; clone it into whatever observes the host.
    pub fn round_event_sender(&self) -> Sender<RoundEvent> {
        self.events_tx.clone()
    }

    /// Drive the plugin to `now`: apply queued round events, then fire timers.
    pub fn advance(&mut self, now: Duration) -> AdvanceReport {
        if now > self.now {
            self.now = now;
        }
        let mut report = AdvanceReport::default();

        while let Ok(event) = self.events_rx.try_recv() {
            self.handle_round_event(event);
            report.round_events += 1;
        }

        for FiredTimer { id, task } in self.timers.poll(self.now) {
            match task {
                TimerTask::Expire(entity) => {
                    if self
                        .lifecycle
                        .on_expired(id, entity, &mut self.host, &mut self.timers)
                    {
                        self.rainbow.untrack(entity, &mut self.timers);
                        report.expired += 1;
                    }
                }
                TimerTask::RainbowTick => {
                    if self.rainbow.timer() == Some(id) {
                        let tick = self.rainbow.tick(self.now, &mut self.host, &mut self.timers);
                        report.colors_pushed += tick.pushed;
                    }
                }
            }
        }

        self.stats.expired += report.expired as u64;
        report
    }

    /// Apply a round event immediately.
    pub fn handle_round_event(&mut self, event: RoundEvent) {
        match event {
            RoundEvent::Start => {
                self.lifecycle.on_round_start();
                self.cooldowns.on_round_start();
                info!(tracked = self.lifecycle.count(), "round started");
            }
            RoundEvent::End => {
                let cancelled = self.timers.on_round_end();
                let removed = self.lifecycle.on_round_end(&mut self.host, &mut self.timers);
                self.rainbow.on_round_end(&mut self.timers);
                info!(cancelled, removed, tracked = self.lifecycle.count(), "round ended");
            }
        }
    }

    /// Remove every prop and stop every timer. Returns how many props were
    /// removed.
    pub fn shutdown(&mut self) -> usize {
        self.rainbow.clear_all(&mut self.timers);
        let removed = self.lifecycle.shutdown(&mut self.host, &mut self.timers);
        info!(removed, "plugin shut down");
        removed
    }

    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn config(&self) -> &PluginConfig {
        &self.config
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn timers(&self) -> &TimerQueue<TimerTask> {
        &self.timers
    }

    pub fn sizes(&self) -> &SizeGenerator {
        &self.sizes
    }

    pub fn cooldowns(&self) -> &CooldownTracker {
        &self.cooldowns
    }

    pub fn lifecycle(&self) -> &LifecycleManager {
        &self.lifecycle
    }

    pub fn rainbow(&self) -> &RainbowTracker {
        &self.rainbow
    }

    pub fn stats(&self) -> &PluginStats {
        &self.stats
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
