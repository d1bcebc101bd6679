//! Headless round simulation against the in-memory host.
//!
//! Usage: `poop-sim [CONFIG.json] [SEED]`
//!
//! Simulates one round at a fixed 100 ms step with a handful of players
//! spamming the spawn command, then ends the round, shuts down and logs a
//! summary along with the wall-clock time the run took. Set
//! `RUST_LOG=poop_core=debug` for per-spawn detail.

use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::Context;
use poop_core::prelude::*;

const STEP: Duration = Duration::from_millis(100);
const ROUND_LENGTH: Duration = Duration::from_secs(120);
const PLAYERS: u64 = 8;

fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let config = match args.next() {
        Some(path) => PluginConfig::load(&path).with_context(|| format!("loading {path}"))?,
        None => PluginConfig::default(),
    };
    let seed = match args.next() {
        Some(raw) => raw.parse::<u64>().context("SEED must be an unsigned integer")?,
        None => 0x5EED,
    };

    let wall = SystemClock::new();
    let mut plugin = PoopPlugin::with_seed(config, SimHost::new(), seed)?;
    let rounds = plugin.round_event_sender();
    rounds.send(RoundEvent::Start)?;

    let mut histogram: BTreeMap<String, u64> = BTreeMap::new();
    let mut now = Duration::ZERO;
    let mut colour_pushes = 0usize;
    while now < ROUND_LENGTH {
        now += STEP;
        colour_pushes += plugin.advance(now).colors_pushed;

        // Every player tries once per second, staggered across steps.
        let step_index = (now.as_millis() / STEP.as_millis()) as u64;
        let actor = ActorId(step_index % 10);
        if actor.0 < PLAYERS {
            if let Ok(spawned) = plugin.try_spawn(actor, step_index % 3 == 0) {
                let key = spawned.category.unwrap_or_else(|| "uncategorised".to_owned());
                *histogram.entry(key).or_default() += 1;
            }
        }
    }

    let live_before_end = plugin.lifecycle().count();
    rounds.send(RoundEvent::End)?;
    plugin.advance(now);
    let removed = plugin.shutdown();

    let stats = plugin.stats();
    tracing::info!(
        seed,
        spawned = stats.spawned,
        expired = stats.expired,
        rejected_cooldown = stats.rejected_cooldown,
        rejected_round_cap = stats.rejected_round_cap,
        largest = stats.largest_size.unwrap_or_default(),
        live_before_end,
        removed_on_shutdown = removed,
        colour_pushes,
        wall_ms = wall.now().as_millis() as u64,
        "simulation finished"
    );
    for (category, count) in &histogram {
        tracing::info!(%category, count, "size category");
    }
    anyhow::ensure!(
        plugin.host().live_count() == 0,
        "{} props leaked after shutdown",
        plugin.host().live_count()
    );
    Ok(())
}
