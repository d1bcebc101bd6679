//! End-to-end tests of the plugin across rounds, driven by a manual clock.

use std::time::Duration;

use poop_core::prelude::*;

fn config(edit: impl FnOnce(&mut PluginConfig)) -> PluginConfig {
    let mut config = PluginConfig::default();
    edit(&mut config);
    config
}

fn secs(v: u64) -> Duration {
    Duration::from_secs(v)
}

#[test]
fn cooldown_window_with_simulated_clock() {
    let clock = ManualClock::new();
    let mut plugin = PoopPlugin::with_seed(
        config(|c| {
            c.cooldowns.insert(POOP_COMMAND.to_owned(), 10.0);
            c.lifecycle.lifetime_secs = 0.0;
        }),
        SimHost::new(),
        5,
    )
    .unwrap();
    let actor = ActorId(42);

    assert!(plugin.try_spawn(actor, false).is_ok());
    for _ in 0..9 {
        clock.advance(secs(1));
        plugin.advance(clock.now());
        assert!(matches!(
            plugin.try_spawn(actor, false),
            Err(CoreError::OnCooldown { .. })
        ));
    }
    clock.advance(secs(1));
    plugin.advance(clock.now());
    assert!(plugin.try_spawn(actor, false).is_ok());
    assert_eq!(plugin.stats().rejected_cooldown, 9);
}

#[test]
fn round_start_resets_cap_but_keeps_props() {
    let mut plugin = PoopPlugin::with_seed(
        config(|c| {
            c.cooldowns.clear();
            c.lifecycle.max_per_round = 3;
            c.lifecycle.lifetime_secs = 0.0;
        }),
        SimHost::new(),
        8,
    )
    .unwrap();
    for actor in 0..3 {
        plugin.try_spawn(ActorId(actor), false).unwrap();
    }
    assert!(plugin.lifecycle().has_reached_round_cap());

    plugin.handle_round_event(RoundEvent::Start);
    assert_eq!(plugin.lifecycle().round_count(), 0);
    assert_eq!(plugin.lifecycle().count(), 3);
    assert_eq!(plugin.host().live_count(), 3);
    assert!(plugin.try_spawn(ActorId(9), false).is_ok());
}

#[test]
fn round_end_without_clear_keeps_props_forever() {
    let clock = ManualClock::new();
    let mut plugin = PoopPlugin::with_seed(
        config(|c| {
            c.cooldowns.clear();
            c.lifecycle.lifetime_secs = 30.0;
            c.lifecycle.clear_on_round_end = false;
        }),
        SimHost::new(),
        2,
    )
    .unwrap();
    let spawned = plugin.try_spawn(ActorId(1), true).unwrap();

    clock.advance(secs(10));
    plugin.advance(clock.now());
    plugin.handle_round_event(RoundEvent::End);

    // Round-scoped expiry was cancelled; the prop outlives its lifetime.
    clock.advance(secs(60));
    let report = plugin.advance(clock.now());
    assert_eq!(report.expired, 0);
    assert!(plugin.lifecycle().is_tracked(spawned.entity));
    assert!(plugin.host().is_valid(spawned.entity));
    // The rainbow effect is cleared at round end regardless.
    assert!(!plugin.rainbow().is_running());

    assert_eq!(plugin.shutdown(), 1);
    assert_eq!(plugin.host().live_count(), 0);
}

#[test]
fn round_end_with_clear_removes_all_and_stops_timers() {
    let mut plugin = PoopPlugin::with_seed(
        config(|c| {
            c.cooldowns.clear();
            c.lifecycle.clear_on_round_end = true;
        }),
        SimHost::new(),
        4,
    )
    .unwrap();
    for actor in 0..6 {
        plugin.try_spawn(ActorId(actor), actor % 2 == 0).unwrap();
    }
    assert_eq!(plugin.rainbow().tracked_count(), 3);

    plugin.handle_round_event(RoundEvent::End);
    assert_eq!(plugin.lifecycle().count(), 0);
    assert_eq!(plugin.rainbow().tracked_count(), 0);
    assert_eq!(plugin.rainbow().current_hue(), 0.0);
    assert!(plugin.timers().is_empty());
    assert_eq!(plugin.host().live_count(), 0);
}

#[test]
fn staggered_expiry_removes_props_in_order() {
    let clock = ManualClock::new();
    let mut plugin = PoopPlugin::with_seed(
        config(|c| {
            c.cooldowns.clear();
            c.lifecycle.lifetime_secs = 5.0;
        }),
        SimHost::new(),
        6,
    )
    .unwrap();
    let first = plugin.try_spawn(ActorId(1), false).unwrap();
    clock.advance(secs(2));
    plugin.advance(clock.now());
    let second = plugin.try_spawn(ActorId(2), false).unwrap();

    clock.advance(secs(3));
    assert_eq!(plugin.advance(clock.now()).expired, 1);
    assert!(!plugin.host().is_valid(first.entity));
    assert!(plugin.host().is_valid(second.entity));

    clock.advance(secs(2));
    assert_eq!(plugin.advance(clock.now()).expired, 1);
    assert_eq!(plugin.lifecycle().count(), 0);
    assert_eq!(plugin.stats().expired, 2);
}

#[test]
fn externally_destroyed_prop_is_dropped_from_animation() {
    let mut plugin = PoopPlugin::with_seed(
        config(|c| {
            c.cooldowns.clear();
            c.lifecycle.lifetime_secs = 0.0;
        }),
        SimHost::new(),
        1,
    )
    .unwrap();
    let a = plugin.try_spawn(ActorId(1), true).unwrap();
    let b = plugin.try_spawn(ActorId(2), true).unwrap();
    plugin.host_mut().despawn_externally(a.entity);

    plugin.advance(Duration::from_millis(100));
    assert!(!plugin.rainbow().is_tracked(a.entity));
    assert!(plugin.rainbow().is_tracked(b.entity));

    // Lifecycle still holds the stale record until cleanup, which tolerates
    // the failed destroy.
    assert!(plugin.lifecycle().is_tracked(a.entity));
    assert_eq!(plugin.shutdown(), 2);
    assert_eq!(plugin.lifecycle().count(), 0);
}

#[test]
fn destroy_failure_does_not_abort_shutdown() {
    let mut plugin = PoopPlugin::with_seed(
        config(|c| c.cooldowns.clear()),
        SimHost::new(),
        12,
    )
    .unwrap();
    let spawned: Vec<_> = (0..4)
        .map(|actor| plugin.try_spawn(ActorId(actor), false).unwrap())
        .collect();
    plugin.host_mut().fail_destroy_of(spawned[1].entity);

    assert_eq!(plugin.shutdown(), 4);
    assert_eq!(plugin.lifecycle().count(), 0);
    assert_eq!(plugin.host().live_count(), 1);
    assert!(plugin.timers().is_empty());
}
