//! Cooperative timers as explicit task records.
//!
//! Timer callbacks are not closures. A caller schedules a task value `T`
//! (typically an enum naming the work, such as "expire entity X") and gets a
//! generational [`TimerId`] back. The host later [`poll`](TimerQueue::poll)s
//! the queue on its own tick and dispatches the fired task records itself, so
//! cancellation and re-entrancy are checked against the id, never against a
//! captured object.
//!
//! Cancelling an id that already fired, was already cancelled, or was never
//! issued is a no-op.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::entity::{EntityHandle, HandleTable};

/// Smallest permitted repeat interval. Shorter intervals are raised to this.
pub const MIN_REPEAT_INTERVAL: Duration = Duration::from_millis(1);

// ---------------------------------------------------------------------------
// TimerId
// ---------------------------------------------------------------------------

/// Generational identifier of a scheduled task.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimerId(u64);

impl TimerId {
    fn from_slot(handle: EntityHandle) -> Self {
        Self(handle.to_raw())
    }

    fn slot(self) -> EntityHandle {
        EntityHandle::from_raw(self.0)
    }
}

impl fmt::Debug for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slot = self.slot();
        write!(f, "TimerId({}v{})", slot.index(), slot.generation())
    }
}

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer:{}", self.slot())
    }
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// The scheduling interface consumed by the core.
pub trait Scheduler<T> {
    /// Fire `task` once, `delay` after the scheduler's current time.
    fn schedule_once(&mut self, delay: Duration, task: T, cancel_on_round_end: bool) -> TimerId;

    /// Fire `task` every `interval`, starting one interval from now.
    fn schedule_repeating(
        &mut self,
        interval: Duration,
        task: T,
        cancel_on_round_end: bool,
    ) -> TimerId;

    /// Cancel a pending task. No-op for unknown or already-finished ids.
    fn cancel(&mut self, id: TimerId);

    /// Returns `true` while the task is pending (one-shot not yet fired, or
    /// repeating and not cancelled).
    fn is_valid(&self, id: TimerId) -> bool;
}

// ---------------------------------------------------------------------------
// TimerQueue
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct Entry<T> {
    due: Duration,
    interval: Option<Duration>,
    cancel_on_round_end: bool,
    /// Insertion order, used to break ties between equal due times.
    seq: u64,
    task: T,
}

/// A task that became due during [`TimerQueue::poll`].
#[derive(Debug, Clone, PartialEq)]
pub struct FiredTimer<T> {
    pub id: TimerId,
    pub task: T,
}

/// Reference [`Scheduler`] driven by explicit [`poll`](Self::poll) calls.
///
/// Time is a [`Duration`] since host start, supplied by the caller. Tasks
/// scheduled between polls are relative to the time of the last poll.
#[derive(Debug)]
pub struct TimerQueue<T> {
    entries: HandleTable<Entry<T>>,
    now: Duration,
    next_seq: u64,
}

impl<T: Clone> TimerQueue<T> {
    pub fn new() -> Self {
        Self {
            entries: HandleTable::new(),
            now: Duration::ZERO,
            next_seq: 0,
        }
    }

    /// Time of the most recent poll.
    pub fn now(&self) -> Duration {
        self.now
    }

    /// Number of pending tasks.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Advance the clock to `now` and return every task that became due, in
    /// due-time order (ties broken by scheduling order).
    ///
    /// One-shot ids are invalid by the time they are returned. A repeating
    /// task fires at most once per poll; if several intervals were skipped its
    /// next due time is moved past `now` instead of firing a burst.
    pub fn poll(&mut self, now: Duration) -> Vec<FiredTimer<T>> {
        if now > self.now {
            self.now = now;
        }
        let now = self.now;

        let mut due: Vec<(Duration, u64, EntityHandle)> = self
            .entries
            .iter()
            .filter(|(_, e)| e.due <= now)
            .map(|(h, e)| (e.due, e.seq, h))
            .collect();
        due.sort();

        let mut fired = Vec::with_capacity(due.len());
        for (_, _, slot) in due {
            let id = TimerId::from_slot(slot);
            let repeat = self.entries.get(slot).and_then(|e| e.interval);
            match repeat {
                Some(interval) => {
                    if let Some(entry) = self.entries.get_mut(slot) {
                        entry.due = next_due(entry.due, interval, now);
                        fired.push(FiredTimer {
                            id,
                            task: entry.task.clone(),
                        });
                    }
                }
                None => {
                    if let Some(entry) = self.entries.remove(slot) {
                        fired.push(FiredTimer {
                            id,
                            task: entry.task,
                        });
                    }
                }
            }
        }

        if !fired.is_empty() {
            tracing::trace!(count = fired.len(), now_ms = now.as_millis() as u64, "timers fired");
        }
        fired
    }

    /// Cancel every task scheduled with `cancel_on_round_end`.
    ///
    /// Returns the number of tasks cancelled.
    pub fn on_round_end(&mut self) -> usize {
        let flagged: Vec<EntityHandle> = self
            .entries
            .iter()
            .filter(|(_, e)| e.cancel_on_round_end)
            .map(|(h, _)| h)
            .collect();
        for slot in &flagged {
            self.entries.remove(*slot);
        }
        if !flagged.is_empty() {
            tracing::debug!(cancelled = flagged.len(), "round-scoped timers cancelled");
        }
        flagged.len()
    }

    fn push(
        &mut self,
        delay: Duration,
        interval: Option<Duration>,
        task: T,
        cancel_on_round_end: bool,
    ) -> TimerId {
        let seq = self.next_seq;
        self.next_seq += 1;
        let slot = self.entries.insert(Entry {
            // An unrepresentable due time never fires.
            due: self.now.checked_add(delay).unwrap_or(Duration::MAX),
            interval,
            cancel_on_round_end,
            seq,
            task,
        });
        TimerId::from_slot(slot)
    }
}

/// First multiple of `interval` after `due` that lies strictly past `now`.
///
/// Requires `due <= now` and a non-zero `interval`. Saturates at
/// [`Duration::MAX`].
fn next_due(due: Duration, interval: Duration, now: Duration) -> Duration {
    let step = interval.as_nanos().max(1);
    let skipped = (now - due).as_nanos() / step + 1;
    let next = due
        .as_nanos()
        .saturating_add(skipped.saturating_mul(step));
    match u64::try_from(next / 1_000_000_000) {
        Ok(secs) => Duration::new(secs, (next % 1_000_000_000) as u32),
        Err(_) => Duration::MAX,
    }
}

impl<T: Clone> Default for TimerQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> Scheduler<T> for TimerQueue<T> {
    fn schedule_once(&mut self, delay: Duration, task: T, cancel_on_round_end: bool) -> TimerId {
        self.push(delay, None, task, cancel_on_round_end)
    }

    fn schedule_repeating(
        &mut self,
        interval: Duration,
        task: T,
        cancel_on_round_end: bool,
    ) -> TimerId {
        let interval = interval.max(MIN_REPEAT_INTERVAL);
        self.push(interval, Some(interval), task, cancel_on_round_end)
    }

    fn cancel(&mut self, id: TimerId) {
        self.entries.remove(id.slot());
    }

    fn is_valid(&self, id: TimerId) -> bool {
        self.entries.contains(id.slot())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
