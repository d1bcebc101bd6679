//! Round boundary notifications.

use serde::{Deserialize, Serialize};

/// A gameplay epoch boundary reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RoundEvent {
    /// A new round has begun. Per-round counters reset.
    Start,
    /// The current round is over. Round-scoped timers are cancelled.
    End,
}

impl std::fmt::Display for RoundEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RoundEvent::Start => f.write_str("round_start"),
            RoundEvent::End => f.write_str("round_end"),
        }
    }
}
