//! Combat events and event sinks.
//!
//! Events are the externally observable record of a battle. The core emits
//! them fire-and-forget through an [`EventSink`]; nothing the sink does feeds
//! back into resolution.
//!
//! [`EventLog`] buffers events for tests, replays and analysis layers and can
//! be drained with [`EventLog::take_events`]. [`NullSink`] discards them.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

use crate::actor::{ActorId, Turn};
use crate::context::{AttackContext, AttackTags};
use crate::rune::{RuneId, RuneEffectKind};
use crate::scheduler::TurnOutcome;

/// Something that happened in a battle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CombatEvent {
    /// One attack finished resolving.
    AttackResolved {
        /// Attacking actor.
        attacker: ActorId,
        /// Defending actor.
        defender: ActorId,
        /// Turn of resolution.
        turn: Turn,
        /// Attack tags.
        tags: AttackTags,
        /// Damage applied.
        total_damage: u32,
        /// Post-defense damage per type.
        by_type: BTreeMap<String, u64>,
        /// Defender HP before.
        hp_before: u32,
        /// Defender HP after.
        hp_after: u32,
        /// Statuses that landed.
        applied_statuses: Vec<String>,
    },
    /// Status ticks or expirations during an actor's upkeep.
    StatusTicked {
        /// Bearer.
        actor: ActorId,
        /// Turn.
        turn: Turn,
        /// HP removed by ticks.
        damage: u32,
        /// Ids that expired.
        expired: Vec<String>,
    },
    /// A rune effect executed.
    RuneTriggered {
        /// Rune instance.
        rune: RuneId,
        /// Rune owner.
        owner: ActorId,
        /// Actor whose interaction triggered it.
        triggered_by: ActorId,
        /// Turn.
        turn: Turn,
        /// Which effect ran.
        effect: RuneEffectKind,
        /// True if the rune was used up and removed.
        exhausted: bool,
    },
    /// An actor's turn ended.
    TurnComplete {
        /// Actor.
        actor: ActorId,
        /// Turn.
        turn: Turn,
        /// Whether the actor ended the turn defeated.
        outcome: TurnOutcome,
        /// True if the planner returned an error.
        planner_failed: bool,
    },
}

impl CombatEvent {
    /// Builds the resolution event for a finished context.
    #[must_use]
    pub fn from_context(ctx: &AttackContext) -> Self {
        Self::AttackResolved {
            attacker: ctx.attacker,
            defender: ctx.defender,
            turn: ctx.turn,
            tags: ctx.tags,
            total_damage: ctx.total_damage,
            by_type: ctx.by_type(),
            hp_before: ctx.hp_before,
            hp_after: ctx.hp_after,
            applied_statuses: ctx.applied_statuses.clone(),
        }
    }

    /// Returns true for [`CombatEvent::TurnComplete`].
    #[must_use]
    pub const fn is_turn_complete(&self) -> bool {
        matches!(self, Self::TurnComplete { .. })
    }
}

/// Receiver of combat events.
pub trait EventSink: Send + Sync {
    /// Records an event. Must not fail or block for long.
    fn emit(&self, event: CombatEvent);
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: CombatEvent) {}
}

/// Buffers events in emission order.
///
/// # Thread Safety
///
/// The buffer sits behind a `Mutex` to satisfy `Send + Sync`, even though a
/// battle emits from one thread. A poisoned lock is recovered rather than
/// propagated; the buffer holds plain data, so it is still consistent.
#[derive(Debug, Default)]
pub struct EventLog {
    events: Mutex<Vec<CombatEvent>>,
}

impl EventLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<CombatEvent>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Drains and returns all recorded events.
    pub fn take_events(&self) -> Vec<CombatEvent> {
        std::mem::take(&mut *self.lock())
    }

    /// Copies the recorded events without draining.
    #[must_use]
    pub fn events(&self) -> Vec<CombatEvent> {
        self.lock().clone()
    }

    /// Number of recorded events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns true if nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Number of [`CombatEvent::TurnComplete`] events recorded.
    #[must_use]
    pub fn turn_completions(&self) -> usize {
        self.lock().iter().filter(|e| e.is_turn_complete()).count()
    }

    /// Clears the log.
    pub fn clear(&self) {
        self.lock().clear();
    }
}

impl EventSink for EventLog {
    fn emit(&self, event: CombatEvent) {
        self.lock().push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turn_complete(actor: u64) -> CombatEvent {
        CombatEvent::TurnComplete {
            actor: ActorId::new(actor),
            turn: 1,
            outcome: TurnOutcome::Active,
            planner_failed: false,
        }
    }

    #[test]
    fn log_keeps_emission_order() {
        let log = EventLog::new();
        log.emit(turn_complete(1));
        log.emit(turn_complete(2));
        let events = log.take_events();
        assert_eq!(events, vec![turn_complete(1), turn_complete(2)]);
    }

    #[test]
    fn take_events_drains_log() {
        let log = EventLog::new();
        log.emit(turn_complete(1));
        assert_eq!(log.len(), 1);
        assert_eq!(log.take_events().len(), 1);
        assert!(log.is_empty());
        assert!(log.take_events().is_empty());
    }

    #[test]
    fn clear_empties_log() {
        let log = EventLog::new();
        log.emit(turn_complete(1));
        log.clear();
        assert!(log.is_empty());
    }

    #[test]
    fn counts_turn_completions() {
        let log = EventLog::new();
        log.emit(turn_complete(1));
        log.emit(CombatEvent::StatusTicked {
            actor: ActorId::new(1),
            turn: 1,
            damage: 2,
            expired: vec![],
        });
        log.emit(turn_complete(2));
        assert_eq!(log.turn_completions(), 2);
    }

    #[test]
    fn null_sink_accepts_everything() {
        NullSink.emit(turn_complete(1));
    }

    #[test]
    fn sinks_are_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<EventLog>();
        assert_send_sync::<NullSink>();
    }
}
