//! Turn scheduling and the planner seam.
//!
//! One call to [`TurnScheduler::run_turn`] (or its async twin) runs one
//! actor's turn:
//!
//! 1. A missing or defeated actor ends the turn immediately as
//!    [`TurnOutcome::Defeated`].
//! 2. Upkeep ticks statuses, decays attunement, regenerates pools and refills
//!    action points. If upkeep defeats the actor the planner is skipped.
//! 3. The planner is invoked exactly once and acts through the [`Battle`].
//! 4. Exactly one [`CombatEvent::TurnComplete`] is emitted, whichever path
//!    was taken and whether or not the planner failed.
//!
//! The scheduler never pays or refunds costs; [`Battle`] actions pay
//! atomically. A planner error aborts the rest of that actor's turn, but
//! anything it already paid stays paid.
//!
//! # Async
//!
//! [`AsyncPlanner::plan_turn`] is the only suspension point. The scheduler
//! holds `&mut Battle` across it, so nothing else can observe the battle
//! mid-turn.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::actor::{ActorId, Turn};
use crate::battle::{Battle, Refusal};
use crate::resolver::CombatEvent;
use crate::status::TickReport;

/// Where the scheduler is within the current turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TurnPhase {
    /// No turn in progress.
    #[default]
    Idle,
    /// The planner has been handed control.
    PlannerInvoked,
    /// The turn has completed.
    Resolved,
}

/// Whether the actor is still standing at the end of its turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurnOutcome {
    /// Still alive.
    Active,
    /// At zero HP or not in the roster.
    Defeated,
}

/// What a planner reports having done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decision {
    /// Performed `actions` successful actions.
    Acted {
        /// Number of actions that resolved.
        actions: u32,
    },
    /// Did nothing.
    Waited,
}

/// Planner failure. Recorded in the [`TurnReport`]; never fatal to the battle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    /// The planner gave up after an action was refused.
    #[error("action refused: {0}")]
    Refused(#[from] Refusal),
    /// Any other planner failure.
    #[error("planner failed: {0}")]
    Failed(String),
}

/// Chooses and performs an actor's actions for one turn.
pub trait Planner {
    /// Acts for `actor` through `battle`.
    ///
    /// # Errors
    ///
    /// Returns a [`PlanError`] to abort the rest of the turn.
    fn plan_turn(&mut self, actor: ActorId, battle: &mut Battle) -> Result<Decision, PlanError>;
}

impl<F> Planner for F
where
    F: FnMut(ActorId, &mut Battle) -> Result<Decision, PlanError>,
{
    fn plan_turn(&mut self, actor: ActorId, battle: &mut Battle) -> Result<Decision, PlanError> {
        self(actor, battle)
    }
}

/// Planner that may await external input (UI, network, AI service).
#[async_trait]
pub trait AsyncPlanner: Send {
    /// Acts for `actor` through `battle`.
    ///
    /// # Errors
    ///
    /// Returns a [`PlanError`] to abort the rest of the turn.
    async fn plan_turn(&mut self, actor: ActorId, battle: &mut Battle) -> Result<Decision, PlanError>;
}

/// Summary of one scheduled turn.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnReport {
    /// Actor whose turn it was.
    pub actor: ActorId,
    /// Battle turn.
    pub turn: Turn,
    /// Standing at the end of the turn.
    pub outcome: TurnOutcome,
    /// Planner result; `None` when the planner was skipped or failed.
    pub decision: Option<Decision>,
    /// Planner error, if any.
    pub error: Option<PlanError>,
    /// Upkeep ticks and expirations.
    pub upkeep: TickReport,
}

/// Runs turns and guarantees one completion event per turn.
#[derive(Debug, Clone, Default)]
pub struct TurnScheduler {
    phase: TurnPhase,
    turns_run: u64,
}

impl TurnScheduler {
    /// Creates an idle scheduler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Phase of the last (or current) turn.
    #[must_use]
    pub const fn phase(&self) -> TurnPhase {
        self.phase
    }

    /// Number of turns completed.
    #[must_use]
    pub const fn turns_run(&self) -> u64 {
        self.turns_run
    }

    /// Runs one turn for `actor` with a synchronous planner.
    pub fn run_turn(&mut self, battle: &mut Battle, actor: ActorId, planner: &mut dyn Planner) -> TurnReport {
        let upkeep = match self.begin(battle, actor) {
            Ok(upkeep) => upkeep,
            Err(report) => return report,
        };
        self.phase = TurnPhase::PlannerInvoked;
        let result = planner.plan_turn(actor, battle);
        self.finish(battle, actor, upkeep, Some(result))
    }

    /// Runs one turn for `actor` with an async planner.
    pub async fn run_turn_async(
        &mut self,
        battle: &mut Battle,
        actor: ActorId,
        planner: &mut dyn AsyncPlanner,
    ) -> TurnReport {
        let upkeep = match self.begin(battle, actor) {
            Ok(upkeep) => upkeep,
            Err(report) => return report,
        };
        self.phase = TurnPhase::PlannerInvoked;
        let result = planner.plan_turn(actor, battle).await;
        self.finish(battle, actor, upkeep, Some(result))
    }

    /// Upkeep. `Err` carries the finished report when the planner is skipped.
    fn begin(&mut self, battle: &mut Battle, actor: ActorId) -> Result<TickReport, TurnReport> {
        self.phase = TurnPhase::Idle;
        if !battle.roster().is_alive(actor) {
            debug!(%actor, turn = battle.turn(), "turn skipped, actor defeated");
            return Err(self.finish(battle, actor, TickReport::default(), None));
        }
        let upkeep = battle.upkeep(actor).unwrap_or_default();
        if !battle.roster().is_alive(actor) {
            debug!(%actor, turn = battle.turn(), "actor defeated during upkeep");
            return Err(self.finish(battle, actor, upkeep, None));
        }
        Ok(upkeep)
    }

    fn finish(
        &mut self,
        battle: &Battle,
        actor: ActorId,
        upkeep: TickReport,
        result: Option<Result<Decision, PlanError>>,
    ) -> TurnReport {
        let turn = battle.turn();
        let (decision, error) = match result {
            Some(Ok(decision)) => (Some(decision), None),
            Some(Err(err)) => {
                warn!(%actor, turn, error = %err, "planner failed");
                (None, Some(err))
            }
            None => (None, None),
        };
        let outcome = if battle.roster().is_alive(actor) {
            TurnOutcome::Active
        } else {
            TurnOutcome::Defeated
        };

        battle.events().emit(CombatEvent::TurnComplete {
            actor,
            turn,
            outcome,
            planner_failed: error.is_some(),
        });
        debug!(%actor, turn, ?outcome, ?decision, "turn complete");
        self.phase = TurnPhase::Resolved;
        self.turns_run += 1;

        TurnReport {
            actor,
            turn,
            outcome,
            decision,
            error,
            upkeep,
        }
    }
}

// =============================================================================
// Stock planner
// =============================================================================

/// Strikes the first hostile living actor in roster order.
///
/// Each action point goes to the first ready, affordable ability (in id
/// order), falling back to a basic attack. Stops when nothing can be done.
#[derive(Debug, Clone, Copy, Default)]
pub struct StrikePlanner;

impl StrikePlanner {
    fn target(actor: ActorId, battle: &Battle) -> Option<ActorId> {
        battle
            .roster()
            .iter()
            .filter(|a| a.id != actor && !a.is_defeated())
            .map(|a| a.id)
            .find(|id| battle.is_hostile(actor, *id))
    }

    fn act(actor: ActorId, battle: &mut Battle) -> Decision {
        let Some(target) = Self::target(actor, battle) else {
            return Decision::Waited;
        };
        let abilities: Vec<String> = battle
            .actor(actor)
            .map(|a| a.abilities.keys().cloned().collect())
            .unwrap_or_default();

        let mut actions = 0;
        while battle.roster().is_alive(target) {
            let acted = abilities.iter().any(|id| battle.use_ability(actor, id, target).is_ok())
                || battle.basic_attack(actor, target).is_ok();
            if !acted {
                break;
            }
            actions += 1;
        }
        if actions == 0 {
            Decision::Waited
        } else {
            Decision::Acted { actions }
        }
    }
}

impl Planner for StrikePlanner {
    fn plan_turn(&mut self, actor: ActorId, battle: &mut Battle) -> Result<Decision, PlanError> {
        Ok(Self::act(actor, battle))
    }
}

#[async_trait]
impl AsyncPlanner for StrikePlanner {
    async fn plan_turn(&mut self, actor: ActorId, battle: &mut Battle) -> Result<Decision, PlanError> {
        Ok(Self::act(actor, battle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::{Actor, Pool};
    use crate::context::{DamagePacket, StatusAttempt};
    use crate::resolver::EventLog;
    use std::sync::Arc;

    fn setup() -> (Battle, Arc<EventLog>, ActorId, ActorId) {
        let log = Arc::new(EventLog::new());
        let mut battle = Battle::new(7).with_events(log.clone());
        let a = battle.roster_mut().spawn(|id| {
            let mut actor = Actor::new(id, "striker", 20);
            actor.stamina = Pool::full(10);
            actor.weapon.packets = vec![DamagePacket::new("physical", 4.0)];
            actor
        });
        let b = battle.roster_mut().spawn(|id| Actor::new(id, "target", 20));
        (battle, log, a, b)
    }

    #[test]
    fn planner_runs_and_turn_completes_once() {
        let (mut battle, log, a, b) = setup();
        let mut scheduler = TurnScheduler::new();
        let report = scheduler.run_turn(&mut battle, a, &mut StrikePlanner);
        assert_eq!(report.outcome, TurnOutcome::Active);
        assert_eq!(report.decision, Some(Decision::Acted { actions: 1 }));
        assert_eq!(battle.actor(b).unwrap().hp.cur, 16);
        assert_eq!(log.turn_completions(), 1);
        assert_eq!(scheduler.phase(), TurnPhase::Resolved);
    }

    #[test]
    fn defeated_actor_skips_planner() {
        let (mut battle, log, a, _) = setup();
        battle.roster_mut().get_mut(a).unwrap().hp.drain(20);
        let mut calls = 0;
        let mut planner = |_: ActorId, _: &mut Battle| -> Result<Decision, PlanError> {
            calls += 1;
            Ok(Decision::Waited)
        };
        let report = TurnScheduler::new().run_turn(&mut battle, a, &mut planner);
        assert_eq!(report.outcome, TurnOutcome::Defeated);
        assert_eq!(calls, 0);
        assert_eq!(log.turn_completions(), 1);
    }

    #[test]
    fn missing_actor_is_defeated() {
        let (mut battle, log, _, _) = setup();
        let report = TurnScheduler::new().run_turn(&mut battle, ActorId::new(99), &mut StrikePlanner);
        assert_eq!(report.outcome, TurnOutcome::Defeated);
        assert_eq!(log.turn_completions(), 1);
    }

    #[test]
    fn upkeep_defeat_skips_planner() {
        let (mut battle, log, a, _) = setup();
        let actor = battle.roster_mut().get_mut(a).unwrap();
        actor.hp.set(2);
        crate::resolver::AttackResolver::default().statuses().apply(
            actor,
            &StatusAttempt::new("burn", 1.0, 3.0).with_potency(5.0),
            0,
        );
        battle.set_turn(1);
        let mut invoked = false;
        let mut planner = |_: ActorId, _: &mut Battle| -> Result<Decision, PlanError> {
            invoked = true;
            Ok(Decision::Waited)
        };
        let report = TurnScheduler::new().run_turn(&mut battle, a, &mut planner);
        assert!(!invoked);
        assert_eq!(report.outcome, TurnOutcome::Defeated);
        assert_eq!(report.upkeep.damage(), 2);
        assert_eq!(log.turn_completions(), 1);
    }

    #[test]
    fn planner_error_is_recorded_and_turn_completes() {
        let (mut battle, log, a, b) = setup();
        let mut planner = |actor: ActorId, battle: &mut Battle| -> Result<Decision, PlanError> {
            battle.basic_attack(actor, b)?;
            battle.basic_attack(actor, b)?;
            Ok(Decision::Acted { actions: 2 })
        };
        let report = TurnScheduler::new().run_turn(&mut battle, a, &mut planner);
        assert_eq!(report.error, Some(PlanError::Refused(Refusal::Cost)));
        assert!(report.decision.is_none());
        // the first swing stays paid
        assert_eq!(battle.actor(a).unwrap().stamina.cur, 8);
        let completions: Vec<_> = log.take_events().into_iter().filter(CombatEvent::is_turn_complete).collect();
        assert_eq!(
            completions,
            vec![CombatEvent::TurnComplete {
                actor: a,
                turn: 0,
                outcome: TurnOutcome::Active,
                planner_failed: true,
            }]
        );
    }

    #[test]
    fn strike_planner_waits_without_targets() {
        let mut battle = Battle::new(1);
        let a = battle.roster_mut().spawn(|id| Actor::new(id, "alone", 5));
        let report = TurnScheduler::new().run_turn(&mut battle, a, &mut StrikePlanner);
        assert_eq!(report.decision, Some(Decision::Waited));
    }

    #[tokio::test]
    async fn async_turn_matches_sync_turn() {
        let (mut sync_battle, _, a, b) = setup();
        let (mut async_battle, log, _, _) = setup();

        TurnScheduler::new().run_turn(&mut sync_battle, a, &mut StrikePlanner);
        let report = TurnScheduler::new()
            .run_turn_async(&mut async_battle, a, &mut StrikePlanner)
            .await;

        assert_eq!(report.decision, Some(Decision::Acted { actions: 1 }));
        assert_eq!(async_battle.actor(b), sync_battle.actor(b));
        assert_eq!(async_battle.rng_mut().state(), sync_battle.rng_mut().state());
        assert_eq!(log.turn_completions(), 1);
    }

    #[tokio::test]
    async fn async_planner_error_still_completes() {
        struct Flaky;

        #[async_trait]
        impl AsyncPlanner for Flaky {
            async fn plan_turn(&mut self, _actor: ActorId, _battle: &mut Battle) -> Result<Decision, PlanError> {
                tokio::task::yield_now().await;
                Err(PlanError::Failed("timeout".into()))
            }
        }

        let (mut battle, log, a, _) = setup();
        let report = TurnScheduler::new().run_turn_async(&mut battle, a, &mut Flaky).await;
        assert_eq!(report.error, Some(PlanError::Failed("timeout".into())));
        assert_eq!(report.outcome, TurnOutcome::Active);
        assert_eq!(log.turn_completions(), 1);
    }
}
