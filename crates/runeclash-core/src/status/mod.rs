//! Status effects: registry, behaviors and the stacking/expiry engine.
//!
//! A status id maps to a [`StatusDef`] in the [`StatusRegistry`]. The
//! definition decides how repeated applications combine ([`StackPolicy`]) and
//! which [`StatusBehavior`] hooks run on apply, tick and expiry.
//!
//! # Damage Routing
//!
//! Behaviors never touch HP themselves. `on_tick` returns a [`TickEffect`] and
//! the [`StatusEngine`] routes its damage through the [`DamageFn`] it was
//! constructed with. The attack resolver sends direct hits through the same
//! function via [`StatusEngine::deal_damage`], so one injected function
//! governs every HP loss in a battle.
//!
//! # Lifecycle
//!
//! ```text
//! attempt rolled -> apply (new: on_apply | existing: stack or refresh)
//!                -> tick every upkeep while next_tick_at <= turn < ends_at
//!                -> expire once ends_at <= turn (on_expire, removed)
//! ```

pub mod attunement;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::actor::{apply_damage, neutral_if_invalid, Actor, Turn};
use crate::context::{floor_amount, sanitize_amount, StatusAttempt};

pub use attunement::{AttunementConfig, AttunementRule, AttunementTier};

/// Injected HP mutation used for hit and status damage alike.
pub type DamageFn = Arc<dyn Fn(&mut Actor, u32) -> u32 + Send + Sync>;

/// An active status on an actor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusInstance {
    /// Status id.
    pub id: String,
    /// Current stacks, at least 1.
    pub stacks: u32,
    /// Potency; meaning depends on the behavior.
    pub potency: f64,
    /// Turn at which the status is removed.
    pub ends_at: Turn,
    /// Next turn at which the status ticks.
    pub next_tick_at: Turn,
}

/// Whether a status helps or harms its bearer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusKind {
    /// Beneficial; duration scaled by `buff_dur_mult`.
    Buff,
    /// Harmful; duration scaled by `debuff_dur_mult`.
    Debuff,
}

/// How a repeat application of an active status combines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StackPolicy {
    /// Add stacks up to `max`; keep the later end turn.
    Stack {
        /// Stack ceiling.
        max: u32,
    },
    /// Reset the end turn; keep the higher potency.
    Refresh,
}

bitflags! {
    /// Static traits of a status definition.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct StatusTraits: u8 {
        /// Bearer cannot act while the status is active.
        const DISABLES_ACTIONS = 1 << 0;
        /// Deals damage on tick.
        const DAMAGE_OVER_TIME = 1 << 1;
        /// Counts as a buff for display and cleansing.
        const BENEFICIAL = 1 << 2;
    }
}

/// What happened when an attempt landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApplyOutcome {
    /// A new instance was created.
    Applied,
    /// Stacks were added to an existing instance.
    Stacked,
    /// An existing instance's duration was reset.
    Refreshed,
}

/// Result of one tick hook.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TickEffect {
    /// Damage to route through the engine's damage function.
    pub damage: f64,
}

/// Behavior hooks for a status id.
pub trait StatusBehavior: Send + Sync {
    /// Runs once when a new instance is created.
    fn on_apply(&self, _actor: &mut Actor, _instance: &StatusInstance) {}

    /// Runs on each tick. Damage is applied by the engine, not the hook.
    fn on_tick(&self, _actor: &Actor, _instance: &StatusInstance, _turn: Turn) -> TickEffect {
        TickEffect::default()
    }

    /// Runs once when the instance is removed by expiry.
    fn on_expire(&self, _actor: &mut Actor, _instance: &StatusInstance) {}
}

/// No hooks. Used for marker statuses such as stun.
#[derive(Debug, Clone, Copy, Default)]
pub struct Inert;

impl StatusBehavior for Inert {}

/// Deals `potency x stacks` each tick.
#[derive(Debug, Clone, Copy, Default)]
pub struct DamageOverTime;

impl StatusBehavior for DamageOverTime {
    fn on_tick(&self, _actor: &Actor, instance: &StatusInstance, _turn: Turn) -> TickEffect {
        TickEffect {
            damage: sanitize_amount(instance.potency) * f64::from(instance.stacks),
        }
    }
}

/// Grants one extra action point when first applied.
#[derive(Debug, Clone, Copy, Default)]
pub struct Haste;

impl StatusBehavior for Haste {
    fn on_apply(&self, actor: &mut Actor, _instance: &StatusInstance) {
        actor.ap.max += 1;
        actor.ap.restore(1);
    }

    fn on_expire(&self, actor: &mut Actor, _instance: &StatusInstance) {
        actor.ap.max = actor.ap.max.saturating_sub(1);
        actor.ap.set(actor.ap.cur);
    }
}

/// Definition of a status id.
#[derive(Clone)]
pub struct StatusDef {
    /// Status id.
    pub id: String,
    /// Buff or debuff.
    pub kind: StatusKind,
    /// Repeat-application policy.
    pub stacking: StackPolicy,
    /// Turns between ticks, at least 1.
    pub tick_interval: Turn,
    /// Static traits.
    pub traits: StatusTraits,
    /// Hooks.
    pub behavior: Arc<dyn StatusBehavior>,
}

impl fmt::Debug for StatusDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatusDef")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("stacking", &self.stacking)
            .field("tick_interval", &self.tick_interval)
            .field("traits", &self.traits)
            .finish_non_exhaustive()
    }
}

impl StatusDef {
    /// Creates a definition with inert behavior and a one-turn tick interval.
    #[must_use]
    pub fn new(id: &str, kind: StatusKind, stacking: StackPolicy) -> Self {
        Self {
            id: id.to_string(),
            kind,
            stacking,
            tick_interval: 1,
            traits: StatusTraits::empty(),
            behavior: Arc::new(Inert),
        }
    }

    /// Sets the behavior.
    #[must_use]
    pub fn with_behavior(mut self, behavior: Arc<dyn StatusBehavior>) -> Self {
        self.behavior = behavior;
        self
    }

    /// Sets the traits.
    #[must_use]
    pub fn with_traits(mut self, traits: StatusTraits) -> Self {
        self.traits = traits;
        self
    }
}

/// Status definitions by id.
#[derive(Debug, Clone, Default)]
pub struct StatusRegistry {
    defs: BTreeMap<String, StatusDef>,
}

impl StatusRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The stock statuses: burn, poison, bleed, stun and haste.
    #[must_use]
    pub fn standard() -> Self {
        let mut registry = Self::new();
        let dot: Arc<dyn StatusBehavior> = Arc::new(DamageOverTime);
        registry.register(
            StatusDef::new("burn", StatusKind::Debuff, StackPolicy::Stack { max: 5 })
                .with_behavior(Arc::clone(&dot))
                .with_traits(StatusTraits::DAMAGE_OVER_TIME),
        );
        registry.register(
            StatusDef::new("poison", StatusKind::Debuff, StackPolicy::Stack { max: 3 })
                .with_behavior(Arc::clone(&dot))
                .with_traits(StatusTraits::DAMAGE_OVER_TIME),
        );
        registry.register(
            StatusDef::new("bleed", StatusKind::Debuff, StackPolicy::Refresh)
                .with_behavior(dot)
                .with_traits(StatusTraits::DAMAGE_OVER_TIME),
        );
        registry.register(
            StatusDef::new("stun", StatusKind::Debuff, StackPolicy::Refresh)
                .with_traits(StatusTraits::DISABLES_ACTIONS),
        );
        registry.register(
            StatusDef::new("haste", StatusKind::Buff, StackPolicy::Refresh)
                .with_behavior(Arc::new(Haste))
                .with_traits(StatusTraits::BENEFICIAL),
        );
        registry
    }

    /// Adds or replaces a definition.
    pub fn register(&mut self, def: StatusDef) {
        self.defs.insert(def.id.clone(), def);
    }

    /// Looks up a definition.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&StatusDef> {
        self.defs.get(id)
    }
}

/// Damage dealt by one status tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusTick {
    /// Status id.
    pub id: String,
    /// HP actually removed.
    pub damage: u32,
}

/// Everything one upkeep tick did to an actor.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TickReport {
    /// Ticks in status order.
    pub ticks: Vec<StatusTick>,
    /// Ids removed by expiry, in status order.
    pub expired: Vec<String>,
}

impl TickReport {
    /// Total HP removed by ticks.
    #[must_use]
    pub fn damage(&self) -> u32 {
        self.ticks.iter().map(|t| t.damage).sum()
    }
}

/// Applies, ticks and expires statuses.
#[derive(Clone)]
pub struct StatusEngine {
    registry: StatusRegistry,
    apply_damage: DamageFn,
}

impl fmt::Debug for StatusEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatusEngine")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl Default for StatusEngine {
    fn default() -> Self {
        Self::new(StatusRegistry::standard(), Arc::new(apply_damage))
    }
}

impl StatusEngine {
    /// Creates an engine over `registry` that routes all damage, hits and
    /// ticks, through `apply_damage`.
    #[must_use]
    pub fn new(registry: StatusRegistry, apply_damage: DamageFn) -> Self {
        Self {
            registry,
            apply_damage,
        }
    }

    /// The registry.
    #[must_use]
    pub fn registry(&self) -> &StatusRegistry {
        &self.registry
    }

    /// Removes up to `amount` HP from `actor` through the injected damage
    /// function. Returns the HP actually removed.
    pub fn deal_damage(&self, actor: &mut Actor, amount: u32) -> u32 {
        (self.apply_damage)(actor, amount)
    }

    /// Applies a landed attempt to `actor`.
    ///
    /// Returns `None` for malformed attempts, which are dropped silently.
    pub fn apply(&self, actor: &mut Actor, attempt: &StatusAttempt, turn: Turn) -> Option<ApplyOutcome> {
        if !attempt.is_well_formed() {
            return None;
        }
        let def = self.registry.get(&attempt.id);
        let kind = def.map_or(StatusKind::Debuff, |d| d.kind);
        let stacking = def.map_or(StackPolicy::Refresh, |d| d.stacking);
        let interval = def.map_or(1, |d| d.tick_interval.max(1));

        let mult = match kind {
            StatusKind::Buff => actor.mod_cache.buff_dur_mult,
            StatusKind::Debuff => actor.mod_cache.debuff_dur_mult,
        };
        let ends_at = turn + scaled_duration(attempt.base_duration, mult);
        let add_stacks = attempt.stacks.unwrap_or(1).max(1);
        let potency = sanitize_amount(attempt.potency.unwrap_or(1.0));

        if let Some(existing) = actor.statuses.iter_mut().find(|s| s.id == attempt.id) {
            let outcome = match stacking {
                StackPolicy::Stack { max } => {
                    existing.stacks = existing.stacks.saturating_add(add_stacks).min(max.max(1));
                    existing.ends_at = existing.ends_at.max(ends_at);
                    ApplyOutcome::Stacked
                }
                StackPolicy::Refresh => {
                    existing.ends_at = ends_at;
                    ApplyOutcome::Refreshed
                }
            };
            existing.potency = existing.potency.max(potency);
            debug!(status = %attempt.id, actor = %actor.id, ?outcome, ends_at, "status reapplied");
            return Some(outcome);
        }

        let stacks = match stacking {
            StackPolicy::Stack { max } => add_stacks.min(max.max(1)),
            StackPolicy::Refresh => add_stacks,
        };
        let instance = StatusInstance {
            id: attempt.id.clone(),
            stacks,
            potency,
            ends_at,
            next_tick_at: turn + interval,
        };
        if let Some(def) = def {
            def.behavior.on_apply(actor, &instance);
        }
        debug!(status = %instance.id, actor = %actor.id, ends_at, "status applied");
        actor.statuses.push(instance);
        Some(ApplyOutcome::Applied)
    }

    /// Ticks and expires statuses for `turn`.
    pub fn tick(&self, actor: &mut Actor, turn: Turn) -> TickReport {
        let mut report = TickReport::default();

        for idx in 0..actor.statuses.len() {
            let instance = actor.statuses[idx].clone();
            if instance.next_tick_at > turn || turn >= instance.ends_at {
                continue;
            }
            let def = self.registry.get(&instance.id);
            let interval = def.map_or(1, |d| d.tick_interval.max(1));
            actor.statuses[idx].next_tick_at = turn + interval;

            let Some(def) = def else { continue };
            let effect = def.behavior.on_tick(actor, &instance, turn);
            let amount = u32::try_from(floor_amount(effect.damage)).unwrap_or(u32::MAX);
            if amount > 0 {
                let dealt = self.deal_damage(actor, amount);
                report.ticks.push(StatusTick {
                    id: instance.id.clone(),
                    damage: dealt,
                });
            }
        }

        let (expired, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut actor.statuses)
            .into_iter()
            .partition(|s| s.ends_at <= turn);
        actor.statuses = kept;
        for instance in expired {
            if let Some(def) = self.registry.get(&instance.id) {
                def.behavior.on_expire(actor, &instance);
            }
            debug!(status = %instance.id, actor = %actor.id, turn, "status expired");
            report.expired.push(instance.id);
        }

        report
    }

    /// Returns true if any active status prevents acting.
    #[must_use]
    pub fn is_disabled(&self, actor: &Actor) -> bool {
        actor.statuses.iter().any(|s| {
            self.registry
                .get(&s.id)
                .is_some_and(|d| d.traits.contains(StatusTraits::DISABLES_ACTIONS))
        })
    }
}

/// `ceil(base x mult)`, at least one turn.
fn scaled_duration(base: f64, mult: f64) -> Turn {
    let turns = (sanitize_amount(base) * neutral_if_invalid(mult)).ceil();
    // durations are small turn counts
    #[allow(clippy::cast_possible_truncation)]
    let turns = turns.min(1_000_000.0) as Turn;
    turns.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::ActorId;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn actor() -> Actor {
        Actor::new(ActorId::new(1), "bearer", 50)
    }

    mod apply_tests {
        use super::*;

        #[test]
        fn haste_end_turn_uses_buff_multiplier() {
            let engine = StatusEngine::default();
            let mut a = actor();
            a.mod_cache.buff_dur_mult = 1.0;
            let outcome = engine.apply(&mut a, &StatusAttempt::new("haste", 1.0, 2.0), 1);
            assert_eq!(outcome, Some(ApplyOutcome::Applied));
            assert_eq!(a.status("haste").unwrap().ends_at, 3);
        }

        #[test]
        fn debuff_multiplier_rounds_up() {
            let engine = StatusEngine::default();
            let mut a = actor();
            a.mod_cache.debuff_dur_mult = 1.25;
            engine.apply(&mut a, &StatusAttempt::new("bleed", 1.0, 3.0), 0);
            assert_eq!(a.status("bleed").unwrap().ends_at, 4);
        }

        #[test]
        fn stack_policy_caps_at_max() {
            let engine = StatusEngine::default();
            let mut a = actor();
            let attempt = StatusAttempt::new("burn", 1.0, 2.0).with_stacks(2);
            engine.apply(&mut a, &attempt, 1);
            engine.apply(&mut a, &attempt, 1);
            let outcome = engine.apply(&mut a, &attempt, 2);
            assert_eq!(outcome, Some(ApplyOutcome::Stacked));
            let burn = a.status("burn").unwrap();
            assert_eq!(burn.stacks, 5);
            assert_eq!(burn.ends_at, 4);
        }

        #[test]
        fn refresh_policy_resets_end_and_keeps_stacks() {
            let engine = StatusEngine::default();
            let mut a = actor();
            engine.apply(&mut a, &StatusAttempt::new("bleed", 1.0, 5.0).with_potency(2.0), 1);
            let outcome = engine.apply(&mut a, &StatusAttempt::new("bleed", 1.0, 2.0), 3);
            assert_eq!(outcome, Some(ApplyOutcome::Refreshed));
            let bleed = a.status("bleed").unwrap();
            assert_eq!(bleed.stacks, 1);
            assert_eq!(bleed.ends_at, 5);
            assert_eq!(bleed.potency, 2.0);
        }

        #[test]
        fn malformed_attempt_is_dropped() {
            let engine = StatusEngine::default();
            let mut a = actor();
            assert_eq!(engine.apply(&mut a, &StatusAttempt::new("", 1.0, 2.0), 1), None);
            assert!(a.statuses.is_empty());
        }

        #[test]
        fn unregistered_status_refreshes() {
            let engine = StatusEngine::default();
            let mut a = actor();
            engine.apply(&mut a, &StatusAttempt::new("marked", 1.0, 2.0), 1);
            let outcome = engine.apply(&mut a, &StatusAttempt::new("marked", 1.0, 4.0), 1);
            assert_eq!(outcome, Some(ApplyOutcome::Refreshed));
            assert_eq!(a.status("marked").unwrap().ends_at, 5);
        }

        #[test]
        fn haste_grants_action_point_until_expiry() {
            let engine = StatusEngine::default();
            let mut a = actor();
            a.ap.cur = 0;
            engine.apply(&mut a, &StatusAttempt::new("haste", 1.0, 1.0), 1);
            assert_eq!(a.ap.max, 2);
            assert_eq!(a.ap.cur, 1);
            engine.tick(&mut a, 2);
            assert_eq!(a.ap.max, 1);
            assert!(a.status("haste").is_none());
        }
    }

    mod tick_tests {
        use super::*;

        #[test]
        fn damage_over_time_scales_with_stacks() {
            let engine = StatusEngine::default();
            let mut a = actor();
            let attempt = StatusAttempt::new("burn", 1.0, 3.0).with_potency(2.0).with_stacks(3);
            engine.apply(&mut a, &attempt, 1);
            let report = engine.tick(&mut a, 2);
            assert_eq!(report.damage(), 6);
            assert_eq!(a.hp.cur, 44);
        }

        #[test]
        fn ticks_stop_and_status_expires_at_end_turn() {
            let engine = StatusEngine::default();
            let mut a = actor();
            engine.apply(&mut a, &StatusAttempt::new("bleed", 1.0, 2.0).with_potency(3.0), 1);
            assert_eq!(engine.tick(&mut a, 2).damage(), 3);
            let last = engine.tick(&mut a, 3);
            assert_eq!(last.damage(), 0);
            assert_eq!(last.expired, vec!["bleed".to_string()]);
            assert!(a.statuses.is_empty());
        }

        #[test]
        fn same_turn_tick_is_skipped() {
            let engine = StatusEngine::default();
            let mut a = actor();
            engine.apply(&mut a, &StatusAttempt::new("poison", 1.0, 3.0), 4);
            assert!(engine.tick(&mut a, 4).ticks.is_empty());
        }

        #[test]
        fn tick_damage_goes_through_injected_function() {
            let calls = Arc::new(AtomicU32::new(0));
            let seen = Arc::clone(&calls);
            let engine = StatusEngine::new(
                StatusRegistry::standard(),
                Arc::new(move |actor: &mut Actor, amount: u32| {
                    seen.fetch_add(amount, Ordering::SeqCst);
                    actor.hp.drain(amount / 2)
                }),
            );
            let mut a = actor();
            engine.apply(&mut a, &StatusAttempt::new("burn", 1.0, 3.0).with_potency(4.0), 1);
            let report = engine.tick(&mut a, 2);
            assert_eq!(calls.load(Ordering::SeqCst), 4);
            assert_eq!(report.damage(), 2);
            assert_eq!(a.hp.cur, 48);
        }

        #[test]
        fn stun_disables_until_expiry() {
            let engine = StatusEngine::default();
            let mut a = actor();
            engine.apply(&mut a, &StatusAttempt::new("stun", 1.0, 1.0), 1);
            assert!(engine.is_disabled(&a));
            engine.tick(&mut a, 2);
            assert!(!engine.is_disabled(&a));
        }
    }
}
