//! The battle world: roster, RNG, resolver, runes and the actions planners call.
//!
//! A [`Battle`] owns everything one match mutates. Planners receive it by
//! `&mut` and act through its methods:
//!
//! - [`Battle::basic_attack`]: weapon swing, costs stamina and one AP
//! - [`Battle::use_ability`]: cooldown-limited ability
//! - [`Battle::cast_spell`]: learned spell gated by its [`TriggerState`](crate::trigger::TriggerState)
//! - [`Battle::try_trigger`]: fire a placed rune
//!
//! # Refusals
//!
//! Actions that cannot proceed return `Err(`[`Refusal`]`)` before touching any
//! state. Checks run in a fixed order: unknown, stunned, cooldown, cost,
//! no-target. Once every check passes, all costs are paid together and the
//! attack resolves.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::actor::{
    Actor, ActorId, FactionService, FactionTable, Roster, Turn, BASIC_ATTACK_STAMINA_COST, DEFAULT_AP_COST,
};
use crate::context::{AttackContext, AttackIntent, AttackTags};
use crate::resolver::{AttackResolver, CombatEvent, EventSink, NullSink};
use crate::rng::CombatRng;
use crate::rune::{HazardPlacer, NoHazards, RuneDef, RuneEffect, RuneId, RuneStore};
use crate::spell::{SpellDef, SpellSlot};
use crate::status::TickReport;

/// Why an action was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Error)]
pub enum Refusal {
    /// The actor, ability or spell does not exist.
    #[error("unknown")]
    Unknown,
    /// A status prevents acting.
    #[error("stunned")]
    Stunned,
    /// The ability or spell is not ready.
    #[error("cooldown")]
    Cooldown,
    /// A resource pool cannot cover the cost.
    #[error("cost")]
    Cost,
    /// The target is missing, defeated or the actor itself.
    #[error("no-target")]
    NoTarget,
}

impl Refusal {
    /// Stable reason string.
    #[must_use]
    pub const fn reason(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Stunned => "stunned",
            Self::Cooldown => "cooldown",
            Self::Cost => "cost",
            Self::NoTarget => "no-target",
        }
    }
}

/// Resources an action spends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ActionCost {
    /// Stamina.
    pub stamina: u32,
    /// Mana.
    pub mana: u32,
    /// Action points.
    pub ap: u32,
}

impl ActionCost {
    /// Returns true if every pool covers its share.
    #[must_use]
    pub const fn affordable(&self, actor: &Actor) -> bool {
        actor.stamina.can_pay(self.stamina) && actor.mana.can_pay(self.mana) && actor.ap.can_pay(self.ap)
    }

    /// Pays all shares. Callers check [`ActionCost::affordable`] first.
    fn pay(self, actor: &mut Actor) {
        actor.stamina.drain(self.stamina);
        actor.mana.drain(self.mana);
        actor.ap.drain(self.ap);
    }
}

/// What a rune trigger attempt did.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TriggerOutcome {
    /// The effect ran and the rune's state was consumed.
    pub fired: bool,
    /// A seal blocked the triggering interaction.
    pub blocked: bool,
    /// The rune used its last charge and was removed.
    pub exhausted: bool,
    /// Attacks resolved by the effect, in victim order.
    pub attacks: Vec<AttackContext>,
}

/// One match.
pub struct Battle {
    roster: Roster,
    rng: CombatRng,
    resolver: Arc<AttackResolver>,
    runes: RuneStore,
    factions: Arc<dyn FactionService>,
    hazards: Arc<dyn HazardPlacer>,
    events: Arc<dyn EventSink>,
    turn: Turn,
    damage_dealt: u64,
}

impl fmt::Debug for Battle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Battle")
            .field("roster", &self.roster)
            .field("rng", &self.rng)
            .field("runes", &self.runes)
            .field("turn", &self.turn)
            .field("damage_dealt", &self.damage_dealt)
            .finish_non_exhaustive()
    }
}

impl Battle {
    /// Creates an empty battle at turn 0 with default rules.
    #[must_use]
    pub fn new(seed: i32) -> Self {
        Self {
            roster: Roster::new(),
            rng: CombatRng::new(seed),
            resolver: Arc::new(AttackResolver::default()),
            runes: RuneStore::new(),
            factions: Arc::new(FactionTable::new()),
            hazards: Arc::new(NoHazards),
            events: Arc::new(NullSink),
            turn: 0,
            damage_dealt: 0,
        }
    }

    /// Replaces the RNG.
    #[must_use]
    pub fn with_rng(mut self, rng: CombatRng) -> Self {
        self.rng = rng;
        self
    }

    /// Replaces the resolver.
    #[must_use]
    pub fn with_resolver(mut self, resolver: Arc<AttackResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    /// Replaces the faction service.
    #[must_use]
    pub fn with_factions(mut self, factions: Arc<dyn FactionService>) -> Self {
        self.factions = factions;
        self
    }

    /// Replaces the hazard placer.
    #[must_use]
    pub fn with_hazards(mut self, hazards: Arc<dyn HazardPlacer>) -> Self {
        self.hazards = hazards;
        self
    }

    /// Replaces the event sink.
    #[must_use]
    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// The roster.
    #[must_use]
    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    /// The roster, mutably.
    pub fn roster_mut(&mut self) -> &mut Roster {
        &mut self.roster
    }

    /// Shorthand for `roster().get(id)`.
    #[must_use]
    pub fn actor(&self, id: ActorId) -> Option<&Actor> {
        self.roster.get(id)
    }

    /// The battle RNG. Planners draw tie-breaks from here.
    pub fn rng_mut(&mut self) -> &mut CombatRng {
        &mut self.rng
    }

    /// Consumes the battle, returning its RNG.
    #[must_use]
    pub fn into_rng(self) -> CombatRng {
        self.rng
    }

    /// The resolver.
    #[must_use]
    pub fn resolver(&self) -> &AttackResolver {
        &self.resolver
    }

    /// The faction service.
    #[must_use]
    pub fn factions(&self) -> &dyn FactionService {
        self.factions.as_ref()
    }

    /// The event sink.
    #[must_use]
    pub fn events(&self) -> &dyn EventSink {
        self.events.as_ref()
    }

    /// Placed runes.
    #[must_use]
    pub fn runes(&self) -> &RuneStore {
        &self.runes
    }

    /// Placed runes, mutably.
    pub fn runes_mut(&mut self) -> &mut RuneStore {
        &mut self.runes
    }

    /// Current turn.
    #[must_use]
    pub const fn turn(&self) -> Turn {
        self.turn
    }

    /// Sets the current turn.
    pub fn set_turn(&mut self, turn: Turn) {
        self.turn = turn;
    }

    /// HP removed by attacks and status ticks so far.
    #[must_use]
    pub const fn damage_dealt(&self) -> u64 {
        self.damage_dealt
    }

    /// Returns true if `a` and `b` are both present and hostile.
    #[must_use]
    pub fn is_hostile(&self, a: ActorId, b: ActorId) -> bool {
        match (self.roster.get(a), self.roster.get(b)) {
            (Some(a), Some(b)) => self.factions.is_hostile(a, b),
            _ => false,
        }
    }

    // =========================================================================
    // Upkeep
    // =========================================================================

    /// Start-of-turn upkeep for `actor` at the current turn.
    ///
    /// Ticks and expires statuses, decays attunement, then (if still alive)
    /// regenerates pools from base stats and refills action points. Returns
    /// `None` if the actor is not in the roster.
    pub fn upkeep(&mut self, actor: ActorId) -> Option<TickReport> {
        let turn = self.turn;
        let a = self.roster.get_mut(actor)?;
        let report = self.resolver.statuses().tick(a, turn);
        self.resolver.attunement().decay(a);
        if !a.is_defeated() {
            a.hp.restore(a.stats.hp_regen);
            a.mana.restore(a.stats.mana_regen);
            a.stamina.restore(a.stats.stamina_regen);
            a.ap.refill();
        }

        self.damage_dealt += u64::from(report.damage());
        if !report.ticks.is_empty() || !report.expired.is_empty() {
            self.events.emit(CombatEvent::StatusTicked {
                actor,
                turn,
                damage: report.damage(),
                expired: report.expired.clone(),
            });
        }
        Some(report)
    }

    // =========================================================================
    // Actions
    // =========================================================================

    /// Swings the actor's weapon at `target`.
    ///
    /// Costs the weapon's stamina cost (or [`BASIC_ATTACK_STAMINA_COST`]),
    /// scaled by the cost multiplier, plus one action point. The actor's power
    /// is added to the first packet.
    ///
    /// # Errors
    ///
    /// Returns a [`Refusal`] without mutating anything if the action cannot
    /// proceed.
    pub fn basic_attack(&mut self, actor: ActorId, target: ActorId) -> Result<AttackContext, Refusal> {
        let attacker = self.roster.get(actor).ok_or(Refusal::Unknown)?;
        self.check_stunned(attacker)?;
        let cost = ActionCost {
            stamina: attacker
                .mod_cache
                .scale_cost(attacker.weapon.stamina_cost.unwrap_or(BASIC_ATTACK_STAMINA_COST)),
            mana: 0,
            ap: DEFAULT_AP_COST,
        };
        if !cost.affordable(attacker) {
            return Err(self.refuse(actor, Refusal::Cost));
        }
        let mut intent = AttackIntent::new(attacker.weapon.packets.clone(), AttackTags::BASIC)
            .with_statuses(attacker.weapon.status_attempts.clone());
        if let Some(first) = intent.packets.first_mut() {
            first.amount += f64::from(attacker.stats.power);
        }
        self.check_target(actor, target)?;

        self.pay(actor, cost);
        self.resolve(actor, target, intent).ok_or(Refusal::NoTarget)
    }

    /// Uses ability `ability` on `target`.
    ///
    /// Costs the ability's stamina and mana, scaled by the cost multiplier,
    /// plus one action point, and puts the ability on cooldown until
    /// `turn + scaled cooldown`.
    ///
    /// # Errors
    ///
    /// Returns a [`Refusal`] without mutating anything if the action cannot
    /// proceed.
    pub fn use_ability(&mut self, actor: ActorId, ability: &str, target: ActorId) -> Result<AttackContext, Refusal> {
        let attacker = self.roster.get(actor).ok_or(Refusal::Unknown)?;
        let def = attacker.abilities.get(ability).ok_or(Refusal::Unknown)?;
        self.check_stunned(attacker)?;
        if self.turn < attacker.ready_at(ability) {
            return Err(self.refuse(actor, Refusal::Cooldown));
        }
        let cost = ActionCost {
            stamina: attacker.mod_cache.scale_cost(def.stamina_cost),
            mana: attacker.mod_cache.scale_cost(def.mana_cost),
            ap: DEFAULT_AP_COST,
        };
        if !cost.affordable(attacker) {
            return Err(self.refuse(actor, Refusal::Cost));
        }
        let ready_at = self.turn + attacker.mod_cache.scale_cooldown(def.cooldown);
        let intent = AttackIntent::new(def.packets.clone(), AttackTags::ABILITY).with_statuses(def.status_attempts.clone());
        self.check_target(actor, target)?;

        self.pay(actor, cost);
        if let Some(a) = self.roster.get_mut(actor) {
            a.cooldowns.insert(ability.to_string(), ready_at);
        }
        self.resolve(actor, target, intent).ok_or(Refusal::NoTarget)
    }

    /// Teaches `actor` a spell, armed from the current turn.
    ///
    /// Returns false if the actor is not in the roster.
    pub fn learn_spell(&mut self, actor: ActorId, def: Arc<SpellDef>) -> bool {
        let turn = self.turn;
        let Some(a) = self.roster.get_mut(actor) else {
            return false;
        };
        a.spells.insert(def.id.clone(), SpellSlot::new(def, turn));
        true
    }

    /// Casts learned spell `spell` on `target`.
    ///
    /// Costs the spell's mana, scaled by the cost multiplier, plus one action
    /// point. A spell whose last charge is spent is forgotten.
    ///
    /// # Errors
    ///
    /// Returns a [`Refusal`] without mutating anything if the action cannot
    /// proceed.
    pub fn cast_spell(&mut self, caster: ActorId, spell: &str, target: ActorId) -> Result<AttackContext, Refusal> {
        let attacker = self.roster.get(caster).ok_or(Refusal::Unknown)?;
        let slot = attacker.spells.get(spell).ok_or(Refusal::Unknown)?;
        self.check_stunned(attacker)?;
        let cooldown = attacker.mod_cache.scale_cooldown(slot.def.cooldown);
        if !slot.state.gate(self.turn, cooldown) {
            return Err(self.refuse(caster, Refusal::Cooldown));
        }
        let cost = ActionCost {
            stamina: 0,
            mana: attacker.mod_cache.scale_cost(slot.def.mana_cost),
            ap: DEFAULT_AP_COST,
        };
        if !cost.affordable(attacker) {
            return Err(self.refuse(caster, Refusal::Cost));
        }
        let mut intent = slot.def.intent.clone();
        intent.tags |= AttackTags::SPELL;
        self.check_target(caster, target)?;

        let turn = self.turn;
        self.pay(caster, cost);
        if let Some(a) = self.roster.get_mut(caster) {
            let exhausted = a.spells.get_mut(spell).is_some_and(|slot| slot.state.consume(turn));
            if exhausted {
                a.spells.remove(spell);
                debug!(%caster, spell, "spell charges exhausted");
            }
        }
        self.resolve(caster, target, intent).ok_or(Refusal::NoTarget)
    }

    /// Places a rune for `owner` at the current turn.
    ///
    /// Returns `None` if the owner is not in the roster.
    pub fn place_rune(&mut self, owner: ActorId, def: Arc<RuneDef>) -> Option<RuneId> {
        self.roster.get(owner)?;
        Some(self.runes.place(owner, def, self.turn))
    }

    /// Attempts to fire `rune` in response to `triggered_by`.
    ///
    /// Fails silently (`fired == false`, nothing mutated) unless the trigger
    /// gate, the ward and the custom condition all pass. Attack runes resolve
    /// against each distinct victim that is alive and is not the owner; with
    /// no such victim the rune does not fire.
    pub fn try_trigger(&mut self, rune: RuneId, triggered_by: ActorId, victims: &[ActorId]) -> TriggerOutcome {
        let turn = self.turn;
        let Some(instance) = self.runes.get(rune) else {
            return TriggerOutcome::default();
        };
        let owner = instance.owner;
        let def = Arc::clone(&instance.def);
        let Some(trigger_actor) = self.roster.get(triggered_by) else {
            return TriggerOutcome::default();
        };

        if !instance.state.gate(turn, def.cooldown) {
            debug!(%rune, turn, "rune gated");
            return TriggerOutcome::default();
        }
        if !def.ward.admits(self.factions.as_ref(), self.roster.get(owner), trigger_actor) {
            debug!(%rune, %triggered_by, "rune warded");
            return TriggerOutcome::default();
        }
        if let Some(condition) = &def.condition {
            if !condition(trigger_actor, turn) {
                return TriggerOutcome::default();
            }
        }

        let mut outcome = TriggerOutcome::default();
        match &def.effect {
            RuneEffect::Attack(intent) => {
                let mut seen = BTreeSet::new();
                let eligible: Vec<ActorId> = victims
                    .iter()
                    .copied()
                    .filter(|v| *v != owner && self.roster.is_alive(*v) && seen.insert(*v))
                    .collect();
                if eligible.is_empty() || self.roster.get(owner).is_none() {
                    debug!(%rune, "rune has no eligible victims");
                    return TriggerOutcome::default();
                }
                for victim in eligible {
                    let mut intent = intent.clone();
                    intent.tags |= AttackTags::RUNE;
                    if let Some(ctx) = self.resolve(owner, victim, intent) {
                        outcome.attacks.push(ctx);
                    }
                }
            }
            RuneEffect::Hazard => {
                if let Some(instance) = self.runes.get(rune) {
                    self.hazards.place(instance, triggered_by, turn);
                }
            }
            RuneEffect::Seal { backfire } => {
                outcome.blocked = true;
                if let Some(intent) = backfire {
                    let mut intent = intent.clone();
                    intent.tags |= AttackTags::RUNE | AttackTags::BACKFIRE | AttackTags::NO_ATTUNEMENT;
                    if let Some(ctx) = self.resolve(owner, triggered_by, intent) {
                        outcome.attacks.push(ctx);
                    }
                }
            }
            RuneEffect::Ward(effect) | RuneEffect::Utility(effect) => {
                if let Some(a) = self.roster.get_mut(triggered_by) {
                    effect(a, turn);
                }
            }
        }

        outcome.fired = true;
        outcome.exhausted = self.runes.get_mut(rune).is_some_and(|r| r.state.consume(turn));
        if outcome.exhausted {
            self.runes.remove(rune);
        }
        debug!(%rune, %owner, %triggered_by, turn, effect = ?def.effect.kind(), exhausted = outcome.exhausted, "rune fired");
        self.events.emit(CombatEvent::RuneTriggered {
            rune,
            owner,
            triggered_by,
            turn,
            effect: def.effect.kind(),
            exhausted: outcome.exhausted,
        });
        outcome
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn check_stunned(&self, actor: &Actor) -> Result<(), Refusal> {
        if self.resolver.statuses().is_disabled(actor) {
            return Err(self.refuse(actor.id, Refusal::Stunned));
        }
        Ok(())
    }

    fn check_target(&self, actor: ActorId, target: ActorId) -> Result<(), Refusal> {
        if target == actor || !self.roster.is_alive(target) {
            return Err(self.refuse(actor, Refusal::NoTarget));
        }
        Ok(())
    }

    fn refuse(&self, actor: ActorId, refusal: Refusal) -> Refusal {
        debug!(%actor, turn = self.turn, reason = refusal.reason(), "action refused");
        refusal
    }

    fn pay(&mut self, actor: ActorId, cost: ActionCost) {
        if let Some(a) = self.roster.get_mut(actor) {
            cost.pay(a);
        }
    }

    fn resolve(&mut self, attacker: ActorId, defender: ActorId, intent: AttackIntent) -> Option<AttackContext> {
        let turn = self.turn;
        let (a, d) = self.roster.pair_mut(attacker, defender)?;
        let ctx = self
            .resolver
            .resolve(a, d, turn, intent, &mut self.rng, self.events.as_ref());
        self.damage_dealt += u64::from(ctx.total_damage);
        Some(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::Ability;
    use crate::context::{DamagePacket, StatusAttempt};
    use crate::spell::{FragmentCatalog, SpellFragment};

    fn duel() -> (Battle, ActorId, ActorId) {
        let mut battle = Battle::new(42);
        let a = battle.roster_mut().spawn(|id| {
            let mut actor = Actor::new(id, "attacker", 30);
            actor.stamina = crate::actor::Pool::full(12);
            actor.mana = crate::actor::Pool::full(10);
            actor.weapon.packets = vec![DamagePacket::new("physical", 5.0)];
            actor
        });
        let b = battle.roster_mut().spawn(|id| Actor::new(id, "defender", 30));
        (battle, a, b)
    }

    mod refusal_tests {
        use super::*;

        #[test]
        fn reasons_are_stable() {
            assert_eq!(Refusal::Unknown.reason(), "unknown");
            assert_eq!(Refusal::Stunned.reason(), "stunned");
            assert_eq!(Refusal::Cooldown.reason(), "cooldown");
            assert_eq!(Refusal::Cost.reason(), "cost");
            assert_eq!(Refusal::NoTarget.reason(), "no-target");
            assert_eq!(Refusal::NoTarget.to_string(), "no-target");
        }

        #[test]
        fn unknown_ability_refused() {
            let (mut battle, a, b) = duel();
            assert_eq!(battle.use_ability(a, "meteor", b), Err(Refusal::Unknown));
            assert_eq!(battle.cast_spell(a, "meteor", b), Err(Refusal::Unknown));
        }

        #[test]
        fn stunned_actor_refused_without_mutation() {
            let (mut battle, a, b) = duel();
            let resolver = AttackResolver::default();
            let attacker = battle.roster_mut().get_mut(a).unwrap();
            resolver.statuses().apply(attacker, &StatusAttempt::new("stun", 1.0, 2.0), 0);
            let before = battle.actor(a).unwrap().clone();
            assert_eq!(battle.basic_attack(a, b), Err(Refusal::Stunned));
            assert_eq!(battle.actor(a).unwrap(), &before);
        }

        #[test]
        fn unaffordable_cost_refused_without_mutation() {
            let (mut battle, a, b) = duel();
            battle.roster_mut().get_mut(a).unwrap().stamina.set(1);
            assert_eq!(battle.basic_attack(a, b), Err(Refusal::Cost));
            let attacker = battle.actor(a).unwrap();
            assert_eq!(attacker.stamina.cur, 1);
            assert_eq!(attacker.ap.cur, 1);
            assert_eq!(battle.actor(b).unwrap().hp.cur, 30);
        }

        #[test]
        fn self_and_defeated_targets_refused() {
            let (mut battle, a, b) = duel();
            assert_eq!(battle.basic_attack(a, a), Err(Refusal::NoTarget));
            battle.roster_mut().get_mut(b).unwrap().hp.drain(30);
            assert_eq!(battle.basic_attack(a, b), Err(Refusal::NoTarget));
            assert_eq!(battle.actor(a).unwrap().stamina.cur, 12);
        }
    }

    mod action_tests {
        use super::*;

        #[test]
        fn basic_attack_pays_fallback_stamina() {
            let (mut battle, a, b) = duel();
            let ctx = battle.basic_attack(a, b).unwrap();
            assert_eq!(ctx.total_damage, 5);
            let attacker = battle.actor(a).unwrap();
            assert_eq!(attacker.stamina.cur, 10);
            assert_eq!(attacker.ap.cur, 0);
            assert_eq!(battle.damage_dealt(), 5);
        }

        #[test]
        fn basic_attack_adds_power_to_first_packet() {
            let (mut battle, a, b) = duel();
            battle.roster_mut().get_mut(a).unwrap().stats.power = 3;
            let ctx = battle.basic_attack(a, b).unwrap();
            assert_eq!(ctx.pre_packets[0].amount, 8.0);
        }

        #[test]
        fn second_action_needs_ap() {
            let (mut battle, a, b) = duel();
            battle.basic_attack(a, b).unwrap();
            assert_eq!(battle.basic_attack(a, b), Err(Refusal::Cost));
        }

        #[test]
        fn ability_goes_on_cooldown() {
            let (mut battle, a, b) = duel();
            battle.set_turn(3);
            battle.roster_mut().get_mut(a).unwrap().abilities.insert(
                "cleave".into(),
                Ability {
                    packets: vec![DamagePacket::new("physical", 9.0)],
                    cooldown: 2,
                    stamina_cost: 4,
                    ..Ability::default()
                },
            );
            let ctx = battle.use_ability(a, "cleave", b).unwrap();
            assert!(ctx.tags.contains(AttackTags::ABILITY));
            assert_eq!(battle.actor(a).unwrap().ready_at("cleave"), 5);
            assert_eq!(battle.actor(a).unwrap().stamina.cur, 8);

            battle.roster_mut().get_mut(a).unwrap().ap.refill();
            battle.set_turn(4);
            assert_eq!(battle.use_ability(a, "cleave", b), Err(Refusal::Cooldown));
            battle.set_turn(5);
            assert!(battle.use_ability(a, "cleave", b).is_ok());
        }

        #[test]
        fn spell_charges_run_out() {
            let (mut battle, a, b) = duel();
            let mut catalog = FragmentCatalog::new();
            catalog.insert(
                SpellFragment::new("ember", 1)
                    .with_packet(DamagePacket::new("fire", 4.0))
                    .with_mana_cost(2),
            );
            let def = catalog.compile("ember", &["ember"], 3).unwrap().with_charges(1);
            assert!(battle.learn_spell(a, Arc::new(def)));

            let ctx = battle.cast_spell(a, "ember", b).unwrap();
            assert!(ctx.tags.contains(AttackTags::SPELL));
            assert_eq!(ctx.total_damage, 4);
            assert_eq!(battle.actor(a).unwrap().mana.cur, 8);
            assert!(battle.actor(a).unwrap().spells.is_empty());
            assert_eq!(battle.cast_spell(a, "ember", b), Err(Refusal::Unknown));
        }

        #[test]
        fn spell_cooldown_gates_recast() {
            let (mut battle, a, b) = duel();
            let mut catalog = FragmentCatalog::new();
            catalog.insert(SpellFragment::new("bolt", 1).with_packet(DamagePacket::new("lightning", 2.0)).with_cooldown(2));
            let def = catalog.compile("bolt", &["bolt"], 3).unwrap();
            battle.learn_spell(a, Arc::new(def));
            battle.cast_spell(a, "bolt", b).unwrap();
            battle.roster_mut().get_mut(a).unwrap().ap.refill();
            battle.set_turn(1);
            assert_eq!(battle.cast_spell(a, "bolt", b), Err(Refusal::Cooldown));
            battle.set_turn(2);
            assert!(battle.cast_spell(a, "bolt", b).is_ok());
        }
    }

    mod upkeep_tests {
        use super::*;

        #[test]
        fn upkeep_regenerates_and_refills() {
            let (mut battle, a, b) = duel();
            battle.basic_attack(a, b).unwrap();
            battle.roster_mut().get_mut(a).unwrap().stats.stamina_regen = 1;
            battle.set_turn(1);
            let report = battle.upkeep(a).unwrap();
            assert!(report.ticks.is_empty());
            let attacker = battle.actor(a).unwrap();
            assert_eq!(attacker.stamina.cur, 11);
            assert_eq!(attacker.ap.cur, 1);
        }

        #[test]
        fn upkeep_ticks_statuses_and_counts_damage() {
            let (mut battle, a, _) = duel();
            let resolver = AttackResolver::default();
            let actor = battle.roster_mut().get_mut(a).unwrap();
            resolver
                .statuses()
                .apply(actor, &StatusAttempt::new("burn", 1.0, 3.0).with_potency(2.0), 0);
            battle.set_turn(1);
            let report = battle.upkeep(a).unwrap();
            assert_eq!(report.damage(), 2);
            assert_eq!(battle.damage_dealt(), 2);
        }

        #[test]
        fn upkeep_of_missing_actor_is_none() {
            let mut battle = Battle::new(1);
            assert!(battle.upkeep(ActorId::new(9)).is_none());
        }
    }

    #[test]
    fn battle_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<Battle>();
    }
}
