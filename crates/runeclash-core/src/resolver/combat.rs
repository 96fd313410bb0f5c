//! The attack resolution pipeline.

use std::collections::BTreeMap;

use tracing::{debug, trace};

use crate::actor::{neutral_if_invalid, Actor, Turn};
use crate::context::{
    finite_or_zero, floor_amount, sanitize_amount, AttackContext, AttackIntent, AttackTags,
    DamagePacket, Stage, StatusRoll,
};
use crate::rng::CombatRng;
use crate::status::{AttunementConfig, StatusEngine};

use super::event::{CombatEvent, EventSink};

/// Ceiling on effective resist after attunement bonuses.
pub const MAX_RESIST: f64 = 0.95;

/// Resolves attacks between two actors.
///
/// Holds the status engine and attunement rules for a battle. Resolution is
/// stateless apart from the actors, the RNG and the sink passed in, so one
/// resolver can be shared across many battles.
///
/// # Example
///
/// ```
/// use runeclash_core::actor::{Actor, ActorId};
/// use runeclash_core::context::{AttackIntent, AttackTags, DamagePacket};
/// use runeclash_core::resolver::{AttackResolver, NullSink};
/// use runeclash_core::rng::CombatRng;
///
/// let resolver = AttackResolver::default();
/// let mut attacker = Actor::new(ActorId::new(1), "a", 10);
/// let mut defender = Actor::new(ActorId::new(2), "d", 10);
/// let mut rng = CombatRng::new(7);
///
/// let intent = AttackIntent::new(vec![DamagePacket::new("physical", 4.0)], AttackTags::BASIC);
/// let ctx = resolver.resolve(&mut attacker, &mut defender, 1, intent, &mut rng, &NullSink);
///
/// assert_eq!(ctx.total_damage, 4);
/// assert_eq!(defender.hp.cur, 6);
/// ```
#[derive(Debug, Clone, Default)]
pub struct AttackResolver {
    statuses: StatusEngine,
    attunement: AttunementConfig,
}

impl AttackResolver {
    /// Creates a resolver.
    #[must_use]
    pub fn new(statuses: StatusEngine, attunement: AttunementConfig) -> Self {
        Self {
            statuses,
            attunement,
        }
    }

    /// The status engine.
    #[must_use]
    pub fn statuses(&self) -> &StatusEngine {
        &self.statuses
    }

    /// The attunement rules.
    #[must_use]
    pub fn attunement(&self) -> &AttunementConfig {
        &self.attunement
    }

    /// Resolves one attack from `attacker` onto `defender`.
    ///
    /// Mutates defender HP and statuses and attacker attunement, draws one RNG
    /// value per well-formed status attempt and emits one
    /// [`CombatEvent::AttackResolved`].
    pub fn resolve(
        &self,
        attacker: &mut Actor,
        defender: &mut Actor,
        turn: Turn,
        intent: AttackIntent,
        rng: &mut CombatRng,
        sink: &dyn EventSink,
    ) -> AttackContext {
        let AttackIntent {
            packets,
            status_attempts,
            tags,
        } = intent;
        let mut ctx = AttackContext::new(attacker.id, defender.id, turn, packets, status_attempts, tags);

        let (offense, base_total) = self.offense(attacker, &ctx.pre_packets);
        let mut meta = BTreeMap::new();
        meta.insert("base_total".to_string(), base_total);
        ctx.record_step(Stage::Offense, &offense, meta);
        trace!(attacker = %attacker.id, ?offense, "offense stage");

        let defense = self.defense(defender, &offense);
        ctx.record_step(Stage::Defense, &defense, BTreeMap::new());
        trace!(defender = %defender.id, ?defense, "defense stage");

        let total = floor_amount(finite_or_zero(defense.iter().map(|p| p.amount).sum()));
        let total = u32::try_from(total).unwrap_or(u32::MAX);
        ctx.hp_before = defender.hp.cur;
        ctx.total_damage = self.statuses.deal_damage(defender, total);
        ctx.hp_after = defender.hp.cur;
        let mut meta = BTreeMap::new();
        meta.insert("total_damage".to_string(), f64::from(ctx.total_damage));
        meta.insert("hp_before".to_string(), f64::from(ctx.hp_before));
        meta.insert("hp_after".to_string(), f64::from(ctx.hp_after));
        ctx.record_step(Stage::Applied, &defense, meta);

        ctx.packets_after_offense = offense;
        ctx.packets_after_defense = defense;
        let dealt = ctx.by_type();

        self.roll_statuses(&mut ctx, attacker, defender, &dealt, rng);

        if !tags.contains(AttackTags::NO_ATTUNEMENT) {
            for (kind, amount) in dealt.iter().filter(|(_, amount)| **amount > 0) {
                // per-hit totals are far below 2^52
                #[allow(clippy::cast_precision_loss)]
                let amount = *amount as f64;
                self.attunement.gain(attacker, kind, amount);
            }
        }

        debug!(
            attacker = %ctx.attacker,
            defender = %ctx.defender,
            turn,
            damage = ctx.total_damage,
            hp_after = ctx.hp_after,
            statuses = ctx.applied_statuses.len(),
            "attack resolved"
        );
        sink.emit(CombatEvent::from_context(&ctx));
        ctx
    }

    /// Scales packets by attacker affinity and appends brand packets.
    ///
    /// Returns the packets and the pre-offense damage sum brands scale from.
    fn offense(&self, attacker: &Actor, pre: &[DamagePacket]) -> (Vec<DamagePacket>, f64) {
        let base_total: f64 = pre.iter().map(|p| p.amount).sum();
        let mut packets: Vec<DamagePacket> = pre
            .iter()
            .map(|p| {
                let tier = self.attunement.tier(attacker, &p.kind).map_or(0.0, |t| t.affinity);
                let mult = (1.0 + attacker.mod_cache.affinity(&p.kind) + finite_or_zero(tier)).max(0.0);
                DamagePacket::new(&p.kind, p.amount * mult)
            })
            .collect();

        if !pre.is_empty() {
            for brand in &attacker.mod_cache.brands {
                let amount = sanitize_amount(finite_or_zero(brand.flat) + finite_or_zero(brand.pct) * base_total);
                if amount > 0.0 {
                    packets.push(DamagePacket::new(&brand.kind, amount));
                }
            }
        }
        (packets, base_total)
    }

    /// Reduces packets by the defender's resists.
    fn defense(&self, defender: &Actor, packets: &[DamagePacket]) -> Vec<DamagePacket> {
        packets
            .iter()
            .map(|p| {
                let tier = self.attunement.tier(defender, &p.kind).map_or(0.0, |t| t.resist);
                let resist = (defender.mod_cache.resist(&p.kind) + finite_or_zero(tier)).clamp(0.0, MAX_RESIST);
                DamagePacket::new(&p.kind, p.amount * (1.0 - resist))
            })
            .collect()
    }

    /// Rolls every well-formed status attempt, in declaration order.
    fn roll_statuses(
        &self,
        ctx: &mut AttackContext,
        attacker: &Actor,
        defender: &mut Actor,
        dealt: &BTreeMap<String, u64>,
        rng: &mut CombatRng,
    ) {
        let tier_bonus = dealt
            .iter()
            .filter(|(_, amount)| **amount > 0)
            .filter_map(|(kind, _)| self.attunement.tier(attacker, kind))
            .map(|t| finite_or_zero(t.status_chance))
            .fold(0.0_f64, f64::max);
        let chance_mult = neutral_if_invalid(attacker.mod_cache.status_chance_mult);

        for attempt in ctx.status_attempts.clone() {
            if !attempt.is_well_formed() {
                continue;
            }
            let chance = finite_or_zero(
                finite_or_zero(attempt.base_chance)
                    * chance_mult
                    * (1.0 + tier_bonus)
                    * (1.0 - defender.mod_cache.status_resist(&attempt.id)),
            )
            .clamp(0.0, 1.0);
            let roll = rng.next_float();
            let outcome = if roll < chance {
                self.statuses.apply(defender, &attempt, ctx.turn)
            } else {
                None
            };
            if outcome.is_some() {
                ctx.applied_statuses.push(attempt.id.clone());
            }
            trace!(status = %attempt.id, chance, roll, ?outcome, "status roll");
            ctx.status_rolls.push(StatusRoll {
                id: attempt.id,
                chance,
                roll,
                outcome,
            });
        }
    }
}
