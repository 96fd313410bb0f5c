//! Attack intents, damage packets and the per-attack audit trail.
//!
//! An attack enters the pipeline as an [`AttackIntent`]: a list of typed
//! [`DamagePacket`]s, a list of [`StatusAttempt`]s and a set of
//! [`AttackTags`]. The resolver records every stage of the transformation in an
//! [`AttackContext`], which debug and analysis layers read afterwards.
//!
//! # Audit Trail
//!
//! [`AttackContext::record_step`] appends an owned snapshot of the packets.
//! Recorded steps are only exposed as a shared slice, so an earlier stage can
//! never be rewritten by a later one. Step order is the event timeline.
//!
//! # Example
//!
//! ```
//! use runeclash_core::actor::ActorId;
//! use runeclash_core::context::{AttackContext, AttackTags, DamagePacket, Stage};
//!
//! let packets = vec![DamagePacket::new("fire", 3.7), DamagePacket::new("fire", 2.9)];
//! let ctx = AttackContext::new(ActorId::new(1), ActorId::new(2), 1, packets, vec![], AttackTags::BASIC);
//!
//! assert_eq!(ctx.steps().len(), 1);
//! assert_eq!(ctx.steps()[0].stage, Stage::Pre);
//! // floored per packet, then summed: 3 + 2
//! assert_eq!(ctx.pre_packets_by_type()["fire"], 5);
//! ```

use std::collections::BTreeMap;
use std::fmt;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::actor::{ActorId, Turn};
use crate::status::ApplyOutcome;

/// Replaces non-finite values with zero.
#[must_use]
pub fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

/// Replaces non-finite or negative amounts with zero.
#[must_use]
pub fn sanitize_amount(value: f64) -> f64 {
    finite_or_zero(value).max(0.0)
}

// =============================================================================
// Packets
// =============================================================================

/// A typed, non-negative damage quantity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DamagePacket {
    /// Damage type (`physical`, `fire`, ...).
    #[serde(rename = "type")]
    pub kind: String,
    /// Amount, never negative once inside the pipeline.
    pub amount: f64,
}

impl DamagePacket {
    /// Creates a packet. Negative or non-finite amounts become zero.
    #[must_use]
    pub fn new(kind: &str, amount: f64) -> Self {
        Self {
            kind: kind.to_string(),
            amount: sanitize_amount(amount),
        }
    }
}

/// Aggregates packets per type.
///
/// Each amount is floored to a non-negative integer before summing, so the
/// result always equals the sum of the floored amounts of same-type packets.
#[must_use]
pub fn by_type(packets: &[DamagePacket]) -> BTreeMap<String, u64> {
    let mut totals = BTreeMap::new();
    for packet in packets {
        *totals.entry(packet.kind.clone()).or_insert(0) += floor_amount(packet.amount);
    }
    totals
}

/// Floors a packet amount to a non-negative integer.
#[must_use]
pub fn floor_amount(amount: f64) -> u64 {
    let clean = sanitize_amount(amount).floor();
    if clean >= 18_446_744_073_709_551_615.0 {
        u64::MAX
    } else {
        // non-negative and in range by the checks above
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let v = clean as u64;
        v
    }
}

// =============================================================================
// Intents
// =============================================================================

/// A status effect an attack tries to inflict. Not yet rolled.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusAttempt {
    /// Status id. An empty id marks the attempt as malformed.
    pub id: String,
    /// Chance before modifiers, within `[0, 1]`.
    pub base_chance: f64,
    /// Duration in turns before the defender's duration multiplier.
    pub base_duration: f64,
    /// Stacks granted on success; 1 when absent.
    pub stacks: Option<u32>,
    /// Potency on success; 1 when absent.
    pub potency: Option<f64>,
}

impl StatusAttempt {
    /// Creates a well-formed attempt.
    #[must_use]
    pub fn new(id: &str, base_chance: f64, base_duration: f64) -> Self {
        Self {
            id: id.to_string(),
            base_chance,
            base_duration,
            stacks: None,
            potency: None,
        }
    }

    /// Sets the potency.
    #[must_use]
    pub fn with_potency(mut self, potency: f64) -> Self {
        self.potency = Some(potency);
        self
    }

    /// Sets the stacks.
    #[must_use]
    pub fn with_stacks(mut self, stacks: u32) -> Self {
        self.stacks = Some(stacks);
        self
    }

    /// Returns false for attempts the pipeline silently drops.
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        !self.id.trim().is_empty()
    }
}

bitflags! {
    /// Classification of an attack's source and handling.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct AttackTags: u16 {
        /// Weapon swing.
        const BASIC = 1 << 0;
        /// Actor ability.
        const ABILITY = 1 << 1;
        /// Compiled spell.
        const SPELL = 1 << 2;
        /// Rune trigger.
        const RUNE = 1 << 3;
        /// Seal backfire onto the triggering actor.
        const BACKFIRE = 1 << 4;
        /// Skip attunement gain for this attack.
        const NO_ATTUNEMENT = 1 << 5;
    }
}

/// A declared attack, before resolution.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AttackIntent {
    /// Damage packets.
    pub packets: Vec<DamagePacket>,
    /// Status attempts.
    pub status_attempts: Vec<StatusAttempt>,
    /// Tags.
    pub tags: AttackTags,
}

impl AttackIntent {
    /// Creates an intent from packets and tags.
    #[must_use]
    pub fn new(packets: Vec<DamagePacket>, tags: AttackTags) -> Self {
        Self {
            packets,
            status_attempts: Vec::new(),
            tags,
        }
    }

    /// Adds status attempts.
    #[must_use]
    pub fn with_statuses(mut self, attempts: Vec<StatusAttempt>) -> Self {
        self.status_attempts = attempts;
        self
    }
}

// =============================================================================
// Context
// =============================================================================

/// Pipeline stage name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    /// Packets as declared.
    Pre,
    /// After attacker affinities and brands.
    Offense,
    /// After defender resists.
    Defense,
    /// After HP application.
    Applied,
    /// Stage recorded by an outer layer.
    Custom(String),
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pre => write!(f, "pre"),
            Self::Offense => write!(f, "offense"),
            Self::Defense => write!(f, "defense"),
            Self::Applied => write!(f, "applied"),
            Self::Custom(name) => write!(f, "{name}"),
        }
    }
}

/// One immutable snapshot in the audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttackStep {
    /// Stage name.
    pub stage: Stage,
    /// Packets as they stood after this stage.
    pub packets: Vec<DamagePacket>,
    /// Optional numeric annotations.
    pub meta: BTreeMap<String, f64>,
}

/// Outcome of one status roll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusRoll {
    /// Status id.
    pub id: String,
    /// Effective chance after modifiers and clamping.
    pub chance: f64,
    /// The drawn value.
    pub roll: f64,
    /// What happened on success; `None` on a miss.
    pub outcome: Option<ApplyOutcome>,
}

/// Audit record of one resolved attack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttackContext {
    /// Attacking actor.
    pub attacker: ActorId,
    /// Defending actor.
    pub defender: ActorId,
    /// Turn of resolution.
    pub turn: Turn,
    /// Attack tags.
    pub tags: AttackTags,
    steps: Vec<AttackStep>,
    /// Declared packets.
    pub pre_packets: Vec<DamagePacket>,
    /// Packets after the offense stage.
    pub packets_after_offense: Vec<DamagePacket>,
    /// Packets after the defense stage.
    pub packets_after_defense: Vec<DamagePacket>,
    /// Declared status attempts, malformed ones included.
    pub status_attempts: Vec<StatusAttempt>,
    /// Rolls made for well-formed attempts, in order.
    pub status_rolls: Vec<StatusRoll>,
    /// Ids of statuses that landed, in order.
    pub applied_statuses: Vec<String>,
    /// Damage applied to the defender.
    pub total_damage: u32,
    /// Defender HP before application.
    pub hp_before: u32,
    /// Defender HP after application.
    pub hp_after: u32,
}

impl AttackContext {
    /// Builds a context and records the `pre` step.
    #[must_use]
    pub fn new(
        attacker: ActorId,
        defender: ActorId,
        turn: Turn,
        pre_packets: Vec<DamagePacket>,
        status_attempts: Vec<StatusAttempt>,
        tags: AttackTags,
    ) -> Self {
        let pre_packets: Vec<DamagePacket> = pre_packets
            .into_iter()
            .map(|p| DamagePacket {
                amount: sanitize_amount(p.amount),
                kind: p.kind,
            })
            .collect();
        let mut ctx = Self {
            attacker,
            defender,
            turn,
            tags,
            steps: Vec::new(),
            pre_packets: pre_packets.clone(),
            packets_after_offense: Vec::new(),
            packets_after_defense: Vec::new(),
            status_attempts,
            status_rolls: Vec::new(),
            applied_statuses: Vec::new(),
            total_damage: 0,
            hp_before: 0,
            hp_after: 0,
        };
        ctx.record_step(Stage::Pre, &pre_packets, BTreeMap::new());
        ctx
    }

    /// Appends an owned snapshot of `packets` to the audit trail.
    pub fn record_step(&mut self, stage: Stage, packets: &[DamagePacket], meta: BTreeMap<String, f64>) {
        self.steps.push(AttackStep {
            stage,
            packets: packets.to_vec(),
            meta,
        });
    }

    /// The audit trail, in recording order.
    #[must_use]
    pub fn steps(&self) -> &[AttackStep] {
        &self.steps
    }

    /// Per-type totals of the declared packets.
    #[must_use]
    pub fn pre_packets_by_type(&self) -> BTreeMap<String, u64> {
        by_type(&self.pre_packets)
    }

    /// Per-type totals of the damage that reached the defender's resists.
    #[must_use]
    pub fn by_type(&self) -> BTreeMap<String, u64> {
        by_type(&self.packets_after_defense)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod packet_tests {
        use super::*;

        #[test]
        fn new_sanitizes_amount() {
            assert_eq!(DamagePacket::new("fire", -3.0).amount, 0.0);
            assert_eq!(DamagePacket::new("fire", f64::NAN).amount, 0.0);
            assert_eq!(DamagePacket::new("fire", f64::INFINITY).amount, 0.0);
            assert_eq!(DamagePacket::new("fire", 2.5).amount, 2.5);
        }

        #[test]
        fn by_type_floors_each_packet() {
            let packets = vec![
                DamagePacket::new("fire", 1.9),
                DamagePacket::new("ice", 4.0),
                DamagePacket::new("fire", 1.9),
            ];
            let totals = by_type(&packets);
            assert_eq!(totals["fire"], 2);
            assert_eq!(totals["ice"], 4);
            assert_eq!(totals.len(), 2);
        }

        #[test]
        fn packet_serializes_kind_as_type() {
            let json = serde_json::to_string(&DamagePacket::new("base", 8.0)).unwrap();
            assert_eq!(json, r#"{"type":"base","amount":8.0}"#);
        }
    }

    mod attempt_tests {
        use super::*;

        #[test]
        fn missing_id_is_malformed() {
            let attempt: StatusAttempt =
                serde_json::from_str(r#"{"base_chance": 1.0, "base_duration": 2}"#).unwrap();
            assert!(!attempt.is_well_formed());
            assert!(StatusAttempt::new("burn", 0.5, 2.0).is_well_formed());
        }
    }

    mod context_tests {
        use super::*;

        fn ctx() -> AttackContext {
            AttackContext::new(
                ActorId::new(1),
                ActorId::new(2),
                3,
                vec![DamagePacket::new("physical", 5.0)],
                vec![],
                AttackTags::BASIC,
            )
        }

        #[test]
        fn new_records_pre_step() {
            let ctx = ctx();
            assert_eq!(ctx.steps().len(), 1);
            assert_eq!(ctx.steps()[0].stage, Stage::Pre);
            assert_eq!(ctx.steps()[0].packets, ctx.pre_packets);
        }

        #[test]
        fn record_step_snapshots_packets() {
            let mut ctx = ctx();
            let mut packets = vec![DamagePacket::new("physical", 9.0)];
            ctx.record_step(Stage::Offense, &packets, BTreeMap::new());
            packets[0].amount = 100.0;
            ctx.record_step(Stage::Custom("late".into()), &packets, BTreeMap::new());

            assert_eq!(ctx.steps()[1].packets[0].amount, 9.0);
            assert_eq!(ctx.steps()[2].packets[0].amount, 100.0);
            assert_eq!(ctx.steps()[0].packets[0].amount, 5.0);
        }

        #[test]
        fn stage_names_are_stable() {
            assert_eq!(Stage::Pre.to_string(), "pre");
            assert_eq!(Stage::Offense.to_string(), "offense");
            assert_eq!(Stage::Defense.to_string(), "defense");
            assert_eq!(Stage::Applied.to_string(), "applied");
            assert_eq!(Stage::Custom("overlay".into()).to_string(), "overlay");
        }
    }
}
