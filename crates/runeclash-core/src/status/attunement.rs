//! Attunement: per-damage-type stacks earned by dealing that type.
//!
//! Stacks grow on every hit that deals a type, decay by a flat amount at every
//! turn boundary and unlock tiered bonuses. Only the highest tier met applies;
//! tiers do not add up.
//!
//! Configuration is plain serde data so designers can ship it as JSON:
//!
//! ```
//! use runeclash_core::status::AttunementConfig;
//!
//! let config: AttunementConfig = serde_json::from_str(r#"{
//!     "rules": { "fire": { "onUseGain": 2, "maxStacks": 5 } },
//!     "leak_fraction": 0.25,
//!     "adjacency": { "fire": ["lightning"] }
//! }"#).unwrap();
//!
//! assert_eq!(config.rule_for("fire").min_per_hit_gain, 2.0);
//! assert_eq!(config.rule_for("fire").cap, 5.0);
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::actor::Actor;
use crate::context::sanitize_amount;

/// A bonus tier unlocked at `at` stacks.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AttunementTier {
    /// Stacks required.
    pub at: f64,
    /// Added to the attacker's affinity for the type.
    pub affinity: f64,
    /// Added to the bearer's resist for the type.
    pub resist: f64,
    /// Added to status chance multipliers, as a fraction.
    pub status_chance: f64,
}

/// Gain, cap and decay for one damage type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttunementRule {
    /// Stacks per point of damage dealt.
    pub gain_per_point_damage: f64,
    /// Minimum stacks per hit that deals the type.
    #[serde(alias = "onUseGain")]
    pub min_per_hit_gain: f64,
    /// Stack ceiling.
    #[serde(alias = "maxStacks")]
    pub cap: f64,
    /// Stacks lost per turn boundary.
    pub decay_per_turn: f64,
    /// Bonus tiers; order does not matter.
    pub tiers: Vec<AttunementTier>,
}

impl Default for AttunementRule {
    fn default() -> Self {
        Self {
            gain_per_point_damage: 0.1,
            min_per_hit_gain: 1.0,
            cap: 10.0,
            decay_per_turn: 1.0,
            tiers: Vec::new(),
        }
    }
}

/// Attunement configuration for a battle.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AttunementConfig {
    /// Rules by damage type.
    pub rules: BTreeMap<String, AttunementRule>,
    /// Rule for types without an explicit entry.
    pub default_rule: AttunementRule,
    /// Fraction of each gain leaked to adjacent types.
    pub leak_fraction: f64,
    /// Designer-supplied sibling types per type.
    pub adjacency: BTreeMap<String, Vec<String>>,
}

impl AttunementConfig {
    /// The rule governing `kind`.
    #[must_use]
    pub fn rule_for(&self, kind: &str) -> &AttunementRule {
        self.rules.get(kind).unwrap_or(&self.default_rule)
    }

    /// Credits a hit of `amount` damage of `kind` to `actor`.
    ///
    /// Returns the stacks granted to `kind` itself (before capping), which is
    /// never less than the rule's `min_per_hit_gain`.
    pub fn gain(&self, actor: &mut Actor, kind: &str, amount: f64) -> f64 {
        let rule = self.rule_for(kind);
        let gain = sanitize_amount(rule.min_per_hit_gain)
            .max(sanitize_amount(amount) * sanitize_amount(rule.gain_per_point_damage));
        self.add(actor, kind, gain);

        let leak = gain * sanitize_amount(self.leak_fraction);
        if leak > 0.0 {
            if let Some(siblings) = self.adjacency.get(kind) {
                for sibling in siblings.iter().filter(|s| s.as_str() != kind) {
                    self.add(actor, sibling, leak);
                }
            }
        }
        gain
    }

    /// Applies one turn boundary of decay. Types at or below zero are removed.
    pub fn decay(&self, actor: &mut Actor) {
        let stacks = std::mem::take(&mut actor.attunement.stacks);
        actor.attunement.stacks = stacks
            .into_iter()
            .map(|(kind, value)| {
                let next = value - sanitize_amount(self.rule_for(&kind).decay_per_turn);
                (kind, next)
            })
            .filter(|(_, value)| *value > 0.0)
            .collect();
    }

    /// The highest tier `actor` has reached for `kind`, if any.
    #[must_use]
    pub fn tier(&self, actor: &Actor, kind: &str) -> Option<&AttunementTier> {
        let stacks = actor.attunement.get(kind);
        if stacks <= 0.0 {
            return None;
        }
        self.rule_for(kind)
            .tiers
            .iter()
            .filter(|t| stacks >= t.at)
            .max_by(|a, b| a.at.total_cmp(&b.at))
    }

    fn add(&self, actor: &mut Actor, kind: &str, gain: f64) {
        let cap = sanitize_amount(self.rule_for(kind).cap);
        let entry = actor.attunement.stacks.entry(kind.to_string()).or_insert(0.0);
        *entry = (*entry + gain).min(cap);
        if *entry <= 0.0 {
            actor.attunement.stacks.remove(kind);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::ActorId;

    fn actor() -> Actor {
        Actor::new(ActorId::new(1), "caster", 10)
    }

    fn fire_config() -> AttunementConfig {
        serde_json::from_str(r#"{ "rules": { "fire": { "onUseGain": 2, "maxStacks": 5 } } }"#)
            .unwrap()
    }

    #[test]
    fn two_gains_then_decay() {
        let config = fire_config();
        let mut a = actor();
        config.gain(&mut a, "fire", 1.0);
        config.gain(&mut a, "fire", 1.0);
        assert_eq!(a.attunement.get("fire"), 4.0);
        config.decay(&mut a);
        assert_eq!(a.attunement.get("fire"), 3.0);
    }

    #[test]
    fn gain_respects_cap() {
        let config = fire_config();
        let mut a = actor();
        for _ in 0..10 {
            config.gain(&mut a, "fire", 100.0);
        }
        assert_eq!(a.attunement.get("fire"), 5.0);
    }

    #[test]
    fn large_hits_scale_past_minimum() {
        let config = AttunementConfig::default();
        let mut a = actor();
        let gained = config.gain(&mut a, "ice", 40.0);
        assert_eq!(gained, 4.0);
        assert_eq!(config.gain(&mut a, "ice", 1.0), 1.0);
    }

    #[test]
    fn decay_to_zero_removes_entry() {
        let config = AttunementConfig::default();
        let mut a = actor();
        config.gain(&mut a, "ice", 1.0);
        config.decay(&mut a);
        assert!(!a.attunement.stacks.contains_key("ice"));
    }

    #[test]
    fn leak_feeds_adjacent_types() {
        let mut config = fire_config();
        config.leak_fraction = 0.5;
        config.adjacency.insert("fire".into(), vec!["lightning".into(), "fire".into()]);
        let mut a = actor();
        config.gain(&mut a, "fire", 1.0);
        assert_eq!(a.attunement.get("fire"), 2.0);
        assert_eq!(a.attunement.get("lightning"), 1.0);
    }

    #[test]
    fn only_highest_tier_applies() {
        let mut config = AttunementConfig::default();
        config.default_rule.tiers = vec![
            AttunementTier { at: 5.0, affinity: 0.2, ..AttunementTier::default() },
            AttunementTier { at: 2.0, affinity: 0.1, ..AttunementTier::default() },
            AttunementTier { at: 9.0, affinity: 0.5, ..AttunementTier::default() },
        ];
        let mut a = actor();
        assert!(config.tier(&a, "fire").is_none());
        a.attunement.stacks.insert("fire".into(), 6.0);
        assert_eq!(config.tier(&a, "fire").map(|t| t.affinity), Some(0.2));
        a.attunement.stacks.insert("fire".into(), 1.0);
        assert!(config.tier(&a, "fire").is_none());
    }
}
