//! Spells compiled from fragments.
//!
//! A [`FragmentCatalog`] holds reusable [`SpellFragment`]s. Compiling a list of
//! fragment ids produces a read-only [`SpellDef`]: packets and status attempts
//! concatenated in fragment order, power and mana summed, cooldown taken from
//! the slowest fragment. Compilation fails if a fragment is unknown or the
//! summed power exceeds the caster's budget.
//!
//! An actor holds learned spells as [`SpellSlot`]s, each pairing a shared
//! definition with its own [`TriggerState`].
//!
//! # Example
//!
//! ```
//! use runeclash_core::context::DamagePacket;
//! use runeclash_core::spell::{FragmentCatalog, SpellFragment};
//!
//! let mut catalog = FragmentCatalog::new();
//! catalog.insert(SpellFragment::new("ember", 3).with_packet(DamagePacket::new("fire", 4.0)));
//! catalog.insert(SpellFragment::new("spark", 2).with_packet(DamagePacket::new("lightning", 2.0)));
//!
//! let def = catalog.compile("firebolt", &["ember", "spark"], 5).unwrap();
//! assert_eq!(def.power, 5);
//! assert_eq!(def.intent.packets.len(), 2);
//!
//! assert!(catalog.compile("overload", &["ember", "spark"], 4).is_err());
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::actor::Turn;
use crate::context::{AttackIntent, AttackTags, DamagePacket, StatusAttempt};
use crate::trigger::TriggerState;

/// Failure to compile a spell.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpellError {
    /// A fragment id is not in the catalog.
    #[error("spell {spell}: unknown fragment {fragment}")]
    UnknownFragment {
        /// Spell being compiled.
        spell: String,
        /// Missing fragment id.
        fragment: String,
    },
    /// Summed fragment power exceeds the budget.
    #[error("spell {spell}: power {power} exceeds budget {budget}")]
    OverBudget {
        /// Spell being compiled.
        spell: String,
        /// Summed power.
        power: u32,
        /// Allowed power.
        budget: u32,
    },
    /// No fragments were given.
    #[error("spell {spell}: no fragments")]
    Empty {
        /// Spell being compiled.
        spell: String,
    },
}

/// One building block of a spell.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SpellFragment {
    /// Fragment id.
    pub id: String,
    /// Power counted against the compile budget.
    pub power: u32,
    /// Damage packets contributed.
    pub packets: Vec<DamagePacket>,
    /// Status attempts contributed.
    pub status_attempts: Vec<StatusAttempt>,
    /// Cooldown contributed; the spell uses the largest.
    pub cooldown: Turn,
    /// Mana contributed; the spell uses the sum.
    pub mana_cost: u32,
}

impl SpellFragment {
    /// Creates an empty fragment.
    #[must_use]
    pub fn new(id: &str, power: u32) -> Self {
        Self {
            id: id.to_string(),
            power,
            ..Self::default()
        }
    }

    /// Adds a damage packet.
    #[must_use]
    pub fn with_packet(mut self, packet: DamagePacket) -> Self {
        self.packets.push(packet);
        self
    }

    /// Adds a status attempt.
    #[must_use]
    pub fn with_status(mut self, attempt: StatusAttempt) -> Self {
        self.status_attempts.push(attempt);
        self
    }

    /// Sets the cooldown.
    #[must_use]
    pub fn with_cooldown(mut self, cooldown: Turn) -> Self {
        self.cooldown = cooldown;
        self
    }

    /// Sets the mana cost.
    #[must_use]
    pub fn with_mana_cost(mut self, mana_cost: u32) -> Self {
        self.mana_cost = mana_cost;
        self
    }
}

/// A compiled, read-only spell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpellDef {
    /// Spell id.
    pub id: String,
    /// Fragment ids in compile order.
    pub fragments: Vec<String>,
    /// Summed power.
    pub power: u32,
    /// Attack resolved on cast, tagged [`AttackTags::SPELL`].
    pub intent: AttackIntent,
    /// Turns between casts.
    pub cooldown: Turn,
    /// Mana per cast.
    pub mana_cost: u32,
    /// Casts available, unlimited when `None`.
    pub charges: Option<u32>,
}

impl SpellDef {
    /// Limits the spell to `charges` casts.
    #[must_use]
    pub fn with_charges(mut self, charges: u32) -> Self {
        self.charges = Some(charges);
        self
    }
}

/// Fragments by id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FragmentCatalog {
    fragments: BTreeMap<String, SpellFragment>,
}

impl FragmentCatalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a fragment.
    pub fn insert(&mut self, fragment: SpellFragment) {
        self.fragments.insert(fragment.id.clone(), fragment);
    }

    /// Looks up a fragment.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&SpellFragment> {
        self.fragments.get(id)
    }

    /// Compiles `fragment_ids` into a spell named `spell_id`.
    ///
    /// # Errors
    ///
    /// Returns [`SpellError::UnknownFragment`] for the first id missing from
    /// the catalog, [`SpellError::OverBudget`] if summed power exceeds
    /// `budget`, and [`SpellError::Empty`] if no ids are given.
    pub fn compile(&self, spell_id: &str, fragment_ids: &[&str], budget: u32) -> Result<SpellDef, SpellError> {
        if fragment_ids.is_empty() {
            return Err(SpellError::Empty {
                spell: spell_id.to_string(),
            });
        }

        let mut intent = AttackIntent::new(Vec::new(), AttackTags::SPELL);
        let mut power: u32 = 0;
        let mut cooldown: Turn = 0;
        let mut mana_cost: u32 = 0;
        for id in fragment_ids {
            let fragment = self.get(id).ok_or_else(|| SpellError::UnknownFragment {
                spell: spell_id.to_string(),
                fragment: (*id).to_string(),
            })?;
            power = power.saturating_add(fragment.power);
            cooldown = cooldown.max(fragment.cooldown);
            mana_cost = mana_cost.saturating_add(fragment.mana_cost);
            intent.packets.extend(fragment.packets.iter().cloned());
            intent.status_attempts.extend(fragment.status_attempts.iter().cloned());
        }

        if power > budget {
            return Err(SpellError::OverBudget {
                spell: spell_id.to_string(),
                power,
                budget,
            });
        }

        Ok(SpellDef {
            id: spell_id.to_string(),
            fragments: fragment_ids.iter().map(|id| (*id).to_string()).collect(),
            power,
            intent,
            cooldown,
            mana_cost,
            charges: None,
        })
    }
}

/// A learned spell: shared definition plus per-caster gate state.
#[derive(Debug, Clone, PartialEq)]
pub struct SpellSlot {
    /// Definition.
    pub def: Arc<SpellDef>,
    /// Arming, cooldown and charges.
    pub state: TriggerState,
}

impl SpellSlot {
    /// Creates a slot armed at `armed_at_turn`.
    #[must_use]
    pub fn new(def: Arc<SpellDef>, armed_at_turn: Turn) -> Self {
        let state = TriggerState::new(armed_at_turn, def.charges);
        Self { def, state }
    }
}
