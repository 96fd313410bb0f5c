//! Flat, serializable actor snapshots.
//!
//! A snapshot carries the mutable combat state of an actor: pools, statuses,
//! attunement, cooldowns and polarity. Static loadout (weapon, abilities,
//! modifiers) comes from the actor's template and is not part of the blob.
//!
//! `capture -> hydrate -> capture` yields an identical snapshot.
//!
//! # Example
//!
//! ```
//! use runeclash_core::actor::{Actor, ActorId, ActorSnapshot};
//!
//! let mut actor = Actor::new(ActorId::new(1), "a", 20);
//! actor.hp.drain(5);
//! actor.cooldowns.insert("cleave".into(), 4);
//!
//! let blob = ActorSnapshot::capture(&actor);
//! let json = blob.to_json().unwrap();
//!
//! let mut fresh = Actor::new(ActorId::new(1), "a", 20);
//! ActorSnapshot::from_json(&json).unwrap().hydrate(&mut fresh);
//! assert_eq!(ActorSnapshot::capture(&fresh), blob);
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{Actor, Pool, Turn};
use crate::status::StatusInstance;

const MANA: &str = "mana";
const STAMINA: &str = "stamina";

/// Serializable combat state of one actor.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ActorSnapshot {
    /// Hit points.
    pub hp: Pool,
    /// Action points.
    pub ap: Pool,
    /// Active statuses in order.
    pub statuses: Vec<StatusInstance>,
    /// Attunement stacks by damage type.
    pub attunement: BTreeMap<String, f64>,
    /// Secondary resource pools by name (`mana`, `stamina`).
    pub pools: BTreeMap<String, Pool>,
    /// Ability id -> ready-at turn, ordered by id.
    pub cooldowns: BTreeMap<String, Turn>,
    /// Optional polarity tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub polarity: Option<String>,
}

impl ActorSnapshot {
    /// Captures the combat state of an actor.
    #[must_use]
    pub fn capture(actor: &Actor) -> Self {
        let mut pools = BTreeMap::new();
        pools.insert(MANA.to_string(), actor.mana);
        pools.insert(STAMINA.to_string(), actor.stamina);
        Self {
            hp: actor.hp,
            ap: actor.ap,
            statuses: actor.statuses.clone(),
            attunement: actor.attunement.stacks.clone(),
            pools,
            cooldowns: actor.cooldowns.clone(),
            polarity: actor.polarity.clone(),
        }
    }

    /// Writes this snapshot's state into `actor`.
    ///
    /// Pools are re-clamped on the way in; unknown pool names are ignored.
    /// Attunement entries at or below zero are dropped.
    pub fn hydrate(&self, actor: &mut Actor) {
        actor.hp = Pool::with_cur(self.hp.cur, self.hp.max);
        actor.ap = Pool::with_cur(self.ap.cur, self.ap.max);
        actor.statuses.clone_from(&self.statuses);
        actor.attunement.stacks = self
            .attunement
            .iter()
            .filter(|(_, v)| **v > 0.0)
            .map(|(k, v)| (k.clone(), *v))
            .collect();
        if let Some(pool) = self.pools.get(MANA) {
            actor.mana = Pool::with_cur(pool.cur, pool.max);
        }
        if let Some(pool) = self.pools.get(STAMINA) {
            actor.stamina = Pool::with_cur(pool.cur, pool.max);
        }
        actor.cooldowns.clone_from(&self.cooldowns);
        actor.polarity.clone_from(&self.polarity);
    }

    /// Encodes as JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Decodes from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is not a valid snapshot.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
