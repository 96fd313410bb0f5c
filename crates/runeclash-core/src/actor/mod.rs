//! Actor and resource model.
//!
//! This module provides the combatant types shared by every other subsystem:
//! - [`ActorId`]: Unique identifier for actors within a battle
//! - [`Pool`]: A clamped `{cur, max}` resource pool
//! - [`ModCache`]: Folded equipment/content modifiers, consumed read-only
//! - [`Actor`]: The complete combatant container
//! - [`Roster`]: Deterministically ordered actor storage for one battle
//!
//! # Invariants
//!
//! Every pool keeps `cur` within `[0, max]`; all mutation goes through the
//! [`Pool`] API, which clamps. Turn stamps are `i64` and may hold [`NEVER`]
//! (`-1`) as a "never happened" sentinel.
//!
//! # Example
//!
//! ```
//! use runeclash_core::actor::{Actor, ActorId};
//!
//! let mut actor = Actor::new(ActorId::new(1), "brigand", 30);
//! actor.hp.drain(45);
//! assert_eq!(actor.hp.cur, 0);
//! assert!(actor.is_defeated());
//! ```

pub mod faction;
pub mod roster;
pub mod snapshot;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::context::{finite_or_zero, DamagePacket, StatusAttempt};
use crate::spell::SpellSlot;
use crate::status::StatusInstance;

pub use faction::{FactionService, FactionTable, UNALIGNED};
pub use roster::Roster;
pub use snapshot::ActorSnapshot;

/// Discrete turn counter.
pub type Turn = i64;

/// Sentinel turn stamp meaning "never".
pub const NEVER: Turn = -1;

/// Stamina cost of a basic attack when the weapon does not declare one.
pub const BASIC_ATTACK_STAMINA_COST: u32 = 2;

/// Action points spent by any action that does not declare its own cost.
pub const DEFAULT_AP_COST: u32 = 1;

/// Unique identifier for an actor.
///
/// Actor IDs are ordered by their numeric value, which gives the roster a
/// deterministic iteration order.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ActorId(u64);

impl ActorId {
    /// Creates a new `ActorId` from a raw value.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ActorId({})", self.0)
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ActorId {
    fn from(id: u64) -> Self {
        Self::new(id)
    }
}

// =============================================================================
// Resource Pools
// =============================================================================

/// A clamped resource pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Pool {
    /// Current value, always within `[0, max]`.
    pub cur: u32,
    /// Maximum value.
    pub max: u32,
}

impl Pool {
    /// Creates a full pool.
    #[must_use]
    pub const fn full(max: u32) -> Self {
        Self { cur: max, max }
    }

    /// Creates a pool with an explicit current value, clamped to `max`.
    #[must_use]
    pub fn with_cur(cur: u32, max: u32) -> Self {
        Self {
            cur: cur.min(max),
            max,
        }
    }

    /// Returns true if `amount` can be paid.
    #[must_use]
    pub const fn can_pay(&self, amount: u32) -> bool {
        self.cur >= amount
    }

    /// Pays `amount` if affordable. Returns false, leaving the pool untouched,
    /// otherwise.
    pub fn spend(&mut self, amount: u32) -> bool {
        if self.can_pay(amount) {
            self.cur -= amount;
            true
        } else {
            false
        }
    }

    /// Removes up to `amount`, stopping at zero. Returns what was removed.
    pub fn drain(&mut self, amount: u32) -> u32 {
        let removed = amount.min(self.cur);
        self.cur -= removed;
        removed
    }

    /// Adds up to `amount`, stopping at `max`. Returns what was added.
    pub fn restore(&mut self, amount: u32) -> u32 {
        let added = amount.min(self.max.saturating_sub(self.cur));
        self.cur += added;
        added
    }

    /// Sets the current value, clamped to `[0, max]`.
    pub fn set(&mut self, cur: u32) {
        self.cur = cur.min(self.max);
    }

    /// Refills to `max`.
    pub fn refill(&mut self) {
        self.cur = self.max;
    }

    /// Returns true if the pool is at zero.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.cur == 0
    }
}

/// Base stats. Regeneration applies during turn upkeep.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BaseStats {
    /// Flat bonus added to the first packet of basic attacks.
    pub power: u32,
    /// HP restored per upkeep.
    pub hp_regen: u32,
    /// Mana restored per upkeep.
    pub mana_regen: u32,
    /// Stamina restored per upkeep.
    pub stamina_regen: u32,
}

// =============================================================================
// Modifier Cache
// =============================================================================

/// Extra damage added by an equipped brand.
///
/// A brand appends a packet of its own type worth
/// `flat + pct x (sum of the attack's pre-packets)`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Brand {
    /// Damage type of the added packet.
    pub kind: String,
    /// Flat amount.
    pub flat: f64,
    /// Fraction of the attack's base damage.
    pub pct: f64,
}

/// Folded equipment/content modifiers.
///
/// Computed outside the combat core and consumed read-only. Lookups sanitize
/// non-finite values to zero (or to the neutral multiplier for multipliers).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModCache {
    /// Offensive affinity per damage type (`0.1` = +10%).
    pub affinities: BTreeMap<String, f64>,
    /// Resist per damage type (`0.25` = -25% damage taken).
    pub resists: BTreeMap<String, f64>,
    /// Brands appended to outgoing attacks.
    pub brands: Vec<Brand>,
    /// Multiplier on ability and spell cooldowns.
    pub cooldown_mult: f64,
    /// Multiplier on resource costs.
    pub cost_mult: f64,
    /// Attacker-side multiplier on status chances.
    pub status_chance_mult: f64,
    /// Defender-side resist per status id, within `[0, 1]`.
    pub status_resist: BTreeMap<String, f64>,
    /// Multiplier on durations of beneficial statuses received.
    pub buff_dur_mult: f64,
    /// Multiplier on durations of harmful statuses received.
    pub debuff_dur_mult: f64,
}

impl Default for ModCache {
    fn default() -> Self {
        Self {
            affinities: BTreeMap::new(),
            resists: BTreeMap::new(),
            brands: Vec::new(),
            cooldown_mult: 1.0,
            cost_mult: 1.0,
            status_chance_mult: 1.0,
            status_resist: BTreeMap::new(),
            buff_dur_mult: 1.0,
            debuff_dur_mult: 1.0,
        }
    }
}

impl ModCache {
    /// Affinity for a damage type, 0 when absent.
    #[must_use]
    pub fn affinity(&self, kind: &str) -> f64 {
        self.affinities.get(kind).copied().map_or(0.0, finite_or_zero)
    }

    /// Raw resist for a damage type, 0 when absent. Not yet clamped.
    #[must_use]
    pub fn resist(&self, kind: &str) -> f64 {
        self.resists.get(kind).copied().map_or(0.0, finite_or_zero)
    }

    /// Status resist for a status id, clamped to `[0, 1]`.
    #[must_use]
    pub fn status_resist(&self, id: &str) -> f64 {
        self.status_resist
            .get(id)
            .copied()
            .map_or(0.0, |r| finite_or_zero(r).clamp(0.0, 1.0))
    }

    /// Applies the cost multiplier to a base cost, rounding up.
    #[must_use]
    pub fn scale_cost(&self, base: u32) -> u32 {
        scale_u32(base, self.cost_mult)
    }

    /// Applies the cooldown multiplier to a base cooldown, rounding up.
    #[must_use]
    pub fn scale_cooldown(&self, base: Turn) -> Turn {
        let mult = neutral_if_invalid(self.cooldown_mult);
        // cooldowns are small turn counts
        #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
        let scaled = (base.max(0) as f64 * mult).ceil() as Turn;
        scaled.max(0)
    }
}

/// Replaces non-finite or negative multipliers with 1.
pub(crate) fn neutral_if_invalid(mult: f64) -> f64 {
    if mult.is_finite() && mult >= 0.0 {
        mult
    } else {
        1.0
    }
}

fn scale_u32(base: u32, mult: f64) -> u32 {
    let scaled = (f64::from(base) * neutral_if_invalid(mult)).ceil();
    if scaled >= f64::from(u32::MAX) {
        u32::MAX
    } else {
        // non-negative and below u32::MAX by the checks above
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let v = scaled as u32;
        v
    }
}

// =============================================================================
// Loadout
// =============================================================================

/// Per-actor attunement stacks, keyed by damage type.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Attunement {
    /// Current stacks. Entries at or below zero are removed, never kept.
    pub stacks: BTreeMap<String, f64>,
}

impl Attunement {
    /// Stacks for a type, 0 when absent.
    #[must_use]
    pub fn get(&self, kind: &str) -> f64 {
        self.stacks.get(kind).copied().unwrap_or(0.0)
    }
}

/// The weapon used for basic attacks.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Weapon {
    /// Damage packets dealt per swing.
    pub packets: Vec<DamagePacket>,
    /// Status effects attempted on hit.
    pub status_attempts: Vec<StatusAttempt>,
    /// Stamina cost; [`BASIC_ATTACK_STAMINA_COST`] when absent.
    pub stamina_cost: Option<u32>,
}

/// A cooldown-limited ability.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Ability {
    /// Damage packets.
    pub packets: Vec<DamagePacket>,
    /// Status effects attempted on hit.
    pub status_attempts: Vec<StatusAttempt>,
    /// Base cooldown in turns.
    pub cooldown: Turn,
    /// Stamina cost.
    pub stamina_cost: u32,
    /// Mana cost.
    pub mana_cost: u32,
}

// =============================================================================
// Actor
// =============================================================================

/// A combatant.
///
/// Owned exclusively by the battle it takes part in and mutated in place by
/// the resolution and status engines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Actor {
    /// Identity within the battle.
    pub id: ActorId,
    /// Display / template name.
    pub name: String,
    /// Faction memberships.
    pub factions: BTreeSet<String>,
    /// Hit points.
    pub hp: Pool,
    /// Mana.
    pub mana: Pool,
    /// Stamina.
    pub stamina: Pool,
    /// Action points, refilled every upkeep.
    pub ap: Pool,
    /// Base stats.
    pub stats: BaseStats,
    /// Folded modifiers.
    pub mod_cache: ModCache,
    /// Active statuses, in application order.
    pub statuses: Vec<StatusInstance>,
    /// Attunement stacks.
    pub attunement: Attunement,
    /// Ability id -> turn at which it is ready again.
    pub cooldowns: BTreeMap<String, Turn>,
    /// Optional polarity tag carried through snapshots.
    pub polarity: Option<String>,
    /// Basic attack weapon.
    pub weapon: Weapon,
    /// Abilities by id.
    pub abilities: BTreeMap<String, Ability>,
    /// Compiled spells by id.
    #[serde(skip)]
    pub spells: BTreeMap<String, SpellSlot>,
}

impl Actor {
    /// Creates an actor with full HP, one action point and empty loadout.
    #[must_use]
    pub fn new(id: ActorId, name: &str, max_hp: u32) -> Self {
        Self {
            id,
            name: name.to_string(),
            factions: BTreeSet::new(),
            hp: Pool::full(max_hp),
            mana: Pool::default(),
            stamina: Pool::default(),
            ap: Pool::full(1),
            stats: BaseStats::default(),
            mod_cache: ModCache::default(),
            statuses: Vec::new(),
            attunement: Attunement::default(),
            cooldowns: BTreeMap::new(),
            polarity: None,
            weapon: Weapon::default(),
            abilities: BTreeMap::new(),
            spells: BTreeMap::new(),
        }
    }

    /// Adds a faction membership.
    #[must_use]
    pub fn with_faction(mut self, faction: &str) -> Self {
        self.factions.insert(faction.to_string());
        self
    }

    /// Returns true once HP has reached zero.
    #[must_use]
    pub const fn is_defeated(&self) -> bool {
        self.hp.is_empty()
    }

    /// Returns the active status with the given id, if any.
    #[must_use]
    pub fn status(&self, id: &str) -> Option<&StatusInstance> {
        self.statuses.iter().find(|s| s.id == id)
    }

    /// Turn at which an ability is ready, [`NEVER`] if it never fired.
    #[must_use]
    pub fn ready_at(&self, ability: &str) -> Turn {
        self.cooldowns.get(ability).copied().unwrap_or(NEVER)
    }
}

/// Default damage application: removes HP, clamped at zero.
///
/// Returns the HP actually removed. This is the function the status engine
/// receives by injection; see [`crate::status::StatusEngine::new`].
pub fn apply_damage(actor: &mut Actor, amount: u32) -> u32 {
    actor.hp.drain(amount)
}
