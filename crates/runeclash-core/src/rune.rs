//! Runes: placed triggers with gated, one-shot or repeating effects.
//!
//! A [`RuneDef`] is a read-only template shared by `Arc`. Placing it creates a
//! [`RuneInstance`] in the battle's [`RuneStore`], which owns the instance's
//! [`TriggerState`] and indexes instances by owner.
//!
//! Firing is handled by [`Battle::try_trigger`](crate::battle::Battle::try_trigger):
//! the trigger gate, the [`WardRule`] and the optional custom condition must all
//! pass before the [`RuneEffect`] runs.
//!
//! # Removal
//!
//! [`RuneStore::remove`] drops the instance and its owner index entry in the
//! same call. A rune whose last charge is spent is removed immediately after
//! its effect runs.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::actor::{Actor, ActorId, FactionService, Turn};
use crate::context::AttackIntent;
use crate::trigger::TriggerState;

/// Unique identifier for a placed rune.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RuneId(u64);

impl RuneId {
    /// Creates a new `RuneId` from a raw value.
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

impl fmt::Debug for RuneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RuneId({})", self.0)
    }
}

impl fmt::Display for RuneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Definitions
// =============================================================================

/// Mutation applied to the triggering actor by ward and utility runes.
pub type SideEffect = Arc<dyn Fn(&mut Actor, Turn) + Send + Sync>;

/// Extra gate evaluated against the triggering actor.
pub type Condition = Arc<dyn Fn(&Actor, Turn) -> bool + Send + Sync>;

/// What a rune does when it fires.
#[derive(Clone)]
pub enum RuneEffect {
    /// Resolves an attack from the owner onto each eligible victim.
    Attack(AttackIntent),
    /// Hands placement to the battle's [`HazardPlacer`].
    Hazard,
    /// Blocks the triggering interaction; optionally strikes back.
    Seal {
        /// Attack resolved from the owner onto the triggering actor.
        backfire: Option<AttackIntent>,
    },
    /// Protective side effect on the triggering actor.
    Ward(SideEffect),
    /// Any other side effect on the triggering actor.
    Utility(SideEffect),
}

impl RuneEffect {
    /// The effect's kind, for events and logs.
    #[must_use]
    pub const fn kind(&self) -> RuneEffectKind {
        match self {
            Self::Attack(_) => RuneEffectKind::Attack,
            Self::Hazard => RuneEffectKind::Hazard,
            Self::Seal { .. } => RuneEffectKind::Seal,
            Self::Ward(_) => RuneEffectKind::Ward,
            Self::Utility(_) => RuneEffectKind::Utility,
        }
    }
}

impl fmt::Debug for RuneEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Attack(intent) => f.debug_tuple("Attack").field(intent).finish(),
            Self::Seal { backfire } => f.debug_struct("Seal").field("backfire", backfire).finish(),
            other => write!(f, "{:?}", other.kind()),
        }
    }
}

/// Data-free tag of a [`RuneEffect`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RuneEffectKind {
    /// [`RuneEffect::Attack`].
    Attack,
    /// [`RuneEffect::Hazard`].
    Hazard,
    /// [`RuneEffect::Seal`].
    Seal,
    /// [`RuneEffect::Ward`].
    Ward,
    /// [`RuneEffect::Utility`].
    Utility,
}

/// Who may set a rune off, relative to its owner.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WardRule {
    /// No restriction.
    #[default]
    Anyone,
    /// Only actors hostile to the owner.
    HostileOnly,
    /// Only the owner's allies.
    AlliesOnly,
    /// Faction lists; `deny` wins over `allow`, and an empty `allow` admits
    /// everyone not denied.
    Factions {
        /// Factions admitted.
        allow: BTreeSet<String>,
        /// Factions refused.
        deny: BTreeSet<String>,
    },
}

impl WardRule {
    /// Returns true if `triggerer` passes this ward.
    ///
    /// Relational rules need the owner; with no owner in the roster they
    /// refuse everyone.
    #[must_use]
    pub fn admits(&self, factions: &dyn FactionService, owner: Option<&Actor>, triggerer: &Actor) -> bool {
        match self {
            Self::Anyone => true,
            Self::HostileOnly => owner.is_some_and(|o| factions.is_hostile(o, triggerer)),
            Self::AlliesOnly => owner.is_some_and(|o| factions.is_allied(o, triggerer)),
            Self::Factions { allow, deny } => {
                if triggerer.factions.iter().any(|f| deny.contains(f)) {
                    return false;
                }
                allow.is_empty() || triggerer.factions.iter().any(|f| allow.contains(f))
            }
        }
    }
}

/// Read-only rune template.
#[derive(Clone)]
pub struct RuneDef {
    /// Template name.
    pub name: String,
    /// Effect.
    pub effect: RuneEffect,
    /// Turns between firings.
    pub cooldown: Turn,
    /// Firings available, unlimited when `None`.
    pub charges: Option<u32>,
    /// Turns after placement before the rune is armed.
    pub arm_delay: Turn,
    /// Who may set it off.
    pub ward: WardRule,
    /// Extra gate on the triggering actor.
    pub condition: Option<Condition>,
}

impl fmt::Debug for RuneDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuneDef")
            .field("name", &self.name)
            .field("effect", &self.effect)
            .field("cooldown", &self.cooldown)
            .field("charges", &self.charges)
            .field("arm_delay", &self.arm_delay)
            .field("ward", &self.ward)
            .field("condition", &self.condition.is_some())
            .finish()
    }
}

impl RuneDef {
    /// Creates an immediately armed, unlimited, unwarded rune.
    #[must_use]
    pub fn new(name: &str, effect: RuneEffect) -> Self {
        Self {
            name: name.to_string(),
            effect,
            cooldown: 0,
            charges: None,
            arm_delay: 0,
            ward: WardRule::Anyone,
            condition: None,
        }
    }

    /// Sets the cooldown.
    #[must_use]
    pub fn with_cooldown(mut self, cooldown: Turn) -> Self {
        self.cooldown = cooldown;
        self
    }

    /// Limits the rune to `charges` firings.
    #[must_use]
    pub fn with_charges(mut self, charges: u32) -> Self {
        self.charges = Some(charges);
        self
    }

    /// Delays arming by `turns` after placement.
    #[must_use]
    pub fn with_arm_delay(mut self, turns: Turn) -> Self {
        self.arm_delay = turns;
        self
    }

    /// Sets the ward rule.
    #[must_use]
    pub fn with_ward(mut self, ward: WardRule) -> Self {
        self.ward = ward;
        self
    }

    /// Sets the custom condition.
    #[must_use]
    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.condition = Some(condition);
        self
    }
}

// =============================================================================
// Store
// =============================================================================

/// A placed rune.
#[derive(Debug, Clone)]
pub struct RuneInstance {
    /// Instance id.
    pub id: RuneId,
    /// Placing actor.
    pub owner: ActorId,
    /// Shared template.
    pub def: Arc<RuneDef>,
    /// Gate state.
    pub state: TriggerState,
}

/// Arena of placed runes with an owner index.
#[derive(Debug, Clone, Default)]
pub struct RuneStore {
    instances: BTreeMap<RuneId, RuneInstance>,
    by_owner: BTreeMap<ActorId, BTreeSet<RuneId>>,
    next_id: u64,
}

impl RuneStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Places `def` for `owner` at `turn`. Armed at `turn + def.arm_delay`.
    pub fn place(&mut self, owner: ActorId, def: Arc<RuneDef>, turn: Turn) -> RuneId {
        let id = RuneId::new(self.next_id);
        self.next_id += 1;
        let state = TriggerState::new(turn + def.arm_delay.max(0), def.charges);
        debug!(rune = %id, %owner, name = %def.name, armed_at = state.armed_at_turn, "rune placed");
        self.instances.insert(id, RuneInstance { id, owner, def, state });
        self.by_owner.entry(owner).or_default().insert(id);
        id
    }

    /// Looks up an instance.
    #[must_use]
    pub fn get(&self, id: RuneId) -> Option<&RuneInstance> {
        self.instances.get(&id)
    }

    /// Looks up an instance mutably.
    pub fn get_mut(&mut self, id: RuneId) -> Option<&mut RuneInstance> {
        self.instances.get_mut(&id)
    }

    /// Removes an instance and its owner index entry.
    pub fn remove(&mut self, id: RuneId) -> Option<RuneInstance> {
        let instance = self.instances.remove(&id)?;
        if let Some(owned) = self.by_owner.get_mut(&instance.owner) {
            owned.remove(&id);
            if owned.is_empty() {
                self.by_owner.remove(&instance.owner);
            }
        }
        Some(instance)
    }

    /// Removes every rune placed by `owner`.
    pub fn remove_owned_by(&mut self, owner: ActorId) -> Vec<RuneInstance> {
        let ids = self.by_owner.remove(&owner).unwrap_or_default();
        ids.into_iter().filter_map(|id| self.instances.remove(&id)).collect()
    }

    /// Ids of runes placed by `owner`, in id order.
    #[must_use]
    pub fn owned_by(&self, owner: ActorId) -> Vec<RuneId> {
        self.by_owner
            .get(&owner)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Iterates instances in id order.
    pub fn iter(&self) -> impl Iterator<Item = &RuneInstance> {
        self.instances.values()
    }

    /// Number of placed runes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    /// Returns true if no runes are placed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

/// Places hazards on behalf of hazard runes.
pub trait HazardPlacer: Send + Sync {
    /// Called once per hazard firing with the rune and the triggering actor.
    fn place(&self, rune: &RuneInstance, at: ActorId, turn: Turn);
}

/// Hazard placer that only logs.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHazards;

impl HazardPlacer for NoHazards {
    fn place(&self, rune: &RuneInstance, at: ActorId, turn: Turn) {
        debug!(rune = %rune.id, %at, turn, "hazard placement ignored");
    }
}
