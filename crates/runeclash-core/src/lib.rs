//! # Runeclash Core
//!
//! Deterministic turn-based combat resolution for Runeclash.
//!
//! This crate resolves attacks between actors, applies and ticks status
//! effects, tracks per-damage-type attunement, schedules turns for sync and
//! async planners, fires runes and spells, and runs seeded batch simulations
//! for balance testing.
//!
//! ## Architecture
//!
//! - **Actors** ([`actor`]): resource pools, modifiers, statuses, loadout
//! - **Resolution** ([`resolver`]): the staged attack pipeline and events
//! - **Statuses** ([`status`]): stacking, ticking, expiry and attunement
//! - **Battle** ([`battle`]): the match world planners act through
//! - **Scheduling** ([`scheduler`]): one upkeep, one planner call and one
//!   completion event per turn
//! - **Triggers** ([`trigger`], [`rune`], [`spell`]): gated effects
//! - **Harness** ([`simulation`]): seeded batch runs
//!
//! ## Determinism
//!
//! All randomness comes from an explicitly passed [`rng::CombatRng`]. All
//! keyed collections are `BTreeMap`s. Same seed and same inputs give the same
//! results, bit for bit.
//!
//! ## Usage
//!
//! ```
//! use runeclash_core::actor::{Actor, Pool};
//! use runeclash_core::battle::Battle;
//! use runeclash_core::context::DamagePacket;
//!
//! let mut battle = Battle::new(42);
//! let brigand = battle.roster_mut().spawn(|id| {
//!     let mut actor = Actor::new(id, "brigand", 30);
//!     actor.stamina = Pool::full(12);
//!     actor.weapon.packets = vec![DamagePacket::new("base", 8.0)];
//!     actor
//! });
//! let dummy = battle.roster_mut().spawn(|id| Actor::new(id, "dummy", 40));
//!
//! let ctx = battle.basic_attack(brigand, dummy).unwrap();
//! assert_eq!(ctx.total_damage, 8);
//! assert_eq!(battle.actor(dummy).unwrap().hp.cur, 32);
//! assert_eq!(battle.actor(brigand).unwrap().stamina.cur, 10);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod actor;
pub mod battle;
pub mod config;
pub mod context;
pub mod resolver;
pub mod rng;
pub mod rune;
pub mod scheduler;
pub mod simulation;
pub mod spell;
pub mod status;
pub mod trigger;

pub use actor::{Actor, ActorId, Turn};
pub use battle::{Battle, Refusal};
pub use resolver::{AttackResolver, CombatEvent, EventLog, EventSink};
pub use rng::CombatRng;
pub use scheduler::{AsyncPlanner, Planner, TurnScheduler};
pub use simulation::{simulate, simulate_parallel, SimConfig, SimulationResult};

#[cfg(test)]
mod tests;
