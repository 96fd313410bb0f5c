//! Attack resolution and combat events.
//!
//! The [`AttackResolver`] turns an [`AttackIntent`](crate::context::AttackIntent)
//! into HP loss, status applications and attunement gain, recording each stage
//! in an [`AttackContext`](crate::context::AttackContext). Every resolution
//! emits one [`CombatEvent::AttackResolved`] through an [`EventSink`].
//!
//! # Stages
//!
//! ```text
//! pre      packets as declared (sanitized)
//! offense  attacker affinity + attunement tier, then brand packets
//! defense  defender resist + attunement tier, capped at MAX_RESIST
//! applied  floor(sum) removed from defender HP
//! ```
//!
//! Status rolls and attunement gain follow the applied stage.
//!
//! # Invariants
//!
//! - Damage is never negative and never exceeds the defender's HP before the
//!   hit in effect (HP clamps at zero).
//! - Every well-formed status attempt draws exactly one number from the RNG,
//!   even when its chance is 0 or 1. Malformed attempts draw nothing.

mod combat;
mod event;

pub use combat::{AttackResolver, MAX_RESIST};
pub use event::{CombatEvent, EventLog, EventSink, NullSink};
