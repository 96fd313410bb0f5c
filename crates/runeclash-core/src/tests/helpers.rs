//! Test helper functions for setting up actors, templates and battles.

use std::sync::Arc;

use crate::actor::{Actor, ActorId, Pool};
use crate::battle::Battle;
use crate::context::{DamagePacket, StatusAttempt};
use crate::resolver::EventLog;
use crate::simulation::{ActorTemplate, SimConfig};

// =============================================================================
// Templates
// =============================================================================

/// A brigand: 7 physical per swing with a 10% physical affinity and a 30%
/// chance to bleed for 2 per turn.
pub fn brigand_template() -> ActorTemplate {
    let mut template = ActorTemplate::named("brigand", 30);
    template.factions.insert("outlaws".into());
    template.stamina = 20;
    template.stats.stamina_regen = 1;
    template.mod_cache.affinities.insert("physical".into(), 0.1);
    template.weapon.packets = vec![DamagePacket::new("physical", 7.0)];
    template.weapon.status_attempts = vec![StatusAttempt::new("bleed", 0.3, 2.0).with_potency(2.0)];
    template
}

/// A training dummy: 40 HP, swings an empty weapon for free.
pub fn dummy_template() -> ActorTemplate {
    let mut template = ActorTemplate::named("dummy", 40);
    template.factions.insert("training".into());
    template.weapon.stamina_cost = Some(0);
    template
}

/// Brigand (A) against dummy (B).
pub fn balance_config(n: u32, seed: i32) -> SimConfig {
    SimConfig::new(brigand_template(), dummy_template(), n, seed)
}

// =============================================================================
// Battles
// =============================================================================

/// Builds an actor with 20 stamina and a single-packet weapon.
pub fn fighter(id: ActorId, name: &str, hp: u32, kind: &str, damage: f64) -> Actor {
    let mut actor = Actor::new(id, name, hp);
    actor.stamina = Pool::full(20);
    actor.weapon.packets = vec![DamagePacket::new(kind, damage)];
    actor
}

/// A two-actor battle recording events into the returned log.
///
/// Returns `(battle, log, attacker, defender)`; the attacker swings 5
/// physical, the defender has 30 HP and no weapon.
pub fn duel(seed: i32) -> (Battle, Arc<EventLog>, ActorId, ActorId) {
    let log = Arc::new(EventLog::new());
    let mut battle = Battle::new(seed).with_events(log.clone());
    let attacker = battle
        .roster_mut()
        .spawn(|id| fighter(id, "attacker", 30, "physical", 5.0).with_faction("red"));
    let defender = battle
        .roster_mut()
        .spawn(|id| Actor::new(id, "defender", 30).with_faction("blue"));
    (battle, log, attacker, defender)
}

/// Current HP of an actor, 0 if missing.
pub fn get_hp(battle: &Battle, id: ActorId) -> u32 {
    battle.actor(id).map_or(0, |a| a.hp.cur)
}
