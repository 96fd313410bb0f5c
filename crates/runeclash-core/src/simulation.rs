//! Seeded batch simulation of two actor templates.
//!
//! A [`Simulation`] plays `n` matches of template A against template B and
//! aggregates wins, match length and damage per turn into a
//! [`SimulationResult`]. Every match starts from fresh actors; only the RNG
//! carries over.
//!
//! # Rounds
//!
//! A round is A's turn followed by B's, both driven by the [`TurnScheduler`]
//! with the stock [`StrikePlanner`]. A completed round counts one turn. A
//! match that ends during A's turn counts [`PARTIAL_TURN_CREDIT`] for that
//! final round. A match still running after `turn_cap` rounds is a draw.
//!
//! # Determinism
//!
//! - [`Simulation::run`] threads one [`CombatRng`] seeded from `seed` through
//!   every match in order.
//! - [`Simulation::run_parallel`] first draws one sub-seed per match from a
//!   `ChaCha8Rng` seeded from `seed`, then plays matches on rayon, each with
//!   its own RNG. Results are collected in match order.
//!
//! Both are reproducible bit-for-bit for a given config, but they do not
//! produce the same numbers as each other.
//!
//! # Example
//!
//! ```
//! use runeclash_core::context::DamagePacket;
//! use runeclash_core::simulation::{simulate, ActorTemplate, SimConfig};
//!
//! let mut striker = ActorTemplate::named("striker", 20);
//! striker.weapon.packets = vec![DamagePacket::new("physical", 5.0)];
//! striker.weapon.stamina_cost = Some(0);
//! let post = ActorTemplate::named("post", 20);
//!
//! let result = simulate(&SimConfig::new(striker, post, 10, 42));
//! assert_eq!(result.wins_a, 10);
//! assert_eq!(result.turns_avg, 3.5);
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::actor::{Ability, Actor, ActorId, BaseStats, ModCache, Pool, Turn, Weapon};
use crate::battle::Battle;
use crate::resolver::AttackResolver;
use crate::rng::CombatRng;
use crate::scheduler::{StrikePlanner, TurnScheduler};

/// Turn credit for a final round cut short on A's turn.
pub const PARTIAL_TURN_CREDIT: f64 = 0.5;

/// Round limit when a config does not set one.
pub const DEFAULT_TURN_CAP: u32 = 100;

// =============================================================================
// Configuration
// =============================================================================

/// Serializable description of an actor, instantiated fresh for every match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActorTemplate {
    /// Name.
    pub name: String,
    /// Faction memberships.
    pub factions: BTreeSet<String>,
    /// Max HP.
    pub hp: u32,
    /// Max mana.
    pub mana: u32,
    /// Max stamina.
    pub stamina: u32,
    /// Max action points.
    pub ap: u32,
    /// Base stats.
    pub stats: BaseStats,
    /// Folded modifiers.
    pub mod_cache: ModCache,
    /// Basic attack weapon.
    pub weapon: Weapon,
    /// Abilities by id.
    pub abilities: BTreeMap<String, Ability>,
    /// Optional polarity tag.
    pub polarity: Option<String>,
}

impl Default for ActorTemplate {
    fn default() -> Self {
        Self::named("actor", 10)
    }
}

impl ActorTemplate {
    /// Creates a template with `hp` max HP, one action point and nothing else.
    #[must_use]
    pub fn named(name: &str, hp: u32) -> Self {
        Self {
            name: name.to_string(),
            factions: BTreeSet::new(),
            hp,
            mana: 0,
            stamina: 0,
            ap: 1,
            stats: BaseStats::default(),
            mod_cache: ModCache::default(),
            weapon: Weapon::default(),
            abilities: BTreeMap::new(),
            polarity: None,
        }
    }

    /// Builds a full-resource actor from this template.
    #[must_use]
    pub fn instantiate(&self, id: ActorId) -> Actor {
        let mut actor = Actor::new(id, &self.name, self.hp);
        actor.factions.clone_from(&self.factions);
        actor.mana = Pool::full(self.mana);
        actor.stamina = Pool::full(self.stamina);
        actor.ap = Pool::full(self.ap);
        actor.stats = self.stats.clone();
        actor.mod_cache = self.mod_cache.clone();
        actor.weapon = self.weapon.clone();
        actor.abilities = self.abilities.clone();
        actor.polarity.clone_from(&self.polarity);
        actor
    }
}

/// Batch parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Side A; acts first every round.
    pub template_a: ActorTemplate,
    /// Side B.
    pub template_b: ActorTemplate,
    /// Number of matches.
    pub n: u32,
    /// Master seed.
    pub seed: i32,
    /// Round limit per match.
    pub turn_cap: u32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            template_a: ActorTemplate::default(),
            template_b: ActorTemplate::default(),
            n: 100,
            seed: 0,
            turn_cap: DEFAULT_TURN_CAP,
        }
    }
}

impl SimConfig {
    /// Creates a config with the default turn cap.
    #[must_use]
    pub fn new(template_a: ActorTemplate, template_b: ActorTemplate, n: u32, seed: i32) -> Self {
        Self {
            template_a,
            template_b,
            n,
            seed,
            turn_cap: DEFAULT_TURN_CAP,
        }
    }
}

// =============================================================================
// Results
// =============================================================================

/// Which side won a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    /// Template A.
    A,
    /// Template B.
    B,
}

/// Outcome of one match.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    /// Winner; `None` for a draw.
    pub winner: Option<Side>,
    /// Turns credited.
    pub turns: f64,
    /// HP lost by both actors.
    pub damage: u64,
}

impl MatchResult {
    /// Damage per credited turn, 0 for a zero-length match.
    #[must_use]
    pub fn dps(&self) -> f64 {
        if self.turns > 0.0 {
            // match damage is far below 2^52
            #[allow(clippy::cast_precision_loss)]
            let damage = self.damage as f64;
            damage / self.turns
        } else {
            0.0
        }
    }
}

/// Aggregate over a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    /// Matches won by A.
    pub wins_a: u32,
    /// Matches won by B.
    pub wins_b: u32,
    /// Drawn matches.
    pub draws: u32,
    /// Mean turns per match.
    pub turns_avg: f64,
    /// Mean of per-match damage per turn.
    pub dps_avg: f64,
    /// Number of matches.
    pub n: u32,
    /// Master seed.
    pub seed: i32,
}

// =============================================================================
// Runner
// =============================================================================

/// Batch runner for one config.
#[derive(Debug, Clone)]
pub struct Simulation {
    config: SimConfig,
    resolver: Arc<AttackResolver>,
}

impl Simulation {
    /// Creates a runner with the default resolver.
    #[must_use]
    pub fn new(config: SimConfig) -> Self {
        Self {
            config,
            resolver: Arc::new(AttackResolver::default()),
        }
    }

    /// Replaces the resolver shared by every match.
    #[must_use]
    pub fn with_resolver(mut self, resolver: Arc<AttackResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    /// The config.
    #[must_use]
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Plays every match in order on one RNG.
    #[must_use]
    pub fn run(&self) -> SimulationResult {
        let mut rng = CombatRng::new(self.config.seed);
        let mut matches = Vec::with_capacity(self.config.n as usize);
        for _ in 0..self.config.n {
            let (result, next) = self.run_match(rng);
            matches.push(result);
            rng = next;
        }
        let result = self.aggregate(&matches);
        info!(
            n = result.n,
            seed = result.seed,
            wins_a = result.wins_a,
            wins_b = result.wins_b,
            draws = result.draws,
            turns_avg = result.turns_avg,
            dps_avg = result.dps_avg,
            "simulation complete"
        );
        result
    }

    /// Plays matches on rayon, each on its own pre-drawn sub-seed.
    #[must_use]
    pub fn run_parallel(&self) -> SimulationResult {
        let mut seeder = ChaCha8Rng::seed_from_u64(u64::from(u32::from_ne_bytes(self.config.seed.to_ne_bytes())));
        let seeds: Vec<i32> = (0..self.config.n)
            .map(|_| i32::from_ne_bytes(seeder.next_u32().to_ne_bytes()))
            .collect();

        let matches: Vec<MatchResult> = seeds
            .into_par_iter()
            .map(|seed| self.run_match(CombatRng::new(seed)).0)
            .collect();

        let result = self.aggregate(&matches);
        info!(
            n = result.n,
            seed = result.seed,
            wins_a = result.wins_a,
            wins_b = result.wins_b,
            draws = result.draws,
            turns_avg = result.turns_avg,
            dps_avg = result.dps_avg,
            "parallel simulation complete"
        );
        result
    }

    /// Plays one match, returning its result and the RNG in its final state.
    #[must_use]
    pub fn run_match(&self, rng: CombatRng) -> (MatchResult, CombatRng) {
        let mut battle = Battle::new(0).with_rng(rng).with_resolver(Arc::clone(&self.resolver));
        let a = battle.roster_mut().spawn(|id| self.config.template_a.instantiate(id));
        let b = battle.roster_mut().spawn(|id| self.config.template_b.instantiate(id));
        let mut scheduler = TurnScheduler::new();
        let mut planner = StrikePlanner;

        let mut turns = 0.0;
        let mut over = false;
        for round in 1..=Turn::from(self.config.turn_cap) {
            battle.set_turn(round);
            scheduler.run_turn(&mut battle, a, &mut planner);
            if Self::is_over(&battle, a, b) {
                turns += PARTIAL_TURN_CREDIT;
                over = true;
                break;
            }
            scheduler.run_turn(&mut battle, b, &mut planner);
            turns += 1.0;
            if Self::is_over(&battle, a, b) {
                over = true;
                break;
            }
        }

        let winner = if over { Self::winner(&battle, a, b) } else { None };
        let result = MatchResult {
            winner,
            turns,
            damage: battle.damage_dealt(),
        };
        debug!(?winner, turns, damage = result.damage, "match complete");
        (result, battle.into_rng())
    }

    fn is_over(battle: &Battle, a: ActorId, b: ActorId) -> bool {
        !battle.roster().is_alive(a) || !battle.roster().is_alive(b)
    }

    fn winner(battle: &Battle, a: ActorId, b: ActorId) -> Option<Side> {
        match (battle.roster().is_alive(a), battle.roster().is_alive(b)) {
            (true, false) => Some(Side::A),
            (false, true) => Some(Side::B),
            _ => None,
        }
    }

    fn aggregate(&self, matches: &[MatchResult]) -> SimulationResult {
        let count = |side: Option<Side>| {
            let n = matches.iter().filter(|m| m.winner == side).count();
            u32::try_from(n).unwrap_or(u32::MAX)
        };
        let (turns_avg, dps_avg) = if matches.is_empty() {
            (0.0, 0.0)
        } else {
            // batch sizes are u32
            #[allow(clippy::cast_precision_loss)]
            let n = matches.len() as f64;
            (
                matches.iter().map(|m| m.turns).sum::<f64>() / n,
                matches.iter().map(MatchResult::dps).sum::<f64>() / n,
            )
        };
        SimulationResult {
            wins_a: count(Some(Side::A)),
            wins_b: count(Some(Side::B)),
            draws: count(None),
            turns_avg,
            dps_avg,
            n: self.config.n,
            seed: self.config.seed,
        }
    }
}

/// Runs `config` sequentially with the default resolver.
#[must_use]
pub fn simulate(config: &SimConfig) -> SimulationResult {
    Simulation::new(config.clone()).run()
}

/// Runs `config` on rayon with the default resolver.
#[must_use]
pub fn simulate_parallel(config: &SimConfig) -> SimulationResult {
    Simulation::new(config.clone()).run_parallel()
}
