//! Roster: the actor store for one battle.
//!
//! The roster is the single point where an [`ActorId`] is resolved to an
//! [`Actor`]. Callers pass ids around and resolve them once, at the boundary,
//! instead of carrying references through the pipeline.
//!
//! Storage is a `BTreeMap`, so iteration is in id order on every platform.
//!
//! # Example
//!
//! ```
//! use runeclash_core::actor::{Actor, ActorId, Roster};
//!
//! let mut roster = Roster::new();
//! let a = roster.spawn(|id| Actor::new(id, "a", 10));
//! let b = roster.spawn(|id| Actor::new(id, "b", 10));
//!
//! let (attacker, defender) = roster.pair_mut(a, b).unwrap();
//! defender.hp.drain(3);
//! assert_eq!(attacker.hp.cur, 10);
//! assert_eq!(roster.get(b).unwrap().hp.cur, 7);
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{Actor, ActorId};

/// Deterministically ordered actor storage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Roster {
    actors: BTreeMap<ActorId, Actor>,
    next_id: u64,
}

impl Roster {
    /// Creates an empty roster.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates the next id and inserts the actor built for it.
    pub fn spawn(&mut self, build: impl FnOnce(ActorId) -> Actor) -> ActorId {
        let id = ActorId::new(self.next_id);
        self.next_id += 1;
        let mut actor = build(id);
        actor.id = id;
        self.actors.insert(id, actor);
        id
    }

    /// Inserts an actor under its own id, replacing any previous occupant.
    pub fn insert(&mut self, actor: Actor) -> Option<Actor> {
        let id = actor.id;
        self.next_id = self.next_id.max(id.as_u64() + 1);
        self.actors.insert(id, actor)
    }

    /// Removes an actor.
    pub fn remove(&mut self, id: ActorId) -> Option<Actor> {
        self.actors.remove(&id)
    }

    /// Looks up an actor.
    #[must_use]
    pub fn get(&self, id: ActorId) -> Option<&Actor> {
        self.actors.get(&id)
    }

    /// Looks up an actor mutably.
    pub fn get_mut(&mut self, id: ActorId) -> Option<&mut Actor> {
        self.actors.get_mut(&id)
    }

    /// Returns two distinct actors mutably.
    ///
    /// Returns `None` if either id is missing or both ids are equal.
    pub fn pair_mut(&mut self, a: ActorId, b: ActorId) -> Option<(&mut Actor, &mut Actor)> {
        if a == b {
            return None;
        }
        let mut first = None;
        let mut second = None;
        for (id, actor) in &mut self.actors {
            if *id == a {
                first = Some(actor);
            } else if *id == b {
                second = Some(actor);
            }
        }
        first.zip(second)
    }

    /// Returns true if the actor exists and is not defeated.
    #[must_use]
    pub fn is_alive(&self, id: ActorId) -> bool {
        self.get(id).is_some_and(|a| !a.is_defeated())
    }

    /// Iterates actors in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Actor> {
        self.actors.values()
    }

    /// Returns all ids in order.
    #[must_use]
    pub fn ids(&self) -> Vec<ActorId> {
        self.actors.keys().copied().collect()
    }

    /// Number of actors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.actors.len()
    }

    /// Returns true if the roster is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actors.is_empty()
    }
}
