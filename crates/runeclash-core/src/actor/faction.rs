//! Faction queries.
//!
//! Two actors are allied when they share at least one faction other than
//! [`UNALIGNED`]. Hostility defaults to "not allied"; a [`FactionTable`] can
//! declare truces between specific factions, making members of those factions
//! neither allied nor hostile. Self-comparison is the caller's responsibility.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::Actor;

/// The faction that allies no one, not even other unaligned actors.
pub const UNALIGNED: &str = "unaligned";

/// Faction relationship queries.
pub trait FactionService: Send + Sync {
    /// Returns true if `a` treats `b` as an enemy.
    fn is_hostile(&self, a: &Actor, b: &Actor) -> bool;

    /// Returns true if `a` and `b` are on the same side.
    fn is_allied(&self, a: &Actor, b: &Actor) -> bool;
}

/// Default faction rules with optional truces.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FactionTable {
    truces: BTreeSet<(String, String)>,
}

impl FactionTable {
    /// Creates a table with no truces.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a truce between two factions (symmetric).
    #[must_use]
    pub fn with_truce(mut self, a: &str, b: &str) -> Self {
        let key = if a <= b {
            (a.to_string(), b.to_string())
        } else {
            (b.to_string(), a.to_string())
        };
        self.truces.insert(key);
        self
    }

    fn in_truce(&self, a: &Actor, b: &Actor) -> bool {
        a.factions.iter().any(|fa| {
            b.factions.iter().any(|fb| {
                let key = if fa <= fb {
                    (fa.clone(), fb.clone())
                } else {
                    (fb.clone(), fa.clone())
                };
                self.truces.contains(&key)
            })
        })
    }
}

impl FactionService for FactionTable {
    fn is_hostile(&self, a: &Actor, b: &Actor) -> bool {
        !self.is_allied(a, b) && !self.in_truce(a, b)
    }

    fn is_allied(&self, a: &Actor, b: &Actor) -> bool {
        a.factions
            .iter()
            .filter(|f| f.as_str() != UNALIGNED)
            .any(|f| b.factions.contains(f))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::ActorId;

    fn member(id: u64, factions: &[&str]) -> Actor {
        factions
            .iter()
            .fold(Actor::new(ActorId::new(id), "m", 1), |a, f| a.with_faction(f))
    }

    #[test]
    fn shared_faction_is_allied() {
        let table = FactionTable::new();
        let a = member(1, &["crown", "guild"]);
        let b = member(2, &["guild"]);
        assert!(table.is_allied(&a, &b));
        assert!(!table.is_hostile(&a, &b));
    }

    #[test]
    fn unaligned_allies_no_one() {
        let table = FactionTable::new();
        let a = member(1, &[UNALIGNED]);
        let b = member(2, &[UNALIGNED]);
        assert!(!table.is_allied(&a, &b));
        assert!(table.is_hostile(&a, &b));
    }

    #[test]
    fn truce_removes_hostility_without_alliance() {
        let table = FactionTable::new().with_truce("wolves", "crown");
        let a = member(1, &["crown"]);
        let b = member(2, &["wolves"]);
        assert!(!table.is_allied(&a, &b));
        assert!(!table.is_hostile(&a, &b));
        assert!(!table.is_hostile(&b, &a));
    }

    #[test]
    fn no_factions_is_hostile() {
        let table = FactionTable::new();
        assert!(table.is_hostile(&member(1, &[]), &member(2, &[])));
    }
}
