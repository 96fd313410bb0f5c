//! Arming, cooldown and charge bookkeeping shared by runes and spells.
//!
//! A trigger may fire at turn `t` only when all three gates pass:
//!
//! - armed: `t >= armed_at_turn`
//! - off cooldown: `last_fired_turn < 0` (never fired) or `t - last_fired_turn >= cooldown`
//! - charged: `charges_left != 0` (`-1` is unlimited)

use serde::{Deserialize, Serialize};

use crate::actor::{Turn, NEVER};

/// Charge count meaning "unlimited".
pub const UNLIMITED_CHARGES: i64 = -1;

/// Gate state of one rune or spell instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerState {
    /// First turn at which the trigger may fire.
    pub armed_at_turn: Turn,
    /// Remaining charges, [`UNLIMITED_CHARGES`] for no limit.
    pub charges_left: i64,
    /// Turn of the last firing, [`NEVER`] if it never fired.
    pub last_fired_turn: Turn,
}

impl TriggerState {
    /// Creates a state armed at `armed_at_turn` with `charges` uses, or
    /// unlimited uses when `None`.
    #[must_use]
    pub fn new(armed_at_turn: Turn, charges: Option<u32>) -> Self {
        Self {
            armed_at_turn,
            charges_left: charges.map_or(UNLIMITED_CHARGES, i64::from),
            last_fired_turn: NEVER,
        }
    }

    /// Returns true once `turn` has reached the arming turn.
    #[must_use]
    pub const fn is_armed(&self, turn: Turn) -> bool {
        turn >= self.armed_at_turn
    }

    /// Returns true if `cooldown` turns have passed since the last firing.
    #[must_use]
    pub const fn is_off_cooldown(&self, turn: Turn, cooldown: Turn) -> bool {
        self.last_fired_turn < 0 || turn - self.last_fired_turn >= cooldown
    }

    /// Returns true if at least one charge remains.
    #[must_use]
    pub const fn has_charges(&self) -> bool {
        self.charges_left != 0
    }

    /// Returns true if all three gates pass at `turn`.
    #[must_use]
    pub const fn gate(&self, turn: Turn, cooldown: Turn) -> bool {
        self.is_armed(turn) && self.is_off_cooldown(turn, cooldown) && self.has_charges()
    }

    /// Records a firing at `turn`.
    ///
    /// Returns true if this used the last charge. Unlimited triggers never
    /// exhaust.
    pub fn consume(&mut self, turn: Turn) -> bool {
        self.last_fired_turn = turn;
        if self.charges_left > 0 {
            self.charges_left -= 1;
            self.charges_left == 0
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_armed_before_arming_turn() {
        let state = TriggerState::new(3, None);
        assert!(!state.gate(2, 0));
        assert!(state.gate(3, 0));
    }

    #[test]
    fn cooldown_counts_from_last_firing() {
        let mut state = TriggerState::new(0, None);
        assert!(state.gate(1, 2));
        state.consume(1);
        assert!(!state.gate(2, 2));
        assert!(state.gate(3, 2));
    }

    #[test]
    fn zero_cooldown_fires_every_turn() {
        let mut state = TriggerState::new(0, None);
        state.consume(4);
        assert!(state.gate(4, 0));
    }

    #[test]
    fn charges_run_out() {
        let mut state = TriggerState::new(0, Some(2));
        assert!(!state.consume(1));
        assert!(state.consume(2));
        assert!(!state.has_charges());
        assert!(!state.gate(10, 0));
    }

    #[test]
    fn unlimited_never_exhausts() {
        let mut state = TriggerState::new(0, None);
        for turn in 0..50 {
            assert!(!state.consume(turn));
        }
        assert_eq!(state.charges_left, UNLIMITED_CHARGES);
    }
}
