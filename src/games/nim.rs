//! # Nim Game Implementation
//!
//! Subtraction Nim on a single heap: players alternately remove between 1
//! and `max_take` objects.
//!
//! ## Rules
//! - Under normal play the player who takes the last object wins
//! - Under misère play the player who takes the last object loses
//!
//! With `max_take = k`, the losing positions for the player to move are the
//! multiples of `k + 1` (normal) or the heaps of size `1 mod (k + 1)` (misère).

use super::Player;
use crate::error::ModelError;
use crate::GameModel;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which player the empty heap is bad for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NimRule {
    /// Last mover wins.
    Normal,
    /// Last mover loses.
    Misere,
}

/// Removes this many objects from the heap.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct Take(pub u32);

impl fmt::Display for Take {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "take {}", self.0)
    }
}

impl FromStr for Take {
    type Err = String;

    /// Parses the number of objects to take, e.g. `"2"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let n = s.trim().parse::<u32>().map_err(|e| e.to_string())?;
        Ok(Take(n))
    }
}

/// Heap size and the player to move. Also serves as the transposition key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NimState {
    pub remaining: u32,
    pub to_move: Player,
}

impl NimState {
    /// A heap of `objects` with the first player to move.
    pub fn new(objects: u32) -> Self {
        NimState {
            remaining: objects,
            to_move: Player::First,
        }
    }
}

impl fmt::Display for NimState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} objects, {} to move", self.remaining, self.to_move)
    }
}

#[derive(Debug, Clone)]
pub struct NimModel {
    max_take: u32,
    rule: NimRule,
}

impl NimModel {
    pub fn new(max_take: u32, rule: NimRule) -> Self {
        NimModel { max_take, rule }
    }

    /// Starting position with `objects` on the heap.
    pub fn start(objects: u32) -> NimState {
        NimState::new(objects)
    }

    pub fn max_take(&self) -> u32 {
        self.max_take
    }

    pub fn rule(&self) -> NimRule {
        self.rule
    }
}

impl GameModel for NimModel {
    type State = NimState;
    type Action = Take;
    type Key = NimState;
    type Player = Player;

    fn canonical_state_key(&self, state: &NimState) -> NimState {
        *state
    }

    fn legal_actions(&self, state: &NimState) -> Vec<Take> {
        (1..=self.max_take.min(state.remaining)).map(Take).collect()
    }

    fn apply_action(&self, state: &NimState, action: &Take) -> Result<NimState, ModelError> {
        if action.0 == 0 || action.0 > self.max_take || action.0 > state.remaining {
            return Err(ModelError::IllegalAction(format!(
                "{} with {} objects left",
                action, state.remaining
            )));
        }
        Ok(NimState {
            remaining: state.remaining - action.0,
            to_move: state.to_move.other(),
        })
    }

    fn is_terminal(&self, state: &NimState) -> bool {
        state.remaining == 0
    }

    fn player_to_move(&self, state: &NimState) -> Player {
        state.to_move
    }

    fn terminal_utility(&self, state: &NimState, perspective: Player) -> f64 {
        // The player facing the empty heap did not make the last move.
        let to_move_wins = match self.rule {
            NimRule::Normal => false,
            NimRule::Misere => true,
        };
        if (perspective == state.to_move) == to_move_wins {
            1.0
        } else {
            -1.0
        }
    }
}
