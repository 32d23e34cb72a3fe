//! # Game Implementations Module
//!
//! Reference game models for the planner. Each game implements the
//! [`GameModel`](crate::GameModel) trait: move generation, state transitions,
//! terminal detection and outcome scoring.
//!
//! ## Supported Games
//! - **Nim**: subtraction Nim on a single heap, under normal or misère rules
//! - **Tic-Tac-Toe**: 3x3 board; many move orders reach the same position
//!
//! ## Adding New Games
//! To add a new game, create a new module and implement:
//! 1. A move type (typically a tuple struct)
//! 2. A state type and a model type implementing `GameModel`
//! 3. Display and parsing implementations for moves

pub mod nim;
pub mod tictactoe;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Seat of a two-player game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Player {
    First,
    Second,
}

impl Player {
    /// Returns the opponent.
    pub fn other(self) -> Player {
        match self {
            Player::First => Player::Second,
            Player::Second => Player::First,
        }
    }
}

impl fmt::Display for Player {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Player::First => write!(f, "Player 1"),
            Player::Second => write!(f, "Player 2"),
        }
    }
}
