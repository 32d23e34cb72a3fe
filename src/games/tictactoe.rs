//! # Tic-Tac-Toe Game Implementation
//!
//! Players alternately mark an empty square of a 3x3 board; three marks in a
//! row, column or diagonal win. A full board with no line is a draw.
//!
//! Positions are keyed by the board alone (the player to move follows from
//! the number of marks), so every move order reaching a position shares one
//! node.

use super::Player;
use crate::error::ModelError;
use crate::GameModel;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const LINES: [[usize; 3]; 8] = [
    [0, 1, 2],
    [3, 4, 5],
    [6, 7, 8],
    [0, 3, 6],
    [1, 4, 7],
    [2, 5, 8],
    [0, 4, 8],
    [2, 4, 6],
];

/// Marks the square at this row-major index (0..9).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct Square(pub usize);

impl fmt::Display for Square {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.0 / 3, self.0 % 3)
    }
}

impl FromStr for Square {
    type Err = String;

    /// Parses `"row,col"` or a bare square index.
    ///
    /// # Examples
    /// ```
    /// use std::str::FromStr;
    /// use mcts::games::tictactoe::Square;
    /// assert_eq!(Square::from_str("1,2").unwrap(), Square(5));
    /// assert_eq!(Square::from_str("4").unwrap(), Square(4));
    /// ```
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split(',').collect();
        let index = match parts.as_slice() {
            [index] => index.trim().parse::<usize>().map_err(|e| e.to_string())?,
            [row, col] => {
                let r = row.trim().parse::<usize>().map_err(|e| e.to_string())?;
                let c = col.trim().parse::<usize>().map_err(|e| e.to_string())?;
                if r >= 3 || c >= 3 {
                    return Err(format!("square {},{} is off the board", r, c));
                }
                r * 3 + c
            }
            _ => return Err("expected 'row,col'".to_string()),
        };
        if index >= 9 {
            return Err(format!("square {} is off the board", index));
        }
        Ok(Square(index))
    }
}

pub type Board = [Option<Player>; 9];

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TicTacToeState {
    cells: Board,
    to_move: Player,
}

impl Default for TicTacToeState {
    fn default() -> Self {
        Self::new()
    }
}

impl TicTacToeState {
    /// Empty board, first player (X) to move.
    pub fn new() -> Self {
        TicTacToeState {
            cells: [None; 9],
            to_move: Player::First,
        }
    }

    pub fn cells(&self) -> &Board {
        &self.cells
    }

    pub fn winner(&self) -> Option<Player> {
        LINES.iter().find_map(|&[a, b, c]| {
            let mark = self.cells[a]?;
            (self.cells[b] == Some(mark) && self.cells[c] == Some(mark)).then_some(mark)
        })
    }

    pub fn is_full(&self) -> bool {
        self.cells.iter().all(Option::is_some)
    }
}

impl fmt::Display for TicTacToeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in self.cells.chunks(3) {
            for cell in row {
                let symbol = match cell {
                    Some(Player::First) => "X",
                    Some(Player::Second) => "O",
                    None => ".",
                };
                write!(f, "{} ", symbol)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct TicTacToeModel;

impl GameModel for TicTacToeModel {
    type State = TicTacToeState;
    type Action = Square;
    type Key = Board;
    type Player = Player;

    fn canonical_state_key(&self, state: &TicTacToeState) -> Board {
        state.cells
    }

    fn legal_actions(&self, state: &TicTacToeState) -> Vec<Square> {
        if state.winner().is_some() {
            return Vec::new();
        }
        (0..9).filter(|&i| state.cells[i].is_none()).map(Square).collect()
    }

    fn apply_action(&self, state: &TicTacToeState, action: &Square) -> Result<TicTacToeState, ModelError> {
        if self.is_terminal(state) {
            return Err(ModelError::IllegalAction(format!("{} after the game ended", action)));
        }
        match state.cells.get(action.0) {
            Some(None) => {
                let mut next = state.clone();
                next.cells[action.0] = Some(state.to_move);
                next.to_move = state.to_move.other();
                Ok(next)
            }
            Some(Some(_)) => Err(ModelError::IllegalAction(format!("{} is already marked", action))),
            None => Err(ModelError::IllegalAction(format!("square {} is off the board", action.0))),
        }
    }

    fn is_terminal(&self, state: &TicTacToeState) -> bool {
        state.winner().is_some() || state.is_full()
    }

    fn player_to_move(&self, state: &TicTacToeState) -> Player {
        state.to_move
    }

    fn terminal_utility(&self, state: &TicTacToeState, perspective: Player) -> f64 {
        match state.winner() {
            Some(winner) if winner == perspective => 1.0,
            Some(_) => -1.0,
            None => 0.0,
        }
    }
}
