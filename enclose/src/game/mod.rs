//! Enclose game engine: board entities and the pure rules that mutate them.
//!
//! - [`entities`]: seats, cells, the square board and the broadcast game state
//! - [`functional`]: move validation, enclosure sealing, scoring, game end
//! - [`constants`]: board size, seat count and lifecycle timings

pub mod constants;
pub mod entities;
pub mod functional;

pub use entities::{Board, Cell, GameResult, GameState, Seat};
pub use functional::{MoveError, MoveOutcome, apply_move, detect_enclosures, validate_move};
