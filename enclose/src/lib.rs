//! # Enclose
//!
//! Authoritative engine for a two-player territorial board game. Players take
//! turns claiming cells on a square board; a move that cuts a region off from
//! the board's edge seals it, and every opponent stone sealed that way scores
//! for the mover. The game ends when no cell is left unclaimed.
//!
//! ## Core Modules
//!
//! - [`game`]: board entities and the pure rules engine
//! - [`session`]: per-game sessions, idle eviction and the [`Hub`] registry
//! - [`net`]: JSON wire messages and dispatch of inbound frames
//!
//! ## Example
//!
//! ```
//! use enclose::{GameState, Seat, apply_move};
//!
//! let mut state = GameState::new(8);
//! apply_move(&mut state, 0, 0, Seat::One).unwrap();
//! assert_eq!(state.current_turn, Seat::Two);
//! ```

/// Board entities and rules.
pub mod game;
pub use game::{
    Board, Cell, GameResult, GameState, MoveError, MoveOutcome, Seat, apply_move,
    constants::{self, GRID_SIZE, MAX_PLAYERS},
    detect_enclosures, entities, functional, validate_move,
};

/// Sessions and the hub.
pub mod session;
pub use session::{Hub, HubConfig, HubError, Participant, Session, SessionConfig, SessionError};

/// Wire protocol and dispatch.
pub mod net;
pub use net::{ClientMessage, Dispatched, ServerMessage, messages};
