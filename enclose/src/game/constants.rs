//! Fixed game and lifecycle parameters.

use std::time::Duration;

/// Side length of the production board.
pub const GRID_SIZE: usize = 64;

/// Seats per session.
pub const MAX_PLAYERS: usize = 2;

/// Maximum number of concurrently registered sessions.
pub const MAX_SESSIONS: usize = 100;

/// Sessions older than this are swept regardless of activity.
pub const SESSION_MAX_AGE: Duration = Duration::from_secs(30 * 60);

/// A participant silent for longer than this is evicted.
pub const IDLE_TIMEOUT: Duration = Duration::from_secs(15);

/// Period of each session's liveness sweep.
pub const LIVENESS_INTERVAL: Duration = Duration::from_secs(5);

/// Period of the hub's expiry sweep.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(30);

/// Upper bound for a single outbound write.
pub const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

pub const GAME_STARTED: &str = "Game started!";
pub const GAME_FULL: &str = "Game is full";
pub const SHUTTING_DOWN: &str = "Server is shutting down";
