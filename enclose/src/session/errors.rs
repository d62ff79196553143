//! Error types for sessions, the hub and outbound delivery.

use thiserror::Error;

use crate::game::{
    MoveError,
    constants::{GAME_FULL, SHUTTING_DOWN},
};

/// Session errors
#[derive(Clone, Copy, Debug, Error, Eq, PartialEq)]
pub enum SessionError {
    /// Both seats are taken
    #[error("Session is full")]
    Full,

    /// The session was stopped by the hub
    #[error("Session has been stopped")]
    Stopped,

    /// The participant holds no seat in this session
    #[error("Participant is not seated in this session")]
    NotSeated,

    /// The rules engine refused the move
    #[error("Invalid move: {0}")]
    InvalidMove(#[from] MoveError),
}

/// Admission errors
#[derive(Clone, Copy, Debug, Error, Eq, PartialEq)]
pub enum HubError {
    /// No seat available and the session limit is reached
    #[error("All sessions are full")]
    Full,

    /// The hub was stopped
    #[error("Hub is closed")]
    Closed,

    #[error(transparent)]
    Session(#[from] SessionError),
}

impl HubError {
    /// Text sent to a client whose admission was refused.
    pub fn client_message(&self) -> &'static str {
        match self {
            Self::Closed => SHUTTING_DOWN,
            Self::Full | Self::Session(_) => GAME_FULL,
        }
    }
}

/// Outbound delivery errors
#[derive(Clone, Copy, Debug, Error, Eq, PartialEq)]
pub enum TransportError {
    /// The connection's writer has gone away
    #[error("Connection closed")]
    Closed,

    /// The write did not complete within the write timeout
    #[error("Write timed out")]
    Timeout,
}
