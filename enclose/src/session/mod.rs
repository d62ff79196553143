//! Session lifecycle: seating, readiness, moves, liveness and the hub that
//! pairs incoming participants into sessions.
//!
//! A [`Session`] owns one [`GameState`](crate::game::GameState) behind a
//! single lock and broadcasts every committed change to its participants in
//! commit order. The [`Hub`] keeps the registry of sessions, admits new
//! participants into the oldest session with a free seat, and sweeps out
//! expired or empty sessions.

pub mod config;
pub mod errors;
pub mod manager;
pub mod participant;
pub mod runtime;

pub use config::{HubConfig, SessionConfig};
pub use errors::{HubError, SessionError, TransportError};
pub use manager::Hub;
pub use participant::{Outbox, Participant, ParticipantId, SessionId, new_participant_id};
pub use runtime::{Departure, Session, new_session_id};
