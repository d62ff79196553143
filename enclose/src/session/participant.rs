//! Seated participants and their outbound channels.

use std::time::Duration;

use tokio::{
    sync::{Mutex, mpsc},
    time::Instant,
};
use uuid::Uuid;

use super::errors::TransportError;
use crate::game::Seat;

pub type ParticipantId = String;
pub type SessionId = String;

/// Outbound half of a connection: serialized JSON text frames.
///
/// The transport owns the socket; this is only a handle to its writer.
pub type Outbox = mpsc::Sender<String>;

pub fn new_participant_id() -> ParticipantId {
    format!("player-{}", Uuid::new_v4())
}

/// A player seated in a session
#[derive(Debug)]
pub struct Participant {
    id: ParticipantId,
    seat: Seat,
    session_id: SessionId,
    /// Touched from the inbound read loop before any session work, so it has
    /// its own guard instead of the session lock.
    last_seen: Mutex<Instant>,
    outbox: Outbox,
}

impl Participant {
    pub(crate) fn new(id: ParticipantId, seat: Seat, session_id: SessionId, outbox: Outbox) -> Self {
        Self {
            id,
            seat,
            session_id,
            last_seen: Mutex::new(Instant::now()),
            outbox,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn seat(&self) -> Seat {
        self.seat
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Record inbound activity.
    pub async fn touch(&self) {
        *self.last_seen.lock().await = Instant::now();
    }

    pub async fn last_seen(&self) -> Instant {
        *self.last_seen.lock().await
    }

    /// Time since the last inbound activity, measured at `now`.
    pub async fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_seen().await)
    }

    /// Queue a text frame for the connection writer, waiting at most `timeout`.
    pub async fn send(&self, payload: String, timeout: Duration) -> Result<(), TransportError> {
        self.outbox
            .send_timeout(payload, timeout)
            .await
            .map_err(|e| match e {
                mpsc::error::SendTimeoutError::Timeout(_) => TransportError::Timeout,
                mpsc::error::SendTimeoutError::Closed(_) => TransportError::Closed,
            })
    }
}
