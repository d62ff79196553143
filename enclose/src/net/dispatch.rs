use super::messages::{ClientMessage, Envelope};
use crate::{
    game::MoveOutcome,
    session::{Departure, Hub, Participant},
};

/// What became of one inbound frame.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Dispatched {
    /// Not a JSON object. The sender's activity clock was not touched.
    Discarded,
    /// Decoded, but nothing changed: unknown type, malformed payload,
    /// rejected move, or the sender no longer holds a seat.
    Ignored,
    Ready { started: bool },
    Moved(MoveOutcome),
    Reset,
}

impl Dispatched {
    /// `true` if the frame caused a broadcast.
    pub fn broadcast(&self) -> bool {
        matches!(self, Self::Ready { .. } | Self::Moved(_) | Self::Reset)
    }
}

/// Decode a text frame from `participant` and apply it.
///
/// Any well-formed JSON object refreshes the participant's `last_seen`
/// before its command is interpreted.
pub async fn handle_frame(hub: &Hub, participant: &Participant, text: &str) -> Dispatched {
    let envelope = match Envelope::parse(text) {
        Ok(envelope) => envelope,
        Err(e) => {
            log::debug!("Discarded frame from {}: {}", participant.id(), e);
            return Dispatched::Discarded;
        }
    };

    participant.touch().await;

    match envelope.into_command() {
        Ok(command) => dispatch(hub, participant, command).await,
        Err(e) => {
            log::debug!("Ignored frame from {}: {}", participant.id(), e);
            Dispatched::Ignored
        }
    }
}

/// Route a decoded command to the participant's session.
///
/// The session is resolved through the hub and the hub lock is released
/// before any session operation runs.
pub async fn dispatch(hub: &Hub, participant: &Participant, message: ClientMessage) -> Dispatched {
    let Some(session) = hub.get(participant.session_id()).await else {
        log::debug!(
            "Ignored {:?} from {}: session {} is gone",
            message,
            participant.id(),
            participant.session_id()
        );
        return Dispatched::Ignored;
    };

    let result = match message {
        ClientMessage::Move { x, y } => session
            .apply_move(participant, x, y)
            .await
            .map(Dispatched::Moved),
        ClientMessage::Ready => session
            .mark_ready(participant)
            .await
            .map(|started| Dispatched::Ready { started }),
        ClientMessage::Reset => session.reset(participant).await.map(|()| Dispatched::Reset),
        ClientMessage::Unknown => return Dispatched::Ignored,
    };

    result.unwrap_or_else(|e| {
        log::debug!("Ignored {:?} from {}: {}", message, participant.id(), e);
        Dispatched::Ignored
    })
}

/// Cleanup after a participant's transport closed.
///
/// Survivors are told who left; a session left empty is removed from the hub.
/// Returns `None` if the session was already gone.
pub async fn disconnect(hub: &Hub, participant: &Participant) -> Option<Departure> {
    let session = hub.get(participant.session_id()).await?;
    let departure = session.leave(participant).await;

    if departure.was_seated {
        log::info!(
            "Player {} ({}) left session {}",
            participant.seat(),
            participant.id(),
            session.id()
        );
    }
    if departure.now_empty {
        hub.remove_if_empty(session.id()).await;
    }

    Some(departure)
}
