//! A single game session: two seats, one board, one lock.

use chrono::Utc;
use std::{
    collections::HashMap,
    fmt,
    sync::{
        Arc, Weak,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};
use tokio::{
    sync::{Mutex, watch},
    time::{Instant, MissedTickBehavior, interval},
};
use uuid::Uuid;

use super::{
    config::SessionConfig,
    errors::SessionError,
    participant::{Outbox, Participant, ParticipantId, SessionId},
};
use crate::{
    game::{
        GameState, MoveOutcome, Seat,
        constants::{GAME_STARTED, MAX_PLAYERS},
        functional,
    },
    net::messages::ServerMessage,
};

pub fn new_session_id() -> SessionId {
    format!("game-{}", Uuid::new_v4())
}

/// What a departure left behind.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Departure {
    /// The participant still held a seat when it left
    pub was_seated: bool,
    /// No participant remains
    pub now_empty: bool,
}

/// State guarded by the session lock
struct SessionCore {
    participants: HashMap<ParticipantId, Arc<Participant>>,
    state: GameState,
}

impl SessionCore {
    fn is_seated(&self, participant: &Participant) -> bool {
        self.participants.contains_key(participant.id())
    }

    fn ensure_seated(&self, participant: &Participant) -> Result<(), SessionError> {
        if self.is_seated(participant) {
            Ok(())
        } else {
            Err(SessionError::NotSeated)
        }
    }

    fn free_seat(&self) -> Option<Seat> {
        Seat::ALL
            .into_iter()
            .find(|seat| self.participants.values().all(|p| p.seat() != *seat))
    }

    fn everyone_ready(&self) -> bool {
        self.participants.len() == MAX_PLAYERS
            && self
                .participants
                .values()
                .all(|p| self.state.is_ready(p.seat()))
    }

    /// Fresh board and scores; seats stay, every ready flag drops to false.
    fn reset(&mut self, grid_size: usize) {
        let seats = self.state.players_ready.len();
        self.state = GameState::new(grid_size);
        self.state.players_ready = vec![false; seats];
    }

    /// Deliver the current state to every participant, in seat order.
    ///
    /// Runs under the session lock so every receiver observes snapshots in
    /// commit order. Failed writes are logged and skipped.
    async fn broadcast(&self, session_id: &str, timeout: Duration) {
        let snapshot = ServerMessage::GameState { state: &self.state };
        let payload = match snapshot.to_json() {
            Ok(json) => json,
            Err(e) => {
                log::error!("Session {}: failed to serialize state: {}", session_id, e);
                return;
            }
        };

        let mut recipients: Vec<_> = self.participants.values().collect();
        recipients.sort_by_key(|p| p.seat());

        for participant in recipients {
            if let Err(e) = participant.send(payload.clone(), timeout).await {
                log::warn!(
                    "Session {}: failed to deliver state to {}: {}",
                    session_id,
                    participant.id(),
                    e
                );
            }
        }
    }
}

/// One game between at most two participants.
///
/// Every mutation of the board, seats or ready flags happens under the session
/// lock, and the resulting broadcast is sent before the lock is released.
/// Occupancy and liveness are mirrored in atomics so the hub can inspect them
/// without taking the lock.
pub struct Session {
    id: SessionId,
    created_at: Instant,
    config: SessionConfig,
    live: AtomicBool,
    seats: AtomicUsize,
    core: Mutex<SessionCore>,
    stop_tx: watch::Sender<bool>,
}

impl Session {
    /// Create a session and start its liveness loop.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(config: SessionConfig) -> Arc<Self> {
        let (stop_tx, _) = watch::channel(false);
        let session = Arc::new(Self {
            id: new_session_id(),
            created_at: Instant::now(),
            core: Mutex::new(SessionCore {
                participants: HashMap::new(),
                state: GameState::new(config.grid_size),
            }),
            config,
            live: AtomicBool::new(true),
            seats: AtomicUsize::new(0),
            stop_tx,
        });

        Self::spawn_liveness(&session);
        log::info!("Session {} created", session.id);
        session
    }

    fn spawn_liveness(session: &Arc<Self>) {
        let weak: Weak<Self> = Arc::downgrade(session);
        let mut stop_rx = session.stop_tx.subscribe();
        let period = session.config.liveness_interval;

        tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let Some(session) = weak.upgrade() else { break };
                        session.evict_idle().await;
                    }
                    _ = stop_rx.changed() => break,
                }
            }
        });
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    pub fn is_expired(&self) -> bool {
        self.age() > self.config.max_age
    }

    /// `false` once the hub has stopped this session.
    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }

    /// Seated participant count, read without the session lock.
    pub fn participant_count(&self) -> usize {
        self.seats.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.participant_count() == 0
    }

    pub fn is_full(&self) -> bool {
        self.participant_count() >= MAX_PLAYERS
    }

    /// Stop the liveness loop and refuse further admissions. Idempotent.
    pub fn stop(&self) {
        if self.live.swap(false, Ordering::AcqRel) {
            log::info!("Session {} stopped", self.id);
        }
        self.stop_tx.send_replace(true);
    }

    /// Seat a new participant in the lowest free seat and send it the
    /// connection message before any state broadcast can reach it.
    pub async fn add_participant(
        &self,
        id: ParticipantId,
        outbox: Outbox,
    ) -> Result<Arc<Participant>, SessionError> {
        let mut core = self.core.lock().await;

        if !self.is_live() {
            return Err(SessionError::Stopped);
        }
        if core.participants.len() >= MAX_PLAYERS {
            return Err(SessionError::Full);
        }
        let seat = core.free_seat().ok_or(SessionError::Full)?;

        let participant = Arc::new(Participant::new(id, seat, self.id.clone(), outbox));
        core.state.clear_ready(seat);
        core.participants
            .insert(participant.id().to_string(), participant.clone());
        self.seats.store(core.participants.len(), Ordering::Release);

        log::info!(
            "Session {}: {} seated as player {}",
            self.id,
            participant.id(),
            seat
        );

        let welcome = ServerMessage::Connection {
            game_id: &self.id,
            player_id: participant.id(),
            player_number: seat,
        };
        match welcome.to_json() {
            Ok(json) => {
                if let Err(e) = participant.send(json, self.config.write_timeout).await {
                    log::warn!(
                        "Session {}: failed to welcome {}: {}",
                        self.id,
                        participant.id(),
                        e
                    );
                }
            }
            Err(e) => log::error!("Session {}: failed to serialize welcome: {}", self.id, e),
        }

        Ok(participant)
    }

    /// Mark the participant ready and broadcast.
    ///
    /// Returns `true` if this call started the game: the flag flipped and
    /// both seats are now filled and ready.
    pub async fn mark_ready(&self, participant: &Participant) -> Result<bool, SessionError> {
        let mut core = self.core.lock().await;
        core.ensure_seated(participant)?;

        let changed = core.state.set_ready(participant.seat());
        let started = changed && core.everyone_ready();
        if started {
            core.state.current_turn = Seat::One;
            core.state.game_over = false;
            core.state.message = GAME_STARTED.to_string();
            log::info!("Session {}: game started", self.id);
        }

        core.broadcast(&self.id, self.config.write_timeout).await;
        Ok(started)
    }

    /// Validate and commit a move, broadcasting only when it was accepted.
    pub async fn apply_move(
        &self,
        participant: &Participant,
        x: i64,
        y: i64,
    ) -> Result<MoveOutcome, SessionError> {
        let mut core = self.core.lock().await;
        core.ensure_seated(participant)?;

        let outcome = functional::apply_move(&mut core.state, x, y, participant.seat())?;
        core.state.last_move_at = Some(Utc::now());

        if outcome.enclosed {
            log::debug!(
                "Session {}: player {} captured, score {}",
                self.id,
                participant.seat(),
                core.state.score(participant.seat())
            );
        }
        if outcome.game_over {
            log::info!("Session {}: game over: {}", self.id, core.state.message);
        }

        core.broadcast(&self.id, self.config.write_timeout).await;
        Ok(outcome)
    }

    /// Start over on a fresh board, keeping seats, and broadcast.
    pub async fn reset(&self, participant: &Participant) -> Result<(), SessionError> {
        let mut core = self.core.lock().await;
        core.ensure_seated(participant)?;

        core.reset(self.config.grid_size);
        log::info!("Session {}: reset by player {}", self.id, participant.seat());

        core.broadcast(&self.id, self.config.write_timeout).await;
        Ok(())
    }

    /// Delete a participant. Remaining seat numbers never change.
    pub async fn remove_participant(&self, id: &str) -> Option<Arc<Participant>> {
        let mut core = self.core.lock().await;
        let removed = core.participants.remove(id);
        self.seats.store(core.participants.len(), Ordering::Release);
        removed
    }

    /// Remove a disconnected participant; survivors are told who left.
    pub async fn leave(&self, participant: &Participant) -> Departure {
        let mut core = self.core.lock().await;
        let was_seated = core.participants.remove(participant.id()).is_some();
        self.seats.store(core.participants.len(), Ordering::Release);
        let now_empty = core.participants.is_empty();

        if was_seated && !now_empty {
            core.state.message = format!("Player {} disconnected", participant.seat());
            core.broadcast(&self.id, self.config.write_timeout).await;
        }

        Departure {
            was_seated,
            now_empty,
        }
    }

    /// Send the current state to every participant.
    pub async fn broadcast(&self) {
        let core = self.core.lock().await;
        core.broadcast(&self.id, self.config.write_timeout).await;
    }

    /// Copy of the current game state.
    pub async fn snapshot(&self) -> GameState {
        self.core.lock().await.state.clone()
    }

    pub async fn contains(&self, id: &str) -> bool {
        self.core.lock().await.participants.contains_key(id)
    }

    /// Evict every participant silent for longer than the idle timeout.
    pub async fn evict_idle(&self) -> Vec<Arc<Participant>> {
        let now = Instant::now();
        let mut core = self.core.lock().await;

        let mut evicted = Vec::new();
        for participant in core.participants.values() {
            if participant.idle_for(now).await > self.config.idle_timeout {
                evicted.push(participant.clone());
            }
        }

        for participant in &evicted {
            core.participants.remove(participant.id());
            log::info!(
                "Session {}: evicted idle player {} ({})",
                self.id,
                participant.seat(),
                participant.id()
            );
        }
        self.seats.store(core.participants.len(), Ordering::Release);

        evicted
    }

    /// Stop the session if nobody is seated, checked under the session lock.
    pub(crate) async fn retire_if_empty(&self) -> bool {
        let core = self.core.lock().await;
        if core.participants.is_empty() {
            self.stop();
            true
        } else {
            false
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.stop_tx.send_replace(true);
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("seats", &self.participant_count())
            .field("live", &self.is_live())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::constants::GRID_SIZE;
    use serde_json::Value;
    use tokio::sync::mpsc;

    fn small_config(grid_size: usize) -> SessionConfig {
        SessionConfig {
            grid_size,
            ..SessionConfig::default()
        }
    }

    async fn seat(session: &Session) -> (Arc<Participant>, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(64);
        let participant = session
            .add_participant(crate::session::participant::new_participant_id(), tx)
            .await
            .unwrap();
        (participant, rx)
    }

    fn drain(rx: &mut mpsc::Receiver<String>) -> Vec<Value> {
        let mut out = Vec::new();
        while let Ok(text) = rx.try_recv() {
            out.push(serde_json::from_str(&text).unwrap());
        }
        out
    }

    #[tokio::test]
    async fn test_debug_shows_occupancy() {
        let session = Session::new(small_config(4));
        let (_p1, _rx1) = seat(&session).await;

        let debug = format!("{session:?}");
        assert!(debug.contains(session.id()));
        assert!(debug.contains("seats: 1"));
        assert!(debug.contains("live: true"));
    }

    #[tokio::test]
    async fn test_seats_assigned_in_order() {
        let session = Session::new(SessionConfig::default());
        let (p1, mut rx1) = seat(&session).await;
        let (p2, _rx2) = seat(&session).await;

        assert_eq!(p1.seat(), Seat::One);
        assert_eq!(p2.seat(), Seat::Two);
        assert_eq!(p1.session_id(), session.id());
        assert!(session.is_full());

        let welcome = drain(&mut rx1);
        assert_eq!(welcome.len(), 1);
        assert_eq!(welcome[0]["type"], "connection");
        assert_eq!(welcome[0]["playerNumber"], 1);
        assert_eq!(welcome[0]["gameId"], session.id());

        let (tx, _rx) = mpsc::channel(1);
        let third = session.add_participant("late".to_string(), tx).await;
        assert_eq!(third.unwrap_err(), SessionError::Full);

        let state = session.snapshot().await;
        assert_eq!(state.players_ready.len(), 2);
        assert_eq!(state.grid.size(), GRID_SIZE);
    }

    #[tokio::test]
    async fn test_vacated_seat_is_reused_without_collision() {
        let session = Session::new(small_config(4));
        let (p1, _rx1) = seat(&session).await;
        let (p2, _rx2) = seat(&session).await;

        session.remove_participant(p1.id()).await;
        let (p3, _rx3) = seat(&session).await;

        assert_eq!(p3.seat(), Seat::One);
        assert_eq!(p2.seat(), Seat::Two);
        assert_eq!(session.participant_count(), 2);
        assert!(session.is_full());
    }

    #[tokio::test]
    async fn test_game_starts_when_both_ready() {
        let session = Session::new(small_config(4));
        let (p1, mut rx1) = seat(&session).await;
        let (p2, mut rx2) = seat(&session).await;
        drain(&mut rx1);
        drain(&mut rx2);

        assert!(!session.mark_ready(&p1).await.unwrap());
        assert!(session.mark_ready(&p2).await.unwrap());
        // Idempotent once ready.
        assert!(!session.mark_ready(&p2).await.unwrap());

        let last = drain(&mut rx2).pop().unwrap();
        assert_eq!(last["type"], "gameState");
        assert_eq!(last["state"]["message"], "Game started!");
        assert_eq!(last["state"]["currentTurn"], 1);
        assert_eq!(last["state"]["gameOver"], false);
        assert_eq!(last["state"]["playersReady"], serde_json::json!([true, true]));
        assert_eq!(drain(&mut rx1).len(), 3);
    }

    #[tokio::test]
    async fn test_lone_ready_does_not_start() {
        let session = Session::new(small_config(4));
        let (p1, _rx1) = seat(&session).await;
        assert!(!session.mark_ready(&p1).await.unwrap());
        assert_eq!(session.snapshot().await.message, "");
    }

    #[tokio::test]
    async fn test_invalid_move_is_silent() {
        let session = Session::new(small_config(4));
        let (p1, mut rx1) = seat(&session).await;
        let (p2, _rx2) = seat(&session).await;
        drain(&mut rx1);
        let before = session.snapshot().await;

        let result = session.apply_move(&p2, 0, 0).await;
        assert!(matches!(result, Err(SessionError::InvalidMove(_))));
        assert!(drain(&mut rx1).is_empty());
        assert_eq!(session.snapshot().await, before);

        session.apply_move(&p1, 0, 0).await.unwrap();
        let update = drain(&mut rx1);
        assert_eq!(update.len(), 1);
        assert_eq!(update[0]["state"]["grid"][0][0]["owner"], 1);
        assert_eq!(update[0]["state"]["currentTurn"], 2);
        assert!(update[0]["state"]["lastMoveAt"].is_string());
    }

    #[tokio::test]
    async fn test_reset_is_idempotent_and_keeps_seats() {
        let session = Session::new(small_config(4));
        let (p1, _rx1) = seat(&session).await;
        let (p2, _rx2) = seat(&session).await;
        session.mark_ready(&p1).await.unwrap();
        session.mark_ready(&p2).await.unwrap();
        session.apply_move(&p1, 1, 1).await.unwrap();

        session.reset(&p2).await.unwrap();
        let once = session.snapshot().await;
        session.reset(&p1).await.unwrap();
        let twice = session.snapshot().await;

        assert_eq!(once, twice);
        assert_eq!(once.players_ready, vec![false, false]);
        assert_eq!(once.current_turn, Seat::One);
        assert!(once.grid.cells().all(|c| c.owner.is_none() && !c.sealed));
        assert!(session.is_full());
    }

    #[tokio::test]
    async fn test_leave_notifies_survivor() {
        let session = Session::new(small_config(4));
        let (p1, _rx1) = seat(&session).await;
        let (p2, mut rx2) = seat(&session).await;
        drain(&mut rx2);

        let departure = session.leave(&p1).await;
        assert_eq!(
            departure,
            Departure {
                was_seated: true,
                now_empty: false
            }
        );
        let update = drain(&mut rx2);
        assert_eq!(update[0]["state"]["message"], "Player 1 disconnected");

        let last = session.leave(&p2).await;
        assert!(last.now_empty);
        assert!(session.is_empty());
    }

    #[tokio::test]
    async fn test_messages_from_departed_participant_ignored() {
        let session = Session::new(small_config(4));
        let (p1, _rx1) = seat(&session).await;
        session.remove_participant(p1.id()).await;

        assert_eq!(session.mark_ready(&p1).await, Err(SessionError::NotSeated));
        assert_eq!(
            session.apply_move(&p1, 0, 0).await.unwrap_err(),
            SessionError::NotSeated
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_participant_evicted_by_liveness_loop() {
        let session = Session::new(SessionConfig::default());
        let (quiet, _rx1) = seat(&session).await;
        let (chatty, _rx2) = seat(&session).await;

        // Keep one participant active across the idle bound.
        for _ in 0..4 {
            tokio::time::sleep(Duration::from_secs(5)).await;
            chatty.touch().await;
        }
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert!(!session.contains(quiet.id()).await);
        assert!(session.contains(chatty.id()).await);
        assert_eq!(session.participant_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_evicted_at_exact_bound() {
        let session = Session::new(SessionConfig::default());
        let (p1, _rx1) = seat(&session).await;

        tokio::time::advance(Duration::from_secs(15)).await;
        assert!(session.evict_idle().await.is_empty());

        tokio::time::advance(Duration::from_millis(1)).await;
        let evicted = session.evict_idle().await;
        assert_eq!(evicted.len(), 1);
        assert_eq!(evicted[0].id(), p1.id());
    }

    #[tokio::test]
    async fn test_stopped_session_refuses_admission() {
        let session = Session::new(SessionConfig::default());
        session.stop();
        session.stop();

        let (tx, _rx) = mpsc::channel(1);
        let result = session.add_participant("p".to_string(), tx).await;
        assert_eq!(result.unwrap_err(), SessionError::Stopped);
        assert!(!session.is_live());
    }

    #[tokio::test]
    async fn test_broadcast_survives_closed_outbox() {
        let session = Session::new(small_config(4));
        let (p1, rx1) = seat(&session).await;
        let (_p2, mut rx2) = seat(&session).await;
        drop(rx1);
        drain(&mut rx2);

        session.apply_move(&p1, 0, 0).await.unwrap();
        assert_eq!(drain(&mut rx2).len(), 1);
        assert!(session.contains(p1.id()).await);
    }
}
