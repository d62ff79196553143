//! Hub: the registry of live sessions and the admission path into them.

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};
use tokio::{
    sync::{RwLock, watch},
    time::{MissedTickBehavior, interval},
};

use super::{
    config::HubConfig,
    errors::{HubError, SessionError},
    participant::{Outbox, Participant, SessionId, new_participant_id},
    runtime::Session,
};

/// Attempts made to seat a participant before giving up. A session can fill
/// up or be retired between lookup and seating.
const ADMISSION_ATTEMPTS: usize = 3;

/// Registry of sessions
///
/// The hub lock guards only the session map. Seating happens under the
/// session's own lock after the hub lock is released.
pub struct Hub {
    /// Registered sessions by id
    sessions: RwLock<HashMap<SessionId, Arc<Session>>>,

    config: HubConfig,

    /// Set once by `stop`; refuses all further admissions
    closed: AtomicBool,

    stop_tx: watch::Sender<bool>,
}

impl Hub {
    /// Create an empty hub.
    pub fn new(config: HubConfig) -> Self {
        let (stop_tx, _) = watch::channel(false);
        Self {
            sessions: RwLock::new(HashMap::new()),
            config,
            closed: AtomicBool::new(false),
            stop_tx,
        }
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Number of registered sessions
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn get(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions.read().await.get(id).cloned()
    }

    /// Find a session with a free seat, or register a new one.
    ///
    /// Expired sessions are purged first. Among the rest, the oldest live
    /// session that is not full wins.
    ///
    /// # Returns
    ///
    /// * `Result<Arc<Session>, HubError>` - A session to seat into, or
    ///   `HubError::Full` once `max_sessions` are registered and all are full
    pub async fn find_or_create(&self) -> Result<Arc<Session>, HubError> {
        if self.is_closed() {
            return Err(HubError::Closed);
        }

        let mut sessions = self.sessions.write().await;
        Self::purge(&mut sessions, |session| session.is_expired());

        let mut candidates: Vec<_> = sessions
            .values()
            .filter(|session| session.is_live() && !session.is_full())
            .collect();
        candidates.sort_by_key(|session| session.created_at());
        if let Some(session) = candidates.first() {
            return Ok(Arc::clone(session));
        }

        if sessions.len() >= self.config.max_sessions {
            log::warn!(
                "Admission refused: {} sessions registered, all full",
                sessions.len()
            );
            return Err(HubError::Full);
        }

        let session = Session::new(self.config.session.clone());
        sessions.insert(session.id().to_string(), session.clone());
        Ok(session)
    }

    /// Seat a new participant whose frames are written to `outbox`.
    ///
    /// The participant receives its connection message through `outbox`
    /// before this returns.
    ///
    /// # Arguments
    ///
    /// * `outbox` - Writer handle of the new connection
    ///
    /// # Returns
    ///
    /// * `Result<(Arc<Session>, Arc<Participant>), HubError>` - The session and
    ///   the seated participant
    pub async fn admit(&self, outbox: Outbox) -> Result<(Arc<Session>, Arc<Participant>), HubError> {
        let id = new_participant_id();

        for attempt in 1..=ADMISSION_ATTEMPTS {
            let session = self.find_or_create().await?;
            match session.add_participant(id.clone(), outbox.clone()).await {
                Ok(participant) => return Ok((session, participant)),
                Err(e @ (SessionError::Full | SessionError::Stopped)) => {
                    log::debug!(
                        "Admission attempt {} into {} lost a race: {}",
                        attempt,
                        session.id(),
                        e
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }

        if self.is_closed() {
            Err(HubError::Closed)
        } else {
            Err(HubError::Full)
        }
    }

    /// Unregister and stop a session. Idempotent.
    pub async fn remove(&self, id: &str) -> bool {
        let removed = self.sessions.write().await.remove(id);
        match removed {
            Some(session) => {
                session.stop();
                log::info!("Session {} removed", id);
                true
            }
            None => false,
        }
    }

    /// Remove the session only if it has no participants, re-checked under
    /// both the hub lock and the session lock.
    pub async fn remove_if_empty(&self, id: &str) -> bool {
        let mut sessions = self.sessions.write().await;
        let Some(session) = sessions.get(id).cloned() else {
            return false;
        };

        if !session.retire_if_empty().await {
            return false;
        }

        sessions.remove(id);
        log::info!("Session {} removed (empty)", id);
        true
    }

    /// Remove every expired or empty session.
    ///
    /// Emptiness is re-checked under each session's lock, so a participant
    /// seated concurrently keeps its session.
    ///
    /// # Returns
    ///
    /// * `usize` - Number of sessions removed
    pub async fn sweep(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        let mut removed = Self::purge(&mut sessions, |session| session.is_expired());

        let idle: Vec<_> = sessions
            .iter()
            .filter(|(_, session)| session.is_empty())
            .map(|(id, session)| (id.clone(), Arc::clone(session)))
            .collect();
        for (id, session) in idle {
            if session.retire_if_empty().await {
                sessions.remove(&id);
                removed += 1;
            }
        }

        if removed > 0 {
            log::info!(
                "Sweep removed {} sessions, {} remaining",
                removed,
                sessions.len()
            );
        }
        removed
    }

    fn purge(
        sessions: &mut HashMap<SessionId, Arc<Session>>,
        doomed: impl Fn(&Session) -> bool,
    ) -> usize {
        let before = sessions.len();
        sessions.retain(|_, session| {
            if doomed(session) {
                session.stop();
                false
            } else {
                true
            }
        });
        before - sessions.len()
    }

    /// Sweep every `period` until the hub is stopped.
    pub async fn maintain(&self, period: Duration) {
        let mut stop_rx = self.stop_tx.subscribe();
        if *stop_rx.borrow_and_update() {
            return;
        }

        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.sweep().await;
                }
                _ = stop_rx.changed() => break,
            }
        }

        log::debug!("Hub maintenance stopped");
    }

    /// Run `maintain` on its own task with the configured sweep interval.
    pub fn spawn_maintenance(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let hub = Arc::clone(self);
        let period = self.config.sweep_interval;
        tokio::spawn(async move { hub.maintain(period).await })
    }

    /// Refuse further admissions, stop maintenance and every session.
    pub async fn stop(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.stop_tx.send_replace(true);

        let mut sessions = self.sessions.write().await;
        let count = sessions.len();
        for (_, session) in sessions.drain() {
            session.stop();
        }
        log::info!("Hub stopped, {} sessions closed", count);
    }
}

impl Default for Hub {
    fn default() -> Self {
        Self::new(HubConfig::default())
    }
}
