//! The game session engine.
//!
//! [`GameSession`] owns the authoritative [`GameState`], the player
//! registry, and the pending reset. Every entry point, including the reset
//! timer's callback, runs inside one critical section: compute the next
//! snapshot, commit it, publish it, release.

use crate::config::{ConfigError, ServerConfig};
use crate::connection::ConnectionHandle;
use crate::protocol::{Assignment, CloseReason};
use crate::publisher::{PublishReport, StatePublisher};
use crate::registry::{ClientId, PlayerRegistry, Rejection};
use crate::scheduler::{NoRuntime, RoundResetScheduler};
use derive_more::Display;
use derive_setters::Setters;
use gridduel_rules::{GameState, Geometry, MoveRejection, Outcome, Player};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// Tunables fixed at session construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Setters)]
#[setters(prefix = "with_")]
pub struct SessionOptions {
    /// Delay between a terminal outcome and the automatic reset.
    pub reset_delay: Duration,
    /// Reject a connection whose client id is already bound.
    pub reject_duplicate_clients: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            reset_delay: Duration::from_secs(2),
            reject_duplicate_clients: true,
        }
    }
}

/// Successful connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    /// Identity bound to the connection.
    pub player: Player,
    /// Fresh opaque token sent in the private acknowledgment.
    pub token: Uuid,
}

/// Connection refused by the session. No state changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum SessionError {
    /// Both identities are taken.
    #[display("Session is full")]
    SessionFull,
    /// The client id is already bound to a player.
    #[display("Client is already connected")]
    DuplicateClient,
}

impl std::error::Error for SessionError {}

impl SessionError {
    /// Close frame the transport should send.
    pub fn close_reason(self) -> CloseReason {
        match self {
            SessionError::SessionFull => CloseReason::SessionFull,
            SessionError::DuplicateClient => CloseReason::DuplicateClient,
        }
    }
}

impl From<Rejection> for SessionError {
    fn from(rejection: Rejection) -> Self {
        match rejection {
            Rejection::TooManyPlayers => SessionError::SessionFull,
            Rejection::DuplicateClient => SessionError::DuplicateClient,
        }
    }
}

/// Result of a move request.
///
/// Ignored moves are a normal part of play, not failures: the state is
/// untouched and nothing is published.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveResult {
    /// The move was committed; carries the resulting outcome.
    Accepted(Outcome),
    /// The move was dropped.
    Ignored(MoveRejection),
}

impl MoveResult {
    /// True if the move was committed.
    pub fn is_accepted(&self) -> bool {
        matches!(self, MoveResult::Accepted(_))
    }
}

#[derive(Debug)]
struct SessionCore {
    state: GameState,
    registry: PlayerRegistry<ConnectionHandle>,
    scheduler: RoundResetScheduler,
    publisher: StatePublisher,
}

impl SessionCore {
    /// Replaces the state and publishes it.
    fn commit(&mut self, next: GameState) -> PublishReport {
        self.state = next;
        self.publisher.publish(&self.state, self.registry.connections())
    }
}

#[derive(Debug)]
struct Inner {
    geometry: Geometry,
    options: SessionOptions,
    core: Mutex<SessionCore>,
}

/// Handle to the single game session.
///
/// Cheap to clone; all clones share one session. Operations never hold the
/// lock across an `.await`, so they all complete promptly.
#[derive(Debug, Clone)]
pub struct GameSession {
    inner: Arc<Inner>,
}

impl GameSession {
    /// Creates a session waiting for players.
    #[instrument]
    pub fn new(geometry: Geometry, options: SessionOptions) -> Self {
        info!(
            size = geometry.size(),
            run_length = geometry.run_length(),
            "Creating game session"
        );
        let state = GameState::new(geometry);
        let core = SessionCore {
            publisher: StatePublisher::new(state.clone()),
            state,
            registry: PlayerRegistry::new(options.reject_duplicate_clients),
            scheduler: RoundResetScheduler::new(),
        };
        Self {
            inner: Arc::new(Inner {
                geometry,
                options,
                core: Mutex::new(core),
            }),
        }
    }

    /// Creates a session from server configuration.
    pub fn from_config(config: &ServerConfig) -> Result<Self, ConfigError> {
        let options = SessionOptions::default()
            .with_reset_delay(config.reset_delay())
            .with_reject_duplicate_clients(*config.reject_duplicate_clients());
        Ok(Self::new(config.geometry()?, options))
    }

    fn lock(&self) -> MutexGuard<'_, SessionCore> {
        self.inner
            .core
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Binds a connection to the first free identity.
    ///
    /// The new connection first receives its private [`Assignment`], then
    /// every connection receives the updated state.
    #[instrument(skip(self, handle), fields(connection = %handle.id()))]
    pub fn connect_player(
        &self,
        handle: ConnectionHandle,
        client_id: Option<ClientId>,
    ) -> Result<Admission, SessionError> {
        let mut core = self.lock();
        let player = core.registry.connect(handle.clone(), client_id)?;
        let token = Uuid::new_v4();

        match serde_json::to_string(&Assignment {
            player_name: player,
            id: token,
        }) {
            Ok(ack) => {
                if let Err(e) = handle.send_text(ack) {
                    warn!(%player, error = %e, "Assignment delivery failed");
                }
            }
            Err(e) => error!(%player, error = %e, "Failed to serialize assignment"),
        }

        let next = core.state.with_connected(player);
        core.commit(next);
        info!(%player, "Player connected");
        Ok(Admission { player, token })
    }

    /// Places `player`'s mark at `(x, y)` if the move is legal.
    ///
    /// Illegal moves (out of bounds, occupied, round over, wrong turn) are
    /// ignored. A move that ends the round arms the delayed reset in the
    /// same critical section that commits it. When no Tokio runtime is
    /// reachable the next round starts immediately instead.
    #[instrument(skip(self))]
    pub fn apply_move(&self, player: Player, x: i64, y: i64) -> MoveResult {
        let mut core = self.lock();
        let next = match core.state.apply_move(player, x, y) {
            Ok(next) => next,
            Err(rejection) => {
                debug!(%rejection, "Move ignored");
                return MoveResult::Ignored(rejection);
            }
        };

        let outcome = next.outcome();
        if !outcome.is_terminal() {
            core.commit(next);
            return MoveResult::Accepted(outcome);
        }

        info!(?outcome, "Round over");
        match self.arm_reset(&mut core) {
            Ok(_) => {
                core.commit(next);
            }
            Err(e) => {
                error!(error = %e, "Starting next round without delay");
                let fresh = next.reset();
                core.commit(next);
                core.commit(fresh);
            }
        }
        MoveResult::Accepted(outcome)
    }

    /// Releases `player`'s slot and republishes.
    ///
    /// The board is left as it is; the round does not end. Returns whether
    /// the identity was bound.
    #[instrument(skip(self))]
    pub fn disconnect_player(&self, player: Player) -> bool {
        let mut core = self.lock();
        if core.registry.disconnect(player).is_none() {
            return false;
        }
        let next = core.state.with_disconnected(player);
        core.commit(next);
        info!(%player, "Player disconnected");
        true
    }

    /// Arms the reset timer, replacing any pending one.
    fn arm_reset(&self, core: &mut SessionCore) -> Result<u64, NoRuntime> {
        let session: Weak<Inner> = Arc::downgrade(&self.inner);
        core.scheduler
            .arm(self.inner.options.reset_delay, move |generation| {
                if let Some(inner) = session.upgrade() {
                    GameSession { inner }.fire_reset(generation);
                }
            })
    }

    /// Timer callback: starts a new round if `generation` is still armed.
    #[instrument(skip(self))]
    fn fire_reset(&self, generation: u64) -> bool {
        let mut core = self.lock();
        if !core.scheduler.claim(generation) {
            return false;
        }
        let next = core.state.reset();
        core.commit(next);
        info!("New round started");
        true
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> GameState {
        self.lock().state.clone()
    }

    /// Follows every committed snapshot.
    pub fn subscribe(&self) -> watch::Receiver<GameState> {
        self.lock().publisher.subscribe()
    }

    /// Board geometry this session was built with.
    pub fn geometry(&self) -> Geometry {
        self.inner.geometry
    }

    /// True while a reset is armed.
    pub fn has_pending_reset(&self) -> bool {
        self.lock().scheduler.is_pending()
    }

    /// Cancels any pending reset.
    #[instrument(skip(self))]
    pub fn shutdown(&self) {
        if self.lock().scheduler.cancel() {
            info!("Pending reset cancelled for shutdown");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{ServerFrame, StateSnapshot};
    use tokio::sync::mpsc::UnboundedReceiver;

    fn drain(rx: &mut UnboundedReceiver<ServerFrame>) -> Vec<StateSnapshot> {
        let mut snapshots = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            let ServerFrame::Text(text) = frame;
            if let Ok(snapshot) = serde_json::from_str::<StateSnapshot>(&text) {
                snapshots.push(snapshot);
            }
        }
        snapshots
    }

    fn win_for_x(session: &GameSession) {
        for (player, x, y) in [
            (Player::X, 0, 0),
            (Player::O, 0, 1),
            (Player::X, 1, 0),
            (Player::O, 1, 1),
            (Player::X, 2, 0),
        ] {
            assert!(session.apply_move(player, x, y).is_accepted());
        }
    }

    #[tokio::test]
    async fn test_stale_generation_is_ignored() {
        let session = GameSession::new(Geometry::classic(), SessionOptions::default());
        win_for_x(&session);
        let armed = session.lock().scheduler.generation();

        assert!(!session.fire_reset(armed + 1));
        assert_eq!(session.snapshot().outcome(), Outcome::Won(Player::X));

        assert!(session.fire_reset(armed));
        assert_eq!(session.snapshot().outcome(), Outcome::InProgress);
        assert!(!session.fire_reset(armed));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearm_before_fire_resets_exactly_once() {
        let session = GameSession::new(Geometry::classic(), SessionOptions::default());
        let (handle, mut rx) = ConnectionHandle::new();
        session.connect_player(handle, None).unwrap();
        win_for_x(&session);
        drain(&mut rx);

        tokio::time::sleep(Duration::from_secs(1)).await;
        {
            let mut core = session.lock();
            session.arm_reset(&mut core).unwrap();
        }

        // The first timer was due at 2s, the replacement at 3s.
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(drain(&mut rx).is_empty());
        assert!(session.has_pending_reset());

        tokio::time::sleep(Duration::from_secs(10)).await;
        let published = drain(&mut rx);
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].outcome, Outcome::InProgress);
        assert!(published[0].field.squares().all(|square| square.is_empty()));
        assert!(!session.has_pending_reset());
    }

    #[test]
    fn test_win_outside_runtime_starts_next_round() {
        let session = GameSession::new(Geometry::classic(), SessionOptions::default());
        let (handle, mut rx) = ConnectionHandle::new();
        session.connect_player(handle, None).unwrap();
        drain(&mut rx);

        for (player, x, y) in [
            (Player::X, 0, 0),
            (Player::O, 0, 1),
            (Player::X, 1, 0),
            (Player::O, 1, 1),
        ] {
            assert!(session.apply_move(player, x, y).is_accepted());
        }
        assert_eq!(
            session.apply_move(Player::X, 2, 0),
            MoveResult::Accepted(Outcome::Won(Player::X))
        );

        let published: Vec<Outcome> = drain(&mut rx).iter().map(|s| s.outcome).collect();
        assert_eq!(
            published[published.len() - 2..],
            [Outcome::Won(Player::X), Outcome::InProgress]
        );
        assert!(!session.has_pending_reset());
        assert!(session.apply_move(Player::X, 1, 1).is_accepted());
    }

    #[test]
    fn test_win_on_plain_thread_uses_session_runtime() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .start_paused(true)
            .build()
            .unwrap();
        let session = {
            let _entered = runtime.enter();
            GameSession::new(Geometry::classic(), SessionOptions::default())
        };

        win_for_x(&session);
        assert_eq!(session.snapshot().outcome(), Outcome::Won(Player::X));
        assert!(session.has_pending_reset());

        runtime.block_on(async { tokio::time::sleep(Duration::from_secs(3)).await });
        assert_eq!(session.snapshot().outcome(), Outcome::InProgress);
        assert!(!session.has_pending_reset());
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_timer_does_not_keep_session_alive() {
        let session = GameSession::new(Geometry::classic(), SessionOptions::default());
        let observer = session.subscribe();
        win_for_x(&session);
        drop(session);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(observer.has_changed().is_err());
    }
}
