//! Gridduel server: one shared two-player grid game over WebSockets.
//!
//! The [`GameSession`] is the single authority over game state. Transport
//! tasks feed it connection, move, and disconnect events; it commits each
//! change under one lock and pushes the resulting snapshot to every
//! attached connection through a [`ConnectionHandle`].
//!
//! # Example
//!
//! ```
//! use gridduel_rules::{Geometry, Player};
//! use gridduel_server::{ConnectionHandle, GameSession, SessionOptions};
//!
//! let session = GameSession::new(Geometry::classic(), SessionOptions::default());
//! let (handle, _frames) = ConnectionHandle::new();
//! let admission = session.connect_player(handle, None).unwrap();
//! assert_eq!(admission.player, Player::X);
//! assert!(session.apply_move(Player::X, 1, 1).is_accepted());
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod config;
pub mod connection;
pub mod protocol;
pub mod publisher;
pub mod registry;
pub mod scheduler;
pub mod session;
pub mod transport;

pub use config::{ConfigError, ServerConfig};
pub use connection::{ConnectionHandle, DeliveryError};
pub use protocol::{Assignment, ClientMessage, CloseReason, ProtocolError, ServerFrame, StateSnapshot};
pub use publisher::{PublishReport, StatePublisher};
pub use registry::{ClientId, PlayerRegistry, Rejection};
pub use scheduler::{NoRuntime, RoundResetScheduler};
pub use session::{Admission, GameSession, MoveResult, SessionError, SessionOptions};
pub use transport::{LivenessPolicy, router};
