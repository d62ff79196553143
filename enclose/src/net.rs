//! Wire protocol and message dispatch.
//!
//! Frames are JSON objects carried as text. Inbound frames are decoded at the
//! edge into [`ClientMessage`](messages::ClientMessage); everything past
//! [`dispatch`] works with typed commands bound to a connection's participant.

/// Routing of decoded commands to session operations.
pub mod dispatch;

/// Protocol error types.
pub mod errors;

/// Inbound and outbound message shapes.
pub mod messages;

pub use dispatch::{Dispatched, disconnect, dispatch, handle_frame};
pub use errors::ProtocolError;
pub use messages::{ClientMessage, Envelope, ServerMessage};
