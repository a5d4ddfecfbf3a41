//! User-supplied event handlers for connection lifecycle signals.
//!
//! All four handlers are optional. They are invoked from the connection
//! actor task, one at a time, so a handler never races another handler of
//! the same manager. Handlers should return quickly; long work belongs on a
//! channel or a spawned task.

use std::fmt;
use std::sync::Arc;

use crate::error::WsError;

/// Raw inbound payload passed to the `on_message` handler unmodified.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// UTF-8 text frame
    Text(String),
    /// Binary frame
    Binary(Vec<u8>),
}

/// Why the peer side of an open connection went away.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// The server sent a close frame
    Frame {
        /// Close code from the frame, if one was present
        code: Option<u16>,
        /// Free-form reason text from the frame
        reason: String,
    },
    /// The stream ended without a close frame
    StreamEnded,
}

type OpenHandler = Arc<dyn Fn() + Send + Sync>;
type CloseHandler = Arc<dyn Fn(&CloseReason) + Send + Sync>;
type MessageHandler = Arc<dyn Fn(Payload) + Send + Sync>;
type ErrorHandler = Arc<dyn Fn(&WsError) + Send + Sync>;

/// Optional callbacks invoked by the connection actor.
///
/// ```rust
/// use ws_lifeline::{Handlers, Payload};
///
/// let handlers = Handlers::new()
///     .on_open(|| println!("open"))
///     .on_message(|payload| {
///         if let Payload::Text(text) = payload {
///             println!("got: {text}");
///         }
///     });
/// ```
#[derive(Clone, Default)]
pub struct Handlers {
    pub(crate) open: Option<OpenHandler>,
    pub(crate) close: Option<CloseHandler>,
    pub(crate) message: Option<MessageHandler>,
    pub(crate) error: Option<ErrorHandler>,
}

impl Handlers {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Invoked once per successfully opened connection, including reopens
    /// after a reconnect.
    #[must_use]
    pub fn on_open(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.open = Some(Arc::new(f));
        self
    }

    /// Invoked when an open connection is closed by the peer.
    #[must_use]
    pub fn on_close(mut self, f: impl Fn(&CloseReason) + Send + Sync + 'static) -> Self {
        self.close = Some(Arc::new(f));
        self
    }

    /// Invoked for every inbound frame with the raw payload.
    #[must_use]
    pub fn on_message(mut self, f: impl Fn(Payload) + Send + Sync + 'static) -> Self {
        self.message = Some(Arc::new(f));
        self
    }

    /// Invoked when a connection attempt or an open connection fails.
    #[must_use]
    pub fn on_error(mut self, f: impl Fn(&WsError) + Send + Sync + 'static) -> Self {
        self.error = Some(Arc::new(f));
        self
    }
}

impl fmt::Debug for Handlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handlers")
            .field("open", &self.open.is_some())
            .field("close", &self.close.is_some())
            .field("message", &self.message.is_some())
            .field("error", &self.error.is_some())
            .finish()
    }
}
