#![expect(
    clippy::module_name_repetitions,
    reason = "Error types include the crate scope to stay unambiguous at call sites"
)]

use std::error::Error as StdError;
use std::fmt;

/// WebSocket transport error variants.
///
/// Only [`WsError::InvalidAddress`] and [`WsError::Serialize`] ever reach the
/// caller synchronously. Everything the transport produces at runtime is
/// absorbed by the connection actor and surfaced through the `on_error`
/// handler plus the state channel.
#[non_exhaustive]
#[derive(Debug)]
pub enum WsError {
    /// The endpoint given at construction is empty or not a parseable URL
    InvalidAddress(String),
    /// Error connecting to or communicating with the WebSocket server
    Connection(tokio_tungstenite::tungstenite::Error),
    /// Outbound payload could not be serialized to its textual wire form
    Serialize(serde_json::Error),
    /// WebSocket connection was closed
    ConnectionClosed,
    /// A connection attempt did not resolve within the configured timeout
    Timeout,
}

impl fmt::Display for WsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidAddress(reason) => write!(f, "invalid endpoint address: {reason}"),
            Self::Connection(e) => write!(f, "WebSocket connection error: {e}"),
            Self::Serialize(e) => write!(f, "failed to serialize outbound payload: {e}"),
            Self::ConnectionClosed => write!(f, "WebSocket connection closed"),
            Self::Timeout => write!(f, "WebSocket connection attempt timed out"),
        }
    }
}

impl StdError for WsError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Connection(e) => Some(e),
            Self::Serialize(e) => Some(e),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for WsError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialize(e)
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for WsError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Connection(e)
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error as _;

    use super::*;

    #[test]
    fn invalid_address_display_names_the_reason() {
        let error = WsError::InvalidAddress("endpoint is empty".to_owned());
        assert_eq!(
            error.to_string(),
            "invalid endpoint address: endpoint is empty"
        );
    }

    #[test]
    fn serialize_error_exposes_its_source() {
        let json_err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let error: WsError = json_err.into();
        assert!(error.source().is_some(), "source should be preserved");
    }
}
