#![cfg_attr(doc, doc = include_str!("../README.md"))]

pub mod config;
pub mod connection;
pub mod error;
pub mod handlers;

pub use config::{Config, ReconnectConfig};
pub use connection::{ConnectionManager, ConnectionState};
pub use error::WsError;
pub use handlers::{CloseReason, Handlers, Payload};

pub type Result<T> = std::result::Result<T, WsError>;
