// protect-api: Async Rust client for the UniFi Protect NVR API

pub mod auth;
mod bootstrap;
mod cameras;
pub mod client;
pub mod error;
mod events;
pub mod models;
pub mod transport;
pub mod websocket;

pub use auth::{Credential, NvrPlatform};
pub use client::ProtectClient;
pub use error::Error;
pub use transport::{TlsMode, TransportConfig};
pub use websocket::{ReconnectConfig, WebSocketHandle};
