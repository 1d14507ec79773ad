//! # Chrome DevTools Protocol (CDP) transport
//!
//! WebSocket plumbing between the DOM driver and a Chrome/Chromium page target.
//!
//! ## Modules
//! - `traits`: connection trait and event/response types
//! - `types`: JSON-RPC wire types
//! - `connection`: WebSocket implementation
//! - `mock`: scripted connection for tests

pub mod traits;
pub mod types;
pub mod connection;
pub mod mock;

pub use traits::{CdpConnection, CdpError, CdpEvent, CdpResponse};
pub use connection::{CdpTimeoutConfig, CdpWebSocketConnection};
pub use mock::MockCdpConnection;
