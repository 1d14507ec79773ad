//! Unified error types for Region-Oxide

use thiserror::Error;

/// Unified Result type
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for Region-Oxide
#[derive(Error, Debug)]
pub enum Error {
    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// WebSocket errors
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// CDP protocol errors
    #[error("CDP error: {0}")]
    Cdp(String),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Locator never matched within its timeout
    #[error("Element not found: {0}")]
    NotFound(String),

    /// A previously resolved node is detached from the document.
    ///
    /// Raised by drivers; element handles recover from it once.
    #[error("Stale element: {0}")]
    StaleElement(String),

    /// Re-resolution was attempted and the node is still detached
    #[error("Stale element recovery failed: {0}")]
    StaleRecoveryFailure(String),

    /// A wait (signal, navigation) expired
    #[error("Operation timeout: {0}")]
    Timeout(String),

    /// Click landed on an overlapping element
    #[error("Click intercepted: {0}")]
    ClickIntercepted(String),

    /// Driver rejected an operation (unsupported locator, bad script result)
    #[error("Driver error: {0}")]
    Driver(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new WebSocket error
    pub fn websocket<S: Into<String>>(msg: S) -> Self {
        Error::WebSocket(msg.into())
    }

    /// Create a new CDP error
    pub fn cdp<S: Into<String>>(msg: S) -> Self {
        Error::Cdp(msg.into())
    }

    /// Create a new not found error
    pub fn not_found<S: Into<String>>(what: S) -> Self {
        Error::NotFound(what.into())
    }

    /// Create a new stale element error
    pub fn stale<S: Into<String>>(what: S) -> Self {
        Error::StaleElement(what.into())
    }

    /// Create a new stale recovery failure
    pub fn stale_recovery<S: Into<String>>(what: S) -> Self {
        Error::StaleRecoveryFailure(what.into())
    }

    /// Create a new timeout error
    pub fn timeout<S: Into<String>>(msg: S) -> Self {
        Error::Timeout(msg.into())
    }

    /// Create a new click intercepted error
    pub fn click_intercepted<S: Into<String>>(msg: S) -> Self {
        Error::ClickIntercepted(msg.into())
    }

    /// Create a new driver error
    pub fn driver<S: Into<String>>(msg: S) -> Self {
        Error::Driver(msg.into())
    }

    /// Create a new configuration error
    pub fn configuration<S: Into<String>>(msg: S) -> Self {
        Error::Configuration(msg.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Error::Internal(msg.into())
    }

    /// Whether this error reports a detached node
    pub fn is_stale(&self) -> bool {
        matches!(self, Error::StaleElement(_))
    }

    /// Whether this error reports an obscured click target
    pub fn is_click_intercepted(&self) -> bool {
        matches!(self, Error::ClickIntercepted(_))
    }
}
