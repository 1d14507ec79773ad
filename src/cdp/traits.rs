//! CDP connection seam
//!
//! The DOM driver only needs request/response commands and a stream of page
//! events; everything WebSocket-specific stays behind [`CdpConnection`].

use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use tokio::sync::mpsc;

use crate::{Error, Result};

/// Page event pushed by the browser
#[derive(Debug, Clone)]
pub struct CdpEvent {
    /// e.g. "Page.loadEventFired"
    pub method: String,
    pub params: Value,
}

impl CdpEvent {
    pub fn new<S: Into<String>>(method: S, params: Value) -> Self {
        Self {
            method: method.into(),
            params,
        }
    }

    /// URL of a top-level `Page.frameNavigated`; `None` for subframes and
    /// every other event
    pub fn top_frame_url(&self) -> Option<&str> {
        if self.method != "Page.frameNavigated" {
            return None;
        }
        let frame = self.params.get("frame")?;
        if frame.get("parentId").is_some() {
            return None;
        }
        frame.get("url").and_then(Value::as_str)
    }

    /// Whether the top-level document finished loading
    pub fn is_load(&self) -> bool {
        self.method == "Page.loadEventFired"
    }
}

/// Reply correlated with one command
#[derive(Debug, Clone)]
pub struct CdpResponse {
    pub id: u64,
    pub result: Option<Value>,
    pub error: Option<CdpError>,
}

impl CdpResponse {
    /// Payload of a successful reply to `method`
    pub fn into_result(self, method: &str) -> Result<Value> {
        if let Some(error) = self.error {
            return Err(Error::cdp(format!("{} failed: {}", method, error)));
        }
        self.result
            .ok_or_else(|| Error::cdp(format!("No result in response to {}", method)))
    }
}

/// Protocol-level failure reported by the browser
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CdpError {
    pub code: i32,
    pub message: String,
}

impl fmt::Display for CdpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code: {})", self.message, self.code)
    }
}

/// Connection to a single page target
#[async_trait]
pub trait CdpConnection: Send + Sync + std::fmt::Debug {
    /// Send a command and wait for its reply
    async fn send_command(&self, method: &str, params: Value) -> Result<CdpResponse>;

    /// Subscribe to page events; every subscriber sees every event
    async fn listen_events(&self) -> Result<mpsc::UnboundedReceiver<CdpEvent>>;

    async fn close(&self) -> Result<()>;

    fn is_active(&self) -> bool;

    /// Send a command and unwrap its `result` payload
    async fn call_method(&self, method: &str, params: Value) -> Result<Value> {
        self.send_command(method, params).await?.into_result(method)
    }
}
