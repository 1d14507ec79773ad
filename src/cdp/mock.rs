//! Mock CDP connection for testing
//!
//! Answers commands through a caller-supplied responder and lets tests push
//! events to subscribers.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

use crate::cdp::traits::*;
use crate::{Error, Result};

type Responder = Arc<dyn Fn(&str, &Value) -> Result<Value> + Send + Sync>;

/// Mock CDP connection
pub struct MockCdpConnection {
    responder: Responder,
    sent: Mutex<Vec<(String, Value)>>,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<CdpEvent>>>,
    is_active: AtomicBool,
    next_id: AtomicU64,
}

impl std::fmt::Debug for MockCdpConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockCdpConnection")
            .field("is_active", &self.is_active.load(Ordering::Relaxed))
            .finish()
    }
}

impl MockCdpConnection {
    /// Create a mock that answers every command with `{}`
    pub fn new() -> Self {
        Self::with_responder(|_, _| Ok(serde_json::json!({})))
    }

    /// Create a mock whose answers come from `responder(method, params)`
    pub fn with_responder<F>(responder: F) -> Self
    where
        F: Fn(&str, &Value) -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            responder: Arc::new(responder),
            sent: Mutex::new(Vec::new()),
            subscribers: Mutex::new(Vec::new()),
            is_active: AtomicBool::new(true),
            next_id: AtomicU64::new(1),
        }
    }

    /// Push an event to every subscriber
    pub fn emit(&self, method: &str, params: Value) {
        let event = CdpEvent::new(method, params);
        if let Ok(mut subscribers) = self.subscribers.lock() {
            subscribers.retain(|s| s.send(event.clone()).is_ok());
        }
    }

    /// Commands sent so far, in order
    pub fn sent(&self) -> Vec<(String, Value)> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl Default for MockCdpConnection {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CdpConnection for MockCdpConnection {
    async fn send_command(&self, method: &str, params: Value) -> Result<CdpResponse> {
        if !self.is_active.load(Ordering::Relaxed) {
            return Err(Error::cdp("Connection is closed"));
        }

        if let Ok(mut sent) = self.sent.lock() {
            sent.push((method.to_string(), params.clone()));
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (result, error) = match (self.responder)(method, &params) {
            Ok(value) => (Some(value), None),
            Err(e) => (
                None,
                Some(CdpError {
                    code: -32000,
                    message: e.to_string(),
                }),
            ),
        };

        Ok(CdpResponse { id, result, error })
    }

    async fn listen_events(&self) -> Result<mpsc::UnboundedReceiver<CdpEvent>> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers
            .lock()
            .map_err(|_| Error::internal("mock subscriber lock poisoned"))?
            .push(tx);
        Ok(rx)
    }

    async fn close(&self) -> Result<()> {
        self.is_active.store(false, Ordering::Relaxed);
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.is_active.load(Ordering::Relaxed)
    }
}
