//! Page-lifecycle notifier
//!
//! Broadcasts one event per full page load. Tables subscribe when opened and
//! drain their subscription before every read; dropping a subscription
//! unsubscribes.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

use crate::cdp::CdpEvent;
use crate::wait::await_condition;
use crate::Result;

const DEFAULT_CAPACITY: usize = 64;

/// One completed navigation
#[derive(Debug, Clone, Serialize)]
pub struct NavigationEvent {
    /// Position in the session's navigation sequence, starting at 1
    pub sequence: u64,
    /// URL of the new document, when known
    pub url: Option<String>,
    pub at: DateTime<Utc>,
}

#[derive(Debug)]
struct Inner {
    sender: broadcast::Sender<NavigationEvent>,
    sequence: AtomicU64,
    event_driven: AtomicBool,
}

/// Navigation broadcaster for one browser session
#[derive(Debug, Clone)]
pub struct PageLifecycle {
    inner: Arc<Inner>,
}

impl Default for PageLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl PageLifecycle {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            inner: Arc::new(Inner {
                sender,
                sequence: AtomicU64::new(0),
                event_driven: AtomicBool::new(false),
            }),
        }
    }

    /// Announce a completed navigation; returns its sequence number
    pub fn notify_navigation(&self, url: Option<String>) -> u64 {
        let sequence = self.inner.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let event = NavigationEvent {
            sequence,
            url,
            at: Utc::now(),
        };

        // No receivers is fine: nothing is open on this page yet.
        let delivered = self.inner.sender.send(event).unwrap_or(0);
        debug!("Navigation #{} delivered to {} subscribers", sequence, delivered);
        sequence
    }

    pub fn subscribe(&self) -> LifecycleSubscription {
        LifecycleSubscription {
            id: Uuid::new_v4().to_string(),
            receiver: self.inner.sender.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.sender.receiver_count()
    }

    /// Number of navigations announced so far
    pub fn sequence(&self) -> u64 {
        self.inner.sequence.load(Ordering::SeqCst)
    }

    /// Whether navigations are announced by a page event stream
    pub fn is_event_driven(&self) -> bool {
        self.inner.event_driven.load(Ordering::SeqCst)
    }

    /// Wait until a navigation after `sequence` is announced
    pub async fn wait_past(&self, sequence: u64, timeout: Duration, interval: Duration) -> Result<bool> {
        await_condition(
            || async move { Ok(self.sequence() > sequence) },
            timeout,
            interval,
        )
        .await
    }

    /// Announce a navigation for every `Page.loadEventFired` on `events`
    ///
    /// The URL comes from the latest top-frame `Page.frameNavigated`.
    pub fn forward_cdp_events(&self, mut events: mpsc::UnboundedReceiver<CdpEvent>) -> JoinHandle<()> {
        self.inner.event_driven.store(true, Ordering::SeqCst);
        let lifecycle = self.clone();

        tokio::spawn(async move {
            let mut url: Option<String> = None;

            while let Some(event) = events.recv().await {
                if let Some(frame_url) = event.top_frame_url() {
                    url = Some(frame_url.to_string());
                } else if event.is_load() {
                    lifecycle.notify_navigation(url.clone());
                }
            }

            lifecycle.inner.event_driven.store(false, Ordering::SeqCst);
            info!("Page event stream closed");
        })
    }
}

/// Receiving end held by one table
#[derive(Debug)]
pub struct LifecycleSubscription {
    id: String,
    receiver: broadcast::Receiver<NavigationEvent>,
}

impl LifecycleSubscription {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Consume pending events and return how many navigations happened
    ///
    /// Events lost to lag still count.
    pub fn drain(&mut self) -> usize {
        let mut count = 0;
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    debug!("Subscription {} saw navigation #{}", self.id, event.sequence);
                    count += 1;
                }
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    debug!("Subscription {} lagged by {} navigations", self.id, n);
                    count += n as usize;
                }
                Err(broadcast::error::TryRecvError::Empty) | Err(broadcast::error::TryRecvError::Closed) => break,
            }
        }
        count
    }
}
