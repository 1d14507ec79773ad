//! Self-healing element handle

use futures::future::{BoxFuture, FutureExt};
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, warn};

use super::state::{Probe, ReResolved, Resolution};
use crate::driver::{DomDriver, Locator, NodeRef};
use crate::wait::await_condition;
use crate::{Error, Result};

/// Callback run synchronously after a stale handle re-locates its node
pub type ReResolveListener = Arc<dyn Fn(&ReResolved) + Send + Sync>;

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|e| Error::internal(format!("Lock error: {}", e)))
}

/// Lazily resolved reference to the `index`-th match of a locator
///
/// The handle remembers how it found its node, so when the page re-renders
/// and the node is detached it can find the replacement. Scoped handles
/// search below another handle and inherit its recovery.
pub struct ElementHandle {
    driver: Arc<dyn DomDriver>,
    locator: Locator,
    index: usize,
    scope: Option<Arc<ElementHandle>>,
    timeout: Duration,
    poll_interval: Duration,
    state: Mutex<Resolution>,
    listeners: Mutex<Vec<ReResolveListener>>,
    re_resolutions: AtomicU64,
}

impl fmt::Debug for ElementHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElementHandle")
            .field("locator", &self.locator)
            .field("index", &self.index)
            .field("scope", &self.scope.as_ref().map(|s| s.describe()))
            .field("state", &self.state.lock().map(|s| s.clone()).ok())
            .finish()
    }
}

impl ElementHandle {
    /// Handle on the first match of `locator` in the document
    pub fn new(driver: Arc<dyn DomDriver>, locator: Locator, timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            driver,
            locator,
            index: 0,
            scope: None,
            timeout,
            poll_interval,
            state: Mutex::new(Resolution::Unresolved),
            listeners: Mutex::new(Vec::new()),
            re_resolutions: AtomicU64::new(0),
        }
    }

    /// Pick the `index`-th match instead of the first
    pub fn with_index(mut self, index: usize) -> Self {
        self.index = index;
        self
    }

    /// Search below `scope` instead of the document
    pub fn within(mut self, scope: Arc<ElementHandle>) -> Self {
        self.scope = Some(scope);
        self
    }

    /// Start out resolved to a node the caller already located
    pub fn with_node(self, node: NodeRef) -> Self {
        Self {
            state: Mutex::new(Resolution::Resolved(node)),
            ..self
        }
    }

    /// Handle on the `index`-th match of `locator` below this handle
    pub fn child(self: &Arc<Self>, locator: Locator, index: usize) -> ElementHandle {
        ElementHandle::new(Arc::clone(&self.driver), locator, self.timeout, self.poll_interval)
            .with_index(index)
            .within(Arc::clone(self))
    }

    pub fn locator(&self) -> &Locator {
        &self.locator
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn driver(&self) -> &Arc<dyn DomDriver> {
        &self.driver
    }

    /// Snapshot of the resolution state
    pub fn resolution(&self) -> Result<Resolution> {
        Ok(lock(&self.state)?.clone())
    }

    /// How many times this handle recovered from staleness
    pub fn re_resolutions(&self) -> u64 {
        self.re_resolutions.load(Ordering::SeqCst)
    }

    /// Register a listener for stale-to-resolved transitions
    pub fn on_re_resolve<F>(&self, listener: F) -> Result<()>
    where
        F: Fn(&ReResolved) + Send + Sync + 'static,
    {
        lock(&self.listeners)?.push(Arc::new(listener));
        Ok(())
    }

    fn describe(&self) -> String {
        match &self.scope {
            Some(scope) => format!("{}[{}] within {}", self.locator, self.index, scope.describe()),
            None => format!("{}[{}]", self.locator, self.index),
        }
    }

    /// Apply a probe and notify listeners if the handle just recovered
    fn apply(&self, probe: Probe) -> Result<()> {
        let event = {
            let mut state = lock(&self.state)?;
            let next = state.transition(probe);
            let event = match (&*state, &next) {
                (Resolution::Stale(previous), Resolution::Resolved(current)) => Some(ReResolved {
                    previous: previous.clone(),
                    current: current.clone(),
                }),
                _ => None,
            };
            *state = next;
            event
        };

        if let Some(event) = event {
            self.re_resolutions.fetch_add(1, Ordering::SeqCst);
            debug!("{} re-resolved {} -> {}", self.describe(), event.previous, event.current);
            let listeners = lock(&self.listeners)?.clone();
            for listener in listeners {
                listener(&event);
            }
        }
        Ok(())
    }

    /// Mark `node` detached, unless the handle has moved on already
    fn mark_detached(&self, node: &NodeRef) -> Result<()> {
        let current = lock(&self.state)?.node().cloned();
        if current.as_ref() == Some(node) {
            self.apply(Probe::Detached)?;
        }
        Ok(())
    }

    async fn locate_once(&self) -> Result<Option<NodeRef>> {
        let matches = match &self.scope {
            Some(scope) => {
                let locator = &self.locator;
                let driver = &self.driver;
                scope
                    .access(|node| async move { driver.find_elements(Some(&node), locator).await })
                    .boxed()
                    .await?
            }
            None => self.driver.find_elements(None, &self.locator).await?,
        };
        Ok(matches.into_iter().nth(self.index))
    }

    async fn locate(&self) -> Result<NodeRef> {
        let slot: Mutex<Option<NodeRef>> = Mutex::new(None);
        let slot_ref = &slot;

        let found = await_condition(
            || async move {
                match self.locate_once().await? {
                    Some(node) => {
                        *lock(slot_ref)? = Some(node);
                        Ok(true)
                    }
                    None => Ok(false),
                }
            },
            self.timeout,
            self.poll_interval,
        )
        .await?;

        let located = if found {
            slot.into_inner()
                .map_err(|e| Error::internal(format!("Lock error: {}", e)))?
        } else {
            None
        };

        match located {
            Some(node) => {
                self.apply(Probe::Located(node.clone()))?;
                Ok(node)
            }
            None => {
                self.apply(Probe::Missing)?;
                Err(Error::not_found(format!("{} after {:?}", self.describe(), self.timeout)))
            }
        }
    }

    /// Live node for the locator, polling up to the timeout if needed
    pub fn resolve(&self) -> BoxFuture<'_, Result<NodeRef>> {
        async move {
            if let Some(node) = lock(&self.state)?.node().cloned() {
                return Ok(node);
            }
            self.locate().await
        }
        .boxed()
    }

    /// Whether the resolved node has been detached
    ///
    /// An unresolved handle is not stale. A detected detachment is recorded,
    /// so the next [`resolve`](Self::resolve) re-locates and notifies
    /// listeners.
    pub async fn is_stale(&self) -> Result<bool> {
        let node = match self.resolution()? {
            Resolution::Resolved(node) => node,
            Resolution::Stale(_) => return Ok(true),
            Resolution::Unresolved | Resolution::NotFound => return Ok(false),
        };

        if self.driver.is_attached(&node).await? {
            Ok(false)
        } else {
            self.apply(Probe::Detached)?;
            Ok(true)
        }
    }

    /// Run `op` against the node, recovering once from staleness
    ///
    /// Listeners observe the re-resolution before `op` is retried. A second
    /// stale failure is returned as `StaleRecoveryFailure`.
    pub async fn access<T, F, Fut>(&self, op: F) -> Result<T>
    where
        F: Fn(NodeRef) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let node = self.resolve().await?;

        match op(node.clone()).await {
            Err(e) if e.is_stale() => {
                debug!("{} went stale: {}", self.describe(), e);
                self.mark_detached(&node)?;
                let fresh = self.resolve().await?;

                match op(fresh).await {
                    Err(e) if e.is_stale() => {
                        warn!("{} still stale after re-resolution", self.describe());
                        Err(Error::stale_recovery(format!("{}: {}", self.describe(), e)))
                    }
                    other => other,
                }
            }
            other => other,
        }
    }

    pub async fn text(&self) -> Result<String> {
        let driver = &self.driver;
        self.access(|node| async move { driver.text(&node).await }).await
    }

    pub async fn attribute(&self, name: &str) -> Result<Option<String>> {
        let driver = &self.driver;
        self.access(|node| async move { driver.attribute(&node, name).await })
            .await
    }

    pub async fn is_checked(&self) -> Result<bool> {
        let driver = &self.driver;
        self.access(|node| async move { driver.is_checked(&node).await })
            .await
    }

    pub async fn click(&self) -> Result<()> {
        let driver = &self.driver;
        self.access(|node| async move { driver.click(&node).await }).await
    }

    pub async fn set_value(&self, value: &str) -> Result<()> {
        let driver = &self.driver;
        self.access(|node| async move { driver.set_value(&node, value).await })
            .await
    }

    pub async fn scroll_into_view(&self) -> Result<()> {
        let driver = &self.driver;
        self.access(|node| async move { driver.scroll_into_view(&node).await })
            .await
    }

    pub async fn remove(&self) -> Result<()> {
        let driver = &self.driver;
        self.access(|node| async move { driver.remove(&node).await }).await
    }

    /// Every match of `locator` below this handle's node
    pub async fn find_all(&self, locator: &Locator) -> Result<Vec<NodeRef>> {
        let driver = &self.driver;
        self.access(|node| async move { driver.find_elements(Some(&node), locator).await })
            .await
    }
}
