//! # Browser session
//!
//! The explicit context every handle, signal and table is built from: one
//! DOM driver, one page-lifecycle notifier, one signal strategy and the
//! configuration.
//!
//! ## Usage
//! ```rust,no_run
//! use region_oxide::config::Config;
//! use region_oxide::session::BrowserSession;
//!
//! # async fn example() -> region_oxide::Result<()> {
//! let session = BrowserSession::connect(Config::from_env()?).await?;
//! session.navigate("http://localhost:8080/query?schema=core").await?;
//!
//! let mut table = session.open_table("query")?;
//! println!("{} rows", table.row_count().await?);
//! # Ok(())
//! # }
//! ```

pub mod lifecycle;

use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::driver::{CdpDomDriver, DomDriver, Locator};
use crate::element::ElementHandle;
use crate::region::{DataRegionTable, RegionTarget};
use crate::signal::{CompletionSignal, DomMarkerSignal, SignalStrategy};
use crate::Result;

pub use lifecycle::{LifecycleSubscription, NavigationEvent, PageLifecycle};

/// One driven browser page
#[derive(Debug, Clone)]
pub struct BrowserSession {
    id: String,
    driver: Arc<dyn DomDriver>,
    lifecycle: PageLifecycle,
    signal_strategy: Arc<dyn SignalStrategy>,
    config: Arc<Config>,
}

impl BrowserSession {
    /// Session over an existing driver; navigations are announced by
    /// [`navigate`](Self::navigate) and [`reload`](Self::reload)
    pub fn new(driver: Arc<dyn DomDriver>, config: Config) -> Self {
        let signal_strategy = Arc::new(DomMarkerSignal::new(config.markup.signal_container.clone()));
        Self {
            id: Uuid::new_v4().to_string(),
            driver,
            lifecycle: PageLifecycle::new(),
            signal_strategy,
            config: Arc::new(config),
        }
    }

    /// Connect to a page over CDP and follow its load events
    pub async fn connect(config: Config) -> Result<Self> {
        let driver = CdpDomDriver::connect(&config).await?;
        let events = driver.connection().listen_events().await?;
        let session = Self::new(Arc::new(driver), config);
        session.lifecycle.forward_cdp_events(events);
        info!("Browser session {} connected", session.id);
        Ok(session)
    }

    /// Replace the completion marker protocol
    pub fn with_signal_strategy(mut self, strategy: Arc<dyn SignalStrategy>) -> Self {
        self.signal_strategy = strategy;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn driver(&self) -> &Arc<dyn DomDriver> {
        &self.driver
    }

    pub fn lifecycle(&self) -> &PageLifecycle {
        &self.lifecycle
    }

    pub fn config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    /// Document-scoped handle using the configured timeouts
    pub fn handle(&self, locator: Locator) -> ElementHandle {
        ElementHandle::new(
            Arc::clone(&self.driver),
            locator,
            self.config.element_timeout(),
            self.config.poll_interval(),
        )
    }

    /// Fresh signal waiter sharing this session's driver and strategy
    pub fn completion_signal(&self) -> CompletionSignal {
        CompletionSignal::new(
            Arc::clone(&self.driver),
            Arc::clone(&self.signal_strategy),
            self.config.poll_interval(),
        )
    }

    /// Open a data region on the current page
    pub fn open_table(&self, target: impl Into<RegionTarget>) -> Result<DataRegionTable> {
        DataRegionTable::open(self, target)
    }

    /// Load `url` and announce the navigation to open tables
    #[instrument(skip(self))]
    pub async fn navigate(&self, url: &str) -> Result<()> {
        let before = self.lifecycle.sequence();
        self.driver.navigate(url).await?;
        self.settle_navigation(before, Some(url.to_string())).await
    }

    /// Reload the current page and announce the navigation to open tables
    #[instrument(skip(self))]
    pub async fn reload(&self) -> Result<()> {
        let before = self.lifecycle.sequence();
        self.driver.reload().await?;
        self.settle_navigation(before, None).await
    }

    async fn settle_navigation(&self, before: u64, url: Option<String>) -> Result<()> {
        if !self.lifecycle.is_event_driven() {
            self.lifecycle.notify_navigation(url);
            return Ok(());
        }

        let announced = self
            .lifecycle
            .wait_past(before, self.config.navigation_timeout(), self.config.poll_interval())
            .await?;
        if !announced {
            warn!("No load event after navigation, announcing it directly");
            self.lifecycle.notify_navigation(url);
        }
        Ok(())
    }
}
