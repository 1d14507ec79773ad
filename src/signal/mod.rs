//! # Completion signals
//!
//! A mutating UI action updates the page asynchronously. The page flips a
//! named one-shot marker when it is done; [`CompletionSignal::await_signal`]
//! arms the marker, runs the action and polls until the marker shows up.

pub mod strategy;

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use crate::driver::DomDriver;
use crate::wait::await_condition;
use crate::{Error, Result};

pub use strategy::{DomMarkerSignal, ScriptFlagSignal, SignalStrategy};

/// Signal name for data updates of a region (sort, filter, paging, insert, delete)
pub fn update_signal(region: &str) -> String {
    format!("update-{}", region)
}

/// Signal name for selection changes of a region
pub fn selection_signal(region: &str) -> String {
    format!("select-{}", region)
}

/// Waits for page-side completion markers
#[derive(Debug)]
pub struct CompletionSignal {
    driver: Arc<dyn DomDriver>,
    strategy: Arc<dyn SignalStrategy>,
    poll_interval: Duration,
    waits: AtomicU64,
}

impl CompletionSignal {
    pub fn new(driver: Arc<dyn DomDriver>, strategy: Arc<dyn SignalStrategy>, poll_interval: Duration) -> Self {
        Self {
            driver,
            strategy,
            poll_interval,
            waits: AtomicU64::new(0),
        }
    }

    /// Number of waits started through this instance
    pub fn waits(&self) -> u64 {
        self.waits.load(Ordering::SeqCst)
    }

    /// Arm `name`, run `trigger`, then wait up to `timeout` for the marker
    ///
    /// The marker is consumed once seen. A trigger error aborts the wait
    /// without polling. If the marker never appears the result is
    /// `Error::Timeout`, returned no later than `timeout + poll_interval`.
    #[instrument(skip(self, trigger))]
    pub async fn await_signal<T, F, Fut>(&self, name: &str, timeout: Duration, trigger: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.waits.fetch_add(1, Ordering::SeqCst);
        let driver = self.driver.as_ref();
        let strategy = self.strategy.as_ref();

        strategy.arm(driver, name).await?;
        let value = trigger().await?;

        let seen = await_condition(
            || async move { strategy.is_signalled(driver, name).await },
            timeout,
            self.poll_interval,
        )
        .await?;

        if !seen {
            warn!("Signal '{}' not observed within {:?}", name, timeout);
            return Err(Error::timeout(format!("signal '{}' after {:?}", name, timeout)));
        }

        strategy.consume(driver, name).await?;
        debug!("Signal '{}' consumed", name);
        Ok(value)
    }
}
