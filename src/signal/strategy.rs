//! How completion markers are detected in the page

use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use tracing::debug;

use crate::driver::{css_quote, DomDriver, Locator};
use crate::Result;

/// Page-side marker protocol
///
/// `arm` clears leftovers before the trigger runs, `is_signalled` is polled
/// afterwards and `consume` clears the marker once seen.
#[async_trait]
pub trait SignalStrategy: Send + Sync + fmt::Debug {
    async fn arm(&self, driver: &dyn DomDriver, signal: &str) -> Result<()>;

    async fn is_signalled(&self, driver: &dyn DomDriver, signal: &str) -> Result<bool>;

    async fn consume(&self, driver: &dyn DomDriver, signal: &str) -> Result<()>;
}

/// Hidden `<input name="<signal>">` elements inside a container
#[derive(Debug, Clone)]
pub struct DomMarkerSignal {
    container: String,
}

impl DomMarkerSignal {
    pub fn new<S: Into<String>>(container: S) -> Self {
        Self {
            container: container.into(),
        }
    }

    fn locator(&self, signal: &str) -> Locator {
        Locator::css(format!("{} input[name={}]", self.container, css_quote(signal)))
    }

    async fn clear(&self, driver: &dyn DomDriver, signal: &str) -> Result<usize> {
        let markers = driver.find_elements(None, &self.locator(signal)).await?;
        let mut removed = 0;
        for marker in &markers {
            match driver.remove(marker).await {
                Ok(()) => removed += 1,
                // already replaced by the page
                Err(e) if e.is_stale() => {}
                Err(e) => return Err(e),
            }
        }
        Ok(removed)
    }
}

impl Default for DomMarkerSignal {
    fn default() -> Self {
        Self::new("#testSignals")
    }
}

#[async_trait]
impl SignalStrategy for DomMarkerSignal {
    async fn arm(&self, driver: &dyn DomDriver, signal: &str) -> Result<()> {
        let removed = self.clear(driver, signal).await?;
        if removed > 0 {
            debug!("Cleared {} leftover '{}' markers", removed, signal);
        }
        Ok(())
    }

    async fn is_signalled(&self, driver: &dyn DomDriver, signal: &str) -> Result<bool> {
        Ok(!driver.find_elements(None, &self.locator(signal)).await?.is_empty())
    }

    async fn consume(&self, driver: &dyn DomDriver, signal: &str) -> Result<()> {
        self.clear(driver, signal).await.map(|_| ())
    }
}

/// Flags in the page global `window.__regionSignals`
#[derive(Debug, Clone, Default)]
pub struct ScriptFlagSignal;

impl ScriptFlagSignal {
    fn reset_script(signal: &str) -> String {
        format!(
            "(() => {{ const s = window.__regionSignals || (window.__regionSignals = {{}}); delete s[{}]; return true; }})()",
            Value::String(signal.to_string())
        )
    }

    fn probe_script(signal: &str) -> String {
        format!(
            "!!(window.__regionSignals && window.__regionSignals[{}])",
            Value::String(signal.to_string())
        )
    }
}

#[async_trait]
impl SignalStrategy for ScriptFlagSignal {
    async fn arm(&self, driver: &dyn DomDriver, signal: &str) -> Result<()> {
        driver.evaluate(&Self::reset_script(signal)).await?;
        Ok(())
    }

    async fn is_signalled(&self, driver: &dyn DomDriver, signal: &str) -> Result<bool> {
        let value = driver.evaluate(&Self::probe_script(signal)).await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn consume(&self, driver: &dyn DomDriver, signal: &str) -> Result<()> {
        self.arm(driver, signal).await
    }
}
