//! DOM driver backed by a CDP connection
//!
//! Every operation is a single `Runtime.evaluate` call built from
//! [`super::scripts`].

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument};

use super::scripts::{self, node_script};
use super::traits::{DomDriver, Locator, NodeRef};
use crate::cdp::types::{EvaluateParams, EvaluateResponse, NavigateParams};
use crate::cdp::{CdpConnection, CdpTimeoutConfig, CdpWebSocketConnection};
use crate::config::Config;
use crate::wait::await_condition;
use crate::{Error, Result};

/// Reply object every driver script returns
#[derive(Debug, Default, Deserialize)]
struct ScriptReply {
    #[serde(default)]
    stale: bool,
    #[serde(default)]
    intercepted: Option<String>,
    #[serde(default)]
    ids: Option<Vec<String>>,
    #[serde(default)]
    value: Value,
}

/// CDP-backed DOM driver
#[derive(Debug, Clone)]
pub struct CdpDomDriver {
    connection: Arc<dyn CdpConnection>,
    navigation_timeout: Duration,
    poll_interval: Duration,
}

impl CdpDomDriver {
    /// Wrap an existing connection
    pub fn new(connection: Arc<dyn CdpConnection>, navigation_timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            connection,
            navigation_timeout,
            poll_interval,
        }
    }

    /// Connect to the page target named by `config.cdp_endpoint`
    pub async fn connect(config: &Config) -> Result<Self> {
        let timeouts = CdpTimeoutConfig {
            navigation_timeout: config.navigation_timeout(),
            ..CdpTimeoutConfig::default()
        };
        let connection = CdpWebSocketConnection::connect(config.cdp_endpoint.clone(), timeouts).await?;
        let driver = Self::new(connection, config.navigation_timeout(), config.poll_interval());
        driver.connection.call_method("Page.enable", json!({})).await?;
        info!("CDP DOM driver ready on {}", config.cdp_endpoint);
        Ok(driver)
    }

    /// Underlying connection, used to forward page events
    pub fn connection(&self) -> Arc<dyn CdpConnection> {
        Arc::clone(&self.connection)
    }

    async fn evaluate_raw(&self, expression: String) -> Result<Value> {
        let params = serde_json::to_value(EvaluateParams::by_value(expression))?;
        let result = self.connection.call_method("Runtime.evaluate", params).await?;
        let response: EvaluateResponse = serde_json::from_value(result)?;

        if let Some(details) = response.exception_details {
            return Err(Error::driver(format!("Script threw: {}", details.describe())));
        }

        Ok(response.result.value.unwrap_or(Value::Null))
    }

    async fn run(&self, script: String, subject: &str) -> Result<ScriptReply> {
        let value = self.evaluate_raw(script).await?;
        let reply: ScriptReply = serde_json::from_value(value)
            .map_err(|e| Error::driver(format!("Malformed reply for {}: {}", subject, e)))?;

        if reply.stale {
            return Err(Error::stale(subject.to_string()));
        }
        if let Some(target) = reply.intercepted {
            return Err(Error::click_intercepted(format!("{} obscured by {}", subject, target)));
        }
        Ok(reply)
    }

    async fn on_node(&self, node: &NodeRef, body: &str, arg: Value) -> Result<Value> {
        let reply = self.run(node_script(node, body, &arg), node.as_str()).await?;
        Ok(reply.value)
    }

    async fn wait_for_load(&self) -> Result<()> {
        let loaded = await_condition(
            || async move {
                let state = self.evaluate_raw(scripts::READY_STATE_SCRIPT.to_string()).await?;
                Ok(state.as_str() == Some("complete"))
            },
            self.navigation_timeout,
            self.poll_interval,
        )
        .await?;

        if loaded {
            Ok(())
        } else {
            Err(Error::timeout(format!(
                "document did not finish loading within {:?}",
                self.navigation_timeout
            )))
        }
    }
}

#[async_trait]
impl DomDriver for CdpDomDriver {
    #[instrument(skip(self))]
    async fn find_elements(&self, scope: Option<&NodeRef>, locator: &Locator) -> Result<Vec<NodeRef>> {
        let subject = scope.map(|n| n.as_str()).unwrap_or("document");
        let reply = self.run(scripts::find_script(scope, locator), subject).await?;
        let ids = reply
            .ids
            .ok_or_else(|| Error::driver(format!("find {} returned no ids", locator)))?;
        debug!("{} matched {} nodes", locator, ids.len());
        Ok(ids.into_iter().map(NodeRef::new).collect())
    }

    async fn is_attached(&self, node: &NodeRef) -> Result<bool> {
        match self.on_node(node, scripts::ATTACHED_BODY, Value::Null).await {
            Ok(_) => Ok(true),
            Err(Error::StaleElement(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn text(&self, node: &NodeRef) -> Result<String> {
        let value = self.on_node(node, scripts::TEXT_BODY, Value::Null).await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn attribute(&self, node: &NodeRef, name: &str) -> Result<Option<String>> {
        let value = self
            .on_node(node, scripts::ATTRIBUTE_BODY, Value::String(name.to_string()))
            .await?;
        Ok(value.as_str().map(str::to_string))
    }

    async fn is_checked(&self, node: &NodeRef) -> Result<bool> {
        let value = self.on_node(node, scripts::CHECKED_BODY, Value::Null).await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    #[instrument(skip(self))]
    async fn click(&self, node: &NodeRef) -> Result<()> {
        self.on_node(node, scripts::CLICK_BODY, Value::Null).await?;
        Ok(())
    }

    async fn set_value(&self, node: &NodeRef, value: &str) -> Result<()> {
        self.on_node(node, scripts::SET_VALUE_BODY, Value::String(value.to_string()))
            .await?;
        Ok(())
    }

    async fn scroll_into_view(&self, node: &NodeRef) -> Result<()> {
        self.on_node(node, scripts::SCROLL_BODY, Value::Null).await?;
        Ok(())
    }

    async fn remove(&self, node: &NodeRef) -> Result<()> {
        self.on_node(node, scripts::REMOVE_BODY, Value::Null).await?;
        Ok(())
    }

    async fn evaluate(&self, script: &str) -> Result<Value> {
        self.evaluate_raw(script.to_string()).await
    }

    #[instrument(skip(self))]
    async fn navigate(&self, url: &str) -> Result<()> {
        let params = serde_json::to_value(NavigateParams { url: url.to_string() })?;
        let result = self.connection.call_method("Page.navigate", params).await?;

        if let Some(error) = result.get("errorText").and_then(|v| v.as_str()) {
            return Err(Error::driver(format!("Navigation to {} failed: {}", url, error)));
        }

        self.wait_for_load().await
    }

    async fn reload(&self) -> Result<()> {
        self.connection.call_method("Page.reload", json!({})).await?;
        self.wait_for_load().await
    }
}
