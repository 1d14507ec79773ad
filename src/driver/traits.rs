//! DOM driver traits
//!
//! The narrow surface the element handle, completion signal and data region
//! code need from a browser.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::Result;

/// Opaque reference to a node in the page
///
/// Only meaningful to the driver that produced it. Any operation on a node
/// that has since been detached from the document fails with
/// [`crate::Error::StaleElement`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeRef(String);

impl NodeRef {
    pub fn new<S: Into<String>>(id: S) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How to find nodes
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Locator {
    /// CSS selector (e.g., "tr.region-row")
    Css(String),
    /// XPath expression
    XPath(String),
}

impl Locator {
    pub fn css<S: Into<String>>(selector: S) -> Self {
        Locator::Css(selector.into())
    }

    pub fn xpath<S: Into<String>>(expression: S) -> Self {
        Locator::XPath(expression.into())
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Css(s) => write!(f, "css={}", s),
            Locator::XPath(s) => write!(f, "xpath={}", s),
        }
    }
}

/// Browser-side DOM operations
///
/// Implementations report detached nodes as `StaleElement` and obscured
/// click targets as `ClickIntercepted`; callers rely on both distinctions.
#[async_trait]
pub trait DomDriver: Send + Sync + fmt::Debug {
    /// All nodes matching `locator` in document order, searched below `scope`
    /// (or the whole document when `scope` is `None`)
    async fn find_elements(&self, scope: Option<&NodeRef>, locator: &Locator) -> Result<Vec<NodeRef>>;

    /// Whether the node is still part of the document
    async fn is_attached(&self, node: &NodeRef) -> Result<bool>;

    /// Trimmed text content
    async fn text(&self, node: &NodeRef) -> Result<String>;

    async fn attribute(&self, node: &NodeRef, name: &str) -> Result<Option<String>>;

    /// Checked state of a checkbox or radio input
    async fn is_checked(&self, node: &NodeRef) -> Result<bool>;

    async fn click(&self, node: &NodeRef) -> Result<()>;

    /// Replace the value of a form control and fire its change events
    async fn set_value(&self, node: &NodeRef, value: &str) -> Result<()>;

    async fn scroll_into_view(&self, node: &NodeRef) -> Result<()>;

    /// Detach the node from the document
    async fn remove(&self, node: &NodeRef) -> Result<()>;

    /// Evaluate a script in the page and return its JSON value
    async fn evaluate(&self, script: &str) -> Result<serde_json::Value>;

    /// Navigate the page and wait for the new document to finish loading
    async fn navigate(&self, url: &str) -> Result<()>;

    /// Reload the current document and wait for it to finish loading
    async fn reload(&self) -> Result<()>;
}

/// Quote a value for use inside a CSS attribute selector
pub fn css_quote(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}
