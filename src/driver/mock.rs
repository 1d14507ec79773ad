//! In-memory DOM driver for testing
//!
//! `MockDom` models just enough of a document to exercise the element handle,
//! completion signal and data region code: a node tree with tags, attributes,
//! text and checked state, a CSS subset (type, `.class`, `#id`, `[attr]`,
//! `[attr='v']`, descendant combinator, selector lists), click handlers that
//! stand in for page scripts, and click interception.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use super::traits::{DomDriver, Locator, NodeRef};
use crate::{Error, Result};

/// Page script run when a node is clicked
pub type ClickHandler = Arc<dyn Fn(&MockDom, &NodeRef) + Send + Sync>;
/// Page script run on navigation or reload, receives the URL
pub type NavigateHandler = Arc<dyn Fn(&MockDom, &str) + Send + Sync>;
/// Page activity after a text read, receives the node and the read count
pub type TextReadHandler = Arc<dyn Fn(&MockDom, &NodeRef, usize) + Send + Sync>;
type EvaluateHandler = Arc<dyn Fn(&str) -> Result<Value> + Send + Sync>;

/// Element description used to build subtrees
#[derive(Debug, Clone, Default)]
pub struct El {
    tag: String,
    attributes: Vec<(String, String)>,
    text: String,
    checked: bool,
    children: Vec<El>,
}

impl El {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            ..Self::default()
        }
    }

    pub fn attr(mut self, name: &str, value: impl Into<String>) -> Self {
        self.attributes.push((name.to_string(), value.into()));
        self
    }

    pub fn class(self, class: &str) -> Self {
        self.attr("class", class)
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn checked(mut self, checked: bool) -> Self {
        self.checked = checked;
        self
    }

    pub fn child(mut self, child: El) -> Self {
        self.children.push(child);
        self
    }

    pub fn children<I: IntoIterator<Item = El>>(mut self, children: I) -> Self {
        self.children.extend(children);
        self
    }
}

#[derive(Debug, Clone)]
struct MockNode {
    tag: String,
    attributes: BTreeMap<String, String>,
    text: String,
    checked: bool,
    parent: Option<u64>,
    children: Vec<u64>,
}

impl MockNode {
    fn has_class(&self, class: &str) -> bool {
        self.attributes
            .get("class")
            .map(|c| c.split_whitespace().any(|c| c == class))
            .unwrap_or(false)
    }
}

#[derive(Default)]
struct Tree {
    nodes: HashMap<u64, MockNode>,
    document: u64,
    body: u64,
    next_id: u64,
    url: String,
    click_handlers: HashMap<u64, ClickHandler>,
    intercepts: HashMap<u64, usize>,
    navigate_handler: Option<NavigateHandler>,
    evaluate_handler: Option<EvaluateHandler>,
    text_read_handler: Option<TextReadHandler>,
    text_reads: usize,
    clicks: usize,
    scrolls: Vec<NodeRef>,
}

impl Tree {
    fn new() -> Self {
        let mut tree = Tree::default();
        tree.document = tree.insert_node(None, "html", Vec::new(), String::new(), false);
        tree.body = tree.insert_node(Some(tree.document), "body", Vec::new(), String::new(), false);
        tree
    }

    fn insert_node(
        &mut self,
        parent: Option<u64>,
        tag: &str,
        attributes: Vec<(String, String)>,
        text: String,
        checked: bool,
    ) -> u64 {
        self.next_id += 1;
        let id = self.next_id;
        self.nodes.insert(
            id,
            MockNode {
                tag: tag.to_string(),
                attributes: attributes.into_iter().collect(),
                text,
                checked,
                parent,
                children: Vec::new(),
            },
        );
        if let Some(parent) = parent.and_then(|p| self.nodes.get_mut(&p)) {
            parent.children.push(id);
        }
        id
    }

    fn build(&mut self, parent: u64, el: El) -> u64 {
        let id = self.insert_node(Some(parent), &el.tag, el.attributes, el.text, el.checked);
        for child in el.children {
            self.build(id, child);
        }
        id
    }

    fn id_of(&self, node: &NodeRef) -> Result<u64> {
        node.as_str()
            .strip_prefix('m')
            .and_then(|n| n.parse().ok())
            .filter(|id| self.nodes.contains_key(id))
            .ok_or_else(|| Error::driver(format!("unknown node {}", node)))
    }

    fn is_attached(&self, id: u64) -> bool {
        let mut current = id;
        loop {
            if current == self.document {
                return true;
            }
            match self.nodes.get(&current).and_then(|n| n.parent) {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }

    /// Resolve a node that must still be in the document
    fn live(&self, node: &NodeRef) -> Result<u64> {
        let id = self.id_of(node)?;
        if self.is_attached(id) {
            Ok(id)
        } else {
            Err(Error::stale(format!("{} is detached", node)))
        }
    }

    fn node(&self, id: u64) -> &MockNode {
        &self.nodes[&id]
    }

    fn detach(&mut self, id: u64) {
        if let Some(parent) = self.nodes.get(&id).and_then(|n| n.parent) {
            if let Some(p) = self.nodes.get_mut(&parent) {
                p.children.retain(|c| *c != id);
            }
        }
        if let Some(n) = self.nodes.get_mut(&id) {
            n.parent = None;
        }
    }

    fn text_content(&self, id: u64) -> String {
        let node = self.node(id);
        let mut text = node.text.clone();
        for child in &node.children {
            text.push_str(&self.text_content(*child));
        }
        text
    }

    fn descendants(&self, id: u64, out: &mut Vec<u64>) {
        for child in &self.node(id).children {
            out.push(*child);
            self.descendants(*child, out);
        }
    }

    fn select(&self, scope: u64, selector: &str) -> Result<Vec<u64>> {
        let groups = parse_selector_list(selector)?;
        let mut candidates = Vec::new();
        self.descendants(scope, &mut candidates);
        Ok(candidates
            .into_iter()
            .filter(|id| groups.iter().any(|g| self.matches_complex(*id, g)))
            .collect())
    }

    fn matches_complex(&self, id: u64, compounds: &[Compound]) -> bool {
        let Some((last, rest)) = compounds.split_last() else {
            return false;
        };
        if !self.matches_compound(id, last) {
            return false;
        }
        if rest.is_empty() {
            return true;
        }
        let mut ancestor = self.node(id).parent;
        while let Some(a) = ancestor {
            if self.matches_complex(a, rest) {
                return true;
            }
            ancestor = self.node(a).parent;
        }
        false
    }

    fn matches_compound(&self, id: u64, compound: &Compound) -> bool {
        let node = self.node(id);
        if let Some(tag) = &compound.tag {
            if tag != "*" && *tag != node.tag {
                return false;
            }
        }
        if let Some(wanted) = &compound.id {
            if node.attributes.get("id") != Some(wanted) {
                return false;
            }
        }
        if !compound.classes.iter().all(|c| node.has_class(c)) {
            return false;
        }
        compound.attributes.iter().all(|(name, value)| match (node.attributes.get(name), value) {
            (Some(_), None) => true,
            (Some(actual), Some(expected)) => actual == expected,
            (None, _) => false,
        })
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attributes: Vec<(String, Option<String>)>,
}

/// Split on `sep` outside brackets and quotes
fn split_top_level(input: &str, is_sep: impl Fn(char) -> bool) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for ch in input.chars() {
        if escaped {
            current.push(ch);
            escaped = false;
            continue;
        }
        match ch {
            '\\' => {
                current.push(ch);
                escaped = true;
            }
            '\'' | '"' if quote == Some(ch) => {
                quote = None;
                current.push(ch);
            }
            '\'' | '"' if quote.is_none() => {
                quote = Some(ch);
                current.push(ch);
            }
            '[' if quote.is_none() => {
                depth += 1;
                current.push(ch);
            }
            ']' if quote.is_none() => {
                depth = depth.saturating_sub(1);
                current.push(ch);
            }
            c if quote.is_none() && depth == 0 && is_sep(c) => {
                if !current.trim().is_empty() {
                    parts.push(current.trim().to_string());
                }
                current.clear();
            }
            c => current.push(c),
        }
    }
    if !current.trim().is_empty() {
        parts.push(current.trim().to_string());
    }
    parts
}

fn parse_selector_list(selector: &str) -> Result<Vec<Vec<Compound>>> {
    let groups = split_top_level(selector, |c| c == ',');
    if groups.is_empty() {
        return Err(Error::driver(format!("empty selector '{}'", selector)));
    }
    groups
        .iter()
        .map(|group| {
            split_top_level(group, char::is_whitespace)
                .iter()
                .map(|c| parse_compound(c))
                .collect()
        })
        .collect()
}

fn parse_compound(input: &str) -> Result<Compound> {
    let unsupported = || Error::driver(format!("MockDom cannot parse selector '{}'", input));
    let chars: Vec<char> = input.chars().collect();
    let mut compound = Compound::default();
    let mut i = 0;

    let ident = |i: &mut usize| {
        let start = *i;
        while *i < chars.len() && (chars[*i].is_alphanumeric() || matches!(chars[*i], '-' | '_' | '*')) {
            *i += 1;
        }
        chars[start..*i].iter().collect::<String>()
    };

    if i < chars.len() && (chars[i].is_alphabetic() || chars[i] == '*') {
        compound.tag = Some(ident(&mut i).to_ascii_lowercase());
    }

    while i < chars.len() {
        match chars[i] {
            '.' => {
                i += 1;
                let class = ident(&mut i);
                if class.is_empty() {
                    return Err(unsupported());
                }
                compound.classes.push(class);
            }
            '#' => {
                i += 1;
                compound.id = Some(ident(&mut i));
            }
            '[' => {
                i += 1;
                let name = ident(&mut i);
                if name.is_empty() || i >= chars.len() {
                    return Err(unsupported());
                }
                let value = if chars[i] == '=' {
                    i += 1;
                    let quote = chars.get(i).copied().filter(|c| *c == '\'' || *c == '"');
                    let mut value = String::new();
                    if let Some(q) = quote {
                        i += 1;
                        while i < chars.len() && chars[i] != q {
                            if chars[i] == '\\' && i + 1 < chars.len() {
                                i += 1;
                            }
                            value.push(chars[i]);
                            i += 1;
                        }
                        i += 1;
                    } else {
                        while i < chars.len() && chars[i] != ']' {
                            value.push(chars[i]);
                            i += 1;
                        }
                    }
                    Some(value)
                } else {
                    None
                };
                if chars.get(i) != Some(&']') {
                    return Err(unsupported());
                }
                i += 1;
                compound.attributes.push((name, value));
            }
            _ => return Err(unsupported()),
        }
    }

    Ok(compound)
}

/// In-memory document implementing [`DomDriver`]
///
/// Cloning yields another handle to the same document.
#[derive(Clone)]
pub struct MockDom {
    tree: Arc<Mutex<Tree>>,
}

impl std::fmt::Debug for MockDom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockDom").finish_non_exhaustive()
    }
}

impl Default for MockDom {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDom {
    /// Empty document with `html > body`
    pub fn new() -> Self {
        Self {
            tree: Arc::new(Mutex::new(Tree::new())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Tree> {
        // A panicking page script in a test must not wedge every later call.
        self.tree.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn node_ref(id: u64) -> NodeRef {
        NodeRef::new(format!("m{}", id))
    }

    pub fn body(&self) -> NodeRef {
        Self::node_ref(self.lock().body)
    }

    /// Append a subtree under `parent`
    pub fn append(&self, parent: &NodeRef, el: El) -> Result<NodeRef> {
        let mut tree = self.lock();
        let parent = tree.live(parent)?;
        Ok(Self::node_ref(tree.build(parent, el)))
    }

    /// Put a new subtree where `old` was and detach `old`
    pub fn replace(&self, old: &NodeRef, el: El) -> Result<NodeRef> {
        let mut tree = self.lock();
        let old_id = tree.live(old)?;
        let parent = tree
            .node(old_id)
            .parent
            .ok_or_else(|| Error::driver("cannot replace the document"))?;
        let position = tree.node(parent).children.iter().position(|c| *c == old_id);

        let new_id = tree.build(parent, el);
        if let Some(position) = position {
            if let Some(p) = tree.nodes.get_mut(&parent) {
                p.children.retain(|c| *c != new_id);
                p.children.insert(position, new_id);
            }
        }
        tree.detach(old_id);
        Ok(Self::node_ref(new_id))
    }

    /// Detach a node (and its subtree) from the document
    pub fn detach(&self, node: &NodeRef) -> Result<()> {
        let mut tree = self.lock();
        let id = tree.id_of(node)?;
        tree.detach(id);
        Ok(())
    }

    /// Replace the whole body content
    pub fn clear_body(&self) {
        let mut tree = self.lock();
        let body = tree.body;
        let children = tree.node(body).children.clone();
        for child in children {
            tree.detach(child);
        }
    }

    pub fn set_text(&self, node: &NodeRef, text: &str) -> Result<()> {
        let mut tree = self.lock();
        let id = tree.id_of(node)?;
        if let Some(n) = tree.nodes.get_mut(&id) {
            n.text = text.to_string();
        }
        Ok(())
    }

    pub fn set_attr(&self, node: &NodeRef, name: &str, value: &str) -> Result<()> {
        let mut tree = self.lock();
        let id = tree.id_of(node)?;
        if let Some(n) = tree.nodes.get_mut(&id) {
            n.attributes.insert(name.to_string(), value.to_string());
        }
        Ok(())
    }

    pub fn set_checked(&self, node: &NodeRef, checked: bool) -> Result<()> {
        let mut tree = self.lock();
        let id = tree.id_of(node)?;
        if let Some(n) = tree.nodes.get_mut(&id) {
            n.checked = checked;
        }
        Ok(())
    }

    /// Synchronous `querySelectorAll` on the document
    pub fn select(&self, selector: &str) -> Result<Vec<NodeRef>> {
        let tree = self.lock();
        let document = tree.document;
        Ok(tree.select(document, selector)?.into_iter().map(Self::node_ref).collect())
    }

    /// Synchronous `querySelectorAll` below `scope`
    pub fn select_within(&self, scope: &NodeRef, selector: &str) -> Result<Vec<NodeRef>> {
        let tree = self.lock();
        let scope = tree.live(scope)?;
        Ok(tree.select(scope, selector)?.into_iter().map(Self::node_ref).collect())
    }

    pub fn attr_of(&self, node: &NodeRef, name: &str) -> Option<String> {
        let tree = self.lock();
        let id = tree.id_of(node).ok()?;
        tree.node(id).attributes.get(name).cloned()
    }

    pub fn text_of(&self, node: &NodeRef) -> Option<String> {
        let tree = self.lock();
        let id = tree.id_of(node).ok()?;
        Some(tree.text_content(id).trim().to_string())
    }

    pub fn checked_of(&self, node: &NodeRef) -> bool {
        let tree = self.lock();
        tree.id_of(node).map(|id| tree.node(id).checked).unwrap_or(false)
    }

    /// Nearest ancestor (or the node itself) carrying `attribute`
    pub fn closest_with_attr(&self, node: &NodeRef, attribute: &str) -> Option<NodeRef> {
        let tree = self.lock();
        let mut current = tree.id_of(node).ok();
        while let Some(id) = current {
            if tree.node(id).attributes.contains_key(attribute) {
                return Some(Self::node_ref(id));
            }
            current = tree.node(id).parent;
        }
        None
    }

    pub fn attached(&self, node: &NodeRef) -> bool {
        let tree = self.lock();
        tree.id_of(node).map(|id| tree.is_attached(id)).unwrap_or(false)
    }

    /// Run `handler` after each click on `node`
    pub fn on_click<F>(&self, node: &NodeRef, handler: F) -> Result<()>
    where
        F: Fn(&MockDom, &NodeRef) + Send + Sync + 'static,
    {
        let mut tree = self.lock();
        let id = tree.id_of(node)?;
        tree.click_handlers.insert(id, Arc::new(handler));
        Ok(())
    }

    /// Make the next `times` clicks on `node` land on an overlapping element
    pub fn intercept_clicks(&self, node: &NodeRef, times: usize) -> Result<()> {
        let mut tree = self.lock();
        let id = tree.id_of(node)?;
        tree.intercepts.insert(id, times);
        Ok(())
    }

    pub fn on_navigate<F>(&self, handler: F)
    where
        F: Fn(&MockDom, &str) + Send + Sync + 'static,
    {
        self.lock().navigate_handler = Some(Arc::new(handler));
    }

    pub fn on_evaluate<F>(&self, handler: F)
    where
        F: Fn(&str) -> Result<Value> + Send + Sync + 'static,
    {
        self.lock().evaluate_handler = Some(Arc::new(handler));
    }

    /// Run `handler` after every text read, once the value has been taken
    pub fn on_text_read<F>(&self, handler: F)
    where
        F: Fn(&MockDom, &NodeRef, usize) + Send + Sync + 'static,
    {
        self.lock().text_read_handler = Some(Arc::new(handler));
    }

    pub fn url(&self) -> String {
        self.lock().url.clone()
    }

    /// Number of `text()` calls served so far
    pub fn text_reads(&self) -> usize {
        self.lock().text_reads
    }

    /// Number of clicks that reached their target
    pub fn clicks(&self) -> usize {
        self.lock().clicks
    }

    /// Nodes scrolled into view, in order
    pub fn scrolls(&self) -> Vec<NodeRef> {
        self.lock().scrolls.clone()
    }

    fn css(locator: &Locator) -> Result<&str> {
        match locator {
            Locator::Css(s) => Ok(s),
            Locator::XPath(_) => Err(Error::driver("MockDom supports CSS locators only")),
        }
    }

    fn load(&self, url: &str) {
        let handler = {
            let mut tree = self.lock();
            tree.url = url.to_string();
            tree.navigate_handler.clone()
        };
        self.clear_body();
        if let Some(handler) = handler {
            handler(self, url);
        }
    }
}

#[async_trait]
impl DomDriver for MockDom {
    async fn find_elements(&self, scope: Option<&NodeRef>, locator: &Locator) -> Result<Vec<NodeRef>> {
        let selector = Self::css(locator)?;
        let tree = self.lock();
        let scope = match scope {
            Some(node) => tree.live(node)?,
            None => tree.document,
        };
        Ok(tree.select(scope, selector)?.into_iter().map(Self::node_ref).collect())
    }

    async fn is_attached(&self, node: &NodeRef) -> Result<bool> {
        let tree = self.lock();
        let id = tree.id_of(node)?;
        Ok(tree.is_attached(id))
    }

    async fn text(&self, node: &NodeRef) -> Result<String> {
        let (text, reads, handler) = {
            let mut tree = self.lock();
            let id = tree.live(node)?;
            tree.text_reads += 1;
            let text = tree.text_content(id).trim().to_string();
            (text, tree.text_reads, tree.text_read_handler.clone())
        };

        if let Some(handler) = handler {
            handler(self, node, reads);
        }
        Ok(text)
    }

    async fn attribute(&self, node: &NodeRef, name: &str) -> Result<Option<String>> {
        let tree = self.lock();
        let id = tree.live(node)?;
        Ok(tree.node(id).attributes.get(name).cloned())
    }

    async fn is_checked(&self, node: &NodeRef) -> Result<bool> {
        let tree = self.lock();
        let id = tree.live(node)?;
        Ok(tree.node(id).checked)
    }

    async fn click(&self, node: &NodeRef) -> Result<()> {
        let handler = {
            let mut tree = self.lock();
            let id = tree.live(node)?;

            if let Some(remaining) = tree.intercepts.get_mut(&id) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(Error::click_intercepted(format!("{} obscured by div.floating-header", node)));
                }
            }

            tree.clicks += 1;
            if let Some(n) = tree.nodes.get_mut(&id) {
                let is_checkbox = n.tag == "input" && n.attributes.get("type").map(String::as_str) == Some("checkbox");
                if is_checkbox {
                    n.checked = !n.checked;
                }
            }
            tree.click_handlers.get(&id).cloned()
        };

        if let Some(handler) = handler {
            handler(self, node);
        }
        Ok(())
    }

    async fn set_value(&self, node: &NodeRef, value: &str) -> Result<()> {
        let mut tree = self.lock();
        let id = tree.live(node)?;
        if let Some(n) = tree.nodes.get_mut(&id) {
            n.attributes.insert("value".to_string(), value.to_string());
        }
        Ok(())
    }

    async fn scroll_into_view(&self, node: &NodeRef) -> Result<()> {
        let mut tree = self.lock();
        tree.live(node)?;
        tree.scrolls.push(node.clone());
        Ok(())
    }

    async fn remove(&self, node: &NodeRef) -> Result<()> {
        let mut tree = self.lock();
        let id = tree.live(node)?;
        tree.detach(id);
        Ok(())
    }

    async fn evaluate(&self, script: &str) -> Result<Value> {
        let handler = self.lock().evaluate_handler.clone();
        match handler {
            Some(handler) => handler(script),
            None => Err(Error::driver("MockDom has no evaluate handler")),
        }
    }

    async fn navigate(&self, url: &str) -> Result<()> {
        self.load(url);
        Ok(())
    }

    async fn reload(&self) -> Result<()> {
        let url = self.url();
        self.load(&url);
        Ok(())
    }
}
