//! JavaScript executed by the CDP driver
//!
//! Nodes handed out to Rust live in a page-side registry
//! (`window.__regionOxide`) keyed by a generated id. The registry is created
//! by whichever script first runs in a document and stamps every id with that
//! document's token, so a `NodeRef` from an earlier page never matches a node
//! of the current one. Every script returns a
//! small reply object: `{ stale: true }` when the node is gone,
//! `{ intercepted: "<description>" }` when a click would land elsewhere,
//! otherwise `{ value: ... }` or `{ ids: [...] }`.

use serde_json::Value;
use uuid::Uuid;

use super::traits::{Locator, NodeRef};

/// Registry bootstrap shared by every script
///
/// The fresh document token only takes effect when this script is the first
/// one to run in a document.
fn prelude() -> String {
    format!(
        r#"
    const R = window.__regionOxide || (window.__regionOxide = {{
        doc: {token},
        next: 1,
        nodes: new Map(),
    }});
    const register = (el) => {{
        if (!el.__regionOxideId) {{
            el.__regionOxideId = 'n' + R.doc + '-' + (R.next++);
        }}
        R.nodes.set(el.__regionOxideId, el);
        return el.__regionOxideId;
    }};
"#,
        token = Value::String(Uuid::new_v4().simple().to_string()),
    )
}

/// Body of a node script; `el` and `arg` are in scope
pub const TEXT_BODY: &str = r#"
    return { value: (el.innerText ?? el.textContent ?? '').trim() };
"#;

pub const ATTRIBUTE_BODY: &str = r#"
    return { value: el.getAttribute(arg) };
"#;

pub const CHECKED_BODY: &str = r#"
    return { value: !!el.checked };
"#;

pub const ATTACHED_BODY: &str = r#"
    return { value: true };
"#;

pub const CLICK_BODY: &str = r#"
    const rect = el.getBoundingClientRect();
    const x = rect.left + rect.width / 2;
    const y = rect.top + rect.height / 2;
    const hit = document.elementFromPoint(x, y);
    if (hit && hit !== el && !el.contains(hit)) {
        const cls = typeof hit.className === 'string' && hit.className ? '.' + hit.className.split(/\s+/).join('.') : '';
        return { intercepted: hit.tagName.toLowerCase() + cls };
    }
    el.click();
    return { value: true };
"#;

pub const SET_VALUE_BODY: &str = r#"
    el.focus();
    el.value = arg;
    el.dispatchEvent(new Event('input', { bubbles: true }));
    el.dispatchEvent(new Event('change', { bubbles: true }));
    return { value: true };
"#;

pub const SCROLL_BODY: &str = r#"
    el.scrollIntoView({ block: 'center', inline: 'nearest' });
    return { value: true };
"#;

pub const REMOVE_BODY: &str = r#"
    el.remove();
    R.nodes.delete(el.__regionOxideId);
    return { value: true };
"#;

pub const READY_STATE_SCRIPT: &str = "document.readyState";

/// Wrap `body` so it runs against the registered node `node`
pub fn node_script(node: &NodeRef, body: &str, arg: &Value) -> String {
    format!(
        r#"(() => {{
    {prelude}
    const el = R.nodes.get({id});
    if (!el || !el.isConnected) {{
        return {{ stale: true }};
    }}
    const arg = {arg};
    {body}
}})()"#,
        prelude = prelude(),
        id = Value::String(node.as_str().to_string()),
        arg = arg,
        body = body,
    )
}

/// Script locating every match of `locator` below `scope`
pub fn find_script(scope: Option<&NodeRef>, locator: &Locator) -> String {
    let scope = scope
        .map(|n| Value::String(n.as_str().to_string()))
        .unwrap_or(Value::Null);
    let (kind, selector) = match locator {
        Locator::Css(s) => ("css", s),
        Locator::XPath(s) => ("xpath", s),
    };

    format!(
        r#"(() => {{
    {prelude}
    for (const [id, node] of R.nodes) {{
        if (!node.isConnected) R.nodes.delete(id);
    }}
    const scopeId = {scope};
    let root = document;
    if (scopeId !== null) {{
        root = R.nodes.get(scopeId);
        if (!root || !root.isConnected) {{
            return {{ stale: true }};
        }}
    }}
    const selector = {selector};
    let found = [];
    if ({kind} === 'css') {{
        found = Array.from(root.querySelectorAll(selector));
    }} else {{
        const snapshot = document.evaluate(selector, root, null, XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null);
        for (let i = 0; i < snapshot.snapshotLength; i++) {{
            found.push(snapshot.snapshotItem(i));
        }}
    }}
    return {{ ids: found.map(register) }};
}})()"#,
        prelude = prelude(),
        scope = scope,
        selector = Value::String(selector.clone()),
        kind = Value::String(kind.to_string()),
    )
}
