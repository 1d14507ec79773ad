//! Resolution state of an element handle
//!
//! Staleness is modelled as data: the handle records what it last saw and
//! [`Resolution::transition`] computes the next state from a probe result.

use crate::driver::NodeRef;

/// What a handle currently knows about its node
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Resolution {
    /// Never located
    #[default]
    Unresolved,
    /// Located and, as far as the handle knows, attached
    Resolved(NodeRef),
    /// Located once, since detached; keeps the old reference for diagnostics
    Stale(NodeRef),
    /// The locator did not match within the timeout
    NotFound,
}

/// Outcome of looking at the page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Probe {
    /// The locator matched this node
    Located(NodeRef),
    /// The locator matched nothing
    Missing,
    /// The resolved node is no longer in the document
    Detached,
}

impl Resolution {
    /// Next state after `probe`
    pub fn transition(&self, probe: Probe) -> Resolution {
        match (self, probe) {
            (_, Probe::Located(node)) => Resolution::Resolved(node),
            (Resolution::Resolved(node), Probe::Detached) => Resolution::Stale(node.clone()),
            (Resolution::Stale(node), Probe::Detached) => Resolution::Stale(node.clone()),
            (_, Probe::Detached) => Resolution::Unresolved,
            (Resolution::Stale(node), Probe::Missing) => Resolution::Stale(node.clone()),
            (_, Probe::Missing) => Resolution::NotFound,
        }
    }

    pub fn node(&self) -> Option<&NodeRef> {
        match self {
            Resolution::Resolved(node) => Some(node),
            _ => None,
        }
    }

    pub fn is_stale(&self) -> bool {
        matches!(self, Resolution::Stale(_))
    }
}

/// Event passed to re-resolution listeners
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReResolved {
    /// Node the handle held before it went stale
    pub previous: NodeRef,
    /// Node the handle holds now
    pub current: NodeRef,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n(id: &str) -> NodeRef {
        NodeRef::new(id)
    }

    #[test]
    fn test_locate_from_any_state() {
        for state in [
            Resolution::Unresolved,
            Resolution::Resolved(n("a")),
            Resolution::Stale(n("a")),
            Resolution::NotFound,
        ] {
            assert_eq!(state.transition(Probe::Located(n("b"))), Resolution::Resolved(n("b")));
        }
    }

    #[test]
    fn test_detach_marks_resolved_node_stale() {
        let state = Resolution::Resolved(n("a")).transition(Probe::Detached);
        assert_eq!(state, Resolution::Stale(n("a")));
        assert!(state.is_stale());
        assert!(state.node().is_none());
    }

    #[test]
    fn test_missing_keeps_stale_memory() {
        // a stale handle that cannot be re-located yet stays stale, so the
        // eventual re-resolution still notifies listeners
        let state = Resolution::Stale(n("a")).transition(Probe::Missing);
        assert_eq!(state, Resolution::Stale(n("a")));
        assert_eq!(Resolution::Unresolved.transition(Probe::Missing), Resolution::NotFound);
    }
}
