use bytes::Bytes;
use keel_server::HttpHandler;
use std::collections::HashMap;
use std::rc::Rc;

/// One path segment in the wildcard routing tree.
///
/// Children are keyed by segment; the reserved keys `*` and `**` hold the
/// single-segment and rest-of-path placeholders. Each node carries its own
/// method table.
#[derive(Default)]
pub(crate) struct RoutingNode {
    handlers: HashMap<Bytes, Rc<dyn HttpHandler>>,
    children: HashMap<Bytes, Box<RoutingNode>>,
}

impl RoutingNode {
    pub(crate) fn set_handler(&mut self, method: impl Into<Bytes>, handler: Rc<dyn HttpHandler>) {
        self.handlers.insert(method.into(), handler);
    }

    pub(crate) fn remove_handler(&mut self, method: &[u8]) {
        self.handlers.retain(|m, _| m.as_ref() != method);
    }

    pub(crate) fn handler(&self, method: &[u8]) -> Option<Rc<dyn HttpHandler>> {
        self.handlers.get(method).cloned()
    }

    /// Walk down literal segments, creating nodes as needed (for route
    /// registration; `*` and `**` are plain keys here).
    pub(crate) fn find_or_create(&mut self, fragments: &[Bytes]) -> &mut RoutingNode {
        let mut node = self;
        for fragment in fragments {
            node = node
                .children
                .entry(fragment.clone())
                .or_default();
        }
        node
    }

    /// Walk down exact segments without creating (for route removal).
    pub(crate) fn find_exact(&mut self, fragments: &[Bytes]) -> Option<&mut RoutingNode> {
        let mut node = self;
        for fragment in fragments {
            node = node.children.get_mut(fragment.as_ref() as &[u8])?;
        }
        Some(node)
    }

    /// Match a request path against the tree.
    ///
    /// At every level: a literal child wins, then `*` (one segment), then
    /// `**` (terminal, consumes the rest). Dead ends backtrack, so
    /// `/a/c/d` still reaches `/a/**` when `/a/*` exists but has no
    /// matching continuation.
    pub(crate) fn find(&self, fragments: &[Bytes]) -> Option<&RoutingNode> {
        let Some((head, rest)) = fragments.split_first() else {
            return Some(self);
        };
        if let Some(child) = self.children.get(head.as_ref() as &[u8]) {
            if let Some(found) = child.find(rest) {
                return Some(found);
            }
        }
        if let Some(star) = self.children.get(b"*".as_slice()) {
            if let Some(found) = star.find(rest) {
                return Some(found);
            }
        }
        self.children
            .get(b"**".as_slice())
            .map(|rest_node| rest_node.as_ref())
    }
}
