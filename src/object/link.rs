//! Per-node shared state: parent linkage, cached DOM and namespace declarations.
//!
//! The link lives outside the object's lock so that invalidation can walk from
//! a child up to the root without locking any ancestor object.

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::trace;

use crate::constants::{XML_NS, XML_PREFIX};
use crate::dom::Element;
use crate::error::OwnershipError;
use crate::object::handle::{WeakObjectRef, XmlObjectRef};
use crate::qname::{Namespace, QName};

/// Shared handle to the state of one node in an object tree
#[derive(Clone)]
pub struct NodeLink {
    state: Arc<LinkState>,
}

struct LinkState {
    element_name: QName,
    parent: Mutex<Weak<LinkState>>,
    object: Mutex<Option<WeakObjectRef>>,
    dom: Mutex<Option<Arc<Element>>>,
    namespaces: Mutex<Vec<Namespace>>,
}

impl NodeLink {
    pub fn new(element_name: QName) -> Self {
        Self {
            state: Arc::new(LinkState {
                element_name,
                parent: Mutex::new(Weak::new()),
                object: Mutex::new(None),
                dom: Mutex::new(None),
                namespaces: Mutex::new(Vec::new()),
            }),
        }
    }

    fn from_state(state: Arc<LinkState>) -> Self {
        Self { state }
    }

    pub fn element_name(&self) -> &QName {
        &self.state.element_name
    }

    /// Whether both links belong to the same node
    pub fn ptr_eq(&self, other: &NodeLink) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }

    pub fn dom(&self) -> Option<Arc<Element>> {
        self.state.dom.lock().clone()
    }

    pub fn set_dom(&self, dom: Option<Arc<Element>>) {
        *self.state.dom.lock() = dom;
    }

    pub fn release_dom(&self) {
        if self.state.dom.lock().take().is_some() {
            trace!(element = %self.element_name(), "Released cached DOM");
        }
    }

    pub fn parent(&self) -> Option<NodeLink> {
        self.state.parent.lock().upgrade().map(Self::from_state)
    }

    pub fn has_parent(&self) -> bool {
        self.parent().is_some()
    }

    /// Release the parent's DOM, and every further ancestor's when `propagate` is set
    pub fn release_parent_dom(&self, propagate: bool) {
        let mut current = self.parent();
        while let Some(ancestor) = current {
            ancestor.release_dom();
            if !propagate {
                break;
            }
            current = ancestor.parent();
        }
    }

    pub fn release_this_and_parent_dom(&self) {
        self.release_dom();
        self.release_parent_dom(true);
    }

    /// The object this link belongs to, while it is alive
    pub fn object(&self) -> Option<XmlObjectRef> {
        let weak = self.state.object.lock().clone()?;
        weak.upgrade(self)
    }

    pub(crate) fn bind_object(&self, object: WeakObjectRef) {
        *self.state.object.lock() = Some(object);
    }

    /// Check that `child` may be attached beneath this node without mutating anything
    pub fn check_attachable(&self, child: &NodeLink) -> Result<(), OwnershipError> {
        if self.ptr_eq(child) {
            return Err(OwnershipError::SelfReference {
                element: child.element_name().clone(),
            });
        }
        if child.has_parent() {
            return Err(OwnershipError::AlreadyOwned {
                child: child.element_name().clone(),
            });
        }
        let mut ancestor = self.parent();
        while let Some(node) = ancestor {
            if node.ptr_eq(child) {
                return Err(OwnershipError::SelfReference {
                    element: child.element_name().clone(),
                });
            }
            ancestor = node.parent();
        }
        Ok(())
    }

    pub(crate) fn attach(&self, child: &NodeLink) -> Result<(), OwnershipError> {
        self.check_attachable(child)?;
        *child.state.parent.lock() = Arc::downgrade(&self.state);
        Ok(())
    }

    /// Clear `child`'s parent link if it points at this node
    pub(crate) fn detach(&self, child: &NodeLink) {
        let mut parent = child.state.parent.lock();
        if std::ptr::eq(parent.as_ptr(), Arc::as_ptr(&self.state)) {
            *parent = Weak::new();
        }
    }

    /// Namespaces explicitly declared on this node
    pub fn namespaces(&self) -> Vec<Namespace> {
        self.state.namespaces.lock().clone()
    }

    /// Declare a namespace, replacing an existing binding of the same prefix
    pub fn add_namespace(&self, namespace: Namespace) {
        let changed = {
            let mut namespaces = self.state.namespaces.lock();
            match namespaces.iter_mut().find(|ns| ns.prefix() == namespace.prefix()) {
                Some(existing) if *existing == namespace => false,
                Some(existing) => {
                    *existing = namespace;
                    true
                }
                None => {
                    namespaces.push(namespace);
                    true
                }
            }
        };
        if changed {
            self.release_this_and_parent_dom();
        }
    }

    pub fn remove_namespace(&self, prefix: Option<&str>) -> Option<Namespace> {
        let removed = {
            let mut namespaces = self.state.namespaces.lock();
            let index = namespaces.iter().position(|ns| ns.prefix() == prefix)?;
            namespaces.remove(index)
        };
        self.release_this_and_parent_dom();
        Some(removed)
    }

    /// Resolve a prefix against this node and then its ancestors
    pub fn lookup_namespace_uri(&self, prefix: Option<&str>) -> Option<String> {
        if prefix == Some(XML_PREFIX) {
            return Some(XML_NS.to_string());
        }
        let mut current = Some(self.clone());
        while let Some(node) = current {
            if let Some(ns) = node
                .state
                .namespaces
                .lock()
                .iter()
                .find(|ns| ns.prefix() == prefix)
            {
                return ns.uri().map(str::to_string);
            }
            let name = node.element_name();
            if let Some(uri) = name.namespace_uri()
                && name.prefix() == prefix
            {
                return Some(uri.to_string());
            }
            current = node.parent();
        }
        None
    }

    /// Find a prefix bound to `uri`; `Some(None)` means the default namespace
    pub fn lookup_prefix(&self, uri: &str) -> Option<Option<String>> {
        if uri == XML_NS {
            return Some(Some(XML_PREFIX.to_string()));
        }
        let mut current = Some(self.clone());
        while let Some(node) = current {
            if let Some(ns) = node
                .state
                .namespaces
                .lock()
                .iter()
                .find(|ns| ns.uri() == Some(uri))
            {
                return Some(ns.prefix().map(str::to_string));
            }
            let name = node.element_name();
            if name.namespace_uri() == Some(uri) {
                return Some(name.prefix().map(str::to_string));
            }
            current = node.parent();
        }
        None
    }
}

impl fmt::Debug for NodeLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeLink")
            .field("element", self.element_name())
            .field("has_parent", &self.has_parent())
            .field("dom_cached", &self.state.dom.lock().is_some())
            .finish()
    }
}
