//! Shared handles to objects in a tree.
//!
//! `XmlRef<T>` is the typed handle held in typed fields; `XmlObjectRef` is the
//! type-erased handle used for polymorphic children. Both carry the node's
//! `NodeLink` so parent and DOM state is reachable without taking the lock.

use std::any::Any;
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::dom::Element;
use crate::object::XmlObject;
use crate::object::link::NodeLink;
use crate::qname::QName;

/// Typed shared handle to an object
pub struct XmlRef<T: XmlObject> {
    link: NodeLink,
    cell: Arc<RwLock<T>>,
}

impl<T: XmlObject> XmlRef<T> {
    pub fn new(object: T) -> Self {
        let link = object.core().link().clone();
        let handle = Self {
            link,
            cell: Arc::new(RwLock::new(object)),
        };
        handle.link.bind_object(handle.erase().downgrade());
        handle
    }

    pub fn read(&self) -> RwLockReadGuard<'_, T> {
        self.cell.read()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, T> {
        self.cell.write()
    }

    pub fn link(&self) -> &NodeLink {
        &self.link
    }

    pub fn element_qname(&self) -> &QName {
        self.link.element_name()
    }

    pub fn parent(&self) -> Option<XmlObjectRef> {
        self.link.parent()?.object()
    }

    pub fn dom(&self) -> Option<Arc<Element>> {
        self.link.dom()
    }

    pub fn ptr_eq(&self, other: &XmlRef<T>) -> bool {
        Arc::ptr_eq(&self.cell, &other.cell)
    }

    /// Type-erased handle to the same object
    pub fn erase(&self) -> XmlObjectRef {
        XmlObjectRef {
            link: self.link.clone(),
            object: self.cell.clone(),
            any: self.cell.clone(),
        }
    }
}

impl<T: XmlObject> Clone for XmlRef<T> {
    fn clone(&self) -> Self {
        Self {
            link: self.link.clone(),
            cell: Arc::clone(&self.cell),
        }
    }
}

impl<T: XmlObject> fmt::Debug for XmlRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("XmlRef")
            .field("element", self.link.element_name())
            .finish()
    }
}

impl<T: XmlObject> From<XmlRef<T>> for XmlObjectRef {
    fn from(handle: XmlRef<T>) -> Self {
        handle.erase()
    }
}

/// Type-erased shared handle to an object
#[derive(Clone)]
pub struct XmlObjectRef {
    link: NodeLink,
    object: Arc<RwLock<dyn XmlObject>>,
    any: Arc<dyn Any + Send + Sync>,
}

impl XmlObjectRef {
    pub fn new<T: XmlObject>(object: T) -> Self {
        XmlRef::new(object).erase()
    }

    pub fn read(&self) -> RwLockReadGuard<'_, dyn XmlObject> {
        self.object.read()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, dyn XmlObject> {
        self.object.write()
    }

    pub fn link(&self) -> &NodeLink {
        &self.link
    }

    pub fn element_qname(&self) -> &QName {
        self.link.element_name()
    }

    pub fn parent(&self) -> Option<XmlObjectRef> {
        self.link.parent()?.object()
    }

    pub fn dom(&self) -> Option<Arc<Element>> {
        self.link.dom()
    }

    pub fn ptr_eq(&self, other: &XmlObjectRef) -> bool {
        self.link.ptr_eq(&other.link)
    }

    pub fn is<T: XmlObject>(&self) -> bool {
        self.any.is::<RwLock<T>>()
    }

    /// Recover the typed handle when the object is a `T`
    pub fn downcast<T: XmlObject>(&self) -> Option<XmlRef<T>> {
        let cell = Arc::clone(&self.any).downcast::<RwLock<T>>().ok()?;
        Some(XmlRef {
            link: self.link.clone(),
            cell,
        })
    }

    pub(crate) fn downgrade(&self) -> WeakObjectRef {
        WeakObjectRef {
            object: Arc::downgrade(&self.object),
            any: Arc::downgrade(&self.any),
        }
    }
}

impl fmt::Debug for XmlObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("XmlObjectRef")
            .field("element", self.link.element_name())
            .finish()
    }
}

/// Non-owning back reference from a `NodeLink` to its object
#[derive(Clone)]
pub(crate) struct WeakObjectRef {
    object: Weak<RwLock<dyn XmlObject>>,
    any: Weak<dyn Any + Send + Sync>,
}

impl WeakObjectRef {
    pub(crate) fn upgrade(&self, link: &NodeLink) -> Option<XmlObjectRef> {
        Some(XmlObjectRef {
            link: link.clone(),
            object: self.object.upgrade()?,
            any: self.any.upgrade()?,
        })
    }
}
