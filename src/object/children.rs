use std::fmt;
use std::slice;

use crate::error::OwnershipError;
use crate::object::XmlObject;
use crate::object::handle::{XmlObjectRef, XmlRef};
use crate::object::link::NodeLink;

/// A handle that can sit in an owning child list
pub trait ChildHandle: Clone + fmt::Debug + Send + Sync + 'static {
    fn link(&self) -> &NodeLink;
    fn to_object_ref(&self) -> XmlObjectRef;
}

impl<T: XmlObject> ChildHandle for XmlRef<T> {
    fn link(&self) -> &NodeLink {
        XmlRef::link(self)
    }

    fn to_object_ref(&self) -> XmlObjectRef {
        self.erase()
    }
}

impl ChildHandle for XmlObjectRef {
    fn link(&self) -> &NodeLink {
        XmlObjectRef::link(self)
    }

    fn to_object_ref(&self) -> XmlObjectRef {
        self.clone()
    }
}

/// Ordered list of children owned by one parent.
///
/// Every mutation checks single-parent ownership before touching anything and
/// releases the owner's cached DOM along with its ancestors'.
pub struct XmlObjectChildrenList<H: ChildHandle> {
    owner: NodeLink,
    items: Vec<H>,
}

impl<H: ChildHandle> XmlObjectChildrenList<H> {
    pub fn new(owner: &NodeLink) -> Self {
        Self {
            owner: owner.clone(),
            items: Vec::new(),
        }
    }

    fn check(&self, item: &H) -> Result<(), OwnershipError> {
        if self.contains(item) {
            return Err(OwnershipError::Duplicate {
                child: item.link().element_name().clone(),
            });
        }
        self.owner.check_attachable(item.link())
    }

    pub fn push(&mut self, item: H) -> Result<(), OwnershipError> {
        self.check(&item)?;
        self.owner.attach(item.link())?;
        self.items.push(item);
        self.owner.release_this_and_parent_dom();
        Ok(())
    }

    fn check_index(&self, index: usize, len: usize) -> Result<(), OwnershipError> {
        if index < len {
            Ok(())
        } else {
            Err(OwnershipError::IndexOutOfBounds {
                index,
                len: self.items.len(),
            })
        }
    }

    /// Insert at `index`, shifting later items; `index` may equal `len`
    pub fn insert(&mut self, index: usize, item: H) -> Result<(), OwnershipError> {
        self.check_index(index, self.items.len() + 1)?;
        self.check(&item)?;
        self.owner.attach(item.link())?;
        self.items.insert(index, item);
        self.owner.release_this_and_parent_dom();
        Ok(())
    }

    /// Replace the item at `index`, returning the one removed
    pub fn set(&mut self, index: usize, item: H) -> Result<H, OwnershipError> {
        self.check_index(index, self.items.len())?;
        if self.items[index].link().ptr_eq(item.link()) {
            return Ok(item);
        }
        self.check(&item)?;
        self.owner.attach(item.link())?;
        let old = std::mem::replace(&mut self.items[index], item);
        self.owner.detach(old.link());
        self.owner.release_this_and_parent_dom();
        Ok(old)
    }

    /// Remove an item by identity, returning whether the list changed
    pub fn remove(&mut self, item: &H) -> bool {
        match self.position(item) {
            Some(index) => {
                self.remove_at(index);
                true
            }
            None => false,
        }
    }

    pub fn remove_at(&mut self, index: usize) -> H {
        let item = self.items.remove(index);
        self.owner.detach(item.link());
        self.owner.release_this_and_parent_dom();
        item
    }

    pub fn clear(&mut self) {
        if self.items.is_empty() {
            return;
        }
        for item in self.items.drain(..) {
            self.owner.detach(item.link());
        }
        self.owner.release_this_and_parent_dom();
    }

    pub fn contains(&self, item: &H) -> bool {
        self.position(item).is_some()
    }

    fn position(&self, item: &H) -> Option<usize> {
        self.items.iter().position(|i| i.link().ptr_eq(item.link()))
    }

    pub fn get(&self, index: usize) -> Option<&H> {
        self.items.get(index)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> slice::Iter<'_, H> {
        self.items.iter()
    }

    pub fn as_slice(&self) -> &[H] {
        &self.items
    }

    pub fn to_object_refs(&self) -> Vec<XmlObjectRef> {
        self.items.iter().map(ChildHandle::to_object_ref).collect()
    }
}

impl<'a, H: ChildHandle> IntoIterator for &'a XmlObjectChildrenList<H> {
    type Item = &'a H;
    type IntoIter = slice::Iter<'a, H>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl<H: ChildHandle> fmt::Debug for XmlObjectChildrenList<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.items.iter()).finish()
    }
}
