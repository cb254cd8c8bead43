use std::collections::HashSet;
use std::fmt;

use crate::object::link::NodeLink;
use crate::qname::QName;

/// Attributes of an attribute-extensible object, in insertion order
pub struct AttributeMap {
    owner: NodeLink,
    entries: Vec<(QName, String)>,
    id_attributes: HashSet<QName>,
}

impl AttributeMap {
    pub fn new(owner: &NodeLink) -> Self {
        Self {
            owner: owner.clone(),
            entries: Vec::new(),
            id_attributes: HashSet::new(),
        }
    }

    pub fn get(&self, name: &QName) -> Option<&str> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn contains_key(&self, name: &QName) -> bool {
        self.get(name).is_some()
    }

    /// Set an attribute, returning the previous value
    pub fn insert(&mut self, name: QName, value: impl Into<String>) -> Option<String> {
        let value = value.into();
        match self.entries.iter_mut().find(|(key, _)| *key == name) {
            Some(entry) if entry.1 == value => Some(value),
            Some(entry) => {
                let previous = std::mem::replace(entry, (name, value)).1;
                self.owner.release_this_and_parent_dom();
                Some(previous)
            }
            None => {
                self.entries.push((name, value));
                self.owner.release_this_and_parent_dom();
                None
            }
        }
    }

    pub fn remove(&mut self, name: &QName) -> Option<String> {
        let index = self.entries.iter().position(|(key, _)| key == name)?;
        let (_, value) = self.entries.remove(index);
        self.id_attributes.remove(name);
        self.owner.release_this_and_parent_dom();
        Some(value)
    }

    pub fn clear(&mut self) {
        if self.entries.is_empty() {
            return;
        }
        self.entries.clear();
        self.id_attributes.clear();
        self.owner.release_this_and_parent_dom();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&QName, &str)> + '_ {
        self.entries.iter().map(|(key, value)| (key, value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Flag an attribute name as carrying an XML ID
    pub fn register_id_attribute(&mut self, name: QName) {
        self.id_attributes.insert(name);
    }

    pub fn deregister_id_attribute(&mut self, name: &QName) {
        self.id_attributes.remove(name);
    }

    pub fn is_id_attribute(&self, name: &QName) -> bool {
        self.id_attributes.contains(name)
    }

    /// Value of the first attribute flagged as an ID
    pub fn id_value(&self) -> Option<&str> {
        self.entries
            .iter()
            .find(|(key, _)| self.id_attributes.contains(key))
            .map(|(_, value)| value.as_str())
    }
}

impl fmt::Debug for AttributeMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}
