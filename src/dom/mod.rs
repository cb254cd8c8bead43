//! Immutable DOM representation
//!
//! Elements are built once and shared through `Arc<Element>`. A child object's
//! cached DOM is the same allocation that sits inside its parent's DOM, so a
//! cache hit during marshalling re-uses the subtree without copying it.

pub mod parser;
pub mod writer;

use std::sync::Arc;

use crate::constants::{XMLNS_NS, XMLNS_PREFIX};
use crate::qname::{Namespace, QName};

pub use parser::{ParserOptions, parse_bytes, parse_str, parse_str_with};
pub use writer::{document_to_string, to_string, to_string_pretty};

/// An attribute of an element, namespace declarations included
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    name: QName,
    value: String,
}

impl Attribute {
    pub fn new(name: QName, value: impl Into<String>) -> Self {
        Self {
            name,
            value: value.into(),
        }
    }

    /// Attribute declaring the given namespace
    pub fn namespace_declaration(namespace: &Namespace) -> Self {
        let name = match namespace.prefix() {
            Some(prefix) => QName::new(Some(XMLNS_NS), prefix, Some(XMLNS_PREFIX)),
            None => QName::new(Some(XMLNS_NS), XMLNS_PREFIX, None),
        };
        Self::new(name, namespace.uri().unwrap_or_default())
    }

    pub fn name(&self) -> &QName {
        &self.name
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn is_namespace_declaration(&self) -> bool {
        self.name.namespace_uri() == Some(XMLNS_NS)
    }

    /// The namespace declared by this attribute, if it is a declaration
    pub fn as_namespace(&self) -> Option<Namespace> {
        if !self.is_namespace_declaration() {
            return None;
        }
        let prefix = match self.name.prefix() {
            Some(_) => Some(self.name.local_part()),
            None => None,
        };
        Some(Namespace::new(Some(&self.value), prefix))
    }

    /// Name as written in a document
    pub fn qualified_name(&self) -> String {
        if self.is_namespace_declaration() {
            match self.name.prefix() {
                Some(_) => format!("{}:{}", XMLNS_PREFIX, self.name.local_part()),
                None => XMLNS_PREFIX.to_string(),
            }
        } else {
            self.name.to_prefixed_string()
        }
    }
}

/// A DOM child node
#[derive(Debug, Clone)]
pub enum Node {
    Element(Arc<Element>),
    Text(String),
    CData(String),
    Comment(String),
}

/// An immutable XML element
#[derive(Debug, Clone)]
pub struct Element {
    name: QName,
    attributes: Vec<Attribute>,
    children: Vec<Node>,
}

impl Element {
    pub fn name(&self) -> &QName {
        &self.name
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    /// Value of the attribute with the given name (namespace URI + local part)
    pub fn attribute(&self, name: &QName) -> Option<&str> {
        self.attributes
            .iter()
            .find(|attr| attr.name() == name)
            .map(Attribute::value)
    }

    /// Namespaces declared directly on this element
    pub fn namespace_declarations(&self) -> impl Iterator<Item = Namespace> + '_ {
        self.attributes.iter().filter_map(Attribute::as_namespace)
    }

    pub fn child_elements(&self) -> impl Iterator<Item = &Arc<Element>> + '_ {
        self.children.iter().filter_map(|node| match node {
            Node::Element(element) => Some(element),
            _ => None,
        })
    }

    pub fn has_child_elements(&self) -> bool {
        self.child_elements().next().is_some()
    }

    /// Concatenated text and CDATA of the direct children
    pub fn text_content(&self) -> String {
        let mut text = String::new();
        for node in &self.children {
            match node {
                Node::Text(value) | Node::CData(value) => text.push_str(value),
                _ => {}
            }
        }
        text
    }

    /// Copy this element into a builder for modification
    pub fn to_builder(&self) -> ElementBuilder {
        ElementBuilder {
            name: self.name.clone(),
            attributes: self.attributes.clone(),
            children: self.children.clone(),
        }
    }

    /// Compare two elements ignoring attribute order, namespace declarations,
    /// comments and insignificant whitespace.
    pub fn structurally_equals(&self, other: &Element) -> bool {
        if self.name != other.name {
            return false;
        }

        let mut ours: Vec<&Attribute> = self
            .attributes
            .iter()
            .filter(|a| !a.is_namespace_declaration())
            .collect();
        let mut theirs: Vec<&Attribute> = other
            .attributes
            .iter()
            .filter(|a| !a.is_namespace_declaration())
            .collect();
        if ours.len() != theirs.len() {
            return false;
        }
        ours.sort_by(|a, b| a.name().cmp(b.name()));
        theirs.sort_by(|a, b| a.name().cmp(b.name()));
        if ours
            .iter()
            .zip(theirs.iter())
            .any(|(a, b)| a.name() != b.name() || a.value() != b.value())
        {
            return false;
        }

        if self.text_content().trim() != other.text_content().trim() {
            return false;
        }

        let mut our_children = self.child_elements();
        let mut their_children = other.child_elements();
        loop {
            match (our_children.next(), their_children.next()) {
                (None, None) => return true,
                (Some(a), Some(b)) if a.structurally_equals(b) => continue,
                _ => return false,
            }
        }
    }

    /// Describe the first structural difference, for reporting
    pub fn first_difference(&self, other: &Element) -> Option<String> {
        if self.structurally_equals(other) {
            return None;
        }
        if self.name != other.name {
            return Some(format!("element {} became {}", self.name, other.name));
        }
        let ours: Vec<&Arc<Element>> = self.child_elements().collect();
        let theirs: Vec<&Arc<Element>> = other.child_elements().collect();
        if ours.len() == theirs.len() {
            for (a, b) in ours.iter().zip(theirs.iter()) {
                if let Some(diff) = a.first_difference(b) {
                    return Some(diff);
                }
            }
        } else {
            return Some(format!(
                "{} has {} child elements, expected {}",
                self.name,
                theirs.len(),
                ours.len()
            ));
        }
        Some(format!("attributes or text of {} differ", self.name))
    }
}

/// Incremental construction of an `Element`
#[derive(Debug, Clone)]
pub struct ElementBuilder {
    name: QName,
    attributes: Vec<Attribute>,
    children: Vec<Node>,
}

impl ElementBuilder {
    pub fn new(name: QName) -> Self {
        Self {
            name,
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn name(&self) -> &QName {
        &self.name
    }

    /// Set an attribute, replacing any attribute with the same name
    pub fn set_attribute(&mut self, name: QName, value: impl Into<String>) -> &mut Self {
        let value = value.into();
        match self.attributes.iter_mut().find(|a| a.name == name) {
            Some(existing) => existing.value = value,
            None => self.attributes.push(Attribute::new(name, value)),
        }
        self
    }

    /// Declare a namespace unless an identical declaration is already present
    pub fn declare_namespace(&mut self, namespace: &Namespace) -> &mut Self {
        let declaration = Attribute::namespace_declaration(namespace);
        let already_declared = self.attributes.iter().any(|a| {
            a.is_namespace_declaration() && a.qualified_name() == declaration.qualified_name()
        });
        if !already_declared {
            self.attributes.push(declaration);
        }
        self
    }

    /// Whether a prefix (or the default namespace, for `None`) is declared here
    pub fn declares_prefix(&self, prefix: Option<&str>) -> bool {
        self.attributes
            .iter()
            .filter_map(Attribute::as_namespace)
            .any(|ns| ns.prefix() == prefix)
    }

    pub fn append_child(&mut self, child: Arc<Element>) -> &mut Self {
        self.children.push(Node::Element(child));
        self
    }

    pub fn append_text(&mut self, text: impl Into<String>) -> &mut Self {
        self.children.push(Node::Text(text.into()));
        self
    }

    pub fn append_cdata(&mut self, text: impl Into<String>) -> &mut Self {
        self.children.push(Node::CData(text.into()));
        self
    }

    pub fn append_comment(&mut self, text: impl Into<String>) -> &mut Self {
        self.children.push(Node::Comment(text.into()));
        self
    }

    pub fn build(self) -> Arc<Element> {
        Arc::new(Element {
            name: self.name,
            attributes: self.attributes,
            children: self.children,
        })
    }
}

/// A parsed document
#[derive(Debug, Clone)]
pub struct Document {
    root: Arc<Element>,
}

impl Document {
    pub fn new(root: Arc<Element>) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Arc<Element> {
        &self.root
    }

    pub fn into_root(self) -> Arc<Element> {
        self.root
    }
}
