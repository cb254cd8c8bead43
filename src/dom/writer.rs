//! Serialize the DOM back to text using `quick-xml`.

use std::fmt::Display;
use std::io::Write;

use quick_xml::Writer;
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};

use crate::constants::{XML_NS, XML_PREFIX};
use crate::dom::{Attribute, Document, Element, Node};
use crate::error::{MarshallResult, MarshallingError};
use crate::qname::Namespace;

/// Serialize an element without indentation
pub fn to_string(element: &Element) -> MarshallResult<String> {
    let mut writer = Writer::new(Vec::new());
    write_element(&mut writer, element)?;
    into_string(writer.into_inner())
}

/// Serialize an element with two-space indentation
pub fn to_string_pretty(element: &Element) -> MarshallResult<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    write_element(&mut writer, element)?;
    into_string(writer.into_inner())
}

/// Serialize a document, optionally preceded by an XML declaration
pub fn document_to_string(document: &Document, declaration: bool) -> MarshallResult<String> {
    let mut writer = Writer::new(Vec::new());
    if declaration {
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(serialize_error)?;
    }
    write_element(&mut writer, document.root())?;
    into_string(writer.into_inner())
}

fn write_element<W: Write>(writer: &mut Writer<W>, element: &Element) -> MarshallResult<()> {
    write_scoped(writer, element, &mut OutputScope::default())
}

fn write_scoped<W: Write>(
    writer: &mut Writer<W>,
    element: &Element,
    scope: &mut OutputScope,
) -> MarshallResult<()> {
    scope.push(element.namespace_declarations());

    let name = element.name();
    let mut fixups = Vec::new();
    if scope.needs_declaration(name.prefix(), name.namespace_uri()) {
        let namespace = Namespace::new(name.namespace_uri(), name.prefix());
        scope.bind(&namespace);
        fixups.push(namespace);
    }

    let mut attributes = Vec::with_capacity(element.attributes().len());
    for attribute in element.attributes() {
        if attribute.is_namespace_declaration() {
            attributes.push((attribute.qualified_name(), attribute.value()));
            continue;
        }
        let attribute_name = attribute.name();
        let key = match attribute_name.namespace_uri() {
            Some(uri) => {
                let prefix = match attribute_name.prefix() {
                    Some(prefix) => prefix.to_string(),
                    None => scope.prefix_for(uri),
                };
                if scope.needs_declaration(Some(&prefix), Some(uri)) {
                    let namespace = Namespace::new(Some(uri), Some(&prefix));
                    scope.bind(&namespace);
                    fixups.push(namespace);
                }
                format!("{}:{}", prefix, attribute_name.local_part())
            }
            None => attribute_name.local_part().to_string(),
        };
        attributes.push((key, attribute.value()));
    }

    let qualified = name.to_prefixed_string();
    let mut start = BytesStart::new(qualified.as_str());
    for namespace in &fixups {
        let declaration = Attribute::namespace_declaration(namespace);
        start.push_attribute((declaration.qualified_name().as_str(), declaration.value()));
    }
    for (key, value) in &attributes {
        start.push_attribute((key.as_str(), *value));
    }

    let result = write_content(writer, element, start, &qualified, scope);
    scope.pop();
    result
}

fn write_content<W: Write>(
    writer: &mut Writer<W>,
    element: &Element,
    start: BytesStart<'_>,
    qualified: &str,
    scope: &mut OutputScope,
) -> MarshallResult<()> {
    if element.children().is_empty() {
        return writer.write_event(Event::Empty(start)).map_err(serialize_error);
    }

    writer.write_event(Event::Start(start)).map_err(serialize_error)?;
    for child in element.children() {
        match child {
            Node::Element(child) => write_scoped(writer, child, scope)?,
            Node::Text(text) => writer
                .write_event(Event::Text(BytesText::new(text)))
                .map_err(serialize_error)?,
            Node::CData(text) => writer
                .write_event(Event::CData(BytesCData::new(text.as_str())))
                .map_err(serialize_error)?,
            Node::Comment(text) => writer
                .write_event(Event::Comment(BytesText::from_escaped(text.as_str())))
                .map_err(serialize_error)?,
        }
    }
    writer
        .write_event(Event::End(BytesEnd::new(qualified)))
        .map_err(serialize_error)
}

/// Namespace bindings in effect while writing. Elements built in memory may
/// use prefixes declared on an ancestor they have since been detached from,
/// so any binding missing from the output is declared where it is first used.
#[derive(Debug, Default)]
struct OutputScope {
    frames: Vec<Vec<Namespace>>,
    generated: usize,
}

impl OutputScope {
    fn push(&mut self, declarations: impl Iterator<Item = Namespace>) {
        self.frames.push(declarations.collect());
    }

    fn pop(&mut self) {
        self.frames.pop();
    }

    fn bind(&mut self, namespace: &Namespace) {
        if let Some(frame) = self.frames.last_mut() {
            frame.push(namespace.clone());
        }
    }

    fn lookup(&self, prefix: Option<&str>) -> Option<Option<&str>> {
        if prefix == Some(XML_PREFIX) {
            return Some(Some(XML_NS));
        }
        self.frames
            .iter()
            .rev()
            .flat_map(|frame| frame.iter().rev())
            .find(|ns| ns.prefix() == prefix)
            .map(Namespace::uri)
    }

    fn needs_declaration(&self, prefix: Option<&str>, uri: Option<&str>) -> bool {
        match self.lookup(prefix) {
            Some(bound) => bound != uri,
            None => uri.is_some(),
        }
    }

    /// A prefix for a namespaced attribute written without one
    fn prefix_for(&mut self, uri: &str) -> String {
        let bound = self
            .frames
            .iter()
            .rev()
            .flat_map(|frame| frame.iter().rev())
            .find(|ns| ns.uri() == Some(uri) && ns.prefix().is_some())
            .and_then(|ns| ns.prefix().map(str::to_string));
        if let Some(prefix) = bound
            && self.lookup(Some(&prefix)) == Some(Some(uri))
        {
            return prefix;
        }
        loop {
            self.generated += 1;
            let candidate = format!("ns{}", self.generated);
            if self.lookup(Some(&candidate)).is_none() {
                return candidate;
            }
        }
    }
}

fn into_string(bytes: Vec<u8>) -> MarshallResult<String> {
    String::from_utf8(bytes).map_err(serialize_error)
}

fn serialize_error<E: Display>(err: E) -> MarshallingError {
    MarshallingError::Serialize {
        details: err.to_string(),
    }
}
