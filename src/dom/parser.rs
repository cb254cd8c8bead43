//! Parse XML text into the immutable DOM using `quick-xml`.

use std::sync::Arc;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use serde::{Deserialize, Serialize};

use crate::constants::{XML_NS, XML_PREFIX, XMLNS_NS, XMLNS_PREFIX};
use crate::dom::{Document, Element, ElementBuilder};
use crate::error::{UnmarshallResult, UnmarshallingError};
use crate::qname::{Namespace, QName};

/// Parser behaviour switches
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserOptions {
    /// Keep comment nodes in the DOM
    pub keep_comments: bool,
    /// Keep text nodes that contain only whitespace
    pub keep_whitespace_text: bool,
}

/// Parse a document with default options
pub fn parse_str(xml: &str) -> UnmarshallResult<Document> {
    parse_str_with(xml, &ParserOptions::default())
}

/// Parse a UTF-8 encoded document with default options
pub fn parse_bytes(bytes: &[u8]) -> UnmarshallResult<Document> {
    let xml = std::str::from_utf8(bytes).map_err(|e| UnmarshallingError::Parse {
        details: format!("document is not valid UTF-8: {}", e),
    })?;
    parse_str(xml)
}

/// Parse a document
pub fn parse_str_with(xml: &str, options: &ParserOptions) -> UnmarshallResult<Document> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);

    let mut scope = NamespaceScope::default();
    let mut open: Vec<ElementBuilder> = Vec::new();
    let mut root = None;

    loop {
        match reader.read_event()? {
            Event::Start(start) => {
                let builder = open_element(&start, &mut scope)?;
                open.push(builder);
            }
            Event::Empty(start) => {
                let builder = open_element(&start, &mut scope)?;
                scope.pop();
                close_element(builder, &mut open, &mut root)?;
            }
            Event::End(_) => {
                let builder = open.pop().ok_or_else(|| UnmarshallingError::Parse {
                    details: "unbalanced end tag".to_string(),
                })?;
                scope.pop();
                close_element(builder, &mut open, &mut root)?;
            }
            Event::Text(text) => {
                if let Some(parent) = open.last_mut() {
                    let value = text.unescape()?;
                    if options.keep_whitespace_text || !value.trim().is_empty() {
                        parent.append_text(value.into_owned());
                    }
                }
            }
            Event::CData(cdata) => {
                if let Some(parent) = open.last_mut() {
                    let value = String::from_utf8(cdata.into_inner().into_owned()).map_err(|e| {
                        UnmarshallingError::Parse {
                            details: format!("CDATA section is not valid UTF-8: {}", e),
                        }
                    })?;
                    parent.append_cdata(value);
                }
            }
            Event::Comment(comment) => {
                if options.keep_comments
                    && let Some(parent) = open.last_mut()
                {
                    parent.append_comment(utf8(&comment)?.to_string());
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(unclosed) = open.last() {
        return Err(UnmarshallingError::Parse {
            details: format!("unexpected end of document inside {}", unclosed.name()),
        });
    }

    root.map(Document::new).ok_or_else(|| UnmarshallingError::Parse {
        details: "document has no root element".to_string(),
    })
}

fn close_element(
    builder: ElementBuilder,
    open: &mut [ElementBuilder],
    root: &mut Option<Arc<Element>>,
) -> UnmarshallResult<()> {
    let element = builder.build();
    match open.last_mut() {
        Some(parent) => {
            parent.append_child(element);
        }
        None if root.is_none() => *root = Some(element),
        None => {
            return Err(UnmarshallingError::Parse {
                details: "document has more than one root element".to_string(),
            });
        }
    }
    Ok(())
}

fn open_element(start: &BytesStart<'_>, scope: &mut NamespaceScope) -> UnmarshallResult<ElementBuilder> {
    let raw_name = utf8(start.name().as_ref())?.to_string();

    let mut raw_attributes = Vec::new();
    let mut declarations = Vec::new();
    for attribute in start.attributes() {
        let attribute = attribute?;
        let key = utf8(attribute.key.as_ref())?.to_string();
        let value = attribute.unescape_value()?.into_owned();

        if key == XMLNS_PREFIX {
            declarations.push(Namespace::new(Some(&value), None));
        } else if let Some(prefix) = key.strip_prefix("xmlns:") {
            declarations.push(Namespace::new(Some(&value), Some(prefix)));
        }
        raw_attributes.push((key, value));
    }
    scope.push(declarations);

    let name = scope.resolve(&raw_name, true)?;
    let mut builder = ElementBuilder::new(name);
    for (key, value) in raw_attributes {
        let attribute_name = if key == XMLNS_PREFIX {
            QName::new(Some(XMLNS_NS), XMLNS_PREFIX, None)
        } else if let Some(prefix) = key.strip_prefix("xmlns:") {
            QName::new(Some(XMLNS_NS), prefix, Some(XMLNS_PREFIX))
        } else {
            scope.resolve(&key, false)?
        };
        builder.set_attribute(attribute_name, value);
    }
    Ok(builder)
}

fn utf8(bytes: &[u8]) -> UnmarshallResult<&str> {
    std::str::from_utf8(bytes).map_err(|e| UnmarshallingError::Parse {
        details: format!("name is not valid UTF-8: {}", e),
    })
}

/// Stack of namespace declaration frames, one per open element
#[derive(Debug, Default)]
pub(crate) struct NamespaceScope {
    frames: Vec<Vec<Namespace>>,
}

impl NamespaceScope {
    pub(crate) fn push(&mut self, declarations: Vec<Namespace>) {
        self.frames.push(declarations);
    }

    pub(crate) fn pop(&mut self) {
        self.frames.pop();
    }

    /// Namespace URI bound to a prefix (`None` for the default namespace)
    pub(crate) fn lookup_uri(&self, prefix: Option<&str>) -> Option<Option<&str>> {
        if prefix == Some(XML_PREFIX) {
            return Some(Some(XML_NS));
        }
        self.frames
            .iter()
            .rev()
            .flat_map(|frame| frame.iter())
            .find(|ns| ns.prefix() == prefix)
            .map(Namespace::uri)
    }

    /// Resolve `prefix:local`. Unprefixed attributes are never in the default namespace.
    pub(crate) fn resolve(&self, raw: &str, is_element: bool) -> UnmarshallResult<QName> {
        match raw.split_once(':') {
            Some((prefix, local)) => match self.lookup_uri(Some(prefix)) {
                Some(Some(uri)) => Ok(QName::new(Some(uri), local, Some(prefix))),
                _ => Err(UnmarshallingError::UnresolvedPrefix {
                    prefix: prefix.to_string(),
                    context: raw.to_string(),
                }),
            },
            None if is_element => {
                let uri = self.lookup_uri(None).flatten();
                Ok(QName::new(uri, raw, None))
            }
            None => Ok(QName::local(raw)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Node;

    #[test]
    fn test_parse_resolves_namespaces() {
        let xml = r#"<?xml version="1.0"?>
<a:Root xmlns:a="urn:a" xmlns="urn:default" a:flag="yes" plain="1">
    <Child>text &amp; more</Child>
    <a:Other xmlns:a="urn:rebound"/>
</a:Root>"#;
        let document = parse_str(xml).unwrap();
        let root = document.root();

        assert_eq!(root.name(), &QName::new(Some("urn:a"), "Root", None));
        assert_eq!(root.name().prefix(), Some("a"));
        assert_eq!(root.attribute(&QName::new(Some("urn:a"), "flag", None)), Some("yes"));
        assert_eq!(root.attribute(&QName::local("plain")), Some("1"));
        assert_eq!(root.namespace_declarations().count(), 2);

        let children: Vec<_> = root.child_elements().collect();
        assert_eq!(children.len(), 2);
        assert_eq!(children[0].name(), &QName::new(Some("urn:default"), "Child", None));
        assert_eq!(children[0].text_content(), "text & more");
        assert_eq!(children[1].name(), &QName::new(Some("urn:rebound"), "Other", None));
    }

    #[test]
    fn test_whitespace_and_comments_dropped_by_default() {
        let xml = "<Root>\n  <!-- note -->\n  <Child/>\n</Root>";
        let root = parse_str(xml).unwrap().into_root();
        assert_eq!(root.children().len(), 1);

        let options = ParserOptions {
            keep_comments: true,
            keep_whitespace_text: true,
        };
        let root = parse_str_with(xml, &options).unwrap().into_root();
        assert!(root.children().iter().any(|n| matches!(n, Node::Comment(c) if c.trim() == "note")));
        assert!(root.children().len() > 2);
    }

    #[test]
    fn test_cdata_is_preserved() {
        let root = parse_str("<Root><![CDATA[<not markup>]]></Root>").unwrap().into_root();
        assert!(matches!(&root.children()[0], Node::CData(c) if c == "<not markup>"));
        assert_eq!(root.text_content(), "<not markup>");
    }

    #[test]
    fn test_undeclared_prefix_fails() {
        let err = parse_str("<x:Root/>").unwrap_err();
        assert!(matches!(err, UnmarshallingError::UnresolvedPrefix { ref prefix, .. } if prefix == "x"));
    }

    #[test]
    fn test_default_namespace_undeclaration() {
        let root = parse_str(r#"<Root xmlns="urn:a"><Child xmlns=""/></Root>"#)
            .unwrap()
            .into_root();
        let child = root.child_elements().next().unwrap();
        assert_eq!(child.name().namespace_uri(), None);
    }

    #[test]
    fn test_malformed_documents_fail() {
        assert!(parse_str("<Root><Child></Root>").is_err());
        assert!(parse_str("").is_err());
        assert!(parse_str("<Root>").is_err());
    }

    #[test]
    fn test_xml_prefix_is_predeclared() {
        let root = parse_str(r#"<Root xml:lang="en"/>"#).unwrap().into_root();
        assert_eq!(root.attribute(&QName::new(Some(XML_NS), "lang", None)), Some("en"));
    }

    #[test]
    fn test_parse_bytes_rejects_invalid_utf8() {
        assert!(parse_bytes(&[0x3c, 0xff, 0x3e]).is_err());
    }
}
