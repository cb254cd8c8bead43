//! DOM to object conversion.
//!
//! `Unmarshaller::unmarshall` is a template: it builds the object through the
//! registry, runs the attribute pass, recursively unmarshalls child elements,
//! collects text, and finally caches the source element on the new object.
//! Concrete types override the three `process_*` hooks.

use std::cell::RefCell;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::constants::{XSI_NS, xsi_type_name};
use crate::dom::parser::NamespaceScope;
use crate::dom::{Attribute, Element, Node};
use crate::error::{UnmarshallResult, UnmarshallingError};
use crate::object::{CachesDom, XmlObject, XmlObjectRef};
use crate::qname::QName;
use crate::registry::XmlObjectProviderRegistry;

/// Per-call unmarshalling state: the registry, in-scope namespaces and strictness
pub struct UnmarshallingContext<'a> {
    registry: &'a XmlObjectProviderRegistry,
    scope: NamespaceScope,
    strict: bool,
    dropped: RefCell<Vec<String>>,
}

impl<'a> UnmarshallingContext<'a> {
    pub fn new(registry: &'a XmlObjectProviderRegistry) -> Self {
        Self {
            registry,
            scope: NamespaceScope::default(),
            strict: false,
            dropped: RefCell::new(Vec::new()),
        }
    }

    /// Treat unknown attributes, children and text as errors
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    pub fn registry(&self) -> &'a XmlObjectProviderRegistry {
        self.registry
    }

    /// Content ignored so far in lenient mode, in document order
    pub fn dropped(&self) -> Vec<String> {
        self.dropped.borrow().clone()
    }

    fn record_dropped(&self, what: String) {
        self.dropped.borrow_mut().push(what);
    }

    /// Unmarshall an element with the unmarshaller registered for it
    pub fn unmarshall(&mut self, element: &Arc<Element>) -> UnmarshallResult<XmlObjectRef> {
        self.scope.push(element.namespace_declarations().collect());
        let result = self.unmarshall_in_scope(element);
        self.scope.pop();
        result
    }

    fn unmarshall_in_scope(&mut self, element: &Arc<Element>) -> UnmarshallResult<XmlObjectRef> {
        let schema_type = self.schema_type_of(element)?;
        let unmarshaller = self
            .registry
            .unmarshaller_for(element.name(), schema_type.as_ref())
            .ok_or_else(|| UnmarshallingError::NoUnmarshaller {
                element: element.name().clone(),
            })?;
        trace!(element = %element.name(), "Unmarshalling element");
        unmarshaller.unmarshall(element, self)
    }

    /// The `xsi:type` of an element, resolved against the in-scope namespaces
    pub fn schema_type_of(&self, element: &Element) -> UnmarshallResult<Option<QName>> {
        match element.attribute(&xsi_type_name()) {
            Some(value) => self.resolve_qname(value).map(Some),
            None => Ok(None),
        }
    }

    /// Resolve QName-valued content such as `xs:string`; unprefixed values
    /// take the default namespace
    pub fn resolve_qname(&self, value: &str) -> UnmarshallResult<QName> {
        self.scope.resolve(value.trim(), true)
    }
}

/// Converts a DOM element into an object
pub trait Unmarshaller: Send + Sync {
    fn unmarshall(
        &self,
        element: &Arc<Element>,
        ctx: &mut UnmarshallingContext<'_>,
    ) -> UnmarshallResult<XmlObjectRef> {
        unmarshall_with(self, element, ctx)
    }

    /// Handle one non-namespace, non-xsi attribute
    fn process_attribute(
        &self,
        target: &mut dyn XmlObject,
        attribute: &Attribute,
        ctx: &UnmarshallingContext<'_>,
    ) -> UnmarshallResult<()> {
        unknown_attribute(target, attribute, ctx)
    }

    /// Place an already unmarshalled child into the parent
    fn process_child_element(
        &self,
        parent: &mut dyn XmlObject,
        child: XmlObjectRef,
        ctx: &UnmarshallingContext<'_>,
    ) -> UnmarshallResult<()> {
        unknown_child(parent, child, ctx)
    }

    /// Handle the trimmed, non-empty text content of the element
    fn process_element_content(
        &self,
        target: &mut dyn XmlObject,
        content: &str,
        ctx: &UnmarshallingContext<'_>,
    ) -> UnmarshallResult<()> {
        unknown_content(target, content, ctx)
    }
}

/// The unmarshalling algorithm shared by every `Unmarshaller`
pub fn unmarshall_with<U: Unmarshaller + ?Sized>(
    unmarshaller: &U,
    element: &Arc<Element>,
    ctx: &mut UnmarshallingContext<'_>,
) -> UnmarshallResult<XmlObjectRef> {
    let schema_type = ctx.schema_type_of(element)?;
    let builder = ctx
        .registry()
        .builder_for(element.name(), schema_type.as_ref())
        .ok_or_else(|| UnmarshallingError::NoBuilder {
            element: element.name().clone(),
        })?;
    let object = builder.build_object(element.name().clone(), schema_type);

    {
        let mut guard = object.write();
        let target: &mut dyn XmlObject = &mut *guard;

        for attribute in element.attributes() {
            if let Some(namespace) = attribute.as_namespace() {
                target.core().add_namespace(namespace);
            } else if attribute.name().namespace_uri() == Some(XSI_NS) {
                process_xsi_attribute(unmarshaller, target, attribute, ctx)?;
            } else {
                unmarshaller.process_attribute(target, attribute, ctx)?;
            }
        }

        let mut text = String::new();
        for node in element.children() {
            match node {
                Node::Element(child) => {
                    let child = ctx.unmarshall(child)?;
                    unmarshaller.process_child_element(target, child, ctx)?;
                }
                Node::Text(value) | Node::CData(value) => text.push_str(value),
                Node::Comment(_) => {}
            }
        }
        let text = text.trim();
        if !text.is_empty() {
            unmarshaller.process_element_content(target, text, ctx)?;
        }

        target.set_dom(Some(Arc::clone(element)));
    }

    Ok(object)
}

fn process_xsi_attribute<U: Unmarshaller + ?Sized>(
    unmarshaller: &U,
    target: &mut dyn XmlObject,
    attribute: &Attribute,
    ctx: &UnmarshallingContext<'_>,
) -> UnmarshallResult<()> {
    let core = target.core_mut();
    match attribute.name().local_part() {
        // already applied by the builder
        "type" => {}
        "nil" => {
            let nil = parse_xml_boolean(attribute.value()).ok_or_else(|| {
                UnmarshallingError::MalformedAttribute {
                    element: core.element_qname().clone(),
                    attribute: attribute.name().clone(),
                    value: attribute.value().to_string(),
                    reason: "expected true, false, 1 or 0".to_string(),
                }
            })?;
            core.set_nil(Some(nil));
        }
        "schemaLocation" => core.set_schema_location(Some(attribute.value())),
        "noNamespaceSchemaLocation" => core.set_no_namespace_schema_location(Some(attribute.value())),
        _ => unmarshaller.process_attribute(target, attribute, ctx)?,
    }
    Ok(())
}

/// `xs:boolean` lexical space
pub fn parse_xml_boolean(value: &str) -> Option<bool> {
    match value.trim() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

/// Store an unrecognized attribute if the target is attribute-extensible,
/// otherwise drop it (or fail in strict mode)
pub fn unknown_attribute(
    target: &mut dyn XmlObject,
    attribute: &Attribute,
    ctx: &UnmarshallingContext<'_>,
) -> UnmarshallResult<()> {
    if let Some(extensible) = target.as_attribute_extensible_mut() {
        extensible
            .unknown_attributes_mut()
            .insert(attribute.name().clone(), attribute.value());
        return Ok(());
    }
    if ctx.is_strict() {
        return Err(UnmarshallingError::UnknownAttribute {
            element: target.element_qname().clone(),
            attribute: attribute.name().clone(),
        });
    }
    debug!(
        element = %target.element_qname(),
        attribute = %attribute.name(),
        "Ignoring unknown attribute"
    );
    ctx.record_dropped(format!("attribute {} of {}", attribute.name(), target.element_qname()));
    Ok(())
}

/// Keep an unrecognized child if the parent is element-extensible,
/// otherwise drop it (or fail in strict mode)
pub fn unknown_child(
    parent: &mut dyn XmlObject,
    child: XmlObjectRef,
    ctx: &UnmarshallingContext<'_>,
) -> UnmarshallResult<()> {
    if let Some(extensible) = parent.as_element_extensible_mut() {
        extensible.unknown_children_mut().push(child)?;
        return Ok(());
    }
    if ctx.is_strict() {
        return Err(UnmarshallingError::UnknownChild {
            parent: parent.element_qname().clone(),
            child: child.element_qname().clone(),
        });
    }
    debug!(
        parent = %parent.element_qname(),
        child = %child.element_qname(),
        "Ignoring unknown child element"
    );
    ctx.record_dropped(format!("child element {} of {}", child.element_qname(), parent.element_qname()));
    Ok(())
}

/// Drop text content the target has no place for (or fail in strict mode)
pub fn unknown_content(
    target: &mut dyn XmlObject,
    content: &str,
    ctx: &UnmarshallingContext<'_>,
) -> UnmarshallResult<()> {
    if ctx.is_strict() {
        return Err(UnmarshallingError::UnexpectedContent {
            element: target.element_qname().clone(),
        });
    }
    debug!(
        element = %target.element_qname(),
        length = content.len(),
        "Ignoring unexpected text content"
    );
    ctx.record_dropped(format!("text content of {}", target.element_qname()));
    Ok(())
}

/// Downcast the target of an unmarshaller hook, failing with a type mismatch
pub fn expect_target<'t, T: XmlObject>(
    target: &'t mut dyn XmlObject,
    expected: &'static str,
) -> UnmarshallResult<&'t mut T> {
    let element = target.element_qname().clone();
    crate::object::downcast_mut::<T>(target)
        .ok_or(UnmarshallingError::TypeMismatch { expected, element })
}
