//! Object to DOM conversion.
//!
//! `Marshaller::marshall` returns the cached DOM when there is one. Otherwise it
//! creates the element, writes namespace declarations and `xsi:*` attributes,
//! runs the attribute hook, marshalls the ordered children, runs the content
//! hook and caches the result.

use std::sync::Arc;

use tracing::trace;

use crate::constants::{
    XSD_NS, XSD_PREFIX, xsi_nil_name, xsi_no_namespace_schema_location_name,
    xsi_schema_location_name, xsi_type_name,
};
use crate::dom::{Element, ElementBuilder};
use crate::error::{MarshallResult, MarshallingError};
use crate::object::{CachesDom, NodeLink, XmlObject, XmlObjectRef};
use crate::qname::{Namespace, QName};
use crate::registry::XmlObjectProviderRegistry;

/// Per-call marshalling state
pub struct MarshallingContext<'a> {
    registry: &'a XmlObjectProviderRegistry,
}

impl<'a> MarshallingContext<'a> {
    pub fn new(registry: &'a XmlObjectProviderRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &'a XmlObjectProviderRegistry {
        self.registry
    }

    /// Marshall an object with the marshaller registered for it
    pub fn marshall(&self, object: &XmlObjectRef) -> MarshallResult<Arc<Element>> {
        if let Some(dom) = object.dom() {
            trace!(element = %object.element_qname(), "Using cached DOM");
            return Ok(dom);
        }
        let guard = object.read();
        let marshaller = self
            .registry
            .marshaller_for(guard.element_qname(), guard.schema_type())
            .ok_or_else(|| MarshallingError::NoMarshaller {
                element: guard.element_qname().clone(),
            })?;
        marshaller.marshall(&*guard, self)
    }
}

/// Converts an object into a DOM element
pub trait Marshaller: Send + Sync {
    fn marshall(&self, object: &dyn XmlObject, ctx: &MarshallingContext<'_>) -> MarshallResult<Arc<Element>> {
        marshall_with(self, object, ctx)
    }

    /// Write type-specific attributes. The default writes the extension
    /// attributes of attribute-extensible objects.
    fn marshall_attributes(&self, object: &dyn XmlObject, element: &mut ElementBuilder) -> MarshallResult<()> {
        marshall_unknown_attributes(object, element);
        Ok(())
    }

    /// Write text content after the children
    fn marshall_element_content(&self, _object: &dyn XmlObject, _element: &mut ElementBuilder) -> MarshallResult<()> {
        Ok(())
    }
}

/// The marshalling algorithm shared by every `Marshaller`
pub fn marshall_with<M: Marshaller + ?Sized>(
    marshaller: &M,
    object: &dyn XmlObject,
    ctx: &MarshallingContext<'_>,
) -> MarshallResult<Arc<Element>> {
    if let Some(dom) = object.dom() {
        trace!(element = %object.element_qname(), "Using cached DOM");
        return Ok(dom);
    }

    let link = object.core().link();
    let name = object.element_qname().clone();
    let mut builder = ElementBuilder::new(name.clone());

    if let Some(uri) = name.namespace_uri()
        && !inherits_binding(link, name.prefix(), uri)
    {
        builder.declare_namespace(&Namespace::new(Some(uri), name.prefix()));
    }
    for namespace in link.namespaces() {
        builder.declare_namespace(&namespace);
    }
    marshall_xsi_attributes(object, &mut builder);
    marshaller.marshall_attributes(object, &mut builder)?;

    for child in object.ordered_children() {
        let child_element = ctx.marshall(&child)?;
        builder.append_child(child_element);
    }
    marshaller.marshall_element_content(object, &mut builder)?;

    let element = builder.build();
    trace!(element = %name, "Marshalled element");
    object.set_dom(Some(Arc::clone(&element)));
    object.release_parent_dom(true);
    Ok(element)
}

fn inherits_binding(link: &NodeLink, prefix: Option<&str>, uri: &str) -> bool {
    link.parent()
        .and_then(|parent| parent.lookup_namespace_uri(prefix))
        .is_some_and(|bound| bound == uri)
}

fn marshall_xsi_attributes(object: &dyn XmlObject, builder: &mut ElementBuilder) {
    let core = object.core();
    if let Some(schema_type) = core.schema_type() {
        let value = match schema_type.namespace_uri() {
            Some(uri) => {
                let prefix = schema_type
                    .prefix()
                    .map(str::to_string)
                    .or_else(|| core.link().lookup_prefix(uri).flatten())
                    .unwrap_or_else(|| conventional_prefix(uri));
                if core.link().lookup_namespace_uri(Some(&prefix)).as_deref() != Some(uri) {
                    builder.declare_namespace(&Namespace::new(Some(uri), Some(&prefix)));
                }
                format!("{}:{}", prefix, schema_type.local_part())
            }
            None => schema_type.local_part().to_string(),
        };
        builder.set_attribute(xsi_type_name(), value);
    }
    if let Some(nil) = core.nil() {
        builder.set_attribute(xsi_nil_name(), nil.to_string());
    }
    if let Some(location) = core.schema_location() {
        builder.set_attribute(xsi_schema_location_name(), location);
    }
    if let Some(location) = core.no_namespace_schema_location() {
        builder.set_attribute(xsi_no_namespace_schema_location_name(), location);
    }
}

fn conventional_prefix(uri: &str) -> String {
    if uri == XSD_NS {
        XSD_PREFIX.to_string()
    } else {
        "ns".to_string()
    }
}

/// Write the extension attributes of an attribute-extensible object
pub fn marshall_unknown_attributes(object: &dyn XmlObject, builder: &mut ElementBuilder) {
    if let Some(extensible) = object.as_attribute_extensible() {
        for (name, value) in extensible.unknown_attributes().iter() {
            builder.set_attribute(name.clone(), value);
        }
    }
}

/// Write a QName value as element text, declaring its namespace on the element
pub fn marshall_qname_content(value: &QName, builder: &mut ElementBuilder) {
    match value.namespace_uri() {
        Some(uri) => {
            let prefix = value
                .prefix()
                .map(str::to_string)
                .unwrap_or_else(|| conventional_prefix(uri));
            builder.declare_namespace(&Namespace::new(Some(uri), Some(&prefix)));
            builder.append_text(format!("{}:{}", prefix, value.local_part()));
        }
        None => {
            builder.append_text(value.local_part());
        }
    }
}

/// Downcast the object handed to a marshaller hook, failing with a type mismatch
pub fn expect_object<'o, T: XmlObject>(
    object: &'o dyn XmlObject,
    expected: &'static str,
) -> MarshallResult<&'o T> {
    crate::object::downcast_ref::<T>(object).ok_or_else(|| MarshallingError::TypeMismatch {
        expected,
        element: object.element_qname().clone(),
    })
}
