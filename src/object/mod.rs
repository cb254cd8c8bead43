//! The XMLObject model
//!
//! Every element type embeds an `XmlObjectCore` and implements `XmlObject`.
//! Cross-cutting behaviour is expressed as capability traits rather than an
//! inheritance chain: `HasParent` and `CachesDom` come for free from the core,
//! while `AttributeExtensible`, `ElementExtensible`, `Signable` and
//! `Validatable` are opted into by the types that support them.

pub mod attributes;
pub mod children;
pub mod handle;
pub mod link;

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::dom::Element;
use crate::error::{OwnershipError, ValidationError};
use crate::qname::{Namespace, QName};

pub use attributes::AttributeMap;
pub use children::{ChildHandle, XmlObjectChildrenList};
pub use handle::{XmlObjectRef, XmlRef};
pub use link::NodeLink;

/// Upcast to `Any` for downcasting trait objects
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// One XML element instance
pub trait XmlObject: AsAny + Send + Sync + fmt::Debug {
    fn core(&self) -> &XmlObjectCore;

    fn core_mut(&mut self) -> &mut XmlObjectCore;

    /// Children in document order; empty for leaf elements
    fn ordered_children(&self) -> Vec<XmlObjectRef>;

    fn element_qname(&self) -> &QName {
        self.core().element_qname()
    }

    fn schema_type(&self) -> Option<&QName> {
        self.core().schema_type()
    }

    fn has_children(&self) -> bool {
        !self.ordered_children().is_empty()
    }

    fn as_attribute_extensible(&self) -> Option<&dyn AttributeExtensible> {
        None
    }

    fn as_attribute_extensible_mut(&mut self) -> Option<&mut dyn AttributeExtensible> {
        None
    }

    fn as_element_extensible(&self) -> Option<&dyn ElementExtensible> {
        None
    }

    fn as_element_extensible_mut(&mut self) -> Option<&mut dyn ElementExtensible> {
        None
    }

    fn as_signable(&self) -> Option<&dyn Signable> {
        None
    }

    fn as_validatable(&self) -> Option<&dyn Validatable> {
        None
    }
}

pub fn downcast_ref<T: XmlObject>(object: &dyn XmlObject) -> Option<&T> {
    object.as_any().downcast_ref::<T>()
}

pub fn downcast_mut<T: XmlObject>(object: &mut dyn XmlObject) -> Option<&mut T> {
    object.as_any_mut().downcast_mut::<T>()
}

/// State shared by every object: element name, schema type, xsi attributes
/// and the node link
#[derive(Debug)]
pub struct XmlObjectCore {
    link: NodeLink,
    schema_type: Option<QName>,
    nil: Option<bool>,
    schema_location: Option<String>,
    no_namespace_schema_location: Option<String>,
}

impl XmlObjectCore {
    pub fn new(element_name: QName, schema_type: Option<QName>) -> Self {
        Self {
            link: NodeLink::new(element_name),
            schema_type,
            nil: None,
            schema_location: None,
            no_namespace_schema_location: None,
        }
    }

    pub fn link(&self) -> &NodeLink {
        &self.link
    }

    pub fn element_qname(&self) -> &QName {
        self.link.element_name()
    }

    pub fn schema_type(&self) -> Option<&QName> {
        self.schema_type.as_ref()
    }

    pub fn set_schema_type(&mut self, schema_type: Option<QName>) {
        self.schema_type = self.prepare_for_assignment(&self.schema_type, schema_type);
    }

    pub fn nil(&self) -> Option<bool> {
        self.nil
    }

    pub fn set_nil(&mut self, nil: Option<bool>) {
        self.nil = self.prepare_for_assignment(&self.nil, nil);
    }

    pub fn schema_location(&self) -> Option<&str> {
        self.schema_location.as_deref()
    }

    pub fn set_schema_location(&mut self, location: Option<&str>) {
        self.schema_location = self.prepare_string_for_assignment(&self.schema_location, location);
    }

    pub fn no_namespace_schema_location(&self) -> Option<&str> {
        self.no_namespace_schema_location.as_deref()
    }

    pub fn set_no_namespace_schema_location(&mut self, location: Option<&str>) {
        self.no_namespace_schema_location =
            self.prepare_string_for_assignment(&self.no_namespace_schema_location, location);
    }

    pub fn namespaces(&self) -> Vec<Namespace> {
        self.link.namespaces()
    }

    pub fn add_namespace(&self, namespace: Namespace) {
        self.link.add_namespace(namespace);
    }

    pub fn new_child_list<H: ChildHandle>(&self) -> XmlObjectChildrenList<H> {
        XmlObjectChildrenList::new(&self.link)
    }

    pub fn new_attribute_map(&self) -> AttributeMap {
        AttributeMap::new(&self.link)
    }

    /// Release this node's and its ancestors' DOM if the value changes
    pub fn prepare_for_assignment<V: PartialEq>(&self, old: &V, new: V) -> V {
        if *old != new {
            self.link.release_this_and_parent_dom();
        }
        new
    }

    /// Like `prepare_for_assignment`, trimming strings and mapping empty to `None`
    pub fn prepare_string_for_assignment(&self, old: &Option<String>, new: Option<&str>) -> Option<String> {
        let new = new.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string);
        self.prepare_for_assignment(old, new)
    }

    /// Guard for child-valued fields. Fails without side effects when the new
    /// child already belongs to another parent; otherwise moves ownership from
    /// the old child to the new one.
    pub fn prepare_child_for_assignment<H: ChildHandle>(
        &self,
        old: Option<&H>,
        new: Option<H>,
    ) -> Result<Option<H>, OwnershipError> {
        let unchanged = match (old, new.as_ref()) {
            (Some(old), Some(new)) => old.link().ptr_eq(new.link()),
            (None, None) => true,
            _ => false,
        };
        if unchanged {
            return Ok(new);
        }

        if let Some(new) = &new {
            self.link.check_attachable(new.link())?;
        }
        if let Some(old) = old {
            self.link.detach(old.link());
        }
        if let Some(new) = &new {
            self.link.attach(new.link())?;
        }
        self.link.release_this_and_parent_dom();
        Ok(new)
    }
}

/// Objects with an owning parent
pub trait HasParent {
    fn parent(&self) -> Option<XmlObjectRef>;

    fn has_parent(&self) -> bool;
}

impl<T: XmlObject + ?Sized> HasParent for T {
    fn parent(&self) -> Option<XmlObjectRef> {
        self.core().link().parent()?.object()
    }

    fn has_parent(&self) -> bool {
        self.core().link().has_parent()
    }
}

/// The DOM caching protocol
pub trait CachesDom {
    fn dom(&self) -> Option<Arc<Element>>;

    fn set_dom(&self, dom: Option<Arc<Element>>);

    fn release_dom(&self);

    fn release_parent_dom(&self, propagate: bool);

    fn release_children_dom(&self, propagate: bool);

    fn release_this_and_parent_dom(&self);

    fn release_this_and_children_dom(&self);
}

impl<T: XmlObject + ?Sized> CachesDom for T {
    fn dom(&self) -> Option<Arc<Element>> {
        self.core().link().dom()
    }

    fn set_dom(&self, dom: Option<Arc<Element>>) {
        self.core().link().set_dom(dom);
    }

    fn release_dom(&self) {
        self.core().link().release_dom();
    }

    fn release_parent_dom(&self, propagate: bool) {
        self.core().link().release_parent_dom(propagate);
    }

    fn release_children_dom(&self, propagate: bool) {
        for child in self.ordered_children() {
            child.link().release_dom();
            if propagate {
                child.read().release_children_dom(true);
            }
        }
    }

    fn release_this_and_parent_dom(&self) {
        self.core().link().release_this_and_parent_dom();
    }

    fn release_this_and_children_dom(&self) {
        self.release_dom();
        self.release_children_dom(true);
    }
}

/// Objects carrying arbitrary attributes beyond their schema-defined ones
pub trait AttributeExtensible {
    fn unknown_attributes(&self) -> &AttributeMap;

    fn unknown_attributes_mut(&mut self) -> &mut AttributeMap;
}

/// Objects carrying arbitrary child elements
pub trait ElementExtensible {
    fn unknown_children(&self) -> &XmlObjectChildrenList<XmlObjectRef>;

    fn unknown_children_mut(&mut self) -> &mut XmlObjectChildrenList<XmlObjectRef>;
}

/// Objects that may carry an enveloped signature element. The signature is
/// an opaque child; producing or checking it happens elsewhere.
pub trait Signable {
    fn signature(&self) -> Option<&XmlObjectRef>;

    fn set_signature(&mut self, signature: Option<XmlObjectRef>) -> Result<(), OwnershipError>;

    fn is_signed(&self) -> bool {
        self.signature().is_some()
    }
}

/// A check applied to an object of type `T`
pub trait Validator<T: ?Sized>: Send + Sync {
    fn validate(&self, object: &T) -> Result<(), ValidationError>;
}

/// Validators registered on an object
pub struct ValidatorSuite<T: ?Sized> {
    validators: Vec<Arc<dyn Validator<T>>>,
}

impl<T: ?Sized> ValidatorSuite<T> {
    pub fn new() -> Self {
        Self {
            validators: Vec::new(),
        }
    }

    pub fn register(&mut self, validator: Arc<dyn Validator<T>>) {
        self.validators.push(validator);
    }

    pub fn deregister(&mut self, validator: &Arc<dyn Validator<T>>) {
        self.validators.retain(|v| !Arc::ptr_eq(v, validator));
    }

    pub fn len(&self) -> usize {
        self.validators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    /// Run every validator, stopping at the first failure
    pub fn run(&self, object: &T) -> Result<(), ValidationError> {
        self.validators.iter().try_for_each(|v| v.validate(object))
    }
}

impl<T: ?Sized> Default for ValidatorSuite<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> fmt::Debug for ValidatorSuite<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidatorSuite")
            .field("validators", &self.validators.len())
            .finish()
    }
}

/// Objects that can be validated, optionally together with their descendants
pub trait Validatable {
    fn validate(&self, deep: bool) -> Result<(), ValidationError>;
}

/// Validate every validatable child of `object`, recursively
pub fn validate_children(object: &dyn XmlObject) -> Result<(), ValidationError> {
    for child in object.ordered_children() {
        let guard = child.read();
        match guard.as_validatable() {
            Some(validatable) => validatable.validate(true)?,
            None => validate_children(&*guard)?,
        }
    }
    Ok(())
}

