use crate::dom::ElementBuilder;
use crate::error::{MarshallResult, UnmarshallResult};
use crate::io::marshaller::expect_object;
use crate::io::unmarshaller::expect_target;
use crate::io::{Marshaller, Unmarshaller, UnmarshallingContext};
use crate::object::{
    AttributeExtensible, AttributeMap, ElementExtensible, XmlObject, XmlObjectChildrenList,
    XmlObjectCore, XmlObjectRef, XmlRef,
};
use crate::qname::QName;

/// Any element: arbitrary attributes, children and text
#[derive(Debug)]
pub struct XsAny {
    core: XmlObjectCore,
    text_content: Option<String>,
    unknown_attributes: AttributeMap,
    unknown_children: XmlObjectChildrenList<XmlObjectRef>,
}

impl XsAny {
    pub fn new(element_name: QName, schema_type: Option<QName>) -> Self {
        let core = XmlObjectCore::new(element_name, schema_type);
        let unknown_attributes = core.new_attribute_map();
        let unknown_children = core.new_child_list();
        Self {
            core,
            text_content: None,
            unknown_attributes,
            unknown_children,
        }
    }

    pub fn build(element_name: QName) -> XmlRef<Self> {
        XmlRef::new(Self::new(element_name, None))
    }

    pub fn text_content(&self) -> Option<&str> {
        self.text_content.as_deref()
    }

    pub fn set_text_content(&mut self, text: Option<&str>) {
        self.text_content = self.core.prepare_string_for_assignment(&self.text_content, text);
    }
}

impl XmlObject for XsAny {
    fn core(&self) -> &XmlObjectCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut XmlObjectCore {
        &mut self.core
    }

    fn ordered_children(&self) -> Vec<XmlObjectRef> {
        self.unknown_children.to_object_refs()
    }

    fn as_attribute_extensible(&self) -> Option<&dyn AttributeExtensible> {
        Some(self)
    }

    fn as_attribute_extensible_mut(&mut self) -> Option<&mut dyn AttributeExtensible> {
        Some(self)
    }

    fn as_element_extensible(&self) -> Option<&dyn ElementExtensible> {
        Some(self)
    }

    fn as_element_extensible_mut(&mut self) -> Option<&mut dyn ElementExtensible> {
        Some(self)
    }
}

impl AttributeExtensible for XsAny {
    fn unknown_attributes(&self) -> &AttributeMap {
        &self.unknown_attributes
    }

    fn unknown_attributes_mut(&mut self) -> &mut AttributeMap {
        &mut self.unknown_attributes
    }
}

impl ElementExtensible for XsAny {
    fn unknown_children(&self) -> &XmlObjectChildrenList<XmlObjectRef> {
        &self.unknown_children
    }

    fn unknown_children_mut(&mut self) -> &mut XmlObjectChildrenList<XmlObjectRef> {
        &mut self.unknown_children
    }
}

pub struct XsAnyUnmarshaller;

impl Unmarshaller for XsAnyUnmarshaller {
    fn process_element_content(
        &self,
        target: &mut dyn XmlObject,
        content: &str,
        _ctx: &UnmarshallingContext<'_>,
    ) -> UnmarshallResult<()> {
        expect_target::<XsAny>(target, "XsAny")?.set_text_content(Some(content));
        Ok(())
    }
}

pub struct XsAnyMarshaller;

impl Marshaller for XsAnyMarshaller {
    fn marshall_element_content(&self, object: &dyn XmlObject, element: &mut ElementBuilder) -> MarshallResult<()> {
        if let Some(text) = expect_object::<XsAny>(object, "XsAny")?.text_content() {
            element.append_text(text);
        }
        Ok(())
    }
}
