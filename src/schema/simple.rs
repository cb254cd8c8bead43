//! Elements whose content is a single XML Schema simple-typed value.

use std::fmt;
use std::marker::PhantomData;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::dom::ElementBuilder;
use crate::error::{MarshallResult, UnmarshallResult, UnmarshallingError};
use crate::io::marshaller::expect_object;
use crate::io::unmarshaller::{expect_target, parse_xml_boolean};
use crate::io::{Marshaller, Unmarshaller, UnmarshallingContext};
use crate::object::{XmlObject, XmlObjectCore, XmlObjectRef, XmlRef};
use crate::qname::QName;

/// A value with an XML Schema lexical form
pub trait SimpleValue: Clone + PartialEq + fmt::Debug + Send + Sync + 'static {
    /// Local name of the built-in type, e.g. `string`
    const TYPE_NAME: &'static str;

    fn parse(text: &str) -> Result<Self, String>;

    fn format(&self) -> String;
}

impl SimpleValue for String {
    const TYPE_NAME: &'static str = "string";

    fn parse(text: &str) -> Result<Self, String> {
        Ok(text.to_string())
    }

    fn format(&self) -> String {
        self.clone()
    }
}

impl SimpleValue for i64 {
    const TYPE_NAME: &'static str = "integer";

    fn parse(text: &str) -> Result<Self, String> {
        text.trim().parse::<i64>().map_err(|e| e.to_string())
    }

    fn format(&self) -> String {
        self.to_string()
    }
}

impl SimpleValue for bool {
    const TYPE_NAME: &'static str = "boolean";

    fn parse(text: &str) -> Result<Self, String> {
        parse_xml_boolean(text).ok_or_else(|| "expected true, false, 1 or 0".to_string())
    }

    fn format(&self) -> String {
        self.to_string()
    }
}

impl SimpleValue for DateTime<Utc> {
    const TYPE_NAME: &'static str = "dateTime";

    fn parse(text: &str) -> Result<Self, String> {
        DateTime::parse_from_rfc3339(text.trim())
            .map(|value| value.with_timezone(&Utc))
            .map_err(|e| e.to_string())
    }

    fn format(&self) -> String {
        self.to_rfc3339_opts(SecondsFormat::AutoSi, true)
    }
}

/// `xs:anyURI` value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnyUri(pub String);

impl SimpleValue for AnyUri {
    const TYPE_NAME: &'static str = "anyURI";

    fn parse(text: &str) -> Result<Self, String> {
        let text = text.trim();
        if text.chars().any(char::is_whitespace) {
            return Err("URI contains whitespace".to_string());
        }
        Ok(AnyUri(text.to_string()))
    }

    fn format(&self) -> String {
        self.0.clone()
    }
}

/// Element holding one simple-typed value
#[derive(Debug)]
pub struct XsSimple<V: SimpleValue> {
    core: XmlObjectCore,
    value: Option<V>,
}

pub type XsString = XsSimple<String>;
pub type XsInteger = XsSimple<i64>;
pub type XsBoolean = XsSimple<bool>;
pub type XsDateTime = XsSimple<DateTime<Utc>>;
pub type XsUri = XsSimple<AnyUri>;

impl<V: SimpleValue> XsSimple<V> {
    pub fn new(element_name: QName, schema_type: Option<QName>) -> Self {
        Self {
            core: XmlObjectCore::new(element_name, schema_type),
            value: None,
        }
    }

    /// A new element typed with `xsi:type` set to this value's built-in type
    pub fn build(element_name: QName) -> XmlRef<Self> {
        XmlRef::new(Self::new(element_name, Some(Self::type_name())))
    }

    pub fn type_name() -> QName {
        crate::constants::xsd_type(V::TYPE_NAME)
    }

    pub fn value(&self) -> Option<&V> {
        self.value.as_ref()
    }

    pub fn set_value(&mut self, value: Option<V>) {
        self.value = self.core.prepare_for_assignment(&self.value, value);
    }
}

impl<V: SimpleValue> XmlObject for XsSimple<V> {
    fn core(&self) -> &XmlObjectCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut XmlObjectCore {
        &mut self.core
    }

    fn ordered_children(&self) -> Vec<XmlObjectRef> {
        Vec::new()
    }
}

pub struct XsSimpleUnmarshaller<V>(PhantomData<fn() -> V>);

impl<V> XsSimpleUnmarshaller<V> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<V> Default for XsSimpleUnmarshaller<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: SimpleValue> Unmarshaller for XsSimpleUnmarshaller<V> {
    fn process_element_content(
        &self,
        target: &mut dyn XmlObject,
        content: &str,
        _ctx: &UnmarshallingContext<'_>,
    ) -> UnmarshallResult<()> {
        let value = V::parse(content).map_err(|reason| UnmarshallingError::MalformedContent {
            element: target.element_qname().clone(),
            value: content.to_string(),
            reason,
        })?;
        expect_target::<XsSimple<V>>(target, V::TYPE_NAME)?.set_value(Some(value));
        Ok(())
    }
}

pub struct XsSimpleMarshaller<V>(PhantomData<fn() -> V>);

impl<V> XsSimpleMarshaller<V> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<V> Default for XsSimpleMarshaller<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: SimpleValue> Marshaller for XsSimpleMarshaller<V> {
    fn marshall_element_content(&self, object: &dyn XmlObject, element: &mut ElementBuilder) -> MarshallResult<()> {
        if let Some(value) = expect_object::<XsSimple<V>>(object, V::TYPE_NAME)?.value() {
            element.append_text(value.format());
        }
        Ok(())
    }
}
