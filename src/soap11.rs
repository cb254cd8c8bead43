//! SOAP 1.1 envelope object model.

use std::sync::Arc;

use crate::constants::{SOAP11ENV_NS, SOAP11ENV_PREFIX, XMLDSIG_NS};
use crate::dom::ElementBuilder;
use crate::error::{MarshallResult, OwnershipError, UnmarshallResult, ValidationError};
use crate::io::marshaller::{expect_object, marshall_qname_content};
use crate::io::unmarshaller::{expect_target, unknown_child};
use crate::io::{Marshaller, Unmarshaller, UnmarshallingContext};
use crate::object::{
    AttributeExtensible, AttributeMap, ElementExtensible, Signable, Validatable, Validator,
    ValidatorSuite, XmlObject, XmlObjectChildrenList, XmlObjectCore, XmlObjectRef, XmlRef,
    validate_children,
};
use crate::qname::QName;
use crate::registry::{Provider, XmlObjectProviderRegistry};
use crate::schema::{AnyUri, XsString, XsUri, simple_provider};

fn soap_name(local: &str) -> QName {
    QName::new(Some(SOAP11ENV_NS), local, Some(SOAP11ENV_PREFIX))
}

/// `soap11:Envelope`
#[derive(Debug)]
pub struct Envelope {
    core: XmlObjectCore,
    header: Option<XmlRef<Header>>,
    body: Option<XmlRef<Body>>,
    unknown_attributes: AttributeMap,
    unknown_children: XmlObjectChildrenList<XmlObjectRef>,
    validators: ValidatorSuite<Envelope>,
}

impl Envelope {
    pub fn default_element_name() -> QName {
        soap_name("Envelope")
    }

    pub fn new(element_name: QName, schema_type: Option<QName>) -> Self {
        let core = XmlObjectCore::new(element_name, schema_type);
        let unknown_attributes = core.new_attribute_map();
        let unknown_children = core.new_child_list();
        Self {
            core,
            header: None,
            body: None,
            unknown_attributes,
            unknown_children,
            validators: ValidatorSuite::new(),
        }
    }

    /// A new envelope carrying the schema validator
    pub fn build() -> XmlRef<Self> {
        let mut envelope = Self::new(Self::default_element_name(), None);
        envelope.validators.register(Arc::new(EnvelopeSchemaValidator));
        XmlRef::new(envelope)
    }

    pub fn header(&self) -> Option<&XmlRef<Header>> {
        self.header.as_ref()
    }

    pub fn set_header(&mut self, header: Option<XmlRef<Header>>) -> Result<(), OwnershipError> {
        self.header = self.core.prepare_child_for_assignment(self.header.as_ref(), header)?;
        Ok(())
    }

    pub fn body(&self) -> Option<&XmlRef<Body>> {
        self.body.as_ref()
    }

    pub fn set_body(&mut self, body: Option<XmlRef<Body>>) -> Result<(), OwnershipError> {
        self.body = self.core.prepare_child_for_assignment(self.body.as_ref(), body)?;
        Ok(())
    }

    pub fn validators_mut(&mut self) -> &mut ValidatorSuite<Envelope> {
        &mut self.validators
    }
}

impl XmlObject for Envelope {
    fn core(&self) -> &XmlObjectCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut XmlObjectCore {
        &mut self.core
    }

    fn ordered_children(&self) -> Vec<XmlObjectRef> {
        let mut children = Vec::with_capacity(2 + self.unknown_children.len());
        children.extend(self.header.iter().map(XmlRef::erase));
        children.extend(self.body.iter().map(XmlRef::erase));
        children.extend(self.unknown_children.to_object_refs());
        children
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

    fn as_validatable(&self) -> Option<&dyn Validatable> {
        Some(self)
    }
}

impl AttributeExtensible for Envelope {
    fn unknown_attributes(&self) -> &AttributeMap {
        &self.unknown_attributes
    }

    fn unknown_attributes_mut(&mut self) -> &mut AttributeMap {
        &mut self.unknown_attributes
    }
}

impl ElementExtensible for Envelope {
    fn unknown_children(&self) -> &XmlObjectChildrenList<XmlObjectRef> {
        &self.unknown_children
    }

    fn unknown_children_mut(&mut self) -> &mut XmlObjectChildrenList<XmlObjectRef> {
        &mut self.unknown_children
    }
}

impl Validatable for Envelope {
    fn validate(&self, deep: bool) -> Result<(), ValidationError> {
        self.validators.run(self)?;
        if deep {
            validate_children(self)?;
        }
        Ok(())
    }
}

/// An envelope must carry a body
pub struct EnvelopeSchemaValidator;

impl Validator<Envelope> for EnvelopeSchemaValidator {
    fn validate(&self, envelope: &Envelope) -> Result<(), ValidationError> {
        if envelope.body().is_none() {
            return Err(ValidationError::new(
                envelope.element_qname(),
                "Body element is required",
            ));
        }
        Ok(())
    }
}

pub struct EnvelopeUnmarshaller;

impl Unmarshaller for EnvelopeUnmarshaller {
    fn process_child_element(
        &self,
        parent: &mut dyn XmlObject,
        child: XmlObjectRef,
        ctx: &UnmarshallingContext<'_>,
    ) -> UnmarshallResult<()> {
        let envelope = expect_target::<Envelope>(parent, "Envelope")?;
        if let Some(header) = child.downcast::<Header>() {
            envelope.set_header(Some(header))?;
        } else if let Some(body) = child.downcast::<Body>() {
            envelope.set_body(Some(body))?;
        } else {
            unknown_child(envelope, child, ctx)?;
        }
        Ok(())
    }
}

/// `soap11:Header`; may carry an enveloped `ds:Signature`
#[derive(Debug)]
pub struct Header {
    core: XmlObjectCore,
    signature: Option<XmlObjectRef>,
    unknown_attributes: AttributeMap,
    unknown_children: XmlObjectChildrenList<XmlObjectRef>,
}

impl Header {
    pub fn default_element_name() -> QName {
        soap_name("Header")
    }

    pub fn new(element_name: QName, schema_type: Option<QName>) -> Self {
        let core = XmlObjectCore::new(element_name, schema_type);
        let unknown_attributes = core.new_attribute_map();
        let unknown_children = core.new_child_list();
        Self {
            core,
            signature: None,
            unknown_attributes,
            unknown_children,
        }
    }

    pub fn build() -> XmlRef<Self> {
        XmlRef::new(Self::new(Self::default_element_name(), None))
    }
}

impl XmlObject for Header {
    fn core(&self) -> &XmlObjectCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut XmlObjectCore {
        &mut self.core
    }

    fn ordered_children(&self) -> Vec<XmlObjectRef> {
        let mut children: Vec<XmlObjectRef> = self.signature.iter().cloned().collect();
        children.extend(self.unknown_children.to_object_refs());
        children
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

    fn as_signable(&self) -> Option<&dyn Signable> {
        Some(self)
    }
}

impl AttributeExtensible for Header {
    fn unknown_attributes(&self) -> &AttributeMap {
        &self.unknown_attributes
    }

    fn unknown_attributes_mut(&mut self) -> &mut AttributeMap {
        &mut self.unknown_attributes
    }
}

impl ElementExtensible for Header {
    fn unknown_children(&self) -> &XmlObjectChildrenList<XmlObjectRef> {
        &self.unknown_children
    }

    fn unknown_children_mut(&mut self) -> &mut XmlObjectChildrenList<XmlObjectRef> {
        &mut self.unknown_children
    }
}

impl Signable for Header {
    fn signature(&self) -> Option<&XmlObjectRef> {
        self.signature.as_ref()
    }

    fn set_signature(&mut self, signature: Option<XmlObjectRef>) -> Result<(), OwnershipError> {
        self.signature = self
            .core
            .prepare_child_for_assignment(self.signature.as_ref(), signature)?;
        Ok(())
    }
}

pub struct HeaderUnmarshaller;

impl Unmarshaller for HeaderUnmarshaller {
    fn process_child_element(
        &self,
        parent: &mut dyn XmlObject,
        child: XmlObjectRef,
        ctx: &UnmarshallingContext<'_>,
    ) -> UnmarshallResult<()> {
        let header = expect_target::<Header>(parent, "Header")?;
        let is_signature = child.element_qname().namespace_uri() == Some(XMLDSIG_NS)
            && child.element_qname().local_part() == "Signature";
        if is_signature && header.signature().is_none() {
            header.set_signature(Some(child))?;
            return Ok(());
        }
        unknown_child(header, child, ctx)
    }
}

/// `soap11:Body`
#[derive(Debug)]
pub struct Body {
    core: XmlObjectCore,
    unknown_attributes: AttributeMap,
    unknown_children: XmlObjectChildrenList<XmlObjectRef>,
}

impl Body {
    pub fn default_element_name() -> QName {
        soap_name("Body")
    }

    pub fn new(element_name: QName, schema_type: Option<QName>) -> Self {
        let core = XmlObjectCore::new(element_name, schema_type);
        let unknown_attributes = core.new_attribute_map();
        let unknown_children = core.new_child_list();
        Self {
            core,
            unknown_attributes,
            unknown_children,
        }
    }

    pub fn build() -> XmlRef<Self> {
        XmlRef::new(Self::new(Self::default_element_name(), None))
    }

    /// The first `Fault` in the body, if any
    pub fn fault(&self) -> Option<XmlRef<Fault>> {
        self.unknown_children.iter().find_map(|child| child.downcast::<Fault>())
    }
}

impl XmlObject for Body {
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

impl AttributeExtensible for Body {
    fn unknown_attributes(&self) -> &AttributeMap {
        &self.unknown_attributes
    }

    fn unknown_attributes_mut(&mut self) -> &mut AttributeMap {
        &mut self.unknown_attributes
    }
}

impl ElementExtensible for Body {
    fn unknown_children(&self) -> &XmlObjectChildrenList<XmlObjectRef> {
        &self.unknown_children
    }

    fn unknown_children_mut(&mut self) -> &mut XmlObjectChildrenList<XmlObjectRef> {
        &mut self.unknown_children
    }
}

/// `soap11:Fault`. Its children are unqualified elements.
#[derive(Debug)]
pub struct Fault {
    core: XmlObjectCore,
    code: Option<XmlRef<FaultCode>>,
    message: Option<XmlRef<XsString>>,
    actor: Option<XmlRef<XsUri>>,
    detail: Option<XmlRef<Detail>>,
    validators: ValidatorSuite<Fault>,
}

impl Fault {
    pub fn default_element_name() -> QName {
        soap_name("Fault")
    }

    pub fn fault_string_name() -> QName {
        QName::local("faultstring")
    }

    pub fn fault_actor_name() -> QName {
        QName::local("faultactor")
    }

    pub fn new(element_name: QName, schema_type: Option<QName>) -> Self {
        Self {
            core: XmlObjectCore::new(element_name, schema_type),
            code: None,
            message: None,
            actor: None,
            detail: None,
            validators: ValidatorSuite::new(),
        }
    }

    /// A new fault carrying the schema validator
    pub fn build() -> XmlRef<Self> {
        let mut fault = Self::new(Self::default_element_name(), None);
        fault.validators.register(Arc::new(FaultSchemaValidator));
        XmlRef::new(fault)
    }

    pub fn code(&self) -> Option<&XmlRef<FaultCode>> {
        self.code.as_ref()
    }

    pub fn set_code(&mut self, code: Option<XmlRef<FaultCode>>) -> Result<(), OwnershipError> {
        self.code = self.core.prepare_child_for_assignment(self.code.as_ref(), code)?;
        Ok(())
    }

    pub fn message(&self) -> Option<&XmlRef<XsString>> {
        self.message.as_ref()
    }

    pub fn set_message(&mut self, message: Option<XmlRef<XsString>>) -> Result<(), OwnershipError> {
        self.message = self
            .core
            .prepare_child_for_assignment(self.message.as_ref(), message)?;
        Ok(())
    }

    pub fn actor(&self) -> Option<&XmlRef<XsUri>> {
        self.actor.as_ref()
    }

    pub fn set_actor(&mut self, actor: Option<XmlRef<XsUri>>) -> Result<(), OwnershipError> {
        self.actor = self.core.prepare_child_for_assignment(self.actor.as_ref(), actor)?;
        Ok(())
    }

    pub fn detail(&self) -> Option<&XmlRef<Detail>> {
        self.detail.as_ref()
    }

    pub fn set_detail(&mut self, detail: Option<XmlRef<Detail>>) -> Result<(), OwnershipError> {
        self.detail = self.core.prepare_child_for_assignment(self.detail.as_ref(), detail)?;
        Ok(())
    }

    /// Build a `faultstring` child holding `text`
    pub fn message_element(text: &str) -> XmlRef<XsString> {
        let message = XmlRef::new(XsString::new(Self::fault_string_name(), None));
        message.write().set_value(Some(text.to_string()));
        message
    }

    /// Build a `faultactor` child holding `uri`
    pub fn actor_element(uri: &str) -> XmlRef<XsUri> {
        let actor = XmlRef::new(XsUri::new(Self::fault_actor_name(), None));
        actor.write().set_value(Some(AnyUri(uri.to_string())));
        actor
    }

    pub fn validators_mut(&mut self) -> &mut ValidatorSuite<Fault> {
        &mut self.validators
    }
}

impl XmlObject for Fault {
    fn core(&self) -> &XmlObjectCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut XmlObjectCore {
        &mut self.core
    }

    fn ordered_children(&self) -> Vec<XmlObjectRef> {
        let mut children = Vec::with_capacity(4);
        children.extend(self.code.iter().map(XmlRef::erase));
        children.extend(self.message.iter().map(XmlRef::erase));
        children.extend(self.actor.iter().map(XmlRef::erase));
        children.extend(self.detail.iter().map(XmlRef::erase));
        children
    }

    fn as_validatable(&self) -> Option<&dyn Validatable> {
        Some(self)
    }
}

impl Validatable for Fault {
    fn validate(&self, deep: bool) -> Result<(), ValidationError> {
        self.validators.run(self)?;
        if deep {
            validate_children(self)?;
        }
        Ok(())
    }
}

/// A fault must carry a code and a message
pub struct FaultSchemaValidator;

impl Validator<Fault> for FaultSchemaValidator {
    fn validate(&self, fault: &Fault) -> Result<(), ValidationError> {
        let has_code = fault.code().is_some_and(|code| code.read().value().is_some());
        if !has_code {
            return Err(ValidationError::new(fault.element_qname(), "faultcode is required"));
        }
        let has_message = fault
            .message()
            .is_some_and(|message| message.read().value().is_some());
        if !has_message {
            return Err(ValidationError::new(fault.element_qname(), "faultstring is required"));
        }
        Ok(())
    }
}

pub struct FaultUnmarshaller;

impl Unmarshaller for FaultUnmarshaller {
    fn process_child_element(
        &self,
        parent: &mut dyn XmlObject,
        child: XmlObjectRef,
        ctx: &UnmarshallingContext<'_>,
    ) -> UnmarshallResult<()> {
        let fault = expect_target::<Fault>(parent, "Fault")?;
        let name = child.element_qname().clone();
        if let Some(code) = child.downcast::<FaultCode>() {
            fault.set_code(Some(code))?;
        } else if let Some(detail) = child.downcast::<Detail>() {
            fault.set_detail(Some(detail))?;
        } else if let Some(message) = child.downcast::<XsString>()
            && name == Fault::fault_string_name()
        {
            fault.set_message(Some(message))?;
        } else if let Some(actor) = child.downcast::<XsUri>()
            && name == Fault::fault_actor_name()
        {
            fault.set_actor(Some(actor))?;
        } else {
            unknown_child(fault, child, ctx)?;
        }
        Ok(())
    }
}

/// `faultcode`, a QName resolved against the in-scope namespaces
#[derive(Debug)]
pub struct FaultCode {
    core: XmlObjectCore,
    value: Option<QName>,
}

impl FaultCode {
    pub fn default_element_name() -> QName {
        QName::local("faultcode")
    }

    /// `soap11:Client`
    pub fn client() -> QName {
        soap_name("Client")
    }

    /// `soap11:Server`
    pub fn server() -> QName {
        soap_name("Server")
    }

    /// `soap11:VersionMismatch`
    pub fn version_mismatch() -> QName {
        soap_name("VersionMismatch")
    }

    /// `soap11:MustUnderstand`
    pub fn must_understand() -> QName {
        soap_name("MustUnderstand")
    }

    pub fn new(element_name: QName, schema_type: Option<QName>) -> Self {
        Self {
            core: XmlObjectCore::new(element_name, schema_type),
            value: None,
        }
    }

    pub fn build(value: QName) -> XmlRef<Self> {
        let mut code = Self::new(Self::default_element_name(), None);
        code.value = Some(value);
        XmlRef::new(code)
    }

    pub fn value(&self) -> Option<&QName> {
        self.value.as_ref()
    }

    pub fn set_value(&mut self, value: Option<QName>) {
        self.value = self.core.prepare_for_assignment(&self.value, value);
    }
}

impl XmlObject for FaultCode {
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

pub struct FaultCodeUnmarshaller;

impl Unmarshaller for FaultCodeUnmarshaller {
    fn process_element_content(
        &self,
        target: &mut dyn XmlObject,
        content: &str,
        ctx: &UnmarshallingContext<'_>,
    ) -> UnmarshallResult<()> {
        let value = ctx.resolve_qname(content)?;
        expect_target::<FaultCode>(target, "FaultCode")?.set_value(Some(value));
        Ok(())
    }
}

pub struct FaultCodeMarshaller;

impl Marshaller for FaultCodeMarshaller {
    fn marshall_element_content(&self, object: &dyn XmlObject, element: &mut ElementBuilder) -> MarshallResult<()> {
        if let Some(value) = expect_object::<FaultCode>(object, "FaultCode")?.value() {
            marshall_qname_content(value, element);
        }
        Ok(())
    }
}

/// `detail`, free-form fault details
#[derive(Debug)]
pub struct Detail {
    core: XmlObjectCore,
    unknown_attributes: AttributeMap,
    unknown_children: XmlObjectChildrenList<XmlObjectRef>,
}

impl Detail {
    pub fn default_element_name() -> QName {
        QName::local("detail")
    }

    pub fn new(element_name: QName, schema_type: Option<QName>) -> Self {
        let core = XmlObjectCore::new(element_name, schema_type);
        let unknown_attributes = core.new_attribute_map();
        let unknown_children = core.new_child_list();
        Self {
            core,
            unknown_attributes,
            unknown_children,
        }
    }

    pub fn build() -> XmlRef<Self> {
        XmlRef::new(Self::new(Self::default_element_name(), None))
    }
}

impl XmlObject for Detail {
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

impl AttributeExtensible for Detail {
    fn unknown_attributes(&self) -> &AttributeMap {
        &self.unknown_attributes
    }

    fn unknown_attributes_mut(&mut self) -> &mut AttributeMap {
        &mut self.unknown_attributes
    }
}

impl ElementExtensible for Detail {
    fn unknown_children(&self) -> &XmlObjectChildrenList<XmlObjectRef> {
        &self.unknown_children
    }

    fn unknown_children_mut(&mut self) -> &mut XmlObjectChildrenList<XmlObjectRef> {
        &mut self.unknown_children
    }
}

/// Marshaller and unmarshaller for types handled entirely by the engine's
/// defaults: extension attributes and ordered children.
pub struct ExtensibleMarshaller;

impl Marshaller for ExtensibleMarshaller {}

pub struct ExtensibleUnmarshaller;

impl Unmarshaller for ExtensibleUnmarshaller {}

pub(crate) fn register_providers(registry: &XmlObjectProviderRegistry) {
    registry.register(
        Envelope::default_element_name(),
        Provider::new(
            |name: QName, schema_type: Option<QName>| {
                let mut envelope = Envelope::new(name, schema_type);
                envelope.validators.register(Arc::new(EnvelopeSchemaValidator));
                XmlObjectRef::new(envelope)
            },
            ExtensibleMarshaller,
            EnvelopeUnmarshaller,
        ),
    );
    registry.register(
        Header::default_element_name(),
        Provider::new(
            |name: QName, schema_type: Option<QName>| XmlObjectRef::new(Header::new(name, schema_type)),
            ExtensibleMarshaller,
            HeaderUnmarshaller,
        ),
    );
    registry.register(
        Body::default_element_name(),
        Provider::new(
            |name: QName, schema_type: Option<QName>| XmlObjectRef::new(Body::new(name, schema_type)),
            ExtensibleMarshaller,
            ExtensibleUnmarshaller,
        ),
    );
    registry.register(
        Fault::default_element_name(),
        Provider::new(
            |name: QName, schema_type: Option<QName>| {
                let mut fault = Fault::new(name, schema_type);
                fault.validators.register(Arc::new(FaultSchemaValidator));
                XmlObjectRef::new(fault)
            },
            ExtensibleMarshaller,
            FaultUnmarshaller,
        ),
    );
    registry.register(
        FaultCode::default_element_name(),
        Provider::new(
            |name: QName, schema_type: Option<QName>| XmlObjectRef::new(FaultCode::new(name, schema_type)),
            FaultCodeMarshaller,
            FaultCodeUnmarshaller,
        ),
    );
    registry.register(
        Detail::default_element_name(),
        Provider::new(
            |name: QName, schema_type: Option<QName>| XmlObjectRef::new(Detail::new(name, schema_type)),
            ExtensibleMarshaller,
            ExtensibleUnmarshaller,
        ),
    );
    registry.register(Fault::fault_string_name(), simple_provider::<String>());
    registry.register(Fault::fault_actor_name(), simple_provider::<AnyUri>());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{parse_str, to_string};
    use crate::error::UnmarshallingError;
    use crate::io::UnmarshallingContext;
    use crate::object::CachesDom;
    use crate::schema::XsAny;

    const FAULT: &str = r#"<soap11:Envelope xmlns:soap11="http://schemas.xmlsoap.org/soap/envelope/">
  <soap11:Header>
    <ds:Signature xmlns:ds="http://www.w3.org/2000/09/xmldsig#"/>
    <ext:Token xmlns:ext="urn:ext">abc</ext:Token>
  </soap11:Header>
  <soap11:Body>
    <soap11:Fault>
      <faultcode>soap11:Client</faultcode>
      <faultstring>Bad request</faultstring>
      <faultactor>urn:actor</faultactor>
      <detail><ext:Why xmlns:ext="urn:ext">missing id</ext:Why></detail>
    </soap11:Fault>
  </soap11:Body>
</soap11:Envelope>"#;

    fn registry() -> XmlObjectProviderRegistry {
        XmlObjectProviderRegistry::with_defaults()
    }

    #[test]
    fn test_unmarshall_fault_envelope() {
        let object = registry().unmarshall_str(FAULT).unwrap();
        let envelope = object.downcast::<Envelope>().unwrap();
        let envelope = envelope.read();

        let header = envelope.header().unwrap().read();
        assert!(header.is_signed());
        assert_eq!(header.unknown_children().len(), 1);

        let body = envelope.body().unwrap().read();
        let fault = body.fault().unwrap();
        let fault = fault.read();
        assert_eq!(fault.code().unwrap().read().value(), Some(&FaultCode::client()));
        assert_eq!(
            fault.message().unwrap().read().value().map(String::as_str),
            Some("Bad request")
        );
        assert_eq!(
            fault.actor().unwrap().read().value(),
            Some(&AnyUri("urn:actor".to_string()))
        );
        assert_eq!(fault.detail().unwrap().read().unknown_children().len(), 1);
        assert!(fault.validate(true).is_ok());
        assert!(envelope.validate(true).is_ok());
    }

    #[test]
    fn test_fault_envelope_round_trips() {
        let registry = registry();
        let document = parse_str(FAULT).unwrap();
        let object = registry.unmarshall_element(document.root()).unwrap();
        object.read().release_this_and_children_dom();

        let xml = registry.marshall_to_string(&object).unwrap();
        let reparsed = parse_str(&xml).unwrap();
        assert!(document.root().structurally_equals(reparsed.root()));
    }

    #[test]
    fn test_build_envelope_from_scratch() {
        let registry = registry();
        let envelope = Envelope::build();
        assert!(envelope.read().validate(false).is_err());

        let body = Body::build();
        let fault = Fault::build();
        {
            let mut f = fault.write();
            f.set_code(Some(FaultCode::build(FaultCode::server()))).unwrap();
            f.set_message(Some(Fault::message_element("boom"))).unwrap();
        }
        body.write().unknown_children_mut().push(fault.erase()).unwrap();
        envelope.write().set_body(Some(body)).unwrap();
        assert!(envelope.read().validate(true).is_ok());

        let xml = registry.marshall_to_string(&envelope.erase()).unwrap();
        assert!(xml.contains("soap11:Server"));

        let parsed = registry.unmarshall_str(&xml).unwrap();
        let parsed = parsed.downcast::<Envelope>().unwrap();
        let fault = parsed.read().body().unwrap().read().fault().unwrap();
        assert_eq!(fault.read().code().unwrap().read().value(), Some(&FaultCode::server()));
    }

    #[test]
    fn test_invalid_fault_fails_deep_validation() {
        let envelope = Envelope::build();
        let body = Body::build();
        body.write().unknown_children_mut().push(Fault::build().erase()).unwrap();
        envelope.write().set_body(Some(body)).unwrap();

        assert!(envelope.read().validate(false).is_ok());
        let err = envelope.read().validate(true).unwrap_err();
        assert!(err.message.contains("faultcode"));
    }

    #[test]
    fn test_changing_fault_code_invalidates_ancestors() {
        let registry = registry();
        let object = registry.unmarshall_str(FAULT).unwrap();
        let envelope = object.downcast::<Envelope>().unwrap();
        let body = envelope.read().body().unwrap().clone();
        let fault = body.read().fault().unwrap();
        let code = fault.read().code().unwrap().clone();
        assert!(envelope.dom().is_some());

        code.write().set_value(Some(FaultCode::server()));
        assert!(code.dom().is_none());
        assert!(fault.dom().is_none());
        assert!(body.dom().is_none());
        assert!(envelope.dom().is_none());
        assert!(envelope.read().header().unwrap().dom().is_some());

        let xml = to_string(&registry.marshall(&object).unwrap()).unwrap();
        assert!(xml.contains("soap11:Server"));
        assert!(!xml.contains("soap11:Client"));
    }

    #[test]
    fn test_body_cannot_join_two_envelopes() {
        let first = Envelope::build();
        let second = Envelope::build();
        let body = Body::build();
        first.write().set_body(Some(body.clone())).unwrap();

        let err = second.write().set_body(Some(body.clone())).unwrap_err();
        assert!(matches!(err, OwnershipError::AlreadyOwned { .. }));
        assert!(second.read().body().is_none());
        assert!(first.read().body().unwrap().ptr_eq(&body));

        first.write().set_body(None).unwrap();
        second.write().set_body(Some(body)).unwrap();
    }

    #[test]
    fn test_unknown_fault_child_is_dropped_or_rejected() {
        let xml = r#"<soap11:Fault xmlns:soap11="http://schemas.xmlsoap.org/soap/envelope/"><faultcode>soap11:Server</faultcode><extra/></soap11:Fault>"#;
        let registry = registry();
        let object = registry.unmarshall_str(xml).unwrap();
        assert_eq!(object.read().ordered_children().len(), 1);

        let document = parse_str(xml).unwrap();
        let err = UnmarshallingContext::new(&registry)
            .strict(true)
            .unmarshall(document.root())
            .unwrap_err();
        assert!(matches!(err, UnmarshallingError::UnknownChild { .. }));
    }

    #[test]
    fn test_unregistered_body_content_is_xs_any() {
        let xml = r#"<soap11:Body xmlns:soap11="http://schemas.xmlsoap.org/soap/envelope/"><app:Ping xmlns:app="urn:app" seq="1"/></soap11:Body>"#;
        let object = registry().unmarshall_str(xml).unwrap();
        let body = object.downcast::<Body>().unwrap();
        let child = body.read().unknown_children().get(0).unwrap().clone();
        assert!(child.is::<XsAny>());
    }
}
