//! Bundled generic element types
//!
//! `XsAny` is the registry's default provider, so elements nobody registered
//! still unmarshall and round-trip. The simple types are registered by their
//! XML Schema type name and picked up through `xsi:type`.

pub mod any;
pub mod simple;

use crate::object::XmlObjectRef;
use crate::qname::QName;
use crate::registry::{Provider, XmlObjectProviderRegistry};

pub use any::{XsAny, XsAnyMarshaller, XsAnyUnmarshaller};
pub use simple::{
    AnyUri, SimpleValue, XsBoolean, XsDateTime, XsInteger, XsSimple, XsSimpleMarshaller,
    XsSimpleUnmarshaller, XsString, XsUri,
};

pub fn xs_any_provider() -> Provider {
    Provider::new(
        |name: QName, schema_type: Option<QName>| XmlObjectRef::new(XsAny::new(name, schema_type)),
        XsAnyMarshaller,
        XsAnyUnmarshaller,
    )
}

pub fn simple_provider<V: SimpleValue>() -> Provider {
    Provider::new(
        |name: QName, schema_type: Option<QName>| XmlObjectRef::new(XsSimple::<V>::new(name, schema_type)),
        XsSimpleMarshaller::<V>::new(),
        XsSimpleUnmarshaller::<V>::new(),
    )
}

pub(crate) fn register_providers(registry: &XmlObjectProviderRegistry) {
    registry.set_default(xs_any_provider());
    registry.register(XsString::type_name(), simple_provider::<String>());
    registry.register(XsInteger::type_name(), simple_provider::<i64>());
    registry.register(XsBoolean::type_name(), simple_provider::<bool>());
    registry.register(XsDateTime::type_name(), simple_provider::<chrono::DateTime<chrono::Utc>>());
    registry.register(XsUri::type_name(), simple_provider::<AnyUri>());
}
