//! Registry of object providers.
//!
//! A provider is the builder/marshaller/unmarshaller triple for one element
//! name or schema type. Lookups try the element QName, then the `xsi:type`,
//! then the default provider. The registry is an explicit value with an
//! `initialize`/`shutdown` lifecycle; nothing here is process-global.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::dom::{self, Element};
use crate::error::{MarshallResult, UnmarshallResult};
use crate::io::{Marshaller, MarshallingContext, Unmarshaller, UnmarshallingContext};
use crate::object::XmlObjectRef;
use crate::qname::QName;

/// Creates empty objects
pub trait XmlObjectBuilder: Send + Sync {
    fn build_object(&self, element_name: QName, schema_type: Option<QName>) -> XmlObjectRef;
}

impl<F> XmlObjectBuilder for F
where
    F: Fn(QName, Option<QName>) -> XmlObjectRef + Send + Sync,
{
    fn build_object(&self, element_name: QName, schema_type: Option<QName>) -> XmlObjectRef {
        self(element_name, schema_type)
    }
}

/// Builder, marshaller and unmarshaller for one element or type
#[derive(Clone)]
pub struct Provider {
    builder: Arc<dyn XmlObjectBuilder>,
    marshaller: Arc<dyn Marshaller>,
    unmarshaller: Arc<dyn Unmarshaller>,
}

impl Provider {
    pub fn new(
        builder: impl XmlObjectBuilder + 'static,
        marshaller: impl Marshaller + 'static,
        unmarshaller: impl Unmarshaller + 'static,
    ) -> Self {
        Self {
            builder: Arc::new(builder),
            marshaller: Arc::new(marshaller),
            unmarshaller: Arc::new(unmarshaller),
        }
    }

    pub fn builder(&self) -> &Arc<dyn XmlObjectBuilder> {
        &self.builder
    }

    pub fn marshaller(&self) -> &Arc<dyn Marshaller> {
        &self.marshaller
    }

    pub fn unmarshaller(&self) -> &Arc<dyn Unmarshaller> {
        &self.unmarshaller
    }
}

impl fmt::Debug for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Provider").finish_non_exhaustive()
    }
}

/// Read-mostly mapping from element/type QNames to providers
#[derive(Default)]
pub struct XmlObjectProviderRegistry {
    providers: RwLock<HashMap<QName, Provider>>,
    default_provider: RwLock<Option<Provider>>,
    initialized: AtomicBool,
}

impl XmlObjectProviderRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the bundled providers registered
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        registry.initialize();
        registry
    }

    /// Register the bundled providers: XML Schema types, the `XsAny` default
    /// and SOAP 1.1. Calling it again is a no-op.
    pub fn initialize(&self) {
        if self.initialized.swap(true, Ordering::SeqCst) {
            return;
        }
        crate::schema::register_providers(self);
        crate::soap11::register_providers(self);
        info!(providers = self.providers.read().len(), "Initialized XML object providers");
    }

    /// Remove every provider, including the default
    pub fn shutdown(&self) {
        self.providers.write().clear();
        *self.default_provider.write() = None;
        self.initialized.store(false, Ordering::SeqCst);
        debug!("Cleared XML object providers");
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    /// Register a provider under an element name or schema type, replacing any existing one
    pub fn register(&self, key: QName, provider: Provider) -> Option<Provider> {
        debug!(key = %key, "Registering XML object provider");
        self.providers.write().insert(key, provider)
    }

    pub fn deregister(&self, key: &QName) -> Option<Provider> {
        self.providers.write().remove(key)
    }

    pub fn set_default(&self, provider: Provider) {
        *self.default_provider.write() = Some(provider);
    }

    pub fn clear_default(&self) {
        *self.default_provider.write() = None;
    }

    pub fn has_default(&self) -> bool {
        self.default_provider.read().is_some()
    }

    /// Provider registered under exactly this key
    pub fn provider(&self, key: &QName) -> Option<Provider> {
        self.providers.read().get(key).cloned()
    }

    /// Registered keys in sorted order
    pub fn providers(&self) -> Vec<QName> {
        let mut keys: Vec<QName> = self.providers.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Lookup by element name, then schema type, then the default provider
    pub fn resolve(&self, element_name: &QName, schema_type: Option<&QName>) -> Option<Provider> {
        {
            let providers = self.providers.read();
            if let Some(provider) = providers.get(element_name) {
                return Some(provider.clone());
            }
            if let Some(provider) = schema_type.and_then(|t| providers.get(t)) {
                return Some(provider.clone());
            }
        }
        self.default_provider.read().clone()
    }

    pub fn builder_for(&self, element_name: &QName, schema_type: Option<&QName>) -> Option<Arc<dyn XmlObjectBuilder>> {
        self.resolve(element_name, schema_type)
            .map(|p| Arc::clone(p.builder()))
    }

    pub fn marshaller_for(&self, element_name: &QName, schema_type: Option<&QName>) -> Option<Arc<dyn Marshaller>> {
        self.resolve(element_name, schema_type)
            .map(|p| Arc::clone(p.marshaller()))
    }

    pub fn unmarshaller_for(
        &self,
        element_name: &QName,
        schema_type: Option<&QName>,
    ) -> Option<Arc<dyn Unmarshaller>> {
        self.resolve(element_name, schema_type)
            .map(|p| Arc::clone(p.unmarshaller()))
    }

    /// Build an empty object for an element name and optional schema type
    pub fn build(&self, element_name: QName, schema_type: Option<QName>) -> Option<XmlObjectRef> {
        let builder = self.builder_for(&element_name, schema_type.as_ref())?;
        Some(builder.build_object(element_name, schema_type))
    }

    pub fn unmarshall_element(&self, element: &Arc<Element>) -> UnmarshallResult<XmlObjectRef> {
        UnmarshallingContext::new(self).unmarshall(element)
    }

    pub fn unmarshall_str(&self, xml: &str) -> UnmarshallResult<XmlObjectRef> {
        let document = dom::parse_str(xml)?;
        self.unmarshall_element(document.root())
    }

    pub fn marshall(&self, object: &XmlObjectRef) -> MarshallResult<Arc<Element>> {
        MarshallingContext::new(self).marshall(object)
    }

    pub fn marshall_to_string(&self, object: &XmlObjectRef) -> MarshallResult<String> {
        let element = self.marshall(object)?;
        dom::to_string(&element)
    }
}

impl fmt::Debug for XmlObjectProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("XmlObjectProviderRegistry")
            .field("providers", &self.providers())
            .field("has_default", &self.has_default())
            .field("initialized", &self.is_initialized())
            .finish()
    }
}
