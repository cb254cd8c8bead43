//! # xmltooling Library
//!
//! An XML object model with pluggable marshalling and unmarshalling, SOAP 1.1
//! bindings, criteria-based credential filtering and expiring key/value
//! storage. The bundled binary round-trips XML files through the object model
//! and reports anything that was lost.

pub mod checker;
pub mod cli;
pub mod config;
pub mod constants;
pub mod criteria;
pub mod dom;
pub mod error;
pub mod file_discovery;
pub mod io;
pub mod object;
pub mod output;
pub mod qname;
pub mod registry;
pub mod schema;
pub mod soap11;
pub mod storage;

pub use checker::{CheckOptions, CheckResults, CheckStatus, FileCheckResult, RoundTripChecker};
pub use cli::{Cli, OutputFormat, VerbosityLevel};
pub use config::{Config, ConfigError, ConfigManager};
pub use criteria::{CriteriaSet, Criterion, EvaluableCriteriaRegistry, EvaluableCriterion};
pub use dom::{Document, Element, ParserOptions};
pub use error::{
    MarshallingError, OwnershipError, Result, StorageError, UnmarshallingError, ValidationError,
    XmlToolingError,
};
pub use file_discovery::FileDiscovery;
pub use io::{Marshaller, MarshallingContext, Unmarshaller, UnmarshallingContext};
pub use object::{
    AttributeExtensible, CachesDom, ElementExtensible, HasParent, Signable, Validatable, XmlObject,
    XmlObjectCore, XmlObjectRef, XmlRef,
};
pub use output::Output;
pub use qname::{Namespace, QName};
pub use registry::{Provider, XmlObjectProviderRegistry};
pub use schema::XsAny;
pub use soap11::{Body, Detail, Envelope, Fault, FaultCode, Header};
pub use storage::{
    ClientStorageService, DeleteResult, MemoryStorageService, ReplayCache, StorageCapabilities,
    StorageRecord, StorageService, UpdateResult, VersionedRead,
};
