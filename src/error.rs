use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;
use crate::qname::QName;

/// Top-level error type that encompasses every failure mode of the library
#[derive(Error, Debug)]
pub enum XmlToolingError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Unmarshalling(#[from] UnmarshallingError),

    #[error(transparent)]
    Marshalling(#[from] MarshallingError),

    #[error(transparent)]
    Ownership(#[from] OwnershipError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File system traversal error: {path} - {reason}")]
    FileSystemTraversal { path: PathBuf, reason: String },

    #[error("Concurrency error: {details}")]
    Concurrency { details: String },
}

/// Failures while turning a DOM tree into an object tree
#[derive(Error, Debug)]
pub enum UnmarshallingError {
    #[error("XML parsing error: {details}")]
    Parse { details: String },

    #[error("Undeclared namespace prefix '{prefix}' on {context}")]
    UnresolvedPrefix { prefix: String, context: String },

    #[error("No builder registered for element {element}")]
    NoBuilder { element: QName },

    #[error("No unmarshaller registered for element {element}")]
    NoUnmarshaller { element: QName },

    #[error("Malformed attribute {attribute} on {element}: '{value}' - {reason}")]
    MalformedAttribute {
        element: QName,
        attribute: QName,
        value: String,
        reason: String,
    },

    #[error("Malformed content of {element}: '{value}' - {reason}")]
    MalformedContent {
        element: QName,
        value: String,
        reason: String,
    },

    #[error("Unknown attribute {attribute} on {element}")]
    UnknownAttribute { element: QName, attribute: QName },

    #[error("Unknown child element {child} under {parent}")]
    UnknownChild { parent: QName, child: QName },

    #[error("Unexpected text content in {element}")]
    UnexpectedContent { element: QName },

    #[error("Unmarshaller for {expected} received {element}")]
    TypeMismatch {
        expected: &'static str,
        element: QName,
    },

    #[error(transparent)]
    Ownership(#[from] OwnershipError),
}

/// Failures while turning an object tree into a DOM tree
#[derive(Error, Debug)]
pub enum MarshallingError {
    #[error("No marshaller registered for element {element}")]
    NoMarshaller { element: QName },

    #[error("Marshaller for {expected} received {element}")]
    TypeMismatch {
        expected: &'static str,
        element: QName,
    },

    #[error("XML serialization error: {details}")]
    Serialize { details: String },
}

/// Violations of the single-parent ownership rule
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OwnershipError {
    #[error("{child} cannot be added - it is already the child of another XMLObject")]
    AlreadyOwned { child: QName },

    #[error("{element} cannot be added beneath itself")]
    SelfReference { element: QName },

    #[error("{child} is already present in this list")]
    Duplicate { child: QName },

    #[error("Index {index} is out of bounds for a list of {len} children")]
    IndexOutOfBounds { index: usize, len: usize },
}

/// Schema validation failure reported by a `Validator`
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{element} failed validation: {message}")]
pub struct ValidationError {
    pub element: QName,
    pub message: String,
}

impl ValidationError {
    pub fn new(element: &QName, message: impl Into<String>) -> Self {
        Self {
            element: element.clone(),
            message: message.into(),
        }
    }
}

/// Storage service failures. Version conflicts are not errors, see `storage::UpdateResult`.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Storage {field} length {size} exceeds capability limit {limit}")]
    CapabilityExceeded {
        field: &'static str,
        size: usize,
        limit: usize,
    },

    #[error("Storage serialization error: {0}")]
    Serialization(#[source] std::io::Error),

    #[error("Storage sealing error: {details}")]
    Sealer { details: String },

    #[error("Storage reaper cannot start: {details}")]
    Reaper { details: String },
}

impl StorageError {
    /// Wrap a serializer-specific failure as an I/O style error
    pub fn serialization<E>(err: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        StorageError::Serialization(std::io::Error::new(std::io::ErrorKind::InvalidData, err))
    }
}

impl From<ConfigError> for XmlToolingError {
    fn from(err: ConfigError) -> Self {
        XmlToolingError::Config(err.to_string())
    }
}

impl From<quick_xml::Error> for UnmarshallingError {
    fn from(err: quick_xml::Error) -> Self {
        UnmarshallingError::Parse {
            details: err.to_string(),
        }
    }
}

impl From<quick_xml::events::attributes::AttrError> for UnmarshallingError {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        UnmarshallingError::Parse {
            details: err.to_string(),
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, XmlToolingError>;

/// Unmarshalling result type alias
pub type UnmarshallResult<T> = std::result::Result<T, UnmarshallingError>;

/// Marshalling result type alias
pub type MarshallResult<T> = std::result::Result<T, MarshallingError>;

/// Storage result type alias
pub type StorageResult<T> = std::result::Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::SOAP11ENV_NS;

    #[test]
    fn test_unmarshalling_error_display() {
        let err = UnmarshallingError::NoUnmarshaller {
            element: QName::new(Some(SOAP11ENV_NS), "Envelope", None),
        };
        assert!(err.to_string().contains("No unmarshaller"));
        assert!(err.to_string().contains("Envelope"));

        let err = UnmarshallingError::MalformedAttribute {
            element: QName::local("Count"),
            attribute: QName::local("value"),
            value: "abc".to_string(),
            reason: "invalid digit found in string".to_string(),
        };
        let message = err.to_string();
        assert!(message.contains("'abc'"));
        assert!(message.contains("invalid digit"));
    }

    #[test]
    fn test_ownership_error_display() {
        let err = OwnershipError::AlreadyOwned {
            child: QName::local("Issuer"),
        };
        assert!(err.to_string().contains("already the child"));
    }

    #[test]
    fn test_storage_serialization_keeps_source() {
        use std::error::Error;

        let json_err = serde_json::from_str::<u32>("not json").unwrap_err();
        let err = StorageError::serialization(json_err);

        let source = err.source().expect("io error source");
        let io = source.downcast_ref::<std::io::Error>().unwrap();
        assert_eq!(io.kind(), std::io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_conversions_into_top_level_error() {
        let err: XmlToolingError = OwnershipError::SelfReference {
            element: QName::local("Body"),
        }
        .into();
        assert!(matches!(err, XmlToolingError::Ownership(_)));

        let err: XmlToolingError =
            std::io::Error::new(std::io::ErrorKind::NotFound, "File not found").into();
        assert!(err.to_string().contains("IO error"));

        let err: XmlToolingError = ConfigError::Validation("bad".to_string()).into();
        assert!(matches!(err, XmlToolingError::Config(_)));
    }

    #[test]
    fn test_nested_ownership_in_unmarshalling() {
        let err: UnmarshallingError = OwnershipError::AlreadyOwned {
            child: QName::local("Header"),
        }
        .into();
        assert!(matches!(err, UnmarshallingError::Ownership(_)));
    }
}
