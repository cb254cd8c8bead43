//! Qualified names and namespace declarations.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// An XML qualified name.
///
/// Equality, ordering and hashing consider only the namespace URI and the
/// local part. The prefix is carried as a serialization hint.
#[derive(Debug, Clone)]
pub struct QName {
    namespace_uri: Option<String>,
    local_part: String,
    prefix: Option<String>,
}

impl QName {
    /// Create a qualified name. Empty namespace URIs and prefixes are treated as absent.
    pub fn new(namespace_uri: Option<&str>, local_part: impl Into<String>, prefix: Option<&str>) -> Self {
        Self {
            namespace_uri: namespace_uri.filter(|ns| !ns.is_empty()).map(str::to_string),
            local_part: local_part.into(),
            prefix: prefix.filter(|p| !p.is_empty()).map(str::to_string),
        }
    }

    /// A name in no namespace
    pub fn local(local_part: impl Into<String>) -> Self {
        Self::new(None, local_part, None)
    }

    pub fn namespace_uri(&self) -> Option<&str> {
        self.namespace_uri.as_deref()
    }

    pub fn local_part(&self) -> &str {
        &self.local_part
    }

    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    /// Same name with a different prefix
    pub fn with_prefix(&self, prefix: Option<&str>) -> Self {
        Self::new(self.namespace_uri(), self.local_part.clone(), prefix)
    }

    /// The `prefix:local` form used when writing the name into a document
    pub fn to_prefixed_string(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}:{}", prefix, self.local_part),
            None => self.local_part.clone(),
        }
    }

    /// Parse Clark notation (`{uri}local` or plain `local`)
    pub fn from_clark(value: &str) -> Option<Self> {
        match value.strip_prefix('{') {
            Some(rest) => {
                let (uri, local) = rest.split_once('}')?;
                if local.is_empty() {
                    return None;
                }
                Some(Self::new(Some(uri), local, None))
            }
            None if !value.is_empty() => Some(Self::local(value)),
            None => None,
        }
    }
}

impl PartialEq for QName {
    fn eq(&self, other: &Self) -> bool {
        self.namespace_uri == other.namespace_uri && self.local_part == other.local_part
    }
}

impl Eq for QName {}

impl Hash for QName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.namespace_uri.hash(state);
        self.local_part.hash(state);
    }
}

impl PartialOrd for QName {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QName {
    fn cmp(&self, other: &Self) -> Ordering {
        self.namespace_uri
            .cmp(&other.namespace_uri)
            .then_with(|| self.local_part.cmp(&other.local_part))
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace_uri {
            Some(uri) => write!(f, "{{{}}}{}", uri, self.local_part),
            None => f.write_str(&self.local_part),
        }
    }
}

/// A namespace declaration: a prefix (or the default namespace) bound to a URI.
///
/// A `None` URI with a `None` prefix is the `xmlns=""` undeclaration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Namespace {
    uri: Option<String>,
    prefix: Option<String>,
}

impl Namespace {
    pub fn new(uri: Option<&str>, prefix: Option<&str>) -> Self {
        Self {
            uri: uri.filter(|u| !u.is_empty()).map(str::to_string),
            prefix: prefix.filter(|p| !p.is_empty()).map(str::to_string),
        }
    }

    pub fn uri(&self) -> Option<&str> {
        self.uri.as_deref()
    }

    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    /// Attribute name used to declare this namespace (`xmlns` or `xmlns:prefix`)
    pub fn declaration_name(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("xmlns:{}", prefix),
            None => "xmlns".to_string(),
        }
    }
}
