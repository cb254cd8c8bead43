//! Namespace URIs, prefixes and well-known names used across the library.

use crate::qname::QName;

/// XML namespace
pub const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";

/// XML namespace prefix
pub const XML_PREFIX: &str = "xml";

/// Namespace of namespace declaration attributes
pub const XMLNS_NS: &str = "http://www.w3.org/2000/xmlns/";

/// Namespace declaration prefix
pub const XMLNS_PREFIX: &str = "xmlns";

/// XML Schema namespace
pub const XSD_NS: &str = "http://www.w3.org/2001/XMLSchema";

/// Conventional XML Schema prefix
pub const XSD_PREFIX: &str = "xs";

/// XML Schema instance namespace
pub const XSI_NS: &str = "http://www.w3.org/2001/XMLSchema-instance";

/// Conventional XML Schema instance prefix
pub const XSI_PREFIX: &str = "xsi";

/// SOAP 1.1 envelope namespace
pub const SOAP11ENV_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";

/// Conventional SOAP 1.1 envelope prefix
pub const SOAP11ENV_PREFIX: &str = "soap11";

pub fn xsi_type_name() -> QName {
    QName::new(Some(XSI_NS), "type", Some(XSI_PREFIX))
}

pub fn xsi_nil_name() -> QName {
    QName::new(Some(XSI_NS), "nil", Some(XSI_PREFIX))
}

pub fn xsi_schema_location_name() -> QName {
    QName::new(Some(XSI_NS), "schemaLocation", Some(XSI_PREFIX))
}

pub fn xsi_no_namespace_schema_location_name() -> QName {
    QName::new(Some(XSI_NS), "noNamespaceSchemaLocation", Some(XSI_PREFIX))
}

/// Name of an XML Schema built-in type, e.g. `xs:string`
pub fn xsd_type(local_part: &str) -> QName {
    QName::new(Some(XSD_NS), local_part, Some(XSD_PREFIX))
}

/// XML Signature namespace
pub const XMLDSIG_NS: &str = "http://www.w3.org/2000/09/xmldsig#";

/// Conventional XML Signature prefix
pub const XMLDSIG_PREFIX: &str = "ds";
