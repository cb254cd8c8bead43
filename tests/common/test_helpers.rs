use std::path::Path;
use tempfile::TempDir;
use tokio::fs;

use xmltooling::XmlObjectProviderRegistry;

pub const SOAP_FAULT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<soap11:Envelope xmlns:soap11="http://schemas.xmlsoap.org/soap/envelope/">
  <soap11:Header>
    <wsa:MessageID xmlns:wsa="http://www.w3.org/2005/08/addressing">urn:uuid:0b4f</wsa:MessageID>
  </soap11:Header>
  <soap11:Body>
    <soap11:Fault>
      <faultcode>soap11:Client</faultcode>
      <faultstring>Missing assertion</faultstring>
      <faultactor>https://sp.example.org/acs</faultactor>
      <detail>
        <err:Reason xmlns:err="urn:example:errors" code="17">expired</err:Reason>
      </detail>
    </soap11:Fault>
  </soap11:Body>
</soap11:Envelope>"#;

pub const SOAP_REQUEST: &str = r#"<soap11:Envelope xmlns:soap11="http://schemas.xmlsoap.org/soap/envelope/" xmlns:app="urn:example:app" app:trace="on">
  <soap11:Body>
    <app:Query id="q-1">
      <app:Term>alpha</app:Term>
      <app:Term>beta</app:Term>
    </app:Query>
  </soap11:Body>
</soap11:Envelope>"#;

/// A fault with a child `faultstring` does not declare; lenient mode drops it
pub const LOSSY_FAULT: &str = r#"<soap11:Fault xmlns:soap11="http://schemas.xmlsoap.org/soap/envelope/"><faultcode>soap11:Server</faultcode><faultstring>oops</faultstring><trace/></soap11:Fault>"#;

pub const MALFORMED: &str = "<soap11:Envelope><soap11:Body></soap11:Envelope>";

pub fn registry() -> XmlObjectProviderRegistry {
    XmlObjectProviderRegistry::with_defaults()
}

/// Directory with documents that round-trip, one lossy document, one
/// malformed document and a file that is not XML
pub async fn create_temp_xml_files() -> std::io::Result<TempDir> {
    let temp_dir = TempDir::new()?;
    let root = temp_dir.path();

    fs::create_dir_all(root.join("faults")).await?;
    fs::create_dir_all(root.join("requests/archive")).await?;

    fs::write(root.join("faults/fault.xml"), SOAP_FAULT).await?;
    fs::write(root.join("faults/lossy.xml"), LOSSY_FAULT).await?;
    fs::write(root.join("requests/query.xml"), SOAP_REQUEST).await?;
    fs::write(root.join("requests/archive/old.xml"), SOAP_REQUEST).await?;
    fs::write(root.join("broken.xml"), MALFORMED).await?;
    fs::write(root.join("README.txt"), "not xml").await?;

    Ok(temp_dir)
}

pub async fn write_config(dir: &Path, name: &str, content: &str) -> std::io::Result<std::path::PathBuf> {
    let path = dir.join(name);
    fs::write(&path, content).await?;
    Ok(path)
}
