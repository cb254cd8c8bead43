mod common;

use std::sync::Arc;

use common::test_helpers::*;
use xmltooling::dom::{parse_str, to_string};
use xmltooling::schema::XsAny;
use xmltooling::{
    AttributeExtensible, Body, CachesDom, CheckOptions, CheckStatus, ElementExtensible, Envelope, Fault,
    FaultCode, FileDiscovery, HasParent, OwnershipError, QName, RoundTripChecker, Signable, UnmarshallingContext,
    UnmarshallingError, Validatable, XmlObjectProviderRegistry,
};

fn round_trip(registry: &XmlObjectProviderRegistry, xml: &str) -> bool {
    let original = parse_str(xml).unwrap();
    let object = registry.unmarshall_element(original.root()).unwrap();
    object.read().release_this_and_children_dom();
    let output = registry.marshall_to_string(&object).unwrap();
    original.root().structurally_equals(parse_str(&output).unwrap().root())
}

#[test]
fn test_soap_documents_round_trip() {
    let registry = registry();
    assert!(round_trip(&registry, SOAP_FAULT));
    assert!(round_trip(&registry, SOAP_REQUEST));
}

#[test]
fn test_cached_dom_is_reused_until_modified() {
    let registry = registry();
    let object = registry.unmarshall_str(SOAP_REQUEST).unwrap();
    let cached = object.dom().unwrap();

    let marshalled = registry.marshall(&object).unwrap();
    assert!(Arc::ptr_eq(&cached, &marshalled));

    let envelope = object.downcast::<Envelope>().unwrap();
    envelope
        .write()
        .unknown_attributes_mut()
        .insert(QName::new(Some("urn:example:app"), "trace", Some("app")), "off");
    assert!(envelope.dom().is_none());

    let xml = to_string(&registry.marshall(&object).unwrap()).unwrap();
    assert!(xml.contains(r#"app:trace="off""#));
}

#[test]
fn test_unknown_attributes_survive_round_trip() {
    let registry = registry();
    let object = registry.unmarshall_str(SOAP_REQUEST).unwrap();
    let envelope = object.downcast::<Envelope>().unwrap();

    let trace = QName::new(Some("urn:example:app"), "trace", None);
    assert_eq!(envelope.read().unknown_attributes().get(&trace), Some("on"));

    let body = envelope.read().body().unwrap().clone();
    let query = body.read().unknown_children().get(0).unwrap().clone();
    assert!(query.is::<XsAny>());
    assert!(query.read().parent().unwrap().ptr_eq(&body.erase()));
    assert_eq!(query.read().ordered_children().len(), 2);
}

#[test]
fn test_fault_detail_and_code() {
    let registry = registry();
    let object = registry.unmarshall_str(SOAP_FAULT).unwrap();
    let envelope = object.downcast::<Envelope>().unwrap();
    let envelope = envelope.read();

    assert!(!envelope.header().unwrap().read().is_signed());
    let fault = envelope.body().unwrap().read().fault().unwrap();
    let fault = fault.read();
    assert_eq!(fault.code().unwrap().read().value(), Some(&FaultCode::client()));
    assert_eq!(fault.detail().unwrap().read().unknown_children().len(), 1);
    assert!(envelope.validate(true).is_ok());
}

#[test]
fn test_ownership_is_exclusive() {
    let fault = Fault::build();
    let code = FaultCode::build(FaultCode::server());
    fault.write().set_code(Some(code.clone())).unwrap();

    let other = Fault::build();
    let err = other.write().set_code(Some(code.clone())).unwrap_err();
    assert!(matches!(err, OwnershipError::AlreadyOwned { .. }));

    let body = Body::build();
    body.write().unknown_children_mut().push(fault.erase()).unwrap();
    let err = body.write().unknown_children_mut().push(fault.erase()).unwrap_err();
    assert!(matches!(err, OwnershipError::Duplicate { .. }));
    assert_eq!(body.read().unknown_children().len(), 1);
}

#[test]
fn test_strict_unmarshalling_rejects_undeclared_children() {
    let registry = registry();
    let document = parse_str(LOSSY_FAULT).unwrap();

    let lenient = UnmarshallingContext::new(&registry).unmarshall(document.root()).unwrap();
    assert_eq!(lenient.read().ordered_children().len(), 2);

    let err = UnmarshallingContext::new(&registry)
        .strict(true)
        .unmarshall(document.root())
        .unwrap_err();
    assert!(matches!(err, UnmarshallingError::UnknownChild { .. }));
}

#[tokio::test]
async fn test_checker_over_directory() {
    let temp_dir = create_temp_xml_files().await.unwrap();
    let checker = RoundTripChecker::new(Arc::new(registry()), CheckOptions::default());

    let results = checker
        .check_path(temp_dir.path(), &FileDiscovery::new())
        .await
        .unwrap();

    assert_eq!(results.total_files, 5);
    assert_eq!(results.round_trip_files, 3);
    assert_eq!(results.mismatch_files, 1);
    assert_eq!(results.error_files, 1);

    let lossy = results
        .file_results
        .iter()
        .find(|r| r.path.ends_with("faults/lossy.xml"))
        .unwrap();
    match &lossy.status {
        CheckStatus::Mismatch { difference } => assert!(difference.contains("dropped child element trace")),
        other => panic!("expected mismatch, got {other:?}"),
    }
}

#[tokio::test]
async fn test_checker_with_exclusions_and_strict_mode() {
    let temp_dir = create_temp_xml_files().await.unwrap();
    let discovery = FileDiscovery::new()
        .with_exclude_patterns(&["**/archive/**".to_string(), "**/broken.xml".to_string()])
        .unwrap();
    let options = CheckOptions {
        strict: true,
        threads: 2,
        ..CheckOptions::default()
    };

    let results = RoundTripChecker::new(Arc::new(registry()), options)
        .check_path(temp_dir.path(), &discovery)
        .await
        .unwrap();

    assert_eq!(results.total_files, 3);
    assert_eq!(results.round_trip_files, 2);
    assert_eq!(results.error_files, 1);
    assert_eq!(results.mismatch_files, 0);
}

#[test]
fn test_parallel_marshalling_with_shared_registry() {
    use rayon::prelude::*;

    let registry = registry();
    let all_equal = (0..64)
        .into_par_iter()
        .map(|i| {
            let xml = if i % 2 == 0 { SOAP_FAULT } else { SOAP_REQUEST };
            round_trip(&registry, xml)
        })
        .all(|equal| equal);
    assert!(all_equal);
}
