use divan::Bencher;
use std::sync::Arc;
use xmltooling::dom::{parse_str, to_string};
use xmltooling::storage::ManualClock;
use xmltooling::{CachesDom, CheckOptions, MemoryStorageService, RoundTripChecker, StorageService, XmlObjectProviderRegistry};

fn main() {
    divan::main();
}

const SOAP_FAULT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<soap11:Envelope xmlns:soap11="http://schemas.xmlsoap.org/soap/envelope/">
  <soap11:Header>
    <wsa:MessageID xmlns:wsa="http://www.w3.org/2005/08/addressing">urn:uuid:0b4f</wsa:MessageID>
  </soap11:Header>
  <soap11:Body>
    <soap11:Fault>
      <faultcode>soap11:Client</faultcode>
      <faultstring>Missing assertion</faultstring>
      <detail><err:Reason xmlns:err="urn:example:errors" code="17">expired</err:Reason></detail>
    </soap11:Fault>
  </soap11:Body>
</soap11:Envelope>"#;

#[divan::bench]
fn parse_document() {
    parse_str(divan::black_box(SOAP_FAULT)).expect("Failed to parse");
}

#[divan::bench]
fn unmarshall_document(bencher: Bencher) {
    let registry = XmlObjectProviderRegistry::with_defaults();
    let document = parse_str(SOAP_FAULT).unwrap();

    bencher.bench_local(move || registry.unmarshall_element(document.root()).expect("Failed to unmarshall"));
}

#[divan::bench(args = [false, true])]
fn marshall_document(bencher: Bencher, cached: bool) {
    let registry = XmlObjectProviderRegistry::with_defaults();
    let object = registry.unmarshall_str(SOAP_FAULT).unwrap();

    bencher.bench_local(move || {
        if !cached {
            object.read().release_this_and_children_dom();
        }
        let element = registry.marshall(&object).expect("Failed to marshall");
        to_string(&element).expect("Failed to serialize")
    });
}

#[divan::bench]
fn round_trip_check(bencher: Bencher) {
    let checker = RoundTripChecker::new(Arc::new(XmlObjectProviderRegistry::with_defaults()), CheckOptions::default());

    bencher.bench_local(move || checker.check_document(SOAP_FAULT));
}

#[divan::bench]
fn storage_create_and_update(bencher: Bencher) {
    let storage = MemoryStorageService::with_clock(Arc::new(ManualClock::new(0)));
    let mut n = 0u64;

    bencher.bench_local(move || {
        n += 1;
        let key = format!("key-{}", n % 1024);
        if !storage.create("bench", &key, "value", Some(60_000)).unwrap() {
            storage.update("bench", &key, "updated", Some(60_000)).unwrap();
        }
    });
}
