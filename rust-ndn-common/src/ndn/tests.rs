//! Unit tests for the NDN packet implementation

use super::*;
use bytes::Bytes;

#[test]
fn name_creation() {
    let name = Name::from_string("/test/data/1").unwrap();

    assert_eq!(name.len(), 3);
    assert_eq!(name.get(0).unwrap().as_bytes().as_ref(), b"test");
    assert_eq!(name.get(1).unwrap().as_bytes().as_ref(), b"data");
    assert_eq!(name.get(2).unwrap().as_bytes().as_ref(), b"1");

    assert_eq!(name.to_string(), "/test/data/1");
}

#[test]
fn name_percent_escapes() {
    let name = Name::from_string("/Hello/World/%21").unwrap();
    assert_eq!(name.get(2).unwrap().as_bytes().as_ref(), b"!");
    assert_eq!(name.to_string(), "/Hello/World/%21");

    assert!(Name::from_string("/bad/%2").is_err());
    assert!(Name::from_string("/bad/%zz").is_err());
}

#[test]
fn name_compare() {
    let name1 = Name::from_string("/a/b/c").unwrap();
    let name2 = Name::from_string("/a/b/c").unwrap();
    let name3 = Name::from_string("/a/b/d").unwrap();
    let name4 = Name::from_string("/a/b").unwrap();

    assert_eq!(name1, name2);
    assert_ne!(name1, name3);
    assert_ne!(name1, name4);

    assert!(name4.is_prefix_of(&name1));
    assert!(!name1.is_prefix_of(&name4));
    assert!(!name3.is_prefix_of(&name1));
}

#[test]
fn name_tlv_round_trip() {
    let name = Name::from_string("/test/data/1").unwrap();
    let element = name.to_tlv();
    let decoded = Name::from_tlv(&element).unwrap();
    assert_eq!(decoded, name);
}

#[test]
fn interest_packet() {
    let name = Name::from_string("/test/interest").unwrap();
    let interest = Interest::new(name.clone())
        .with_can_be_prefix(true)
        .with_must_be_fresh(true)
        .with_nonce(42)
        .with_lifetime(4000);

    assert_eq!(interest.name(), &name);
    assert!(interest.can_be_prefix());
    assert!(interest.must_be_fresh());
    assert_eq!(interest.nonce(), 42);
    assert_eq!(interest.lifetime_ms(), 4000);

    let wire = interest.encode().unwrap();
    let parsed = Interest::decode(wire).unwrap();

    assert_eq!(parsed.name(), &name);
    assert!(parsed.can_be_prefix());
    assert!(parsed.must_be_fresh());
    assert_eq!(parsed.nonce(), 42);
    assert_eq!(parsed.lifetime_ms(), 4000);
}

#[test]
fn interest_non_default_lifetime_round_trip() {
    let interest = Interest::new(Name::from_string("/t").unwrap())
        .with_nonce(1)
        .with_lifetime(50);
    let parsed = Interest::decode(interest.encode().unwrap()).unwrap();
    assert_eq!(parsed.lifetime_ms(), 50);

    // the default lifetime is omitted from the wire and restored on decode
    let interest = Interest::new(Name::from_string("/t").unwrap()).with_nonce(1);
    let parsed = Interest::decode(interest.encode().unwrap()).unwrap();
    assert_eq!(parsed.lifetime_ms(), DEFAULT_INTEREST_LIFETIME_MS);
}

#[test]
fn data_packet() {
    let name = Name::from_string("/test/data").unwrap();
    let content = Bytes::from_static(b"Hello, NDN!");
    let mut data = Data::new(name.clone(), content.clone()).with_freshness_period(10_000);

    data.set_signature(
        SignatureInfo {
            signature_type: SignatureType::DigestSha256,
            key_locator: None,
        },
        vec![0u8; 32],
    );

    assert_eq!(data.name(), &name);
    assert_eq!(data.content(), &content);
    assert_eq!(data.freshness_period_ms(), 10_000);

    let wire = data.encode().unwrap();
    let parsed = Data::decode(wire).unwrap();

    assert_eq!(parsed.name(), &name);
    assert_eq!(parsed.content(), &content);
    assert_eq!(parsed.freshness_period_ms(), 10_000);
    assert_eq!(
        parsed.signature_info().unwrap().signature_type,
        SignatureType::DigestSha256
    );
    assert_eq!(parsed.signature_value().len(), 32);
}

#[test]
fn interest_matches_data() {
    let data = Data::new(Name::from_string("/Hello/World/a").unwrap(), "x");

    let exact = Interest::new(Name::from_string("/Hello/World/a").unwrap());
    assert!(exact.matches_data(&data));

    let prefix = Interest::new(Name::from_string("/Hello/World").unwrap()).with_can_be_prefix(true);
    assert!(prefix.matches_data(&data));

    let prefix_no_cbp = Interest::new(Name::from_string("/Hello/World").unwrap());
    assert!(!prefix_no_cbp.matches_data(&data));

    let other = Interest::new(Name::from_string("/Bye/World").unwrap()).with_can_be_prefix(true);
    assert!(!other.matches_data(&data));

    // MustBeFresh requires a non-zero freshness period
    let fresh = Interest::new(Name::from_string("/Hello/World").unwrap())
        .with_can_be_prefix(true)
        .with_must_be_fresh(true);
    assert!(!fresh.matches_data(&data));
    let fresh_data = Data::new(Name::from_string("/Hello/World/a").unwrap(), "x")
        .with_freshness_period(1000);
    assert!(fresh.matches_data(&fresh_data));
}

#[test]
fn interest_matches_interest() {
    let a = Interest::new(Name::from_string("/A").unwrap()).with_nonce(1);
    let b = Interest::new(Name::from_string("/A").unwrap()).with_nonce(2);
    assert!(a.matches_interest(&b));

    let c = Interest::new(Name::from_string("/A").unwrap())
        .with_nonce(3)
        .with_can_be_prefix(true);
    assert!(!a.matches_interest(&c));
}
