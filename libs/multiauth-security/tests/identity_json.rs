#![allow(clippy::unwrap_used, clippy::expect_used)]

use multiauth_security::{CertificateChain, Identity, constants::ANONYMOUS_USERNAME};
use rustls_pki_types::CertificateDer;
use serde_json::json;

#[test]
fn serializes_username_and_authorities_only() {
    let identity = Identity::builder()
        .username("bob")
        .authorities(["repo-42"].into_iter().collect())
        .origin("API-Key")
        .build();

    let value = serde_json::to_value(&identity).expect("identity serializes");

    assert_eq!(value, json!({"username": "bob", "authorities": ["repo-42"]}));
}

#[test]
fn anonymous_serializes_with_empty_authorities() {
    let value = serde_json::to_value(Identity::anonymous()).expect("identity serializes");

    assert_eq!(
        value,
        json!({"username": ANONYMOUS_USERNAME, "authorities": []})
    );
}

#[test]
fn proof_is_never_serialized() {
    let identity = Identity::builder()
        .username("alice")
        .proof(CertificateChain::from(CertificateDer::from(vec![0x30_u8, 0x00])))
        .build();

    let text = serde_json::to_string(&identity).expect("identity serializes");

    assert!(!text.contains("proof"), "unexpected proof in {text}");
    assert!(!text.contains("origin"), "unexpected origin in {text}");
}
