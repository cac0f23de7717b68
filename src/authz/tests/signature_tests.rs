//! Capability URL signing and verification tests

use proptest::prelude::*;
use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use url::Url;
use warden_authz::signature::{SignatureCodec, SigningSecret};
use warden_authz::{AuthzError, CapabilityError, LINK_INVALID_MESSAGE};

fn codec() -> SignatureCodec {
    SignatureCodec::new(SigningSecret::new(b"integration-secret".to_vec()).unwrap())
}

fn now() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs() as i64
}

fn to_query(signed: BTreeMap<String, String>) -> HashMap<String, String> {
    signed.into_iter().collect()
}

// ============================================================================
// End-to-End Tests
// ============================================================================

#[test]
fn test_issue_and_verify_email_link() {
    let codec = codec();
    let expires = now() + 3600;

    let mut params = BTreeMap::new();
    params.insert("user_id".to_string(), "42".to_string());
    let query = to_query(codec.issue_until(params, expires));

    let clean = codec.verify(&query).unwrap();

    let mut expected = HashMap::new();
    expected.insert("user_id".to_string(), "42".to_string());
    expected.insert("expires".to_string(), expires.to_string());
    assert_eq!(clean, expected);
}

#[test]
fn test_resigned_with_past_expiry_is_expired() {
    let codec = codec();
    let expires = now() - 3600;

    let mut params = BTreeMap::new();
    params.insert("user_id".to_string(), "42".to_string());
    let query = to_query(codec.issue_until(params, expires));

    let err = codec.verify(&query).unwrap_err();
    assert!(matches!(err, CapabilityError::Expired { .. }));
}

#[test]
fn test_url_round_trip() {
    let codec = codec();
    let base = Url::parse("https://id.example.com/reset-password").unwrap();

    let mut params = BTreeMap::new();
    params.insert("user_id".to_string(), "42".to_string());
    params.insert("nonce".to_string(), "a b=c&d".to_string());

    let link = codec.sign_url(&base, params, Duration::from_secs(600));
    assert_eq!(link.path(), "/reset-password");

    let clean = codec.verify_url(&link).unwrap();
    assert_eq!(clean["nonce"], "a b=c&d");
    assert_eq!(clean.len(), 3);
}

#[test]
fn test_every_failure_shares_public_message() {
    let codec = codec();
    let base = Url::parse("https://id.example.com/accept").unwrap();
    let link = codec.sign_url(&base, BTreeMap::new(), Duration::from_secs(600));

    let mut tampered = link.clone();
    tampered.query_pairs_mut().append_pair("role", "admin");

    let err = codec.verify_url(&tampered).unwrap_err();
    assert_eq!(err, CapabilityError::InvalidSignature);
    assert_eq!(err.public_message(), LINK_INVALID_MESSAGE);

    let wrapped: AuthzError = err.into();
    assert!(wrapped.is_unauthenticated());
    assert!(!wrapped.is_retryable());
}

// ============================================================================
// Expiry Boundary Tests
// ============================================================================

#[test]
fn test_expiry_boundary() {
    let codec = codec();
    let t = 1_700_000_000;

    let past = to_query(codec.issue_until(BTreeMap::new(), t - 1));
    assert_eq!(
        codec.verify_at(&past, t).unwrap_err(),
        CapabilityError::Expired { expires: t - 1, now: t }
    );

    let future = to_query(codec.issue_until(BTreeMap::new(), t + 1));
    assert!(codec.verify_at(&future, t).is_ok());
}

#[test]
fn test_different_secret_rejects() {
    let issued = to_query(codec().issue_until(BTreeMap::new(), now() + 60));
    let other = SignatureCodec::new(SigningSecret::new(b"other-secret".to_vec()).unwrap());

    assert_eq!(other.verify(&issued).unwrap_err(), CapabilityError::InvalidSignature);
}

// ============================================================================
// Property Tests
// ============================================================================

fn param_map() -> impl Strategy<Value = Vec<(String, String)>> {
    prop::collection::vec(("[a-z_]{1,8}", "[ -~]{0,16}"), 1..8).prop_map(|pairs| {
        // Unique keys, never the reserved ones
        let mut seen = std::collections::HashSet::new();
        pairs
            .into_iter()
            .filter(|(k, _)| k != "sig" && k != "expires" && seen.insert(k.clone()))
            .collect()
    })
}

proptest! {
    #[test]
    fn prop_sign_ignores_insertion_order(pairs in param_map()) {
        let codec = codec();

        let forward: HashMap<String, String> = pairs.iter().cloned().collect();
        let mut reversed_pairs = pairs.clone();
        reversed_pairs.reverse();
        let reversed: BTreeMap<String, String> = reversed_pairs.into_iter().collect();

        prop_assert_eq!(codec.sign(&forward), codec.sign(&reversed));
        prop_assert_eq!(codec.sign(pairs.iter().cloned()), codec.sign(&forward));
    }

    #[test]
    fn prop_value_tamper_is_detected(
        pairs in param_map(),
        index in any::<prop::sample::Index>(),
        suffix in "[a-z0-9]{1,4}"
    ) {
        prop_assume!(!pairs.is_empty());
        let codec = codec();
        let t = 1_700_000_000;

        let mut query = to_query(codec.issue_until(pairs.iter().cloned().collect(), t + 60));
        let (key, _) = &pairs[index.index(pairs.len())];
        query.get_mut(key).unwrap().push_str(&suffix);

        prop_assert_eq!(codec.verify_at(&query, t).unwrap_err(), CapabilityError::InvalidSignature);
    }

    #[test]
    fn prop_key_tamper_is_detected(pairs in param_map(), index in any::<prop::sample::Index>()) {
        prop_assume!(!pairs.is_empty());
        let codec = codec();
        let t = 1_700_000_000;

        let mut query = to_query(codec.issue_until(pairs.iter().cloned().collect(), t + 60));
        let (key, _) = &pairs[index.index(pairs.len())];
        let value = query.remove(key).unwrap();
        // Uppercase never collides with the generated lowercase keys
        query.insert(format!("{}X", key), value);

        prop_assert_eq!(codec.verify_at(&query, t).unwrap_err(), CapabilityError::InvalidSignature);
    }

    #[test]
    fn prop_expiry_tamper_is_detected(pairs in param_map(), shift in 1i64..10_000) {
        let codec = codec();
        let t = 1_700_000_000;

        let mut query = to_query(codec.issue_until(pairs.into_iter().collect(), t + 60));
        query.insert("expires".to_string(), (t + 60 + shift).to_string());

        prop_assert_eq!(codec.verify_at(&query, t).unwrap_err(), CapabilityError::InvalidSignature);
    }
}
