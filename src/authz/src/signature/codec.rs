use base64::{engine::general_purpose::URL_SAFE, Engine as _};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use subtle::ConstantTimeEq;
use tracing::debug;
use url::Url;

use super::secret::{SecretHandle, SigningSecret};
use crate::error::CapabilityError;

type HmacSha256 = Hmac<Sha256>;

/// Query parameter carrying the signature
pub const SIG_PARAM: &str = "sig";

/// Query parameter carrying the Unix expiry timestamp
pub const EXPIRES_PARAM: &str = "expires";

/// Build the canonical string signed for a parameter set
///
/// Drops `sig`, sorts the remaining keys bytewise and joins `key=value` pairs
/// with `&`. No escaping is applied.
pub fn canonical_string<I, K, V>(params: I) -> String
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut pairs: Vec<(K, V)> = params
        .into_iter()
        .filter(|(key, _)| key.as_ref() != SIG_PARAM)
        .collect();
    pairs.sort_by(|a, b| a.0.as_ref().cmp(b.0.as_ref()));

    let mut canonical = String::new();
    for (i, (key, value)) in pairs.iter().enumerate() {
        if i > 0 {
            canonical.push('&');
        }
        canonical.push_str(key.as_ref());
        canonical.push('=');
        canonical.push_str(value.as_ref());
    }
    canonical
}

/// Signs and verifies capability URL parameters
#[derive(Clone, Debug)]
pub struct SignatureCodec {
    secret: SecretHandle,
}

impl SignatureCodec {
    /// Create a codec owning its secret
    pub fn new(secret: SigningSecret) -> Self {
        Self::with_handle(SecretHandle::new(secret))
    }

    /// Create a codec sharing a rotatable secret handle
    pub fn with_handle(secret: SecretHandle) -> Self {
        Self { secret }
    }

    /// Secret handle (for rotation by the composition root)
    pub fn secret_handle(&self) -> &SecretHandle {
        &self.secret
    }

    /// Compute the URL-safe base64 HMAC-SHA256 over the canonical form of `params`
    pub fn sign<I, K, V>(&self, params: I) -> String
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let canonical = canonical_string(params);
        let secret = self.secret.current();

        let mut mac = HmacSha256::new_from_slice(secret.expose())
            .expect("HMAC can take key of any size");
        mac.update(canonical.as_bytes());

        URL_SAFE.encode(mac.finalize().into_bytes())
    }

    /// Add `expires` (now + `ttl`) and `sig` to a parameter set
    ///
    /// A TTL beyond the representable range saturates to the far future.
    pub fn issue(
        &self,
        params: BTreeMap<String, String>,
        ttl: Duration,
    ) -> BTreeMap<String, String> {
        let ttl_secs = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
        let expires = unix_now().saturating_add(ttl_secs);
        self.issue_until(params, expires)
    }

    /// Add an explicit `expires` timestamp and `sig` to a parameter set
    pub fn issue_until(
        &self,
        mut params: BTreeMap<String, String>,
        expires: i64,
    ) -> BTreeMap<String, String> {
        params.remove(SIG_PARAM);
        params.insert(EXPIRES_PARAM.to_string(), expires.to_string());

        let sig = self.sign(&params);
        params.insert(SIG_PARAM.to_string(), sig);
        params
    }

    /// Verify a parameter set against the wall clock
    pub fn verify(
        &self,
        params: &HashMap<String, String>,
    ) -> Result<HashMap<String, String>, CapabilityError> {
        self.verify_at(params, unix_now())
    }

    /// Verify a parameter set at a given Unix time
    ///
    /// On success returns every parameter except `sig`, `expires` included.
    pub fn verify_at(
        &self,
        params: &HashMap<String, String>,
        now: i64,
    ) -> Result<HashMap<String, String>, CapabilityError> {
        let expires_raw = required(params, EXPIRES_PARAM)?;
        let supplied_sig = required(params, SIG_PARAM)?;

        let expires: i64 = expires_raw
            .parse()
            .map_err(|_| CapabilityError::InvalidExpiry(expires_raw.to_string()))?;

        if now > expires {
            debug!(expires, now, "Capability URL expired");
            return Err(CapabilityError::Expired { expires, now });
        }

        let expected = self.sign(params);
        if !bool::from(expected.as_bytes().ct_eq(supplied_sig.as_bytes())) {
            debug!("Capability URL signature mismatch");
            return Err(CapabilityError::InvalidSignature);
        }

        Ok(params
            .iter()
            .filter(|(key, _)| key.as_str() != SIG_PARAM)
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect())
    }

    /// Produce a signed URL from `base`, merging its existing query into `params`
    ///
    /// Explicit `params` win over query parameters already on `base`.
    pub fn sign_url(&self, base: &Url, params: BTreeMap<String, String>, ttl: Duration) -> Url {
        let mut merged: BTreeMap<String, String> = base
            .query_pairs()
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();
        merged.extend(params);

        let signed = self.issue(merged, ttl);

        let mut url = base.clone();
        url.query_pairs_mut().clear().extend_pairs(signed.iter());
        url
    }

    /// Verify the query string of a URL against the wall clock
    pub fn verify_url(&self, url: &Url) -> Result<HashMap<String, String>, CapabilityError> {
        self.verify_url_at(url, unix_now())
    }

    /// Verify the query string of a URL at a given Unix time
    ///
    /// A repeated key cannot have been produced by `sign_url` and is rejected
    /// as a signature failure.
    pub fn verify_url_at(
        &self,
        url: &Url,
        now: i64,
    ) -> Result<HashMap<String, String>, CapabilityError> {
        let mut params = HashMap::new();
        for (key, value) in url.query_pairs() {
            if params.insert(key.into_owned(), value.into_owned()).is_some() {
                debug!("Capability URL repeats a query parameter");
                return Err(CapabilityError::InvalidSignature);
            }
        }
        self.verify_at(&params, now)
    }
}

fn required<'a>(
    params: &'a HashMap<String, String>,
    key: &str,
) -> Result<&'a str, CapabilityError> {
    match params.get(key) {
        Some(value) if !value.is_empty() => Ok(value.as_str()),
        _ => Err(CapabilityError::MissingParameter(key.to_string())),
    }
}

fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec() -> SignatureCodec {
        SignatureCodec::new(SigningSecret::new(b"test-secret-key".to_vec()).unwrap())
    }

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_canonical_string_sorts_and_drops_sig() {
        let p = params(&[("user_id", "42"), ("sig", "abc"), ("expires", "10"), ("a", "")]);
        assert_eq!(canonical_string(&p), "a=&expires=10&user_id=42");
    }

    #[test]
    fn test_canonical_string_does_not_escape() {
        let p = params(&[("next", "/a?b=c&d")]);
        assert_eq!(canonical_string(&p), "next=/a?b=c&d");
    }

    #[test]
    fn test_canonical_string_empty() {
        let p: HashMap<String, String> = HashMap::new();
        assert_eq!(canonical_string(&p), "");
    }

    #[test]
    fn test_known_answer() {
        // HMAC-SHA256("test-secret-key", "expires=1700000000&user_id=42"), URL-safe base64
        let p = params(&[("user_id", "42"), ("expires", "1700000000")]);
        assert_eq!(codec().sign(&p), "7aALPnB34zc5NpaG38bOYe2lFYYCOcm4CuoDLOnKdGQ=");

        let p = params(&[("user_id", "42"), ("action", "reset"), ("expires", "1700003600")]);
        assert_eq!(codec().sign(&p), "N0bTT_n3BihbEwJR7zlx26cYQp9X_J6kwm69RFhD_sQ=");
    }

    #[test]
    fn test_missing_parameters() {
        let codec = codec();

        let err = codec.verify_at(&params(&[("sig", "x")]), 0).unwrap_err();
        assert_eq!(err, CapabilityError::MissingParameter("expires".to_string()));

        let err = codec.verify_at(&params(&[("expires", "10")]), 0).unwrap_err();
        assert_eq!(err, CapabilityError::MissingParameter("sig".to_string()));

        let err = codec
            .verify_at(&params(&[("expires", "10"), ("sig", "")]), 0)
            .unwrap_err();
        assert_eq!(err, CapabilityError::MissingParameter("sig".to_string()));
    }

    #[test]
    fn test_invalid_expiry() {
        let err = codec()
            .verify_at(&params(&[("expires", "tomorrow"), ("sig", "x")]), 0)
            .unwrap_err();
        assert_eq!(err, CapabilityError::InvalidExpiry("tomorrow".to_string()));
    }

    #[test]
    fn test_expiry_checked_before_signature() {
        // Garbage signature on an expired link still reports expiry
        let err = codec()
            .verify_at(&params(&[("expires", "100"), ("sig", "garbage")]), 101)
            .unwrap_err();
        assert_eq!(err, CapabilityError::Expired { expires: 100, now: 101 });
    }

    #[test]
    fn test_expires_equal_to_now_is_valid() {
        let codec = codec();
        let signed = codec.issue_until(BTreeMap::new(), 500);
        let query: HashMap<_, _> = signed.into_iter().collect();
        assert!(codec.verify_at(&query, 500).is_ok());
    }

    #[test]
    fn test_oversized_ttl_saturates() {
        let codec = codec();
        let signed = codec.issue(BTreeMap::new(), Duration::from_secs(u64::MAX));
        assert_eq!(signed["expires"], i64::MAX.to_string());

        let query: HashMap<_, _> = signed.into_iter().collect();
        assert!(codec.verify(&query).is_ok());
    }

    #[test]
    fn test_issue_replaces_stale_signature() {
        let codec = codec();
        let mut stale = BTreeMap::new();
        stale.insert("sig".to_string(), "stale".to_string());
        stale.insert("user_id".to_string(), "7".to_string());

        let signed = codec.issue_until(stale, 1_000);
        assert_ne!(signed["sig"], "stale");

        let query: HashMap<_, _> = signed.into_iter().collect();
        assert!(codec.verify_at(&query, 0).is_ok());
    }

    #[test]
    fn test_rotation_invalidates_outstanding_links() {
        let codec = codec();
        let signed = codec.issue_until(BTreeMap::new(), 1_000);
        let query: HashMap<_, _> = signed.into_iter().collect();

        codec
            .secret_handle()
            .rotate(SigningSecret::new(b"rotated".to_vec()).unwrap());

        assert_eq!(
            codec.verify_at(&query, 0).unwrap_err(),
            CapabilityError::InvalidSignature
        );
    }

    #[test]
    fn test_sign_url_round_trip_with_reserved_characters() {
        let codec = codec();
        let base = Url::parse("https://id.example.com/verify-email?tenant=acme").unwrap();

        let mut p = BTreeMap::new();
        p.insert("next".to_string(), "/home?tab=a&b".to_string());
        p.insert("email".to_string(), "a+b@example.com".to_string());

        let url = codec.sign_url(&base, p, Duration::from_secs(60));
        let clean = codec.verify_url(&url).unwrap();

        assert_eq!(clean["tenant"], "acme");
        assert_eq!(clean["next"], "/home?tab=a&b");
        assert_eq!(clean["email"], "a+b@example.com");
        assert!(clean.contains_key("expires"));
        assert!(!clean.contains_key("sig"));
    }

    #[test]
    fn test_verify_url_rejects_repeated_keys() {
        let codec = codec();
        let base = Url::parse("https://id.example.com/accept").unwrap();
        let mut url = codec.sign_url(&base, BTreeMap::new(), Duration::from_secs(60));
        url.query_pairs_mut().append_pair("expires", "1");

        assert_eq!(
            codec.verify_url(&url).unwrap_err(),
            CapabilityError::InvalidSignature
        );
    }
}
