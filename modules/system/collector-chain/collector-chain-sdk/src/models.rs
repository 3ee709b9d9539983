//! Domain models for the collector chain.

use std::borrow::Cow;

use http::HeaderMap;
use http::header::{AUTHORIZATION, COOKIE};
use multiauth_security::{CertificateChain, Identity};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{ClaimTypeError, ErrorKind};

/// Read-only view of an incoming request.
///
/// Header lookups are case-insensitive. The negotiated client certificate
/// chain is only present when TLS is terminated by the host itself; behind a
/// gateway the chain travels in a header instead.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    headers: HeaderMap,
    client_certificates: Option<CertificateChain>,
}

impl RequestContext {
    #[must_use]
    pub fn new(headers: HeaderMap) -> Self {
        Self {
            headers,
            client_certificates: None,
        }
    }

    /// Attach the chain negotiated during the TLS handshake.
    #[must_use]
    pub fn with_client_certificates(mut self, chain: CertificateChain) -> Self {
        self.client_certificates = Some(chain);
        self
    }

    /// Build a context from request parts.
    ///
    /// A [`CertificateChain`] stored in the request extensions by the TLS
    /// acceptor is picked up as the negotiated chain.
    #[must_use]
    pub fn from_parts(parts: &http::request::Parts) -> Self {
        Self {
            headers: parts.headers.clone(),
            client_certificates: parts.extensions.get::<CertificateChain>().cloned(),
        }
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Raw value of the first header named `name`.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&http::HeaderValue> {
        self.headers.get(name)
    }

    /// Value of the cookie `name`, searched across every `Cookie` header.
    #[must_use]
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|s| s.split(';'))
            .find_map(|pair| {
                let (key, value) = pair.trim().split_once('=')?;
                (key.trim() == name).then(|| strip_quotes(value.trim()))
            })
    }

    /// Token of an `Authorization: Bearer <token>` header.
    #[must_use]
    pub fn bearer_token(&self) -> Option<&str> {
        self.headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.strip_prefix("Bearer ").map(str::trim))
            .filter(|token| !token.is_empty())
    }

    #[must_use]
    pub fn client_certificates(&self) -> Option<&CertificateChain> {
        self.client_certificates.as_ref()
    }
}

fn strip_quotes(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

/// Raw credential material pulled out of a request.
///
/// Extracted fresh for each attempt and never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential<'a> {
    CookieToken { name: &'a str, value: &'a str },
    HeaderToken { name: &'a str, value: &'a str },
    ApiKey(&'a str),
    CertificateChain(Cow<'a, CertificateChain>),
}

impl<'a> Credential<'a> {
    /// The textual secret carried by token and API key credentials.
    #[must_use]
    pub fn secret(&self) -> Option<&'a str> {
        match self {
            Self::CookieToken { value, .. } | Self::HeaderToken { value, .. } => Some(*value),
            Self::ApiKey(key) => Some(*key),
            Self::CertificateChain(_) => None,
        }
    }

    #[must_use]
    pub fn into_certificate_chain(self) -> Option<CertificateChain> {
        match self {
            Self::CertificateChain(chain) => Some(chain.into_owned()),
            Self::CookieToken { .. } | Self::HeaderToken { .. } | Self::ApiKey(_) => None,
        }
    }
}

/// Claims of a verified token.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct Claims(Map<String, Value>);

impl Claims {
    #[must_use]
    pub fn new(claims: Map<String, Value>) -> Self {
        Self(claims)
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// A string claim such as `sub`.
    ///
    /// # Errors
    ///
    /// Returns [`ClaimTypeError`] if the claim is present but not a string.
    pub fn string(&self, name: &str) -> Result<Option<&str>, ClaimTypeError> {
        match self.0.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s)),
            Some(_) => Err(type_error(name, "a string")),
        }
    }

    /// A list-of-strings claim such as `group` or `scope`.
    ///
    /// Both a JSON array of strings and a space-delimited string are
    /// accepted; empty entries are dropped.
    ///
    /// # Errors
    ///
    /// Returns [`ClaimTypeError`] if the claim is neither form.
    pub fn string_list(&self, name: &str) -> Result<Option<Vec<String>>, ClaimTypeError> {
        match self.0.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.split_whitespace().map(str::to_owned).collect())),
            Some(Value::Array(items)) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        Value::String(s) if s.is_empty() => {}
                        Value::String(s) => values.push(s.clone()),
                        _ => return Err(type_error(name, "a list of strings")),
                    }
                }
                Ok(Some(values))
            }
            Some(_) => Err(type_error(name, "a list of strings")),
        }
    }

    /// A nested object claim such as `cnf`.
    ///
    /// # Errors
    ///
    /// Returns [`ClaimTypeError`] if the claim is present but not an object.
    pub fn object(&self, name: &str) -> Result<Option<&Map<String, Value>>, ClaimTypeError> {
        match self.0.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Object(map)) => Ok(Some(map)),
            Some(_) => Err(type_error(name, "an object")),
        }
    }
}

fn type_error(claim: &str, expected: &'static str) -> ClaimTypeError {
    ClaimTypeError {
        claim: claim.to_owned(),
        expected,
    }
}

/// Phase of the chain a collector ran in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Identity,
    Authorization,
}

/// What a single collector did with a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// No credential of its kind was presented.
    Abstained,
    /// Established the identity, or contributed authorities.
    Succeeded,
    /// Rejected the presented credential.
    Failed(ErrorKind),
}

/// One collector's step in a resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceEntry {
    pub collector: String,
    pub phase: Phase,
    pub outcome: Outcome,
}

/// A resolved identity together with how it was reached.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub identity: Identity,
    pub trace: Vec<TraceEntry>,
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use http::HeaderValue;
    use multiauth_security::CertificateDer;
    use serde_json::json;

    use super::*;

    fn claims(value: Value) -> Claims {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn header_lookup_is_case_insensitive() {
        let mut headers = HeaderMap::new();
        headers.insert("x-cert", HeaderValue::from_static("pem"));
        let ctx = RequestContext::new(headers);

        assert_eq!(ctx.header("x-cert").unwrap(), "pem");
        assert_eq!(ctx.header("X-CERT").unwrap(), "pem");
        assert!(ctx.header("key").is_none());
    }

    #[test]
    fn cookie_found_across_headers() {
        let mut headers = HeaderMap::new();
        headers.append(COOKIE, HeaderValue::from_static("theme=dark; lang=en"));
        headers.append(COOKIE, HeaderValue::from_static("SSO=\"abc.def.ghi\""));
        let ctx = RequestContext::new(headers);

        assert_eq!(ctx.cookie("SSO"), Some("abc.def.ghi"));
        assert_eq!(ctx.cookie("lang"), Some("en"));
        assert_eq!(ctx.cookie("sso"), None);
    }

    #[test]
    fn bearer_token_requires_scheme() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic Ym9iOnB3"));
        assert!(RequestContext::new(headers).bearer_token().is_none());

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer  a.b.c "));
        assert_eq!(RequestContext::new(headers).bearer_token(), Some("a.b.c"));
    }

    #[test]
    fn from_parts_picks_negotiated_chain() {
        let chain = CertificateChain::from(CertificateDer::from(vec![0x30_u8, 0x00]));
        let mut request = http::Request::builder().body(()).unwrap();
        request.extensions_mut().insert(chain.clone());
        let (parts, ()) = request.into_parts();

        let ctx = RequestContext::from_parts(&parts);

        assert_eq!(ctx.client_certificates(), Some(&chain));
    }

    #[test]
    fn scope_accepts_list_and_space_delimited_string() {
        let listed = claims(json!({"scope": ["accounts", "payments"]}));
        let spaced = claims(json!({"scope": "accounts  payments"}));

        assert_eq!(
            listed.string_list("scope").unwrap(),
            Some(vec!["accounts".to_owned(), "payments".to_owned()])
        );
        assert_eq!(
            listed.string_list("scope").unwrap(),
            spaced.string_list("scope").unwrap()
        );
    }

    #[test]
    fn list_claim_rejects_non_strings() {
        let c = claims(json!({"group": ["admin", 7]}));
        let err = c.string_list("group").unwrap_err();
        assert_eq!(err.claim, "group");
    }

    #[test]
    fn missing_claims_are_none() {
        let c = claims(json!({}));
        assert_eq!(c.string("sub").unwrap(), None);
        assert_eq!(c.string_list("group").unwrap(), None);
        assert!(c.object("cnf").unwrap().is_none());
    }

    #[test]
    fn object_claim_exposes_members() {
        let c = claims(json!({"cnf": {"x5t#S256": "abc"}}));
        let cnf = c.object("cnf").unwrap().unwrap();
        assert_eq!(cnf.get("x5t#S256"), Some(&json!("abc")));
        assert!(c.string("cnf").is_err());
    }
}
