//! API key resolved by a caller-supplied validator.

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use collector_chain_sdk::{ApiKeyValidationError, ApiKeyValidator, CollectorError, RequestContext};
use futures_util::FutureExt;
use http::HeaderName;
use multiauth_security::{AuthoritySet, Identity};

use crate::domain::error::IntoCollectorError;
use crate::domain::extract::CredentialSource;

/// A validator together with the projections applied to its principal.
///
/// Erases the validator's principal type so collectors stay non-generic.
#[async_trait]
pub(crate) trait ResolveApiKey: Send + Sync {
    async fn resolve(&self, api_key: &str) -> Result<(String, AuthoritySet), ApiKeyValidationError>;
}

struct Projected<V, U, A> {
    validator: V,
    username: U,
    authorities: A,
}

#[async_trait]
impl<V, U, A> ResolveApiKey for Projected<V, U, A>
where
    V: ApiKeyValidator,
    U: Fn(&V::Principal) -> String + Send + Sync + 'static,
    A: Fn(&V::Principal) -> AuthoritySet + Send + Sync + 'static,
{
    async fn resolve(&self, api_key: &str) -> Result<(String, AuthoritySet), ApiKeyValidationError> {
        let principal = self.validator.validate(api_key).await?;
        Ok(((self.username)(&principal), (self.authorities)(&principal)))
    }
}

/// Shared handle to a projected validator.
#[derive(Clone)]
pub struct ApiKeyResolver(Arc<dyn ResolveApiKey>);

impl ApiKeyResolver {
    /// Wrap `validator`, projecting its principal with `username` and
    /// `authorities`.
    #[must_use]
    pub fn new<V, U, A>(validator: V, username: U, authorities: A) -> Self
    where
        V: ApiKeyValidator,
        U: Fn(&V::Principal) -> String + Send + Sync + 'static,
        A: Fn(&V::Principal) -> AuthoritySet + Send + Sync + 'static,
    {
        Self(Arc::new(Projected {
            validator,
            username,
            authorities,
        }))
    }
}

impl fmt::Debug for ApiKeyResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKeyResolver(..)")
    }
}

/// Establishes an identity from an API key header.
///
/// A validator that errors, panics or exceeds the timeout fails the
/// collector with `ExternalValidatorFailure`.
#[derive(Debug, Clone)]
pub struct ApiKeyCollector {
    name: String,
    source: CredentialSource,
    resolver: ApiKeyResolver,
    timeout: Option<Duration>,
}

impl ApiKeyCollector {
    #[must_use]
    pub fn new(name: impl Into<String>, header: HeaderName, resolver: ApiKeyResolver) -> Self {
        Self {
            name: name.into(),
            source: CredentialSource::ApiKeyHeader(header),
            resolver,
            timeout: None,
        }
    }

    /// Fail the validator call once `timeout` elapses.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) async fn identify(&self, ctx: &RequestContext) -> Result<Option<Identity>, CollectorError> {
        let Some((username, authorities)) = self.resolve(ctx).await? else {
            return Ok(None);
        };
        Ok(Some(
            Identity::builder()
                .username(username)
                .authorities(authorities)
                .origin(self.name.as_str())
                .build(),
        ))
    }

    pub(crate) async fn authorize(&self, ctx: &RequestContext) -> Result<Option<AuthoritySet>, CollectorError> {
        Ok(self.resolve(ctx).await?.map(|(_, authorities)| authorities))
    }

    async fn resolve(&self, ctx: &RequestContext) -> Result<Option<(String, AuthoritySet)>, CollectorError> {
        let api_key = self
            .source
            .extract(ctx)
            .map_err(|e| e.into_collector_error(&self.name))?
            .and_then(|credential| credential.secret());
        let Some(api_key) = api_key else {
            return Ok(None);
        };

        let call = AssertUnwindSafe(self.resolver.0.resolve(api_key))
            .catch_unwind()
            .map(|caught| {
                caught.unwrap_or_else(|_| Err(ApiKeyValidationError::new("validator panicked")))
            });
        let outcome = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, call).await.unwrap_or_else(|_| {
                Err(ApiKeyValidationError::new(format!(
                    "validator timed out after {} ms",
                    limit.as_millis()
                )))
            }),
            None => call.await,
        };

        let (username, authorities) = outcome.map_err(|e| {
            tracing::warn!(collector = %self.name, error = %e, "API key validation failed");
            e.into_collector_error(&self.name)
        })?;
        if username.is_empty() {
            return Err(ApiKeyValidationError::new("validator returned an empty username")
                .into_collector_error(&self.name));
        }

        tracing::debug!(collector = %self.name, username = %username, "API key accepted");
        Ok(Some((username, authorities)))
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use collector_chain_sdk::{ErrorKind, FnValidator};
    use http::{HeaderMap, HeaderValue};

    use super::*;

    struct Owner {
        login: String,
        repos: Vec<String>,
    }

    fn lookup(key: &str) -> Result<Owner, ApiKeyValidationError> {
        if key == "1NiIsInR5cCI6Ik" {
            Ok(Owner {
                login: "bob".to_owned(),
                repos: vec!["repo-42".to_owned()],
            })
        } else {
            Err(ApiKeyValidationError::new("unknown key"))
        }
    }

    fn collector() -> ApiKeyCollector {
        let resolver = ApiKeyResolver::new(
            FnValidator::new(lookup),
            |owner: &Owner| owner.login.clone(),
            |owner: &Owner| owner.repos.iter().cloned().collect(),
        );
        ApiKeyCollector::new("API-Key", HeaderName::from_static("key"), resolver)
    }

    fn with_key(key: &'static str) -> RequestContext {
        let mut headers = HeaderMap::new();
        headers.insert("key", HeaderValue::from_static(key));
        RequestContext::new(headers)
    }

    #[tokio::test]
    async fn projects_principal_into_identity() {
        let identity = collector().identify(&with_key("1NiIsInR5cCI6Ik")).await.unwrap().unwrap();

        assert_eq!(identity.username(), "bob");
        assert!(identity.authorities().contains("repo-42"));
        assert_eq!(identity.origin(), "API-Key");
    }

    #[tokio::test]
    async fn validator_error_is_external_failure() {
        let err = collector().identify(&with_key("nope")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ExternalValidatorFailure);
        assert!(err.to_string().contains("unknown key"), "{err}");
    }

    #[tokio::test]
    async fn abstains_without_header() {
        let ctx = RequestContext::new(HeaderMap::new());
        assert_eq!(collector().identify(&ctx).await.unwrap(), None);
    }

    struct Stalled;

    #[async_trait]
    impl ApiKeyValidator for Stalled {
        type Principal = String;

        async fn validate(&self, _api_key: &str) -> Result<String, ApiKeyValidationError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok("never".to_owned())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn slow_validator_times_out() {
        let resolver = ApiKeyResolver::new(Stalled, String::clone, |_: &String| AuthoritySet::new());
        let collector = ApiKeyCollector::new("API-Key", HeaderName::from_static("key"), resolver)
            .with_timeout(Duration::from_millis(100));

        let err = collector.identify(&with_key("any")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ExternalValidatorFailure);
        assert!(err.to_string().contains("timed out"), "{err}");
    }

    #[tokio::test]
    async fn empty_username_is_rejected() {
        let resolver = ApiKeyResolver::new(
            FnValidator::new(|_: &str| Ok::<_, ApiKeyValidationError>(String::new())),
            String::clone,
            |_: &String| AuthoritySet::new(),
        );
        let collector = ApiKeyCollector::new("API-Key", HeaderName::from_static("key"), resolver);

        let err = collector.identify(&with_key("any")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ExternalValidatorFailure);
    }

    #[tokio::test]
    async fn panicking_validator_is_external_failure() {
        let resolver = ApiKeyResolver::new(
            FnValidator::new(|_: &str| -> Result<String, ApiKeyValidationError> {
                panic!("key store unavailable")
            }),
            String::clone,
            |_: &String| AuthoritySet::new(),
        );
        let collector = ApiKeyCollector::new("API-Key", HeaderName::from_static("key"), resolver);

        let err = collector.identify(&with_key("any")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ExternalValidatorFailure);
        assert!(err.to_string().contains("panicked"), "{err}");
    }
}
