//! Caller-supplied validator for API keys.
//!
//! The collector chain never talks to an API key service itself. Hosts
//! implement this trait (usually as a thin client to their key service) and
//! hand it to the API key collector together with the projections that turn
//! the returned principal into a username and authorities.

use async_trait::async_trait;

use crate::error::ApiKeyValidationError;

/// Validates an API key and returns the principal it belongs to.
#[async_trait]
pub trait ApiKeyValidator: Send + Sync + 'static {
    /// The principal returned by the key service.
    type Principal: Send + Sync + 'static;

    /// Look up `api_key`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiKeyValidationError`] if the key is unknown, revoked, or
    /// the key service could not be reached.
    async fn validate(&self, api_key: &str) -> Result<Self::Principal, ApiKeyValidationError>;
}

/// Adapter turning a synchronous closure into an [`ApiKeyValidator`].
///
/// ```ignore
/// let validator = FnValidator::new(|key: &str| lookup(key).ok_or_else(|| ApiKeyValidationError::new("unknown key")));
/// ```
pub struct FnValidator<F> {
    f: F,
}

impl<F> FnValidator<F> {
    #[must_use]
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F, P> ApiKeyValidator for FnValidator<F>
where
    F: Fn(&str) -> Result<P, ApiKeyValidationError> + Send + Sync + 'static,
    P: Send + Sync + 'static,
{
    type Principal = P;

    async fn validate(&self, api_key: &str) -> Result<P, ApiKeyValidationError> {
        (self.f)(api_key)
    }
}
