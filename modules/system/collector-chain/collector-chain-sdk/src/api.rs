//! Public API trait for the collector chain.
//!
//! Hosts hold the chain behind this trait and call it once per request.

use async_trait::async_trait;
use multiauth_security::Identity;

use crate::error::ChainError;
use crate::models::{RequestContext, Resolution};

/// Public API trait for identity resolution.
///
/// ```ignore
/// let resolver: Arc<dyn IdentityResolver> = Arc::new(chain);
///
/// let ctx = RequestContext::from_parts(&parts);
/// match resolver.resolve(&ctx).await {
///     Ok(identity) => parts.extensions.insert(identity),
///     Err(e) => return status(e.status_code()),
/// }
/// ```
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    /// Resolve exactly one identity for the request.
    ///
    /// # Errors
    ///
    /// - `ChainError::Authentication` if an identity collector rejected a
    ///   presented credential
    /// - `ChainError::Authorization` if an authorization collector rejected
    ///   the request after the identity was resolved
    async fn resolve(&self, request: &RequestContext) -> Result<Identity, ChainError>;

    /// Same as [`IdentityResolver::resolve`], also returning the per-collector trace.
    ///
    /// # Errors
    ///
    /// Same as [`IdentityResolver::resolve`].
    async fn resolve_traced(&self, request: &RequestContext) -> Result<Resolution, ChainError>;
}
