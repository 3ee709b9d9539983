#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Collector Chain SDK
//!
//! This crate provides the public API for the `collector_chain` module:
//!
//! - [`IdentityResolver`] - Public API trait for hosts
//! - [`ApiKeyValidator`] - Caller-supplied API key lookup
//! - [`RequestContext`], [`Credential`], [`Claims`] - Request-side models
//! - [`Resolution`], [`TraceEntry`] - Resolution result with per-collector outcomes
//! - [`CollectorError`], [`ChainError`] - Error types
//!
//! ## Usage
//!
//! ```ignore
//! use collector_chain_sdk::{IdentityResolver, RequestContext};
//!
//! let ctx = RequestContext::new(headers);
//! let identity = resolver.resolve(&ctx).await?;
//! println!("{}", serde_json::to_string(&identity)?);
//! ```

pub mod api;
pub mod error;
pub mod models;
pub mod plugin_api;

// Re-export main types at crate root
pub use api::IdentityResolver;
pub use error::{ApiKeyValidationError, ChainError, ClaimTypeError, CollectorError, ErrorKind};
pub use models::{
    Claims, Credential, Outcome, Phase, RequestContext, Resolution, TraceEntry,
};
pub use plugin_api::{ApiKeyValidator, FnValidator};
