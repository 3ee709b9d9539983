//! Collector Chain Module
//!
//! Resolves the identity of a request from whichever credentials it
//! carries. Identity collectors (cookie token, API key, client certificate,
//! static fallback) are tried in order; authorization collectors then add
//! authorities, checking certificate-bound access tokens against the
//! certificate the identity was established with.
//!
//! Build a [`CollectorChain`] from a [`config::ChainConfig`] and the
//! host's [`module::Callbacks`], then use it through the
//! [`collector_chain_sdk::IdentityResolver`] trait.
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod config;
pub mod domain;
pub mod module;

pub use domain::{CollectorChain, ConfigError};
pub use module::Callbacks;
