//! Domain layer for the collector chain.

pub mod collectors;
pub mod error;
pub mod extract;
pub mod service;
pub mod token;
pub mod x509;

pub use error::ConfigError;
pub use service::CollectorChain;
