#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
pub mod authority;
pub mod certificate;
pub mod constants;
pub mod identity;

pub use authority::AuthoritySet;
pub use certificate::CertificateChain;
pub use identity::{Identity, IdentityBuilder};
pub use rustls_pki_types::CertificateDer;
