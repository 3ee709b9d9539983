//! Fallback collector.

use multiauth_security::constants::{ANONYMOUS_USERNAME, STATIC_ORIGIN};
use multiauth_security::{AuthoritySet, Identity};

/// Always succeeds with a fixed identity, `anonymous` by default.
///
/// Must close the identity phase so resolution never ends without a
/// principal.
#[derive(Debug, Clone)]
pub struct StaticUserCollector {
    name: String,
    username: String,
    authorities: AuthoritySet,
}

impl Default for StaticUserCollector {
    fn default() -> Self {
        Self {
            name: STATIC_ORIGIN.to_owned(),
            username: ANONYMOUS_USERNAME.to_owned(),
            authorities: AuthoritySet::new(),
        }
    }
}

impl StaticUserCollector {
    #[must_use]
    pub fn new(name: impl Into<String>, username: impl Into<String>, authorities: AuthoritySet) -> Self {
        Self {
            name: name.into(),
            username: username.into(),
            authorities,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn identity(&self) -> Identity {
        Identity::builder()
            .username(self.username.as_str())
            .authorities(self.authorities.clone())
            .origin(self.name.as_str())
            .build()
    }
}
