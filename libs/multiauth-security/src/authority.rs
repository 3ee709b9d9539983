use std::collections::BTreeSet;
use std::collections::btree_set;

use serde::{Deserialize, Serialize};

/// Deduplicated set of authorities granted to an identity.
///
/// Authorities are opaque strings such as group names or token scopes.
/// Iteration and serialization order is lexical.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuthoritySet(BTreeSet<String>);

impl AuthoritySet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a single authority. Returns `false` if it was already present.
    pub fn insert(&mut self, authority: impl Into<String>) -> bool {
        self.0.insert(authority.into())
    }

    /// Union `other` into this set.
    pub fn merge(&mut self, other: &AuthoritySet) {
        self.0.extend(other.0.iter().cloned());
    }

    #[must_use]
    pub fn contains(&self, authority: &str) -> bool {
        self.0.contains(authority)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for AuthoritySet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl<S: Into<String>> Extend<S> for AuthoritySet {
    fn extend<I: IntoIterator<Item = S>>(&mut self, iter: I) {
        self.0.extend(iter.into_iter().map(Into::into));
    }
}

impl IntoIterator for AuthoritySet {
    type Item = String;
    type IntoIter = btree_set::IntoIter<String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a AuthoritySet {
    type Item = &'a String;
    type IntoIter = btree_set::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
