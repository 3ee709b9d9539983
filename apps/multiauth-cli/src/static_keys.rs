//! In-memory API key validator backed by the CLI configuration.

use std::collections::HashMap;

use async_trait::async_trait;
use collector_chain::Callbacks;
use collector_chain_sdk::{ApiKeyValidationError, ApiKeyValidator};

use crate::config::ApiKeyEntry;

/// Name configuration uses to refer to this validator.
pub const VALIDATOR_NAME: &str = "static";

#[derive(Debug, Clone)]
pub struct KeyOwner {
    pub username: String,
    pub authorities: Vec<String>,
}

/// Maps configured keys to their owners.
#[derive(Debug, Default)]
pub struct StaticApiKeys {
    keys: HashMap<String, KeyOwner>,
}

impl StaticApiKeys {
    #[must_use]
    pub fn from_config(entries: &[ApiKeyEntry]) -> Self {
        let keys = entries
            .iter()
            .map(|e| {
                let owner = KeyOwner {
                    username: e.username.clone(),
                    authorities: e.authorities.clone(),
                };
                (e.key.clone(), owner)
            })
            .collect();
        Self { keys }
    }

    /// Register under [`VALIDATOR_NAME`].
    pub fn register(self, callbacks: &mut Callbacks) {
        callbacks.register_api_key_validator(
            VALIDATOR_NAME,
            self,
            |owner: &KeyOwner| owner.username.clone(),
            |owner: &KeyOwner| owner.authorities.iter().map(String::as_str).collect(),
        );
    }
}

#[async_trait]
impl ApiKeyValidator for StaticApiKeys {
    type Principal = KeyOwner;

    async fn validate(&self, api_key: &str) -> Result<KeyOwner, ApiKeyValidationError> {
        self.keys
            .get(api_key)
            .cloned()
            .ok_or_else(|| ApiKeyValidationError::new("unknown API key"))
    }
}
