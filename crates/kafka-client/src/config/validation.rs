//! Configuration validation.

use super::Config;
use crate::error::{ClientError, Result};

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    if config.client_id.trim().is_empty() {
        return Err(ClientError::Config("client_id must not be empty".into()));
    }

    for (alias, brokers) in &config.clusters {
        if alias.trim().is_empty() {
            return Err(ClientError::Config("cluster alias must not be empty".into()));
        }
        if crate::kafka::split_brokers(brokers).is_empty() {
            return Err(ClientError::Config(format!(
                "cluster '{}' has no brokers",
                alias
            )));
        }
    }

    if config.properties.keys().any(|key| key.trim().is_empty()) {
        return Err(ClientError::Config(
            "properties must not contain an empty key".into(),
        ));
    }

    Ok(())
}
