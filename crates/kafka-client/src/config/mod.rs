//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::debug;

use crate::error::{ClientError, Result};
use crate::kafka::{split_brokers, ClientSettings};

/// File name of the configuration in the home directory.
pub const DEFAULT_CONFIG_FILE: &str = ".kafka-client.yaml";

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Load the configuration for a command.
    ///
    /// An explicit path must exist. Otherwise `$HOME/.kafka-client.yaml` is
    /// read if present, falling back to defaults.
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path).map_err(|e| match e {
                ClientError::Io(io) => ClientError::Config(format!(
                    "cannot read config file '{}': {}",
                    path.display(),
                    io
                )),
                other => other,
            });
        }

        match default_path() {
            Some(path) if path.is_file() => {
                debug!("using config file {}", path.display());
                Self::load(path)
            }
            _ => Ok(Self::default()),
        }
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        // An empty document is an empty configuration
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }

    /// Brokers of the cluster alias `cluster`, or `cluster` itself when it
    /// is not an alias.
    pub fn resolve_cluster<'a>(&'a self, cluster: &'a str) -> &'a str {
        self.clusters
            .get(cluster)
            .map(String::as_str)
            .unwrap_or(cluster)
    }

    /// Broker list of a cluster argument.
    pub fn brokers(&self, cluster: &str) -> Result<Vec<String>> {
        let brokers = split_brokers(self.resolve_cluster(cluster));
        if brokers.is_empty() {
            return Err(ClientError::Config(format!(
                "no brokers given for cluster '{}'",
                cluster
            )));
        }
        Ok(brokers)
    }

    /// Settings shared by every Kafka client of a command.
    pub fn client_settings(&self) -> ClientSettings {
        ClientSettings {
            client_id: self.client_id.clone(),
            properties: self.properties.clone(),
        }
    }

    /// Throughput line period, `None` in quiet mode.
    pub fn reporting_period(&self) -> Option<Duration> {
        if self.quiet || self.report_period.is_zero() {
            None
        } else {
            Some(self.report_period)
        }
    }

    /// Run deadline, `None` to run until interrupted or exhausted.
    pub fn run_duration(&self) -> Option<Duration> {
        Some(self.duration).filter(|d| !d.is_zero())
    }
}

fn default_path() -> Option<PathBuf> {
    std::env::var_os("HOME").map(|home| PathBuf::from(home).join(DEFAULT_CONFIG_FILE))
}
