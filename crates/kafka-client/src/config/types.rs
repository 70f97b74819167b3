//! Configuration type definitions.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

/// Client id sent to Kafka when none is configured.
pub const DEFAULT_CLIENT_ID: &str = "kafka-client";

/// Root configuration structure.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Config {
    /// Client id sent to Kafka (default: "kafka-client").
    #[serde(default = "default_client_id")]
    pub client_id: String,

    /// Cluster aliases, each mapping to a comma separated broker list.
    #[serde(default)]
    pub clusters: BTreeMap<String, String>,

    /// Time to run before exiting cleanly (default: 0, run until interrupted).
    #[serde(default, with = "duration_format")]
    pub duration: Duration,

    /// Time to wait between producing two messages (default: 0).
    #[serde(default, with = "duration_format")]
    pub period: Duration,

    /// Time between throughput lines (default: 1s).
    #[serde(default = "default_report_period", with = "duration_format")]
    pub report_period: Duration,

    /// Only log failures and the final summary.
    #[serde(default)]
    pub quiet: bool,

    /// librdkafka properties passed through to every client.
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            client_id: default_client_id(),
            clusters: BTreeMap::new(),
            duration: Duration::ZERO,
            period: Duration::ZERO,
            report_period: default_report_period(),
            quiet: false,
            properties: BTreeMap::new(),
        }
    }
}

fn default_client_id() -> String {
    DEFAULT_CLIENT_ID.to_string()
}

fn default_report_period() -> Duration {
    crate::report::DEFAULT_REPORT_PERIOD
}

/// Parse a duration such as `500ms`, `2s`, `1m30s`, `1.5h` or `0`.
///
/// Units are `ns`, `us`, `ms`, `s`, `m` and `h`. A bare number is only
/// accepted for zero.
pub fn parse_duration(text: &str) -> std::result::Result<Duration, String> {
    let text = text.trim();
    if text.is_empty() {
        return Err("empty duration".into());
    }
    if text.chars().all(|c| c == '0') {
        return Ok(Duration::ZERO);
    }

    let mut total = 0f64;
    let mut rest = text;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .ok_or_else(|| format!("missing unit in duration '{}'", text))?;
        if number_len == 0 {
            return Err(format!("invalid duration '{}'", text));
        }
        let number: f64 = rest[..number_len]
            .parse()
            .map_err(|_| format!("invalid number in duration '{}'", text))?;
        rest = &rest[number_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let seconds_per_unit = match &rest[..unit_len] {
            "ns" => 1e-9,
            "us" | "µs" => 1e-6,
            "ms" => 1e-3,
            "s" => 1.0,
            "m" => 60.0,
            "h" => 3600.0,
            unit => return Err(format!("unknown unit '{}' in duration '{}'", unit, text)),
        };
        rest = &rest[unit_len..];
        total += number * seconds_per_unit;
    }

    Duration::try_from_secs_f64(total).map_err(|e| format!("invalid duration '{}': {}", text, e))
}

/// Serde adapter for human readable durations.
mod duration_format {
    use std::time::Duration;

    use serde::{de, Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(u64),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Text(text) => super::parse_duration(&text).map_err(de::Error::custom),
            Raw::Number(0) => Ok(Duration::ZERO),
            Raw::Number(n) => Err(de::Error::custom(format!(
                "duration {} needs a unit, e.g. {}s",
                n, n
            ))),
        }
    }
}
