// ── Session configuration ──
//
// Immutable settings for one session. Built once from user configuration
// and swapped as a whole on reconfiguration; components only read it.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::filter::{FilterRules, RawFilters};
use crate::store::MonitoredParameter;

pub const DEFAULT_PORT: u16 = 9000;
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(5000);

/// Everything a session needs to discover and monitor a provider tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Provider host, used for logs and by transports that dial out.
    pub host: String,
    pub port: u16,
    /// How long `connect` may take before the session is marked failed.
    #[serde(with = "duration_ms")]
    pub connect_timeout: Duration,
    /// Crawl the tree for parameters at session start.
    pub auto_parse: bool,
    /// Compiled discovery filters.
    pub filters: FilterRules,
    /// Parameters monitored regardless of the crawl, labelled by path.
    pub monitored: Vec<MonitoredParameter>,
}

impl SessionConfig {
    /// Compile raw filter strings and the comma-separated list of
    /// explicitly monitored paths. Entries that are not numeric paths
    /// are skipped.
    pub fn from_raw(raw: &RawFilters, monitored_paths: Option<&str>) -> Self {
        Self {
            filters: FilterRules::compile(raw),
            monitored: crate::filter::split_list(monitored_paths)
                .into_iter()
                .filter_map(|text| {
                    let path = text.parse().ok()?;
                    Some(MonitoredParameter { path, label: text })
                })
                .collect(),
            ..Self::default()
        }
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: DEFAULT_PORT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            auto_parse: false,
            filters: FilterRules::default(),
            monitored: Vec::new(),
        }
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    #[allow(clippy::cast_possible_truncation, clippy::as_conversions)]
    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
