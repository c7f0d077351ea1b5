//! Shared configuration for emberlink tools.
//!
//! TOML profiles, one per provider, loaded through figment with
//! `EMBERLINK_` environment overrides and translated into
//! `emberlink_core::SessionConfig`. The CLI layers its flags on top.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use emberlink_core::config::DEFAULT_PORT;
use emberlink_core::filter::split_list;
use emberlink_core::{QualifiedPath, RawFilters, SessionConfig};

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("profile '{name}' is not defined")]
    UnknownProfile { name: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    /// Profile used when none is named on the command line.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named provider profiles.
    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Pick `name`, falling back to the configured default profile.
    pub fn profile<'a>(
        &'a self,
        name: Option<&'a str>,
    ) -> Result<(&'a str, &'a Profile), ConfigError> {
        let name = name
            .or(self.default_profile.as_deref())
            .unwrap_or("default");
        self.profiles
            .get(name)
            .map(|profile| (name, profile))
            .ok_or_else(|| ConfigError::UnknownProfile { name: name.into() })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    /// Connect timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_timeout_ms() -> u64 {
    5000
}

/// A named provider profile.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Profile {
    /// Provider host name or address.
    #[serde(default)]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Override the default connect timeout.
    pub timeout_ms: Option<u64>,

    /// Crawl the provider tree at session start.
    #[serde(default)]
    pub auto_parse: bool,

    /// Comma-separated subtree paths the crawl is limited to.
    pub auto_parse_paths: Option<String>,

    /// Comma-separated label substrings.
    pub node_filters: Option<String>,

    /// Comma-separated parameter identifiers.
    pub parameter_filters: Option<String>,

    /// Comma-separated paths monitored regardless of the crawl.
    pub monitored_parameters: Option<String>,

    /// Serve the tree from a JSON snapshot instead of a live provider.
    pub tree: Option<PathBuf>,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: DEFAULT_PORT,
            timeout_ms: None,
            auto_parse: false,
            auto_parse_paths: None,
            node_filters: None,
            parameter_filters: None,
            monitored_parameters: None,
            tree: None,
        }
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

impl Profile {
    pub fn raw_filters(&self) -> RawFilters {
        RawFilters {
            auto_parse_paths: self.auto_parse_paths.clone(),
            node_filters: self.node_filters.clone(),
            parameter_filters: self.parameter_filters.clone(),
        }
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("org", "emberlink", "emberlink").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("emberlink");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load the full Config from `path` + environment. A missing file yields
/// the defaults.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("EMBERLINK_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Session translation ─────────────────────────────────────────────

/// Build a `SessionConfig` from a profile.
///
/// Path lists are checked up front so a typo fails loudly instead of
/// silently monitoring nothing.
pub fn profile_to_session_config(
    profile: &Profile,
    defaults: &Defaults,
) -> Result<SessionConfig, ConfigError> {
    if profile.port == 0 {
        return Err(ConfigError::Validation {
            field: "port".into(),
            reason: "must be between 1 and 65535".into(),
        });
    }
    validate_paths("auto_parse_paths", profile.auto_parse_paths.as_deref())?;
    validate_paths("monitored_parameters", profile.monitored_parameters.as_deref())?;

    let timeout_ms = profile.timeout_ms.unwrap_or(defaults.timeout_ms);

    Ok(SessionConfig {
        host: profile.host.clone(),
        port: profile.port,
        connect_timeout: Duration::from_millis(timeout_ms),
        auto_parse: profile.auto_parse,
        ..SessionConfig::from_raw(&profile.raw_filters(), profile.monitored_parameters.as_deref())
    })
}

fn validate_paths(field: &str, list: Option<&str>) -> Result<(), ConfigError> {
    for entry in split_list(list) {
        match entry.parse::<QualifiedPath>() {
            Ok(path) if !path.is_root() => {}
            _ => {
                return Err(ConfigError::Validation {
                    field: field.into(),
                    reason: format!("'{entry}' is not a numeric path like 1.2.3"),
                });
            }
        }
    }
    Ok(())
}
