//! CLI configuration: thin wrapper around `emberlink_config` shared types.
//!
//! Re-exports the shared types and adds CLI-specific resolution that
//! respects `GlobalOpts` flag overrides (--tree, --host, filters, etc.).

use std::path::PathBuf;

use emberlink_core::SessionConfig;

use crate::cli::GlobalOpts;
use crate::error::CliError;

// ── Re-exports from shared crate ────────────────────────────────────

pub use emberlink_config::{
    Config, Profile, config_path, load_config, profile_to_session_config, save_config,
};

/// Everything needed to start a session from the command line.
#[derive(Debug)]
pub struct Resolved {
    pub session: SessionConfig,
    pub tree: PathBuf,
}

// ── CLI-specific helpers ────────────────────────────────────────────

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| config.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// Pick the active profile and layer the global flags over it.
///
/// A profile named with `--profile` must exist; the implicit default
/// profile may be absent, in which case flags alone describe the session.
pub fn active_profile(global: &GlobalOpts, config: &Config) -> Result<Profile, CliError> {
    let name = active_profile_name(global, config);
    let mut profile = match config.profiles.get(&name) {
        Some(profile) => profile.clone(),
        None if global.profile.is_some() => {
            return Err(CliError::ProfileNotFound {
                name,
                available: available_profiles(config),
            });
        }
        None => Profile::default(),
    };

    apply_overrides(&mut profile, global);
    Ok(profile)
}

/// Translate the active profile + global flags into a session.
///
/// CLI flag overrides take priority over profile values.
pub fn resolve_profile(global: &GlobalOpts, config: &Config) -> Result<Resolved, CliError> {
    let profile = active_profile(global, config)?;
    let session = profile_to_session_config(&profile, &config.defaults)?;
    let tree = profile.tree.ok_or_else(|| CliError::NoTree {
        path: config_path().display().to_string(),
    })?;
    Ok(Resolved { session, tree })
}

fn apply_overrides(profile: &mut Profile, global: &GlobalOpts) {
    if let Some(ref host) = global.host {
        profile.host.clone_from(host);
    }
    if let Some(port) = global.port {
        profile.port = port;
    }
    if let Some(timeout) = global.timeout {
        profile.timeout_ms = Some(timeout);
    }
    if global.auto_parse {
        profile.auto_parse = true;
    }
    if let Some(ref tree) = global.tree {
        profile.tree = Some(tree.clone());
    }

    let lists = [
        (&global.auto_parse_paths, &mut profile.auto_parse_paths),
        (&global.node_filters, &mut profile.node_filters),
        (&global.parameter_filters, &mut profile.parameter_filters),
        (&global.monitor, &mut profile.monitored_parameters),
    ];
    for (flag, field) in lists {
        if flag.is_some() {
            field.clone_from(flag);
        }
    }
}

pub fn available_profiles(config: &Config) -> String {
    if config.profiles.is_empty() {
        return "(none)".into();
    }
    config
        .profiles
        .keys()
        .cloned()
        .collect::<Vec<_>>()
        .join(", ")
}
