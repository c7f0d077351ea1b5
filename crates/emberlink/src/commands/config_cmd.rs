//! Config subcommand handlers.

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts, InitArgs};
use crate::config::{self, Config, Profile};
use crate::error::CliError;
use crate::output;

// ── Helpers ─────────────────────────────────────────────────────────

fn parse_flag<T: std::str::FromStr>(
    field: &str,
    value: &str,
    expected: &str,
) -> Result<T, CliError> {
    value.parse().map_err(|_| CliError::Validation {
        field: field.into(),
        reason: format!("must be {expected}"),
    })
}

/// Optional list fields are cleared by setting them to an empty string.
fn optional(value: String) -> Option<String> {
    if value.trim().is_empty() { None } else { Some(value) }
}

fn set_key(profile: &mut Profile, key: &str, value: String) -> Result<(), CliError> {
    match key {
        "host" => profile.host = value,
        "port" => profile.port = parse_flag("port", &value, "a port number")?,
        "timeout_ms" | "timeout-ms" | "timeout" => {
            profile.timeout_ms = Some(parse_flag("timeout_ms", &value, "a number (milliseconds)")?);
        }
        "auto_parse" | "auto-parse" => {
            profile.auto_parse = parse_flag("auto_parse", &value, "'true' or 'false'")?;
        }
        "auto_parse_paths" | "auto-parse-paths" => profile.auto_parse_paths = optional(value),
        "node_filters" | "node-filters" => profile.node_filters = optional(value),
        "parameter_filters" | "parameter-filters" => profile.parameter_filters = optional(value),
        "monitored_parameters" | "monitored-parameters" | "monitor" => {
            profile.monitored_parameters = optional(value);
        }
        "tree" => profile.tree = optional(value).map(Into::into),
        other => {
            return Err(CliError::Validation {
                field: other.into(),
                reason: format!(
                    "unknown config key '{other}'. Valid keys: host, port, timeout_ms, \
                     auto_parse, auto_parse_paths, node_filters, parameter_filters, \
                     monitored_parameters, tree"
                ),
            });
        }
    }
    Ok(())
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        // ── Init: profile from flags ────────────────────────────────
        ConfigCommand::Init(init) => init_profile(&init, global),

        // ── Show ────────────────────────────────────────────────────
        ConfigCommand::Show => {
            let cfg = config::load_config()?;
            let out = output::render_single(
                &global.output,
                &cfg,
                |c| toml::to_string_pretty(c).unwrap_or_default(),
                |_| "config".into(),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        // ── Path ────────────────────────────────────────────────────
        ConfigCommand::Path => {
            output::print_output(&config::config_path().display().to_string(), global.quiet);
            Ok(())
        }

        // ── Set <key> <value> ───────────────────────────────────────
        ConfigCommand::Set { key, value } => {
            let mut cfg = config::load_config()?;
            let profile_name = config::active_profile_name(global, &cfg);
            let profile = cfg.profiles.entry(profile_name.clone()).or_default();

            set_key(profile, &key, value)?;
            // Fail now rather than at the next session start.
            config::profile_to_session_config(profile, &cfg.defaults)?;

            config::save_config(&cfg)?;
            output::status(
                &format!("set {key} on profile '{profile_name}'"),
                true,
                &global.color,
                global.quiet,
            );
            Ok(())
        }

        // ── Profiles ────────────────────────────────────────────────
        ConfigCommand::Profiles => {
            let cfg = config::load_config()?;
            let default = cfg.default_profile.as_deref().unwrap_or("default");
            let lines: Vec<String> = cfg
                .profiles
                .keys()
                .map(|name| {
                    if name == default {
                        format!("* {name}")
                    } else {
                        format!("  {name}")
                    }
                })
                .collect();
            output::print_output(&lines.join("\n"), global.quiet);
            Ok(())
        }

        // ── Use <name> ──────────────────────────────────────────────
        ConfigCommand::Use { name } => {
            let mut cfg = config::load_config()?;
            if !cfg.profiles.contains_key(&name) {
                return Err(CliError::ProfileNotFound {
                    available: config::available_profiles(&cfg),
                    name,
                });
            }
            cfg.default_profile = Some(name.clone());
            config::save_config(&cfg)?;
            output::status(
                &format!("default profile is now '{name}'"),
                true,
                &global.color,
                global.quiet,
            );
            Ok(())
        }
    }
}

/// Write a profile built from the global flags, making it the default
/// when the config has none yet.
fn init_profile(init: &InitArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let config_path = config::config_path();
    let mut cfg = if config_path.exists() {
        config::load_config()?
    } else {
        Config {
            default_profile: None,
            ..Config::default()
        }
    };

    if cfg.profiles.contains_key(&init.name) && !init.force {
        return Err(CliError::Validation {
            field: "name".into(),
            reason: format!(
                "profile '{}' already exists; pass --force to replace it",
                init.name
            ),
        });
    }

    let mut profile = Profile {
        host: global.host.clone().unwrap_or_default(),
        auto_parse: init.crawl || global.auto_parse,
        timeout_ms: global.timeout,
        auto_parse_paths: global.auto_parse_paths.clone(),
        node_filters: global.node_filters.clone(),
        parameter_filters: global.parameter_filters.clone(),
        monitored_parameters: global.monitor.clone(),
        tree: global.tree.clone(),
        ..Profile::default()
    };
    if let Some(port) = global.port {
        profile.port = port;
    }
    config::profile_to_session_config(&profile, &cfg.defaults)?;

    cfg.profiles.insert(init.name.clone(), profile);
    if cfg.default_profile.is_none() {
        cfg.default_profile = Some(init.name.clone());
    }
    config::save_config(&cfg)?;

    output::status(
        &format!(
            "profile '{}' written to {}",
            init.name,
            config_path.display()
        ),
        true,
        &global.color,
        global.quiet,
    );
    Ok(())
}
