mod cli;
mod commands;
mod config;
mod error;
mod output;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use emberlink_core::{Controller, SnapshotProvider, WriteTarget};

use crate::cli::{Cli, Command};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Setup tracing based on verbosity
    init_tracing(cli.global.verbose);

    // Dispatch and handle errors with proper exit codes
    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        // Config commands don't need a provider
        Command::Config(args) => commands::config_cmd::handle(args, &cli.global),

        // Shell completions generation
        Command::Completions(args) => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Cli::command();
            generate(args.shell, &mut cmd, "emberlink", &mut std::io::stdout());
            Ok(())
        }

        // All other commands run one session against the provider
        cmd => {
            let cfg = config::load_config()?;
            let mut resolved = config::resolve_profile(&cli.global, &cfg)?;
            if needs_crawl(&cmd) {
                resolved.session.auto_parse = true;
            }

            let provider = SnapshotProvider::from_path(&resolved.tree).map_err(|e| {
                CliError::Tree {
                    path: resolved.tree.display().to_string(),
                    reason: e.to_string(),
                }
            })?;
            let resolver = commands::write::resolver_for(&cmd)?;
            let controller = Controller::with_resolver(resolved.session, provider, resolver);

            tracing::debug!(command = ?cmd, "dispatching command");
            let result = match controller.connect().await {
                Ok(()) => commands::dispatch(cmd, &controller, &cli.global).await,
                Err(e) => Err(e.into()),
            };
            controller.disconnect().await;
            result
        }
    }
}

/// Labels only exist once the tree has been crawled.
fn needs_crawl(cmd: &Command) -> bool {
    match cmd {
        Command::Crawl | Command::Get { .. } => true,
        other => other
            .target()
            .is_some_and(|target| matches!(WriteTarget::parse(target), WriteTarget::Label(_))),
    }
}
