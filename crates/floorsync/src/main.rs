mod cli;
mod commands;
mod error;
mod output;

use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use floorsync_config::Config;

use crate::cli::{Cli, Command, GlobalOpts};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    setup_logging(&cli.global);

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

/// Logs go to stderr so stdout stays machine-readable. `RUST_LOG` wins
/// over `-v`; `-q` keeps only errors.
fn setup_logging(global: &GlobalOpts) {
    let level = match (global.quiet, global.verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        (false, _) => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(global.verbose > 2)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let Cli { global, command } = cli;
    match command {
        // No server needed
        Command::Duration(args) => commands::duration::handle(args, &global),
        Command::Config(args) => commands::config_cmd::handle(args, &global),
        Command::Topology(args) => commands::topology::handle(args, &global),
        Command::Completions(args) => {
            clap_complete::generate(
                args.shell,
                &mut Cli::command(),
                "floorsync",
                &mut std::io::stdout(),
            );
            Ok(())
        }

        online => {
            let config = load_config(&global)?;
            tracing::debug!(command = ?online, server = %config.server.host, "running command");
            commands::dispatch(online, &config, &global).await
        }
    }
}

/// Config file and `FLOORSYNC_*` variables, then `--host` / `--insecure`.
pub(crate) fn load_config(global: &GlobalOpts) -> Result<Config, CliError> {
    let mut config = match global.config.as_deref() {
        Some(path) => floorsync_config::load_config_from(path)?,
        None => floorsync_config::load_config()?,
    };
    if let Some(host) = global.host.as_deref() {
        config.apply_host_override(host)?;
    }
    config.server.insecure |= global.insecure;
    Ok(config)
}
