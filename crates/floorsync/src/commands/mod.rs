//! Command dispatch: bridges CLI args -> dashboard calls -> output formatting.

pub mod config_cmd;
pub mod duration;
pub mod module;
pub mod topology;
pub mod watch;

use floorsync_config::Config;
use floorsync_core::{Dashboard, ModuleAddress};

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a server-bound command to the appropriate handler.
pub async fn dispatch(cmd: Command, config: &Config, global: &GlobalOpts) -> Result<(), CliError> {
    let dashboard = Dashboard::new(config.to_dashboard_config()?)?;

    match cmd {
        Command::Watch(args) => watch::handle(&dashboard, config, args, global).await,
        Command::Get(args) => module::get(&dashboard, args, global).await,
        Command::Set(args) => module::set(&dashboard, args, global).await,
        Command::Toggle(args) => module::toggle(&dashboard, args, global).await,
        Command::Calibrate => module::calibrate(&dashboard, global).await,
        // Offline commands are handled before dispatch
        Command::Duration(_)
        | Command::Topology(_)
        | Command::Config(_)
        | Command::Completions(_) => unreachable!(),
    }
}

/// Parse a hex module address given on the command line.
pub(crate) fn parse_address(input: &str) -> Result<ModuleAddress, CliError> {
    Ok(input.parse::<ModuleAddress>()?)
}
