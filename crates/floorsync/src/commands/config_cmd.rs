//! Config subcommand handlers.

use floorsync_config::{self as config, Config};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Show => {
            let cfg = crate::load_config(global)?;
            let toml_text = config::render_config(&cfg)?;
            let rendered = output::render_single(&global.output, &cfg, |_| {
                toml_text.trim_end().to_owned()
            })?;
            output::print_output(&rendered, global.quiet);
        }

        ConfigCommand::Path => {
            let path = global.config.clone().unwrap_or_else(config::config_path);
            output::print_output(&path.display().to_string(), global.quiet);
        }

        ConfigCommand::Init { force } => {
            let path = global.config.clone().unwrap_or_else(config::config_path);
            if path.exists() && !force {
                return Err(CliError::ConfigExists {
                    path: path.display().to_string(),
                });
            }
            config::save_config(&Config::default(), &path)?;
            if !global.quiet {
                eprintln!("Wrote {}", path.display());
            }
        }
    }
    Ok(())
}
