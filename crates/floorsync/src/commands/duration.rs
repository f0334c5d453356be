//! Duration subcommand handlers.

use floorsync_core::{format_duration, parse_duration};

use crate::cli::{DurationArgs, DurationCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

pub fn handle(args: DurationArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let rendered = match args.command {
        DurationCommand::Parse { text } => {
            let seconds = parse_duration(&text.join(" "))?;
            output::render_single(&global.output, &seconds, u64::to_string)?
        }
        DurationCommand::Format { seconds } => {
            let text = format_duration(seconds);
            output::render_single(&global.output, &text, String::clone)?
        }
    };
    output::print_output(&rendered, global.quiet);
    Ok(())
}
