mod chat;
mod cli;
mod observability;
mod terminal;

use anyhow::Result;
use clap::Parser;

use cli::{Cli, Commands};
use observability::TracingMode;

fn main() -> Result<()> {
    let cli = Cli::parse();
    let mode = match cli.command {
        Commands::Chat => TracingMode::Chat,
        _ => TracingMode::Default,
    };
    observability::init_tracing(mode);

    match &cli.command {
        Commands::Chat => chat::run_chat(&cli.options),
        Commands::Run { message } => chat::run_single(&cli.options, &message.join(" ")),
        Commands::Skills { docs } => chat::list_skills(&cli.options, *docs),
        Commands::Tools => chat::list_tools(&cli.options),
    }
}
