//! Command dispatch: bridges CLI args -> orchestrator calls -> output formatting.

pub mod channels;
pub mod config_cmd;
pub mod network;
pub mod play;
pub mod probe;
pub mod proxy;
pub mod util;

use chanline_config::Config;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a command that needs the loaded configuration.
pub async fn dispatch(cmd: Command, cfg: Config, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Probe(args) => probe::handle(args, &cfg, global).await,
        Command::Network(args) => network::handle(args, &cfg, global).await,
        Command::Proxy(args) => proxy::handle(args, cfg, global).await,
        Command::Channels(args) => channels::handle(&args, &cfg, global),
        Command::Play(args) => play::handle(args, &cfg, global).await,
        Command::Config(args) => config_cmd::handle(args, cfg, global),
        // Completions is handled before dispatch
        Command::Completions(_) => Ok(()),
    }
}
