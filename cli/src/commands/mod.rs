//! CLI command definitions and dispatch.

mod save;
mod volume;

use std::path::PathBuf;

use a3s_stow_core::config::{GlobalOptions, DEFAULT_NAMESPACE};
use clap::{Args, Parser, Subcommand};

/// A3S Stow: portable image archives and volume housekeeping.
#[derive(Parser)]
#[command(name = "a3s-stow", version, about)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Flags accepted before or after any subcommand.
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Namespace images, containers and volumes belong to
    #[arg(long, global = true, default_value = DEFAULT_NAMESPACE)]
    pub namespace: String,

    /// Root directory of the local stores [default: ~/.a3s]
    #[arg(long, global = true, value_name = "DIR")]
    pub data_root: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,
}

impl GlobalArgs {
    pub fn options(&self) -> GlobalOptions {
        GlobalOptions {
            namespace: self.namespace.clone(),
            data_root: self.data_root.clone().unwrap_or_else(default_data_root),
            debug: self.debug,
        }
    }
}

/// Available commands.
#[derive(Subcommand)]
pub enum Command {
    /// Save one or more images to a tar archive (streamed to stdout by default)
    Save(save::SaveArgs),
    /// Manage volumes
    Volume(volume::VolumeArgs),
}

/// Return the default data root (~/.a3s).
pub(crate) fn default_data_root() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".a3s"))
        .unwrap_or_else(|| PathBuf::from(".a3s"))
}

/// Dispatch a parsed CLI to the appropriate command handler.
pub async fn dispatch(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let global = cli.global.options();
    match cli.command {
        Command::Save(args) => save::execute(args, global).await,
        Command::Volume(args) => volume::execute(args, global).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "a3s-stow",
            "volume",
            "prune",
            "--namespace",
            "team-a",
            "--data-root",
            "/tmp/stow",
            "--force",
        ])
        .unwrap();
        let options = cli.global.options();
        assert_eq!(options.namespace, "team-a");
        assert_eq!(options.data_root, PathBuf::from("/tmp/stow"));
        assert!(!options.debug);
    }

    #[test]
    fn test_default_namespace_and_root() {
        let cli = Cli::try_parse_from(["a3s-stow", "--debug", "save", "nginx"]).unwrap();
        let options = cli.global.options();
        assert_eq!(options.namespace, DEFAULT_NAMESPACE);
        assert!(options.data_root.ends_with(".a3s"));
        assert!(options.debug);
    }
}
