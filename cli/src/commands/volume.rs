//! `a3s-stow volume` subcommands: manage named volumes.
//!
//! Provides create/ls/rm/inspect/prune. `prune` removes every volume no
//! container record mounts.

use std::collections::BTreeMap;
use std::io::Write;

use a3s_stow_core::config::{GlobalOptions, VolumePruneOptions};
use a3s_stow_runtime::{
    LocalRuntime, PruneOutcome, StreamPrompt, VolumeInventory, VolumePruner, VolumeStore,
};
use clap::{Args, Subcommand};

/// Manage volumes.
#[derive(Args)]
pub struct VolumeArgs {
    #[command(subcommand)]
    pub command: VolumeCommand,
}

/// Volume subcommands.
#[derive(Subcommand)]
pub enum VolumeCommand {
    /// Create a new named volume
    Create(CreateArgs),
    /// List volumes
    Ls(LsArgs),
    /// Remove one or more volumes
    Rm(RmArgs),
    /// Display detailed volume information
    Inspect(InspectArgs),
    /// Remove all unused volumes
    Prune(PruneArgs),
}

#[derive(Args)]
pub struct CreateArgs {
    /// Volume name
    pub name: String,

    /// Set metadata labels (KEY=VALUE), can be repeated
    #[arg(short = 'l', long = "label")]
    pub labels: Vec<String>,
}

#[derive(Args)]
pub struct LsArgs {
    /// Only display volume names
    #[arg(short, long)]
    pub quiet: bool,
}

#[derive(Args)]
pub struct RmArgs {
    /// Volume name(s) to remove
    pub names: Vec<String>,
}

#[derive(Args)]
pub struct InspectArgs {
    /// Volume name
    pub name: String,
}

#[derive(Args)]
pub struct PruneArgs {
    /// Do not prompt for confirmation
    #[arg(short, long)]
    pub force: bool,
}

/// Dispatch volume subcommands.
pub async fn execute(
    args: VolumeArgs,
    global: GlobalOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    match args.command {
        VolumeCommand::Create(a) => execute_create(a, &global).await,
        VolumeCommand::Ls(a) => execute_ls(a, &global).await,
        VolumeCommand::Rm(a) => execute_rm(a, &global).await,
        VolumeCommand::Inspect(a) => execute_inspect(a, &global).await,
        VolumeCommand::Prune(a) => {
            let options = VolumePruneOptions {
                global,
                force: a.force,
            };
            execute_prune(&options).await
        }
    }
}

fn open_store(global: &GlobalOptions) -> Result<VolumeStore, Box<dyn std::error::Error>> {
    Ok(VolumeStore::for_layout(&global.layout()?))
}

async fn execute_create(
    args: CreateArgs,
    global: &GlobalOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store(global)?;
    let labels = parse_labels(&args.labels)?;
    store.create(&args.name, labels)?;
    println!("{}", args.name);
    Ok(())
}

async fn execute_ls(args: LsArgs, global: &GlobalOptions) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store(global)?;
    let volumes = store.list(false)?;

    if args.quiet {
        for vol in &volumes {
            println!("{}", vol.name);
        }
        return Ok(());
    }

    let mut table = crate::output::new_table(&["VOLUME NAME", "MOUNT POINT", "IN USE BY", "CREATED"]);
    for vol in &volumes {
        let in_use = if vol.in_use_by.is_empty() {
            "-".to_string()
        } else {
            format!("{} container(s)", vol.in_use_by.len())
        };
        table.add_row(vec![
            vol.name.clone(),
            vol.mount_point.clone(),
            in_use,
            crate::output::format_ago(&vol.created_at),
        ]);
    }

    println!("{table}");
    Ok(())
}

async fn execute_rm(args: RmArgs, global: &GlobalOptions) -> Result<(), Box<dyn std::error::Error>> {
    if args.names.is_empty() {
        return Err("requires at least 1 argument".into());
    }

    let store = open_store(global)?;
    let outcome = store.remove(&args.names)?;

    for name in &outcome.removed {
        println!("{name}");
    }
    for failure in &outcome.failed {
        eprintln!("Error removing volume '{}': {}", failure.name, failure.reason);
    }

    if outcome.is_complete() {
        Ok(())
    } else {
        Err(format!("failed to remove {} volume(s)", outcome.failed.len()).into())
    }
}

async fn execute_inspect(
    args: InspectArgs,
    global: &GlobalOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store(global)?;

    let volume = store
        .get(&args.name)?
        .ok_or_else(|| format!("volume '{}' not found", args.name))?;

    let json = serde_json::to_string_pretty(&volume)?;
    println!("{json}");
    Ok(())
}

async fn execute_prune(options: &VolumePruneOptions) -> Result<(), Box<dyn std::error::Error>> {
    let layout = options.global.layout()?;
    let store = VolumeStore::for_layout(&layout);
    let runtime = LocalRuntime::open(&layout)?;
    let pruner = VolumePruner::new(&store, &runtime, layout.namespace());

    let outcome = {
        let stdin = std::io::stdin();
        let stdout = std::io::stdout();
        let mut prompt = StreamPrompt::new(stdin.lock(), stdout.lock());
        pruner.prune(options.force, &mut prompt)?
    };

    match outcome {
        PruneOutcome::Cancelled => Ok(()),
        PruneOutcome::Done { removed, failure } => {
            let mut stdout = std::io::stdout().lock();
            crate::output::write_deleted_volumes(&mut stdout, &removed)?;
            stdout.flush()?;
            match failure {
                Some(e) => Err(e.into()),
                None => Ok(()),
            }
        }
    }
}

/// Parse `KEY=VALUE` labels.
fn parse_labels(labels: &[String]) -> Result<BTreeMap<String, String>, String> {
    labels
        .iter()
        .map(|label| {
            label
                .split_once('=')
                .map(|(key, value)| (key.to_string(), value.to_string()))
                .ok_or_else(|| format!("Invalid label (expected KEY=VALUE): {label}"))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use a3s_stow_core::container::{ContainerRecord, MountPoint};
    use a3s_stow_runtime::ContainerStore;
    use tempfile::TempDir;

    fn global(tmp: &TempDir) -> GlobalOptions {
        GlobalOptions::new(tmp.path())
    }

    #[test]
    fn test_parse_labels() {
        let labels = vec!["env=prod".to_string(), "team=infra=core".to_string()];
        let map = parse_labels(&labels).unwrap();
        assert_eq!(map.get("env").unwrap(), "prod");
        assert_eq!(map.get("team").unwrap(), "infra=core");
    }

    #[test]
    fn test_invalid_label_format() {
        assert!(parse_labels(&["no-equals-sign".to_string()]).is_err());
    }

    #[tokio::test]
    async fn test_create_and_remove() {
        let tmp = TempDir::new().unwrap();
        let global = global(&tmp);

        execute_create(
            CreateArgs {
                name: "data".to_string(),
                labels: vec!["env=test".to_string()],
            },
            &global,
        )
        .await
        .unwrap();

        let store = open_store(&global).unwrap();
        let volume = store.get("data").unwrap().unwrap();
        assert_eq!(volume.labels.get("env").unwrap(), "test");

        execute_rm(
            RmArgs {
                names: vec!["data".to_string()],
            },
            &global,
        )
        .await
        .unwrap();
        assert!(store.get("data").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rm_reports_missing_volume() {
        let tmp = TempDir::new().unwrap();
        let result = execute_rm(
            RmArgs {
                names: vec!["ghost".to_string()],
            },
            &global(&tmp),
        )
        .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_rm_requires_names() {
        let tmp = TempDir::new().unwrap();
        let result = execute_rm(RmArgs { names: Vec::new() }, &global(&tmp)).await;
        assert_eq!(result.unwrap_err().to_string(), "requires at least 1 argument");
    }

    #[tokio::test]
    async fn test_rm_refuses_mounted_volume() {
        let tmp = TempDir::new().unwrap();
        let global = global(&tmp);
        let layout = global.layout().unwrap();
        let store = VolumeStore::for_layout(&layout);
        store.create("db", BTreeMap::new()).unwrap();

        let mut containers = ContainerStore::load(&layout.containers_file()).unwrap();
        containers
            .add(ContainerRecord::new("c1", "pg", "postgres").with_mount(MountPoint::volume("db", "/var/lib/postgresql")))
            .unwrap();

        let result = execute_rm(
            RmArgs {
                names: vec!["db".to_string()],
            },
            &global,
        )
        .await;
        assert!(result.is_err());
        assert!(store.get("db").unwrap().is_some());
    }

    #[tokio::test]
    async fn test_forced_prune_keeps_mounted_volumes() {
        let tmp = TempDir::new().unwrap();
        let global = global(&tmp);
        let layout = global.layout().unwrap();
        let store = VolumeStore::for_layout(&layout);
        store.create("used", BTreeMap::new()).unwrap();
        store.create("unused", BTreeMap::new()).unwrap();

        let mut containers = ContainerStore::load(&layout.containers_file()).unwrap();
        containers
            .add(ContainerRecord::new("c1", "web", "nginx").with_mount(MountPoint::volume("used", "/data")))
            .unwrap();

        execute_prune(&VolumePruneOptions {
            global: global.clone(),
            force: true,
        })
        .await
        .unwrap();

        let names: Vec<String> = store.list(true).unwrap().into_iter().map(|v| v.name).collect();
        assert_eq!(names, vec!["used"]);
    }
}
