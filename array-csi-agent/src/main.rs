//! Command-line entry point wiring the session client, array adapter and
//! volume orchestrators together (spec §6.6). This binary is the
//! operational surface for the control plane: a CSI driver process embeds
//! the same crates directly rather than shelling out to this CLI, which
//! exists for manual operation and for integration testing against a real
//! or simulated array.

mod config;

use std::sync::Arc;

use anyhow::{Context, Result};
use array_client::{ArrayAdapter, Session};
use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};
use config::Config;
use tracing::info;
use volume_orchestrator::{VolumeKind, Volume};

#[derive(Parser)]
#[command(name = "array-csi-agent", about = "Storage array provisioning control plane", long_about = None)]
struct Args {
    /// Path to the TOML configuration file (spec §6.6).
    #[arg(short, long, default_value = "config.toml")]
    config: Utf8PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Creates a volume from a JSON-encoded intent.
    Create {
        #[arg(value_enum)]
        kind: VolumeKindArg,
        /// Path to a JSON file holding a `VolumeIntent`.
        intent_file: Utf8PathBuf,
    },
    /// Deletes a volume by its canonical name.
    Delete {
        #[arg(value_enum)]
        kind: VolumeKindArg,
        canonical_name: String,
    },
    /// Expands a volume to a new size in bytes.
    Expand {
        #[arg(value_enum)]
        kind: VolumeKindArg,
        canonical_name: String,
        new_size: i64,
    },
    /// Looks up a volume's current state.
    Query {
        #[arg(value_enum)]
        kind: VolumeKindArg,
        canonical_name: String,
    },
    /// Creates a snapshot of a volume.
    SnapshotCreate { parent_id: String, name: String },
    /// Deletes a snapshot by name.
    SnapshotDelete { name: String },
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum VolumeKindArg {
    San,
    Nas,
}

impl From<VolumeKindArg> for VolumeKind {
    fn from(value: VolumeKindArg) -> Self {
        match value {
            VolumeKindArg::San => VolumeKind::San,
            VolumeKindArg::Nas => VolumeKind::Nas,
        }
    }
}

fn init_logging(format: config::LogFormat) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    match format {
        config::LogFormat::Plain => {
            tracing_subscriber::fmt().with_env_filter(env_filter).init();
        }
        config::LogFormat::Json => {
            tracing_subscriber::fmt().with_env_filter(env_filter).json().init();
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::load(&args.config).with_context(|| format!("loading {}", args.config))?;
    init_logging(config.log_format);

    let adapter = build_adapter(config.array.clone())
        .await
        .context("building primary array client")?;

    match args.command {
        Command::Create { kind, intent_file } => {
            let raw = std::fs::read_to_string(&intent_file)
                .with_context(|| format!("reading {intent_file}"))?;
            let intent: array_protocol::VolumeIntent =
                serde_json::from_str(&raw).context("parsing volume intent")?;
            let remote = match config.remote_array.clone() {
                Some(remote_cfg) => Some(build_remote_target(remote_cfg).await?),
                None => None,
            };
            let volume = volume_orchestrator::create_volume(adapter, &intent, kind.into(), remote)
                .await
                .context("creating volume")?;
            print_volume(&volume);
        }
        Command::Delete { kind, canonical_name } => match kind.into() {
            VolumeKind::San => {
                volume_orchestrator::delete_san_volume(
                    &adapter,
                    &canonical_name,
                    &volume_orchestrator::DeleteDependents::default(),
                )
                .await
                .context("deleting SAN volume")?;
                info!(canonical_name, "deleted");
            }
            VolumeKind::Nas => {
                volume_orchestrator::delete_nas_volume(
                    &adapter,
                    &canonical_name,
                    None,
                    None,
                    &volume_orchestrator::DeleteDependents::default(),
                )
                .await
                .context("deleting NAS volume")?;
                info!(canonical_name, "deleted");
            }
        },
        Command::Expand {
            kind,
            canonical_name,
            new_size,
        } => match kind.into() {
            VolumeKind::San => {
                let (volume, attached) =
                    volume_orchestrator::expand_san_volume(&adapter, &canonical_name, new_size, None, None)
                        .await
                        .context("expanding SAN volume")?;
                print_volume(&volume);
                info!(attached, "expand complete");
            }
            VolumeKind::Nas => {
                let volume = volume_orchestrator::expand_nas_volume(&adapter, &canonical_name, new_size)
                    .await
                    .context("expanding NAS volume")?;
                print_volume(&volume);
            }
        },
        Command::Query { kind, canonical_name } => {
            let volume = volume_orchestrator::query_volume(&adapter, &canonical_name, kind.into())
                .await
                .context("querying volume")?;
            print_volume(&volume);
        }
        Command::SnapshotCreate { parent_id, name } => {
            let poller = task_flow::Poller::new(Arc::new(task_flow::TokioClock));
            let info = volume_orchestrator::create_snapshot(&adapter, &poller, &parent_id, &name)
                .await
                .context("creating snapshot")?;
            println!("{}", serde_json::to_string_pretty(&info)?);
        }
        Command::SnapshotDelete { name } => {
            volume_orchestrator::delete_snapshot(&adapter, &name)
                .await
                .context("deleting snapshot")?;
            info!(name, "snapshot deleted");
        }
    }

    Ok(())
}

async fn build_adapter(cfg: config::ArrayConfig) -> Result<Arc<ArrayAdapter>> {
    let supports_clone_pair = cfg.supports_clone_pair;
    let session = Session::new(cfg.into_session_config()).context("building session")?;
    let session = Arc::new(session);
    session.login().await.context("logging into array")?;
    Ok(Arc::new(ArrayAdapter::new(session, supports_clone_pair)))
}

async fn build_remote_target(cfg: config::ArrayConfig) -> Result<volume_orchestrator::RemoteTarget> {
    let pool_id = cfg
        .remote_pool_id
        .clone()
        .context("remote_array.remote_pool_id is required when hypermetro/replication is requested")?;
    let domain_id = cfg.hypermetro_domain_id.clone();
    let remote_device_id = cfg.remote_device_id.clone();
    let adapter = build_adapter(cfg).await?;
    Ok(volume_orchestrator::RemoteTarget {
        adapter,
        pool_id,
        domain_id,
        remote_device_id,
    })
}

fn print_volume(volume: &Volume) {
    println!(
        "{}",
        serde_json::to_string_pretty(volume).unwrap_or_else(|_| format!("{volume:?}"))
    );
}
