//! keeld — the Keel scheduler daemon.
//!
//! Loads a service spec, registers the service in the coordination store and
//! reports the plans derived from it.
//!
//! # Usage
//!
//! ```text
//! keeld status --spec svc.toml --data-dir /var/lib/keel --state-cache
//! keeld fail-task --spec svc.toml --pod hello --index 0 --task server
//! keeld recover --spec svc.toml --pod hello --index 0
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use keel_plan::{Plan, RecoveryType};
use keeld::{default_data_dir, OverriderKind, RuntimeOptions, Scheduler};
use tracing::info;

#[derive(Parser)]
#[command(name = "keeld", about = "Keel scheduler daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct RuntimeArgs {
    /// Service spec (TOML).
    #[arg(long)]
    spec: PathBuf,

    /// Directory holding the ensemble database. Defaults to `keel-data`
    /// next to the spec.
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Serve persister reads from an in-process cache.
    #[arg(long)]
    state_cache: bool,

    /// Recovery overrider to install.
    #[arg(long, value_enum, default_value_t = OverriderKind::PermanentReplace)]
    overrider: OverriderKind,
}

impl RuntimeArgs {
    fn into_options(self) -> RuntimeOptions {
        let data_dir = self.data_dir.unwrap_or_else(|| default_data_dir(&self.spec));
        RuntimeOptions {
            spec: self.spec,
            data_dir,
            state_cache_enabled: self.state_cache,
            overrider: self.overrider,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Bootstrap and print the deploy plan.
    Status {
        #[command(flatten)]
        runtime: RuntimeArgs,
    },

    /// Flag a task as lost to a permanent node failure.
    FailTask {
        #[command(flatten)]
        runtime: RuntimeArgs,

        #[arg(long)]
        pod: String,

        #[arg(long)]
        index: u32,

        #[arg(long)]
        task: String,
    },

    /// Print the recovery plan for a stopped pod instance.
    Recover {
        #[command(flatten)]
        runtime: RuntimeArgs,

        #[arg(long)]
        pod: String,

        #[arg(long)]
        index: u32,

        /// Treat the instance as permanently lost.
        #[arg(long)]
        permanent: bool,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,keeld=debug,keel=debug")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Status { runtime } => {
            let scheduler = Scheduler::bootstrap(&runtime.into_options())?;
            print_plan(scheduler.deploy_plan())
        }
        Command::FailTask {
            runtime,
            pod,
            index,
            task,
        } => {
            let scheduler = Scheduler::bootstrap(&runtime.into_options())?;
            scheduler.mark_permanently_failed(&pod, index, &task)
        }
        Command::Recover {
            runtime,
            pod,
            index,
            permanent,
        } => {
            let scheduler = Scheduler::bootstrap(&runtime.into_options())?;
            let mut stopped = scheduler.pod_instance(&pod, index)?;
            if permanent {
                stopped = stopped.with_recovery(RecoveryType::Permanent);
            }
            info!(pod = %stopped.pod_instance_name(), "building recovery plan");
            print_plan(&scheduler.recovery_plan(&[stopped])?)
        }
    }
}

fn print_plan(plan: &Plan) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(&plan.summary())?);
    Ok(())
}
