//! Load a tree definition and tick it until it finishes.
//!
//! ```text
//! cargo run --example run_tree -- demos/trees/main.bt
//! cargo run --example run_tree -- --log-level debug --log-file run.log demos/trees/main.yaml
//! ```
//!
//! The exit code is 0 for `Success`, 1 for `Failure` and 2 for anything else.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::Context as _;
use beech_tree::{load_str, load_yaml, NodeStatus, Registry, Tree};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(about = "Run a behavior tree until it stops running")]
struct Cli {
    /// Tree definition, either the tree DSL or YAML (`.yaml` / `.yml`)
    tree: PathBuf,

    /// Log level used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Also write the log to this file
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Milliseconds between ticks
    #[arg(long, default_value_t = 10)]
    interval: u64,

    /// Skip static port checks while loading
    #[arg(long)]
    no_check_ports: bool,
}

fn init_logging(cli: &Cli) -> anyhow::Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&cli.log_level))?;

    let file_layer = match &cli.log_file {
        Some(path) => {
            let file = fs::File::create(path)
                .with_context(|| format!("cannot create log file {}", path.display()))?;
            Some(
                fmt::layer()
                    .with_writer(Mutex::new(file))
                    .with_ansi(false),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();
    Ok(())
}

fn load_tree(path: &Path, check_ports: bool) -> anyhow::Result<Tree> {
    let source = fs::read_to_string(path)
        .with_context(|| format!("cannot read {}", path.display()))?;
    let registry = Registry::default();
    let is_yaml = matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("yaml" | "yml")
    );
    let tree = if is_yaml {
        load_yaml(&source, &registry, check_ports)?
    } else {
        load_str(&source, &registry, check_ports)?
    };
    Ok(tree)
}

fn exit_code(status: NodeStatus) -> u8 {
    match status {
        NodeStatus::Success => 0,
        NodeStatus::Failure => 1,
        _ => 2,
    }
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(&cli)?;

    let mut tree = load_tree(&cli.tree, !cli.no_check_ports)?;
    info!(path = %cli.tree.display(), "loaded tree");
    print!("{}", tree.outline());

    let status = tree.tick_while_running(
        &mut |value| {
            if let Some(message) = value.downcast_ref::<String>() {
                println!("{}", message);
            }
            None
        },
        Duration::from_millis(cli.interval),
    )?;

    info!(?status, "tree finished");
    Ok(ExitCode::from(exit_code(status)))
}
