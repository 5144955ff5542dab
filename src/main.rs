use anyhow::Result;
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use pgprobe::commands::{self, config::ConfigCommands};
use pgprobe::config::{self, ConfigInput, OutputFormat, OutputInput, ProbesInput};
use pgprobe::constants::CONFIG_FILENAME;
use pgprobe::{db, docker};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[arg(long, default_value = CONFIG_FILENAME, global = true)]
    config_file: String,

    /// Enable verbose output (info level)
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    /// Suppress all non-essential output (error level only)
    #[arg(long, short = 'q', global = true)]
    quiet: bool,

    /// Enable debug output (debug level)
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Parser)]
struct RunArgs {
    #[command(flatten)]
    target_args: config::TargetArgs,

    #[command(flatten)]
    container_args: config::ContainerArgs,

    #[command(flatten)]
    filter_args: config::ProbeFilterArgs,

    /// Stop at the first probe that does not pass
    #[arg(long)]
    fail_fast: bool,

    /// Per-query timeout in seconds
    #[arg(long)]
    query_timeout: Option<u64>,

    /// Output format
    #[arg(long, value_enum)]
    format: Option<OutputFormat>,
}

#[derive(Parser)]
struct ListArgs {
    #[command(flatten)]
    filter_args: config::ProbeFilterArgs,

    /// Output format
    #[arg(long, value_enum)]
    format: Option<OutputFormat>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run probes, each against a fresh PostgreSQL database
    Run(RunArgs),

    /// List available probes
    List(ListArgs),

    /// Inspect or validate configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let cli = Cli::parse();
    initialize_logging(&cli);
    let result = tokio::select! {
        result = run_main(cli) => result,
        _ = wait_for_shutdown_signal() => {
            info!("Received shutdown signal, cleaning up...");
            Ok(false)
        }
    };

    // Scratch databases may live in a registered container, so drop them first
    db::cleanup_all_scratch_databases().await;
    if let Err(e) = docker::cleanup_all_containers().await {
        eprintln!("Warning: Failed to cleanup Docker containers: {}", e);
    }

    if !result? {
        std::process::exit(1);
    }
    Ok(())
}

async fn wait_for_shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

fn initialize_logging(cli: &Cli) {
    let level = if cli.debug {
        "debug"
    } else if cli.verbose {
        "info"
    } else if cli.quiet {
        "error"
    } else {
        "warn" // default level
    };

    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::new(level)
    };

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Dispatch the subcommand; `Ok(false)` means the run completed but failed
async fn run_main(cli: Cli) -> Result<bool> {
    let (file_config, root_dir) = config::load_config(&cli.config_file)?;

    match cli.command {
        Commands::Run(args) => {
            let mut probes: ProbesInput = args.filter_args.into();
            probes.fail_fast = args.fail_fast.then_some(true);
            probes.query_timeout_secs = args.query_timeout;

            let cli_config = ConfigInput {
                target: Some(args.target_args.into()),
                container: Some(args.container_args.into()),
                probes: Some(probes),
                output: Some(OutputInput {
                    format: args.format,
                }),
            };

            let config = config::ConfigBuilder::new()
                .with_file(file_config)
                .with_cli_args(cli_config)
                .with_base_dir(root_dir)
                .resolve()?;

            commands::cmd_run(&config).await
        }
        Commands::List(args) => {
            let cli_config = ConfigInput {
                probes: Some(args.filter_args.into()),
                output: Some(OutputInput {
                    format: args.format,
                }),
                ..Default::default()
            };

            let config = config::ConfigBuilder::new()
                .with_file(file_config)
                .with_cli_args(cli_config)
                .with_base_dir(root_dir)
                .resolve()?;

            commands::cmd_list(&config)?;
            Ok(true)
        }
        Commands::Config { command } => {
            let config = config::ConfigBuilder::new()
                .with_file(file_config)
                .with_base_dir(root_dir)
                .resolve()?;

            commands::cmd_config(&cli.config_file, &config, &command)?;
            Ok(true)
        }
    }
}
