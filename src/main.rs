//! LC lottery - main entry point
//!
//! Subcommands:
//! - init: create the database and seed the pools
//! - draw: settle a weekly or monthly draw now
//! - purchase / credit / balance: ticket and LC coin account operations
//! - pools / tickets / draws / export: read-only reports
//! - schedule: run draws automatically as they come due

use anyhow::Result;
use clap::{Parser, Subcommand};
use lc_lottery::{Config, DrawType};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;

#[derive(Parser, Debug)]
#[command(name = "lc-lottery")]
#[command(about = "LC coin lottery draws, settlement and payouts", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to configuration file (defaults are used when omitted)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create the database and seed both pools
    Init,

    /// Settle a draw now
    Draw {
        /// Draw type: weekly or monthly
        draw_type: DrawType,
    },

    /// Buy a ticket with LC coins
    Purchase {
        #[arg(short, long)]
        user: String,

        /// weekly (3 numbers 1-30) or monthly (5 numbers 1-50)
        #[arg(short, long)]
        draw_type: DrawType,

        /// Comma-separated numbers, e.g. "4,17,29"
        #[arg(short, long)]
        numbers: String,

        /// Ticket cost in LC (defaults to the draw type's price)
        #[arg(long)]
        cost: Option<f64>,
    },

    /// Add LC coins to an account
    Credit {
        #[arg(short, long)]
        user: String,

        /// LC coins to add
        #[arg(short, long, conflicts_with = "rand", required_unless_present = "rand")]
        amount: Option<f64>,

        /// Rand (ZAR) paid; converted at 3 ZAR per LC coin
        #[arg(long)]
        rand: Option<f64>,
    },

    /// Show an account's LC balance
    Balance {
        #[arg(short, long)]
        user: String,
    },

    /// Show both pools
    Pools,

    /// List a user's tickets, newest first
    Tickets {
        #[arg(short, long)]
        user: String,
    },

    /// List recently settled draws
    Draws {
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Write pools and recent draws to a JSON file
    Export {
        /// Output path (defaults to storage.json_backup_path)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Number of draws to include
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Run due draws on an interval until Ctrl+C
    Schedule {
        /// Check interval in seconds (overrides config)
        #[arg(short, long)]
        interval: Option<u64>,

        /// Check once and exit
        #[arg(long)]
        once: bool,
    },
}

/// HTTP stack under the notification webhook; only its warnings are kept
const WEBHOOK_HTTP_CRATES: [&str; 4] = ["hyper", "hyper_util", "reqwest", "h2"];

fn setup_logging(verbose: bool, command_name: &str, log_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(log_dir)?;

    // One file per invocation: {command}_{timestamp}.log
    let log_filename = format!(
        "{}_{}.log",
        command_name,
        chrono::Local::now().format("%Y-%m-%d_%H-%M-%S")
    );
    let log_path = log_dir.join(&log_filename);

    let mut directives = vec![if verbose { "debug" } else { "info" }.to_string()];
    directives.extend(WEBHOOK_HTTP_CRATES.iter().map(|c| format!("{}=warn", c)));
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(directives.join(",")));

    // Thread names tell settlement output apart from the notify-worker
    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_thread_names(true)
        .with_ansi(true);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(tracing_appender::rolling::never(log_dir, &log_filename))
        .with_target(true)
        .with_thread_names(true)
        .with_line_number(true)
        .with_file(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    info!("lc-lottery {} logging to {}", command_name, log_path.display());

    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let command_name = match &cli.command {
        Commands::Init => "init",
        Commands::Draw { .. } => "draw",
        Commands::Purchase { .. } => "purchase",
        Commands::Credit { .. } => "credit",
        Commands::Balance { .. } => "balance",
        Commands::Pools => "pools",
        Commands::Tickets { .. } => "tickets",
        Commands::Draws { .. } => "draws",
        Commands::Export { .. } => "export",
        Commands::Schedule { .. } => "schedule",
    };

    let config = Config::load(cli.config.as_deref())?;

    setup_logging(cli.verbose, command_name, &config.logging.dir)?;
    if let Some(path) = &cli.config {
        info!("Loaded configuration from: {}", path.display());
    }

    match cli.command {
        Commands::Init => commands::report::init(&config),
        Commands::Draw { draw_type } => commands::draw::run(&config, draw_type),
        Commands::Purchase {
            user,
            draw_type,
            numbers,
            cost,
        } => commands::account::purchase(&config, user, draw_type, numbers, cost),
        Commands::Credit { user, amount, rand } => {
            commands::account::credit(&config, user, amount, rand)
        }
        Commands::Balance { user } => commands::account::balance(&config, user),
        Commands::Pools => commands::report::pools(&config),
        Commands::Tickets { user } => commands::report::tickets(&config, user),
        Commands::Draws { limit } => commands::report::draws(&config, limit),
        Commands::Export { output, limit } => commands::report::export(&config, output, limit),
        Commands::Schedule { interval, once } => commands::schedule::run(config, interval, once),
    }
}
