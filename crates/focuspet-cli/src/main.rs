use clap::{Parser, Subcommand};
use focuspet_core::Config;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "focuspet", version, about = "FocusPet CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Task lifecycle and check-ins
    Task {
        #[command(subcommand)]
        action: commands::task::TaskAction,
    },
    /// Companion management
    Pet {
        #[command(subcommand)]
        action: commands::pet::PetAction,
    },
    /// Show the daily streak
    Streak,
    /// List achievement badges
    Badges {
        /// Only show unlocked badges
        #[arg(long)]
        unlocked: bool,
    },
    /// List scheduled alerts
    Alerts,
    /// Unlock premium limits
    Premium,
    /// Follow the active task until it ends, printing events as JSON lines
    Watch,
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(Config::load_or_default().log.filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing();

    let result = match cli.command {
        Commands::Task { action } => commands::task::run(action),
        Commands::Pet { action } => commands::pet::run(action),
        Commands::Streak => commands::rewards::streak(),
        Commands::Badges { unlocked } => commands::rewards::badges(unlocked),
        Commands::Alerts => commands::rewards::alerts(),
        Commands::Premium => commands::rewards::premium(),
        Commands::Watch => commands::task::watch(),
        Commands::Config { action } => commands::config::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
