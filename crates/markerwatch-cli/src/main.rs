use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;

#[derive(Parser)]
#[command(name = "markerwatch-cli", version, about = "Markerwatch CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Saved marker management
    Marker {
        #[command(subcommand)]
        action: commands::marker::MarkerAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Great-circle distance between two points, in meters
    Distance(commands::distance::DistanceArgs),
    /// Replay a recorded track through the proximity engine
    Watch(commands::watch::WatchArgs),
}

fn init_logging() {
    // Logs go to stderr; stdout carries command output and notification events.
    let filter = std::env::var("MARKERWATCH_LOG")
        .ok()
        .and_then(|spec| EnvFilter::try_new(spec).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

fn main() {
    init_logging();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Marker { action } => commands::marker::run(action),
        Commands::Config { action } => commands::config::run(action),
        Commands::Distance(args) => commands::distance::run(args),
        Commands::Watch(args) => commands::watch::run(args),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
