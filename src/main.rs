use clap::Parser;
use tracing_subscriber::EnvFilter;

use reconhive::cli::{self, Cli, Commands};
use reconhive::errors::HiveError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(!cli.no_color)
        .init();

    let result = match cli.command {
        Commands::Work(args) => cli::work::handle_work(args).await,
        Commands::Schedule(args) => cli::schedule::handle_schedule(args).await,
        Commands::Submit(args) => cli::submit::handle_submit(args).await,
        Commands::Scan(args) => cli::scan::handle_scan(args).await,
        Commands::Tasks(args) => cli::tasks::handle_tasks(args).await,
        Commands::Reclaim(args) => cli::reclaim::handle_reclaim(args).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        let exit_code = match &e {
            HiveError::Config(_) => 2,
            HiveError::Database(_) => 3,
            _ => 1,
        };
        std::process::exit(exit_code);
    }
}
