use clap::Parser;
use helmsman::cli::Cli;
use helmsman::commands::execute_command;
use std::process;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() {
    // Parse command line arguments
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cli.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    if let Err(e) = tracing_subscriber::registry().with(filter).with(fmt::layer()).try_init() {
        eprintln!("Error: failed to initialize logging: {}", e);
    }

    if let Err(e) = execute_command(cli.command).await {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}
