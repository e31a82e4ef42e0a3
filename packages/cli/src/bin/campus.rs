use clap::{Parser, Subcommand};
use colored::*;
use std::process;

mod cli;

use cli::input::InputCommands;
use cli::session::SessionCommands;

#[derive(Parser)]
#[command(name = "campus")]
#[command(about = "Campus client security layer tools")]
#[command(version)]
struct Cli {
    /// Log level used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(flatten)]
    Input(InputCommands),
    #[command(flatten)]
    Session(SessionCommands),
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    campus_cli::init_tracing(&cli.log_level);

    let result = match cli.command {
        Commands::Input(cmd) => cmd.execute(),
        Commands::Session(cmd) => cmd.execute().await,
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        process::exit(1);
    }
}
