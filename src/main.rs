mod audit;
mod cli;
mod db;
mod error;
mod export;
mod grid;
mod importer;
mod kind;
mod lifecycle;
mod models;
mod parser;
mod resolver;
mod sanitizer;
mod service_code;
mod settings;
mod upsert;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init { data_dir } => cli::init::run(data_dir),
        Commands::Import { kind, input, user } => {
            cli::import::run(&kind, input.as_deref(), user.as_deref())
        }
        Commands::Inspect { file, kind } => cli::inspect::run(&file, &kind),
        Commands::Status => cli::status::run(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
