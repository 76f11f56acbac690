mod commands;
mod config;
mod logger;
mod service;
mod store;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use log::LevelFilter;
use oupafamilly_core::ErrorKind;
use sqlx::mysql::MySqlPool;
use thiserror::Error;

use config::{Config, ConfigError};
use service::Service;
use store::Store;

#[derive(Debug, Parser)]
#[command(version, about)]
pub struct Args {
    /// Path to the config file.
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    Tournaments {
        #[command(subcommand)]
        command: commands::tournaments::Command,
    },
    Matches {
        #[command(subcommand)]
        command: commands::matches::Command,
    },
    /// Create the database tables.
    Migrate,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] oupafamilly_core::Error),
    #[error("{0}")]
    Store(#[from] sqlx::Error),
    #[error("{0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to load config: {0}")]
    Config(#[from] ConfigError),
}

impl Error {
    /// Returns the [`ErrorKind`] of tournament errors, `None` for infrastructure failures.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Core(err) => Some(err.kind()),
            _ => None,
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self.kind() {
            Some(ErrorKind::InvalidInput) => 2,
            Some(ErrorKind::NotFound) => 3,
            Some(ErrorKind::Validation) => 4,
            Some(ErrorKind::Conflict) => 5,
            Some(ErrorKind::SafetyLimitExceeded) | None => 1,
        }
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if let Err(err) = run(args).await {
        match err.kind() {
            Some(ErrorKind::SafetyLimitExceeded) | None => log::error!("{}", err),
            Some(_) => log::debug!("Command rejected: {:?}", err),
        }

        eprintln!("error: {}", err);
        process::exit(err.exit_code());
    }
}

async fn run(args: Args) -> Result<(), Error> {
    // Loading the config logs warnings for invalid environment values.
    logger::init(LevelFilter::Info);

    let config = Config::load(&args.config).await?;
    logger::set_level(config.loglevel);

    log::debug!(
        "Using database {} on {}:{}",
        config.database.database,
        config.database.host,
        config.database.port
    );

    let pool = MySqlPool::connect(&config.database.connect_string()).await?;
    let store = Store {
        pool,
        table_prefix: config.database.prefix.clone(),
    };

    match args.command {
        Command::Migrate => store.migrate().await,
        Command::Tournaments { command } => {
            command
                .run(&Service::new(store, config.bracket.shuffle))
                .await
        }
        Command::Matches { command } => {
            command
                .run(&Service::new(store, config.bracket.shuffle))
                .await
        }
    }
}
