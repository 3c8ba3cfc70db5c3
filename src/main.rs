use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

mod commands;
mod config;
mod controllers;
mod error;
mod language;
mod models;
mod storage;
mod types;
mod words;

pub(crate) use error::ApiResult;

use config::Config;
use language::{HeuristicDetector, LanguageDetector};
use storage::AnyStorage;
use words::WordLists;

#[derive(Parser)]
#[command(version, about = "A small paste server")]
struct Cli {
    /// Config file to read. Missing files are fine; defaults and the
    /// environment fill in.
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve pastes over HTTP.
    Serve,
    /// Delete expired pastes and exit.
    PurgeExpired,
}

/// Everything request handling needs.
#[derive(Clone)]
pub struct App {
    pub config: Config,
    pub word_lists: WordLists,
    pub storage: AnyStorage,
    pub detector: Arc<dyn LanguageDetector>,
}

impl App {
    async fn new(config: Config) -> anyhow::Result<Self> {
        let word_lists = WordLists::load(&config.word_lists).await?;

        let storage = storage::select::storage(&config.storage)
            .await
            .context("failed to initialize storage")?
            .clone();
        info!("storage ready: {:?}", storage.kind());

        Ok(App {
            config,
            word_lists,
            storage,
            detector: Arc::new(HeuristicDetector),
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;
    let app = App::new(config).await?;

    match cli.command {
        Command::Serve => commands::serve::run(app).await,
        Command::PurgeExpired => commands::purge_expired::run(app).await,
    }
}
