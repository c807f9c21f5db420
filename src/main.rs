use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use feedrake::cli::{Cli, Command};
use feedrake::commands;
use feedrake::session::Session;
use feedrake::storage::Database;

/// Config directory (~/.config/feedrake/), created on first run.
fn config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("feedrake"))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let config_dir = config_dir()?;
    std::fs::create_dir_all(&config_dir).context("failed to create config directory")?;

    let mut session = Session::load(&config_dir.join("config.json"))?;

    let db_path = session.db_path();
    let db_path_str = db_path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("invalid UTF-8 in database path"))?;
    let db = Database::open(db_path_str)
        .await
        .context("failed to open database")?;

    match cli.command {
        Command::Register { name } => commands::register(&db, &mut session, &name).await,
        Command::Login { name } => commands::login(&db, &mut session, &name).await,
        Command::Reset => commands::reset(&db, &mut session).await,
        Command::Users => commands::users(&db, &session).await,
        Command::Agg { interval } => commands::agg(&db, interval.as_deref()).await,
        Command::AddFeed { name, url } => commands::add_feed(&db, &session, &name, &url).await,
        Command::Feeds => commands::feeds(&db).await,
        Command::Follow { url } => commands::follow(&db, &session, &url).await,
        Command::Following => commands::following(&db, &session).await,
        Command::Unfollow { url } => commands::unfollow(&db, &session, &url).await,
        Command::Browse { limit } => commands::browse(&db, &session, limit).await,
    }
}
