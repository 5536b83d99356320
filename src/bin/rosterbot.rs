use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use rosterbot::{RosterBot, RosterConfig};

/// Telegram bot for signing up to game sessions
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Bot API token
    #[clap(long, env = "BOT_TOKEN", hide_env_values = true)]
    bot_token: String,

    /// Directory for application data
    #[clap(long, value_name = "PATH", env = "ROSTERBOT_DATA_DIR", default_value = "./data")]
    data_dir: PathBuf,

    /// Directory for application logs
    #[clap(long, value_name = "PATH", env = "ROSTERBOT_LOGS_DIR", default_value = "./logs")]
    logs_dir: PathBuf,

    /// SQLite database file, defaults to a file inside the data directory
    #[clap(long, value_name = "PATH", env = "ROSTERBOT_DB")]
    db: Option<PathBuf>,

    /// Bot API base URL
    #[clap(long, default_value = rosterbot::transport::telegram::DEFAULT_API_BASE_URL)]
    api_base_url: String,

    /// Name of the command that creates an event
    #[clap(long, default_value = rosterbot::bot::config::DEFAULT_CREATE_COMMAND)]
    create_command: String,

    /// Long poll timeout in seconds
    #[clap(long, default_value_t = rosterbot::bot::config::DEFAULT_POLL_TIMEOUT_SECS)]
    poll_timeout: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();
    let args = Args::parse();

    let mut config = RosterConfig::new(&args.data_dir, &args.logs_dir, &args.bot_token)
        .with_api_base_url(&args.api_base_url)
        .with_create_command(&args.create_command)
        .with_poll_timeout_secs(args.poll_timeout);
    if let Some(db) = args.db {
        config = config.with_database_path(db);
    }

    let bot = match RosterBot::initialize(config).await {
        Ok(bot) => bot,
        Err(err) => {
            eprintln!("Failed to initialize rosterbot: {}", err);
            std::process::exit(1);
        }
    };

    bot.run(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(target: "rosterbot::main", "Failed to listen for Ctrl-C: {}", e);
        }
    })
    .await?;

    Ok(())
}
