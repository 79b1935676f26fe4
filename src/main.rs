use anyhow::Result;
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;

use snexus::core::{config, init_logger};
use snexus::storage::db::{self, DbPool};
use snexus::telegram::{answer_command, handle_callback, handle_message, Command};

/// Telegram bot for downloading music, videos and Instagram media
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the bot (long polling)
    Run,
    /// Create the database schema and exit
    InitDb,
}

/// Main entry point for the Telegram bot
///
/// # Errors
/// Returns an error if initialization fails (logging, database, bot creation).
#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env if present, before any config
    // statics are read
    let _ = dotenv();

    let cli = Cli::parse();

    init_logger(&config::LOG_FILE_PATH)?;

    match cli.command {
        Some(Commands::InitDb) => run_init_db(),
        Some(Commands::Run) | None => run_bot().await,
    }
}

/// Create the database schema and exit
fn run_init_db() -> Result<()> {
    let pool = db::create_pool(&config::DATABASE_PATH)
        .map_err(|e| anyhow::anyhow!("Failed to create database pool: {}", e))?;
    let conn = db::get_connection(&pool).map_err(|e| anyhow::anyhow!("Failed to get connection: {}", e))?;
    db::create_tables(&conn)?;
    log::info!("Database schema ready at {}", config::DATABASE_PATH.as_str());
    Ok(())
}

/// Run the bot in long-polling mode
async fn run_bot() -> Result<()> {
    let bot_token = config::BOT_TOKEN.to_string();
    if bot_token.is_empty() {
        return Err(anyhow::anyhow!("BOT_TOKEN environment variable not set"));
    }

    let db_pool: Arc<DbPool> = Arc::new(
        db::create_pool(&config::DATABASE_PATH)
            .map_err(|e| anyhow::anyhow!("Failed to create database pool: {}", e))?,
    );

    let bot = Bot::new(bot_token);

    if let Err(e) = bot.set_my_commands(Command::bot_commands()).await {
        log::warn!("Failed to register bot commands: {}", e);
    }

    log::info!(
        "Starting Snexus bot (daily limit: {} MB, admins: {})",
        *config::quota::DAILY_DOWNLOAD_LIMIT_MB,
        config::admin::ADMIN_USER_IDS.len()
    );

    let handler = dptree::entry()
        .branch(
            Update::filter_message()
                .filter_command::<Command>()
                .endpoint(answer_command),
        )
        .branch(Update::filter_message().endpoint(handle_message))
        .branch(Update::filter_callback_query().endpoint(handle_callback));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![db_pool])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}
