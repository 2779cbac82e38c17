use anyhow::Result;
use dotenvy::dotenv;
use std::sync::Arc;
use teloxide::prelude::*;
use tokio::time::sleep;

use dispatchbot::cli::{Cli, Commands};
use dispatchbot::core::rate_limiter::RateLimiter;
use dispatchbot::core::{config, init_logger, log_dispatch_configuration};
use dispatchbot::dispatch::HttpDispatcher;
use dispatchbot::storage::create_pool;
use dispatchbot::telegram::{create_bot, schema, setup_bot_commands, HandlerDeps};
use dispatchbot::vouchers;

/// Main entry point for the dispatch bot
///
/// Parses CLI arguments and dispatches to the appropriate subcommand.
///
/// # Errors
/// Returns an error if initialization fails (logging, database, bot creation).
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    init_logger(&config::LOG_FILE_PATH)?;

    // Load environment variables from .env if present
    let _ = dotenv();

    match cli.command {
        Some(Commands::Run) | None => run_bot().await,
        Some(Commands::GenerateVouchers { value, count }) => run_generate_vouchers(value, count),
    }
}

/// Mints voucher keys from the command line, against the configured database.
fn run_generate_vouchers(value: i64, count: i64) -> Result<()> {
    let admin_id = *config::admin::ADMIN_USER_ID;
    if admin_id == 0 {
        return Err(anyhow::anyhow!("ADMIN_USER_ID must be set to mint vouchers"));
    }

    let pool = create_pool(&config::DATABASE_PATH)?;
    let conn = pool.get()?;
    let batch = vouchers::generate(&conn, admin_id, admin_id, value, count)?;

    for result in &batch.results {
        match result {
            Ok(key) => println!("{}", key),
            Err(e) => eprintln!("failed: {}", e),
        }
    }
    if batch.failures() > 0 {
        return Err(anyhow::anyhow!("{} voucher(s) failed to persist", batch.failures()));
    }
    Ok(())
}

/// Runs the bot in long-polling mode until shutdown.
async fn run_bot() -> Result<()> {
    log_dispatch_configuration();

    let bot = create_bot()?;

    // Telegram may be briefly unreachable right after a host restart
    let me = {
        let max_retries = 12;
        let mut retry = 0;
        loop {
            match bot.get_me().await {
                Ok(info) => break info,
                Err(e) => {
                    retry += 1;
                    if retry >= max_retries {
                        return Err(anyhow::anyhow!("Failed to reach Telegram after {} attempts: {}", retry, e));
                    }
                    log::warn!("get_me failed (attempt {}/{}): {}", retry, max_retries, e);
                    sleep(std::time::Duration::from_secs(5)).await;
                }
            }
        }
    };
    log::info!(
        "Starting bot @{}",
        me.username.as_deref().unwrap_or("<unnamed>")
    );

    if let Err(e) = setup_bot_commands(&bot).await {
        log::warn!("Failed to set bot commands: {}", e);
    }

    let db_pool = Arc::new(create_pool(&config::DATABASE_PATH)?);
    let dispatcher = Arc::new(HttpDispatcher::from_config()?);
    let rate_limiter = Arc::new(RateLimiter::new());

    let deps = HandlerDeps::new(db_pool, dispatcher, rate_limiter);

    Dispatcher::builder(bot, schema(deps))
        .dependencies(DependencyMap::new())
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    log::info!("Dispatcher shutdown gracefully");
    Ok(())
}
