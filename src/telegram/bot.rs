//! Bot instance creation and command definitions

use reqwest::ClientBuilder;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;

use crate::core::config;

// Bot commands enum with descriptions.
//
// `/redeem` and `/generate` take arguments and are routed by prefix in the
// schema instead of through this enum; `/redeem` is still advertised in the
// Telegram command menu, `/generate` is not. (Regular comment, not a doc
// comment: the BotCommands derive folds doc comments into the user-facing
// `descriptions()` help text.)
#[derive(BotCommands, Clone, Debug)]
#[command(rename_rule = "lowercase", description = "I can:")]
pub enum Command {
    #[command(description = "register and show the welcome message")]
    Start,
    #[command(description = "start a new dispatch request")]
    Send,
    #[command(description = "cancel the dispatch request in progress")]
    Cancel,
    #[command(description = "show your balance and usage")]
    Info,
    #[command(description = "show this help")]
    Help,
}

/// Creates a Bot instance with the configured token and request timeout.
pub fn create_bot() -> anyhow::Result<Bot> {
    let client = ClientBuilder::new().timeout(config::network::timeout()).build()?;
    Ok(Bot::with_client(config::BOT_TOKEN.clone(), client))
}

/// Sets up bot commands in the Telegram UI.
///
/// `/generate` is deliberately left out of the menu.
pub async fn setup_bot_commands(bot: &Bot) -> Result<(), teloxide::RequestError> {
    use teloxide::types::BotCommand;

    bot.set_my_commands(vec![
        BotCommand::new("start", "register and show the welcome message"),
        BotCommand::new("send", "start a new dispatch request"),
        BotCommand::new("cancel", "cancel the dispatch request in progress"),
        BotCommand::new("info", "show your balance and usage"),
        BotCommand::new("redeem", "redeem a voucher key: /redeem <key>"),
        BotCommand::new("help", "show this help"),
    ])
    .await?;

    Ok(())
}
