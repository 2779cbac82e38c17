//! Dispatcher schema and handler chain builders

use teloxide::dispatching::{UpdateFilterExt, UpdateHandler};
use teloxide::prelude::*;
use teloxide::types::Message;
use teloxide::utils::command::BotCommands;

use super::commands::{
    handle_cancel_command, handle_flow_message, handle_generate_command, handle_info_command, handle_redeem_command,
    handle_send_command, handle_start_command,
};
use super::types::{HandlerDeps, HandlerError};
use crate::telegram::bot::Command;
use crate::telegram::Bot;

/// Creates the main dispatcher schema for the Telegram bot.
///
/// The returned handler tree is used by the production dispatcher and by
/// integration tests alike. Branch order matters: the hidden prefix commands
/// must come before the command branch, and the free-text branch is last so
/// it only sees messages nothing else claimed.
pub fn schema(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    let deps_generate = deps.clone();
    let deps_redeem = deps.clone();
    let deps_commands = deps.clone();
    let deps_messages = deps.clone();

    dptree::entry()
        // Hidden admin command (not in the Command enum)
        .branch(generate_handler(deps_generate))
        // /redeem takes an argument, routed by prefix
        .branch(redeem_handler(deps_redeem))
        // Command handler
        .branch(command_handler(deps_commands))
        // Free text feeds the active dispatch flow
        .branch(message_handler(deps_messages))
}

/// Matches `command` alone or followed by arguments, without claiming longer
/// commands that merely share the prefix (`/redeemable` is not `/redeem`).
fn has_command_prefix(text: &str, command: &str) -> bool {
    text.strip_prefix(command)
        .map(|rest| rest.is_empty() || rest.starts_with(' '))
        .unwrap_or(false)
}

/// Handler for the /generate admin command (hidden, not in Command enum)
fn generate_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message()
        .filter(|msg: Message| {
            msg.text()
                .map(|text| has_command_prefix(text, "/generate"))
                .unwrap_or(false)
        })
        .endpoint(move |bot: Bot, msg: Message| {
            let deps = deps.clone();
            async move {
                let message_text = msg.text().unwrap_or_default().to_string();
                if let Err(e) = handle_generate_command(&bot, &msg, &message_text, &deps).await {
                    log::error!("/generate handler failed for chat {}: {}", msg.chat.id, e);
                }
                Ok(())
            }
        })
}

/// Handler for the /redeem command
fn redeem_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message()
        .filter(|msg: Message| {
            msg.text()
                .map(|text| has_command_prefix(text, "/redeem"))
                .unwrap_or(false)
        })
        .endpoint(move |bot: Bot, msg: Message| {
            let deps = deps.clone();
            async move {
                let message_text = msg.text().unwrap_or_default().to_string();
                if let Err(e) = handle_redeem_command(&bot, &msg, &message_text, &deps).await {
                    log::error!("/redeem handler failed for chat {}: {}", msg.chat.id, e);
                    let _ = bot
                        .send_message(msg.chat.id, "Something went wrong, please try again later.")
                        .await;
                }
                Ok(())
            }
        })
}

/// Handler for bot commands (/start, /send, /cancel, /info, /help)
fn command_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message().branch(dptree::entry().filter_command::<Command>().endpoint(
        move |bot: Bot, msg: Message, cmd: Command| {
            let deps = deps.clone();
            async move {
                log::info!("Received command: {:?} from chat {}", cmd, msg.chat.id);

                let result = match cmd {
                    Command::Start => handle_start_command(&bot, &msg, &deps).await,
                    Command::Send => handle_send_command(&bot, &msg, &deps).await,
                    Command::Cancel => handle_cancel_command(&bot, &msg, &deps).await,
                    Command::Info => handle_info_command(&bot, &msg, &deps).await,
                    Command::Help => bot
                        .send_message(msg.chat.id, Command::descriptions().to_string())
                        .await
                        .map(|_| ())
                        .map_err(anyhow::Error::from),
                };
                if let Err(e) = result {
                    log::error!("Command {:?} failed for chat {}: {}", cmd, msg.chat.id, e);
                    let _ = bot
                        .send_message(msg.chat.id, "Something went wrong, please try again later.")
                        .await;
                }
                Ok(())
            }
        },
    ))
}

/// Handler for free-form text messages
///
/// Text is only acted on when the sender has an active flow row; anything
/// else is ignored without a reply.
fn message_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message()
        .filter(|msg: Message| msg.text().map(|text| !text.starts_with('/')).unwrap_or(false))
        .endpoint(move |bot: Bot, msg: Message| {
            let deps = deps.clone();
            async move {
                let text = msg.text().unwrap_or_default().to_string();
                match handle_flow_message(&bot, &msg, &text, &deps).await {
                    Ok(consumed) => {
                        if !consumed {
                            log::debug!("Ignoring text from chat {} with no active flow", msg.chat.id);
                        }
                    }
                    Err(e) => {
                        log::error!("Flow handler failed for chat {}: {}", msg.chat.id, e);
                        let _ = bot
                            .send_message(msg.chat.id, "Something went wrong, please try again later.")
                            .await;
                    }
                }
                Ok(())
            }
        })
}
