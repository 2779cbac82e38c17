//! Command and message handlers for the dispatch bot

use teloxide::prelude::*;
use teloxide::types::Message;

use super::types::{ensure_user_exists, HandlerDeps, UserCreationResult, UserInfo};
use crate::core::config;
use crate::core::error::AppError;
use crate::dispatch::{dispatch_with_credits, DispatchOutcome};
use crate::flow;
use crate::storage::db::{get_sent_today, get_user};
use crate::storage::get_connection;
use crate::telegram::Bot;
use crate::vouchers;

/// Handles /start: idempotent registration plus the welcome message.
pub async fn handle_start_command(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> anyhow::Result<()> {
    let user = UserInfo::from_message(msg);

    let greeting = match ensure_user_exists(&deps.db_pool, &user) {
        UserCreationResult::Created => "Welcome! Your account has been created with 0 credits.",
        UserCreationResult::Existed => "Welcome back!",
        UserCreationResult::DbError => {
            bot.send_message(msg.chat.id, "Something went wrong, please try again later.")
                .await?;
            return Ok(());
        }
    };

    bot.send_message(
        msg.chat.id,
        format!(
            "{}\n\n\
             /send - start a new dispatch request\n\
             /redeem <key> - redeem a voucher for credits\n\
             /info - show your balance and usage\n\
             /cancel - cancel a request in progress",
            greeting
        ),
    )
    .await?;
    Ok(())
}

/// Handles /send: checks every precondition, then opens the dispatch flow.
///
/// Gate order: registration, balance, daily ceiling, cooldown. The flow row
/// is only written once all gates pass, so a rejected /send leaves no state.
pub async fn handle_send_command(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> anyhow::Result<()> {
    let chat_id = msg.chat.id;
    let telegram_id = chat_id.0;

    let rejection = {
        let conn = get_connection(&deps.db_pool)?;

        match get_user(&conn, telegram_id)? {
            None => Some("You are not registered yet. Use /start first.".to_string()),
            Some(user) if user.credits <= 0 => {
                Some("You have no credits. Redeem a voucher with /redeem <key>.".to_string())
            }
            Some(_) => {
                let sent_today = get_sent_today(&conn, telegram_id)?;
                if sent_today >= config::limits::DAILY_CEILING {
                    log::warn!("User {} hit the daily ceiling ({} sent)", telegram_id, sent_today);
                    Some(format!(
                        "{}. Try again tomorrow.",
                        AppError::DailyLimitExceeded(config::limits::DAILY_CEILING)
                    ))
                } else {
                    None
                }
            }
        }
    };
    if let Some(reply) = rejection {
        bot.send_message(chat_id, reply).await?;
        return Ok(());
    }

    if let Some(remaining) = deps.rate_limiter.get_remaining_time(chat_id).await {
        bot.send_message(
            chat_id,
            format!("Too fast. Please wait {} more seconds.", remaining.as_secs().max(1)),
        )
        .await?;
        return Ok(());
    }

    let prompt = {
        let conn = get_connection(&deps.db_pool)?;
        flow::begin(&conn, telegram_id)?
    };

    deps.rate_limiter.update_rate_limit(chat_id).await;
    bot.send_message(chat_id, prompt).await?;
    Ok(())
}

/// Handles /cancel: drops the flow row, if any.
pub async fn handle_cancel_command(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> anyhow::Result<()> {
    let chat_id = msg.chat.id;
    let had_flow = {
        let conn = get_connection(&deps.db_pool)?;
        let active = flow::load(&conn, chat_id.0)?.is_some();
        if active {
            flow::clear(&conn, chat_id.0)?;
        }
        active
    };

    let reply = if had_flow {
        "Request cancelled."
    } else {
        "Nothing to cancel."
    };
    bot.send_message(chat_id, reply).await?;
    Ok(())
}

/// Handles /info: balance and usage counters.
pub async fn handle_info_command(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> anyhow::Result<()> {
    let chat_id = msg.chat.id;

    let report = {
        let conn = get_connection(&deps.db_pool)?;
        match get_user(&conn, chat_id.0)? {
            Some(user) => {
                let sent_today = get_sent_today(&conn, chat_id.0)?;
                Some(format!(
                    "Credits: {}\nSent today: {} / {}\nSent in total: {}",
                    user.credits,
                    sent_today,
                    config::limits::DAILY_CEILING,
                    user.sent_total
                ))
            }
            None => None,
        }
    };

    match report {
        Some(text) => bot.send_message(chat_id, text).await?,
        None => {
            bot.send_message(chat_id, "You are not registered yet. Use /start first.")
                .await?
        }
    };
    Ok(())
}

/// Handles `/redeem <key>`: credits the balance for a valid unused voucher.
pub async fn handle_redeem_command(
    bot: &Bot,
    msg: &Message,
    message_text: &str,
    deps: &HandlerDeps,
) -> anyhow::Result<()> {
    let chat_id = msg.chat.id;

    let token = message_text.strip_prefix("/redeem").unwrap_or("").trim();
    if token.is_empty() {
        bot.send_message(chat_id, "Usage: /redeem <key>").await?;
        return Ok(());
    }

    // Redemption requires an account row to credit
    let user = UserInfo::from_message(msg);
    if matches!(ensure_user_exists(&deps.db_pool, &user), UserCreationResult::DbError) {
        bot.send_message(chat_id, "Something went wrong, please try again later.")
            .await?;
        return Ok(());
    }

    let redeemed = {
        let mut conn = get_connection(&deps.db_pool)?;
        vouchers::redeem(&mut conn, chat_id.0, token)
    };

    match redeemed {
        Ok(value) => {
            let balance = {
                let conn = get_connection(&deps.db_pool)?;
                get_user(&conn, chat_id.0)?.map(|u| u.credits).unwrap_or(value)
            };
            bot.send_message(
                chat_id,
                format!("Voucher accepted: +{} credits. Balance: {}.", value, balance),
            )
            .await?;
        }
        Err(AppError::InvalidOrUsedKey) => {
            bot.send_message(chat_id, "This key is invalid or has already been used.")
                .await?;
        }
        Err(e) => {
            log::error!("Redeem failed for user {}: {}", chat_id.0, e);
            bot.send_message(chat_id, "Something went wrong, please try again later.")
                .await?;
        }
    }
    Ok(())
}

/// Handles `/generate <value> <count>` (administrator only, hidden).
pub async fn handle_generate_command(
    bot: &Bot,
    msg: &Message,
    message_text: &str,
    deps: &HandlerDeps,
) -> anyhow::Result<()> {
    let chat_id = msg.chat.id;
    let caller_id = msg.from.as_ref().and_then(|u| i64::try_from(u.id.0).ok()).unwrap_or(0);
    let admin_id = *config::admin::ADMIN_USER_ID;

    let args: Vec<&str> = message_text
        .strip_prefix("/generate")
        .unwrap_or("")
        .split_whitespace()
        .collect();
    let parsed = match args.as_slice() {
        [value, count] => value.parse::<i64>().ok().zip(count.parse::<i64>().ok()),
        _ => None,
    };
    let Some((credit_value, count)) = parsed else {
        bot.send_message(chat_id, "Usage: /generate <credit value> <count>").await?;
        return Ok(());
    };

    let batch = {
        let conn = get_connection(&deps.db_pool)?;
        vouchers::generate(&conn, caller_id, admin_id, credit_value, count)
    };

    match batch {
        Ok(batch) => {
            let mut lines = vec![format!("Generated vouchers worth {} credits each:", credit_value)];
            for result in &batch.results {
                match result {
                    Ok(key) => lines.push(key.clone()),
                    Err(e) => lines.push(format!("(failed: {})", e)),
                }
            }
            if batch.failures() > 0 {
                lines.push(format!("{} key(s) failed to persist.", batch.failures()));
            }
            bot.send_message(chat_id, lines.join("\n")).await?;
        }
        Err(AppError::PermissionDenied) => {
            log::warn!("User {} attempted /generate without permission", caller_id);
            bot.send_message(chat_id, "You are not allowed to do that.").await?;
        }
        Err(AppError::Validation(reason)) => {
            bot.send_message(chat_id, reason).await?;
        }
        Err(e) => {
            log::error!("/generate failed for admin {}: {}", caller_id, e);
            bot.send_message(chat_id, "Something went wrong, please try again later.")
                .await?;
        }
    }
    Ok(())
}

/// Feeds free-form text into the user's active dispatch flow.
///
/// Returns `true` if the text was consumed by a flow. A user without an
/// active flow row gets `false` and no reply; the router stays silent for
/// unsolicited text.
pub async fn handle_flow_message(bot: &Bot, msg: &Message, text: &str, deps: &HandlerDeps) -> anyhow::Result<bool> {
    let chat_id = msg.chat.id;
    let telegram_id = chat_id.0;

    // Persist the transition first, release the connection, then talk to
    // Telegram
    enum Next {
        Reply(String),
        Dispatch { target: String, quantity: i64 },
    }

    let next = {
        let conn = get_connection(&deps.db_pool)?;
        let Some(state) = flow::load(&conn, telegram_id)? else {
            return Ok(false);
        };

        match flow::advance(state, text) {
            flow::Transition::Stay { next, reply } => {
                flow::store(&conn, telegram_id, &next)?;
                Next::Reply(reply)
            }
            flow::Transition::Abort { reply } => {
                flow::clear(&conn, telegram_id)?;
                Next::Reply(reply)
            }
            flow::Transition::Dispatch { target, quantity } => {
                // Both inputs collected: the flow is over whatever the
                // dispatch outcome turns out to be
                flow::clear(&conn, telegram_id)?;
                Next::Dispatch { target, quantity }
            }
        }
    };

    let (target, quantity) = match next {
        Next::Reply(reply) => {
            bot.send_message(chat_id, reply).await?;
            return Ok(true);
        }
        Next::Dispatch { target, quantity } => (target, quantity),
    };

    bot.send_message(chat_id, format!("Dispatching {} units...", quantity))
        .await?;

    match dispatch_with_credits(&deps.db_pool, deps.dispatcher.as_ref(), telegram_id, &target, quantity).await {
        Ok(DispatchOutcome::Completed { quantity }) => {
            bot.send_message(chat_id, format!("Done. {} units dispatched.", quantity))
                .await?;
        }
        Ok(DispatchOutcome::Refunded { quantity, reason }) => {
            log::warn!("Dispatch for user {} refunded: {}", telegram_id, reason);
            bot.send_message(
                chat_id,
                format!("The dispatch failed and your {} credits were refunded.", quantity),
            )
            .await?;
        }
        Err(AppError::InsufficientCredits) => {
            bot.send_message(
                chat_id,
                "You don't have enough credits for that quantity. Check /info.",
            )
            .await?;
        }
        Err(e) => {
            log::error!("Dispatch failed for user {}: {}", telegram_id, e);
            bot.send_message(chat_id, "Something went wrong, please try again later.")
                .await?;
        }
    }
    Ok(true)
}
