//! Per-user conversation engine for the dispatch flow
//!
//! The flow is strictly linear: collect a target address, collect a quantity,
//! hand off to the dispatch coordinator. State is an explicit tagged enum with
//! pure transition functions; persistence maps the enum onto the single
//! `flow_state` row the ledger keeps per user. Text from a user with no
//! active row is ignored by the router, which is what lets arbitrary chat
//! traffic coexist with the flow.

use crate::core::config;
use crate::core::error::AppResult;
use crate::core::validation::{parse_quantity, validate_target};
use crate::storage::db::{self, DbConnection};

/// Step tags as stored in the `flow_state.step` column.
const STEP_INPUT_TARGET: &str = "input_target";
const STEP_INPUT_AMOUNT: &str = "input_amount";

/// Progress of a user through the dispatch conversation.
///
/// A user with no `flow_state` row is idle; illegal combinations (an amount
/// step without a target, say) cannot be represented.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowState {
    /// Waiting for a target address; `retries` counts invalid entries so far
    AwaitingTarget { retries: i64 },
    /// Target accepted, waiting for a quantity
    AwaitingAmount { target: String },
}

/// Outcome of feeding one user message into the flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Flow continues (same or next step); persist `next` and send `reply`
    Stay { next: FlowState, reply: String },
    /// Flow is cancelled; delete the row and send `reply`
    Abort { reply: String },
    /// Both inputs collected; delete the row and run the dispatch coordinator
    Dispatch { target: String, quantity: i64 },
}

/// Advances the flow by one user message. Pure function, no storage access.
pub fn advance(state: FlowState, input: &str) -> Transition {
    match state {
        FlowState::AwaitingTarget { retries } => match validate_target(input) {
            Ok(()) => Transition::Stay {
                next: FlowState::AwaitingAmount {
                    target: input.trim().to_string(),
                },
                reply: format!(
                    "Target accepted. How many units should be dispatched? ({}-{})",
                    config::limits::MIN_QUANTITY,
                    config::limits::MAX_QUANTITY
                ),
            },
            Err(_) => {
                // Two consecutive invalid entries cancel the flow outright
                if retries + 1 >= config::limits::MAX_TARGET_ATTEMPTS {
                    Transition::Abort {
                        reply: "That doesn't look like a valid target address either. \
                                Request cancelled - use /send to start over."
                            .to_string(),
                    }
                } else {
                    Transition::Stay {
                        next: FlowState::AwaitingTarget { retries: retries + 1 },
                        reply: "That doesn't look like a valid target address. Please try again."
                            .to_string(),
                    }
                }
            }
        },
        FlowState::AwaitingAmount { target } => match parse_quantity(input) {
            Ok(quantity) => Transition::Dispatch { target, quantity },
            // No retry penalty at this step: re-prompt until a valid
            // quantity arrives or the user runs /cancel
            Err(e) => Transition::Stay {
                next: FlowState::AwaitingAmount { target },
                reply: format!(
                    "{}. Please enter a number between {} and {}.",
                    e,
                    config::limits::MIN_QUANTITY,
                    config::limits::MAX_QUANTITY
                ),
            },
        },
    }
}

/// Starts a flow for the user: writes the initial state row and returns the
/// first prompt. Preconditions (balance, daily ceiling) are the caller's job.
pub fn begin(conn: &DbConnection, telegram_id: i64) -> AppResult<String> {
    store(conn, telegram_id, &FlowState::AwaitingTarget { retries: 0 })?;
    Ok("Please enter the target address:".to_string())
}

/// Loads the active flow state for a user, if any.
///
/// A row with an unknown step tag is treated as no active flow and removed;
/// this only happens if the schema was mutated under a running bot.
pub fn load(conn: &DbConnection, telegram_id: i64) -> AppResult<Option<FlowState>> {
    let row = db::load_flow_row(conn, telegram_id)?;
    match row {
        None => Ok(None),
        Some((step, retries, target)) => match (step.as_str(), target) {
            (STEP_INPUT_TARGET, _) => Ok(Some(FlowState::AwaitingTarget { retries })),
            (STEP_INPUT_AMOUNT, Some(target)) => Ok(Some(FlowState::AwaitingAmount { target })),
            (step, _) => {
                log::warn!("Dropping malformed flow row for user {} (step={})", telegram_id, step);
                db::clear_flow_row(conn, telegram_id)?;
                Ok(None)
            }
        },
    }
}

/// Persists a flow state, overwriting the user's single row.
pub fn store(conn: &DbConnection, telegram_id: i64, state: &FlowState) -> AppResult<()> {
    match state {
        FlowState::AwaitingTarget { retries } => {
            db::save_flow_row(conn, telegram_id, STEP_INPUT_TARGET, *retries, None)?;
        }
        FlowState::AwaitingAmount { target } => {
            db::save_flow_row(conn, telegram_id, STEP_INPUT_AMOUNT, 0, Some(target))?;
        }
    }
    Ok(())
}

/// Removes the user's flow row (completion, cancellation, or abort).
pub fn clear(conn: &DbConnection, telegram_id: i64) -> AppResult<()> {
    db::clear_flow_row(conn, telegram_id)?;
    Ok(())
}
