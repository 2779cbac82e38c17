//! Metered dispatch coordinator: reserve, call, reconcile
//!
//! Credits are debited *before* the external call (the reservation) and the
//! outcome of the call decides whether the debit stands (commit) or is
//! returned (refund). Both legs of the reconcile are single atomic statements
//! against the ledger, and the refund leg is reachable from every failure
//! branch of the call - there is no path on which a reservation is taken and
//! neither committed nor refunded while the store is reachable.

use crate::core::error::{AppError, AppResult};
use crate::storage::db::{self, DbPool};

use super::client::BulkDispatcher;

/// How a dispatch attempt was reconciled.
#[derive(Debug)]
pub enum DispatchOutcome {
    /// External call succeeded; the reservation was committed and the sent
    /// counters were advanced by `quantity`.
    Completed { quantity: i64 },
    /// External call failed; the reservation was refunded in full.
    Refunded { quantity: i64, reason: String },
}

/// Runs one metered dispatch for a user.
///
/// 1. Reserve `quantity` credits with a conditional decrement; insufficient
///    balance fails here with no mutation and no external call.
/// 2. Make exactly one external call. No pooled connection is held across it,
///    so a slow remote cannot starve other users of the pool.
/// 3. Reconcile: commit counters on success, refund the reservation on any
///    failure (structured error payload, transport error, or timeout alike).
pub async fn dispatch_with_credits(
    pool: &DbPool,
    api: &dyn BulkDispatcher,
    telegram_id: i64,
    target: &str,
    quantity: i64,
) -> AppResult<DispatchOutcome> {
    {
        let conn = db::get_connection(pool)?;
        if !db::reserve_credits(&conn, telegram_id, quantity)? {
            return Err(AppError::InsufficientCredits);
        }
    }

    log::info!(
        "Reserved {} credits for user {}, calling dispatch API",
        quantity,
        telegram_id
    );
    let call_result = api.dispatch(target, quantity).await;

    let conn = match db::get_connection(pool) {
        Ok(conn) => conn,
        Err(e) => {
            // Reservation cannot be reconciled while the store is down.
            // Surfaced as a pool error; the operator has to intervene.
            log::error!(
                "Store unavailable while reconciling {} credits for user {}: {}",
                quantity,
                telegram_id,
                e
            );
            return Err(e.into());
        }
    };

    match call_result {
        Ok(()) => {
            db::commit_sent(&conn, telegram_id, quantity)?;
            log::info!("Dispatch committed for user {} ({} units)", telegram_id, quantity);
            Ok(DispatchOutcome::Completed { quantity })
        }
        Err(e) => {
            if let Err(refund_err) = db::refund_credits(&conn, telegram_id, quantity) {
                log::error!(
                    "Refund of {} credits failed for user {}: {}",
                    quantity,
                    telegram_id,
                    refund_err
                );
                return Err(refund_err.into());
            }
            log::warn!(
                "Dispatch failed for user {}, refunded {} credits: {}",
                telegram_id,
                quantity,
                e
            );
            Ok(DispatchOutcome::Refunded {
                quantity,
                reason: e.to_string(),
            })
        }
    }
}
