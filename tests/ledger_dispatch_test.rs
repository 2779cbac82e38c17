//! Integration tests for the conversation flow and the metered dispatch path
//!
//! Run with: cargo test --test ledger_dispatch_test

mod common;

use common::{pool_with_user, ScriptedDispatcher};
use dispatchbot::core::config;
use dispatchbot::core::error::AppError;
use dispatchbot::dispatch::{dispatch_with_credits, DispatchOutcome};
use dispatchbot::flow::{self, FlowState, Transition};
use dispatchbot::storage::db::{commit_sent, get_sent_today, get_user};
use dispatchbot::storage::get_connection;
use pretty_assertions::assert_eq;

const USER: i64 = 42;

/// Walks the full happy path: /send opens the flow, two messages collect the
/// inputs, the coordinator reconciles the ledger.
#[tokio::test]
async fn test_full_flow_to_dispatch() {
    let pool = pool_with_user(USER, 500);
    let api = ScriptedDispatcher::succeeding();

    let (target, quantity) = {
        let conn = get_connection(&pool).unwrap();
        flow::begin(&conn, USER).unwrap();

        let state = flow::load(&conn, USER).unwrap().unwrap();
        let next = match flow::advance(state, "someone@example.com") {
            Transition::Stay { next, .. } => next,
            other => panic!("expected Stay, got {:?}", other),
        };
        flow::store(&conn, USER, &next).unwrap();

        let state = flow::load(&conn, USER).unwrap().unwrap();
        match flow::advance(state, "250") {
            Transition::Dispatch { target, quantity } => {
                flow::clear(&conn, USER).unwrap();
                (target, quantity)
            }
            other => panic!("expected Dispatch, got {:?}", other),
        }
    };
    assert_eq!(target, "someone@example.com");
    assert_eq!(quantity, 250);

    let outcome = dispatch_with_credits(&pool, &api, USER, &target, quantity)
        .await
        .unwrap();
    assert!(matches!(outcome, DispatchOutcome::Completed { quantity: 250 }));

    let conn = get_connection(&pool).unwrap();
    let user = get_user(&conn, USER).unwrap().unwrap();
    assert_eq!(user.credits, 250);
    assert_eq!(user.sent_total, 250);
    assert_eq!(get_sent_today(&conn, USER).unwrap(), 250);
    assert!(flow::load(&conn, USER).unwrap().is_none());
    assert_eq!(api.call_count(), 1);
}

/// Two invalid target entries cancel the request and drop the flow row.
#[tokio::test]
async fn test_two_invalid_targets_cancel_the_request() {
    let pool = pool_with_user(USER, 500);
    let conn = get_connection(&pool).unwrap();
    flow::begin(&conn, USER).unwrap();

    let state = flow::load(&conn, USER).unwrap().unwrap();
    let next = match flow::advance(state, "not an address") {
        Transition::Stay { next, .. } => next,
        other => panic!("expected Stay, got {:?}", other),
    };
    assert_eq!(next, FlowState::AwaitingTarget { retries: 1 });
    flow::store(&conn, USER, &next).unwrap();

    let state = flow::load(&conn, USER).unwrap().unwrap();
    match flow::advance(state, "still not one") {
        Transition::Abort { .. } => flow::clear(&conn, USER).unwrap(),
        other => panic!("expected Abort, got {:?}", other),
    }

    // Credits untouched, no flow left behind
    assert_eq!(get_user(&conn, USER).unwrap().unwrap().credits, 500);
    assert!(flow::load(&conn, USER).unwrap().is_none());
}

/// A failed external call refunds the reservation in full.
#[tokio::test]
async fn test_failed_dispatch_leaves_balance_intact() {
    let pool = pool_with_user(USER, 100);
    let api = ScriptedDispatcher::failing("remote unavailable");

    let outcome = dispatch_with_credits(&pool, &api, USER, "someone@example.com", 60)
        .await
        .unwrap();
    assert!(matches!(outcome, DispatchOutcome::Refunded { quantity: 60, .. }));

    let conn = get_connection(&pool).unwrap();
    let user = get_user(&conn, USER).unwrap().unwrap();
    assert_eq!(user.credits, 100);
    assert_eq!(user.sent_total, 0);
}

/// Reserving more than the balance never calls the remote side.
#[tokio::test]
async fn test_insufficient_balance_is_rejected_before_the_call() {
    let pool = pool_with_user(USER, 15);
    let api = ScriptedDispatcher::succeeding();

    let err = dispatch_with_credits(&pool, &api, USER, "someone@example.com", 16)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InsufficientCredits));
    assert_eq!(api.call_count(), 0);

    let conn = get_connection(&pool).unwrap();
    assert_eq!(get_user(&conn, USER).unwrap().unwrap().credits, 15);
}

/// The daily counter crosses the ceiling only through committed dispatches,
/// and the /send gate reads the same counter.
#[tokio::test]
async fn test_daily_counter_reaches_the_ceiling() {
    let pool = pool_with_user(USER, 5000);
    let api = ScriptedDispatcher::succeeding();

    // 1000 + 1000 = 2000 committed units today
    for _ in 0..2 {
        dispatch_with_credits(&pool, &api, USER, "someone@example.com", 1000)
            .await
            .unwrap();
    }

    let conn = get_connection(&pool).unwrap();
    let sent_today = get_sent_today(&conn, USER).unwrap();
    assert_eq!(sent_today, config::limits::DAILY_CEILING);
    assert!(sent_today >= config::limits::DAILY_CEILING);
}

/// Mixed successes and failures preserve `credits + sent_total`.
#[tokio::test]
async fn test_ledger_conservation_across_outcomes() {
    let pool = pool_with_user(USER, 300);
    let ok = ScriptedDispatcher::succeeding();
    let bad = ScriptedDispatcher::failing("boom");

    dispatch_with_credits(&pool, &ok, USER, "someone@example.com", 50)
        .await
        .unwrap();
    dispatch_with_credits(&pool, &bad, USER, "someone@example.com", 120)
        .await
        .unwrap();
    dispatch_with_credits(&pool, &ok, USER, "someone@example.com", 30)
        .await
        .unwrap();

    let conn = get_connection(&pool).unwrap();
    let user = get_user(&conn, USER).unwrap().unwrap();
    assert_eq!(user.credits + user.sent_total, 300);
    assert_eq!(user.sent_total, 80);
}

/// Yesterday's committed units do not count against today's ceiling.
#[tokio::test]
async fn test_daily_counter_resets_on_a_new_day() {
    let pool = pool_with_user(USER, 5000);
    let conn = get_connection(&pool).unwrap();

    commit_sent(&conn, USER, 1500).unwrap();
    // Pretend the commit happened yesterday
    conn.execute(
        "UPDATE users SET last_sent_day = date('now','-1 day') WHERE telegram_id = ?1",
        [USER],
    )
    .unwrap();

    assert_eq!(get_sent_today(&conn, USER).unwrap(), 0);

    commit_sent(&conn, USER, 10).unwrap();
    let user = get_user(&conn, USER).unwrap().unwrap();
    assert_eq!(get_sent_today(&conn, USER).unwrap(), 10);
    assert_eq!(user.sent_total, 1510);
}
