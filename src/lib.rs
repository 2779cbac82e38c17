//! Dispatchbot - credit-metered bulk-dispatch Telegram bot
//!
//! This library provides all the functionality for the bot: the credit
//! ledger, the per-user conversation flow, the metered dispatch coordinator,
//! the voucher subsystem, and the Telegram handler tree.
//!
//! # Module Structure
//!
//! - `core`: configuration, errors, logging, validation, rate limiting
//! - `storage`: SQLite ledger (users, flow state, vouchers)
//! - `flow`: per-user conversation state machine
//! - `dispatch`: external API client and credit-reconciling coordinator
//! - `vouchers`: single-use credit voucher generation and redemption
//! - `telegram`: bot setup and handler tree

pub mod cli;
pub mod core;
pub mod dispatch;
pub mod flow;
pub mod storage;
pub mod telegram;
pub mod vouchers;

// Re-export commonly used types for convenience
pub use core::{config, AppError, AppResult};
pub use dispatch::{dispatch_with_credits, BulkDispatcher, DispatchOutcome, HttpDispatcher};
pub use storage::{create_pool, get_connection, DbConnection, DbPool};
pub use telegram::{create_bot, schema, setup_bot_commands, HandlerDeps};
