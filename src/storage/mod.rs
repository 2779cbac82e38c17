//! Ledger storage: accounts, conversation state, and voucher relations

pub mod db;

// Re-exports for convenience
pub use db::{create_pool, get_connection, DbConnection, DbPool};
