//! Telegram bot handler tree configuration
//!
//! The handlers are organized so integration tests can use the same handler
//! tree as production code.

mod commands;
mod schema;
mod types;

pub use commands::{
    handle_cancel_command, handle_flow_message, handle_generate_command, handle_info_command, handle_redeem_command,
    handle_send_command, handle_start_command,
};
pub use schema::schema;
pub use types::{ensure_user_exists, HandlerDeps, HandlerError, UserCreationResult, UserInfo};
