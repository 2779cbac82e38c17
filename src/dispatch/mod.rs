//! Metered dispatch: external API client and credit-reconciling coordinator

pub mod client;
pub mod coordinator;

// Re-exports for convenience
pub use client::{BulkDispatcher, HttpDispatcher};
pub use coordinator::{dispatch_with_credits, DispatchOutcome};
