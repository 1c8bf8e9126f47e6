//! Common error types

use thiserror::Error;

/// Errors parsing domain values from their stored string form
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Unknown plan name
    #[error("invalid plan: {0}")]
    InvalidPlan(String),

    /// Unknown subscription status
    #[error("invalid subscription status: {0}")]
    InvalidStatus(String),

    /// Unknown message channel
    #[error("invalid channel: {0}")]
    InvalidChannel(String),
}
