//! Recap Types - Shared domain types
//!
//! This crate contains domain types used across Recap services:
//! - User identity
//! - Subscription plans, statuses and quota tables
//! - Summary and channel message types
//! - Billing provider checkout and portal sessions

pub mod billing;
pub mod error;
pub mod plan;
pub mod subscription;
pub mod summary;
pub mod user;

pub use billing::*;
pub use error::*;
pub use plan::*;
pub use subscription::*;
pub use summary::*;
pub use user::*;
