//! REST API handlers

pub mod billing;
pub mod health;
pub mod messages;
pub mod profiles;
pub mod shared;
pub mod summaries;
pub mod usage;
pub mod webhook;

pub use billing::*;
pub use health::*;
pub use messages::*;
pub use profiles::*;
pub use summaries::*;
pub use usage::*;
pub use webhook::*;
