//! Recap DB - Database abstractions
//!
//! SQLx-based database layer for Recap services, plus an in-memory
//! implementation of every repository for tests and local runs.
//!
//! # Example
//!
//! ```rust,ignore
//! use recap_db::{create_pool, run_migrations, Repositories};
//!
//! let pool = create_pool("postgres://localhost/recap").await?;
//! run_migrations(&pool).await?;
//! let repos = Repositories::new(pool);
//!
//! let profile = repos.profiles.find_by_id(user_id).await?;
//! ```

pub mod error;
pub mod memory;
pub mod models;
pub mod pg;
pub mod pool;
pub mod repo;

pub use error::{DbError, DbResult};
pub use models::*;
pub use pg::Repositories;
pub use pool::{create_pool, create_pool_with_options, run_migrations, DbPool, PoolOptions};
pub use repo::*;
