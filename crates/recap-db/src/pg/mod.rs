//! PostgreSQL repository implementations

mod event;
mod message;
mod profile;
mod summary;

pub use event::PgSubscriptionEventRepository;
pub use message::PgMessageRepository;
pub use profile::PgProfileRepository;
pub use summary::PgSummaryRepository;

use crate::DbPool;

/// All repositories bundled together
#[derive(Clone)]
pub struct Repositories {
    pub profiles: PgProfileRepository,
    pub summaries: PgSummaryRepository,
    pub messages: PgMessageRepository,
    pub events: PgSubscriptionEventRepository,
}

impl Repositories {
    /// Create all repositories from a database pool
    pub fn new(pool: DbPool) -> Self {
        Self {
            profiles: PgProfileRepository::new(pool.clone()),
            summaries: PgSummaryRepository::new(pool.clone()),
            messages: PgMessageRepository::new(pool.clone()),
            events: PgSubscriptionEventRepository::new(pool),
        }
    }
}
