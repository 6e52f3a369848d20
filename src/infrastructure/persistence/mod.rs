mod pg_pool;
mod repositories;

pub use repositories::InMemoryGlossaryRepository;
pub use repositories::InMemoryJobRepository;
pub use repositories::PgGlossaryRepository;
pub use repositories::PgJobRepository;

pub use pg_pool::{create_pool, run_migrations};
