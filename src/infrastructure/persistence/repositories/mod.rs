mod in_memory_glossary_repository;
mod in_memory_job_repository;
mod pg_glossary_repository;
mod pg_job_repository;
mod rows;

pub use in_memory_glossary_repository::InMemoryGlossaryRepository;
pub use in_memory_job_repository::InMemoryJobRepository;
pub use pg_glossary_repository::PgGlossaryRepository;
pub use pg_job_repository::PgJobRepository;
