#![allow(dead_code)]

mod fixtures;
mod test_postgres;

pub use fixtures::*;
pub use test_postgres::TestPostgres;
