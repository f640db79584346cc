//! Storage layer for the keyfed federation server.
//!
//! Provides SQLite connection pooling (via `r2d2`), embedded SQL
//! migrations, and the infection store that backs federation fetches.
//!
//! # Design decisions
//!
//! - **SQLite with WAL mode**: a single-node store with no external
//!   database process. WAL lets concurrent fetches read while publishes
//!   write.
//! - **Keyset paging**: scans walk `(created_at, id)` and never hold a
//!   statement open between pages, so a continuation token is simply the
//!   last position handed out.
//! - **Embedded migrations**: SQL files are compiled into the binary via
//!   `include_str!`.

mod error;
mod infections;
mod iterator;
mod migrations;
mod pool;

pub use error::StoreError;
pub use infections::{
    insert_infection, iterate_infections, SqliteInfectionIterator, DEFAULT_PAGE_SIZE,
};
pub use iterator::{FetchInfectionsCriteria, InfectionIterator, IteratorStep};
pub use migrations::{run_migrations, MigrationError};
pub use pool::{create_pool, DbPool, DbRuntimeSettings, PoolError, IN_MEMORY};
