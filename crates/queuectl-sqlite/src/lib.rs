//! SQLite-backed implementation of the queuectl repository traits.
//!
//! The claim protocol here is the distributed-coordination core described in
//! spec.md §4.2: a single conditional `UPDATE ... RETURNING` lets any number
//! of worker processes race against the same file without a broker.

mod config_store;
mod job_repo;
mod pool;
mod row;
mod worker_repo;

pub use config_store::SqliteConfigStore;
pub use job_repo::SqliteJobRepository;
pub use pool::{connect, run_migrations};
pub use worker_repo::SqliteWorkerRepository;

pub use sqlx::SqlitePool;
