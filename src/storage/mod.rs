//! Persistence layer: the three tables behind Recording/Ingest/User (§6),
//! reached only through this module's repository — no other module touches
//! `sqlx` directly.

mod models;
mod pool;
mod repository;

pub use models::{IngestRow, RecordingRow, UserRow};
pub use pool::SqlitePool;
pub use repository::Repository;
