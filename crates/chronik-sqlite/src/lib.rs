//! SQLite backend for the chronik event store
//!
//! Provides:
//! - [`Session`]: one lazily opened, self-healing connection
//! - [`SqliteEventStore`]: optimistic commits and schema management
//! - [`SqliteEventStream`]: restartable, paginated reads over physical and
//!   virtual streams
//! - [`SqliteCheckpointStorage`]: lock-protected subscriber positions
//!
//! SQLite has no row-level locks. A checkpoint lock is a `BEGIN IMMEDIATE`
//! transaction and therefore excludes every other writer of the same database
//! file, so checkpoints should live in a file of their own.

mod error;
mod row;
pub mod checkpoint;
pub mod schema;
pub mod session;
pub mod store;
pub mod stream;

pub use checkpoint::SqliteCheckpointStorage;
pub use session::Session;
pub use store::SqliteEventStore;
pub use stream::{SqliteEventIter, SqliteEventStream};
