pub mod retry;
pub mod session;
pub mod store;

pub use retry::RetryPolicy;
pub use session::{SessionConfig, SynchronousMode};
pub use store::{validate_table_name, CheckpointConfig, EventStoreConfig};
