pub mod checkpoint;
pub mod store;

pub use checkpoint::CheckpointStorage;
pub use store::{EventStore, EventStream};
