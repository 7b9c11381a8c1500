use crate::error::Result;
use crate::types::{SequenceNumber, Status};
use tracing::error;

/// Durable, lock-protected position of one subscriber in the global log
///
/// Between [`acquire_lock`](CheckpointStorage::acquire_lock) and
/// [`update_and_release_lock`](CheckpointStorage::update_and_release_lock)
/// no other handle for the same subscriber can acquire the lock.
pub trait CheckpointStorage: Send {
    /// Block until the subscriber's lock is held and return the stored
    /// position ([`SequenceNumber::NONE`] if nothing was ever stored)
    fn acquire_lock(&mut self) -> Result<SequenceNumber>;

    /// Persist `sequence_number` (only if it changed) and release the lock
    fn update_and_release_lock(&mut self, sequence_number: SequenceNumber) -> Result<()>;

    /// Read the stored position without taking the lock
    fn applied_sequence_number(&self) -> Result<SequenceNumber>;

    /// Create or migrate the checkpoint table
    fn setup(&self) -> Result<()>;

    fn status(&self) -> Status;

    /// Run `f` with the lock held and store the position it returns
    ///
    /// When `f` fails the previous position is written back, which releases
    /// the lock without changing anything, and the error from `f` is returned.
    fn with_lock<F>(&mut self, f: F) -> Result<SequenceNumber>
    where
        F: FnOnce(SequenceNumber) -> Result<SequenceNumber>,
        Self: Sized,
    {
        let current = self.acquire_lock()?;
        match f(current) {
            Ok(next) => {
                self.update_and_release_lock(next)?;
                Ok(next)
            }
            Err(e) => {
                if let Err(release_err) = self.update_and_release_lock(current) {
                    error!("Failed to release checkpoint lock: {}", release_err);
                }
                Err(e)
            }
        }
    }
}
