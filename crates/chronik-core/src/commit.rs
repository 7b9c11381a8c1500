//! Optimistic commit protocol
//!
//! One attempt reads the stream's current version, checks the caller's
//! expectation, assigns consecutive versions and inserts every row inside a
//! single storage transaction. The `(stream, version)` uniqueness constraint
//! is what actually arbitrates between racing writers: a collision rolls the
//! attempt back and it is retried after an exponentially growing pause.

use crate::config::RetryPolicy;
use crate::error::{ChronikError, Result};
use crate::observe;
use crate::types::{CommitResult, Events, ExpectedVersion, StreamName};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Result of a single insert attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// All rows were inserted and the transaction committed
    Inserted(CommitResult),
    /// Another writer claimed one of the versions first; nothing was written
    Conflict,
}

/// Storage seam used by [`CommitCoordinator`]
pub trait VersionedLog {
    /// Verify the connection and transparently re-open it if it was lost
    fn ensure_connected(&self) -> Result<()>;

    /// Run one complete attempt in its own transaction
    ///
    /// Must fail with `Configuration` if a transaction is already open on the
    /// session, with `Concurrency` if `expected_version` does not hold or the
    /// backend reports a lock timeout, and must report a `(stream, version)`
    /// collision as [`InsertOutcome::Conflict`] after rolling back.
    fn try_insert_versioned(
        &self,
        stream: &StreamName,
        events: &Events,
        expected_version: ExpectedVersion,
    ) -> Result<InsertOutcome>;
}

type Sleeper = Arc<dyn Fn(Duration) + Send + Sync>;

/// Retries [`VersionedLog`] attempts on version collisions
#[derive(Clone)]
pub struct CommitCoordinator {
    policy: RetryPolicy,
    sleeper: Sleeper,
}

impl CommitCoordinator {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            sleeper: Arc::new(std::thread::sleep),
        }
    }

    /// Replace the function used to wait between attempts
    pub fn with_sleeper<F>(mut self, sleeper: F) -> Self
    where
        F: Fn(Duration) + Send + Sync + 'static,
    {
        self.sleeper = Arc::new(sleeper);
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn commit<L>(
        &self,
        log: &L,
        stream: &StreamName,
        events: &Events,
        expected_version: ExpectedVersion,
    ) -> Result<CommitResult>
    where
        L: VersionedLog + ?Sized,
    {
        let start = Instant::now();
        let mut retry: u32 = 0;

        loop {
            log.ensure_connected()?;

            debug!(
                stream = %stream,
                events = events.len(),
                expected = %expected_version,
                attempt = retry + 1,
                "Committing events"
            );

            match log.try_insert_versioned(stream, events, expected_version)? {
                InsertOutcome::Inserted(result) => {
                    observe::record_commit(start.elapsed(), events.len());
                    debug!(
                        stream = %stream,
                        version = %result.version,
                        sequence_number = %result.sequence_number,
                        "Committed events"
                    );
                    return Ok(result);
                }
                InsertOutcome::Conflict => {
                    observe::record_commit_conflict(retry);
                    if retry >= self.policy.max_retries {
                        return Err(ChronikError::Concurrency(format!(
                            "Failed after {} retry attempts",
                            retry
                        )));
                    }
                    let delay = self.policy.delay_for(retry);
                    warn!(
                        stream = %stream,
                        retry = retry + 1,
                        delay_ms = delay.as_millis() as u64,
                        "Version conflict, retrying commit"
                    );
                    (self.sleeper)(delay);
                    retry += 1;
                }
            }
        }
    }
}

impl Default for CommitCoordinator {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

impl fmt::Debug for CommitCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommitCoordinator")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
