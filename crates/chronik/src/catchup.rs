//! Catch-up subscriptions
//!
//! A subscriber repeatedly takes its checkpoint lock, reads the events after
//! its stored position, hands them to a handler and stores the position of
//! the last event the handler accepted.

use crate::{
    CheckpointStorage, EventEnvelope, EventStore, EventStream, EventStreamFilter, Result,
    SequenceNumber, StreamSelector,
};
use std::time::{Duration, Instant};
use tracing::{debug, error};

const DEFAULT_BATCH_SIZE: usize = 100;

/// Outcome of one or more catch-up rounds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatchUpStats {
    /// Envelopes the handler accepted
    pub processed: usize,
    /// Stored position after the round
    pub position: SequenceNumber,
    pub duration: Duration,
}

pub struct CatchUpSubscriber<'a, S, C>
where
    S: EventStore,
    C: CheckpointStorage,
{
    store: &'a S,
    checkpoints: C,
    selector: StreamSelector,
    filter: Option<EventStreamFilter>,
    batch_size: usize,
}

impl<'a, S, C> CatchUpSubscriber<'a, S, C>
where
    S: EventStore,
    C: CheckpointStorage,
{
    pub fn new(store: &'a S, checkpoints: C, selector: impl Into<StreamSelector>) -> Self {
        Self {
            store,
            checkpoints,
            selector: selector.into(),
            filter: None,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_filter(mut self, filter: EventStreamFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Maximum envelopes handled per round
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn checkpoints(&self) -> &C {
        &self.checkpoints
    }

    /// Run one round of at most `batch_size` envelopes
    ///
    /// If the handler fails, the position of the last envelope it accepted is
    /// stored, the lock is released and the handler's error is returned.
    pub fn run_once<F>(&mut self, mut handler: F) -> Result<CatchUpStats>
    where
        F: FnMut(&EventEnvelope) -> Result<()>,
    {
        let start = Instant::now();
        let checkpoint = self.checkpoints.acquire_lock()?;

        let stream = self
            .store
            .load(self.selector.clone(), self.filter.clone())
            .with_minimum_sequence_number(checkpoint.next())
            .limit(self.batch_size);

        let mut position = checkpoint;
        let mut processed = 0;
        let mut failure = None;
        for item in stream.iter() {
            let handled = item.and_then(|envelope| {
                handler(&envelope)?;
                Ok(envelope.sequence_number)
            });
            match handled {
                Ok(sequence_number) => {
                    position = sequence_number;
                    processed += 1;
                }
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }

        let released = self.checkpoints.update_and_release_lock(position);
        if let Some(e) = failure {
            if let Err(release_err) = released {
                error!("Failed to store checkpoint after handler error: {}", release_err);
            }
            return Err(e);
        }
        released?;

        let stats = CatchUpStats {
            processed,
            position,
            duration: start.elapsed(),
        };
        debug!(
            selector = %self.selector,
            processed,
            position = %position,
            "Catch-up round finished"
        );
        Ok(stats)
    }

    /// Run rounds until one comes back short of a full batch
    pub fn run_until_caught_up<F>(&mut self, mut handler: F) -> Result<CatchUpStats>
    where
        F: FnMut(&EventEnvelope) -> Result<()>,
    {
        let start = Instant::now();
        let mut processed = 0;
        loop {
            let round = self.run_once(&mut handler)?;
            processed += round.processed;
            if round.processed < self.batch_size {
                return Ok(CatchUpStats {
                    processed,
                    position: round.position,
                    duration: start.elapsed(),
                });
            }
        }
    }
}
