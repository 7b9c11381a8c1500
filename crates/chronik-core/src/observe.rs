//! Optional metrics instrumentation for chronik.
//!
//! When the `observe` feature is enabled, commits, conflicts, checkpoint lock
//! waits and read pages emit counters and histograms via the [`metrics`]
//! crate. A downstream application must install a metrics recorder to
//! collect the data.
//!
//! When the feature is **not** enabled every function in this module is a
//! zero-cost no-op.

/// Record a successful commit (counter + latency histogram).
///
/// - `chronik.commit.total` – incremented on every successful commit
/// - `chronik.commit.events_total` – number of events appended
/// - `chronik.commit.duration_seconds` – histogram of commit latency, retries included
#[inline]
pub fn record_commit(duration: std::time::Duration, events: usize) {
    #[cfg(feature = "observe")]
    {
        metrics::counter!("chronik.commit.total").increment(1);
        metrics::counter!("chronik.commit.events_total").increment(events as u64);
        metrics::histogram!("chronik.commit.duration_seconds").record(duration.as_secs_f64());
    }
    #[cfg(not(feature = "observe"))]
    {
        let _ = (duration, events);
    }
}

/// Record a `(stream, version)` collision.
///
/// - `chronik.commit.conflicts_total` – counter
/// - `chronik.commit.conflict_retry` – histogram of the retry index the conflict hit
#[inline]
pub fn record_commit_conflict(retry: u32) {
    #[cfg(feature = "observe")]
    {
        metrics::counter!("chronik.commit.conflicts_total").increment(1);
        metrics::histogram!("chronik.commit.conflict_retry").record(f64::from(retry));
    }
    #[cfg(not(feature = "observe"))]
    {
        let _ = retry;
    }
}

/// Record how long a checkpoint lock acquisition blocked.
///
/// - `chronik.checkpoint.lock_wait_seconds` – histogram
#[inline]
pub fn record_lock_wait(duration: std::time::Duration) {
    #[cfg(feature = "observe")]
    {
        metrics::histogram!("chronik.checkpoint.lock_wait_seconds").record(duration.as_secs_f64());
    }
    #[cfg(not(feature = "observe"))]
    {
        let _ = duration;
    }
}

/// Record one page fetched by a stream reader.
///
/// - `chronik.read.pages_total` – counter
/// - `chronik.read.rows_total` – counter
#[inline]
pub fn record_page_fetch(rows: usize) {
    #[cfg(feature = "observe")]
    {
        metrics::counter!("chronik.read.pages_total").increment(1);
        metrics::counter!("chronik.read.rows_total").increment(rows as u64);
    }
    #[cfg(not(feature = "observe"))]
    {
        let _ = rows;
    }
}
