//! Read command implementation

use anyhow::{bail, Context, Result};
use chronik::prelude::*;
use clap::Args;
use std::io::{self, Write};
use std::path::PathBuf;

#[derive(Args, Debug, Default)]
pub struct ReadArgs {
    /// Read a single stream
    #[arg(long, conflicts_with_all = ["category", "correlation"])]
    pub stream: Option<String>,

    /// Read all streams whose name starts with this prefix
    #[arg(long, conflicts_with = "correlation")]
    pub category: Option<String>,

    /// Read all events sharing a correlation id
    #[arg(long)]
    pub correlation: Option<String>,

    /// Lowest sequence number to include
    #[arg(long)]
    pub from: Option<u64>,

    /// Highest sequence number to include
    #[arg(long)]
    pub to: Option<u64>,

    /// Maximum number of events to print
    #[arg(short, long)]
    pub limit: Option<usize>,

    /// Newest events first
    #[arg(short, long)]
    pub backwards: bool,

    /// Only include these event types (repeatable)
    #[arg(long = "type")]
    pub event_types: Vec<String>,
}

impl ReadArgs {
    fn selector(&self) -> Result<StreamSelector> {
        let selector: StreamSelector = match (&self.stream, &self.category, &self.correlation) {
            (Some(stream), None, None) => StreamName::new(stream.as_str())?.into(),
            (None, Some(prefix), None) => VirtualStreamName::for_category(prefix.as_str())?.into(),
            (None, None, Some(id)) => {
                VirtualStreamName::for_correlation_id(CorrelationId::new(id.as_str())?).into()
            }
            (None, None, None) => VirtualStreamName::all().into(),
            _ => bail!("Use at most one of --stream, --category and --correlation"),
        };
        Ok(selector)
    }

    fn filter(&self) -> Result<Option<EventStreamFilter>> {
        if self.event_types.is_empty() {
            return Ok(None);
        }
        let types = self
            .event_types
            .iter()
            .map(|t| EventType::new(t.as_str()))
            .collect::<chronik::Result<Vec<_>>>()?;
        Ok(Some(EventStreamFilter::for_event_types(types)))
    }

    fn apply(&self, mut stream: SqliteEventStream) -> SqliteEventStream {
        if let Some(from) = self.from {
            stream = stream.with_minimum_sequence_number(SequenceNumber::new(from));
        }
        if let Some(to) = self.to {
            stream = stream.with_maximum_sequence_number(SequenceNumber::new(to));
        }
        if let Some(limit) = self.limit {
            stream = stream.limit(limit);
        }
        if self.backwards {
            stream = stream.backwards();
        }
        stream
    }
}

pub fn execute(db_path: PathBuf, config: ChronikConfig, args: ReadArgs) -> Result<()> {
    let db = ChronikDb::open_with_config(&db_path, config).context("Failed to open database")?;

    let stream = args.apply(db.store().load(args.selector()?, args.filter()?));
    tracing::debug!("Reading {}", stream.selector());

    let stdout = io::stdout();
    let mut out = stdout.lock();
    write_envelopes(&stream, &mut out)?;
    Ok(())
}

fn write_envelopes<W: Write>(stream: &SqliteEventStream, out: &mut W) -> Result<usize> {
    let mut written = 0;
    for envelope in stream.iter() {
        let envelope = envelope.context("Failed to read event")?;
        serde_json::to_writer(&mut *out, &envelope)?;
        writeln!(out)?;
        written += 1;
    }
    Ok(written)
}
