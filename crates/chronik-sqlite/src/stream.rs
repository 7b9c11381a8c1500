use crate::error::{map_row_error, map_sqlite_error};
use crate::row::{RawRow, SELECT_COLUMNS};
use crate::session::Session;
use chronik_core::{
    observe, EventEnvelope, EventStream, EventStreamFilter, Result, SequenceNumber, StreamSelector,
};
use rusqlite::params_from_iter;
use rusqlite::types::Value;
use std::collections::VecDeque;
use tracing::debug;

/// A query over the event table
///
/// Cheap to clone: it only holds a handle to the session and the query
/// parameters. Builder methods return modified copies.
#[derive(Debug, Clone)]
pub struct SqliteEventStream {
    session: Session,
    table: String,
    page_size: usize,
    selector: StreamSelector,
    filter: Option<EventStreamFilter>,
    minimum: Option<SequenceNumber>,
    maximum: Option<SequenceNumber>,
    limit: Option<usize>,
    backwards: bool,
}

impl SqliteEventStream {
    pub fn new(
        session: Session,
        table: String,
        page_size: usize,
        selector: StreamSelector,
        filter: Option<EventStreamFilter>,
    ) -> Self {
        Self {
            session,
            table,
            page_size: page_size.max(1),
            selector,
            filter,
            minimum: None,
            maximum: None,
            limit: None,
            backwards: false,
        }
    }

    /// Rows fetched per round trip
    pub fn with_page_size(&self, page_size: usize) -> Self {
        let mut stream = self.clone();
        stream.page_size = page_size.max(1);
        stream
    }

    pub fn selector(&self) -> &StreamSelector {
        &self.selector
    }

    pub fn is_backwards(&self) -> bool {
        self.backwards
    }

    /// SQL and parameters for the page following `after`
    fn page_query(&self, after: Option<SequenceNumber>, page_limit: usize) -> (String, Vec<Value>) {
        let mut conditions: Vec<String> = Vec::new();
        let mut params: Vec<Value> = Vec::new();

        match &self.selector {
            StreamSelector::All => {}
            StreamSelector::Exact(name) => {
                conditions.push("stream = ?".into());
                params.push(Value::Text(name.as_str().to_string()));
            }
            StreamSelector::Category(prefix) => {
                conditions.push("substr(stream, 1, ?) = ?".into());
                params.push(Value::Integer(prefix.chars().count() as i64));
                params.push(Value::Text(prefix.clone()));
            }
            StreamSelector::ByCorrelation(id) => {
                conditions.push("correlationid = ?".into());
                params.push(Value::Text(id.as_str().to_string()));
            }
        }

        if let Some(types) = self.filter.as_ref().and_then(|f| f.event_types.as_ref()) {
            if types.is_empty() {
                conditions.push("1 = 0".into());
            } else {
                let placeholders = vec!["?"; types.len()].join(", ");
                conditions.push(format!("type IN ({})", placeholders));
                params.extend(types.iter().map(|t| Value::Text(t.as_str().to_string())));
            }
        }

        if let Some(minimum) = self.minimum {
            conditions.push("sequencenumber >= ?".into());
            params.push(Value::Integer(clamp_to_sql(minimum)));
        }
        if let Some(maximum) = self.maximum {
            conditions.push("sequencenumber <= ?".into());
            params.push(Value::Integer(clamp_to_sql(maximum)));
        }

        if let Some(after) = after {
            let op = if self.backwards { "<" } else { ">" };
            conditions.push(format!("sequencenumber {} ?", op));
            params.push(Value::Integer(clamp_to_sql(after)));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", conditions.join(" AND "))
        };
        let order = if self.backwards { "DESC" } else { "ASC" };

        params.push(Value::Integer(i64::try_from(page_limit).unwrap_or(i64::MAX)));
        let sql = format!(
            "SELECT {} FROM {}{} ORDER BY sequencenumber {} LIMIT ?",
            SELECT_COLUMNS, self.table, where_clause, order
        );
        (sql, params)
    }
}

/// SQLite integers are signed; no stored row can exceed `i64::MAX`
fn clamp_to_sql(sequence_number: SequenceNumber) -> i64 {
    i64::try_from(sequence_number.value()).unwrap_or(i64::MAX)
}

impl EventStream for SqliteEventStream {
    type Iter<'a> = SqliteEventIter<'a>;

    fn with_minimum_sequence_number(&self, sequence_number: SequenceNumber) -> Self {
        let mut stream = self.clone();
        stream.minimum = Some(sequence_number);
        stream
    }

    fn with_maximum_sequence_number(&self, sequence_number: SequenceNumber) -> Self {
        let mut stream = self.clone();
        stream.maximum = Some(sequence_number);
        stream
    }

    fn limit(&self, limit: usize) -> Self {
        let mut stream = self.clone();
        stream.limit = Some(limit);
        stream
    }

    fn backwards(&self) -> Self {
        let mut stream = self.clone();
        stream.backwards = true;
        stream
    }

    fn iter(&self) -> SqliteEventIter<'_> {
        SqliteEventIter {
            stream: self,
            buffer: VecDeque::new(),
            last_seen: None,
            remaining: self.limit,
            connected: false,
            exhausted: false,
        }
    }
}

/// One pass over a [`SqliteEventStream`], fetching a page at a time
///
/// Pages are keyed on the last sequence number seen, so rows committed while
/// iterating never shift page boundaries. The first error ends the iteration.
pub struct SqliteEventIter<'a> {
    stream: &'a SqliteEventStream,
    buffer: VecDeque<Result<EventEnvelope>>,
    last_seen: Option<SequenceNumber>,
    remaining: Option<usize>,
    connected: bool,
    exhausted: bool,
}

impl SqliteEventIter<'_> {
    fn fetch_page(&mut self) -> Result<()> {
        let page_limit = match self.remaining {
            Some(0) => {
                self.exhausted = true;
                return Ok(());
            }
            Some(remaining) => remaining.min(self.stream.page_size),
            None => self.stream.page_size,
        };

        if !self.connected {
            self.stream.session.ensure_connected()?;
            self.connected = true;
        }

        let (sql, params) = self.stream.page_query(self.last_seen, page_limit);
        let rows = self.stream.session.with_connection(|conn| {
            let mut stmt = conn.prepare_cached(&sql).map_err(map_sqlite_error)?;
            let mut cursor = stmt
                .query(params_from_iter(params))
                .map_err(map_sqlite_error)?;

            // Rows are decoded one by one so a bad row ends the page after
            // the good rows before it
            let mut rows = Vec::new();
            loop {
                match cursor.next() {
                    Ok(Some(row)) => match RawRow::from_row(row) {
                        Ok(raw) => rows.push(Ok(raw)),
                        Err(e) => {
                            rows.push(Err(map_row_error(e)));
                            break;
                        }
                    },
                    Ok(None) => break,
                    Err(e) => {
                        rows.push(Err(map_sqlite_error(e)));
                        break;
                    }
                }
            }
            Ok(rows)
        })?;

        observe::record_page_fetch(rows.len());
        debug!(
            selector = %self.stream.selector,
            after = ?self.last_seen.map(SequenceNumber::value),
            rows = rows.len(),
            "Fetched page"
        );

        if rows.len() < page_limit {
            self.exhausted = true;
        }
        if let Some(remaining) = self.remaining.as_mut() {
            *remaining = remaining.saturating_sub(rows.len());
        }

        for raw in rows {
            let decoded = raw.and_then(|raw| {
                self.last_seen = Some(SequenceNumber::new(raw.sequence_number.max(0) as u64));
                raw.into_envelope()
            });
            match decoded {
                Ok(envelope) => self.buffer.push_back(Ok(envelope)),
                Err(e) => {
                    self.buffer.push_back(Err(e));
                    self.exhausted = true;
                    break;
                }
            }
        }
        Ok(())
    }
}

impl Iterator for SqliteEventIter<'_> {
    type Item = Result<EventEnvelope>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(item) = self.buffer.pop_front() {
                return Some(item);
            }
            if self.exhausted {
                return None;
            }
            if let Err(e) = self.fetch_page() {
                self.exhausted = true;
                return Some(Err(e));
            }
        }
    }
}
