//! Schema status and setup
//!
//! The expected shape of each table is declared as a [`TableSpec`]. Comparing
//! it with `sqlite_master` and `PRAGMA table_info` yields the statements that
//! bring the database in line, which `status` reports and `setup` applies.

use crate::error::map_sqlite_error;
use crate::session::Session;
use chronik_core::{ChronikError, Result, Status};
use rusqlite::{Connection, OptionalExtension};
use std::collections::HashSet;
use tracing::info;

pub struct ColumnSpec {
    pub name: &'static str,
    /// Definition used in `CREATE TABLE`
    pub definition: &'static str,
    /// Definition used in `ALTER TABLE ADD COLUMN`; `None` if the column
    /// cannot be added to an existing table
    pub alter_definition: Option<&'static str>,
}

pub struct IndexSpec {
    pub name: String,
    pub unique: bool,
    pub columns: &'static [&'static str],
}

/// Expected layout of one table
pub struct TableSpec {
    pub name: String,
    pub columns: Vec<ColumnSpec>,
    pub indexes: Vec<IndexSpec>,
}

impl TableSpec {
    /// Event log table
    pub fn events(table: &str) -> Self {
        Self {
            name: table.to_string(),
            columns: vec![
                column("sequencenumber", "INTEGER PRIMARY KEY AUTOINCREMENT", None),
                column("stream", "VARCHAR(100) NOT NULL", Some("VARCHAR(100) NOT NULL DEFAULT ''")),
                column("version", "INTEGER NOT NULL", Some("INTEGER NOT NULL DEFAULT 0")),
                column("type", "VARCHAR(100) NOT NULL", Some("VARCHAR(100) NOT NULL DEFAULT ''")),
                column("payload", "TEXT NOT NULL", Some("TEXT NOT NULL DEFAULT ''")),
                column("metadata", "TEXT NULL", Some("TEXT NULL")),
                column("id", "CHAR(36) NOT NULL", Some("CHAR(36) NOT NULL DEFAULT ''")),
                column("causationid", "VARCHAR(40) NULL", Some("VARCHAR(40) NULL")),
                column("correlationid", "VARCHAR(40) NULL", Some("VARCHAR(40) NULL")),
                column(
                    "recordedat",
                    "TEXT NOT NULL",
                    Some("TEXT NOT NULL DEFAULT '1970-01-01 00:00:00'"),
                ),
            ],
            indexes: vec![
                IndexSpec {
                    name: format!("{}_stream_version", table),
                    unique: true,
                    columns: &["stream", "version"],
                },
                IndexSpec {
                    name: format!("{}_id", table),
                    unique: true,
                    columns: &["id"],
                },
                IndexSpec {
                    name: format!("{}_correlationid", table),
                    unique: false,
                    columns: &["correlationid"],
                },
            ],
        }
    }

    /// Subscriber checkpoint table
    pub fn checkpoints(table: &str) -> Self {
        Self {
            name: table.to_string(),
            columns: vec![
                column("subscriberid", "VARCHAR(255) NOT NULL PRIMARY KEY", None),
                column(
                    "appliedsequencenumber",
                    "INTEGER NOT NULL",
                    Some("INTEGER NOT NULL DEFAULT 0"),
                ),
            ],
            indexes: Vec::new(),
        }
    }

    pub fn create_table_sql(&self) -> String {
        let columns = self
            .columns
            .iter()
            .map(|c| format!("    {} {}", c.name, c.definition))
            .collect::<Vec<_>>()
            .join(",\n");
        format!("CREATE TABLE {} (\n{}\n)", self.name, columns)
    }

    fn create_index_sql(&self, index: &IndexSpec) -> String {
        format!(
            "CREATE {}INDEX {} ON {} ({})",
            if index.unique { "UNIQUE " } else { "" },
            index.name,
            self.name,
            index.columns.join(", ")
        )
    }

    /// Statements that would bring the database in line with this layout
    ///
    /// Fails if a column is missing that cannot be added in place.
    pub fn corrective_statements(&self, conn: &Connection) -> Result<Vec<String>> {
        if !table_exists(conn, &self.name)? {
            let mut statements = vec![self.create_table_sql()];
            statements.extend(self.indexes.iter().map(|i| self.create_index_sql(i)));
            return Ok(statements);
        }

        let mut statements = Vec::new();

        let existing_columns = table_columns(conn, &self.name)?;
        for column in &self.columns {
            if existing_columns.contains(column.name) {
                continue;
            }
            match column.alter_definition {
                Some(definition) => statements.push(format!(
                    "ALTER TABLE {} ADD COLUMN {} {}",
                    self.name, column.name, definition
                )),
                None => {
                    return Err(ChronikError::Storage(format!(
                        "Column {} of table {} is missing and cannot be added to an existing table",
                        column.name, self.name
                    )))
                }
            }
        }

        let existing_indexes = table_indexes(conn, &self.name)?;
        for index in &self.indexes {
            if !existing_indexes.contains(&index.name) {
                statements.push(self.create_index_sql(index));
            }
        }

        Ok(statements)
    }
}

fn column(
    name: &'static str,
    definition: &'static str,
    alter_definition: Option<&'static str>,
) -> ColumnSpec {
    ColumnSpec {
        name,
        definition,
        alter_definition,
    }
}

fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    conn.query_row(
        "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [table],
        |_| Ok(()),
    )
    .optional()
    .map(|found| found.is_some())
    .map_err(map_sqlite_error)
}

fn table_columns(conn: &Connection, table: &str) -> Result<HashSet<String>> {
    let mut stmt = conn
        .prepare(&format!("PRAGMA table_info({})", table))
        .map_err(map_sqlite_error)?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(1))
        .map_err(map_sqlite_error)?
        .collect::<rusqlite::Result<HashSet<_>>>()
        .map_err(map_sqlite_error)?;
    Ok(names)
}

fn table_indexes(conn: &Connection, table: &str) -> Result<HashSet<String>> {
    let mut stmt = conn
        .prepare("SELECT name FROM sqlite_master WHERE type = 'index' AND tbl_name = ?1")
        .map_err(map_sqlite_error)?;
    let names = stmt
        .query_map([table], |row| row.get::<_, String>(0))
        .map_err(map_sqlite_error)?
        .collect::<rusqlite::Result<HashSet<_>>>()
        .map_err(map_sqlite_error)?;
    Ok(names)
}

/// Compare the database with the expected layout
pub fn status(session: &Session, spec: &TableSpec) -> Status {
    if let Err(e) = session.ensure_connected() {
        return Status::error(format!("Failed to connect to database: {}", e));
    }
    match session.with_connection(|conn| spec.corrective_statements(conn)) {
        Ok(statements) if statements.is_empty() => Status::ok(),
        Ok(statements) => Status::setup_required(format!(
            "The following statements need to be executed:\n{};",
            statements.join(";\n")
        )),
        Err(e) => Status::error(e.to_string()),
    }
}

/// Apply whatever `status` would report, in one transaction
pub fn setup(session: &Session, spec: &TableSpec) -> Result<()> {
    session.ensure_connected()?;
    session.with_connection_mut(|conn| {
        let statements = spec.corrective_statements(conn)?;
        if statements.is_empty() {
            return Ok(());
        }
        let tx = conn.transaction().map_err(map_sqlite_error)?;
        for statement in &statements {
            tx.execute_batch(statement).map_err(map_sqlite_error)?;
        }
        tx.commit().map_err(map_sqlite_error)?;
        info!(
            table = %spec.name,
            statements = statements.len(),
            "Applied schema changes"
        );
        Ok(())
    })
}
