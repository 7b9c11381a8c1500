//! Status command implementation

use anyhow::{bail, Context, Result};
use chronik::prelude::*;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

pub fn execute(db_path: PathBuf, config: ChronikConfig) -> Result<()> {
    tracing::info!("Checking database status: {}", db_path.display());

    let stdout = io::stdout();
    let usable = write_report(&db_path, config, &mut stdout.lock())?;
    if !usable {
        bail!("Database is not usable");
    }
    Ok(())
}

/// Print the status of both tables; false if either reports an error
///
/// A database that can't even be opened is reported as an error status.
pub fn write_report(db_path: &Path, config: ChronikConfig, out: &mut impl Write) -> Result<bool> {
    writeln!(out, "\nDatabase Status")?;
    writeln!(out, "{}", "=".repeat(60))?;
    writeln!(out, "Path: {}", db_path.display())?;

    let events_label = format!("Events ({})", config.events.table_name);
    let checkpoints_label = format!("Checkpoints ({})", config.checkpoints.table_name);

    let db = match ChronikDb::open_with_config(db_path, config) {
        Ok(db) => db,
        Err(e) => {
            tracing::warn!("Failed to open database: {}", e);
            let unreachable = Status::error(format!("Failed to open database: {}", e));
            write_status(out, &events_label, &unreachable)?;
            write_status(out, &checkpoints_label, &unreachable)?;
            return Ok(false);
        }
    };

    let events = db.status();
    let checkpoints = db.checkpoint_status();
    write_status(out, &events_label, &events)?;
    write_status(out, &checkpoints_label, &checkpoints)?;

    if events.kind == StatusType::Error || checkpoints.kind == StatusType::Error {
        return Ok(false);
    }
    if events.kind == StatusType::SetupRequired || checkpoints.kind == StatusType::SetupRequired {
        writeln!(out, "\nRun 'chronik setup' to apply the statements above")?;
    } else {
        let head = db.store().head().context("Failed to read log head")?;
        writeln!(out, "\nHead sequence number: {}", head)?;
    }

    Ok(true)
}

fn write_status(out: &mut impl Write, label: &str, status: &Status) -> Result<()> {
    writeln!(out, "\n{}:", label)?;
    match status.kind {
        StatusType::Ok => writeln!(out, "  ok")?,
        StatusType::SetupRequired => writeln!(out, "  setup required")?,
        StatusType::Error => writeln!(out, "  error")?,
    }
    for line in status.details.lines() {
        writeln!(out, "    {}", line)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(db_path: &Path) -> (bool, String) {
        let mut out = Vec::new();
        let usable = write_report(db_path, ChronikConfig::default(), &mut out).unwrap();
        (usable, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_unopenable_path_reports_error_status() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file = temp_dir.path().join("not-a-directory");
        std::fs::write(&file, "").unwrap();

        let (usable, output) = report(&file.join("db"));
        assert!(!usable);
        assert!(output.contains("Events (events):\n  error"));
        assert!(output.contains("Checkpoints (checkpoints):\n  error"));
        assert!(output.contains("Failed to open database"));
    }

    #[test]
    fn test_fresh_database_needs_setup_then_is_ok() {
        let temp_dir = tempfile::tempdir().unwrap();

        let (usable, output) = report(temp_dir.path());
        assert!(usable);
        assert!(output.contains("setup required"));
        assert!(output.contains("chronik setup"));

        ChronikDb::open(temp_dir.path()).unwrap().setup().unwrap();
        let (usable, output) = report(temp_dir.path());
        assert!(usable);
        assert!(output.contains("Head sequence number: 0"));
    }
}
