//! Checkpoint command implementation

use anyhow::{Context, Result};
use chronik::prelude::*;
use std::path::PathBuf;

pub fn execute(db_path: PathBuf, config: ChronikConfig, subscriber: &str) -> Result<()> {
    let db = ChronikDb::open_with_config(&db_path, config).context("Failed to open database")?;

    let position = db
        .checkpoint(subscriber)
        .with_context(|| format!("Failed to read checkpoint of {}", subscriber))?;
    let head = db.store().head().context("Failed to read log head")?;

    println!("Subscriber: {}", subscriber);
    if position.is_none() {
        println!("Applied sequence number: none");
    } else {
        println!("Applied sequence number: {}", position);
    }
    println!("Head sequence number: {}", head);

    let lag = head.value().saturating_sub(position.value());
    if lag > 0 {
        println!("\n{} event(s) behind", lag);
    } else {
        println!("\nUp to date");
    }
    Ok(())
}
