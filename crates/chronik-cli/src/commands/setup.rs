//! Setup command implementation

use anyhow::{Context, Result};
use chronik::prelude::*;
use std::path::PathBuf;

pub fn execute(db_path: PathBuf, config: ChronikConfig) -> Result<()> {
    let db = ChronikDb::open_with_config(&db_path, config).context("Failed to open database")?;

    db.setup().context("Failed to set up database")?;

    println!("Events: {}", db.status());
    println!("Checkpoints: {}", db.checkpoint_status());
    Ok(())
}
