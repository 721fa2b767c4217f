//! Keys command

use anyhow::{Context, Result};
use crossterm::style::Stylize;
use kpdev_core::keys::ensure_keys;
use kpdev_core::paths::ProjectPaths;

/// Create missing stage keys and print both plugin IDs.
pub fn keys(paths: &ProjectPaths) -> Result<()> {
    let keys = ensure_keys(paths).context("Failed to prepare signing keys")?;

    for key in &keys {
        let note = if key.created { " (new key)" } else { "" };
        println!(
            "{: <12} {}{}",
            key.stage.label(),
            key.plugin_id.as_str().cyan(),
            note.dark_grey()
        );
    }
    Ok(())
}
