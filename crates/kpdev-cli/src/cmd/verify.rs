//! Verify command

use std::path::Path;

use anyhow::{Context, Result};
use crossterm::style::Stylize;
use kpdev_core::package::verify_package;

/// Check a package's layout and signature, then list what it contains.
pub fn verify(path: &Path) -> Result<()> {
    let verified = verify_package(path)
        .with_context(|| format!("{} is not a valid signed package", path.display()))?;

    println!("{} {}", "✓".green(), path.display());
    println!("  Plugin ID: {}", verified.plugin_id.as_str().cyan());
    println!("  SHA-1:     {}", verified.contents_sha1.as_str().dark_grey());
    println!("  Entries:");
    for entry in &verified.contents_entries {
        println!("    {entry}");
    }
    Ok(())
}
