//! Build command

use anyhow::{Context, Result};
use kpdev_core::Reporter;
use kpdev_core::bundler::{Bundler, ViteBundler};
use kpdev_core::config::ProjectConfig;
use kpdev_core::package::SignedPackage;
use kpdev_core::paths::ProjectPaths;
use kpdev_schema::BuildMode;

use crate::ops::{BuildOptions, build_package, load_build_config};
use crate::ui::theme::format_size;

/// Build and sign a package.
pub fn build(
    paths: &ProjectPaths,
    mode: BuildMode,
    skip_bundle: bool,
    reporter: &dyn Reporter,
) -> Result<()> {
    let config = load_build_config(paths)?;
    run_build(paths, &config, mode, skip_bundle, reporter)?;
    Ok(())
}

/// Build with an already loaded config and report the result.
pub(crate) fn run_build(
    paths: &ProjectPaths,
    config: &ProjectConfig,
    mode: BuildMode,
    skip_bundle: bool,
    reporter: &dyn Reporter,
) -> Result<SignedPackage> {
    let bundler = if skip_bundle {
        None
    } else {
        Some(ViteBundler::locate(paths).context(
            "Cannot run the bundler (use --skip-bundle to package existing output)",
        )?)
    };

    let package = build_package(
        paths,
        config,
        BuildOptions { mode, skip_bundle },
        bundler.as_ref().map(|b| b as &dyn Bundler),
        reporter,
    )?;

    let shown = package
        .path
        .strip_prefix(paths.root())
        .unwrap_or(&package.path);
    reporter.success(&format!(
        "{} ({})",
        shown.display(),
        format_size(package.size)
    ));
    reporter.info(&format!("Plugin ID: {}", package.plugin_id));
    Ok(package)
}
