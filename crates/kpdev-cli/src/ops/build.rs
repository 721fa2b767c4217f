//! Build pipeline: keys, bundle, assemble, sign.

use kpdev_core::Reporter;
use kpdev_core::assembler::{ArtifactAssembler, BundleOutputs};
use kpdev_core::bundler::Bundler;
use kpdev_core::config::{ConfigError, ProjectConfig};
use kpdev_core::keys::{ensure_keys, load_stage_key};
use kpdev_core::package::{SignedPackage, sign_directory};
use kpdev_core::paths::ProjectPaths;
use kpdev_schema::BuildMode;
use tracing::{debug, info};

use super::error::BuildError;

/// Options for one build.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuildOptions {
    pub mode: BuildMode,
    /// Package whatever the bundler last left in `dist/`.
    pub skip_bundle: bool,
}

/// Project config for a build. A project without `config.json` builds with
/// defaults (desktop only).
pub fn load_build_config(paths: &ProjectPaths) -> Result<ProjectConfig, BuildError> {
    match ProjectConfig::load_project(paths) {
        Ok(config) => Ok(config),
        Err(ConfigError::NotFound(path)) => {
            debug!(path = %path.display(), "no config file, using defaults");
            Ok(ProjectConfig::default())
        }
        Err(e) => Err(e.into()),
    }
}

/// Run one phase, closing it as done or failed.
fn phase<T, E, R: Reporter + ?Sized>(
    reporter: &R,
    title: &str,
    f: impl FnOnce() -> Result<T, E>,
) -> Result<T, E> {
    reporter.live_phase(title);
    match f() {
        Ok(value) => {
            reporter.live_phase_update("done", true);
            Ok(value)
        }
        Err(e) => {
            reporter.live_phase_update("failed", false);
            Err(e)
        }
    }
}

/// Build and sign a package into `dist/`.
///
/// `bundler` is skipped when `opts.skip_bundle` is set. The package is
/// signed with the key of the stage `opts.mode` maps to; on any error no
/// package file is left behind.
pub fn build_package<R: Reporter + ?Sized>(
    paths: &ProjectPaths,
    config: &ProjectConfig,
    opts: BuildOptions,
    bundler: Option<&dyn Bundler>,
    reporter: &R,
) -> Result<SignedPackage, BuildError> {
    reporter.section(&format!("Building {} package", opts.mode));

    let keys = phase(reporter, "Keys", || ensure_keys(paths))?;
    for key in keys.iter().filter(|k| k.created) {
        reporter.info(&format!("Generated {} key ({})", key.stage, key.plugin_id));
    }

    match bundler {
        Some(bundler) if !opts.skip_bundle => {
            phase(reporter, "Bundling", || bundler.bundle_all(opts.mode))?;
        }
        _ => debug!("bundling skipped"),
    }

    let dist = paths.dist_dir();
    let bundles = BundleOutputs::from_dist(&dist);
    let staged = phase(reporter, "Assembling", || {
        ArtifactAssembler::new(paths, config.targets, opts.mode).assemble(&bundles)
    })?;

    let out = dist.join(staged.output_name());
    let package = phase(reporter, "Signing", || -> Result<_, BuildError> {
        let key = load_stage_key(paths, opts.mode.stage())?;
        Ok(sign_directory(staged.path(), &key, &out)?)
    })?;

    info!(
        path = %package.path.display(),
        plugin_id = %package.plugin_id,
        entries = package.entries.len(),
        "package built"
    );
    Ok(package)
}
