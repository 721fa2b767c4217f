//! Errors for the build pipeline

use kpdev_core::assembler::AssembleError;
use kpdev_core::bundler::BundleError;
use kpdev_core::config::ConfigError;
use kpdev_core::keys::KeyError;
use kpdev_core::package::PackageError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("Key error: {0}")]
    Key(#[from] KeyError),

    #[error("Bundling failed: {0}")]
    Bundle(#[from] BundleError),

    #[error("Assembly failed: {0}")]
    Assemble(#[from] AssembleError),

    #[error("Packaging failed: {0}")]
    Package(#[from] PackageError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}
