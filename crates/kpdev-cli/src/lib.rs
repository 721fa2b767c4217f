//! kpdev - kintone plugin packaging and deployment
#![allow(missing_docs)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_panics_doc)]
//!
//! Builds a signed plugin package from bundler output and pushes it to one
//! or more kintone environments.
//!
//! # Project Layout
//!
//! ```text
//! <project>/
//! ├── .kpdev/
//! │   ├── config.json     # environments, targets, deploy settings
//! │   ├── manifest.json   # source manifest
//! │   ├── vite.config.ts  # bundler config
//! │   └── keys/           # private.dev.ppk, private.prod.ppk
//! ├── src/config/index.html
//! ├── icon.png
//! └── dist/               # bundler output and signed packages
//! ```

pub mod cmd;
pub mod ops;
pub mod ui;

pub use kpdev_core::USER_AGENT;
pub use kpdev_core::paths::ProjectPaths;

use clap::{Parser, Subcommand};
use kpdev_schema::BuildMode;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "kpdev")]
#[command(author, version, about = "kpdev - build, sign and deploy kintone plugins")]
pub struct Cli {
    /// Project root (the directory containing `.kpdev/`)
    #[arg(
        long,
        short = 'C',
        global = true,
        env = "KPDEV_PROJECT_DIR",
        default_value = "."
    )]
    pub project_dir: PathBuf,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Bundle, assemble and sign a plugin package
    Build {
        /// Build mode: prod (minified, production key) or pre (readable, dev key)
        #[arg(long, default_value = "prod")]
        mode: BuildMode,
        /// Use the existing bundler output in dist/ instead of running the bundler
        #[arg(long)]
        skip_bundle: bool,
    },
    /// Upload and install a package on configured environments
    Deploy {
        /// Package to deploy (default: newest dist/*.zip, building if none)
        #[arg(long, conflicts_with = "build")]
        file: Option<PathBuf>,
        /// Build a fresh package even if dist/ already has one
        #[arg(long)]
        build: bool,
        /// Build mode used when a build is needed
        #[arg(long, default_value = "prod")]
        mode: BuildMode,
        /// Use the existing bundler output when a build is needed
        #[arg(long)]
        skip_bundle: bool,
        /// Production environment(s) to deploy to (default: all)
        #[arg(long = "target", short = 't', conflicts_with = "dev")]
        targets: Vec<String>,
        /// Deploy to the development environment instead of production
        #[arg(long)]
        dev: bool,
        /// Deploy to all environments at once
        #[arg(long)]
        parallel: bool,
        /// Confirm the plugin is listed on each environment afterwards
        #[arg(long)]
        check: bool,
    },
    /// Create missing signing keys and show plugin IDs
    Keys,
    /// Verify a signed package offline
    Verify {
        /// Package file
        path: PathBuf,
    },
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
}
