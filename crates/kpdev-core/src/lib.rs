//! kpdev Core Library
//!
//! Shared logic for building, signing and deploying kintone plugin packages.
//!
//! # Architecture
//!
//! - **Pure Core**: Manifest shaping, plugin identity and package layout are
//!   deterministic functions of their inputs. The same staged directory and
//!   key always produce byte-identical packages.
//!
//! - **Typestate Signing**: [`package::signer`] models signing as
//!   `StagedArtifact → ContentsArchived → Digested → SignedContents →
//!   SignedPackage`, so a signature can only be computed over the archive
//!   that ends up in the package.
//!
//! - **Failure Isolation**: [`io::deploy`] records failures per target and
//!   always completes the batch.
//!
//! - **Reporter Injection**: Progress goes through the [`Reporter`] trait;
//!   this crate never writes to the terminal.

pub mod assembler;
pub mod bundler;
pub mod config;
pub mod icon;
pub mod io;
pub mod keys;
pub mod package;
pub mod paths;
pub mod reporter;

pub use reporter::{NullReporter, Reporter};

/// User agent sent with every HTTP request.
pub const USER_AGENT: &str = concat!("kpdev/", env!("CARGO_PKG_VERSION"));
