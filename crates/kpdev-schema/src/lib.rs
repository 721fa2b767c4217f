//! Shared types and wire formats for kpdev.
//!
//! Everything in here is pure data: no filesystem, no network. The plugin
//! identity derivation lives here because it is part of the platform's wire
//! contract, not of key storage.

pub mod manifest;
pub mod plugin_id;
pub mod types;

// Re-exports
pub use manifest::{ManifestError, PluginManifest, REQUIRED_PARAMS_KEY};
pub use plugin_id::{PluginId, PluginIdError};
pub use types::*;

/// Inner archive entry name inside a signed package.
pub const CONTENTS_ENTRY: &str = "contents.zip";

/// Public key entry name inside a signed package.
pub const PUBKEY_ENTRY: &str = "PUBKEY";

/// Signature entry name inside a signed package.
pub const SIGNATURE_ENTRY: &str = "SIGNATURE";

/// RSA modulus size mandated by the platform.
pub const KEY_BITS: usize = 1024;
