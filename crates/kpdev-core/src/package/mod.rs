//! Signed plugin packages.
//!
//! A package is a ZIP holding exactly three entries:
//!
//! | entry          | content                                            |
//! |----------------|----------------------------------------------------|
//! | `contents.zip` | the artifact directory, zipped in sorted order     |
//! | `PUBKEY`       | DER SubjectPublicKeyInfo of the signing key        |
//! | `SIGNATURE`    | RSA PKCS#1 v1.5 over SHA-1 of `contents.zip`       |

pub mod listing;
pub mod signer;
pub mod verify;

use std::path::PathBuf;

use thiserror::Error;

use crate::keys::KeyError;

pub use listing::{ArtifactListing, ListingEntry};
pub use signer::{
    ContentsArchived, Digested, SignedContents, SignedPackage, StagedArtifact, sign_directory,
};
pub use verify::{PackageEntries, VerifiedPackage, verify_bytes, verify_package};

#[derive(Error, Debug)]
pub enum PackageError {
    #[error("Archive IO error on {}: {source}", path.display())]
    ArchiveIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("Path cannot be stored in an archive: {}", .0.display())]
    NonUtf8Path(PathBuf),

    #[error("Artifact directory is empty: {}", .0.display())]
    EmptyDirectory(PathBuf),

    #[error("Signing failed: {0}")]
    Signing(String),

    #[error(transparent)]
    Key(#[from] KeyError),

    #[error("Package is missing entry '{0}'")]
    MissingEntry(&'static str),

    #[error("Package has unexpected entry '{0}'")]
    UnexpectedEntry(String),

    #[error("Package public key is invalid: {0}")]
    InvalidPublicKey(String),

    #[error("Package signature does not match its contents")]
    BadSignature,
}
