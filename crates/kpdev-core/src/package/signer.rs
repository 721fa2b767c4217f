//! Package Signing Typestate Pattern
//!
//! Signing runs as a fixed sequence of state transitions:
//!
//! ```text
//! StagedArtifact --[archive()]--> ContentsArchived --[digest()]--> Digested
//!     --[sign()]--> SignedContents --[write()]--> SignedPackage
//! ```
//!
//! Each state owns the bytes produced so far, so a signature can only be
//! computed over the exact `contents.zip` that ends up in the package.
//!
//! # Usage
//!
//! ```ignore
//! let package = StagedArtifact::scan(&staging_dir)?
//!     .archive()?
//!     .digest()
//!     .sign(&key)?
//!     .write(&out_path)?;
//! ```

use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use kpdev_schema::{CONTENTS_ENTRY, PUBKEY_ENTRY, PluginId, SIGNATURE_ENTRY};
use rsa::Pkcs1v15Sign;
use sha1::{Digest, Sha1};
use tracing::{debug, info};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::PackageError;
use super::listing::ArtifactListing;
use crate::keys::KeyPair;

/// Entry options shared by both archive levels.
///
/// Timestamps and permissions are pinned so identical inputs give identical
/// bytes.
fn entry_options() -> SimpleFileOptions {
    SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(zip::DateTime::default())
        .unix_permissions(0o644)
}

/// State 1: an artifact directory whose file list has been taken.
///
/// # Transitions
///
/// - [`archive()`](Self::archive) -> [`ContentsArchived`]
#[derive(Debug)]
pub struct StagedArtifact {
    listing: ArtifactListing,
}

/// State 2: the artifact directory zipped into `contents.zip` bytes.
///
/// # Transitions
///
/// - [`digest()`](Self::digest) -> [`Digested`]
#[derive(Debug)]
pub struct ContentsArchived {
    entries: Vec<String>,
    contents: Vec<u8>,
}

/// State 3: `contents.zip` with its SHA-1 digest.
///
/// # Transitions
///
/// - [`sign()`](Self::sign) -> [`SignedContents`]
#[derive(Debug)]
pub struct Digested {
    entries: Vec<String>,
    contents: Vec<u8>,
    digest: [u8; 20],
}

/// State 4: contents, public key and signature, ready to be written.
///
/// # Transitions
///
/// - [`write()`](Self::write) -> [`SignedPackage`]
#[derive(Debug)]
pub struct SignedContents {
    entries: Vec<String>,
    contents: Vec<u8>,
    public_key_der: Vec<u8>,
    signature: Vec<u8>,
    plugin_id: PluginId,
}

/// Final state: a package file on disk.
#[derive(Debug, Clone)]
pub struct SignedPackage {
    /// Where the package was written.
    pub path: PathBuf,
    /// Identity of the signing key.
    pub plugin_id: PluginId,
    /// Entry names inside `contents.zip`, in archive order.
    pub entries: Vec<String>,
    /// Size of the package file in bytes.
    pub size: u64,
}

impl StagedArtifact {
    /// List the files under `dir`.
    ///
    /// # Errors
    ///
    /// Returns [`PackageError::EmptyDirectory`] if `dir` holds no files, or
    /// any traversal error.
    pub fn scan(dir: &Path) -> Result<Self, PackageError> {
        let listing = ArtifactListing::scan(dir)?;
        if listing.is_empty() {
            return Err(PackageError::EmptyDirectory(dir.to_path_buf()));
        }
        Ok(Self { listing })
    }

    /// Zip every listed file, in listing order, into an in-memory archive.
    pub fn archive(self) -> Result<ContentsArchived, PackageError> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = entry_options();

        for entry in self.listing.entries() {
            let mut file =
                std::fs::File::open(&entry.path).map_err(|source| PackageError::ArchiveIo {
                    path: entry.path.clone(),
                    source,
                })?;
            zip.start_file(entry.name.as_str(), options)?;
            std::io::copy(&mut file, &mut zip).map_err(|source| PackageError::ArchiveIo {
                path: entry.path.clone(),
                source,
            })?;
        }

        let contents = zip.finish()?.into_inner();
        let entries: Vec<String> = self.listing.names().map(str::to_owned).collect();
        debug!(
            root = %self.listing.root().display(),
            files = entries.len(),
            bytes = contents.len(),
            "contents archived"
        );

        Ok(ContentsArchived { entries, contents })
    }
}

impl ContentsArchived {
    /// Raw `contents.zip` bytes.
    pub fn contents(&self) -> &[u8] {
        &self.contents
    }

    /// Hash `contents.zip` with SHA-1.
    pub fn digest(self) -> Digested {
        let digest: [u8; 20] = Sha1::digest(&self.contents).into();
        Digested {
            entries: self.entries,
            contents: self.contents,
            digest,
        }
    }
}

impl Digested {
    /// Hex form of the SHA-1 digest.
    pub fn digest_hex(&self) -> String {
        hex::encode(self.digest)
    }

    /// Sign the digest with `key` using RSA PKCS#1 v1.5.
    ///
    /// # Errors
    ///
    /// Returns [`PackageError::Signing`] if the RSA operation fails and
    /// [`PackageError::Key`] if the public key cannot be encoded.
    pub fn sign(self, key: &KeyPair) -> Result<SignedContents, PackageError> {
        let signature = key
            .private_key()
            .sign(Pkcs1v15Sign::new::<Sha1>(), &self.digest)
            .map_err(|e| PackageError::Signing(e.to_string()))?;
        let public_key_der = key.public_key_der()?;
        let plugin_id = PluginId::from_spki_der(&public_key_der);

        Ok(SignedContents {
            entries: self.entries,
            contents: self.contents,
            public_key_der,
            signature,
            plugin_id,
        })
    }
}

impl SignedContents {
    /// Identity of the signing key.
    pub fn plugin_id(&self) -> &PluginId {
        &self.plugin_id
    }

    /// Build the outer three-entry archive in memory.
    pub fn to_bytes(&self) -> Result<Vec<u8>, PackageError> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = entry_options();

        for (name, data) in [
            (CONTENTS_ENTRY, self.contents.as_slice()),
            (PUBKEY_ENTRY, self.public_key_der.as_slice()),
            (SIGNATURE_ENTRY, self.signature.as_slice()),
        ] {
            zip.start_file(name, options)?;
            zip.write_all(data)
                .map_err(|e| PackageError::Archive(e.into()))?;
        }

        Ok(zip.finish()?.into_inner())
    }

    /// Write the package to `out`.
    ///
    /// The archive is written to a temporary file beside `out` and renamed
    /// into place, so `out` is either the complete package or untouched.
    pub fn write(self, out: &Path) -> Result<SignedPackage, PackageError> {
        let bytes = self.to_bytes()?;
        write_atomic(out, &bytes)?;

        info!(
            path = %out.display(),
            plugin_id = %self.plugin_id,
            bytes = bytes.len(),
            "package written"
        );

        Ok(SignedPackage {
            path: out.to_path_buf(),
            plugin_id: self.plugin_id,
            entries: self.entries,
            size: bytes.len() as u64,
        })
    }
}

/// Sign the artifact directory `dir` with `key` and write the package to
/// `out`.
///
/// # Errors
///
/// Returns any [`PackageError`] raised along the way; on error no file is
/// left at `out`.
pub fn sign_directory(dir: &Path, key: &KeyPair, out: &Path) -> Result<SignedPackage, PackageError> {
    StagedArtifact::scan(dir)?
        .archive()?
        .digest()
        .sign(key)?
        .write(out)
}

fn write_atomic(out: &Path, bytes: &[u8]) -> Result<(), PackageError> {
    let parent = out
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let io_err = |source| PackageError::ArchiveIo {
        path: out.to_path_buf(),
        source,
    };

    std::fs::create_dir_all(parent).map_err(io_err)?;

    let mut tmp = tempfile::Builder::new()
        .prefix(".kpdev-")
        .suffix(".zip.tmp")
        .tempfile_in(parent)
        .map_err(io_err)?;
    tmp.write_all(bytes).map_err(io_err)?;
    tmp.as_file().sync_all().map_err(io_err)?;
    tmp.persist(out).map_err(|e| io_err(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::verify::verify_package;
    use kpdev_schema::KEY_BITS;
    use std::io::Read;
    use std::sync::OnceLock;
    use tempfile::TempDir;

    fn test_key() -> &'static KeyPair {
        static KEY: OnceLock<KeyPair> = OnceLock::new();
        KEY.get_or_init(|| KeyPair::generate(KEY_BITS).unwrap())
    }

    fn artifact_dir() -> TempDir {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        std::fs::write(root.join("manifest.json"), r#"{"version":"1.0.0"}"#).unwrap();
        std::fs::create_dir_all(root.join("js")).unwrap();
        std::fs::write(root.join("js/desktop.js"), "console.log(1)").unwrap();
        std::fs::write(root.join("icon.png"), [137u8, 80, 78, 71]).unwrap();
        dir
    }

    fn zip_names(bytes: &[u8]) -> Vec<String> {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect()
    }

    #[test]
    fn test_package_has_three_entries_in_order() {
        let src = artifact_dir();
        let out = TempDir::new().unwrap();
        let path = out.path().join("plugin.zip");

        let pkg = sign_directory(src.path(), test_key(), &path).unwrap();
        let bytes = std::fs::read(&path).unwrap();

        assert_eq!(zip_names(&bytes), vec!["contents.zip", "PUBKEY", "SIGNATURE"]);
        assert_eq!(pkg.size, bytes.len() as u64);
        assert_eq!(pkg.plugin_id, test_key().plugin_id().unwrap());
    }

    #[test]
    fn test_contents_entries_are_sorted() {
        let src = artifact_dir();
        let out = TempDir::new().unwrap();
        let path = out.path().join("plugin.zip");
        sign_directory(src.path(), test_key(), &path).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        let mut outer = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut inner = Vec::new();
        outer
            .by_name(CONTENTS_ENTRY)
            .unwrap()
            .read_to_end(&mut inner)
            .unwrap();

        assert_eq!(
            zip_names(&inner),
            vec!["icon.png", "js/desktop.js", "manifest.json"]
        );
    }

    #[test]
    fn test_signing_is_reproducible() {
        let src = artifact_dir();
        let out = TempDir::new().unwrap();
        let a = out.path().join("a.zip");
        let b = out.path().join("b.zip");

        sign_directory(src.path(), test_key(), &a).unwrap();
        sign_directory(src.path(), test_key(), &b).unwrap();

        assert_eq!(std::fs::read(a).unwrap(), std::fs::read(b).unwrap());
    }

    #[test]
    fn test_signed_package_verifies() {
        let src = artifact_dir();
        let out = TempDir::new().unwrap();
        let path = out.path().join("plugin.zip");
        let pkg = sign_directory(src.path(), test_key(), &path).unwrap();

        let verified = verify_package(&path).unwrap();
        assert_eq!(verified.plugin_id, pkg.plugin_id);
        assert_eq!(verified.contents_entries, pkg.entries);
    }

    #[test]
    fn test_empty_directory_is_rejected_without_output() {
        let src = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let path = out.path().join("plugin.zip");

        let err = sign_directory(src.path(), test_key(), &path).unwrap_err();
        assert!(matches!(err, PackageError::EmptyDirectory(_)));
        assert!(!path.exists());
    }

    #[test]
    fn test_failed_write_leaves_no_partial_file() {
        let src = artifact_dir();
        let out = TempDir::new().unwrap();
        // A directory at the output path makes the final rename fail.
        let path = out.path().join("plugin.zip");
        std::fs::create_dir(&path).unwrap();

        let err = sign_directory(src.path(), test_key(), &path).unwrap_err();
        assert!(matches!(err, PackageError::ArchiveIo { .. }));

        let leftovers: Vec<_> = std::fs::read_dir(out.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(leftovers, vec!["plugin.zip"]);
        assert!(path.is_dir());
    }

    #[test]
    fn test_digest_matches_contents() {
        let src = artifact_dir();
        let archived = StagedArtifact::scan(src.path()).unwrap().archive().unwrap();
        let expected = hex::encode(Sha1::digest(archived.contents()));
        assert_eq!(archived.digest().digest_hex(), expected);
    }
}
