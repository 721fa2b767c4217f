//! Offline verification of a signed package.

use std::io::{Cursor, Read};
use std::path::Path;

use kpdev_schema::{CONTENTS_ENTRY, PUBKEY_ENTRY, PluginId, SIGNATURE_ENTRY};
use rsa::pkcs8::DecodePublicKey;
use rsa::{Pkcs1v15Sign, RsaPublicKey};
use sha1::{Digest, Sha1};
use zip::ZipArchive;

use super::PackageError;

/// Upper bound on buffer preallocation from a header's declared size.
const MAX_PREALLOC: u64 = 1 << 20;

/// The three raw entries of a package.
#[derive(Debug, Clone)]
pub struct PackageEntries {
    pub contents: Vec<u8>,
    pub public_key_der: Vec<u8>,
    pub signature: Vec<u8>,
}

/// Result of a successful verification.
#[derive(Debug, Clone)]
pub struct VerifiedPackage {
    /// Identity derived from the embedded public key.
    pub plugin_id: PluginId,
    /// Entry names inside `contents.zip`, in archive order.
    pub contents_entries: Vec<String>,
    /// Hex SHA-1 of `contents.zip`.
    pub contents_sha1: String,
}

impl PackageEntries {
    /// Split a package archive into its entries.
    ///
    /// Any entry other than the three known ones is rejected.
    pub fn read(bytes: &[u8]) -> Result<Self, PackageError> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))?;

        let mut contents = None;
        let mut public_key_der = None;
        let mut signature = None;

        for i in 0..archive.len() {
            let mut file = archive.by_index(i)?;
            let slot = match file.name() {
                CONTENTS_ENTRY => &mut contents,
                PUBKEY_ENTRY => &mut public_key_der,
                SIGNATURE_ENTRY => &mut signature,
                other => return Err(PackageError::UnexpectedEntry(other.to_string())),
            };
            let mut buf = Vec::with_capacity(read_capacity(file.size()));
            file.read_to_end(&mut buf)
                .map_err(|e| PackageError::Archive(e.into()))?;
            *slot = Some(buf);
        }

        Ok(Self {
            contents: contents.ok_or(PackageError::MissingEntry(CONTENTS_ENTRY))?,
            public_key_der: public_key_der.ok_or(PackageError::MissingEntry(PUBKEY_ENTRY))?,
            signature: signature.ok_or(PackageError::MissingEntry(SIGNATURE_ENTRY))?,
        })
    }

    /// Check the signature against the contents and embedded key.
    pub fn verify(&self) -> Result<PluginId, PackageError> {
        let public = RsaPublicKey::from_public_key_der(&self.public_key_der)
            .map_err(|e| PackageError::InvalidPublicKey(e.to_string()))?;
        let digest = Sha1::digest(&self.contents);

        public
            .verify(Pkcs1v15Sign::new::<Sha1>(), &digest, &self.signature)
            .map_err(|_| PackageError::BadSignature)?;

        Ok(PluginId::from_spki_der(&self.public_key_der))
    }
}

/// Initial buffer size for an entry whose header claims `declared` bytes.
fn read_capacity(declared: u64) -> usize {
    declared.min(MAX_PREALLOC) as usize
}

/// Verify package bytes.
pub fn verify_bytes(bytes: &[u8]) -> Result<VerifiedPackage, PackageError> {
    let entries = PackageEntries::read(bytes)?;
    let plugin_id = entries.verify()?;

    let mut inner = ZipArchive::new(Cursor::new(entries.contents.as_slice()))?;
    let contents_entries = (0..inner.len())
        .map(|i| inner.by_index(i).map(|f| f.name().to_string()))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(VerifiedPackage {
        plugin_id,
        contents_entries,
        contents_sha1: hex::encode(Sha1::digest(&entries.contents)),
    })
}

/// Verify the package at `path`.
pub fn verify_package(path: &Path) -> Result<VerifiedPackage, PackageError> {
    let bytes = std::fs::read(path).map_err(|source| PackageError::ArchiveIo {
        path: path.to_path_buf(),
        source,
    })?;
    verify_bytes(&bytes)
}
