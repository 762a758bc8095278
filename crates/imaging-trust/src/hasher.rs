//! Content hash of the install media
//!
//! The hash is SHA-256 over the raw file bytes, encoded as standard padded
//! base64. The signing service echoes this exact string back on success.

use crate::fs::FileSystem;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use sha2::{Digest, Sha256};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Bytes read per iteration while hashing (32 MiB)
pub const HASH_BLOCK_SIZE: usize = 32 * 1024 * 1024;

const HASH_BLOCK_LIMIT: u64 = HASH_BLOCK_SIZE as u64;

/// Errors raised while hashing a file
#[derive(Error, Debug)]
pub enum HashError {
    /// The file could not be opened or read
    #[error("failed to read {}: {source}", path.display())]
    Io {
        /// File being hashed
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },
}

/// Computes content hashes through a [`FileSystem`]
#[derive(Clone)]
pub struct ContentHasher {
    fs: Arc<dyn FileSystem>,
}

impl std::fmt::Debug for ContentHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentHasher").finish_non_exhaustive()
    }
}

impl ContentHasher {
    /// Create a hasher reading through `fs`
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self { fs }
    }

    /// Hash the file at `path`
    ///
    /// # Errors
    ///
    /// Returns [`HashError::Io`] if the file does not exist or cannot be read.
    pub fn hash(&self, path: &Path) -> Result<String, HashError> {
        let io_err = |source| HashError::Io {
            path: path.to_path_buf(),
            source,
        };

        let reader = self.fs.open(path).map_err(io_err)?;
        let digest = digest_reader(reader).map_err(io_err)?;
        let encoded = STANDARD.encode(digest);

        debug!(path = %path.display(), hash = %encoded, "Computed content hash");
        Ok(encoded)
    }

    /// Hash an in-memory buffer with the same encoding as [`ContentHasher::hash`]
    pub fn hash_bytes(data: &[u8]) -> String {
        STANDARD.encode(Sha256::digest(data))
    }
}

fn digest_reader(mut reader: impl Read) -> io::Result<sha2::digest::Output<Sha256>> {
    let mut hasher = Sha256::new();
    let mut block = Vec::new();

    while read_block(&mut reader, &mut block)? > 0 {
        hasher.update(&block);
    }

    Ok(hasher.finalize())
}

/// Replace `block` with the next (up to) [`HASH_BLOCK_SIZE`] bytes of `reader`
///
/// The buffer grows with the data actually read, so small files never pay
/// for a full block.
fn read_block(reader: &mut impl Read, block: &mut Vec<u8>) -> io::Result<usize> {
    block.clear();
    reader.by_ref().take(HASH_BLOCK_LIMIT).read_to_end(block)
}
