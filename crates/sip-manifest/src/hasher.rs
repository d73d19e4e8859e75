//! Hashing collaborator
//!
//! Manifests are normally produced by an external hashing tool. The
//! [`FileHasher`] seam lets the updater and verifier ask for a digest of a
//! single file; [`StreamingHasher`] is the reference implementation.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use md5::Md5;
use sha1::Sha1;
use sha2::{Digest as _, Sha256, Sha512};

use crate::algorithm::DigestAlgorithm;
use crate::digest::Digest;
use crate::error::ManifestError;

/// Computes the digest of a file's current bytes
pub trait FileHasher {
    /// # Errors
    /// Returns error if the file cannot be read
    fn digest_file(&self, path: &Path, algorithm: DigestAlgorithm) -> Result<Digest, ManifestError>;
}

/// Buffered, streaming hasher over the RustCrypto digests
#[derive(Debug, Clone, Copy)]
pub struct StreamingHasher {
    buffer_size: usize,
}

impl StreamingHasher {
    pub const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;

    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size.max(1);
        self
    }

    fn stream<D: sha2::Digest>(&self, path: &Path) -> Result<Vec<u8>, ManifestError> {
        let file = File::open(path).map_err(ManifestError::io(path))?;
        let mut reader = BufReader::with_capacity(self.buffer_size, file);
        let mut hasher = D::new();
        let mut buffer = vec![0u8; self.buffer_size];
        loop {
            let read = reader.read(&mut buffer).map_err(ManifestError::io(path))?;
            if read == 0 {
                break;
            }
            hasher.update(&buffer[..read]);
        }
        Ok(hasher.finalize().to_vec())
    }
}

impl Default for StreamingHasher {
    fn default() -> Self {
        Self {
            buffer_size: Self::DEFAULT_BUFFER_SIZE,
        }
    }
}

impl FileHasher for StreamingHasher {
    fn digest_file(&self, path: &Path, algorithm: DigestAlgorithm) -> Result<Digest, ManifestError> {
        let bytes = match algorithm {
            DigestAlgorithm::Md5 => self.stream::<Md5>(path)?,
            DigestAlgorithm::Sha1 => self.stream::<Sha1>(path)?,
            DigestAlgorithm::Sha256 => self.stream::<Sha256>(path)?,
            DigestAlgorithm::Sha512 => self.stream::<Sha512>(path)?,
        };
        Digest::from_bytes(algorithm, &bytes).map_err(|source| ManifestError::Parse {
            path: path.to_path_buf(),
            line: 0,
            source,
        })
    }
}

impl<H: FileHasher + ?Sized> FileHasher for &H {
    fn digest_file(&self, path: &Path, algorithm: DigestAlgorithm) -> Result<Digest, ManifestError> {
        (**self).digest_file(path, algorithm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_digests_of_empty_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("empty");
        std::fs::write(&path, b"").unwrap();
        let hasher = StreamingHasher::new();

        assert_eq!(
            hasher.digest_file(&path, DigestAlgorithm::Md5).unwrap().as_str(),
            "d41d8cd98f00b204e9800998ecf8427e"
        );
        assert_eq!(
            hasher.digest_file(&path, DigestAlgorithm::Sha256).unwrap().as_str(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(
            hasher.digest_file(&path, DigestAlgorithm::Sha512).unwrap().as_str().len(),
            128
        );
    }

    #[test]
    fn small_buffer_matches_default() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("data");
        std::fs::write(&path, vec![7u8; 10_000]).unwrap();

        let a = StreamingHasher::new().digest_file(&path, DigestAlgorithm::Sha1).unwrap();
        let b = StreamingHasher::new()
            .with_buffer_size(3)
            .digest_file(&path, DigestAlgorithm::Sha1)
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn missing_file_is_io_error() {
        let result = StreamingHasher::new().digest_file(Path::new("/definitely/not/here"), DigestAlgorithm::Md5);
        assert!(matches!(result, Err(ManifestError::Io { .. })));
    }
}
