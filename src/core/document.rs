//! Document Hashing
//!
//! Whole-document integrity: a single SHA-256 over the raw PDF bytes.
//! Readers are consumed incrementally through a bounded buffer, and the
//! result is identical to hashing the full byte sequence at once.

use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;
use std::str::FromStr;

use sha2::{Digest, Sha256};
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::debug;

use crate::config::ConfigError;
use crate::core::hash::Hash;
use crate::error::{VerifyError, VerifyResult};

/// Default read buffer for streaming (64 KiB).
pub const DEFAULT_READ_BUFFER: usize = 64 * 1024;

/// What to do with a zero-length document.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EmptyDocumentPolicy {
    /// Hash zero bytes like any other input.
    #[default]
    HashEmpty,
    /// Fail with [`VerifyError::EmptyInput`].
    Reject,
}

impl FromStr for EmptyDocumentPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hash" | "allow" => Ok(Self::HashEmpty),
            "reject" => Ok(Self::Reject),
            other => Err(ConfigError::invalid("empty document policy", other)),
        }
    }
}

/// Streaming SHA-256 hasher for whole documents.
#[derive(Clone, Copy, Debug)]
pub struct DocumentHasher {
    buffer_size: usize,
    empty_policy: EmptyDocumentPolicy,
}

impl Default for DocumentHasher {
    fn default() -> Self {
        Self::new(DEFAULT_READ_BUFFER, EmptyDocumentPolicy::default())
    }
}

impl DocumentHasher {
    /// Create a hasher. A zero buffer size is bumped to one byte.
    pub fn new(buffer_size: usize, empty_policy: EmptyDocumentPolicy) -> Self {
        Self {
            buffer_size: buffer_size.max(1),
            empty_policy,
        }
    }

    /// Configured empty-input behavior.
    pub fn empty_policy(&self) -> EmptyDocumentPolicy {
        self.empty_policy
    }

    /// Hash an in-memory document.
    pub fn hash(&self, bytes: &[u8]) -> VerifyResult<Hash> {
        self.check_empty(bytes.len() as u64)?;
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        Ok(Hash::from_bytes(hasher.finalize().into()))
    }

    /// Hash everything a reader yields.
    pub fn hash_reader<R: Read>(&self, mut reader: R) -> VerifyResult<Hash> {
        let mut hasher = Sha256::new();
        let mut buf = vec![0u8; self.buffer_size];
        let mut total: u64 = 0;

        loop {
            let n = match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(VerifyError::Io(e)),
            };
            hasher.update(&buf[..n]);
            total += n as u64;
        }

        self.check_empty(total)?;
        debug!("Hashed {} document bytes", total);
        Ok(Hash::from_bytes(hasher.finalize().into()))
    }

    /// Hash a file on disk.
    pub fn hash_file(&self, path: impl AsRef<Path>) -> VerifyResult<Hash> {
        let file = File::open(path.as_ref())?;
        self.hash_reader(file)
    }

    /// Hash an async reader.
    ///
    /// Dropping the returned future (for example from `tokio::time::timeout`)
    /// cancels the read; nothing needs cleaning up beyond the reader itself.
    pub async fn hash_async_reader<R: AsyncRead + Unpin>(&self, mut reader: R) -> VerifyResult<Hash> {
        let mut hasher = Sha256::new();
        let mut buf = vec![0u8; self.buffer_size];
        let mut total: u64 = 0;

        loop {
            let n = reader.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
            total += n as u64;
        }

        self.check_empty(total)?;
        debug!("Hashed {} document bytes (async)", total);
        Ok(Hash::from_bytes(hasher.finalize().into()))
    }

    fn check_empty(&self, len: u64) -> VerifyResult<()> {
        if len == 0 && self.empty_policy == EmptyDocumentPolicy::Reject {
            return Err(VerifyError::EmptyInput);
        }
        Ok(())
    }
}
