//! File stores: where annotated table images end up.
//!
//! [`FileStore`] is the one capability the finder needs from storage. The
//! `info` argument is whatever context the caller threads through (a crawl
//! request, a job id, nothing at all); stores may use it, the finder never
//! looks at it.

use crate::error::CrawlError;
use md5::{Digest, Md5};
use std::collections::BTreeMap;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;
use tracing::debug;

/// Persists files under store-relative paths.
///
/// Writing the same path twice overwrites the earlier content.
pub trait FileStore<I: ?Sized = ()> {
    fn persist_file(&self, path: &str, content: &[u8], info: &I) -> Result<(), CrawlError>;
}

impl<I: ?Sized, S: FileStore<I> + ?Sized> FileStore<I> for Arc<S> {
    fn persist_file(&self, path: &str, content: &[u8], info: &I) -> Result<(), CrawlError> {
        (**self).persist_file(path, content, info)
    }
}

// ── Filesystem ───────────────────────────────────────────────────────────

/// Modification time and checksum of a stored file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStat {
    pub last_modified: SystemTime,
    /// MD5 hex digest of the file's bytes.
    pub checksum: String,
}

/// Stores files under a base directory on local disk.
///
/// A `file://` prefix on the base directory is accepted and stripped.
#[derive(Debug, Clone)]
pub struct FsFilesStore {
    basedir: PathBuf,
}

impl FsFilesStore {
    pub fn new(basedir: impl Into<PathBuf>) -> Self {
        let basedir = basedir.into();
        let basedir = match basedir.to_str().and_then(|s| s.strip_prefix("file://")) {
            Some(rest) => PathBuf::from(rest),
            None => basedir,
        };
        Self { basedir }
    }

    pub fn basedir(&self) -> &Path {
        &self.basedir
    }

    /// Absolute-or-relative location of a store path on disk.
    pub fn full_path(&self, path: &str) -> PathBuf {
        self.basedir.join(path)
    }

    /// Stat a stored file; `None` when it does not exist.
    pub fn stat_file(&self, path: &str) -> Result<Option<FileStat>, CrawlError> {
        let full = self.full_path(path);
        let read_err = |source| CrawlError::StoreReadFailed {
            path: full.clone(),
            source,
        };

        let metadata = match fs::metadata(&full) {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(read_err(e)),
        };
        let last_modified = metadata.modified().map_err(read_err)?;

        let mut file = fs::File::open(&full).map_err(read_err)?;
        let mut hasher = Md5::new();
        let mut buf = [0u8; 8192];
        loop {
            let n = file.read(&mut buf).map_err(read_err)?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }

        Ok(Some(FileStat {
            last_modified,
            checksum: format!("{:x}", hasher.finalize()),
        }))
    }
}

impl<I: ?Sized> FileStore<I> for FsFilesStore {
    fn persist_file(&self, path: &str, content: &[u8], _info: &I) -> Result<(), CrawlError> {
        let full = self.full_path(path);
        let write_err = |source| CrawlError::StoreWriteFailed {
            path: full.clone(),
            source,
        };
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        fs::write(&full, content).map_err(write_err)?;
        debug!("Stored {} bytes at {}", content.len(), full.display());
        Ok(())
    }
}

// ── In-memory ────────────────────────────────────────────────────────────

/// Keeps stored files in memory; handy for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    files: Mutex<BTreeMap<String, Vec<u8>>>,
    writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Content stored at `path`, if any.
    pub fn get(&self, path: &str) -> Option<Vec<u8>> {
        self.files.lock().ok()?.get(path).cloned()
    }

    /// Stored paths in lexical order.
    pub fn paths(&self) -> Vec<String> {
        self.files
            .lock()
            .map(|files| files.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of distinct paths stored.
    pub fn len(&self) -> usize {
        self.files.lock().map(|files| files.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of `persist_file` calls, counting overwrites.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl<I: ?Sized> FileStore<I> for MemoryStore {
    fn persist_file(&self, path: &str, content: &[u8], _info: &I) -> Result<(), CrawlError> {
        let mut files = self
            .files
            .lock()
            .map_err(|_| CrawlError::Internal("memory store lock poisoned".into()))?;
        files.insert(path.to_string(), content.to_vec());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
