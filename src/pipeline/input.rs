//! Input resolution: normalise a [`PdfSource`] to a local file pdfium can open.
//!
//! ## Why a scratch file?
//!
//! The PDF engine opens documents by path. Downloaded, streamed and
//! in-memory PDFs are therefore written to a `NamedTempFile` that lives
//! exactly as long as the [`ResolvedInput`] holding it, so the scratch copy
//! is deleted when the scan returns whether it succeeded or not. The PDF
//! magic bytes (`%PDF`) are checked before anything reaches pdfium so a
//! wrong file yields [`CrawlError::NotAPdf`] instead of an engine error.

use crate::error::CrawlError;
use std::fmt;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::NamedTempFile;
use tracing::{debug, info};

const PDF_MAGIC: &[u8; 4] = b"%PDF";

/// Where a PDF comes from.
pub enum PdfSource {
    /// A file on local disk.
    Path(PathBuf),
    /// An `http://` or `https://` URL, downloaded before scanning.
    Url(String),
    /// The whole document in memory.
    Bytes(Vec<u8>),
    /// An already-open stream, read to the end before scanning.
    Reader(Box<dyn Read + Send>),
}

impl PdfSource {
    /// Wrap any readable stream.
    pub fn reader(r: impl Read + Send + 'static) -> Self {
        PdfSource::Reader(Box::new(r))
    }

    /// Short human-readable description for logs.
    pub fn describe(&self) -> String {
        match self {
            PdfSource::Path(p) => p.display().to_string(),
            PdfSource::Url(u) => u.clone(),
            PdfSource::Bytes(b) => format!("<{} bytes in memory>", b.len()),
            PdfSource::Reader(_) => "<stream>".to_string(),
        }
    }
}

impl fmt::Debug for PdfSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PdfSource({})", self.describe())
    }
}

/// Strings are classified: URLs become [`PdfSource::Url`], anything else a path.
impl From<&str> for PdfSource {
    fn from(s: &str) -> Self {
        if is_url(s) {
            PdfSource::Url(s.to_string())
        } else {
            PdfSource::Path(PathBuf::from(s))
        }
    }
}

impl From<String> for PdfSource {
    fn from(s: String) -> Self {
        PdfSource::from(s.as_str())
    }
}

impl From<PathBuf> for PdfSource {
    fn from(p: PathBuf) -> Self {
        PdfSource::Path(p)
    }
}

impl From<&Path> for PdfSource {
    fn from(p: &Path) -> Self {
        PdfSource::Path(p.to_path_buf())
    }
}

impl From<Vec<u8>> for PdfSource {
    fn from(b: Vec<u8>) -> Self {
        PdfSource::Bytes(b)
    }
}

/// The resolved input: either a local path or a scratch copy.
#[derive(Debug)]
pub enum ResolvedInput {
    /// Input was already a local file.
    Local(PathBuf),
    /// Input was downloaded, streamed or in memory; the temp file is removed on drop.
    Scratch(NamedTempFile),
}

impl ResolvedInput {
    /// Get the path to the PDF file regardless of how it was resolved.
    pub fn path(&self) -> &Path {
        match self {
            ResolvedInput::Local(p) => p,
            ResolvedInput::Scratch(file) => file.path(),
        }
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve `source` to a local PDF file path.
pub fn resolve_input(source: PdfSource, timeout_secs: u64) -> Result<ResolvedInput, CrawlError> {
    let origin = source.describe();
    match source {
        PdfSource::Path(path) => resolve_local(path),
        PdfSource::Url(url) => download_url(&url, timeout_secs),
        PdfSource::Bytes(bytes) => write_scratch(&bytes, &origin),
        PdfSource::Reader(mut reader) => {
            let mut bytes = Vec::new();
            reader
                .read_to_end(&mut bytes)
                .map_err(|e| CrawlError::Internal(format!("Failed to read PDF stream: {}", e)))?;
            write_scratch(&bytes, &origin)
        }
    }
}

/// Resolve a local file path, validating existence and PDF magic bytes.
fn resolve_local(path: PathBuf) -> Result<ResolvedInput, CrawlError> {
    let as_str = path.to_string_lossy();
    if as_str.is_empty() || as_str.contains("://") {
        return Err(CrawlError::InvalidInput {
            input: as_str.into_owned(),
        });
    }

    if !path.exists() {
        return Err(CrawlError::FileNotFound { path });
    }

    match std::fs::File::open(&path) {
        Ok(mut f) => {
            let mut magic = [0u8; 4];
            if f.read_exact(&mut magic).is_ok() && &magic != PDF_MAGIC {
                return Err(CrawlError::NotAPdf { path, magic });
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(CrawlError::PermissionDenied { path });
        }
        Err(_) => {
            return Err(CrawlError::FileNotFound { path });
        }
    }

    debug!("Resolved local PDF: {}", path.display());
    Ok(ResolvedInput::Local(path))
}

/// Download a URL into a scratch file and return it.
fn download_url(url: &str, timeout_secs: u64) -> Result<ResolvedInput, CrawlError> {
    info!("Downloading PDF from: {}", url);

    let client = reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| CrawlError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let map_err = |e: reqwest::Error| {
        if e.is_timeout() {
            CrawlError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            CrawlError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    };

    let response = client.get(url).send().map_err(map_err)?;

    if !response.status().is_success() {
        return Err(CrawlError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response.bytes().map_err(map_err)?;
    let resolved = write_scratch(&bytes, url)?;
    info!("Downloaded {} bytes to: {}", bytes.len(), resolved.path().display());
    Ok(resolved)
}

/// Validate `bytes` and write them to a `.pdf` temp file.
///
/// `origin` names the input in errors; nothing touches disk for non-PDFs.
fn write_scratch(bytes: &[u8], origin: &str) -> Result<ResolvedInput, CrawlError> {
    if !bytes.starts_with(PDF_MAGIC) {
        let mut magic = [0u8; 4];
        let n = bytes.len().min(4);
        magic[..n].copy_from_slice(&bytes[..n]);
        return Err(CrawlError::NotAPdf {
            path: PathBuf::from(origin),
            magic,
        });
    }

    let mut file = tempfile::Builder::new()
        .prefix("esd-crawl-")
        .suffix(".pdf")
        .tempfile()
        .map_err(|e| CrawlError::Internal(format!("Failed to create temp file: {}", e)))?;

    file.write_all(bytes)
        .and_then(|()| file.flush())
        .map_err(|e| CrawlError::Internal(format!("Failed to write temp file: {}", e)))?;

    debug!("Wrote {} bytes to scratch file {}", bytes.len(), file.path().display());
    Ok(ResolvedInput::Scratch(file))
}
