//! Error types for the esd-crawl library.
//!
//! Every operation in this crate is fail-fast: the first failure is returned
//! to the caller as a [`CrawlError`] and nothing is retried or salvaged. The
//! variants are grouped by where they originate (input, PDF engine, file
//! store, record store) and [`CrawlError::kind`] collapses them into the
//! coarse [`ErrorKind`] callers usually branch on.

use std::path::PathBuf;
use thiserror::Error;

/// Coarse classification of a [`CrawlError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The PDF could not be opened, parsed or rendered.
    Document,
    /// Fetching a remote PDF failed.
    Network,
    /// The record store answered with a non-success status or an unreadable body.
    RemoteApi,
    /// Writing to (or reading from) the file store failed.
    Storage,
    /// Invalid configuration or caller input.
    Config,
    /// Unexpected internal failure.
    Internal,
}

/// All errors returned by the esd-crawl library.
#[derive(Debug, Error)]
pub enum CrawlError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── Network errors ────────────────────────────────────────────────────
    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{path}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { path: PathBuf },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{path}'")]
    WrongPassword { path: PathBuf },

    /// pdfium could not read the vector objects of a page.
    #[error("Failed to read page {page}: {detail}")]
    PageUnreadable { page: usize, detail: String },

    /// pdfium-render returned an error while rendering a page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    /// The annotated page could not be encoded into the requested format.
    #[error("Failed to encode page image as {format}: {detail}")]
    ImageEncodeFailed { format: String, detail: String },

    // ── Storage errors ────────────────────────────────────────────────────
    /// The file store could not persist a file.
    #[error("Failed to store '{path}': {source}")]
    StoreWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file store could not read back a stored file.
    #[error("Failed to read stored file '{path}': {source}")]
    StoreReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Record store errors ───────────────────────────────────────────────
    /// The record store answered with a non-2xx status.
    #[error("Airtable API returned HTTP {status}: {body}")]
    RemoteApi { status: u16, body: String },

    /// The record store answered 2xx but the body was not what we expect.
    #[error("Unexpected Airtable response: {detail}")]
    UnexpectedResponse { detail: String },

    /// The request to the record store never got an HTTP answer.
    #[error("Airtable request to '{url}' failed: {reason}")]
    RequestFailed { url: String, reason: String },

    /// `fields` does not contain the uniqueness field used for the lookup.
    #[error("Field '{field}' is missing from the record; it is required as the upsert key")]
    MissingKeyField { field: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
PDFium is normally downloaded automatically on first run.\n\
If the auto-download failed, you can:\n\
  • Check your internet connection and try again.\n\
  • Set PDFIUM_LIB_PATH=/path/to/libpdfium to use an existing copy.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CrawlError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CrawlError::FileNotFound { .. }
            | CrawlError::PermissionDenied { .. }
            | CrawlError::NotAPdf { .. }
            | CrawlError::CorruptPdf { .. }
            | CrawlError::PasswordRequired { .. }
            | CrawlError::WrongPassword { .. }
            | CrawlError::PageUnreadable { .. }
            | CrawlError::RasterisationFailed { .. }
            | CrawlError::ImageEncodeFailed { .. }
            | CrawlError::PdfiumBindingFailed(_) => ErrorKind::Document,
            CrawlError::DownloadFailed { .. }
            | CrawlError::DownloadTimeout { .. }
            | CrawlError::RequestFailed { .. } => ErrorKind::Network,
            CrawlError::RemoteApi { .. } | CrawlError::UnexpectedResponse { .. } => {
                ErrorKind::RemoteApi
            }
            CrawlError::StoreWriteFailed { .. } | CrawlError::StoreReadFailed { .. } => {
                ErrorKind::Storage
            }
            CrawlError::InvalidInput { .. }
            | CrawlError::MissingKeyField { .. }
            | CrawlError::InvalidConfig(_) => ErrorKind::Config,
            CrawlError::Internal(_) => ErrorKind::Internal,
        }
    }
}
