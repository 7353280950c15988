//! Progress-callback trait for per-page scan events.
//!
//! Inject an [`Arc<dyn ScanProgressCallback>`] via
//! [`crate::config::TableFinderConfigBuilder::progress_callback`] to receive
//! events as the finder walks the document. The CLI uses it to drive an
//! `indicatif` bar; library callers can forward events wherever they like.
//!
//! # Example
//!
//! ```rust
//! use esd_crawl::{ScanProgressCallback, TableFinderConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     saved: AtomicUsize,
//! }
//!
//! impl ScanProgressCallback for CountingCallback {
//!     fn on_table_saved(&self, page_num: usize, img_path: &str) {
//!         self.saved.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("page {page_num} → {img_path}");
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { saved: AtomicUsize::new(0) });
//!
//! let config = TableFinderConfig::builder()
//!     .progress_callback(counter as Arc<dyn ScanProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by [`crate::TableFinder`] as it scans each page.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Events arrive in page order from the thread that
/// called the finder.
pub trait ScanProgressCallback: Send + Sync {
    /// Called once after the document is opened.
    ///
    /// # Arguments
    /// * `total_pages`: number of pages that will be scanned
    fn on_scan_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called after table detection finishes for a page.
    ///
    /// # Arguments
    /// * `page_num`   : 1-indexed page number
    /// * `total_pages`: total pages in the document
    /// * `tables`     : table regions detected on the page (0 if none)
    fn on_page_scanned(&self, page_num: usize, total_pages: usize, tables: usize) {
        let _ = (page_num, total_pages, tables);
    }

    /// Called when a page's annotated image has been persisted.
    fn on_table_saved(&self, page_num: usize, img_path: &str) {
        let _ = (page_num, img_path);
    }

    /// Called once after every page has been scanned.
    ///
    /// # Arguments
    /// * `total_pages`: total pages in the document
    /// * `table_pages`: pages on which at least one table was found
    fn on_scan_complete(&self, total_pages: usize, table_pages: usize) {
        let _ = (total_pages, table_pages);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ScanProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::TableFinderConfig`].
pub type ProgressCallback = Arc<dyn ScanProgressCallback>;
