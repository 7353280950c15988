//! # esd-crawl
//!
//! Crawl helpers for pulling tables out of published PDFs and filing the
//! results in Airtable.
//!
//! ## Why this crate?
//!
//! Statistical releases are often published as PDFs whose interesting part
//! is a handful of ruled tables. Before anyone transcribes them, a crawler
//! needs to answer two questions cheaply: *which pages hold tables?* and
//! *what do they look like?* This crate answers both without OCR by
//! reading the ruling lines pdfium reports for each page, and stores an
//! annotated snapshot of every table page for a human (or a later stage)
//! to inspect. The results are then upserted as records keyed by a unique
//! field so re-crawls do not duplicate rows.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF (path / URL / stream / bytes)
//!  │
//!  ├─ 1. Input     resolve to a local file (scratch file for non-paths)
//!  ├─ 2. Edges     ruling lines and rectangles from pdfium path objects
//!  ├─ 3. Detect    lattice: snap → join → intersections → cells → tables
//!  ├─ 4. Render    rasterise table pages only
//!  ├─ 5. Annotate  red edges and dots, blue cells
//!  └─ 6. Persist   <md5-of-pixels>.png through a FileStore
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use esd_crawl::{AirtableClient, AirtableConfig, TableFinder, TableFinderConfig};
//! use serde_json::{json, Map};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let finder = TableFinder::new(TableFinderConfig::default());
//!     let tables = finder.find_tables_from_url("https://example.org/release.pdf", &())?;
//!
//!     let airtable = AirtableClient::new(AirtableConfig::from_env()?)?;
//!     for table in tables {
//!         let mut fields = Map::new();
//!         fields.insert("image".into(), json!(table.img_path));
//!         fields.insert("page".into(), json!(table.page_num));
//!         let id = airtable.upsert_record("appXXXX", "Tables", "image", &fields)?;
//!         println!("page {} → record {}", table.page_num, id);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `esd-crawl` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! esd-crawl = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod airtable;
pub mod config;
pub mod error;
pub mod finder;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod store;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use airtable::{AirtableClient, ApiRequest, ApiResponse, Fields, HttpTransport, Method, Transport};
pub use config::{AirtableConfig, AirtableConfigBuilder, ImageFormat, TableFinderConfig, TableFinderConfigBuilder};
pub use error::{CrawlError, ErrorKind};
pub use finder::TableFinder;
pub use output::Table;
pub use pipeline::detect::{Detection, TableSettings};
pub use pipeline::input::PdfSource;
pub use pipeline::render::{PageView, PageVisitor, PdfBackend, PdfiumBackend};
pub use progress::{NoopProgressCallback, ProgressCallback, ScanProgressCallback};
pub use store::{FileStat, FileStore, FsFilesStore, MemoryStore};
