//! The table finder: locate table-bearing pages and persist annotated images.
//!
//! [`TableFinder`] ties the pipeline together. For every page of the
//! document it reads the ruling edges, runs lattice detection and, when at
//! least one table region comes back, renders the page, draws the
//! detection over it and stores the image under the MD5 of its pixels.
//! One [`Table`] is returned per qualifying page, in page order.
//!
//! Every step is fail-fast. The first error aborts the scan and is returned
//! as-is; images already written stay in the store, but no partial list of
//! tables is returned.

use crate::config::{ImageFormat, TableFinderConfig};
use crate::error::CrawlError;
use crate::output::Table;
use crate::pipeline::annotate::annotate;
use crate::pipeline::detect::{detect_tables, Detection, TableSettings};
use crate::pipeline::encode::{content_path, encode_image};
use crate::pipeline::input::{is_url, resolve_input, PdfSource};
use crate::pipeline::render::{PageView, PageVisitor, PdfBackend, PdfiumBackend};
use crate::progress::{NoopProgressCallback, ProgressCallback};
use crate::store::{FileStore, FsFilesStore};
use image::RgbaImage;
use std::io::Read;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Finds tables in PDFs and stores a debug image per table-bearing page.
///
/// # Example
/// ```rust,no_run
/// use esd_crawl::{TableFinder, TableFinderConfig};
///
/// let finder = TableFinder::new(TableFinderConfig::default());
/// for table in finder.find_tables("report.pdf", &())? {
///     println!("page {} → {}", table.page_num, table.img_path);
/// }
/// # Ok::<(), esd_crawl::CrawlError>(())
/// ```
pub struct TableFinder<S = FsFilesStore> {
    config: TableFinderConfig,
    store: S,
    backend: Box<dyn PdfBackend>,
}

impl TableFinder<FsFilesStore> {
    /// Finder writing to a filesystem store rooted at `config.storage_root`.
    pub fn new(config: TableFinderConfig) -> Self {
        let store = FsFilesStore::new(config.storage_root.clone());
        Self::with_store(config, store)
    }
}

impl<S> TableFinder<S> {
    /// Finder writing to `store`, reading PDFs through pdfium.
    pub fn with_store(config: TableFinderConfig, store: S) -> Self {
        Self {
            config,
            store,
            backend: Box::new(PdfiumBackend::new()),
        }
    }

    /// Replace the PDF engine.
    pub fn with_backend(mut self, backend: impl PdfBackend + 'static) -> Self {
        self.backend = Box::new(backend);
        self
    }

    pub fn config(&self) -> &TableFinderConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Find every table-bearing page of `source` and persist its annotated image.
    ///
    /// `info` is passed untouched to the store with each image.
    pub fn find_tables<I: ?Sized>(
        &self,
        source: impl Into<PdfSource>,
        info: &I,
    ) -> Result<Vec<Table>, CrawlError>
    where
        S: FileStore<I>,
    {
        let start = Instant::now();
        let progress = self.progress();
        let mut tables = Vec::new();

        self.scan(source.into(), |page, detection| {
            let img_path = self.save_table_img(page, detection, info)?;
            progress.on_table_saved(page.page_number(), &img_path);
            tables.push(Table::new(page.page_number(), img_path));
            Ok(())
        })?;

        info!(
            "Found {} table page(s) in {}ms",
            tables.len(),
            start.elapsed().as_millis()
        );
        Ok(tables)
    }

    /// [`find_tables`](Self::find_tables) for a remote PDF.
    ///
    /// The document is downloaded into a temporary file that is removed
    /// before this returns.
    pub fn find_tables_from_url<I: ?Sized>(&self, url: &str, info: &I) -> Result<Vec<Table>, CrawlError>
    where
        S: FileStore<I>,
    {
        if !is_url(url) {
            return Err(CrawlError::InvalidInput {
                input: url.to_string(),
            });
        }
        self.find_tables(PdfSource::Url(url.to_string()), info)
    }

    /// [`find_tables`](Self::find_tables) for an open stream.
    pub fn find_tables_from_reader<I: ?Sized>(
        &self,
        reader: impl Read + Send + 'static,
        info: &I,
    ) -> Result<Vec<Table>, CrawlError>
    where
        S: FileStore<I>,
    {
        self.find_tables(PdfSource::reader(reader), info)
    }

    /// 1-indexed numbers of the pages that contain at least one table.
    ///
    /// Detection only: nothing is rendered or stored.
    pub fn pages_with_tables(&self, source: impl Into<PdfSource>) -> Result<Vec<usize>, CrawlError> {
        let mut pages = Vec::new();
        self.scan(source.into(), |page, _| {
            pages.push(page.page_number());
            Ok(())
        })?;
        Ok(pages)
    }

    /// Encode `img` and store it under `<md5-of-pixels>.<ext>`.
    ///
    /// Returns the store-relative path. Identical pixels always map to the
    /// same path, so persisting twice overwrites rather than duplicates.
    pub fn persist_img<I: ?Sized>(
        &self,
        img: &RgbaImage,
        info: &I,
        format: ImageFormat,
    ) -> Result<String, CrawlError>
    where
        S: FileStore<I>,
    {
        let path = content_path(img, format);
        let buf = encode_image(img, format)?;
        self.store.persist_file(&path, &buf, info)?;
        debug!("Persisted {} ({} bytes)", path, buf.len());
        Ok(path)
    }

    /// Render `page`, draw `detection` over it and persist the result.
    pub fn save_table_img<I: ?Sized>(
        &self,
        page: &dyn PageView,
        detection: &Detection,
        info: &I,
    ) -> Result<String, CrawlError>
    where
        S: FileStore<I>,
    {
        let bitmap = page.render(self.config.render_scale(), self.config.max_rendered_pixels)?;
        let annotated = annotate(bitmap, detection, page.width(), page.height());
        self.persist_img(&annotated, info, self.config.image_format)
    }

    /// Resolve `source`, walk its pages and call `on_table` for each page
    /// with at least one table.
    fn scan<F>(&self, source: PdfSource, on_table: F) -> Result<(), CrawlError>
    where
        F: FnMut(&dyn PageView, &Detection) -> Result<(), CrawlError>,
    {
        info!("Scanning for tables: {}", source.describe());

        // ── Step 1: Resolve input ────────────────────────────────────────
        let resolved = resolve_input(source, self.config.download_timeout_secs)?;

        // ── Step 2: Walk pages ───────────────────────────────────────────
        let mut scan = PageScan {
            settings: &self.config.table_settings,
            progress: self.progress(),
            total_pages: 0,
            table_pages: 0,
            on_table,
        };
        self.backend
            .scan(resolved.path(), self.config.password.as_deref(), &mut scan)?;

        scan.progress
            .on_scan_complete(scan.total_pages, scan.table_pages);
        Ok(())
    }

    fn progress(&self) -> ProgressCallback {
        self.config
            .progress_callback
            .clone()
            .unwrap_or_else(|| Arc::new(NoopProgressCallback))
    }
}

/// Runs detection on each visited page and forwards table pages.
struct PageScan<'a, F> {
    settings: &'a TableSettings,
    progress: ProgressCallback,
    total_pages: usize,
    table_pages: usize,
    on_table: F,
}

impl<F> PageVisitor for PageScan<'_, F>
where
    F: FnMut(&dyn PageView, &Detection) -> Result<(), CrawlError>,
{
    fn begin(&mut self, page_count: usize) {
        self.total_pages = page_count;
        self.progress.on_scan_start(page_count);
    }

    fn visit(&mut self, page: &dyn PageView) -> Result<(), CrawlError> {
        let page_num = page.page_number();
        let detection = detect_tables(page.edges()?, self.settings);
        let found = detection.tables.len();
        debug!(
            "Page {}: {} edges, {} cells, {} tables",
            page_num,
            detection.edges.len(),
            detection.cells.len(),
            found
        );
        self.progress
            .on_page_scanned(page_num, self.total_pages, found);

        if detection.has_tables() {
            self.table_pages += 1;
            (self.on_table)(page, &detection)?;
        }
        Ok(())
    }
}
