//! Table finder integration tests over a synthetic PDF engine.
//!
//! The backend below hands out pages whose ruling edges and pixels are set
//! by each test, so detection, annotation, persistence and ordering are
//! exercised end to end without pdfium.

use esd_crawl::pipeline::edges::Edge;
use esd_crawl::{
    CrawlError, ErrorKind, FileStore, FsFilesStore, ImageFormat, MemoryStore, PageView,
    PageVisitor, PdfBackend, ScanProgressCallback, TableFinder, TableFinderConfig,
};
use image::{Rgba, RgbaImage};
use std::path::Path;
use std::sync::{Arc, Mutex};

// ── Synthetic engine ─────────────────────────────────────────────────────────

#[derive(Clone)]
struct SyntheticPage {
    edges: Vec<Edge>,
    shade: u8,
    fail_render: bool,
}

impl SyntheticPage {
    fn blank() -> Self {
        Self {
            edges: Vec::new(),
            shade: 255,
            fail_render: false,
        }
    }

    fn table(shade: u8) -> Self {
        Self {
            edges: grid(),
            shade,
            fail_render: false,
        }
    }
}

struct View<'a> {
    number: usize,
    page: &'a SyntheticPage,
}

impl PageView for View<'_> {
    fn page_number(&self) -> usize {
        self.number
    }
    fn width(&self) -> f64 {
        200.0
    }
    fn height(&self) -> f64 {
        200.0
    }
    fn edges(&self) -> Result<Vec<Edge>, CrawlError> {
        Ok(self.page.edges.clone())
    }
    fn render(&self, scale: f32, _max_pixels: u32) -> Result<RgbaImage, CrawlError> {
        if self.page.fail_render {
            return Err(CrawlError::RasterisationFailed {
                page: self.number,
                detail: "synthetic failure".into(),
            });
        }
        let side = (200.0 * scale).round() as u32;
        let s = self.page.shade;
        Ok(RgbaImage::from_pixel(side, side, Rgba([s, s, s, 255])))
    }
}

struct SyntheticBackend {
    pages: Vec<SyntheticPage>,
    seen_password: Mutex<Option<String>>,
}

impl SyntheticBackend {
    fn new(pages: Vec<SyntheticPage>) -> Self {
        Self {
            pages,
            seen_password: Mutex::new(None),
        }
    }
}

impl PdfBackend for SyntheticBackend {
    fn scan(
        &self,
        pdf: &Path,
        password: Option<&str>,
        visitor: &mut dyn PageVisitor,
    ) -> Result<(), CrawlError> {
        assert!(pdf.exists(), "scratch PDF must exist during the scan");
        *self.seen_password.lock().unwrap() = password.map(str::to_string);
        visitor.begin(self.pages.len());
        for (i, page) in self.pages.iter().enumerate() {
            visitor.visit(&View { number: i + 1, page })?;
        }
        Ok(())
    }
}

/// Two side-by-side cells between y=20 and y=100.
fn grid() -> Vec<Edge> {
    vec![
        Edge::horizontal(20.0, 20.0, 180.0),
        Edge::horizontal(100.0, 20.0, 180.0),
        Edge::vertical(20.0, 20.0, 100.0),
        Edge::vertical(100.0, 20.0, 100.0),
        Edge::vertical(180.0, 20.0, 100.0),
    ]
}

const PDF: &[u8] = b"%PDF-1.7\n%%EOF\n";

fn memory_finder(pages: Vec<SyntheticPage>) -> TableFinder<MemoryStore> {
    TableFinder::with_store(TableFinderConfig::default(), MemoryStore::new())
        .with_backend(SyntheticBackend::new(pages))
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[test]
fn no_table_pages_yields_empty_result() {
    let finder = memory_finder(vec![SyntheticPage::blank(), SyntheticPage::blank()]);
    let tables = finder.find_tables(PDF.to_vec(), &()).unwrap();
    assert!(tables.is_empty());
    assert_eq!(finder.store().writes(), 0);
}

#[test]
fn one_record_per_table_page_in_page_order() {
    let finder = memory_finder(vec![
        SyntheticPage::blank(),
        SyntheticPage::table(250),
        SyntheticPage::blank(),
        SyntheticPage::table(240),
        SyntheticPage::table(230),
    ]);
    let tables = finder.find_tables(PDF.to_vec(), &()).unwrap();

    let pages: Vec<usize> = tables.iter().map(|t| t.page_num).collect();
    assert_eq!(pages, vec![2, 4, 5]);
    for t in &tables {
        assert!(t.img_path.ends_with(".png"), "{}", t.img_path);
        assert_eq!(t.img_path.len(), 32 + 4);
        assert!(finder.store().get(&t.img_path).is_some());
    }
}

#[test]
fn identical_pixels_share_one_path() {
    let finder = memory_finder(vec![
        SyntheticPage::table(200),
        SyntheticPage::table(150),
        SyntheticPage::table(200),
    ]);
    let tables = finder.find_tables(PDF.to_vec(), &()).unwrap();

    assert_eq!(tables.len(), 3);
    assert_eq!(tables[0].img_path, tables[2].img_path);
    assert_ne!(tables[0].img_path, tables[1].img_path);
    assert_eq!(finder.store().writes(), 3);
    assert_eq!(finder.store().len(), 2);
}

#[test]
fn stored_image_carries_the_annotation() {
    let finder = memory_finder(vec![SyntheticPage::table(255)]);
    let tables = finder.find_tables(PDF.to_vec(), &()).unwrap();
    let bytes = finder.store().get(&tables[0].img_path).unwrap();
    let img = image::load_from_memory(&bytes).unwrap().to_rgba8();

    assert_eq!(img.dimensions(), (200, 200));
    let cell = img.get_pixel(60, 60);
    assert!(cell[2] > cell[0], "cell interior should be tinted blue: {cell:?}");
    assert_eq!(*img.get_pixel(190, 190), Rgba([255, 255, 255, 255]));
}

#[test]
fn jpeg_format_changes_extension_only() {
    let config = TableFinderConfig::builder()
        .image_format(ImageFormat::Jpeg)
        .build()
        .unwrap();
    let jpeg = TableFinder::with_store(config, MemoryStore::new())
        .with_backend(SyntheticBackend::new(vec![SyntheticPage::table(255)]));
    let png = memory_finder(vec![SyntheticPage::table(255)]);

    let j = jpeg.find_tables(PDF.to_vec(), &()).unwrap();
    let p = png.find_tables(PDF.to_vec(), &()).unwrap();
    assert!(j[0].img_path.ends_with(".jpg"));
    assert_eq!(
        j[0].img_path.trim_end_matches(".jpg"),
        p[0].img_path.trim_end_matches(".png")
    );
}

/// Store that records the context it was handed.
#[derive(Default)]
struct RecordingStore {
    seen: Mutex<Vec<(String, String)>>,
}

impl FileStore<str> for RecordingStore {
    fn persist_file(&self, path: &str, _content: &[u8], info: &str) -> Result<(), CrawlError> {
        self.seen
            .lock()
            .unwrap()
            .push((path.to_string(), info.to_string()));
        Ok(())
    }
}

#[test]
fn info_context_is_passed_to_the_store_untouched() {
    let finder = TableFinder::with_store(TableFinderConfig::default(), RecordingStore::default())
        .with_backend(SyntheticBackend::new(vec![
            SyntheticPage::table(10),
            SyntheticPage::table(20),
        ]));
    let tables = finder.find_tables(PDF.to_vec(), "crawl-job-42").unwrap();

    let seen = finder.store().seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert!(seen.iter().all(|(_, info)| info == "crawl-job-42"));
    assert_eq!(seen[0].0, tables[0].img_path);
}

#[test]
fn pages_with_tables_detects_without_storing() {
    let finder = memory_finder(vec![
        SyntheticPage::table(1),
        SyntheticPage::blank(),
        SyntheticPage::table(2),
    ]);
    assert_eq!(finder.pages_with_tables(PDF.to_vec()).unwrap(), vec![1, 3]);
    assert!(finder.store().is_empty());
}

#[test]
fn reader_input_is_supported() {
    let finder = memory_finder(vec![SyntheticPage::table(99)]);
    let tables = finder
        .find_tables_from_reader(std::io::Cursor::new(PDF.to_vec()), &())
        .unwrap();
    assert_eq!(tables.len(), 1);
}

#[test]
fn render_failure_aborts_without_partial_results() {
    let mut broken = SyntheticPage::table(0);
    broken.fail_render = true;
    let finder = memory_finder(vec![SyntheticPage::table(50), broken, SyntheticPage::table(60)]);

    let err = finder.find_tables(PDF.to_vec(), &()).unwrap_err();
    assert!(matches!(err, CrawlError::RasterisationFailed { page: 2, .. }));
    assert_eq!(err.kind(), ErrorKind::Document);
    // The first page was already persisted; the third was never reached.
    assert_eq!(finder.store().writes(), 1);
}

#[test]
fn non_pdf_input_never_reaches_the_engine() {
    let finder = memory_finder(vec![SyntheticPage::table(1)]);
    let err = finder.find_tables(b"<html>".to_vec(), &()).unwrap_err();
    assert!(matches!(err, CrawlError::NotAPdf { .. }));
    assert_eq!(err.kind(), ErrorKind::Document);
}

#[test]
fn store_failure_is_storage_kind() {
    // A regular file as the store root: creating the image's parent fails.
    let blocker = tempfile::NamedTempFile::new().unwrap();
    let finder = TableFinder::with_store(TableFinderConfig::default(), FsFilesStore::new(blocker.path()))
        .with_backend(SyntheticBackend::new(vec![SyntheticPage::table(1)]));

    let err = finder.find_tables(PDF.to_vec(), &()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Storage);
}

#[test]
fn filesystem_store_writes_under_root() {
    let dir = tempfile::TempDir::new().unwrap();
    let config = TableFinderConfig::builder()
        .storage_root(dir.path())
        .build()
        .unwrap();
    let finder = TableFinder::new(config).with_backend(SyntheticBackend::new(vec![SyntheticPage::table(7)]));

    let tables = finder.find_tables(PDF.to_vec(), &()).unwrap();
    let on_disk = dir.path().join(&tables[0].img_path);
    assert!(on_disk.exists());
    let stat = finder.store().stat_file(&tables[0].img_path).unwrap().unwrap();
    assert_eq!(stat.checksum.len(), 32);
}

#[test]
fn password_is_forwarded_to_the_engine() {
    let backend = Arc::new(SyntheticBackend::new(vec![SyntheticPage::blank()]));
    let config = TableFinderConfig::builder().password("s3cret").build().unwrap();
    let finder = TableFinder::with_store(config, MemoryStore::new()).with_backend(SharedBackend(backend.clone()));

    finder.find_tables(PDF.to_vec(), &()).unwrap();
    assert_eq!(backend.seen_password.lock().unwrap().as_deref(), Some("s3cret"));
}

struct SharedBackend(Arc<SyntheticBackend>);

impl PdfBackend for SharedBackend {
    fn scan(&self, pdf: &Path, password: Option<&str>, visitor: &mut dyn PageVisitor) -> Result<(), CrawlError> {
        self.0.scan(pdf, password, visitor)
    }
}

#[derive(Default)]
struct EventLog {
    events: Mutex<Vec<String>>,
}

impl ScanProgressCallback for EventLog {
    fn on_scan_start(&self, total_pages: usize) {
        self.events.lock().unwrap().push(format!("start {total_pages}"));
    }
    fn on_page_scanned(&self, page_num: usize, _total_pages: usize, tables: usize) {
        self.events.lock().unwrap().push(format!("page {page_num}: {tables}"));
    }
    fn on_table_saved(&self, page_num: usize, _img_path: &str) {
        self.events.lock().unwrap().push(format!("saved {page_num}"));
    }
    fn on_scan_complete(&self, total_pages: usize, table_pages: usize) {
        self.events
            .lock()
            .unwrap()
            .push(format!("done {table_pages}/{total_pages}"));
    }
}

#[test]
fn progress_events_follow_page_order() {
    let log = Arc::new(EventLog::default());
    let config = TableFinderConfig::builder()
        .progress_callback(log.clone())
        .build()
        .unwrap();
    let finder = TableFinder::with_store(config, MemoryStore::new()).with_backend(SyntheticBackend::new(vec![
        SyntheticPage::blank(),
        SyntheticPage::table(5),
    ]));

    finder.find_tables(PDF.to_vec(), &()).unwrap();
    let events = log.events.lock().unwrap().clone();
    assert_eq!(
        events,
        vec!["start 2", "page 1: 0", "page 2: 1", "saved 2", "done 1/2"]
    );
}
