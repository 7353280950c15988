//! PDF engine boundary: open a document, walk its pages, read ruling
//! geometry and rasterise on demand.
//!
//! ## Why a visitor?
//!
//! A pdfium page borrows from its document, which borrows from the bound
//! library. Handing pages out through an iterator would leak those
//! lifetimes into every caller. Instead [`PdfBackend::scan`] owns the whole
//! open → iterate → close sequence and lends each page to a
//! [`PageVisitor`] as a `&dyn PageView`. Detection and annotation only ever
//! see the trait, so they are tested with synthetic pages.
//!
//! ## Why cap pixels, not only DPI?
//!
//! Page sizes vary wildly: an A0 poster at 300 DPI would produce a
//! 10,000 × 14,000 px image. `max_pixels` caps both dimensions regardless
//! of physical size, keeping memory bounded.

use super::edges::{edges_from_bbox, edges_from_path, BBox, Edge, PathOp};
use crate::error::CrawlError;
use image::RgbaImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// One page of an open document.
pub trait PageView {
    /// 1-based position in the document.
    fn page_number(&self) -> usize;

    /// Page width in points.
    fn width(&self) -> f64;

    /// Page height in points.
    fn height(&self) -> f64;

    /// Ruling edges drawn on the page, top-left origin, in points.
    fn edges(&self) -> Result<Vec<Edge>, CrawlError>;

    /// Rasterise the page at `scale` pixels per point, with neither side
    /// exceeding `max_pixels`.
    fn render(&self, scale: f32, max_pixels: u32) -> Result<RgbaImage, CrawlError>;
}

/// Receives the pages of a document in order.
pub trait PageVisitor {
    /// Called once after the document is opened, before the first page.
    fn begin(&mut self, page_count: usize) {
        let _ = page_count;
    }

    /// Called for each page in document order. An error stops the scan.
    fn visit(&mut self, page: &dyn PageView) -> Result<(), CrawlError>;
}

/// Opens PDF files and walks their pages.
pub trait PdfBackend: Send + Sync {
    /// Open `pdf` and feed every page to `visitor` in document order.
    fn scan(
        &self,
        pdf: &Path,
        password: Option<&str>,
        visitor: &mut dyn PageVisitor,
    ) -> Result<(), CrawlError>;
}

// ── pdfium ───────────────────────────────────────────────────────────────

/// [`PdfBackend`] over the pdfium C++ library.
///
/// The library is located with `pdfium-auto` (honouring `PDFIUM_LIB_PATH`,
/// downloading into the user cache on first use) unless an explicit path
/// is configured.
#[derive(Debug, Clone, Default)]
pub struct PdfiumBackend {
    library_path: Option<PathBuf>,
}

impl PdfiumBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind to the pdfium library at `path` instead of auto-locating it.
    pub fn with_library_path(path: impl Into<PathBuf>) -> Self {
        Self {
            library_path: Some(path.into()),
        }
    }

    fn bind(&self) -> Result<Pdfium, CrawlError> {
        let lib = match &self.library_path {
            Some(p) => p.clone(),
            None => pdfium_auto::ensure_pdfium_library(None)
                .map_err(|e| CrawlError::PdfiumBindingFailed(e.to_string()))?,
        };
        debug!("Binding pdfium from {}", lib.display());
        let bindings = Pdfium::bind_to_library(&lib).map_err(|e| {
            CrawlError::PdfiumBindingFailed(format!("{}: {}", lib.display(), e))
        })?;
        Ok(Pdfium::new(bindings))
    }
}

impl PdfBackend for PdfiumBackend {
    fn scan(
        &self,
        pdf: &Path,
        password: Option<&str>,
        visitor: &mut dyn PageVisitor,
    ) -> Result<(), CrawlError> {
        let pdfium = self.bind()?;

        let document = pdfium.load_pdf_from_file(pdf, password).map_err(|e| {
            let err_str = format!("{:?}", e);
            if err_str.contains("Password") || err_str.contains("password") {
                if password.is_some() {
                    CrawlError::WrongPassword {
                        path: pdf.to_path_buf(),
                    }
                } else {
                    CrawlError::PasswordRequired {
                        path: pdf.to_path_buf(),
                    }
                }
            } else {
                CrawlError::CorruptPdf {
                    path: pdf.to_path_buf(),
                    detail: err_str,
                }
            }
        })?;

        let pages = document.pages();
        let total_pages = pages.len() as usize;
        info!("PDF loaded: {} pages", total_pages);
        visitor.begin(total_pages);

        for (index, page) in pages.iter().enumerate() {
            let view = PdfiumPage {
                page,
                number: index + 1,
            };
            visitor.visit(&view)?;
        }

        Ok(())
    }
}

struct PdfiumPage<'a> {
    page: PdfPage<'a>,
    number: usize,
}

impl PdfiumPage<'_> {
    /// Walk `objects`, whose coordinates are mapped to page space by
    /// `forms` (outermost form matrix first).
    fn collect_edges<'o>(
        &self,
        objects: impl Iterator<Item = PdfPageObject<'o>>,
        forms: &[PdfMatrix],
        edges: &mut Vec<Edge>,
    ) -> Result<(), CrawlError> {
        for object in objects {
            match object.object_type() {
                PdfPageObjectType::Path => {
                    if let Some(path) = object.as_path_object() {
                        edges.extend(self.path_edges(&object, path, forms)?);
                    }
                }
                PdfPageObjectType::XObjectForm => {
                    if let Some(form) = object.as_x_object_form_object() {
                        let mut chain = forms.to_vec();
                        chain.push(object.matrix().map_err(|e| self.unreadable(e))?);
                        self.collect_edges(form.iter(), &chain, edges)?;
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn path_edges(
        &self,
        object: &PdfPageObject<'_>,
        path: &PdfPagePathObject<'_>,
        forms: &[PdfMatrix],
    ) -> Result<Vec<Edge>, CrawlError> {
        let segments = path.segments();
        if segments.is_empty() {
            // No segment data: fall back to the outline pdfium computed.
            let bounds = object.bounds().map_err(|e| self.unreadable(e))?;
            let (ax, ay) = self.to_page(forms, bounds.left(), bounds.top());
            let (bx, by) = self.to_page(forms, bounds.right(), bounds.bottom());
            return Ok(edges_from_bbox(&BBox::from_corners(ax, ay, bx, by)));
        }

        // Segment points are raw; the object's own matrix applies first.
        let mut chain = forms.to_vec();
        chain.push(object.matrix().map_err(|e| self.unreadable(e))?);

        let mut ops = Vec::with_capacity(segments.len() as usize);
        for index in 0..segments.len() {
            let segment = segments.get(index).map_err(|e| self.unreadable(e))?;
            let (x, y) = self.to_page(&chain, segment.x(), segment.y());
            ops.push(match segment.segment_type() {
                PdfPathSegmentType::MoveTo => PathOp::MoveTo(x, y),
                PdfPathSegmentType::LineTo => PathOp::LineTo(x, y),
                _ => PathOp::CurveTo(x, y),
            });
            if segment.is_close() {
                ops.push(PathOp::Close);
            }
        }
        Ok(edges_from_path(&ops))
    }

    /// Apply `chain` innermost first, then flip to a top-left origin.
    fn to_page(&self, chain: &[PdfMatrix], x: PdfPoints, y: PdfPoints) -> (f64, f64) {
        let (x, y) = chain
            .iter()
            .rev()
            .fold((x, y), |(x, y), m| m.apply_to_points(x, y));
        (f64::from(x.value), self.height() - f64::from(y.value))
    }

    fn unreadable(&self, e: PdfiumError) -> CrawlError {
        CrawlError::PageUnreadable {
            page: self.number,
            detail: format!("{:?}", e),
        }
    }
}

impl PageView for PdfiumPage<'_> {
    fn page_number(&self) -> usize {
        self.number
    }

    fn width(&self) -> f64 {
        f64::from(self.page.width().value)
    }

    fn height(&self) -> f64 {
        f64::from(self.page.height().value)
    }

    /// Every straight, axis-aligned segment of every path object is an
    /// edge, including paths nested inside form XObjects. pdfium reports
    /// bottom-left coordinates, flipped here.
    fn edges(&self) -> Result<Vec<Edge>, CrawlError> {
        let mut edges = Vec::new();
        self.collect_edges(self.page.objects().iter(), &[], &mut edges)?;
        debug!("Page {}: {} raw edges", self.number, edges.len());
        Ok(edges)
    }

    fn render(&self, scale: f32, max_pixels: u32) -> Result<RgbaImage, CrawlError> {
        let max_pixels = pixel_cap(max_pixels);
        let render_config = PdfRenderConfig::new()
            .scale_page_by_factor(scale)
            .set_maximum_width(max_pixels)
            .set_maximum_height(max_pixels);

        let bitmap = self.page.render_with_config(&render_config).map_err(|e| {
            CrawlError::RasterisationFailed {
                page: self.number,
                detail: format!("{:?}", e),
            }
        })?;

        let image = bitmap.as_image().to_rgba8();
        debug!(
            "Rendered page {} → {}x{} px",
            self.number,
            image.width(),
            image.height()
        );
        Ok(image)
    }
}

/// pdfium takes the cap as `i32`; larger caps saturate.
fn pixel_cap(max_pixels: u32) -> i32 {
    i32::try_from(max_pixels).unwrap_or(i32::MAX)
}
