//! Pipeline stages for finding tables in a PDF.
//!
//! Each submodule implements exactly one step, so each is testable on its
//! own and only [`render`] touches the PDF engine.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render ──▶ edges ──▶ detect ──▶ render ──▶ annotate ──▶ encode
//! (URL/path) (pdfium)  (rules)   (lattice)  (bitmap)   (overlay)    (png/jpeg + md5)
//! ```
//!
//! 1. [`input`]: resolve a path, URL, stream or buffer to a local file
//! 2. [`render`]: the [`render::PdfBackend`] boundary; pdfium walks the pages
//! 3. [`edges`]: turn drawn paths into horizontal and vertical edges
//! 4. [`detect`]: lattice detection: intersections, cells, tables
//! 5. [`annotate`]: draw the detection over the page bitmap
//! 6. [`encode`]: encode the image and derive its content-addressed name

pub mod annotate;
pub mod detect;
pub mod edges;
pub mod encode;
pub mod input;
pub mod render;
