//! Page geometry: bounding boxes and the ruling edges tables are built from.
//!
//! Coordinates use a top-left origin measured in PDF points, so `top` grows
//! downwards the same way pixel rows do in the rendered image. The PDF
//! backend is responsible for flipping pdfium's bottom-left coordinates
//! before edges reach this module.

/// Bounding box with top-left origin coordinate system.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BBox {
    pub x0: f64,
    pub top: f64,
    pub x1: f64,
    pub bottom: f64,
}

impl BBox {
    pub fn new(x0: f64, top: f64, x1: f64, bottom: f64) -> Self {
        Self {
            x0,
            top,
            x1,
            bottom,
        }
    }

    /// Build a box from two arbitrary corners, normalising the order.
    pub fn from_corners(ax: f64, ay: f64, bx: f64, by: f64) -> Self {
        Self::new(ax.min(bx), ay.min(by), ax.max(bx), ay.max(by))
    }

    pub fn width(&self) -> f64 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f64 {
        self.bottom - self.top
    }

    /// Smallest box containing both `self` and `other`.
    pub fn union(&self, other: &BBox) -> BBox {
        BBox {
            x0: self.x0.min(other.x0),
            top: self.top.min(other.top),
            x1: self.x1.max(other.x1),
            bottom: self.bottom.max(other.bottom),
        }
    }
}

/// Orientation of an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Horizontal,
    Vertical,
}

/// A horizontal or vertical ruling segment on a page.
///
/// Horizontal edges have `top == bottom`; vertical edges have `x0 == x1`.
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub x0: f64,
    pub top: f64,
    pub x1: f64,
    pub bottom: f64,
    pub orientation: Orientation,
}

impl Edge {
    /// Horizontal edge at `y` spanning `x0..x1` (in any order).
    pub fn horizontal(y: f64, x0: f64, x1: f64) -> Self {
        Self {
            x0: x0.min(x1),
            top: y,
            x1: x0.max(x1),
            bottom: y,
            orientation: Orientation::Horizontal,
        }
    }

    /// Vertical edge at `x` spanning `top..bottom` (in any order).
    pub fn vertical(x: f64, top: f64, bottom: f64) -> Self {
        Self {
            x0: x,
            top: top.min(bottom),
            x1: x,
            bottom: top.max(bottom),
            orientation: Orientation::Vertical,
        }
    }

    /// Length along the edge's own axis.
    pub fn length(&self) -> f64 {
        match self.orientation {
            Orientation::Horizontal => self.x1 - self.x0,
            Orientation::Vertical => self.bottom - self.top,
        }
    }
}

/// Paths thinner than this (in points) are treated as ruling lines rather
/// than rectangles.
pub const RULE_THICKNESS: f64 = 2.0;

/// Derive edges from the bounding box of a drawn path.
///
/// A thin, wide box is a horizontal rule; a thin, tall box is a vertical
/// rule; anything larger contributes its four sides, the same way
/// rectangles feed the lattice strategy. Boxes thin in both directions are
/// dots and contribute nothing.
pub fn edges_from_bbox(bbox: &BBox) -> Vec<Edge> {
    let thin_w = bbox.width() <= RULE_THICKNESS;
    let thin_h = bbox.height() <= RULE_THICKNESS;

    match (thin_w, thin_h) {
        (true, true) => Vec::new(),
        (false, true) => {
            let y = (bbox.top + bbox.bottom) / 2.0;
            vec![Edge::horizontal(y, bbox.x0, bbox.x1)]
        }
        (true, false) => {
            let x = (bbox.x0 + bbox.x1) / 2.0;
            vec![Edge::vertical(x, bbox.top, bbox.bottom)]
        }
        (false, false) => vec![
            Edge::horizontal(bbox.top, bbox.x0, bbox.x1),
            Edge::horizontal(bbox.bottom, bbox.x0, bbox.x1),
            Edge::vertical(bbox.x0, bbox.top, bbox.bottom),
            Edge::vertical(bbox.x1, bbox.top, bbox.bottom),
        ],
    }
}

/// One step of a drawn path, already in top-left page coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PathOp {
    MoveTo(f64, f64),
    LineTo(f64, f64),
    /// Any curve point. Moves the pen without producing an edge.
    CurveTo(f64, f64),
    /// Line back to the start of the current subpath.
    Close,
}

/// Segments leaning at most this far (in points) off an axis are rules.
pub const AXIS_TOLERANCE: f64 = 0.5;

/// Derive edges from the individual segments of a drawn path.
///
/// Every axis-aligned straight segment becomes one edge, including the
/// implicit segment a close adds, so a whole grid stroked as a single path
/// yields all of its inner rules. Diagonals and curves contribute nothing.
pub fn edges_from_path(ops: &[PathOp]) -> Vec<Edge> {
    let mut edges = Vec::new();
    let mut start: Option<(f64, f64)> = None;
    let mut pen: Option<(f64, f64)> = None;

    for op in ops {
        match *op {
            PathOp::MoveTo(x, y) => {
                start = Some((x, y));
                pen = Some((x, y));
            }
            PathOp::LineTo(x, y) => {
                if let Some(from) = pen {
                    edges.extend(segment_edge(from, (x, y)));
                }
                if start.is_none() {
                    start = Some((x, y));
                }
                pen = Some((x, y));
            }
            PathOp::CurveTo(x, y) => {
                if start.is_none() {
                    start = Some((x, y));
                }
                pen = Some((x, y));
            }
            PathOp::Close => {
                if let (Some(from), Some(to)) = (pen, start) {
                    edges.extend(segment_edge(from, to));
                }
                pen = start;
            }
        }
    }
    edges
}

fn segment_edge((ax, ay): (f64, f64), (bx, by): (f64, f64)) -> Option<Edge> {
    let dx = (bx - ax).abs();
    let dy = (by - ay).abs();
    if dy <= AXIS_TOLERANCE && dx > AXIS_TOLERANCE {
        Some(Edge::horizontal((ay + by) / 2.0, ax, bx))
    } else if dx <= AXIS_TOLERANCE && dy > AXIS_TOLERANCE {
        Some(Edge::vertical((ax + bx) / 2.0, ay, by))
    } else {
        None
    }
}
