//! Debug annotation: draw the detector's view of a page over its rendering.
//!
//! The overlay follows the usual table-finder debug picture: merged edges
//! as red lines, intersections as red dots, and every cell washed in
//! translucent blue. Page coordinates (points, top-left origin) are scaled
//! onto the bitmap using the ratio of image size to page size.

use super::detect::Detection;
use super::edges::BBox;
use image::{Pixel, Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_line_segment_mut};

/// Stroke colour for edges and intersections.
pub const EDGE_STROKE: Rgba<u8> = Rgba([255, 0, 0, 255]);
/// Fill colour for cells; blended over the page.
pub const CELL_FILL: Rgba<u8> = Rgba([0, 0, 255, 50]);
/// Intersection dot radius in pixels.
pub const INTERSECTION_RADIUS: i32 = 3;

/// Draw `detection` onto `image`, a rendering of a page that measures
/// `page_width` × `page_height` points.
pub fn annotate(mut image: RgbaImage, detection: &Detection, page_width: f64, page_height: f64) -> RgbaImage {
    let scale = Scale::new(&image, page_width, page_height);

    for edge in &detection.edges {
        draw_line_segment_mut(
            &mut image,
            (scale.x(edge.x0), scale.y(edge.top)),
            (scale.x(edge.x1), scale.y(edge.bottom)),
            EDGE_STROKE,
        );
    }

    for point in &detection.intersections {
        let center = (scale.x(point.x).round() as i32, scale.y(point.y).round() as i32);
        draw_filled_circle_mut(&mut image, center, INTERSECTION_RADIUS, EDGE_STROKE);
    }

    for cell in &detection.cells {
        fill_blended(&mut image, &scale, cell, CELL_FILL);
    }

    image
}

struct Scale {
    sx: f64,
    sy: f64,
}

impl Scale {
    fn new(image: &RgbaImage, page_width: f64, page_height: f64) -> Self {
        let ratio = |px: u32, pt: f64| if pt > 0.0 { f64::from(px) / pt } else { 1.0 };
        Self {
            sx: ratio(image.width(), page_width),
            sy: ratio(image.height(), page_height),
        }
    }

    fn x(&self, pt: f64) -> f32 {
        (pt * self.sx) as f32
    }

    fn y(&self, pt: f64) -> f32 {
        (pt * self.sy) as f32
    }
}

/// Alpha-blend `color` over the pixels covered by `bbox`, clipped to the image.
fn fill_blended(image: &mut RgbaImage, scale: &Scale, bbox: &BBox, color: Rgba<u8>) {
    let clamp = |v: f32, max: u32| (v.round().max(0.0) as u32).min(max);
    let x0 = clamp(scale.x(bbox.x0), image.width());
    let x1 = clamp(scale.x(bbox.x1), image.width());
    let y0 = clamp(scale.y(bbox.top), image.height());
    let y1 = clamp(scale.y(bbox.bottom), image.height());

    for y in y0..y1 {
        for x in x0..x1 {
            image.get_pixel_mut(x, y).blend(&color);
        }
    }
}
