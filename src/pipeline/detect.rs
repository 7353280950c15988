//! Lattice table detection: ruling edges → intersections → cells → tables.
//!
//! A page "has a table" when its drawn ruling lines enclose at least two
//! adjacent rectangular cells. The pipeline is:
//!
//! ```text
//! edges ──▶ snap ──▶ join ──▶ length filter ──▶ intersections ──▶ cells ──▶ tables
//! ```
//!
//! 1. **snap**: nearly-collinear parallel edges are moved onto their
//!    cluster's mean position so slightly misaligned strokes line up.
//! 2. **join**: collinear segments with small gaps merge into one edge.
//! 3. **filter**: edges shorter than `edge_min_length` are dropped.
//! 4. **intersections**: every crossing of a horizontal and a vertical
//!    edge, remembering which edges pass through it.
//! 5. **cells**: for each intersection, the smallest rectangle whose four
//!    corners are intersections connected by shared edges.
//! 6. **tables**: cells sharing a corner are grouped; groups with fewer
//!    than `min_cells` cells are discarded.
//!
//! Everything here is pure geometry, so it is tested without a PDF engine.

use super::edges::{BBox, Edge, Orientation};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Tolerances for table detection.
///
/// All distances are in PDF points and default to 3.0. Fields missing from
/// a serialized form take their default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableSettings {
    /// Horizontal edges within this vertical distance snap together.
    pub snap_y_tolerance: f64,
    /// Vertical edges within this horizontal distance snap together.
    pub snap_x_tolerance: f64,
    /// Collinear horizontal segments separated by at most this gap are joined.
    pub join_x_tolerance: f64,
    /// Collinear vertical segments separated by at most this gap are joined.
    pub join_y_tolerance: f64,
    /// Edges shorter than this after joining are ignored.
    pub edge_min_length: f64,
    /// Slack when testing whether a vertical edge reaches a horizontal one.
    pub intersection_x_tolerance: f64,
    /// Slack when testing whether a horizontal edge reaches a vertical one.
    pub intersection_y_tolerance: f64,
    /// Minimum number of cells for a group of cells to count as a table.
    pub min_cells: usize,
}

impl Default for TableSettings {
    fn default() -> Self {
        Self {
            snap_y_tolerance: 3.0,
            snap_x_tolerance: 3.0,
            join_x_tolerance: 3.0,
            join_y_tolerance: 3.0,
            edge_min_length: 3.0,
            intersection_x_tolerance: 3.0,
            intersection_y_tolerance: 3.0,
            min_cells: 2,
        }
    }
}

/// A point where a horizontal and a vertical edge cross.
#[derive(Debug, Clone, PartialEq)]
pub struct Intersection {
    pub x: f64,
    pub y: f64,
    /// Indices (into the merged edge list) of horizontal edges through this point.
    horizontals: Vec<usize>,
    /// Indices of vertical edges through this point.
    verticals: Vec<usize>,
}

/// A detected table region.
#[derive(Debug, Clone, PartialEq)]
pub struct TableRegion {
    /// Union of all cell boxes.
    pub bbox: BBox,
    /// Cell boxes, top-to-bottom then left-to-right.
    pub cells: Vec<BBox>,
}

/// Everything the detector found on one page.
///
/// The intermediate stages are kept so the page can be annotated the way a
/// debugging table finder draws them.
#[derive(Debug, Clone, Default)]
pub struct Detection {
    /// Merged edges that survived the length filter.
    pub edges: Vec<Edge>,
    pub intersections: Vec<Intersection>,
    /// Every cell found, including cells of discarded single-cell groups.
    pub cells: Vec<BBox>,
    pub tables: Vec<TableRegion>,
}

impl Detection {
    /// `true` when at least one table was found.
    pub fn has_tables(&self) -> bool {
        !self.tables.is_empty()
    }
}

/// Run the full lattice pipeline over a page's raw edges.
pub fn detect_tables(edges: Vec<Edge>, settings: &TableSettings) -> Detection {
    let snapped = snap_edges(edges, settings.snap_x_tolerance, settings.snap_y_tolerance);
    let joined = join_edges(snapped, settings.join_x_tolerance, settings.join_y_tolerance);
    let edges: Vec<Edge> = joined
        .into_iter()
        .filter(|e| e.length() >= settings.edge_min_length)
        .collect();

    let intersections = edges_to_intersections(
        &edges,
        settings.intersection_x_tolerance,
        settings.intersection_y_tolerance,
    );
    let cells = intersections_to_cells(&intersections);
    let tables = cells_to_tables(&cells, settings.min_cells);

    Detection {
        edges,
        intersections,
        cells,
        tables,
    }
}

/// Snap nearby parallel edges onto shared positions.
///
/// Horizontal edges are clustered by `top`, vertical edges by `x0`. A value
/// joins the current cluster when it lies within `tolerance` of the previous
/// value, so clusters can chain. Each member then takes the cluster mean.
pub fn snap_edges(edges: Vec<Edge>, x_tolerance: f64, y_tolerance: f64) -> Vec<Edge> {
    let (mut horizontals, mut verticals): (Vec<Edge>, Vec<Edge>) = edges
        .into_iter()
        .partition(|e| e.orientation == Orientation::Horizontal);

    snap_group(&mut horizontals, y_tolerance, |e| e.top, |e, v| {
        e.top = v;
        e.bottom = v;
    });
    snap_group(&mut verticals, x_tolerance, |e| e.x0, |e, v| {
        e.x0 = v;
        e.x1 = v;
    });

    horizontals.extend(verticals);
    horizontals
}

fn snap_group<K, S>(edges: &mut [Edge], tolerance: f64, key: K, mut set: S)
where
    K: Fn(&Edge) -> f64,
    S: FnMut(&mut Edge, f64),
{
    if edges.is_empty() {
        return;
    }
    edges.sort_by(|a, b| key(a).total_cmp(&key(b)));

    let mut start = 0;
    for i in 1..=edges.len() {
        let boundary = i == edges.len() || key(&edges[i]) > key(&edges[i - 1]) + tolerance;
        if boundary {
            let sum: f64 = edges[start..i].iter().map(&key).sum();
            let mean = sum / (i - start) as f64;
            for edge in &mut edges[start..i] {
                set(edge, mean);
            }
            start = i;
        }
    }
}

/// Merge collinear segments whose gap is within the join tolerance.
pub fn join_edges(edges: Vec<Edge>, x_tolerance: f64, y_tolerance: f64) -> Vec<Edge> {
    let (horizontals, verticals): (Vec<Edge>, Vec<Edge>) = edges
        .into_iter()
        .partition(|e| e.orientation == Orientation::Horizontal);

    let mut result = join_collinear(
        horizontals,
        |e| e.top,
        |e| (e.x0, e.x1),
        |proto, start, end| Edge::horizontal(proto.top, start, end),
        x_tolerance,
    );
    result.extend(join_collinear(
        verticals,
        |e| e.x0,
        |e| (e.top, e.bottom),
        |proto, start, end| Edge::vertical(proto.x0, start, end),
        y_tolerance,
    ));
    result
}

fn join_collinear<K, S, B>(mut edges: Vec<Edge>, key: K, span: S, build: B, tolerance: f64) -> Vec<Edge>
where
    K: Fn(&Edge) -> f64,
    S: Fn(&Edge) -> (f64, f64),
    B: Fn(&Edge, f64, f64) -> Edge,
{
    edges.sort_by(|a, b| {
        key(a)
            .total_cmp(&key(b))
            .then_with(|| span(a).0.total_cmp(&span(b).0))
    });

    let mut result = Vec::new();
    let mut i = 0;
    while i < edges.len() {
        let line = key(&edges[i]);
        let mut j = i + 1;
        while j < edges.len() && key(&edges[j]) == line {
            j += 1;
        }

        let (mut cur_start, mut cur_end) = span(&edges[i]);
        for edge in &edges[i + 1..j] {
            let (s, e) = span(edge);
            if s <= cur_end + tolerance {
                cur_end = cur_end.max(e);
            } else {
                result.push(build(&edges[i], cur_start, cur_end));
                cur_start = s;
                cur_end = e;
            }
        }
        result.push(build(&edges[i], cur_start, cur_end));
        i = j;
    }
    result
}

/// Find every crossing of a horizontal and a vertical edge.
///
/// Intersections are returned sorted by `(x, y)`, one per distinct point.
pub fn edges_to_intersections(edges: &[Edge], x_tolerance: f64, y_tolerance: f64) -> Vec<Intersection> {
    let mut points: BTreeMap<(i64, i64), Intersection> = BTreeMap::new();

    for (vi, v) in edges.iter().enumerate() {
        if v.orientation != Orientation::Vertical {
            continue;
        }
        for (hi, h) in edges.iter().enumerate() {
            if h.orientation != Orientation::Horizontal {
                continue;
            }
            let crosses = v.top <= h.top + y_tolerance
                && v.bottom >= h.top - y_tolerance
                && v.x0 >= h.x0 - x_tolerance
                && v.x0 <= h.x1 + x_tolerance;
            if !crosses {
                continue;
            }
            let point = points
                .entry((float_key(v.x0), float_key(h.top)))
                .or_insert_with(|| Intersection {
                    x: v.x0,
                    y: h.top,
                    horizontals: Vec::new(),
                    verticals: Vec::new(),
                });
            point.horizontals.push(hi);
            point.verticals.push(vi);
        }
    }

    points
        .into_values()
        .map(|mut p| {
            p.horizontals.sort_unstable();
            p.horizontals.dedup();
            p.verticals.sort_unstable();
            p.verticals.dedup();
            p
        })
        .collect()
}

/// Build the smallest cell anchored at each intersection.
///
/// A cell anchored at `p` needs a point below `p` and a point right of `p`,
/// both joined to `p` by a common edge, and a bottom-right corner joined to
/// both of those.
pub fn intersections_to_cells(intersections: &[Intersection]) -> Vec<BBox> {
    let index: HashMap<(i64, i64), usize> = intersections
        .iter()
        .enumerate()
        .map(|(i, p)| ((float_key(p.x), float_key(p.y)), i))
        .collect();

    let connects = |a: &Intersection, b: &Intersection| -> bool {
        if float_key(a.x) == float_key(b.x) && shares(&a.verticals, &b.verticals) {
            return true;
        }
        float_key(a.y) == float_key(b.y) && shares(&a.horizontals, &b.horizontals)
    };

    let mut cells = Vec::new();
    for (i, pt) in intersections.iter().enumerate() {
        let rest = &intersections[i + 1..];
        let below: Vec<&Intersection> = rest
            .iter()
            .filter(|p| float_key(p.x) == float_key(pt.x))
            .collect();
        let right: Vec<&Intersection> = rest
            .iter()
            .filter(|p| float_key(p.y) == float_key(pt.y))
            .collect();

        'search: for below_pt in &below {
            if !connects(pt, below_pt) {
                continue;
            }
            for right_pt in &right {
                if !connects(pt, right_pt) {
                    continue;
                }
                let corner = index
                    .get(&(float_key(right_pt.x), float_key(below_pt.y)))
                    .map(|&k| &intersections[k]);
                if let Some(corner) = corner {
                    if connects(corner, right_pt) && connects(corner, below_pt) {
                        cells.push(BBox::new(pt.x, pt.y, corner.x, corner.y));
                        break 'search;
                    }
                }
            }
        }
    }
    cells
}

fn shares(a: &[usize], b: &[usize]) -> bool {
    a.iter().any(|x| b.contains(x))
}

/// Group cells that share a corner into tables.
///
/// Tables are ordered top-to-bottom, then left-to-right; groups smaller
/// than `min_cells` are dropped.
pub fn cells_to_tables(cells: &[BBox], min_cells: usize) -> Vec<TableRegion> {
    let n = cells.len();
    let mut parent: Vec<usize> = (0..n).collect();

    fn find(parent: &mut [usize], mut i: usize) -> usize {
        while parent[i] != i {
            parent[i] = parent[parent[i]];
            i = parent[i];
        }
        i
    }

    let mut corner_owner: HashMap<(i64, i64), usize> = HashMap::new();
    for (i, cell) in cells.iter().enumerate() {
        for corner in corners(cell) {
            match corner_owner.get(&corner) {
                Some(&other) => {
                    let ra = find(&mut parent, i);
                    let rb = find(&mut parent, other);
                    if ra != rb {
                        parent[rb] = ra;
                    }
                }
                None => {
                    corner_owner.insert(corner, i);
                }
            }
        }
    }

    let mut groups: HashMap<usize, Vec<usize>> = HashMap::new();
    for i in 0..n {
        let root = find(&mut parent, i);
        groups.entry(root).or_default().push(i);
    }

    let mut tables: Vec<TableRegion> = groups
        .into_values()
        .filter(|members| members.len() >= min_cells.max(1))
        .map(|members| {
            let mut group: Vec<BBox> = members.iter().map(|&i| cells[i]).collect();
            group.sort_by(|a, b| a.top.total_cmp(&b.top).then_with(|| a.x0.total_cmp(&b.x0)));
            let bbox = group[1..].iter().fold(group[0], |acc, c| acc.union(c));
            TableRegion { bbox, cells: group }
        })
        .collect();

    tables.sort_by(|a, b| {
        a.bbox
            .top
            .total_cmp(&b.bbox.top)
            .then_with(|| a.bbox.x0.total_cmp(&b.bbox.x0))
    });
    tables
}

fn corners(cell: &BBox) -> [(i64, i64); 4] {
    let (x0, x1) = (float_key(cell.x0), float_key(cell.x1));
    let (top, bottom) = (float_key(cell.top), float_key(cell.bottom));
    [(x0, top), (x0, bottom), (x1, top), (x1, bottom)]
}

/// Integer key for exact-after-snapping float comparison (3 decimal places).
fn float_key(v: f64) -> i64 {
    (v * 1000.0).round() as i64
}
