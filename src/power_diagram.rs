//! Power diagram of weighted points, built cell by cell.
//!
//! Eight breaker points at the corners of `[-E, E]³` are appended after the
//! input so that every input cell is bounded. Each cell starts as a large cube
//! around its generator and is clipped by the power bisectors of its
//! neighbours, nearest first, until no remaining point can reach it.

use log::{debug, info, warn};
use nalgebra::{Point3, Vector3};
use rayon::prelude::*;

use crate::convex_cell::{ConvexCell, FaceLabel};
use crate::error::OffsetError;
use crate::geometry::EPSILON;
use crate::points_searcher::PointsSearcher;
use crate::triangulation::Triangulation;
use crate::types::{VertexId, WeightedPoint};

/// Default breaker extent `E`
pub const DEFAULT_BOUND: f64 = 1e6;

/// Number of breaker points appended after the input
pub const NUM_BREAKERS: usize = 8;

#[derive(Debug, Clone, Copy)]
pub struct PowerDiagramOptions {
    /// Breaker extent `E`; input points should lie well inside `[-E, E]³`
    pub bound: f64,
}

impl Default for PowerDiagramOptions {
    fn default() -> Self {
        Self {
            bound: DEFAULT_BOUND,
        }
    }
}

/// Power diagram exposing its faces through [`Triangulation`].
///
/// Vertex ids `0..n` are the input points, `n..n + 8` the breakers. Only
/// input points with a non-empty cell have a position; breakers and hidden
/// points do not.
#[derive(Debug, Clone)]
pub struct PowerDiagram {
    points: Vec<WeightedPoint>,
    num_points: usize,
    cells: Vec<ConvexCell>,
}

/// Whether a face of the initial cube survived all clipping
fn reaches_bound(cell: &ConvexCell) -> bool {
    cell.faces().iter().any(|face| face.label == FaceLabel::Bound)
}

/// Shared read-only state while cells are being built
struct CellBuilder<'a> {
    points: &'a [WeightedPoint],
    num_points: usize,
    searcher: PointsSearcher,
    max_weight: f64,
    bound: f64,
}

impl CellBuilder<'_> {
    /// Cut the cell of `v` by the power bisector with `u`.
    /// Returns false if `u` hides `v` entirely.
    fn clip(&self, cell: &mut ConvexCell, v: VertexId, u: VertexId) -> bool {
        let (pv, pu) = (&self.points[v], &self.points[u]);
        let d: Vector3<f64> = pu.position() - pv.position();
        let distance = d.norm();

        if distance <= EPSILON * (1.0 + pv.position().coords.norm()) {
            // Coincident generators: the heavier one wins, then the earlier one
            let hidden = pu.w > pv.w || (pu.w == pv.w && u < v);
            if hidden {
                *cell = ConvexCell::default();
            }
            return !hidden;
        }

        let offset = (distance.mul_add(distance, pv.w) - pu.w) / (2.0 * distance);
        cell.clip(&(d / distance), offset, FaceLabel::Neighbor(u));
        !cell.is_empty()
    }

    /// Distance beyond which no point can cut `cell` of `v`
    fn security_radius(&self, cell: &ConvexCell, v: VertexId) -> f64 {
        let r = cell.max_radius();
        let dw = (self.max_weight - self.points[v].w).max(0.0);
        r + r.mul_add(r, dw).sqrt()
    }

    fn build(&self, v: VertexId) -> ConvexCell {
        let mut cell = ConvexCell::cube(4.0 * self.bound);
        for breaker in self.num_points..self.num_points + NUM_BREAKERS {
            if !self.clip(&mut cell, v, breaker) {
                return cell;
            }
        }

        let center = self.points[v].position();
        // Points at or within `done` were already applied
        let mut done = -1.0;
        let mut radius = self.searcher.spacing();
        loop {
            let found = self.searcher.find_within(&center, radius);
            for candidate in found.iter().filter(|c| c.index != v && c.value > done) {
                if candidate.value > self.security_radius(&cell, v) {
                    break;
                }
                if !self.clip(&mut cell, v, candidate.index) {
                    return cell;
                }
            }

            let security = self.security_radius(&cell, v);
            if security <= radius || found.len() == self.num_points {
                return cell;
            }
            done = radius;
            radius = (radius * 2.0).min(security);
        }
    }
}

impl PowerDiagram {
    /// Diagram of `points` with default options.
    ///
    /// # Errors
    /// Returns [`OffsetError::InvalidPoint`] for non-finite coordinates or
    /// negative/non-finite weights.
    pub fn new(points: &[WeightedPoint]) -> Result<Self, OffsetError> {
        Self::with_options(points, PowerDiagramOptions::default())
    }

    /// # Errors
    /// Returns [`OffsetError::InvalidPoint`] for a malformed point and
    /// [`OffsetError::InvalidBound`] unless the bound is finite and positive.
    pub fn with_options(
        points: &[WeightedPoint],
        options: PowerDiagramOptions,
    ) -> Result<Self, OffsetError> {
        let bound = options.bound;
        if !(bound.is_finite() && bound > 0.0) {
            return Err(OffsetError::InvalidBound(bound));
        }
        for (index, p) in points.iter().enumerate() {
            if !(p.x.is_finite() && p.y.is_finite() && p.z.is_finite()) {
                return Err(OffsetError::InvalidPoint {
                    index,
                    reason: "non-finite coordinate",
                });
            }
            if !(p.w.is_finite() && p.w >= 0.0) {
                return Err(OffsetError::InvalidPoint {
                    index,
                    reason: "weight must be finite and non-negative",
                });
            }
        }

        let outside = points
            .iter()
            .filter(|p| p.x.abs().max(p.y.abs()).max(p.z.abs()) >= bound)
            .count();
        if outside > 0 {
            warn!("{outside} points lie outside the breaker bound {bound}; their cells may be open");
        }

        let num_points = points.len();
        let mut all = points.to_vec();
        for corner in 0..NUM_BREAKERS {
            let sign = |bit: usize| if corner & bit == 0 { -bound } else { bound };
            all.push(WeightedPoint::unweighted(sign(1), sign(2), sign(4)));
        }

        let builder = CellBuilder {
            points: &all,
            num_points,
            searcher: PointsSearcher::new(points.iter().map(WeightedPoint::position).collect()),
            max_weight: points.iter().map(|p| p.w).fold(0.0, f64::max),
            bound,
        };
        let cells: Vec<ConvexCell> = (0..num_points)
            .into_par_iter()
            .map(|v| builder.build(v))
            .collect();

        let hidden = cells.iter().filter(|c| c.is_empty()).count();
        info!("Built power diagram of {num_points} points ({hidden} hidden)");
        let open = cells.iter().filter(|c| reaches_bound(c)).count();
        if open > 0 {
            warn!(
                "{open} cells reach the initial cube of half-size {}; faces on it are not integrated",
                4.0 * bound
            );
        }
        debug!(
            "Total faces: {}",
            cells.iter().map(|c| c.faces().len()).sum::<usize>()
        );

        Ok(Self {
            points: all,
            num_points,
            cells,
        })
    }

    /// Number of input points (breakers excluded)
    #[must_use]
    pub const fn num_points(&self) -> usize {
        self.num_points
    }

    /// Input points followed by the breakers
    #[must_use]
    pub fn points(&self) -> &[WeightedPoint] {
        &self.points
    }

    /// Cell of input point `v` in coordinates relative to it
    #[must_use]
    pub fn cell(&self, v: VertexId) -> Option<&ConvexCell> {
        self.cells.get(v)
    }

    /// Whether the cell of input point `v` still has a face of the initial
    /// cube, i.e. the breakers did not close it. Such faces are left out of
    /// [`Triangulation::incident_vertices`].
    #[must_use]
    pub fn reaches_bound(&self, v: VertexId) -> bool {
        self.cells.get(v).is_some_and(reaches_bound)
    }

    /// Whether input point `v` has an empty cell
    #[must_use]
    pub fn is_hidden(&self, v: VertexId) -> bool {
        self.cells.get(v).is_some_and(ConvexCell::is_empty)
    }
}

impl Triangulation for PowerDiagram {
    /// Generator and index of the face in its cell
    type Edge = (VertexId, usize);

    fn position(&self, v: VertexId) -> Option<Point3<f64>> {
        let cell = self.cells.get(v)?;
        (!cell.is_empty()).then(|| self.points[v].position())
    }

    fn incident_vertices(&self, v: VertexId) -> Vec<VertexId> {
        self.cells
            .get(v)
            .map(|cell| {
                cell.faces()
                    .iter()
                    .filter_map(|face| match face.label {
                        FaceLabel::Neighbor(u) => Some(u),
                        FaceLabel::Bound => None,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn edge(&self, v: VertexId, u: VertexId) -> Option<Self::Edge> {
        self.cells
            .get(v)?
            .faces()
            .iter()
            .position(|face| face.label == FaceLabel::Neighbor(u))
            .map(|slot| (v, slot))
    }

    fn dual_points(&self, edge: &Self::Edge) -> Vec<Point3<f64>> {
        let (v, slot) = *edge;
        let Some(face) = self.cells.get(v).and_then(|cell| cell.faces().get(slot)) else {
            return Vec::new();
        };
        let origin = self.points[v].position();
        face.polygon.iter().map(|p| origin + p).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn lattice(n: usize, spacing: f64) -> Vec<WeightedPoint> {
        let mut points = Vec::new();
        for i in 0..n {
            for j in 0..n {
                for k in 0..n {
                    #[allow(clippy::cast_precision_loss)]
                    points.push(WeightedPoint::unweighted(
                        i as f64 * spacing,
                        j as f64 * spacing,
                        k as f64 * spacing,
                    ));
                }
            }
        }
        points
    }

    #[test]
    fn lattice_center_cell_is_a_cube() {
        let diagram = PowerDiagram::new(&lattice(3, 2.0)).unwrap();
        // Index 13 is the center of the 3x3x3 lattice
        let cell = diagram.cell(13).unwrap();
        assert_relative_eq!(cell.volume(), 8.0, epsilon = 1e-9);
        let mut neighbors = diagram.incident_vertices(13);
        neighbors.sort_unstable();
        assert_eq!(neighbors, vec![4, 10, 12, 14, 16, 22]);

        let edge = diagram.edge(13, 14).unwrap();
        let face = diagram.dual_points(&edge);
        assert_eq!(face.len(), 4);
        for p in face {
            assert_relative_eq!(p.z, 3.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn breakers_bound_the_hull() {
        let options = PowerDiagramOptions { bound: 100.0 };
        let diagram = PowerDiagram::with_options(&lattice(2, 1.0), options).unwrap();
        assert_eq!(diagram.points().len(), 8 + NUM_BREAKERS);
        let neighbors = diagram.incident_vertices(0);
        assert!(neighbors.iter().any(|&u| u >= diagram.num_points()));
        assert!(diagram.cell(0).unwrap().max_radius() < 400.0);
        assert!(diagram.position(8).is_none());
    }

    #[test]
    fn open_cells_are_reported() {
        let options = PowerDiagramOptions { bound: 1.0 };
        // Outside the breakers nothing closes the cell on its far side
        let outside = [
            WeightedPoint::unweighted(0.0, 0.0, 0.0),
            WeightedPoint::unweighted(3.0, 0.0, 0.0),
        ];
        let diagram = PowerDiagram::with_options(&outside, options).unwrap();
        assert!(!diagram.reaches_bound(0));
        assert!(diagram.reaches_bound(1));

        // Breaker bisectors of a heavy point lie beyond the initial cube
        let heavy = [
            WeightedPoint::new(0.0, 0.0, 0.0, 1000.0),
            WeightedPoint::unweighted(0.5, 0.0, 0.0),
        ];
        let diagram = PowerDiagram::with_options(&heavy, options).unwrap();
        assert!(diagram.reaches_bound(0));
        assert!(diagram.is_hidden(1));
        assert!(!diagram.reaches_bound(1));
        assert!(diagram.incident_vertices(0).is_empty());

        let closed = PowerDiagram::new(&lattice(2, 1.0)).unwrap();
        assert!((0..8).all(|v| !closed.reaches_bound(v)));
    }

    #[test]
    fn heavy_point_hides_neighbor() {
        let mut points = vec![WeightedPoint::unweighted(0.0, 0.0, 0.0)];
        for axis in 0..3 {
            for sign in [-1.0, 1.0] {
                let mut p = [0.0; 3];
                p[axis] = sign;
                points.push(WeightedPoint::new(p[0], p[1], p[2], 10.0));
            }
        }
        let diagram = PowerDiagram::new(&points).unwrap();
        assert!(diagram.is_hidden(0));
        assert!(diagram.position(0).is_none());
        assert!(diagram.position(1).is_some());
        assert!(diagram.edge(1, 0).is_none());
    }

    #[test]
    fn later_duplicate_is_hidden() {
        let points = [
            WeightedPoint::unweighted(0.0, 0.0, 0.0),
            WeightedPoint::unweighted(1.0, 0.0, 0.0),
            WeightedPoint::unweighted(0.0, 0.0, 0.0),
        ];
        let diagram = PowerDiagram::new(&points).unwrap();
        assert!(!diagram.is_hidden(0));
        assert!(diagram.is_hidden(2));
    }

    #[test]
    fn invalid_input_is_rejected() {
        let nan = [WeightedPoint::unweighted(f64::NAN, 0.0, 0.0)];
        assert!(matches!(
            PowerDiagram::new(&nan),
            Err(OffsetError::InvalidPoint { index: 0, .. })
        ));
        let negative = [
            WeightedPoint::unweighted(0.0, 0.0, 0.0),
            WeightedPoint::new(1.0, 0.0, 0.0, -1.0),
        ];
        assert!(matches!(
            PowerDiagram::new(&negative),
            Err(OffsetError::InvalidPoint { index: 1, .. })
        ));
        assert_eq!(
            PowerDiagram::with_options(&[], PowerDiagramOptions { bound: 0.0 }).unwrap_err(),
            OffsetError::InvalidBound(0.0)
        );
    }
}
