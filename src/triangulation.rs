//! Read-only view of a weighted Delaunay triangulation / power diagram.
//!
//! The integration engine only needs four queries: a vertex position, the
//! vertices incident to it, the edge between two incident vertices and the
//! cyclic list of dual points bounding the power-diagram face of that edge.

use nalgebra::Point3;

use crate::error::OffsetError;
use crate::types::VertexId;

/// Adapter over a triangulation as consumed by the integration engine.
///
/// Implementations must be reentrant on their read path: the batch helpers
/// query one instance from many threads at once.
pub trait Triangulation {
    /// Edge descriptor, opaque to the engine
    type Edge;

    /// Position of `v`, or `None` if `v` is not a vertex
    fn position(&self, v: VertexId) -> Option<Point3<f64>>;

    /// Vertices sharing a triangulation edge (or a candidate edge) with `v`
    fn incident_vertices(&self, v: VertexId) -> Vec<VertexId>;

    /// Edge `(v, u)` if it currently exists
    fn edge(&self, v: VertexId, u: VertexId) -> Option<Self::Edge>;

    /// Boundary vertices of the power-diagram face dual to `edge`, in cyclic order
    fn dual_points(&self, edge: &Self::Edge) -> Vec<Point3<f64>>;
}

#[derive(Debug, Clone)]
struct Incidence {
    neighbor: VertexId,
    face: Option<Vec<Point3<f64>>>,
}

/// Explicit power-diagram description: vertices and their faces given by hand.
///
/// Useful when the diagram comes from elsewhere, and for small synthetic cells.
#[derive(Debug, Clone, Default)]
pub struct FaceTable {
    positions: Vec<Point3<f64>>,
    incidences: Vec<Vec<Incidence>>,
}

impl FaceTable {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            positions: Vec::new(),
            incidences: Vec::new(),
        }
    }

    pub fn add_vertex(&mut self, position: Point3<f64>) -> VertexId {
        self.positions.push(position);
        self.incidences.push(Vec::new());
        self.positions.len() - 1
    }

    /// Record the face shared by `v` and `u` (both sides see the same dual points).
    ///
    /// # Errors
    /// Returns [`OffsetError::UnknownVertex`] if either vertex was never added.
    pub fn add_face(
        &mut self,
        v: VertexId,
        u: VertexId,
        dual_points: Vec<Point3<f64>>,
    ) -> Result<(), OffsetError> {
        self.check(v)?;
        self.check(u)?;
        self.set(v, u, Some(dual_points.clone()));
        self.set(u, v, Some(dual_points));
        Ok(())
    }

    /// Mark `u` as incident to `v` without an edge between them, as happens
    /// transiently while a triangulation is being modified.
    ///
    /// # Errors
    /// Returns [`OffsetError::UnknownVertex`] if either vertex was never added.
    pub fn add_neighbor(&mut self, v: VertexId, u: VertexId) -> Result<(), OffsetError> {
        self.check(v)?;
        self.check(u)?;
        if !self.incidences[v].iter().any(|inc| inc.neighbor == u) {
            self.set(v, u, None);
        }
        Ok(())
    }

    #[must_use]
    pub fn num_vertices(&self) -> usize {
        self.positions.len()
    }

    fn check(&self, v: VertexId) -> Result<(), OffsetError> {
        if v < self.positions.len() {
            Ok(())
        } else {
            Err(OffsetError::UnknownVertex(v))
        }
    }

    fn set(&mut self, v: VertexId, u: VertexId, face: Option<Vec<Point3<f64>>>) {
        let list = &mut self.incidences[v];
        if let Some(inc) = list.iter_mut().find(|inc| inc.neighbor == u) {
            inc.face = face;
        } else {
            list.push(Incidence { neighbor: u, face });
        }
    }
}

impl Triangulation for FaceTable {
    type Edge = (VertexId, usize);

    fn position(&self, v: VertexId) -> Option<Point3<f64>> {
        self.positions.get(v).copied()
    }

    fn incident_vertices(&self, v: VertexId) -> Vec<VertexId> {
        self.incidences
            .get(v)
            .map(|list| list.iter().map(|inc| inc.neighbor).collect())
            .unwrap_or_default()
    }

    fn edge(&self, v: VertexId, u: VertexId) -> Option<Self::Edge> {
        self.incidences
            .get(v)?
            .iter()
            .position(|inc| inc.neighbor == u && inc.face.is_some())
            .map(|slot| (v, slot))
    }

    fn dual_points(&self, edge: &Self::Edge) -> Vec<Point3<f64>> {
        self.incidences
            .get(edge.0)
            .and_then(|list| list.get(edge.1))
            .and_then(|inc| inc.face.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn faces_are_visible_from_both_sides() {
        let mut table = FaceTable::new();
        let v = table.add_vertex(Point3::origin());
        let u = table.add_vertex(Point3::new(2.0, 0.0, 0.0));
        let square = vec![
            Point3::new(1.0, -1.0, -1.0),
            Point3::new(1.0, 1.0, -1.0),
            Point3::new(1.0, 1.0, 1.0),
            Point3::new(1.0, -1.0, 1.0),
        ];
        table.add_face(v, u, square.clone()).unwrap();

        assert_eq!(table.incident_vertices(v), vec![u]);
        assert_eq!(table.incident_vertices(u), vec![v]);
        let edge = table.edge(u, v).unwrap();
        assert_eq!(table.dual_points(&edge), square);
    }

    #[test]
    fn neighbor_without_face_is_not_an_edge() {
        let mut table = FaceTable::new();
        let v = table.add_vertex(Point3::origin());
        let u = table.add_vertex(Point3::new(1.0, 0.0, 0.0));
        table.add_neighbor(v, u).unwrap();
        assert_eq!(table.incident_vertices(v), vec![u]);
        assert!(table.edge(v, u).is_none());
    }

    #[test]
    fn unknown_vertices_are_rejected() {
        let mut table = FaceTable::new();
        let v = table.add_vertex(Point3::origin());
        assert_eq!(
            table.add_face(v, 7, Vec::new()),
            Err(OffsetError::UnknownVertex(7))
        );
        assert!(table.position(7).is_none());
    }
}
