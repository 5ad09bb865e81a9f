//! Convex polyhedral cell, cut down one half-space at a time.
//!
//! Coordinates are local to the cell's generator. Each face remembers what
//! produced it so that the power diagram can expose faces as dual edges.

use nalgebra::Vector3;

use crate::geometry::{EPSILON, any_normal_of_vector};
use crate::types::VertexId;

/// Origin of a cell face
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaceLabel {
    /// Power bisector with this point
    Neighbor(VertexId),
    /// Side of the initial bounding cube
    Bound,
}

#[derive(Debug, Clone)]
pub struct Face {
    pub label: FaceLabel,
    /// Convex polygon, counterclockwise seen from outside the cell
    pub polygon: Vec<Vector3<f64>>,
}

#[derive(Debug, Clone, Default)]
pub struct ConvexCell {
    faces: Vec<Face>,
}

impl ConvexCell {
    /// Axis-aligned cube `[-half, half]³`
    #[must_use]
    pub fn cube(half: f64) -> Self {
        let corner = |x: f64, y: f64, z: f64| Vector3::new(x * half, y * half, z * half);
        let quads = [
            [(1., -1., -1.), (1., 1., -1.), (1., 1., 1.), (1., -1., 1.)],
            [(-1., -1., -1.), (-1., -1., 1.), (-1., 1., 1.), (-1., 1., -1.)],
            [(-1., 1., -1.), (-1., 1., 1.), (1., 1., 1.), (1., 1., -1.)],
            [(-1., -1., -1.), (1., -1., -1.), (1., -1., 1.), (-1., -1., 1.)],
            [(-1., -1., 1.), (1., -1., 1.), (1., 1., 1.), (-1., 1., 1.)],
            [(-1., -1., -1.), (-1., 1., -1.), (1., 1., -1.), (1., -1., -1.)],
        ];
        let faces = quads
            .iter()
            .map(|quad| Face {
                label: FaceLabel::Bound,
                polygon: quad.iter().map(|&(x, y, z)| corner(x, y, z)).collect(),
            })
            .collect();
        Self { faces }
    }

    #[must_use]
    pub fn faces(&self) -> &[Face] {
        &self.faces
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    /// Largest distance from the generator to a cell vertex
    #[must_use]
    pub fn max_radius(&self) -> f64 {
        self.vertices().map(Vector3::norm).fold(0.0, f64::max)
    }

    fn vertices(&self) -> impl Iterator<Item = &Vector3<f64>> {
        self.faces.iter().flat_map(|face| face.polygon.iter())
    }

    /// Volume via a fan from the generator (which need not lie inside)
    #[must_use]
    pub fn volume(&self) -> f64 {
        self.faces
            .iter()
            .map(|face| {
                let p0 = face.polygon[0];
                face.polygon[1..]
                    .windows(2)
                    .map(|w| p0.dot(&w[0].cross(&w[1])) / 6.0)
                    .sum::<f64>()
            })
            .sum::<f64>()
            .abs()
    }

    /// Keep the part with `p · normal <= offset`; `normal` must be unit length.
    /// Returns whether the cell changed.
    pub fn clip(&mut self, normal: &Vector3<f64>, offset: f64, label: FaceLabel) -> bool {
        let tolerance = EPSILON * (1.0 + offset.abs());
        let above = |p: &Vector3<f64>| p.dot(normal) - offset;

        if self.vertices().all(|p| above(p) <= tolerance) {
            return false;
        }

        let mut cut = Vec::new();
        let mut faces = Vec::with_capacity(self.faces.len() + 1);
        for face in self.faces.drain(..) {
            let n = face.polygon.len();
            let mut polygon = Vec::with_capacity(n + 1);
            for i in 0..n {
                let (p, q) = (face.polygon[i], face.polygon[(i + 1) % n]);
                let (dp, dq) = (above(&p), above(&q));
                let on_plane = |d: f64| d.abs() <= tolerance;
                if dp <= tolerance {
                    polygon.push(p);
                    if on_plane(dp) {
                        cut.push(p);
                    }
                }
                // Strict crossing; vertices on the plane were handled above
                if (dp < 0.0) != (dq < 0.0) && !on_plane(dp) && !on_plane(dq) {
                    let crossing = p + (q - p) * (dp / (dp - dq));
                    polygon.push(crossing);
                    cut.push(crossing);
                }
            }
            if polygon.len() >= 3 {
                faces.push(Face {
                    label: face.label,
                    polygon,
                });
            }
        }

        if let Some(polygon) = cap(&cut, normal, tolerance) {
            faces.push(Face { label, polygon });
        }
        self.faces = faces;
        if self.faces.len() < 4 {
            self.faces.clear();
        }
        true
    }
}

/// Order the points of a planar cut counterclockwise around `normal`,
/// merging near duplicates
fn cap(points: &[Vector3<f64>], normal: &Vector3<f64>, tolerance: f64) -> Option<Vec<Vector3<f64>>> {
    let mut unique: Vec<Vector3<f64>> = Vec::with_capacity(points.len());
    for p in points {
        if !unique.iter().any(|q| (p - q).norm() <= tolerance) {
            unique.push(*p);
        }
    }
    if unique.len() < 3 {
        return None;
    }

    #[allow(clippy::cast_precision_loss)]
    let center = unique.iter().sum::<Vector3<f64>>() / unique.len() as f64;
    let e1 = any_normal_of_vector(normal);
    let e2 = normal.cross(&e1);
    let mut keyed: Vec<(f64, Vector3<f64>)> = unique
        .into_iter()
        .map(|p| {
            let d = p - center;
            (d.dot(&e2).atan2(d.dot(&e1)), p)
        })
        .collect();
    keyed.sort_by(|a, b| a.0.total_cmp(&b.0));
    let polygon: Vec<Vector3<f64>> = keyed.into_iter().map(|(_, p)| p).collect();

    let area = polygon[1..]
        .windows(2)
        .map(|w| (w[0] - polygon[0]).cross(&(w[1] - polygon[0])).norm())
        .sum::<f64>();
    (area > tolerance * tolerance).then_some(polygon)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn cube_volume() {
        let cell = ConvexCell::cube(1.0);
        assert_relative_eq!(cell.volume(), 8.0, epsilon = 1e-12);
        assert_relative_eq!(cell.max_radius(), 3f64.sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn clip_in_half() {
        let mut cell = ConvexCell::cube(1.0);
        assert!(cell.clip(&Vector3::new(1.0, 0.0, 0.0), 0.0, FaceLabel::Neighbor(3)));
        assert_relative_eq!(cell.volume(), 4.0, epsilon = 1e-12);
        assert_eq!(cell.faces().len(), 6);
        let cap = cell
            .faces()
            .iter()
            .find(|f| f.label == FaceLabel::Neighbor(3))
            .unwrap();
        assert_eq!(cap.polygon.len(), 4);
        for p in &cap.polygon {
            assert_relative_eq!(p.x, 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn clip_corner() {
        let mut cell = ConvexCell::cube(1.0);
        let normal = Vector3::new(1.0, 1.0, 1.0).normalize();
        // Plane through (1, 1, 0), (1, 0, 1), (0, 1, 1) cuts off a corner tetrahedron
        cell.clip(&normal, 2.0 / 3f64.sqrt(), FaceLabel::Neighbor(0));
        assert_relative_eq!(cell.volume(), 8.0 - 1.0 / 6.0, epsilon = 1e-12);
        assert_eq!(cell.faces().len(), 7);
    }

    #[test]
    fn clip_outside_is_noop() {
        let mut cell = ConvexCell::cube(1.0);
        assert!(!cell.clip(&Vector3::new(0.0, 0.0, 1.0), 1.0, FaceLabel::Neighbor(1)));
        assert!(!cell.clip(&Vector3::new(0.0, 0.0, 1.0), 5.0, FaceLabel::Neighbor(1)));
        assert_eq!(cell.faces().len(), 6);
    }

    #[test]
    fn clip_everything() {
        let mut cell = ConvexCell::cube(1.0);
        cell.clip(&Vector3::new(0.0, 1.0, 0.0), -2.0, FaceLabel::Neighbor(1));
        assert!(cell.is_empty());
        assert_relative_eq!(cell.volume(), 0.0);
    }
}
