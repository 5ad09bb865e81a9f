//! Integrators accumulate tetrahedra `(0, a, b, c)` emitted by a subdivider.

use nalgebra::{Point3, Vector3};

use crate::geometry::{tetrahedron_volume, triple_product};
use crate::types::{CovarianceVector, TriangleMesh};

/// Accumulates a result from tetrahedra with apex at the integrated vertex.
pub trait Integrator {
    type Output;

    /// Fresh accumulator for the vertex at `center`
    fn new(center: Point3<f64>) -> Self;

    /// Add the tetrahedron whose vertices are the apex, `a`, `b` and `c`
    fn aggregate(&mut self, a: &Vector3<f64>, b: &Vector3<f64>, c: &Vector3<f64>);

    /// Accumulated value so far (does not reset)
    fn result(&self) -> &Self::Output;

    fn into_result(self) -> Self::Output;
}

/// Sum of tetrahedron volumes
#[derive(Debug, Clone)]
pub struct VolumeIntegrator {
    volume: f64,
}

impl Integrator for VolumeIntegrator {
    type Output = f64;

    fn new(_center: Point3<f64>) -> Self {
        Self { volume: 0.0 }
    }

    fn aggregate(&mut self, a: &Vector3<f64>, b: &Vector3<f64>, c: &Vector3<f64>) {
        self.volume += tetrahedron_volume(a, b, c);
    }

    fn result(&self) -> &f64 {
        &self.volume
    }

    fn into_result(self) -> f64 {
        self.volume
    }
}

/// Second moments of the region about the apex
#[derive(Debug, Clone)]
pub struct CovarianceIntegrator {
    moments: CovarianceVector,
}

impl CovarianceIntegrator {
    /// Closed-form moment terms of one tetrahedron with a vertex at the origin.
    ///
    /// Each term is the tetrahedron volume times a symmetric quadratic form in
    /// the coordinates, i.e. ten times `∫ x_i x_j dV`.
    #[allow(clippy::many_single_char_names)]
    fn moments(a: &Vector3<f64>, b: &Vector3<f64>, c: &Vector3<f64>) -> CovarianceVector {
        let det60 = triple_product(a, b, c).abs() / 6.0;
        let diagonal = |i: usize| {
            let (p, q, r) = (a[i], b[i], c[i]);
            p * p + p * q + p * r + q * q + q * r + r * r
        };
        let mixed = |i: usize, j: usize| {
            let (p, q, r) = (a[i], b[i], c[i]);
            let (s, t, u) = (a[j], b[j], c[j]);
            p * s + q * t + r * u + (p * t + p * u + q * s + q * u + r * s + r * t) / 2.0
        };
        CovarianceVector([
            diagonal(0) * det60,
            mixed(0, 1) * det60,
            mixed(0, 2) * det60,
            diagonal(1) * det60,
            mixed(1, 2) * det60,
            diagonal(2) * det60,
        ])
    }
}

impl Integrator for CovarianceIntegrator {
    type Output = CovarianceVector;

    fn new(_center: Point3<f64>) -> Self {
        Self {
            moments: CovarianceVector::zeros(),
        }
    }

    fn aggregate(&mut self, a: &Vector3<f64>, b: &Vector3<f64>, c: &Vector3<f64>) {
        self.moments += Self::moments(a, b, c);
    }

    fn result(&self) -> &CovarianceVector {
        &self.moments
    }

    fn into_result(self) -> CovarianceVector {
        self.moments
    }
}

/// Collects the emitted triangles, translated back to absolute coordinates
#[derive(Debug, Clone)]
pub struct MeshIntegrator {
    center: Point3<f64>,
    mesh: TriangleMesh,
}

impl Integrator for MeshIntegrator {
    type Output = TriangleMesh;

    fn new(center: Point3<f64>) -> Self {
        Self {
            center,
            mesh: TriangleMesh::new(),
        }
    }

    fn aggregate(&mut self, a: &Vector3<f64>, b: &Vector3<f64>, c: &Vector3<f64>) {
        self.mesh
            .append_triangle(self.center + a, self.center + b, self.center + c);
    }

    fn result(&self) -> &TriangleMesh {
        &self.mesh
    }

    fn into_result(self) -> TriangleMesh {
        self.mesh
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn unit_corner() -> (Vector3<f64>, Vector3<f64>, Vector3<f64>) {
        (
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(0.0, 1.0, 0.0),
            Vector3::new(0.0, 0.0, 1.0),
        )
    }

    #[test]
    fn volume_ignores_orientation() {
        let (a, b, c) = unit_corner();
        let mut ig = VolumeIntegrator::new(Point3::origin());
        ig.aggregate(&a, &b, &c);
        ig.aggregate(&a, &c, &b);
        assert_relative_eq!(*ig.result(), 2.0 / 6.0);
    }

    #[test]
    fn covariance_of_unit_corner_tetrahedron() {
        // ∫x² over the corner tetrahedron is 1/60 and ∫xy is 1/120
        let (a, b, c) = unit_corner();
        let mut ig = CovarianceIntegrator::new(Point3::origin());
        ig.aggregate(&a, &b, &c);
        let m = ig.result();
        assert_relative_eq!(m.m11(), 10.0 / 60.0, epsilon = 1e-12);
        assert_relative_eq!(m.0[1], 10.0 / 120.0, epsilon = 1e-12);
        assert_relative_eq!(m.m22(), m.m33(), epsilon = 1e-12);
    }

    #[test]
    fn covariance_is_symmetric_in_permutation() {
        let a = Vector3::new(0.3, -0.2, 0.9);
        let b = Vector3::new(-0.5, 0.4, 0.1);
        let c = Vector3::new(0.2, 0.8, -0.3);
        let m1 = CovarianceIntegrator::moments(&a, &b, &c);
        let m2 = CovarianceIntegrator::moments(&c, &a, &b);
        for (x, y) in m1.0.iter().zip(m2.0.iter()) {
            assert_relative_eq!(x, y, epsilon = 1e-14);
        }
    }

    #[test]
    fn mesh_translates_back_to_center() {
        let (a, b, c) = unit_corner();
        let mut ig = MeshIntegrator::new(Point3::new(10.0, 0.0, 0.0));
        ig.aggregate(&a, &b, &c);
        let mesh = ig.into_result();
        assert_eq!(mesh.num_triangles(), 1);
        assert_relative_eq!(mesh.points[0].x, 11.0);
        assert_relative_eq!(mesh.points[1].x, 10.0);
    }
}
