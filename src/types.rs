use std::io::{self, Write};

use nalgebra::{Matrix3, Point3};
use serde::Serialize;

/// Vertex handle into a triangulation (plain index, owned by the triangulation)
pub type VertexId = usize;

/// Input sample point (position + power weight), user-facing type
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WeightedPoint {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
}

impl WeightedPoint {
    #[must_use]
    pub const fn new(x: f64, y: f64, z: f64, w: f64) -> Self {
        Self { x, y, z, w }
    }

    /// Unweighted point (weight 0)
    #[must_use]
    pub const fn unweighted(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z, w: 0.0 }
    }

    #[must_use]
    pub const fn position(&self) -> Point3<f64> {
        Point3::new(self.x, self.y, self.z)
    }

    /// Power distance `|p - q|² - w`
    #[must_use]
    pub fn power(&self, p: &Point3<f64>) -> f64 {
        (p - self.position()).norm_squared() - self.w
    }
}

/// Sorted neighbor candidate: distance to the query point + point index
#[derive(Debug, Clone, Copy)]
pub struct ValuedId {
    pub value: f64,
    pub index: usize,
}

impl ValuedId {
    pub const fn new(value: f64, index: usize) -> Self {
        Self { value, index }
    }
}

impl PartialEq for ValuedId {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value && self.index == other.index
    }
}

impl Eq for ValuedId {}

impl PartialOrd for ValuedId {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ValuedId {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.value
            .partial_cmp(&other.value)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| self.index.cmp(&other.index))
    }
}

/// Upper triangle `(M11, M12, M13, M22, M23, M33)` of a symmetric 3x3 second-moment tensor
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct CovarianceVector(pub [f64; 6]);

impl CovarianceVector {
    #[must_use]
    pub const fn zeros() -> Self {
        Self([0.0; 6])
    }

    #[must_use]
    pub const fn m11(&self) -> f64 {
        self.0[0]
    }

    #[must_use]
    pub const fn m22(&self) -> f64 {
        self.0[3]
    }

    #[must_use]
    pub const fn m33(&self) -> f64 {
        self.0[5]
    }

    /// Sum of the per-axis second moments
    #[must_use]
    pub fn trace(&self) -> f64 {
        self.m11() + self.m22() + self.m33()
    }

    /// Reassemble the full symmetric matrix
    #[must_use]
    pub fn to_matrix(&self) -> Matrix3<f64> {
        let [m11, m12, m13, m22, m23, m33] = self.0;
        Matrix3::new(m11, m12, m13, m12, m22, m23, m13, m23, m33)
    }

    /// Read back the upper triangle of a (symmetric) matrix
    #[must_use]
    pub fn from_matrix(m: &Matrix3<f64>) -> Self {
        Self([
            m[(0, 0)],
            m[(0, 1)],
            m[(0, 2)],
            m[(1, 1)],
            m[(1, 2)],
            m[(2, 2)],
        ])
    }
}

impl std::ops::AddAssign for CovarianceVector {
    fn add_assign(&mut self, rhs: Self) {
        for (lhs, rhs) in self.0.iter_mut().zip(rhs.0) {
            *lhs += rhs;
        }
    }
}

impl std::ops::Mul<f64> for CovarianceVector {
    type Output = Self;

    fn mul(self, rhs: f64) -> Self {
        Self(self.0.map(|m| m * rhs))
    }
}

/// Flat triangle soup. No vertex sharing between triangles.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TriangleMesh {
    pub points: Vec<Point3<f64>>,
    pub triangles: Vec<[usize; 3]>,
}

impl TriangleMesh {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            points: Vec::new(),
            triangles: Vec::new(),
        }
    }

    pub fn append_triangle(&mut self, a: Point3<f64>, b: Point3<f64>, c: Point3<f64>) {
        let first = self.points.len();
        self.points.extend([a, b, c]);
        self.triangles.push([first, first + 1, first + 2]);
    }

    /// Append all triangles of `other`, reindexing its points
    pub fn append(&mut self, other: &Self) {
        let offset = self.points.len();
        self.points.extend_from_slice(&other.points);
        self.triangles.extend(
            other
                .triangles
                .iter()
                .map(|t| [t[0] + offset, t[1] + offset, t[2] + offset]),
        );
    }

    #[must_use]
    pub fn num_triangles(&self) -> usize {
        self.triangles.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    /// Total surface area
    #[must_use]
    pub fn area(&self) -> f64 {
        self.triangles
            .iter()
            .map(|t| {
                let (a, b, c) = (self.points[t[0]], self.points[t[1]], self.points[t[2]]);
                (b - a).cross(&(c - a)).norm() / 2.0
            })
            .sum()
    }

    /// Write the mesh in OFF format.
    ///
    /// # Errors
    /// Returns an error if writing to the output fails.
    pub fn write_off<W: Write>(&self, mut writer: W) -> io::Result<()> {
        writeln!(writer, "OFF")?;
        writeln!(writer, "{} {} 0", self.points.len(), self.triangles.len())?;
        for p in &self.points {
            writeln!(writer, "{} {} {}", p.x, p.y, p.z)?;
        }
        for t in &self.triangles {
            writeln!(writer, "3 {} {} {}", t[0], t[1], t[2])?;
        }
        Ok(())
    }
}
