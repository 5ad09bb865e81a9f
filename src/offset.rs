//! Per-vertex integration over the part of a power cell inside a ball.
//!
//! `integrate` composes a [`Subdivider`] (how boundary triangles are restricted
//! to the ball) with an [`Integrator`] (what is accumulated). Each call is
//! independent; batch callers run it per vertex.

use crate::boundary;
use crate::error::OffsetError;
use crate::integrator::{CovarianceIntegrator, Integrator, MeshIntegrator, VolumeIntegrator};
use crate::sphere_tessellation::SphereTessellation;
use crate::subdivider::Subdivider;
use crate::triangulation::Triangulation;
use crate::types::{CovarianceVector, TriangleMesh, VertexId};

/// Integrate over the cell of `v` restricted to the ball of `radius`.
///
/// # Errors
/// [`OffsetError::InvalidRadius`] unless `radius` is finite and positive;
/// [`OffsetError::UnknownVertex`] if `v` has no position in the triangulation.
///
/// # Example
///
/// ```
/// use nalgebra::Point3;
/// use powercell::{FaceTable, PassThrough, VolumeIntegrator, integrate};
///
/// let mut table = FaceTable::new();
/// let v = table.add_vertex(Point3::origin());
/// let u = table.add_vertex(Point3::new(0.0, 0.0, 2.0));
/// let face = vec![
///     Point3::new(1.0, 0.0, 1.0),
///     Point3::new(0.0, 1.0, 1.0),
///     Point3::new(-1.0, 0.0, 1.0),
/// ];
/// table.add_face(v, u, face).unwrap();
///
/// let volume = integrate::<PassThrough, VolumeIntegrator, _>(&table, v, 2.0).unwrap();
/// assert!((volume - 1.0 / 3.0).abs() < 1e-12);
/// ```
pub fn integrate<S, I, T>(triangulation: &T, v: VertexId, radius: f64) -> Result<I::Output, OffsetError>
where
    S: Subdivider,
    I: Integrator,
    T: Triangulation + ?Sized,
{
    integrate_with::<S, I, T>(triangulation, v, &S::new(radius))
}

/// Same as [`integrate`] with a pre-configured subdivider.
///
/// # Errors
/// Whatever [`Subdivider::validate`] rejects, and
/// [`OffsetError::UnknownVertex`] if `v` has no position.
pub fn integrate_with<S, I, T>(
    triangulation: &T,
    v: VertexId,
    subdivider: &S,
) -> Result<I::Output, OffsetError>
where
    S: Subdivider,
    I: Integrator,
    T: Triangulation + ?Sized,
{
    subdivider.validate()?;
    let center = triangulation
        .position(v)
        .ok_or(OffsetError::UnknownVertex(v))?;

    let mut ig = I::new(center);
    boundary::aggregate(triangulation, v, &center, subdivider, &mut ig);
    Ok(ig.into_result())
}

/// Volume of the cell of `v` inside the ball, sphere-exact
///
/// # Errors
/// See [`integrate`].
pub fn volume<T: Triangulation + ?Sized>(triangulation: &T, v: VertexId, radius: f64) -> Result<f64, OffsetError> {
    integrate::<SphereTessellation, VolumeIntegrator, T>(triangulation, v, radius)
}

/// Second-moment terms of the cell of `v` inside the ball, sphere-exact
///
/// # Errors
/// See [`integrate`].
pub fn covariance<T: Triangulation + ?Sized>(
    triangulation: &T,
    v: VertexId,
    radius: f64,
) -> Result<CovarianceVector, OffsetError> {
    integrate::<SphereTessellation, CovarianceIntegrator, T>(triangulation, v, radius)
}

/// Boundary surface of the cell of `v` clipped to the ball, sphere-exact
///
/// # Errors
/// See [`integrate`].
pub fn mesh<T: Triangulation + ?Sized>(triangulation: &T, v: VertexId, radius: f64) -> Result<TriangleMesh, OffsetError> {
    integrate::<SphereTessellation, MeshIntegrator, T>(triangulation, v, radius)
}
