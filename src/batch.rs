//! Many-vertex integration on a rayon pool, with the strategy picked at run time.

use std::ops::{AddAssign, Mul};

use log::debug;
use nalgebra::{Point3, Vector3};
use rayon::prelude::*;
use serde::Serialize;

use crate::convolve::{Kernel, convolve};
use crate::error::OffsetError;
use crate::integrator::{CovarianceIntegrator, Integrator, MeshIntegrator, VolumeIntegrator};
use crate::offset::integrate_with;
use crate::principal::PrincipalAxes;
use crate::sphere_tessellation::{DEFAULT_TOLERANCE_RATIO, SphereTessellation};
use crate::subdivider::{PassThrough, RadialClamp, Subdivider};
use crate::triangulation::Triangulation;
use crate::types::{CovarianceVector, TriangleMesh, VertexId};

/// Run one integration per vertex in parallel, results in input order.
///
/// A fresh subdivider is made per vertex with `make_subdivider`.
pub fn integrate_all<S, I, T, F>(
    triangulation: &T,
    vertices: &[VertexId],
    make_subdivider: F,
) -> Vec<Result<I::Output, OffsetError>>
where
    S: Subdivider,
    I: Integrator,
    I::Output: Send,
    T: Triangulation + Sync + ?Sized,
    F: Fn() -> S + Sync,
{
    vertices
        .par_iter()
        .map(|&v| integrate_with::<S, I, T>(triangulation, v, &make_subdivider()))
        .collect()
}

/// Subdivider choice
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Subdivision {
    PassThrough,
    RadialClamp,
    SphereTessellation { tolerance_ratio: f64 },
}

impl Default for Subdivision {
    fn default() -> Self {
        Self::SphereTessellation {
            tolerance_ratio: DEFAULT_TOLERANCE_RATIO,
        }
    }
}

/// What to compute per vertex
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Measure {
    #[default]
    Volume,
    Covariance,
    /// Dominant principal axis of the covariance
    Normal,
    Mesh,
}

/// Per-vertex result of [`measure_points`]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MeasureValue {
    Volume(f64),
    Covariance(CovarianceVector),
    Normal(Vector3<f64>),
    Mesh(TriangleMesh),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VertexMeasure {
    pub index: VertexId,
    /// `None` when the vertex has no cell (hidden point)
    pub value: Option<MeasureValue>,
}

fn run<S, T>(
    triangulation: &T,
    vertices: &[VertexId],
    measure: Measure,
    make_subdivider: impl Fn() -> S + Sync,
) -> Vec<Result<MeasureValue, OffsetError>>
where
    S: Subdivider,
    T: Triangulation + Sync + ?Sized,
{
    fn wrap<O>(
        results: Vec<Result<O, OffsetError>>,
        f: impl Fn(O) -> MeasureValue,
    ) -> Vec<Result<MeasureValue, OffsetError>> {
        results.into_iter().map(|r| r.map(&f)).collect()
    }

    match measure {
        Measure::Volume => wrap(
            integrate_all::<S, VolumeIntegrator, T, _>(triangulation, vertices, make_subdivider),
            MeasureValue::Volume,
        ),
        Measure::Covariance => wrap(
            integrate_all::<S, CovarianceIntegrator, T, _>(triangulation, vertices, make_subdivider),
            MeasureValue::Covariance,
        ),
        Measure::Normal => wrap(
            integrate_all::<S, CovarianceIntegrator, T, _>(triangulation, vertices, make_subdivider),
            |m| MeasureValue::Normal(PrincipalAxes::from_covariance(&m).normal()),
        ),
        Measure::Mesh => wrap(
            integrate_all::<S, MeshIntegrator, T, _>(triangulation, vertices, make_subdivider),
            MeasureValue::Mesh,
        ),
    }
}

/// Integrate `measure` for each vertex with the chosen subdivision.
///
/// Vertices without a position are reported with `value: None`.
///
/// # Errors
/// Returns the first configuration error (invalid radius or tolerance).
pub fn measure_points<T>(
    triangulation: &T,
    vertices: &[VertexId],
    radius: f64,
    measure: Measure,
    subdivision: Subdivision,
) -> Result<Vec<VertexMeasure>, OffsetError>
where
    T: Triangulation + Sync + ?Sized,
{
    let results = match subdivision {
        Subdivision::PassThrough => run(triangulation, vertices, measure, || PassThrough::new(radius)),
        Subdivision::RadialClamp => run(triangulation, vertices, measure, || RadialClamp::new(radius)),
        Subdivision::SphereTessellation { tolerance_ratio } => {
            run(triangulation, vertices, measure, || {
                SphereTessellation::with_tolerance_ratio(radius, tolerance_ratio)
            })
        }
    };

    let mut measures = Vec::with_capacity(vertices.len());
    for (&index, result) in vertices.iter().zip(results) {
        let value = match result {
            Ok(value) => Some(value),
            Err(OffsetError::UnknownVertex(v)) => {
                debug!("Vertex {v} has no cell");
                None
            }
            Err(e) => return Err(e),
        };
        measures.push(VertexMeasure { index, value });
    }
    Ok(measures)
}

/// Neighbourhood smoothing applied to the measures after integration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Smoothing {
    pub kernel: Kernel,
    /// Neighbourhood radius, independent of the integration radius
    pub radius: f64,
}

/// Replace the values at `slots` by their convolution over `points`
fn smooth<T>(
    measures: &mut [VertexMeasure],
    slots: &[usize],
    points: &[Point3<f64>],
    smoothing: Smoothing,
    extract: impl Fn(&MeasureValue) -> Option<T>,
    wrap: impl Fn(T) -> MeasureValue,
) -> Result<(), OffsetError>
where
    T: Copy + Default + AddAssign + Mul<f64, Output = T> + Send + Sync,
{
    let field: Vec<T> = slots
        .iter()
        .map(|&s| measures[s].value.as_ref().and_then(&extract).unwrap_or_default())
        .collect();
    let smoothed = convolve(points, &field, smoothing.kernel, smoothing.radius)?;
    for (&s, value) in slots.iter().zip(smoothed) {
        measures[s].value = Some(wrap(value));
    }
    Ok(())
}

/// [`measure_points`] followed by a convolution of the results over the
/// measured vertices.
///
/// Normals are taken from the smoothed covariance. Hidden vertices neither
/// contribute nor receive a value.
///
/// # Errors
/// Returns [`OffsetError::NotConvolvable`] for meshes, and the errors of
/// [`measure_points`] and [`convolve`].
pub fn measure_points_smoothed<T>(
    triangulation: &T,
    vertices: &[VertexId],
    radius: f64,
    measure: Measure,
    subdivision: Subdivision,
    smoothing: Smoothing,
) -> Result<Vec<VertexMeasure>, OffsetError>
where
    T: Triangulation + Sync + ?Sized,
{
    if measure == Measure::Mesh {
        return Err(OffsetError::NotConvolvable("mesh"));
    }
    if !(smoothing.radius.is_finite() && smoothing.radius > 0.0) {
        return Err(OffsetError::InvalidRadius(smoothing.radius));
    }

    let integrated = if measure == Measure::Normal {
        Measure::Covariance
    } else {
        measure
    };
    let mut measures = measure_points(triangulation, vertices, radius, integrated, subdivision)?;

    let (slots, points): (Vec<usize>, Vec<Point3<f64>>) = measures
        .iter()
        .enumerate()
        .filter(|(_, m)| m.value.is_some())
        .filter_map(|(slot, m)| Some((slot, triangulation.position(m.index)?)))
        .unzip();

    let covariance = |value: &MeasureValue| match value {
        MeasureValue::Covariance(c) => Some(*c),
        _ => None,
    };
    match measure {
        Measure::Volume => smooth(
            &mut measures,
            &slots,
            &points,
            smoothing,
            |value| match value {
                MeasureValue::Volume(v) => Some(*v),
                _ => None,
            },
            MeasureValue::Volume,
        )?,
        Measure::Covariance => smooth(
            &mut measures,
            &slots,
            &points,
            smoothing,
            covariance,
            MeasureValue::Covariance,
        )?,
        Measure::Normal => smooth(&mut measures, &slots, &points, smoothing, covariance, |c| {
            MeasureValue::Normal(PrincipalAxes::from_covariance(&c).normal())
        })?,
        Measure::Mesh => unreachable!("meshes are rejected above"),
    }
    Ok(measures)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::power_diagram::PowerDiagram;
    use crate::types::WeightedPoint;
    use approx::assert_relative_eq;

    fn grid() -> PowerDiagram {
        let mut points = Vec::new();
        for i in 0..4 {
            for j in 0..4 {
                #[allow(clippy::cast_precision_loss)]
                points.push(WeightedPoint::unweighted(i as f64, j as f64, 0.0));
            }
        }
        PowerDiagram::new(&points).unwrap()
    }

    #[test]
    fn parallel_matches_sequential() {
        let diagram = grid();
        let vertices: Vec<VertexId> = (0..diagram.num_points()).collect();
        let parallel = integrate_all::<_, VolumeIntegrator, _, _>(&diagram, &vertices, || {
            SphereTessellation::new(0.3)
        });
        for (&v, result) in vertices.iter().zip(parallel) {
            let sequential = crate::offset::volume(&diagram, v, 0.3).unwrap();
            assert_relative_eq!(result.unwrap(), sequential, epsilon = 1e-15);
        }
    }

    #[test]
    fn planar_normals_point_off_the_plane() {
        let diagram = grid();
        // Interior points of the planar grid
        let vertices = [5, 6, 9, 10];
        let measures = measure_points(
            &diagram,
            &vertices,
            0.9,
            Measure::Normal,
            Subdivision::default(),
        )
        .unwrap();
        for m in measures {
            let Some(MeasureValue::Normal(n)) = m.value else {
                panic!("missing normal for {}", m.index);
            };
            assert_relative_eq!(n.z.abs(), 1.0, epsilon = 1e-3);
        }
    }

    #[test]
    fn hidden_and_invalid() {
        let diagram = grid();
        let measures =
            measure_points(&diagram, &[0, 1000], 0.5, Measure::Volume, Subdivision::RadialClamp)
                .unwrap();
        assert!(measures[0].value.is_some());
        assert!(measures[1].value.is_none());

        let bad = Subdivision::SphereTessellation {
            tolerance_ratio: -1.0,
        };
        assert_eq!(
            measure_points(&diagram, &[0], 0.5, Measure::Volume, bad),
            Err(OffsetError::InvalidTolerance(-0.5))
        );
    }

    fn volumes(measures: &[VertexMeasure]) -> Vec<f64> {
        measures
            .iter()
            .map(|m| match m.value {
                Some(MeasureValue::Volume(v)) => v,
                _ => f64::NAN,
            })
            .collect()
    }

    #[test]
    fn smoothing_within_spacing_changes_nothing() {
        let diagram = grid();
        let vertices: Vec<VertexId> = (0..diagram.num_points()).collect();
        let plain =
            measure_points(&diagram, &vertices, 0.4, Measure::Volume, Subdivision::RadialClamp)
                .unwrap();
        let smoothing = Smoothing {
            kernel: Kernel::Uniform,
            radius: 0.5,
        };
        let smoothed = measure_points_smoothed(
            &diagram,
            &vertices,
            0.4,
            Measure::Volume,
            Subdivision::RadialClamp,
            smoothing,
        )
        .unwrap();
        assert_eq!(volumes(&plain), volumes(&smoothed));
    }

    #[test]
    fn uniform_smoothing_sums_grid_neighbours() {
        let diagram = grid();
        let vertices: Vec<VertexId> = (0..diagram.num_points()).collect();
        // Balls of radius 0.4 never reach the faces at distance 0.5
        let ball = 4.0 / 3.0 * std::f64::consts::PI * 0.4_f64.powi(3);
        let smoothing = Smoothing {
            kernel: Kernel::Uniform,
            radius: 1.01,
        };
        let smoothed = measure_points_smoothed(
            &diagram,
            &vertices,
            0.4,
            Measure::Volume,
            Subdivision::default(),
            smoothing,
        )
        .unwrap();
        let v = volumes(&smoothed);
        // Corner, edge and interior points of the 4x4 grid
        assert_relative_eq!(v[0], 3.0 * ball, max_relative = 1e-2);
        assert_relative_eq!(v[1], 4.0 * ball, max_relative = 1e-2);
        assert_relative_eq!(v[5], 5.0 * ball, max_relative = 1e-2);
    }

    #[test]
    fn smoothed_planar_normals() {
        let diagram = grid();
        let vertices = [5, 6, 9, 10];
        let smoothing = Smoothing {
            kernel: Kernel::Tent,
            radius: 1.5,
        };
        let measures = measure_points_smoothed(
            &diagram,
            &vertices,
            0.9,
            Measure::Normal,
            Subdivision::default(),
            smoothing,
        )
        .unwrap();
        for m in measures {
            let Some(MeasureValue::Normal(n)) = m.value else {
                panic!("missing normal for {}", m.index);
            };
            assert_relative_eq!(n.z.abs(), 1.0, epsilon = 1e-3);
        }
    }

    #[test]
    fn smoothing_rejects_meshes_and_bad_radii() {
        let diagram = grid();
        let smoothing = Smoothing {
            kernel: Kernel::Uniform,
            radius: 1.0,
        };
        assert_eq!(
            measure_points_smoothed(&diagram, &[0], 0.5, Measure::Mesh, Subdivision::default(), smoothing),
            Err(OffsetError::NotConvolvable("mesh"))
        );
        let zero = Smoothing {
            radius: 0.0,
            ..smoothing
        };
        assert_eq!(
            measure_points_smoothed(&diagram, &[0], 0.5, Measure::Volume, Subdivision::default(), zero),
            Err(OffsetError::InvalidRadius(0.0))
        );
    }
}
