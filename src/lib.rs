//! Sphere-restricted integration over power diagram cells of point clouds.
//!
//! For each sample point the library integrates over the part of its power
//! diagram cell that lies within a ball of radius `R` around it: enclosed
//! volume, second-moment (covariance) terms, or the clipped boundary surface.
//! The covariance drives normal and curvature estimation on the cloud.
//!
//! The engine composes three policies at compile time: a [`Triangulation`]
//! (where the cell faces come from), a [`Subdivider`] (how boundary triangles
//! are restricted to the ball) and an [`Integrator`] (what is accumulated).
//!
//! # Example
//!
//! ```
//! use powercell::{PowerDiagram, PrincipalAxes, WeightedPoint, covariance, volume};
//!
//! let mut points = Vec::new();
//! for i in 0..5 {
//!     for j in 0..5 {
//!         points.push(WeightedPoint::unweighted(f64::from(i), f64::from(j), 0.0));
//!     }
//! }
//! let diagram = PowerDiagram::new(&points).unwrap();
//!
//! let v = volume(&diagram, 12, 0.8).unwrap();
//! println!("Cell volume within R: {v:.4}");
//!
//! let axes = PrincipalAxes::from_covariance(&covariance(&diagram, 12, 0.8).unwrap());
//! assert!(axes.normal().z.abs() > 0.99);
//! ```

pub mod batch;
mod boundary;
pub mod convex_cell;
mod convolve;
mod error;
mod geometry;
pub mod input;
mod integrator;
mod offset;
mod points_searcher;
mod power_diagram;
mod principal;
mod sphere_tessellation;
mod subdivider;
mod triangulation;
mod types;

#[cfg(feature = "python")]
mod python;

pub use batch::{
    Measure, MeasureValue, Smoothing, Subdivision, VertexMeasure, integrate_all, measure_points,
    measure_points_smoothed,
};
pub use convolve::{Kernel, convolve};
pub use error::OffsetError;
pub use integrator::{CovarianceIntegrator, Integrator, MeshIntegrator, VolumeIntegrator};
pub use offset::{covariance, integrate, integrate_with, mesh, volume};
pub use power_diagram::{DEFAULT_BOUND, NUM_BREAKERS, PowerDiagram, PowerDiagramOptions};
pub use principal::PrincipalAxes;
pub use sphere_tessellation::{DEFAULT_TOLERANCE_RATIO, SphereTessellation};
pub use subdivider::{PassThrough, RadialClamp, Subdivider};
pub use triangulation::{FaceTable, Triangulation};
pub use types::{CovarianceVector, TriangleMesh, VertexId, WeightedPoint};
