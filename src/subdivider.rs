//! Subdividers restrict raw boundary triangles to the ball of radius `R`
//! before handing them to an [`Integrator`].

use nalgebra::Vector3;

use crate::error::OffsetError;
use crate::geometry::project_to_sphere;
use crate::integrator::Integrator;

/// Clipping policy between the boundary walk and the integrator.
///
/// `a`, `b` and `c` are relative to the integrated vertex; every triangle
/// forwarded to the integrator stays relative to that same apex.
pub trait Subdivider {
    /// Subdivider for a ball of the given radius, with default settings
    fn new(radius: f64) -> Self
    where
        Self: Sized;

    fn radius(&self) -> f64;

    /// Reject settings the subdivider cannot work with
    ///
    /// # Errors
    /// Returns [`OffsetError::InvalidRadius`] unless the radius is finite and positive.
    fn validate(&self) -> Result<(), OffsetError> {
        let radius = self.radius();
        if radius.is_finite() && radius > 0.0 {
            Ok(())
        } else {
            Err(OffsetError::InvalidRadius(radius))
        }
    }

    fn aggregate<I: Integrator>(
        &self,
        ig: &mut I,
        a: &Vector3<f64>,
        b: &Vector3<f64>,
        c: &Vector3<f64>,
    );
}

/// Forwards triangles untouched. Only meaningful when the caller already
/// knows the cell lies inside the ball, or wants the unclipped measure.
#[derive(Debug, Clone, Copy)]
pub struct PassThrough {
    radius: f64,
}

impl Subdivider for PassThrough {
    fn new(radius: f64) -> Self {
        Self { radius }
    }

    fn radius(&self) -> f64 {
        self.radius
    }

    fn aggregate<I: Integrator>(
        &self,
        ig: &mut I,
        a: &Vector3<f64>,
        b: &Vector3<f64>,
        c: &Vector3<f64>,
    ) {
        ig.aggregate(a, b, c);
    }
}

/// Pulls every corner at or beyond `R` back onto the sphere.
///
/// Cheap, but the curved cap becomes a flat cut: for triangles straddling the
/// sphere the result is smaller than the true restricted measure.
#[derive(Debug, Clone, Copy)]
pub struct RadialClamp {
    radius: f64,
}

impl RadialClamp {
    fn clamp(&self, p: &Vector3<f64>) -> Vector3<f64> {
        if p.norm() >= self.radius {
            project_to_sphere(p, self.radius)
        } else {
            *p
        }
    }
}

impl Subdivider for RadialClamp {
    fn new(radius: f64) -> Self {
        Self { radius }
    }

    fn radius(&self) -> f64 {
        self.radius
    }

    fn aggregate<I: Integrator>(
        &self,
        ig: &mut I,
        a: &Vector3<f64>,
        b: &Vector3<f64>,
        c: &Vector3<f64>,
    ) {
        ig.aggregate(&self.clamp(a), &self.clamp(b), &self.clamp(c));
    }
}
