//! Smoothing of per-point fields over a fixed-radius neighbourhood.
//!
//! Each output value is the weighted sum of the field over all points within
//! `radius`, the point itself included with weight one. Sums are not
//! normalized, so a uniform kernel scales a constant field by the number of
//! neighbours.

use std::ops::{AddAssign, Mul};

use log::info;
use nalgebra::Point3;
use rayon::prelude::*;

use crate::error::OffsetError;
use crate::points_searcher::PointsSearcher;

/// Radial weight applied to a neighbour at a given distance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Kernel {
    /// Weight one up to the radius
    #[default]
    Uniform,
    /// Weight falling linearly from one at the centre to zero at the radius
    Tent,
}

impl Kernel {
    #[must_use]
    pub fn weight(self, distance: f64, radius: f64) -> f64 {
        match self {
            Self::Uniform => {
                if distance <= radius {
                    1.0
                } else {
                    0.0
                }
            }
            Self::Tent => (1.0 - distance / radius).max(0.0),
        }
    }
}

/// Convolve `field` (one value per point) with `kernel` of the given radius.
///
/// # Errors
/// Returns [`OffsetError::InvalidRadius`] unless `radius` is finite and
/// positive, and [`OffsetError::FieldLength`] if `field` and `points`
/// differ in length.
pub fn convolve<T>(
    points: &[Point3<f64>],
    field: &[T],
    kernel: Kernel,
    radius: f64,
) -> Result<Vec<T>, OffsetError>
where
    T: Copy + Default + AddAssign + Mul<f64, Output = T> + Send + Sync,
{
    if !(radius.is_finite() && radius > 0.0) {
        return Err(OffsetError::InvalidRadius(radius));
    }
    if field.len() != points.len() {
        return Err(OffsetError::FieldLength {
            expected: points.len(),
            found: field.len(),
        });
    }

    let searcher = PointsSearcher::new(points.to_vec());
    let smoothed: Vec<T> = points
        .par_iter()
        .map(|center| {
            let mut sum = T::default();
            for neighbor in searcher.find_within(center, radius) {
                sum += field[neighbor.index] * kernel.weight(neighbor.value, radius);
            }
            sum
        })
        .collect();

    info!(
        "Convolved {} values with a {kernel:?} kernel of radius {radius}",
        points.len()
    );
    Ok(smoothed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CovarianceVector;
    use approx::assert_relative_eq;

    fn line(n: usize) -> Vec<Point3<f64>> {
        (0..n)
            .map(|i| {
                #[allow(clippy::cast_precision_loss)]
                Point3::new(i as f64, 0.0, 0.0)
            })
            .collect()
    }

    #[test]
    fn kernel_weights() {
        assert_relative_eq!(Kernel::Uniform.weight(0.0, 1.0), 1.0);
        assert_relative_eq!(Kernel::Uniform.weight(1.0, 1.0), 1.0);
        assert_relative_eq!(Kernel::Uniform.weight(1.5, 1.0), 0.0);
        assert_relative_eq!(Kernel::Tent.weight(0.0, 2.0), 1.0);
        assert_relative_eq!(Kernel::Tent.weight(1.0, 2.0), 0.5);
        assert_relative_eq!(Kernel::Tent.weight(3.0, 2.0), 0.0);
    }

    #[test]
    fn uniform_counts_neighbours() {
        let points = line(5);
        let ones = vec![1.0; points.len()];
        let out = convolve(&points, &ones, Kernel::Uniform, 1.0).unwrap();
        assert_eq!(out, vec![2.0, 3.0, 3.0, 3.0, 2.0]);
    }

    #[test]
    fn tent_weighs_by_distance() {
        let points = line(5);
        let ones = vec![1.0; points.len()];
        let out = convolve(&points, &ones, Kernel::Tent, 2.0).unwrap();
        // Neighbours at distance 1 weigh one half, at distance 2 nothing
        assert_relative_eq!(out[2], 2.0, epsilon = 1e-12);
        assert_relative_eq!(out[0], 1.5, epsilon = 1e-12);
    }

    #[test]
    fn covariance_fields_add_termwise() {
        let points = line(3);
        let field: Vec<CovarianceVector> = (0..3)
            .map(|i| {
                let x = f64::from(i);
                CovarianceVector([x, 0.0, 0.0, 1.0, 0.0, 2.0 * x])
            })
            .collect();
        let out = convolve(&points, &field, Kernel::Uniform, 1.0).unwrap();
        assert_relative_eq!(out[1].m11(), 3.0);
        assert_relative_eq!(out[1].m22(), 3.0);
        assert_relative_eq!(out[1].m33(), 6.0);
        assert_relative_eq!(out[0].m11(), 1.0);
        assert_relative_eq!(out[2].m33(), 6.0);
    }

    #[test]
    fn radius_below_spacing_keeps_the_field() {
        let points = line(4);
        let field = vec![1.0, -2.0, 3.5, 0.25];
        let out = convolve(&points, &field, Kernel::Tent, 0.5).unwrap();
        assert_eq!(out, field);
    }

    #[test]
    fn invalid_arguments() {
        let points = line(3);
        assert_eq!(
            convolve(&points, &[1.0; 3], Kernel::Uniform, 0.0),
            Err(OffsetError::InvalidRadius(0.0))
        );
        assert!(convolve(&points, &[1.0; 3], Kernel::Tent, f64::NAN).is_err());
        assert_eq!(
            convolve(&points, &[1.0; 2], Kernel::Uniform, 1.0),
            Err(OffsetError::FieldLength {
                expected: 3,
                found: 2
            })
        );
    }
}
