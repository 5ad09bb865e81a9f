use nalgebra::{SymmetricEigen, Vector3};
use serde::Serialize;

use crate::types::CovarianceVector;

/// Eigen-decomposition of a covariance tensor, largest eigenvalue first
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PrincipalAxes {
    pub values: [f64; 3],
    pub axes: [Vector3<f64>; 3],
}

impl PrincipalAxes {
    #[must_use]
    pub fn from_covariance(covariance: &CovarianceVector) -> Self {
        let eigen = SymmetricEigen::new(covariance.to_matrix());
        let mut order = [0, 1, 2];
        order.sort_by(|&i, &j| eigen.eigenvalues[j].total_cmp(&eigen.eigenvalues[i]));

        Self {
            values: order.map(|i| eigen.eigenvalues[i]),
            axes: order.map(|i| eigen.eigenvectors.column(i).into_owned()),
        }
    }

    /// Normal estimate: direction of the largest eigenvalue.
    ///
    /// The sphere-restricted cell of a surface sample is elongated across the
    /// surface, so its dominant axis is the normal. The sign is arbitrary.
    #[must_use]
    pub const fn normal(&self) -> Vector3<f64> {
        self.axes[0]
    }
}
