use log::debug;
use nalgebra::{Point3, Vector3};

use crate::integrator::Integrator;
use crate::subdivider::Subdivider;
use crate::triangulation::Triangulation;
use crate::types::VertexId;

/// Walk the power-diagram faces around `v` and feed them to the subdivider as
/// a fan of triangles around each face centroid.
///
/// `center` is the position of `v`; all triangles are relative to it.
pub fn aggregate<T, S, I>(triangulation: &T, v: VertexId, center: &Point3<f64>, subdivider: &S, ig: &mut I)
where
    T: Triangulation + ?Sized,
    S: Subdivider,
    I: Integrator,
{
    for u in triangulation.incident_vertices(v) {
        let Some(edge) = triangulation.edge(v, u) else {
            continue;
        };
        let dual_points = triangulation.dual_points(&edge);
        if dual_points.len() < 3 {
            debug!(
                "Face between {v} and {u} has {} dual points, skipped",
                dual_points.len()
            );
            continue;
        }

        let relative: Vec<Vector3<f64>> = dual_points.iter().map(|p| p - center).collect();
        #[allow(clippy::cast_precision_loss)]
        let centroid = relative.iter().sum::<Vector3<f64>>() / relative.len() as f64;
        let n = relative.len();
        for i in 0..n {
            subdivider.aggregate(ig, &centroid, &relative[i], &relative[(i + 1) % n]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrator::VolumeIntegrator;
    use crate::subdivider::PassThrough;
    use crate::triangulation::FaceTable;
    use approx::assert_relative_eq;

    #[test]
    fn short_faces_contribute_nothing() {
        let mut table = FaceTable::new();
        let v = table.add_vertex(Point3::origin());
        let u = table.add_vertex(Point3::new(2.0, 0.0, 0.0));
        let w = table.add_vertex(Point3::new(0.0, 2.0, 0.0));
        table
            .add_face(v, u, vec![Point3::new(1.0, 0.0, 0.0), Point3::new(1.0, 1.0, 0.0)])
            .unwrap();
        table
            .add_face(
                v,
                w,
                vec![
                    Point3::new(1.0, 1.0, 0.0),
                    Point3::new(0.0, 1.0, 1.0),
                    Point3::new(-1.0, 1.0, 0.0),
                ],
            )
            .unwrap();

        let mut ig = VolumeIntegrator::new(Point3::origin());
        aggregate(&table, v, &Point3::origin(), &PassThrough::new(1.0), &mut ig);
        // Pyramid over the triangle at y = 1: base area 1, height 1
        assert_relative_eq!(*ig.result(), 1.0 / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn triangles_are_relative_to_center() {
        let mut table = FaceTable::new();
        let center = Point3::new(10.0, 10.0, 10.0);
        let v = table.add_vertex(center);
        let u = table.add_vertex(Point3::new(12.0, 10.0, 10.0));
        let face = vec![
            Point3::new(11.0, 9.0, 9.0),
            Point3::new(11.0, 11.0, 9.0),
            Point3::new(11.0, 11.0, 11.0),
            Point3::new(11.0, 9.0, 11.0),
        ];
        table.add_face(v, u, face).unwrap();

        let mut ig = VolumeIntegrator::new(center);
        aggregate(&table, v, &center, &PassThrough::new(1.0), &mut ig);
        assert_relative_eq!(*ig.result(), 4.0 / 3.0, epsilon = 1e-12);
    }
}
