use nalgebra::Vector3;

/// Tolerance for floating-point comparisons.
/// Cell clipping and crossing detection share this epsilon so that a point
/// rejected by one test is never accepted by another.
pub const EPSILON: f64 = 1e-10;

/// Epsilon-based floating point comparisons.
pub mod float_cmp {
    use super::EPSILON;

    #[inline]
    pub const fn eq(a: f64, b: f64) -> bool {
        (a - b).abs() <= EPSILON
    }
}

use float_cmp::eq;

/// Triple product `a · (b × c)`, six times the signed volume of tetrahedron (0, a, b, c)
#[inline]
pub fn triple_product(a: &Vector3<f64>, b: &Vector3<f64>, c: &Vector3<f64>) -> f64 {
    a.dot(&b.cross(c))
}

/// Unsigned volume of the tetrahedron (0, a, b, c)
#[inline]
pub fn tetrahedron_volume(a: &Vector3<f64>, b: &Vector3<f64>, c: &Vector3<f64>) -> f64 {
    triple_product(a, b, c).abs() / 6.0
}

/// Rescale `p` to length `radius` along the same ray (zero vectors stay put)
#[inline]
pub fn project_to_sphere(p: &Vector3<f64>, radius: f64) -> Vector3<f64> {
    let norm = p.norm();
    if norm <= 0.0 {
        *p
    } else {
        p * (radius / norm)
    }
}

/// Pull `p` back onto the sphere only if it lies outside it
#[inline]
pub fn clamp_to_sphere(p: &Vector3<f64>, radius: f64) -> Vector3<f64> {
    if p.norm_squared() > radius * radius {
        project_to_sphere(p, radius)
    } else {
        *p
    }
}

/// Angle between two vectors in `[0, π]`
#[inline]
pub fn angle_between(u: &Vector3<f64>, w: &Vector3<f64>) -> f64 {
    u.cross(w).norm().atan2(u.dot(w))
}

/// Counterclockwise angle in `[0, 2π)` from `u` to `w` around the unit `axis`
pub fn ccw_angle(u: &Vector3<f64>, w: &Vector3<f64>, axis: &Vector3<f64>) -> f64 {
    let angle = axis.dot(&u.cross(w)).atan2(u.dot(w));
    if angle < 0.0 {
        angle + std::f64::consts::TAU
    } else {
        angle
    }
}

/// Parameters `t0 <= t1` where the line `a + t (b - a)` enters and leaves the
/// ball of radius `radius` centered at the origin.
///
/// Follows the closed form `s = -(a·v) ± sqrt((a·v)² + r² - |a|²)` along the
/// unit direction `v`, then converts distances back to segment fractions.
/// Returns `None` if the line misses the ball or the segment is too short to
/// define a direction.
pub fn line_ball_interval(radius: f64, a: &Vector3<f64>, b: &Vector3<f64>) -> Option<(f64, f64)> {
    let ab = b - a;
    let length = ab.norm();
    if length < EPSILON {
        return None;
    }
    let v = ab / length;
    let av = a.dot(&v);
    let delta = av.mul_add(av, radius.mul_add(radius, -a.norm_squared()));
    if delta < 0.0 {
        return None;
    }
    let root = delta.sqrt();
    Some(((-av - root) / length, (-av + root) / length))
}

/// Spherical interpolation between unit vectors (falls back to normalized lerp
/// when the vectors are nearly parallel or antiparallel)
pub fn slerp_unit(u: &Vector3<f64>, w: &Vector3<f64>, t: f64) -> Vector3<f64> {
    let angle = angle_between(u, w);
    let sin = angle.sin();
    if sin.abs() < 1e-9 {
        let lerp = u * (1.0 - t) + w * t;
        let norm = lerp.norm();
        return if norm > 0.0 { lerp / norm } else { *u };
    }
    u * (((1.0 - t) * angle).sin() / sin) + w * ((t * angle).sin() / sin)
}

/// Find any unit vector perpendicular to the given vector
pub fn any_normal_of_vector(a: &Vector3<f64>) -> Vector3<f64> {
    let mut b = *a;

    // Find a non-parallel vector to cross with
    if !eq(b.x, 0.0) && (!eq(b.y, 0.0) || !eq(b.z, 0.0)) {
        b.x = -b.x;
        return a.cross(&b).normalize();
    } else if !eq(b.y, 0.0) && (!eq(b.x, 0.0) || !eq(b.z, 0.0)) {
        b.y = -b.y;
        return a.cross(&b).normalize();
    } else if !eq(b.x, 0.0) {
        return Vector3::new(0.0, 1.0, 0.0);
    }
    Vector3::new(1.0, 0.0, 0.0)
}
