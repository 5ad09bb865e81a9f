//! Exact restriction of a boundary triangle to the ball of radius `R`.
//!
//! The cone from the apex over a triangle `T`, cut by the ball, splits into
//! two kinds of region:
//! - directions through `T ∩ disc`, where the cone is bounded by the plane of
//!   `T` (the disc is the circle `sphere ∩ plane(T)`): emitted as a fan of the
//!   convex polygon `T ∩ disc`, with its circular arcs sampled;
//! - directions through `T \ disc`, where the cone is bounded by the sphere:
//!   emitted as ladders of small triangles whose corners all lie on the
//!   sphere.
//!
//! Arcs, boundary paths and ladder rungs are sampled so that no emitted edge
//! subtends more than `tolerance / R` radians.

use std::f64::consts::TAU;

use log::{debug, trace};
use nalgebra::Vector3;

use crate::error::OffsetError;
use crate::geometry::{
    EPSILON, angle_between, any_normal_of_vector, ccw_angle, clamp_to_sphere, line_ball_interval,
    slerp_unit,
};
use crate::integrator::Integrator;
use crate::subdivider::Subdivider;

/// Default arc tolerance as a fraction of the radius
pub const DEFAULT_TOLERANCE_RATIO: f64 = 0.05;

const MAX_SAMPLES: usize = 1024;
const MAX_REFINEMENT_DEPTH: u32 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Corner {
    A,
    B,
    C,
}

/// Inside/outside pattern of the three corners (`|p| == R` counts as inside)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Coverage {
    /// 111
    Inside,
    /// 000
    Outside,
    /// Only this corner is inside (100, 010, 001)
    Apex(Corner),
    /// Only this corner is outside (011, 101, 110)
    Notch(Corner),
}

impl Coverage {
    fn classify(radius: f64, a: &Vector3<f64>, b: &Vector3<f64>, c: &Vector3<f64>) -> Self {
        let r2 = radius * radius;
        match (
            a.norm_squared() <= r2,
            b.norm_squared() <= r2,
            c.norm_squared() <= r2,
        ) {
            (true, true, true) => Self::Inside,
            (false, false, false) => Self::Outside,
            (true, false, false) => Self::Apex(Corner::A),
            (false, true, false) => Self::Apex(Corner::B),
            (false, false, true) => Self::Apex(Corner::C),
            (false, true, true) => Self::Notch(Corner::A),
            (true, false, true) => Self::Notch(Corner::B),
            (true, true, false) => Self::Notch(Corner::C),
        }
    }
}

/// Cyclic rotation putting `corner` first; orientation is preserved
fn rotated(corner: Corner, a: &Vector3<f64>, b: &Vector3<f64>, c: &Vector3<f64>) -> [Vector3<f64>; 3] {
    match corner {
        Corner::A => [*a, *b, *c],
        Corner::B => [*b, *c, *a],
        Corner::C => [*c, *a, *b],
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BoundaryKind {
    Inside,
    Outside,
    /// Boundary enters the ball here
    Entry,
    /// Boundary leaves the ball here
    Exit,
}

#[derive(Debug, Clone, Copy)]
struct BoundaryPoint {
    p: Vector3<f64>,
    kind: BoundaryKind,
}

/// Circle cut from the sphere by the plane of a triangle
#[derive(Debug, Clone, Copy)]
struct Circle {
    center: Vector3<f64>,
    /// Unit normal; boundary loops run counterclockwise around it
    normal: Vector3<f64>,
    radius: f64,
}

impl Circle {
    fn of_plane(sphere_radius: f64, point: &Vector3<f64>, normal: &Vector3<f64>) -> Option<Self> {
        let h = normal.dot(point);
        let r2 = sphere_radius.mul_add(sphere_radius, -h * h);
        if r2 <= 0.0 {
            return None;
        }
        Some(Self {
            center: normal * h,
            normal: *normal,
            radius: r2.sqrt(),
        })
    }

    fn frame(&self, from: &Vector3<f64>) -> (Vector3<f64>, Vector3<f64>) {
        let offset = from - self.center;
        let norm = offset.norm();
        let e1 = if norm > EPSILON {
            offset / norm
        } else {
            any_normal_of_vector(&self.normal)
        };
        (e1, self.normal.cross(&e1))
    }

    fn point(&self, e1: &Vector3<f64>, e2: &Vector3<f64>, angle: f64) -> Vector3<f64> {
        self.center + (e1 * angle.cos() + e2 * angle.sin()) * self.radius
    }

    /// Counterclockwise angle swept from `from` to `to`
    fn sweep(&self, from: &Vector3<f64>, to: &Vector3<f64>) -> f64 {
        if (from - to).norm() <= EPSILON * self.radius.max(1.0) {
            return 0.0;
        }
        ccw_angle(&(from - self.center), &(to - self.center), &self.normal)
    }

    /// `samples` points from `from` to `to` counterclockwise, endpoints kept exact
    fn arc(&self, from: &Vector3<f64>, to: &Vector3<f64>, sweep: f64, samples: usize) -> Vec<Vector3<f64>> {
        let (e1, e2) = self.frame(from);
        let last = samples - 1;
        (0..samples)
            .map(|k| match k {
                0 => *from,
                k if k == last => *to,
                #[allow(clippy::cast_precision_loss)]
                k => self.point(&e1, &e2, sweep * k as f64 / last as f64),
            })
            .collect()
    }

    /// Closed loop of `samples` points starting (and ending) in the direction of `start`
    fn ring(&self, start: &Vector3<f64>, samples: usize) -> (Vec<Vector3<f64>>, Vec<Vector3<f64>>) {
        let (e1, e2) = self.frame(start);
        let last = samples - 1;
        #[allow(clippy::cast_precision_loss)]
        let angles = (0..samples).map(|k| if k == last { 0.0 } else { TAU * k as f64 / last as f64 });
        angles
            .map(|angle| (self.point(&e1, &e2, angle), e1 * angle.cos() + e2 * angle.sin()))
            .unzip()
    }
}

/// Number of samples keeping each step of an `angle` sweep within `step`
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn samples_for(angle: f64, step: f64) -> usize {
    if !angle.is_finite() || angle <= 0.0 {
        return 2;
    }
    let wanted = (angle / step).ceil() as usize + 1;
    if wanted > MAX_SAMPLES {
        debug!("Sweep of {angle:.3} rad needs {wanted} samples, capped at {MAX_SAMPLES}");
    }
    wanted.clamp(2, MAX_SAMPLES)
}

/// Unit directions along a polyline and its total angular length
fn directions(path: &[Vector3<f64>]) -> (Vec<Vector3<f64>>, f64) {
    let dirs: Vec<Vector3<f64>> = path.iter().map(|p| p.normalize()).collect();
    let length = dirs.windows(2).map(|w| angle_between(&w[0], &w[1])).sum();
    (dirs, length)
}

/// Resample a polyline of unit directions into `samples` directions evenly
/// spaced in angle (piecewise great-circle interpolation)
#[allow(clippy::cast_precision_loss)]
fn resample(dirs: &[Vector3<f64>], length: f64, samples: usize) -> Vec<Vector3<f64>> {
    let last = samples - 1;
    if length <= 0.0 || dirs.len() < 2 {
        return vec![dirs[0]; samples];
    }
    let mut out = Vec::with_capacity(samples);
    let mut segment = 0;
    let mut walked = 0.0;
    for k in 0..samples {
        if k == last {
            out.push(dirs[dirs.len() - 1]);
            break;
        }
        let target = length * k as f64 / last as f64;
        let mut span = angle_between(&dirs[segment], &dirs[segment + 1]);
        while walked + span < target && segment + 2 < dirs.len() {
            walked += span;
            segment += 1;
            span = angle_between(&dirs[segment], &dirs[segment + 1]);
        }
        let t = if span > 0.0 {
            ((target - walked) / span).clamp(0.0, 1.0)
        } else {
            0.0
        };
        out.push(slerp_unit(&dirs[segment], &dirs[segment + 1], t));
    }
    out
}

/// Sphere-exact subdivider with an absolute arc-length tolerance.
#[derive(Debug, Clone, Copy)]
pub struct SphereTessellation {
    radius: f64,
    tolerance: f64,
}

impl SphereTessellation {
    /// Tolerance given as a fraction of the radius
    #[must_use]
    pub fn with_tolerance_ratio(radius: f64, ratio: f64) -> Self {
        Self {
            radius,
            tolerance: ratio * radius,
        }
    }

    #[must_use]
    pub const fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Largest angle any emitted edge may subtend on the sphere
    fn step(&self) -> f64 {
        self.tolerance / self.radius
    }

    fn emit<I: Integrator>(&self, ig: &mut I, a: &Vector3<f64>, b: &Vector3<f64>, c: &Vector3<f64>) {
        let area2 = (b - a).cross(&(c - a)).norm();
        if area2 > EPSILON * self.radius * self.radius {
            ig.aggregate(a, b, c);
        }
    }

    fn outside<I: Integrator>(&self, ig: &mut I, corners: [Vector3<f64>; 3], normal: &Vector3<f64>) {
        let boundary = self.boundary(&corners);
        let circle = Circle::of_plane(self.radius, &corners[0], normal);

        if let Some(circle) = circle {
            if boundary.iter().any(|bp| bp.kind == BoundaryKind::Exit) {
                self.clip(ig, &circle, &boundary);
                return;
            }
            if contains(&corners, &circle.center, normal) {
                self.annulus(ig, &circle, &corners);
                return;
            }
        }

        self.projected(ig, &corners);
    }

    /// Whole triangle radially projected onto the sphere
    fn projected<I: Integrator>(&self, ig: &mut I, corners: &[Vector3<f64>; 3]) {
        let [a, b, c] = corners.map(|p| p.normalize());
        self.spherical(ig, &a, &b, &c, MAX_REFINEMENT_DEPTH);
    }

    /// Walk the triangle boundary, inserting the points where it crosses the sphere
    fn boundary(&self, corners: &[Vector3<f64>; 3]) -> Vec<BoundaryPoint> {
        let r2 = self.radius * self.radius;
        let mut points = Vec::with_capacity(9);
        for i in 0..3 {
            let (p, q) = (corners[i], corners[(i + 1) % 3]);
            let p_in = p.norm_squared() <= r2;
            let q_in = q.norm_squared() <= r2;
            points.push(BoundaryPoint {
                p,
                kind: if p_in {
                    BoundaryKind::Inside
                } else {
                    BoundaryKind::Outside
                },
            });

            let interval = line_ball_interval(self.radius, &p, &q);
            let at = |t: f64| p + (q - p) * t.clamp(0.0, 1.0);
            match (p_in, q_in) {
                (true, true) => {}
                (true, false) => points.push(BoundaryPoint {
                    p: interval.map_or(p, |(_, t1)| at(t1)),
                    kind: BoundaryKind::Exit,
                }),
                (false, true) => points.push(BoundaryPoint {
                    p: interval.map_or(q, |(t0, _)| at(t0)),
                    kind: BoundaryKind::Entry,
                }),
                (false, false) => {
                    // Corners on the sphere may round to either side
                    if let Some((t0, t1)) = interval
                        && t0 > -EPSILON
                        && t1 < 1.0 + EPSILON
                        && (t1 - t0) * (q - p).norm() > EPSILON * self.radius
                    {
                        points.push(BoundaryPoint {
                            p: at(t0),
                            kind: BoundaryKind::Entry,
                        });
                        points.push(BoundaryPoint {
                            p: at(t1),
                            kind: BoundaryKind::Exit,
                        });
                    }
                }
            }
        }
        points
    }

    /// Triangle crossing the sphere: fan of `T ∩ disc` plus one ladder per
    /// outside stretch of the boundary
    fn clip<I: Integrator>(&self, ig: &mut I, circle: &Circle, boundary: &[BoundaryPoint]) {
        let n = boundary.len();
        let mut polygon: Vec<Vector3<f64>> = Vec::with_capacity(n + 16);

        for (i, point) in boundary.iter().enumerate() {
            match point.kind {
                BoundaryKind::Outside => {}
                BoundaryKind::Inside | BoundaryKind::Entry => polygon.push(point.p),
                BoundaryKind::Exit => {
                    let Some(j) = (1..n)
                        .map(|k| (i + k) % n)
                        .find(|&j| boundary[j].kind == BoundaryKind::Entry)
                    else {
                        polygon.push(point.p);
                        continue;
                    };
                    let entry = boundary[j].p;

                    let path: Vec<Vector3<f64>> = (0..n)
                        .map(|k| (i + k) % n)
                        .take_while(|&k| k != j)
                        .map(|k| boundary[k].p)
                        .chain(std::iter::once(entry))
                        .collect();
                    let (dirs, path_length) = directions(&path);

                    let sweep = circle.sweep(&point.p, &entry);
                    let samples = samples_for(sweep, self.step()).max(samples_for(path_length, self.step()));
                    let arc = circle.arc(&point.p, &entry, sweep, samples);
                    let rail = resample(&dirs, path_length, samples);

                    polygon.extend_from_slice(&arc[..arc.len() - 1]);
                    self.ladder(ig, &arc, &rail);
                }
            }
        }

        self.fan(ig, &polygon);
    }

    /// Circle entirely inside the triangle: full disc plus the surrounding ring
    fn annulus<I: Integrator>(&self, ig: &mut I, circle: &Circle, corners: &[Vector3<f64>; 3]) {
        let samples = samples_for(TAU, self.step());
        let (ring, headings) = circle.ring(&corners[0], samples);

        // A vanishing circle at a corner leaves no ring to ladder from
        let Some(rail) = headings
            .iter()
            .map(|heading| {
                ray_exit(&circle.center, heading, corners, &circle.normal).map(|p| p.normalize())
            })
            .collect::<Option<Vec<_>>>()
        else {
            self.projected(ig, corners);
            return;
        };

        for k in 0..ring.len() - 1 {
            self.emit(
                ig,
                &circle.center,
                &clamp_to_sphere(&ring[k], self.radius),
                &clamp_to_sphere(&ring[k + 1], self.radius),
            );
        }
        self.ladder(ig, &ring, &rail);
    }

    fn fan<I: Integrator>(&self, ig: &mut I, polygon: &[Vector3<f64>]) {
        if polygon.len() < 3 {
            return;
        }
        let origin = clamp_to_sphere(&polygon[0], self.radius);
        for w in polygon[1..].windows(2) {
            self.emit(
                ig,
                &origin,
                &clamp_to_sphere(&w[0], self.radius),
                &clamp_to_sphere(&w[1], self.radius),
            );
        }
    }

    /// Grid between matching arc samples and boundary directions, every node
    /// radially projected onto the sphere
    fn ladder<I: Integrator>(&self, ig: &mut I, arc: &[Vector3<f64>], rail: &[Vector3<f64>]) {
        let arc: Vec<Vector3<f64>> = arc.iter().map(|p| p.normalize()).collect();
        let widest = arc
            .iter()
            .zip(rail)
            .map(|(a, r)| angle_between(a, r))
            .fold(0.0, f64::max);
        let rows = samples_for(widest, self.step()) - 1;

        #[allow(clippy::cast_precision_loss)]
        let grid: Vec<Vec<Vector3<f64>>> = arc
            .iter()
            .zip(rail)
            .map(|(a, r)| {
                (0..=rows)
                    .map(|j| slerp_unit(a, r, j as f64 / rows as f64) * self.radius)
                    .collect()
            })
            .collect();

        for pair in grid.windows(2) {
            let (near, far) = (&pair[0], &pair[1]);
            for j in 0..rows {
                self.emit(ig, &near[j], &far[j], &far[j + 1]);
                self.emit(ig, &near[j], &far[j + 1], &near[j + 1]);
            }
        }
    }

    /// Geodesic midpoint refinement of a spherical triangle given by unit corners
    fn spherical<I: Integrator>(
        &self,
        ig: &mut I,
        a: &Vector3<f64>,
        b: &Vector3<f64>,
        c: &Vector3<f64>,
        depth: u32,
    ) {
        let longest = angle_between(a, b)
            .max(angle_between(b, c))
            .max(angle_between(c, a));
        if depth == 0 || longest <= self.step() {
            if longest > self.step() {
                trace!("Refinement depth reached with edges of {longest:.3e} rad");
            }
            self.emit(ig, &(a * self.radius), &(b * self.radius), &(c * self.radius));
            return;
        }
        let ab = slerp_unit(a, b, 0.5);
        let bc = slerp_unit(b, c, 0.5);
        let ca = slerp_unit(c, a, 0.5);
        self.spherical(ig, a, &ab, &ca, depth - 1);
        self.spherical(ig, &ab, b, &bc, depth - 1);
        self.spherical(ig, &ca, &bc, c, depth - 1);
        self.spherical(ig, &ab, &bc, &ca, depth - 1);
    }
}

/// Whether `p` (in the plane of the triangle) lies inside it
fn contains(corners: &[Vector3<f64>; 3], p: &Vector3<f64>, normal: &Vector3<f64>) -> bool {
    (0..3).all(|i| {
        let (a, b) = (corners[i], corners[(i + 1) % 3]);
        normal.dot(&(b - a).cross(&(p - a))) >= 0.0
    })
}

/// Where the in-plane ray from `origin` along the unit `heading` leaves the triangle
fn ray_exit(
    origin: &Vector3<f64>,
    heading: &Vector3<f64>,
    corners: &[Vector3<f64>; 3],
    normal: &Vector3<f64>,
) -> Option<Vector3<f64>> {
    let side = normal.cross(heading);
    (0..3)
        .filter_map(|i| {
            let p = corners[i] - origin;
            let e = corners[(i + 1) % 3] - corners[i];
            let ey = e.dot(&side);
            if ey.abs() < EPSILON {
                return None;
            }
            // origin + s·heading = corners[i] + t·e
            let t = -p.dot(&side) / ey;
            let s = t.mul_add(e.dot(heading), p.dot(heading));
            ((-EPSILON..=1.0 + EPSILON).contains(&t) && s > 0.0).then_some(s)
        })
        .reduce(f64::min)
        .map(|s| origin + heading * s)
}

impl Subdivider for SphereTessellation {
    fn new(radius: f64) -> Self {
        Self::with_tolerance_ratio(radius, DEFAULT_TOLERANCE_RATIO)
    }

    fn radius(&self) -> f64 {
        self.radius
    }

    fn validate(&self) -> Result<(), OffsetError> {
        if !(self.radius.is_finite() && self.radius > 0.0) {
            return Err(OffsetError::InvalidRadius(self.radius));
        }
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(OffsetError::InvalidTolerance(self.tolerance));
        }
        Ok(())
    }

    fn aggregate<I: Integrator>(
        &self,
        ig: &mut I,
        a: &Vector3<f64>,
        b: &Vector3<f64>,
        c: &Vector3<f64>,
    ) {
        let normal = (b - a).cross(&(c - a));
        let length = normal.norm();
        if length <= EPSILON * (b - a).norm() * (c - a).norm() {
            return;
        }
        let normal = normal / length;

        match Coverage::classify(self.radius, a, b, c) {
            Coverage::Inside => ig.aggregate(a, b, c),
            Coverage::Outside => self.outside(ig, [*a, *b, *c], &normal),
            Coverage::Apex(corner) | Coverage::Notch(corner) => {
                let corners = rotated(corner, a, b, c);
                match Circle::of_plane(self.radius, &corners[0], &normal) {
                    Some(circle) => self.clip(ig, &circle, &self.boundary(&corners)),
                    // Plane tangent at the corner on the sphere
                    None => self.projected(ig, &corners),
                }
            }
        }
    }
}
