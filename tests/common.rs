#![allow(dead_code)]

use std::io::Write;
use std::process::{Command, Output, Stdio};

use nalgebra::Point3;
use powercell::{FaceTable, VertexId, WeightedPoint};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;

#[derive(Deserialize)]
pub struct PointRecord {
    pub index: usize,
    pub value: Option<serde_json::Value>,
}

#[derive(Deserialize)]
pub struct JsonResult {
    pub radius: f64,
    pub points: Vec<PointRecord>,
    pub num_points: usize,
    pub hidden: usize,
    pub total_volume: Option<f64>,
    pub total_area: Option<f64>,
}

pub fn binary_command() -> Command {
    Command::new(env!("CARGO_BIN_EXE_powercell"))
}

/// Run the binary with `input` on stdin
pub fn run_with_stdin(args: &[&str], input: &str) -> Output {
    let mut child = binary_command()
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to run binary");
    child
        .stdin
        .take()
        .expect("stdin was not piped")
        .write_all(input.as_bytes())
        .expect("failed to write stdin");
    child.wait_with_output().expect("failed to wait for binary")
}

/// Run the binary, require success and return stdout
pub fn run_ok(args: &[&str], input: &str) -> String {
    let output = run_with_stdin(args, input);
    assert!(
        output.status.success(),
        "binary failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout).expect("stdout was not UTF-8")
}

pub fn parse_json(output: &str) -> JsonResult {
    serde_json::from_str(output).expect("failed to parse JSON output")
}

/// Integer lattice `n`×`n`×`n` with unit spacing, x varying fastest
pub fn lattice(n: usize) -> Vec<WeightedPoint> {
    let mut points = Vec::with_capacity(n * n * n);
    for k in 0..n {
        for j in 0..n {
            for i in 0..n {
                #[allow(clippy::cast_precision_loss)]
                points.push(WeightedPoint::unweighted(i as f64, j as f64, k as f64));
            }
        }
    }
    points
}

pub fn lattice_text(n: usize) -> String {
    lattice(n)
        .iter()
        .map(|p| format!("{} {} {}\n", p.x, p.y, p.z))
        .collect()
}

/// Unweighted points uniform in `[0, side]³`
pub fn random_cloud(n: usize, side: f64, seed: u64) -> Vec<WeightedPoint> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|_| {
            WeightedPoint::unweighted(
                rng.random_range(0.0..side),
                rng.random_range(0.0..side),
                rng.random_range(0.0..side),
            )
        })
        .collect()
}

/// Faces of the cube `[-1, 1]³` around the origin, one per axis direction,
/// each paired with the neighbor generating it
pub fn cube_faces() -> Vec<(Point3<f64>, Vec<Point3<f64>>)> {
    let mut faces = Vec::new();
    for axis in 0..3 {
        for sign in [-1.0, 1.0] {
            let mut neighbor = [0.0; 3];
            neighbor[axis] = 2.0 * sign;
            let (i, j) = ((axis + 1) % 3, (axis + 2) % 3);
            let polygon = [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)]
                .iter()
                .map(|&(s, t)| {
                    let mut p = [0.0; 3];
                    p[axis] = sign;
                    p[i] = s;
                    p[j] = t;
                    Point3::from(p)
                })
                .collect();
            faces.push((Point3::from(neighbor), polygon));
        }
    }
    faces
}

/// Face table holding the cube cell with faces inserted in `order`
pub fn cube_table(order: &[usize]) -> (FaceTable, VertexId) {
    let faces = cube_faces();
    let mut table = FaceTable::new();
    let v = table.add_vertex(Point3::origin());
    for &f in order {
        let (neighbor, polygon) = &faces[f];
        let u = table.add_vertex(*neighbor);
        table.add_face(v, u, polygon.clone()).expect("vertices were added");
    }
    (table, v)
}
