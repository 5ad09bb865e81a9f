// Copyright (c) 2026 The powercell developers
// Part of the powercell project, licensed under the MIT License.
// SPDX-License-Identifier: MIT

//! Point cloud parsing.
//!
//! One point per line: `x y z` or `x y z w` (whitespace separated). Blank
//! lines and lines starting with `#` are skipped.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use log::{debug, info};

use crate::types::WeightedPoint;

fn invalid(line_number: usize, message: &str) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidData,
        format!("line {line_number}: {message}"),
    )
}

fn parse_line(line: &str, line_number: usize) -> io::Result<WeightedPoint> {
    let values = line
        .split_whitespace()
        .map(str::parse::<f64>)
        .collect::<Result<Vec<f64>, _>>()
        .map_err(|e| invalid(line_number, &e.to_string()))?;

    match values[..] {
        [x, y, z] => Ok(WeightedPoint::unweighted(x, y, z)),
        [x, y, z, w] => Ok(WeightedPoint::new(x, y, z, w)),
        _ => Err(invalid(
            line_number,
            &format!("expected 3 or 4 columns, found {}", values.len()),
        )),
    }
}

/// Parse a point cloud from a buffered reader.
///
/// # Errors
/// Returns `InvalidData` naming the first malformed line, or the underlying
/// read error.
pub fn parse_reader<R: BufRead>(reader: R) -> io::Result<Vec<WeightedPoint>> {
    let mut points = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        points.push(parse_line(trimmed, index + 1)?);
    }
    debug!("Parsed {} points", points.len());
    Ok(points)
}

/// Parse a point cloud file.
///
/// # Errors
/// Returns error if the file cannot be opened or contains a malformed line.
pub fn parse_file(path: &Path) -> io::Result<Vec<WeightedPoint>> {
    let file = File::open(path)?;
    let points = parse_reader(BufReader::new(file))?;
    info!("Read {} points from {}", points.len(), path.display());
    Ok(points)
}

/// Parse a point cloud from standard input.
///
/// # Errors
/// See [`parse_reader`].
pub fn parse_stdin() -> io::Result<Vec<WeightedPoint>> {
    let stdin = io::stdin();
    parse_reader(stdin.lock())
}
