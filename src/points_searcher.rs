//! Uniform grid over point positions for radius queries.

use nalgebra::Point3;

use crate::types::ValuedId;

/// Target average number of points per occupied box
const POINTS_PER_BOX: f64 = 4.0;

/// Grid coordinates for spatial indexing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct GridPoint {
    x: i32,
    y: i32,
    z: i32,
}

impl GridPoint {
    #[allow(clippy::cast_possible_truncation)]
    fn from_point(p: &Point3<f64>, box_size: f64, offset: &Self) -> Self {
        Self {
            x: (p.x / box_size).floor() as i32 - offset.x,
            y: (p.y / box_size).floor() as i32 - offset.y,
            z: (p.z / box_size).floor() as i32 - offset.z,
        }
    }

    #[allow(clippy::cast_sign_loss)]
    const fn index(&self, grid_size: &Self) -> Option<usize> {
        if self.x >= 0
            && self.y >= 0
            && self.z >= 0
            && self.x < grid_size.x
            && self.y < grid_size.y
            && self.z < grid_size.z
        {
            Some((self.z * grid_size.x * grid_size.y + self.y * grid_size.x + self.x) as usize)
        } else {
            None
        }
    }
}

/// Grid parameters for spatial indexing
#[derive(Debug, Clone)]
struct GridParameters {
    grid_offset: GridPoint,
    grid_size: GridPoint,
    box_size: f64,
}

impl GridParameters {
    #[allow(clippy::cast_precision_loss)]
    fn new(points: &[Point3<f64>]) -> Self {
        let mut params = Self {
            grid_offset: GridPoint::default(),
            grid_size: GridPoint { x: 1, y: 1, z: 1 },
            box_size: 1.0,
        };

        let Some(first) = points.first() else {
            return params;
        };

        let (mut lo, mut hi) = (*first, *first);
        for p in points {
            lo = lo.inf(p);
            hi = hi.sup(p);
        }

        // Box edge sized for a few points per box at uniform density
        let extent = hi - lo;
        let longest = extent.max();
        if longest > 0.0 {
            let volume = extent.iter().map(|e| e.max(longest * 1e-3)).product::<f64>();
            let boxes = (points.len() as f64 / POINTS_PER_BOX).max(1.0);
            params.box_size = (volume / boxes).cbrt().max(longest * 1e-3);
        }

        let zero = GridPoint::default();
        let low = GridPoint::from_point(&lo, params.box_size, &zero);
        let high = GridPoint::from_point(&hi, params.box_size, &zero);
        params.grid_offset = low;
        params.grid_size = GridPoint {
            x: high.x - low.x + 1,
            y: high.y - low.y + 1,
            z: high.z - low.z + 1,
        };

        params
    }
}

/// Grid-based spatial index answering "all points within a radius" queries
#[derive(Debug, Clone)]
pub struct PointsSearcher {
    points: Vec<Point3<f64>>,
    grid_params: GridParameters,
    /// Map from grid cell index to box index (-1 = empty)
    map_of_boxes: Vec<i32>,
    /// Each box contains point indices
    boxes: Vec<Vec<usize>>,
}

impl PointsSearcher {
    #[must_use]
    pub fn new(points: Vec<Point3<f64>>) -> Self {
        let grid_params = GridParameters::new(&points);
        let mut searcher = Self {
            points,
            grid_params,
            map_of_boxes: Vec::new(),
            boxes: Vec::new(),
        };
        searcher.init_boxes();
        searcher
    }

    /// Grid box edge, a rough typical spacing between points
    #[must_use]
    pub const fn spacing(&self) -> f64 {
        self.grid_params.box_size
    }

    #[allow(
        clippy::cast_sign_loss,
        clippy::cast_possible_truncation,
        clippy::cast_possible_wrap
    )]
    fn init_boxes(&mut self) {
        let total_cells = (self.grid_params.grid_size.x
            * self.grid_params.grid_size.y
            * self.grid_params.grid_size.z) as usize;

        self.map_of_boxes = vec![-1; total_cells];
        self.boxes.clear();

        for (i, p) in self.points.iter().enumerate() {
            let gp = GridPoint::from_point(p, self.grid_params.box_size, &self.grid_params.grid_offset);
            if let Some(index) = gp.index(&self.grid_params.grid_size) {
                let box_id = self.map_of_boxes[index];
                if box_id < 0 {
                    self.map_of_boxes[index] = self.boxes.len() as i32;
                    self.boxes.push(vec![i]);
                } else {
                    self.boxes[box_id as usize].push(i);
                }
            }
        }
    }

    /// Grid rows overlapping `[low, high]` along one axis, clamped to the grid
    #[allow(clippy::cast_possible_truncation)]
    fn rows(&self, low: f64, high: f64, offset: i32, size: i32) -> std::ops::RangeInclusive<i32> {
        let box_size = self.grid_params.box_size;
        let (first, last) = (f64::from(offset), f64::from(offset + size - 1));
        let row = |x: f64| (x / box_size).floor().clamp(first, last) as i32 - offset;
        row(low)..=row(high)
    }

    /// Indices of all points within `radius` of `center`, nearest first.
    /// `value` holds the distance.
    #[allow(clippy::cast_sign_loss)]
    #[must_use]
    pub fn find_within(&self, center: &Point3<f64>, radius: f64) -> Vec<ValuedId> {
        let mut found = Vec::new();
        if self.points.is_empty() || radius.is_nan() || radius < 0.0 {
            return found;
        }

        let params = &self.grid_params;
        let (offset, size) = (params.grid_offset, params.grid_size);
        let radius_squared = radius * radius;
        for z in self.rows(center.z - radius, center.z + radius, offset.z, size.z) {
            for y in self.rows(center.y - radius, center.y + radius, offset.y, size.y) {
                for x in self.rows(center.x - radius, center.x + radius, offset.x, size.x) {
                    let Some(index) = (GridPoint { x, y, z }).index(&size) else {
                        continue;
                    };
                    let box_id = self.map_of_boxes[index];
                    if box_id < 0 {
                        continue;
                    }
                    for &id in &self.boxes[box_id as usize] {
                        let d2 = (self.points[id] - center).norm_squared();
                        if d2 <= radius_squared {
                            found.push(ValuedId::new(d2.sqrt(), id));
                        }
                    }
                }
            }
        }

        found.sort_unstable();
        found
    }
}
