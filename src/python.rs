// Copyright (c) 2026 The powercell developers
// Part of the powercell project, licensed under the MIT License.
// SPDX-License-Identifier: MIT

//! Python bindings for powercell using `PyO3`.

use numpy::{PyReadonlyArray2, PyUntypedArrayMethods};
use pyo3::exceptions::{PyIndexError, PyTypeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::{PyList, PyTuple};

use crate::{
    Measure, MeasureValue, OffsetError, PowerDiagram, PowerDiagramOptions, PrincipalAxes,
    Subdivision, WeightedPoint, measure_points,
};

fn to_py_err(e: OffsetError) -> PyErr {
    match e {
        OffsetError::UnknownVertex(_) => PyIndexError::new_err(e.to_string()),
        _ => PyValueError::new_err(e.to_string()),
    }
}

/// Point from a 3- or 4-element row (x, y, z[, w]).
fn point_from_row(row: &[f64]) -> PyResult<WeightedPoint> {
    match *row {
        [x, y, z] => Ok(WeightedPoint::unweighted(x, y, z)),
        [x, y, z, w] => Ok(WeightedPoint::new(x, y, z, w)),
        _ => Err(PyValueError::new_err(
            "points must have 3 (x, y, z) or 4 (x, y, z, w) components",
        )),
    }
}

/// Parse points from a numpy array (N x 3 or N x 4) or a list of tuples/lists.
fn parse_points(obj: &Bound<'_, PyAny>) -> PyResult<Vec<WeightedPoint>> {
    if let Ok(arr) = obj.extract::<PyReadonlyArray2<f64>>() {
        let shape = arr.shape();
        if shape[1] != 3 && shape[1] != 4 {
            return Err(PyValueError::new_err(
                "numpy array must have shape (N, 3) or (N, 4)",
            ));
        }
        return arr
            .as_array()
            .rows()
            .into_iter()
            .map(|row| point_from_row(&row.to_vec()))
            .collect();
    }

    let list = obj
        .downcast::<PyList>()
        .map_err(|_| PyTypeError::new_err("points must be a numpy array or a list"))?;
    list.iter()
        .map(|item| {
            if item.downcast::<PyTuple>().is_err() && item.downcast::<PyList>().is_err() {
                return Err(PyTypeError::new_err("each point must be a tuple or list"));
            }
            point_from_row(&item.extract::<Vec<f64>>()?)
        })
        .collect()
}

/// Power diagram of a weighted point cloud.
///
/// Hidden points (empty cells) raise `IndexError` when integrated.
#[pyclass(name = "PowerDiagram", frozen)]
struct PyPowerDiagram {
    diagram: PowerDiagram,
}

impl PyPowerDiagram {
    fn measure(&self, py: Python<'_>, index: usize, radius: f64, measure: Measure) -> PyResult<MeasureValue> {
        let measures = py
            .allow_threads(|| {
                measure_points(&self.diagram, &[index], radius, measure, Subdivision::default())
            })
            .map_err(to_py_err)?;
        measures
            .into_iter()
            .next()
            .and_then(|m| m.value)
            .ok_or_else(|| to_py_err(OffsetError::UnknownVertex(index)))
    }
}

#[pymethods]
impl PyPowerDiagram {
    #[new]
    #[pyo3(signature = (points, bound=crate::DEFAULT_BOUND))]
    fn new(py: Python<'_>, points: &Bound<'_, PyAny>, bound: f64) -> PyResult<Self> {
        let points = parse_points(points)?;
        let diagram = py
            .allow_threads(|| PowerDiagram::with_options(&points, PowerDiagramOptions { bound }))
            .map_err(to_py_err)?;
        Ok(Self { diagram })
    }

    /// Number of input points
    fn __len__(&self) -> usize {
        self.diagram.num_points()
    }

    fn is_hidden(&self, index: usize) -> bool {
        self.diagram.is_hidden(index)
    }

    /// Volume of the cell of `index` within `radius`
    fn volume(&self, py: Python<'_>, index: usize, radius: f64) -> PyResult<f64> {
        match self.measure(py, index, radius, Measure::Volume)? {
            MeasureValue::Volume(v) => Ok(v),
            _ => unreachable!("volume measure yields a volume"),
        }
    }

    /// Covariance terms `(M11, M12, M13, M22, M23, M33)`
    fn covariance(&self, py: Python<'_>, index: usize, radius: f64) -> PyResult<[f64; 6]> {
        match self.measure(py, index, radius, Measure::Covariance)? {
            MeasureValue::Covariance(c) => Ok(c.0),
            _ => unreachable!("covariance measure yields a covariance"),
        }
    }

    /// Eigenvalues (descending) and matching unit eigenvectors of the covariance
    fn principal_axes(
        &self,
        py: Python<'_>,
        index: usize,
        radius: f64,
    ) -> PyResult<([f64; 3], [[f64; 3]; 3])> {
        let MeasureValue::Covariance(c) = self.measure(py, index, radius, Measure::Covariance)? else {
            unreachable!("covariance measure yields a covariance");
        };
        let axes = PrincipalAxes::from_covariance(&c);
        Ok((axes.values, axes.axes.map(|a| [a.x, a.y, a.z])))
    }

    /// Clipped cell boundary as `(points, triangles)`
    fn mesh(
        &self,
        py: Python<'_>,
        index: usize,
        radius: f64,
    ) -> PyResult<(Vec<[f64; 3]>, Vec<[usize; 3]>)> {
        let MeasureValue::Mesh(mesh) = self.measure(py, index, radius, Measure::Mesh)? else {
            unreachable!("mesh measure yields a mesh");
        };
        Ok((
            mesh.points.iter().map(|p| [p.x, p.y, p.z]).collect(),
            mesh.triangles,
        ))
    }
}

/// Volumes of all cells within `radius`, `nan` for hidden points.
#[pyfunction]
#[pyo3(signature = (points, radius, tolerance=crate::DEFAULT_TOLERANCE_RATIO))]
fn volumes(py: Python<'_>, points: &Bound<'_, PyAny>, radius: f64, tolerance: f64) -> PyResult<Vec<f64>> {
    let points = parse_points(points)?;
    let subdivision = Subdivision::SphereTessellation {
        tolerance_ratio: tolerance,
    };

    // Release GIL during computation
    let measures = py
        .allow_threads(|| {
            let diagram = PowerDiagram::new(&points)?;
            let vertices: Vec<usize> = (0..diagram.num_points()).collect();
            measure_points(&diagram, &vertices, radius, Measure::Volume, subdivision)
        })
        .map_err(to_py_err)?;

    Ok(measures
        .into_iter()
        .map(|m| match m.value {
            Some(MeasureValue::Volume(v)) => v,
            _ => f64::NAN,
        })
        .collect())
}

/// Python module definition.
#[pymodule]
fn powercell(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyPowerDiagram>()?;
    m.add_function(wrap_pyfunction!(volumes, m)?)?;
    Ok(())
}
