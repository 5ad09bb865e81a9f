//! CLI for sphere-restricted power cell measures of point clouds.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::time::Instant;

use clap::{ArgAction, Parser, ValueEnum};
use log::{debug, info, warn};
use powercell::input::{parse_file, parse_stdin};
use powercell::{
    DEFAULT_BOUND, DEFAULT_TOLERANCE_RATIO, Kernel, Measure, MeasureValue, OffsetError,
    PowerDiagram, PowerDiagramOptions, Smoothing, Subdivision, TriangleMesh, VertexId,
    VertexMeasure, measure_points, measure_points_smoothed,
};
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum MeasureArg {
    Volume,
    Covariance,
    Normal,
    Mesh,
}

impl From<MeasureArg> for Measure {
    fn from(arg: MeasureArg) -> Self {
        match arg {
            MeasureArg::Volume => Self::Volume,
            MeasureArg::Covariance => Self::Covariance,
            MeasureArg::Normal => Self::Normal,
            MeasureArg::Mesh => Self::Mesh,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum SubdividerArg {
    /// Forward boundary triangles unclipped
    None,
    /// Pull far corners onto the sphere
    Clamp,
    /// Sphere-exact tessellation
    Exact,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum KernelArg {
    Uniform,
    Tent,
}

impl From<KernelArg> for Kernel {
    fn from(arg: KernelArg) -> Self {
        match arg {
            KernelArg::Uniform => Self::Uniform,
            KernelArg::Tent => Self::Tent,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

/// JSON output: per-point records and totals
#[derive(Serialize)]
struct JsonOutput<'a> {
    radius: f64,
    points: &'a [VertexMeasure],
    num_points: usize,
    hidden: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    total_volume: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    total_area: Option<f64>,
}

#[derive(Parser)]
#[command(name = "powercell")]
#[command(about = "Integrate power diagram cells of a point cloud inside a ball")]
#[command(
    long_about = "Builds the power diagram of a point cloud and, for each point, integrates \
    over the part of its cell that lies within a ball of radius R around it. \
    Reports cell volumes, second-moment tensors, normal estimates, or clipped cell meshes.\n\n\
    Input has one point per line: x y z [weight]."
)]
struct Cli {
    /// Input point cloud. Reads from stdin if not specified
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Output file. Writes to stdout if not specified
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Integration radius
    #[arg(short = 'R', long, default_value_t = 0.1)]
    radius: f64,

    /// Quantity to integrate
    #[arg(long, value_enum, default_value_t = MeasureArg::Volume)]
    measure: MeasureArg,

    /// How boundary faces are restricted to the ball
    #[arg(long, value_enum, default_value_t = SubdividerArg::Exact)]
    subdivider: SubdividerArg,

    /// Arc tolerance of the exact subdivider, as a fraction of the radius
    #[arg(long, default_value_t = DEFAULT_TOLERANCE_RATIO)]
    tolerance: f64,

    /// Extent of the bounding breaker points
    #[arg(long, default_value_t = DEFAULT_BOUND)]
    bound: f64,

    /// Sum each result over the measured points within this distance
    #[arg(long, value_name = "RADIUS")]
    convolve: Option<f64>,

    /// Neighbour weight used by --convolve
    #[arg(long, value_enum, default_value_t = KernelArg::Uniform)]
    kernel: KernelArg,

    /// Integrate only this point
    #[arg(short = 'N', long)]
    index: Option<VertexId>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Increase verbosity (-v: debug, -vv: trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Reduce verbosity to warnings only
    #[arg(short, long)]
    quiet: bool,

    /// Maximum number of threads to use (default: all available)
    #[arg(long)]
    processors: Option<usize>,

    /// Measure and output running time to stderr
    #[arg(long)]
    measure_running_time: bool,
}

impl Cli {
    const fn subdivision(&self) -> Subdivision {
        match self.subdivider {
            SubdividerArg::None => Subdivision::PassThrough,
            SubdividerArg::Clamp => Subdivision::RadialClamp,
            SubdividerArg::Exact => Subdivision::SphereTessellation {
                tolerance_ratio: self.tolerance,
            },
        }
    }
}

fn invalid_input(e: OffsetError) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidInput, e)
}

/// Placeholder line for a point without a cell
const fn hidden_line(measure: Measure) -> Option<&'static str> {
    match measure {
        Measure::Volume => Some("nan"),
        Measure::Covariance => Some("nan nan nan nan nan nan"),
        Measure::Normal => Some("nan nan nan"),
        Measure::Mesh => None,
    }
}

fn write_text<W: Write>(mut out: W, measure: Measure, measures: &[VertexMeasure]) -> io::Result<()> {
    let mut merged = TriangleMesh::new();
    for m in measures {
        match &m.value {
            Some(MeasureValue::Volume(v)) => writeln!(out, "{v}")?,
            Some(MeasureValue::Covariance(c)) => {
                let [m11, m12, m13, m22, m23, m33] = c.0;
                writeln!(out, "{m11} {m12} {m13} {m22} {m23} {m33}")?;
            }
            Some(MeasureValue::Normal(n)) => writeln!(out, "{} {} {}", n.x, n.y, n.z)?,
            Some(MeasureValue::Mesh(mesh)) => merged.append(mesh),
            None => {
                if let Some(line) = hidden_line(measure) {
                    writeln!(out, "{line}")?;
                }
            }
        }
    }
    if measure == Measure::Mesh {
        merged.write_off(&mut out)?;
    }
    Ok(())
}

fn json_output(radius: f64, measures: &[VertexMeasure]) -> JsonOutput<'_> {
    let mut total_volume = None;
    let mut total_area = None;
    for m in measures {
        match &m.value {
            Some(MeasureValue::Volume(v)) => *total_volume.get_or_insert(0.0) += v,
            Some(MeasureValue::Mesh(mesh)) => *total_area.get_or_insert(0.0) += mesh.area(),
            _ => {}
        }
    }
    JsonOutput {
        radius,
        points: measures,
        num_points: measures.len(),
        hidden: measures.iter().filter(|m| m.value.is_none()).count(),
        total_volume,
        total_area,
    }
}

fn main() -> io::Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = if cli.quiet {
        "warn"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    // Configure thread pool if --processors specified
    if let Some(num_threads) = cli.processors {
        rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build_global()
            .map_err(io::Error::other)?;
        info!("Using {num_threads} threads");
    }

    let points = match &cli.input {
        Some(path) => parse_file(path)?,
        None => parse_stdin()?,
    };
    info!("Read {} points", points.len());

    let vertices: Vec<VertexId> = match cli.index {
        Some(index) if index >= points.len() => {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("--index {index} is out of range for {} points", points.len()),
            ));
        }
        Some(index) => vec![index],
        None => (0..points.len()).collect(),
    };

    let start = Instant::now();
    let options = PowerDiagramOptions { bound: cli.bound };
    let diagram = PowerDiagram::with_options(&points, options).map_err(invalid_input)?;
    let built = start.elapsed();

    let measure = Measure::from(cli.measure);
    debug!("Integrating {measure:?} with {:?}", cli.subdivision());
    let measures = match cli.convolve {
        Some(radius) => {
            if vertices.len() == 1 {
                warn!("Convolving a single point leaves its value unchanged");
            }
            let smoothing = Smoothing {
                kernel: cli.kernel.into(),
                radius,
            };
            measure_points_smoothed(
                &diagram,
                &vertices,
                cli.radius,
                measure,
                cli.subdivision(),
                smoothing,
            )
        }
        None => measure_points(&diagram, &vertices, cli.radius, measure, cli.subdivision()),
    }
    .map_err(invalid_input)?;
    let elapsed = start.elapsed();

    info!(
        "Integrated {} points ({} hidden)",
        measures.len(),
        measures.iter().filter(|m| m.value.is_none()).count()
    );

    if cli.measure_running_time {
        info!("Power diagram time: {} ms", built.as_millis());
        info!("Total time: {} ms", elapsed.as_millis());
    }

    let out: Box<dyn Write> = match &cli.output {
        Some(path) => Box::new(File::create(path)?),
        None => Box::new(io::stdout().lock()),
    };
    let mut out = BufWriter::new(out);
    match cli.format {
        OutputFormat::Text => write_text(&mut out, measure, &measures)?,
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut out, &json_output(cli.radius, &measures))?;
            writeln!(out)?;
        }
    }
    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use powercell::CovarianceVector;

    fn text(measure: Measure, measures: &[VertexMeasure]) -> String {
        let mut buffer = Vec::new();
        write_text(&mut buffer, measure, measures).unwrap();
        String::from_utf8(buffer).unwrap()
    }

    #[test]
    fn hidden_points_are_nan() {
        let measures = [
            VertexMeasure {
                index: 0,
                value: Some(MeasureValue::Volume(0.5)),
            },
            VertexMeasure {
                index: 1,
                value: None,
            },
        ];
        assert_eq!(text(Measure::Volume, &measures), "0.5\nnan\n");

        let json = serde_json::to_value(json_output(1.0, &measures)).unwrap();
        assert!(json["points"][1]["value"].is_null());
        assert_eq!(json["hidden"], 1);
        assert_eq!(json["total_volume"], 0.5);
    }

    #[test]
    fn covariance_is_six_columns() {
        let measures = [VertexMeasure {
            index: 0,
            value: Some(MeasureValue::Covariance(CovarianceVector([1.0, 2.0, 3.0, 4.0, 5.0, 6.0]))),
        }];
        assert_eq!(text(Measure::Covariance, &measures), "1 2 3 4 5 6\n");
    }

    #[test]
    fn empty_mesh_is_valid_off() {
        assert_eq!(text(Measure::Mesh, &[]), "OFF\n0 0 0\n");
    }
}
