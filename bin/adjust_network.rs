use std::f64::consts::PI;
use std::time::Instant;

use clap::Parser;
use surveynet::basic::azimuth;
use surveynet::data::{ControlPoint, DatasetBuilder, ObservationKind};
use surveynet::{Adjustment, AdjustmentOptions, Dataset, SurveyNetResult, TiePointSelection};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "adjust_network")]
#[command(about = "Adjust a synthetic control network with a chosen weighting method")]
struct Args {
    /// Observation weighting method, by name or label (e.g. "weighted", "huber", "Tukey")
    #[arg(short, long, default_value = "weighted")]
    method: String,

    /// Free adjustment method; every point becomes estimated and tied to its approximation
    #[arg(long)]
    free: Option<String>,

    /// Solver profile: "default", "precise" or "coarse"
    #[arg(short, long, default_value = "default")]
    profile: String,

    /// Sigma profile: "default", "total_station" or "gnss"
    #[arg(long, default_value = "default")]
    sigmas: String,

    /// Number of fixed points on the outer ring
    #[arg(short, long, default_value = "8")]
    ring: usize,

    /// Blunder added to the first distance (length units)
    #[arg(short, long, default_value = "0.0")]
    outlier: f64,

    /// Enable debug output
    #[arg(short, long)]
    verbose: bool,
}

/// Ring of fixed points around two estimated points, observed by distances
/// and azimuths. Approximations are offset from the truth by a few decimeters.
fn ring_network(ring: usize, outlier: f64, free: bool) -> SurveyNetResult<Dataset> {
    let radius = 150.0;
    let targets = [("N1", -20.0, 15.0), ("N2", 25.0, -10.0)];
    let offsets = [(0.35, -0.2), (-0.3, 0.25)];

    let mut builder = DatasetBuilder::new();
    let mut stations = Vec::with_capacity(ring);
    for k in 0..ring {
        let angle = 2.0 * PI * k as f64 / ring as f64;
        let id = format!("R{k}");
        let (x, y) = (radius * angle.cos(), radius * angle.sin());
        let point = ControlPoint::planar(id.as_str(), x, y);
        builder = builder
            .control(if free { point } else { point.fixed() })
            .station(format!("S{id}"), id.as_str());
        stations.push((format!("S{id}"), x, y));
    }
    for ((id, x, y), (ox, oy)) in targets.iter().zip(offsets) {
        builder = builder.control(ControlPoint::planar(*id, x + ox, y + oy));
    }

    let mut first = true;
    for (station, sx, sy) in &stations {
        for (id, x, y) in targets {
            let mut distance = (x - sx).hypot(y - sy);
            if first {
                distance += outlier;
                first = false;
            }
            builder = builder
                .observe(station.as_str(), id, ObservationKind::Hd, distance, Some(0.005))
                .observe(
                    station.as_str(),
                    id,
                    ObservationKind::A,
                    azimuth(*sx, *sy, x, y),
                    None,
                );
        }
    }
    builder.build()
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    if args.verbose {
        surveynet::init_logger_with_level(tracing::Level::DEBUG);
    } else {
        surveynet::init_logger();
    }

    if args.ring < 3 {
        return Err("the ring needs at least 3 points".into());
    }
    let dataset = ring_network(args.ring, args.outlier, args.free.is_some())?;
    info!(
        "Network: {} points, {} stations, {} measurements",
        dataset.controls().len(),
        dataset.stations().len(),
        dataset.measurements().len()
    );

    let mut options = AdjustmentOptions::new(args.method.as_str())
        .with_solver_profile(args.profile.as_str())
        .with_sigma_profile(args.sigmas.as_str())
        .with_list_of_variances(true);
    if let Some(free) = &args.free {
        options = options
            .with_free_adjustment(free.as_str())
            .with_tie_points(TiePointSelection::All);
    }

    let mut adjustment = Adjustment::new(dataset, options)?;
    let start = Instant::now();
    let status = adjustment.adjust()?;
    let elapsed = start.elapsed();

    let results = adjustment.results();
    let summary = &results.summary;
    info!("Status: {} ({})", status, summary.calculation_status);
    info!(
        "Iterations: {}/{} in {:.2} ms",
        summary.iterations,
        summary.max_iterations,
        elapsed.as_secs_f64() * 1000.0
    );
    info!("Weighting: {}", summary.weighting_method);
    info!(
        "Redundancy: {} ({} observations, {} pseudo-observations, {} unknowns)",
        summary.degrees_of_freedom,
        summary.n_observations,
        summary.n_pseudo_observations,
        summary.n_unknowns
    );
    info!("σ0 = {:.4}", summary.residual_sigma);
    if !summary.inner_constraints.is_empty() {
        info!("Datum: {}", summary.inner_constraints.join(", "));
    }
    for (k, variance) in results.residual_variances.iter().enumerate() {
        info!("  iteration {:>2}: σ0² = {:.6}", k + 1, variance);
    }

    for point in &results.points {
        let (Some(x), Some(y)) = (point.adjusted[0], point.adjusted[1]) else {
            continue;
        };
        match results.ellipse(&point.id) {
            Some(ellipse) => info!(
                "{:<4} x = {:>10.4}  y = {:>10.4}  a = {:.4}  b = {:.4}",
                point.id, x, y, ellipse.semi_major, ellipse.semi_minor
            ),
            None => info!("{:<4} x = {:>10.4}  y = {:>10.4}  (fixed)", point.id, x, y),
        }
    }

    let suspects: Vec<_> = results
        .observations
        .iter()
        .filter(|o| o.weight_coefficient < 1.0)
        .collect();
    for observation in &suspects {
        warn!(
            "{}: v = {:.4}, w = {:.3}",
            observation.label, observation.normalized_residual, observation.weight_coefficient
        );
    }
    for warning in &results.warnings {
        warn!("{}", warning);
    }
    Ok(())
}
