//! Shared utilities for network integration tests
//!
//! Synthetic networks are generated from known true coordinates, so the
//! observations are exact and any noise or blunder is added explicitly.

#![allow(dead_code)]

use std::f64::consts::PI;
use surveynet::basic::{azimuth, normalize_angle};
use surveynet::data::{ControlPoint, DatasetBuilder, ObservationKind};
use surveynet::Dataset;

/// True position of a network point.
#[derive(Debug, Clone, Copy)]
pub struct TruePoint {
    pub id: &'static str,
    pub xyz: [f64; 3],
}

pub const fn point(id: &'static str, x: f64, y: f64, z: f64) -> TruePoint {
    TruePoint { id, xyz: [x, y, z] }
}

/// Exact value of an observation between two true points.
///
/// # Arguments
/// * `kind` - Observation kind
/// * `from` - Station position
/// * `to` - Target position
/// * `orientation` - Station orientation (used by `hz` only)
pub fn observe_exact(kind: ObservationKind, from: [f64; 3], to: [f64; 3], orientation: f64) -> f64 {
    let dx = to[0] - from[0];
    let dy = to[1] - from[1];
    let dz = to[2] - from[2];
    let horizontal = dx.hypot(dy);
    match kind {
        ObservationKind::Dx => dx,
        ObservationKind::Dy => dy,
        ObservationKind::Dz | ObservationKind::Vd => dz,
        ObservationKind::Hd => horizontal,
        ObservationKind::Sd => horizontal.hypot(dz),
        ObservationKind::A => azimuth(from[0], from[1], to[0], to[1]),
        ObservationKind::Hz => normalize_angle(azimuth(from[0], from[1], to[0], to[1]) - orientation),
        ObservationKind::Vz => horizontal.atan2(dz),
    }
}

/// Deterministic pseudo-noise in `[-amplitude, amplitude]`.
pub fn pseudo_noise(amplitude: f64, index: usize) -> f64 {
    let u = ((index * 7919 + 104_729) % 1000) as f64 / 999.0;
    amplitude * (2.0 * u - 1.0)
}

/// Three fixed points and one estimated point `P` observed by horizontal distances.
///
/// `P` is truly at (40, 30) and starts at `approximation`.
pub fn resection_network(approximation: (f64, f64), noise: f64) -> Dataset {
    let fixed = [("A", 0.0, 0.0), ("B", 100.0, 0.0), ("C", 50.0, 100.0)];
    let truth = [40.0, 30.0, 0.0];
    let mut builder = DatasetBuilder::new();
    for (id, x, y) in fixed {
        builder = builder
            .control(ControlPoint::planar(id, x, y).fixed())
            .station(format!("S{id}"), id);
    }
    builder = builder.control(ControlPoint::planar("P", approximation.0, approximation.1));
    for (k, (id, x, y)) in fixed.into_iter().enumerate() {
        let value = observe_exact(ObservationKind::Hd, [x, y, 0.0], truth, 0.0);
        builder = builder.observe(
            format!("S{id}"),
            "P",
            ObservationKind::Hd,
            value + pseudo_noise(noise, k),
            Some(0.01),
        );
    }
    builder.build().unwrap()
}

/// Eight fixed points on a circle of radius 60 around the estimated point `P`
/// at (50, 50), each observing a horizontal distance to `P`.
///
/// `blunder` is added to the distance observed from `F0`.
pub fn circle_network(blunder: f64) -> Dataset {
    let center = [50.0, 50.0, 0.0];
    let mut builder = DatasetBuilder::new().control(ControlPoint::planar("P", 50.3, 49.8));
    for k in 0..8 {
        let angle = k as f64 * PI / 4.0;
        let id = format!("F{k}");
        builder = builder
            .control(
                ControlPoint::planar(id.as_str(), 50.0 + 60.0 * angle.cos(), 50.0 + 60.0 * angle.sin())
                    .fixed(),
            )
            .station(format!("S{id}"), id.as_str());
    }
    for k in 0..8 {
        let angle = k as f64 * PI / 4.0;
        let from = [50.0 + 60.0 * angle.cos(), 50.0 + 60.0 * angle.sin(), 0.0];
        let mut value = observe_exact(ObservationKind::Hd, from, center, 0.0);
        if k == 0 {
            value += blunder;
        }
        builder = builder.observe(format!("SF{k}"), "P", ObservationKind::Hd, value, Some(0.01));
    }
    builder.build().unwrap()
}

/// Planar network with two estimated points and an oriented station.
///
/// Observations are exact; approximations are offset by a few decimeters.
pub fn planar_traverse() -> (Dataset, Vec<TruePoint>) {
    let fixed = [point("A", 0.0, 0.0, 0.0), point("B", 200.0, 10.0, 0.0)];
    let unknown = [point("P1", 70.0, 60.0, 0.0), point("P2", 140.0, 75.0, 0.0)];
    let orientation = 0.3;

    let mut builder = DatasetBuilder::new();
    for p in fixed {
        builder = builder.control(ControlPoint::planar(p.id, p.xyz[0], p.xyz[1]).fixed());
    }
    for (k, p) in unknown.iter().enumerate() {
        let offset = if k == 0 { (0.4, -0.3) } else { (-0.25, 0.35) };
        builder = builder.control(ControlPoint::planar(
            p.id,
            p.xyz[0] + offset.0,
            p.xyz[1] + offset.1,
        ));
    }
    builder = builder
        .oriented_station("SA", "A", orientation + 0.01)
        .station("SB", "B")
        .station("SP1", "P1");

    let at = |id: &str| {
        fixed
            .iter()
            .chain(unknown.iter())
            .find(|p| p.id == id)
            .map(|p| p.xyz)
            .unwrap()
    };
    let plan = [
        ("SA", "A", "P1", ObservationKind::Hd, 0.005),
        ("SA", "A", "P1", ObservationKind::Hz, 1e-4),
        ("SA", "A", "P2", ObservationKind::Hz, 1e-4),
        ("SA", "A", "B", ObservationKind::Hz, 1e-4),
        ("SB", "B", "P2", ObservationKind::Hd, 0.005),
        ("SB", "B", "P1", ObservationKind::Hd, 0.005),
        ("SB", "B", "P2", ObservationKind::A, 1e-4),
        ("SP1", "P1", "P2", ObservationKind::Hd, 0.005),
        ("SP1", "P1", "P2", ObservationKind::A, 1e-4),
    ];
    for (station, from, to, kind, sigma) in plan {
        let value = observe_exact(kind, at(from), at(to), orientation);
        builder = builder.observe(station, to, kind, value, Some(sigma));
    }
    let truth = fixed.into_iter().chain(unknown).collect();
    (builder.build().unwrap(), truth)
}

/// Spatial network: four fixed points and one estimated point `P` observed by
/// slope distances, zenith angles, azimuths and height differences.
pub fn spatial_network() -> (Dataset, TruePoint) {
    let fixed = [
        point("A", 0.0, 0.0, 100.0),
        point("B", 100.0, 0.0, 102.0),
        point("C", 50.0, 100.0, 98.0),
        point("D", 0.0, 100.0, 101.0),
    ];
    let truth = point("P", 40.0, 30.0, 105.0);
    let mut builder = DatasetBuilder::new()
        .control(ControlPoint::spatial("P", 40.3, 29.7, 104.6));
    for p in fixed {
        builder = builder
            .control(ControlPoint::spatial(p.id, p.xyz[0], p.xyz[1], p.xyz[2]).fixed())
            .station(format!("S{}", p.id), p.id);
    }
    for p in fixed {
        let station = format!("S{}", p.id);
        for (kind, sigma) in [
            (ObservationKind::Sd, 0.005),
            (ObservationKind::Vz, 1e-4),
            (ObservationKind::A, 1e-4),
            (ObservationKind::Dz, 0.002),
        ] {
            let value = observe_exact(kind, p.xyz, truth.xyz, 0.0);
            builder = builder.observe(station.as_str(), "P", kind, value, Some(sigma));
        }
    }
    (builder.build().unwrap(), truth)
}

/// Four points without any fixed coordinate, linked by coordinate differences.
///
/// The network has a translation datum defect of two.
pub fn free_network() -> (Dataset, Vec<TruePoint>) {
    let truth = [
        point("A", 0.0, 0.0, 0.0),
        point("B", 100.0, 0.0, 0.0),
        point("C", 100.0, 80.0, 0.0),
        point("D", 0.0, 80.0, 0.0),
    ];
    let mut builder = DatasetBuilder::new();
    for (k, p) in truth.iter().enumerate() {
        builder = builder
            .control(ControlPoint::planar(
                p.id,
                p.xyz[0] + pseudo_noise(0.05, 2 * k),
                p.xyz[1] + pseudo_noise(0.05, 2 * k + 1),
            ))
            .station(format!("S{}", p.id), p.id);
    }
    let pairs = [(0, 1), (1, 2), (2, 3), (3, 0), (0, 2)];
    for (k, (i, j)) in pairs.into_iter().enumerate() {
        let (from, to) = (truth[i], truth[j]);
        for (m, kind) in [ObservationKind::Dx, ObservationKind::Dy].into_iter().enumerate() {
            let value = observe_exact(kind, from.xyz, to.xyz, 0.0) + pseudo_noise(0.003, 2 * k + m);
            builder = builder.observe(format!("S{}", from.id), to.id, kind, value, Some(0.005));
        }
    }
    (builder.build().unwrap(), truth.to_vec())
}
