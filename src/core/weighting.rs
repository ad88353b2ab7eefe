//! Robust weighting functions (M-estimators) for iteratively reweighted least squares.
//!
//! Every function maps a normalized residual `v` (residual divided by its
//! standard deviation) to a weight coefficient in `[0, 1]`. The coefficient
//! multiplies the a priori weight of the observation in the next iteration.
//!
//! # Conventions
//!
//! - Functions are even: only `|v|` matters.
//! - Small residuals keep full weight; large residuals are suppressed and the
//!   coefficient tends to 0 as `|v| → ∞`.
//! - Non-finite input yields exactly 0, never NaN. This is enforced by
//!   [`coefficient`], which every caller goes through.
//!
//! Tuning constants are passed as a slice in the order listed by the method
//! table in [`super::methods`]: usually `c` (scale) followed by `k` (shape).
//!
//! # Example
//!
//! ```
//! use surveynet::core::weighting::{coefficient, huber};
//!
//! assert_eq!(coefficient(huber, 1.0, &[1.345]), 1.0);
//! assert!(coefficient(huber, 5.0, &[1.345]) < 1.0);
//! assert_eq!(coefficient(huber, f64::NAN, &[1.345]), 0.0);
//! ```

use std::f64::consts::PI;

/// Signature shared by all weighting functions: `w(|v|, constants)`.
pub type WeightFn = fn(f64, &[f64]) -> f64;

/// Evaluate `func` at `v` with the coefficient conventions applied.
///
/// Non-finite `v` gives 0. The result is clamped to `[0, 1]`.
pub fn coefficient(func: WeightFn, v: f64, constants: &[f64]) -> f64 {
    if !v.is_finite() {
        return 0.0;
    }
    let w = func(v.abs(), constants);
    if w.is_finite() { w.clamp(0.0, 1.0) } else { 0.0 }
}

fn constant(constants: &[f64], idx: usize, default: f64) -> f64 {
    constants.get(idx).copied().unwrap_or(default)
}

/// Huber: full weight up to `c`, then `c/|v|`.
pub fn huber(v: f64, constants: &[f64]) -> f64 {
    let c = constant(constants, 0, 1.345);
    if v <= c { 1.0 } else { c / v }
}

/// Linear descent from 1 at `c` to 0 at `c(1 + a)`.
pub fn slope(v: f64, constants: &[f64]) -> f64 {
    let c = constant(constants, 0, 2.0);
    let a = constant(constants, 1, 2.0);
    if v <= c {
        1.0
    } else {
        (1.0 - (v - c) / (a * c)).max(0.0)
    }
}

/// Hampel three-part redescending function.
pub fn hampel(v: f64, constants: &[f64]) -> f64 {
    let a = constant(constants, 0, 1.7);
    let b = constant(constants, 1, 3.4);
    let c = constant(constants, 2, 8.5);
    if v <= a {
        1.0
    } else if v <= b {
        a / v
    } else if v <= c {
        a / v * (c - v) / (c - b)
    } else {
        0.0
    }
}

/// Danish method: exponential decay beyond `c`.
pub fn danish(v: f64, constants: &[f64]) -> f64 {
    let c = constant(constants, 0, 2.5);
    if v <= c {
        1.0
    } else {
        (1.0 - (v / c).powi(2)).exp()
    }
}

pub fn epanechnikov(v: f64, constants: &[f64]) -> f64 {
    let c = constant(constants, 0, 3.674);
    let k = constant(constants, 1, 2.0);
    if v < c { 1.0 - (v / c).powf(k) } else { 0.0 }
}

/// Tukey biweight (for `k = 2`).
pub fn tukey(v: f64, constants: &[f64]) -> f64 {
    let c = constant(constants, 0, 4.685);
    let k = constant(constants, 1, 2.0);
    if v < c {
        (1.0 - (v / c).powi(2)).powf(k)
    } else {
        0.0
    }
}

pub fn jacobi(v: f64, constants: &[f64]) -> f64 {
    let c = constant(constants, 0, 4.687);
    let k = constant(constants, 1, 1.0);
    if v < c { (1.0 - v / c).powf(k) } else { 0.0 }
}

pub fn exponential(v: f64, constants: &[f64]) -> f64 {
    let c = constant(constants, 0, 2.0);
    let k = constant(constants, 1, 2.0);
    (-(v / c).powf(k)).exp()
}

/// Choice rule of alternative: power decay `(c/|v|)^k` beyond `c`.
pub fn cra(v: f64, constants: &[f64]) -> f64 {
    let c = constant(constants, 0, 2.0);
    let k = constant(constants, 1, 2.0);
    if v <= c { 1.0 } else { (c / v).powf(k) }
}

pub fn error_func(v: f64, constants: &[f64]) -> f64 {
    let c = constant(constants, 0, 1.414);
    let k = constant(constants, 1, 2.0);
    erfc((v / c).powf(k))
}

pub fn cauchy(v: f64, constants: &[f64]) -> f64 {
    let c = constant(constants, 0, 2.385);
    let k = constant(constants, 1, 2.0);
    1.0 / (1.0 + (v / c).powf(k))
}

/// Student t weights with `k` degrees of freedom.
pub fn t(v: f64, constants: &[f64]) -> f64 {
    let c = constant(constants, 0, 1.0);
    let k = constant(constants, 1, 2.0);
    (1.0 + (v / c).powi(2) / k).powf(-(k + 1.0) / 2.0)
}

/// Gaussian bell curve.
pub fn bell(v: f64, constants: &[f64]) -> f64 {
    let c = constant(constants, 0, 1.0);
    let k = constant(constants, 1, 1.0);
    (-k * (v / c).powi(2) / 2.0).exp()
}

/// Catenary (hyperbolic secant).
pub fn chain(v: f64, constants: &[f64]) -> f64 {
    let c = constant(constants, 0, 1.0);
    1.0 / (v / c).cosh()
}

pub fn andrews(v: f64, constants: &[f64]) -> f64 {
    let c = constant(constants, 0, 4.207);
    if v >= c {
        return 0.0;
    }
    let u = PI * v / c;
    if u == 0.0 { 1.0 } else { u.sin() / u }
}

/// Raised cosine, one full wave over `[-c, c]`.
pub fn wave(v: f64, constants: &[f64]) -> f64 {
    let c = constant(constants, 0, 2.5);
    if v < c {
        (1.0 + (PI * v / c).cos()) / 2.0
    } else {
        0.0
    }
}

pub fn half_wave(v: f64, constants: &[f64]) -> f64 {
    let c = constant(constants, 0, 2.5);
    if v < c { (PI * v / (2.0 * c)).cos() } else { 0.0 }
}

/// Wigner semicircle.
pub fn wigner(v: f64, constants: &[f64]) -> f64 {
    let c = constant(constants, 0, 3.137);
    if v < c {
        (1.0 - (v / c).powi(2)).sqrt()
    } else {
        0.0
    }
}

/// Full weight up to `c`, then a quarter ellipse reaching 0 at `2c`.
pub fn ellipse_curve(v: f64, constants: &[f64]) -> f64 {
    let c = constant(constants, 0, 2.5);
    if v <= c {
        1.0
    } else if v < 2.0 * c {
        (1.0 - ((v - c) / c).powi(2)).sqrt()
    } else {
        0.0
    }
}

/// Hard rejection beyond `c`.
pub fn trim(v: f64, constants: &[f64]) -> f64 {
    let c = constant(constants, 0, 2.5);
    if v <= c { 1.0 } else { 0.0 }
}

/// Complementary error function.
///
/// Abramowitz & Stegun 7.1.26, absolute error below 1.5e-7.
pub fn erfc(x: f64) -> f64 {
    if x < 0.0 {
        return 2.0 - erfc(-x);
    }
    let t = 1.0 / (1.0 + 0.3275911 * x);
    let poly = t
        * (0.254829592
            + t * (-0.284496736 + t * (1.421413741 + t * (-1.453152027 + t * 1.061405429))));
    poly * (-x * x).exp()
}

/// Median of the values; NaN for an empty slice.
fn median(values: &mut [f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

/// Consistent robust scale estimate `1.4826 · MAD` of the finite values.
///
/// Returns `None` when fewer than one finite value exists or the scale is zero.
pub fn robust_scale(values: &[f64]) -> Option<f64> {
    let mut finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return None;
    }
    let center = median(&mut finite);
    let mut deviations: Vec<f64> = finite.iter().map(|v| (v - center).abs()).collect();
    let scale = 1.4826 * median(&mut deviations);
    (scale.is_finite() && scale > 0.0).then_some(scale)
}
