//! Special functions and guarded arithmetic shared by the fragmentation steps.

use std::f64::consts::PI;

const LANCZOS_G: f64 = 7.0;

#[allow(clippy::excessive_precision)]
const LANCZOS_COEFFICIENTS: [f64; 9] = [
    0.99999999999980993,
    676.5203681218851,
    -1259.1392167224028,
    771.32342877765313,
    -176.61502916214059,
    12.507343278686905,
    -0.13857109526572012,
    9.9843695780195716e-6,
    1.5056327351493116e-7,
];

/// Natural log of Γ(x) via the Lanczos approximation (g = 7, 9 terms).
pub fn ln_gamma(x: f64) -> f64 {
    if x < 0.5 {
        return (PI / (PI * x).sin()).ln() - ln_gamma(1.0 - x);
    }

    let x = x - 1.0;
    let mut sum = LANCZOS_COEFFICIENTS[0];
    for (index, coefficient) in LANCZOS_COEFFICIENTS[1..].iter().enumerate() {
        sum += coefficient / (x + index as f64 + 1.0);
    }

    let t = x + LANCZOS_G + 0.5;
    0.5 * (2.0 * PI).ln() + (x + 0.5) * t.ln() - t + sum.ln()
}

/// Γ(x) for positive arguments. Returns `None` outside the domain or on overflow.
pub fn gamma(x: f64) -> Option<f64> {
    if !x.is_finite() || x <= 0.0 {
        return None;
    }
    let value = ln_gamma(x).exp();
    value.is_finite().then_some(value)
}

/// `ln(numerator / denominator)` when the ratio is strictly positive and finite.
pub fn ln_ratio(numerator: f64, denominator: f64) -> Option<f64> {
    if denominator == 0.0 {
        return None;
    }
    let ratio = numerator / denominator;
    (ratio.is_finite() && ratio > 0.0).then(|| ratio.ln())
}

pub fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10_f64.powi(decimals);
    (value * scale).round() / scale
}

pub fn relative_change(previous: f64, next: f64) -> Option<f64> {
    if previous == 0.0 {
        return None;
    }
    finite((next - previous).abs() / previous.abs())
}
