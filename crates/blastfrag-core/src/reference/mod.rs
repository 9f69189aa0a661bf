//! Rosin-Rammler-type cumulative passing curves on a configurable size axis.

use crate::domain::{CalcError, CalcResult, CalculationResults, PsdCurve, PsdPoint, ResultKey};
use crate::numerics::ln_ratio;
use crate::params::{ParameterSource, names};
use serde::{Deserialize, Serialize};

pub const DEFAULT_LOG_POINTS: usize = 50;
pub const DEFAULT_LINEAR_STEP: f64 = 1.0;
pub const MAX_AXIS_POINTS: usize = 100_000;

/// Engineering sieve openings, mm.
pub const STANDARD_SIEVE_SIZES: [f64; 31] = [
    0.075, 0.15, 0.3, 0.6, 1.18, 2.36, 4.75, 9.5, 12.5, 19.0, 25.0, 37.5, 50.0, 75.0, 100.0,
    150.0, 200.0, 250.0, 300.0, 400.0, 500.0, 600.0, 700.0, 800.0, 900.0, 1000.0, 1200.0,
    1500.0, 2000.0, 2500.0, 3000.0,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AxisKind {
    Sieve,
    #[default]
    Logarithmic,
    Linear,
}

impl AxisKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sieve => "sieve",
            Self::Logarithmic => "logarithmic",
            Self::Linear => "linear",
        }
    }

    pub fn parse(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "sieve" => Some(Self::Sieve),
            "log" | "logarithmic" => Some(Self::Logarithmic),
            "linear" => Some(Self::Linear),
            _ => None,
        }
    }
}

/// `axis` section of the project configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AxisConfig {
    pub kind: AxisKind,
    pub points: usize,
    pub step: f64,
}

impl Default for AxisConfig {
    fn default() -> Self {
        Self {
            kind: AxisKind::Logarithmic,
            points: DEFAULT_LOG_POINTS,
            step: DEFAULT_LINEAR_STEP,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AxisSpec {
    StandardSieve,
    Logarithmic { min: f64, points: usize },
    Linear { min: f64, step: f64 },
}

impl AxisSpec {
    /// Resolves a configured axis. An unusable linear step is replaced by
    /// [`DEFAULT_LINEAR_STEP`] and the substitution is returned as a notice.
    pub fn from_config(
        config: &AxisConfig,
        x_range_min: Option<f64>,
    ) -> CalcResult<(Self, Option<String>)> {
        let require_min = || {
            x_range_min.ok_or_else(|| {
                CalcError::missing_input(
                    "REFERENCE.MISSING_RANGE_MIN",
                    format!(
                        "parameter '{}' is required for a {} axis",
                        names::X_RANGE_MIN,
                        config.kind.as_str()
                    ),
                )
            })
        };
        match config.kind {
            AxisKind::Sieve => Ok((Self::StandardSieve, None)),
            AxisKind::Logarithmic => Ok((
                Self::Logarithmic {
                    min: require_min()?,
                    points: config.points,
                },
                None,
            )),
            AxisKind::Linear => {
                let min = require_min()?;
                if config.step.is_finite() && config.step > 0.0 {
                    let axis = Self::Linear {
                        min,
                        step: config.step,
                    };
                    return Ok((axis, None));
                }
                let notice = format!(
                    "linear axis step {} is not positive; using default step {}",
                    config.step, DEFAULT_LINEAR_STEP
                );
                Ok((
                    Self::Linear {
                        min,
                        step: DEFAULT_LINEAR_STEP,
                    },
                    Some(notice),
                ))
            }
        }
    }

    /// Ascending fragment sizes up to `x_max`.
    pub fn sizes(&self, x_max: f64) -> CalcResult<Vec<f64>> {
        if !x_max.is_finite() || x_max <= 0.0 {
            return Err(CalcError::domain(
                "REFERENCE.AXIS_X_MAX",
                format!("axis upper bound must be positive and finite (got {x_max})"),
            ));
        }
        match *self {
            Self::StandardSieve => {
                let limit = (x_max / 100.0).ceil() * 100.0;
                Ok(STANDARD_SIEVE_SIZES
                    .iter()
                    .copied()
                    .filter(|size| *size <= limit)
                    .collect())
            }
            Self::Logarithmic { min, points } => {
                check_axis_min(min, x_max)?;
                if !(2..=MAX_AXIS_POINTS).contains(&points) {
                    return Err(CalcError::domain(
                        "REFERENCE.AXIS_POINTS",
                        format!(
                            "logarithmic axis needs 2..={} points (got {})",
                            MAX_AXIS_POINTS, points
                        ),
                    ));
                }
                let (low, high) = (min.log10(), x_max.log10());
                let span = (high - low) / (points - 1) as f64;
                let mut sizes: Vec<f64> = (0..points)
                    .map(|index| 10_f64.powf(low + span * index as f64))
                    .collect();
                sizes[0] = min;
                sizes[points - 1] = x_max;
                Ok(sizes)
            }
            Self::Linear { min, step } => {
                check_axis_min(min, x_max)?;
                if !step.is_finite() || step <= 0.0 {
                    return Err(CalcError::domain(
                        "REFERENCE.AXIS_STEP",
                        format!("linear axis step must be positive and finite (got {step})"),
                    ));
                }
                let count = ((x_max - min) / step).floor() + 1.0;
                if count > MAX_AXIS_POINTS as f64 {
                    return Err(CalcError::domain(
                        "REFERENCE.AXIS_POINTS",
                        format!(
                            "linear axis from {min} to {x_max} with step {step} \
                             exceeds {MAX_AXIS_POINTS} points"
                        ),
                    ));
                }
                Ok((0..count as usize)
                    .map(|index| min + step * index as f64)
                    .filter(|size| *size <= x_max)
                    .collect())
            }
        }
    }
}

fn check_axis_min(min: f64, x_max: f64) -> CalcResult<()> {
    if !min.is_finite() || min <= 0.0 || min >= x_max {
        return Err(CalcError::domain(
            "REFERENCE.AXIS_RANGE",
            format!("axis minimum must satisfy 0 < min < x_max (min={min}, x_max={x_max})"),
        ));
    }
    Ok(())
}

/// Cumulative passing (%) at `size`, or `None` when the point is skipped.
pub fn passing_percent(size: f64, x_max: f64, x_50: f64, b: f64) -> Option<f64> {
    if size.is_nan() || size <= 0.0 || size > x_max {
        return None;
    }
    let denominator = ln_ratio(x_max, x_50)?;
    if denominator == 0.0 {
        return None;
    }
    let ratio = ln_ratio(x_max, size)? / denominator;
    let value = 100.0 / (1.0 + ratio.powf(b));
    value.is_finite().then_some(value)
}

/// Evaluates the curve on an existing set of sizes.
pub fn curve_on_sizes(sizes: &[f64], x_max: f64, x_50: f64, b: f64) -> CalcResult<PsdCurve> {
    if !x_max.is_finite() || !x_50.is_finite() || x_50 <= 0.0 || x_50 >= x_max {
        return Err(CalcError::domain(
            "REFERENCE.X50_RANGE",
            format!("curve requires 0 < x_50 < x_max (x_50={x_50}, x_max={x_max})"),
        ));
    }
    if !b.is_finite() || b <= 0.0 {
        return Err(CalcError::domain(
            "REFERENCE.SHAPE",
            format!("curve shape index b must be positive and finite (got {b})"),
        ));
    }
    let points: Vec<PsdPoint> = sizes
        .iter()
        .filter_map(|size| {
            passing_percent(*size, x_max, x_50, b).map(|passing| PsdPoint::new(*size, passing))
        })
        .collect();
    if points.is_empty() {
        return Err(CalcError::empty_result(
            "REFERENCE.EMPTY_CURVE",
            format!("no axis size falls within (0, {x_max}]"),
        ));
    }
    Ok(PsdCurve::new(points))
}

/// Builds the axis for `x_max` and evaluates the curve on it.
pub fn generate(axis: &AxisSpec, x_max: f64, x_50: f64, b: f64) -> CalcResult<PsdCurve> {
    let sizes = axis.sizes(x_max)?;
    curve_on_sizes(&sizes, x_max, x_50, b)
}

/// Target curve parameters kept in the `reference` parameter category.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ReferenceParameters {
    pub target_x_max: f64,
    pub target_x_50: f64,
    pub target_b: f64,
    pub x_range_min: Option<f64>,
}

impl ReferenceParameters {
    pub fn from_source(parameters: &impl ParameterSource) -> CalcResult<Self> {
        Ok(Self {
            target_x_max: parameters.numeric(names::TARGET_X_MAX)?,
            target_x_50: parameters.numeric(names::TARGET_X_50)?,
            target_b: parameters.numeric(names::TARGET_B)?,
            x_range_min: match parameters.parameter(names::X_RANGE_MIN) {
                None => None,
                Some(_) => Some(parameters.numeric(names::X_RANGE_MIN)?),
            },
        })
    }
}

/// Reference and calculated curves sharing one size axis.
#[derive(Debug, Clone, PartialEq)]
pub struct CurvePair {
    pub sizes: Vec<f64>,
    pub reference: CalcResult<PsdCurve>,
    pub calculated: CalcResult<PsdCurve>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReferenceCurveGenerator {
    axis: AxisSpec,
}

impl ReferenceCurveGenerator {
    pub const fn new(axis: AxisSpec) -> Self {
        Self { axis }
    }

    pub const fn axis(&self) -> &AxisSpec {
        &self.axis
    }

    pub fn reference_curve(&self, reference: &ReferenceParameters) -> CalcResult<PsdCurve> {
        generate(
            &self.axis,
            reference.target_x_max,
            reference.target_x_50,
            reference.target_b,
        )
    }

    /// Builds the shared axis from the target x_max; the calculated curve
    /// uses the computed x_max, x_50 and b on that axis.
    pub fn curve_pair(
        &self,
        reference: &ReferenceParameters,
        results: &CalculationResults,
    ) -> CalcResult<CurvePair> {
        let sizes = self.axis.sizes(reference.target_x_max)?;
        let reference_curve = curve_on_sizes(
            &sizes,
            reference.target_x_max,
            reference.target_x_50,
            reference.target_b,
        );
        let calculated = results.require(ResultKey::XMax).and_then(|x_max| {
            curve_on_sizes(
                &sizes,
                x_max,
                results.require(ResultKey::X50)?,
                results.require(ResultKey::CurveShape)?,
            )
        });
        Ok(CurvePair {
            sizes,
            reference: reference_curve,
            calculated,
        })
    }
}
