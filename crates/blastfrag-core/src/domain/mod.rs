pub mod errors;

pub use errors::{CalcError, CalcErrorCategory, CalcResult, Severity};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

/// Named entries of one calculation run, declared in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResultKey {
    #[serde(rename = "RDI")]
    Rdi,
    #[serde(rename = "HF")]
    Hf,
    #[serde(rename = "A")]
    RockFactor,
    #[serde(rename = "s_ANFO")]
    SAnfo,
    #[serde(rename = "q")]
    SpecificCharge,
    #[serde(rename = "x_max")]
    XMax,
    #[serde(rename = "n")]
    Uniformity,
    #[serde(rename = "g_n")]
    GN,
    #[serde(rename = "x_50")]
    X50,
    #[serde(rename = "b")]
    CurveShape,
}

impl ResultKey {
    pub const ALL: [ResultKey; 10] = [
        Self::Rdi,
        Self::Hf,
        Self::RockFactor,
        Self::SAnfo,
        Self::SpecificCharge,
        Self::XMax,
        Self::Uniformity,
        Self::GN,
        Self::X50,
        Self::CurveShape,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Rdi => "RDI",
            Self::Hf => "HF",
            Self::RockFactor => "A",
            Self::SAnfo => "s_ANFO",
            Self::SpecificCharge => "q",
            Self::XMax => "x_max",
            Self::Uniformity => "n",
            Self::GN => "g_n",
            Self::X50 => "x_50",
            Self::CurveShape => "b",
        }
    }

    pub const fn display_name(self) -> &'static str {
        match self {
            Self::X50 => "Median fragment size",
            Self::XMax => "Maximum fragment size",
            Self::CurveShape => "Curve shape index",
            Self::Uniformity => "Uniformity index",
            Self::GN => "Factor g(n)",
            Self::Rdi => "Rock density influence",
            Self::Hf => "Hardness factor",
            Self::RockFactor => "Rock blastability factor",
            Self::SAnfo => "Relative explosive energy",
            Self::SpecificCharge => "Specific charge",
        }
    }

    pub const fn unit(self) -> &'static str {
        match self {
            Self::X50 | Self::XMax => "mm",
            Self::SAnfo => "%",
            Self::SpecificCharge => "kg/m³",
            _ => "-",
        }
    }

    /// Position in the user-facing report, 1-based.
    pub const fn display_rank(self) -> u8 {
        match self {
            Self::X50 => 1,
            Self::XMax => 2,
            Self::CurveShape => 3,
            Self::Uniformity => 4,
            Self::GN => 5,
            Self::Rdi => 6,
            Self::Hf => 7,
            Self::RockFactor => 8,
            Self::SAnfo => 9,
            Self::SpecificCharge => 10,
        }
    }

    pub fn parse(token: &str) -> Option<Self> {
        let trimmed = token.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|key| key.as_str().eq_ignore_ascii_case(trimmed))
    }
}

impl Display for ResultKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}

/// Which x_50 formula drives the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum X50Mode {
    /// g(n)-weighted Kuznetsov formula with n/x_50 resolved by fixed-point iteration.
    #[default]
    Iterative,
    /// Kuznetsov formula without g(n), exponent 0.633, evaluated once.
    Direct,
}

impl X50Mode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Iterative => "iterative",
            Self::Direct => "direct",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct CalculationResults {
    values: BTreeMap<ResultKey, f64>,
}

impl CalculationResults {
    pub fn get(&self, key: ResultKey) -> Option<f64> {
        self.values.get(&key).copied()
    }

    pub fn contains(&self, key: ResultKey) -> bool {
        self.values.contains_key(&key)
    }

    pub fn insert(&mut self, key: ResultKey, value: f64) {
        self.values.insert(key, value);
    }

    pub fn remove(&mut self, key: ResultKey) -> Option<f64> {
        self.values.remove(&key)
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn is_complete(&self) -> bool {
        ResultKey::ALL.iter().all(|key| self.values.contains_key(key))
    }

    pub fn missing(&self) -> Vec<ResultKey> {
        ResultKey::ALL
            .iter()
            .copied()
            .filter(|key| !self.values.contains_key(key))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ResultKey, f64)> + '_ {
        self.values.iter().map(|(key, value)| (*key, *value))
    }

    /// Reads a prior result that the current step depends on.
    pub fn require(&self, key: ResultKey) -> CalcResult<f64> {
        self.get(key).ok_or_else(|| {
            CalcError::missing_input(
                "CALC.MISSING_DEPENDENCY",
                format!("dependency '{}' has not been calculated", key),
            )
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PsdPoint {
    pub fragment_size_mm: f64,
    pub passing_percent: f64,
}

impl PsdPoint {
    pub const fn new(fragment_size_mm: f64, passing_percent: f64) -> Self {
        Self {
            fragment_size_mm,
            passing_percent,
        }
    }
}

/// Cumulative passing curve, always ascending by fragment size with one point
/// per size.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct PsdCurve {
    points: Vec<PsdPoint>,
}

impl PsdCurve {
    /// Sorts the points; when a size repeats, the last point given wins.
    pub fn new(mut points: Vec<PsdPoint>) -> Self {
        points.sort_by(|a, b| a.fragment_size_mm.total_cmp(&b.fragment_size_mm));
        let mut unique: Vec<PsdPoint> = Vec::with_capacity(points.len());
        for point in points {
            match unique.last_mut() {
                Some(last) if last.fragment_size_mm == point.fragment_size_mm => *last = point,
                _ => unique.push(point),
            }
        }
        Self { points: unique }
    }

    pub fn points(&self) -> &[PsdPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn sizes(&self) -> impl Iterator<Item = f64> + '_ {
        self.points.iter().map(|point| point.fragment_size_mm)
    }

    pub fn passing_at(&self, fragment_size_mm: f64) -> Option<f64> {
        self.points
            .iter()
            .find(|point| point.fragment_size_mm == fragment_size_mm)
            .map(|point| point.passing_percent)
    }
}

#[cfg(test)]
mod tests {
    use super::{CalculationResults, PsdCurve, PsdPoint, ResultKey};
    use crate::domain::CalcErrorCategory;

    #[test]
    fn display_rank_orders_report_keys() {
        let mut keys = ResultKey::ALL.to_vec();
        keys.sort_by_key(|key| key.display_rank());
        let names: Vec<&str> = keys.iter().map(|key| key.as_str()).collect();
        assert_eq!(
            names,
            ["x_50", "x_max", "b", "n", "g_n", "RDI", "HF", "A", "s_ANFO", "q"]
        );
    }

    #[test]
    fn result_keys_parse_case_insensitively() {
        assert_eq!(ResultKey::parse("s_anfo"), Some(ResultKey::SAnfo));
        assert_eq!(ResultKey::parse(" X_50 "), Some(ResultKey::X50));
        assert_eq!(ResultKey::parse("xyz"), None);
    }

    #[test]
    fn require_reports_missing_dependency() {
        let mut results = CalculationResults::default();
        let error = results
            .require(ResultKey::Rdi)
            .expect_err("empty set has no RDI");
        assert_eq!(error.category(), CalcErrorCategory::MissingInput);

        results.insert(ResultKey::Rdi, 17.5);
        assert_eq!(results.require(ResultKey::Rdi), Ok(17.5));
        assert_eq!(results.missing().len(), 9);
        assert!(!results.is_complete());
    }

    #[test]
    fn curve_is_sorted_ascending_on_construction() {
        let curve = PsdCurve::new(vec![
            PsdPoint::new(300.0, 50.0),
            PsdPoint::new(10.0, 1.0),
            PsdPoint::new(100.0, 20.0),
        ]);
        let sizes: Vec<f64> = curve.sizes().collect();
        assert_eq!(sizes, [10.0, 100.0, 300.0]);
        assert_eq!(curve.passing_at(100.0), Some(20.0));
        assert_eq!(curve.passing_at(101.0), None);
    }

    #[test]
    fn repeated_sizes_keep_the_last_point() {
        let curve = PsdCurve::new(vec![
            PsdPoint::new(10.0, 5.0),
            PsdPoint::new(20.0, 12.0),
            PsdPoint::new(10.0, 7.0),
        ]);
        assert_eq!(curve.len(), 2);
        assert_eq!(curve.passing_at(10.0), Some(7.0));
        assert_eq!(curve.passing_at(20.0), Some(12.0));
    }

    #[test]
    fn results_serialize_with_canonical_names() {
        let mut results = CalculationResults::default();
        results.insert(ResultKey::SAnfo, 90.0);
        results.insert(ResultKey::X50, 120.5);
        let json = serde_json::to_value(&results).expect("results should serialize");
        assert_eq!(json["values"]["s_ANFO"], 90.0);
        assert_eq!(json["values"]["x_50"], 120.5);
    }
}
