//! Ordered results table and the JSON run document.

use crate::domain::{CalculationResults, PsdCurve, ResultKey, X50Mode};
use crate::engine::{ConvergenceReport, RunSummary};
use crate::numerics::round_to;
use crate::reconcile::ReconciledTable;
use crate::serialization::format_fixed_f64;
use serde::Serialize;

pub const REPORT_DECIMALS: i32 = 4;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRow {
    pub key: ResultKey,
    pub name: &'static str,
    pub value: Option<f64>,
    pub unit: &'static str,
}

/// All ten results ordered by display rank; absent entries have no value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultsReport {
    rows: Vec<ReportRow>,
}

impl ResultsReport {
    pub fn from_results(results: &CalculationResults) -> Self {
        let mut keys = ResultKey::ALL;
        keys.sort_by_key(|key| key.display_rank());
        let rows = keys
            .iter()
            .map(|key| ReportRow {
                key: *key,
                name: key.display_name(),
                value: results.get(*key).map(|value| round_to(value, REPORT_DECIMALS)),
                unit: key.unit(),
            })
            .collect();
        Self { rows }
    }

    pub fn rows(&self) -> &[ReportRow] {
        &self.rows
    }

    pub fn present(&self) -> impl Iterator<Item = &ReportRow> {
        self.rows.iter().filter(|row| row.value.is_some())
    }

    pub fn missing(&self) -> impl Iterator<Item = ResultKey> + '_ {
        self.rows
            .iter()
            .filter(|row| row.value.is_none())
            .map(|row| row.key)
    }

    pub fn render_text(&self) -> String {
        let name_width = self
            .rows
            .iter()
            .map(|row| row.name.chars().count())
            .max()
            .unwrap_or(0);
        let mut out = String::new();
        for row in &self.rows {
            let value = match row.value {
                Some(value) => format_fixed_f64(value, 14, REPORT_DECIMALS as usize),
                None => format!("{:>14}", "n/a"),
            };
            out.push_str(&format!(
                "{:<name_width$}  {:<6}{}  {}\n",
                row.name,
                row.key.as_str(),
                value,
                row.unit,
                name_width = name_width
            ));
        }
        out
    }
}

/// Everything one `run` produced, as written by `--report`.
#[derive(Debug, Serialize)]
pub struct RunDocument<'a> {
    pub mode: X50Mode,
    pub complete: bool,
    pub results: ResultsReport,
    pub convergence: Option<&'a ConvergenceReport>,
    pub warnings: &'a [String],
    pub failures: Vec<FailureEntry>,
    pub reference_curve: Option<&'a PsdCurve>,
    pub calculated_curve: Option<&'a PsdCurve>,
    pub reconciled: Option<&'a ReconciledTable>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailureEntry {
    pub key: ResultKey,
    pub category: &'static str,
    pub placeholder: &'static str,
    pub message: String,
}

impl<'a> RunDocument<'a> {
    pub fn new(summary: &'a RunSummary) -> Self {
        Self {
            mode: summary.mode,
            complete: summary.is_complete(),
            results: summary.report(),
            convergence: summary.convergence.as_ref(),
            warnings: &summary.warnings,
            failures: summary
                .failures()
                .map(|(key, error)| FailureEntry {
                    key,
                    category: error.category().as_str(),
                    placeholder: error.placeholder(),
                    message: error.message().to_string(),
                })
                .collect(),
            reference_curve: None,
            calculated_curve: None,
            reconciled: None,
        }
    }

    pub fn with_curves(
        mut self,
        reference: Option<&'a PsdCurve>,
        calculated: Option<&'a PsdCurve>,
        reconciled: Option<&'a ReconciledTable>,
    ) -> Self {
        self.reference_curve = reference;
        self.calculated_curve = calculated;
        self.reconciled = reconciled;
        self
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::ResultsReport;
    use crate::domain::{CalculationResults, ResultKey};

    #[test]
    fn rows_follow_display_rank_and_round() {
        let mut results = CalculationResults::default();
        results.insert(ResultKey::X50, 14.812_345_6);
        results.insert(ResultKey::SpecificCharge, 1.0);

        let report = ResultsReport::from_results(&results);
        assert_eq!(report.rows().len(), 10);
        assert_eq!(report.rows()[0].key, ResultKey::X50);
        assert_eq!(report.rows()[0].value, Some(14.8123));
        assert_eq!(report.rows()[9].key, ResultKey::SpecificCharge);
        assert_eq!(report.present().count(), 2);
        assert_eq!(report.missing().count(), 8);
    }

    #[test]
    fn text_rendering_marks_missing_values() {
        let mut results = CalculationResults::default();
        results.insert(ResultKey::XMax, 1500.0);
        let text = ResultsReport::from_results(&results).render_text();

        assert_eq!(text.lines().count(), 10);
        let x_max_line = text
            .lines()
            .find(|line| line.contains("x_max"))
            .expect("x_max row rendered");
        assert!(x_max_line.contains("1500.0000"));
        assert!(x_max_line.ends_with("mm"));
        assert!(text.lines().next().expect("first row").contains("n/a"));
    }
}
