//! Outer join of a reference and a calculated PSD curve on fragment size.

use crate::domain::{CalcError, CalcResult, PsdCurve};
use serde::Serialize;
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ReconciledRow {
    pub fragment_size_mm: f64,
    pub reference_passing: f64,
    pub calculated_passing: f64,
}

impl ReconciledRow {
    /// Calculated minus reference passing, percentage points.
    pub fn deviation(&self) -> f64 {
        self.calculated_passing - self.reference_passing
    }

    pub fn calculated_out_of_range(&self) -> bool {
        !(0.0..=100.0).contains(&self.calculated_passing)
    }
}

/// Rows ascending by fragment size; absent cells hold `0.0`.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ReconciledTable {
    rows: Vec<ReconciledRow>,
}

impl ReconciledTable {
    pub fn rows(&self) -> &[ReconciledRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Largest-size-first view used for display.
    pub fn rows_descending(&self) -> impl Iterator<Item = &ReconciledRow> {
        self.rows.iter().rev()
    }

    pub fn max_abs_deviation(&self) -> Option<f64> {
        self.rows
            .iter()
            .map(|row| row.deviation().abs())
            .max_by(f64::total_cmp)
    }

    pub fn out_of_range_rows(&self) -> impl Iterator<Item = &ReconciledRow> {
        self.rows.iter().filter(|row| row.calculated_out_of_range())
    }
}

pub fn reconcile(reference: &PsdCurve, calculated: &PsdCurve) -> CalcResult<ReconciledTable> {
    if reference.is_empty() || calculated.is_empty() {
        return Err(CalcError::empty_result(
            "RECONCILE.EMPTY_CURVE",
            format!(
                "cannot reconcile an empty curve (reference {} points, calculated {} points)",
                reference.len(),
                calculated.len()
            ),
        ));
    }

    let left = reference.points();
    let right = calculated.points();
    let mut rows = Vec::with_capacity(left.len().max(right.len()));
    let (mut i, mut j) = (0, 0);
    while i < left.len() || j < right.len() {
        let order = match (left.get(i), right.get(j)) {
            (Some(a), Some(b)) => a.fragment_size_mm.total_cmp(&b.fragment_size_mm),
            (Some(_), None) => Ordering::Less,
            (None, _) => Ordering::Greater,
        };
        let row = match order {
            Ordering::Less => {
                let point = left[i];
                i += 1;
                ReconciledRow {
                    fragment_size_mm: point.fragment_size_mm,
                    reference_passing: point.passing_percent,
                    calculated_passing: 0.0,
                }
            }
            Ordering::Greater => {
                let point = right[j];
                j += 1;
                ReconciledRow {
                    fragment_size_mm: point.fragment_size_mm,
                    reference_passing: 0.0,
                    calculated_passing: point.passing_percent,
                }
            }
            Ordering::Equal => {
                let (a, b) = (left[i], right[j]);
                i += 1;
                j += 1;
                ReconciledRow {
                    fragment_size_mm: a.fragment_size_mm,
                    reference_passing: a.passing_percent,
                    calculated_passing: b.passing_percent,
                }
            }
        };
        rows.push(row);
    }
    Ok(ReconciledTable { rows })
}

#[cfg(test)]
mod tests {
    use super::reconcile;
    use crate::domain::{CalcErrorCategory, PsdCurve, PsdPoint};

    fn curve(points: &[(f64, f64)]) -> PsdCurve {
        PsdCurve::new(
            points
                .iter()
                .map(|(size, passing)| PsdPoint::new(*size, *passing))
                .collect(),
        )
    }

    #[test]
    fn disjoint_curves_fill_missing_cells_with_zero() {
        let reference = curve(&[(10.0, 20.0), (30.0, 60.0)]);
        let calculated = curve(&[(20.0, 35.0), (40.0, 90.0), (50.0, 100.0)]);
        let table = reconcile(&reference, &calculated).expect("both curves populated");

        assert_eq!(table.len(), 5);
        let sizes: Vec<f64> = table
            .rows()
            .iter()
            .map(|row| row.fragment_size_mm)
            .collect();
        assert_eq!(sizes, vec![10.0, 20.0, 30.0, 40.0, 50.0]);
        assert_eq!(table.rows()[0].calculated_passing, 0.0);
        assert_eq!(table.rows()[1].reference_passing, 0.0);
        assert!(table.rows().iter().all(|row| {
            row.reference_passing.is_finite() && row.calculated_passing.is_finite()
        }));
    }

    #[test]
    fn shared_sizes_merge_into_one_row() {
        let reference = curve(&[(10.0, 20.0), (100.0, 100.0)]);
        let calculated = curve(&[(10.0, 25.0), (100.0, 97.0)]);
        let table = reconcile(&reference, &calculated).expect("both curves populated");

        assert_eq!(table.len(), 2);
        assert_eq!(table.rows()[0].deviation(), 5.0);
        assert_eq!(table.max_abs_deviation(), Some(5.0));
        let descending: Vec<f64> = table
            .rows_descending()
            .map(|row| row.fragment_size_mm)
            .collect();
        assert_eq!(descending, vec![100.0, 10.0]);
    }

    #[test]
    fn repeated_sizes_produce_a_single_row() {
        let reference = curve(&[(10.0, 20.0), (10.0, 22.0)]);
        let calculated = curve(&[(10.0, 25.0)]);
        let table = reconcile(&reference, &calculated).expect("both curves populated");

        assert_eq!(table.len(), 1);
        assert_eq!(table.rows()[0].reference_passing, 22.0);
        assert_eq!(table.rows()[0].deviation(), 3.0);
    }

    #[test]
    fn out_of_range_calculated_values_are_flagged() {
        let reference = curve(&[(10.0, 20.0)]);
        let calculated = curve(&[(10.0, 101.0)]);
        let table = reconcile(&reference, &calculated).expect("both curves populated");
        assert_eq!(table.out_of_range_rows().count(), 1);
    }

    #[test]
    fn empty_input_is_empty_result() {
        let error = reconcile(&PsdCurve::default(), &curve(&[(1.0, 5.0)]))
            .expect_err("reference empty");
        assert_eq!(error.category(), CalcErrorCategory::EmptyResult);
    }
}
