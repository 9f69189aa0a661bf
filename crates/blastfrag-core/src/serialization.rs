use crate::domain::PsdCurve;
use crate::reconcile::ReconciledTable;
use std::fs;
use std::path::Path;

pub fn format_fixed_f64(value: f64, width: usize, precision: usize) -> String {
    format!(
        "{value:>width$.precision$}",
        width = width,
        precision = precision
    )
}

pub fn normalize_text_artifact(content: &str) -> String {
    let mut normalized = content.replace("\r\n", "\n").replace('\r', "\n");
    if !normalized.is_empty() && !normalized.ends_with('\n') {
        normalized.push('\n');
    }
    normalized
}

/// Writes with canonical line endings, creating parent directories.
pub fn write_text_artifact(path: &Path, content: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, normalize_text_artifact(content))
}

pub fn curve_csv(curve: &PsdCurve) -> String {
    let mut out = String::from("fragment_size_mm,passing_percent\n");
    for point in curve.points() {
        out.push_str(&format!(
            "{:.4},{:.4}\n",
            point.fragment_size_mm, point.passing_percent
        ));
    }
    out
}

pub fn reconciled_csv(table: &ReconciledTable) -> String {
    let mut out = String::from("fragment_size_mm,reference_passing,calculated_passing,deviation\n");
    for row in table.rows() {
        out.push_str(&format!(
            "{:.4},{:.4},{:.4},{:.4}\n",
            row.fragment_size_mm,
            row.reference_passing,
            row.calculated_passing,
            row.deviation()
        ));
    }
    out
}

/// Fixed-width table, largest fragment size first.
pub fn render_reconciled_table(table: &ReconciledTable) -> String {
    let mut out = format!(
        "{:>14}{:>14}{:>14}{:>14}\n",
        "size [mm]", "reference %", "calculated %", "deviation"
    );
    for row in table.rows_descending() {
        out.push_str(&format_fixed_f64(row.fragment_size_mm, 14, 3));
        out.push_str(&format_fixed_f64(row.reference_passing, 14, 4));
        out.push_str(&format_fixed_f64(row.calculated_passing, 14, 4));
        out.push_str(&format_fixed_f64(row.deviation(), 14, 4));
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::{
        curve_csv, format_fixed_f64, normalize_text_artifact, reconciled_csv,
        render_reconciled_table, write_text_artifact,
    };
    use crate::domain::{PsdCurve, PsdPoint};
    use crate::reconcile::reconcile;
    use std::fs;
    use tempfile::TempDir;

    fn curves() -> (PsdCurve, PsdCurve) {
        (
            PsdCurve::new(vec![PsdPoint::new(10.0, 20.0), PsdPoint::new(100.0, 100.0)]),
            PsdCurve::new(vec![PsdPoint::new(10.0, 22.5), PsdPoint::new(50.0, 70.0)]),
        )
    }

    #[test]
    fn fixed_width_float_formatting_is_deterministic() {
        assert_eq!(format_fixed_f64(1.23, 13, 5), "      1.23000");
        assert_eq!(normalize_text_artifact("a\r\nb\rc"), "a\nb\nc\n");
    }

    #[test]
    fn csv_exports_have_headers_and_one_row_per_point() {
        let (reference, calculated) = curves();
        let csv = curve_csv(&reference);
        assert_eq!(
            csv,
            "fragment_size_mm,passing_percent\n10.0000,20.0000\n100.0000,100.0000\n"
        );

        let table = reconcile(&reference, &calculated).expect("both curves populated");
        let csv = reconciled_csv(&table);
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[1], "10.0000,20.0000,22.5000,2.5000");
        assert_eq!(lines[2], "50.0000,0.0000,70.0000,70.0000");
    }

    #[test]
    fn rendered_table_lists_largest_size_first() {
        let (reference, calculated) = curves();
        let table = reconcile(&reference, &calculated).expect("both curves populated");
        let text = render_reconciled_table(&table);
        let first_row = text.lines().nth(1).expect("data row");
        assert!(first_row.trim_start().starts_with("100.000"));
    }

    #[test]
    fn repeated_text_writes_produce_identical_bytes() {
        let temp = TempDir::new().expect("tempdir should be created");
        let path = temp.path().join("out/psd.csv");
        let input = "line 1\r\nline 2";

        write_text_artifact(&path, input).expect("first write should succeed");
        let first = fs::read(&path).expect("artifact should be readable");
        write_text_artifact(&path, input).expect("second write should succeed");
        let second = fs::read(&path).expect("artifact should be readable");

        assert_eq!(first, second);
        assert_eq!(second, b"line 1\nline 2\n");
    }
}
