use super::CliError;
use super::dispatch::parse_x50_mode;
use super::helpers::{AxisFlags, ProjectFlags, load_project, write_output};
use anyhow::Context;
use blastfrag_core::domain::X50Mode;
use blastfrag_core::engine::{CalculationContext, FragmentationEngine};
use blastfrag_core::journal::EventJournal;
use blastfrag_core::params::{BoundViolation, ParameterSpec, ParameterStore, ParameterValue};
use blastfrag_core::reference::{AxisSpec, ReferenceParameters, generate};
use blastfrag_core::report::RunDocument;
use blastfrag_core::serialization::{curve_csv, reconciled_csv, render_reconciled_table};
use blastfrag_core::session::run_study;
use serde::Serialize;
use std::path::PathBuf;

#[derive(clap::Args)]
pub(super) struct RunArgs {
    #[command(flatten)]
    project: ProjectFlags,

    #[command(flatten)]
    axis: AxisFlags,

    /// x_50 formula: iterative or direct
    #[arg(long, value_parser = parse_x50_mode)]
    mode: Option<X50Mode>,

    /// Maximum n/x_50 iterations
    #[arg(long)]
    max_iterations: Option<usize>,

    /// Relative convergence tolerance
    #[arg(long)]
    tolerance: Option<f64>,

    /// Starting x_50 for the iteration (defaults to target_x_50)
    #[arg(long)]
    target_x50: Option<f64>,

    /// JSON run report output path
    #[arg(long)]
    report: Option<PathBuf>,

    /// Reconciled PSD table CSV output path
    #[arg(long)]
    psd_csv: Option<PathBuf>,

    /// Event journal JSON output path
    #[arg(long)]
    journal: Option<PathBuf>,
}

#[derive(clap::Args)]
pub(super) struct ReferenceArgs {
    #[command(flatten)]
    project: ProjectFlags,

    #[command(flatten)]
    axis: AxisFlags,

    /// Reference curve CSV output path
    #[arg(long)]
    csv: Option<PathBuf>,
}

#[derive(clap::Args)]
pub(super) struct ParamsArgs {
    #[command(flatten)]
    project: ProjectFlags,

    /// Print the parameter listing as JSON
    #[arg(long)]
    json: bool,
}

pub(super) fn run_calculation_command(args: RunArgs) -> Result<i32, CliError> {
    let project = load_project(&args.project)?;
    let mut engine_config = project.config.engine;
    if let Some(mode) = args.mode {
        engine_config.x50_mode = mode;
    }
    if let Some(max_iterations) = args.max_iterations {
        engine_config.max_iterations = max_iterations;
    }
    if let Some(tolerance) = args.tolerance {
        engine_config.tolerance = tolerance;
    }
    let engine = FragmentationEngine::new(engine_config)?;
    let axis = args.axis.apply(project.config.axis);

    let mut context = CalculationContext::new(project.parameters);
    if let Some(target) = args.target_x50 {
        context = context.with_target_x_50(target);
    }
    let mut journal = EventJournal::default();
    let outcome = run_study(&engine, &axis, &mut context, &mut journal);
    let summary = &outcome.summary;

    println!("Kuz-Ram results ({} x_50)", summary.mode.as_str());
    print!("{}", summary.report().render_text());
    if let Some(convergence) = &summary.convergence {
        let status = if convergence.converged {
            "reached"
        } else {
            "NOT reached"
        };
        println!(
            "Convergence: {status} after {} iteration(s), n={:.4}, x_50={:.4} mm",
            convergence.iterations,
            convergence.n,
            convergence.x_50
        );
    }
    for (key, error) in summary.failures() {
        println!("Failed {key}: [{}] {}", error.placeholder(), error.message());
    }
    for warning in summary.warnings.iter().chain(&outcome.warnings) {
        println!("Warning: {warning}");
    }
    match &outcome.reconciled {
        Ok(table) => {
            println!("PSD reconciliation ({} size classes)", table.len());
            print!("{}", render_reconciled_table(table));
            if let Some(deviation) = table.max_abs_deviation() {
                println!("Max |deviation|: {deviation:.4} %");
            }
        }
        Err(error) => println!("PSD reconciliation unavailable: {}", error.message()),
    }

    if let Some(path) = &args.report {
        let document = RunDocument::new(summary).with_curves(
            outcome.reference.as_ref().ok(),
            outcome.calculated.as_ref().ok(),
            outcome.reconciled.as_ref().ok(),
        );
        let json = document
            .to_json()
            .context("failed to serialize run report")?;
        write_output(path, &json, "JSON report")?;
    }
    if let Some(path) = &args.psd_csv {
        match &outcome.reconciled {
            Ok(table) => write_output(path, &reconciled_csv(table), "PSD table")?,
            Err(error) => {
                tracing::warn!(path = %path.display(), "PSD table not written");
                println!(
                    "PSD table not written to '{}': [{}] reconciliation unavailable",
                    path.display(),
                    error.placeholder()
                );
            }
        }
    }
    if let Some(path) = &args.journal {
        let json = journal
            .to_json()
            .context("failed to serialize event journal")?;
        write_output(path, &json, "Event journal")?;
    }

    if summary.is_complete() { Ok(0) } else { Ok(1) }
}

pub(super) fn run_reference_command(args: ReferenceArgs) -> Result<i32, CliError> {
    let project = load_project(&args.project)?;
    let axis = args.axis.apply(project.config.axis);
    let reference = ReferenceParameters::from_source(&project.parameters)?;
    let (spec, notice) = AxisSpec::from_config(&axis, reference.x_range_min)?;
    if let Some(notice) = notice {
        tracing::warn!("{notice}");
        println!("Warning: {notice}");
    }
    let curve = generate(
        &spec,
        reference.target_x_max,
        reference.target_x_50,
        reference.target_b,
    )?;

    println!(
        "Reference curve: x_max={} mm, x_50={} mm, b={} ({} points, {} axis)",
        reference.target_x_max,
        reference.target_x_50,
        reference.target_b,
        curve.len(),
        axis.kind.as_str()
    );
    for point in curve.points().iter().rev() {
        println!("{:>14.3}{:>14.4}", point.fragment_size_mm, point.passing_percent);
    }
    if let Some(path) = &args.csv {
        write_output(path, &curve_csv(&curve), "Reference CSV")?;
    }
    Ok(0)
}

#[derive(Debug, Serialize)]
struct ParameterListing<'a> {
    parameters: Vec<ParameterEntry<'a>>,
    violations: Vec<BoundViolation>,
}

#[derive(Debug, Serialize)]
struct ParameterEntry<'a> {
    name: &'a str,
    category: &'a str,
    #[serde(rename = "type")]
    kind: &'static str,
    value: Option<&'a ParameterValue>,
    min_value: Option<f64>,
    max_value: Option<f64>,
    unit: &'a str,
    description: &'a str,
}

impl<'a> ParameterEntry<'a> {
    fn new(spec: &'a ParameterSpec, store: &'a ParameterStore) -> Self {
        Self {
            name: &spec.name,
            category: &spec.category,
            kind: spec.kind.as_str(),
            value: store.value(&spec.name),
            min_value: spec.min_value,
            max_value: spec.max_value,
            unit: &spec.unit,
            description: &spec.description,
        }
    }
}

pub(super) fn run_params_command(args: ParamsArgs) -> Result<i32, CliError> {
    let project = load_project(&args.project)?;
    let store = &project.parameters;
    let violations = store.violations();

    if args.json {
        let listing = ParameterListing {
            parameters: store
                .specs()
                .iter()
                .map(|spec| ParameterEntry::new(spec, store))
                .collect(),
            violations: violations.clone(),
        };
        let json = serde_json::to_string_pretty(&listing)
            .context("failed to serialize parameter listing")?;
        println!("{json}");
    } else {
        for category in store.category_names() {
            let heading = if category.is_empty() {
                "uncategorized"
            } else {
                category
            };
            println!("[{heading}]");
            for spec in store.in_category(category) {
                let value = store
                    .value(&spec.name)
                    .map(ToString::to_string)
                    .unwrap_or_else(|| "unset".to_string());
                println!(
                    "  {:<20} {:<5} {:>12} {:<8} [{}, {}]  {}",
                    spec.name,
                    spec.kind.as_str(),
                    value,
                    spec.unit,
                    bound_text(spec.min_value),
                    bound_text(spec.max_value),
                    spec.description
                );
            }
        }
        for violation in &violations {
            println!("Warning: {violation}");
        }
    }

    if violations.is_empty() { Ok(0) } else { Ok(1) }
}

fn bound_text(bound: Option<f64>) -> String {
    bound.map(|value| value.to_string()).unwrap_or_else(|| "-".to_string())
}
