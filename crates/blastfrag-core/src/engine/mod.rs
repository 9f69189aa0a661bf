pub mod convergence;
pub mod formulas;

pub use convergence::{
    ConvergenceReport, ConvergenceSolver, DEFAULT_MAX_ITERATIONS, DEFAULT_TOLERANCE,
    IterationRecord,
};

use crate::domain::{CalcError, CalcResult, CalculationResults, ResultKey, X50Mode};
use crate::journal::{EventLevel, EventSink};
use crate::params::{ParameterSource, ParameterStore, names};
use crate::report::ResultsReport;
use formulas::{KuznetsovInputs, UniformityInputs};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

const ENGINE_MODULE: &str = "engine";
const SOLVER_MODULE: &str = "solver";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub x50_mode: X50Mode,
    pub max_iterations: usize,
    pub tolerance: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            x50_mode: X50Mode::Iterative,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            tolerance: DEFAULT_TOLERANCE,
        }
    }
}

/// One entry of the fixed run order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineEntry {
    Step(ResultKey),
    /// n, g_n and x_50 resolved together by [`ConvergenceSolver`].
    Converge,
}

impl PipelineEntry {
    pub fn produces(self) -> &'static [ResultKey] {
        match self {
            Self::Step(key) => match key {
                ResultKey::Rdi => &[ResultKey::Rdi],
                ResultKey::Hf => &[ResultKey::Hf],
                ResultKey::RockFactor => &[ResultKey::RockFactor],
                ResultKey::SAnfo => &[ResultKey::SAnfo],
                ResultKey::SpecificCharge => &[ResultKey::SpecificCharge],
                ResultKey::XMax => &[ResultKey::XMax],
                ResultKey::Uniformity => &[ResultKey::Uniformity],
                ResultKey::GN => &[ResultKey::GN],
                ResultKey::X50 => &[ResultKey::X50],
                ResultKey::CurveShape => &[ResultKey::CurveShape],
            },
            Self::Converge => &[ResultKey::Uniformity, ResultKey::GN, ResultKey::X50],
        }
    }
}

impl Display for PipelineEntry {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Step(key) => write!(f, "{key}"),
            Self::Converge => f.write_str("n/x_50 convergence"),
        }
    }
}

pub const ITERATIVE_PIPELINE: [PipelineEntry; 8] = [
    PipelineEntry::Step(ResultKey::Rdi),
    PipelineEntry::Step(ResultKey::Hf),
    PipelineEntry::Step(ResultKey::RockFactor),
    PipelineEntry::Step(ResultKey::SAnfo),
    PipelineEntry::Step(ResultKey::SpecificCharge),
    PipelineEntry::Step(ResultKey::XMax),
    PipelineEntry::Converge,
    PipelineEntry::Step(ResultKey::CurveShape),
];

pub const DIRECT_PIPELINE: [PipelineEntry; 10] = [
    PipelineEntry::Step(ResultKey::Rdi),
    PipelineEntry::Step(ResultKey::Hf),
    PipelineEntry::Step(ResultKey::RockFactor),
    PipelineEntry::Step(ResultKey::SAnfo),
    PipelineEntry::Step(ResultKey::SpecificCharge),
    PipelineEntry::Step(ResultKey::XMax),
    PipelineEntry::Step(ResultKey::X50),
    PipelineEntry::Step(ResultKey::Uniformity),
    PipelineEntry::Step(ResultKey::GN),
    PipelineEntry::Step(ResultKey::CurveShape),
];

pub fn pipeline(mode: X50Mode) -> &'static [PipelineEntry] {
    match mode {
        X50Mode::Iterative => &ITERATIVE_PIPELINE,
        X50Mode::Direct => &DIRECT_PIPELINE,
    }
}

/// Everything one run reads and writes.
#[derive(Debug, Clone, PartialEq)]
pub struct CalculationContext {
    pub parameters: ParameterStore,
    pub results: CalculationResults,
    /// Overrides the `target_x_50` parameter as the solver's starting point.
    pub target_x_50: Option<f64>,
}

impl CalculationContext {
    pub fn new(parameters: ParameterStore) -> Self {
        Self {
            parameters,
            results: CalculationResults::default(),
            target_x_50: None,
        }
    }

    pub fn with_target_x_50(mut self, target_x_50: f64) -> Self {
        self.target_x_50 = Some(target_x_50);
        self
    }

    pub fn reference_target(&self) -> CalcResult<f64> {
        match self.target_x_50 {
            Some(target) => Ok(target),
            None => self.parameters.numeric(names::TARGET_X_50),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    pub key: ResultKey,
    pub result: CalcResult<f64>,
}

impl StepOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunProgress {
    pub completed: usize,
    pub total: usize,
    pub entry: PipelineEntry,
}

impl RunProgress {
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        self.completed as f64 / self.total as f64
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub mode: X50Mode,
    pub outcomes: Vec<StepOutcome>,
    pub convergence: Option<ConvergenceReport>,
    pub warnings: Vec<String>,
    pub results: CalculationResults,
}

impl RunSummary {
    pub fn is_complete(&self) -> bool {
        self.results.is_complete()
    }

    pub fn failures(&self) -> impl Iterator<Item = (ResultKey, &CalcError)> {
        self.outcomes
            .iter()
            .filter_map(|outcome| match &outcome.result {
                Ok(_) => None,
                Err(error) => Some((outcome.key, error)),
            })
    }

    pub fn report(&self) -> ResultsReport {
        ResultsReport::from_results(&self.results)
    }
}

/// Runs the Kuz-Ram steps against a [`CalculationContext`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FragmentationEngine {
    config: EngineConfig,
    solver: ConvergenceSolver,
}

impl FragmentationEngine {
    pub fn new(config: EngineConfig) -> CalcResult<Self> {
        let solver = ConvergenceSolver::new(config.max_iterations, config.tolerance)?;
        Ok(Self { config, solver })
    }

    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Computes one result, stores it on success and journals the outcome.
    pub fn compute<S: EventSink>(
        &self,
        key: ResultKey,
        ctx: &mut CalculationContext,
        sink: &mut S,
    ) -> CalcResult<f64> {
        let outcome = self.evaluate(key, ctx);
        match &outcome {
            Ok(value) => {
                ctx.results.insert(key, *value);
                sink.emit(
                    ENGINE_MODULE,
                    EventLevel::Success,
                    format!("{} calculated: {:.4}", key, value),
                );
            }
            Err(error) => {
                ctx.results.remove(key);
                sink.emit_error(ENGINE_MODULE, error);
            }
        }
        outcome
    }

    fn evaluate(&self, key: ResultKey, ctx: &CalculationContext) -> CalcResult<f64> {
        let params = &ctx.parameters;
        let results = &ctx.results;
        match key {
            ResultKey::Rdi => formulas::rock_density_influence(params.numeric(names::RHO)?),
            ResultKey::Hf => formulas::hardness_factor(
                params.numeric(names::YOUNG_MODULUS)?,
                params.numeric(names::SIGMA_C)?,
            ),
            ResultKey::RockFactor => formulas::rock_factor(
                params.numeric(names::RMD)?,
                results.require(ResultKey::Rdi)?,
                results.require(ResultKey::Hf)?,
            ),
            ResultKey::SAnfo => {
                formulas::relative_weight_strength(params.numeric(names::ENERGY_VV)?)
            }
            ResultKey::SpecificCharge => formulas::specific_charge(
                params.numeric(names::CHARGE_MASS)?,
                params.numeric(names::BENCH_HEIGHT)?,
                params.numeric(names::SPACING)?,
                params.numeric(names::BURDEN)?,
            ),
            ResultKey::XMax => formulas::max_fragment_size(
                params.numeric(names::IN_SITU_BLOCK_SIZE)?,
                params.numeric(names::SPACING)?,
                params.numeric(names::BURDEN)?,
            ),
            ResultKey::Uniformity => UniformityInputs::gather(params, results)?
                .uniformity(results.require(ResultKey::X50)?),
            ResultKey::GN => formulas::g_factor(results.require(ResultKey::Uniformity)?),
            ResultKey::X50 => {
                let inputs = KuznetsovInputs::gather(params, results)?;
                match self.config.x50_mode {
                    X50Mode::Direct => inputs.median_direct(),
                    X50Mode::Iterative => {
                        inputs.median_with_g_factor(results.require(ResultKey::GN)?)
                    }
                }
            }
            ResultKey::CurveShape => formulas::curve_shape(
                results.require(ResultKey::XMax)?,
                results.require(ResultKey::X50)?,
                results.require(ResultKey::Uniformity)?,
            ),
        }
    }

    /// Resolves n, g_n and x_50 together and stores the final iterate.
    pub fn converge<S: EventSink>(
        &self,
        ctx: &mut CalculationContext,
        sink: &mut S,
    ) -> CalcResult<ConvergenceReport> {
        let solver = &self.solver;
        let outcome = ctx
            .reference_target()
            .and_then(|target| solver.solve_from(target, &ctx.parameters, &ctx.results));

        let report = match outcome {
            Ok(report) => report,
            Err(error) => {
                for key in PipelineEntry::Converge.produces() {
                    ctx.results.remove(*key);
                }
                sink.emit_error(SOLVER_MODULE, &error);
                return Err(error);
            }
        };

        for record in &report.history {
            sink.emit(
                SOLVER_MODULE,
                EventLevel::Info,
                format!(
                    "iteration {}: x_50 {:.4} -> {:.4} (n={:.4}, g_n={:.4}, change {:.4})",
                    record.iteration,
                    record.x_50_input,
                    record.x_50,
                    record.n,
                    record.g_n,
                    record.relative_change
                ),
            );
        }
        ctx.results.insert(ResultKey::Uniformity, report.n);
        ctx.results.insert(ResultKey::GN, report.g_n);
        ctx.results.insert(ResultKey::X50, report.x_50);
        match report.warning() {
            Some(warning) => sink.emit_error(SOLVER_MODULE, &warning),
            None => sink.emit(
                SOLVER_MODULE,
                EventLevel::Success,
                format!(
                    "converged after {} iteration(s): n={:.4}, x_50={:.4}",
                    report.iterations, report.n, report.x_50
                ),
            ),
        }
        Ok(report)
    }

    pub fn run_all<S: EventSink>(&self, ctx: &mut CalculationContext, sink: &mut S) -> RunSummary {
        self.run_all_with_progress(ctx, sink, |_| {})
    }

    /// Clears previous results and executes the fixed order. Failures are
    /// local to their step; dependants are skipped through missing inputs.
    pub fn run_all_with_progress<S: EventSink>(
        &self,
        ctx: &mut CalculationContext,
        sink: &mut S,
        mut on_progress: impl FnMut(RunProgress),
    ) -> RunSummary {
        ctx.results.clear();
        let mode = self.config.x50_mode;
        sink.emit(
            ENGINE_MODULE,
            EventLevel::Info,
            format!("calculation run started ({} x_50)", mode.as_str()),
        );

        let mut warnings = Vec::new();
        for violation in ctx.parameters.violations() {
            let message = violation.to_string();
            sink.emit(ENGINE_MODULE, EventLevel::Warning, message.clone());
            warnings.push(message);
        }

        let entries = pipeline(mode);
        let mut outcomes = Vec::with_capacity(ResultKey::ALL.len());
        let mut convergence = None;
        for (index, entry) in entries.iter().enumerate() {
            match *entry {
                PipelineEntry::Step(key) => {
                    let result = self.compute(key, ctx, sink);
                    outcomes.push(StepOutcome { key, result });
                }
                PipelineEntry::Converge => match self.converge(ctx, sink) {
                    Ok(report) => {
                        if let Some(warning) = report.warning() {
                            warnings.push(warning.diagnostic_line());
                        }
                        outcomes.extend([
                            StepOutcome {
                                key: ResultKey::Uniformity,
                                result: Ok(report.n),
                            },
                            StepOutcome {
                                key: ResultKey::GN,
                                result: Ok(report.g_n),
                            },
                            StepOutcome {
                                key: ResultKey::X50,
                                result: Ok(report.x_50),
                            },
                        ]);
                        convergence = Some(report);
                    }
                    Err(error) => {
                        outcomes.extend(entry.produces().iter().map(|key| StepOutcome {
                            key: *key,
                            result: Err(error.clone()),
                        }));
                    }
                },
            }
            on_progress(RunProgress {
                completed: index + 1,
                total: entries.len(),
                entry: *entry,
            });
        }

        let failed = outcomes
            .iter()
            .filter(|outcome| !outcome.is_success())
            .count();
        if failed == 0 {
            sink.emit(
                ENGINE_MODULE,
                EventLevel::Success,
                "calculation run completed",
            );
        } else {
            sink.emit(
                ENGINE_MODULE,
                EventLevel::Warning,
                format!("calculation run completed with {failed} failed step(s)"),
            );
        }

        RunSummary {
            mode,
            outcomes,
            convergence,
            warnings,
            results: ctx.results.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{CalculationContext, EngineConfig, FragmentationEngine, PipelineEntry, pipeline};
    use crate::domain::{CalcErrorCategory, ResultKey, X50Mode};
    use crate::journal::{EventJournal, EventLevel};
    use crate::params::{ParameterStore, ParameterValue, names};

    fn context() -> CalculationContext {
        CalculationContext::new(ParameterStore::with_defaults().expect("defaults load"))
    }

    #[test]
    fn single_steps_store_results_and_journal() {
        let engine = FragmentationEngine::default();
        let mut ctx = context();
        let mut journal = EventJournal::default();

        let rdi = engine
            .compute(ResultKey::Rdi, &mut ctx, &mut journal)
            .expect("rho is configured");
        assert_eq!(rdi, 0.025 * 2700.0 - 50.0);
        assert_eq!(ctx.results.get(ResultKey::Rdi), Some(rdi));
        assert_eq!(journal.count_level(EventLevel::Success), 1);

        let error = engine
            .compute(ResultKey::RockFactor, &mut ctx, &mut journal)
            .expect_err("HF not yet computed");
        assert_eq!(error.category(), CalcErrorCategory::MissingInput);
        assert!(!ctx.results.contains(ResultKey::RockFactor));
        assert_eq!(journal.count_level(EventLevel::Error), 1);
    }

    #[test]
    fn non_numeric_parameter_is_invalid_type() {
        let engine = FragmentationEngine::default();
        let mut ctx = context();
        ctx.parameters
            .set(names::RHO, ParameterValue::Text("dense".to_string()))
            .expect("rho is declared");
        let error = engine
            .compute(ResultKey::Rdi, &mut ctx, &mut EventJournal::default())
            .expect_err("text value");
        assert_eq!(error.category(), CalcErrorCategory::InvalidType);
    }

    #[test]
    fn run_all_reports_progress_per_entry() {
        let engine = FragmentationEngine::default();
        let mut ctx = context();
        let mut fractions = Vec::new();
        let summary = engine.run_all_with_progress(&mut ctx, &mut EventJournal::default(), |p| {
            fractions.push(p.fraction())
        });

        assert!(
            summary.is_complete(),
            "failures: {:?}",
            summary.failures().collect::<Vec<_>>()
        );
        assert_eq!(fractions.len(), pipeline(X50Mode::Iterative).len());
        assert_eq!(fractions.last().copied(), Some(1.0));
        assert!(fractions.windows(2).all(|pair| pair[0] < pair[1]));
        assert_eq!(summary.outcomes.len(), ResultKey::ALL.len());
        assert!(summary.convergence.is_some());
    }

    #[test]
    fn failed_step_cascades_without_aborting() {
        let engine = FragmentationEngine::default();
        let mut ctx = context();
        ctx.parameters
            .set(names::BENCH_HEIGHT, ParameterValue::Number(0.0))
            .expect("H is declared");
        let summary = engine.run_all(&mut ctx, &mut EventJournal::default());

        for key in [
            ResultKey::Rdi,
            ResultKey::Hf,
            ResultKey::RockFactor,
            ResultKey::SAnfo,
            ResultKey::XMax,
        ] {
            assert!(summary.results.contains(key), "{key} should be present");
        }
        for key in [
            ResultKey::SpecificCharge,
            ResultKey::Uniformity,
            ResultKey::GN,
            ResultKey::X50,
            ResultKey::CurveShape,
        ] {
            assert!(!summary.results.contains(key), "{key} should be skipped");
        }
        let failed: Vec<ResultKey> = summary.failures().map(|(key, _)| key).collect();
        assert_eq!(failed.len(), 5);
        assert!(!summary.warnings.is_empty(), "H = 0 violates its bounds");
    }

    #[test]
    fn direct_mode_runs_ten_single_steps() {
        let config = EngineConfig {
            x50_mode: X50Mode::Direct,
            ..EngineConfig::default()
        };
        let engine = FragmentationEngine::new(config).expect("valid config");
        let mut ctx = context();
        let summary = engine.run_all(&mut ctx, &mut EventJournal::default());

        assert!(summary.is_complete());
        assert!(summary.convergence.is_none());
        assert!(!pipeline(X50Mode::Direct).contains(&PipelineEntry::Converge));
        let order: Vec<ResultKey> = summary.outcomes.iter().map(|outcome| outcome.key).collect();
        assert_eq!(
            &order[6..],
            &[
                ResultKey::X50,
                ResultKey::Uniformity,
                ResultKey::GN,
                ResultKey::CurveShape,
            ]
        );
    }

    #[test]
    fn engine_rejects_invalid_iteration_budget() {
        let config = EngineConfig {
            max_iterations: 0,
            ..EngineConfig::default()
        };
        let error = FragmentationEngine::new(config).expect_err("zero iterations");
        assert_eq!(error.category(), CalcErrorCategory::InputValidation);
    }

    #[test]
    fn explicit_target_overrides_parameter() {
        let ctx = context().with_target_x_50(120.0);
        assert_eq!(ctx.reference_target(), Ok(120.0));
        assert_eq!(context().reference_target(), Ok(300.0));
    }
}
