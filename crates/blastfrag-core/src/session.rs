//! Full study (calculation, curves, reconciliation) and the per-session
//! guard that serializes concurrent runs.

use crate::domain::{CalcError, CalcResult, CalculationResults, PsdCurve};
use crate::engine::{CalculationContext, FragmentationEngine, RunSummary};
use crate::journal::{EventJournal, EventLevel, EventSink};
use crate::params::{ParameterStore, ParameterValue, ProjectConfig};
use crate::reconcile::{ReconciledTable, reconcile};
use crate::reference::{AxisConfig, AxisSpec, ReferenceCurveGenerator, ReferenceParameters};
use std::sync::{Mutex, MutexGuard};

const REFERENCE_MODULE: &str = "reference";
const RECONCILE_MODULE: &str = "reconcile";

#[derive(Debug, Clone, PartialEq)]
pub struct StudyOutcome {
    pub summary: RunSummary,
    pub reference: CalcResult<PsdCurve>,
    pub calculated: CalcResult<PsdCurve>,
    pub reconciled: CalcResult<ReconciledTable>,
    pub warnings: Vec<String>,
}

impl StudyOutcome {
    /// Every result computed and both curves reconciled.
    pub fn is_complete(&self) -> bool {
        self.summary.is_complete() && self.reconciled.is_ok()
    }
}

/// Runs the engine, then builds reference and calculated curves on a shared
/// axis and reconciles them. Never aborts; failures stay in the outcome.
pub fn run_study<S: EventSink>(
    engine: &FragmentationEngine,
    axis: &AxisConfig,
    ctx: &mut CalculationContext,
    sink: &mut S,
) -> StudyOutcome {
    let summary = engine.run_all(ctx, sink);
    let mut warnings = Vec::new();

    let pair = ReferenceParameters::from_source(&ctx.parameters).and_then(|reference| {
        let (spec, notice) = AxisSpec::from_config(axis, reference.x_range_min)?;
        if let Some(notice) = notice {
            sink.emit(REFERENCE_MODULE, EventLevel::Warning, notice.clone());
            warnings.push(notice);
        }
        ReferenceCurveGenerator::new(spec).curve_pair(&reference, &ctx.results)
    });

    let (reference, calculated) = match pair {
        Ok(pair) => (pair.reference, pair.calculated),
        Err(error) => (Err(error.clone()), Err(error)),
    };
    journal_curve(sink, "reference curve", &reference);
    journal_curve(sink, "calculated curve", &calculated);

    let reconciled = match (&reference, &calculated) {
        (Ok(reference), Ok(calculated)) => reconcile(reference, calculated),
        (Err(error), _) | (_, Err(error)) => Err(CalcError::missing_input(
            "RECONCILE.MISSING_CURVE",
            format!("reconciliation skipped: [{}] {}", error.placeholder(), error.message()),
        )),
    };
    match &reconciled {
        Ok(table) => {
            for row in table.out_of_range_rows() {
                let message = format!(
                    "calculated passing {:.4}% at {:.4} mm is outside [0, 100]",
                    row.calculated_passing, row.fragment_size_mm
                );
                sink.emit(RECONCILE_MODULE, EventLevel::Warning, message.clone());
                warnings.push(message);
            }
            sink.emit(
                RECONCILE_MODULE,
                EventLevel::Success,
                format!("reconciled {} size classes", table.len()),
            );
        }
        Err(error) => sink.emit_error(RECONCILE_MODULE, error),
    }

    StudyOutcome {
        summary,
        reference,
        calculated,
        reconciled,
        warnings,
    }
}

fn journal_curve<S: EventSink>(sink: &mut S, label: &str, curve: &CalcResult<PsdCurve>) {
    match curve {
        Ok(curve) => sink.emit(
            REFERENCE_MODULE,
            EventLevel::Success,
            format!("{label} generated with {} points", curve.len()),
        ),
        Err(error) => sink.emit_error(REFERENCE_MODULE, error),
    }
}

#[derive(Debug)]
struct SessionState {
    context: CalculationContext,
    journal: EventJournal,
}

/// One user session. Runs against the same session are serialized; separate
/// sessions never share a context.
#[derive(Debug)]
pub struct CalculationSession {
    engine: FragmentationEngine,
    axis: AxisConfig,
    state: Mutex<SessionState>,
}

impl CalculationSession {
    pub fn new(engine: FragmentationEngine, axis: AxisConfig, parameters: ParameterStore) -> Self {
        Self {
            engine,
            axis,
            state: Mutex::new(SessionState {
                context: CalculationContext::new(parameters),
                journal: EventJournal::default(),
            }),
        }
    }

    pub fn from_config(config: ProjectConfig) -> CalcResult<Self> {
        let engine = FragmentationEngine::new(config.engine)?;
        let parameters = ParameterStore::from_specs(config.parameters)?;
        Ok(Self::new(engine, config.axis, parameters))
    }

    fn lock(&self) -> CalcResult<MutexGuard<'_, SessionState>> {
        self.state.lock().map_err(|_| {
            CalcError::internal(
                "INTERNAL.SESSION_POISONED",
                "a previous run panicked while holding the session",
            )
        })
    }

    pub fn set_parameter(&self, name: &str, value: ParameterValue) -> CalcResult<()> {
        self.lock()?.context.parameters.set(name, value)
    }

    pub fn run(&self) -> CalcResult<RunSummary> {
        let mut guard = self.lock()?;
        let SessionState { context, journal } = &mut *guard;
        Ok(self.engine.run_all(context, journal))
    }

    pub fn run_study(&self) -> CalcResult<StudyOutcome> {
        let mut guard = self.lock()?;
        let SessionState { context, journal } = &mut *guard;
        Ok(run_study(&self.engine, &self.axis, context, journal))
    }

    pub fn results(&self) -> CalcResult<CalculationResults> {
        Ok(self.lock()?.context.results.clone())
    }

    pub fn journal(&self) -> CalcResult<EventJournal> {
        Ok(self.lock()?.journal.clone())
    }
}
