use super::formulas::{KuznetsovInputs, UniformityInputs, g_factor};
use crate::domain::{CalcError, CalcResult, CalculationResults};
use crate::numerics::relative_change;
use crate::params::ParameterSource;
use serde::Serialize;

pub const DEFAULT_MAX_ITERATIONS: usize = 5;
pub const DEFAULT_TOLERANCE: f64 = 0.05;
pub const MAX_ITERATIONS_LIMIT: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IterationRecord {
    pub iteration: usize,
    pub x_50_input: f64,
    pub n: f64,
    pub g_n: f64,
    pub x_50: f64,
    pub relative_change: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConvergenceReport {
    pub target_x_50: f64,
    pub n: f64,
    pub g_n: f64,
    pub x_50: f64,
    pub iterations: usize,
    pub converged: bool,
    pub tolerance: f64,
    pub history: Vec<IterationRecord>,
}

impl ConvergenceReport {
    /// Non-fatal warning when the iteration budget ran out.
    pub fn warning(&self) -> Option<CalcError> {
        (!self.converged).then(|| {
            let last_change = self
                .history
                .last()
                .map(|record| record.relative_change)
                .unwrap_or(f64::NAN);
            CalcError::not_converged(
                "SOLVER.NOT_CONVERGED",
                format!(
                    "x_50 did not converge within {} iterations \
                     (last relative change {:.4}, tolerance {}); using n={:.4}, x_50={:.4}",
                    self.iterations, last_change, self.tolerance, self.n, self.x_50
                ),
            )
        })
    }
}

/// Bounded fixed-point iteration resolving the n / x_50 dependency.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConvergenceSolver {
    max_iterations: usize,
    tolerance: f64,
}

impl Default for ConvergenceSolver {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            tolerance: DEFAULT_TOLERANCE,
        }
    }
}

impl ConvergenceSolver {
    pub fn new(max_iterations: usize, tolerance: f64) -> CalcResult<Self> {
        if !(1..=MAX_ITERATIONS_LIMIT).contains(&max_iterations) {
            return Err(CalcError::input_validation(
                "INPUT.MAX_ITERATIONS",
                format!(
                    "max_iterations must be between 1 and {} (got {})",
                    MAX_ITERATIONS_LIMIT, max_iterations
                ),
            ));
        }
        if !tolerance.is_finite() || tolerance < 0.0 {
            return Err(CalcError::input_validation(
                "INPUT.TOLERANCE",
                format!("tolerance must be finite and non-negative (got {tolerance})"),
            ));
        }
        Ok(Self {
            max_iterations,
            tolerance,
        })
    }

    pub const fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    pub const fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Gathers every input from the store and prior results, then iterates.
    pub fn solve_from(
        &self,
        target_x_50: f64,
        parameters: &impl ParameterSource,
        results: &CalculationResults,
    ) -> CalcResult<ConvergenceReport> {
        let geometry = UniformityInputs::gather(parameters, results)?;
        let kuznetsov = KuznetsovInputs::gather(parameters, results)?;
        self.solve(target_x_50, &geometry, &kuznetsov)
    }

    pub fn solve(
        &self,
        target_x_50: f64,
        geometry: &UniformityInputs,
        kuznetsov: &KuznetsovInputs,
    ) -> CalcResult<ConvergenceReport> {
        if !target_x_50.is_finite() || target_x_50 <= 0.0 {
            return Err(CalcError::domain(
                "SOLVER.TARGET_X50",
                format!("reference target x_50 must be positive and finite (got {target_x_50})"),
            ));
        }

        let mut history = Vec::with_capacity(self.max_iterations);
        let mut current = target_x_50;
        for iteration in 1..=self.max_iterations {
            let n = geometry.uniformity(current)?;
            let g_n = g_factor(n)?;
            let x_50 = kuznetsov.median_with_g_factor(g_n)?;
            let change = relative_change(current, x_50).ok_or_else(|| {
                CalcError::domain(
                    "SOLVER.RELATIVE_CHANGE",
                    format!("relative change undefined for x_50 {current} -> {x_50}"),
                )
            })?;
            history.push(IterationRecord {
                iteration,
                x_50_input: current,
                n,
                g_n,
                x_50,
                relative_change: change,
            });
            if change <= self.tolerance {
                return Ok(self.report(target_x_50, history, true));
            }
            current = x_50;
        }
        Ok(self.report(target_x_50, history, false))
    }

    fn report(
        &self,
        target_x_50: f64,
        history: Vec<IterationRecord>,
        converged: bool,
    ) -> ConvergenceReport {
        let (n, g_n, x_50) = history
            .last()
            .map(|record| (record.n, record.g_n, record.x_50))
            .unwrap_or((f64::NAN, f64::NAN, target_x_50));
        ConvergenceReport {
            target_x_50,
            n,
            g_n,
            x_50,
            iterations: history.len(),
            converged,
            tolerance: self.tolerance,
            history,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ConvergenceSolver, MAX_ITERATIONS_LIMIT};
    use crate::domain::CalcErrorCategory;
    use crate::engine::formulas::{KuznetsovInputs, UniformityInputs};

    fn geometry() -> UniformityInputs {
        UniformityInputs {
            x_max: 1500.0,
            spacing: 5.0,
            burden: 4.0,
            hole_diameter_mm: 115.0,
            drilling_deviation: 0.5,
            bottom_charge_length: 10.0,
            column_charge_length: 2.0,
            total_charge_length: 12.0,
            bench_height: 15.0,
        }
    }

    fn kuznetsov() -> KuznetsovInputs {
        KuznetsovInputs {
            rock_factor: 0.06 * (50.0 + 17.5 + 40.0 / 3.0),
            charge_mass: 300.0,
            s_anfo: 3.8 / 4.2 * 100.0,
            specific_charge: 1.0,
        }
    }

    #[test]
    fn solver_terminates_within_budget() {
        let solver = ConvergenceSolver::default();
        let report = solver
            .solve(300.0, &geometry(), &kuznetsov())
            .expect("inputs are in domain");

        assert!(report.iterations >= 1 && report.iterations <= 5);
        assert_eq!(report.history.len(), report.iterations);
        let last = report.history.last().expect("at least one iterate");
        assert_eq!(report.n, last.n);
        assert_eq!(report.x_50, last.x_50);
        if report.converged {
            assert!(last.relative_change <= 0.05);
            assert!(report.warning().is_none());
        } else {
            assert_eq!(
                report.warning().expect("warning").category(),
                CalcErrorCategory::ConvergenceNotReached
            );
        }
    }

    #[test]
    fn exhausted_budget_returns_last_pair_with_warning() {
        let solver = ConvergenceSolver::new(1, 0.0).expect("valid settings");
        let report = solver
            .solve(300.0, &geometry(), &kuznetsov())
            .expect("inputs are in domain");

        assert!(!report.converged);
        assert_eq!(report.iterations, 1);
        let record = report.history[0];
        assert_eq!(record.x_50_input, 300.0);
        assert_eq!(report.x_50, record.x_50);
        let warning = report.warning().expect("not converged");
        assert_eq!(warning.placeholder(), "SOLVER.NOT_CONVERGED");
        assert!(!warning.category().is_fatal());
    }

    #[test]
    fn iterates_feed_back_previous_median() {
        let solver = ConvergenceSolver::new(3, 0.0).expect("valid settings");
        let report = solver
            .solve(300.0, &geometry(), &kuznetsov())
            .expect("inputs are in domain");
        for pair in report.history.windows(2) {
            assert_eq!(pair[1].x_50_input, pair[0].x_50);
        }
    }

    #[test]
    fn domain_failure_aborts_solve() {
        let mut broken = geometry();
        broken.hole_diameter_mm = 0.0;
        let error = ConvergenceSolver::default()
            .solve(300.0, &broken, &kuznetsov())
            .expect_err("zero hole diameter");
        assert_eq!(error.category(), CalcErrorCategory::DomainError);

        let error = ConvergenceSolver::default()
            .solve(0.0, &geometry(), &kuznetsov())
            .expect_err("zero target");
        assert_eq!(error.placeholder(), "SOLVER.TARGET_X50");
    }

    #[test]
    fn rejects_unbounded_settings() {
        assert!(ConvergenceSolver::new(0, 0.05).is_err());
        assert!(ConvergenceSolver::new(MAX_ITERATIONS_LIMIT + 1, 0.05).is_err());
        assert!(ConvergenceSolver::new(5, -0.1).is_err());
        assert!(ConvergenceSolver::new(5, f64::NAN).is_err());
        assert!(ConvergenceSolver::new(MAX_ITERATIONS_LIMIT, 0.0).is_ok());
    }
}
