//! Kuz-Ram formula set. Every function validates its own domain before
//! evaluating and never returns a non-finite value.

use crate::domain::{CalcError, CalcResult, CalculationResults, ResultKey};
use crate::numerics::{finite, gamma, ln_ratio};
use crate::params::{ParameterSource, names};
use std::f64::consts::LN_2;

/// Reference energy of ANFO, MJ/kg.
pub const ANFO_ENERGY: f64 = 4.2;
/// Young's modulus threshold (GPa) above which hardness follows sigma_c.
pub const HARDNESS_MODULUS_THRESHOLD: f64 = 50.0;
const METRES_TO_MM: f64 = 1000.0;
const DIRECT_ENERGY_EXPONENT: f64 = 0.633;
const ITERATIVE_ENERGY_EXPONENT: f64 = 19.0 / 30.0;

pub fn rock_density_influence(rho: f64) -> CalcResult<f64> {
    checked("CALC.RDI", 0.025 * rho - 50.0)
}

pub fn hardness_factor(young_modulus: f64, sigma_c: f64) -> CalcResult<f64> {
    let value = if young_modulus < HARDNESS_MODULUS_THRESHOLD {
        young_modulus / 3.0
    } else {
        sigma_c / 5.0
    };
    checked("CALC.HF", value)
}

pub fn rock_factor(rmd: f64, rdi: f64, hf: f64) -> CalcResult<f64> {
    checked("CALC.A", 0.06 * (rmd + rdi + hf))
}

pub fn relative_weight_strength(energy_vv: f64) -> CalcResult<f64> {
    checked("CALC.S_ANFO", energy_vv / ANFO_ENERGY * 100.0)
}

pub fn specific_charge(
    charge_mass: f64,
    bench_height: f64,
    spacing: f64,
    burden: f64,
) -> CalcResult<f64> {
    if bench_height == 0.0 || spacing == 0.0 || burden == 0.0 {
        return Err(CalcError::domain(
            "CALC.Q_ZERO_DENOMINATOR",
            format!(
                "H, S and B must be non-zero (H={bench_height}, S={spacing}, B={burden})"
            ),
        ));
    }
    checked(
        "CALC.Q",
        charge_mass / (bench_height * spacing * burden),
    )
}

/// Spacing and burden are given in metres, the block size and result in mm.
pub fn max_fragment_size(in_situ_block_size: f64, spacing: f64, burden: f64) -> CalcResult<f64> {
    checked(
        "CALC.X_MAX",
        in_situ_block_size
            .min(spacing * METRES_TO_MM)
            .min(burden * METRES_TO_MM),
    )
}

pub fn g_factor(n: f64) -> CalcResult<f64> {
    if !n.is_finite() || n <= 0.0 {
        return Err(CalcError::domain(
            "CALC.G_N_DOMAIN",
            format!("uniformity index n must be positive and finite (n={n})"),
        ));
    }
    let gamma_value = gamma(1.0 + 1.0 / n).ok_or_else(|| {
        CalcError::domain(
            "CALC.G_N_GAMMA",
            format!("Γ(1 + 1/n) is undefined for n={n}"),
        )
    })?;
    checked("CALC.G_N", LN_2.powf(1.0 / n) / gamma_value)
}

pub fn curve_shape(x_max: f64, x_50: f64, n: f64) -> CalcResult<f64> {
    if x_50.is_nan() || x_50 <= 0.0 {
        return Err(CalcError::domain(
            "CALC.B_DOMAIN",
            format!("x_50 must be positive (x_50={x_50})"),
        ));
    }
    let log_span = ln_ratio(x_max, x_50).ok_or_else(|| {
        CalcError::domain(
            "CALC.B_DOMAIN",
            format!("ln(x_max/x_50) is undefined (x_max={x_max}, x_50={x_50})"),
        )
    })?;
    checked("CALC.B", 2.0 * LN_2 * log_span * n)
}

/// Blast geometry feeding the uniformity index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UniformityInputs {
    pub x_max: f64,
    pub spacing: f64,
    pub burden: f64,
    pub hole_diameter_mm: f64,
    pub drilling_deviation: f64,
    pub bottom_charge_length: f64,
    pub column_charge_length: f64,
    pub total_charge_length: f64,
    pub bench_height: f64,
}

impl UniformityInputs {
    pub fn gather(
        parameters: &impl ParameterSource,
        results: &CalculationResults,
    ) -> CalcResult<Self> {
        Ok(Self {
            x_max: results.require(ResultKey::XMax)?,
            spacing: parameters.numeric(names::SPACING)?,
            burden: parameters.numeric(names::BURDEN)?,
            hole_diameter_mm: parameters.numeric(names::HOLE_DIAMETER)?,
            drilling_deviation: parameters.numeric(names::DRILLING_DEVIATION)?,
            bottom_charge_length: parameters.numeric(names::BOTTOM_CHARGE_LENGTH)?,
            column_charge_length: parameters.numeric(names::COLUMN_CHARGE_LENGTH)?,
            total_charge_length: parameters.numeric(names::TOTAL_CHARGE_LENGTH)?,
            bench_height: parameters.numeric(names::BENCH_HEIGHT)?,
        })
    }

    /// Uniformity index n for a given median size.
    pub fn uniformity(&self, x_50: f64) -> CalcResult<f64> {
        if self.bench_height == 0.0 || self.burden == 0.0 || self.total_charge_length == 0.0 {
            return Err(CalcError::domain(
                "CALC.N_ZERO_DENOMINATOR",
                format!(
                    "H, B and L_tot must be non-zero (H={}, B={}, L_tot={})",
                    self.bench_height, self.burden, self.total_charge_length
                ),
            ));
        }
        if self.hole_diameter_mm == 0.0 {
            return Err(CalcError::domain(
                "CALC.N_ZERO_DENOMINATOR",
                "hole diameter D_h must be non-zero",
            ));
        }
        let log_span = ln_ratio(self.x_max, x_50).ok_or_else(|| {
            CalcError::domain(
                "CALC.N_LOG_DOMAIN",
                format!(
                    "ln(x_max/x_50) is undefined (x_max={}, x_50={})",
                    self.x_max, x_50
                ),
            )
        })?;

        let hole_diameter = self.hole_diameter_mm / METRES_TO_MM;
        let spacing_ratio = (1.0 + self.spacing / self.burden) / 2.0;
        if spacing_ratio < 0.0 {
            return Err(CalcError::domain(
                "CALC.N_SQRT_DOMAIN",
                format!("(1 + S/B)/2 is negative ({spacing_ratio})"),
            ));
        }
        let charge_ratio = (self.bottom_charge_length - self.column_charge_length)
            / self.total_charge_length
            + 0.1;
        if charge_ratio < 0.0 {
            return Err(CalcError::domain(
                "CALC.N_POWER_DOMAIN",
                format!("(L_b - L_c)/L_tot + 0.1 is negative ({charge_ratio})"),
            ));
        }

        let value = 2.0
            * LN_2
            * log_span
            * (2.2 - 0.014 * (self.burden / hole_diameter))
            * (1.0 - self.drilling_deviation / self.burden)
            * spacing_ratio.sqrt()
            * charge_ratio.powf(0.1)
            * (self.total_charge_length / self.bench_height);
        checked("CALC.N", value)
    }
}

/// Rock and explosive terms of the Kuznetsov median-size equation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KuznetsovInputs {
    pub rock_factor: f64,
    pub charge_mass: f64,
    pub s_anfo: f64,
    pub specific_charge: f64,
}

impl KuznetsovInputs {
    pub fn gather(
        parameters: &impl ParameterSource,
        results: &CalculationResults,
    ) -> CalcResult<Self> {
        let inputs = Self {
            rock_factor: results.require(ResultKey::RockFactor)?,
            charge_mass: parameters.numeric(names::CHARGE_MASS)?,
            s_anfo: results.require(ResultKey::SAnfo)?,
            specific_charge: results.require(ResultKey::SpecificCharge)?,
        };
        inputs.validate()?;
        Ok(inputs)
    }

    fn validate(&self) -> CalcResult<()> {
        let q_invalid = self.specific_charge.is_nan() || self.specific_charge <= 0.0;
        let s_anfo_invalid = self.s_anfo.is_nan() || self.s_anfo <= 0.0;
        if q_invalid || s_anfo_invalid {
            return Err(CalcError::domain(
                "CALC.X50_DOMAIN",
                format!(
                    "q and s_ANFO must be positive (q={}, s_ANFO={})",
                    self.specific_charge, self.s_anfo
                ),
            ));
        }
        if self.charge_mass.is_nan() || self.charge_mass < 0.0 {
            return Err(CalcError::domain(
                "CALC.X50_DOMAIN",
                format!("charge mass Q must not be negative (Q={})", self.charge_mass),
            ));
        }
        Ok(())
    }

    fn base(&self, energy_exponent: f64) -> f64 {
        self.rock_factor
            * self.charge_mass.powf(1.0 / 6.0)
            * (115.0 / self.s_anfo).powf(energy_exponent)
            / self.specific_charge.powf(0.8)
    }

    /// `g_n * A * Q^(1/6) * (115/s_ANFO)^(19/30) / q^0.8`
    pub fn median_with_g_factor(&self, g_n: f64) -> CalcResult<f64> {
        self.validate()?;
        checked("CALC.X50", g_n * self.base(ITERATIVE_ENERGY_EXPONENT))
    }

    /// `A * Q^(1/6) * (115/s_ANFO)^0.633 / q^0.8`
    pub fn median_direct(&self) -> CalcResult<f64> {
        self.validate()?;
        checked("CALC.X50", self.base(DIRECT_ENERGY_EXPONENT))
    }
}

fn checked(placeholder: &'static str, value: f64) -> CalcResult<f64> {
    finite(value).ok_or_else(|| {
        CalcError::domain(
            placeholder,
            format!("result is not a finite number ({value})"),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::{
        KuznetsovInputs, UniformityInputs, curve_shape, g_factor, hardness_factor,
        max_fragment_size, relative_weight_strength, rock_density_influence, rock_factor,
        specific_charge,
    };
    use crate::domain::CalcErrorCategory;
    use std::f64::consts::LN_2;

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

    #[test]
    fn rock_terms_follow_closed_forms() {
        for rho in [1000.0, 2000.0, 2650.0, 4800.0] {
            assert_eq!(rock_density_influence(rho), Ok(0.025 * rho - 50.0));
        }
        assert_eq!(hardness_factor(30.0, 150.0), Ok(10.0));
        assert_eq!(hardness_factor(49.999, 150.0), Ok(49.999 / 3.0));
        assert_eq!(hardness_factor(50.0, 150.0), Ok(30.0));
        assert_eq!(rock_factor(50.0, 17.5, 10.0), Ok(0.06 * 77.5));
        assert_eq!(relative_weight_strength(4.2), Ok(100.0));
    }

    #[test]
    fn specific_charge_rejects_zero_geometry() {
        assert_eq!(specific_charge(300.0, 15.0, 5.0, 4.0), Ok(1.0));
        for (h, s, b) in [(0.0, 5.0, 4.0), (15.0, 0.0, 4.0), (15.0, 5.0, 0.0)] {
            let error = specific_charge(300.0, h, s, b).expect_err("zero denominator");
            assert_eq!(error.category(), CalcErrorCategory::DomainError);
        }
    }

    #[test]
    fn max_fragment_size_converts_pattern_to_millimetres() {
        assert_eq!(max_fragment_size(1500.0, 5.0, 4.0), Ok(1500.0));
        assert_eq!(max_fragment_size(6000.0, 5.0, 4.0), Ok(4000.0));
        assert_eq!(max_fragment_size(6000.0, 3.0, 4.0), Ok(3000.0));
    }

    #[test]
    fn uniformity_matches_expanded_expression() {
        let inputs = geometry();
        let n = inputs.uniformity(300.0).expect("valid geometry");
        let expected = 2.0
            * LN_2
            * (1500.0_f64 / 300.0).ln()
            * (2.2 - 0.014 * (4.0 / 0.115))
            * (1.0 - 0.5 / 4.0)
            * ((1.0 + 5.0 / 4.0) / 2.0_f64).sqrt()
            * ((10.0 - 2.0) / 12.0 + 0.1_f64).powf(0.1)
            * (12.0 / 15.0);
        assert!((n - expected).abs() < 1.0e-12);
    }

    #[test]
    fn uniformity_reports_domain_errors() {
        let mut inputs = geometry();
        inputs.total_charge_length = 0.0;
        assert_eq!(
            inputs.uniformity(300.0).expect_err("zero L_tot").placeholder(),
            "CALC.N_ZERO_DENOMINATOR"
        );

        let inputs = geometry();
        assert_eq!(
            inputs.uniformity(0.0).expect_err("x_50 = 0").placeholder(),
            "CALC.N_LOG_DOMAIN"
        );

        let mut inputs = geometry();
        inputs.bottom_charge_length = 1.0;
        inputs.column_charge_length = 10.0;
        assert_eq!(
            inputs.uniformity(300.0).expect_err("negative power base").placeholder(),
            "CALC.N_POWER_DOMAIN"
        );
    }

    #[test]
    fn g_factor_is_near_one_for_typical_uniformity() {
        let g = g_factor(1.0).expect("n = 1");
        assert!((g - LN_2).abs() < 1.0e-9);
        let g = g_factor(3.5).expect("n = 3.5");
        assert!(g > 0.9 && g < 1.1, "g(3.5) = {g}");
        assert_eq!(
            g_factor(0.0).expect_err("n = 0").category(),
            CalcErrorCategory::DomainError
        );
        assert!(g_factor(-2.0).is_err());
    }

    #[test]
    fn median_formulas_are_distinct() {
        let inputs = KuznetsovInputs {
            rock_factor: 5.0,
            charge_mass: 64.0,
            s_anfo: 115.0,
            specific_charge: 1.0,
        };
        let direct = inputs.median_direct().expect("valid");
        let weighted = inputs.median_with_g_factor(0.5).expect("valid");
        assert!((direct - 10.0).abs() < 1.0e-12);
        assert!((weighted - 5.0).abs() < 1.0e-12);

        let invalid = KuznetsovInputs {
            specific_charge: 0.0,
            ..inputs
        };
        assert_eq!(
            invalid.median_direct().expect_err("q = 0").placeholder(),
            "CALC.X50_DOMAIN"
        );
    }

    #[test]
    fn negative_charge_mass_is_outside_median_domain() {
        let inputs = KuznetsovInputs {
            rock_factor: 5.0,
            charge_mass: -1.0,
            s_anfo: 115.0,
            specific_charge: 1.0,
        };
        let error = inputs.median_direct().expect_err("Q < 0");
        assert_eq!(error.category(), CalcErrorCategory::DomainError);
        assert_eq!(error.placeholder(), "CALC.X50_DOMAIN");
        assert_eq!(
            inputs
                .median_with_g_factor(1.0)
                .expect_err("Q < 0")
                .placeholder(),
            "CALC.X50_DOMAIN"
        );

        let nan_s_anfo = KuznetsovInputs {
            charge_mass: 64.0,
            s_anfo: f64::NAN,
            ..inputs
        };
        assert!(nan_s_anfo.median_direct().is_err());
    }

    #[test]
    fn curve_shape_requires_positive_median() {
        let b = curve_shape(1000.0, 250.0, 2.0).expect("valid");
        assert!((b - 2.0 * LN_2 * 4.0_f64.ln() * 2.0).abs() < 1.0e-12);
        assert!(curve_shape(1000.0, 0.0, 2.0).is_err());
        assert!(curve_shape(0.0, 10.0, 2.0).is_err());
        assert!(curve_shape(1000.0, f64::NAN, 2.0).is_err());
        assert!(g_factor(f64::NAN).is_err());
    }
}
