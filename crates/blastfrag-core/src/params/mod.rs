mod config;

pub use config::{
    ConfigError, DEFAULT_PROJECT_CONFIG, ProjectConfig, load_project_config,
    parse_project_config,
};

use crate::domain::{CalcError, CalcResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

/// Configuration keys read by the engine and the reference generator.
pub mod names {
    pub const RHO: &str = "rho";
    pub const YOUNG_MODULUS: &str = "E";
    pub const SIGMA_C: &str = "sigma_c";
    pub const RMD: &str = "RMD";
    pub const ENERGY_VV: &str = "energy_vv";
    pub const CHARGE_MASS: &str = "Q";
    pub const BENCH_HEIGHT: &str = "H";
    pub const SPACING: &str = "S";
    pub const BURDEN: &str = "B";
    pub const IN_SITU_BLOCK_SIZE: &str = "in_situ_block_size";
    /// Hole diameter in millimetres.
    pub const HOLE_DIAMETER: &str = "D_h";
    pub const DRILLING_DEVIATION: &str = "SD";
    pub const BOTTOM_CHARGE_LENGTH: &str = "L_b";
    pub const COLUMN_CHARGE_LENGTH: &str = "L_c";
    pub const TOTAL_CHARGE_LENGTH: &str = "L_tot";

    pub const TARGET_X_MAX: &str = "target_x_max";
    pub const TARGET_X_50: &str = "target_x_50";
    pub const TARGET_B: &str = "target_b";
    pub const X_RANGE_MIN: &str = "x_range_min";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterKind {
    #[default]
    Float,
    Int,
    Str,
}

impl ParameterKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Float => "float",
            Self::Int => "int",
            Self::Str => "str",
        }
    }

    /// Whether `value` has the shape this kind declares.
    pub fn accepts(self, value: &ParameterValue) -> bool {
        match (self, value) {
            (Self::Float, ParameterValue::Number(_)) => true,
            (Self::Int, ParameterValue::Number(number)) => number.fract() == 0.0,
            (Self::Str, ParameterValue::Text(_)) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Number(f64),
    Text(String),
}

impl ParameterValue {
    /// Parses a user-supplied token: anything that reads as a float is numeric.
    pub fn parse(token: &str) -> Self {
        let trimmed = token.trim();
        match trimmed.parse::<f64>() {
            Ok(value) => Self::Number(value),
            Err(_) => Self::Text(trimmed.to_string()),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(value) if value.is_finite() => Some(*value),
            _ => None,
        }
    }
}

impl Display for ParameterValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(value) => write!(f, "{value}"),
            Self::Text(text) => write!(f, "'{text}'"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: ParameterKind,
    #[serde(default)]
    pub default_value: Option<ParameterValue>,
    #[serde(default)]
    pub min_value: Option<f64>,
    #[serde(default)]
    pub max_value: Option<f64>,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
}

impl ParameterSpec {
    pub fn float(name: impl Into<String>, default_value: f64) -> Self {
        Self {
            name: name.into(),
            kind: ParameterKind::Float,
            default_value: Some(ParameterValue::Number(default_value)),
            min_value: None,
            max_value: None,
            unit: String::new(),
            description: String::new(),
            category: String::new(),
        }
    }

    pub fn with_bounds(mut self, min_value: Option<f64>, max_value: Option<f64>) -> Self {
        self.min_value = min_value;
        self.max_value = max_value;
        self
    }

    fn check(&self, value: &ParameterValue) -> Option<BoundViolation> {
        let number = value.as_number()?;
        let below = self.min_value.is_some_and(|min| number < min);
        let above = self.max_value.is_some_and(|max| number > max);
        (below || above).then(|| BoundViolation {
            name: self.name.clone(),
            value: number,
            min_value: self.min_value,
            max_value: self.max_value,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoundViolation {
    pub name: String,
    pub value: f64,
    pub min_value: Option<f64>,
    pub max_value: Option<f64>,
}

impl Display for BoundViolation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let min = self
            .min_value
            .map_or_else(|| "-inf".to_string(), |value| value.to_string());
        let max = self
            .max_value
            .map_or_else(|| "+inf".to_string(), |value| value.to_string());
        write!(
            f,
            "parameter '{}' = {} is outside [{}, {}]",
            self.name, self.value, min, max
        )
    }
}

/// Read access to current parameter values by name.
pub trait ParameterSource {
    fn parameter(&self, name: &str) -> Option<&ParameterValue>;

    fn numeric(&self, name: &str) -> CalcResult<f64> {
        match self.parameter(name) {
            None => Err(CalcError::missing_input(
                "CALC.MISSING_PARAMETER",
                format!("parameter '{name}' is not set"),
            )),
            Some(value) => value.as_number().ok_or_else(|| {
                CalcError::invalid_type(
                    "CALC.NON_NUMERIC_PARAMETER",
                    format!("parameter '{name}' is not a finite number (got {value})"),
                )
            }),
        }
    }
}

impl ParameterSource for BTreeMap<String, ParameterValue> {
    fn parameter(&self, name: &str) -> Option<&ParameterValue> {
        self.get(name)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParameterStore {
    specs: Vec<ParameterSpec>,
    values: BTreeMap<String, ParameterValue>,
}

impl ParameterStore {
    pub fn from_specs(specs: Vec<ParameterSpec>) -> CalcResult<Self> {
        let mut values = BTreeMap::new();
        for (index, spec) in specs.iter().enumerate() {
            if spec.name.trim().is_empty() {
                return Err(CalcError::input_validation(
                    "INPUT.PARAMETER_NAME",
                    format!("parameter #{} has an empty name", index + 1),
                ));
            }
            if specs[..index].iter().any(|other| other.name == spec.name) {
                return Err(CalcError::input_validation(
                    "INPUT.DUPLICATE_PARAMETER",
                    format!("parameter '{}' is declared more than once", spec.name),
                ));
            }
            if let (Some(min), Some(max)) = (spec.min_value, spec.max_value)
                && min > max
            {
                return Err(CalcError::input_validation(
                    "INPUT.PARAMETER_BOUNDS",
                    format!(
                        "parameter '{}' has min_value {} greater than max_value {}",
                        spec.name, min, max
                    ),
                ));
            }
            if let Some(default_value) = &spec.default_value {
                if !spec.kind.accepts(default_value) {
                    return Err(CalcError::input_validation(
                        "INPUT.PARAMETER_TYPE",
                        format!(
                            "parameter '{}' is declared as {} but its default is {}",
                            spec.name,
                            spec.kind.as_str(),
                            default_value
                        ),
                    ));
                }
                values.insert(spec.name.clone(), default_value.clone());
            }
        }
        Ok(Self { specs, values })
    }

    /// Store built from the configuration embedded in the crate.
    pub fn with_defaults() -> CalcResult<Self> {
        let config = parse_project_config(DEFAULT_PROJECT_CONFIG)
            .map_err(|error| CalcError::internal("INTERNAL.DEFAULT_CONFIG", error.to_string()))?;
        Self::from_specs(config.parameters)
    }

    pub fn specs(&self) -> &[ParameterSpec] {
        &self.specs
    }

    pub fn spec(&self, name: &str) -> Option<&ParameterSpec> {
        self.specs.iter().find(|spec| spec.name == name)
    }

    pub fn value(&self, name: &str) -> Option<&ParameterValue> {
        self.values.get(name)
    }

    /// Overwrites a configured parameter. Out-of-range values are kept and
    /// surface through [`ParameterStore::violations`].
    pub fn set(&mut self, name: &str, value: ParameterValue) -> CalcResult<()> {
        if self.spec(name).is_none() {
            return Err(CalcError::input_validation(
                "INPUT.UNKNOWN_PARAMETER",
                format!("parameter '{name}' is not declared in the configuration"),
            ));
        }
        self.values.insert(name.to_string(), value);
        Ok(())
    }

    pub fn unset(&mut self, name: &str) -> Option<ParameterValue> {
        self.values.remove(name)
    }

    pub fn violations(&self) -> Vec<BoundViolation> {
        self.specs
            .iter()
            .filter_map(|spec| {
                self.values
                    .get(&spec.name)
                    .and_then(|value| spec.check(value))
            })
            .collect()
    }

    pub fn category_names(&self) -> Vec<&str> {
        let mut categories: Vec<&str> = Vec::new();
        for spec in &self.specs {
            if !categories.contains(&spec.category.as_str()) {
                categories.push(spec.category.as_str());
            }
        }
        categories
    }

    pub fn in_category<'a>(&'a self, category: &'a str) -> impl Iterator<Item = &'a ParameterSpec> {
        self.specs.iter().filter(move |spec| spec.category == category)
    }
}

impl ParameterSource for ParameterStore {
    fn parameter(&self, name: &str) -> Option<&ParameterValue> {
        self.value(name)
    }
}
