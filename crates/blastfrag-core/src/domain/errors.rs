use std::error::Error;
use std::fmt::{Display, Formatter};

pub type CalcResult<T> = Result<T, CalcError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CalcErrorCategory {
    MissingInput,
    InvalidType,
    DomainError,
    ConvergenceNotReached,
    EmptyResult,
    InputValidation,
    IoSystem,
    Internal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Warning,
    Error,
}

impl Severity {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
        }
    }
}

impl CalcErrorCategory {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MissingInput => "MissingInput",
            Self::InvalidType => "InvalidType",
            Self::DomainError => "DomainError",
            Self::ConvergenceNotReached => "ConvergenceNotReached",
            Self::EmptyResult => "EmptyResult",
            Self::InputValidation => "InputValidation",
            Self::IoSystem => "IoSystem",
            Self::Internal => "Internal",
        }
    }

    /// Process exit code used when the error surfaces at the CLI boundary.
    pub const fn exit_code(self) -> i32 {
        match self {
            Self::ConvergenceNotReached => 0,
            Self::InputValidation => 2,
            Self::IoSystem => 3,
            Self::MissingInput
            | Self::InvalidType
            | Self::DomainError
            | Self::EmptyResult => 4,
            Self::Internal => 5,
        }
    }

    pub const fn severity(self) -> Severity {
        match self {
            Self::ConvergenceNotReached => Severity::Warning,
            _ => Severity::Error,
        }
    }

    pub const fn is_fatal(self) -> bool {
        matches!(
            self,
            Self::InputValidation | Self::IoSystem | Self::Internal
        )
    }
}

impl Display for CalcErrorCategory {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalcError {
    category: CalcErrorCategory,
    placeholder: &'static str,
    message: String,
}

impl CalcError {
    pub fn new(
        category: CalcErrorCategory,
        placeholder: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            category,
            placeholder,
            message: message.into(),
        }
    }

    pub fn missing_input(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(CalcErrorCategory::MissingInput, placeholder, message)
    }

    pub fn invalid_type(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(CalcErrorCategory::InvalidType, placeholder, message)
    }

    pub fn domain(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(CalcErrorCategory::DomainError, placeholder, message)
    }

    pub fn not_converged(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(
            CalcErrorCategory::ConvergenceNotReached,
            placeholder,
            message,
        )
    }

    pub fn empty_result(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(CalcErrorCategory::EmptyResult, placeholder, message)
    }

    pub fn input_validation(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(CalcErrorCategory::InputValidation, placeholder, message)
    }

    pub fn io_system(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(CalcErrorCategory::IoSystem, placeholder, message)
    }

    pub fn internal(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(CalcErrorCategory::Internal, placeholder, message)
    }

    pub const fn category(&self) -> CalcErrorCategory {
        self.category
    }

    pub const fn placeholder(&self) -> &'static str {
        self.placeholder
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn exit_code(&self) -> i32 {
        self.category.exit_code()
    }

    pub fn diagnostic_line(&self) -> String {
        format!(
            "{}: [{}] {}",
            self.category.severity().as_str(),
            self.placeholder,
            self.message
        )
    }

    pub fn fatal_exit_line(&self) -> Option<String> {
        self.category
            .is_fatal()
            .then(|| format!("FATAL EXIT CODE: {}", self.exit_code()))
    }
}

impl Display for CalcError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} [{}] {}",
            self.category.as_str(),
            self.placeholder,
            self.message
        )
    }
}

impl Error for CalcError {}

#[cfg(test)]
mod tests {
    use super::{CalcError, CalcErrorCategory, Severity};

    #[test]
    fn exit_mapping_is_stable() {
        let cases = [
            (CalcErrorCategory::ConvergenceNotReached, 0, Severity::Warning),
            (CalcErrorCategory::InputValidation, 2, Severity::Error),
            (CalcErrorCategory::IoSystem, 3, Severity::Error),
            (CalcErrorCategory::MissingInput, 4, Severity::Error),
            (CalcErrorCategory::InvalidType, 4, Severity::Error),
            (CalcErrorCategory::DomainError, 4, Severity::Error),
            (CalcErrorCategory::EmptyResult, 4, Severity::Error),
            (CalcErrorCategory::Internal, 5, Severity::Error),
        ];

        for (category, exit_code, severity) in cases {
            assert_eq!(category.exit_code(), exit_code, "{category}");
            assert_eq!(category.severity(), severity, "{category}");
        }
    }

    #[test]
    fn calculation_failures_are_not_fatal() {
        assert!(!CalcErrorCategory::MissingInput.is_fatal());
        assert!(!CalcErrorCategory::DomainError.is_fatal());
        assert!(!CalcErrorCategory::ConvergenceNotReached.is_fatal());
        assert!(CalcErrorCategory::IoSystem.is_fatal());
    }

    #[test]
    fn error_renders_diagnostic_lines() {
        let error = CalcError::domain("CALC.Q_ZERO_DENOMINATOR", "H, S and B must be non-zero");
        assert_eq!(
            error.diagnostic_line(),
            "ERROR: [CALC.Q_ZERO_DENOMINATOR] H, S and B must be non-zero"
        );
        assert_eq!(error.fatal_exit_line(), None);

        let warning = CalcError::not_converged("SOLVER.NOT_CONVERGED", "5 iterations");
        assert_eq!(
            warning.diagnostic_line(),
            "WARNING: [SOLVER.NOT_CONVERGED] 5 iterations"
        );

        let fatal = CalcError::input_validation("INPUT.CLI_USAGE", "bad flag");
        assert_eq!(
            fatal.fatal_exit_line().as_deref(),
            Some("FATAL EXIT CODE: 2")
        );
        assert_eq!(
            fatal.to_string(),
            "InputValidation [INPUT.CLI_USAGE] bad flag"
        );
    }
}
