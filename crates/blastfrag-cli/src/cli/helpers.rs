use super::CliError;
use super::dispatch::{parse_axis_kind, parse_override};
use anyhow::Context;
use blastfrag_core::domain::CalcError;
use blastfrag_core::params::{
    DEFAULT_PROJECT_CONFIG, ParameterStore, ProjectConfig, load_project_config,
    parse_project_config,
};
use blastfrag_core::reference::{AxisConfig, AxisKind};
use blastfrag_core::serialization::write_text_artifact;
use std::path::{Path, PathBuf};

/// Options shared by every subcommand that reads a project configuration.
#[derive(clap::Args, Debug, Default)]
pub(super) struct ProjectFlags {
    /// Project configuration JSON (defaults to the built-in configuration)
    #[arg(long)]
    pub(super) config: Option<PathBuf>,

    /// Override a parameter value, e.g. --set rho=2650 (repeatable)
    #[arg(long = "set", value_name = "NAME=VALUE")]
    pub(super) overrides: Vec<String>,
}

#[derive(clap::Args, Debug, Default)]
pub(super) struct AxisFlags {
    /// Size axis: sieve, log or linear
    #[arg(long, value_parser = parse_axis_kind)]
    pub(super) axis: Option<AxisKind>,

    /// Number of points on a logarithmic axis
    #[arg(long)]
    pub(super) points: Option<usize>,

    /// Step of a linear axis, mm
    #[arg(long, allow_negative_numbers = true)]
    pub(super) step: Option<f64>,
}

impl AxisFlags {
    pub(super) fn apply(&self, mut config: AxisConfig) -> AxisConfig {
        if let Some(kind) = self.axis {
            config.kind = kind;
        }
        if let Some(points) = self.points {
            config.points = points;
        }
        if let Some(step) = self.step {
            config.step = step;
        }
        config
    }
}

#[derive(Debug)]
pub(super) struct LoadedProject {
    pub(super) config: ProjectConfig,
    pub(super) parameters: ParameterStore,
}

pub(super) fn load_project(flags: &ProjectFlags) -> Result<LoadedProject, CliError> {
    let config = match &flags.config {
        Some(path) => {
            let config = load_project_config(path).map_err(CalcError::from)?;
            tracing::debug!(path = %path.display(), "loaded project configuration");
            config
        }
        None => parse_project_config(DEFAULT_PROJECT_CONFIG)
            .context("built-in project configuration is invalid")?,
    };

    let mut parameters = ParameterStore::from_specs(config.parameters.clone())?;
    for token in &flags.overrides {
        let (name, value) = parse_override(token).map_err(CliError::Usage)?;
        tracing::debug!(parameter = %name, value = %value, "applying override");
        parameters.set(&name, value)?;
    }
    Ok(LoadedProject { config, parameters })
}

pub(super) fn write_output(path: &Path, content: &str, label: &str) -> Result<(), CliError> {
    write_text_artifact(path, content).map_err(|source| {
        CliError::Compute(CalcError::io_system(
            "IO.OUTPUT_WRITE",
            format!("failed to write {label} '{}': {}", path.display(), source),
        ))
    })?;
    println!("{label}: {}", path.display());
    Ok(())
}
