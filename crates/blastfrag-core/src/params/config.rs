//! Project configuration file: parameter declarations plus optional engine
//! and size-axis settings.

use super::ParameterSpec;
use crate::domain::CalcError;
use crate::engine::EngineConfig;
use crate::reference::AxisConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_PROJECT_CONFIG: &str = include_str!("../../config/default_parameters.json");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub parameters: Vec<ParameterSpec>,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub axis: AxisConfig,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read project configuration '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse project configuration '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl From<ConfigError> for CalcError {
    fn from(error: ConfigError) -> Self {
        match error {
            ConfigError::Read { .. } => CalcError::io_system("IO.CONFIG_READ", error.to_string()),
            ConfigError::Parse { .. } => {
                CalcError::input_validation("INPUT.CONFIG_PARSE", error.to_string())
            }
        }
    }
}

pub fn parse_project_config(source: &str) -> Result<ProjectConfig, serde_json::Error> {
    serde_json::from_str(source)
}

pub fn load_project_config(path: impl AsRef<Path>) -> Result<ProjectConfig, ConfigError> {
    let path = path.as_ref();
    let source = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_project_config(&source).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
