pub mod domain;
pub mod engine;
pub mod journal;
pub mod numerics;
pub mod params;
pub mod reconcile;
pub mod reference;
pub mod report;
pub mod serialization;
pub mod session;

pub use domain::{
    CalcError, CalcErrorCategory, CalcResult, CalculationResults, PsdCurve, PsdPoint, ResultKey,
    Severity, X50Mode,
};
pub use engine::{CalculationContext, EngineConfig, FragmentationEngine, RunSummary};
pub use journal::{EventJournal, EventLevel, EventSink, TracingSink};
pub use params::{ParameterStore, ParameterValue, ProjectConfig};
