use crate::completion::{CompletionKind, CompletionRoute};
use crate::status::ProgressState;
use vax_types::DiseaseId;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("record belongs to disease {found}, engine is configured for {expected}")]
    DiseaseMismatch {
        expected: DiseaseId,
        found: DiseaseId,
    },
    #[error("no engine configured for disease {0}")]
    UnknownDisease(DiseaseId),
    #[error("disease {0} has no two-phase primary series")]
    PrimarySlotsUnsupported(DiseaseId),
    #[error("booster #{0} does not exist")]
    UnknownBooster(u32),
    #[error("illness episode #{0} does not exist")]
    UnknownIllness(usize),

    #[error(
        "illegal status transition: completion is locked as {locked:?}, \
         attempted {attempted:?}; reset the completion first"
    )]
    IllegalStatusTransition {
        locked: CompletionRoute,
        attempted: CompletionKind,
    },
    #[error("illegal progress transition from {from:?} to {to:?}")]
    IllegalProgressTransition {
        from: ProgressState,
        to: ProgressState,
    },

    #[error("policy error: {0}")]
    Policy(#[from] vax_policy::PolicyError),
    #[error("invalid policy file {}: {source}", path.display())]
    PolicyFile {
        path: std::path::PathBuf,
        source: vax_policy::PolicyError,
    },
    #[error("record schema mismatch: {0}")]
    RecordSchema(String),
    #[error("failed to serialize YAML: {0}")]
    YamlSerialization(serde_yaml::Error),
    #[error("failed to read file: {0}")]
    FileRead(std::io::Error),
    #[error("failed to write file: {0}")]
    FileWrite(std::io::Error),
    #[error("failed to build worker pool: {0}")]
    WorkerPool(rayon::ThreadPoolBuildError),
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;
