use thiserror::Error;

use crate::runtime::{Runtime, SemanticVersion};

/// Everything that can go wrong between an observed sequence and a prediction.
#[derive(Debug, Error)]
pub enum Error {
    /// The constraint system was unsat (or the solver gave up) under one strategy.
    /// Strategy rotation treats this as "try the next one".
    #[error("cannot solve state with strategy `{strategy}`, unable to make accurate predictions")]
    NoSolution { strategy: &'static str },

    #[error("sequence length must be >= {minimum}: got {actual}")]
    InsufficientSequenceLength { minimum: usize, actual: usize },

    #[error("sequence too large! sequence length must be less than {pool}, got {actual}")]
    SequenceTooLarge { pool: usize, actual: usize },

    #[error("random number pool exhausted: {observed} observed + {predicted} predicted reached the pool size of {pool}")]
    PoolExhausted {
        pool: usize,
        observed: usize,
        predicted: usize,
    },

    #[error("expected {expected} runtime but running in {}, unable to auto-generate sequence, please provide one", host_name(.actual))]
    EnvironmentMismatch {
        expected: Runtime,
        actual: Option<Runtime>,
    },

    #[error("requested engine version {requested} but the host runs {}, unable to auto-generate sequence, please provide one", version_name(.actual))]
    VersionMismatch {
        requested: SemanticVersion,
        actual: Option<SemanticVersion>,
    },

    #[error("solver error: {0}")]
    Solver(String),

    #[error("observed value at index {index} is not a Math.random() output: {value}")]
    InvalidObservation { index: usize, value: f64 },

    #[error("{0} does not support engine version overrides")]
    VersionNotApplicable(Runtime),

    #[error("invalid engine version `{0}`")]
    InvalidVersion(String),

    #[error("predictor requires at least one solving strategy")]
    NoStrategies,

    #[error("export failed: {0}")]
    Export(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// `true` for the one failure strategy rotation is allowed to absorb.
    pub fn is_no_solution(&self) -> bool {
        matches!(self, Error::NoSolution { .. })
    }
}

fn host_name(runtime: &Option<Runtime>) -> String {
    match runtime {
        Some(runtime) => runtime.to_string(),
        None => "a native host".to_string(),
    }
}

fn version_name(version: &Option<SemanticVersion>) -> String {
    match version {
        Some(version) => version.to_string(),
        None => "an unknown version".to_string(),
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
