//! One prediction run end to end, the way the command line drives it:
//! request validation, sampling, V8 pool truncation, self-checking and
//! JSON export.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::runtime::{Host, Predictor, Runtime, SemanticVersion};
use crate::solver::SolverConfig;

pub const DEFAULT_PREDICTIONS: usize = 10;

const ACTUAL_UNAVAILABLE: &str = "You'll need to get this yourself via the same way you generated the sequence";

#[derive(Debug, Clone)]
pub struct PredictionRequest {
    pub runtime: Runtime,
    /// Sampled from the host when absent.
    pub sequence: Option<Vec<f64>>,
    pub predictions: usize,
    /// Node only: target this version rather than the host's.
    pub engine_version: Option<SemanticVersion>,
    pub export: Option<PathBuf>,
    pub force: bool,
    pub solver: SolverConfig,
}

impl PredictionRequest {
    pub fn new(runtime: Runtime) -> Self {
        PredictionRequest {
            runtime,
            sequence: None,
            predictions: DEFAULT_PREDICTIONS,
            engine_version: None,
            export: None,
            force: false,
            solver: SolverConfig::default(),
        }
    }
}

/// What the engine actually produced after the observed sequence.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Actual {
    Values(Vec<f64>),
    /// We didn't sample the sequence, so we can't sample what follows it.
    Unavailable(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionReport {
    pub sequence: Vec<f64>,
    pub predictions: Vec<f64>,
    pub actual: Actual,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_correct: Option<bool>,
    #[serde(skip)]
    pub warnings: Vec<String>,
    #[serde(skip)]
    pub info: Vec<String>,
}

/// Run `request`, sampling from (and checking against) `host` when no
/// sequence was given.
pub fn run(request: &PredictionRequest, host: &mut dyn Host) -> Result<PredictionReport> {
    let runtime = request.runtime;

    if let (None, Some(requested)) = (&request.sequence, request.engine_version) {
        if runtime == Runtime::Node
            && host.runtime() == Some(Runtime::Node)
            && host.engine_version().map(|v| v.major) != Some(requested.major)
        {
            return Err(Error::VersionMismatch {
                requested,
                actual: host.engine_version(),
            });
        }
    }

    let sampled = request.sequence.is_none();
    let mut predictor =
        Predictor::for_runtime(runtime, request.sequence.clone(), host)?.with_solver_config(request.solver);
    if let Some(version) = request.engine_version {
        if predictor.engine_version().map(|v| v.major) != Some(version.major) {
            debug!(%version, "overriding engine version");
            predictor.set_engine_version(version)?;
        }
    }

    let mut warnings = Vec::new();
    let mut count = request.predictions;
    if let Some(remaining) = predictor.remaining() {
        if count > remaining {
            count = remaining;
            warnings.push(format!(
                "Exceeded max predictions! For a sequence length of {}, at most {} predictions fit in one random number pool. Truncated number of predictions to {}.",
                predictor.sequence().len(),
                remaining,
                remaining
            ));
        }
    }

    let predictions = predictor.predict_many(count)?;

    let (actual, is_correct) = if sampled {
        let actual = host.sample(count);
        let is_correct = actual == predictions;
        (Actual::Values(actual), Some(is_correct))
    } else {
        (Actual::Unavailable(ACTUAL_UNAVAILABLE.to_string()), None)
    };

    let mut report = PredictionReport {
        sequence: predictor.sequence().to_vec(),
        predictions,
        actual,
        is_correct,
        warnings,
        info: Vec::new(),
    };

    if let Some(path) = &request.export {
        export(&mut report, path, request.force);
    }
    Ok(report)
}

/// Write `report` to `path`. Failures become report warnings rather than
/// errors, so predictions are still shown.
pub fn export(report: &mut PredictionReport, path: &Path, force: bool) {
    match write_export(report, path, force) {
        Ok(path) => report.info.push(format!("Exported results to '{}'", path.display())),
        Err(e) => report.warnings.push(e.to_string()),
    }
}

fn write_export(report: &PredictionReport, path: &Path, force: bool) -> Result<PathBuf> {
    let path = std::env::current_dir()?.join(path);
    let dir = path
        .parent()
        .ok_or_else(|| Error::Export(format!("export path has no parent directory: {}", path.display())))?;

    if path.exists() && !path.is_file() {
        return Err(Error::Export(format!("export path must be to a file: {}", path.display())));
    }
    if path.extension().map_or(true, |ext| ext != "json") {
        return Err(Error::Export(format!("export path must be to a .json file: {}", path.display())));
    }
    if path.exists() && !force {
        return Err(Error::Export(
            "export path already exists and '--force' was not used, use '--force' to overwrite existing files".to_string(),
        ));
    }
    if !dir.exists() {
        if !force {
            return Err(Error::Export(
                "one or more directories do not exist in export path and '--force' was not used, use '--force' to create the full path".to_string(),
            ));
        }
        fs::create_dir_all(dir)?;
    }

    let json = serde_json::to_string_pretty(report)?;
    fs::write(&path, json)?;
    info!(path = %path.display(), "exported results");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::SimulatedHost;
    use crate::runtime::{NativeHost, V8_POOL_SIZE};

    const FIREFOX_SEQUENCE: [f64; 4] = [0.1321263101773572, 0.03366887439746058, 0.032596957696410134, 0.9986575482138969];
    const NODE_22_SEQUENCE: [f64; 4] = [0.6741138824350359, 0.3952693448013418, 0.2364392230042982, 0.19928567609774994];

    fn firefox_report() -> PredictionReport {
        let request = PredictionRequest {
            sequence: Some(FIREFOX_SEQUENCE.to_vec()),
            predictions: 3,
            ..PredictionRequest::new(Runtime::Firefox)
        };
        run(&request, &mut NativeHost).unwrap()
    }

    #[test]
    fn test_given_sequence_cannot_be_checked() {
        let report = firefox_report();
        assert_eq!(report.predictions, [0.8479779907956815, 0.13963871472821332, 0.25068024611907636]);
        assert_eq!(report.actual, Actual::Unavailable(ACTUAL_UNAVAILABLE.to_string()));
        assert_eq!(report.is_correct, None);

        let json: serde_json::Value = serde_json::to_value(&report).unwrap();
        assert!(json.get("isCorrect").is_none());
        assert!(json.get("warnings").is_none());
        assert_eq!(json["sequence"].as_array().map(Vec::len), Some(4));
    }

    #[test]
    fn test_sampled_sequence_is_checked() {
        let mut host = SimulatedHost::seeded(Runtime::Firefox, None, 5);
        let report = run(&PredictionRequest::new(Runtime::Firefox), &mut host).unwrap();
        assert_eq!(report.sequence.len(), 4);
        assert_eq!(report.predictions.len(), DEFAULT_PREDICTIONS);
        assert_eq!(report.is_correct, Some(true));
        assert_eq!(report.actual, Actual::Values(report.predictions.clone()));
    }

    #[test]
    fn test_missing_sequence_needs_matching_host() {
        let result = run(&PredictionRequest::new(Runtime::Chrome), &mut NativeHost);
        assert!(matches!(result, Err(Error::EnvironmentMismatch { expected: Runtime::Chrome, actual: None })));

        let mut host = SimulatedHost::seeded(Runtime::Safari, None, 1);
        let result = run(&PredictionRequest::new(Runtime::Bun), &mut host);
        assert!(matches!(
            result,
            Err(Error::EnvironmentMismatch {
                expected: Runtime::Bun,
                actual: Some(Runtime::Safari)
            })
        ));
    }

    #[test]
    fn test_version_override_without_sequence_needs_node_host() {
        let request = PredictionRequest {
            engine_version: Some(SemanticVersion::new(22, 0, 0)),
            ..PredictionRequest::new(Runtime::Node)
        };
        assert!(matches!(
            run(&request, &mut NativeHost),
            Err(Error::EnvironmentMismatch {
                expected: Runtime::Node,
                actual: None
            })
        ));
    }

    #[test]
    fn test_v8_predictions_truncated_to_pool() {
        let mut host = SimulatedHost::seeded(Runtime::V8, None, 64);
        let request = PredictionRequest {
            predictions: 70,
            ..PredictionRequest::new(Runtime::V8)
        };
        let report = run(&request, &mut host).unwrap();
        assert_eq!(report.predictions.len(), V8_POOL_SIZE - 4);
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.is_correct, Some(true));
    }

    #[test]
    fn test_v8_sequence_filling_pool_is_rejected() {
        let request = PredictionRequest {
            sequence: Some(vec![0.5; V8_POOL_SIZE]),
            ..PredictionRequest::new(Runtime::Node)
        };
        assert!(matches!(
            run(&request, &mut NativeHost),
            Err(Error::SequenceTooLarge { pool: 64, actual: 64 })
        ));
    }

    #[test]
    fn test_node_version_override() {
        let request = PredictionRequest {
            sequence: Some(NODE_22_SEQUENCE.to_vec()),
            predictions: 2,
            engine_version: Some(SemanticVersion::new(22, 0, 0)),
            ..PredictionRequest::new(Runtime::Node)
        };
        let report = run(&request, &mut NativeHost).unwrap();
        assert_eq!(report.predictions, [0.42090241809523987, 0.602480621528513]);
    }

    #[test]
    fn test_node_version_override_needs_sequence_on_other_version() {
        let mut host = SimulatedHost::seeded(Runtime::Node, Some(SemanticVersion::new(24, 0, 0)), 8);
        let request = PredictionRequest {
            engine_version: Some(SemanticVersion::new(22, 0, 0)),
            ..PredictionRequest::new(Runtime::Node)
        };
        assert!(matches!(run(&request, &mut host), Err(Error::VersionMismatch { .. })));

        let request = PredictionRequest {
            engine_version: Some(SemanticVersion::new(24, 3, 0)),
            ..PredictionRequest::new(Runtime::Node)
        };
        assert_eq!(run(&request, &mut host).unwrap().is_correct, Some(true));
    }

    #[test]
    fn test_export_writes_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.json");
        let mut report = firefox_report();
        export(&mut report, &path, false);

        assert!(report.warnings.is_empty(), "{:?}", report.warnings);
        assert_eq!(report.info.len(), 1);
        let written: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["predictions"].as_array().map(Vec::len), Some(3));
        assert!(written["actual"].is_string());
        assert!(written.get("isCorrect").is_none());
    }

    #[test]
    fn test_export_refuses_to_overwrite_without_force() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.json");
        fs::write(&path, "keep").unwrap();

        let mut report = firefox_report();
        export(&mut report, &path, false);
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(fs::read_to_string(&path).unwrap(), "keep");

        export(&mut report, &path, true);
        assert_ne!(fs::read_to_string(&path).unwrap(), "keep");
    }

    #[test]
    fn test_export_creates_directories_only_with_force() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("deeper").join("results.json");

        let mut report = firefox_report();
        export(&mut report, &path, false);
        assert_eq!(report.warnings.len(), 1);
        assert!(!path.exists());

        export(&mut report, &path, true);
        assert!(path.is_file());
    }

    #[test]
    fn test_export_requires_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut report = firefox_report();
        export(&mut report, &dir.path().join("results.txt"), true);
        export(&mut report, dir.path(), true);
        assert_eq!(report.warnings.len(), 2);
        assert!(report.info.is_empty());
    }
}
