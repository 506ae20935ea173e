//! JavaScript runtimes and the predictor façade callers use.
//!
//! Every runtime maps onto one engine family, and every family is the same
//! [`EnginePredictor`] with a different strategy list and profile. Nothing
//! here knows how to solve; it only decides what to solve with.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use tracing::debug;

use crate::error::{Error, Result};
use crate::predictor::{EngineProfile, EnginePredictor, OutputOrder};
use crate::recovery::Traversal;
use crate::solver::SolverConfig;
use crate::strategy::{self, StrategyList};

/// Outputs V8 caches per refill; observed plus predicted values must fit in it.
pub const V8_POOL_SIZE: usize = 64;
/// Below this JavaScriptCore's constraint system is underdetermined.
pub const JAVASCRIPTCORE_MIN_SEQUENCE: usize = 6;
/// Three 52-bit observations are the fewest that cover 128 bits of state.
pub const MIN_SEQUENCE: usize = 3;
pub const DEFAULT_SEQUENCE_LENGTH: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineFamily {
    V8,
    JavaScriptCore,
    SpiderMonkey,
}

impl EngineFamily {
    pub fn profile(&self) -> EngineProfile {
        match self {
            EngineFamily::V8 => EngineProfile {
                traversal: Traversal::Reverse,
                order: OutputOrder::DeriveThenStep,
                minimum_sequence: MIN_SEQUENCE,
                pool: Some(V8_POOL_SIZE),
            },
            EngineFamily::JavaScriptCore => EngineProfile {
                traversal: Traversal::Forward,
                order: OutputOrder::StepThenDerive,
                minimum_sequence: JAVASCRIPTCORE_MIN_SEQUENCE,
                pool: None,
            },
            EngineFamily::SpiderMonkey => EngineProfile {
                traversal: Traversal::Forward,
                order: OutputOrder::StepThenDerive,
                minimum_sequence: MIN_SEQUENCE,
                pool: None,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Runtime {
    Node,
    Deno,
    Chrome,
    /// Standalone V8 (d8).
    V8,
    Safari,
    Bun,
    Firefox,
}

impl Runtime {
    pub const ALL: [Runtime; 7] = [
        Runtime::Node,
        Runtime::Deno,
        Runtime::Chrome,
        Runtime::V8,
        Runtime::Safari,
        Runtime::Bun,
        Runtime::Firefox,
    ];

    pub fn family(&self) -> EngineFamily {
        match self {
            Runtime::Node | Runtime::Deno | Runtime::Chrome | Runtime::V8 => EngineFamily::V8,
            Runtime::Safari | Runtime::Bun => EngineFamily::JavaScriptCore,
            Runtime::Firefox => EngineFamily::SpiderMonkey,
        }
    }

    /// How many values to draw when sampling a sequence ourselves.
    pub fn default_sequence_length(&self) -> usize {
        match self.family() {
            EngineFamily::JavaScriptCore => JAVASCRIPTCORE_MIN_SEQUENCE,
            _ => DEFAULT_SEQUENCE_LENGTH,
        }
    }

    /// Only Node pins its double assembly revision to a known version.
    pub fn supports_version_override(&self) -> bool {
        *self == Runtime::Node
    }

    /// The strategy list for this runtime. `version` only matters for Node,
    /// where `None` means the newest revision.
    pub fn strategies(&self, version: Option<SemanticVersion>) -> StrategyList {
        match self {
            Runtime::Node => strategy::node(version.unwrap_or(SemanticVersion::LATEST_NODE)),
            Runtime::Deno | Runtime::Chrome | Runtime::V8 => strategy::v8_desktop(),
            Runtime::Safari | Runtime::Bun => strategy::javascriptcore(),
            Runtime::Firefox => strategy::spidermonkey(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Runtime::Node => "node",
            Runtime::Deno => "deno",
            Runtime::Chrome => "chrome",
            Runtime::V8 => "v8",
            Runtime::Safari => "safari",
            Runtime::Bun => "bun",
            Runtime::Firefox => "firefox",
        }
    }
}

impl fmt::Display for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// `major.minor.patch` of the engine (for Node, the Node release).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SemanticVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl SemanticVersion {
    /// Assumed when Node's version is neither given nor detectable.
    pub const LATEST_NODE: SemanticVersion = SemanticVersion::new(24, 0, 0);

    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        SemanticVersion { major, minor, patch }
    }
}

impl FromStr for SemanticVersion {
    type Err = Error;

    /// Accepts `22`, `22.4`, `22.4.1`, optionally prefixed with `v`.
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidVersion(s.to_string());
        let trimmed = s.trim();
        let trimmed = trimmed.strip_prefix('v').unwrap_or(trimmed);

        let mut parts = [0u32; 3];
        let mut count = 0;
        for part in trimmed.split('.') {
            if count == parts.len() {
                return Err(invalid());
            }
            parts[count] = part.parse().map_err(|_| invalid())?;
            count += 1;
        }
        Ok(SemanticVersion::new(parts[0], parts[1], parts[2]))
    }
}

impl fmt::Display for SemanticVersion {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// What the predictor may ask of the process it runs in.
pub trait Host {
    /// The JavaScript runtime we are executing inside, if any.
    fn runtime(&self) -> Option<Runtime>;
    fn engine_version(&self) -> Option<SemanticVersion>;
    /// Draw `count` fresh `Math.random()` values. Only called when
    /// [`Host::runtime`] matches the predictor's runtime.
    fn sample(&mut self, count: usize) -> Vec<f64>;
}

/// A plain native process: no JavaScript engine to sample from.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeHost;

impl Host for NativeHost {
    fn runtime(&self) -> Option<Runtime> {
        None
    }

    fn engine_version(&self) -> Option<SemanticVersion> {
        None
    }

    fn sample(&mut self, _count: usize) -> Vec<f64> {
        Vec::new()
    }
}

/// A runtime-specific predictor.
#[derive(Debug, Clone)]
pub struct Predictor {
    runtime: Runtime,
    version: Option<SemanticVersion>,
    engine: EnginePredictor,
}

impl Predictor {
    /// Build a predictor for `runtime`. Without a `sequence`, one is sampled
    /// from `host`, which must be running that same runtime.
    pub fn for_runtime(runtime: Runtime, sequence: Option<Vec<f64>>, host: &mut dyn Host) -> Result<Self> {
        let version = match (runtime, host.runtime()) {
            (Runtime::Node, Some(Runtime::Node)) => host.engine_version(),
            _ => None,
        };

        let sequence = match sequence {
            Some(sequence) => sequence,
            None => {
                if host.runtime() != Some(runtime) {
                    return Err(Error::EnvironmentMismatch {
                        expected: runtime,
                        actual: host.runtime(),
                    });
                }
                host.sample(runtime.default_sequence_length())
            }
        };

        debug!(%runtime, samples = sequence.len(), ?version, "building predictor");
        let engine = EnginePredictor::new(sequence, runtime.strategies(version), runtime.family().profile())?;
        Ok(Predictor {
            runtime,
            version,
            engine,
        })
    }

    pub fn node(sequence: Vec<f64>) -> Result<Self> {
        Self::for_runtime(Runtime::Node, Some(sequence), &mut NativeHost)
    }

    pub fn deno(sequence: Vec<f64>) -> Result<Self> {
        Self::for_runtime(Runtime::Deno, Some(sequence), &mut NativeHost)
    }

    pub fn chrome(sequence: Vec<f64>) -> Result<Self> {
        Self::for_runtime(Runtime::Chrome, Some(sequence), &mut NativeHost)
    }

    pub fn v8(sequence: Vec<f64>) -> Result<Self> {
        Self::for_runtime(Runtime::V8, Some(sequence), &mut NativeHost)
    }

    pub fn safari(sequence: Vec<f64>) -> Result<Self> {
        Self::for_runtime(Runtime::Safari, Some(sequence), &mut NativeHost)
    }

    pub fn bun(sequence: Vec<f64>) -> Result<Self> {
        Self::for_runtime(Runtime::Bun, Some(sequence), &mut NativeHost)
    }

    pub fn firefox(sequence: Vec<f64>) -> Result<Self> {
        Self::for_runtime(Runtime::Firefox, Some(sequence), &mut NativeHost)
    }

    pub fn with_solver_config(mut self, config: SolverConfig) -> Self {
        self.engine = self.engine.with_solver_config(config);
        self
    }

    pub fn runtime(&self) -> Runtime {
        self.runtime
    }

    /// The engine version strategies were chosen for, when one applies.
    pub fn engine_version(&self) -> Option<SemanticVersion> {
        self.version
    }

    pub fn sequence(&self) -> &[f64] {
        self.engine.sequence()
    }

    pub fn engine(&self) -> &EnginePredictor {
        &self.engine
    }

    pub fn remaining(&self) -> Option<usize> {
        self.engine.remaining()
    }

    /// Re-target the predictor at another engine version. Only Node has
    /// versioned revisions.
    pub fn set_engine_version(&mut self, version: SemanticVersion) -> Result<()> {
        if !self.runtime.supports_version_override() {
            return Err(Error::VersionNotApplicable(self.runtime));
        }
        self.engine.set_strategies(self.runtime.strategies(Some(version)))?;
        self.version = Some(version);
        Ok(())
    }

    pub fn predict_next(&mut self) -> Result<f64> {
        self.engine.predict_next()
    }

    pub fn predict_many(&mut self, count: usize) -> Result<Vec<f64>> {
        self.engine.predict_many(count)
    }
}
