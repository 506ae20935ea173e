//! Thin adapter over the Z3 bit-vector solver.
//!
//! One session is one constraint system: two free 64-bit words for the
//! unknown origin state, a pile of equalities, a single `check`, and at most
//! one model read back as a concrete [`StatePair`]. Nothing is incremental.

use tracing::debug;
use z3::ast::{Bool, BV};
use z3::{Config, Context, SatResult, Solver};

use crate::error::{Error, Result};
use crate::xorshift::{StatePair, WORD_BITS};

/// Solver knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SolverConfig {
    /// Timeout in milliseconds (0 = no timeout). A timed out check reports
    /// `unknown`.
    pub timeout_ms: u64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        SolverConfig { timeout_ms: 0 }
    }
}

/// Outcome of a satisfiability check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// The origin state the model assigns.
    Sat(StatePair),
    Unsat,
    Unknown(String),
}

pub struct Session<'ctx> {
    context: &'ctx Context,
    solver: Solver<'ctx>,
    origin: StatePair<BV<'ctx>>,
}

impl<'ctx> Session<'ctx> {
    pub fn new(context: &'ctx Context) -> Self {
        let solver = Solver::new(context);

        // What we're solving for. Kept separately from whatever stepped
        // state the caller builds so the model can be read against it.
        let origin = StatePair::new(
            BV::new_const(context, "ss0", WORD_BITS),
            BV::new_const(context, "ss1", WORD_BITS),
        );

        Session {
            context,
            solver,
            origin,
        }
    }

    /// The unknown origin state.
    pub fn origin(&self) -> &StatePair<BV<'ctx>> {
        &self.origin
    }

    pub fn word(&self, value: u64) -> BV<'ctx> {
        BV::from_u64(self.context, value, WORD_BITS)
    }

    pub fn assert(&self, constraint: &Bool<'ctx>) {
        self.solver.assert(constraint);
    }

    pub fn check(&self) -> Result<Verdict> {
        match self.solver.check() {
            SatResult::Sat => {
                let model = self
                    .solver
                    .get_model()
                    .ok_or_else(|| Error::Solver("solver returned SAT but no model available".to_string()))?;

                let read = |word: &BV<'ctx>, name: &str| -> Result<u64> {
                    model
                        .eval(word, true)
                        .and_then(|value| value.as_u64())
                        .ok_or_else(|| Error::Solver(format!("could not evaluate {} from model", name)))
                };
                let state = StatePair::new(read(&self.origin.s0, "ss0")?, read(&self.origin.s1, "ss1")?);
                Ok(Verdict::Sat(state))
            }
            SatResult::Unsat => Ok(Verdict::Unsat),
            SatResult::Unknown => {
                let reason = self
                    .solver
                    .get_reason_unknown()
                    .unwrap_or_else(|| "no reason given".to_string());
                debug!(%reason, "solver returned unknown");
                Ok(Verdict::Unknown(reason))
            }
        }
    }
}

/// Run `f` against a fresh context and session built from `config`.
pub fn with_session<T>(config: &SolverConfig, f: impl FnOnce(&Session) -> Result<T>) -> Result<T> {
    let mut cfg = Config::new();
    if config.timeout_ms > 0 {
        cfg.set_timeout_msec(config.timeout_ms);
    }
    let context = Context::new(&cfg);
    let session = Session::new(&context);
    f(&session)
}
