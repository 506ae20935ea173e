//! State recovery: observed doubles in, concrete generator state out.
//!
//! The unknown origin state is stepped symbolically once per observed value,
//! and after every step the strategy's codec pins the stepped state's
//! mantissa bits to the bits recovered from that value. A satisfying model
//! of the origin is the generator state.

use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::solver::{self, SolverConfig, Verdict};
use crate::strategy::Strategy;
use crate::xorshift::StatePair;

/// Order in which the observed sequence is fed to the solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Traversal {
    /// Outputs appear in generation order. The solved origin sits before the
    /// first observation, so concrete state is replayed past the sequence.
    Forward,
    /// Outputs appear in reverse generation order (V8's LIFO cache). The
    /// sequence is fed last-to-first and the solved origin is already the
    /// state behind the next unseen output.
    Reverse,
}

/// A state that survived recovery, and which strategy produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Recovered {
    /// Index into the strategy list that was tried.
    pub strategy: usize,
    pub state: StatePair,
}

/// Recover the state behind `observed` under a single strategy.
///
/// Returns [`Error::NoSolution`] when the constraint system is unsat or the
/// solver gives up; anything else the solver reports is a hard error.
pub fn recover(observed: &[f64], strategy: &Strategy, traversal: Traversal, config: &SolverConfig) -> Result<StatePair> {
    let verdict = solver::with_session(config, |session| {
        let mut symbolic = session.origin().clone();

        let mut constrain = |value: f64| {
            symbolic = strategy.symbolic_step(&symbolic);
            let mantissa = strategy.recover_mantissa(value);
            session.assert(&strategy.constrain_mantissa(mantissa, &symbolic));
        };
        match traversal {
            Traversal::Forward => observed.iter().copied().for_each(&mut constrain),
            Traversal::Reverse => observed.iter().rev().copied().for_each(&mut constrain),
        }

        session.check()
    })?;

    let origin = match verdict {
        Verdict::Sat(state) => state,
        Verdict::Unsat => {
            debug!(strategy = strategy.name, "unsat");
            return Err(Error::NoSolution { strategy: strategy.name });
        }
        Verdict::Unknown(reason) => {
            debug!(strategy = strategy.name, %reason, "unknown");
            return Err(Error::NoSolution { strategy: strategy.name });
        }
    };

    if origin.is_zero() {
        // The all-zero pair only ever explains an all-zero sequence; no
        // seeded generator can be in it.
        warn!(strategy = strategy.name, "solver produced the all-zero state");
        return Err(Error::NoSolution { strategy: strategy.name });
    }

    let state = match traversal {
        Traversal::Forward => {
            debug!(steps = observed.len(), "replaying past observed sequence");
            observed
                .iter()
                .fold(origin, |state, _| strategy.concrete_step(&state))
        }
        Traversal::Reverse => origin,
    };
    Ok(state)
}

/// Try each strategy in order until one recovers a state.
///
/// `NoSolution` moves on to the next strategy; any other error aborts the
/// rotation. If every strategy fails, the last `NoSolution` is returned.
pub fn recover_with_rotation(
    observed: &[f64],
    strategies: &[Strategy],
    traversal: Traversal,
    config: &SolverConfig,
) -> Result<Recovered> {
    rotate(strategies, |strategy| {
        debug!(strategy = strategy.name, samples = observed.len(), ?traversal, "attempting recovery");
        recover(observed, strategy, traversal, config)
    })
}

fn rotate(strategies: &[Strategy], mut attempt: impl FnMut(&Strategy) -> Result<StatePair>) -> Result<Recovered> {
    let mut last_no_solution = None;

    for (index, strategy) in strategies.iter().enumerate() {
        match attempt(strategy) {
            Ok(state) => {
                info!(strategy = strategy.name, "recovered generator state");
                return Ok(Recovered { strategy: index, state });
            }
            Err(e) if e.is_no_solution() => {
                if index + 1 < strategies.len() {
                    warn!(strategy = strategy.name, "no solution, rotating to next strategy");
                }
                last_no_solution = Some(e);
            }
            Err(e) => return Err(e),
        }
    }

    Err(last_no_solution.unwrap_or(Error::NoStrategies))
}
