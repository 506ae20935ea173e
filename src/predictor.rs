//! The engine predictor every runtime façade is built from.
//!
//! A predictor starts unsolved. The first [`EnginePredictor::predict_next`]
//! call runs recovery (with strategy rotation) once; every later call only
//! steps the cached concrete state and assembles a double.

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::recovery::{self, Traversal};
use crate::solver::SolverConfig;
use crate::strategy::{Strategy, StrategyList};
use crate::xorshift::StatePair;

/// Whether a prediction reads the state before or after stepping it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputOrder {
    /// Derive the double from the current state, then step (V8).
    DeriveThenStep,
    /// Step first, then derive (SpiderMonkey, JavaScriptCore).
    StepThenDerive,
}

/// How an engine family is driven: traversal during recovery, output order
/// during prediction, sample bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineProfile {
    pub traversal: Traversal,
    pub order: OutputOrder,
    /// Fewest observations that pin down a unique state.
    pub minimum_sequence: usize,
    /// Outputs available per seeding epoch, observed and predicted together.
    pub pool: Option<usize>,
}

/// Everything a predictor remembers between calls.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictorState {
    pub observed: Vec<f64>,
    /// [`StatePair::ZERO`] until solved.
    pub concrete: StatePair,
    pub active_strategy: usize,
    pub solved: bool,
}

#[derive(Debug, Clone)]
pub struct EnginePredictor {
    profile: EngineProfile,
    strategies: StrategyList,
    solver: SolverConfig,
    state: PredictorState,
    predicted: usize,
}

impl EnginePredictor {
    /// Validate `observed` against `profile` and build an unsolved predictor.
    pub fn new(observed: Vec<f64>, strategies: StrategyList, profile: EngineProfile) -> Result<Self> {
        if strategies.is_empty() {
            return Err(Error::NoStrategies);
        }
        if observed.len() < profile.minimum_sequence {
            return Err(Error::InsufficientSequenceLength {
                minimum: profile.minimum_sequence,
                actual: observed.len(),
            });
        }
        if let Some(pool) = profile.pool {
            if observed.len() >= pool {
                return Err(Error::SequenceTooLarge {
                    pool,
                    actual: observed.len(),
                });
            }
        }
        if let Some((index, &value)) = observed
            .iter()
            .enumerate()
            .find(|(_, value)| !(value.is_finite() && (0.0..1.0).contains(*value)))
        {
            return Err(Error::InvalidObservation { index, value });
        }

        Ok(EnginePredictor {
            profile,
            strategies,
            solver: SolverConfig::default(),
            state: PredictorState {
                observed,
                concrete: StatePair::ZERO,
                active_strategy: 0,
                solved: false,
            },
            predicted: 0,
        })
    }

    pub fn with_solver_config(mut self, solver: SolverConfig) -> Self {
        self.solver = solver;
        self
    }

    pub fn sequence(&self) -> &[f64] {
        &self.state.observed
    }

    pub fn state(&self) -> &PredictorState {
        &self.state
    }

    pub fn active_strategy(&self) -> &Strategy {
        &self.strategies[self.state.active_strategy]
    }

    pub fn is_solved(&self) -> bool {
        self.state.solved
    }

    /// Predictions left before the engine's output pool runs dry, if it has one.
    pub fn remaining(&self) -> Option<usize> {
        self.profile
            .pool
            .map(|pool| pool.saturating_sub(self.state.observed.len() + self.predicted))
    }

    /// Swap the strategy list. An already recovered state is kept and simply
    /// stepped with the new list's first strategy from here on; an unsolved
    /// predictor will solve against the new list.
    pub fn set_strategies(&mut self, strategies: StrategyList) -> Result<()> {
        if strategies.is_empty() {
            return Err(Error::NoStrategies);
        }
        self.strategies = strategies;
        self.state.active_strategy = 0;
        Ok(())
    }

    /// Recover state if that has not happened yet.
    pub fn solve(&mut self) -> Result<()> {
        if self.state.solved {
            return Ok(());
        }
        let recovered = recovery::recover_with_rotation(
            &self.state.observed,
            &self.strategies,
            self.profile.traversal,
            &self.solver,
        )?;
        self.state.concrete = recovered.state;
        self.state.active_strategy = recovered.strategy;
        self.state.solved = true;
        info!(strategy = self.active_strategy().name, "predictor primed");
        Ok(())
    }

    /// The next value the engine's `Math.random()` will return.
    pub fn predict_next(&mut self) -> Result<f64> {
        if let Some(pool) = self.profile.pool {
            if self.remaining() == Some(0) {
                return Err(Error::PoolExhausted {
                    pool,
                    observed: self.state.observed.len(),
                    predicted: self.predicted,
                });
            }
        }
        self.solve()?;

        let strategy = self.strategies[self.state.active_strategy];
        let next = match self.profile.order {
            OutputOrder::DeriveThenStep => {
                let next = strategy.to_double(&self.state.concrete);
                self.state.concrete = strategy.concrete_step(&self.state.concrete);
                next
            }
            OutputOrder::StepThenDerive => {
                self.state.concrete = strategy.concrete_step(&self.state.concrete);
                strategy.to_double(&self.state.concrete)
            }
        };
        self.predicted += 1;
        debug!(prediction = next, index = self.predicted, "predicted");
        Ok(next)
    }

    /// `count` predictions, all or nothing.
    pub fn predict_many(&mut self, count: usize) -> Result<Vec<f64>> {
        if let (Some(pool), Some(remaining)) = (self.profile.pool, self.remaining()) {
            if count > remaining {
                return Err(Error::PoolExhausted {
                    pool,
                    observed: self.state.observed.len(),
                    predicted: self.predicted + count,
                });
            }
        }
        (0..count).map(|_| self.predict_next()).collect()
    }
}
