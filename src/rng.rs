// Based on https://github.com/rust-random/rngs/blob/master/rand_xorshift/src/lib.rs, which is
//
// Copyright 2018 Developers of the Rand project.
//
// and licensed under the MIT license.

//! Simulated engines: xorshift128+ as a `rand_core` generator, and the three
//! `Math.random()` front ends built on it.

use core::fmt;

use rand_core::{impls, le, Error, RngCore, SeedableRng};
use tracing::trace;

use crate::runtime::{EngineFamily, Host, Runtime, SemanticVersion, V8_POOL_SIZE};
use crate::strategy::Strategy;
use crate::xorshift::{self, Shift, StatePair};

/// Substituted for an all-zero seed, which xorshift can never leave.
const NONZERO_SEED: StatePair = StatePair {
    s0: 0x9e37_79b9_7f4a_7c15,
    s1: 0x6a09_e667_f3bc_c909,
};

/// The xorshift128+ generator behind every mainstream `Math.random()`.
///
/// `next_u64` steps with logical shifts and returns `s0 + s1` of the new
/// state. Engine front ends read the state directly instead and apply their
/// own double assembly.
#[derive(Clone, PartialEq, Eq)]
pub struct XorShift128Plus {
    state: StatePair,
}

impl XorShift128Plus {
    /// A generator at `state`. The all-zero state is replaced with a fixed
    /// non-zero one.
    pub fn from_state(state: StatePair) -> Self {
        let state = if state.is_zero() { NONZERO_SEED } else { state };
        XorShift128Plus { state }
    }

    pub fn state(&self) -> StatePair {
        self.state
    }

    /// Equivalent to calling `next_u64()` `delta` times.
    #[inline]
    pub fn advance(&mut self, delta: u64) {
        for _ in 0..delta {
            self.step();
        }
    }

    /// Undo `delta` steps.
    pub fn retreat(&mut self, delta: u64) {
        for _ in 0..delta {
            self.state = xorshift::step_back(&self.state);
        }
    }

    #[inline]
    fn step(&mut self) {
        self.state = xorshift::step(&self.state, Shift::Logical);
    }
}

// Custom Debug implementation that does not expose the internal state
impl fmt::Debug for XorShift128Plus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "XorShift128Plus {{}}")
    }
}

impl RngCore for XorShift128Plus {
    #[inline]
    fn next_u32(&mut self) -> u32 {
        (self.next_u64() >> 32) as u32
    }

    #[inline]
    fn next_u64(&mut self) -> u64 {
        self.step();
        self.state.s0.wrapping_add(self.state.s1)
    }

    #[inline]
    fn fill_bytes(&mut self, dest: &mut [u8]) {
        impls::fill_bytes_via_next(self, dest)
    }

    #[inline]
    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

impl SeedableRng for XorShift128Plus {
    type Seed = [u8; 16];

    fn from_seed(seed: Self::Seed) -> Self {
        let mut words = [0u64; 2];
        le::read_u64_into(&seed, &mut words);
        XorShift128Plus::from_state(StatePair::new(words[0], words[1]))
    }
}

/// One engine's `Math.random()`: a generator, a revision's double assembly,
/// and for V8 the output cache.
#[derive(Debug, Clone)]
pub struct MathRandom {
    family: EngineFamily,
    strategy: Strategy,
    rng: XorShift128Plus,
    /// V8 only. Filled oldest first, handed out from the back.
    cache: Vec<f64>,
}

impl MathRandom {
    pub fn new(family: EngineFamily, strategy: Strategy, rng: XorShift128Plus) -> Self {
        MathRandom {
            family,
            strategy,
            rng,
            cache: Vec::with_capacity(V8_POOL_SIZE),
        }
    }

    pub fn strategy(&self) -> &Strategy {
        &self.strategy
    }

    pub fn next_double(&mut self) -> f64 {
        match self.family {
            EngineFamily::V8 => {
                if self.cache.is_empty() {
                    self.refill();
                }
                // refill never leaves the cache empty
                self.cache.pop().unwrap_or_default()
            }
            EngineFamily::JavaScriptCore | EngineFamily::SpiderMonkey => self.step_and_derive(),
        }
    }

    fn refill(&mut self) {
        trace!(strategy = self.strategy.name, "refilling output cache");
        for _ in 0..V8_POOL_SIZE {
            let next = self.step_and_derive();
            self.cache.push(next);
        }
    }

    fn step_and_derive(&mut self) -> f64 {
        self.rng.state = xorshift::step(&self.rng.state, self.strategy.shift);
        self.strategy.to_double(&self.rng.state)
    }
}

/// A host that pretends to be a JavaScript runtime.
#[derive(Debug, Clone)]
pub struct SimulatedHost {
    runtime: Runtime,
    version: Option<SemanticVersion>,
    engine: MathRandom,
}

impl SimulatedHost {
    pub fn new(runtime: Runtime, version: Option<SemanticVersion>, engine: MathRandom) -> Self {
        SimulatedHost {
            runtime,
            version,
            engine,
        }
    }

    /// `runtime` running its most likely revision, seeded from `seed`.
    pub fn seeded(runtime: Runtime, version: Option<SemanticVersion>, seed: u64) -> Self {
        let strategies = runtime.strategies(version);
        let strategy = strategies[0];
        Self::with_strategy(runtime, version, strategy, seed)
    }

    pub fn with_strategy(runtime: Runtime, version: Option<SemanticVersion>, strategy: Strategy, seed: u64) -> Self {
        let engine = MathRandom::new(runtime.family(), strategy, XorShift128Plus::seed_from_u64(seed));
        Self::new(runtime, version, engine)
    }

    pub fn engine(&self) -> &MathRandom {
        &self.engine
    }
}

impl Host for SimulatedHost {
    fn runtime(&self) -> Option<Runtime> {
        Some(self.runtime)
    }

    fn engine_version(&self) -> Option<SemanticVersion> {
        self.version
    }

    fn sample(&mut self, count: usize) -> Vec<f64> {
        (0..count).map(|_| self.engine.next_double()).collect()
    }
}
