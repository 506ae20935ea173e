//! Solving strategies: one per (engine, algorithm revision).
//!
//! A strategy bundles a state stepper with a double codec. Predictors hold an
//! ordered list of them, most likely first, and fall through the list when a
//! strategy's constraint system turns out unsatisfiable.

use z3::ast::{Bool, BV};

use crate::codec::Codec;
use crate::runtime::SemanticVersion;
use crate::xorshift::{self, Shift, StatePair};

/// Which way concrete state moves between predictions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Forward,
    /// V8 hands out its cached outputs last-in first-out, so successive
    /// `Math.random()` calls walk the generator backwards.
    Backward,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Strategy {
    pub name: &'static str,
    pub shift: Shift,
    pub direction: Direction,
    pub codec: Codec,
}

/// Competing hypotheses about which revision produced a sequence, most likely first.
pub type StrategyList = Vec<Strategy>;

impl Strategy {
    /// A V8 revision: logical shifts, backward concrete stepping.
    pub const fn v8(name: &'static str, codec: Codec) -> Self {
        Strategy {
            name,
            shift: Shift::Logical,
            direction: Direction::Backward,
            codec,
        }
    }

    pub const fn forward(name: &'static str, shift: Shift, codec: Codec) -> Self {
        Strategy {
            name,
            shift,
            direction: Direction::Forward,
            codec,
        }
    }

    pub fn recover_mantissa(&self, value: f64) -> u64 {
        self.codec.recover_mantissa(value)
    }

    pub fn constrain_mantissa<'ctx>(&self, mantissa: u64, state: &StatePair<BV<'ctx>>) -> Bool<'ctx> {
        self.codec.constrain_mantissa(mantissa, state)
    }

    pub fn to_double(&self, state: &StatePair) -> f64 {
        self.codec.to_double(state)
    }

    /// Symbolic stepping always runs forward; the solver finds the origin.
    pub fn symbolic_step<'ctx>(&self, state: &StatePair<BV<'ctx>>) -> StatePair<BV<'ctx>> {
        xorshift::step(state, self.shift)
    }

    pub fn concrete_step(&self, state: &StatePair) -> StatePair {
        match self.direction {
            Direction::Forward => xorshift::step(state, self.shift),
            Direction::Backward => xorshift::step_back(state),
        }
    }
}

pub const V8_LEGACY_SUM: Strategy = Strategy::v8("v8-legacy-sum", Codec::ExponentPasteSum);
pub const V8_EXPONENT_PASTE: Strategy = Strategy::v8("v8-exponent-paste", Codec::ExponentPasteShift12);
pub const V8_SCALED: Strategy = Strategy::v8("v8-scaled", Codec::ScaledShift11);
pub const V8_SCALED_SUM: Strategy = Strategy::v8("v8-scaled-sum", Codec::ScaledSumShift11);

pub const SPIDERMONKEY: Strategy = Strategy::forward("spidermonkey", Shift::Logical, Codec::ScaledSumMask53);

pub const JAVASCRIPTCORE_ARITHMETIC: Strategy =
    Strategy::forward("javascriptcore-arithmetic", Shift::Arithmetic, Codec::ScaledSumMask53);
pub const JAVASCRIPTCORE_LOGICAL: Strategy =
    Strategy::forward("javascriptcore-logical", Shift::Logical, Codec::ScaledSumMask53);

/// Desktop V8, Chrome and Deno: the engine changed its double assembly in
/// January 2026 and there is no version hint to tell the two apart.
pub fn v8_desktop() -> StrategyList {
    vec![V8_SCALED, V8_SCALED_SUM]
}

/// Node pins the revision by its major version.
pub fn node(version: SemanticVersion) -> StrategyList {
    let strategy = match version.major {
        0..=11 => V8_LEGACY_SUM,
        12..=23 => V8_EXPONENT_PASTE,
        _ => V8_SCALED,
    };
    vec![strategy]
}

/// JavaScriptCore's JIT has been seen emitting sign-extending shifts, so the
/// arithmetic variant goes first.
pub fn javascriptcore() -> StrategyList {
    vec![JAVASCRIPTCORE_ARITHMETIC, JAVASCRIPTCORE_LOGICAL]
}

pub fn spidermonkey() -> StrategyList {
    vec![SPIDERMONKEY]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_version_map() {
        assert_eq!(node(SemanticVersion::new(10, 24, 1)), vec![V8_LEGACY_SUM]);
        assert_eq!(node(SemanticVersion::new(11, 0, 0)), vec![V8_LEGACY_SUM]);
        assert_eq!(node(SemanticVersion::new(12, 0, 0)), vec![V8_EXPONENT_PASTE]);
        assert_eq!(node(SemanticVersion::new(23, 11, 0)), vec![V8_EXPONENT_PASTE]);
        assert_eq!(node(SemanticVersion::new(24, 0, 0)), vec![V8_SCALED]);
        assert_eq!(node(SemanticVersion::new(25, 2, 1)), vec![V8_SCALED]);
    }

    #[test]
    fn test_backward_strategy_walks_back() {
        let state = StatePair::new(0xdead_beef_0000_1111, 0x2222_3333_4444_5555);
        let back = V8_SCALED.concrete_step(&state);
        assert_eq!(xorshift::step(&back, Shift::Logical), state);
    }

    #[test]
    fn test_forward_strategy_uses_its_shift() {
        let state = StatePair::new(0xf000_0000_0000_0001, 0x8000_0000_0000_0002);
        assert_eq!(
            JAVASCRIPTCORE_ARITHMETIC.concrete_step(&state),
            xorshift::step(&state, Shift::Arithmetic)
        );
        assert_eq!(
            JAVASCRIPTCORE_LOGICAL.concrete_step(&state),
            xorshift::step(&state, Shift::Logical)
        );
    }
}
