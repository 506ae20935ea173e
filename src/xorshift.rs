//! XorShift128+ state transitions.
//!
//! Every engine covered here runs the same transition:
//!
//! ```text
//! t  = s0
//! t ^= t << 23
//! t ^= t >> 17
//! t ^= s1
//! t ^= s1 >> 26
//! (s0, s1) = (s1, t)
//! ```
//!
//! The transition is written once against the [`Word`] trait so the exact
//! same code drives concrete `u64` stepping and symbolic Z3 bit-vector
//! stepping during recovery.

use std::fmt;

use z3::ast::{Ast, BV};

/// Width of a generator word in bits.
pub const WORD_BITS: u32 = 64;

const SHIFT_A: u32 = 23;
const SHIFT_B: u32 = 17;
const SHIFT_C: u32 = 26;

/// Which right shift the engine compiles `>>` to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Shift {
    /// Zero-fill.
    Logical,
    /// Sign-extending: vacated high bits copy bit 63 of the source word.
    Arithmetic,
}

/// The operations the transition and the double codecs need from a 64-bit word.
pub trait Word: Clone {
    fn xor(&self, rhs: &Self) -> Self;
    /// Addition modulo 2^64.
    fn add_wrapping(&self, rhs: &Self) -> Self;
    fn mask(&self, mask: u64) -> Self;
    fn shl(&self, n: u32) -> Self;
    fn shr(&self, n: u32, shift: Shift) -> Self;
}

impl Word for u64 {
    #[inline]
    fn xor(&self, rhs: &Self) -> Self {
        self ^ rhs
    }

    #[inline]
    fn add_wrapping(&self, rhs: &Self) -> Self {
        self.wrapping_add(*rhs)
    }

    #[inline]
    fn mask(&self, mask: u64) -> Self {
        self & mask
    }

    #[inline]
    fn shl(&self, n: u32) -> Self {
        self << n
    }

    #[inline]
    fn shr(&self, n: u32, shift: Shift) -> Self {
        match shift {
            Shift::Logical => self >> n,
            Shift::Arithmetic => ((*self as i64) >> n) as u64,
        }
    }
}

impl<'ctx> Word for BV<'ctx> {
    fn xor(&self, rhs: &Self) -> Self {
        self.bvxor(rhs)
    }

    fn add_wrapping(&self, rhs: &Self) -> Self {
        // The modulo 2^64 is implicit in 64-bit bit-vector arithmetic
        self.bvadd(rhs)
    }

    fn mask(&self, mask: u64) -> Self {
        self.bvand(&BV::from_u64(self.get_ctx(), mask, WORD_BITS))
    }

    fn shl(&self, n: u32) -> Self {
        self.bvshl(&BV::from_u64(self.get_ctx(), n as u64, WORD_BITS))
    }

    fn shr(&self, n: u32, shift: Shift) -> Self {
        let amount = BV::from_u64(self.get_ctx(), n as u64, WORD_BITS);
        match shift {
            Shift::Logical => self.bvlshr(&amount),
            Shift::Arithmetic => self.bvashr(&amount),
        }
    }
}

/// The generator's 128 bits of state as two words.
///
/// `StatePair` (the default `u64` instantiation) is the concrete state a
/// predictor owns; `StatePair<BV<'ctx>>` is the symbolic state that only
/// lives for the duration of one solve.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct StatePair<W = u64> {
    pub s0: W,
    pub s1: W,
}

impl<W> StatePair<W> {
    pub fn new(s0: W, s1: W) -> Self {
        StatePair { s0, s1 }
    }
}

impl StatePair {
    /// All-zero state: a fixed point of the generator, never a seeded state.
    pub const ZERO: StatePair = StatePair { s0: 0, s1: 0 };

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }
}

impl fmt::Debug for StatePair {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "StatePair {{ s0: {:#018x}, s1: {:#018x} }}", self.s0, self.s1)
    }
}

/// One forward XorShift128+ step, concrete or symbolic.
pub fn step<W: Word>(state: &StatePair<W>, shift: Shift) -> StatePair<W> {
    let mut t = state.s0.clone();
    t = t.xor(&t.shl(SHIFT_A));
    t = t.xor(&t.shr(SHIFT_B, shift));
    t = t.xor(&state.s1);
    t = t.xor(&state.s1.shr(SHIFT_C, shift));
    StatePair {
        s0: state.s1.clone(),
        s1: t,
    }
}

/// Undo one forward step (logical-shift variant).
///
/// Only the logical variant is a bijection; with sign-extension the top bits
/// of `t ^ (t >> 17)` no longer determine `t`.
pub fn step_back(state: &StatePair) -> StatePair {
    let mut t = state.s1 ^ (state.s0 >> SHIFT_C) ^ state.s0;
    t = unshift_right_xor(t, SHIFT_B);
    t = unshift_left_xor(t, SHIFT_A);
    StatePair { s0: t, s1: state.s0 }
}

/// Inverse of `x ^= x >> n`.
fn unshift_right_xor(value: u64, n: u32) -> u64 {
    let mut x = value;
    let mut shift = n;
    while shift < WORD_BITS {
        x ^= value >> shift;
        shift += n;
    }
    x
}

/// Inverse of `x ^= x << n`.
fn unshift_left_xor(value: u64, n: u32) -> u64 {
    let mut x = value;
    let mut shift = n;
    while shift < WORD_BITS {
        x ^= value << shift;
        shift += n;
    }
    x
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use z3::ast::Bool;
    use z3::{Config, Context, SatResult, Solver};

    #[test]
    fn test_forward_step_known_value() {
        let state = StatePair::new(1, 2);
        let next = step(&state, Shift::Logical);

        let mut t: u64 = 1;
        t ^= t << 23;
        t ^= t >> 17;
        t ^= 2;
        t ^= 2 >> 26;
        assert_eq!(next, StatePair::new(2, t));
    }

    #[test]
    fn test_zero_state_is_fixed_point() {
        assert_eq!(step(&StatePair::ZERO, Shift::Logical), StatePair::ZERO);
        assert_eq!(step(&StatePair::ZERO, Shift::Arithmetic), StatePair::ZERO);
        assert_eq!(step_back(&StatePair::ZERO), StatePair::ZERO);
    }

    #[test]
    fn test_arithmetic_shift_sign_extends() {
        let negative: u64 = 0x8000_0000_0000_0000;
        assert_eq!(negative.shr(4, Shift::Arithmetic), 0xf800_0000_0000_0000);
        assert_eq!(negative.shr(4, Shift::Logical), 0x0800_0000_0000_0000);

        let positive: u64 = 0x4000_0000_0000_0000;
        assert_eq!(positive.shr(4, Shift::Arithmetic), positive.shr(4, Shift::Logical));
    }

    #[test]
    fn test_shift_variants_only_differ_with_top_bit_set() {
        let state = StatePair::new(0x0123_4567_89ab_cdef, 0x0fed_cba9_8765_4321);
        assert_eq!(step(&state, Shift::Logical), step(&state, Shift::Arithmetic));

        let state = StatePair::new(0xf123_4567_89ab_cdef, 0xffed_cba9_8765_4321);
        assert_ne!(step(&state, Shift::Logical), step(&state, Shift::Arithmetic));
    }

    proptest! {
        #[test]
        fn prop_step_back_inverts_step(s0 in any::<u64>(), s1 in any::<u64>()) {
            let state = StatePair::new(s0, s1);
            prop_assert_eq!(step_back(&step(&state, Shift::Logical)), state);
            prop_assert_eq!(step(&step_back(&state), Shift::Logical), state);
        }

        #[test]
        fn prop_arithmetic_shift_fills_with_sign(x in any::<u64>(), n in 1u32..64) {
            let shifted = x.shr(n, Shift::Arithmetic);
            let fill = !0u64 << (WORD_BITS - n);
            if x >> 63 == 1 {
                prop_assert_eq!(shifted & fill, fill);
            } else {
                prop_assert_eq!(shifted & fill, 0);
            }
            prop_assert_eq!(shifted & !fill, x >> n);
        }
    }

    /// Binds a concrete pair as the symbolic origin's only model: the symbolic
    /// step, constrained to equal the concrete step, must be satisfiable and
    /// pin the origin to exactly that pair.
    fn assert_symbolic_matches_concrete(state: StatePair, shift: Shift) {
        let cfg = Config::new();
        let ctx = Context::new(&cfg);
        let solver = Solver::new(&ctx);

        let origin = StatePair::new(BV::new_const(&ctx, "s0", 64), BV::new_const(&ctx, "s1", 64));
        let stepped = step(&origin, shift);
        let expected = step(&state, shift);

        solver.assert(&stepped.s0._eq(&BV::from_u64(&ctx, expected.s0, 64)));
        solver.assert(&stepped.s1._eq(&BV::from_u64(&ctx, expected.s1, 64)));
        assert_eq!(solver.check(), SatResult::Sat);

        let model = solver.get_model().unwrap();
        let s0 = model.eval(&origin.s0, true).unwrap().as_u64().unwrap();
        let s1 = model.eval(&origin.s1, true).unwrap().as_u64().unwrap();
        assert_eq!(StatePair::new(s0, s1), state);

        // and no other origin reaches the same successor
        let same_s0 = origin.s0._eq(&BV::from_u64(&ctx, s0, 64));
        let same_s1 = origin.s1._eq(&BV::from_u64(&ctx, s1, 64));
        solver.assert(&Bool::and(&ctx, &[&same_s0, &same_s1]).not());
        assert_eq!(solver.check(), SatResult::Unsat);
    }

    #[test]
    fn test_symbolic_step_matches_concrete_logical() {
        assert_symbolic_matches_concrete(StatePair::new(0x1234_5678_90ab_cdef, 0xfedc_ba09_8765_4321), Shift::Logical);
    }

    #[test]
    fn test_symbolic_step_matches_concrete_arithmetic() {
        // top bits set on both words so the sign fill actually matters
        let state = StatePair::new(0x8badf00d_deadbeef, 0xc0ffee00_facefeed);
        let cfg = Config::new();
        let ctx = Context::new(&cfg);
        let solver = Solver::new(&ctx);

        let origin = StatePair::new(BV::from_u64(&ctx, state.s0, 64), BV::from_u64(&ctx, state.s1, 64));
        let stepped = step(&origin, Shift::Arithmetic);
        let expected = step(&state, Shift::Arithmetic);

        solver.assert(&stepped.s1._eq(&BV::from_u64(&ctx, expected.s1, 64)));
        assert_eq!(solver.check(), SatResult::Sat);
        let model = solver.get_model().unwrap();
        assert_eq!(model.eval(&stepped.s1, true).unwrap().as_u64(), Some(expected.s1));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(12))]

        #[test]
        fn prop_symbolic_step_matches_concrete(s0 in any::<u64>(), s1 in any::<u64>()) {
            assert_symbolic_matches_concrete(StatePair::new(s0, s1), Shift::Logical);
        }
    }
}
