//! Versioned double assembly rules.
//!
//! Each engine revision turns 128 bits of generator state into a double in
//! `[0, 1)` in its own way. A codec knows three things about that rule:
//! which bits of the state feed the double (the "mantissa"), how to get those
//! bits back out of an observed double, and how to assemble the double from
//! a concrete state. All of it must be bit-exact.

use z3::ast::{Ast, Bool, BV};

use crate::xorshift::{StatePair, Word, WORD_BITS};

/// `1.0` with a zero mantissa: biased exponent of doubles in `[1.0, 2.0)`.
pub const EXPONENT_BITS: u64 = 0x3ff0_0000_0000_0000;
/// The 52 stored mantissa bits of an IEEE-754 double.
pub const MANTISSA_MASK_52: u64 = (1 << 52) - 1;
/// 53 effective mantissa bits (52 stored + 1 implicit).
pub const MANTISSA_MASK_53: u64 = (1 << 53) - 1;
/// Maps a 53-bit integer into `[0, 1)`.
pub const SCALE_53: f64 = (1u64 << 53) as f64;

/// How one engine revision derives a double from generator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Codec {
    /// V8 up to Node 11: `((s0 + s1) & 52 bits) | exponent`, minus 1.0.
    ExponentPasteSum,
    /// V8 from Node 12 until Feb 2025: `(s0 >> 12) | exponent`, minus 1.0.
    ExponentPasteShift12,
    /// V8 from Feb 2025 (Node 24): `(s0 >> 11) / 2^53`.
    ScaledShift11,
    /// V8 after the January 2026 update: `((s0 + s1) >> 11) / 2^53`.
    ScaledSumShift11,
    /// SpiderMonkey and JavaScriptCore: `((s0 + s1) & 53 bits) / 2^53`.
    ScaledSumMask53,
}

impl Codec {
    /// Pulls the mantissa bits out of a state word pair. Shared by concrete
    /// assembly and symbolic constraint building.
    pub fn mantissa_of<W: Word>(&self, state: &StatePair<W>) -> W {
        use crate::xorshift::Shift::Logical;

        match self {
            Codec::ExponentPasteSum => state.s0.add_wrapping(&state.s1).mask(MANTISSA_MASK_52),
            Codec::ExponentPasteShift12 => state.s0.shr(12, Logical),
            Codec::ScaledShift11 => state.s0.shr(11, Logical),
            Codec::ScaledSumShift11 => state.s0.add_wrapping(&state.s1).shr(11, Logical),
            Codec::ScaledSumMask53 => state.s0.add_wrapping(&state.s1).mask(MANTISSA_MASK_53),
        }
    }

    /// Mantissa bits the generator must have produced to yield `value`.
    pub fn recover_mantissa(&self, value: f64) -> u64 {
        match self {
            Codec::ExponentPasteSum | Codec::ExponentPasteShift12 => (value + 1.0).to_bits() & MANTISSA_MASK_52,
            Codec::ScaledShift11 | Codec::ScaledSumShift11 | Codec::ScaledSumMask53 => (value * SCALE_53).floor() as u64,
        }
    }

    /// `mantissa_of(symbolic) == mantissa`.
    pub fn constrain_mantissa<'ctx>(&self, mantissa: u64, state: &StatePair<BV<'ctx>>) -> Bool<'ctx> {
        let bits = self.mantissa_of(state);
        let expected = BV::from_u64(bits.get_ctx(), mantissa, WORD_BITS);
        bits._eq(&expected)
    }

    /// Assemble the double an engine returns for `state`.
    pub fn to_double(&self, state: &StatePair) -> f64 {
        let mantissa = self.mantissa_of(state);
        match self {
            Codec::ExponentPasteSum | Codec::ExponentPasteShift12 => f64::from_bits(mantissa | EXPONENT_BITS) - 1.0,
            Codec::ScaledShift11 | Codec::ScaledSumShift11 | Codec::ScaledSumMask53 => mantissa as f64 / SCALE_53,
        }
    }
}
