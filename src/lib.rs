//! Recover the XorShift128+ state behind a JavaScript engine's
//! `Math.random()` from a few observed outputs, then predict what it returns
//! next.

pub mod codec;
pub mod error;
pub mod predictor;
pub mod recovery;
pub mod report;
pub mod rng;
pub mod runtime;
pub mod solver;
pub mod strategy;
pub mod xorshift;

pub use error::{Error, Result};
pub use runtime::{Predictor, Runtime, SemanticVersion};
