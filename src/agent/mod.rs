//! Generator and verifier agents driven by the loop controller

mod generator;
mod verifier;

pub use generator::GeneratorAgent;
pub use verifier::{DEFAULT_CAPTURE_SIZE, DEFAULT_SENTINEL, VerifierAgent};
