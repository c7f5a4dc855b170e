//! Artifact Parsing Module
//!
//! Extracts code artifacts and structured payloads from free-form model text.

mod parser;

pub use parser::*;
