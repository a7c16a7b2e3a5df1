//! Discovery engines.
//!
//! - `engine`: similarity-first search and the vault-wide sampler
//! - `deep`: LLM-first search over cross-domain samples
//! - `response`: evaluator prompt and response parsing
//! - `explain`: evaluator-written explanations for found connections

mod deep;
mod engine;
mod explain;
mod response;
mod similarity;

pub use deep::DeepDiscoveryEngine;
pub use engine::SerendipityEngine;
pub use explain::Explainer;
