//! Artifact extraction from accumulated assistant text.

mod accumulator;
mod extractor;

pub use accumulator::TurnAccumulator;
pub use extractor::ArtifactExtractor;
