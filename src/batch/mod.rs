//! Bounded working sets of repositories and their topics

pub mod accumulator;

pub use accumulator::BatchAccumulator;
