//! Flat tabular projection of the corpus

pub mod writer;

pub use writer::TabularWriter;
