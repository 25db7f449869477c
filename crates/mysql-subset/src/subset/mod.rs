//! Subset extraction: the closure builder and the materializer.

pub mod closure;
pub mod materialize;
pub mod report;

pub use closure::{Closure, ClosureBuilder, TableRows};
pub use materialize::Materializer;
pub use report::{DanglingReference, MaterializeReport, SkippedRow, TableLoad};
