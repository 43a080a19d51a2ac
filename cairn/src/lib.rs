//! # Cairn
//! Query execution for the Cairn database: a tree of pull-based operators
//! evaluated one tuple at a time over the slate storage engine.

pub mod executor;

pub use executor::{BoxedExecutor, Executor};
