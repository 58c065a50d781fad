//! Rendering of query responses for the terminal.

pub mod generator;

pub use generator::*;
