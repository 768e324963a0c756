//! SQL text and bind values: identifiers come from configuration and are quoted, values are always parameters.

mod builder;
pub mod params;

pub use builder::*;
pub use params::*;
