//! Safe SQL builder: identifiers quoted, values as parameters.

mod builder;
pub mod params;
pub use builder::*;
pub use params::SqlParam;
