//! Command-independent engines: namespace resolution, the multi-namespace
//! result aggregator and the class filter engine.

pub mod filters;
pub mod namespaces;
pub mod results;

pub use filters::{FilterOptions, Filtered, apply, build_filters};
pub use namespaces::resolve_namespaces;
pub use results::{OpError, ResultRenderer, ResultsHandler};
