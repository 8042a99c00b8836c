//! KSPA - K shortest paths over a quote multigraph
//!
//! Phase 1 (cartographer) turns quotes into a multigraph of merged edges.
//! Phase 2 (brain) ranks the K lowest-weight paths or cycles on it.

pub mod brain;
pub mod cartographer;
pub mod config;
pub mod error;
pub mod limit_orders;

pub use error::{Error, Result};
