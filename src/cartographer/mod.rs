//! Phase 1: The Cartographer (Graph Construction)
//!
//! Quotes come in as `Entity` records and become a multigraph whose merged
//! edges keep every parallel alternative.

mod edge;
mod entity;
mod graph;
mod loader;
mod multi_edge;

pub use edge::{weight_of, EdgeKind, SingleEdge, VertexIndex};
pub use entity::{Entity, VertexId};
pub use graph::{EdgeSlot, MultiGraph, QuoteHandle, MAX_VERTICES};
pub use loader::{load_csv, load_json, read_csv};
pub use multi_edge::MultiEdge;
