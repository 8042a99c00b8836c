//! Ranked output paths.

use serde::{Deserialize, Serialize};

use crate::cartographer::{EdgeKind, EdgeSlot, MultiGraph, VertexId};

/// A path of merged edges, each hop standing for its cheapest member.
pub type Skeleton = Vec<EdgeSlot>;

/// One concrete member of a merged edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemberRef {
    pub slot: EdgeSlot,
    pub member: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    /// Best (lowest weight) first.
    #[default]
    Ascending,
    Descending,
}

/// A concrete quote on a ranked path, in external ids.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Quote {
    pub external_id: String,
    pub origin: VertexId,
    pub destination: VertexId,
    pub rate: f64,
    pub weight: f64,
    pub kind: EdgeKind,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedPath {
    pub quotes: Vec<Quote>,
    /// Sum of -ln(rate) over the quotes.
    pub weight: f64,
}

impl RankedPath {
    pub(crate) fn materialize(graph: &MultiGraph, members: &[MemberRef], weight: f64) -> Self {
        let quotes = members
            .iter()
            .map(|m| {
                let edge = &graph[m.slot].members()[m.member];
                Quote {
                    external_id: edge.external_id().to_string(),
                    origin: graph.vertex_id(edge.origin()),
                    destination: graph.vertex_id(edge.destination()),
                    rate: edge.rate(),
                    weight: edge.weight(),
                    kind: edge.kind(),
                }
            })
            .collect();
        Self { quotes, weight }
    }

    /// Compounded rate along the path.
    pub fn rate(&self) -> f64 {
        (-self.weight).exp()
    }

    pub fn hop_count(&self) -> usize {
        self.quotes.len()
    }

    pub fn is_arbitrage(&self) -> bool {
        self.weight < 0.0
    }

    pub fn has_limit_order(&self) -> bool {
        self.quotes.iter().any(|q| q.kind == EdgeKind::LimitOrder)
    }

    pub fn chain(&self) -> String {
        self.quotes
            .iter()
            .map(|q| q.external_id.as_str())
            .collect::<Vec<_>>()
            .join(" -> ")
    }

    /// Vertex ids visited, starting at the origin of the first quote.
    pub fn vertices(&self) -> Vec<VertexId> {
        let mut vertices: Vec<VertexId> = self.quotes.first().map(|q| q.origin).into_iter().collect();
        vertices.extend(self.quotes.iter().map(|q| q.destination));
        vertices
    }
}

/// Ranked paths from one source to one of several targets.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetPaths {
    pub target: VertexId,
    pub paths: Vec<RankedPath>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quote(id: &str, origin: VertexId, destination: VertexId, rate: f64) -> Quote {
        Quote {
            external_id: id.to_string(),
            origin,
            destination,
            rate,
            weight: -rate.ln(),
            kind: EdgeKind::Regular,
        }
    }

    #[test]
    fn test_path_views() {
        let quotes = vec![quote("a", 1, 2, 2.0), quote("b", 2, 3, 2.0), quote("c", 3, 1, 0.3)];
        let weight = quotes.iter().map(|q| q.weight).sum();
        let path = RankedPath { quotes, weight };

        assert_eq!(path.hop_count(), 3);
        assert_eq!(path.chain(), "a -> b -> c");
        assert_eq!(path.vertices(), vec![1, 2, 3, 1]);
        assert!(path.is_arbitrage());
        assert!((path.rate() - 1.2).abs() < 1e-9);
        assert!(!path.has_limit_order());
    }
}
