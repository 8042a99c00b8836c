//! A single concrete quote inside the multigraph.

use serde::Serialize;

use super::Entity;

/// Dense zero-based vertex index assigned on first sight.
pub type VertexIndex = usize;

/// Standing market quote or a transient caller-supplied limit order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EdgeKind {
    Regular,
    LimitOrder,
}

impl Default for EdgeKind {
    fn default() -> Self {
        EdgeKind::Regular
    }
}

impl std::fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EdgeKind::Regular => write!(f, "regular"),
            EdgeKind::LimitOrder => write!(f, "limit-order"),
        }
    }
}

/// -ln(rate): a cycle with negative total weight compounds to a rate above 1.
pub fn weight_of(rate: f64) -> f64 {
    -rate.ln()
}

/// One concrete quote. `origin`/`destination` are dense indices.
#[derive(Debug, Clone, PartialEq)]
pub struct SingleEdge {
    external_id: String,
    origin: VertexIndex,
    destination: VertexIndex,
    rate: f64,
    weight: f64,
    kind: EdgeKind,
}

impl SingleEdge {
    pub fn new(
        external_id: impl Into<String>,
        origin: VertexIndex,
        destination: VertexIndex,
        rate: f64,
        kind: EdgeKind,
    ) -> Self {
        Self {
            external_id: external_id.into(),
            origin,
            destination,
            rate,
            weight: weight_of(rate),
            kind,
        }
    }

    pub(crate) fn from_entity(entity: &Entity, origin: VertexIndex, destination: VertexIndex, kind: EdgeKind) -> Self {
        Self::new(entity.id.clone(), origin, destination, entity.rate, kind)
    }

    pub fn external_id(&self) -> &str {
        &self.external_id
    }

    pub fn origin(&self) -> VertexIndex {
        self.origin
    }

    pub fn destination(&self) -> VertexIndex {
        self.destination
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    pub fn kind(&self) -> EdgeKind {
        self.kind
    }

    pub fn is_limit_order(&self) -> bool {
        self.kind == EdgeKind::LimitOrder
    }

    /// Change the rate; the weight is always derived from it.
    pub fn set_rate(&mut self, rate: f64) {
        self.rate = rate;
        self.weight = weight_of(rate);
    }
}
