//! Limit Order Service
//!
//! Translates client limit-order calls into multigraph mutations. The
//! service owns the graph, so searches borrow it through `graph()` and can
//! never overlap an add or remove.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::cartographer::{EdgeKind, Entity, MultiGraph, QuoteHandle, VertexId};
use crate::error::{Error, Result};

/// A client order: give `amount_in` of `token_in` for `amount_out` of
/// `token_out`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimitOrder {
    pub id: String,
    pub token_in: VertexId,
    pub token_out: VertexId,
    pub amount_in: f64,
    pub amount_out: f64,
}

impl LimitOrder {
    pub fn rate(&self) -> f64 {
        self.amount_out / self.amount_in
    }

    pub fn to_entity(&self) -> Entity {
        Entity::new(self.id.clone(), self.token_in, self.token_out, self.rate())
    }
}

pub struct LimitOrderService {
    graph: MultiGraph,
    /// Placed but not yet in the graph.
    pending: Vec<Entity>,
    live: FxHashMap<String, QuoteHandle>,
}

impl LimitOrderService {
    pub fn new(graph: MultiGraph) -> Self {
        Self {
            graph,
            pending: Vec::new(),
            live: FxHashMap::default(),
        }
    }

    pub fn graph(&self) -> &MultiGraph {
        &self.graph
    }

    pub fn into_graph(self) -> MultiGraph {
        self.graph
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_live(&self, id: &str) -> bool {
        self.live.contains_key(id)
    }

    /// Insert limit-order quotes now. Invalid rates are skipped by the graph
    /// and get no handle. An id already taken by a standing quote on the
    /// same pair fails the whole batch with the graph untouched.
    pub fn add_limit_orders(&mut self, entities: &[Entity]) -> Result<Vec<QuoteHandle>> {
        if let Some(taken) = entities.iter().find(|e| {
            self.graph
                .quote(e.origin, e.destination, &e.id)
                .map_or(false, |q| !q.is_limit_order())
        }) {
            return Err(Error::configuration(format!(
                "limit order '{}' on {} -> {} collides with a standing quote",
                taken.id, taken.origin, taken.destination
            )));
        }

        let handles = self.graph.add(entities, EdgeKind::LimitOrder)?;
        for handle in &handles {
            self.live.insert(handle.external_id.clone(), handle.clone());
        }

        info!(
            "Added {} limit orders ({} live, {} merged edges)",
            handles.len(),
            self.live.len(),
            self.graph.edge_count()
        );
        Ok(handles)
    }

    /// Withdraw limit orders. Fails without touching the graph if any handle
    /// is not a live limit order.
    pub fn remove_limit_orders(&mut self, handles: &[QuoteHandle]) -> Result<()> {
        if let Some(unknown) = handles.iter().find(|h| self.live.get(&h.external_id) != Some(*h)) {
            return Err(Error::StaleStructure {
                origin: unknown.origin,
                destination: unknown.destination,
                external_id: unknown.external_id.clone(),
            });
        }

        self.graph.remove(handles)?;
        for handle in handles {
            self.live.remove(&handle.external_id);
        }

        info!("Removed {} limit orders ({} live)", handles.len(), self.live.len());
        Ok(())
    }

    /// Queue an order for the next `flush`.
    pub fn place(&mut self, order: LimitOrder) -> Result<()> {
        let entity = order.to_entity();
        if !entity.has_valid_rate() {
            return Err(Error::InvalidRate {
                external_id: order.id,
                rate: entity.rate,
            });
        }

        debug!(
            "Placed limit order '{}': {} -> {} at {:.6}",
            entity.id, entity.origin, entity.destination, entity.rate
        );
        self.pending.push(entity);
        Ok(())
    }

    /// Move every placed order into the graph.
    pub fn flush(&mut self) -> Result<Vec<QuoteHandle>> {
        if self.pending.is_empty() {
            return Ok(Vec::new());
        }
        let pending = std::mem::take(&mut self.pending);
        match self.add_limit_orders(&pending) {
            Ok(handles) => Ok(handles),
            Err(e) => {
                self.pending = pending;
                Err(e)
            }
        }
    }

    /// Cancel by id, whether still pending or already live. Returns `false`
    /// for an unknown id.
    pub fn cancel(&mut self, id: &str) -> Result<bool> {
        if let Some(pos) = self.pending.iter().position(|e| e.id == id) {
            self.pending.remove(pos);
            return Ok(true);
        }

        match self.live.get(id).cloned() {
            Some(handle) => {
                self.remove_limit_orders(&[handle])?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brain::{new_searcher, SearchOptions, SearcherKind, ThresholdMode};

    fn service() -> LimitOrderService {
        let graph = MultiGraph::build(&[
            Entity::new("e1", 1, 2, 2.0),
            Entity::new("e2", 2, 3, 2.0),
            Entity::new("e3", 3, 1, 0.2),
            Entity::new("e4", 3, 4, 1.0),
            Entity::new("e5", 4, 5, 1.0),
        ])
        .unwrap();
        LimitOrderService::new(graph)
    }

    fn order(id: &str, token_in: VertexId, token_out: VertexId, amount_in: f64, amount_out: f64) -> LimitOrder {
        LimitOrder {
            id: id.to_string(),
            token_in,
            token_out,
            amount_in,
            amount_out,
        }
    }

    #[test]
    fn test_rate_from_amounts() {
        let lo = order("lo", 3, 1, 1000.0, 300.0);
        assert!((lo.rate() - 0.3).abs() < 1e-12);
        assert_eq!(lo.to_entity().origin, 3);
    }

    #[test]
    fn test_limit_order_opens_arbitrage() {
        let mut service = service();
        let searcher = new_searcher(
            SearcherKind::Memoized,
            SearchOptions {
                depth_limit: Some(3),
                threshold: ThresholdMode::Zero,
                ..Default::default()
            },
        )
        .unwrap();
        assert!(searcher.top_k(service.graph(), 1, 1, 5).unwrap().is_empty());

        service.place(order("lo", 3, 1, 1000.0, 300.0)).unwrap();
        assert_eq!(service.pending_count(), 1);
        assert!(searcher.top_k(service.graph(), 1, 1, 5).unwrap().is_empty());

        let handles = service.flush().unwrap();
        assert_eq!(handles.len(), 1);
        assert!(service.is_live("lo"));
        let paths = searcher.top_k(service.graph(), 1, 1, 5).unwrap();
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].chain(), "e1 -> e2 -> lo");
        assert!(paths[0].has_limit_order());

        assert!(service.cancel("lo").unwrap());
        assert!(!service.cancel("lo").unwrap());
        assert!(searcher.top_k(service.graph(), 1, 1, 5).unwrap().is_empty());
        assert_eq!(service.graph().quote_count(), 5);
    }

    #[test]
    fn test_cancel_pending() {
        let mut service = service();
        service.place(order("a", 1, 3, 1.0, 2.0)).unwrap();
        service.place(order("b", 1, 3, 1.0, 2.5)).unwrap();

        assert!(service.cancel("a").unwrap());
        let handles = service.flush().unwrap();
        assert_eq!(handles.len(), 1);
        assert_eq!(handles[0].external_id, "b");
        assert!(service.flush().unwrap().is_empty());
    }

    #[test]
    fn test_rejects_bad_orders_and_regular_quotes() {
        let mut service = service();
        assert!(matches!(
            service.place(order("zero", 1, 2, 0.0, 5.0)),
            Err(Error::InvalidRate { .. })
        ));

        // standing quotes cannot be withdrawn through the service
        let regular = QuoteHandle {
            origin: 1,
            destination: 2,
            external_id: "e1".to_string(),
        };
        assert!(matches!(
            service.remove_limit_orders(&[regular]),
            Err(Error::StaleStructure { .. })
        ));
        assert_eq!(service.graph().quote_count(), 5);
    }

    #[test]
    fn test_batch_add_and_remove() {
        let mut service = service();
        let handles = service
            .add_limit_orders(&[Entity::new("x", 5, 1, 1.1), Entity::new("y", 9, 1, 1.0)])
            .unwrap();
        assert_eq!(service.live_count(), 2);
        assert_eq!(service.graph().vertex_count(), 6);

        service.remove_limit_orders(&handles).unwrap();
        assert_eq!(service.live_count(), 0);
        assert_eq!(service.graph().edge_count(), 5);
    }

    #[test]
    fn test_id_collision_keeps_standing_quote() {
        let mut service = LimitOrderService::new(
            MultiGraph::build(&[Entity::new("e1", 1, 2, 2.0), Entity::new("e2", 2, 1, 0.4)]).unwrap(),
        );

        let result = service.add_limit_orders(&[Entity::new("e1", 1, 2, 2.5)]);
        assert!(matches!(result, Err(Error::Configuration(_))));
        assert_eq!(service.live_count(), 0);
        let standing = service.graph().quote(1, 2, "e1").unwrap();
        assert!(!standing.is_limit_order());
        assert_eq!(standing.rate(), 2.0);

        // same id on another pair is a separate quote
        let handles = service.add_limit_orders(&[Entity::new("e1", 2, 1, 0.6)]).unwrap();
        service.remove_limit_orders(&handles).unwrap();
        assert_eq!(service.graph().quote_count(), 2);
        assert_eq!(service.graph().edge_count(), 2);
    }
}
