//! Graph Construction - Multigraph Edition
//!
//! Parallel quotes between the same token pair are merged into one
//! `MultiEdge`. The graph owns every `MultiEdge` by a stable slot id;
//! adjacency lists and the pair index store slot ids, never references,
//! so compaction on removal cannot leave anything dangling.

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use std::ops::Index;
use tracing::{debug, info, warn};

use super::{EdgeKind, Entity, MultiEdge, SingleEdge, VertexId, VertexIndex};
use crate::error::{Error, Result};

/// Dense vertex indices must fit in 24 bits of the memo key.
pub const MAX_VERTICES: usize = 1 << 24;

/// Stable identifier of a `MultiEdge` inside one `MultiGraph`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeSlot(usize);

impl EdgeSlot {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Client-facing address of one quote, in external ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuoteHandle {
    pub origin: VertexId,
    pub destination: VertexId,
    pub external_id: String,
}

impl QuoteHandle {
    fn stale(&self) -> Error {
        Error::StaleStructure {
            origin: self.origin,
            destination: self.destination,
            external_id: self.external_id.clone(),
        }
    }
}

/// The quote multigraph
#[derive(Debug, Clone, Default)]
pub struct MultiGraph {
    slots: Vec<Option<MultiEdge>>,
    free_slots: Vec<usize>,
    /// Live edges in insertion order.
    edges: Vec<EdgeSlot>,
    vertex_index: FxHashMap<VertexId, VertexIndex>,
    vertex_ids: Vec<VertexId>,
    pair_index: FxHashMap<(VertexIndex, VertexIndex), EdgeSlot>,
    successors: Vec<Vec<EdgeSlot>>,
    predecessors: Vec<Vec<EdgeSlot>>,
}

impl MultiGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph of standing market quotes.
    pub fn build(entities: &[Entity]) -> Result<Self> {
        let mut graph = Self::new();
        let handles = graph.add(entities, EdgeKind::Regular)?;

        info!(
            "Graph built: {} vertices, {} merged edges, {} quotes",
            graph.vertex_count(),
            graph.edge_count(),
            handles.len()
        );
        if handles.len() < entities.len() {
            warn!("  Skipped {} quotes with invalid rates", entities.len() - handles.len());
        }

        Ok(graph)
    }

    pub fn vertex_count(&self) -> usize {
        self.vertex_ids.len()
    }

    /// Number of merged edges.
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Number of individual quotes across all merged edges.
    pub fn quote_count(&self) -> usize {
        self.edges.iter().map(|&slot| self[slot].len()).sum()
    }

    pub fn vertex_index(&self, id: VertexId) -> Option<VertexIndex> {
        self.vertex_index.get(&id).copied()
    }

    pub fn vertex_id(&self, index: VertexIndex) -> VertexId {
        self.vertex_ids[index]
    }

    pub fn vertex_ids(&self) -> &[VertexId] {
        &self.vertex_ids
    }

    /// Outgoing merged edges in insertion order. Stable within a snapshot.
    pub fn succ(&self, vertex: VertexIndex) -> &[EdgeSlot] {
        self.successors.get(vertex).map_or(&[], Vec::as_slice)
    }

    /// Incoming merged edges in insertion order.
    pub fn pred(&self, vertex: VertexIndex) -> &[EdgeSlot] {
        self.predecessors.get(vertex).map_or(&[], Vec::as_slice)
    }

    pub fn edges(&self) -> &[EdgeSlot] {
        &self.edges
    }

    pub fn edge(&self, slot: EdgeSlot) -> Option<&MultiEdge> {
        self.slots.get(slot.0).and_then(Option::as_ref)
    }

    pub fn find_edge(&self, origin: VertexIndex, destination: VertexIndex) -> Option<EdgeSlot> {
        self.pair_index.get(&(origin, destination)).copied()
    }

    /// The quote `external_id` on (origin, destination), by external ids.
    pub fn quote(&self, origin: VertexId, destination: VertexId, external_id: &str) -> Option<&SingleEdge> {
        let slot = self.find_edge(self.vertex_index(origin)?, self.vertex_index(destination)?)?;
        self.edge(slot)?.member(external_id)
    }

    /// Insert a batch of quotes. New vertices get fresh indices (existing ones
    /// are never renumbered); quotes on a known pair merge into its edge.
    pub fn add(&mut self, entities: &[Entity], kind: EdgeKind) -> Result<Vec<QuoteHandle>> {
        self.add_bounded(entities, kind, MAX_VERTICES)
    }

    fn add_bounded(&mut self, entities: &[Entity], kind: EdgeKind, max_vertices: usize) -> Result<Vec<QuoteHandle>> {
        let valid: Vec<&Entity> = entities
            .iter()
            .filter(|e| {
                if !e.has_valid_rate() {
                    warn!("Skipping quote '{}' with invalid rate {}", e.id, e.rate);
                    return false;
                }
                true
            })
            .collect();

        let unseen: FxHashSet<VertexId> = valid
            .iter()
            .flat_map(|e| [e.origin, e.destination])
            .filter(|id| !self.vertex_index.contains_key(id))
            .collect();
        let count = self.vertex_count() + unseen.len();
        if count > max_vertices {
            return Err(Error::IdOutOfRange {
                count,
                max: max_vertices,
            });
        }

        // Group by pair, keeping first-appearance order.
        let mut groups: Vec<MultiEdge> = Vec::new();
        let mut group_of: FxHashMap<(VertexIndex, VertexIndex), usize> = FxHashMap::default();
        let mut handles = Vec::with_capacity(valid.len());

        for entity in valid {
            let origin = self.intern(entity.origin);
            let destination = self.intern(entity.destination);
            let group = *group_of.entry((origin, destination)).or_insert_with(|| {
                groups.push(MultiEdge::new(origin, destination));
                groups.len() - 1
            });
            groups[group].add(SingleEdge::from_entity(entity, origin, destination, kind));
            handles.push(QuoteHandle {
                origin: entity.origin,
                destination: entity.destination,
                external_id: entity.id.clone(),
            });
        }

        let mut created = 0;
        for group in groups {
            let pair = (group.origin(), group.destination());
            match self.pair_index.get(&pair) {
                Some(&slot) => {
                    if let Some(existing) = self.slots[slot.0].as_mut() {
                        existing.merge(group);
                    }
                }
                None => {
                    self.insert_edge(group);
                    created += 1;
                }
            }
        }

        debug!(
            "Added {} {} quotes ({} new merged edges)",
            handles.len(),
            kind,
            created
        );
        Ok(handles)
    }

    /// Remove quotes. A merged edge left empty is excised and the pair index
    /// is rebuilt. The whole batch is validated before anything changes.
    pub fn remove(&mut self, handles: &[QuoteHandle]) -> Result<()> {
        let mut batches: Vec<(EdgeSlot, Vec<&str>)> = Vec::new();
        let mut batch_of: FxHashMap<EdgeSlot, usize> = FxHashMap::default();

        for handle in handles {
            let slot = self.locate(handle)?;
            let batch = *batch_of.entry(slot).or_insert_with(|| {
                batches.push((slot, Vec::new()));
                batches.len() - 1
            });
            batches[batch].1.push(handle.external_id.as_str());
        }

        let mut excised = 0;
        for (slot, ids) in batches {
            let Some(edge) = self.slots[slot.0].as_mut() else {
                continue;
            };
            edge.remove_many(ids);
            if edge.is_empty() {
                let (origin, destination) = (edge.origin(), edge.destination());
                self.successors[origin].retain(|&s| s != slot);
                self.predecessors[destination].retain(|&s| s != slot);
                self.slots[slot.0] = None;
                self.free_slots.push(slot.0);
                excised += 1;
            }
        }

        if excised > 0 {
            let slots = &self.slots;
            self.edges.retain(|s| slots[s.0].is_some());
            self.rebuild_pair_index();
        }

        debug!("Removed {} quotes ({} merged edges excised)", handles.len(), excised);
        Ok(())
    }

    /// In-place rate change on existing quotes, addressed by external id.
    pub fn update_relation(&mut self, entities: &[Entity]) -> Result<()> {
        let mut targets = Vec::with_capacity(entities.len());
        for entity in entities {
            if !entity.has_valid_rate() {
                return Err(Error::InvalidRate {
                    external_id: entity.id.clone(),
                    rate: entity.rate,
                });
            }
            let handle = QuoteHandle {
                origin: entity.origin,
                destination: entity.destination,
                external_id: entity.id.clone(),
            };
            targets.push((self.locate(&handle)?, entity));
        }

        for (slot, entity) in targets {
            if let Some(edge) = self.slots[slot.0].as_mut() {
                edge.update_rate(&entity.id, entity.rate);
            }
        }
        Ok(())
    }

    /// Resolve a handle to the slot holding it, or report stale structure.
    fn locate(&self, handle: &QuoteHandle) -> Result<EdgeSlot> {
        let origin = self.vertex_index(handle.origin).ok_or_else(|| handle.stale())?;
        let destination = self.vertex_index(handle.destination).ok_or_else(|| handle.stale())?;
        let slot = self.find_edge(origin, destination).ok_or_else(|| handle.stale())?;
        match self.edge(slot) {
            Some(edge) if edge.contains(&handle.external_id) => Ok(slot),
            _ => Err(handle.stale()),
        }
    }

    fn intern(&mut self, id: VertexId) -> VertexIndex {
        if let Some(&index) = self.vertex_index.get(&id) {
            return index;
        }

        let index = self.vertex_ids.len();
        self.vertex_index.insert(id, index);
        self.vertex_ids.push(id);
        self.successors.push(Vec::new());
        self.predecessors.push(Vec::new());
        index
    }

    fn insert_edge(&mut self, edge: MultiEdge) -> EdgeSlot {
        let (origin, destination) = (edge.origin(), edge.destination());
        let slot = match self.free_slots.pop() {
            Some(i) => {
                self.slots[i] = Some(edge);
                EdgeSlot(i)
            }
            None => {
                self.slots.push(Some(edge));
                EdgeSlot(self.slots.len() - 1)
            }
        };

        self.edges.push(slot);
        self.pair_index.insert((origin, destination), slot);
        self.successors[origin].push(slot);
        self.predecessors[destination].push(slot);
        slot
    }

    fn rebuild_pair_index(&mut self) {
        self.pair_index.clear();
        for &slot in &self.edges {
            if let Some(edge) = self.slots[slot.0].as_ref() {
                self.pair_index.insert((edge.origin(), edge.destination()), slot);
            }
        }
    }
}

impl Index<EdgeSlot> for MultiGraph {
    type Output = MultiEdge;

    /// Panics on a slot that was excised; slots read from adjacency lists of
    /// the current snapshot are always live.
    fn index(&self, slot: EdgeSlot) -> &MultiEdge {
        match self.edge(slot) {
            Some(edge) => edge,
            None => panic!("edge slot {} is not live", slot.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_entities() -> Vec<Entity> {
        vec![
            Entity::new("entityId1", 1, 2, 0.2),
            Entity::new("entityId2", 2, 3, 12.5),
            Entity::new("entityId3", 3, 1, 0.41),
            Entity::new("entityId4", 2, 1, 0.49),
            Entity::new("entityId5", 1, 4, 2050.0),
            Entity::new("entityId6", 4, 1, 0.00049),
            Entity::new("entityId7", 2, 4, 1.1),
            Entity::new("entityId8", 4, 5, 17400.0),
            Entity::new("entityId9", 5, 1, 0.0003),
        ]
    }

    fn handle(origin: VertexId, destination: VertexId, id: &str) -> QuoteHandle {
        QuoteHandle {
            origin,
            destination,
            external_id: id.to_string(),
        }
    }

    #[test]
    fn test_build_small_graph() {
        let graph = MultiGraph::build(&small_entities()).unwrap();

        assert_eq!(graph.vertex_count(), 5);
        assert_eq!(graph.edge_count(), 9);
        assert_eq!(graph.quote_count(), 9);

        // first-sight order: 1, 2, 3, 4, 5
        assert_eq!(graph.vertex_ids(), &[1, 2, 3, 4, 5]);
        let v2 = graph.vertex_index(2).unwrap();
        assert_eq!(graph.succ(v2).len(), 3);
        assert_eq!(graph.pred(graph.vertex_index(1).unwrap()).len(), 4);
    }

    #[test]
    fn test_parallel_quotes_merge() {
        let entities = vec![
            Entity::new("a", 10, 20, 1.5),
            Entity::new("b", 10, 20, 2.0),
            Entity::new("c", 20, 10, 0.6),
        ];
        let graph = MultiGraph::build(&entities).unwrap();

        assert_eq!(graph.edge_count(), 2);
        assert_eq!(graph.quote_count(), 3);
        let slot = graph.find_edge(0, 1).unwrap();
        assert_eq!(graph[slot].representative().unwrap().external_id(), "b");
    }

    #[test]
    fn test_build_is_idempotent() {
        let first = MultiGraph::build(&small_entities()).unwrap();
        let second = MultiGraph::build(&small_entities()).unwrap();

        assert_eq!(first.vertex_ids(), second.vertex_ids());
        assert_eq!(first.edge_count(), second.edge_count());
        for v in 0..first.vertex_count() {
            assert_eq!(first.succ(v).len(), second.succ(v).len());
            assert_eq!(first.pred(v).len(), second.pred(v).len());
        }
    }

    #[test]
    fn test_invalid_rates_are_skipped() {
        let entities = vec![Entity::new("a", 1, 2, 0.0), Entity::new("b", 1, 2, 1.1)];
        let graph = MultiGraph::build(&entities).unwrap();
        assert_eq!(graph.quote_count(), 1);
    }

    #[test]
    fn test_add_merges_and_extends() {
        let mut graph = MultiGraph::build(&small_entities()).unwrap();
        let v1 = graph.vertex_index(1).unwrap();
        let before = graph.succ(v1).to_vec();

        let handles = graph
            .add(
                &[Entity::new("lo1", 1, 2, 0.3), Entity::new("lo2", 1, 99, 4.0)],
                EdgeKind::LimitOrder,
            )
            .unwrap();

        assert_eq!(handles.len(), 2);
        assert_eq!(graph.vertex_count(), 6);
        assert_eq!(graph.vertex_id(5), 99);
        assert_eq!(graph.edge_count(), 10);
        assert_eq!(&graph.succ(v1)[..before.len()], before.as_slice());

        let slot = graph.find_edge(v1, graph.vertex_index(2).unwrap()).unwrap();
        assert_eq!(graph[slot].len(), 2);
        assert_eq!(graph[slot].representative().unwrap().external_id(), "lo1");
        assert!(graph[slot].has_limit_order());
    }

    #[test]
    fn test_remove_excises_empty_edges() {
        let mut graph = MultiGraph::build(&small_entities()).unwrap();
        let handles = graph
            .add(&[Entity::new("lo", 3, 5, 2.0)], EdgeKind::LimitOrder)
            .unwrap();
        assert_eq!(graph.edge_count(), 10);

        graph.remove(&handles).unwrap();
        assert_eq!(graph.edge_count(), 9);
        let (v3, v5) = (graph.vertex_index(3).unwrap(), graph.vertex_index(5).unwrap());
        assert!(graph.find_edge(v3, v5).is_none());
        assert_eq!(graph.succ(v3).len(), 1);

        // every remaining edge still resolves through the pair index
        for &slot in graph.edges() {
            let edge = &graph[slot];
            assert_eq!(graph.find_edge(edge.origin(), edge.destination()), Some(slot));
        }
    }

    #[test]
    fn test_remove_stale_handle_leaves_graph_untouched() {
        let mut graph = MultiGraph::build(&small_entities()).unwrap();

        let result = graph.remove(&[handle(1, 2, "entityId1"), handle(1, 2, "ghost")]);
        assert!(matches!(result, Err(Error::StaleStructure { .. })));
        assert_eq!(graph.edge_count(), 9);
        assert_eq!(graph.quote_count(), 9);

        assert!(graph.remove(&[handle(1, 3, "entityId1")]).is_err());
        assert!(graph.remove(&[handle(77, 2, "entityId1")]).is_err());
    }

    #[test]
    fn test_slot_reuse_after_remove() {
        let mut graph = MultiGraph::build(&small_entities()).unwrap();
        graph.remove(&[handle(5, 1, "entityId9")]).unwrap();
        graph.add(&[Entity::new("x", 3, 4, 1.0)], EdgeKind::Regular).unwrap();

        assert_eq!(graph.edge_count(), 9);
        let slot = graph.find_edge(2, 3).unwrap();
        assert_eq!(graph[slot].representative().unwrap().external_id(), "x");
    }

    #[test]
    fn test_update_relation() {
        let mut graph = MultiGraph::build(&small_entities()).unwrap();
        graph
            .update_relation(&[Entity::new("entityId3", 3, 1, 0.3)])
            .unwrap();
        let slot = graph.find_edge(2, 0).unwrap();
        assert_eq!(graph[slot].representative().unwrap().rate(), 0.3);

        let stale = graph.update_relation(&[Entity::new("entityId3", 3, 2, 0.3)]);
        assert!(matches!(stale, Err(Error::StaleStructure { .. })));

        let bad = graph.update_relation(&[Entity::new("entityId3", 3, 1, -1.0)]);
        assert!(matches!(bad, Err(Error::InvalidRate { .. })));
        assert_eq!(graph[slot].representative().unwrap().rate(), 0.3);
    }

    #[test]
    fn test_vertex_bound_rejects_batch() {
        let mut graph = MultiGraph::build(&small_entities()).unwrap();

        // 5 known vertices; two new ones would make 7
        let batch = [Entity::new("x", 5, 6, 1.0), Entity::new("y", 6, 7, 1.0)];
        let result = graph.add_bounded(&batch, EdgeKind::Regular, 6);
        assert!(matches!(result, Err(Error::IdOutOfRange { count: 7, max: 6 })));
        assert_eq!(graph.vertex_count(), 5);
        assert_eq!(graph.quote_count(), 9);

        // quotes between known vertices need no new index
        graph
            .add_bounded(&[Entity::new("z", 5, 1, 1.0)], EdgeKind::Regular, 5)
            .unwrap();
        assert_eq!(graph.quote_count(), 10);
    }

    #[test]
    fn test_quote_lookup_by_external_ids() {
        let graph = MultiGraph::build(&small_entities()).unwrap();

        assert_eq!(graph.quote(2, 4, "entityId7").unwrap().rate(), 1.1);
        assert!(graph.quote(2, 4, "entityId8").is_none());
        assert!(graph.quote(9, 4, "entityId7").is_none());
    }
}
