//! Parallel quotes between one (origin, destination) pair, merged into a
//! single logical edge whose weight is the cheapest member.

use rustc_hash::FxHashMap;

use super::{SingleEdge, VertexIndex};

#[derive(Debug, Clone)]
pub struct MultiEdge {
    origin: VertexIndex,
    destination: VertexIndex,
    members: Vec<SingleEdge>,
    /// external id -> position in `members`
    positions: FxHashMap<String, usize>,
    /// Position of the representative. Meaningless while empty.
    best: usize,
    /// Representative weight, +inf while empty.
    weight: f64,
    limit_orders: usize,
    /// Cheapest limit-order member, +inf when there is none.
    best_limit_order: f64,
}

impl MultiEdge {
    pub fn new(origin: VertexIndex, destination: VertexIndex) -> Self {
        Self {
            origin,
            destination,
            members: Vec::new(),
            positions: FxHashMap::default(),
            best: 0,
            weight: f64::INFINITY,
            limit_orders: 0,
            best_limit_order: f64::INFINITY,
        }
    }

    pub fn with_members(origin: VertexIndex, destination: VertexIndex, members: Vec<SingleEdge>) -> Self {
        let mut edge = Self::new(origin, destination);
        edge.add_many(members);
        edge
    }

    pub fn origin(&self) -> VertexIndex {
        self.origin
    }

    pub fn destination(&self) -> VertexIndex {
        self.destination
    }

    /// Representative weight: the minimum over current members.
    pub fn weight(&self) -> f64 {
        self.weight
    }

    pub fn representative(&self) -> Option<&SingleEdge> {
        self.members.get(self.best)
    }

    pub fn members(&self) -> &[SingleEdge] {
        &self.members
    }

    pub fn member(&self, external_id: &str) -> Option<&SingleEdge> {
        self.positions.get(external_id).map(|&p| &self.members[p])
    }

    pub fn contains(&self, external_id: &str) -> bool {
        self.positions.contains_key(external_id)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn has_limit_order(&self) -> bool {
        self.limit_orders > 0
    }

    /// Weight of the cheapest limit-order member.
    pub fn limit_order_weight(&self) -> Option<f64> {
        self.has_limit_order().then_some(self.best_limit_order)
    }

    /// Extra cost of forcing this hop through a limit order instead of the
    /// representative. Zero when the representative is itself a limit order.
    pub fn limit_order_gap(&self) -> Option<f64> {
        self.limit_order_weight().map(|w| w - self.weight)
    }

    /// Member positions ordered by ascending weight, ties by insertion order.
    pub fn members_by_weight(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.members.len()).collect();
        order.sort_by(|&a, &b| self.members[a].weight().total_cmp(&self.members[b].weight()));
        order
    }

    /// Insert a member. A known external id updates that member in place.
    /// Returns `true` when a new member was appended.
    pub fn add(&mut self, edge: SingleEdge) -> bool {
        debug_assert_eq!(edge.origin(), self.origin);
        debug_assert_eq!(edge.destination(), self.destination);

        if let Some(&pos) = self.positions.get(edge.external_id()) {
            self.replace(pos, edge);
            return false;
        }

        let pos = self.members.len();
        self.positions.insert(edge.external_id().to_string(), pos);
        if edge.is_limit_order() {
            self.limit_orders += 1;
        }
        self.members.push(edge);
        self.consider(pos);
        true
    }

    /// Returns the number of members appended (updates not counted).
    pub fn add_many<I>(&mut self, edges: I) -> usize
    where
        I: IntoIterator<Item = SingleEdge>,
    {
        let mut appended = 0;
        for edge in edges {
            if self.add(edge) {
                appended += 1;
            }
        }
        appended
    }

    /// Append all members of `other`; ids already present become updates.
    pub fn merge(&mut self, other: MultiEdge) -> usize {
        self.add_many(other.members)
    }

    /// In-place rate change. Returns `false` if the id is unknown.
    pub fn update_rate(&mut self, external_id: &str, rate: f64) -> bool {
        let Some(&pos) = self.positions.get(external_id) else {
            return false;
        };
        let mut edge = self.members[pos].clone();
        edge.set_rate(rate);
        self.replace(pos, edge);
        true
    }

    pub fn remove(&mut self, external_id: &str) -> bool {
        self.remove_many([external_id]) == 1
    }

    /// Delete members by id, then rebuild the local index and representative.
    pub fn remove_many<'a, I>(&mut self, external_ids: I) -> usize
    where
        I: IntoIterator<Item = &'a str>,
    {
        let doomed: Vec<usize> = external_ids
            .into_iter()
            .filter_map(|id| self.positions.remove(id))
            .collect();
        if doomed.is_empty() {
            return 0;
        }

        let mut keep = vec![true; self.members.len()];
        for &pos in &doomed {
            keep[pos] = false;
        }
        let mut flags = keep.iter();
        self.members.retain(|_| flags.next().copied().unwrap_or(true));

        self.positions.clear();
        for (pos, edge) in self.members.iter().enumerate() {
            self.positions.insert(edge.external_id().to_string(), pos);
        }
        self.limit_orders = self.members.iter().filter(|e| e.is_limit_order()).count();
        self.rescan();
        doomed.len()
    }

    fn replace(&mut self, pos: usize, edge: SingleEdge) {
        let old = std::mem::replace(&mut self.members[pos], edge);
        let new = &self.members[pos];

        match (old.is_limit_order(), new.is_limit_order()) {
            (true, false) => self.limit_orders -= 1,
            (false, true) => self.limit_orders += 1,
            _ => {}
        }

        let got_worse = new.weight() > old.weight();
        let lost_best = pos == self.best && got_worse;
        let lost_best_limit_order = old.is_limit_order()
            && old.weight() <= self.best_limit_order
            && (got_worse || !new.is_limit_order());

        if lost_best || lost_best_limit_order {
            self.rescan();
        } else {
            self.consider(pos);
        }
    }

    /// O(1) representative maintenance for a new or improved member.
    fn consider(&mut self, pos: usize) {
        let edge = &self.members[pos];
        let w = edge.weight();
        if w < self.weight {
            self.weight = w;
            self.best = pos;
        }
        if edge.is_limit_order() && w < self.best_limit_order {
            self.best_limit_order = w;
        }
    }

    /// Full recomputation, bounded by the local member count.
    fn rescan(&mut self) {
        self.best = 0;
        self.weight = f64::INFINITY;
        self.best_limit_order = f64::INFINITY;
        for (pos, edge) in self.members.iter().enumerate() {
            let w = edge.weight();
            if w < self.weight {
                self.weight = w;
                self.best = pos;
            }
            if edge.is_limit_order() && w < self.best_limit_order {
                self.best_limit_order = w;
            }
        }
    }
}
