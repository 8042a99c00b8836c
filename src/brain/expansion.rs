//! Outside-Edge Expansion
//!
//! A skeleton stands for every concrete combination of its hops' parallel
//! quotes. Each hop's members are sorted by weight and walked with a
//! mixed-radix counter (digit 0 fastest), the running weight updated one
//! digit at a time. A combination at or above the cutoff means every later
//! value of its lowest nonzero digit is too, so that whole range is skipped.
//! All skeletons feed one shared final queue.

use super::{BoundedTopK, MemberRef, RankedPath, SearchOptions, SkeletonPass, SortOrder};
use crate::cartographer::{EdgeSlot, MultiGraph};

/// One hop's members, cheapest first.
struct Hop {
    slot: EdgeSlot,
    members: Vec<usize>,
    weights: Vec<f64>,
    limit_orders: Vec<bool>,
}

impl Hop {
    fn new(graph: &MultiGraph, slot: EdgeSlot) -> Self {
        let edge = &graph[slot];
        let members = edge.members_by_weight();
        let weights = members.iter().map(|&m| edge.members()[m].weight()).collect();
        let limit_orders = members.iter().map(|&m| edge.members()[m].is_limit_order()).collect();
        Self {
            slot,
            members,
            weights,
            limit_orders,
        }
    }
}

/// Mixed-radix counter over a skeleton's hops.
struct Odometer {
    hops: Vec<Hop>,
    digits: Vec<usize>,
    weight: f64,
    limit_order_hits: usize,
}

impl Odometer {
    fn new(hops: Vec<Hop>) -> Self {
        let weight = hops.iter().map(|h| h.weights[0]).sum();
        let limit_order_hits = hops.iter().filter(|h| h.limit_orders[0]).count();
        Self {
            digits: vec![0; hops.len()],
            hops,
            weight,
            limit_order_hits,
        }
    }

    fn set(&mut self, i: usize, value: usize) {
        let hop = &self.hops[i];
        let old = self.digits[i];
        self.weight += hop.weights[value] - hop.weights[old];
        match (hop.limit_orders[old], hop.limit_orders[value]) {
            (true, false) => self.limit_order_hits -= 1,
            (false, true) => self.limit_order_hits += 1,
            _ => {}
        }
        self.digits[i] = value;
    }

    /// Increment at digit `i` with carry. `false` once the counter wraps.
    fn advance(&mut self, mut i: usize) -> bool {
        while i < self.digits.len() {
            let next = self.digits[i] + 1;
            if next < self.hops[i].members.len() {
                self.set(i, next);
                return true;
            }
            self.set(i, 0);
            i += 1;
        }
        false
    }

    /// Skip every combination sharing the current digits above the lowest
    /// nonzero one. `false` when nothing is left.
    fn skip(&mut self) -> bool {
        let Some(k) = self.digits.iter().position(|&d| d != 0) else {
            return false;
        };
        self.set(k, 0);
        self.advance(k + 1)
    }

    fn members(&self) -> Vec<MemberRef> {
        self.hops
            .iter()
            .zip(&self.digits)
            .map(|(hop, &d)| MemberRef {
                slot: hop.slot,
                member: hop.members[d],
            })
            .collect()
    }
}

fn cutoff(threshold: f64, finals: &BoundedTopK<Vec<MemberRef>>) -> f64 {
    match finals.is_full().then(|| finals.worst()).flatten() {
        Some(worst) => threshold.min(worst),
        None => threshold,
    }
}

fn expand_skeleton(
    graph: &MultiGraph,
    skeleton: &[EdgeSlot],
    threshold: f64,
    limit_orders_only: bool,
    finals: &mut BoundedTopK<Vec<MemberRef>>,
) {
    let hops: Vec<Hop> = skeleton.iter().map(|&slot| Hop::new(graph, slot)).collect();
    if hops.is_empty() || hops.iter().any(|h| h.members.is_empty()) {
        return;
    }
    let mut odometer = Odometer::new(hops);

    loop {
        let weight = odometer.weight;
        let more = if weight >= cutoff(threshold, finals) {
            odometer.skip()
        } else {
            if !limit_orders_only || odometer.limit_order_hits > 0 {
                finals.offer_with(weight, || odometer.members());
            }
            odometer.advance(0)
        };
        if !more {
            break;
        }
    }
}

/// Turn ranked skeletons into the concrete top-`k`.
pub fn expand(graph: &MultiGraph, pass: SkeletonPass, k: usize, options: &SearchOptions) -> Vec<RankedPath> {
    let SkeletonPass {
        queue,
        threshold,
        reversed,
    } = pass;
    let mut finals: BoundedTopK<Vec<MemberRef>> = BoundedTopK::new(k);

    // a skeleton's rank is a lower bound on all of its concrete paths
    for (skeleton, rank) in queue.into_sorted_vec(SortOrder::Ascending) {
        if rank >= cutoff(threshold, &finals) {
            break;
        }
        expand_skeleton(graph, &skeleton, threshold, options.limit_orders_only(), &mut finals);
    }
    finals.init();

    finals
        .into_sorted_vec(options.sort_order)
        .into_iter()
        .map(|(mut members, weight)| {
            if reversed {
                members.reverse();
            }
            RankedPath::materialize(graph, &members, weight)
        })
        .collect()
}
