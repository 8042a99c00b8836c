//! Stacked DFS: iterative walk over predecessor lists, from the target back
//! to the source, with an explicit frame stack instead of recursion.
//!
//! A breadth-first pass from the source first drops every vertex the source
//! cannot reach within the depth limit. Paths are collected target-first and
//! flipped during expansion.

use std::collections::VecDeque;

use super::{BoundedTopK, SearchOptions, Searcher, SearcherKind, SkeletonPass};
use crate::cartographer::{MultiGraph, VertexIndex};

pub struct StackedSearcher {
    options: SearchOptions,
}

impl StackedSearcher {
    pub fn new(options: SearchOptions) -> Self {
        Self { options }
    }
}

/// Hop distance from `source` to every vertex, `None` if unreachable.
pub fn reachability(graph: &MultiGraph, source: VertexIndex) -> Vec<Option<usize>> {
    let mut dist = vec![None; graph.vertex_count()];
    let mut queue = VecDeque::new();
    dist[source] = Some(0);
    queue.push_back(source);

    while let Some(v) = queue.pop_front() {
        let d = dist[v].unwrap_or(0);
        for &slot in graph.succ(v) {
            let next = graph[slot].destination();
            if dist[next].is_none() {
                dist[next] = Some(d + 1);
                queue.push_back(next);
            }
        }
    }
    dist
}

struct Frame {
    vertex: VertexIndex,
    /// Next position in the vertex's predecessor list.
    next: usize,
    psa: f64,
    gap: f64,
}

impl Searcher for StackedSearcher {
    fn kind(&self) -> SearcherKind {
        SearcherKind::Stacked
    }

    fn options(&self) -> &SearchOptions {
        &self.options
    }

    fn rank_skeletons(&self, graph: &MultiGraph, source: VertexIndex, target: VertexIndex, k: usize) -> SkeletonPass {
        let depth = self.options.depth_for(graph.vertex_count()) as usize;
        let threshold = self.options.threshold.cutoff(None);
        let limit_orders_only = self.options.limit_orders_only();
        let dist = reachability(graph, source);

        let mut queue = BoundedTopK::new(k);
        let mut on_path = vec![false; graph.vertex_count()];
        let mut path = Vec::with_capacity(depth);
        let mut frames = vec![Frame {
            vertex: target,
            next: 0,
            psa: 0.0,
            gap: f64::INFINITY,
        }];
        on_path[target] = true;

        while let Some(frame) = frames.last_mut() {
            let preds = graph.pred(frame.vertex);
            if frame.next >= preds.len() || path.len() >= depth {
                on_path[frame.vertex] = false;
                frames.pop();
                path.pop();
                continue;
            }

            let slot = preds[frame.next];
            frame.next += 1;
            let edge = &graph[slot];
            let weight = frame.psa + edge.weight();
            let gap = frame.gap.min(edge.limit_order_gap().unwrap_or(f64::INFINITY));
            let prev = edge.origin();

            if prev == source {
                let rank = match (limit_orders_only, gap.is_finite()) {
                    (false, _) => weight,
                    (true, true) => weight + gap,
                    (true, false) => continue,
                };
                if rank < threshold {
                    queue.offer_with(rank, || {
                        let mut skeleton = path.clone();
                        skeleton.push(slot);
                        skeleton
                    });
                }
                continue;
            }

            let within_reach = dist[prev].map_or(false, |d| path.len() + 1 + d <= depth);
            if on_path[prev] || !within_reach {
                continue;
            }

            on_path[prev] = true;
            path.push(slot);
            frames.push(Frame {
                vertex: prev,
                next: 0,
                psa: weight,
                gap,
            });
        }

        queue.init();
        SkeletonPass {
            queue,
            threshold,
            reversed: true,
        }
    }
}
