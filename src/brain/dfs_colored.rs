//! Colored DFS: exhaustive walk over simple paths, one visited mark per
//! vertex, driven by an explicit frame stack. No subtree bounds, so it is
//! only practical on small graphs or shallow depth limits.

use super::{BoundedTopK, SearchOptions, Searcher, SearcherKind, Skeleton, SkeletonPass};
use crate::cartographer::{EdgeSlot, MultiGraph, VertexIndex};

pub struct ColoredSearcher {
    options: SearchOptions,
}

impl ColoredSearcher {
    pub fn new(options: SearchOptions) -> Self {
        Self { options }
    }
}

struct Frame {
    vertex: VertexIndex,
    /// Next position in the vertex's successor list.
    next: usize,
    psa: f64,
    gap: f64,
}

impl Searcher for ColoredSearcher {
    fn kind(&self) -> SearcherKind {
        SearcherKind::Colored
    }

    fn options(&self) -> &SearchOptions {
        &self.options
    }

    fn rank_skeletons(&self, graph: &MultiGraph, source: VertexIndex, target: VertexIndex, k: usize) -> SkeletonPass {
        let depth = self.options.depth_for(graph.vertex_count()) as usize;
        let threshold = self.options.threshold.cutoff(None);
        let limit_orders_only = self.options.limit_orders_only();

        let mut queue: BoundedTopK<Skeleton> = BoundedTopK::new(k);
        let mut visited = vec![false; graph.vertex_count()];
        let mut path: Vec<EdgeSlot> = Vec::with_capacity(depth);
        let mut frames = vec![Frame {
            vertex: source,
            next: 0,
            psa: 0.0,
            gap: f64::INFINITY,
        }];
        visited[source] = true;

        while let Some(frame) = frames.last_mut() {
            let succ = graph.succ(frame.vertex);
            if frame.next >= succ.len() || path.len() >= depth {
                visited[frame.vertex] = false;
                frames.pop();
                path.pop();
                continue;
            }

            let slot = succ[frame.next];
            frame.next += 1;
            let edge = &graph[slot];
            let weight = frame.psa + edge.weight();
            let gap = frame.gap.min(edge.limit_order_gap().unwrap_or(f64::INFINITY));
            let next = edge.destination();

            if next == target {
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
            } else if !visited[next] {
                visited[next] = true;
                path.push(slot);
                frames.push(Frame {
                    vertex: next,
                    next: 0,
                    psa: weight,
                    gap,
                });
            }
        }

        queue.init();
        SkeletonPass {
            queue,
            threshold,
            reversed: false,
        }
    }
}
