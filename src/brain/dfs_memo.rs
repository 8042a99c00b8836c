//! Memoized Depth-Bounded Search
//!
//! Two phases per (source, target) pass:
//! 1. `MemoTable::solve` fills one entry per reachable
//!    (vertex, target, remaining depth), each with its subtree stats.
//! 2. Traceback walks the choices from the root entry, pruning every
//!    branch whose best completion cannot beat the threshold or the
//!    worst path currently kept.

use tracing::debug;

use super::memo::{MemoTable, TreeNode};
use super::{BoundedTopK, SearchOptions, Searcher, SearcherKind, Skeleton, SkeletonPass};
use crate::cartographer::{EdgeSlot, MultiGraph, VertexIndex};

pub struct MemoSearcher {
    options: SearchOptions,
}

impl MemoSearcher {
    pub fn new(options: SearchOptions) -> Self {
        Self { options }
    }
}

/// Traceback state for one pass.
struct Trace<'a> {
    graph: &'a MultiGraph,
    memo: &'a MemoTable,
    queue: BoundedTopK<Skeleton>,
    threshold: f64,
    limit_orders_only: bool,
}

/// One memo entry on the traceback stack. `psa` is the weight of the path
/// so far; `gap` the smallest extra cost of routing one hop so far through a
/// limit order (+inf if no hop can).
struct TraceFrame {
    item: u32,
    next: usize,
    psa: f64,
    gap: f64,
}

impl<'a> Trace<'a> {
    fn run(&mut self, root: u32, depth: usize) {
        let memo = self.memo;
        let graph = self.graph;
        let mut path: Vec<EdgeSlot> = Vec::with_capacity(depth);
        let mut frames = vec![TraceFrame {
            item: root,
            next: 0,
            psa: 0.0,
            gap: f64::INFINITY,
        }];

        while let Some(frame) = frames.last_mut() {
            let Some(&TreeNode { edge: slot, next }) = memo.item(frame.item).choices.get(frame.next) else {
                frames.pop();
                path.pop();
                continue;
            };
            frame.next += 1;

            let edge = &graph[slot];
            let weight = frame.psa + edge.weight();
            let gap = frame.gap.min(edge.limit_order_gap().unwrap_or(f64::INFINITY));
            let (sub_min, sub_has_limit_order) = match next {
                Some(child) => {
                    let sub = memo.item(child);
                    (sub.stats.min, sub.has_limit_order)
                }
                None => (0.0, false),
            };

            if self.limit_orders_only && gap.is_infinite() && !sub_has_limit_order {
                continue;
            }

            let bound = weight + sub_min;
            if bound >= self.threshold {
                continue;
            }
            if self.queue.is_full() && self.queue.worst().map_or(false, |w| bound > w) {
                continue;
            }

            match next {
                Some(child) => {
                    path.push(slot);
                    frames.push(TraceFrame {
                        item: child,
                        next: 0,
                        psa: weight,
                        gap,
                    });
                }
                None => {
                    let rank = if self.limit_orders_only {
                        if gap.is_infinite() {
                            continue;
                        }
                        weight + gap
                    } else {
                        weight
                    };
                    if rank >= self.threshold {
                        continue;
                    }
                    self.queue.offer_with(rank, || {
                        let mut skeleton = Vec::with_capacity(path.len() + 1);
                        skeleton.extend_from_slice(&path);
                        skeleton.push(slot);
                        skeleton
                    });
                }
            }
        }
    }
}

impl Searcher for MemoSearcher {
    fn kind(&self) -> SearcherKind {
        SearcherKind::Memoized
    }

    fn options(&self) -> &SearchOptions {
        &self.options
    }

    fn rank_skeletons(&self, graph: &MultiGraph, source: VertexIndex, target: VertexIndex, k: usize) -> SkeletonPass {
        let depth = self.options.depth_for(graph.vertex_count());
        let mut memo = MemoTable::new();
        let root = memo.solve(graph, source, target, depth);
        let stats = root.map(|r| memo.item(r).stats);
        let threshold = self.options.threshold.cutoff(stats.as_ref());

        let mut trace = Trace {
            graph,
            memo: &memo,
            queue: BoundedTopK::new(k),
            threshold,
            limit_orders_only: self.options.limit_orders_only(),
        };
        if let Some(root) = root {
            trace.run(root, depth as usize);
        }
        let mut queue = trace.queue;
        queue.init();

        debug!(
            "Memo pass {} -> {} (depth {}): {} entries, {} paths total, {} kept",
            source,
            target,
            depth,
            memo.len(),
            stats.map_or(0.0, |s| s.count),
            queue.len()
        );

        SkeletonPass {
            queue,
            threshold,
            reversed: false,
        }
    }
}
