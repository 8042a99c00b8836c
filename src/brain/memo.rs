//! Memo table for the depth-bounded search.
//!
//! One flat arena of `TreeItem`s addressed through a hash of the packed
//! (vertex, target, remaining depth) key. Items are written once per pass
//! and never mutated afterwards.

use rustc_hash::FxHashMap;

use crate::cartographer::{EdgeSlot, MultiGraph, VertexIndex, MAX_VERTICES};

const TARGET_SHIFT: u32 = 16;
const VERTEX_SHIFT: u32 = 40;

/// Pack (vertex, target, depth) into one key: 24 | 24 | 16 bits.
pub fn memo_key(vertex: VertexIndex, target: VertexIndex, depth: u16) -> u64 {
    debug_assert!(vertex < MAX_VERTICES && target < MAX_VERTICES);
    ((vertex as u64) << VERTEX_SHIFT) | ((target as u64) << TARGET_SHIFT) | depth as u64
}

/// Weight statistics over every path in a subtree. `count` is a float since
/// the number of paths grows exponentially with depth.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathStats {
    pub min: f64,
    pub max: f64,
    pub sum: f64,
    pub sum_sq: f64,
    pub count: f64,
}

impl PathStats {
    pub const UNREACHABLE: PathStats = PathStats {
        min: f64::INFINITY,
        max: f64::NEG_INFINITY,
        sum: 0.0,
        sum_sq: 0.0,
        count: 0.0,
    };

    /// A single one-hop path.
    pub fn terminal(weight: f64) -> Self {
        Self {
            min: weight,
            max: weight,
            sum: weight,
            sum_sq: weight * weight,
            count: 1.0,
        }
    }

    /// The same paths with one more hop of `weight` in front.
    pub fn prefixed(&self, weight: f64) -> Self {
        Self {
            min: self.min + weight,
            max: self.max + weight,
            sum: self.sum + weight * self.count,
            sum_sq: self.sum_sq + 2.0 * weight * self.sum + weight * weight * self.count,
            count: self.count,
        }
    }

    pub fn absorb(&mut self, other: &PathStats) {
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
        self.sum += other.sum;
        self.sum_sq += other.sum_sq;
        self.count += other.count;
    }

    pub fn is_reachable(&self) -> bool {
        self.count > 0.0
    }

    pub fn mean(&self) -> f64 {
        self.sum / self.count
    }

    /// Population standard deviation.
    pub fn std_dev(&self) -> f64 {
        let mean = self.mean();
        (self.sum_sq / self.count - mean * mean).max(0.0).sqrt()
    }
}

/// One immediate choice: a merged edge, and the memo item that continues
/// from its destination (`None` when the edge lands on the target).
#[derive(Debug, Clone, Copy)]
pub struct TreeNode {
    pub edge: EdgeSlot,
    pub next: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct TreeItem {
    pub stats: PathStats,
    /// Some path in this subtree uses a merged edge holding a limit order.
    pub has_limit_order: bool,
    pub choices: Vec<TreeNode>,
}

impl TreeItem {
    fn unreachable() -> Self {
        Self {
            stats: PathStats::UNREACHABLE,
            has_limit_order: false,
            choices: Vec::new(),
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoTable {
    items: Vec<TreeItem>,
    index: FxHashMap<u64, u32>,
}

impl MemoTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn item(&self, id: u32) -> &TreeItem {
        &self.items[id as usize]
    }

    pub fn lookup(&self, vertex: VertexIndex, target: VertexIndex, depth: u16) -> Option<u32> {
        self.index.get(&memo_key(vertex, target, depth)).copied()
    }

    /// Best-path table from `vertex` to `target` within `depth` hops.
    /// Returns `None` only at depth zero; unreachable entries are memoized
    /// with empty stats like any other.
    ///
    /// Walks with an explicit frame stack, so the default depth of
    /// `vertex_count - 1` never grows the call stack.
    pub fn solve(&mut self, graph: &MultiGraph, vertex: VertexIndex, target: VertexIndex, depth: u16) -> Option<u32> {
        if depth == 0 {
            return None;
        }
        if let Some(id) = self.lookup(vertex, target, depth) {
            return Some(id);
        }

        let mut frames = vec![SolveFrame::new(vertex, depth)];
        while let Some(frame) = frames.last_mut() {
            let succ = graph.succ(frame.vertex);
            let Some(&slot) = succ.get(frame.next) else {
                let (key, item) = (memo_key(frame.vertex, target, frame.depth), frame.take_item());
                frames.pop();
                let id = self.items.len() as u32;
                self.items.push(item);
                self.index.insert(key, id);
                if frames.is_empty() {
                    return Some(id);
                }
                continue;
            };

            let edge = &graph[slot];
            let weight = edge.weight();
            let next = edge.destination();

            if next == target {
                frame.item.stats.absorb(&PathStats::terminal(weight));
                frame.item.has_limit_order |= edge.has_limit_order();
                frame.item.choices.push(TreeNode { edge: slot, next: None });
                frame.next += 1;
                continue;
            }
            if frame.depth == 1 {
                frame.next += 1;
                continue;
            }

            // Children sit one hop lower, so a key is never on the stack twice.
            let Some(child) = self.lookup(next, target, frame.depth - 1) else {
                let child_depth = frame.depth - 1;
                frames.push(SolveFrame::new(next, child_depth));
                continue;
            };

            frame.next += 1;
            let sub = &self.items[child as usize];
            if !sub.stats.is_reachable() {
                continue;
            }
            frame.item.stats.absorb(&sub.stats.prefixed(weight));
            frame.item.has_limit_order |= edge.has_limit_order() || sub.has_limit_order;
            frame.item.choices.push(TreeNode {
                edge: slot,
                next: Some(child),
            });
        }
        None
    }
}

/// An entry being filled: position in `succ(vertex)` and the partial item.
struct SolveFrame {
    vertex: VertexIndex,
    depth: u16,
    next: usize,
    item: TreeItem,
}

impl SolveFrame {
    fn new(vertex: VertexIndex, depth: u16) -> Self {
        Self {
            vertex,
            depth,
            next: 0,
            item: TreeItem::unreachable(),
        }
    }

    fn take_item(&mut self) -> TreeItem {
        std::mem::replace(&mut self.item, TreeItem::unreachable())
    }
}
