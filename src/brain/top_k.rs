//! Bounded Top-K Queue
//!
//! A max-heap on weight capped at `capacity`: the root is always the worst
//! item kept so far, so a better candidate evicts it in O(log k). While the
//! queue is still filling, items go into a plain vector and the heap is
//! built once on reaching capacity (or on `init`).

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use super::SortOrder;

#[derive(Debug)]
struct Entry<P> {
    weight: f64,
    seq: u64,
    payload: P,
}

impl<P> PartialEq for Entry<P> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<P> Eq for Entry<P> {}

impl<P> PartialOrd for Entry<P> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<P> Ord for Entry<P> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.weight
            .total_cmp(&other.weight)
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

#[derive(Debug)]
enum Slots<P> {
    Filling(Vec<Entry<P>>),
    Heap(BinaryHeap<Entry<P>>),
}

#[derive(Debug)]
pub struct BoundedTopK<P> {
    capacity: usize,
    slots: Slots<P>,
    next_seq: u64,
}

impl<P> BoundedTopK<P> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            slots: Slots::Filling(Vec::with_capacity(capacity.min(1024))),
            next_seq: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        match &self.slots {
            Slots::Filling(items) => items.len(),
            Slots::Heap(heap) => heap.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.len() >= self.capacity
    }

    /// Weight of the worst kept item.
    pub fn worst(&self) -> Option<f64> {
        match &self.slots {
            Slots::Filling(items) => items.iter().map(|e| e.weight).max_by(f64::total_cmp),
            Slots::Heap(heap) => heap.peek().map(|e| e.weight),
        }
    }

    /// Turn the filling vector into a heap. Idempotent.
    pub fn init(&mut self) {
        if let Slots::Filling(items) = &mut self.slots {
            let items = std::mem::take(items);
            self.slots = Slots::Heap(BinaryHeap::from(items));
        }
    }

    /// Insert below capacity. Returns `false` if the queue is already full.
    pub fn append(&mut self, payload: P, weight: f64) -> bool {
        if self.is_full() {
            return false;
        }

        let entry = Entry {
            weight,
            seq: self.next_seq,
            payload,
        };
        self.next_seq += 1;

        match &mut self.slots {
            Slots::Filling(items) => items.push(entry),
            Slots::Heap(heap) => heap.push(entry),
        }
        if self.is_full() {
            self.init();
        }
        true
    }

    /// Replace the root if `weight` is strictly better. Ties keep the
    /// earlier item.
    pub fn update_root(&mut self, payload: P, weight: f64) -> bool {
        self.init();
        let seq = self.next_seq;
        let Slots::Heap(heap) = &mut self.slots else {
            return false;
        };
        let Some(mut root) = heap.peek_mut() else {
            return false;
        };
        if weight.total_cmp(&root.weight) != Ordering::Less {
            return false;
        }

        *root = Entry {
            weight,
            seq,
            payload,
        };
        // dropping `root` sifts the new entry down
        drop(root);
        self.next_seq += 1;
        true
    }

    /// Whether a candidate of this weight would be kept right now.
    pub fn accepts(&self, weight: f64) -> bool {
        if self.capacity == 0 {
            return false;
        }
        !self.is_full() || self.worst().map_or(true, |w| weight < w)
    }

    /// Offer a candidate, building its payload only if it is kept.
    pub fn offer_with<F>(&mut self, weight: f64, payload: F) -> bool
    where
        F: FnOnce() -> P,
    {
        if !self.accepts(weight) {
            return false;
        }
        if self.is_full() {
            self.update_root(payload(), weight)
        } else {
            self.append(payload(), weight)
        }
    }

    pub fn offer(&mut self, payload: P, weight: f64) -> bool {
        self.offer_with(weight, || payload)
    }

    /// Kept items ordered by weight; equal weights in insertion order.
    pub fn into_sorted_vec(self, order: SortOrder) -> Vec<(P, f64)> {
        let mut items = match self.slots {
            Slots::Filling(items) => items,
            Slots::Heap(heap) => heap.into_vec(),
        };
        items.sort();
        if order == SortOrder::Descending {
            items.reverse();
        }
        items.into_iter().map(|e| (e.payload, e.weight)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keeps_k_lowest() {
        let mut queue = BoundedTopK::new(3);
        for (i, w) in [5.0, -1.0, 3.0, 7.0, -4.0, 2.0, 9.0].into_iter().enumerate() {
            queue.offer(i, w);
        }

        assert!(queue.is_full());
        assert_eq!(queue.worst(), Some(2.0));
        let kept = queue.into_sorted_vec(SortOrder::Ascending);
        assert_eq!(kept, vec![(4, -4.0), (1, -1.0), (5, 2.0)]);
    }

    #[test]
    fn test_below_capacity_keeps_everything() {
        let mut queue = BoundedTopK::new(10);
        queue.offer("a", 1.0);
        queue.offer("b", 0.5);
        assert!(!queue.is_full());
        assert_eq!(queue.worst(), Some(1.0));

        queue.init();
        assert_eq!(queue.worst(), Some(1.0));
        queue.offer("c", 2.0);
        assert_eq!(queue.worst(), Some(2.0));

        let kept = queue.into_sorted_vec(SortOrder::Descending);
        assert_eq!(kept.iter().map(|(p, _)| *p).collect::<Vec<_>>(), vec!["c", "a", "b"]);
    }

    #[test]
    fn test_ties_keep_first_inserted() {
        let mut queue = BoundedTopK::new(2);
        queue.offer("first", 1.0);
        queue.offer("second", 1.0);
        assert!(!queue.offer("third", 1.0));

        let kept = queue.into_sorted_vec(SortOrder::Ascending);
        assert_eq!(kept, vec![("first", 1.0), ("second", 1.0)]);
    }

    #[test]
    fn test_lazy_payload_only_built_when_kept() {
        let mut queue = BoundedTopK::new(1);
        queue.offer(1, 0.0);

        let mut built = false;
        queue.offer_with(1.0, || {
            built = true;
            2
        });
        assert!(!built);

        assert!(queue.offer_with(-1.0, || 3));
        assert_eq!(queue.into_sorted_vec(SortOrder::Ascending), vec![(3, -1.0)]);
    }

    #[test]
    fn test_zero_capacity_accepts_nothing() {
        let mut queue: BoundedTopK<u8> = BoundedTopK::new(0);
        assert!(!queue.offer(1, -10.0));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_kept_never_worse_than_discarded() {
        use rand::{rngs::StdRng, Rng, SeedableRng};

        let mut rng = StdRng::seed_from_u64(7);
        let weights: Vec<f64> = (0..500).map(|_| rng.gen_range(-5.0..5.0)).collect();

        let mut queue = BoundedTopK::new(25);
        for (i, &w) in weights.iter().enumerate() {
            queue.offer(i, w);
        }
        let kept = queue.into_sorted_vec(SortOrder::Ascending);
        let kept_ids: Vec<usize> = kept.iter().map(|(i, _)| *i).collect();
        let worst_kept = kept.last().map(|(_, w)| *w).unwrap();

        for (i, &w) in weights.iter().enumerate() {
            if !kept_ids.contains(&i) {
                assert!(worst_kept <= w);
            }
        }
    }
}
