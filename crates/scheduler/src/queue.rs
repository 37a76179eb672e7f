//! Priority-ordered queue of items awaiting dispatch.
//!
//! The queue is re-sorted whenever priorities are recomputed and popped from
//! the front, so it is always drained in the most recently computed order.
//! Ties are broken by ascending index, which keeps dispatch deterministic.

use std::cmp::Ordering;
use std::collections::VecDeque;

use stackfetch_core::StackItem;

/// Items not yet dispatched, highest priority first.
#[derive(Debug, Default, Clone)]
pub struct WorkQueue {
    items: VecDeque<StackItem>,
}

fn dispatch_order(a: &StackItem, b: &StackItem) -> Ordering {
    b.priority
        .total_cmp(&a.priority)
        .then_with(|| a.index.cmp(&b.index))
}

impl WorkQueue {
    pub fn new(items: Vec<StackItem>) -> Self {
        let mut queue = Self {
            items: items.into(),
        };
        queue.sort();
        queue
    }

    /// Recompute every queued item's priority and restore dispatch order.
    pub fn reprioritize<F>(&mut self, score: F)
    where
        F: Fn(usize) -> f64,
    {
        for item in self.items.iter_mut() {
            item.priority = score(item.index);
        }
        self.sort();
    }

    fn sort(&mut self) {
        self.items.make_contiguous().sort_by(dispatch_order);
    }

    /// Remove and return the most urgent item.
    pub fn pop(&mut self) -> Option<StackItem> {
        self.items.pop_front()
    }

    /// Insert an item at its ordered position.
    pub fn push(&mut self, item: StackItem) {
        let pos = self
            .items
            .iter()
            .position(|queued| dispatch_order(&item, queued) == Ordering::Less)
            .unwrap_or(self.items.len());
        self.items.insert(pos, item);
    }

    pub fn contains(&self, index: usize) -> bool {
        self.items.iter().any(|item| item.index == index)
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Queued indices in dispatch order.
    pub fn indices(&self) -> Vec<usize> {
        self.items.iter().map(|item| item.index).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queue_of(n: usize) -> WorkQueue {
        WorkQueue::new(StackItem::from_ids((0..n).map(|i| format!("slice-{i}"))))
    }

    #[test]
    fn equal_priorities_pop_in_index_order() {
        let mut queue = queue_of(4);
        assert_eq!(queue.indices(), vec![0, 1, 2, 3]);
        assert_eq!(queue.pop().map(|i| i.index), Some(0));
        assert_eq!(queue.len(), 3);
    }

    #[test]
    fn reprioritize_sorts_descending() {
        let mut queue = queue_of(6);
        // Closest to 4 first.
        queue.reprioritize(|index| -(index.abs_diff(4) as f64));
        assert_eq!(queue.indices(), vec![4, 3, 5, 2, 1, 0]);
        assert_eq!(queue.pop().map(|i| i.priority), Some(0.0));
    }

    #[test]
    fn push_keeps_order() {
        let mut queue = queue_of(0);
        let mut a = StackItem::new("a", 0);
        a.priority = 5.0;
        let mut b = StackItem::new("b", 1);
        b.priority = 50.0;
        let mut c = StackItem::new("c", 2);
        c.priority = 5.0;
        queue.push(a);
        queue.push(b);
        queue.push(c);
        assert_eq!(queue.indices(), vec![1, 0, 2]);
        assert!(queue.contains(2));
        assert!(!queue.contains(9));
    }

    #[test]
    fn clear_empties() {
        let mut queue = queue_of(3);
        queue.clear();
        assert!(queue.is_empty());
        assert!(queue.pop().is_none());
    }
}
