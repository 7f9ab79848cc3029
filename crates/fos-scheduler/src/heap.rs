//! Min-Heap
//!
//! Binary min-heap ordered by `(sort_index, id)`. Used for both the ready
//! queue (keyed by deadline) and the delayed queue (keyed by start time).

use std::cmp::Ordering;

/// Element that can be ordered inside a [`MinHeap`]
pub trait HeapNode {
    /// Primary sort key, smaller first
    fn sort_index(&self) -> f64;

    /// Tie-break for equal sort keys, smaller first
    fn id(&self) -> u64;
}

fn compare<T: HeapNode>(a: &T, b: &T) -> Ordering {
    a.sort_index()
        .total_cmp(&b.sort_index())
        .then_with(|| a.id().cmp(&b.id()))
}

/// Array-backed binary min-heap
///
/// There is no removal by key. Callers mark entries dead and discard them
/// when they surface at the top.
#[derive(Debug)]
pub struct MinHeap<T> {
    nodes: Vec<T>,
}

impl<T> Default for MinHeap<T> {
    fn default() -> Self {
        Self { nodes: Vec::new() }
    }
}

impl<T: HeapNode> MinHeap<T> {
    /// Create an empty heap
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node
    pub fn push(&mut self, node: T) {
        self.nodes.push(node);
        self.sift_up(self.nodes.len() - 1);
    }

    /// Smallest node, if any
    pub fn peek(&self) -> Option<&T> {
        self.nodes.first()
    }

    /// Remove and return the smallest node
    pub fn pop(&mut self) -> Option<T> {
        let last = self.nodes.pop()?;
        if self.nodes.is_empty() {
            return Some(last);
        }
        let first = std::mem::replace(&mut self.nodes[0], last);
        self.sift_down(0);
        Some(first)
    }

    /// Number of nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterate in storage order (not sorted)
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.nodes.iter()
    }

    fn sift_up(&mut self, mut index: usize) {
        while index > 0 {
            let parent = (index - 1) / 2;
            if compare(&self.nodes[parent], &self.nodes[index]) == Ordering::Greater {
                self.nodes.swap(parent, index);
                index = parent;
            } else {
                return;
            }
        }
    }

    fn sift_down(&mut self, mut index: usize) {
        let len = self.nodes.len();
        let half = len / 2;
        while index < half {
            let left = 2 * index + 1;
            let right = left + 1;

            // `left` always exists while `index < half`
            let smaller = if right < len
                && compare(&self.nodes[right], &self.nodes[left]) == Ordering::Less
            {
                right
            } else {
                left
            };

            if compare(&self.nodes[smaller], &self.nodes[index]) == Ordering::Less {
                self.nodes.swap(smaller, index);
                index = smaller;
            } else {
                return;
            }
        }
    }
}
