//! Fixed-capacity ring buffer.
//!
//! [`BoundedBuffer`] never holds more than its capacity. Pushing onto a
//! full buffer evicts the element at the opposite end, so the buffer can
//! be used newest-first ([`push_front`](BoundedBuffer::push_front), as the
//! message history does) or oldest-first
//! ([`push_back`](BoundedBuffer::push_back), as the node series do).

use std::collections::VecDeque;

/// A `VecDeque` with a hard upper bound on its length.
#[derive(Debug, Clone)]
pub struct BoundedBuffer<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> BoundedBuffer<T> {
    /// Create an empty buffer holding at most `capacity` elements.
    ///
    /// A zero capacity is bumped to one; configuration validation rejects
    /// zero capacities before they get here.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append at the back, evicting the front element when full.
    ///
    /// Returns the evicted element, if any.
    pub fn push_back(&mut self, item: T) -> Option<T> {
        let evicted = if self.items.len() == self.capacity {
            self.items.pop_front()
        } else {
            None
        };
        self.items.push_back(item);
        evicted
    }

    /// Prepend at the front, evicting the back element when full.
    ///
    /// Returns the evicted element, if any.
    pub fn push_front(&mut self, item: T) -> Option<T> {
        let evicted = if self.items.len() == self.capacity {
            self.items.pop_back()
        } else {
            None
        };
        self.items.push_front(item);
        evicted
    }

    /// Remove and return the front element.
    pub fn pop_front(&mut self) -> Option<T> {
        self.items.pop_front()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Element at the front (newest for front-pushed buffers).
    pub fn front(&self) -> Option<&T> {
        self.items.front()
    }

    /// Element at the back (newest for back-pushed buffers).
    pub fn back(&self) -> Option<&T> {
        self.items.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }
}

impl<T: Clone> BoundedBuffer<T> {
    /// Copy the contents out in front-to-back order.
    pub fn to_vec(&self) -> Vec<T> {
        self.items.iter().cloned().collect()
    }
}
