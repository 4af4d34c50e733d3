//! Fixed-capacity ring buffer shared by the transition stores and the
//! compensator rollout pool.

use crate::error::{ConfigError, OrchestratorError};

/// A bounded buffer that overwrites its oldest slot once full.
///
/// The write cursor is always an integer slot index in `0..capacity`. While
/// the buffer is filling, the cursor equals the number of stored items, so a
/// single code path serves both the growing and the saturated phase.
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    slots: Vec<T>,
    capacity: usize,
    cursor: usize,
    total_pushed: u64,
}

impl<T> RingBuffer<T> {
    /// Create an empty buffer. `capacity` must be non-zero; use
    /// [`RingBuffer::try_new`] when it comes from outside the process.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "ring buffer capacity must be non-zero");
        Self::with_slots(capacity)
    }

    /// Create an empty buffer, rejecting a zero capacity.
    pub fn try_new(capacity: usize) -> Result<Self, OrchestratorError> {
        if capacity == 0 {
            return Err(ConfigError::NonPositive {
                field: "ring buffer capacity",
            }
            .into());
        }
        Ok(Self::with_slots(capacity))
    }

    fn with_slots(capacity: usize) -> Self {
        Self {
            // Large replay capacities are allocated lazily as the buffer grows.
            slots: Vec::with_capacity(capacity.min(4096)),
            capacity,
            cursor: 0,
            total_pushed: 0,
        }
    }

    /// Insert at the cursor, evicting the oldest item when full.
    pub fn push(&mut self, item: T) {
        if self.slots.len() < self.capacity {
            self.slots.push(item);
        } else {
            self.slots[self.cursor] = item;
        }
        self.cursor = (self.cursor + 1) % self.capacity;
        self.total_pushed += 1;
    }

    /// Logical size: `min(total pushes, capacity)`.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slot the next push will write to.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Number of pushes over the buffer's lifetime, including evicted ones.
    pub fn total_pushed(&self) -> u64 {
        self.total_pushed
    }

    /// Item stored in physical slot `index`.
    pub fn get(&self, index: usize) -> Option<&T> {
        self.slots.get(index)
    }

    /// Items in physical slot order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.slots.iter()
    }

    /// Items from oldest to newest.
    pub fn iter_chronological(&self) -> impl Iterator<Item = &T> {
        let split = if self.slots.len() < self.capacity {
            0
        } else {
            self.cursor
        };
        self.slots[split..].iter().chain(self.slots[..split].iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_the_last_capacity_items() {
        let mut ring = RingBuffer::new(10);
        for i in 0..15 {
            ring.push(i);
        }
        assert_eq!(ring.len(), 10);
        assert_eq!(ring.cursor(), 5);
        assert_eq!(ring.total_pushed(), 15);

        let mut stored: Vec<i32> = ring.iter().copied().collect();
        stored.sort_unstable();
        assert_eq!(stored, (5..15).collect::<Vec<_>>());

        let chrono: Vec<i32> = ring.iter_chronological().copied().collect();
        assert_eq!(chrono, (5..15).collect::<Vec<_>>());
    }

    #[test]
    fn size_is_capacity_for_any_overfill() {
        for n in [10usize, 11, 19, 20, 37] {
            let mut ring = RingBuffer::new(10);
            for i in 0..n {
                ring.push(i);
            }
            assert_eq!(ring.len(), 10);
            let chrono: Vec<usize> = ring.iter_chronological().copied().collect();
            assert_eq!(chrono, (n - 10..n).collect::<Vec<_>>());
        }
    }

    #[test]
    fn partially_filled_buffer_reads_in_insertion_order() {
        let mut ring = RingBuffer::new(4);
        ring.push("a");
        ring.push("b");
        assert_eq!(ring.len(), 2);
        assert_eq!(ring.cursor(), 2);
        let items: Vec<_> = ring.iter_chronological().copied().collect();
        assert_eq!(items, vec!["a", "b"]);
    }

    #[test]
    #[should_panic]
    fn zero_capacity_is_rejected() {
        let _ring: RingBuffer<u8> = RingBuffer::new(0);
    }

    #[test]
    fn fallible_constructor_reports_zero_capacity() {
        let err = RingBuffer::<u8>::try_new(0).unwrap_err();
        assert!(matches!(
            err,
            OrchestratorError::Config(ConfigError::NonPositive { .. })
        ));
        assert_eq!(RingBuffer::<u8>::try_new(3).unwrap().capacity(), 3);
    }
}
