//! Fixed-capacity FIFO of per-frame shift samples.

use std::collections::VecDeque;

use crate::analyzer::ShiftSample;

/// Rolling window of the most recent `capacity` samples.
#[derive(Debug, Clone)]
pub struct ShiftHistory {
    samples: VecDeque<ShiftSample>,
    capacity: usize,
}

impl ShiftHistory {
    /// A zero capacity is raised to 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a sample, evicting the oldest one when full.
    pub fn push(&mut self, sample: ShiftSample) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.samples.len() == self.capacity
    }

    /// Oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &ShiftSample> + '_ {
        self.samples.iter()
    }
}
