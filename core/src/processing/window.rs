use std::collections::VecDeque;

/// Fixed-length shift register of scalars, oldest first.
///
/// Starts zero-filled; every push evicts the oldest value so the length never
/// changes.
#[derive(Debug, Clone, PartialEq)]
pub struct RollingWindow {
    values: VecDeque<f32>,
    capacity: usize,
}

impl RollingWindow {
    pub fn zeroed(capacity: usize) -> Self {
        Self {
            values: std::iter::repeat(0.0).take(capacity).collect(),
            capacity,
        }
    }

    pub fn push(&mut self, value: f32) {
        if self.capacity == 0 {
            return;
        }
        self.values.pop_front();
        self.values.push_back(value);
    }

    pub fn newest(&self) -> Option<f32> {
        self.values.back().copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn to_vec(&self) -> Vec<f32> {
        self.values.iter().copied().collect()
    }
}
