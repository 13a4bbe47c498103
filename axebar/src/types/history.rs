use std::collections::VecDeque;

/// Fixed-capacity rolling window of samples for a trend line.
///
/// Appending to a full buffer evicts the oldest sample. Samples are kept
/// in arrival order, most recent last.
#[derive(Debug, Clone)]
pub struct HistoryBuffer {
    samples: VecDeque<f64>,
    capacity: usize,
}

impl HistoryBuffer {
    /// Creates an empty buffer holding at most `capacity` samples.
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn append(&mut self, value: f64) {
        if self.capacity == 0 {
            return;
        }

        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }

        self.samples.push_back(value);
    }

    /// Current samples, oldest first.
    pub fn snapshot(&self) -> Vec<f64> {
        self.samples.iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
