//! Sample buffer
//!
//! In-memory mirror of the samples the logger has written, shared between
//! the logger thread and whoever draws plots.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

/// A parsed `(timestamp, value)` pair from the device
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Device timestamp (milliseconds since boot on the stock firmware)
    pub timestamp: f64,
    /// Measured value
    pub value: f64,
}

impl Sample {
    /// Create a new sample
    pub fn new(timestamp: f64, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// Whether a new logging session starts from an empty buffer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BufferPolicy {
    /// Keep everything seen since the process started
    #[default]
    Accumulate,
    /// Clear the buffer whenever a session starts
    ResetPerSession,
}

#[derive(Debug, Default)]
struct Columns {
    timestamps: VecDeque<f64>,
    values: VecDeque<f64>,
}

/// Two parallel sequences of timestamps and values behind one lock.
///
/// Cloning is cheap and yields a handle to the same buffer.
#[derive(Debug, Clone, Default)]
pub struct SampleBuffer {
    inner: Arc<Mutex<Columns>>,
    capacity: Option<usize>,
}

impl SampleBuffer {
    /// Create an unbounded buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a buffer that drops its oldest samples beyond `capacity`
    pub fn bounded(capacity: usize) -> Self {
        Self {
            inner: Arc::default(),
            capacity: Some(capacity.max(1)),
        }
    }

    /// Create a buffer from an optional bound
    pub fn with_capacity(capacity: Option<usize>) -> Self {
        match capacity {
            Some(n) => Self::bounded(n),
            None => Self::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Columns> {
        // Both columns change under one guard, so poisoned data is still paired
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Append one sample; timestamp and value land together
    pub fn push(&self, sample: Sample) {
        let mut cols = self.lock();
        if let Some(cap) = self.capacity {
            while cols.timestamps.len() >= cap {
                cols.timestamps.pop_front();
                cols.values.pop_front();
            }
        }
        cols.timestamps.push_back(sample.timestamp);
        cols.values.push_back(sample.value);
    }

    /// Number of samples held
    pub fn len(&self) -> usize {
        self.lock().timestamps.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop all samples
    pub fn clear(&self) {
        let mut cols = self.lock();
        cols.timestamps.clear();
        cols.values.clear();
    }

    /// Consistent copy of the buffer as pairs
    pub fn snapshot(&self) -> Vec<Sample> {
        let cols = self.lock();
        cols.timestamps
            .iter()
            .zip(cols.values.iter())
            .map(|(&t, &v)| Sample::new(t, v))
            .collect()
    }

    /// Consistent copy of the buffer as two parallel columns
    pub fn columns(&self) -> (Vec<f64>, Vec<f64>) {
        let cols = self.lock();
        (
            cols.timestamps.iter().copied().collect(),
            cols.values.iter().copied().collect(),
        )
    }

    /// Most recent sample, if any
    pub fn last(&self) -> Option<Sample> {
        let cols = self.lock();
        match (cols.timestamps.back(), cols.values.back()) {
            (Some(&t), Some(&v)) => Some(Sample::new(t, v)),
            _ => None,
        }
    }

    /// Apply the session-start policy
    pub fn begin_session(&self, policy: BufferPolicy) {
        if policy == BufferPolicy::ResetPerSession {
            self.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_push_and_snapshot() {
        let buffer = SampleBuffer::new();
        assert!(buffer.is_empty());

        buffer.push(Sample::new(0.0, 1.0));
        buffer.push(Sample::new(1000.0, 2.0));

        assert_eq!(buffer.len(), 2);
        assert_eq!(
            buffer.snapshot(),
            vec![Sample::new(0.0, 1.0), Sample::new(1000.0, 2.0)]
        );
        assert_eq!(buffer.columns(), (vec![0.0, 1000.0], vec![1.0, 2.0]));
        assert_eq!(buffer.last(), Some(Sample::new(1000.0, 2.0)));
    }

    #[test]
    fn test_bounded_drops_oldest() {
        let buffer = SampleBuffer::bounded(2);
        for i in 0..5 {
            buffer.push(Sample::new(i as f64, i as f64 * 10.0));
        }
        assert_eq!(
            buffer.snapshot(),
            vec![Sample::new(3.0, 30.0), Sample::new(4.0, 40.0)]
        );
    }

    #[test]
    fn test_session_policy() {
        let buffer = SampleBuffer::new();
        buffer.push(Sample::new(1.0, 1.0));

        buffer.begin_session(BufferPolicy::Accumulate);
        assert_eq!(buffer.len(), 1);

        buffer.begin_session(BufferPolicy::ResetPerSession);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_clones_share_storage() {
        let writer = SampleBuffer::new();
        let reader = writer.clone();

        let handle = thread::spawn(move || {
            for i in 0..1000 {
                writer.push(Sample::new(i as f64, -(i as f64)));
            }
        });

        // Every snapshot taken mid-write must have matching columns
        for _ in 0..50 {
            let (t, v) = reader.columns();
            assert_eq!(t.len(), v.len());
        }
        handle.join().unwrap();
        assert_eq!(reader.len(), 1000);
    }
}
