use std::collections::VecDeque;

use crate::prelude::ModelActionType;

/// One recorded transition. Immutable once created.
#[derive(Clone, Debug, PartialEq)]
pub struct Experience {
    pub state: Vec<f32>,
    pub action: ModelActionType,
    pub reward: f32,
    pub state_next: Vec<f32>,
    pub done: bool,
}

/// Bounded FIFO buffer; the oldest element is dropped once `max_buffer_len` is exceeded.
pub struct ReplayBuffer<T> {
    max_buffer_len: usize,
    buffer: VecDeque<T>,
}

impl<T> ReplayBuffer<T> {
    pub fn new(max_buffer_len: usize) -> Self {
        assert!(max_buffer_len > 0);
        Self {
            max_buffer_len,
            buffer: VecDeque::with_capacity(max_buffer_len),
        }
    }

    pub fn len(&self) -> usize { self.buffer.len() }

    pub fn is_empty(&self) -> bool { self.buffer.is_empty() }

    pub fn add(
        &mut self,
        element: T,
    ) {
        if self.buffer.len() >= self.max_buffer_len {
            self.buffer.pop_front();
        }
        self.buffer.push_back(element);
    }

    /// returns references to the elements at the specified `indices`
    pub fn get_many(
        &self,
        indices: &[usize],
    ) -> Vec<&T> {
        debug_assert!(!indices.iter().any(|&e| e >= self.buffer.len()));
        indices.iter().map(|&i| &self.buffer[i]).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> { self.buffer.iter() }
}

impl ReplayBuffer<f32> {
    pub fn avg(&self) -> f32 {
        if self.buffer.is_empty() {
            return 0.0;
        }
        self.buffer.iter().sum::<f32>() / self.buffer.len() as f32
    }

    pub fn min(&self) -> f32 { self.buffer.iter().copied().fold(f32::INFINITY, f32::min) }

    pub fn max(&self) -> f32 { self.buffer.iter().copied().fold(f32::NEG_INFINITY, f32::max) }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(5, 1)]
    #[case(5, 3)]
    #[case(1, 7)]
    fn test_eviction_drops_oldest_first(#[case] capacity: usize, #[case] k: usize) {
        let mut buffer = ReplayBuffer::new(capacity);
        for i in 0..capacity + k {
            buffer.add(i);
        }
        assert_eq!(buffer.len(), capacity);
        let content: Vec<usize> = buffer.iter().copied().collect();
        assert_eq!(content, (k..capacity + k).collect::<Vec<_>>());
        assert!((0..k).all(|old| !content.contains(&old)));
    }

    #[test]
    fn test_get_many() {
        let mut buffer = ReplayBuffer::new(10);
        for i in 0..10 {
            buffer.add(i * 10);
        }
        assert_eq!(buffer.get_many(&[0, 9, 3]), vec![&0, &90, &30]);
    }

    #[test]
    fn test_reward_statistics() {
        let mut rewards = ReplayBuffer::new(3);
        assert_eq!(rewards.avg(), 0.0);
        for r in [10.0, -1.0, 2.0, 5.0] {
            rewards.add(r);
        }
        assert_eq!(rewards.avg(), 2.0);
        assert_eq!(rewards.min(), -1.0);
        assert_eq!(rewards.max(), 5.0);
    }
}
