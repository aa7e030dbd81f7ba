use std::collections::VecDeque;

use rand::{Rng, seq::index};

#[derive(Clone, Debug, PartialEq)]
pub struct Transition<S> {
    pub state: S,
    pub action: usize,
    pub reward: f32,
    pub next_state: S,
    pub done: bool,
}

/// Bounded FIFO of transitions, oldest evicted first.
#[derive(Clone, Debug)]
pub struct ReplayMemory<T> {
    buffer: VecDeque<T>,
    capacity: usize,
}

impl<T> ReplayMemory<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn push(&mut self, item: T) {
        if self.capacity == 0 {
            return;
        }

        if self.buffer.len() >= self.capacity {
            self.buffer.pop_front();
        }

        self.buffer.push_back(item);
    }

    /// Uniform sample without replacement, at most `batch_size` items.
    pub fn sample(&self, rng: &mut impl Rng, batch_size: usize) -> Vec<&T> {
        let amount = batch_size.min(self.buffer.len());

        index::sample(rng, self.buffer.len(), amount)
            .into_iter()
            .map(|ndx| &self.buffer[ndx])
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.buffer.iter()
    }
}
