//! Playout buffer: FIFO of received states awaiting emission.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

pub const DEFAULT_INITIAL_CAPACITY: usize = 10;
/// Two seconds of states at 60 Hz.
pub const DEFAULT_MAX_BUFFERED: usize = 120;

/// What happens when the producer outruns the consumer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Never discard anything. Memory grows as long as the producer is faster.
    Unbounded,
    /// Append the new state and discard the oldest once `max_len` is exceeded.
    /// Keeps playout latency bounded at the cost of skipping states.
    DropOldest { max_len: usize },
    /// Discard the incoming state while the buffer holds `max_len` states.
    DropNewest { max_len: usize },
}

impl OverflowPolicy {
    pub fn max_len(&self) -> Option<usize> {
        match *self {
            OverflowPolicy::Unbounded => None,
            OverflowPolicy::DropOldest { max_len } | OverflowPolicy::DropNewest { max_len } => {
                Some(max_len)
            }
        }
    }
}

impl Default for OverflowPolicy {
    fn default() -> Self {
        OverflowPolicy::DropOldest {
            max_len: DEFAULT_MAX_BUFFERED,
        }
    }
}

/// Result of a push.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Admission {
    Appended,
    /// Appended, and the front state was discarded to make room.
    EvictedOldest,
    /// The pushed state was discarded.
    Rejected,
}

impl Admission {
    pub fn dropped_state(&self) -> bool {
        !matches!(self, Admission::Appended)
    }
}

#[derive(Debug)]
pub struct PlayoutBuffer<T> {
    items: VecDeque<T>,
    policy: OverflowPolicy,
}

impl<T> PlayoutBuffer<T> {
    pub fn new(initial_capacity: usize, policy: OverflowPolicy) -> Self {
        Self {
            items: VecDeque::with_capacity(initial_capacity),
            policy,
        }
    }

    pub fn push(&mut self, item: T) -> Admission {
        match self.policy {
            OverflowPolicy::Unbounded => {
                self.items.push_back(item);
                Admission::Appended
            }
            OverflowPolicy::DropOldest { max_len } => {
                self.items.push_back(item);
                if self.items.len() > max_len {
                    self.items.pop_front();
                    Admission::EvictedOldest
                } else {
                    Admission::Appended
                }
            }
            OverflowPolicy::DropNewest { max_len } => {
                if self.items.len() >= max_len {
                    Admission::Rejected
                } else {
                    self.items.push_back(item);
                    Admission::Appended
                }
            }
        }
    }

    pub fn front(&self) -> Option<&T> {
        self.items.front()
    }

    pub(crate) fn pop_front(&mut self) -> Option<T> {
        self.items.pop_front()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Discard every buffered state; returns how many were dropped.
    pub fn clear(&mut self) -> usize {
        let dropped = self.items.len();
        self.items.clear();
        dropped
    }

    pub fn policy(&self) -> OverflowPolicy {
        self.policy
    }

    /// Iterate buffered states, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }
}

impl<T> Default for PlayoutBuffer<T> {
    fn default() -> Self {
        Self::new(DEFAULT_INITIAL_CAPACITY, OverflowPolicy::default())
    }
}
