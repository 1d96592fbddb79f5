use std::collections::VecDeque;

pub const DEFAULT_WORKING_MEMORY_SIZE: usize = 10;

/// Bounded FIFO of strings; the oldest entry is evicted first.
///
/// # Invariants
/// - `len() <= capacity()` at all times
/// - Entries are kept in insertion order
#[derive(Debug, Clone)]
pub struct WorkingMemory {
    messages: VecDeque<String>,
    capacity: usize,
}

impl Default for WorkingMemory {
    fn default() -> Self {
        Self::new(DEFAULT_WORKING_MEMORY_SIZE)
    }
}

impl WorkingMemory {
    /// A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            messages: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn add_message(&mut self, message: impl Into<String>) {
        if self.messages.len() == self.capacity {
            self.messages.pop_front();
        }
        self.messages.push_back(message.into());
    }

    pub fn messages(&self) -> impl Iterator<Item = &str> {
        self.messages.iter().map(String::as_str)
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.messages.iter().cloned().collect()
    }

    /// All entries joined by a single space.
    pub fn as_string(&self) -> String {
        self.to_vec().join(" ")
    }

    pub fn last(&self) -> Option<&str> {
        self.messages.back().map(String::as_str)
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
