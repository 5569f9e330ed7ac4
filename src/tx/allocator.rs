use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::warn;

use crate::ids::{IdLayout, TypeTag};
use crate::types::{EncodingError, Result};

/// Source of per-partition sequence counts consumed at commit.
pub trait IdAllocator {
    /// Returns the next unused sequence count for `partition`.
    fn next_sequence(&mut self, partition: u32, type_tag: TypeTag) -> Result<u64>;
}

/// In-memory allocator keeping one counter per partition, starting at one.
///
/// Sequences are shared across type tags: the tag bits already keep vertex
/// and edge ids apart, but one counter keeps each partition's sequence dense.
#[derive(Debug, Clone)]
pub struct SequenceAllocator {
    layout: IdLayout,
    next: HashMap<u32, u64>,
}

impl SequenceAllocator {
    /// Creates an allocator bounded by `layout`.
    pub fn new(layout: IdLayout) -> Self {
        Self {
            layout,
            next: HashMap::new(),
        }
    }

    /// Resumes `partition` at `next`, e.g. after reading a persisted
    /// high-water mark.
    pub fn resume(&mut self, partition: u32, next: u64) {
        self.next.insert(partition, next.max(1));
    }

    /// Next sequence that would be handed out for `partition`.
    pub fn peek(&self, partition: u32) -> u64 {
        self.next.get(&partition).copied().unwrap_or(1)
    }
}

impl IdAllocator for SequenceAllocator {
    fn next_sequence(&mut self, partition: u32, _type_tag: TypeTag) -> Result<u64> {
        if partition > self.layout.max_partition() {
            return Err(EncodingError::PartitionOverflow {
                partition,
                max: self.layout.max_partition(),
            }
            .into());
        }
        let counter = self.next.entry(partition).or_insert(1);
        if *counter > self.layout.max_sequence() {
            warn!(
                partition,
                max_sequence = self.layout.max_sequence(),
                "allocator.partition_exhausted"
            );
            return Err(EncodingError::PartitionExhausted { partition }.into());
        }
        let sequence = *counter;
        *counter += 1;
        Ok(sequence)
    }
}

/// Cloneable handle to one [`SequenceAllocator`] shared by many transactions.
#[derive(Debug, Clone)]
pub struct SharedAllocator {
    inner: Arc<Mutex<SequenceAllocator>>,
}

impl SharedAllocator {
    /// Wraps `allocator` for shared use.
    pub fn new(allocator: SequenceAllocator) -> Self {
        Self {
            inner: Arc::new(Mutex::new(allocator)),
        }
    }

    /// See [`SequenceAllocator::peek`].
    pub fn peek(&self, partition: u32) -> u64 {
        self.inner.lock().peek(partition)
    }
}

impl IdAllocator for SharedAllocator {
    fn next_sequence(&mut self, partition: u32, type_tag: TypeTag) -> Result<u64> {
        self.inner.lock().next_sequence(partition, type_tag)
    }
}
