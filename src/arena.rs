//! Block arena holding encoded records.
//!
//! The arena is a chain of fixed-capacity byte blocks. Records are appended
//! to the tail block and never split across blocks. What happens when the
//! tail is full depends on the [`FlushMode`]: either a new block is linked,
//! or every block is drained and the arena starts over in place.
//!
//! Every drain advances the arena epoch. Record locations are only meaningful
//! together with the epoch they were handed out in.

use crate::config::FlushMode;
use crate::error::LogError;

/// Bookkeeping for one record inside a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordSlot {
    pub offset: usize,
    pub len: usize,
    /// Already written to the text sinks by live output.
    pub rendered: bool,
}

/// A fixed-capacity buffer of encoded records.
#[derive(Debug)]
pub struct ArenaBlock {
    data: Vec<u8>,
    capacity: usize,
    slots: Vec<RecordSlot>,
}

// Blocks larger than this grow on demand instead of reserving up front.
const PREALLOCATE_LIMIT: usize = 1024 * 1024;

impl ArenaBlock {
    fn new(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity.min(PREALLOCATE_LIMIT)),
            capacity,
            slots: Vec::new(),
        }
    }

    /// The encoded records, back to back.
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn slots(&self) -> &[RecordSlot] {
        &self.slots
    }

    pub fn record(&self, index: usize) -> Option<&[u8]> {
        let slot = self.slots.get(index)?;
        Some(&self.data[slot.offset..slot.offset + slot.len])
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn remaining(&self) -> usize {
        self.capacity - self.data.len()
    }

    // Caller checks `remaining()` first.
    fn reserve(&mut self, size: usize) -> usize {
        let offset = self.data.len();
        self.data.resize(offset + size, 0);
        self.slots.push(RecordSlot {
            offset,
            len: size,
            rendered: false,
        });
        self.slots.len() - 1
    }

    fn reset(&mut self) {
        self.data.clear();
        self.slots.clear();
    }
}

/// Position of a record: block index and slot index within the block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordLocation {
    pub block: usize,
    pub index: usize,
}

/// Result of [`Arena::allocate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Allocation {
    pub location: RecordLocation,
    /// Records drained to make room, zero if none.
    pub drained: usize,
}

#[derive(Debug)]
pub struct Arena {
    blocks: Vec<ArenaBlock>,
    block_capacity: usize,
    epoch: u64,
}

impl Arena {
    pub fn new(block_capacity: usize) -> Self {
        Self {
            blocks: vec![ArenaBlock::new(block_capacity)],
            block_capacity,
            epoch: 0,
        }
    }

    /// Reserves `size` zeroed bytes for a new record in the tail block.
    ///
    /// When the tail cannot hold the record, `mode` decides: `Append` links a
    /// new block, `FlushWhenFull` passes every block to `drain` head to tail
    /// and reuses the first one.
    ///
    /// # Errors
    ///
    /// [`LogError::RecordTooLarge`] if `size` exceeds the block capacity. The
    /// arena is left untouched.
    pub fn allocate<F>(&mut self, size: usize, mode: FlushMode, drain: F) -> Result<Allocation, LogError>
    where
        F: FnMut(&ArenaBlock),
    {
        if size > self.block_capacity {
            return Err(LogError::RecordTooLarge {
                size,
                capacity: self.block_capacity,
            });
        }

        let mut drained = 0;
        if self.tail().remaining() < size {
            match mode {
                FlushMode::Append => self.blocks.push(ArenaBlock::new(self.block_capacity)),
                FlushMode::FlushWhenFull => drained = self.drain(drain),
            }
        }

        let block = self.blocks.len() - 1;
        let index = self.blocks[block].reserve(size);
        Ok(Allocation {
            location: RecordLocation { block, index },
            drained,
        })
    }

    /// Passes every block to `f` in append order, then resets the arena to
    /// a single empty block and advances the epoch.
    ///
    /// Returns the number of records drained. Draining an empty arena does
    /// nothing, not even an epoch change.
    pub fn drain<F>(&mut self, mut f: F) -> usize
    where
        F: FnMut(&ArenaBlock),
    {
        let records = self.record_count();
        if records == 0 {
            return 0;
        }

        for block in &self.blocks {
            if !block.is_empty() {
                f(block);
            }
        }

        self.blocks.truncate(1);
        self.blocks[0].reset();
        self.epoch += 1;
        records
    }

    /// Mutable bytes of a record just handed out by [`Arena::allocate`].
    ///
    /// # Panics
    ///
    /// If `location` does not name a record of the current epoch.
    pub fn record_mut(&mut self, location: RecordLocation) -> &mut [u8] {
        let block = &mut self.blocks[location.block];
        let slot = block.slots[location.index];
        &mut block.data[slot.offset..slot.offset + slot.len]
    }

    pub fn mark_rendered(&mut self, location: RecordLocation) {
        if let Some(slot) = self
            .blocks
            .get_mut(location.block)
            .and_then(|block| block.slots.get_mut(location.index))
        {
            slot.rendered = true;
        }
    }

    pub fn get(&self, location: RecordLocation) -> Option<&[u8]> {
        self.blocks.get(location.block)?.record(location.index)
    }

    /// The location following `location` in append order.
    pub fn next_location(&self, location: RecordLocation) -> Option<RecordLocation> {
        let mut next = RecordLocation {
            block: location.block,
            index: location.index + 1,
        };
        while next.block < self.blocks.len() {
            if next.index < self.blocks[next.block].len() {
                return Some(next);
            }
            next = RecordLocation {
                block: next.block + 1,
                index: 0,
            };
        }
        None
    }

    /// Location of the oldest record, if any.
    pub fn first_location(&self) -> Option<RecordLocation> {
        self.blocks
            .iter()
            .position(|block| !block.is_empty())
            .map(|block| RecordLocation { block, index: 0 })
    }

    pub fn blocks(&self) -> &[ArenaBlock] {
        &self.blocks
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn block_capacity(&self) -> usize {
        self.block_capacity
    }

    pub fn record_count(&self) -> usize {
        self.blocks.iter().map(ArenaBlock::len).sum()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    fn tail(&self) -> &ArenaBlock {
        &self.blocks[self.blocks.len() - 1]
    }
}
