//! Sparse block memory.
//!
//! The address space is split into 2^20-byte blocks, allocated zero-filled
//! on first touch and kept for the lifetime of the memory. The most recent
//! block is cached so straight-line code skips the table lookup.

use std::collections::HashMap;

use crate::{check_aligned, truncate, MemResult, Memory};

pub const BLOCK_BITS: u32 = 20;
pub const BLOCK_SIZE: u64 = 1 << BLOCK_BITS;
const BLOCK_MASK: u64 = BLOCK_SIZE - 1;
const WORDS_PER_BLOCK: usize = (BLOCK_SIZE / 8) as usize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

#[derive(Debug, Default)]
pub struct BlockMemory {
    blocks: Vec<Box<[u64]>>,
    /// Block index (address >> BLOCK_BITS) to slot in `blocks`.
    table: HashMap<u64, usize>,
    last: Option<(u64, usize)>,
    stats: CacheStats,
}

impl BlockMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of blocks allocated so far.
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    fn slot(&mut self, index: u64) -> usize {
        if let Some((cached, slot)) = self.last {
            if cached == index {
                self.stats.hits += 1;
                return slot;
            }
        }
        self.stats.misses += 1;
        let slot = match self.table.get(&index) {
            Some(&slot) => slot,
            None => {
                let slot = self.blocks.len();
                self.blocks.push(vec![0u64; WORDS_PER_BLOCK].into_boxed_slice());
                self.table.insert(index, slot);
                tracing::trace!(block = index, total = self.blocks.len(), "allocated memory block");
                slot
            }
        };
        self.last = Some((index, slot));
        slot
    }

    fn word(&mut self, address: u64) -> &mut u64 {
        let slot = self.slot(address >> BLOCK_BITS);
        let offset = ((address & BLOCK_MASK) >> 3) as usize;
        &mut self.blocks[slot][offset]
    }
}

impl Memory for BlockMemory {
    fn aligned_read(&mut self, address: u64, width: usize) -> MemResult<u64> {
        check_aligned(address, width)?;
        let word = *self.word(address);
        if width == 8 {
            return Ok(word);
        }
        let shift = (address & 0b111) * 8;
        Ok(truncate(word >> shift, width))
    }

    fn aligned_write(&mut self, address: u64, width: usize, value: u64) -> MemResult<()> {
        check_aligned(address, width)?;
        let word = self.word(address);
        if width == 8 {
            *word = value;
            return Ok(());
        }
        let shift = (address & 0b111) * 8;
        let mask = truncate(u64::MAX, width) << shift;
        *word = (*word & !mask) | (truncate(value, width) << shift);
        Ok(())
    }
}
