//! Fixed-capacity flat memory.

use crate::{check_aligned, truncate, MemResult, Memory, MemoryFault};

/// One contiguous word array; word `i` holds bytes `8i..8i+8`.
#[derive(Debug, Clone)]
pub struct FlatMemory {
    words: Vec<u64>,
}

impl FlatMemory {
    /// A zero-filled memory of `capacity` bytes, rounded up to whole words.
    pub fn new(capacity: u64) -> MemResult<Self> {
        let too_large = MemoryFault::CapacityTooLarge(capacity);
        let len = usize::try_from(capacity.div_ceil(8)).map_err(|_| too_large.clone())?;
        let mut words = Vec::new();
        words.try_reserve_exact(len).map_err(|_| too_large)?;
        words.resize(len, 0);
        tracing::debug!(capacity, words = len, "allocated flat memory");
        Ok(Self { words })
    }

    /// Capacity in bytes.
    pub fn capacity(&self) -> u64 {
        self.words.len() as u64 * 8
    }

    fn word_index(&self, address: u64, width: usize) -> MemResult<usize> {
        let end = address
            .checked_add(width as u64)
            .ok_or(MemoryFault::OutOfBounds { address, width })?;
        if end > self.capacity() {
            return Err(MemoryFault::OutOfBounds { address, width });
        }
        Ok((address >> 3) as usize)
    }
}

impl Memory for FlatMemory {
    fn aligned_read(&mut self, address: u64, width: usize) -> MemResult<u64> {
        check_aligned(address, width)?;
        let index = self.word_index(address, width)?;
        let word = self.words[index];
        if width == 8 {
            return Ok(word);
        }
        let shift = (address & 0b111) * 8;
        Ok(truncate(word >> shift, width))
    }

    fn aligned_write(&mut self, address: u64, width: usize, value: u64) -> MemResult<()> {
        check_aligned(address, width)?;
        let index = self.word_index(address, width)?;
        if width == 8 {
            self.words[index] = value;
            return Ok(());
        }
        let shift = (address & 0b111) * 8;
        let mask = truncate(u64::MAX, width) << shift;
        let word = &mut self.words[index];
        *word = (*word & !mask) | (truncate(value, width) << shift);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_rounds_up_to_words() {
        assert_eq!(FlatMemory::new(13).unwrap().capacity(), 16);
        assert_eq!(FlatMemory::new(0).unwrap().capacity(), 0);
    }

    #[test]
    fn test_sub_word_write_preserves_other_lanes() {
        let mut mem = FlatMemory::new(64).unwrap();
        mem.write(8, 8, 0x1122_3344_5566_7788).unwrap();
        mem.write(10, 2, 0xaabb).unwrap();
        assert_eq!(mem.read(8, 8).unwrap(), 0x1122_3344_aabb_7788);
        assert_eq!(mem.read(11, 1).unwrap(), 0xaa);
    }

    #[test]
    fn test_out_of_bounds() {
        let mut mem = FlatMemory::new(16).unwrap();
        assert_eq!(
            mem.read(16, 1),
            Err(MemoryFault::OutOfBounds { address: 16, width: 1 })
        );
        // Crosses the end on the byte path.
        assert!(mem.write(14, 4, 0).is_err());
        assert!(mem.read(u64::MAX, 2).is_err());
    }
}
