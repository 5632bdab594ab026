//! sailfoil memory subsystem.
//!
//! Simulated memory is byte addressed and little-endian. Every access is
//! `width` bytes with `width` in {1, 2, 4, 8}. An access is aligned when
//! `address % width == 0`; aligned accesses touch exactly one 64-bit word
//! and go through the backend's word path, unaligned ones are split into
//! single-byte accesses, least significant byte first.
//!
//! Two backends:
//! - [`FlatMemory`]: one fixed-capacity allocation.
//! - [`BlockMemory`]: sparse 1 MiB blocks created on first touch.

mod block;
mod flat;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use block::{BlockMemory, CacheStats, BLOCK_BITS, BLOCK_SIZE};
pub use flat::FlatMemory;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemoryFault {
    #[error("invalid access width {0} (expected 1, 2, 4 or 8)")]
    InvalidWidth(usize),
    #[error("access of {width} bytes at {address:#x} is out of bounds")]
    OutOfBounds { address: u64, width: usize },
    #[error("word access of {width} bytes at {address:#x} is not aligned")]
    Misaligned { address: u64, width: usize },
    #[error("flat memory of {0} bytes cannot be allocated")]
    CapacityTooLarge(u64),
}

pub type MemResult<T> = Result<T, MemoryFault>;

/// `value` reduced to its low `width` bytes.
pub fn truncate(value: u64, width: usize) -> u64 {
    if width >= 8 {
        value
    } else {
        value & ((1u64 << (width * 8)) - 1)
    }
}

pub fn is_aligned(address: u64, width: usize) -> bool {
    address % width as u64 == 0
}

fn check_width(width: usize) -> MemResult<()> {
    match width {
        1 | 2 | 4 | 8 => Ok(()),
        _ => Err(MemoryFault::InvalidWidth(width)),
    }
}

/// Preconditions of the word path: a valid width and a naturally aligned address.
pub(crate) fn check_aligned(address: u64, width: usize) -> MemResult<()> {
    check_width(width)?;
    if !is_aligned(address, width) {
        return Err(MemoryFault::Misaligned { address, width });
    }
    Ok(())
}

/// Address of the last byte touched; faults past the top of the address space.
fn last_address(address: u64, width: usize) -> MemResult<u64> {
    address
        .checked_add(width as u64 - 1)
        .ok_or(MemoryFault::OutOfBounds { address, width })
}

/// A simulated memory backend.
///
/// Implementors provide the aligned word path and reject widths or
/// addresses it cannot serve with [`MemoryFault::InvalidWidth`] or
/// [`MemoryFault::Misaligned`]. The provided methods add the unaligned
/// byte path on top of it.
pub trait Memory {
    /// Read `width` bytes at an address aligned to `width`.
    fn aligned_read(&mut self, address: u64, width: usize) -> MemResult<u64>;

    /// Write the low `width` bytes of `value` at an address aligned to
    /// `width`. Upper bits of `value` are already cleared.
    fn aligned_write(&mut self, address: u64, width: usize, value: u64) -> MemResult<()>;

    fn read(&mut self, address: u64, width: usize) -> MemResult<u64> {
        check_width(width)?;
        last_address(address, width)?;
        if is_aligned(address, width) {
            return self.aligned_read(address, width);
        }
        let mut value = 0u64;
        for i in (0..width as u64).rev() {
            value = (value << 8) | self.aligned_read(address + i, 1)?;
        }
        Ok(value)
    }

    fn write(&mut self, address: u64, width: usize, value: u64) -> MemResult<()> {
        check_width(width)?;
        last_address(address, width)?;
        let mut value = truncate(value, width);
        if is_aligned(address, width) {
            return self.aligned_write(address, width, value);
        }
        for i in 0..width as u64 {
            self.aligned_write(address + i, 1, value & 0xff)?;
            value >>= 8;
        }
        Ok(())
    }

    /// Copy `data` into memory starting at `address`.
    fn write_bytes(&mut self, address: u64, data: &[u8]) -> MemResult<()> {
        for (i, byte) in data.iter().enumerate() {
            let at = address
                .checked_add(i as u64)
                .ok_or(MemoryFault::OutOfBounds { address, width: 1 })?;
            self.write(at, 1, u64::from(*byte))?;
        }
        Ok(())
    }

    fn read_bytes(&mut self, address: u64, len: usize) -> MemResult<Vec<u8>> {
        let mut out = Vec::with_capacity(len);
        for i in 0..len as u64 {
            let at = address
                .checked_add(i)
                .ok_or(MemoryFault::OutOfBounds { address, width: 1 })?;
            out.push(self.read(at, 1)? as u8);
        }
        Ok(out)
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Backend selection
// ══════════════════════════════════════════════════════════════════════════════

/// Which backend a simulation uses; fixed at construction.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MemoryKind {
    /// `capacity` bytes, rounded up to whole words.
    Flat { capacity: u64 },
    #[default]
    Sparse,
}

impl MemoryKind {
    pub fn build(&self) -> MemResult<AnyMemory> {
        let memory = match self {
            MemoryKind::Flat { capacity } => AnyMemory::Flat(FlatMemory::new(*capacity)?),
            MemoryKind::Sparse => AnyMemory::Block(BlockMemory::new()),
        };
        Ok(memory)
    }
}

#[derive(Debug)]
pub enum AnyMemory {
    Flat(FlatMemory),
    Block(BlockMemory),
}

impl Memory for AnyMemory {
    fn aligned_read(&mut self, address: u64, width: usize) -> MemResult<u64> {
        match self {
            AnyMemory::Flat(m) => m.aligned_read(address, width),
            AnyMemory::Block(m) => m.aligned_read(address, width),
        }
    }

    fn aligned_write(&mut self, address: u64, width: usize, value: u64) -> MemResult<()> {
        match self {
            AnyMemory::Flat(m) => m.aligned_write(address, width, value),
            AnyMemory::Block(m) => m.aligned_write(address, width, value),
        }
    }
}
