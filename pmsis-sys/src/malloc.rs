// SPDX-FileCopyrightText: 2026 Google LLC
//
// SPDX-License-Identifier: Apache-2.0

//! First-fit allocator over a range of addresses.
//!
//! The allocator only hands out addresses, it never touches the memory
//! itself, so it serves L2, cluster L1 and HyperRAM alike. Exhaustion is
//! reported with `None`; callers pass the size back to [`Allocator::free`].

use heapless::Vec;
use log::{debug, warn};
use pmsis_hal::DeviceError;
use ufmt::derive::uDebug;

/// Granularity of every allocation.
pub const ALIGN: u32 = 4;

#[derive(uDebug, Debug, Copy, Clone, PartialEq, Eq)]
pub enum AllocError {
    /// The chunk lies outside the managed range or overlaps free memory.
    InvalidFree,
    /// Returning the chunk would need more free-list entries than available.
    Fragmented,
}

impl From<AllocError> for DeviceError {
    fn from(e: AllocError) -> DeviceError {
        match e {
            AllocError::InvalidFree => DeviceError::InvalidArgument,
            AllocError::Fragmented => DeviceError::NoMemory,
        }
    }
}

/// A free range of `size` bytes starting at `addr`.
#[derive(uDebug, Debug, Copy, Clone, PartialEq, Eq)]
pub struct FreeChunk {
    pub addr: u32,
    pub size: u32,
}

impl FreeChunk {
    fn end(&self) -> u32 {
        self.addr + self.size
    }
}

/// Allocator tracking at most `N` disjoint free chunks, sorted by address.
pub struct Allocator<const N: usize> {
    free: Vec<FreeChunk, N>,
    base: u32,
    size: u32,
}

fn align_up(value: u32, align: u32) -> Option<u32> {
    Some(value.checked_add(align - 1)? & !(align - 1))
}

impl<const N: usize> Allocator<N> {
    /// An allocator with nothing to hand out until [`Allocator::init`].
    pub const fn new() -> Self {
        Allocator {
            free: Vec::new(),
            base: 0,
            size: 0,
        }
    }

    /// Manage `size` bytes starting at `base`, forgetting earlier state.
    /// Both ends are trimmed inwards to the allocation granularity.
    pub fn init(&mut self, base: u32, size: u32) {
        self.free.clear();
        let start = align_up(base, ALIGN).unwrap_or(base);
        let end = base.saturating_add(size) & !(ALIGN - 1);
        self.base = start;
        self.size = end.saturating_sub(start);
        if self.size > 0 {
            // Fails only for N == 0, which leaves nothing to allocate.
            let _ = self.free.push(FreeChunk {
                addr: self.base,
                size: self.size,
            });
        }
        debug!("allocator init {:#x} + {}", self.base, self.size);
    }

    pub fn base(&self) -> u32 {
        self.base
    }

    /// Size of the managed range.
    pub fn capacity(&self) -> u32 {
        self.size
    }

    pub fn chunks(&self) -> &[FreeChunk] {
        &self.free
    }

    pub fn free_bytes(&self) -> u32 {
        self.free.iter().map(|c| c.size).sum()
    }

    pub fn largest_free(&self) -> u32 {
        self.free.iter().map(|c| c.size).max().unwrap_or(0)
    }

    /// Allocate `size` bytes, rounded up to [`ALIGN`]. Returns `None` for a
    /// zero size or when no free chunk is large enough.
    pub fn alloc(&mut self, size: u32) -> Option<u32> {
        self.alloc_align(size, ALIGN)
    }

    /// Allocate `size` bytes at an address that is a multiple of `align`.
    ///
    /// `align` must be a power of two; smaller values than [`ALIGN`] are
    /// raised to it.
    pub fn alloc_align(&mut self, size: u32, align: u32) -> Option<u32> {
        if size == 0 || !align.is_power_of_two() {
            return None;
        }
        let align = align.max(ALIGN);
        let size = align_up(size, ALIGN)?;

        for index in 0..self.free.len() {
            let chunk = self.free[index];
            let Some(addr) = align_up(chunk.addr, align) else {
                continue;
            };
            let Some(end) = addr.checked_add(size) else {
                continue;
            };
            if end > chunk.end() {
                continue;
            }

            let head = FreeChunk {
                addr: chunk.addr,
                size: addr - chunk.addr,
            };
            let tail = FreeChunk {
                addr: end,
                size: chunk.end() - end,
            };
            match (head.size > 0, tail.size > 0) {
                (false, false) => {
                    self.free.remove(index);
                }
                (false, true) => self.free[index] = tail,
                (true, false) => self.free[index] = head,
                (true, true) => {
                    if self.free.insert(index + 1, tail).is_err() {
                        // Splitting would overflow the free list.
                        continue;
                    }
                    self.free[index] = head;
                }
            }
            debug!("alloc {} bytes at {:#x}", size, addr);
            return Some(addr);
        }
        warn!(
            "alloc of {} bytes failed, {} free, largest {}",
            size,
            self.free_bytes(),
            self.largest_free()
        );
        None
    }

    /// Return `size` bytes at `addr` to the free list, merging with adjacent
    /// free chunks.
    pub fn free(&mut self, addr: u32, size: u32) -> Result<(), AllocError> {
        let size = align_up(size, ALIGN).ok_or(AllocError::InvalidFree)?;
        let end = addr.checked_add(size).ok_or(AllocError::InvalidFree)?;
        if size == 0 || addr % ALIGN != 0 || addr < self.base || end > self.base + self.size {
            warn!("invalid free of {} bytes at {:#x}", size, addr);
            return Err(AllocError::InvalidFree);
        }

        let index = self.free.iter().position(|c| c.addr >= addr).unwrap_or(self.free.len());
        let before = index.checked_sub(1).map(|i| self.free[i]);
        let after = self.free.get(index).copied();
        if before.map_or(false, |b| b.end() > addr) || after.map_or(false, |a| a.addr < end) {
            warn!("free of {} bytes at {:#x} overlaps free memory", size, addr);
            return Err(AllocError::InvalidFree);
        }

        let joins_before = before.map_or(false, |b| b.end() == addr);
        let joins_after = after.map_or(false, |a| a.addr == end);
        match (joins_before, joins_after) {
            (true, true) => {
                let merged = self.free.remove(index);
                self.free[index - 1].size += size + merged.size;
            }
            (true, false) => self.free[index - 1].size += size,
            (false, true) => {
                self.free[index].addr = addr;
                self.free[index].size += size;
            }
            (false, false) => {
                self.free
                    .insert(index, FreeChunk { addr, size })
                    .map_err(|_| AllocError::Fragmented)?;
            }
        }
        debug!("free {} bytes at {:#x}", size, addr);
        Ok(())
    }

    /// Log the free list.
    pub fn dump(&self) {
        debug!(
            "{} free chunks, {} bytes free of {}",
            self.free.len(),
            self.free_bytes(),
            self.size
        );
        for chunk in self.free.iter() {
            debug!("  {:#x} .. {:#x} ({} bytes)", chunk.addr, chunk.end(), chunk.size);
        }
    }
}

impl<const N: usize> Default for Allocator<N> {
    fn default() -> Self {
        Self::new()
    }
}
