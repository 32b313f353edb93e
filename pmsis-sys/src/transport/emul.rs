// SPDX-FileCopyrightText: 2026 Google LLC
//
// SPDX-License-Identifier: Apache-2.0

//! Host stand-in for the uDMA engine: external memory is a byte slice and
//! every transfer finishes before `submit` returns.

use core::ptr;

use log::trace;
use pmsis_hal::transfer::Direction;
use pmsis_hal::{DeviceError, Task};

use super::{MemoryLevel, Transfer, TrafficStats, Transport};

pub struct EmulatedTransport<'m> {
    memory: &'m mut [u8],
    base: u32,
    level: MemoryLevel,
    stats: TrafficStats,
}

impl<'m> EmulatedTransport<'m> {
    /// Back external addresses `base..base + memory.len()` with `memory`.
    pub fn new(memory: &'m mut [u8], base: u32, level: MemoryLevel) -> Self {
        EmulatedTransport {
            memory,
            base,
            level,
            stats: TrafficStats::default(),
        }
    }

    pub fn base(&self) -> u32 {
        self.base
    }

    pub fn level(&self) -> MemoryLevel {
        self.level
    }

    pub fn memory(&self) -> &[u8] {
        &*self.memory
    }

    pub fn memory_mut(&mut self) -> &mut [u8] {
        &mut *self.memory
    }

    pub fn stats(&self) -> TrafficStats {
        self.stats
    }

    /// Return the counters accumulated so far and start over from zero.
    pub fn take_stats(&mut self) -> TrafficStats {
        core::mem::take(&mut self.stats)
    }

    pub fn reset_stats(&mut self) {
        self.stats = TrafficStats::default();
    }

    /// Perform `transfer` chunk by chunk.
    ///
    /// The whole external range is checked before the first byte moves, so a
    /// rejected transfer leaves both sides untouched.
    ///
    /// # Safety
    ///
    /// `transfer.local` must be valid for `transfer.size` bytes in the
    /// transfer direction.
    pub unsafe fn copy(&mut self, transfer: &Transfer) -> Result<(), DeviceError> {
        let plan = transfer.plan()?;
        let start = transfer
            .ext_addr
            .checked_sub(self.base)
            .ok_or(DeviceError::OutOfBounds)? as usize;
        let end = start
            .checked_add(plan.ext_span() as usize)
            .ok_or(DeviceError::OutOfBounds)?;
        if end > self.memory.len() {
            return Err(DeviceError::OutOfBounds);
        }

        self.stats.record(self.level, transfer.dir, transfer.size);
        let memory = self.memory.as_mut_ptr();
        for chunk in plan {
            let ext = memory.add(start + chunk.ext_offset as usize);
            let local = transfer.local.add(chunk.local_offset as usize);
            trace!(
                "chunk ext {:#x} local {:p} len {}",
                transfer.ext_addr.wrapping_add(chunk.ext_offset),
                local,
                chunk.len
            );
            match transfer.dir {
                Direction::ExternalToLocal => ptr::copy(ext, local, chunk.len as usize),
                Direction::LocalToExternal => ptr::copy(local, ext, chunk.len as usize),
            }
        }
        Ok(())
    }
}

impl Transport for EmulatedTransport<'_> {
    unsafe fn submit(&mut self, transfer: &Transfer, task: &Task) -> Result<(), DeviceError> {
        self.copy(transfer)?;
        trace!(
            "{:?} transfer of {} bytes at {:#x} done",
            transfer.dir,
            transfer.size,
            transfer.ext_addr
        );
        task.complete_immediately();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pmsis_hal::transfer::Stride2d;

    #[test]
    fn rejects_addresses_below_base() {
        let mut memory = [0u8; 16];
        let mut transport = EmulatedTransport::new(&mut memory, 0x100, MemoryLevel::L3);
        let mut buf = [0u8; 4];
        let transfer = Transfer::linear(0xfc, buf.as_mut_ptr(), 4, Direction::ExternalToLocal);
        assert_eq!(
            unsafe { transport.copy(&transfer) },
            Err(DeviceError::OutOfBounds)
        );
        assert_eq!(transport.stats().total(), 0);
    }

    #[test]
    fn rejects_span_past_the_end() {
        let mut memory = [0u8; 64];
        let mut transport = EmulatedTransport::new(&mut memory, 0, MemoryLevel::L3);
        let mut buf = [0u8; 32];
        let geometry = Stride2d {
            stride: 32,
            length: 16,
        };
        // Two lines span 48 bytes: fine from 0, past the end from 32.
        let fits = Transfer::strided(0, buf.as_mut_ptr(), 32, geometry, Direction::ExternalToLocal);
        assert_eq!(unsafe { transport.copy(&fits) }, Ok(()));
        let spills = Transfer::strided(32, buf.as_mut_ptr(), 32, geometry, Direction::ExternalToLocal);
        assert_eq!(
            unsafe { transport.copy(&spills) },
            Err(DeviceError::OutOfBounds)
        );
    }

    #[test]
    fn write_lands_at_offset_from_base() {
        let mut memory = [0u8; 8];
        let mut transport = EmulatedTransport::new(&mut memory, 0x1000, MemoryLevel::L2);
        let mut data = [1u8, 2, 3];
        let transfer = Transfer::linear(0x1004, data.as_mut_ptr(), 3, Direction::LocalToExternal);
        unsafe { transport.copy(&transfer).unwrap() };
        assert_eq!(transport.memory(), &[0, 0, 0, 0, 1, 2, 3, 0]);
        assert_eq!(transport.stats().l2_write, 3);
    }
}
