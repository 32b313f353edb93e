// SPDX-FileCopyrightText: 2026 Google LLC
//
// SPDX-License-Identifier: Apache-2.0

//! Movement of bytes between external memory and local buffers.
//!
//! Drivers are generic over a [`Transport`], so the same driver code runs on
//! the uDMA engine of the chip or on [`emul::EmulatedTransport`] on a host.

use core::ops;

use pmsis_hal::transfer::{ChunkPlan, Direction, Stride2d};
use pmsis_hal::{DeviceError, Task};
use ufmt::derive::uDebug;

pub mod emul;
pub mod self_test;

/// Memory level the external side of a transport belongs to.
#[derive(uDebug, Debug, Copy, Clone, PartialEq, Eq)]
pub enum MemoryLevel {
    /// On-chip L2, seen from the cluster.
    L2,
    /// Off-chip memory behind the Hyperbus.
    L3,
}

/// A request to copy `size` bytes between external memory and a local buffer.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Transfer {
    pub ext_addr: u32,
    pub local: *mut u8,
    pub size: u32,
    pub geometry: Option<Stride2d>,
    pub dir: Direction,
}

impl Transfer {
    pub fn linear(ext_addr: u32, local: *mut u8, size: u32, dir: Direction) -> Transfer {
        Transfer {
            ext_addr,
            local,
            size,
            geometry: None,
            dir,
        }
    }

    pub fn strided(
        ext_addr: u32,
        local: *mut u8,
        size: u32,
        geometry: Stride2d,
        dir: Direction,
    ) -> Transfer {
        Transfer {
            ext_addr,
            local,
            size,
            geometry: Some(geometry),
            dir,
        }
    }

    pub fn is_2d(&self) -> bool {
        self.geometry.is_some()
    }

    /// Chunks making up this transfer, or `InvalidArgument` if the 2-D
    /// geometry does not divide the size into whole lines.
    pub fn plan(&self) -> Result<ChunkPlan, DeviceError> {
        match self.geometry {
            Some(geometry) => ChunkPlan::strided(self.size, geometry),
            None => Ok(ChunkPlan::linear(self.size)),
        }
    }
}

/// Strategy executing transfers on behalf of a driver.
pub trait Transport {
    /// Validate `transfer`, issue `task` and start moving data. `task` is
    /// completed once the last chunk has landed. On `Err` the task is left
    /// untouched.
    ///
    /// # Safety
    ///
    /// `transfer.local` must be valid for `transfer.size` bytes in the
    /// transfer direction (writes for reads from external memory, reads for
    /// writes to it). The buffer and `task` must stay alive and must not be
    /// accessed by the caller until `task` is done.
    unsafe fn submit(&mut self, transfer: &Transfer, task: &Task) -> Result<(), DeviceError>;
}

/// Bytes moved per memory level and direction.
#[derive(uDebug, Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct TrafficStats {
    pub l2_read: u64,
    pub l2_write: u64,
    pub l3_read: u64,
    pub l3_write: u64,
}

impl TrafficStats {
    pub fn record(&mut self, level: MemoryLevel, dir: Direction, bytes: u32) {
        let counter = match (level, dir) {
            (MemoryLevel::L2, Direction::ExternalToLocal) => &mut self.l2_read,
            (MemoryLevel::L2, Direction::LocalToExternal) => &mut self.l2_write,
            (MemoryLevel::L3, Direction::ExternalToLocal) => &mut self.l3_read,
            (MemoryLevel::L3, Direction::LocalToExternal) => &mut self.l3_write,
        };
        *counter += bytes as u64;
    }

    pub fn total(&self) -> u64 {
        self.l2_read + self.l2_write + self.l3_read + self.l3_write
    }
}

impl ops::Add for TrafficStats {
    type Output = TrafficStats;

    fn add(self, rhs: TrafficStats) -> TrafficStats {
        TrafficStats {
            l2_read: self.l2_read + rhs.l2_read,
            l2_write: self.l2_write + rhs.l2_write,
            l3_read: self.l3_read + rhs.l3_read,
            l3_write: self.l3_write + rhs.l3_write,
        }
    }
}
