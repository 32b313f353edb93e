// SPDX-FileCopyrightText: 2026 Google LLC
//
// SPDX-License-Identifier: Apache-2.0

//! Geometry of 1-D and 2-D memory transfers between an external memory
//! (HyperRAM, L2 seen from the cluster) and a local buffer.

use ufmt::derive::uDebug;

use crate::device::DeviceError;

#[derive(uDebug, Debug, Copy, Clone, PartialEq, Eq)]
pub enum Direction {
    /// Local buffer to external memory (a write).
    LocalToExternal = 0,
    /// External memory to local buffer (a read).
    ExternalToLocal = 1,
}

impl Direction {
    /// Convert the `ext2loc` flag of the C API.
    pub fn from_ext2loc(ext2loc: bool) -> Direction {
        if ext2loc {
            Direction::ExternalToLocal
        } else {
            Direction::LocalToExternal
        }
    }

    pub fn is_read(self) -> bool {
        self == Direction::ExternalToLocal
    }
}

/// Rectangular transfer parameters.
#[derive(uDebug, Debug, Copy, Clone, PartialEq, Eq)]
pub struct Stride2d {
    /// Bytes added to the start of the current line to reach the next one
    /// in external memory.
    pub stride: u32,
    /// Bytes transferred per line.
    pub length: u32,
}

/// One contiguous piece of a transfer.
#[derive(uDebug, Debug, Copy, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub ext_offset: u32,
    pub local_offset: u32,
    pub len: u32,
}

/// Iterator over the chunks of a transfer, in issue order.
///
/// After every chunk the external cursor advances by `stride` and the local
/// cursor by `length`, so lines are spread out in external memory and packed
/// in the local buffer.
#[derive(Debug, Clone)]
pub struct ChunkPlan {
    length: u32,
    stride: u32,
    remaining: u32,
    ext: u32,
    local: u32,
}

impl ChunkPlan {
    /// A plain copy of `size` bytes as a single chunk.
    pub fn linear(size: u32) -> ChunkPlan {
        ChunkPlan {
            length: size,
            stride: size,
            remaining: if size == 0 { 0 } else { 1 },
            ext: 0,
            local: 0,
        }
    }

    /// A 2-D copy of `size` bytes in lines of `geometry.length` bytes.
    ///
    /// Rejects a zero line length and sizes that are not a whole number of
    /// lines.
    pub fn strided(size: u32, geometry: Stride2d) -> Result<ChunkPlan, DeviceError> {
        if geometry.length == 0 || size % geometry.length != 0 {
            return Err(DeviceError::InvalidArgument);
        }
        let lines = size / geometry.length;
        let plan = ChunkPlan {
            length: geometry.length,
            stride: geometry.stride,
            remaining: lines,
            ext: 0,
            local: 0,
        };
        // The furthest external byte must be addressable.
        plan.checked_ext_span().ok_or(DeviceError::InvalidArgument)?;
        Ok(plan)
    }

    /// Number of chunks still to be produced.
    pub fn chunk_count(&self) -> u32 {
        self.remaining
    }

    /// Bytes of external memory touched, measured from the first chunk.
    pub fn ext_span(&self) -> u32 {
        self.checked_ext_span().unwrap_or(u32::MAX)
    }

    fn checked_ext_span(&self) -> Option<u32> {
        if self.remaining == 0 {
            return Some(0);
        }
        let last_start = (self.remaining - 1).checked_mul(self.stride)?;
        last_start.checked_add(self.length)
    }
}

impl Iterator for ChunkPlan {
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        if self.remaining == 0 {
            return None;
        }
        let chunk = Chunk {
            ext_offset: self.ext,
            local_offset: self.local,
            len: self.length,
        };
        self.remaining -= 1;
        if self.remaining > 0 {
            self.ext += self.stride;
            self.local += self.length;
        }
        Some(chunk)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.remaining as usize;
        (n, Some(n))
    }
}

impl ExactSizeIterator for ChunkPlan {}
