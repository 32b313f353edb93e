// SPDX-FileCopyrightText: 2026 Google LLC
//
// SPDX-License-Identifier: Apache-2.0

//! Cluster DMA between L2 and the cluster's L1.

use core::cell::Cell;

use log::trace;
use pmsis_hal::transfer::{Direction, Stride2d};
use pmsis_hal::{DeviceError, Task};

use crate::transport::{Transfer, Transport};

/// Descriptor of one DMA copy, owned by the caller for the lifetime of the
/// copy.
pub struct DmaCopy {
    merge: Cell<bool>,
    id: Cell<u32>,
    transfer: Cell<Option<Transfer>>,
    done: Task,
}

impl DmaCopy {
    pub const fn new() -> Self {
        DmaCopy {
            merge: Cell::new(false),
            id: Cell::new(0),
            transfer: Cell::new(None),
            done: Task::new(),
        }
    }

    /// Hardware counter the copy was accounted on. Merged copies share the
    /// counter of the copy they were merged into.
    pub fn id(&self) -> u32 {
        self.id.get()
    }

    pub fn is_merged(&self) -> bool {
        self.merge.get()
    }

    pub fn transfer(&self) -> Option<Transfer> {
        self.transfer.get()
    }

    pub fn is_done(&self) -> bool {
        self.done.is_done()
    }
}

impl Default for DmaCopy {
    fn default() -> Self {
        Self::new()
    }
}

pub struct ClusterDma<T: Transport> {
    transport: T,
    next_id: u32,
    /// Counter of the last accepted copy, the one a merge joins.
    last_id: Option<u32>,
}

impl<T: Transport> ClusterDma<T> {
    /// `transport` sees L2 as its external memory.
    pub fn new(transport: T) -> Self {
        ClusterDma {
            transport,
            next_id: 0,
            last_id: None,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    unsafe fn start(
        &mut self,
        transfer: Transfer,
        merge: bool,
        copy: &DmaCopy,
    ) -> Result<(), DeviceError> {
        let id = match (merge, self.last_id) {
            (true, Some(id)) => id,
            (true, None) => return Err(DeviceError::InvalidArgument),
            (false, _) => self.next_id,
        };
        self.transport.submit(&transfer, &copy.done)?;
        if !merge {
            self.next_id = self.next_id.wrapping_add(1);
        }
        self.last_id = Some(id);
        copy.merge.set(merge);
        copy.id.set(id);
        copy.transfer.set(Some(transfer));
        trace!(
            "dma {} {:?} {} bytes ext {:#x}",
            id,
            transfer.dir,
            transfer.size,
            transfer.ext_addr
        );
        Ok(())
    }

    /// Copy `size` bytes between L2 address `ext` and `loc`.
    ///
    /// With `merge` the copy is accounted on the counter of the previous
    /// one; merging without an earlier copy is an `InvalidArgument`.
    ///
    /// # Safety
    ///
    /// `loc` must be valid for `size` bytes in the direction `dir`, and both
    /// `loc` and `copy` must stay untouched until the copy is waited for.
    pub unsafe fn memcpy(
        &mut self,
        ext: u32,
        loc: *mut u8,
        size: u16,
        dir: Direction,
        merge: bool,
        copy: &DmaCopy,
    ) -> Result<(), DeviceError> {
        self.start(Transfer::linear(ext, loc, size as u32, dir), merge, copy)
    }

    /// 2-D flavour of [`ClusterDma::memcpy`]: lines of `length` bytes,
    /// `stride` bytes apart in L2, packed in `loc`.
    ///
    /// # Safety
    ///
    /// See [`ClusterDma::memcpy`].
    #[allow(clippy::too_many_arguments)]
    pub unsafe fn memcpy_2d(
        &mut self,
        ext: u32,
        loc: *mut u8,
        size: u16,
        stride: u16,
        length: u16,
        dir: Direction,
        merge: bool,
        copy: &DmaCopy,
    ) -> Result<(), DeviceError> {
        let geometry = Stride2d {
            stride: stride as u32,
            length: length as u32,
        };
        self.start(
            Transfer::strided(ext, loc, size as u32, geometry, dir),
            merge,
            copy,
        )
    }

    /// Block until `copy` has landed.
    pub fn wait(&self, copy: &DmaCopy) {
        copy.done.wait();
    }
}
