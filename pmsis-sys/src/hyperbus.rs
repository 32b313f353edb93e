// SPDX-FileCopyrightText: 2026 Google LLC
//
// SPDX-License-Identifier: Apache-2.0

//! Hyperbus driver for HyperFlash and HyperRAM devices.
//!
//! Transfers go through a [`Transport`]; on RAM devices the driver also
//! manages the external address space with an [`Allocator`].

use log::{debug, warn};
use pmsis_hal::transfer::{Direction, Stride2d};
use pmsis_hal::{Device, DeviceError, Task};
use ufmt::derive::uDebug;

use crate::malloc::Allocator;
use crate::transport::{Transfer, Transport};

/// `ioctl` command returning the size of the RAM in bytes.
pub const HYPER_IOCTL_RAM_SIZE: u32 = 0;
/// `ioctl` command returning the number of unallocated RAM bytes.
pub const HYPER_IOCTL_FREE_BYTES: u32 = 1;

/// Free-list entries of the HyperRAM allocator.
const HEAP_CHUNKS: usize = 32;

#[derive(uDebug, Debug, Copy, Clone, PartialEq, Eq)]
pub enum HyperType {
    Flash,
    Ram,
}

#[derive(uDebug, Debug, Copy, Clone, PartialEq, Eq)]
pub struct HyperConf {
    /// Chip select the device is wired to.
    pub cs: u32,
    pub hyper_type: HyperType,
    /// Hyperbus interface.
    pub id: u8,
    /// Bytes of RAM behind the interface. Ignored for flash.
    pub ram_size: u32,
}

impl Default for HyperConf {
    fn default() -> Self {
        HyperConf {
            cs: 0,
            hyper_type: HyperType::Ram,
            id: 0,
            ram_size: 8 << 20,
        }
    }
}

pub struct Hyperbus<T: Transport> {
    conf: HyperConf,
    transport: T,
    heap: Allocator<HEAP_CHUNKS>,
    open: bool,
}

impl<T: Transport> Hyperbus<T> {
    /// A closed driver for the device described by `conf`.
    pub fn new(conf: HyperConf, transport: T) -> Self {
        Hyperbus {
            conf,
            transport,
            heap: Allocator::new(),
            open: false,
        }
    }

    pub fn conf(&self) -> &HyperConf {
        &self.conf
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    fn check_open(&self) -> Result<(), DeviceError> {
        if self.open {
            Ok(())
        } else {
            warn!("hyperbus {} used while closed", self.conf.id);
            Err(DeviceError::NotOpen)
        }
    }

    /// Start `transfer`; `task` completes after its last chunk.
    ///
    /// # Safety
    ///
    /// See [`Transport::submit`].
    pub unsafe fn copy_async(&mut self, transfer: &Transfer, task: &Task) -> Result<(), DeviceError> {
        self.check_open()?;
        self.transport.submit(transfer, task).map_err(|e| {
            warn!("hyperbus transfer at {:#x} rejected: {:?}", transfer.ext_addr, e);
            e
        })
    }

    /// Perform `transfer` and wait for it.
    ///
    /// # Safety
    ///
    /// `transfer.local` must be valid for `transfer.size` bytes in the
    /// transfer direction.
    pub unsafe fn copy(&mut self, transfer: &Transfer) -> Result<(), DeviceError> {
        let task = Task::new();
        self.copy_async(transfer, &task)?;
        task.wait();
        Ok(())
    }

    /// Read `size` bytes as lines of `geometry.length` bytes, `geometry.stride`
    /// apart in the device, into a packed buffer.
    ///
    /// # Safety
    ///
    /// `buffer` must be valid for writes of `size` bytes, and both `buffer`
    /// and `task` must stay alive and untouched until `task` is done.
    pub unsafe fn read_2d_async(
        &mut self,
        addr: u32,
        buffer: *mut u8,
        size: u32,
        geometry: Stride2d,
        task: &Task,
    ) -> Result<(), DeviceError> {
        let transfer = Transfer::strided(addr, buffer, size, geometry, Direction::ExternalToLocal);
        self.copy_async(&transfer, task)
    }

    /// Write a packed buffer of `size` bytes as lines `geometry.stride` apart.
    ///
    /// # Safety
    ///
    /// `buffer` must be valid for reads of `size` bytes, and both `buffer`
    /// and `task` must stay alive and untouched until `task` is done.
    pub unsafe fn write_2d_async(
        &mut self,
        addr: u32,
        buffer: *const u8,
        size: u32,
        geometry: Stride2d,
        task: &Task,
    ) -> Result<(), DeviceError> {
        let transfer = Transfer::strided(
            addr,
            buffer.cast_mut(),
            size,
            geometry,
            Direction::LocalToExternal,
        );
        self.copy_async(&transfer, task)
    }

    pub fn read_2d(&mut self, addr: u32, buffer: &mut [u8], geometry: Stride2d) -> Result<(), DeviceError> {
        let size = u32::try_from(buffer.len()).map_err(|_| DeviceError::InvalidArgument)?;
        let task = Task::new();
        unsafe { self.read_2d_async(addr, buffer.as_mut_ptr(), size, geometry, &task)? };
        task.wait();
        Ok(())
    }

    pub fn write_2d(&mut self, addr: u32, buffer: &[u8], geometry: Stride2d) -> Result<(), DeviceError> {
        let size = u32::try_from(buffer.len()).map_err(|_| DeviceError::InvalidArgument)?;
        let task = Task::new();
        unsafe { self.write_2d_async(addr, buffer.as_ptr(), size, geometry, &task)? };
        task.wait();
        Ok(())
    }

    /// Reserve `size` bytes of HyperRAM. `None` when the device is closed, is
    /// a flash, or has no room left.
    pub fn alloc(&mut self, size: u32) -> Option<u32> {
        if !self.open || self.conf.hyper_type != HyperType::Ram {
            warn!("hyperram alloc on a closed or flash device");
            return None;
        }
        self.heap.alloc(size)
    }

    /// Give back `size` bytes at `chunk`, as returned by [`Hyperbus::alloc`].
    pub fn free(&mut self, chunk: u32, size: u32) -> Result<(), DeviceError> {
        self.check_open()?;
        if self.conf.hyper_type != HyperType::Ram {
            return Err(DeviceError::Unsupported);
        }
        Ok(self.heap.free(chunk, size)?)
    }

    pub fn heap(&self) -> &Allocator<HEAP_CHUNKS> {
        &self.heap
    }
}

impl<T: Transport> Device for Hyperbus<T> {
    fn open(&mut self) -> Result<(), DeviceError> {
        if self.open {
            return Err(DeviceError::AlreadyOpen);
        }
        if self.conf.hyper_type == HyperType::Ram {
            if self.conf.ram_size == 0 {
                return Err(DeviceError::InvalidArgument);
            }
            self.heap.init(0, self.conf.ram_size);
        }
        self.open = true;
        debug!(
            "hyperbus {} open, cs {}, {:?}",
            self.conf.id, self.conf.cs, self.conf.hyper_type
        );
        Ok(())
    }

    fn close(&mut self) {
        if self.open {
            debug!("hyperbus {} closed", self.conf.id);
        }
        self.open = false;
    }

    unsafe fn read_async(
        &mut self,
        addr: u32,
        buffer: *mut u8,
        size: usize,
        task: &Task,
    ) -> Result<(), DeviceError> {
        let size = u32::try_from(size).map_err(|_| DeviceError::InvalidArgument)?;
        let transfer = Transfer::linear(addr, buffer, size, Direction::ExternalToLocal);
        self.copy_async(&transfer, task)
    }

    unsafe fn write_async(
        &mut self,
        addr: u32,
        buffer: *const u8,
        size: usize,
        task: &Task,
    ) -> Result<(), DeviceError> {
        let size = u32::try_from(size).map_err(|_| DeviceError::InvalidArgument)?;
        let transfer = Transfer::linear(addr, buffer.cast_mut(), size, Direction::LocalToExternal);
        self.copy_async(&transfer, task)
    }

    fn ioctl(&mut self, cmd: u32, _arg: usize) -> Result<usize, DeviceError> {
        self.check_open()?;
        match cmd {
            HYPER_IOCTL_RAM_SIZE => Ok(self.conf.ram_size as usize),
            HYPER_IOCTL_FREE_BYTES => Ok(self.heap.free_bytes() as usize),
            _ => Err(DeviceError::Unsupported),
        }
    }
}
