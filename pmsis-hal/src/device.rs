// SPDX-FileCopyrightText: 2026 Google LLC
//
// SPDX-License-Identifier: Apache-2.0

//! The capability interface every peripheral driver exposes.

use ufmt::derive::uDebug;

use crate::task::Task;

/// Immediate rejection reasons of a driver call.
#[derive(uDebug, Debug, Copy, Clone, PartialEq, Eq)]
pub enum DeviceError {
    /// The device was not opened, or already closed.
    NotOpen,
    /// `open` was called on a device that is open.
    AlreadyOpen,
    /// A parameter or configuration value is out of range.
    InvalidArgument,
    /// The transfer falls outside the memory backing the device.
    OutOfBounds,
    /// The driver does not implement this operation.
    Unsupported,
    /// The driver cannot accept another request right now.
    Busy,
    /// Not enough memory was available.
    NoMemory,
}

impl DeviceError {
    /// Negative status code as returned by the C drivers.
    pub fn code(self) -> i32 {
        match self {
            DeviceError::NotOpen => -1,
            DeviceError::AlreadyOpen => -2,
            DeviceError::InvalidArgument => -3,
            DeviceError::OutOfBounds => -4,
            DeviceError::Unsupported => -5,
            DeviceError::Busy => -6,
            DeviceError::NoMemory => -7,
        }
    }
}

/// Operations shared by all drivers.
///
/// Every operation comes in a synchronous and an asynchronous flavour. The
/// asynchronous flavour only reports whether the request was accepted; the
/// outcome is delivered by completing the supplied [`Task`]. The synchronous
/// flavours default to "issue with a stack task, then wait".
///
/// Operations a driver has no use for report [`DeviceError::Unsupported`].
pub trait Device {
    fn open(&mut self) -> Result<(), DeviceError>;

    fn close(&mut self);

    fn open_async(&mut self, task: &Task) -> Result<(), DeviceError> {
        self.open()?;
        task.complete_immediately();
        Ok(())
    }

    fn close_async(&mut self, task: &Task) {
        self.close();
        task.complete_immediately();
    }

    /// Start reading `size` bytes at device address `addr` into `buffer`.
    ///
    /// # Safety
    ///
    /// `buffer` must be valid for writes of `size` bytes, and both `buffer`
    /// and `task` must stay alive and untouched until `task` is done.
    unsafe fn read_async(
        &mut self,
        addr: u32,
        buffer: *mut u8,
        size: usize,
        task: &Task,
    ) -> Result<(), DeviceError> {
        let _ = (addr, buffer, size, task);
        Err(DeviceError::Unsupported)
    }

    /// Start writing `size` bytes from `buffer` to device address `addr`.
    ///
    /// # Safety
    ///
    /// `buffer` must be valid for reads of `size` bytes, and both `buffer`
    /// and `task` must stay alive and untouched until `task` is done.
    unsafe fn write_async(
        &mut self,
        addr: u32,
        buffer: *const u8,
        size: usize,
        task: &Task,
    ) -> Result<(), DeviceError> {
        let _ = (addr, buffer, size, task);
        Err(DeviceError::Unsupported)
    }

    fn read(&mut self, addr: u32, buffer: &mut [u8]) -> Result<(), DeviceError> {
        let task = Task::new();
        unsafe { self.read_async(addr, buffer.as_mut_ptr(), buffer.len(), &task)? };
        task.wait();
        Ok(())
    }

    fn write(&mut self, addr: u32, buffer: &[u8]) -> Result<(), DeviceError> {
        let task = Task::new();
        unsafe { self.write_async(addr, buffer.as_ptr(), buffer.len(), &task)? };
        task.wait();
        Ok(())
    }

    /// Driver-specific control call.
    fn ioctl(&mut self, cmd: u32, arg: usize) -> Result<usize, DeviceError> {
        let _ = (cmd, arg);
        Err(DeviceError::Unsupported)
    }

    /// Asynchronous control call. The ioctl result is stored in argument
    /// word 0 of `task` before it completes.
    fn ioctl_async(&mut self, cmd: u32, arg: usize, task: &Task) -> Result<(), DeviceError> {
        let result = self.ioctl(cmd, arg)?;
        task.issue();
        task.set_arg(0, result);
        task.complete();
        Ok(())
    }
}
