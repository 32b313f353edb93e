// SPDX-FileCopyrightText: 2026 Google LLC
//
// SPDX-License-Identifier: Apache-2.0

//! GPIO port with edge notifications.
//!
//! Edges are observed two ways: a sticky per-pin notification flag that the
//! application polls and clears, or a one-shot [`Task`] attached to a pin
//! that completes on the next matching edge.

use core::ops::BitOr;
use core::ptr;

use log::{debug, trace};
use pmsis_hal::{Device, DeviceError, Task};
use ufmt::derive::uDebug;

pub const GPIO_PINS: u32 = 32;

/// Pin configuration bits.
#[derive(uDebug, Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct GpioFlags(u8);

impl GpioFlags {
    pub const PULL_DISABLE: GpioFlags = GpioFlags(0);
    pub const PULL_ENABLE: GpioFlags = GpioFlags(1 << 0);
    pub const DRIVE_STRENGTH_LOW: GpioFlags = GpioFlags(0);
    pub const DRIVE_STRENGTH_HIGH: GpioFlags = GpioFlags(1 << 1);
    pub const INPUT: GpioFlags = GpioFlags(0);
    pub const OUTPUT: GpioFlags = GpioFlags(1 << 2);

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn contains(self, other: GpioFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for GpioFlags {
    type Output = GpioFlags;

    fn bitor(self, rhs: GpioFlags) -> GpioFlags {
        GpioFlags(self.0 | rhs.0)
    }
}

/// Edges that raise a notification.
#[derive(uDebug, Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum GpioNotif {
    Fall = 0,
    Rise = 1,
    /// Either edge.
    Edge = 2,
    #[default]
    None = 3,
}

impl GpioNotif {
    fn matches(self, old: bool, new: bool) -> bool {
        match self {
            GpioNotif::Fall => old && !new,
            GpioNotif::Rise => !old && new,
            GpioNotif::Edge => old != new,
            GpioNotif::None => false,
        }
    }
}

#[derive(uDebug, Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct GpioConf {
    /// Port index; every port holds up to 32 pins.
    pub port: u32,
}

#[derive(Copy, Clone)]
struct PinTask<'a> {
    task: &'a Task,
    notif: GpioNotif,
}

/// One emulated GPIO port.
pub struct GpioPort<'a> {
    conf: GpioConf,
    open: bool,
    output_mask: u32,
    pull_mask: u32,
    drive_mask: u32,
    output: u32,
    input: u32,
    notif: [GpioNotif; GPIO_PINS as usize],
    notified: u32,
    tasks: [Option<PinTask<'a>>; GPIO_PINS as usize],
}

fn pin_bit(pin: u32) -> Result<u32, DeviceError> {
    if pin >= GPIO_PINS {
        return Err(DeviceError::InvalidArgument);
    }
    Ok(1 << pin)
}

fn pins(mask: u32) -> impl Iterator<Item = u32> {
    (0..GPIO_PINS).filter(move |pin| mask & (1u32 << *pin) != 0)
}

impl<'a> GpioPort<'a> {
    pub fn new(conf: GpioConf) -> Self {
        GpioPort {
            conf,
            open: false,
            output_mask: 0,
            pull_mask: 0,
            drive_mask: 0,
            output: 0,
            input: 0,
            notif: [GpioNotif::None; GPIO_PINS as usize],
            notified: 0,
            tasks: [None; GPIO_PINS as usize],
        }
    }

    pub fn conf(&self) -> &GpioConf {
        &self.conf
    }

    fn check_open(&self) -> Result<(), DeviceError> {
        if self.open {
            Ok(())
        } else {
            Err(DeviceError::NotOpen)
        }
    }

    /// Flags currently applied to `pin`.
    pub fn pin_flags(&self, pin: u32) -> Result<GpioFlags, DeviceError> {
        let bit = pin_bit(pin)?;
        let mut flags = GpioFlags::default();
        if self.pull_mask & bit != 0 {
            flags = flags | GpioFlags::PULL_ENABLE;
        }
        if self.drive_mask & bit != 0 {
            flags = flags | GpioFlags::DRIVE_STRENGTH_HIGH;
        }
        if self.output_mask & bit != 0 {
            flags = flags | GpioFlags::OUTPUT;
        }
        Ok(flags)
    }

    pub fn pin_configure(&mut self, pin: u32, flags: GpioFlags) -> Result<(), DeviceError> {
        let bit = pin_bit(pin)?;
        self.mask_configure(bit, flags)
    }

    pub fn mask_configure(&mut self, mask: u32, flags: GpioFlags) -> Result<(), DeviceError> {
        self.check_open()?;
        let apply = |reg: &mut u32, set: bool| {
            if set {
                *reg |= mask;
            } else {
                *reg &= !mask;
            }
        };
        apply(&mut self.pull_mask, flags.contains(GpioFlags::PULL_ENABLE));
        apply(
            &mut self.drive_mask,
            flags.contains(GpioFlags::DRIVE_STRENGTH_HIGH),
        );
        apply(&mut self.output_mask, flags.contains(GpioFlags::OUTPUT));
        trace!("gpio mask {:#x} configured {:#x}", mask, flags.bits());
        Ok(())
    }

    pub fn pin_write(&mut self, pin: u32, value: u32) -> Result<(), DeviceError> {
        let bit = pin_bit(pin)?;
        self.mask_write(bit, if value != 0 { bit } else { 0 })
    }

    /// Set the output latch of the pins in `mask` to the matching bits of
    /// `value`.
    pub fn mask_write(&mut self, mask: u32, value: u32) -> Result<(), DeviceError> {
        self.check_open()?;
        self.output = (self.output & !mask) | (value & mask);
        Ok(())
    }

    pub fn pin_read(&self, pin: u32) -> Result<u32, DeviceError> {
        let bit = pin_bit(pin)?;
        Ok(self.mask_read(bit)? >> pin)
    }

    /// Level of the pins in `mask`: the latch for outputs, the driven level
    /// for inputs.
    pub fn mask_read(&self, mask: u32) -> Result<u32, DeviceError> {
        self.check_open()?;
        let levels = (self.output & self.output_mask) | (self.input & !self.output_mask);
        Ok(levels & mask)
    }

    /// Select the edges that set the notification flag of `pin`.
    pub fn pin_notif_configure(&mut self, pin: u32, notif: GpioNotif) -> Result<(), DeviceError> {
        let bit = pin_bit(pin)?;
        self.check_open()?;
        self.notif[pin as usize] = notif;
        self.notified &= !bit;
        Ok(())
    }

    pub fn pin_notif_clear(&mut self, pin: u32) -> Result<(), DeviceError> {
        let bit = pin_bit(pin)?;
        self.check_open()?;
        self.notified &= !bit;
        Ok(())
    }

    /// Whether a configured edge happened on `pin` since the last clear.
    pub fn pin_notif_get(&self, pin: u32) -> Result<bool, DeviceError> {
        let bit = pin_bit(pin)?;
        self.check_open()?;
        Ok(self.notified & bit != 0)
    }

    /// Issue `task` and complete it on the next `notif` edge of `pin`. Word
    /// 0 of the task receives the pin number.
    pub fn pin_task_add(
        &mut self,
        pin: u32,
        task: &'a Task,
        notif: GpioNotif,
    ) -> Result<(), DeviceError> {
        let bit = pin_bit(pin)?;
        self.mask_task_add(bit, task, notif)
    }

    /// Like [`GpioPort::pin_task_add`] for every pin of `mask`; the first
    /// matching edge on any of them completes `task`.
    pub fn mask_task_add(
        &mut self,
        mask: u32,
        task: &'a Task,
        notif: GpioNotif,
    ) -> Result<(), DeviceError> {
        self.check_open()?;
        if mask == 0 || notif == GpioNotif::None {
            return Err(DeviceError::InvalidArgument);
        }
        if pins(mask).any(|pin| self.tasks[pin as usize].is_some()) {
            return Err(DeviceError::Busy);
        }
        task.issue();
        for pin in pins(mask) {
            self.tasks[pin as usize] = Some(PinTask { task, notif });
        }
        Ok(())
    }

    /// Detach the task waiting on `pin`. A detached task that did not fire
    /// stays pending.
    pub fn pin_task_remove(&mut self, pin: u32) -> Result<(), DeviceError> {
        let bit = pin_bit(pin)?;
        self.mask_task_remove(bit)
    }

    pub fn mask_task_remove(&mut self, mask: u32) -> Result<(), DeviceError> {
        self.check_open()?;
        for pin in pins(mask) {
            self.tasks[pin as usize] = None;
        }
        Ok(())
    }

    /// Drive the external level of `pin`, as the outside world would.
    /// Edges update notification flags and complete attached tasks.
    pub fn drive_input(&mut self, pin: u32, level: bool) -> Result<(), DeviceError> {
        let bit = pin_bit(pin)?;
        let old = self.input & bit != 0;
        if level {
            self.input |= bit;
        } else {
            self.input &= !bit;
        }
        if !self.open || old == level {
            return Ok(());
        }

        if self.notif[pin as usize].matches(old, level) {
            self.notified |= bit;
        }
        if let Some(attached) = self.tasks[pin as usize] {
            if attached.notif.matches(old, level) {
                for slot in self.tasks.iter_mut() {
                    if slot.map_or(false, |t| ptr::eq(t.task, attached.task)) {
                        *slot = None;
                    }
                }
                trace!("gpio {} edge completes task", pin);
                attached.task.set_arg(0, pin as usize);
                attached.task.complete();
            }
        }
        Ok(())
    }
}

impl Device for GpioPort<'_> {
    fn open(&mut self) -> Result<(), DeviceError> {
        if self.open {
            return Err(DeviceError::AlreadyOpen);
        }
        self.open = true;
        debug!("gpio port {} open", self.conf.port);
        Ok(())
    }

    fn close(&mut self) {
        self.open = false;
        debug!("gpio port {} closed", self.conf.port);
    }
}
