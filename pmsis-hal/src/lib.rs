// SPDX-FileCopyrightText: 2026 Google LLC
//
// SPDX-License-Identifier: Apache-2.0

//! Core of the PMSIS driver model: the completion record every asynchronous
//! driver call reports through, the device capability interface, and the
//! geometry of (2-D) memory transfers.

#![no_std]

pub mod chip;
pub mod device;
pub mod sync;
pub mod task;
pub mod transfer;

pub use device::{Device, DeviceError};
pub use task::Task;
