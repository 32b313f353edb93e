// SPDX-FileCopyrightText: 2026 Google LLC
//
// SPDX-License-Identifier: Apache-2.0

#![no_std]

#[cfg(feature = "cluster")]
pub mod cluster;
pub mod console;
pub mod gpio;
pub mod hyperbus;
pub mod i2s;
pub mod malloc;
pub mod transport;
