// SPDX-FileCopyrightText: 2026 Google LLC
//
// SPDX-License-Identifier: Apache-2.0

//! Byte sink for text output (a UART, a semihosting channel, a host buffer).

use core::fmt;

pub mod log;

/// Something that accepts bytes for display.
pub trait Console {
    fn write_bytes(&mut self, bytes: &[u8]);
}

impl<C: Console + ?Sized> Console for &mut C {
    fn write_bytes(&mut self, bytes: &[u8]) {
        (**self).write_bytes(bytes)
    }
}

/// Formatting adapter over a [`Console`], for both `core::fmt` and `ufmt`.
pub struct ConsoleWriter<C: Console>(pub C);

impl<C: Console> ConsoleWriter<C> {
    pub fn into_inner(self) -> C {
        self.0
    }
}

impl<C: Console> ufmt::uWrite for ConsoleWriter<C> {
    type Error = ();

    fn write_str(&mut self, s: &str) -> Result<(), ()> {
        self.0.write_bytes(s.as_bytes());
        Ok(())
    }
}

impl<C: Console> fmt::Write for ConsoleWriter<C> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.0.write_bytes(s.as_bytes());
        Ok(())
    }
}
