// SPDX-FileCopyrightText: 2026 Google LLC
//
// SPDX-License-Identifier: Apache-2.0
use pmsis_hal::transfer::{Direction, Stride2d};
use pmsis_hal::Task;

use super::{Transfer, Transport};

const SCRATCH: usize = 128;

/// Tests for a transport.
/// It receives the transport and the external address of `128` bytes of scratch memory it may
/// overwrite, and returns a list of tuples containing the name of the test and an
/// Option<&'static str> indicating if the test passed or an error message.
pub fn self_test<T: Transport>(
    transport: &mut T,
    scratch: u32,
) -> impl Iterator<Item = (&'static str, Option<&'static str>)> + '_ {
    // Construct a list of tests with their names.
    let tests: [(fn(&mut T, u32) -> Option<&'static str>, &'static str); 5] = [
        (write_read_back::<T>, "write_read_back"),
        (read_2d_packs_lines::<T>, "read_2d_packs_lines"),
        (write_2d_spreads_lines::<T>, "write_2d_spreads_lines"),
        (partial_line_rejected::<T>, "partial_line_rejected"),
        (zero_length_rejected::<T>, "zero_length_rejected"),
    ];
    // Run the tests lazily, one per `next`.
    tests
        .into_iter()
        .map(move |(f, name)| (name, f(transport, scratch)))
}

fn run<T: Transport>(transport: &mut T, transfer: Transfer) -> Option<&'static str> {
    let task = Task::new();
    // SAFETY: every caller passes a buffer that outlives the wait below.
    match unsafe { transport.submit(&transfer, &task) } {
        Ok(()) => {
            task.wait();
            None
        }
        Err(_) => Some("transport rejected a valid transfer"),
    }
}

fn pattern() -> [u8; SCRATCH] {
    let mut data = [0u8; SCRATCH];
    for (i, byte) in data.iter_mut().enumerate() {
        *byte = (i as u8).wrapping_mul(7).wrapping_add(1);
    }
    data
}

/// Write a pattern, read it back, compare.
pub fn write_read_back<T: Transport>(transport: &mut T, scratch: u32) -> Option<&'static str> {
    let mut data = pattern();
    let mut back = [0u8; SCRATCH];
    let write = Transfer::linear(
        scratch,
        data.as_mut_ptr(),
        SCRATCH as u32,
        Direction::LocalToExternal,
    );
    let read = Transfer::linear(
        scratch,
        back.as_mut_ptr(),
        SCRATCH as u32,
        Direction::ExternalToLocal,
    );
    if let Some(e) = run(transport, write).or_else(|| run(transport, read)) {
        return Some(e);
    }
    if back != data {
        Some("write_read_back test failed: data read back differs")
    } else {
        None
    }
}

/// Read every other 16-byte line of the scratch area into a packed buffer.
pub fn read_2d_packs_lines<T: Transport>(transport: &mut T, scratch: u32) -> Option<&'static str> {
    let mut data = pattern();
    let write = Transfer::linear(
        scratch,
        data.as_mut_ptr(),
        SCRATCH as u32,
        Direction::LocalToExternal,
    );
    if let Some(e) = run(transport, write) {
        return Some(e);
    }

    let mut packed = [0u8; SCRATCH / 2];
    let geometry = Stride2d {
        stride: 32,
        length: 16,
    };
    let read = Transfer::strided(
        scratch,
        packed.as_mut_ptr(),
        (SCRATCH / 2) as u32,
        geometry,
        Direction::ExternalToLocal,
    );
    if let Some(e) = run(transport, read) {
        return Some(e);
    }
    for line in 0..4 {
        if packed[line * 16..(line + 1) * 16] != data[line * 32..line * 32 + 16] {
            return Some("read_2d_packs_lines test failed: line mismatch");
        }
    }
    None
}

/// Write a packed buffer as lines 32 bytes apart; the gaps keep their content.
pub fn write_2d_spreads_lines<T: Transport>(
    transport: &mut T,
    scratch: u32,
) -> Option<&'static str> {
    let mut zeros = [0u8; SCRATCH];
    let clear = Transfer::linear(
        scratch,
        zeros.as_mut_ptr(),
        SCRATCH as u32,
        Direction::LocalToExternal,
    );
    if let Some(e) = run(transport, clear) {
        return Some(e);
    }

    let mut packed = [0xa5u8; SCRATCH / 2];
    let geometry = Stride2d {
        stride: 32,
        length: 16,
    };
    let write = Transfer::strided(
        scratch,
        packed.as_mut_ptr(),
        (SCRATCH / 2) as u32,
        geometry,
        Direction::LocalToExternal,
    );
    let mut back = [0u8; SCRATCH];
    let read = Transfer::linear(
        scratch,
        back.as_mut_ptr(),
        SCRATCH as u32,
        Direction::ExternalToLocal,
    );
    if let Some(e) = run(transport, write).or_else(|| run(transport, read)) {
        return Some(e);
    }
    for (i, byte) in back.iter().enumerate() {
        let expected = if i % 32 < 16 { 0xa5 } else { 0 };
        if *byte != expected {
            return Some("write_2d_spreads_lines test failed: unexpected byte");
        }
    }
    None
}

/// A size that is not a whole number of lines must be refused before issue.
pub fn partial_line_rejected<T: Transport>(
    transport: &mut T,
    scratch: u32,
) -> Option<&'static str> {
    let mut buf = [0u8; SCRATCH];
    let geometry = Stride2d {
        stride: 32,
        length: 10,
    };
    let transfer = Transfer::strided(
        scratch,
        buf.as_mut_ptr(),
        64,
        geometry,
        Direction::ExternalToLocal,
    );
    let task = Task::new();
    match unsafe { transport.submit(&transfer, &task) } {
        Err(_) if !task.is_pending() => None,
        Err(_) => Some("partial_line_rejected test failed: task left pending"),
        Ok(()) => {
            task.wait();
            Some("partial_line_rejected test failed: transfer accepted")
        }
    }
}

/// A zero line length must be refused before issue.
pub fn zero_length_rejected<T: Transport>(
    transport: &mut T,
    scratch: u32,
) -> Option<&'static str> {
    let mut buf = [0u8; 16];
    let geometry = Stride2d {
        stride: 32,
        length: 0,
    };
    let transfer = Transfer::strided(
        scratch,
        buf.as_mut_ptr(),
        16,
        geometry,
        Direction::ExternalToLocal,
    );
    let task = Task::new();
    match unsafe { transport.submit(&transfer, &task) } {
        Err(_) => None,
        Ok(()) => {
            task.wait();
            Some("zero_length_rejected test failed: transfer accepted")
        }
    }
}
