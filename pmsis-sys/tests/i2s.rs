// SPDX-FileCopyrightText: 2026 Google LLC
//
// SPDX-License-Identifier: Apache-2.0

use std::thread;
use std::time::Duration;

use pmsis_hal::{Device, DeviceError, Task};
use pmsis_sys::i2s::{read_status, I2s, I2sCmd, I2sConf, I2sFormat, I2sState};

const BLOCK: usize = 8;

fn conf() -> I2sConf {
    I2sConf {
        block_size: BLOCK,
        format: I2sFormat::Pdm,
        ..I2sConf::default()
    }
}

fn start(i2s: &mut I2s) {
    i2s.open().unwrap();
    i2s.ioctl(I2sCmd::Start as u32, 0).unwrap();
    assert_eq!(i2s.state(), I2sState::Running);
}

#[test]
fn invalid_configuration_is_rejected_at_open() {
    let (mut ping, mut pong) = ([0u8; BLOCK], [0u8; BLOCK]);
    let mut i2s = I2s::new(I2sConf::default(), [&mut ping, &mut pong]);
    assert_eq!(i2s.open(), Err(DeviceError::InvalidArgument));

    let (mut ping, mut short) = ([0u8; BLOCK], [0u8; BLOCK - 1]);
    let mut i2s = I2s::new(conf(), [&mut ping, &mut short]);
    assert_eq!(i2s.open(), Err(DeviceError::InvalidArgument));

    let (mut ping, mut pong) = ([0u8; BLOCK], [0u8; BLOCK]);
    let odd = I2sConf {
        word_size: 12,
        ..conf()
    };
    let mut i2s = I2s::new(odd, [&mut ping, &mut pong]);
    assert_eq!(i2s.open(), Err(DeviceError::InvalidArgument));
}

#[test]
fn nothing_is_received_before_start() {
    let (mut ping, mut pong) = ([0u8; BLOCK], [0u8; BLOCK]);
    let mut i2s = I2s::new(conf(), [&mut ping, &mut pong]);
    assert_eq!(i2s.feed(&[1; 4]), Err(DeviceError::NotOpen));
    i2s.open().unwrap();
    assert_eq!(i2s.feed(&[1; 4]), Ok(0));
    assert_eq!(i2s.try_read(), Ok(None));
}

#[test]
fn read_task_completes_with_block_index_and_size() {
    let (first, second) = (Task::new(), Task::new());
    let (mut ping, mut pong) = ([0u8; BLOCK], [0u8; BLOCK]);
    let mut i2s = I2s::new(conf(), [&mut ping, &mut pong]);
    start(&mut i2s);

    i2s.read_async(&first).unwrap();
    assert!(first.is_pending());
    assert_eq!(read_status(&first), Err(DeviceError::Busy));

    i2s.feed(&[1, 2, 3, 4]).unwrap();
    assert!(!first.is_done());
    i2s.feed(&[5, 6, 7, 8, 9, 10]).unwrap();
    assert!(first.is_done());
    assert_eq!(read_status(&first), Ok((0, BLOCK)));
    assert_eq!(i2s.block(0), Some(&[1, 2, 3, 4, 5, 6, 7, 8][..]));

    i2s.read_async(&second).unwrap();
    i2s.feed(&[11, 12, 13, 14, 15, 16]).unwrap();
    second.wait();
    assert_eq!(read_status(&second), Ok((1, BLOCK)));
    assert_eq!(i2s.block(1), Some(&[9, 10, 11, 12, 13, 14, 15, 16][..]));
}

#[test]
fn ready_block_completes_read_immediately() {
    let task = Task::new();
    let (mut ping, mut pong) = ([0u8; BLOCK], [0u8; BLOCK]);
    let mut i2s = I2s::new(conf(), [&mut ping, &mut pong]);
    start(&mut i2s);

    assert_eq!(i2s.feed(&[7; BLOCK]), Ok(BLOCK));
    i2s.read_async(&task).unwrap();
    assert!(task.is_done());
    assert_eq!(task.args()[..2], [0, BLOCK]);
}

#[test]
fn second_reader_is_busy() {
    let (first, second) = (Task::new(), Task::new());
    let (mut ping, mut pong) = ([0u8; BLOCK], [0u8; BLOCK]);
    let mut i2s = I2s::new(conf(), [&mut ping, &mut pong]);
    start(&mut i2s);

    i2s.read_async(&first).unwrap();
    assert_eq!(i2s.read_async(&second), Err(DeviceError::Busy));
    assert!(!second.is_pending());
    assert_eq!(i2s.try_read(), Err(DeviceError::Busy));
    assert_eq!(i2s.read(), Err(DeviceError::Busy));
}

#[test]
fn unread_blocks_are_overwritten() {
    let (mut ping, mut pong) = ([0u8; BLOCK], [0u8; BLOCK]);
    let mut i2s = I2s::new(conf(), [&mut ping, &mut pong]);
    start(&mut i2s);

    i2s.feed(&[0; 2 * BLOCK]).unwrap();
    assert_eq!(i2s.overruns(), 0);
    i2s.feed(&[1; BLOCK]).unwrap();
    assert_eq!(i2s.overruns(), 1);

    // Block 1 is now the oldest, block 0 was refilled.
    assert_eq!(i2s.try_read(), Ok(Some((1, BLOCK))));
    assert_eq!(i2s.try_read(), Ok(Some((0, BLOCK))));
    assert_eq!(i2s.try_read(), Ok(None));
    assert_eq!(i2s.block(0), Some(&[1; BLOCK][..]));
}

#[test]
fn stop_finishes_the_current_block() {
    let (mut ping, mut pong) = ([0u8; BLOCK], [0u8; BLOCK]);
    let mut i2s = I2s::new(conf(), [&mut ping, &mut pong]);
    start(&mut i2s);

    i2s.feed(&[1; 4]).unwrap();
    i2s.ioctl(I2sCmd::Stop as u32, 0).unwrap();
    assert_eq!(i2s.state(), I2sState::Stopping);
    assert_eq!(i2s.ioctl(I2sCmd::Stop as u32, 0), Err(DeviceError::Busy));
    assert_eq!(i2s.ioctl(I2sCmd::Start as u32, 0), Err(DeviceError::Busy));

    // Only the rest of the block is taken.
    assert_eq!(i2s.feed(&[2; 6]), Ok(4));
    assert_eq!(i2s.state(), I2sState::Ready);
    assert_eq!(i2s.feed(&[9; 4]), Ok(0));
    assert_eq!(i2s.try_read(), Ok(Some((0, BLOCK))));
    assert_eq!(i2s.block(0), Some(&[1, 1, 1, 1, 2, 2, 2, 2][..]));

    // Restarting continues with the other block.
    i2s.ioctl(I2sCmd::Start as u32, 0).unwrap();
    i2s.feed(&[3; BLOCK]).unwrap();
    assert_eq!(i2s.try_read(), Ok(Some((1, BLOCK))));

    assert_eq!(i2s.ioctl(7, 0), Err(DeviceError::Unsupported));
}

#[test]
fn stop_between_blocks_is_immediate() {
    let (mut ping, mut pong) = ([0u8; BLOCK], [0u8; BLOCK]);
    let mut i2s = I2s::new(conf(), [&mut ping, &mut pong]);
    start(&mut i2s);

    i2s.feed(&[1; BLOCK]).unwrap();
    i2s.ioctl(I2sCmd::Stop as u32, 0).unwrap();
    assert_eq!(i2s.state(), I2sState::Ready);
    assert_eq!(i2s.feed(&[2; 4]), Ok(0));
}

#[test]
fn stopping_completes_a_waiting_reader() {
    let task = Task::new();
    let (mut ping, mut pong) = ([0u8; BLOCK], [0u8; BLOCK]);
    let mut i2s = I2s::new(conf(), [&mut ping, &mut pong]);
    start(&mut i2s);

    i2s.feed(&[5; 2]).unwrap();
    i2s.read_async(&task).unwrap();
    i2s.ioctl(I2sCmd::Stop as u32, 0).unwrap();
    i2s.feed(&[6; BLOCK]).unwrap();
    task.wait();
    assert_eq!(read_status(&task), Ok((0, BLOCK)));
}

#[test]
fn blocking_read_returns_queued_block() {
    let (mut ping, mut pong) = ([0u8; BLOCK], [0u8; BLOCK]);
    let mut i2s = I2s::new(conf(), [&mut ping, &mut pong]);
    start(&mut i2s);

    i2s.feed(&[4; BLOCK]).unwrap();
    assert_eq!(i2s.read(), Ok((0, BLOCK)));

    // Stopped with nothing queued: no block can arrive.
    i2s.ioctl(I2sCmd::Stop as u32, 0).unwrap();
    assert_eq!(i2s.read(), Err(DeviceError::Busy));
}

#[test]
fn blocking_read_waits_for_the_interface() {
    let (mut ping, mut pong) = ([0u8; BLOCK], [0u8; BLOCK]);
    let mut i2s = I2s::new(conf(), [&mut ping, &mut pong]);
    start(&mut i2s);

    let i2s = &i2s;
    thread::scope(|s| {
        s.spawn(|| {
            thread::sleep(Duration::from_millis(20));
            assert_eq!(i2s.feed(&[3; 4]), Ok(4));
            thread::sleep(Duration::from_millis(20));
            assert_eq!(i2s.feed(&[3; 4]), Ok(4));
        });
        assert_eq!(i2s.read(), Ok((0, BLOCK)));
    });
}

#[test]
fn device_read_copies_the_next_block() {
    let (mut ping, mut pong) = ([0u8; BLOCK], [0u8; BLOCK]);
    let mut i2s = I2s::new(conf(), [&mut ping, &mut pong]);
    start(&mut i2s);

    i2s.feed(&[1, 2, 3, 4, 5, 6, 7, 8]).unwrap();
    let mut out = [0u8; BLOCK];
    Device::read(&mut i2s, 0, &mut out).unwrap();
    assert_eq!(out, [1, 2, 3, 4, 5, 6, 7, 8]);

    let mut short = [0u8; BLOCK - 1];
    assert_eq!(
        Device::read(&mut i2s, 0, &mut short),
        Err(DeviceError::InvalidArgument)
    );
}
