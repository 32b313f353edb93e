// SPDX-FileCopyrightText: 2026 Google LLC
//
// SPDX-License-Identifier: Apache-2.0

//! I2S / PDM reception into a pair of ping-pong buffers.
//!
//! While running, the interface fills one block while the application
//! consumes the other. Each filled block is reported through a read task:
//! word 0 holds the buffer index, word 1 the number of bytes.
//!
//! Reception state sits behind a lock so that [`I2s::feed`], the stand-in
//! for the receive interrupt, may run in another context than a blocking
//! [`I2s::read`].

use heapless::Deque;
use log::{debug, trace, warn};
use pmsis_hal::sync::SpinMutex;
use pmsis_hal::{Device, DeviceError, Task};
use ufmt::derive::uDebug;

#[derive(uDebug, Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum I2sFormat {
    /// Standard I2S framing.
    #[default]
    I2s = 0,
    Pdm = 1,
}

#[derive(uDebug, Debug, Copy, Clone, PartialEq, Eq)]
pub struct I2sConf {
    pub pdm_decimation_log2: u16,
    /// Bits per data word.
    pub word_size: u8,
    /// Words per frame.
    pub channels: u8,
    /// Interface index.
    pub itf: u8,
    pub format: I2sFormat,
    pub options: u8,
    /// Word select frequency, i.e. the sampling rate.
    pub frame_clk_freq: u32,
    /// Bytes per ping-pong block.
    pub block_size: usize,
}

impl Default for I2sConf {
    fn default() -> Self {
        I2sConf {
            pdm_decimation_log2: 8,
            word_size: 16,
            channels: 1,
            itf: 0,
            format: I2sFormat::I2s,
            options: 0,
            frame_clk_freq: 44100,
            block_size: 0,
        }
    }
}

/// `ioctl` commands.
#[derive(uDebug, Debug, Copy, Clone, PartialEq, Eq)]
pub enum I2sCmd {
    /// Start reception. Only valid while ready.
    Start = 0,
    /// Stop reception at the end of the block being filled. Only valid while
    /// running; the interface is stopping until that block is complete.
    Stop = 1,
}

impl I2sCmd {
    pub fn from_u32(cmd: u32) -> Option<I2sCmd> {
        match cmd {
            0 => Some(I2sCmd::Start),
            1 => Some(I2sCmd::Stop),
            _ => None,
        }
    }
}

#[derive(uDebug, Debug, Copy, Clone, PartialEq, Eq)]
pub enum I2sState {
    Ready,
    Running,
    /// Stop requested, the current block is still being received.
    Stopping,
}

/// Who is waiting for the next filled block.
enum Reader<'a> {
    Task(&'a Task),
    /// A blocking [`I2s::read`], waiting on the driver's own task.
    Blocking,
}

struct Reception<'a> {
    buffers: [&'a mut [u8]; 2],
    open: bool,
    state: I2sState,
    /// Block being filled and how far.
    filling: usize,
    fill_offset: usize,
    /// Filled blocks not yet handed out, oldest first.
    ready: Deque<u8, 2>,
    reader: Option<Reader<'a>>,
    overruns: u32,
}

impl Reception<'_> {
    fn check_open(&self) -> Result<(), DeviceError> {
        if self.open {
            Ok(())
        } else {
            Err(DeviceError::NotOpen)
        }
    }

    fn start_block(&mut self, conf: &I2sConf) {
        let index = self.filling as u8;
        if self.ready.iter().any(|&ready| ready == index) {
            warn!("i2s {} overrun on block {}", conf.itf, index);
            self.overruns += 1;
            let mut kept: Deque<u8, 2> = Deque::new();
            while let Some(ready) = self.ready.pop_front() {
                if ready != index {
                    // At most one other block, so this cannot overflow.
                    let _ = kept.push_back(ready);
                }
            }
            self.ready = kept;
        }
    }

    fn finish_block(&mut self, conf: &I2sConf, own: &Task) {
        let index = self.filling;
        self.filling ^= 1;
        self.fill_offset = 0;
        match self.reader.take() {
            Some(Reader::Task(task)) => complete_read(conf, task, index),
            Some(Reader::Blocking) => complete_read(conf, own, index),
            // Cannot overflow: a block still queued was dropped when its
            // refill started.
            None => {
                let _ = self.ready.push_back(index as u8);
            }
        }
        if self.state == I2sState::Stopping {
            self.state = I2sState::Ready;
            debug!("i2s {} stopped after block {}", conf.itf, index);
        }
    }
}

fn complete_read(conf: &I2sConf, task: &Task, index: usize) {
    trace!("i2s {} block {} ready", conf.itf, index);
    task.set_arg(0, index);
    task.set_arg(1, conf.block_size);
    task.complete();
}

pub struct I2s<'a> {
    conf: I2sConf,
    rx: SpinMutex<Reception<'a>>,
    /// Completion of blocking reads.
    read_done: Task,
}

/// Block index and size carried by a completed read task.
pub fn read_status(task: &Task) -> Result<(usize, usize), DeviceError> {
    if !task.is_done() {
        return Err(DeviceError::Busy);
    }
    Ok((task.arg(0), task.arg(1)))
}

impl<'a> I2s<'a> {
    /// A closed interface receiving into `buffers`, each at least
    /// `conf.block_size` bytes long.
    pub fn new(conf: I2sConf, buffers: [&'a mut [u8]; 2]) -> Self {
        I2s {
            conf,
            rx: SpinMutex::new(Reception {
                buffers,
                open: false,
                state: I2sState::Ready,
                filling: 0,
                fill_offset: 0,
                ready: Deque::new(),
                reader: None,
                overruns: 0,
            }),
            read_done: Task::new(),
        }
    }

    pub fn conf(&self) -> &I2sConf {
        &self.conf
    }

    pub fn state(&self) -> I2sState {
        self.rx.lock().state
    }

    /// Blocks that were overwritten before being read.
    pub fn overruns(&self) -> u32 {
        self.rx.lock().overruns
    }

    /// Contents of a block reported by a read.
    pub fn block(&mut self, index: usize) -> Option<&[u8]> {
        let block_size = self.conf.block_size;
        self.rx
            .get_mut()
            .buffers
            .get(index)
            .and_then(|buffer| buffer.get(..block_size))
    }

    /// Ask for the next filled block. `task` completes once one is ready,
    /// right away if one already is. Its callback runs with the driver
    /// locked and must not call back into it.
    pub fn read_async(&self, task: &'a Task) -> Result<(), DeviceError> {
        let mut rx = self.rx.lock();
        rx.check_open()?;
        if rx.reader.is_some() {
            return Err(DeviceError::Busy);
        }
        task.issue();
        match rx.ready.pop_front() {
            Some(index) => complete_read(&self.conf, task, index as usize),
            None => rx.reader = Some(Reader::Task(task)),
        }
        Ok(())
    }

    /// Wait for the next filled block and return its index and size.
    ///
    /// Fails with `Busy` if another read is waiting, or if nothing is queued
    /// while reception is stopped, as no block could ever arrive.
    pub fn read(&self) -> Result<(usize, usize), DeviceError> {
        {
            let mut rx = self.rx.lock();
            rx.check_open()?;
            if rx.reader.is_some() {
                return Err(DeviceError::Busy);
            }
            if let Some(index) = rx.ready.pop_front() {
                return Ok((index as usize, self.conf.block_size));
            }
            if rx.state == I2sState::Ready {
                return Err(DeviceError::Busy);
            }
            self.read_done.issue();
            rx.reader = Some(Reader::Blocking);
        }
        self.read_done.wait();
        read_status(&self.read_done)
    }

    /// Take the oldest filled block without waiting. Returns its index and
    /// size.
    pub fn try_read(&self) -> Result<Option<(usize, usize)>, DeviceError> {
        let mut rx = self.rx.lock();
        rx.check_open()?;
        if rx.reader.is_some() {
            return Err(DeviceError::Busy);
        }
        Ok(rx
            .ready
            .pop_front()
            .map(|index| (index as usize, self.conf.block_size)))
    }

    /// Receive `samples` from the line, as the interface hardware would.
    /// Returns the number of bytes taken, zero unless receiving.
    pub fn feed(&self, samples: &[u8]) -> Result<usize, DeviceError> {
        let mut guard = self.rx.lock();
        let rx = &mut *guard;
        rx.check_open()?;
        let block_size = self.conf.block_size;
        let mut taken = 0;
        while taken < samples.len() && rx.state != I2sState::Ready {
            if rx.fill_offset == 0 {
                rx.start_block(&self.conf);
            }
            let n = (block_size - rx.fill_offset).min(samples.len() - taken);
            let (filling, start) = (rx.filling, rx.fill_offset);
            rx.buffers[filling][start..start + n].copy_from_slice(&samples[taken..taken + n]);
            rx.fill_offset += n;
            taken += n;
            if rx.fill_offset == block_size {
                rx.finish_block(&self.conf, &self.read_done);
            }
        }
        Ok(taken)
    }
}

impl Device for I2s<'_> {
    fn open(&mut self) -> Result<(), DeviceError> {
        let conf = &self.conf;
        let rx = self.rx.get_mut();
        if rx.open {
            return Err(DeviceError::AlreadyOpen);
        }
        let valid = conf.block_size > 0
            && rx.buffers.iter().all(|b| b.len() >= conf.block_size)
            && matches!(conf.word_size, 8 | 16 | 24 | 32)
            && conf.channels > 0
            && conf.frame_clk_freq > 0;
        if !valid {
            warn!("i2s {} rejected configuration", conf.itf);
            return Err(DeviceError::InvalidArgument);
        }
        rx.open = true;
        rx.state = I2sState::Ready;
        rx.filling = 0;
        rx.fill_offset = 0;
        rx.ready.clear();
        debug!(
            "i2s {} open, {:?}, {} Hz, {} byte blocks",
            conf.itf, conf.format, conf.frame_clk_freq, conf.block_size
        );
        Ok(())
    }

    /// Stop reception. A read task still waiting stays pending.
    fn close(&mut self) {
        let rx = self.rx.get_mut();
        rx.open = false;
        rx.state = I2sState::Ready;
        rx.reader = None;
        debug!("i2s {} closed", self.conf.itf);
    }

    /// Blocking read of the next block into `buffer`, which must hold a
    /// whole block. `addr` is ignored.
    fn read(&mut self, _addr: u32, buffer: &mut [u8]) -> Result<(), DeviceError> {
        if buffer.len() < self.conf.block_size {
            return Err(DeviceError::InvalidArgument);
        }
        let (index, size) = I2s::read(self)?;
        let block = self.block(index).ok_or(DeviceError::InvalidArgument)?;
        buffer[..size].copy_from_slice(block);
        Ok(())
    }

    fn ioctl(&mut self, cmd: u32, _arg: usize) -> Result<usize, DeviceError> {
        let rx = self.rx.get_mut();
        rx.check_open()?;
        let cmd = I2sCmd::from_u32(cmd).ok_or(DeviceError::Unsupported)?;
        rx.state = match (cmd, rx.state) {
            (I2sCmd::Start, I2sState::Ready) => I2sState::Running,
            // Nothing half-received, so the stop takes effect at once.
            (I2sCmd::Stop, I2sState::Running) if rx.fill_offset == 0 => I2sState::Ready,
            (I2sCmd::Stop, I2sState::Running) => I2sState::Stopping,
            _ => return Err(DeviceError::Busy),
        };
        debug!("i2s {} {:?}, now {:?}", self.conf.itf, cmd, rx.state);
        Ok(0)
    }
}
