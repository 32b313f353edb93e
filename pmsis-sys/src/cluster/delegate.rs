// SPDX-FileCopyrightText: 2026 Google LLC
//
// SPDX-License-Identifier: Apache-2.0

/*! Hyperbus access from the cluster.

The cluster cannot drive the Hyperbus itself. Its cores fill in a request,
hand it to the [`HyperDelegate`] living on the fabric controller, and later
wait on the completion task embedded in the request. The delegate keeps the
requests in one intrusive FIFO, threaded through the requests' own `next`
links, so queueing never allocates.

A request is borrowed by the delegate from submission until its task is
done; submitting it again before that panics.
*/

use core::cell::Cell;

use log::{debug, error, trace};
use pmsis_hal::transfer::{Direction, Stride2d};
use pmsis_hal::{DeviceError, Task};
use ufmt::derive::uDebug;

use crate::hyperbus::Hyperbus;
use crate::transport::{Transfer, Transport};

/// When queued requests are serviced.
#[derive(uDebug, Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum DelegateMode {
    /// Right after submission, in the submitting context.
    #[default]
    Immediate,
    /// Only when the fabric controller calls [`HyperDelegate::service_one`]
    /// or [`HyperDelegate::service_pending`].
    Deferred,
}

/// A copy between HyperRAM and cluster memory.
pub struct ClusterHyperRequest<'a> {
    transfer: Cell<Option<Transfer>>,
    status: Cell<Result<(), DeviceError>>,
    next: Cell<Option<RemoteRef<'a>>>,
    task_done: Task,
    cid: Cell<u8>,
    is_2d: Cell<bool>,
}

impl<'a> ClusterHyperRequest<'a> {
    pub const fn new() -> Self {
        ClusterHyperRequest {
            transfer: Cell::new(None),
            status: Cell::new(Ok(())),
            next: Cell::new(None),
            task_done: Task::new(),
            cid: Cell::new(0),
            is_2d: Cell::new(false),
        }
    }

    pub fn is_done(&self) -> bool {
        self.task_done.is_done()
    }

    /// Cluster the request was submitted from.
    pub fn cid(&self) -> u8 {
        self.cid.get()
    }

    pub fn is_2d(&self) -> bool {
        self.is_2d.get()
    }

    pub fn transfer(&self) -> Option<Transfer> {
        self.transfer.get()
    }

    /// Block until the copy is done and report how the transport took it.
    pub fn wait(&self) -> Result<(), DeviceError> {
        self.task_done.wait();
        self.status.get()
    }
}

impl Default for ClusterHyperRequest<'_> {
    fn default() -> Self {
        Self::new()
    }
}

/// A HyperRAM allocation on behalf of the cluster.
pub struct ClusterAllocRequest<'a> {
    size: Cell<u32>,
    result: Cell<Option<u32>>,
    next: Cell<Option<RemoteRef<'a>>>,
    task_done: Task,
    cid: Cell<u8>,
}

impl<'a> ClusterAllocRequest<'a> {
    pub const fn new() -> Self {
        ClusterAllocRequest {
            size: Cell::new(0),
            result: Cell::new(None),
            next: Cell::new(None),
            task_done: Task::new(),
            cid: Cell::new(0),
        }
    }

    pub fn is_done(&self) -> bool {
        self.task_done.is_done()
    }

    pub fn cid(&self) -> u8 {
        self.cid.get()
    }

    /// Block until serviced. `None` if the HyperRAM had no room.
    pub fn wait(&self) -> Option<u32> {
        self.task_done.wait();
        self.result.get()
    }
}

impl Default for ClusterAllocRequest<'_> {
    fn default() -> Self {
        Self::new()
    }
}

/// A HyperRAM free on behalf of the cluster.
pub struct ClusterFreeRequest<'a> {
    chunk: Cell<u32>,
    size: Cell<u32>,
    result: Cell<Result<(), DeviceError>>,
    next: Cell<Option<RemoteRef<'a>>>,
    task_done: Task,
    cid: Cell<u8>,
}

impl<'a> ClusterFreeRequest<'a> {
    pub const fn new() -> Self {
        ClusterFreeRequest {
            chunk: Cell::new(0),
            size: Cell::new(0),
            result: Cell::new(Ok(())),
            next: Cell::new(None),
            task_done: Task::new(),
            cid: Cell::new(0),
        }
    }

    pub fn is_done(&self) -> bool {
        self.task_done.is_done()
    }

    pub fn cid(&self) -> u8 {
        self.cid.get()
    }

    pub fn wait(&self) -> Result<(), DeviceError> {
        self.task_done.wait();
        self.result.get()
    }
}

impl Default for ClusterFreeRequest<'_> {
    fn default() -> Self {
        Self::new()
    }
}

/// Any request that can sit in the delegate queue.
#[derive(Copy, Clone)]
enum RemoteRef<'a> {
    Hyper(&'a ClusterHyperRequest<'a>),
    Alloc(&'a ClusterAllocRequest<'a>),
    Free(&'a ClusterFreeRequest<'a>),
}

impl<'a> RemoteRef<'a> {
    fn next(&self) -> &'a Cell<Option<RemoteRef<'a>>> {
        match *self {
            RemoteRef::Hyper(req) => &req.next,
            RemoteRef::Alloc(req) => &req.next,
            RemoteRef::Free(req) => &req.next,
        }
    }
}

/// Singly-linked FIFO threaded through the requests.
struct RemoteQueue<'a> {
    head: Option<RemoteRef<'a>>,
    tail: Option<RemoteRef<'a>>,
    len: usize,
}

impl<'a> RemoteQueue<'a> {
    const fn new() -> Self {
        RemoteQueue {
            head: None,
            tail: None,
            len: 0,
        }
    }

    fn push(&mut self, request: RemoteRef<'a>) {
        request.next().set(None);
        match self.tail {
            Some(tail) => tail.next().set(Some(request)),
            None => self.head = Some(request),
        }
        self.tail = Some(request);
        self.len += 1;
    }

    fn pop(&mut self) -> Option<RemoteRef<'a>> {
        let head = self.head?;
        self.head = head.next().take();
        if self.head.is_none() {
            self.tail = None;
        }
        self.len -= 1;
        Some(head)
    }
}

/// Fabric-controller side of cluster Hyperbus requests.
pub struct HyperDelegate<'a, T: Transport> {
    hyper: Hyperbus<T>,
    queue: RemoteQueue<'a>,
    mode: DelegateMode,
    cid: u8,
}

impl<'a, T: Transport> HyperDelegate<'a, T> {
    pub fn new(hyper: Hyperbus<T>, mode: DelegateMode) -> Self {
        HyperDelegate {
            hyper,
            queue: RemoteQueue::new(),
            mode,
            cid: 0,
        }
    }

    pub fn mode(&self) -> DelegateMode {
        self.mode
    }

    /// Cluster id stamped on requests submitted from now on.
    pub fn set_cluster(&mut self, cid: u8) {
        self.cid = cid;
    }

    pub fn hyper(&self) -> &Hyperbus<T> {
        &self.hyper
    }

    pub fn hyper_mut(&mut self) -> &mut Hyperbus<T> {
        &mut self.hyper
    }

    /// Number of requests submitted but not yet serviced.
    pub fn pending(&self) -> usize {
        self.queue.len
    }

    /// Take back the driver. Requests still queued are never serviced.
    pub fn into_inner(self) -> Hyperbus<T> {
        self.hyper
    }

    fn enqueue(&mut self, request: RemoteRef<'a>) {
        self.queue.push(request);
        if self.mode == DelegateMode::Immediate {
            self.service_pending();
        }
    }

    /// Queue a copy of `size` bytes at `addr` from or to `buffer`.
    ///
    /// # Safety
    ///
    /// `buffer` must be valid for `size` bytes in the direction `dir`, and
    /// both `buffer` and `req` must stay untouched until `req` is done.
    pub unsafe fn cl_copy(
        &mut self,
        addr: u32,
        buffer: *mut u8,
        size: u32,
        dir: Direction,
        req: &'a ClusterHyperRequest<'a>,
    ) -> Result<(), DeviceError> {
        self.submit_copy(Transfer::linear(addr, buffer, size, dir), req)
    }

    /// Queue a 2-D copy; see [`Hyperbus::read_2d_async`] for the layout.
    ///
    /// # Safety
    ///
    /// See [`HyperDelegate::cl_copy`].
    pub unsafe fn cl_copy_2d(
        &mut self,
        addr: u32,
        buffer: *mut u8,
        size: u32,
        geometry: Stride2d,
        dir: Direction,
        req: &'a ClusterHyperRequest<'a>,
    ) -> Result<(), DeviceError> {
        self.submit_copy(Transfer::strided(addr, buffer, size, geometry, dir), req)
    }

    /// # Safety
    ///
    /// See [`HyperDelegate::cl_copy`].
    pub unsafe fn cl_read(
        &mut self,
        addr: u32,
        buffer: *mut u8,
        size: u32,
        req: &'a ClusterHyperRequest<'a>,
    ) -> Result<(), DeviceError> {
        self.cl_copy(addr, buffer, size, Direction::ExternalToLocal, req)
    }

    /// # Safety
    ///
    /// See [`HyperDelegate::cl_copy`].
    pub unsafe fn cl_read_2d(
        &mut self,
        addr: u32,
        buffer: *mut u8,
        size: u32,
        geometry: Stride2d,
        req: &'a ClusterHyperRequest<'a>,
    ) -> Result<(), DeviceError> {
        self.cl_copy_2d(addr, buffer, size, geometry, Direction::ExternalToLocal, req)
    }

    /// # Safety
    ///
    /// See [`HyperDelegate::cl_copy`].
    pub unsafe fn cl_write(
        &mut self,
        addr: u32,
        buffer: *const u8,
        size: u32,
        req: &'a ClusterHyperRequest<'a>,
    ) -> Result<(), DeviceError> {
        self.cl_copy(addr, buffer.cast_mut(), size, Direction::LocalToExternal, req)
    }

    /// # Safety
    ///
    /// See [`HyperDelegate::cl_copy`].
    pub unsafe fn cl_write_2d(
        &mut self,
        addr: u32,
        buffer: *const u8,
        size: u32,
        geometry: Stride2d,
        req: &'a ClusterHyperRequest<'a>,
    ) -> Result<(), DeviceError> {
        self.cl_copy_2d(
            addr,
            buffer.cast_mut(),
            size,
            geometry,
            Direction::LocalToExternal,
            req,
        )
    }

    fn submit_copy(
        &mut self,
        transfer: Transfer,
        req: &'a ClusterHyperRequest<'a>,
    ) -> Result<(), DeviceError> {
        if !self.hyper.is_open() {
            return Err(DeviceError::NotOpen);
        }
        transfer.plan()?;
        req.task_done.issue();
        req.transfer.set(Some(transfer));
        req.status.set(Ok(()));
        req.cid.set(self.cid);
        req.is_2d.set(transfer.is_2d());
        trace!(
            "cluster {} queued {:?} copy of {} bytes at {:#x}",
            self.cid,
            transfer.dir,
            transfer.size,
            transfer.ext_addr
        );
        self.enqueue(RemoteRef::Hyper(req));
        Ok(())
    }

    /// Queue an allocation of `size` bytes. Failure is reported by the
    /// request completing with `None`.
    pub fn cl_alloc(&mut self, size: u32, req: &'a ClusterAllocRequest<'a>) {
        req.task_done.issue();
        req.size.set(size);
        req.result.set(None);
        req.cid.set(self.cid);
        self.enqueue(RemoteRef::Alloc(req));
    }

    /// Queue the release of `size` bytes at `chunk`.
    pub fn cl_free(&mut self, chunk: u32, size: u32, req: &'a ClusterFreeRequest<'a>) {
        req.task_done.issue();
        req.chunk.set(chunk);
        req.size.set(size);
        req.result.set(Ok(()));
        req.cid.set(self.cid);
        self.enqueue(RemoteRef::Free(req));
    }

    /// Service the oldest queued request. Returns `false` if there was none.
    pub fn service_one(&mut self) -> bool {
        let Some(request) = self.queue.pop() else {
            return false;
        };
        match request {
            RemoteRef::Hyper(req) => {
                let status = match req.transfer.get() {
                    // SAFETY: the submitter guaranteed the buffer stays valid
                    // until the request is done.
                    Some(transfer) => unsafe { self.hyper.copy(&transfer) },
                    None => Err(DeviceError::InvalidArgument),
                };
                if let Err(e) = status {
                    error!("cluster {} copy failed: {:?}", req.cid.get(), e);
                }
                req.status.set(status);
                req.task_done.complete();
            }
            RemoteRef::Alloc(req) => {
                let result = self.hyper.alloc(req.size.get());
                debug!(
                    "cluster {} alloc of {} bytes: {:?}",
                    req.cid.get(),
                    req.size.get(),
                    result
                );
                req.result.set(result);
                req.task_done.complete();
            }
            RemoteRef::Free(req) => {
                let result = self.hyper.free(req.chunk.get(), req.size.get());
                if let Err(e) = result {
                    error!(
                        "cluster {} free of {:#x} failed: {:?}",
                        req.cid.get(),
                        req.chunk.get(),
                        e
                    );
                }
                req.result.set(result);
                req.task_done.complete();
            }
        }
        true
    }

    /// Service every queued request in submission order. Returns how many
    /// were serviced.
    pub fn service_pending(&mut self) -> usize {
        let mut serviced = 0;
        while self.service_one() {
            serviced += 1;
        }
        serviced
    }
}
