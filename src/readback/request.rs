//! Counter-gated readback requests

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Flags written by the `map_async` callback
#[derive(Debug, Clone, Default)]
pub struct MapSignal {
    done: Arc<AtomicBool>,
    failed: Arc<AtomicBool>,
}

impl MapSignal {
    pub fn complete(&self, ok: bool) {
        if !ok {
            self.failed.store(true, Ordering::Release);
        }
        self.done.store(true, Ordering::Release);
    }

    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    pub fn has_failed(&self) -> bool {
        self.failed.load(Ordering::Acquire)
    }
}

/// One in-flight copy of GPU results into a staging buffer.
///
/// The request becomes consumable once its copy has been submitted
/// (`transferred`), its delay counter has run down to zero, and the map
/// callback has fired (`done`). None of those steps blocks.
#[derive(Debug)]
pub struct ReadbackRequest<T> {
    pub delay: u32,
    pub transferred: bool,
    pub signal: MapSignal,
    /// Staging buffer index in the ring
    pub staging: usize,
    /// Bytes copied into the staging buffer
    pub bytes: u64,
    /// Caller state captured at submission (e.g. the slot mapping)
    pub payload: T,
}

impl<T> ReadbackRequest<T> {
    pub fn new(delay: u32, staging: usize, bytes: u64, payload: T) -> Self {
        Self {
            delay,
            transferred: false,
            signal: MapSignal::default(),
            staging,
            bytes,
            payload,
        }
    }

    /// One frame of waiting; only counts once the copy is on the GPU
    pub fn tick(&mut self) {
        if self.transferred && self.delay > 0 {
            self.delay -= 1;
        }
    }

    pub fn is_ready(&self) -> bool {
        self.transferred && self.delay == 0 && self.signal.is_done()
    }
}

/// FIFO of requests consumed strictly in submission order
#[derive(Debug)]
pub struct ReadbackQueue<T> {
    pending: VecDeque<ReadbackRequest<T>>,
}

impl<T> ReadbackQueue<T> {
    pub fn new() -> Self {
        Self {
            pending: VecDeque::new(),
        }
    }

    pub fn push(&mut self, request: ReadbackRequest<T>) {
        self.pending.push_back(request);
    }

    /// Requests whose copy has been recorded but not yet submitted
    pub fn untransferred_mut(&mut self) -> impl Iterator<Item = &mut ReadbackRequest<T>> {
        self.pending.iter_mut().filter(|request| !request.transferred)
    }

    pub fn tick(&mut self) {
        for request in &mut self.pending {
            request.tick();
        }
    }

    /// Pop the oldest request if it is ready; a newer ready request never
    /// overtakes an older pending one
    pub fn pop_ready(&mut self) -> Option<ReadbackRequest<T>> {
        if self.pending.front().is_some_and(ReadbackRequest::is_ready) {
            self.pending.pop_front()
        } else {
            None
        }
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn drain(&mut self) -> impl Iterator<Item = ReadbackRequest<T>> + '_ {
        self.pending.drain(..)
    }
}

impl<T> Default for ReadbackQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
