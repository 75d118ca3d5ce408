//! Bounded producer/consumer conduit between the tee and the decompressor.
//!
//! One producer [`put`](HandoffBuffer::put)s chunks, one consumer
//! [`get`](HandoffBuffer::get)s them in order. Three terminal signals exist:
//! end of data ([`close`](HandoffBuffer::close)), abort
//! ([`abort`](HandoffBuffer::abort), which wakes every waiter on both sides
//! and discards queued data) and the errors the two sides report through it.

use std::collections::VecDeque;
use std::io::{self, Read};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use bytes::{Buf, Bytes};

use crate::error::{AbortReason, HandoffError};

/// What the consumer receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Handoff {
    Chunk(Bytes),
    Eof,
    Aborted(AbortReason),
}

#[derive(Default)]
struct State {
    chunks:   VecDeque<Bytes>,
    buffered: usize,
    closed:   bool,
    aborted:  Option<AbortReason>,
}

pub struct HandoffBuffer {
    capacity:  usize,
    state:     Mutex<State>,
    not_full:  Condvar,
    not_empty: Condvar,
}

impl HandoffBuffer {
    /// `capacity` is in bytes and clamped to at least 1.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity:  capacity.max(1),
            state:     Mutex::new(State::default()),
            not_full:  Condvar::new(),
            not_empty: Condvar::new(),
        }
    }

    pub fn capacity(&self) -> usize { self.capacity }

    fn lock(&self) -> MutexGuard<'_, State> { self.state.lock().unwrap_or_else(PoisonError::into_inner) }

    /// Queue a chunk, blocking while it does not fit.
    ///
    /// A chunk larger than the capacity is admitted once the buffer is empty.
    pub fn put(&self, chunk: Bytes) -> Result<(), HandoffError> {
        let mut state = self.lock();
        loop {
            if let Some(reason) = &state.aborted {
                return Err(HandoffError::Aborted(reason.clone()));
            }
            if state.closed {
                return Err(HandoffError::Closed);
            }
            if state.buffered == 0 || state.buffered + chunk.len() <= self.capacity {
                break;
            }
            state = self.not_full.wait(state).unwrap_or_else(PoisonError::into_inner);
        }

        if chunk.is_empty() {
            return Ok(());
        }
        state.buffered += chunk.len();
        state.chunks.push_back(chunk);
        drop(state);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Take the next chunk, blocking while the buffer is empty and open.
    pub fn get(&self) -> Handoff {
        let mut state = self.lock();
        loop {
            if let Some(reason) = &state.aborted {
                return Handoff::Aborted(reason.clone());
            }
            if let Some(chunk) = state.chunks.pop_front() {
                state.buffered -= chunk.len();
                drop(state);
                self.not_full.notify_one();
                return Handoff::Chunk(chunk);
            }
            if state.closed {
                return Handoff::Eof;
            }
            state = self.not_empty.wait(state).unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Mark end of data. Queued chunks are still delivered before `Eof`.
    /// No effect once closed or aborted.
    pub fn close(&self) {
        let mut state = self.lock();
        if state.closed || state.aborted.is_some() {
            return;
        }
        state.closed = true;
        drop(state);
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    /// Tear the conduit down: wake all waiters, drop queued data.
    ///
    /// Only the first reason is kept. Returns whether this call set it.
    /// Aborting after `close` still takes effect, so a consumer that fails on
    /// data it already received can record why.
    pub fn abort(&self, reason: AbortReason) -> bool {
        let mut state = self.lock();
        let first = state.aborted.is_none();
        if first {
            tracing::debug!(%reason, "handoff aborted");
            state.aborted = Some(reason);
        }
        state.chunks.clear();
        state.buffered = 0;
        drop(state);
        self.not_empty.notify_all();
        self.not_full.notify_all();
        first
    }

    pub fn abort_reason(&self) -> Option<AbortReason> { self.lock().aborted.clone() }

    pub fn is_closed(&self) -> bool { self.lock().closed }

    /// Consumer side as a byte reader.
    pub fn reader(&self) -> HandoffReader<'_> { HandoffReader::new(self) }
}

/// `Read` over the consumer side of a [`HandoffBuffer`].
///
/// An abort surfaces as [`io::ErrorKind::ConnectionAborted`] carrying a
/// [`HandoffError`].
pub struct HandoffReader<'a> {
    handoff: &'a HandoffBuffer,
    current: Bytes,
    eof:     bool,
}

impl<'a> HandoffReader<'a> {
    pub fn new(handoff: &'a HandoffBuffer) -> Self {
        Self {
            handoff,
            current: Bytes::new(),
            eof: false,
        }
    }

    /// Succeeds only if nothing but end-of-data remains.
    pub fn expect_eof(&mut self) -> io::Result<()> {
        let mut probe = [0u8; 1];
        match self.read(&mut probe)? {
            0 => Ok(()),
            _ => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "trailing data after end of compressed stream",
            )),
        }
    }
}

impl Read for HandoffReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        while self.current.is_empty() {
            if self.eof {
                return Ok(0);
            }
            match self.handoff.get() {
                Handoff::Chunk(chunk) => self.current = chunk,
                Handoff::Eof => self.eof = true,
                Handoff::Aborted(reason) => return Err(HandoffError::Aborted(reason).into()),
            }
        }

        let n = buf.len().min(self.current.len());
        buf[..n].copy_from_slice(&self.current[..n]);
        self.current.advance(n);
        Ok(n)
    }
}

/// Aborts the handoff if the owning thread unwinds, so a panic on one path
/// cannot leave the other blocked forever.
pub(crate) struct AbortOnUnwind<'a> {
    pub(crate) handoff: &'a HandoffBuffer,
    pub(crate) path:    &'static str,
}

impl Drop for AbortOnUnwind<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.handoff
                .abort(AbortReason::Internal(format!("{} path panicked", self.path)));
        }
    }
}
