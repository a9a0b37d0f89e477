// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! The handoff channel between the renderer and the loader.
//!
//! This is the single synchronization point crossing the real-time boundary.
//! The render side only ever performs non-blocking, allocation-free posts and
//! checks; the loader side is allowed to block. Everything is built on
//! bounded crossbeam channels (preallocated, array-based) plus one atomic
//! ready flag, so no lock is ever shared between the two contexts.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use tracing::debug;

use super::buffer::SampleBuffer;

/// Work items delivered to the loader thread.
enum Work {
    /// Load the sample at the given path.
    Load(PathBuf),
    /// Terminate the loader's wait loop.
    Shutdown,
}

/// The wake/ready primitive connecting the renderer and the loader.
///
/// Three transfers cross the boundary, each through its own single-purpose
/// bounded channel:
/// - load requests (renderer -> loader), capacity 1, last request wins;
/// - the pending decoded buffer (loader -> renderer), capacity 1, gated by
///   the ready flag;
/// - retired buffers for reclamation (renderer -> loader), capacity 2, which
///   is enough because only two sample buffers exist at any time.
pub struct Handoff {
    request_tx: Sender<Work>,
    request_rx: Receiver<Work>,
    pending_tx: Sender<SampleBuffer>,
    pending_rx: Receiver<SampleBuffer>,
    retired_tx: Sender<SampleBuffer>,
    retired_rx: Receiver<SampleBuffer>,
    /// Set by the loader once a pending buffer is fully decoded, cleared by
    /// the renderer after the swap.
    ready: AtomicBool,
    /// Number of loads that completed successfully.
    completed_loads: AtomicU64,
    /// Number of loads that failed.
    failed_loads: AtomicU64,
}

impl Handoff {
    /// Creates a new handoff channel.
    pub fn new() -> Self {
        let (request_tx, request_rx) = bounded(1);
        let (pending_tx, pending_rx) = bounded(1);
        let (retired_tx, retired_rx) = bounded(2);
        Self {
            request_tx,
            request_rx,
            pending_tx,
            pending_rx,
            retired_tx,
            retired_rx,
            ready: AtomicBool::new(false),
            completed_loads: AtomicU64::new(0),
            failed_loads: AtomicU64::new(0),
        }
    }

    /// Requests a load of the given path and wakes the loader.
    ///
    /// Render-side. Non-blocking and allocation-free: the owned path is moved
    /// into a preallocated slot. If a previous request is still waiting to be
    /// picked up it is replaced (last request wins); replacement happens on
    /// this side so the discarded path is dropped here, which is fine because
    /// dropping a path does not touch sample memory.
    pub fn request_load(&self, path: PathBuf) {
        let mut work = Work::Load(path);
        loop {
            match self.request_tx.try_send(work) {
                Ok(()) => return,
                Err(TrySendError::Full(returned)) => {
                    // Displace the stale request, then retry with ours.
                    let _ = self.request_rx.try_recv();
                    work = returned;
                }
                Err(TrySendError::Disconnected(_)) => return,
            }
        }
    }

    /// Signals the loader to terminate its wait loop.
    ///
    /// An unserviced load request may be displaced to make room; shutdown
    /// always wins over pending work.
    pub fn shutdown(&self) {
        let mut work = Work::Shutdown;
        loop {
            match self.request_tx.try_send(work) {
                Ok(()) => return,
                Err(TrySendError::Full(returned)) => {
                    let _ = self.request_rx.try_recv();
                    work = returned;
                }
                Err(TrySendError::Disconnected(_)) => return,
            }
        }
    }

    /// Blocks until a load request arrives.
    ///
    /// Loader-side only. Suspends the calling thread with no busy-polling.
    /// Returns `None` when the loader should terminate.
    pub fn wait_for_work(&self) -> Option<PathBuf> {
        match self.request_rx.recv() {
            Ok(Work::Load(path)) => Some(path),
            Ok(Work::Shutdown) => None,
            Err(_) => None,
        }
    }

    /// Returns true if a newer request has arrived since the last
    /// `wait_for_work`. Used by the loader to discard superseded decodes.
    pub fn has_request(&self) -> bool {
        !self.request_rx.is_empty()
    }

    /// Stores a decoded buffer in the pending slot and raises the ready flag.
    ///
    /// Loader-side only. If an earlier decoded buffer is still waiting to be
    /// installed it is dropped here, off the real-time path.
    pub fn mark_ready(&self, buffer: SampleBuffer) {
        let mut buffer = buffer;
        loop {
            match self.pending_tx.try_send(buffer) {
                Ok(()) => break,
                Err(TrySendError::Full(returned)) => {
                    if let Ok(stale) = self.pending_rx.try_recv() {
                        debug!(path = ?stale.path(), "Discarding superseded pending sample");
                    }
                    buffer = returned;
                }
                Err(TrySendError::Disconnected(_)) => return,
            }
        }
        self.completed_loads.fetch_add(1, Ordering::Relaxed);
        self.ready.store(true, Ordering::Release);
    }

    /// Returns true if a pending buffer is decoded and safe to install.
    /// Render-side; a single atomic read.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Takes ownership of the pending buffer. Render-side, non-blocking.
    pub fn take_pending(&self) -> Option<SampleBuffer> {
        self.pending_rx.try_recv().ok()
    }

    /// Clears the ready flag after a swap. Render-side only.
    pub fn clear_ready(&self) {
        self.ready.store(false, Ordering::Release);
    }

    /// Hands a displaced buffer to the loader for reclamation.
    ///
    /// Render-side. The retired channel's capacity covers every buffer that
    /// can exist, so the send cannot fail while the loader is alive; if the
    /// loader is gone the buffer is dropped here, which is no longer a
    /// real-time context by then.
    pub fn retire(&self, buffer: SampleBuffer) {
        let _ = self.retired_tx.try_send(buffer);
    }

    /// Drops any retired buffers. Loader-side; this is where displaced
    /// sample memory is actually released.
    pub fn reclaim(&self) {
        while let Ok(buffer) = self.retired_rx.try_recv() {
            debug!(
                path = ?buffer.path(),
                memory_kb = buffer.memory_size() / 1024,
                "Reclaimed retired sample buffer"
            );
            drop(buffer);
        }
    }

    /// Records a failed load attempt.
    pub fn record_failure(&self) {
        self.failed_loads.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of loads that have completed successfully.
    pub fn completed_loads(&self) -> u64 {
        self.completed_loads.load(Ordering::Relaxed)
    }

    /// Number of loads that have failed.
    pub fn failed_loads(&self) -> u64 {
        self.failed_loads.load(Ordering::Relaxed)
    }
}

impl Default for Handoff {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    #[test]
    fn test_request_and_wait() {
        let handoff = Arc::new(Handoff::new());

        let join = {
            let handoff = handoff.clone();
            thread::spawn(move || handoff.wait_for_work())
        };

        handoff.request_load(PathBuf::from("a.wav"));
        let work = join.join().expect("join");
        assert_eq!(work, Some(PathBuf::from("a.wav")));
    }

    #[test]
    fn test_last_request_wins() {
        let handoff = Handoff::new();

        handoff.request_load(PathBuf::from("first.wav"));
        handoff.request_load(PathBuf::from("second.wav"));

        assert_eq!(handoff.wait_for_work(), Some(PathBuf::from("second.wav")));
        assert!(!handoff.has_request());
    }

    #[test]
    fn test_shutdown_wakes_waiter() {
        let handoff = Arc::new(Handoff::new());

        let join = {
            let handoff = handoff.clone();
            thread::spawn(move || handoff.wait_for_work())
        };

        handoff.shutdown();
        assert_eq!(join.join().expect("join"), None);
    }

    #[test]
    fn test_shutdown_displaces_pending_request() {
        let handoff = Handoff::new();

        handoff.request_load(PathBuf::from("late.wav"));
        handoff.shutdown();

        assert_eq!(handoff.wait_for_work(), None);
    }

    #[test]
    fn test_ready_flag_lifecycle() {
        let handoff = Handoff::new();
        assert!(!handoff.is_ready());
        assert!(handoff.take_pending().is_none());

        handoff.mark_ready(SampleBuffer::empty());
        assert!(handoff.is_ready());
        assert_eq!(handoff.completed_loads(), 1);

        let pending = handoff.take_pending();
        assert!(pending.is_some());
        handoff.clear_ready();
        assert!(!handoff.is_ready());
        assert!(handoff.take_pending().is_none());
    }

    #[test]
    fn test_mark_ready_replaces_stale_pending() {
        let handoff = Handoff::new();

        handoff.mark_ready(SampleBuffer::empty());
        handoff.mark_ready(SampleBuffer::empty());

        // Only one buffer may occupy the pending slot.
        assert!(handoff.take_pending().is_some());
        assert!(handoff.take_pending().is_none());
        assert_eq!(handoff.completed_loads(), 2);
    }

    #[test]
    fn test_retire_and_reclaim() {
        let handoff = Handoff::new();

        handoff.retire(SampleBuffer::empty());
        handoff.retire(SampleBuffer::empty());
        handoff.reclaim();

        // Reclaim drained the channel; further retires still fit.
        handoff.retire(SampleBuffer::empty());
        handoff.reclaim();
    }
}
