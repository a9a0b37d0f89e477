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

//! The background sample loader.
//!
//! Runs on its own thread so file I/O and decoding never touch the render
//! path. The loader only ever communicates through the handoff channel: it
//! waits for a request, decodes, and marks the result ready. It never reads
//! or writes the active buffer.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{debug, info, warn};

use super::buffer::SampleBuffer;
use super::handoff::Handoff;

/// Handle to the loader thread.
pub struct Loader {
    handle: Option<JoinHandle<()>>,
}

impl Loader {
    /// Spawns the loader thread.
    pub fn spawn(handoff: Arc<Handoff>) -> Result<Self, std::io::Error> {
        let handle = thread::Builder::new()
            .name("sample-loader".to_string())
            .spawn(move || Self::run(handoff))?;
        Ok(Self {
            handle: Some(handle),
        })
    }

    /// The loader's wait/load loop.
    fn run(handoff: Arc<Handoff>) {
        debug!("Sample loader started");
        while let Some(path) = handoff.wait_for_work() {
            // Release buffers displaced by earlier swaps before allocating
            // a new one.
            handoff.reclaim();

            info!(path = ?path, "Loading sample");
            match SampleBuffer::decode_file(&path) {
                Ok(buffer) => {
                    // A newer request makes this decode stale: last request
                    // wins, so drop the result instead of marking it ready.
                    if handoff.has_request() {
                        debug!(path = ?path, "Discarding superseded load");
                        continue;
                    }
                    info!(
                        path = ?path,
                        frames = buffer.frame_count(),
                        duration_ms = buffer.duration().as_millis(),
                        memory_kb = buffer.memory_size() / 1024,
                        "Sample loaded"
                    );
                    handoff.mark_ready(buffer);
                }
                Err(e) => {
                    handoff.record_failure();
                    warn!(path = ?path, error = %e, "Failed to load sample");
                }
            }
        }
        debug!("Sample loader stopped");
    }

    /// Waits for the loader thread to exit. Call after `Handoff::shutdown`.
    pub fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("Sample loader thread panicked");
            }
        }
    }
}

impl Drop for Loader {
    fn drop(&mut self) {
        self.join();
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::testutil::{eventually, write_sample_wav};

    #[test]
    fn test_load_marks_ready() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("mono.wav");
        write_sample_wav(&path, &[0.5, -0.5], 1, 44100);

        let handoff = Arc::new(Handoff::new());
        let mut loader = Loader::spawn(handoff.clone()).expect("spawn");

        handoff.request_load(path.clone());
        eventually(|| handoff.is_ready(), "sample never became ready");

        let buffer = handoff.take_pending().expect("pending buffer");
        assert_eq!(buffer.path(), path);
        assert_eq!(buffer.frame_count(), 2);

        handoff.shutdown();
        loader.join();
    }

    #[test]
    fn test_failed_load_reports_and_leaves_no_pending() {
        let handoff = Arc::new(Handoff::new());
        let mut loader = Loader::spawn(handoff.clone()).expect("spawn");

        handoff.request_load(PathBuf::from("/nonexistent/sample.wav"));
        eventually(|| handoff.failed_loads() == 1, "failure never recorded");

        assert!(!handoff.is_ready());
        assert!(handoff.take_pending().is_none());

        handoff.shutdown();
        loader.join();
    }

    #[test]
    fn test_shutdown_terminates_loader() {
        let handoff = Arc::new(Handoff::new());
        let mut loader = Loader::spawn(handoff.clone()).expect("spawn");

        handoff.shutdown();
        // join() would hang if the wait loop ignored shutdown.
        loader.join();
    }
}
