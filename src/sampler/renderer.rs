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

//! The real-time renderer.
//!
//! [`Sampler::render`] is the per-block entry point. It consumes control
//! events, advances playback, installs a newly loaded sample when playback
//! is idle, and writes output samples. It never allocates, never blocks,
//! and has no error return: whatever happens, it produces a full block of
//! valid (possibly silent) output. Its worst case cost is O(block length +
//! number of events).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

use super::buffer::SampleBuffer;
use super::handoff::Handoff;
use super::loader::Loader;
use super::playback::Playback;
use crate::event::{ControlEvent, EventKind};

/// A monophonic one-shot sampler.
///
/// Owns the active sample buffer, the playback state, and the background
/// loader. Construction spawns the loader thread; dropping the sampler
/// shuts it down cleanly. The render context is never asked to block,
/// not even during shutdown.
pub struct Sampler {
    /// The buffer the renderer reads from during playback.
    active: SampleBuffer,
    playback: Playback,
    handoff: Arc<Handoff>,
    loader: Loader,
}

impl Sampler {
    /// Creates a new sampler with no sample loaded and its loader thread
    /// running.
    pub fn new() -> Result<Self, std::io::Error> {
        let handoff = Arc::new(Handoff::new());
        let loader = Loader::spawn(handoff.clone())?;
        Ok(Self {
            active: SampleBuffer::empty(),
            playback: Playback::new(),
            handoff,
            loader,
        })
    }

    /// Requests a load of the given sample file.
    ///
    /// Equivalent to a set-sample-path control event: non-blocking, and the
    /// result is installed by a later `render` call once playback is idle.
    pub fn request_load(&self, path: PathBuf) {
        debug!(path = ?path, "Requesting sample load");
        self.handoff.request_load(path);
    }

    /// Renders one block of audio.
    ///
    /// Events are consumed in arrival order; a set-sample-path event gives
    /// up ownership of its path. Offsets are block-relative; a note-on's
    /// offset determines how many leading silent samples the block gets.
    pub fn render(&mut self, events: &mut [ControlEvent], output: &mut [f32]) {
        let mut start_frame = 0usize;

        for event in events.iter_mut() {
            match &mut event.kind {
                EventKind::NoteOn => {
                    self.playback.note_on();
                    start_frame = event.offset.min(output.len());
                }
                EventKind::SetSamplePath(path) => {
                    // Move the path out of the event; the leftover default
                    // does not allocate.
                    let path = std::mem::take(path);
                    debug!(path = ?path, "Load requested by control event");
                    self.handoff.request_load(path);
                }
                EventKind::Unknown(tag) => {
                    warn!(tag = *tag, "Ignoring unrecognized control event");
                }
            }
        }

        let mut pos = 0usize;
        if self.playback.is_playing() {
            // Silence up to the note-on's intra-block offset.
            output[..start_frame].fill(0.0);
            pos = start_frame;

            let samples = self.active.samples();
            let cursor = self.playback.position();
            let take = (samples.len() - cursor).min(output.len() - pos);
            output[pos..pos + take].copy_from_slice(&samples[cursor..cursor + take]);
            pos += take;
            self.playback.advance(take, samples.len());
        }

        // Install a pending sample at the first idle moment, even mid-block
        // right after a note finished. The displaced buffer is retired to
        // the loader; its memory is never released here.
        if !self.playback.is_playing() && self.handoff.is_ready() {
            if let Some(incoming) = self.handoff.take_pending() {
                let displaced = std::mem::replace(&mut self.active, incoming);
                self.handoff.retire(displaced);
            }
            self.handoff.clear_ready();
        }

        // Zero the rest of the block (idle, or sample shorter than the block).
        output[pos..].fill(0.0);
    }

    /// The path of the active sample, if one is loaded.
    pub fn active_path(&self) -> Option<&Path> {
        if self.active.is_empty() {
            None
        } else {
            Some(self.active.path())
        }
    }

    /// Returns true while a note is sounding.
    pub fn is_playing(&self) -> bool {
        self.playback.is_playing()
    }

    /// Returns true if a loaded sample is waiting to be installed.
    pub fn pending_ready(&self) -> bool {
        self.handoff.is_ready()
    }

    /// Number of loads that have completed successfully.
    pub fn completed_loads(&self) -> u64 {
        self.handoff.completed_loads()
    }

    /// Number of loads that have failed.
    pub fn failed_loads(&self) -> u64 {
        self.handoff.failed_loads()
    }
}

impl Drop for Sampler {
    fn drop(&mut self) {
        self.handoff.shutdown();
        self.loader.join();
    }
}

impl std::fmt::Debug for Sampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sampler")
            .field("active", &self.active)
            .field("playback", &self.playback)
            .field("pending_ready", &self.pending_ready())
            .finish()
    }
}
