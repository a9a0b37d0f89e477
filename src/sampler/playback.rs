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

//! Playback state for the one-shot sampler.
//!
//! Two states: idle and playing. A note-on always (re)starts playback from
//! frame zero; there is no note-off, playback runs until the sample is
//! exhausted. Mutated exclusively by the renderer, once per block.

/// Tracks whether a note is sounding and the read cursor into the active
/// sample buffer.
#[derive(Debug, Default)]
pub struct Playback {
    /// True while a note is sounding.
    playing: bool,
    /// Frame index into the active sample buffer.
    position: usize,
}

impl Playback {
    /// Creates a new playback state, starting idle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true while a note is sounding.
    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// The current read cursor.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Starts (or restarts) playback from frame zero.
    pub fn note_on(&mut self) {
        self.playing = true;
        self.position = 0;
    }

    /// Advances the cursor by the number of frames rendered and transitions
    /// to idle once the active buffer is exhausted.
    pub fn advance(&mut self, rendered: usize, frame_count: usize) {
        self.position += rendered;
        if self.position >= frame_count {
            self.playing = false;
        }
    }
}
