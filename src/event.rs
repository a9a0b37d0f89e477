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

//! Control events delivered to the renderer.
//!
//! Events are timestamped with block-relative sample offsets and processed
//! in arrival order. Parsing happens on the host side, outside the render
//! path; a malformed or unrecognized event only ever skips itself.

use std::path::PathBuf;

use midly::live::LiveEvent;
use midly::MidiMessage;

/// Errors produced while parsing control events. Contained per-event:
/// subsequent events in the same block still process normally.
#[derive(Debug, thiserror::Error)]
pub enum EventError {
    #[error("malformed control event: {0}")]
    Malformed(String),

    #[error("unrecognized control event")]
    Unknown,
}

/// What a control event asks the sampler to do.
#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    /// (Re)start playback. Channel and velocity are irrelevant here, only
    /// "on" matters.
    NoteOn,
    /// Replace the active sample with the file at this path.
    SetSamplePath(PathBuf),
    /// An event category this sampler does not understand, carried through
    /// so the renderer can report it. The tag is host-defined.
    Unknown(u32),
}

/// A timestamped control event.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlEvent {
    /// Block-relative sample offset at which the event takes effect.
    pub offset: usize,
    pub kind: EventKind,
}

impl ControlEvent {
    /// A note-on at the given intra-block offset.
    pub fn note_on(offset: usize) -> Self {
        Self {
            offset,
            kind: EventKind::NoteOn,
        }
    }

    /// A set-sample-path request at the given intra-block offset.
    pub fn set_sample_path(offset: usize, path: PathBuf) -> Self {
        Self {
            offset,
            kind: EventKind::SetSamplePath(path),
        }
    }

    /// Parses a raw MIDI message into a control event.
    ///
    /// Any note-on triggers playback, regardless of channel or velocity
    /// (including velocity zero, matching a plain status-byte check).
    /// Everything else MIDI understands but this sampler does not is
    /// rejected as unrecognized.
    pub fn from_midi(offset: usize, raw: &[u8]) -> Result<Self, EventError> {
        let event = LiveEvent::parse(raw).map_err(|e| EventError::Malformed(e.to_string()))?;
        match event {
            LiveEvent::Midi {
                message: MidiMessage::NoteOn { .. },
                ..
            } => Ok(Self::note_on(offset)),
            _ => Err(EventError::Unknown),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_note_on() {
        let event = ControlEvent::from_midi(5, &[0x90, 60, 100]).expect("parse");
        assert_eq!(event.offset, 5);
        assert_eq!(event.kind, EventKind::NoteOn);
    }

    #[test]
    fn test_parse_note_on_any_channel_and_velocity() {
        // Channel 10, velocity 0: still a trigger.
        let event = ControlEvent::from_midi(0, &[0x99, 36, 0]).expect("parse");
        assert_eq!(event.kind, EventKind::NoteOn);
    }

    #[test]
    fn test_parse_note_off_is_unrecognized() {
        let result = ControlEvent::from_midi(0, &[0x80, 60, 0]);
        assert!(matches!(result, Err(EventError::Unknown)));
    }

    #[test]
    fn test_parse_controller_is_unrecognized() {
        let result = ControlEvent::from_midi(0, &[0xB0, 7, 127]);
        assert!(matches!(result, Err(EventError::Unknown)));
    }

    #[test]
    fn test_parse_malformed_bytes() {
        let result = ControlEvent::from_midi(0, &[0x90]);
        assert!(matches!(result, Err(EventError::Malformed(_))));
    }

    #[test]
    fn test_parse_empty_bytes() {
        let result = ControlEvent::from_midi(0, &[]);
        assert!(matches!(result, Err(EventError::Malformed(_))));
    }
}
