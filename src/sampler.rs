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

//! Monophonic one-shot sample playback.
//!
//! This module provides:
//! - Whole-file sample decoding into an immutable in-memory buffer
//! - A background loader thread so file I/O never touches the render path
//! - A lock-free handoff channel for requesting loads and installing
//!   finished ones
//! - The real-time renderer with idle-only active/pending buffer swapping

mod buffer;
mod handoff;
mod loader;
mod playback;
mod renderer;
mod state;

pub use buffer::{LoadError, SampleBuffer};
pub use renderer::Sampler;
pub use state::{BaseDirMapper, IdentityMapper, PathMapper, SavedState};
