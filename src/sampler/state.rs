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

//! Saving and restoring the current sample path.
//!
//! The only state worth persisting is which file the active sample came
//! from. On save the path goes through a [`PathMapper`] so it can be stored
//! in a portable, host-relative form; on restore the mapped path is fed
//! back through the same code path as a runtime set-sample-path event.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use super::renderer::Sampler;

/// The persisted sampler state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedState {
    /// The active sample's file path, in mapped (portable) form.
    pub sample: PathBuf,
}

/// Maps sample paths between their runtime and persisted forms.
///
/// Hosts that relocate state directories implement this to keep saved
/// paths portable.
pub trait PathMapper {
    /// Maps a runtime path to its portable form for saving.
    fn abstract_path(&self, path: &Path) -> PathBuf;

    /// Maps a portable path back to a loadable runtime path.
    fn absolute_path(&self, path: &Path) -> PathBuf;
}

/// A mapper that stores paths unchanged.
pub struct IdentityMapper;

impl PathMapper for IdentityMapper {
    fn abstract_path(&self, path: &Path) -> PathBuf {
        path.to_path_buf()
    }

    fn absolute_path(&self, path: &Path) -> PathBuf {
        path.to_path_buf()
    }
}

/// A mapper that stores paths relative to a base directory, typically the
/// directory holding the state file.
pub struct BaseDirMapper {
    base: PathBuf,
}

impl BaseDirMapper {
    pub fn new<P: Into<PathBuf>>(base: P) -> Self {
        Self { base: base.into() }
    }
}

impl PathMapper for BaseDirMapper {
    fn abstract_path(&self, path: &Path) -> PathBuf {
        path.strip_prefix(&self.base).unwrap_or(path).to_path_buf()
    }

    fn absolute_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base.join(path)
        }
    }
}

impl Sampler {
    /// Emits the current active sample's path for persistence, or `None` if
    /// no sample is loaded.
    pub fn saved_state(&self, mapper: &dyn PathMapper) -> Option<SavedState> {
        self.active_path().map(|path| SavedState {
            sample: mapper.abstract_path(path),
        })
    }

    /// Restores a previously saved state by issuing a load request for the
    /// saved path, exactly as a runtime set-sample-path event would.
    pub fn restore(&self, state: SavedState, mapper: &dyn PathMapper) {
        let path = mapper.absolute_path(&state.sample);
        info!(path = ?path, "Restoring sample");
        self.request_load(path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{eventually, write_sample_wav};

    #[test]
    fn test_base_dir_mapper_round_trip() {
        let mapper = BaseDirMapper::new("/var/lib/sampler");

        let abstracted = mapper.abstract_path(Path::new("/var/lib/sampler/kick.wav"));
        assert_eq!(abstracted, PathBuf::from("kick.wav"));

        let restored = mapper.absolute_path(&abstracted);
        assert_eq!(restored, PathBuf::from("/var/lib/sampler/kick.wav"));
    }

    #[test]
    fn test_base_dir_mapper_foreign_path_passes_through() {
        let mapper = BaseDirMapper::new("/var/lib/sampler");

        let foreign = Path::new("/mnt/samples/snare.wav");
        assert_eq!(mapper.abstract_path(foreign), foreign.to_path_buf());
        assert_eq!(mapper.absolute_path(foreign), foreign.to_path_buf());
    }

    #[test]
    fn test_no_state_without_active_sample() {
        let sampler = Sampler::new().expect("sampler");
        assert!(sampler.saved_state(&IdentityMapper).is_none());
    }

    #[test]
    fn test_save_and_restore_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("kick.wav");
        write_sample_wav(&path, &[0.1, 0.2], 1, 44100);

        let mapper = BaseDirMapper::new(dir.path());

        let mut sampler = Sampler::new().expect("sampler");
        sampler.request_load(path.clone());
        eventually(|| sampler.pending_ready(), "sample never became ready");
        let mut block = [0.0f32; 2];
        sampler.render(&mut [], &mut block);

        let state = sampler.saved_state(&mapper).expect("state");
        assert_eq!(state.sample, PathBuf::from("kick.wav"));

        // A fresh sampler restores through the ordinary load path.
        let mut restored = Sampler::new().expect("sampler");
        restored.restore(state, &mapper);
        eventually(|| restored.pending_ready(), "sample never became ready");
        restored.render(&mut [], &mut block);
        assert_eq!(restored.active_path(), Some(path.as_path()));
    }

    #[test]
    fn test_state_serializes_to_yaml() {
        let state = SavedState {
            sample: PathBuf::from("kick.wav"),
        };
        let yaml = serde_yml::to_string(&state).expect("serialize");
        let parsed: SavedState = serde_yml::from_str(&yaml).expect("deserialize");
        assert_eq!(parsed, state);
    }
}
