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
mod audio;
mod event;
mod sampler;
#[cfg(test)]
mod testutil;

use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use clap::{crate_version, Parser, Subcommand};
use tracing::info;

use crate::audio::PlaybackHost;
use crate::event::ControlEvent;
use crate::sampler::{BaseDirMapper, SampleBuffer, Sampler, SavedState};

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A monophonic one-shot sample player."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lists the available audio output devices.
    Devices {},
    /// Decodes a sample file and prints its metadata.
    Info {
        /// The path to the sample file.
        file: String,
    },
    /// Plays a sample once through an output device.
    Play {
        /// The path to the sample file. May be omitted when --state points
        /// at a previously saved state.
        file: Option<String>,
        /// The output device name. Defaults to the system default device.
        #[arg(short, long)]
        device: Option<String>,
        /// Path to a state file. Restored on startup when no sample file is
        /// given; the current sample path is saved there on exit.
        #[arg(short, long)]
        state: Option<String>,
    },
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Devices {} => {
            let devices = audio::list_devices()?;

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
        Commands::Info { file } => {
            let buffer = SampleBuffer::decode_file(Path::new(&file))?;
            println!("File: {}", buffer.path().display());
            println!("Frames: {}", buffer.frame_count());
            println!("Channels: {}", buffer.channel_count());
            println!("Sample rate: {} Hz", buffer.sample_rate());
            println!("Duration: {:?}", buffer.duration());
            println!("Memory: {} KiB", buffer.memory_size() / 1024);
        }
        Commands::Play {
            file,
            device,
            state,
        } => {
            play(file, device, state)?;
        }
    }

    Ok(())
}

/// Plays a sample once to completion, optionally restoring and saving the
/// current sample path to a state file.
fn play(
    file: Option<String>,
    device: Option<String>,
    state: Option<String>,
) -> Result<(), Box<dyn Error>> {
    let sampler = Sampler::new()?;

    match (&file, &state) {
        (Some(file), _) => sampler.request_load(PathBuf::from(file)),
        (None, Some(state)) => {
            let contents = fs::read_to_string(state)?;
            let saved: SavedState = serde_yml::from_str(&contents)?;
            sampler.restore(saved, &state_mapper(state));
        }
        (None, None) => {
            return Err("either a sample file or --state must be given".into());
        }
    }

    let host = PlaybackHost::start(sampler, device.as_deref())?;

    // Wait for the background load to settle one way or the other.
    wait_until(Duration::from_secs(10), || {
        host.with_sampler(|s| s.completed_loads() > 0 || s.failed_loads() > 0)
    })?;
    if host.with_sampler(|s| s.failed_loads() > 0) {
        return Err("failed to load sample (see log for details)".into());
    }

    host.send(ControlEvent::note_on(0));

    // Give the callback time to pick the trigger up, then poll the
    // lock-free idle flag until playback has run to completion.
    thread::sleep(Duration::from_millis(100));
    wait_until(Duration::from_secs(600), || host.is_idle())?;
    info!("Playback finished");

    if let Some(state) = &state {
        let mapper = state_mapper(state);
        if let Some(saved) = host.with_sampler(|s| s.saved_state(&mapper)) {
            fs::write(state, serde_yml::to_string(&saved)?)?;
            info!(path = %state, "State saved");
        }
    }

    Ok(())
}

/// Maps sample paths relative to the state file's directory so saved state
/// stays portable.
fn state_mapper(state_path: &str) -> BaseDirMapper {
    let base = Path::new(state_path)
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    BaseDirMapper::new(base)
}

/// Polls the given predicate until it returns true or the timeout expires.
fn wait_until<F>(timeout: Duration, predicate: F) -> Result<(), Box<dyn Error>>
where
    F: Fn() -> bool,
{
    let start = Instant::now();
    while start.elapsed() < timeout {
        if predicate() {
            return Ok(());
        }
        thread::sleep(Duration::from_millis(50));
    }
    Err("timed out waiting for the sampler".into())
}
