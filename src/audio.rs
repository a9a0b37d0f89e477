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

//! Audio output via cpal.
//!
//! The host side of the sampler: opens an output stream, drains queued
//! control events inside the callback, renders one block per callback, and
//! duplicates the mono output across the device's channels.

pub mod thread_priority;

use std::error::Error;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{Receiver, Sender};
use tracing::{error, info, warn};

use crate::event::ControlEvent;
use crate::sampler::Sampler;

/// Maximum number of control events delivered to a single block. Events
/// beyond this stay queued for the next block.
const EVENT_QUEUE_CAPACITY: usize = 64;

/// Initial mono scratch size in frames; grown once if the device asks for
/// larger blocks.
const INITIAL_BLOCK_CAPACITY: usize = 8192;

/// Lists the names of all available output devices.
pub fn list_devices() -> Result<Vec<String>, Box<dyn Error>> {
    let mut names = Vec::new();
    for host_id in cpal::available_hosts() {
        let host = cpal::host_from_id(host_id)?;
        let devices = match host.devices() {
            Ok(devices) => devices,
            Err(e) => {
                error!(
                    error = %e,
                    host = host_id.name(),
                    "Unable to list devices for host"
                );
                continue;
            }
        };

        for device in devices {
            let has_output = device
                .supported_output_configs()
                .map(|mut configs| configs.next().is_some())
                .unwrap_or(false);
            if has_output {
                names.push(device.name()?);
            }
        }
    }

    names.sort();
    Ok(names)
}

/// A running output stream wrapped around a [`Sampler`].
///
/// The sampler lives behind a mutex that the callback only ever `try_lock`s,
/// so the render path cannot block on the main thread. The main thread
/// should only take the lock while the stream is quiescent (e.g. to save
/// state after playback finished).
pub struct PlaybackHost {
    _stream: cpal::Stream,
    sampler: Arc<Mutex<Sampler>>,
    event_tx: Sender<ControlEvent>,
    /// Published by the callback after each block so the main thread can
    /// poll for completion without touching the sampler lock.
    idle: Arc<AtomicBool>,
}

impl PlaybackHost {
    /// Opens the given output device (or the default one) and starts
    /// rendering the sampler into it.
    pub fn start(sampler: Sampler, device_name: Option<&str>) -> Result<Self, Box<dyn Error>> {
        let host = cpal::default_host();
        let device = match device_name {
            Some(name) => host
                .output_devices()?
                .find(|d| d.name().map(|n| n.trim() == name).unwrap_or(false))
                .ok_or_else(|| format!("no output device found with name {}", name))?,
            None => host
                .default_output_device()
                .ok_or("no default output device")?,
        };

        let supported = device.default_output_config()?;
        let sample_format = supported.sample_format();
        let config: cpal::StreamConfig = supported.into();
        info!(
            device = %device.name()?,
            sample_rate = config.sample_rate,
            channels = config.channels,
            format = ?sample_format,
            "Opening output stream"
        );

        let sampler = Arc::new(Mutex::new(sampler));
        let idle = Arc::new(AtomicBool::new(false));
        let (event_tx, event_rx) = crossbeam_channel::bounded(EVENT_QUEUE_CAPACITY);

        let stream = match sample_format {
            cpal::SampleFormat::F32 => {
                build_stream::<f32>(&device, &config, sampler.clone(), event_rx, idle.clone())?
            }
            cpal::SampleFormat::I16 => {
                build_stream::<i16>(&device, &config, sampler.clone(), event_rx, idle.clone())?
            }
            cpal::SampleFormat::U16 => {
                build_stream::<u16>(&device, &config, sampler.clone(), event_rx, idle.clone())?
            }
            other => return Err(format!("unsupported output sample format {:?}", other).into()),
        };
        stream.play()?;

        Ok(Self {
            _stream: stream,
            sampler,
            event_tx,
            idle,
        })
    }

    /// Queues a control event for the next block.
    pub fn send(&self, event: ControlEvent) {
        if let Err(e) = self.event_tx.try_send(event) {
            warn!(error = %e, "Control event queue full, dropping event");
        }
    }

    /// Runs a closure against the sampler. Main-thread use only; this takes
    /// the lock the callback tries for.
    pub fn with_sampler<R>(&self, f: impl FnOnce(&Sampler) -> R) -> R {
        f(&self.sampler.lock().unwrap())
    }

    /// Returns true once all queued events are consumed and the callback
    /// last observed the sampler as neither playing nor holding a pending
    /// sample. Lock-free; suitable for polling during playback.
    pub fn is_idle(&self) -> bool {
        self.event_tx.is_empty() && self.idle.load(Ordering::Acquire)
    }
}

/// Builds the output stream for a concrete sample type.
fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    sampler: Arc<Mutex<Sampler>>,
    event_rx: Receiver<ControlEvent>,
    idle: Arc<AtomicBool>,
) -> Result<cpal::Stream, Box<dyn Error>>
where
    T: cpal::SizedSample + cpal::FromSample<f32>,
{
    let channels = (config.channels as usize).max(1);

    let priority = thread_priority::callback_thread_priority();
    let rt_audio = thread_priority::rt_audio_enabled();
    let mut priority_set = false;

    let mut events: Vec<ControlEvent> = Vec::with_capacity(EVENT_QUEUE_CAPACITY);
    let mut mono: Vec<f32> = vec![0.0; INITIAL_BLOCK_CAPACITY];

    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            thread_priority::configure_audio_thread_priority(priority, rt_audio, &mut priority_set);

            events.clear();
            while events.len() < EVENT_QUEUE_CAPACITY {
                match event_rx.try_recv() {
                    Ok(event) => events.push(event),
                    Err(_) => break,
                }
            }

            let frames = data.len() / channels;
            if mono.len() < frames {
                mono.resize(frames, 0.0);
            }
            let block = &mut mono[..frames];

            // try_lock keeps the callback non-blocking; a missed lock (the
            // main thread saving state) renders one silent block.
            match sampler.try_lock() {
                Ok(mut sampler) => {
                    sampler.render(&mut events, block);
                    idle.store(
                        !sampler.is_playing() && !sampler.pending_ready(),
                        Ordering::Release,
                    );
                }
                Err(_) => block.fill(0.0),
            }

            for (frame, sample) in data.chunks_mut(channels).zip(block.iter()) {
                let converted = T::from_sample(*sample);
                for out in frame.iter_mut() {
                    *out = converted;
                }
            }
        },
        move |err| error!(error = %err, "Audio stream error"),
        None,
    )?;

    Ok(stream)
}
