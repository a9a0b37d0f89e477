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

//! Decoded sample data.
//!
//! A [`SampleBuffer`] holds an entire audio file decoded into memory. Decoding
//! happens once, off the real-time path; after that the buffer is immutable
//! and the renderer reads straight from its sample slice.

use std::fs::File;
use std::path::{Path, PathBuf};

use symphonia::core::audio::SampleBuffer as SymphoniaSampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::{get_codecs, get_probe};

/// Errors that can occur while loading a sample file.
///
/// These are all contained within the loader: a failed load aborts only the
/// load in flight and leaves the previously active sample untouched.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to open {path}: {source}")]
    FileOpen {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("unsupported format for {path}: {reason}")]
    UnsupportedFormat { path: PathBuf, reason: String },

    #[error("failed to allocate memory for {path}")]
    Allocation { path: PathBuf },

    #[error("failed to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        source: SymphoniaError,
    },
}

/// A monophonic sample decoded entirely into memory.
///
/// Exactly two of these exist at any time inside a running sampler: the
/// active buffer the renderer reads from, and the pending buffer the loader
/// writes into. Ownership moves between the two roles only at the handoff
/// points; buffers are only ever dropped off the real-time path.
pub struct SampleBuffer {
    /// The file this buffer was decoded from. Empty for the unloaded placeholder.
    path: PathBuf,
    /// Number of frames in the sample. Since the sample is mono, this equals
    /// the length of `samples` exactly.
    frame_count: usize,
    /// Channel count of the source file. Always 1 for a loaded buffer.
    channel_count: u16,
    /// Sample rate of the source file. Playback is raw: samples are emitted
    /// at the output rate regardless of this value.
    sample_rate: u32,
    /// The decoded samples, in [-1.0, 1.0].
    samples: Vec<f32>,
}

impl SampleBuffer {
    /// Returns an unloaded placeholder buffer. Does not allocate.
    pub fn empty() -> Self {
        Self {
            path: PathBuf::new(),
            frame_count: 0,
            channel_count: 0,
            sample_rate: 0,
            samples: Vec::new(),
        }
    }

    /// Decodes an entire audio file into a new sample buffer.
    ///
    /// The file must contain exactly one channel and at least one frame.
    /// There is no partial or streaming read: the whole file is decoded
    /// before the buffer is considered valid. May block and allocate, so
    /// this must only be called from a non-real-time context.
    pub fn decode_file(path: &Path) -> Result<Self, LoadError> {
        let file = File::open(path).map_err(|e| LoadError::FileOpen {
            path: path.to_path_buf(),
            source: e,
        })?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
            hint.with_extension(extension);
        }

        let meta_opts: MetadataOptions = Default::default();
        let fmt_opts: FormatOptions = Default::default();
        let probed = get_probe()
            .format(&hint, mss, &fmt_opts, &meta_opts)
            .map_err(|e| LoadError::Decode {
                path: path.to_path_buf(),
                source: e,
            })?;
        let mut format_reader = probed.format;

        let track = format_reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| LoadError::UnsupportedFormat {
                path: path.to_path_buf(),
                reason: "no audio track found".to_string(),
            })?;
        let track_id = track.id;

        let decoder_opts: DecoderOptions = Default::default();
        let mut decoder = get_codecs()
            .make(&track.codec_params, &decoder_opts)
            .map_err(|e| LoadError::Decode {
                path: path.to_path_buf(),
                source: e,
            })?;

        let mut samples: Vec<f32> = Vec::new();
        let mut channel_count: u16 = 0;
        let mut sample_rate: u32 = 0;
        let mut conversion_buffer: Option<SymphoniaSampleBuffer<f32>> = None;

        loop {
            let packet = match Self::next_packet(format_reader.as_mut()) {
                Ok(Some(packet)) => packet,
                Ok(None) => break,
                Err(SymphoniaError::ResetRequired) => {
                    decoder.reset();
                    continue;
                }
                Err(e) => {
                    return Err(LoadError::Decode {
                        path: path.to_path_buf(),
                        source: e,
                    })
                }
            };
            if packet.track_id() != track_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::ResetRequired) => {
                    decoder.reset();
                    continue;
                }
                Err(e) => {
                    return Err(LoadError::Decode {
                        path: path.to_path_buf(),
                        source: e,
                    })
                }
            };

            let spec = *decoded.spec();
            let channels = spec.channels.count() as u16;
            if channels != 1 {
                return Err(LoadError::UnsupportedFormat {
                    path: path.to_path_buf(),
                    reason: format!("expected 1 channel, found {}", channels),
                });
            }
            channel_count = channels;
            sample_rate = spec.rate;

            // Reuse one conversion buffer across packets.
            let conversion = conversion_buffer.get_or_insert_with(|| {
                SymphoniaSampleBuffer::<f32>::new(decoded.capacity() as u64, spec)
            });
            conversion.copy_interleaved_ref(decoded);

            samples
                .try_reserve(conversion.samples().len())
                .map_err(|_| LoadError::Allocation {
                    path: path.to_path_buf(),
                })?;
            samples.extend_from_slice(conversion.samples());
        }

        if samples.is_empty() {
            return Err(LoadError::UnsupportedFormat {
                path: path.to_path_buf(),
                reason: "file contains no frames".to_string(),
            });
        }

        Ok(Self {
            path: path.to_path_buf(),
            frame_count: samples.len(),
            channel_count,
            sample_rate,
            samples,
        })
    }

    /// Reads the next packet, normalizing end-of-stream conditions.
    ///
    /// Some decoders report EOF as `UnexpectedEof`, others as a `DecodeError`;
    /// both are mapped to `Ok(None)`. `ResetRequired` is propagated so the
    /// caller can reset the decoder.
    fn next_packet(
        format_reader: &mut dyn FormatReader,
    ) -> Result<Option<symphonia::core::formats::Packet>, SymphoniaError> {
        match format_reader.next_packet() {
            Ok(packet) => Ok(Some(packet)),
            Err(SymphoniaError::ResetRequired) => Err(SymphoniaError::ResetRequired),
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                Ok(None)
            }
            Err(SymphoniaError::DecodeError(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// The file this buffer was decoded from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of frames in the sample.
    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    /// Channel count of the source file (1 for any loaded buffer).
    pub fn channel_count(&self) -> u16 {
        self.channel_count
    }

    /// Sample rate of the source file.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Duration of the sample at its source rate.
    pub fn duration(&self) -> std::time::Duration {
        if self.sample_rate == 0 {
            return std::time::Duration::ZERO;
        }
        std::time::Duration::from_secs_f64(self.frame_count as f64 / self.sample_rate as f64)
    }

    /// The decoded samples.
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Returns true if this is the unloaded placeholder.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Memory held by the decoded samples, in bytes.
    pub fn memory_size(&self) -> usize {
        self.samples.len() * std::mem::size_of::<f32>()
    }
}

impl std::fmt::Debug for SampleBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleBuffer")
            .field("path", &self.path)
            .field("frame_count", &self.frame_count)
            .field("channel_count", &self.channel_count)
            .field("memory_kb", &(self.memory_size() / 1024))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::write_sample_wav;

    #[test]
    fn test_decode_mono_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("mono.wav");
        let expected = vec![0.1f32, 0.2, 0.3, 0.4];
        write_sample_wav(&path, &expected, 1, 44100);

        let buffer = SampleBuffer::decode_file(&path).expect("decode");
        assert_eq!(buffer.frame_count(), 4);
        assert_eq!(buffer.channel_count(), 1);
        assert_eq!(buffer.sample_rate(), 44100);
        assert_eq!(buffer.samples().len(), buffer.frame_count());
        assert_eq!(buffer.path(), path);
        for (got, want) in buffer.samples().iter().zip(expected.iter()) {
            assert!((got - want).abs() < 1e-6, "got {}, want {}", got, want);
        }
    }

    #[test]
    fn test_decode_missing_file() {
        let result = SampleBuffer::decode_file(Path::new("/nonexistent/sample.wav"));
        assert!(matches!(result, Err(LoadError::FileOpen { .. })));
    }

    #[test]
    fn test_decode_stereo_file_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("stereo.wav");
        write_sample_wav(&path, &[0.1, -0.1, 0.2, -0.2], 2, 44100);

        let result = SampleBuffer::decode_file(&path);
        match result {
            Err(LoadError::UnsupportedFormat { reason, .. }) => {
                assert!(reason.contains("channel"), "unexpected reason: {}", reason);
            }
            other => panic!("expected UnsupportedFormat, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_decode_empty_file_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("empty.wav");
        write_sample_wav(&path, &[], 1, 44100);

        let result = SampleBuffer::decode_file(&path);
        assert!(matches!(result, Err(LoadError::UnsupportedFormat { .. })));
    }

    #[test]
    fn test_empty_placeholder() {
        let buffer = SampleBuffer::empty();
        assert!(buffer.is_empty());
        assert_eq!(buffer.frame_count(), 0);
        assert_eq!(buffer.samples().len(), 0);
        assert_eq!(buffer.memory_size(), 0);
    }
}
