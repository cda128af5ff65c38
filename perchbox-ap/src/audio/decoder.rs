//! Audio decoder using symphonia
//!
//! Decodes a whole stimulus file (WAV, MP3, FLAC, AAC/M4A, Vorbis) to
//! interleaved stereo f32 at the file's native sample rate.

use crate::error::{Error, Result};
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

/// Decoded file: interleaved stereo samples plus source sample rate
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    /// Channel count of the source before stereo conversion
    pub source_channels: usize,
}

/// Whole-file decoder
pub struct SimpleDecoder;

impl SimpleDecoder {
    /// Decode an entire file to stereo f32
    ///
    /// Mono is duplicated to both channels; sources with more than two
    /// channels keep their first two.
    pub fn decode_file(path: &Path) -> Result<DecodedAudio> {
        debug!("Decoding {}", path.display());

        let file = std::fs::File::open(path)
            .map_err(|e| Error::Decode(format!("Failed to open file {}: {}", path.display(), e)))?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| Error::Decode(format!("Failed to probe format: {}", e)))?;
        let mut format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| Error::Decode("No audio track found".to_string()))?;
        let track_id = track.id;

        let sample_rate = track
            .codec_params
            .sample_rate
            .ok_or_else(|| Error::Decode("Sample rate not found".to_string()))?;

        let mut decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| Error::Decode(format!("Failed to create decoder: {}", e)))?;

        let mut samples = Vec::new();
        let mut source_channels = 0;
        let mut scratch: Option<SampleBuffer<f32>> = None;

        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break;
                }
                Err(e) => {
                    warn!("Error reading packet from {}: {}", path.display(), e);
                    break;
                }
            };

            if packet.track_id() != track_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::DecodeError(e)) => {
                    warn!("Skipping corrupt packet in {}: {}", path.display(), e);
                    continue;
                }
                Err(e) => return Err(Error::Decode(format!("Decode failed: {}", e))),
            };

            let spec = *decoded.spec();
            let frames = decoded.capacity();
            if scratch
                .as_ref()
                .map_or(true, |b| b.capacity() < frames * spec.channels.count())
            {
                scratch = Some(SampleBuffer::new(frames as u64, spec));
            }
            let Some(buf) = scratch.as_mut() else {
                continue;
            };
            buf.copy_interleaved_ref(decoded);

            source_channels = spec.channels.count();
            append_stereo(buf.samples(), source_channels, &mut samples);
        }

        if samples.is_empty() {
            return Err(Error::Decode(format!(
                "No audio decoded from {}",
                path.display()
            )));
        }

        debug!(
            "Decoded {} frames at {}Hz from {}",
            samples.len() / 2,
            sample_rate,
            path.display()
        );

        Ok(DecodedAudio {
            samples,
            sample_rate,
            source_channels,
        })
    }
}

/// Append interleaved `input` with `channels` channels as stereo
fn append_stereo(input: &[f32], channels: usize, output: &mut Vec<f32>) {
    match channels {
        0 => {}
        1 => {
            output.reserve(input.len() * 2);
            for s in input {
                output.push(*s);
                output.push(*s);
            }
        }
        2 => output.extend_from_slice(input),
        n => {
            for frame in input.chunks_exact(n) {
                output.push(frame[0]);
                output.push(frame[1]);
            }
        }
    }
}
