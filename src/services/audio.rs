//! Audio decoding and normalization
//!
//! Decodes arbitrary audio files with symphonia, downmixes to mono, and
//! resamples with rubato to the fixed 16 kHz / 16-bit signal the signature
//! generator consumes.

use crate::{Error, Result};
use rubato::{FastFixedIn, PolynomialDegree, Resampler};
use std::fs::File;
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Fixed sample rate of the normalized signal
pub const TARGET_SAMPLE_RATE: u32 = 16_000;

/// Mono 16 kHz PCM signal
#[derive(Debug, Clone)]
pub struct MonoAudio {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
}

impl MonoAudio {
    pub fn duration_seconds(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Copy of the signal with its leading `seconds` removed
    pub fn trim_lead(&self, seconds: u32) -> MonoAudio {
        let skip = (self.sample_rate as usize * seconds as usize).min(self.samples.len());
        MonoAudio {
            samples: self.samples[skip..].to_vec(),
            sample_rate: self.sample_rate,
        }
    }
}

/// Decode `path` and normalize it to mono 16 kHz i16.
pub fn load_normalized(path: &Path) -> Result<MonoAudio> {
    let (mono, native_rate) = decode_mono(path)?;
    let resampled = resample(mono, native_rate, TARGET_SAMPLE_RATE)?;

    let samples = resampled
        .into_iter()
        .map(|s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
        .collect::<Vec<_>>();

    tracing::debug!(
        path = %path.display(),
        seconds = samples.len() as f64 / TARGET_SAMPLE_RATE as f64,
        "Audio normalized"
    );

    Ok(MonoAudio {
        samples,
        sample_rate: TARGET_SAMPLE_RATE,
    })
}

/// Decode a file to mono f32 at its native sample rate
fn decode_mono(path: &Path) -> Result<(Vec<f32>, u32)> {
    let file = File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| Error::Audio(format!("unsupported format {}: {e}", path.display())))?;

    let mut format = probed.format;

    let track = format
        .default_track()
        .ok_or_else(|| Error::Audio(format!("no audio track in {}", path.display())))?;
    let track_id = track.id;
    let codec_params = track.codec_params.clone();
    let native_rate = codec_params.sample_rate.unwrap_or(44_100);

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| Error::Audio(format!("unsupported codec {}: {e}", path.display())))?;

    let mut mono: Vec<f32> = Vec::new();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(e) => return Err(Error::Audio(format!("read failed: {e}"))),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            // A corrupt packet mid-stream is skipped, not fatal
            Err(SymphoniaError::DecodeError(e)) => {
                tracing::warn!(path = %path.display(), error = %e, "Skipping undecodable packet");
                continue;
            }
            Err(e) => return Err(Error::Audio(format!("decode failed: {e}"))),
        };

        let spec = *decoded.spec();
        let channels = spec.channels.count().max(1);

        let buf = sample_buf.get_or_insert_with(|| {
            SampleBuffer::<f32>::new(decoded.capacity() as u64, spec)
        });
        buf.copy_interleaved_ref(decoded);

        // Downmix interleaved frames by averaging channels
        for frame in buf.samples().chunks_exact(channels) {
            mono.push(frame.iter().sum::<f32>() / channels as f32);
        }
    }

    if mono.is_empty() {
        return Err(Error::Audio(format!("no samples decoded from {}", path.display())));
    }

    Ok((mono, native_rate))
}

/// Resample a mono signal to `output_rate`
fn resample(input: Vec<f32>, input_rate: u32, output_rate: u32) -> Result<Vec<f32>> {
    if input_rate == output_rate {
        return Ok(input);
    }

    let frames = input.len();
    let mut resampler = FastFixedIn::<f32>::new(
        output_rate as f64 / input_rate as f64,
        1.0,
        PolynomialDegree::Septic,
        frames,
        1,
    )
    .map_err(|e| Error::Audio(format!("resampler init failed: {e}")))?;

    let mut output = resampler
        .process(&[input], None)
        .map_err(|e| Error::Audio(format!("resampling failed: {e}")))?;

    Ok(output.remove(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_and_trim() {
        let audio = MonoAudio {
            samples: vec![0i16; TARGET_SAMPLE_RATE as usize * 10],
            sample_rate: TARGET_SAMPLE_RATE,
        };
        assert_eq!(audio.duration_seconds(), 10.0);

        let trimmed = audio.trim_lead(7);
        assert_eq!(trimmed.duration_seconds(), 3.0);

        // Trimming more than the signal holds leaves it empty, not panicking
        let emptied = audio.trim_lead(30);
        assert!(emptied.samples.is_empty());
    }

    #[test]
    fn test_resample_halves_sample_count() {
        let input = vec![0.5f32; 32_000];
        let output = resample(input, 32_000, 16_000).unwrap();
        // Polynomial resampler output lands within a few frames of the ratio
        assert!((output.len() as i64 - 16_000).abs() < 64);
    }

    #[test]
    fn test_resample_passthrough_at_target_rate() {
        let input = vec![0.25f32; 16_000];
        let output = resample(input.clone(), 16_000, 16_000).unwrap();
        assert_eq!(output, input);
    }
}
