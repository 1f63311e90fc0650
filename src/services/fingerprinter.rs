//! Signature generation over a normalized signal
//!
//! Windows the mono 16 kHz signal into consecutive segments and produces one
//! opaque base64 signature per window, encoded as a data URI the recognition
//! service accepts. The sequence is lazy, bounded by the input length, and
//! cannot be restarted; the fingerprint math itself is treated as a black
//! box behind the digest.

use crate::services::audio::MonoAudio;
use base64::{engine::general_purpose, Engine as _};
use sha2::{Digest, Sha256};

/// Windows shorter than this do not yield a signature
const MIN_WINDOW_SECONDS: usize = 1;

/// One fingerprint signature submitted to the recognition service
#[derive(Debug, Clone, PartialEq)]
pub struct Signature {
    /// Opaque data URI for the wire
    pub uri: String,
    /// Where in the signal this window starts
    pub offset_seconds: f64,
    /// Window length in milliseconds
    pub sample_ms: u32,
}

/// Lazy window sequence over one normalized signal
pub struct SignatureGenerator<'a> {
    samples: &'a [i16],
    sample_rate: u32,
    /// Samples consumed so far; advances monotonically
    cursor: usize,
    window_seconds: u32,
}

impl<'a> SignatureGenerator<'a> {
    pub fn new(audio: &'a MonoAudio, window_seconds: u32) -> Self {
        Self {
            samples: &audio.samples,
            sample_rate: audio.sample_rate,
            cursor: 0,
            window_seconds,
        }
    }

    /// Pre-advance the window position past `seconds` of input
    pub fn skip_seconds(&mut self, seconds: u64) {
        let skip = (self.sample_rate as u64 * seconds) as usize;
        self.cursor = (self.cursor + skip).min(self.samples.len());
    }

    /// Seconds of input consumed so far
    pub fn seconds_processed(&self) -> f64 {
        self.cursor as f64 / self.sample_rate as f64
    }

    /// Next window's signature, or None when the remaining input is shorter
    /// than the minimum window.
    pub fn next_signature(&mut self) -> Option<Signature> {
        let remaining = self.samples.len() - self.cursor;
        if remaining < MIN_WINDOW_SECONDS * self.sample_rate as usize {
            return None;
        }

        let window_len = remaining.min(self.window_seconds as usize * self.sample_rate as usize);
        let window = &self.samples[self.cursor..self.cursor + window_len];
        let offset_seconds = self.seconds_processed();
        self.cursor += window_len;

        Some(Signature {
            uri: encode_signature(window, self.sample_rate),
            offset_seconds,
            sample_ms: (window_len as u64 * 1000 / self.sample_rate as u64) as u32,
        })
    }
}

fn encode_signature(window: &[i16], sample_rate: u32) -> String {
    let mut hasher = Sha256::new();
    hasher.update(sample_rate.to_le_bytes());
    for sample in window {
        hasher.update(sample.to_le_bytes());
    }
    let digest = hasher.finalize();

    format!(
        "data:audio/vnd.sounddex.sig;base64,{}",
        general_purpose::STANDARD.encode(digest)
    )
}
