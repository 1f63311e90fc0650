//! Recognition engine
//!
//! Drives one item's normalized signal through the external recognition
//! service: a paced scan loop over the signature windows, escalating across
//! fallback audio-preparation strategies until a match or exhaustion.

use crate::config::ScanSettings;
use crate::services::audio::{self, MonoAudio};
use crate::services::fingerprinter::{Signature, SignatureGenerator};
use crate::types::{Disposition, RecognitionPayload};
use crate::utils::backoff::BackoffPolicy;
use std::future::Future;
use std::path::Path;
use std::time::Duration;
use tokio::time::sleep;

/// External recognition service boundary.
///
/// Errors are in-band: transport failures surface as payloads carrying an
/// `error` field, matching the service's own error shape.
pub trait RecognitionService: Send + Sync {
    fn recognize(
        &self,
        signature: &Signature,
    ) -> impl Future<Output = RecognitionPayload> + Send;
}

impl<S: RecognitionService> RecognitionService for &S {
    fn recognize(
        &self,
        signature: &Signature,
    ) -> impl Future<Output = RecognitionPayload> + Send {
        (**self).recognize(signature)
    }
}

/// Local outbound-call budget.
///
/// Owned by the worker and passed into each recognition call, never a hidden
/// singleton. Counts every outbound call; at the ceiling it proactively
/// sleeps a full cooldown and resets, keeping this worker under the external
/// limiter on its own. The cooldown pause shares the backoff policy type
/// used by transaction retries.
pub struct CallBudget {
    calls: u32,
    ceiling: u32,
    cooldown: BackoffPolicy,
}

impl CallBudget {
    pub fn new(ceiling: u32, cooldown: Duration) -> Self {
        Self {
            calls: 0,
            ceiling: ceiling.max(1),
            cooldown: BackoffPolicy::fixed(cooldown),
        }
    }

    /// Count one outbound call, sleeping the cooldown at the ceiling
    pub async fn tick(&mut self) {
        self.calls += 1;
        if self.calls >= self.ceiling {
            tracing::info!(
                calls = self.calls,
                cooldown_ms = self.cooldown.delay_for(1).as_millis() as u64,
                "Call ceiling reached, cooling down"
            );
            self.cooldown.pause(1).await;
            self.calls = 0;
        }
    }

    /// Full cooldown after a service rate-limit signal, then a clean counter
    pub async fn cool_off(&mut self) {
        self.cooldown.pause(1).await;
        self.calls = 0;
    }
}

pub struct RecognitionEngine<S> {
    service: S,
    settings: ScanSettings,
}

impl<S: RecognitionService> RecognitionEngine<S> {
    pub fn new(service: S, settings: ScanSettings) -> Self {
        Self { service, settings }
    }

    /// Recognize one audio file.
    ///
    /// Every read or processing failure is converted into an error payload
    /// so a bad file never aborts the batch around it.
    pub async fn recognize_file(&self, path: &Path, budget: &mut CallBudget) -> RecognitionPayload {
        let audio = match audio::load_normalized(path) {
            Ok(audio) => audio,
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "Failed to prepare audio");
                return RecognitionPayload::from_error(e.to_string());
            }
        };

        self.recognize_audio(&audio, budget).await
    }

    /// Escalate through the audio-preparation strategies in order until one
    /// yields a match; otherwise return the last strategy's result verbatim.
    pub async fn recognize_audio(
        &self,
        audio: &MonoAudio,
        budget: &mut CallBudget,
    ) -> RecognitionPayload {
        let window = self.settings.window_seconds;

        // Strategy 1: the full normalized signal
        let mut generator = SignatureGenerator::new(audio, window);
        let mut result = self.scan(&mut generator, budget).await;
        if result.has_matches() {
            return result;
        }

        // Strategy 2: jump past the likely uninformative lead-in when the
        // signal is long enough that sequential scanning wastes the budget
        let duration = audio.duration_seconds();
        if duration > (3 * window) as f64 {
            let mut generator = SignatureGenerator::new(audio, window);
            generator.skip_seconds(duration as u64 / 2 - window as u64 / 2);
            tracing::info!(
                skipped_seconds = generator.seconds_processed(),
                "No match on full signal, rescanning from midway"
            );
            result = self.scan(&mut generator, budget).await;
            if result.has_matches() {
                return result;
            }
        }

        // Strategy 3: drop the leading seconds entirely
        let trimmed = audio.trim_lead(self.settings.lead_trim_seconds);
        tracing::info!(
            trimmed_seconds = self.settings.lead_trim_seconds,
            "No match yet, retrying with lead-in removed"
        );
        let mut generator = SignatureGenerator::new(&trimmed, window);
        self.scan(&mut generator, budget).await
    }

    /// Core scan loop over one signature sequence.
    ///
    /// Rate-limit signals cool the budget off and retry the same signature;
    /// a service retry hint re-issues the same signature once; no-match
    /// advances the window; matches and hard errors stop the scan.
    async fn scan(
        &self,
        generator: &mut SignatureGenerator<'_>,
        budget: &mut CallBudget,
    ) -> RecognitionPayload {
        let mut result = RecognitionPayload::insufficient_data();
        let mut current = generator.next_signature();

        while let Some(signature) = current.take() {
            budget.tick().await;
            result = self.service.recognize(&signature).await;

            match result.disposition() {
                Disposition::Match | Disposition::HardError => return result,
                Disposition::RateLimited => {
                    tracing::warn!(
                        offset_seconds = signature.offset_seconds,
                        "Service rate limit hit, cooling down before retrying window"
                    );
                    budget.cool_off().await;
                    current = Some(signature);
                }
                Disposition::RetryHint(delay) => {
                    tracing::info!(
                        retry_ms = delay.as_millis() as u64,
                        "No match, service asked for one delayed retry"
                    );
                    sleep(delay).await;
                    budget.tick().await;
                    result = self.service.recognize(&signature).await;
                    match result.disposition() {
                        Disposition::Match | Disposition::HardError => return result,
                        _ => current = generator.next_signature(),
                    }
                }
                Disposition::NoMatch => {
                    tracing::debug!(
                        seconds_processed = generator.seconds_processed(),
                        "No match yet, advancing window"
                    );
                    current = generator.next_signature();
                }
            }
        }

        result
    }
}
