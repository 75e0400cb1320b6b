//! Acoustic detectors: physical impacts ("thumps") and voice activity
//!
//! Unlike the face and hand detectors these are not edge-triggered. They fire
//! on a level condition and rely on a debounce window to avoid recounting one
//! acoustic event across consecutive audio pulls.

use crate::audio::Envelope;
use crate::config::AcousticConfig;
use crate::types::Timestamp;

/// Counts acoustic spikes, at most once per debounce window
#[derive(Debug, Clone, PartialEq)]
pub struct ImpactDetector {
    relative_factor: f64,
    absolute_floor: f64,
    debounce_ms: u64,
    flash_ms: u64,
    count: u32,
    last_fire: Option<Timestamp>,
}

impl ImpactDetector {
    pub fn new(config: &AcousticConfig) -> Self {
        Self {
            relative_factor: config.impact_relative_factor,
            absolute_floor: config.impact_absolute_floor,
            debounce_ms: config.impact_debounce_ms,
            flash_ms: config.impact_flash_ms,
            count: 0,
            last_fire: None,
        }
    }

    /// Spike test: well above the slow average, or above the absolute floor
    pub fn is_spike(&self, envelope: &Envelope) -> bool {
        envelope.rms > envelope.avg_rms * self.relative_factor
            || envelope.rms > self.absolute_floor
    }

    /// Returns true when an impact is counted at `now`
    pub fn observe(&mut self, envelope: &Envelope, now: Timestamp) -> bool {
        if !self.is_spike(envelope) {
            return false;
        }
        let debounced = self
            .last_fire
            .is_some_and(|last| now.saturating_sub(last) <= self.debounce_ms);
        if debounced {
            return false;
        }

        self.count = self.count.saturating_add(1);
        self.last_fire = Some(now);
        true
    }

    /// Whether the momentary impact flash is still showing at `now`
    pub fn is_flashing(&self, now: Timestamp) -> bool {
        self.last_fire
            .is_some_and(|last| now.saturating_sub(last) < self.flash_ms)
    }

    pub fn count(&self) -> u32 {
        self.count
    }
}

/// Credits one "voice-active second" per qualifying debounce window
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceActivityDetector {
    threshold: f64,
    debounce_ms: u64,
    seconds: u32,
    last_credit: Timestamp,
}

impl VoiceActivityDetector {
    pub fn new(config: &AcousticConfig) -> Self {
        Self {
            threshold: config.voice_threshold,
            debounce_ms: config.voice_debounce_ms,
            seconds: 0,
            // The window is anchored at session start
            last_credit: 0,
        }
    }

    /// Returns true when a voice second is credited at `now`
    pub fn observe(&mut self, rms: f64, now: Timestamp) -> bool {
        if rms > self.threshold && now.saturating_sub(self.last_credit) > self.debounce_ms {
            self.seconds = self.seconds.saturating_add(1);
            self.last_credit = now;
            true
        } else {
            false
        }
    }

    pub fn seconds(&self) -> u32 {
        self.seconds
    }
}
