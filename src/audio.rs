//! Audio envelope analysis
//!
//! Computes the RMS amplitude of each audio pull, a slow-moving RMS average used
//! as the impact detector's baseline, and a smoothed 0-100 noise level.

use crate::config::AcousticConfig;

/// Floor applied to RMS before taking the logarithm (-100 dB)
const RMS_FLOOR: f64 = 1e-5;

/// Result of analyzing one audio pull
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Envelope {
    pub rms: f64,
    /// Slow average including this pull
    pub avg_rms: f64,
    /// Instantaneous 0-100 level for this pull (before smoothing)
    pub level: f64,
}

/// Rolling audio envelope state
#[derive(Debug, Clone, PartialEq)]
pub struct AudioEnvelopeAnalyzer {
    avg_rms: f64,
    noise_level: f64,
    decay: f64,
    smoothing: f64,
}

impl AudioEnvelopeAnalyzer {
    pub fn new(config: &AcousticConfig) -> Self {
        Self {
            avg_rms: config.avg_rms_seed,
            noise_level: 0.0,
            decay: config.avg_rms_decay,
            smoothing: config.noise_smoothing,
        }
    }

    /// Analyze one pull of time-domain samples
    pub fn process(&mut self, samples: &[f32]) -> Envelope {
        self.process_rms(compute_rms(samples))
    }

    /// Update the envelope from an already computed RMS value
    pub fn process_rms(&mut self, rms: f64) -> Envelope {
        let rms = if rms.is_finite() { rms.max(0.0) } else { 0.0 };

        self.avg_rms = self.avg_rms * self.decay + rms * (1.0 - self.decay);

        let level = rms_to_level(rms);
        self.noise_level = self.noise_level * self.smoothing + level * (1.0 - self.smoothing);

        Envelope {
            rms,
            avg_rms: self.avg_rms,
            level,
        }
    }

    pub fn avg_rms(&self) -> f64 {
        self.avg_rms
    }

    /// Smoothed noise level (0-100)
    pub fn noise_level(&self) -> f64 {
        self.noise_level
    }
}

/// Root-mean-square amplitude; an empty pull is silent
pub fn compute_rms(samples: &[f32]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f64 = samples
        .iter()
        .map(|&s| {
            let s = s as f64;
            if s.is_finite() {
                s * s
            } else {
                0.0
            }
        })
        .sum();
    (sum / samples.len() as f64).sqrt()
}

/// Map RMS to a 0-100 level
///
/// Formula: `clamp((20 * log10(max(rms, 1e-5)) + 100) * 1.5, 0, 100)`
pub fn rms_to_level(rms: f64) -> f64 {
    let db = 20.0 * rms.max(RMS_FLOOR).log10();
    ((db + 100.0) * 1.5).clamp(0.0, 100.0)
}
