//! Engine configuration
//!
//! Every threshold and debounce window used by the detectors is an empirically
//! chosen constant, so they are grouped here as tunable configuration.

use serde::{Deserialize, Serialize};

use crate::error::ComputeError;

/// Face signal thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GazeConfig {
    /// Lower bound (exclusive) of the horizontal eye ratio counted as "looking"
    pub ratio_min: f64,
    /// Upper bound (exclusive) of the horizontal eye ratio counted as "looking"
    pub ratio_max: f64,
    /// Both eyeBlink scores must exceed this to count as closed
    pub blink_threshold: f64,
    /// Both browDown scores must exceed this to count as furrowed
    pub brow_threshold: f64,
}

impl Default for GazeConfig {
    fn default() -> Self {
        Self {
            ratio_min: 0.35,
            ratio_max: 0.65,
            blink_threshold: 0.5,
            brow_threshold: 0.4,
        }
    }
}

/// Audio envelope and acoustic event settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcousticConfig {
    pub avg_rms_seed: f64,
    /// Weight kept by the slow RMS average on every pull
    pub avg_rms_decay: f64,
    /// Weight kept by the published noise level on every pull
    pub noise_smoothing: f64,
    pub impact_relative_factor: f64,
    pub impact_absolute_floor: f64,
    pub impact_debounce_ms: u64,
    pub impact_flash_ms: u64,
    pub voice_threshold: f64,
    pub voice_debounce_ms: u64,
    /// Samples per audio pull
    pub buffer_len: usize,
}

impl Default for AcousticConfig {
    fn default() -> Self {
        Self {
            avg_rms_seed: 0.01,
            avg_rms_decay: 0.98,
            noise_smoothing: 0.95,
            impact_relative_factor: 4.0,
            impact_absolute_floor: 0.08,
            impact_debounce_ms: 500,
            impact_flash_ms: 200,
            voice_threshold: 0.03,
            voice_debounce_ms: 1000,
            buffer_len: 2048,
        }
    }
}

/// Aggregation cadences
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CadenceConfig {
    pub gaze_sample_interval_ms: u64,
    pub gaze_ring_capacity: usize,
    pub snapshot_interval_ms: u64,
}

impl Default for CadenceConfig {
    fn default() -> Self {
        Self {
            gaze_sample_interval_ms: 100,
            gaze_ring_capacity: 50,
            snapshot_interval_ms: 2000,
        }
    }
}

/// Brightness and system-stress sampling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentConfig {
    pub brightness_interval_ms: u64,
    pub raster_width: u32,
    pub raster_height: u32,
    pub stress_window_ms: u64,
    pub target_fps: f64,
    /// Stress points per missing frame below target
    pub fps_stress_gain: f64,
    pub fps_weight: f64,
    pub memory_weight: f64,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            brightness_interval_ms: 1000,
            raster_width: 64,
            raster_height: 48,
            stress_window_ms: 1000,
            target_fps: 60.0,
            fps_stress_gain: 4.0,
            fps_weight: 0.8,
            memory_weight: 0.2,
        }
    }
}

/// Complete engine configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub gaze: GazeConfig,
    pub acoustic: AcousticConfig,
    pub cadence: CadenceConfig,
    pub environment: EnvironmentConfig,
}

impl EngineConfig {
    /// Parse and validate a configuration; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self, ComputeError> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, ComputeError> {
        serde_json::to_string_pretty(self).map_err(ComputeError::JsonError)
    }

    /// Reject configurations that would make a detector meaningless
    pub fn validate(&self) -> Result<(), ComputeError> {
        let g = &self.gaze;
        if !(g.ratio_min < g.ratio_max) {
            return Err(invalid(format!(
                "gaze.ratio_min ({}) must be below gaze.ratio_max ({})",
                g.ratio_min, g.ratio_max
            )));
        }
        require_positive("gaze.blink_threshold", g.blink_threshold)?;
        require_positive("gaze.brow_threshold", g.brow_threshold)?;

        let a = &self.acoustic;
        require_unit_interval("acoustic.avg_rms_decay", a.avg_rms_decay)?;
        require_unit_interval("acoustic.noise_smoothing", a.noise_smoothing)?;
        require_positive("acoustic.avg_rms_seed", a.avg_rms_seed)?;
        require_positive("acoustic.impact_relative_factor", a.impact_relative_factor)?;
        require_positive("acoustic.impact_absolute_floor", a.impact_absolute_floor)?;
        require_positive("acoustic.voice_threshold", a.voice_threshold)?;
        if a.buffer_len == 0 {
            return Err(invalid("acoustic.buffer_len must be non-zero".to_string()));
        }

        let c = &self.cadence;
        if c.gaze_ring_capacity == 0 {
            return Err(invalid(
                "cadence.gaze_ring_capacity must be non-zero".to_string(),
            ));
        }
        if c.gaze_sample_interval_ms == 0 || c.snapshot_interval_ms == 0 {
            return Err(invalid("cadence intervals must be non-zero".to_string()));
        }

        let e = &self.environment;
        if e.raster_width == 0 || e.raster_height == 0 {
            return Err(invalid(
                "environment raster dimensions must be non-zero".to_string(),
            ));
        }
        if e.brightness_interval_ms == 0 || e.stress_window_ms == 0 {
            return Err(invalid(
                "environment intervals must be non-zero".to_string(),
            ));
        }
        require_positive("environment.target_fps", e.target_fps)?;
        if e.fps_weight < 0.0
            || e.memory_weight < 0.0
            || (e.fps_weight + e.memory_weight - 1.0).abs() > 1e-6
        {
            return Err(invalid(format!(
                "environment weights must be non-negative and sum to 1 (got {} + {})",
                e.fps_weight, e.memory_weight
            )));
        }

        Ok(())
    }
}

fn invalid(msg: String) -> ComputeError {
    ComputeError::InvalidConfig(msg)
}

fn require_positive(name: &str, value: f64) -> Result<(), ComputeError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(invalid(format!("{name} must be positive (got {value})")))
    }
}

fn require_unit_interval(name: &str, value: f64) -> Result<(), ComputeError> {
    if (0.0..1.0).contains(&value) {
        Ok(())
    } else {
        Err(invalid(format!("{name} must be in [0, 1) (got {value})")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config =
            EngineConfig::from_json(r#"{"acoustic": {"impact_debounce_ms": 750}}"#).unwrap();

        assert_eq!(config.acoustic.impact_debounce_ms, 750);
        assert_eq!(config.acoustic.voice_debounce_ms, 1000);
        assert_eq!(config.cadence.gaze_ring_capacity, 50);
        assert_eq!(config.environment.raster_width, 64);
    }

    #[test]
    fn test_json_roundtrip() {
        let config = EngineConfig::default();
        let json = config.to_json().unwrap();
        assert_eq!(EngineConfig::from_json(&json).unwrap(), config);
    }

    #[test]
    fn test_inverted_gaze_band_rejected() {
        let json = r#"{"gaze": {"ratio_min": 0.7, "ratio_max": 0.3}}"#;
        assert!(matches!(
            EngineConfig::from_json(json),
            Err(ComputeError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_zero_ring_capacity_rejected() {
        let mut config = EngineConfig::default();
        config.cadence.gaze_ring_capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_decay_outside_unit_interval_rejected() {
        let mut config = EngineConfig::default();
        config.acoustic.avg_rms_decay = 1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_stress_weights_must_sum_to_one() {
        let mut config = EngineConfig::default();
        config.environment.fps_weight = 0.5;
        assert!(config.validate().is_err());

        config.environment.memory_weight = 0.5;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_json_is_error() {
        assert!(matches!(
            EngineConfig::from_json("not json"),
            Err(ComputeError::JsonError(_))
        ));
    }
}
