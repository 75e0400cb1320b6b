//! Environmental sampling
//!
//! Two low-frequency samplers that run beside the per-frame detectors:
//! - ambient brightness from a downsampled copy of the current frame
//! - a system stress proxy from frame rate and heap pressure
//!
//! System stress describes the client device (hardware lag), not the user.

use crate::config::EnvironmentConfig;
use crate::error::ComputeError;
use crate::types::{HeapUsage, RgbRaster, Timestamp};

/// Mean Rec.601 luma of a raster
///
/// Formula: `mean(0.299 R + 0.587 G + 0.114 B)`
pub fn mean_luma(raster: &RgbRaster) -> f64 {
    let pixel_count = raster.pixels.len() / 3;
    if pixel_count == 0 {
        return 0.0;
    }
    let total: f64 = raster
        .pixels
        .chunks_exact(3)
        .map(|p| 0.299 * p[0] as f64 + 0.587 * p[1] as f64 + 0.114 * p[2] as f64)
        .sum();
    total / pixel_count as f64
}

/// Ambient brightness, sampled at most once per interval
#[derive(Debug, Clone, PartialEq)]
pub struct BrightnessSampler {
    width: u32,
    height: u32,
    interval_ms: u64,
    last_checked: Option<Timestamp>,
    brightness: f64,
}

impl BrightnessSampler {
    pub fn new(config: &EnvironmentConfig) -> Self {
        Self {
            width: config.raster_width,
            height: config.raster_height,
            interval_ms: config.brightness_interval_ms,
            last_checked: None,
            brightness: 0.0,
        }
    }

    /// Whether a sample should be taken at `now`
    pub fn is_due(&self, now: Timestamp) -> bool {
        self.last_checked
            .is_none_or(|last| now.saturating_sub(last) >= self.interval_ms)
    }

    /// Downsample the frame and update brightness. The gate advances even when
    /// the frame is unusable so a bad frame is not retried on every tick.
    pub fn sample(&mut self, now: Timestamp, frame: &RgbRaster) -> Result<f64, ComputeError> {
        self.last_checked = Some(now);
        let small = frame.downsample(self.width, self.height)?;
        self.brightness = mean_luma(&small);
        Ok(self.brightness)
    }

    /// Last measured brightness (0-255)
    pub fn brightness(&self) -> f64 {
        self.brightness
    }
}

/// Device load estimate over rolling frame-rate windows
#[derive(Debug, Clone, PartialEq)]
pub struct SystemStressSampler {
    window_ms: u64,
    target_fps: f64,
    fps_gain: f64,
    fps_weight: f64,
    memory_weight: f64,
    frames: u32,
    window_start: Timestamp,
    fps: Option<f64>,
    stress: f64,
}

impl SystemStressSampler {
    pub fn new(config: &EnvironmentConfig) -> Self {
        Self {
            window_ms: config.stress_window_ms,
            target_fps: config.target_fps,
            fps_gain: config.fps_stress_gain,
            fps_weight: config.fps_weight,
            memory_weight: config.memory_weight,
            frames: 0,
            window_start: 0,
            fps: None,
            stress: 0.0,
        }
    }

    /// Count one rendered frame. When the window closes, returns the new stress value.
    pub fn record_frame(&mut self, now: Timestamp, heap: Option<HeapUsage>) -> Option<f64> {
        self.frames += 1;
        let elapsed = now.saturating_sub(self.window_start);
        if elapsed < self.window_ms {
            return None;
        }

        let fps = self.frames as f64 * 1000.0 / elapsed as f64;
        let fps_stress = ((self.target_fps - fps) * self.fps_gain).clamp(0.0, 100.0);
        let mem_stress = heap.map(memory_stress).unwrap_or(0.0);
        let combined = fps_stress * self.fps_weight + mem_stress * self.memory_weight;

        self.stress = if combined.is_finite() { combined } else { 0.0 };
        self.fps = Some(fps);
        self.frames = 0;
        self.window_start = now;

        Some(self.stress)
    }

    /// Last computed stress (0-100)
    pub fn stress(&self) -> f64 {
        self.stress
    }

    /// Frame rate measured over the last closed window
    pub fn fps(&self) -> Option<f64> {
        self.fps
    }
}

/// Heap pressure as a percentage; unavailable telemetry degrades to 0
pub fn memory_stress(heap: HeapUsage) -> f64 {
    if heap.limit_bytes == 0 {
        return 0.0;
    }
    let pct = heap.used_bytes as f64 / heap.limit_bytes as f64 * 100.0;
    if pct.is_finite() {
        pct
    } else {
        0.0
    }
}
