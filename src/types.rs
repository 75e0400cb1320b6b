//! Core data types for Synheart Focus
//!
//! This module defines the landmark/audio/frame shapes that cross the detector
//! boundary, the per-session counters and flags, and the snapshot/stats records
//! that flow out to the dashboard and the retrospective report.

use serde::{Deserialize, Serialize};

use crate::error::ComputeError;

/// Monotonic milliseconds since session start
pub type Timestamp = u64;

/// Landmark index of the nose tip
pub const NOSE_TIP: usize = 1;
/// Landmark index of the left eye's outer corner
pub const LEFT_EYE_OUTER: usize = 33;
/// Landmark index of the right eye's outer corner
pub const RIGHT_EYE_OUTER: usize = 263;

/// Blendshape categories consumed by the face detectors
pub const EYE_BLINK_LEFT: &str = "eyeBlinkLeft";
pub const EYE_BLINK_RIGHT: &str = "eyeBlinkRight";
pub const BROW_DOWN_LEFT: &str = "browDownLeft";
pub const BROW_DOWN_RIGHT: &str = "browDownRight";

/// Session tracking lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingState {
    Idle,
    Loading,
    Active,
    Error,
}

/// A normalized landmark position
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub z: f64,
}

impl Landmark {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y, z: 0.0 }
    }
}

/// A named blendshape score (0-1)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Blendshape {
    #[serde(alias = "categoryName")]
    pub category_name: String,
    pub score: f64,
}

/// Landmarks and optional blendshapes for one detected face
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FaceLandmarks {
    pub landmarks: Vec<Landmark>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blendshapes: Option<Vec<Blendshape>>,
}

impl FaceLandmarks {
    /// Get a landmark by index, if the detector produced that many points
    pub fn landmark(&self, index: usize) -> Option<&Landmark> {
        self.landmarks.get(index)
    }

    /// Score of a blendshape category; a missing category scores 0
    pub fn blendshape_score(&self, category: &str) -> f64 {
        self.blendshapes
            .as_deref()
            .and_then(|shapes| shapes.iter().find(|b| b.category_name == category))
            .map(|b| b.score)
            .unwrap_or(0.0)
    }

    /// Whether any blendshape scores were produced. An absent or empty list
    /// means the model skipped blendshapes this frame, so the blink and brow
    /// detectors hold their state instead of reading every score as 0.
    pub fn has_blendshapes(&self) -> bool {
        self.blendshapes.as_ref().is_some_and(|b| !b.is_empty())
    }
}

/// Landmarks for one detected hand
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HandLandmarks {
    pub landmarks: Vec<Landmark>,
}

/// Output of the landmark detector for one frame
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DetectionResult {
    #[serde(default)]
    pub faces: Vec<FaceLandmarks>,
    #[serde(default)]
    pub hands: Vec<HandLandmarks>,
}

impl DetectionResult {
    /// The first detected face, if any landmarks were found
    pub fn primary_face(&self) -> Option<&FaceLandmarks> {
        self.faces.first().filter(|f| !f.landmarks.is_empty())
    }

    /// Whether any hand landmark set is present
    pub fn hands_in_view(&self) -> bool {
        !self.hands.is_empty()
    }
}

/// Packed 8-bit RGB raster (3 bytes per pixel, row-major)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RgbRaster {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl RgbRaster {
    /// Create a raster, checking the buffer matches the dimensions
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, ComputeError> {
        let raster = Self {
            width,
            height,
            pixels,
        };
        raster.validate()?;
        Ok(raster)
    }

    /// Create a raster filled with a single color. Dimensions whose byte size
    /// overflows produce an empty buffer that fails validation.
    pub fn uniform(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let pixels = rgb
            .iter()
            .copied()
            .cycle()
            .take(rgb_byte_len(width, height).unwrap_or(0))
            .collect();
        Self {
            width,
            height,
            pixels,
        }
    }

    pub fn validate(&self) -> Result<(), ComputeError> {
        if self.width == 0 || self.height == 0 {
            return Err(ComputeError::InvalidFrame(format!(
                "empty raster {}x{}",
                self.width, self.height
            )));
        }
        let expected = rgb_byte_len(self.width, self.height).ok_or_else(|| {
            ComputeError::InvalidFrame(format!(
                "{}x{} RGB raster is too large",
                self.width, self.height
            ))
        })?;
        if self.pixels.len() != expected {
            return Err(ComputeError::InvalidFrame(format!(
                "expected {} bytes for {}x{} RGB, got {}",
                expected,
                self.width,
                self.height,
                self.pixels.len()
            )));
        }
        Ok(())
    }

    /// RGB triple at (x, y)
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
        let i = (y as usize * self.width as usize + x as usize) * 3;
        [self.pixels[i], self.pixels[i + 1], self.pixels[i + 2]]
    }

    /// Nearest-neighbour resample into a `width`x`height` raster
    pub fn downsample(&self, width: u32, height: u32) -> Result<RgbRaster, ComputeError> {
        self.validate()?;
        if width == 0 || height == 0 {
            return Err(ComputeError::InvalidFrame(format!(
                "cannot resample to {width}x{height}"
            )));
        }
        if width == self.width && height == self.height {
            return Ok(self.clone());
        }

        let len = rgb_byte_len(width, height).ok_or_else(|| {
            ComputeError::InvalidFrame(format!("cannot resample to {width}x{height}"))
        })?;
        let mut pixels = Vec::with_capacity(len);
        for y in 0..height {
            let src_y = (y as u64 * self.height as u64 / height as u64) as u32;
            for x in 0..width {
                let src_x = (x as u64 * self.width as u64 / width as u64) as u32;
                pixels.extend_from_slice(&self.pixel(src_x, src_y));
            }
        }

        Ok(RgbRaster {
            width,
            height,
            pixels,
        })
    }
}

/// Byte length of a packed RGB buffer, or `None` if it does not fit in memory
fn rgb_byte_len(width: u32, height: u32) -> Option<usize> {
    usize::try_from(width)
        .ok()?
        .checked_mul(usize::try_from(height).ok()?)?
        .checked_mul(3)
}

/// Host heap telemetry, when the platform exposes it
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeapUsage {
    pub used_bytes: u64,
    pub limit_bytes: u64,
}

/// One gaze sample in the live ring
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GazeSample {
    pub time: Timestamp,
    pub is_looking: bool,
}

impl GazeSample {
    /// Chart encoding of the sample (1 = looking)
    pub fn state(&self) -> u8 {
        u8::from(self.is_looking)
    }
}

/// Monotonic per-session event counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EventCounters {
    pub look_count: u32,
    pub blink_count: u32,
    pub fidget_count: u32,
    pub thump_count: u32,
    pub brow_furrow_count: u32,
    pub voice_seconds: u32,
}

/// "Currently inside the active state" flags, one per edge detector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HysteresisFlags {
    pub is_blinking: bool,
    pub is_brow_furrowed: bool,
    pub is_hand_in_frame: bool,
    pub last_looking_state: bool,
}

/// Continuously mutated signal values with no retained history
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SignalReadings {
    /// Smoothed 0-100 noise level
    pub noise_level: f64,
    /// Absolute head tilt in degrees
    pub head_tilt: f64,
    /// Mean luma of the last sampled frame (0-255)
    pub brightness: f64,
    /// Client-device load proxy (0-100), not a biometric
    pub system_stress: f64,
}

/// Immutable point-in-time capture of all tracked metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub timestamp: Timestamp,
    pub is_looking: bool,
    pub blink_count: u32,
    pub fidget_count: u32,
    pub noise_level: f64,
    pub brow_furrow_count: u32,
    pub brightness: f64,
    pub system_stress: f64,
    pub thump_count: u32,
    pub head_tilt: f64,
    /// Rolling engagement score at capture time
    pub focus_score: u32,
}

/// Geographic position captured once at session start
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoLocation {
    pub latitude: f64,
    pub longitude: f64,
}

/// Derived session summary, recomputed on demand
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStats {
    pub total_looks: u32,
    pub total_time_seconds: u64,
    pub average_focus_duration: u64,
    /// Percentage of recent gaze samples looking at screen (0-100)
    pub engagement_score: u32,
    pub total_blinks: u32,
    pub hand_fidget_count: u32,
    pub avg_noise_level: f64,
    pub voice_time_seconds: u32,
    pub thump_count: u32,
    pub head_tilt_degrees: f64,
    pub brow_furrow_count: u32,
    pub avg_brightness: f64,
    /// Hardware lag proxy, distinct from user stress
    pub system_stress_score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<GeoLocation>,
}

/// Overall engagement category assigned by the summarizer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngagementLevel {
    High,
    Medium,
    Low,
}

/// Natural-language session analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AIAnalysis {
    pub summary: String,
    pub tips: Vec<String>,
    #[serde(alias = "engagementLevel")]
    pub engagement_level: EngagementLevel,
}

/// A discrete event emitted by one engine tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    LookStarted { at: Timestamp, total: u32 },
    BlinkCompleted { at: Timestamp, total: u32 },
    BrowFurrowed { at: Timestamp, total: u32 },
    HandEntered { at: Timestamp, total: u32 },
    Impact { at: Timestamp, total: u32 },
    VoiceSecond { at: Timestamp, total: u32 },
    Snapshot { snapshot: SessionSnapshot },
}

impl SessionEvent {
    pub fn at(&self) -> Timestamp {
        match self {
            SessionEvent::LookStarted { at, .. }
            | SessionEvent::BlinkCompleted { at, .. }
            | SessionEvent::BrowFurrowed { at, .. }
            | SessionEvent::HandEntered { at, .. }
            | SessionEvent::Impact { at, .. }
            | SessionEvent::VoiceSecond { at, .. } => *at,
            SessionEvent::Snapshot { snapshot } => snapshot.timestamp,
        }
    }
}

/// Everything the engine consumes for one tick
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TickSample {
    pub timestamp_ms: Timestamp,
    /// Detector output; `None` when inference produced nothing this tick
    #[serde(default)]
    pub detection: Option<DetectionResult>,
    /// One pull of time-domain amplitude samples in [-1, 1]
    #[serde(default)]
    pub audio: Option<Vec<f32>>,
    /// Current video frame, read only when a brightness sample is due
    #[serde(default)]
    pub frame: Option<RgbRaster>,
    #[serde(default)]
    pub heap: Option<HeapUsage>,
}

impl TickSample {
    pub fn at(timestamp_ms: Timestamp) -> Self {
        Self {
            timestamp_ms,
            ..Default::default()
        }
    }

    pub fn with_detection(mut self, detection: DetectionResult) -> Self {
        self.detection = Some(detection);
        self
    }

    pub fn with_audio(mut self, samples: Vec<f32>) -> Self {
        self.audio = Some(samples);
        self
    }

    pub fn with_frame(mut self, frame: RgbRaster) -> Self {
        self.frame = Some(frame);
        self
    }

    pub fn with_heap(mut self, heap: HeapUsage) -> Self {
        self.heap = Some(heap);
        self
    }
}
