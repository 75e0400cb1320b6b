//! Event detectors
//!
//! Each detector consumes one continuous or boolean signal per tick and owns one
//! counter. Counters only move on an edge of the detector's two-state machine
//! (or, for the acoustic detectors, when a debounce window has elapsed).
//!
//! Detectors: Gaze → Blink → Brow furrow → Hand fidget → Impact → Voice activity

pub mod acoustic;
pub mod edge;
pub mod face;
pub mod hand;

pub use acoustic::{ImpactDetector, VoiceActivityDetector};
pub use edge::{CountedEdge, DetectorState, EdgeCounter};
pub use face::{gaze_ratio, head_tilt_degrees, BlinkDetector, BrowFurrowDetector, GazeDetector};
pub use hand::HandFidgetDetector;
