//! Synheart Focus - Real-time focus signal fusion and session aggregation
//!
//! Focus turns per-frame face/hand landmarks, microphone samples and ambient
//! readings into attention events, periodic snapshots and end-of-session
//! statistics through a deterministic pipeline: audio envelope → environment
//! sampling → face and hand detectors → gaze history → snapshot aggregation.
//!
//! ## Modules
//!
//! - **Engine**: Single owner of all per-session state, advanced one tick at a time
//! - **Session**: Lifecycle controller around model loading and media acquisition
//! - **Report**: Session report encoding and retrospective analysis requests

pub mod aggregator;
pub mod audio;
pub mod config;
pub mod detectors;
pub mod encoder;
pub mod engine;
pub mod environment;
pub mod error;
pub mod report;
pub mod sensors;
pub mod session;
pub mod timeline;
pub mod types;

// Async detection loop on tokio
#[cfg(feature = "runtime")]
pub mod runtime;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use config::EngineConfig;
pub use encoder::{ReportEncoder, SessionMeta, SessionReport};
pub use engine::{LiveMetrics, SessionEngine};
pub use error::ComputeError;
pub use report::{ReportOutcome, ReportRequester, Summarizer};
pub use sensors::{LandmarkDetector, MediaProvider};
pub use session::FocusSession;
pub use types::{SessionEvent, SessionSnapshot, SessionStats, TickSample, TrackingState};

/// Focus version embedded in all session reports
pub const FOCUS_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for session reports
pub const PRODUCER_NAME: &str = "synheart-focus";
