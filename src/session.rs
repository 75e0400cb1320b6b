//! Session controller
//!
//! Owns the lifecycle around the engine: model loading, media acquisition,
//! ticking while active, and producing the report on stop.
//!
//! Lifecycle: `Loading → Idle ⇄ Active`, with `Error` on model or media failure.

use crate::config::EngineConfig;
use crate::encoder::{ReportEncoder, SessionMeta, SessionReport};
use crate::engine::{LiveMetrics, SessionEngine};
use crate::error::ComputeError;
use crate::report::{ReportOutcome, ReportRequester, ANALYSIS_FAILED_BANNER};
use crate::sensors::{LandmarkDetector, MediaProvider, Sensors};
use crate::types::{
    GeoLocation, SessionEvent, SessionStats, TickSample, Timestamp, TrackingState,
};

/// Message shown when the landmark models cannot be loaded
pub const MODEL_LOAD_FAILED: &str = "Could not load AI models.";
/// Message shown when camera or microphone access is refused
pub const MEDIA_ACCESS_REQUIRED: &str = "Media access required.";

/// One user's focus tracking controller
pub struct FocusSession {
    state: TrackingState,
    engine: SessionEngine,
    detector: Option<Box<dyn LandmarkDetector>>,
    sensors: Option<Sensors>,
    meta: Option<SessionMeta>,
    encoder: ReportEncoder,
    error_message: Option<String>,
    analysis: Option<ReportOutcome>,
    analysis_pending: bool,
}

impl std::fmt::Debug for FocusSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FocusSession")
            .field("state", &self.state)
            .field("meta", &self.meta)
            .field("models_loaded", &self.detector.is_some())
            .field("error_message", &self.error_message)
            .field("analysis_pending", &self.analysis_pending)
            .finish()
    }
}

impl FocusSession {
    /// Create a controller in the `Loading` state
    pub fn new(config: EngineConfig) -> Result<Self, ComputeError> {
        Ok(Self {
            state: TrackingState::Loading,
            engine: SessionEngine::new(config)?,
            detector: None,
            sensors: None,
            meta: None,
            encoder: ReportEncoder::new(),
            error_message: None,
            analysis: None,
            analysis_pending: false,
        })
    }

    /// Finish loading the landmark models
    pub fn load_models<F>(&mut self, loader: F) -> Result<(), ComputeError>
    where
        F: FnOnce() -> Result<Box<dyn LandmarkDetector>, ComputeError>,
    {
        match loader() {
            Ok(detector) => {
                self.detector = Some(detector);
                self.state = TrackingState::Idle;
                log::info!("landmark models loaded");
                Ok(())
            }
            Err(e) => {
                log::error!("landmark model load failed: {e}");
                self.fail(MODEL_LOAD_FAILED);
                Err(ComputeError::ModelLoad(e.to_string()))
            }
        }
    }

    /// Acquire media and begin a fresh session
    pub fn start(&mut self, provider: &mut dyn MediaProvider) -> Result<SessionMeta, ComputeError> {
        if self.state == TrackingState::Active {
            return Err(ComputeError::SessionAlreadyActive);
        }
        if self.detector.is_none() {
            return Err(ComputeError::ModelLoad("models not loaded".to_string()));
        }

        let sensors = match Sensors::acquire(provider, self.engine.config().acoustic.buffer_len) {
            Ok(sensors) => sensors,
            Err(e) => {
                log::error!("media acquisition failed: {e}");
                self.fail(MEDIA_ACCESS_REQUIRED);
                return Err(e);
            }
        };

        self.engine.reset();
        let meta = SessionMeta::new_now();
        self.sensors = Some(sensors);
        self.meta = Some(meta);
        self.analysis = None;
        self.analysis_pending = false;
        self.error_message = None;
        self.state = TrackingState::Active;
        log::info!("session {} started", meta.session_id);
        Ok(meta)
    }

    /// Attach a one-shot location to this session's stats
    pub fn set_location(&mut self, latitude: f64, longitude: f64) {
        self.engine.set_location(GeoLocation {
            latitude,
            longitude,
        });
    }

    /// Pull from the acquired sensors and advance the engine
    pub fn tick(&mut self, now: Timestamp) -> Result<Vec<SessionEvent>, ComputeError> {
        self.ensure_active()?;
        let (Some(sensors), Some(detector)) = (self.sensors.as_mut(), self.detector.as_mut())
        else {
            return Err(ComputeError::SessionNotActive);
        };
        let sample = sensors.sample(&mut **detector, now);
        Ok(self.engine.tick(sample))
    }

    /// Advance the engine with a sample gathered by the host
    pub fn tick_with(&mut self, sample: TickSample) -> Result<Vec<SessionEvent>, ComputeError> {
        self.ensure_active()?;
        Ok(self.engine.tick(sample))
    }

    /// Release media, return to `Idle` and produce the session report.
    /// The report is marked as awaiting analysis.
    pub fn stop(&mut self, now: Timestamp) -> Result<SessionReport, ComputeError> {
        self.ensure_active()?;
        self.sensors = None;
        self.state = TrackingState::Idle;
        self.request_analysis();

        let meta = self.meta.unwrap_or_else(SessionMeta::new_now);
        let report = self.encoder.encode(&meta, &self.engine, now);
        log::info!(
            "session {} stopped after {} ms with {} snapshots",
            meta.session_id,
            now,
            report.snapshots.len()
        );
        Ok(report)
    }

    /// Mark the stopped session as awaiting an analysis, e.g. before a retry
    pub fn request_analysis(&mut self) {
        self.analysis = None;
        self.analysis_pending = true;
    }

    /// Deliver an analysis outcome, typically from a request that resolved off
    /// the tick path. Returns false and drops the outcome when no analysis is
    /// pending, so a late result never lands on a newer session.
    pub fn attach_analysis(&mut self, outcome: ReportOutcome) -> bool {
        if !self.analysis_pending {
            log::warn!("discarding analysis outcome with no pending request");
            return false;
        }
        self.analysis_pending = false;
        if outcome.fallback {
            let banner = outcome
                .banner
                .clone()
                .unwrap_or_else(|| ANALYSIS_FAILED_BANNER.to_string());
            self.error_message = Some(banner);
        }
        self.analysis = Some(outcome);
        true
    }

    /// Request the retrospective analysis for a stopped session's report and
    /// wait for it
    pub fn analyze(
        &mut self,
        requester: &ReportRequester,
        report: &mut SessionReport,
    ) -> Result<ReportOutcome, ComputeError> {
        if !self.analysis_pending {
            self.request_analysis();
        }
        let outcome = requester.request(&report.stats)?;
        report.attach_analysis(outcome.clone());
        self.attach_analysis(outcome.clone());
        Ok(outcome)
    }

    pub fn state(&self) -> TrackingState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == TrackingState::Active
    }

    /// Current user-facing error, if any
    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn dismiss_error(&mut self) {
        self.error_message = None;
    }

    pub fn meta(&self) -> Option<&SessionMeta> {
        self.meta.as_ref()
    }

    pub fn analysis(&self) -> Option<&ReportOutcome> {
        self.analysis.as_ref()
    }

    /// Whether the last report is still waiting for its analysis
    pub fn is_analysis_pending(&self) -> bool {
        self.analysis_pending
    }

    /// Whether an analysis (real or fallback) has arrived for the last report
    pub fn is_report_ready(&self) -> bool {
        self.analysis.is_some()
    }

    pub fn engine(&self) -> &SessionEngine {
        &self.engine
    }

    pub fn stats(&self, now: Timestamp) -> SessionStats {
        self.engine.calculate_stats(now)
    }

    pub fn live_metrics(&self, now: Timestamp) -> LiveMetrics {
        self.engine.live_metrics(now)
    }

    fn ensure_active(&self) -> Result<(), ComputeError> {
        if self.state == TrackingState::Active {
            Ok(())
        } else {
            Err(ComputeError::SessionNotActive)
        }
    }

    fn fail(&mut self, message: &str) {
        self.sensors = None;
        self.state = TrackingState::Error;
        self.error_message = Some(message.to_string());
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::sensors::fakes::AttentiveDetector;

    /// Controller with models loaded, ready to start
    pub fn ready_session() -> FocusSession {
        let mut session = FocusSession::new(EngineConfig::default()).unwrap();
        session
            .load_models(|| Ok(Box::new(AttentiveDetector) as Box<dyn LandmarkDetector>))
            .unwrap();
        session
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::ready_session;
    use super::*;
    use crate::report::mock::MockSummarizer;
    use crate::sensors::fakes::FakeProvider;
    use std::sync::Arc;

    #[test]
    fn test_starts_in_loading() {
        let session = FocusSession::new(EngineConfig::default()).unwrap();
        assert_eq!(session.state(), TrackingState::Loading);
    }

    #[test]
    fn test_model_load_failure() {
        let mut session = FocusSession::new(EngineConfig::default()).unwrap();
        let result = session.load_models(|| Err(ComputeError::Detector("wasm fetch".to_string())));

        assert!(matches!(result, Err(ComputeError::ModelLoad(_))));
        assert_eq!(session.state(), TrackingState::Error);
        assert_eq!(session.error_message(), Some(MODEL_LOAD_FAILED));
        assert!(session.start(&mut FakeProvider::default()).is_err());
    }

    #[test]
    fn test_media_denied_enters_error_without_session() {
        let mut session = ready_session();
        let mut provider = FakeProvider {
            deny_microphone: true,
            ..Default::default()
        };

        assert!(session.start(&mut provider).is_err());
        assert_eq!(session.state(), TrackingState::Error);
        assert_eq!(session.error_message(), Some(MEDIA_ACCESS_REQUIRED));
        assert!(session.meta().is_none());
        assert!(matches!(
            session.tick(16),
            Err(ComputeError::SessionNotActive)
        ));

        session.dismiss_error();
        assert_eq!(session.error_message(), None);
        // A later attempt can still succeed
        assert!(session.start(&mut FakeProvider::default()).is_ok());
        assert!(session.is_active());
    }

    #[test]
    fn test_full_session_lifecycle() {
        let mut session = ready_session();
        session.start(&mut FakeProvider::default()).unwrap();
        session.set_location(48.85, 2.35);

        let mut t = 0;
        for _ in 0..300 {
            t += 16;
            session.tick(t).unwrap();
        }
        assert_eq!(session.engine().counters().look_count, 1);
        assert!((session.live_metrics(t).readings.brightness - 128.0).abs() < 1e-6);

        let mut report = session.stop(t).unwrap();
        assert_eq!(session.state(), TrackingState::Idle);
        assert!(session.is_analysis_pending());
        assert!(!session.is_report_ready());
        assert_eq!(report.snapshots.len(), 2);
        assert_eq!(report.stats.engagement_score, 100);
        assert!(report.stats.location.is_some());

        let requester = ReportRequester::new(Arc::new(MockSummarizer::failing()));
        let outcome = session.analyze(&requester, &mut report).unwrap();
        assert!(outcome.fallback);
        assert_eq!(
            session.error_message(),
            Some("Diagnostic synthesis failed. Please retry.")
        );
        assert!(report.analysis.is_some());
        assert!(!session.is_analysis_pending());
        assert!(session.is_report_ready());
    }

    #[test]
    fn test_attached_analysis_marks_report_ready() {
        let mut session = ready_session();
        session.start(&mut FakeProvider::default()).unwrap();
        session.tick(16).unwrap();
        session.stop(16).unwrap();

        let analysis = crate::report::parse_analysis(r#"{"summary": "Calm"}"#).unwrap();
        assert!(session.attach_analysis(ReportOutcome::success(analysis)));
        assert!(session.is_report_ready());
        assert!(!session.is_analysis_pending());
        assert_eq!(session.error_message(), None);
        assert_eq!(session.analysis().unwrap().analysis.summary, "Calm");
    }

    #[test]
    fn test_fallback_analysis_raises_banner() {
        let mut session = ready_session();
        session.start(&mut FakeProvider::default()).unwrap();
        session.stop(0).unwrap();

        let outcome = ReportOutcome {
            banner: None,
            ..ReportOutcome::failed()
        };
        assert!(session.attach_analysis(outcome));
        assert_eq!(session.error_message(), Some(ANALYSIS_FAILED_BANNER));
        assert!(session.analysis().unwrap().fallback);
    }

    #[test]
    fn test_stale_analysis_dropped_after_restart() {
        let mut session = ready_session();
        session.start(&mut FakeProvider::default()).unwrap();
        session.stop(0).unwrap();
        session.start(&mut FakeProvider::default()).unwrap();

        assert!(!session.is_analysis_pending());
        assert!(!session.attach_analysis(ReportOutcome::failed()));
        assert!(session.analysis().is_none());
        assert_eq!(session.error_message(), None);
    }

    #[test]
    fn test_retry_after_fallback() {
        let mut session = ready_session();
        session.start(&mut FakeProvider::default()).unwrap();
        let mut report = session.stop(1000).unwrap();

        let failing = ReportRequester::new(Arc::new(MockSummarizer::failing()));
        assert!(session.analyze(&failing, &mut report).unwrap().fallback);

        session.dismiss_error();
        let working = ReportRequester::new(Arc::new(MockSummarizer::replying(
            r#"{"summary": "Better", "engagementLevel": "High"}"#,
        )));
        let outcome = session.analyze(&working, &mut report).unwrap();
        assert!(!outcome.fallback);
        assert_eq!(session.error_message(), None);
        assert_eq!(report.analysis.unwrap().analysis.summary, "Better");
    }

    #[test]
    fn test_double_start_rejected() {
        let mut session = ready_session();
        session.start(&mut FakeProvider::default()).unwrap();
        assert!(matches!(
            session.start(&mut FakeProvider::default()),
            Err(ComputeError::SessionAlreadyActive)
        ));
    }

    #[test]
    fn test_stop_when_idle_rejected() {
        let mut session = ready_session();
        assert!(matches!(
            session.stop(0),
            Err(ComputeError::SessionNotActive)
        ));
    }

    #[test]
    fn test_restart_leaks_nothing_from_previous_session() {
        let mut session = ready_session();
        let first = session.start(&mut FakeProvider::default()).unwrap();
        for i in 1..=300u64 {
            session.tick(i * 16).unwrap();
        }
        session.stop(4800).unwrap();

        let second = session.start(&mut FakeProvider::default()).unwrap();
        assert_ne!(first.session_id, second.session_id);
        assert_eq!(
            *session.engine(),
            SessionEngine::new(EngineConfig::default()).unwrap()
        );
        assert!(session.analysis().is_none());
    }
}
