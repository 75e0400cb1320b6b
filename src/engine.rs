//! Per-tick signal fusion
//!
//! The engine is the single authoritative store for one session's state. Each
//! call to [`SessionEngine::tick`] is a deterministic function of the current
//! state and one [`TickSample`], producing the discrete events it caused.
//!
//! Tick order: audio → system stress → brightness → face → gaze ring → hands → snapshot

use serde::{Deserialize, Serialize};

use crate::aggregator::SessionAggregator;
use crate::audio::AudioEnvelopeAnalyzer;
use crate::config::EngineConfig;
use crate::detectors::{
    gaze_ratio, head_tilt_degrees, BlinkDetector, BrowFurrowDetector, GazeDetector,
    HandFidgetDetector, ImpactDetector, VoiceActivityDetector,
};
use crate::environment::{BrightnessSampler, SystemStressSampler};
use crate::error::ComputeError;
use crate::types::{
    EventCounters, GazeSample, GeoLocation, HysteresisFlags, SessionEvent, SessionSnapshot,
    SessionStats, SignalReadings, TickSample, Timestamp,
};

/// Read-only view of the engine for live display
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LiveMetrics {
    pub timestamp: Timestamp,
    pub counters: EventCounters,
    pub is_looking: bool,
    pub readings: SignalReadings,
    pub engagement_score: u32,
    /// True for a short window after each impact
    pub impact_flash: bool,
    /// Live gaze window, oldest first
    pub gaze_samples: Vec<GazeSample>,
}

/// Session state machine fed once per frame
#[derive(Debug, Clone, PartialEq)]
pub struct SessionEngine {
    config: EngineConfig,
    audio: AudioEnvelopeAnalyzer,
    gaze: GazeDetector,
    blink: BlinkDetector,
    brow: BrowFurrowDetector,
    hands: HandFidgetDetector,
    impact: ImpactDetector,
    voice: VoiceActivityDetector,
    brightness: BrightnessSampler,
    stress: SystemStressSampler,
    aggregator: SessionAggregator,
    head_tilt: f64,
    is_looking: bool,
    last_tick: Option<Timestamp>,
    dropped_ticks: u64,
}

impl SessionEngine {
    /// Create an engine with a validated configuration
    pub fn new(config: EngineConfig) -> Result<Self, ComputeError> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: EngineConfig) -> Self {
        Self {
            audio: AudioEnvelopeAnalyzer::new(&config.acoustic),
            gaze: GazeDetector::new(&config.gaze),
            blink: BlinkDetector::new(&config.gaze),
            brow: BrowFurrowDetector::new(&config.gaze),
            hands: HandFidgetDetector::new(),
            impact: ImpactDetector::new(&config.acoustic),
            voice: VoiceActivityDetector::new(&config.acoustic),
            brightness: BrightnessSampler::new(&config.environment),
            stress: SystemStressSampler::new(&config.environment),
            aggregator: SessionAggregator::new(&config.cadence),
            head_tilt: 0.0,
            is_looking: false,
            last_tick: None,
            dropped_ticks: 0,
            config,
        }
    }

    /// Zero every counter and flag and clear all histories
    pub fn reset(&mut self) {
        let config = std::mem::take(&mut self.config);
        *self = Self::build(config);
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Process one tick. Samples that are not strictly newer than the last
    /// processed tick are dropped.
    pub fn tick(&mut self, sample: TickSample) -> Vec<SessionEvent> {
        let now = sample.timestamp_ms;
        if let Some(last) = self.last_tick {
            if now <= last {
                self.dropped_ticks += 1;
                log::warn!("dropping stale tick at {now} ms (last processed {last} ms)");
                return Vec::new();
            }
        }
        self.last_tick = Some(now);

        let mut events = Vec::new();

        // Stage 1: Audio envelope, impacts and voice activity
        if let Some(samples) = sample.audio.as_deref() {
            let envelope = self.audio.process(samples);
            if self.impact.observe(&envelope, now) {
                log::debug!("impact at {now} ms (rms {:.4})", envelope.rms);
                events.push(SessionEvent::Impact {
                    at: now,
                    total: self.impact.count(),
                });
            }
            if self.voice.observe(envelope.rms, now) {
                events.push(SessionEvent::VoiceSecond {
                    at: now,
                    total: self.voice.seconds(),
                });
            }
        }

        // Stage 2: Frame-rate window for system stress
        if let Some(stress) = self.stress.record_frame(now, sample.heap) {
            log::trace!("system stress {stress:.1} at {now} ms");
        }

        // Stage 3: Ambient brightness (gated, reads the frame only when due)
        if self.brightness.is_due(now) {
            if let Some(frame) = sample.frame.as_ref() {
                if let Err(e) = self.brightness.sample(now, frame) {
                    log::warn!("brightness sample skipped: {e}");
                }
            }
        }

        // Stage 4: Face signals. No face leaves the face detectors untouched.
        let face = sample.detection.as_ref().and_then(|d| d.primary_face());
        let looking = match face {
            Some(face) => {
                if self.gaze.observe(gaze_ratio(face)) {
                    events.push(SessionEvent::LookStarted {
                        at: now,
                        total: self.gaze.count(),
                    });
                }
                if let Some(tilt) = head_tilt_degrees(face) {
                    self.head_tilt = tilt;
                }
                if face.has_blendshapes() {
                    if self.blink.observe(face) {
                        events.push(SessionEvent::BlinkCompleted {
                            at: now,
                            total: self.blink.count(),
                        });
                    }
                    if self.brow.observe(face) {
                        events.push(SessionEvent::BrowFurrowed {
                            at: now,
                            total: self.brow.count(),
                        });
                    }
                }
                self.gaze.is_looking()
            }
            None => false,
        };
        self.is_looking = looking;

        // Stage 5: Live gaze ring
        self.aggregator.append_gaze_sample(now, looking);

        // Stage 6: Hands
        let hands_in_view = sample
            .detection
            .as_ref()
            .is_some_and(|d| d.hands_in_view());
        if self.hands.observe(hands_in_view) {
            events.push(SessionEvent::HandEntered {
                at: now,
                total: self.hands.count(),
            });
        }

        // Stage 7: Periodic snapshot
        let counters = self.counters();
        let readings = self.readings();
        if let Some(snapshot) = self
            .aggregator
            .take_snapshot(now, looking, &counters, &readings)
        {
            events.push(SessionEvent::Snapshot { snapshot });
        }

        events
    }

    /// Current counter values, read from each detector
    pub fn counters(&self) -> EventCounters {
        EventCounters {
            look_count: self.gaze.count(),
            blink_count: self.blink.count(),
            fidget_count: self.hands.count(),
            thump_count: self.impact.count(),
            brow_furrow_count: self.brow.count(),
            voice_seconds: self.voice.seconds(),
        }
    }

    pub fn flags(&self) -> HysteresisFlags {
        HysteresisFlags {
            is_blinking: self.blink.is_blinking(),
            is_brow_furrowed: self.brow.is_furrowed(),
            is_hand_in_frame: self.hands.is_hand_in_frame(),
            last_looking_state: self.gaze.is_looking(),
        }
    }

    pub fn readings(&self) -> SignalReadings {
        SignalReadings {
            noise_level: self.audio.noise_level(),
            head_tilt: self.head_tilt,
            brightness: self.brightness.brightness(),
            system_stress: self.stress.stress(),
        }
    }

    /// Derived statistics at `now`; callable at any time without side effects
    pub fn calculate_stats(&self, now: Timestamp) -> SessionStats {
        self.aggregator
            .calculate_stats(now, &self.counters(), &self.readings())
    }

    pub fn live_metrics(&self, now: Timestamp) -> LiveMetrics {
        LiveMetrics {
            timestamp: now,
            counters: self.counters(),
            is_looking: self.is_looking,
            readings: self.readings(),
            engagement_score: self.aggregator.engagement_score(),
            impact_flash: self.impact.is_flashing(now),
            gaze_samples: self.aggregator.gaze_samples().copied().collect(),
        }
    }

    pub fn snapshots(&self) -> &[SessionSnapshot] {
        self.aggregator.snapshots()
    }

    pub fn set_location(&mut self, location: GeoLocation) {
        self.aggregator.set_location(location);
    }

    pub fn is_looking(&self) -> bool {
        self.is_looking
    }

    pub fn last_tick(&self) -> Option<Timestamp> {
        self.last_tick
    }

    /// Number of stale ticks discarded this session
    pub fn dropped_ticks(&self) -> u64 {
        self.dropped_ticks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        Blendshape, DetectionResult, FaceLandmarks, HandLandmarks, Landmark, RgbRaster,
        EYE_BLINK_LEFT, EYE_BLINK_RIGHT, LEFT_EYE_OUTER, NOSE_TIP, RIGHT_EYE_OUTER,
    };
    use pretty_assertions::assert_eq;

    fn engine() -> SessionEngine {
        SessionEngine::new(EngineConfig::default()).unwrap()
    }

    fn face(ratio: f64, blink: f64) -> FaceLandmarks {
        let mut landmarks = vec![Landmark::default(); 300];
        landmarks[LEFT_EYE_OUTER] = Landmark::new(0.2, 0.5);
        landmarks[RIGHT_EYE_OUTER] = Landmark::new(0.8, 0.5);
        landmarks[NOSE_TIP] = Landmark::new(0.2 + 0.6 * ratio, 0.6);
        FaceLandmarks {
            landmarks,
            blendshapes: Some(vec![
                Blendshape {
                    category_name: EYE_BLINK_LEFT.to_string(),
                    score: blink,
                },
                Blendshape {
                    category_name: EYE_BLINK_RIGHT.to_string(),
                    score: blink,
                },
            ]),
        }
    }

    fn looking_at(ratio: f64) -> DetectionResult {
        DetectionResult {
            faces: vec![face(ratio, 0.0)],
            hands: vec![],
        }
    }

    fn tone(rms: f32) -> Vec<f32> {
        vec![rms; 2048]
    }

    #[test]
    fn test_gaze_ratio_sequence_counts_two_looks() {
        let mut engine = engine();
        for (i, ratio) in [0.5, 0.5, 0.8, 0.5].iter().enumerate() {
            engine.tick(TickSample::at((i as u64 + 1) * 100).with_detection(looking_at(*ratio)));
        }
        assert_eq!(engine.counters().look_count, 2);
    }

    #[test]
    fn test_rms_sequence_counts_one_thump() {
        let mut engine = engine();
        let mut impacts = Vec::new();
        for (i, rms) in [0.01f32, 0.01, 0.09, 0.01].iter().enumerate() {
            let events = engine.tick(TickSample::at((i as u64 + 1) * 100).with_audio(tone(*rms)));
            impacts.push(
                events
                    .iter()
                    .any(|e| matches!(e, SessionEvent::Impact { .. })),
            );
        }
        assert_eq!(impacts, vec![false, false, true, false]);
        assert_eq!(engine.counters().thump_count, 1);
    }

    #[test]
    fn test_impact_flash_visible_in_live_metrics() {
        let mut engine = engine();
        engine.tick(TickSample::at(100).with_audio(tone(0.2)));
        assert!(engine.live_metrics(150).impact_flash);
        assert!(!engine.live_metrics(400).impact_flash);
    }

    #[test]
    fn test_oversized_frame_does_not_stop_ticking() {
        let mut engine = engine();
        let sample: TickSample = serde_json::from_str(
            r#"{"timestamp_ms": 16, "frame": {"width": 4294967295, "height": 4294967295, "pixels": []}}"#,
        )
        .unwrap();
        engine.tick(sample);
        assert_eq!(engine.last_tick(), Some(16));
        assert_eq!(engine.readings().brightness, 0.0);

        engine.tick(
            TickSample::at(1016)
                .with_detection(looking_at(0.5))
                .with_frame(RgbRaster::uniform(64, 48, [128, 128, 128])),
        );
        assert_eq!(engine.last_tick(), Some(1016));
        assert!((engine.readings().brightness - 128.0).abs() < 1e-6);
        assert_eq!(engine.counters().look_count, 1);
    }

    #[test]
    fn test_mid_gray_brightness() {
        let mut engine = engine();
        engine.tick(TickSample::at(16).with_frame(RgbRaster::uniform(640, 480, [128, 128, 128])));
        assert!((engine.readings().brightness - 128.0).abs() < 1e-6);
    }

    #[test]
    fn test_brightness_not_resampled_within_interval() {
        let mut engine = engine();
        engine.tick(TickSample::at(16).with_frame(RgbRaster::uniform(64, 48, [128, 128, 128])));
        engine.tick(TickSample::at(500).with_frame(RgbRaster::uniform(64, 48, [0, 0, 0])));
        assert!((engine.readings().brightness - 128.0).abs() < 1e-6);

        engine.tick(TickSample::at(1016).with_frame(RgbRaster::uniform(64, 48, [0, 0, 0])));
        assert!(engine.readings().brightness.abs() < 1e-6);
    }

    #[test]
    fn test_blink_counted_through_engine() {
        let mut engine = engine();
        let closed = DetectionResult {
            faces: vec![face(0.5, 0.9)],
            hands: vec![],
        };
        engine.tick(TickSample::at(16).with_detection(looking_at(0.5)));
        engine.tick(TickSample::at(32).with_detection(closed.clone()));
        engine.tick(TickSample::at(48).with_detection(closed));
        assert!(engine.flags().is_blinking);

        let events = engine.tick(TickSample::at(64).with_detection(looking_at(0.5)));
        assert!(events
            .iter()
            .any(|e| matches!(e, SessionEvent::BlinkCompleted { total: 1, .. })));
    }

    #[test]
    fn test_empty_blendshapes_hold_blink_state() {
        let mut engine = engine();
        let closed = DetectionResult {
            faces: vec![face(0.5, 0.9)],
            hands: vec![],
        };
        let mut no_shapes = face(0.5, 0.0);
        no_shapes.blendshapes = Some(vec![]);
        let no_shapes = DetectionResult {
            faces: vec![no_shapes],
            hands: vec![],
        };

        engine.tick(TickSample::at(16).with_detection(closed));
        let events = engine.tick(TickSample::at(32).with_detection(no_shapes));
        assert!(!events
            .iter()
            .any(|e| matches!(e, SessionEvent::BlinkCompleted { .. })));
        assert!(engine.flags().is_blinking);
        assert_eq!(engine.counters().blink_count, 0);

        engine.tick(TickSample::at(48).with_detection(looking_at(0.5)));
        assert_eq!(engine.counters().blink_count, 1);
    }

    #[test]
    fn test_face_absence_holds_face_detectors() {
        let mut engine = engine();
        engine.tick(TickSample::at(100).with_detection(looking_at(0.5)));
        // Face lost for a few ticks, then found still looking
        engine.tick(TickSample::at(200));
        engine.tick(TickSample::at(300).with_detection(DetectionResult::default()));
        assert!(!engine.is_looking());
        assert!(engine.flags().last_looking_state);

        engine.tick(TickSample::at(400).with_detection(looking_at(0.5)));
        assert_eq!(engine.counters().look_count, 1);
        assert!(engine.is_looking());
    }

    #[test]
    fn test_hand_absence_resets_flag() {
        let mut engine = engine();
        let hand = DetectionResult {
            faces: vec![],
            hands: vec![HandLandmarks {
                landmarks: vec![Landmark::default(); 21],
            }],
        };
        engine.tick(TickSample::at(100).with_detection(hand.clone()));
        engine.tick(TickSample::at(200));
        assert!(!engine.flags().is_hand_in_frame);
        engine.tick(TickSample::at(300).with_detection(hand));
        assert_eq!(engine.counters().fidget_count, 2);
    }

    #[test]
    fn test_stale_ticks_are_dropped() {
        let mut engine = engine();
        engine.tick(TickSample::at(100).with_detection(looking_at(0.5)));
        let events = engine.tick(TickSample::at(100).with_detection(looking_at(0.8)));
        assert!(events.is_empty());
        engine.tick(TickSample::at(50).with_detection(looking_at(0.8)));

        assert_eq!(engine.dropped_ticks(), 2);
        assert_eq!(engine.last_tick(), Some(100));
        assert!(engine.is_looking());
    }

    #[test]
    fn test_snapshots_strictly_increasing() {
        let mut engine = engine();
        let mut t = 0;
        for _ in 0..700 {
            t += 16;
            engine.tick(TickSample::at(t).with_detection(looking_at(0.5)));
        }

        let snapshots = engine.snapshots();
        // 11.2 s of ticks → 5 snapshots
        assert_eq!(snapshots.len(), 5);
        assert!(snapshots.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
        assert!(snapshots.iter().all(|s| s.focus_score == 100));
    }

    #[test]
    fn test_stats_idempotent() {
        let mut engine = engine();
        for i in 1..=20u64 {
            engine.tick(
                TickSample::at(i * 100)
                    .with_detection(looking_at(if i % 5 == 0 { 0.9 } else { 0.5 }))
                    .with_audio(tone(0.02)),
            );
        }
        assert_eq!(engine.calculate_stats(2000), engine.calculate_stats(2000));
    }

    #[test]
    fn test_engagement_score_bounds() {
        let mut engine = engine();
        assert_eq!(engine.calculate_stats(0).engagement_score, 0);

        for i in 1..=200u64 {
            engine.tick(TickSample::at(i * 100).with_detection(looking_at(0.5)));
            let score = engine.calculate_stats(i * 100).engagement_score;
            assert!(score <= 100);
        }
        assert_eq!(engine.live_metrics(20_000).gaze_samples.len(), 50);
    }

    #[test]
    fn test_reset_matches_fresh_engine() {
        let mut engine = engine();
        for i in 1..=100u64 {
            engine.tick(
                TickSample::at(i * 50)
                    .with_detection(looking_at(if i % 3 == 0 { 0.9 } else { 0.5 }))
                    .with_audio(tone(if i % 10 == 0 { 0.2 } else { 0.01 }))
                    .with_frame(RgbRaster::uniform(8, 8, [200, 200, 200])),
            );
        }
        engine.set_location(GeoLocation {
            latitude: 1.0,
            longitude: 2.0,
        });
        assert!(engine.counters().thump_count > 0);
        assert!(!engine.snapshots().is_empty());

        engine.reset();
        assert_eq!(engine, self::engine());
        assert_eq!(engine.counters(), EventCounters::default());
        assert_eq!(engine.flags(), HysteresisFlags::default());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = EngineConfig::default();
        config.cadence.snapshot_interval_ms = 0;
        assert!(SessionEngine::new(config).is_err());
    }
}
