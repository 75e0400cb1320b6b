//! Session aggregation
//!
//! Holds the bounded live gaze ring and the append-only snapshot history, and
//! derives session statistics from detector counters on demand. The aggregator
//! never writes counters; each detector is the sole writer of its own count.

use std::collections::VecDeque;

use crate::config::CadenceConfig;
use crate::types::{
    EventCounters, GazeSample, GeoLocation, SessionSnapshot, SessionStats, SignalReadings,
    Timestamp,
};

/// Rolling gaze window plus snapshot log for one session
#[derive(Debug, Clone, PartialEq)]
pub struct SessionAggregator {
    gaze_ring: VecDeque<GazeSample>,
    ring_capacity: usize,
    gaze_interval_ms: u64,
    last_gaze_sample: Timestamp,
    snapshot_interval_ms: u64,
    last_snapshot: Timestamp,
    history: Vec<SessionSnapshot>,
    location: Option<GeoLocation>,
}

impl SessionAggregator {
    pub fn new(config: &CadenceConfig) -> Self {
        Self {
            gaze_ring: VecDeque::with_capacity(config.gaze_ring_capacity),
            ring_capacity: config.gaze_ring_capacity,
            gaze_interval_ms: config.gaze_sample_interval_ms,
            last_gaze_sample: 0,
            snapshot_interval_ms: config.snapshot_interval_ms,
            last_snapshot: 0,
            history: Vec::new(),
            location: None,
        }
    }

    /// Push a gaze sample if the sampling interval has elapsed.
    /// Samples are taken regardless of whether the state changed.
    pub fn append_gaze_sample(&mut self, now: Timestamp, is_looking: bool) -> bool {
        if now.saturating_sub(self.last_gaze_sample) < self.gaze_interval_ms {
            return false;
        }
        self.push_gaze_sample(GazeSample {
            time: now,
            is_looking,
        });
        self.last_gaze_sample = now;
        true
    }

    /// Push into the ring, evicting the oldest entries beyond capacity
    pub fn push_gaze_sample(&mut self, sample: GazeSample) {
        self.gaze_ring.push_back(sample);
        while self.gaze_ring.len() > self.ring_capacity {
            self.gaze_ring.pop_front();
        }
    }

    /// Percentage of ring samples looking at screen; 0 when empty
    pub fn engagement_score(&self) -> u32 {
        if self.gaze_ring.is_empty() {
            return 0;
        }
        let looking = self.gaze_ring.iter().filter(|s| s.is_looking).count();
        let score = (100.0 * looking as f64 / self.gaze_ring.len() as f64).round();
        score.clamp(0.0, 100.0) as u32
    }

    /// Whether a snapshot is due. After a stall this is simply true once; the
    /// missed intervals are not replayed.
    pub fn is_snapshot_due(&self, now: Timestamp) -> bool {
        now.saturating_sub(self.last_snapshot) >= self.snapshot_interval_ms
            && self.history.last().is_none_or(|s| now > s.timestamp)
    }

    /// Append a snapshot of the current state if one is due
    pub fn take_snapshot(
        &mut self,
        now: Timestamp,
        is_looking: bool,
        counters: &EventCounters,
        readings: &SignalReadings,
    ) -> Option<SessionSnapshot> {
        if !self.is_snapshot_due(now) {
            return None;
        }

        let snapshot = SessionSnapshot {
            timestamp: now,
            is_looking,
            blink_count: counters.blink_count,
            fidget_count: counters.fidget_count,
            noise_level: readings.noise_level,
            brow_furrow_count: counters.brow_furrow_count,
            brightness: readings.brightness,
            system_stress: readings.system_stress,
            thump_count: counters.thump_count,
            head_tilt: readings.head_tilt,
            focus_score: self.engagement_score(),
        };
        self.history.push(snapshot.clone());
        self.last_snapshot = now;
        Some(snapshot)
    }

    /// Derive session statistics; has no side effects
    pub fn calculate_stats(
        &self,
        now: Timestamp,
        counters: &EventCounters,
        readings: &SignalReadings,
    ) -> SessionStats {
        let total_time_seconds = (now as f64 / 1000.0).round() as u64;
        let average_focus_duration = if total_time_seconds > 0 {
            (total_time_seconds as f64 / counters.look_count.max(1) as f64).round() as u64
        } else {
            0
        };

        SessionStats {
            total_looks: counters.look_count,
            total_time_seconds,
            average_focus_duration,
            engagement_score: self.engagement_score(),
            total_blinks: counters.blink_count,
            hand_fidget_count: counters.fidget_count,
            avg_noise_level: finite_or_zero(readings.noise_level),
            voice_time_seconds: counters.voice_seconds,
            thump_count: counters.thump_count,
            head_tilt_degrees: finite_or_zero(readings.head_tilt),
            brow_furrow_count: counters.brow_furrow_count,
            avg_brightness: finite_or_zero(readings.brightness),
            system_stress_score: finite_or_zero(readings.system_stress),
            location: self.location,
        }
    }

    pub fn set_location(&mut self, location: GeoLocation) {
        self.location = Some(location);
    }

    pub fn location(&self) -> Option<GeoLocation> {
        self.location
    }

    /// Live gaze window, oldest first
    pub fn gaze_samples(&self) -> impl ExactSizeIterator<Item = &GazeSample> {
        self.gaze_ring.iter()
    }

    pub fn gaze_sample_count(&self) -> usize {
        self.gaze_ring.len()
    }

    /// Snapshot history in capture order
    pub fn snapshots(&self) -> &[SessionSnapshot] {
        &self.history
    }
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}
