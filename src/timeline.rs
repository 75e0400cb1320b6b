//! Retrospective timeline
//!
//! Turns the snapshot history into chart points, marking the intervals in
//! which a blink, fidget or impact happened.

use serde::{Deserialize, Serialize};

use crate::types::{SessionSnapshot, Timestamp};

/// One chart point per snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelinePoint {
    pub timestamp: Timestamp,
    /// Whole seconds since session start, e.g. `"12s"`
    pub elapsed_label: String,
    pub focus_score: u32,
    pub is_looking: bool,
    pub noise_level: f64,
    pub head_tilt: f64,
    pub blinked: bool,
    pub fidgeted: bool,
    pub impacted: bool,
    pub has_event: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Timeline {
    pub points: Vec<TimelinePoint>,
}

impl Timeline {
    pub fn from_snapshots(snapshots: &[SessionSnapshot]) -> Self {
        let points = snapshots
            .iter()
            .enumerate()
            .map(|(i, snap)| {
                let prev = i.checked_sub(1).map(|p| &snapshots[p]);
                let blinked = prev.is_some_and(|p| snap.blink_count > p.blink_count);
                let fidgeted = prev.is_some_and(|p| snap.fidget_count > p.fidget_count);
                let impacted = prev.is_some_and(|p| snap.thump_count > p.thump_count);

                TimelinePoint {
                    timestamp: snap.timestamp,
                    elapsed_label: format!("{}s", snap.timestamp / 1000),
                    focus_score: snap.focus_score,
                    is_looking: snap.is_looking,
                    noise_level: snap.noise_level,
                    head_tilt: snap.head_tilt,
                    blinked,
                    fidgeted,
                    impacted,
                    has_event: blinked || fidgeted || impacted,
                }
            })
            .collect();

        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Points where something happened ("focus triggers")
    pub fn events(&self) -> impl Iterator<Item = &TimelinePoint> {
        self.points.iter().filter(|p| p.has_event)
    }
}
