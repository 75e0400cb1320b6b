//! Two-state edge counter shared by the boolean detectors

use serde::{Deserialize, Serialize};

/// Whether a detector currently considers itself inside its active state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectorState {
    #[default]
    Idle,
    Active,
}

/// Which transition increments the counter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CountedEdge {
    /// Idle → Active (onset)
    Rising,
    /// Active → Idle (completed event)
    Falling,
}

/// Edge-triggered counter over an {Idle, Active} state machine
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeCounter {
    state: DetectorState,
    counted: CountedEdge,
    count: u32,
}

impl EdgeCounter {
    pub fn new(counted: CountedEdge) -> Self {
        Self {
            state: DetectorState::Idle,
            counted,
            count: 0,
        }
    }

    pub fn rising() -> Self {
        Self::new(CountedEdge::Rising)
    }

    pub fn falling() -> Self {
        Self::new(CountedEdge::Falling)
    }

    /// Feed the current signal value. Returns true when this call counted an edge.
    pub fn transition(&mut self, signal: bool) -> bool {
        let edge = match (self.state, signal) {
            (DetectorState::Idle, true) => Some(CountedEdge::Rising),
            (DetectorState::Active, false) => Some(CountedEdge::Falling),
            _ => None,
        };

        let Some(edge) = edge else {
            return false;
        };

        self.state = match edge {
            CountedEdge::Rising => DetectorState::Active,
            CountedEdge::Falling => DetectorState::Idle,
        };

        if edge == self.counted {
            self.count = self.count.saturating_add(1);
            true
        } else {
            false
        }
    }

    pub fn state(&self) -> DetectorState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == DetectorState::Active
    }

    pub fn count(&self) -> u32 {
        self.count
    }
}
