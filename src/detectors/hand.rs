//! Hand fidget detector

use crate::detectors::edge::EdgeCounter;

/// Counts hands entering the frame after an absence
#[derive(Debug, Clone, PartialEq)]
pub struct HandFidgetDetector {
    edge: EdgeCounter,
}

impl Default for HandFidgetDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl HandFidgetDetector {
    pub fn new() -> Self {
        Self {
            edge: EdgeCounter::rising(),
        }
    }

    /// Returns true when a hand enters the frame
    pub fn observe(&mut self, hands_in_view: bool) -> bool {
        self.edge.transition(hands_in_view)
    }

    pub fn is_hand_in_frame(&self) -> bool {
        self.edge.is_active()
    }

    pub fn count(&self) -> u32 {
        self.edge.count()
    }
}
