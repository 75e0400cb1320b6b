//! Face-derived detectors: gaze, blink, brow furrow, and head tilt

use crate::config::GazeConfig;
use crate::detectors::edge::EdgeCounter;
use crate::types::{
    FaceLandmarks, BROW_DOWN_LEFT, BROW_DOWN_RIGHT, EYE_BLINK_LEFT, EYE_BLINK_RIGHT,
    LEFT_EYE_OUTER, NOSE_TIP, RIGHT_EYE_OUTER,
};

/// Horizontal position of the nose tip between the outer eye corners
///
/// Formula: `|nose.x - left_eye.x| / |right_eye.x - left_eye.x|`
///
/// Returns `None` when the landmarks are missing or the eye span is degenerate.
pub fn gaze_ratio(face: &FaceLandmarks) -> Option<f64> {
    let nose = face.landmark(NOSE_TIP)?;
    let left = face.landmark(LEFT_EYE_OUTER)?;
    let right = face.landmark(RIGHT_EYE_OUTER)?;

    let span = (right.x - left.x).abs();
    if !span.is_finite() || span <= f64::EPSILON {
        return None;
    }
    let ratio = (nose.x - left.x).abs() / span;
    ratio.is_finite().then_some(ratio)
}

/// Absolute roll of the eye line in degrees (direction is discarded)
pub fn head_tilt_degrees(face: &FaceLandmarks) -> Option<f64> {
    let left = face.landmark(LEFT_EYE_OUTER)?;
    let right = face.landmark(RIGHT_EYE_OUTER)?;

    let angle = (right.y - left.y).atan2(right.x - left.x).to_degrees().abs();
    angle.is_finite().then_some(angle)
}

/// Counts look-starts: rising edges of "nose centred between the eyes"
#[derive(Debug, Clone, PartialEq)]
pub struct GazeDetector {
    edge: EdgeCounter,
    ratio_min: f64,
    ratio_max: f64,
}

impl GazeDetector {
    pub fn new(config: &GazeConfig) -> Self {
        Self {
            edge: EdgeCounter::rising(),
            ratio_min: config.ratio_min,
            ratio_max: config.ratio_max,
        }
    }

    /// Whether a gaze ratio falls inside the open "looking" band
    pub fn is_looking_ratio(&self, ratio: f64) -> bool {
        ratio > self.ratio_min && ratio < self.ratio_max
    }

    /// Feed the ratio for a tick where a face was found. Returns true on a look-start.
    pub fn observe(&mut self, ratio: Option<f64>) -> bool {
        let looking = ratio.is_some_and(|r| self.is_looking_ratio(r));
        self.edge.transition(looking)
    }

    /// Last observed looking state
    pub fn is_looking(&self) -> bool {
        self.edge.is_active()
    }

    pub fn count(&self) -> u32 {
        self.edge.count()
    }
}

/// Counts completed blinks (closed → open)
#[derive(Debug, Clone, PartialEq)]
pub struct BlinkDetector {
    edge: EdgeCounter,
    threshold: f64,
}

impl BlinkDetector {
    pub fn new(config: &GazeConfig) -> Self {
        Self {
            edge: EdgeCounter::falling(),
            threshold: config.blink_threshold,
        }
    }

    /// Feed the blink blendshapes. Returns true when a blink completes.
    pub fn observe(&mut self, face: &FaceLandmarks) -> bool {
        self.observe_scores(
            face.blendshape_score(EYE_BLINK_LEFT),
            face.blendshape_score(EYE_BLINK_RIGHT),
        )
    }

    pub fn observe_scores(&mut self, left: f64, right: f64) -> bool {
        let closed = left > self.threshold && right > self.threshold;
        self.edge.transition(closed)
    }

    pub fn is_blinking(&self) -> bool {
        self.edge.is_active()
    }

    pub fn count(&self) -> u32 {
        self.edge.count()
    }
}

/// Counts brow furrow onsets (a stress proxy)
#[derive(Debug, Clone, PartialEq)]
pub struct BrowFurrowDetector {
    edge: EdgeCounter,
    threshold: f64,
}

impl BrowFurrowDetector {
    pub fn new(config: &GazeConfig) -> Self {
        Self {
            edge: EdgeCounter::rising(),
            threshold: config.brow_threshold,
        }
    }

    pub fn observe(&mut self, face: &FaceLandmarks) -> bool {
        self.observe_scores(
            face.blendshape_score(BROW_DOWN_LEFT),
            face.blendshape_score(BROW_DOWN_RIGHT),
        )
    }

    pub fn observe_scores(&mut self, left: f64, right: f64) -> bool {
        let furrowed = left > self.threshold && right > self.threshold;
        self.edge.transition(furrowed)
    }

    pub fn is_furrowed(&self) -> bool {
        self.edge.is_active()
    }

    pub fn count(&self) -> u32 {
        self.edge.count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Blendshape, Landmark};

    /// Face with eye corners at x=0.2 and x=0.8 and the nose placed at `ratio`
    fn face_with_ratio(ratio: f64) -> FaceLandmarks {
        let mut landmarks = vec![Landmark::default(); 300];
        landmarks[LEFT_EYE_OUTER] = Landmark::new(0.2, 0.5);
        landmarks[RIGHT_EYE_OUTER] = Landmark::new(0.8, 0.5);
        landmarks[NOSE_TIP] = Landmark::new(0.2 + 0.6 * ratio, 0.6);
        FaceLandmarks {
            landmarks,
            blendshapes: None,
        }
    }

    fn face_with_shapes(shapes: &[(&str, f64)]) -> FaceLandmarks {
        FaceLandmarks {
            landmarks: vec![Landmark::default(); 300],
            blendshapes: Some(
                shapes
                    .iter()
                    .map(|(name, score)| Blendshape {
                        category_name: name.to_string(),
                        score: *score,
                    })
                    .collect(),
            ),
        }
    }

    #[test]
    fn test_gaze_ratio() {
        let ratio = gaze_ratio(&face_with_ratio(0.5)).unwrap();
        assert!((ratio - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_gaze_ratio_degenerate_span() {
        let mut face = face_with_ratio(0.5);
        face.landmarks[RIGHT_EYE_OUTER] = face.landmarks[LEFT_EYE_OUTER];
        assert!(gaze_ratio(&face).is_none());
    }

    #[test]
    fn test_gaze_ratio_missing_landmarks() {
        let face = FaceLandmarks {
            landmarks: vec![Landmark::default(); 40],
            blendshapes: None,
        };
        assert!(gaze_ratio(&face).is_none());
    }

    #[test]
    fn test_look_count_sequence() {
        // in-range, in-range, out-of-range, in-range → 2 look-starts
        let mut detector = GazeDetector::new(&GazeConfig::default());
        let fired: Vec<bool> = [0.5, 0.5, 0.8, 0.5]
            .iter()
            .map(|&r| detector.observe(Some(r)))
            .collect();

        assert_eq!(fired, vec![true, false, false, true]);
        assert_eq!(detector.count(), 2);
        assert!(detector.is_looking());
    }

    #[test]
    fn test_gaze_band_is_open() {
        let detector = GazeDetector::new(&GazeConfig::default());
        assert!(!detector.is_looking_ratio(0.35));
        assert!(!detector.is_looking_ratio(0.65));
        assert!(detector.is_looking_ratio(0.36));
        assert!(!detector.is_looking_ratio(f64::NAN));
    }

    #[test]
    fn test_unknown_ratio_is_not_looking() {
        let mut detector = GazeDetector::new(&GazeConfig::default());
        detector.observe(Some(0.5));
        detector.observe(None);
        assert!(!detector.is_looking());
        assert!(detector.observe(Some(0.5)));
        assert_eq!(detector.count(), 2);
    }

    #[test]
    fn test_head_tilt_level_and_rolled() {
        let level = face_with_ratio(0.5);
        assert!(head_tilt_degrees(&level).unwrap().abs() < 1e-9);

        let mut rolled = face_with_ratio(0.5);
        rolled.landmarks[RIGHT_EYE_OUTER] = Landmark::new(0.8, 1.1);
        assert!((head_tilt_degrees(&rolled).unwrap() - 45.0).abs() < 1e-9);

        // Direction is discarded
        let mut other_way = face_with_ratio(0.5);
        other_way.landmarks[RIGHT_EYE_OUTER] = Landmark::new(0.8, -0.1);
        assert!((head_tilt_degrees(&other_way).unwrap() - 45.0).abs() < 1e-9);
    }

    #[test]
    fn test_blink_counted_on_reopen() {
        let mut detector = BlinkDetector::new(&GazeConfig::default());

        assert!(!detector.observe_scores(0.1, 0.1));
        assert!(!detector.observe_scores(0.9, 0.8));
        assert!(detector.is_blinking());
        assert!(!detector.observe_scores(0.9, 0.8));
        assert!(detector.observe_scores(0.1, 0.2));
        assert!(!detector.observe_scores(0.1, 0.2));

        assert_eq!(detector.count(), 1);
    }

    #[test]
    fn test_one_eye_closed_is_not_a_blink() {
        let mut detector = BlinkDetector::new(&GazeConfig::default());
        detector.observe_scores(0.9, 0.1);
        detector.observe_scores(0.1, 0.1);
        assert_eq!(detector.count(), 0);
    }

    #[test]
    fn test_blink_from_blendshapes() {
        let mut detector = BlinkDetector::new(&GazeConfig::default());
        detector.observe(&face_with_shapes(&[(EYE_BLINK_LEFT, 0.7), (EYE_BLINK_RIGHT, 0.6)]));
        assert!(detector.observe(&face_with_shapes(&[])));
    }

    #[test]
    fn test_brow_furrow_counted_on_onset() {
        let mut detector = BrowFurrowDetector::new(&GazeConfig::default());
        let furrowed = face_with_shapes(&[(BROW_DOWN_LEFT, 0.5), (BROW_DOWN_RIGHT, 0.45)]);
        let relaxed = face_with_shapes(&[(BROW_DOWN_LEFT, 0.1), (BROW_DOWN_RIGHT, 0.1)]);

        assert!(detector.observe(&furrowed));
        assert!(!detector.observe(&furrowed));
        assert!(!detector.observe(&relaxed));
        assert!(detector.observe(&furrowed));

        assert_eq!(detector.count(), 2);
    }
}
