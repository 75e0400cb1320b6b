//! Injected sensing capabilities
//!
//! The engine never talks to a camera, microphone or vision model directly.
//! Each is modelled as a trait so the tick pipeline can be driven by real
//! devices on a host or by deterministic synthetic sources in tests.

use crate::error::ComputeError;
use crate::types::{DetectionResult, HeapUsage, RgbRaster, TickSample, Timestamp};

/// Black-box landmark model (face mesh + blendshapes, hand landmarks)
pub trait LandmarkDetector: Send {
    fn detect(
        &mut self,
        frame: &RgbRaster,
        timestamp: Timestamp,
    ) -> Result<DetectionResult, ComputeError>;
}

/// Live video feed
pub trait FrameSource: Send {
    /// The current frame, or `None` if the stream has not produced one yet
    fn current_frame(&mut self) -> Result<Option<RgbRaster>, ComputeError>;
}

/// Pull-based time-domain audio buffer
pub trait AudioSource: Send {
    /// Fill `buffer` with the most recent samples in [-1, 1]
    fn pull(&mut self, buffer: &mut [f32]) -> Result<(), ComputeError>;
}

/// Optional host telemetry
pub trait HostTelemetry: Send {
    fn heap_usage(&self) -> Option<HeapUsage>;
}

/// Grants access to media devices at session start
pub trait MediaProvider {
    fn open_camera(&mut self) -> Result<Box<dyn FrameSource>, ComputeError>;

    fn open_microphone(&mut self) -> Result<Box<dyn AudioSource>, ComputeError>;

    /// Heap telemetry, when the host exposes it
    fn telemetry(&mut self) -> Option<Box<dyn HostTelemetry>> {
        None
    }
}

/// Media handles held for the lifetime of one session
pub struct Sensors {
    camera: Box<dyn FrameSource>,
    microphone: Box<dyn AudioSource>,
    telemetry: Option<Box<dyn HostTelemetry>>,
    audio_buffer: Vec<f32>,
}

impl std::fmt::Debug for Sensors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sensors")
            .field("audio_buffer_len", &self.audio_buffer.len())
            .field("has_telemetry", &self.telemetry.is_some())
            .finish()
    }
}

impl Sensors {
    /// Acquire camera then microphone. Either failure aborts acquisition and
    /// anything already opened is dropped.
    pub fn acquire(
        provider: &mut dyn MediaProvider,
        buffer_len: usize,
    ) -> Result<Self, ComputeError> {
        let camera = provider
            .open_camera()
            .map_err(|e| media_error("camera", e))?;
        let microphone = provider
            .open_microphone()
            .map_err(|e| media_error("microphone", e))?;

        Ok(Self {
            camera,
            microphone,
            telemetry: provider.telemetry(),
            audio_buffer: vec![0.0; buffer_len],
        })
    }

    /// Gather everything the engine consumes for one tick.
    ///
    /// Sub-step failures are logged and surface as absent signals so one bad
    /// frame or audio pull never stops the detection loop.
    pub fn sample(&mut self, detector: &mut dyn LandmarkDetector, now: Timestamp) -> TickSample {
        let frame = self.camera.current_frame().unwrap_or_else(|e| {
            log::warn!("frame read failed at {now} ms: {e}");
            None
        });

        let detection = frame
            .as_ref()
            .and_then(|frame| match detector.detect(frame, now) {
                Ok(detection) => Some(detection),
                Err(e) => {
                    log::warn!("landmark detection failed at {now} ms: {e}");
                    None
                }
            });

        let audio = match self.microphone.pull(&mut self.audio_buffer) {
            Ok(()) => Some(self.audio_buffer.clone()),
            Err(e) => {
                log::warn!("audio pull failed at {now} ms: {e}");
                None
            }
        };

        let heap = self.telemetry.as_ref().and_then(|t| t.heap_usage());

        TickSample {
            timestamp_ms: now,
            detection,
            audio,
            frame,
            heap,
        }
    }
}

fn media_error(device: &str, err: ComputeError) -> ComputeError {
    match err {
        ComputeError::MediaAccess(msg) => ComputeError::MediaAccess(format!("{device}: {msg}")),
        other => ComputeError::MediaAccess(format!("{device}: {other}")),
    }
}

#[cfg(test)]
pub(crate) mod fakes {
    //! Deterministic sources for driving sessions in tests

    use super::*;
    use crate::types::{FaceLandmarks, Landmark, LEFT_EYE_OUTER, NOSE_TIP, RIGHT_EYE_OUTER};

    /// Camera showing a constant uniform frame
    pub struct FlatCamera {
        pub rgb: [u8; 3],
        pub fail: bool,
    }

    impl FrameSource for FlatCamera {
        fn current_frame(&mut self) -> Result<Option<RgbRaster>, ComputeError> {
            if self.fail {
                return Err(ComputeError::MediaAccess("camera unplugged".to_string()));
            }
            Ok(Some(RgbRaster::uniform(64, 48, self.rgb)))
        }
    }

    /// Microphone producing a constant-amplitude signal
    pub struct ToneMicrophone {
        pub amplitude: f32,
    }

    impl AudioSource for ToneMicrophone {
        fn pull(&mut self, buffer: &mut [f32]) -> Result<(), ComputeError> {
            buffer.fill(self.amplitude);
            Ok(())
        }
    }

    pub struct FixedHeap(pub HeapUsage);

    impl HostTelemetry for FixedHeap {
        fn heap_usage(&self) -> Option<HeapUsage> {
            Some(self.0)
        }
    }

    /// Face with the nose placed at `ratio` between the outer eye corners
    pub fn face_at_ratio(ratio: f64) -> FaceLandmarks {
        let mut landmarks = vec![Landmark::default(); 300];
        landmarks[LEFT_EYE_OUTER] = Landmark::new(0.2, 0.5);
        landmarks[RIGHT_EYE_OUTER] = Landmark::new(0.8, 0.5);
        landmarks[NOSE_TIP] = Landmark::new(0.2 + 0.6 * ratio, 0.6);
        FaceLandmarks {
            landmarks,
            blendshapes: None,
        }
    }

    /// Detector that always reports one centred face
    pub struct AttentiveDetector;

    impl LandmarkDetector for AttentiveDetector {
        fn detect(
            &mut self,
            _frame: &RgbRaster,
            _timestamp: Timestamp,
        ) -> Result<DetectionResult, ComputeError> {
            Ok(DetectionResult {
                faces: vec![face_at_ratio(0.5)],
                hands: vec![],
            })
        }
    }

    pub struct FailingDetector;

    impl LandmarkDetector for FailingDetector {
        fn detect(
            &mut self,
            _frame: &RgbRaster,
            _timestamp: Timestamp,
        ) -> Result<DetectionResult, ComputeError> {
            Err(ComputeError::Detector("inference timed out".to_string()))
        }
    }

    /// Provider whose devices can be denied individually
    pub struct FakeProvider {
        pub deny_camera: bool,
        pub deny_microphone: bool,
        pub amplitude: f32,
        pub heap: Option<HeapUsage>,
        pub camera_opened: bool,
    }

    impl Default for FakeProvider {
        fn default() -> Self {
            Self {
                deny_camera: false,
                deny_microphone: false,
                amplitude: 0.01,
                heap: None,
                camera_opened: false,
            }
        }
    }

    impl MediaProvider for FakeProvider {
        fn open_camera(&mut self) -> Result<Box<dyn FrameSource>, ComputeError> {
            if self.deny_camera {
                return Err(ComputeError::MediaAccess("permission denied".to_string()));
            }
            self.camera_opened = true;
            Ok(Box::new(FlatCamera {
                rgb: [128, 128, 128],
                fail: false,
            }))
        }

        fn open_microphone(&mut self) -> Result<Box<dyn AudioSource>, ComputeError> {
            if self.deny_microphone {
                return Err(ComputeError::MediaAccess("permission denied".to_string()));
            }
            Ok(Box::new(ToneMicrophone {
                amplitude: self.amplitude,
            }))
        }

        fn telemetry(&mut self) -> Option<Box<dyn HostTelemetry>> {
            self.heap
                .map(|heap| Box::new(FixedHeap(heap)) as Box<dyn HostTelemetry>)
        }
    }
}
