//! Perception adapter
//!
//! Wraps webcam capture and hand landmark inference behind a single
//! non-blocking [`PerceptionAdapter::poll`]. Each camera frame is reported at
//! most once; when nothing new is available the call returns immediately.

use crate::camera::{CameraCapture, CaptureState};
use crate::ml::{HandLandmark, HandResult, HandTracker, PerceptionError, TrackerOptions, TrackerState, LANDMARK_COUNT};
use crate::settings::PerceptionSettings;

/// One hand seen in one video frame
#[derive(Clone, Debug, PartialEq)]
pub struct HandObservation {
    /// 21 normalized landmarks
    pub landmarks: [HandLandmark; LANDMARK_COUNT],
    /// Video frame the landmarks were measured on
    pub frame_number: u64,
}

/// Readiness of a hand source
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceState {
    /// Still initializing (camera opening, model loading)
    Starting,
    /// Producing results
    Ready,
    /// Gave up; will never produce results
    Failed,
}

/// Anything that can deliver hand detection results
pub trait HandSource {
    /// Current readiness
    fn state(&self) -> SourceState;

    /// Move new input along (e.g. hand the latest camera frame to the
    /// detector). Must not block.
    fn pump(&mut self) {}

    /// Latest available result, whether or not it was seen before
    fn latest(&self) -> Option<HandResult>;
}

/// Webcam + ONNX landmark model
pub struct WebcamHands {
    camera: CameraCapture,
    tracker: HandTracker,
    last_submitted: u64,
}

impl WebcamHands {
    /// Open the camera and start loading the hand models
    pub fn start(settings: &PerceptionSettings) -> Result<Self, PerceptionError> {
        let camera = CameraCapture::new(
            settings.camera_index,
            settings.capture_width,
            settings.capture_height,
        )?;
        let tracker = HandTracker::new(TrackerOptions {
            model_dir: settings.model_dir.clone(),
            input_size: settings.inference_size,
            min_detection: settings.min_detection,
            min_presence: settings.min_presence,
        })?;

        Ok(Self {
            camera,
            tracker,
            last_submitted: 0,
        })
    }
}

impl HandSource for WebcamHands {
    fn state(&self) -> SourceState {
        match (self.camera.state(), self.tracker.state()) {
            (CaptureState::Failed | CaptureState::Stopped, _) | (_, TrackerState::Failed) => {
                SourceState::Failed
            }
            (CaptureState::Streaming, TrackerState::Ready) => SourceState::Ready,
            _ => SourceState::Starting,
        }
    }

    fn pump(&mut self) {
        if self.tracker.state() != TrackerState::Ready {
            return;
        }
        let Some(frame) = self.camera.latest_frame() else { return };
        if frame.frame_number <= self.last_submitted {
            return;
        }
        self.last_submitted = frame.frame_number;
        self.tracker.process_frame(&frame);
    }

    fn latest(&self) -> Option<HandResult> {
        self.tracker.latest_result()
    }
}

/// What the adapter is currently doing, for display
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PerceptionStatus {
    /// No gesture control this session
    Disabled,
    /// Waiting for camera / model
    Starting,
    /// Results are flowing
    Tracking,
}

impl PerceptionStatus {
    /// Get display name for UI
    pub fn display_name(&self) -> &'static str {
        match self {
            PerceptionStatus::Disabled => "Gestures off",
            PerceptionStatus::Starting => "Starting camera...",
            PerceptionStatus::Tracking => "Tracking hands",
        }
    }
}

/// Non-blocking access to the latest hand observation
pub struct PerceptionAdapter {
    source: Option<Box<dyn HandSource>>,
    /// Frame number of the last consumed result
    last_frame: Option<u64>,
}

impl PerceptionAdapter {
    /// Start webcam perception. Failures are logged and leave the adapter
    /// disabled for the session.
    pub fn start(settings: &PerceptionSettings) -> Self {
        if !settings.enabled {
            log::info!("Perception disabled in settings");
            return Self::disabled();
        }

        match WebcamHands::start(settings) {
            Ok(source) => Self::with_source(Box::new(source)),
            Err(e) => {
                log::warn!("Camera access failed: {}. Running without gesture control.", e);
                Self::disabled()
            }
        }
    }

    /// Adapter that never observes anything
    pub fn disabled() -> Self {
        Self {
            source: None,
            last_frame: None,
        }
    }

    /// Adapter reading from a custom source
    pub fn with_source(source: Box<dyn HandSource>) -> Self {
        Self {
            source: Some(source),
            last_frame: None,
        }
    }

    /// Current status
    pub fn status(&self) -> PerceptionStatus {
        match self.source.as_ref().map(|s| s.state()) {
            None | Some(SourceState::Failed) => PerceptionStatus::Disabled,
            Some(SourceState::Starting) => PerceptionStatus::Starting,
            Some(SourceState::Ready) => PerceptionStatus::Tracking,
        }
    }

    /// Latest hand observation from a frame not reported before, if any
    pub fn poll(&mut self) -> Option<HandObservation> {
        let source = self.source.as_mut()?;

        match source.state() {
            SourceState::Starting => return None,
            SourceState::Failed => {
                log::warn!("Hand tracking stopped. Gesture control disabled for this session.");
                self.source = None;
                return None;
            }
            SourceState::Ready => {}
        }

        source.pump();
        let result = source.latest()?;

        if self.last_frame == Some(result.frame_number) {
            return None;
        }
        self.last_frame = Some(result.frame_number);

        result
            .hands
            .iter()
            .max_by(|a, b| a.presence.total_cmp(&b.presence))
            .map(|hand| HandObservation {
                landmarks: hand.landmarks,
                frame_number: result.frame_number,
            })
    }
}
