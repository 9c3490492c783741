//! ML inference module
//!
//! Hand tracking using ONNX Runtime and the MediaPipe hand models converted
//! to ONNX (PINTO Model Zoo): a palm detector locates the hand, then the
//! landmark model runs on a rotated crop around it. Configured for a single
//! hand. Inference runs on its own thread; the render thread only submits
//! frames and reads the latest published result.

pub mod palm;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};
use ndarray::Array4;
use parking_lot::Mutex;

use crate::camera::CameraFrame;
use palm::{Anchor, HandRoi, Letterbox, PALM_ANCHOR_COUNT, PALM_INPUT_SIZE, PALM_REGRESSOR_STRIDE};

/// Palm detector file looked up in the model directory
pub const PALM_DETECTION_MODEL: &str = "palm_detection.onnx";
/// Landmark model file looked up in the model directory
pub const HAND_LANDMARK_MODEL: &str = "hand_landmark.onnx";

/// Number of landmarks per hand
pub const LANDMARK_COUNT: usize = 21;

/// Errors raised while bringing up perception
#[derive(Debug, thiserror::Error)]
pub enum PerceptionError {
    #[error("failed to spawn thread: {0}")]
    Thread(String),
    #[error("models directory not found; create a 'models' directory containing {PALM_DETECTION_MODEL} and {HAND_LANDMARK_MODEL}")]
    ModelDirNotFound,
    #[error("model not found: {0}")]
    ModelMissing(PathBuf),
    #[error("ONNX Runtime error: {0}")]
    Runtime(String),
    #[error("unexpected model output: {0}")]
    Output(String),
}

/// Hand landmark (normalized coordinates, origin top-left)
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct HandLandmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// Detected hand
#[derive(Clone, Debug)]
pub struct Hand {
    /// 21 landmarks
    pub landmarks: [HandLandmark; LANDMARK_COUNT],
    /// Hand presence score
    pub presence: f32,
}

/// Inference result for one camera frame
#[derive(Clone, Debug, Default)]
pub struct HandResult {
    /// Detected hands (at most one)
    pub hands: Vec<Hand>,
    /// Camera frame number this result corresponds to
    pub frame_number: u64,
}

/// Lifecycle of the inference thread
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum TrackerState {
    /// Loading the model
    Loading = 0,
    /// Accepting frames
    Ready = 1,
    /// Model could not be loaded
    Failed = 2,
}

impl TrackerState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => TrackerState::Loading,
            1 => TrackerState::Ready,
            _ => TrackerState::Failed,
        }
    }
}

/// Frame data to be processed
struct FrameData {
    /// RGBA pixel data
    data: Vec<u8>,
    width: u32,
    height: u32,
    frame_number: u64,
}

/// Options for the landmark model
#[derive(Clone, Debug)]
pub struct TrackerOptions {
    /// Explicit model directory, searched for when `None`
    pub model_dir: Option<PathBuf>,
    /// Square model input size
    pub input_size: u32,
    /// Minimum palm detector score to look for landmarks
    pub min_detection: f32,
    /// Minimum presence score to report a hand
    pub min_presence: f32,
}

impl Default for TrackerOptions {
    fn default() -> Self {
        Self {
            model_dir: None,
            input_size: 224,
            min_detection: 0.5,
            min_presence: 0.5,
        }
    }
}

/// Both ONNX sessions plus the detector anchors
struct HandModels {
    palm: ort::session::Session,
    landmark: ort::session::Session,
    anchors: Vec<Anchor>,
}

/// One output tensor copied out of a session run
#[derive(Clone, Debug)]
struct NamedTensor {
    name: String,
    data: Vec<f32>,
}

/// Landmark model outputs this app uses
#[derive(Clone, Debug, PartialEq)]
struct LandmarkOutputs {
    coords: Vec<f32>,
    presence: f32,
}

/// Hand landmark inference engine
pub struct HandTracker {
    /// Latest result from inference thread
    latest_result: Arc<Mutex<Option<HandResult>>>,
    /// Channel to send frames to inference thread
    frame_sender: Option<Sender<FrameData>>,
    /// Current [`TrackerState`]
    state: Arc<AtomicU8>,
    /// Inference thread handle
    thread_handle: Option<std::thread::JoinHandle<()>>,
}

impl HandTracker {
    /// Spawn the inference thread. The model loads asynchronously; poll
    /// [`HandTracker::state`] until it is ready.
    pub fn new(options: TrackerOptions) -> Result<Self, PerceptionError> {
        let latest_result = Arc::new(Mutex::new(None));
        let state = Arc::new(AtomicU8::new(TrackerState::Loading as u8));

        // Small queue: frames are dropped rather than piling up
        let (frame_sender, frame_receiver) = crossbeam_channel::bounded::<FrameData>(2);

        let latest_result_clone = latest_result.clone();
        let state_clone = state.clone();

        let thread_handle = std::thread::Builder::new()
            .name("hand-inference".to_string())
            .spawn(move || {
                Self::inference_thread(options, frame_receiver, latest_result_clone, state_clone);
            })
            .map_err(|e| PerceptionError::Thread(e.to_string()))?;

        Ok(Self {
            latest_result,
            frame_sender: Some(frame_sender),
            state,
            thread_handle: Some(thread_handle),
        })
    }

    /// Inference thread main loop
    fn inference_thread(
        options: TrackerOptions,
        frame_receiver: Receiver<FrameData>,
        latest_result: Arc<Mutex<Option<HandResult>>>,
        state: Arc<AtomicU8>,
    ) {
        log::info!("Hand inference thread started");

        let mut models = match Self::init_ort(&options) {
            Ok(models) => {
                state.store(TrackerState::Ready as u8, Ordering::Release);
                log::info!("Hand models loaded");
                models
            }
            Err(e) => {
                log::warn!("Failed to initialize hand tracking: {}. Gesture control disabled.", e);
                state.store(TrackerState::Failed as u8, Ordering::Release);
                return;
            }
        };

        while let Ok(frame) = frame_receiver.recv() {
            match Self::run_inference(&mut models, &frame, &options) {
                Ok(result) => {
                    *latest_result.lock() = Some(result);
                }
                Err(e) => {
                    log::warn!("Inference error: {}", e);
                }
            }
        }

        log::info!("Hand inference thread stopped");
    }

    /// Initialize ONNX Runtime and load both models
    fn init_ort(options: &TrackerOptions) -> Result<HandModels, PerceptionError> {
        let model_dir = match &options.model_dir {
            Some(dir) => dir.clone(),
            None => find_model_dir().ok_or(PerceptionError::ModelDirNotFound)?,
        };
        log::info!("Model directory: {:?}", model_dir);

        for model in [PALM_DETECTION_MODEL, HAND_LANDMARK_MODEL] {
            let path = model_dir.join(model);
            if !path.is_file() {
                return Err(PerceptionError::ModelMissing(path));
            }
        }

        ort::init()
            .with_name("GestureTree")
            .commit()
            .map_err(|e| PerceptionError::Runtime(format!("failed to initialize ORT: {}", e)))?;

        Ok(HandModels {
            palm: load_session(&model_dir.join(PALM_DETECTION_MODEL))?,
            landmark: load_session(&model_dir.join(HAND_LANDMARK_MODEL))?,
            anchors: palm::palm_anchors(),
        })
    }

    /// Find the palm, crop around it and run the landmark model on the crop
    fn run_inference(
        models: &mut HandModels,
        frame: &FrameData,
        options: &TrackerOptions,
    ) -> Result<HandResult, PerceptionError> {
        let mut result = HandResult {
            hands: Vec::new(),
            frame_number: frame.frame_number,
        };

        // Palm detector sees the whole frame, letterboxed
        let letterbox = Letterbox::fit(frame.width, frame.height, PALM_INPUT_SIZE);
        let palm_input = sample_nhwc(&frame.data, frame.width, frame.height, PALM_INPUT_SIZE, |u, v| {
            letterbox.to_frame(u, v)
        });
        let palm_outputs = run_session(&mut models.palm, palm_input, PALM_INPUT_SIZE)?;
        let (regressors, scores) = select_palm_outputs(&palm_outputs)?;

        let Some(palm) = palm::decode_best_palm(
            regressors,
            scores,
            &models.anchors,
            &letterbox,
            options.min_detection,
        ) else {
            return Ok(result);
        };

        // Landmark model sees an upright crop around the hand
        let roi = HandRoi::from_palm(&palm);
        let size = options.input_size;
        let hand_input = sample_nhwc(&frame.data, frame.width, frame.height, size, |u, v| roi.to_frame(u, v));
        let outputs = run_session(&mut models.landmark, hand_input, size)?;
        let selected = select_landmark_outputs(&outputs)?;

        if selected.presence >= options.min_presence {
            result.hands.push(Hand {
                landmarks: palm::project_landmarks(&selected.coords, size as f32, &roi, frame.width, frame.height),
                presence: selected.presence,
            });
        }

        Ok(result)
    }

    /// Send a frame for inference (non-blocking, dropped when busy)
    pub fn process_frame(&self, frame: &CameraFrame) {
        if let Some(ref sender) = self.frame_sender {
            let _ = sender.try_send(FrameData {
                data: frame.data.clone(),
                width: frame.width,
                height: frame.height,
                frame_number: frame.frame_number,
            });
        }
    }

    /// Get latest inference result
    pub fn latest_result(&self) -> Option<HandResult> {
        self.latest_result.lock().clone()
    }

    /// Current tracker state
    pub fn state(&self) -> TrackerState {
        TrackerState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Stop the inference thread
    pub fn stop(&mut self) {
        // Drop sender to signal thread to stop
        self.frame_sender = None;

        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for HandTracker {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Find the models directory next to the executable or the working directory
fn find_model_dir() -> Option<PathBuf> {
    let mut candidates = Vec::new();

    if let Ok(exe_path) = std::env::current_exe() {
        // exe dir, then up to target/ and the crate root for `cargo run`
        for ancestor in exe_path.ancestors().skip(1).take(3) {
            candidates.push(ancestor.join("models"));
        }
    }
    if let Ok(cwd) = std::env::current_dir() {
        candidates.push(cwd.join("models"));
    }

    candidates.into_iter().find(|dir| dir.is_dir())
}

fn load_session(path: &Path) -> Result<ort::session::Session, PerceptionError> {
    ort::session::Session::builder()
        .map_err(|e| PerceptionError::Runtime(format!("failed to create session builder: {}", e)))?
        .with_intra_threads(2)
        .map_err(|e| PerceptionError::Runtime(format!("failed to set threads: {}", e)))?
        .commit_from_file(path)
        .map_err(|e| PerceptionError::Runtime(format!("failed to load {:?}: {}", path, e)))
}

/// Run a session on one NHWC (1, size, size, 3) image and copy its outputs
fn run_session(
    session: &mut ort::session::Session,
    input: Vec<f32>,
    size: u32,
) -> Result<Vec<NamedTensor>, PerceptionError> {
    let input_array = Array4::from_shape_vec((1, size as usize, size as usize, 3), input)
        .map_err(|e| PerceptionError::Runtime(format!("failed to create input array: {}", e)))?;

    let input_tensor = ort::value::Tensor::from_array(input_array)
        .map_err(|e| PerceptionError::Runtime(format!("failed to create tensor: {}", e)))?;

    let outputs = session
        .run(ort::inputs![input_tensor])
        .map_err(|e| PerceptionError::Runtime(format!("inference failed: {}", e)))?;

    let mut tensors = Vec::new();
    for (name, value) in outputs.iter() {
        let (_shape, data) = value
            .try_extract_tensor::<f32>()
            .map_err(|e| PerceptionError::Output(e.to_string()))?;
        tensors.push(NamedTensor {
            name: name.to_string(),
            data: data.to_vec(),
        });
    }
    Ok(tensors)
}

/// Box regressors and scores of the palm detector, told apart by size
fn select_palm_outputs(tensors: &[NamedTensor]) -> Result<(&[f32], &[f32]), PerceptionError> {
    let find = |len: usize| {
        tensors
            .iter()
            .find(|t| t.data.len() == len)
            .map(|t| t.data.as_slice())
    };
    let regressors = find(PALM_ANCHOR_COUNT * PALM_REGRESSOR_STRIDE)
        .ok_or_else(|| PerceptionError::Output("no palm box tensor".to_string()))?;
    let scores = find(PALM_ANCHOR_COUNT)
        .ok_or_else(|| PerceptionError::Output("no palm score tensor".to_string()))?;
    Ok((regressors, scores))
}

fn is_world_output(name: &str) -> bool {
    name.contains("world") || name == "Identity_3"
}

fn is_presence_output(name: &str) -> bool {
    name.contains("score") || name.contains("presence") || name.contains("flag") || name == "Identity_1"
}

fn is_handedness_output(name: &str) -> bool {
    name == "Identity_2" || (name.contains("hand") && !is_presence_output(name))
}

/// Pick the screen landmarks and the presence score from the landmark
/// model's outputs. Names win; otherwise the first tensor of the right size
/// that isn't claimed by another output.
fn select_landmark_outputs(tensors: &[NamedTensor]) -> Result<LandmarkOutputs, PerceptionError> {
    let coord_tensors: Vec<&NamedTensor> = tensors
        .iter()
        .filter(|t| t.data.len() == LANDMARK_COUNT * 3)
        .collect();
    let coords = coord_tensors
        .iter()
        .find(|t| !is_world_output(&t.name))
        .or_else(|| coord_tensors.first())
        .ok_or_else(|| PerceptionError::Output("no landmark tensor".to_string()))?;

    let scalars: Vec<&NamedTensor> = tensors.iter().filter(|t| t.data.len() == 1).collect();
    let presence = scalars
        .iter()
        .find(|t| is_presence_output(&t.name))
        .or_else(|| scalars.iter().find(|t| !is_handedness_output(&t.name)))
        .ok_or_else(|| PerceptionError::Output("no presence tensor".to_string()))?;

    Ok(LandmarkOutputs {
        coords: coords.data.clone(),
        presence: as_probability(presence.data[0]),
    })
}

/// Presence may be a logit or a probability
fn as_probability(value: f32) -> f32 {
    if (0.0..=1.0).contains(&value) {
        value
    } else {
        1.0 / (1.0 + (-value).exp())
    }
}

/// Build a square NHWC float buffer by sampling the RGBA frame (nearest
/// neighbour). `map` takes a normalized output position to frame pixels;
/// samples outside the frame are black.
fn sample_nhwc(
    data: &[u8],
    width: u32,
    height: u32,
    target: u32,
    map: impl Fn(f32, f32) -> (f32, f32),
) -> Vec<f32> {
    let mut output = vec![0.0f32; (target * target * 3) as usize];
    if width == 0 || height == 0 {
        return output;
    }

    for y in 0..target {
        for x in 0..target {
            let u = (x as f32 + 0.5) / target as f32;
            let v = (y as f32 + 0.5) / target as f32;
            let (fx, fy) = map(u, v);
            if fx < 0.0 || fy < 0.0 || fx >= width as f32 || fy >= height as f32 {
                continue;
            }

            let src_idx = ((fy as u32 * width + fx as u32) * 4) as usize;
            if src_idx + 2 < data.len() {
                // HWC format: [y][x][channel]
                let out_idx = ((y * target + x) * 3) as usize;
                output[out_idx] = data[src_idx] as f32 / 255.0;
                output[out_idx + 1] = data[src_idx + 1] as f32 / 255.0;
                output[out_idx + 2] = data[src_idx + 2] as f32 / 255.0;
            }
        }
    }

    output
}

/// Check whether a directory contains both hand models
pub fn has_models(dir: &Path) -> bool {
    dir.join(PALM_DETECTION_MODEL).is_file() && dir.join(HAND_LANDMARK_MODEL).is_file()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tensor(name: &str, data: Vec<f32>) -> NamedTensor {
        NamedTensor {
            name: name.to_string(),
            data,
        }
    }

    fn coords(first: f32) -> Vec<f32> {
        let mut data = vec![0.0; LANDMARK_COUNT * 3];
        data[0] = first;
        data
    }

    #[test]
    fn test_landmark_outputs_in_model_order() {
        let outputs = [
            tensor("Identity", coords(1.0)),
            tensor("Identity_1", vec![0.9]),
            tensor("Identity_2", vec![0.1]),
            tensor("Identity_3", coords(2.0)),
        ];
        let selected = select_landmark_outputs(&outputs).unwrap();
        assert_eq!(selected.coords[0], 1.0);
        assert_eq!(selected.presence, 0.9);
    }

    #[test]
    fn test_landmark_outputs_by_name_in_any_order() {
        let outputs = [
            tensor("xyz_x21_world", coords(2.0)),
            tensor("lefthand_0_or_righthand_1", vec![0.95]),
            tensor("xyz_x21", coords(1.0)),
            tensor("hand_score", vec![3.0]),
        ];
        let selected = select_landmark_outputs(&outputs).unwrap();
        assert_eq!(selected.coords[0], 1.0);
        // Logit converted to a probability
        assert!((selected.presence - as_probability(3.0)).abs() < 1e-6);
    }

    #[test]
    fn test_unnamed_outputs_use_first_of_each_size() {
        let outputs = [
            tensor("out_a", coords(1.0)),
            tensor("out_b", vec![0.7]),
            tensor("out_c", coords(2.0)),
        ];
        let selected = select_landmark_outputs(&outputs).unwrap();
        assert_eq!(selected.coords[0], 1.0);
        assert_eq!(selected.presence, 0.7);
    }

    #[test]
    fn test_missing_landmark_outputs() {
        assert!(select_landmark_outputs(&[tensor("Identity_1", vec![0.9])]).is_err());
        assert!(select_landmark_outputs(&[tensor("Identity", coords(1.0))]).is_err());
    }

    #[test]
    fn test_palm_outputs_by_size() {
        let outputs = [
            tensor("classificators", vec![0.0; PALM_ANCHOR_COUNT]),
            tensor("regressors", vec![1.0; PALM_ANCHOR_COUNT * PALM_REGRESSOR_STRIDE]),
        ];
        let (regressors, scores) = select_palm_outputs(&outputs).unwrap();
        assert_eq!(regressors.len(), PALM_ANCHOR_COUNT * PALM_REGRESSOR_STRIDE);
        assert_eq!(scores.len(), PALM_ANCHOR_COUNT);
        assert!(select_palm_outputs(&outputs[..1]).is_err());
    }

    #[test]
    fn test_as_probability() {
        assert_eq!(as_probability(0.7), 0.7);
        assert!((as_probability(0.0) - 0.0).abs() < 1e-6);
        assert!(as_probability(8.0) > 0.99);
        assert!(as_probability(-8.0) < 0.01);
    }

    #[test]
    fn test_sample_stretched_frame() {
        // 2x1 frame: red, blue
        let data = vec![255, 0, 0, 255, 0, 0, 255, 255];
        let out = sample_nhwc(&data, 2, 1, 4, |u, v| (u * 2.0, v));
        assert_eq!(out.len(), 4 * 4 * 3);
        // Left half red, right half blue
        assert_eq!(&out[0..3], &[1.0, 0.0, 0.0]);
        assert_eq!(&out[9..12], &[0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_sample_letterboxed_frame() {
        // 4x2 white frame into a 4x4 input: top and bottom rows are padding
        let data = vec![255u8; 4 * 2 * 4];
        let letterbox = Letterbox::fit(4, 2, 4);
        let out = sample_nhwc(&data, 4, 2, 4, |u, v| letterbox.to_frame(u, v));
        let row = |y: usize| &out[y * 12..(y + 1) * 12];
        assert!(row(0).iter().all(|&v| v == 0.0));
        assert!(row(1).iter().all(|&v| v == 1.0));
        assert!(row(2).iter().all(|&v| v == 1.0));
        assert!(row(3).iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_sample_empty_frame() {
        let out = sample_nhwc(&[], 0, 0, 8, |u, v| (u, v));
        assert!(out.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_missing_model_dir() {
        assert!(!has_models(Path::new("/definitely/not/a/model/dir")));
    }
}
