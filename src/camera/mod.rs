//! Camera capture module
//!
//! Provides cross-platform webcam capture using the nokhwa crate.
//! Captures frames on a background thread and provides the latest frame
//! to the render thread.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Instant;

use nokhwa::pixel_format::RgbAFormat;
use nokhwa::utils::{CameraIndex, RequestedFormat, RequestedFormatType, Resolution};
use nokhwa::Camera;
use parking_lot::Mutex;

use crate::ml::PerceptionError;

/// Camera frame data
#[derive(Clone)]
pub struct CameraFrame {
    /// RGBA pixel data
    pub data: Vec<u8>,
    /// Frame width
    pub width: u32,
    /// Frame height
    pub height: u32,
    /// Frame number, starting at 1
    pub frame_number: u64,
    /// Capture timestamp
    pub timestamp: Instant,
}

/// Lifecycle of the capture thread
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum CaptureState {
    /// Opening the device
    Starting = 0,
    /// Frames are arriving
    Streaming = 1,
    /// The device could not be opened (missing, busy or permission denied)
    Failed = 2,
    /// Capture was stopped
    Stopped = 3,
}

impl CaptureState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => CaptureState::Starting,
            1 => CaptureState::Streaming,
            2 => CaptureState::Failed,
            _ => CaptureState::Stopped,
        }
    }
}

/// Camera capture interface
pub struct CameraCapture {
    /// Latest captured frames - triple buffered
    frames: [Arc<Mutex<Option<CameraFrame>>>; 3],
    /// Index of the latest complete frame
    latest_frame_idx: Arc<AtomicU64>,
    /// Whether capture should keep running
    running: Arc<AtomicBool>,
    /// Current [`CaptureState`]
    state: Arc<AtomicU8>,
    /// Capture thread handle
    thread_handle: Option<std::thread::JoinHandle<()>>,
    /// Frame counter
    frame_count: Arc<AtomicU64>,
}

impl CameraCapture {
    /// Start capturing from a camera
    ///
    /// # Arguments
    /// * `camera_index` - The camera index to use (0 for default)
    /// * `width` - Requested frame width
    /// * `height` - Requested frame height
    pub fn new(camera_index: u32, width: u32, height: u32) -> Result<Self, PerceptionError> {
        let frames: [Arc<Mutex<Option<CameraFrame>>>; 3] = [
            Arc::new(Mutex::new(None)),
            Arc::new(Mutex::new(None)),
            Arc::new(Mutex::new(None)),
        ];
        let latest_frame_idx = Arc::new(AtomicU64::new(0));
        let running = Arc::new(AtomicBool::new(true));
        let state = Arc::new(AtomicU8::new(CaptureState::Starting as u8));
        let frame_count = Arc::new(AtomicU64::new(0));

        let shared = CaptureShared {
            frames: frames.clone(),
            latest_frame_idx: latest_frame_idx.clone(),
            running: running.clone(),
            state: state.clone(),
            frame_count: frame_count.clone(),
        };

        let thread_handle = std::thread::Builder::new()
            .name("camera-capture".to_string())
            .spawn(move || {
                Self::capture_thread(camera_index, width, height, shared);
            })
            .map_err(|e| PerceptionError::Thread(e.to_string()))?;

        Ok(Self {
            frames,
            latest_frame_idx,
            running,
            state,
            thread_handle: Some(thread_handle),
            frame_count,
        })
    }

    /// Open the camera, preferring the requested resolution
    fn open_camera(camera_index: u32, width: u32, height: u32) -> Option<Camera> {
        let index = CameraIndex::Index(camera_index);

        let requested = RequestedFormat::new::<RgbAFormat>(RequestedFormatType::HighestResolution(
            Resolution::new(width, height),
        ));

        match Camera::new(index.clone(), requested) {
            Ok(c) => Some(c),
            Err(e) => {
                log::warn!("Failed to open camera at {}x{}: {:?}", width, height, e);

                // Let the driver pick any format
                let fallback = RequestedFormat::new::<RgbAFormat>(RequestedFormatType::None);
                match Camera::new(index, fallback) {
                    Ok(c) => Some(c),
                    Err(e2) => {
                        log::warn!("Failed to open camera with any format: {:?}", e2);
                        None
                    }
                }
            }
        }
    }

    /// Camera capture thread
    fn capture_thread(camera_index: u32, width: u32, height: u32, shared: CaptureShared) {
        log::info!("Starting camera capture thread (camera {})", camera_index);

        let Some(mut camera) = Self::open_camera(camera_index, width, height) else {
            shared.set_state(CaptureState::Failed);
            return;
        };

        if let Err(e) = camera.open_stream() {
            log::warn!("Failed to open camera stream: {:?}", e);
            shared.set_state(CaptureState::Failed);
            return;
        }

        log::info!(
            "Camera opened: {} ({}x{})",
            camera.info().human_name(),
            camera.resolution().width(),
            camera.resolution().height()
        );
        shared.set_state(CaptureState::Streaming);

        let mut write_idx: u64 = 0;

        while shared.running.load(Ordering::Acquire) {
            match camera.frame() {
                Ok(frame) => match frame.decode_image::<RgbAFormat>() {
                    Ok(image) => {
                        let frame_number = shared.frame_count.fetch_add(1, Ordering::Relaxed) + 1;

                        let camera_frame = CameraFrame {
                            width: image.width(),
                            height: image.height(),
                            data: image.into_raw(),
                            frame_number,
                            timestamp: Instant::now(),
                        };

                        // Write to the next buffer slot
                        let slot = (write_idx % 3) as usize;
                        *shared.frames[slot].lock() = Some(camera_frame);

                        shared.latest_frame_idx.store(write_idx, Ordering::Release);
                        write_idx = write_idx.wrapping_add(1);
                    }
                    Err(e) => {
                        log::warn!("Failed to decode frame: {:?}", e);
                    }
                },
                Err(e) => {
                    log::warn!("Failed to capture frame: {:?}", e);
                    std::thread::sleep(std::time::Duration::from_millis(10));
                }
            }
        }

        if let Err(e) = camera.stop_stream() {
            log::debug!("Failed to stop camera stream: {:?}", e);
        }
        shared.set_state(CaptureState::Stopped);
        log::info!("Camera capture thread stopped");
    }

    /// Get the latest captured frame
    pub fn latest_frame(&self) -> Option<CameraFrame> {
        let idx = self.latest_frame_idx.load(Ordering::Acquire);
        let slot = (idx % 3) as usize;
        self.frames[slot].lock().clone()
    }

    /// Current capture state
    pub fn state(&self) -> CaptureState {
        CaptureState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Get frame count
    pub fn frame_count(&self) -> u64 {
        self.frame_count.load(Ordering::Relaxed)
    }

    /// Stop capturing
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
            log::info!("Camera stopped after {} frames", self.frame_count());
        }
    }
}

impl Drop for CameraCapture {
    fn drop(&mut self) {
        self.stop();
    }
}

/// State shared with the capture thread
struct CaptureShared {
    frames: [Arc<Mutex<Option<CameraFrame>>>; 3],
    latest_frame_idx: Arc<AtomicU64>,
    running: Arc<AtomicBool>,
    state: Arc<AtomicU8>,
    frame_count: Arc<AtomicU64>,
}

impl CaptureShared {
    fn set_state(&self, state: CaptureState) {
        self.state.store(state as u8, Ordering::Release);
    }
}

