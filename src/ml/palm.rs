//! Palm detection and the hand crop
//!
//! The landmark model expects a hand that fills its input, upright. A palm
//! detector runs on the letterboxed frame first; its best box is turned into
//! a rotated square around the whole hand, and that square is what the
//! landmark model sees. Landmarks are then mapped from the crop back into
//! frame-normalized coordinates.
//!
//! All geometry here works in frame pixels.

use std::f32::consts::{FRAC_PI_2, PI, TAU};

use super::{HandLandmark, LANDMARK_COUNT};

/// Square input size of the palm detector
pub const PALM_INPUT_SIZE: u32 = 192;
/// Anchors produced by [`palm_anchors`]
pub const PALM_ANCHOR_COUNT: usize = 2016;
/// Box (4) plus 7 keypoints (14) per anchor
pub const PALM_REGRESSOR_STRIDE: usize = 18;

const WRIST_KEYPOINT: usize = 0;
const MIDDLE_BASE_KEYPOINT: usize = 2;
const PALM_KEYPOINTS: usize = 7;

/// Hand crop size relative to the palm box
const ROI_SCALE: f32 = 2.6;
/// Crop center shift toward the fingers, in palm heights
const ROI_SHIFT_Y: f32 = -0.5;

/// SSD anchor center, normalized to the detector input
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Anchor {
    pub x: f32,
    pub y: f32,
}

/// Anchor centers for the 192px palm model: a 24x24 grid at stride 8 with
/// two anchors per cell, then a 12x12 grid at stride 16 with six.
pub fn palm_anchors() -> Vec<Anchor> {
    let mut anchors = Vec::with_capacity(PALM_ANCHOR_COUNT);
    for (stride, per_cell) in [(8u32, 2usize), (16, 6)] {
        let grid = PALM_INPUT_SIZE / stride;
        for y in 0..grid {
            for x in 0..grid {
                let anchor = Anchor {
                    x: (x as f32 + 0.5) / grid as f32,
                    y: (y as f32 + 0.5) / grid as f32,
                };
                anchors.extend(std::iter::repeat(anchor).take(per_cell));
            }
        }
    }
    anchors
}

/// Aspect-preserving fit of a frame into a square model input
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Letterbox {
    /// Input pixels per frame pixel
    pub scale: f32,
    pub pad_x: f32,
    pub pad_y: f32,
    pub size: u32,
}

impl Letterbox {
    pub fn fit(width: u32, height: u32, size: u32) -> Self {
        let scale = size as f32 / width.max(height).max(1) as f32;
        Self {
            scale,
            pad_x: (size as f32 - width as f32 * scale) / 2.0,
            pad_y: (size as f32 - height as f32 * scale) / 2.0,
            size,
        }
    }

    /// Normalized input coordinate to frame pixels
    pub fn to_frame(&self, u: f32, v: f32) -> (f32, f32) {
        let size = self.size as f32;
        ((u * size - self.pad_x) / self.scale, (v * size - self.pad_y) / self.scale)
    }

    /// Normalized input length to frame pixels
    pub fn length_to_frame(&self, length: f32) -> f32 {
        length * self.size as f32 / self.scale
    }
}

/// Best palm box, in frame pixels
#[derive(Clone, Debug, PartialEq)]
pub struct PalmDetection {
    pub score: f32,
    pub center: (f32, f32),
    pub width: f32,
    pub height: f32,
    pub keypoints: [(f32, f32); PALM_KEYPOINTS],
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x.clamp(-100.0, 100.0)).exp())
}

/// Pick the highest scoring anchor and decode its box. `None` when nothing
/// reaches `min_score` or the tensors don't match the anchors.
pub fn decode_best_palm(
    regressors: &[f32],
    scores: &[f32],
    anchors: &[Anchor],
    letterbox: &Letterbox,
    min_score: f32,
) -> Option<PalmDetection> {
    if scores.len() != anchors.len() || regressors.len() != anchors.len() * PALM_REGRESSOR_STRIDE {
        log::debug!(
            "Palm output mismatch: {} scores, {} regressors, {} anchors",
            scores.len(),
            regressors.len(),
            anchors.len()
        );
        return None;
    }

    let (best, raw) = scores
        .iter()
        .copied()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(&b.1))?;
    let score = sigmoid(raw);
    if score < min_score {
        return None;
    }

    let anchor = anchors[best];
    let r = &regressors[best * PALM_REGRESSOR_STRIDE..(best + 1) * PALM_REGRESSOR_STRIDE];
    let input = PALM_INPUT_SIZE as f32;

    let mut keypoints = [(0.0, 0.0); PALM_KEYPOINTS];
    for (k, keypoint) in keypoints.iter_mut().enumerate() {
        *keypoint = letterbox.to_frame(
            r[4 + 2 * k] / input + anchor.x,
            r[5 + 2 * k] / input + anchor.y,
        );
    }

    Some(PalmDetection {
        score,
        center: letterbox.to_frame(r[0] / input + anchor.x, r[1] / input + anchor.y),
        width: letterbox.length_to_frame(r[2] / input),
        height: letterbox.length_to_frame(r[3] / input),
        keypoints,
    })
}

fn normalize_angle(angle: f32) -> f32 {
    angle - TAU * ((angle + PI) / TAU).floor()
}

/// Rotated square around a hand, in frame pixels
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HandRoi {
    pub center_x: f32,
    pub center_y: f32,
    pub size: f32,
    /// Radians; 0 when the hand points straight up
    pub rotation: f32,
}

impl HandRoi {
    /// Grow a palm box into a crop holding the whole hand, turned so the
    /// fingers point up.
    pub fn from_palm(palm: &PalmDetection) -> Self {
        let (x0, y0) = palm.keypoints[WRIST_KEYPOINT];
        let (x1, y1) = palm.keypoints[MIDDLE_BASE_KEYPOINT];
        let rotation = normalize_angle(FRAC_PI_2 - (-(y1 - y0)).atan2(x1 - x0));

        let shift = ROI_SHIFT_Y * palm.height;
        let (sin, cos) = rotation.sin_cos();
        Self {
            center_x: palm.center.0 - shift * sin,
            center_y: palm.center.1 + shift * cos,
            size: palm.width.max(palm.height) * ROI_SCALE,
            rotation,
        }
    }

    /// Normalized crop coordinate to frame pixels
    pub fn to_frame(&self, u: f32, v: f32) -> (f32, f32) {
        let lx = (u - 0.5) * self.size;
        let ly = (v - 0.5) * self.size;
        let (sin, cos) = self.rotation.sin_cos();
        (
            self.center_x + lx * cos - ly * sin,
            self.center_y + lx * sin + ly * cos,
        )
    }
}

/// Map landmark model output (pixels of the `input_size` crop) to
/// frame-normalized landmarks. Depth is scaled like x.
pub fn project_landmarks(
    coords: &[f32],
    input_size: f32,
    roi: &HandRoi,
    frame_width: u32,
    frame_height: u32,
) -> [HandLandmark; LANDMARK_COUNT] {
    let width = frame_width.max(1) as f32;
    let height = frame_height.max(1) as f32;

    let mut landmarks = [HandLandmark::default(); LANDMARK_COUNT];
    for (landmark, xyz) in landmarks.iter_mut().zip(coords.chunks_exact(3)) {
        let (x, y) = roi.to_frame(xyz[0] / input_size, xyz[1] / input_size);
        *landmark = HandLandmark {
            x: x / width,
            y: y / height,
            z: xyz[2] / input_size * roi.size / width,
        };
    }
    landmarks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: (f32, f32), b: (f32, f32)) -> bool {
        (a.0 - b.0).abs() < 1e-3 && (a.1 - b.1).abs() < 1e-3
    }

    #[test]
    fn test_anchor_layout() {
        let anchors = palm_anchors();
        assert_eq!(anchors.len(), PALM_ANCHOR_COUNT);
        assert_eq!(anchors[0], Anchor { x: 0.5 / 24.0, y: 0.5 / 24.0 });
        assert_eq!(anchors[0], anchors[1]);
        assert_eq!(anchors[2], Anchor { x: 1.5 / 24.0, y: 0.5 / 24.0 });
        // First anchor of the stride-16 grid
        assert_eq!(anchors[1152], Anchor { x: 0.5 / 12.0, y: 0.5 / 12.0 });
        assert_eq!(anchors[PALM_ANCHOR_COUNT - 1], Anchor { x: 11.5 / 12.0, y: 11.5 / 12.0 });
    }

    #[test]
    fn test_letterbox_landscape() {
        let lb = Letterbox::fit(160, 120, 192);
        assert!((lb.scale - 1.2).abs() < 1e-6);
        assert_eq!(lb.pad_x, 0.0);
        assert!((lb.pad_y - 24.0).abs() < 1e-4);

        assert!(close(lb.to_frame(0.0, 24.0 / 192.0), (0.0, 0.0)));
        assert!(close(lb.to_frame(0.5, 0.5), (80.0, 60.0)));
        assert!(close(lb.to_frame(1.0, 168.0 / 192.0), (160.0, 120.0)));
        assert!((lb.length_to_frame(0.5) - 80.0).abs() < 1e-4);
    }

    #[test]
    fn test_decode_best_palm() {
        let anchors = palm_anchors();
        let mut scores = vec![-10.0; PALM_ANCHOR_COUNT];
        let mut regressors = vec![0.0; PALM_ANCHOR_COUNT * PALM_REGRESSOR_STRIDE];

        // Anchor at the center of the stride-16 grid
        let best = 1152 + (6 * 12 + 6) * 6;
        assert_eq!(anchors[best], Anchor { x: 6.5 / 12.0, y: 6.5 / 12.0 });
        scores[best] = 4.0;
        let r = &mut regressors[best * PALM_REGRESSOR_STRIDE..];
        r[2] = 48.0;
        r[3] = 48.0;
        // Wrist below the middle finger base
        r[5] = 10.0;
        r[9] = -10.0;

        let lb = Letterbox::fit(192, 192, 192);
        let palm = decode_best_palm(&regressors, &scores, &anchors, &lb, 0.5).unwrap();
        assert!(palm.score > 0.98);
        assert!(close(palm.center, (104.0, 104.0)));
        assert!((palm.width - 48.0).abs() < 1e-4);
        assert!(close(palm.keypoints[0], (104.0, 114.0)));
        assert!(close(palm.keypoints[2], (104.0, 94.0)));

        assert!(decode_best_palm(&regressors, &scores, &anchors, &lb, 0.99).is_none());
        assert!(decode_best_palm(&regressors[18..], &scores, &anchors, &lb, 0.5).is_none());
    }

    fn palm(wrist: (f32, f32), middle: (f32, f32)) -> PalmDetection {
        let mut keypoints = [(0.0, 0.0); PALM_KEYPOINTS];
        keypoints[WRIST_KEYPOINT] = wrist;
        keypoints[MIDDLE_BASE_KEYPOINT] = middle;
        PalmDetection {
            score: 0.9,
            center: (100.0, 100.0),
            width: 20.0,
            height: 20.0,
            keypoints,
        }
    }

    #[test]
    fn test_upright_hand_roi() {
        let roi = HandRoi::from_palm(&palm((100.0, 110.0), (100.0, 90.0)));
        assert!(roi.rotation.abs() < 1e-5);
        // Shifted half a palm toward the fingers
        assert!(close((roi.center_x, roi.center_y), (100.0, 90.0)));
        assert!((roi.size - 52.0).abs() < 1e-4);
    }

    #[test]
    fn test_sideways_hand_roi() {
        // Fingers pointing right
        let roi = HandRoi::from_palm(&palm((90.0, 100.0), (110.0, 100.0)));
        assert!((roi.rotation - FRAC_PI_2).abs() < 1e-5);
        assert!(close((roi.center_x, roi.center_y), (110.0, 100.0)));

        // Top of the crop lies toward the fingertips
        let (x, y) = roi.to_frame(0.5, 0.0);
        assert!(close((x, y), (110.0 + roi.size / 2.0, 100.0)));
    }

    #[test]
    fn test_crop_to_frame_mapping() {
        let roi = HandRoi {
            center_x: 80.0,
            center_y: 60.0,
            size: 40.0,
            rotation: 0.0,
        };
        assert!(close(roi.to_frame(0.5, 0.5), (80.0, 60.0)));
        assert!(close(roi.to_frame(0.0, 0.0), (60.0, 40.0)));
        assert!(close(roi.to_frame(1.0, 1.0), (100.0, 80.0)));

        let turned = HandRoi { rotation: PI, ..roi };
        assert!(close(turned.to_frame(0.0, 0.0), (100.0, 80.0)));
    }

    #[test]
    fn test_project_landmarks_into_frame() {
        let roi = HandRoi {
            center_x: 80.0,
            center_y: 60.0,
            size: 40.0,
            rotation: 0.0,
        };
        let mut coords = vec![0.0; LANDMARK_COUNT * 3];
        // Crop center, then the crop's top-left corner with some depth
        coords[0] = 112.0;
        coords[1] = 112.0;
        coords[5] = 22.4;

        let landmarks = project_landmarks(&coords, 224.0, &roi, 160, 120);
        assert!((landmarks[0].x - 0.5).abs() < 1e-5);
        assert!((landmarks[0].y - 0.5).abs() < 1e-5);
        assert!((landmarks[1].x - 60.0 / 160.0).abs() < 1e-5);
        assert!((landmarks[1].y - 40.0 / 120.0).abs() < 1e-5);
        assert!((landmarks[1].z - 0.1 * 40.0 / 160.0).abs() < 1e-5);
    }

    #[test]
    fn test_normalize_angle() {
        assert!((normalize_angle(3.0 * PI / 2.0) + FRAC_PI_2).abs() < 1e-5);
        assert!((normalize_angle(-3.0 * PI / 2.0) - FRAC_PI_2).abs() < 1e-5);
        assert!((normalize_angle(0.25) - 0.25).abs() < 1e-6);
    }
}
