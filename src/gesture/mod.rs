//! Gesture module
//!
//! Turns hand observations into a display mode and a scene orientation.
//! The two are independent consumers of the same observation: the mode only
//! changes on threshold crossings, the orientation is steered continuously.

pub mod orientation;

pub use orientation::SceneOrientation;

use crate::ml::HandLandmark;
use crate::perception::HandObservation;
use crate::settings::GestureSettings;

/// Landmark indices used by the classifier (MediaPipe hand topology)
pub mod landmark {
    pub const WRIST: usize = 0;
    pub const THUMB_TIP: usize = 4;
    pub const INDEX_TIP: usize = 8;
    /// Middle finger MCP joint, used as the palm center
    pub const PALM_CENTER: usize = 9;
    pub const MIDDLE_TIP: usize = 12;
    pub const RING_TIP: usize = 16;
    pub const PINKY_TIP: usize = 20;

    /// The four non-thumb fingertips
    pub const FINGERTIPS: [usize; 4] = [INDEX_TIP, MIDDLE_TIP, RING_TIP, PINKY_TIP];
}

/// Scene display mode
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum AppMode {
    /// Particles spiral into a tree
    #[default]
    Tree,
    /// Particles drift apart and spin
    Scatter,
    /// One photo is brought to the front, everything else is pushed away
    Focus,
}

impl AppMode {
    /// Get display name for UI
    pub fn display_name(&self) -> &'static str {
        match self {
            AppMode::Tree => "TREE",
            AppMode::Scatter => "SCATTER",
            AppMode::Focus => "FOCUS",
        }
    }

    /// Get all modes for iteration
    pub fn all() -> &'static [AppMode] {
        &[AppMode::Tree, AppMode::Scatter, AppMode::Focus]
    }
}

/// Distances measured on one hand
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GestureReading {
    /// Thumb tip to index tip
    pub pinch_distance: f32,
    /// Mean wrist to fingertip distance over the four fingers
    pub average_tip_distance: f32,
}

impl GestureReading {
    /// Measure a hand observation
    pub fn measure(observation: &HandObservation) -> Self {
        let lm = &observation.landmarks;
        let wrist = lm[landmark::WRIST];

        let pinch_distance = distance(lm[landmark::THUMB_TIP], lm[landmark::INDEX_TIP]);
        let average_tip_distance = landmark::FINGERTIPS
            .iter()
            .map(|&i| distance(lm[i], wrist))
            .sum::<f32>()
            / landmark::FINGERTIPS.len() as f32;

        Self {
            pinch_distance,
            average_tip_distance,
        }
    }

    /// Apply the threshold rules. `None` means no rule fired (dead zone).
    pub fn classify(&self, thresholds: &GestureSettings) -> Option<AppMode> {
        if self.pinch_distance < thresholds.pinch_threshold {
            Some(AppMode::Focus)
        } else if self.average_tip_distance < thresholds.fist_threshold {
            Some(AppMode::Tree)
        } else if self.average_tip_distance > thresholds.open_threshold {
            Some(AppMode::Scatter)
        } else {
            None
        }
    }
}

fn distance(a: HandLandmark, b: HandLandmark) -> f32 {
    let dx = a.x - b.x;
    let dy = a.y - b.y;
    let dz = a.z - b.z;
    (dx * dx + dy * dy + dz * dz).sqrt()
}

/// Owns the current display mode
pub struct ModeController {
    mode: AppMode,
    thresholds: GestureSettings,
}

impl ModeController {
    /// Create a controller starting in tree mode
    pub fn new(thresholds: GestureSettings) -> Self {
        Self {
            mode: AppMode::default(),
            thresholds,
        }
    }

    /// Current mode
    pub fn mode(&self) -> AppMode {
        self.mode
    }

    /// Feed this frame's observation. Returns the new mode when it changed.
    pub fn update(&mut self, observation: Option<&HandObservation>) -> Option<AppMode> {
        let observation = observation?;
        let next = GestureReading::measure(observation).classify(&self.thresholds)?;
        self.transition(next)
    }

    /// Force a mode from the UI. Stays until the next gesture transition.
    pub fn force(&mut self, mode: AppMode) -> Option<AppMode> {
        self.transition(mode)
    }

    fn transition(&mut self, next: AppMode) -> Option<AppMode> {
        if next == self.mode {
            return None;
        }
        log::info!("Mode: {:?} -> {:?}", self.mode, next);
        self.mode = next;
        Some(next)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Build a hand with the wrist at the origin, all four fingertips at
    /// `tip_distance` along different axes, and the thumb tip `pinch` away
    /// from the index tip.
    pub(crate) fn hand(pinch: f32, tip_distance: f32) -> HandObservation {
        let mut landmarks = [HandLandmark::default(); 21];
        landmarks[landmark::WRIST] = HandLandmark { x: 0.5, y: 0.5, z: 0.0 };
        landmarks[landmark::INDEX_TIP] = HandLandmark { x: 0.5, y: 0.5 - tip_distance, z: 0.0 };
        landmarks[landmark::MIDDLE_TIP] = HandLandmark { x: 0.5 + tip_distance, y: 0.5, z: 0.0 };
        landmarks[landmark::RING_TIP] = HandLandmark { x: 0.5 - tip_distance, y: 0.5, z: 0.0 };
        landmarks[landmark::PINKY_TIP] = HandLandmark { x: 0.5, y: 0.5, z: tip_distance };
        let index = landmarks[landmark::INDEX_TIP];
        landmarks[landmark::THUMB_TIP] = HandLandmark { x: index.x + pinch, y: index.y, z: index.z };
        landmarks[landmark::PALM_CENTER] = HandLandmark { x: 0.5, y: 0.5, z: 0.0 };
        HandObservation {
            landmarks,
            frame_number: 1,
        }
    }

    #[test]
    fn test_measure() {
        let reading = GestureReading::measure(&hand(0.2, 0.3));
        assert!((reading.pinch_distance - 0.2).abs() < 1e-5);
        assert!((reading.average_tip_distance - 0.3).abs() < 1e-5);
    }

    #[test]
    fn test_pinch_wins_over_open_hand() {
        let thresholds = GestureSettings::default();
        for tips in [0.1, 0.3, 0.5] {
            let reading = GestureReading::measure(&hand(0.03, tips));
            assert_eq!(reading.classify(&thresholds), Some(AppMode::Focus));
        }
    }

    #[test]
    fn test_open_hand_scatters() {
        let reading = GestureReading::measure(&hand(0.2, 0.5));
        assert_eq!(reading.classify(&GestureSettings::default()), Some(AppMode::Scatter));
    }

    #[test]
    fn test_fist_builds_tree() {
        let reading = GestureReading::measure(&hand(0.2, 0.1));
        assert_eq!(reading.classify(&GestureSettings::default()), Some(AppMode::Tree));
    }

    #[test]
    fn test_dead_zone_keeps_mode() {
        let mut controller = ModeController::new(GestureSettings::default());
        controller.update(Some(&hand(0.2, 0.5)));
        assert_eq!(controller.mode(), AppMode::Scatter);

        assert_eq!(controller.update(Some(&hand(0.2, 0.3))), None);
        assert_eq!(controller.mode(), AppMode::Scatter);
    }

    #[test]
    fn test_no_hand_keeps_mode() {
        let mut controller = ModeController::new(GestureSettings::default());
        controller.update(Some(&hand(0.03, 0.3)));
        assert_eq!(controller.mode(), AppMode::Focus);

        for _ in 0..10 {
            assert_eq!(controller.update(None), None);
        }
        assert_eq!(controller.mode(), AppMode::Focus);
    }

    #[test]
    fn test_update_reports_only_changes() {
        let mut controller = ModeController::new(GestureSettings::default());
        assert_eq!(controller.update(Some(&hand(0.2, 0.1))), None);
        assert_eq!(controller.update(Some(&hand(0.2, 0.5))), Some(AppMode::Scatter));
        assert_eq!(controller.update(Some(&hand(0.2, 0.5))), None);
    }

    #[test]
    fn test_forced_mode_until_next_gesture() {
        let mut controller = ModeController::new(GestureSettings::default());
        controller.force(AppMode::Focus);
        assert_eq!(controller.mode(), AppMode::Focus);

        // Dead zone and missing hands don't undo the override
        controller.update(Some(&hand(0.2, 0.3)));
        controller.update(None);
        assert_eq!(controller.mode(), AppMode::Focus);

        controller.update(Some(&hand(0.2, 0.1)));
        assert_eq!(controller.mode(), AppMode::Tree);
    }
}
