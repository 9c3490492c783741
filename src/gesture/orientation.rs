//! Whole-scene orientation
//!
//! Steered toward the palm while a hand is visible, slowly spinning otherwise.

use glam::{Mat4, Quat};

use super::landmark;
use crate::perception::HandObservation;
use crate::settings::GestureSettings;

/// Rotation applied to the particle group as a whole
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SceneOrientation {
    /// Rotation around Y in radians
    pub yaw: f32,
    /// Rotation around X in radians
    pub pitch: f32,
}

impl SceneOrientation {
    /// Advance one frame
    pub fn update(&mut self, observation: Option<&HandObservation>, settings: &GestureSettings) {
        match observation {
            Some(observation) => self.steer(observation, settings.steer_factor),
            None => self.idle_spin(settings.idle_spin),
        }
    }

    /// Ease toward the orientation implied by the palm position
    pub fn steer(&mut self, observation: &HandObservation, factor: f32) {
        let palm = observation.landmarks[landmark::PALM_CENTER];
        let target_yaw = (palm.x - 0.5) * 2.0;
        let target_pitch = (palm.y - 0.5) * 1.5;
        self.yaw += (target_yaw - self.yaw) * factor;
        self.pitch += (target_pitch - self.pitch) * factor;
    }

    /// Constant spin while nobody is steering
    pub fn idle_spin(&mut self, amount: f32) {
        self.yaw += amount;
    }

    /// Group transform (pitch then yaw, XYZ Euler order)
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_quat(Quat::from_euler(glam::EulerRot::XYZ, self.pitch, self.yaw, 0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gesture::tests::hand;
    use crate::ml::HandLandmark;

    #[test]
    fn test_idle_spin_accumulates() {
        let settings = GestureSettings::default();
        let mut orientation = SceneOrientation { yaw: 0.3, pitch: 0.1 };
        for _ in 0..200 {
            orientation.update(None, &settings);
        }
        assert!((orientation.yaw - (0.3 + 200.0 * 0.005)).abs() < 1e-4);
        assert_eq!(orientation.pitch, 0.1);
    }

    #[test]
    fn test_steer_moves_tenth_of_the_way() {
        let mut observation = hand(0.2, 0.3);
        observation.landmarks[landmark::PALM_CENTER] = HandLandmark { x: 1.0, y: 0.0, z: 0.0 };

        let mut orientation = SceneOrientation::default();
        orientation.steer(&observation, 0.1);
        assert!((orientation.yaw - 0.1).abs() < 1e-6);
        assert!((orientation.pitch - (-0.075)).abs() < 1e-6);
    }

    #[test]
    fn test_steer_converges_to_palm_target() {
        let mut observation = hand(0.2, 0.3);
        observation.landmarks[landmark::PALM_CENTER] = HandLandmark { x: 0.75, y: 0.25, z: 0.0 };

        let settings = GestureSettings::default();
        let mut orientation = SceneOrientation { yaw: 3.0, pitch: -1.0 };
        for _ in 0..300 {
            orientation.update(Some(&observation), &settings);
        }
        assert!((orientation.yaw - 0.5).abs() < 1e-3);
        assert!((orientation.pitch - (-0.375)).abs() < 1e-3);
    }

    #[test]
    fn test_identity_matrix_at_rest() {
        let matrix = SceneOrientation::default().matrix();
        assert!(matrix.abs_diff_eq(Mat4::IDENTITY, 1e-6));
    }
}
