//! Fixed perspective camera looking at the tree

use glam::{Mat4, Vec3};

/// Perspective camera
#[derive(Clone, Copy, Debug)]
pub struct SceneCamera {
    /// Eye position
    pub position: Vec3,
    /// Point looked at
    pub target: Vec3,
    /// Vertical field of view in radians
    fov: f32,
    /// Aspect ratio (width/height) for projection
    aspect: f32,
    near: f32,
    far: f32,
}

impl SceneCamera {
    /// Camera at `position` looking down -Z
    pub fn new(position: Vec3, fov_degrees: f32, aspect: f32) -> Self {
        Self {
            position,
            target: Vec3::new(position.x, position.y, position.z - 1.0),
            fov: fov_degrees.to_radians(),
            aspect,
            near: 0.1,
            far: 1000.0,
        }
    }

    /// Get the view matrix
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, Vec3::Y)
    }

    /// Get the projection matrix
    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov, self.aspect, self.near, self.far)
    }

    /// Get combined view-projection matrix
    pub fn view_projection_matrix(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// Update aspect ratio on resize
    pub fn set_aspect(&mut self, width: u32, height: u32) {
        self.aspect = width.max(1) as f32 / height.max(1) as f32;
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec4;

    fn project(camera: &SceneCamera, point: Vec3) -> Vec3 {
        let clip = camera.view_projection_matrix() * Vec4::new(point.x, point.y, point.z, 1.0);
        clip.truncate() / clip.w
    }

    #[test]
    fn test_point_ahead_projects_to_center() {
        let camera = SceneCamera::new(Vec3::new(0.0, 2.0, 50.0), 50.0, 16.0 / 9.0);
        let ndc = project(&camera, Vec3::new(0.0, 2.0, 0.0));
        assert!(ndc.x.abs() < 1e-5 && ndc.y.abs() < 1e-5);
        assert!(ndc.z > 0.0 && ndc.z < 1.0);
    }

    #[test]
    fn test_focus_photo_in_front_of_tree() {
        let camera = SceneCamera::new(Vec3::new(0.0, 2.0, 50.0), 50.0, 1.0);
        let photo = project(&camera, Vec3::new(0.0, 2.0, 35.0));
        let tree = project(&camera, Vec3::new(0.0, 2.0, 0.0));
        assert!(photo.z < tree.z);
    }

    #[test]
    fn test_resize_updates_aspect() {
        let mut camera = SceneCamera::new(Vec3::ZERO, 50.0, 1.0);
        camera.set_aspect(1920, 1080);
        assert!((camera.aspect() - 16.0 / 9.0).abs() < 1e-6);
        camera.set_aspect(0, 0);
        assert_eq!(camera.aspect(), 1.0);
    }
}
