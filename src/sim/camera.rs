//! Perspective camera and screen shake

use glam::{Mat4, Vec2, Vec3};
use rand::Rng;

use super::scene::Ray;
use crate::config::CameraSettings;
use crate::consts::{SHAKE_DECAY, SHAKE_EPSILON};

const Z_NEAR: f32 = 0.1;
const Z_FAR: f32 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub position: Vec3,
    pub target: Vec3,
    /// Where shake returns to
    pub rest: Vec3,
    pub fov_y: f32,
    /// Viewport in pixels
    pub viewport: Vec2,
}

impl Camera {
    pub fn new(settings: &CameraSettings) -> Self {
        Self {
            position: settings.position,
            target: settings.target,
            rest: settings.position,
            fov_y: settings.fov_y_deg.to_radians(),
            viewport: Vec2::new(settings.viewport.0, settings.viewport.1),
        }
    }

    #[inline]
    pub fn aspect(&self) -> f32 {
        if self.viewport.y > 0.0 {
            self.viewport.x / self.viewport.y
        } else {
            1.0
        }
    }

    pub fn resize(&mut self, width: f32, height: f32) {
        self.viewport = Vec2::new(width.max(1.0), height.max(1.0));
    }

    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, Vec3::Y)
    }

    pub fn projection(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y, self.aspect(), Z_NEAR, Z_FAR)
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection() * self.view()
    }

    /// Ray through a normalized device coordinate (x right, y up, both in [-1, 1])
    pub fn ray_from_ndc(&self, ndc: Vec2) -> Ray {
        let inv = self.view_projection().inverse();
        let near = inv.project_point3(ndc.extend(0.0));
        let far = inv.project_point3(ndc.extend(1.0));
        Ray::new(near, far - near)
    }

    /// World point under `ndc` on the gameplay plane (z = 0)
    pub fn point_on_z_plane(&self, ndc: Vec2) -> Option<Vec3> {
        self.ray_from_ndc(ndc).intersect_z_plane(0.0)
    }

    /// World point to screen pixels (origin top-left)
    pub fn project_to_screen(&self, world: Vec3) -> Vec2 {
        let ndc = self.view_projection().project_point3(world);
        Vec2::new(
            (ndc.x * 0.5 + 0.5) * self.viewport.x,
            (-ndc.y * 0.5 + 0.5) * self.viewport.y,
        )
    }
}

/// Decaying positional jitter
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CameraShake {
    pub magnitude: f32,
}

impl CameraShake {
    /// Restart the shake at `magnitude`
    pub fn kick(&mut self, magnitude: f32) {
        self.magnitude = magnitude;
    }

    pub fn is_active(&self) -> bool {
        self.magnitude > 0.0
    }

    /// Jitter the camera around its rest position and decay one frame
    pub fn apply<R: Rng + ?Sized>(&mut self, camera: &mut Camera, rng: &mut R) {
        if self.magnitude <= 0.0 {
            return;
        }
        let jitter = Vec3::new(
            rng.random_range(-1.0..1.0),
            rng.random_range(-1.0..1.0),
            0.0,
        ) * self.magnitude;
        camera.position = camera.rest + jitter;

        self.magnitude *= SHAKE_DECAY;
        if self.magnitude < SHAKE_EPSILON {
            self.magnitude = 0.0;
            camera.position = camera.rest;
        }
    }

    pub fn reset(&mut self, camera: &mut Camera) {
        self.magnitude = 0.0;
        camera.position = camera.rest;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    fn camera() -> Camera {
        Camera::new(&CameraSettings::default())
    }

    #[test]
    fn test_center_ray_hits_origin() {
        let cam = camera();
        let p = cam.point_on_z_plane(Vec2::ZERO).unwrap();
        assert!(p.length() < 1e-3, "got {p:?}");
    }

    #[test]
    fn test_unproject_then_project() {
        let cam = camera();
        let ndc = Vec2::new(0.5, -0.25);
        let world = cam.point_on_z_plane(ndc).unwrap();
        assert!(world.z.abs() < 1e-4);
        assert!(world.x > 0.0 && world.y < 0.0);

        let screen = cam.project_to_screen(world);
        let expected = Vec2::new(0.75 * 1280.0, 0.625 * 720.0);
        assert!((screen - expected).length() < 0.5, "got {screen:?}");
    }

    #[test]
    fn test_shake_decays_to_rest() {
        let mut cam = camera();
        let mut shake = CameraShake::default();
        let mut rng = Pcg32::seed_from_u64(7);
        shake.kick(1.2);
        assert_eq!(shake.magnitude, 1.2);

        shake.apply(&mut cam, &mut rng);
        assert!((shake.magnitude - 1.08).abs() < 1e-5);
        assert!((cam.position - cam.rest).length() <= 1.2 * 2f32.sqrt());

        for _ in 0..200 {
            shake.apply(&mut cam, &mut rng);
        }
        assert!(!shake.is_active());
        assert_eq!(cam.position, cam.rest);
    }

    #[test]
    fn test_kick_sets_magnitude() {
        let mut shake = CameraShake::default();
        shake.kick(1.2);
        // The latest hit wins, even when it is weaker
        shake.kick(0.1);
        assert_eq!(shake.magnitude, 0.1);
        shake.kick(1.2);
        assert_eq!(shake.magnitude, 1.2);
    }
}
