//! Fly camera for the path tracer.
//!
//! Orientation is yaw/pitch/roll composed in YXZ order; the camera looks down
//! its local -Z. The projection uses wgpu's 0..1 depth range directly.

mod input;

pub use input::{InputController, Key};

use std::f32::consts::{PI, TAU};

use glam::{EulerRot, Mat4, Quat, Vec3};

pub const DEFAULT_FOV_DEGREES: f32 = 60.0;
pub const DEFAULT_NEAR: f32 = 0.1;
pub const DEFAULT_FAR: f32 = 1000.0;

#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    position: Vec3,
    /// Radians, wrapped to [0, 2π).
    yaw: f32,
    /// Radians, clamped to [-π, π].
    pitch: f32,
    roll: f32,
    /// Vertical FOV in radians.
    fov: f32,
    aspect: f32,
    near: f32,
    far: f32,
    projection: Mat4,
}

impl Camera {
    pub fn new(width: u32, height: u32) -> Self {
        Self::with_position(width, height, Vec3::new(0.0, 0.0, 1.0))
    }

    pub fn with_position(width: u32, height: u32, position: Vec3) -> Self {
        let mut cam = Self {
            position,
            yaw: 0.0,
            pitch: 0.0,
            roll: 0.0,
            fov: DEFAULT_FOV_DEGREES.to_radians(),
            aspect: aspect_of(width, height),
            near: DEFAULT_NEAR,
            far: DEFAULT_FAR,
            projection: Mat4::IDENTITY,
        };
        cam.update_projection();
        cam
    }

    fn update_projection(&mut self) {
        self.projection = Mat4::perspective_rh(self.fov, self.aspect, self.near, self.far);
    }

    fn rotation(&self) -> Quat {
        Quat::from_euler(EulerRot::YXZ, self.yaw, self.pitch, self.roll)
    }

    /// Inverse of the camera's world transform `T * R`.
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::from_rotation_translation(self.rotation(), self.position).inverse()
    }

    pub fn projection_matrix(&self) -> Mat4 {
        self.projection
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view_matrix()
    }

    pub fn inverse_view_projection(&self) -> Mat4 {
        self.view_projection().inverse()
    }

    pub fn forward(&self) -> Vec3 {
        (self.rotation() * Vec3::NEG_Z).normalize()
    }

    /// Horizontal right vector; zero when looking straight up or down.
    pub fn right(&self) -> Vec3 {
        self.forward().cross(Vec3::Y).normalize_or_zero()
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }

    pub fn translate(&mut self, offset: Vec3) {
        self.position += offset;
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    pub fn roll(&self) -> f32 {
        self.roll
    }

    pub fn yaw_degrees(&self) -> f32 {
        self.yaw.to_degrees()
    }

    pub fn pitch_degrees(&self) -> f32 {
        self.pitch.to_degrees()
    }

    pub fn set_yaw_degrees(&mut self, degrees: f32) {
        self.yaw = degrees.to_radians().rem_euclid(TAU);
    }

    pub fn set_pitch_degrees(&mut self, degrees: f32) {
        self.pitch = degrees.to_radians().clamp(-PI, PI);
    }

    pub fn set_roll_degrees(&mut self, degrees: f32) {
        self.roll = degrees.to_radians();
    }

    pub fn add_yaw(&mut self, degrees: f32) {
        self.set_yaw_degrees(self.yaw_degrees() + degrees);
    }

    pub fn add_pitch(&mut self, degrees: f32) {
        self.set_pitch_degrees(self.pitch_degrees() + degrees);
    }

    pub fn fov_degrees(&self) -> f32 {
        self.fov.to_degrees()
    }

    pub fn set_fov_degrees(&mut self, degrees: f32) {
        self.fov = degrees.clamp(1.0, 179.0).to_radians();
        self.update_projection();
    }

    pub fn set_clip(&mut self, near: f32, far: f32) {
        self.near = near.max(1e-4);
        self.far = far.max(self.near * 2.0);
        self.update_projection();
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    pub fn set_aspect_ratio(&mut self, width: u32, height: u32) {
        self.aspect = aspect_of(width, height);
        self.update_projection();
    }
}

fn aspect_of(width: u32, height: u32) -> f32 {
    width.max(1) as f32 / height.max(1) as f32
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(1280, 720)
    }
}
