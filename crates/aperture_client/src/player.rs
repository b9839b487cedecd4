use aperture_shared::frame::Pose;
use aperture_shared::physics::RigidBody;
use aperture_shared::projection::Camera;
use glam::Vec3;
use winit::keyboard::KeyCode;

use crate::input::InputState;
use crate::settings::ClientSettings;

const MAX_PITCH: f32 = 89.0_f32.to_radians();
const NEAR: f32 = 0.01;
const FAR: f32 = 1000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlayerMode {
    /// Drives the physics body.
    #[default]
    Play,
    /// Free-flying camera; the body is left where it is.
    Edit,
}

#[derive(Debug, Clone)]
pub struct Player {
    pub yaw: f32,
    pub pitch: f32,
    pub mode: PlayerMode,
    /// Eye position used while in edit mode.
    pub edit_position: Vec3,
}

impl Default for Player {
    fn default() -> Self {
        Self {
            yaw: 0.0,
            pitch: 0.0,
            mode: PlayerMode::Play,
            edit_position: Vec3::ZERO,
        }
    }
}

impl Player {
    pub fn facing(forward: Vec3) -> Self {
        let mut player = Self::default();
        player.look_along(forward);
        player
    }

    pub fn update_look(&mut self, input: &InputState, look_sensitivity: f32) {
        self.yaw += input.mouse_delta.x * look_sensitivity;
        self.pitch -= input.mouse_delta.y * look_sensitivity;
        self.pitch = self.pitch.clamp(-MAX_PITCH, MAX_PITCH);
    }

    pub fn forward(&self) -> Vec3 {
        Vec3::new(
            self.yaw.cos() * self.pitch.cos(),
            self.pitch.sin(),
            self.yaw.sin() * self.pitch.cos(),
        )
        .normalize_or_zero()
    }

    pub fn horizontal_movement_dir(&self, input: &InputState) -> Vec3 {
        let forward = Vec3::new(self.yaw.cos(), 0.0, self.yaw.sin()).normalize_or_zero();
        let right = Vec3::new(-forward.z, 0.0, forward.x);

        let mut dir = Vec3::ZERO;
        if input.is_pressed(KeyCode::KeyW) {
            dir += forward;
        }
        if input.is_pressed(KeyCode::KeyS) {
            dir -= forward;
        }
        if input.is_pressed(KeyCode::KeyD) {
            dir += right;
        }
        if input.is_pressed(KeyCode::KeyA) {
            dir -= right;
        }

        if dir.length_squared() > 0.0 {
            dir.normalize()
        } else {
            Vec3::ZERO
        }
    }

    pub fn toggle_mode(&mut self, body_position: Vec3) {
        self.mode = match self.mode {
            PlayerMode::Play => {
                self.edit_position = body_position;
                PlayerMode::Edit
            }
            PlayerMode::Edit => PlayerMode::Play,
        };
    }

    /// Applies one frame of input. In play mode the body turns with the view
    /// and WASD sets its horizontal velocity; vertical velocity is untouched.
    pub fn drive<B: RigidBody>(
        &mut self,
        body: &mut B,
        input: &InputState,
        settings: &ClientSettings,
        dt: f32,
    ) {
        self.update_look(input, settings.mouse_sensitivity);
        let dir = self.horizontal_movement_dir(input);

        match self.mode {
            PlayerMode::Play => {
                let pose = body.pose();
                body.set_pose(Pose::look_to(pose.position, self.forward(), Vec3::Y));
                if dir != Vec3::ZERO {
                    let velocity = body.linear_velocity();
                    let horizontal = dir * settings.move_speed;
                    body.set_linear_velocity(Vec3::new(horizontal.x, velocity.y, horizontal.z));
                }
            }
            PlayerMode::Edit => {
                let mut motion = dir;
                if input.is_pressed(KeyCode::Space) {
                    motion += Vec3::Y;
                }
                if input.is_pressed(KeyCode::ShiftLeft) {
                    motion -= Vec3::Y;
                }
                self.edit_position += motion.normalize_or_zero() * settings.move_speed * dt;
            }
        }
    }

    /// Re-derives yaw and pitch from a pose the physics side moved, such as
    /// after a teleport. Roll is dropped.
    pub fn sync_from_pose(&mut self, pose: &Pose) {
        self.look_along(pose.forward());
    }

    fn look_along(&mut self, forward: Vec3) {
        let forward = forward.normalize_or_zero();
        if forward == Vec3::ZERO {
            return;
        }
        self.pitch = forward.y.clamp(-1.0, 1.0).asin().clamp(-MAX_PITCH, MAX_PITCH);
        if forward.x.abs() > 1.0e-6 || forward.z.abs() > 1.0e-6 {
            self.yaw = forward.z.atan2(forward.x);
        }
    }

    pub fn eye_pose(&self, body_pose: &Pose) -> Pose {
        let position = match self.mode {
            PlayerMode::Play => body_pose.position,
            PlayerMode::Edit => self.edit_position,
        };
        Pose::look_to(position, self.forward(), Vec3::Y)
    }

    pub fn camera(&self, body_pose: &Pose, settings: &ClientSettings, aspect: f32) -> Camera {
        Camera::new(
            self.eye_pose(body_pose),
            settings.fov.to_radians(),
            aspect,
            NEAR,
            FAR,
        )
    }
}

#[cfg(test)]
mod tests {
    use std::f32::consts::FRAC_PI_2;

    use aperture_shared::frame::Pose;
    use aperture_shared::physics::RigidBody;
    use glam::{Vec2, Vec3};
    use winit::keyboard::KeyCode;

    use super::{Player, PlayerMode};
    use crate::input::InputState;
    use crate::sandbox::SandboxBody;
    use crate::settings::ClientSettings;

    #[test]
    fn pitch_is_clamped_short_of_vertical() {
        let mut player = Player::default();
        let mut input = InputState::default();
        input.mouse_delta = Vec2::new(0.0, -10_000.0);
        player.update_look(&input, 0.004);
        assert!(player.pitch < FRAC_PI_2);
        assert!(player.forward().y > 0.99);
    }

    #[test]
    fn play_mode_sets_horizontal_velocity_only() {
        let settings = ClientSettings::default();
        let mut player = Player::facing(Vec3::X);
        let mut body = SandboxBody::new(Pose::default());
        body.set_linear_velocity(Vec3::new(0.0, -2.0, 0.0));
        let mut input = InputState::default();
        input.press_key(KeyCode::KeyW);

        player.drive(&mut body, &input, &settings, 1.0 / 60.0);

        assert!(body
            .linear_velocity()
            .abs_diff_eq(Vec3::new(settings.move_speed, -2.0, 0.0), 1.0e-4));
        assert!(body.pose().forward().abs_diff_eq(Vec3::X, 1.0e-5));
    }

    #[test]
    fn edit_mode_leaves_body_alone() {
        let settings = ClientSettings::default();
        let mut player = Player::facing(Vec3::X);
        let mut body = SandboxBody::new(Pose::default());
        player.toggle_mode(body.pose().position);
        assert_eq!(player.mode, PlayerMode::Edit);

        let mut input = InputState::default();
        input.press_key(KeyCode::KeyW);
        input.press_key(KeyCode::Space);
        player.drive(&mut body, &input, &settings, 0.5);

        assert_eq!(body.linear_velocity(), Vec3::ZERO);
        assert_eq!(body.pose(), Pose::default());
        let expected = Vec3::new(1.0, 1.0, 0.0).normalize() * settings.move_speed * 0.5;
        let eye = player.eye_pose(&body.pose());
        assert!(eye.position.abs_diff_eq(expected, 1.0e-4));
    }

    #[test]
    fn sync_from_pose_follows_new_forward() {
        let mut player = Player::facing(Vec3::NEG_Z);
        let pose = Pose::look_to(Vec3::ZERO, Vec3::new(-1.0, 0.0, 0.0), Vec3::Y);
        player.sync_from_pose(&pose);
        assert!(player.forward().abs_diff_eq(Vec3::NEG_X, 1.0e-5));
    }
}
