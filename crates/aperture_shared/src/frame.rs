use glam::{Mat3, Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Rotation stored as yaw/pitch/roll and applied in YXZ order, so the
/// resulting matrix is `Ry(yaw) * Rx(pitch) * Rz(roll)`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EulerYxz {
    pub yaw: f32,
    pub pitch: f32,
    pub roll: f32,
}

impl EulerYxz {
    pub const fn new(yaw: f32, pitch: f32, roll: f32) -> Self {
        Self { yaw, pitch, roll }
    }

    pub fn to_mat3(self) -> Mat3 {
        Mat3::from_rotation_y(self.yaw)
            * Mat3::from_rotation_x(self.pitch)
            * Mat3::from_rotation_z(self.roll)
    }

    /// The same angles negated and applied in ZXY order.
    pub fn inverse_mat3(self) -> Mat3 {
        Mat3::from_rotation_z(-self.roll)
            * Mat3::from_rotation_x(-self.pitch)
            * Mat3::from_rotation_y(-self.yaw)
    }

    /// Recovers the angles from an orthonormal basis. When the forward axis
    /// is vertical, yaw and roll are indistinguishable and roll is set to 0.
    pub fn from_mat3(rotation: Mat3) -> Self {
        let forward = rotation.z_axis;
        let horizontal = forward.x.hypot(forward.z);
        let pitch = (-forward.y).atan2(horizontal);
        if horizontal > 1.0e-6 {
            Self {
                yaw: forward.x.atan2(forward.z),
                pitch,
                roll: rotation.x_axis.y.atan2(rotation.y_axis.y),
            }
        } else {
            Self {
                yaw: (-rotation.x_axis.z).atan2(rotation.x_axis.x),
                pitch,
                roll: 0.0,
            }
        }
    }
}

/// Position plus orientation of a body or camera. Bodies look down their
/// local -Z axis with +Y up.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub position: Vec3,
    pub orientation: Quat,
}

impl Default for Pose {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            orientation: Quat::IDENTITY,
        }
    }
}

impl Pose {
    pub fn new(position: Vec3, orientation: Quat) -> Self {
        Self {
            position,
            orientation,
        }
    }

    /// Builds a pose at `position` looking along `forward`, rolled so that
    /// its up vector lies as close to `up` as possible.
    pub fn look_to(position: Vec3, forward: Vec3, up: Vec3) -> Self {
        let forward = safe_normalize(forward, Vec3::NEG_Z);
        let mut right = forward.cross(up).normalize_or_zero();
        if right.length_squared() < 1.0e-6 {
            right = forward.any_orthonormal_vector();
        }
        let up = right.cross(forward);
        let orientation = Quat::from_mat3(&Mat3::from_cols(right, up, -forward)).normalize();
        Self {
            position,
            orientation,
        }
    }

    pub fn forward(&self) -> Vec3 {
        self.orientation * Vec3::NEG_Z
    }

    pub fn up(&self) -> Vec3 {
        self.orientation * Vec3::Y
    }

    pub fn right(&self) -> Vec3 {
        self.orientation * Vec3::X
    }
}

/// Local coordinate system of a portal. `forward` is the outward surface
/// normal; `left` and `up` span the aperture plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PortalFrame {
    position: Vec3,
    rotation: EulerYxz,
    basis: Mat3,
    inverse: Mat3,
}

impl PortalFrame {
    pub fn new(position: Vec3, rotation: EulerYxz) -> Self {
        Self {
            position,
            rotation,
            basis: rotation.to_mat3(),
            inverse: rotation.inverse_mat3(),
        }
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn rotation(&self) -> EulerYxz {
        self.rotation
    }

    pub fn basis(&self) -> Mat3 {
        self.basis
    }

    pub fn forward(&self) -> Vec3 {
        self.basis.z_axis
    }

    pub fn up(&self) -> Vec3 {
        self.basis.y_axis
    }

    pub fn left(&self) -> Vec3 {
        self.basis.x_axis
    }

    pub fn to_local(&self, direction: Vec3) -> Vec3 {
        self.inverse * direction
    }

    pub fn to_world(&self, direction: Vec3) -> Vec3 {
        self.basis * direction
    }

    /// Same frame moved along its own forward axis.
    pub fn offset_forward(&self, distance: f32) -> Self {
        Self {
            position: self.position + self.forward() * distance,
            ..*self
        }
    }
}

/// Maps points, directions and poses from the space in front of a source
/// portal into the space in front of its linked destination portal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PortalTransform {
    source: PortalFrame,
    dest: PortalFrame,
}

impl PortalTransform {
    pub fn between(source: &PortalFrame, dest: &PortalFrame) -> Self {
        Self {
            source: *source,
            dest: *dest,
        }
    }

    pub fn inverse(&self) -> Self {
        Self {
            source: self.dest,
            dest: self.source,
        }
    }

    pub fn dest(&self) -> &PortalFrame {
        &self.dest
    }

    pub fn point(&self, point: Vec3) -> Vec3 {
        self.direction(point - self.source.position) + self.dest.position
    }

    /// Rotation-only part of the transform: into the source frame, half
    /// turn about the portal up axis, out of the destination frame.
    pub fn direction(&self, direction: Vec3) -> Vec3 {
        let mut local = self.source.to_local(direction);
        local.x = -local.x;
        local.z = -local.z;
        self.dest.to_world(local)
    }

    pub fn velocity(&self, velocity: Vec3) -> Vec3 {
        self.direction(velocity)
    }

    /// Orientation goes through the forward/up pair and is rebuilt with a
    /// look-at; composing Euler angles across frames does not commute.
    pub fn pose(&self, pose: &Pose) -> Pose {
        let position = self.point(pose.position);
        let forward = self.direction(pose.forward());
        let up = self.direction(pose.up());
        Pose::look_to(position, forward, up)
    }
}

pub fn safe_normalize(v: Vec3, fallback: Vec3) -> Vec3 {
    let n = v.normalize_or_zero();
    if n.length_squared() > 0.0 {
        n
    } else {
        fallback
    }
}
