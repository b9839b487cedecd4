use glam::{Mat4, Vec3, Vec4};

use crate::frame::Pose;

/// Perspective camera with a right-handed view space and `[0, 1]` clip
/// depth.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub pose: Pose,
    pub fov: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    pub near_clip: NearClip,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NearClip {
    Standard,
    /// Near plane replaced by this camera-space plane.
    Oblique(Vec4),
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            pose: Pose::default(),
            fov: 70.0_f32.to_radians(),
            aspect: 16.0 / 9.0,
            near: 0.01,
            far: 1000.0,
            near_clip: NearClip::Standard,
        }
    }
}

impl Camera {
    pub fn new(pose: Pose, fov: f32, aspect: f32, near: f32, far: f32) -> Self {
        Self {
            pose,
            fov,
            aspect,
            near,
            far,
            near_clip: NearClip::Standard,
        }
    }

    pub fn position(&self) -> Vec3 {
        self.pose.position
    }

    pub fn forward_direction(&self) -> Vec3 {
        self.pose.forward()
    }

    /// Same lens placed at `pose`, with any oblique near plane dropped.
    pub fn with_pose(&self, pose: Pose) -> Self {
        Self {
            pose,
            near_clip: NearClip::Standard,
            ..*self
        }
    }

    /// Rotation-only copy used for drawing the sky.
    pub fn rotation_only(&self) -> Self {
        self.with_pose(Pose::new(Vec3::ZERO, self.pose.orientation))
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_to_rh(self.pose.position, self.pose.forward(), self.pose.up())
    }

    pub fn standard_projection(&self) -> Mat4 {
        Mat4::perspective_rh(
            self.fov,
            self.aspect.max(0.0001),
            self.near.max(0.0001),
            self.far.max(self.near + 0.0001),
        )
    }

    pub fn projection_matrix(&self) -> Mat4 {
        let projection = self.standard_projection();
        match self.near_clip {
            NearClip::Standard => projection,
            NearClip::Oblique(plane) => apply_oblique_clip(projection, plane),
        }
    }

    pub fn view_projection_matrix(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }
}

/// World-space plane given by a normal pointing toward the volume that must
/// stay visible and a point on the plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipPlane {
    pub normal: Vec3,
    pub point: Vec3,
}

impl ClipPlane {
    pub fn new(normal: Vec3, point: Vec3) -> Self {
        Self {
            normal: normal.normalize_or_zero(),
            point,
        }
    }

    pub fn to_vec4(&self) -> Vec4 {
        self.normal.extend(-self.normal.dot(self.point))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObliqueClipParams {
    /// Closer than this, the plane is treated as the ordinary near plane.
    pub epsilon: f32,
    /// Floor applied to the near distance when the skew is skipped.
    pub min_near: f32,
}

/// Returns `camera` with its near plane moved onto `plane`, or `None` when
/// the camera sits on the visible side of the plane and nothing behind it can
/// be seen through the portal.
pub fn clip_to_plane(
    camera: &Camera,
    plane: ClipPlane,
    params: ObliqueClipParams,
) -> Option<Camera> {
    let view = camera.view_matrix();
    let plane_camera = view.inverse().transpose() * plane.to_vec4();

    // The view matrix is rigid, so w is the signed distance from the eye.
    let distance = plane_camera.w;
    if distance > 0.0 {
        return None;
    }

    let mut clipped = *camera;
    if distance > -params.epsilon {
        clipped.near = camera.near.max(params.min_near);
        clipped.near_clip = NearClip::Standard;
    } else {
        clipped.near_clip = NearClip::Oblique(plane_camera);
    }
    Some(clipped)
}

/// Replaces the depth row of `proj` so that clip depth 0 lies on
/// `clip_plane_camera` and depth 1 still passes through the far frustum
/// corner nearest the plane's positive side.
pub fn apply_oblique_clip(proj: Mat4, clip_plane_camera: Vec4) -> Mat4 {
    let q = proj.inverse()
        * Vec4::new(
            clip_plane_camera.x.signum(),
            clip_plane_camera.y.signum(),
            1.0,
            1.0,
        );
    let denom = clip_plane_camera.dot(q);
    if denom <= 1.0e-6 {
        return proj;
    }

    let c = clip_plane_camera / denom;
    let mut m = proj.to_cols_array_2d();
    m[0][2] = c.x;
    m[1][2] = c.y;
    m[2][2] = c.z;
    m[3][2] = c.w;
    Mat4::from_cols_array_2d(&m)
}

#[cfg(test)]
mod tests {
    use glam::{Vec3, Vec4};

    use super::{clip_to_plane, Camera, ClipPlane, NearClip, ObliqueClipParams};
    use crate::frame::Pose;

    const PARAMS: ObliqueClipParams = ObliqueClipParams {
        epsilon: 0.1,
        min_near: 0.01,
    };

    fn camera_at_origin() -> Camera {
        Camera::new(
            Pose::look_to(Vec3::ZERO, Vec3::NEG_Z, Vec3::Y),
            70.0_f32.to_radians(),
            1.0,
            0.1,
            100.0,
        )
    }

    fn clip_depth(camera: &Camera, point: Vec3) -> f32 {
        let clip = camera.view_projection_matrix() * point.extend(1.0);
        clip.z / clip.w
    }

    fn is_visible(camera: &Camera, point: Vec3) -> bool {
        let clip: Vec4 = camera.view_projection_matrix() * point.extend(1.0);
        clip.w > 0.0
            && clip.x.abs() <= clip.w
            && clip.y.abs() <= clip.w
            && clip.z >= 0.0
            && clip.z <= clip.w
    }

    #[test]
    fn oblique_plane_clips_geometry_behind_portal() {
        let camera = camera_at_origin();
        // Portal plane at z = -5, visible side further down -Z.
        let plane = ClipPlane::new(Vec3::NEG_Z, Vec3::new(0.0, 0.0, -5.0));
        let clipped = clip_to_plane(&camera, plane, PARAMS).expect("camera behind plane");
        assert!(matches!(clipped.near_clip, NearClip::Oblique(_)));

        // A triangle between the eye and the plane is fully clipped even
        // though the unmodified frustum would show it.
        for vertex in [
            Vec3::new(-0.5, -0.5, -3.0),
            Vec3::new(0.5, -0.5, -3.0),
            Vec3::new(0.0, 0.5, -4.9),
        ] {
            assert!(is_visible(&camera, vertex));
            assert!(!is_visible(&clipped, vertex));
        }

        for point in [
            Vec3::new(0.0, 0.0, -5.1),
            Vec3::new(0.5, -0.5, -10.0),
            Vec3::new(-2.0, 1.0, -40.0),
            Vec3::new(0.0, 0.0, -99.0),
        ] {
            assert!(is_visible(&camera, point));
            assert!(is_visible(&clipped, point), "{point:?} should stay visible");
        }
    }

    #[test]
    fn plane_points_map_to_zero_depth() {
        let camera = camera_at_origin();
        let plane = ClipPlane::new(Vec3::new(0.3, 0.0, -1.0), Vec3::new(0.0, 0.0, -6.0));
        let clipped = clip_to_plane(&camera, plane, PARAMS).expect("camera behind plane");
        let on_plane = Vec3::new(0.0, 0.0, -6.0);
        assert!(clip_depth(&clipped, on_plane).abs() < 1.0e-4);
    }

    #[test]
    fn camera_on_visible_side_is_rejected() {
        let camera = camera_at_origin();
        let plane = ClipPlane::new(Vec3::Z, Vec3::new(0.0, 0.0, -5.0));
        assert!(clip_to_plane(&camera, plane, PARAMS).is_none());
    }

    #[test]
    fn plane_close_to_eye_keeps_near_above_floor() {
        let camera = camera_at_origin();
        let plane = ClipPlane::new(Vec3::NEG_Z, Vec3::new(0.0, 0.0, -0.05));
        let clipped = clip_to_plane(&camera, plane, PARAMS).expect("camera behind plane");
        assert_eq!(clipped.near_clip, NearClip::Standard);
        assert_eq!(clipped.near, camera.near);
        assert_eq!(clipped.projection_matrix(), camera.projection_matrix());
    }

    #[test]
    fn plane_close_to_eye_raises_near_to_floor() {
        let mut camera = camera_at_origin();
        camera.near = 0.001;
        let plane = ClipPlane::new(Vec3::NEG_Z, Vec3::new(0.0, 0.0, -0.05));
        let clipped = clip_to_plane(&camera, plane, PARAMS).expect("camera behind plane");
        assert_eq!(clipped.near_clip, NearClip::Standard);
        assert_eq!(clipped.near, PARAMS.min_near);
    }

    #[test]
    fn sky_camera_keeps_rotation_only() {
        let mut camera = camera_at_origin();
        camera.pose = Pose::look_to(Vec3::new(4.0, 2.0, 1.0), Vec3::X, Vec3::Y);
        let sky = camera.rotation_only();
        assert_eq!(sky.position(), Vec3::ZERO);
        assert!(sky.forward_direction().abs_diff_eq(Vec3::X, 1.0e-5));
    }
}
