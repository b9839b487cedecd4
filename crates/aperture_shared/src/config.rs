use serde::{Deserialize, Serialize};

const MIN_RADIUS: f32 = 0.05;
const MAX_RADIUS: f32 = 10.0;
const MIN_FRAME_THICKNESS: f32 = 0.001;
const MAX_FRAME_THICKNESS: f32 = 1.0;
const MIN_SURFACE_OFFSET: f32 = 0.0001;
const MAX_SURFACE_OFFSET: f32 = 0.5;
const MIN_PLACEMENT_SAMPLES: u32 = 3;
const MAX_PLACEMENT_SAMPLES: u32 = 64;
const MIN_PLACEMENT_PROBE: f32 = 0.001;
const MAX_PLACEMENT_PROBE: f32 = 1.0;
const MIN_NEAR_CLIP_EPSILON: f32 = 0.0;
const MAX_NEAR_CLIP_EPSILON: f32 = 1.0;

/// Geometry and tolerances shared by every portal in a level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PortalConfig {
    #[serde(default = "default_radius_x")]
    pub radius_x: f32,
    #[serde(default = "default_radius_y")]
    pub radius_y: f32,
    #[serde(default = "default_frame_thickness")]
    pub frame_thickness: f32,
    /// Distance the aperture floats in front of the surface it sits on.
    #[serde(default = "default_surface_offset")]
    pub surface_offset: f32,
    #[serde(default = "default_placement_samples")]
    pub placement_samples: u32,
    /// How far outside the surface placement probes start.
    #[serde(default = "default_placement_probe")]
    pub placement_probe: f32,
    /// Below this camera-to-plane distance the oblique near plane is skipped.
    #[serde(default = "default_near_clip_epsilon")]
    pub near_clip_epsilon: f32,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            radius_x: default_radius_x(),
            radius_y: default_radius_y(),
            frame_thickness: default_frame_thickness(),
            surface_offset: default_surface_offset(),
            placement_samples: default_placement_samples(),
            placement_probe: default_placement_probe(),
            near_clip_epsilon: default_near_clip_epsilon(),
        }
    }
}

impl PortalConfig {
    pub fn sanitize(mut self) -> Self {
        self.radius_x = sanitize_f32(self.radius_x, MIN_RADIUS, MAX_RADIUS, default_radius_x());
        self.radius_y = sanitize_f32(self.radius_y, MIN_RADIUS, MAX_RADIUS, default_radius_y());
        self.frame_thickness = sanitize_f32(
            self.frame_thickness,
            MIN_FRAME_THICKNESS,
            MAX_FRAME_THICKNESS,
            default_frame_thickness(),
        );
        self.surface_offset = sanitize_f32(
            self.surface_offset,
            MIN_SURFACE_OFFSET,
            MAX_SURFACE_OFFSET,
            default_surface_offset(),
        );
        self.placement_samples = self
            .placement_samples
            .clamp(MIN_PLACEMENT_SAMPLES, MAX_PLACEMENT_SAMPLES);
        self.placement_probe = sanitize_f32(
            self.placement_probe,
            MIN_PLACEMENT_PROBE,
            MAX_PLACEMENT_PROBE,
            default_placement_probe(),
        );
        self.near_clip_epsilon = sanitize_f32(
            self.near_clip_epsilon,
            MIN_NEAR_CLIP_EPSILON,
            MAX_NEAR_CLIP_EPSILON,
            default_near_clip_epsilon(),
        );
        self
    }
}

/// Clamps `value` into `[min, max]`, replacing NaN and infinities with `fallback`.
pub fn sanitize_f32(value: f32, min: f32, max: f32, fallback: f32) -> f32 {
    if value.is_finite() {
        value.clamp(min, max)
    } else {
        fallback
    }
}

fn default_radius_x() -> f32 {
    0.45
}

fn default_radius_y() -> f32 {
    0.9
}

fn default_frame_thickness() -> f32 {
    0.05
}

fn default_surface_offset() -> f32 {
    0.02
}

fn default_placement_samples() -> u32 {
    8
}

fn default_placement_probe() -> f32 {
    0.1
}

fn default_near_clip_epsilon() -> f32 {
    0.1
}

#[cfg(test)]
mod tests {
    use super::PortalConfig;

    #[test]
    fn sanitize_clamps_out_of_range_values() {
        let config = PortalConfig {
            radius_x: -1.0,
            radius_y: f32::NAN,
            placement_samples: 1,
            surface_offset: 5.0,
            ..PortalConfig::default()
        }
        .sanitize();

        assert_eq!(config.radius_x, 0.05);
        assert_eq!(config.radius_y, 0.9);
        assert_eq!(config.placement_samples, 3);
        assert_eq!(config.surface_offset, 0.5);
    }

    #[test]
    fn defaults_are_already_sane() {
        let config = PortalConfig::default();
        assert_eq!(config.clone().sanitize(), config);
    }
}
