use std::fs;
use std::io;
use std::path::Path;

use aperture_shared::config::{sanitize_f32, PortalConfig};
use serde::{Deserialize, Serialize};

const MIN_RECURSION_DEPTH: u32 = 0;
const MAX_RECURSION_DEPTH: u32 = 16;
const MIN_MOUSE_SENSITIVITY: f32 = 0.0001;
const MAX_MOUSE_SENSITIVITY: f32 = 0.05;
const MIN_MOVE_SPEED: f32 = 0.1;
const MAX_MOVE_SPEED: f32 = 50.0;
const MIN_FOV: f32 = 30.0;
const MAX_FOV: f32 = 120.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortalQuality {
    /// Sky, world and rims once, no view through the portals.
    Flat,
    /// Stencil-partitioned recursive views.
    #[default]
    Recursive,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientSettings {
    #[serde(default = "default_recursion_depth")]
    pub recursion_depth: u32,
    #[serde(default)]
    pub portal_quality: PortalQuality,
    #[serde(default = "default_mouse_sensitivity")]
    pub mouse_sensitivity: f32,
    #[serde(default = "default_move_speed")]
    pub move_speed: f32,
    #[serde(default = "default_fov")]
    pub fov: f32,
    #[serde(default)]
    pub debug: bool,
    #[serde(default)]
    pub portal: PortalConfig,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            recursion_depth: default_recursion_depth(),
            portal_quality: PortalQuality::default(),
            mouse_sensitivity: default_mouse_sensitivity(),
            move_speed: default_move_speed(),
            fov: default_fov(),
            debug: false,
            portal: PortalConfig::default(),
        }
    }
}

impl ClientSettings {
    pub fn sanitize(mut self) -> Self {
        self.recursion_depth = self
            .recursion_depth
            .clamp(MIN_RECURSION_DEPTH, MAX_RECURSION_DEPTH);
        self.mouse_sensitivity = sanitize_f32(
            self.mouse_sensitivity,
            MIN_MOUSE_SENSITIVITY,
            MAX_MOUSE_SENSITIVITY,
            default_mouse_sensitivity(),
        );
        self.move_speed = sanitize_f32(
            self.move_speed,
            MIN_MOVE_SPEED,
            MAX_MOVE_SPEED,
            default_move_speed(),
        );
        self.fov = sanitize_f32(self.fov, MIN_FOV, MAX_FOV, default_fov());
        self.portal = self.portal.sanitize();
        self
    }

    pub fn load(path: &Path) -> io::Result<Self> {
        let contents = fs::read_to_string(path)?;
        let parsed = toml::from_str::<Self>(&contents).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("failed to deserialize settings: {e}"),
            )
        })?;
        Ok(parsed.sanitize())
    }

    pub fn save(&self, path: &Path) -> io::Result<()> {
        let settings = self.clone().sanitize();
        let serialized = toml::to_string_pretty(&settings).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("failed to serialize settings: {e}"),
            )
        })?;
        fs::write(path, serialized)
    }
}

fn default_recursion_depth() -> u32 {
    4
}

fn default_mouse_sensitivity() -> f32 {
    0.004
}

fn default_move_speed() -> f32 {
    5.0
}

fn default_fov() -> f32 {
    70.0
}
