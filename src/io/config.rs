use crate::error::{Error, Result};
use crate::scene::camera::Camera;
use crate::scene::texture::SamplerState;
use log::info;
use nalgebra::{Point3, Vector3};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub shader: ShaderConfig,
    #[serde(default)]
    pub sampler: SamplerState,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read '{}': {e}", path.display())))?;
        let config = Self::from_toml(&text)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::Config(e.to_string()))
    }
}

#[derive(Debug, Deserialize)]
pub struct RenderConfig {
    // --- Output ---
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_output")]
    pub output: PathBuf,

    // --- Frame Loop ---
    #[serde(default = "default_clear_color")]
    pub clear_color: [f32; 3],
    #[serde(default = "default_time_step")]
    pub time_step: f32,
    #[serde(default = "default_frames")]
    pub frames: u32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            output: default_output(),
            clear_color: default_clear_color(),
            time_step: default_time_step(),
            frames: default_frames(),
        }
    }
}

fn default_width() -> u32 {
    800
}
fn default_height() -> u32 {
    600
}
fn default_output() -> PathBuf {
    PathBuf::from("render.png")
}
fn default_clear_color() -> [f32; 3] {
    [0.1, 0.1, 0.1]
}
fn default_time_step() -> f32 {
    0.001
}
fn default_frames() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
pub struct CameraConfig {
    #[serde(default = "default_position")]
    pub position: [f32; 3],
    #[serde(default)]
    pub target: [f32; 3],
    #[serde(default = "default_up")]
    pub up: [f32; 3],
    /// Vertical field of view in degrees.
    #[serde(default = "default_fov")]
    pub fov: f32,
    #[serde(default = "default_near")]
    pub near: f32,
    #[serde(default = "default_far")]
    pub far: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            position: default_position(),
            target: [0.0, 0.0, 0.0],
            up: default_up(),
            fov: default_fov(),
            near: default_near(),
            far: default_far(),
        }
    }
}

impl CameraConfig {
    pub fn build(&self) -> Camera {
        Camera::new(
            Point3::from(self.position),
            Point3::from(self.target),
            Vector3::from(self.up),
            self.fov.to_radians(),
            self.near,
            self.far,
        )
    }
}

fn default_position() -> [f32; 3] {
    [0.0, 0.0, 1.5]
}
fn default_up() -> [f32; 3] {
    [0.0, 1.0, 0.0]
}
fn default_fov() -> f32 {
    60.0
}
fn default_near() -> f32 {
    0.1
}
fn default_far() -> f32 {
    100.0
}

#[derive(Debug, Default, Deserialize)]
pub struct ModelConfig {
    pub path: Option<PathBuf>,
    pub texture: Option<PathBuf>,
    #[serde(default)]
    pub auto_rotate: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct ShaderConfig {
    /// Fragment shader file; takes precedence over `preset`.
    pub fragment: Option<PathBuf>,
    pub preset: Option<String>,
}
