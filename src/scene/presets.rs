//! Built-in shader sources.
//!
//! Stored presets are `(title, built_in, source)` records; the render context
//! only ever consumes `source`.

/// The fixed vertex stage every program is linked against.
pub const VERTEX_SHADER: &str = include_str!("../../assets/shaders/basic.vs.glsl");

/// Fragment stage used until the user supplies another.
pub const DEFAULT_FRAGMENT_SHADER: &str = include_str!("../../assets/shaders/phong.fs.glsl");

pub const DEFAULT_PRESET: &str = "phong";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShaderPreset {
    /// Lookup key used on the command line and in config files.
    pub name: &'static str,
    pub title: &'static str,
    pub built_in: bool,
    pub source: &'static str,
}

pub const BUILT_IN: [ShaderPreset; 5] = [
    ShaderPreset {
        name: "phong",
        title: "Phong & Rim",
        built_in: true,
        source: DEFAULT_FRAGMENT_SHADER,
    },
    ShaderPreset {
        name: "normals",
        title: "Normals",
        built_in: true,
        source: include_str!("../../assets/shaders/normals.fs.glsl"),
    },
    ShaderPreset {
        name: "moving_light",
        title: "Moving Light",
        built_in: true,
        source: include_str!("../../assets/shaders/moving_light.fs.glsl"),
    },
    ShaderPreset {
        name: "sinusoid",
        title: "Electric Sinusoid",
        built_in: true,
        source: include_str!("../../assets/shaders/sinusoid.fs.glsl"),
    },
    ShaderPreset {
        name: "tiled_texture",
        title: "Tiled Texture",
        built_in: true,
        source: include_str!("../../assets/shaders/tiled_texture.fs.glsl"),
    },
];

pub fn find(name: &str) -> Option<ShaderPreset> {
    BUILT_IN.iter().copied().find(|p| p.name == name)
}
