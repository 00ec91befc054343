pub mod backend;
pub mod glsl;
pub mod headless;

pub use backend::{
    BufferId, ProgramId, RenderBackend, ShaderId, ShaderStage, TextureId, UniformLocation,
};
pub use headless::HeadlessBackend;
