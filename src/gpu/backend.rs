use crate::core::geometry::VertexAttribute;
use crate::error::Result;
use crate::scene::texture::{SamplerState, Texture};
use image::RgbaImage;
use nalgebra::Vector3;
use std::fmt;
use std::num::NonZeroU32;

macro_rules! object_name {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(NonZeroU32);

        impl $name {
            pub fn new(raw: u32) -> Option<Self> {
                NonZeroU32::new(raw).map(Self)
            }

            pub fn get(self) -> u32 {
                self.0.get()
            }
        }
    };
}

object_name!(
    /// A compiled (or failed) shader object.
    ShaderId
);
object_name!(
    /// A linked (or failed) program object.
    ProgramId
);
object_name!(BufferId);
object_name!(TextureId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderStage::Vertex => write!(f, "vertex"),
            ShaderStage::Fragment => write!(f, "fragment"),
        }
    }
}

/// Location of an active attribute or uniform within one program.
///
/// Only valid for the program it was queried from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UniformLocation(pub u32);

/// The render context: sole owner of GPU objects and their bindings.
///
/// All calls happen on the render thread. Object names handed out by one
/// backend are meaningless to another.
pub trait RenderBackend {
    // --- Shaders ---
    fn create_shader(&mut self, stage: ShaderStage) -> Result<ShaderId>;
    /// Compiles `source`; returns whether compilation succeeded.
    fn compile_shader(&mut self, shader: ShaderId, source: &str) -> bool;
    /// The driver's info log of the last compile (empty when clean).
    fn shader_info_log(&self, shader: ShaderId) -> String;
    fn delete_shader(&mut self, shader: ShaderId);

    // --- Programs ---
    fn create_program(&mut self) -> Result<ProgramId>;
    fn attach_shader(&mut self, program: ProgramId, shader: ShaderId);
    /// Links the attached stages; returns whether linking succeeded.
    fn link_program(&mut self, program: ProgramId) -> bool;
    fn program_info_log(&self, program: ProgramId) -> String;
    fn delete_program(&mut self, program: ProgramId);
    fn use_program(&mut self, program: ProgramId);
    fn attrib_location(&self, program: ProgramId, name: &str) -> Option<UniformLocation>;
    fn uniform_location(&self, program: ProgramId, name: &str) -> Option<UniformLocation>;

    // --- Uniforms (apply to the program in use) ---
    /// Uploads a matrix given in column-major order.
    fn uniform_mat4(&mut self, location: UniformLocation, column_major: &[f32; 16]);
    fn uniform_f32(&mut self, location: UniformLocation, value: f32);

    // --- Vertex data ---
    fn create_vertex_buffer(&mut self, data: &[u8]) -> Result<BufferId>;
    fn delete_buffer(&mut self, buffer: BufferId);
    /// Points `location` at `attribute` inside `buffer` for the program in use.
    fn vertex_attrib_pointer(
        &mut self,
        location: UniformLocation,
        buffer: BufferId,
        attribute: &VertexAttribute,
        stride: usize,
    );

    // --- Textures ---
    fn create_texture(&mut self, texture: &Texture) -> Result<TextureId>;
    fn set_sampler(&mut self, texture: TextureId, sampler: SamplerState);
    fn bind_texture(&mut self, texture: Option<TextureId>);
    fn delete_texture(&mut self, texture: TextureId);

    // --- Framebuffer ---
    fn viewport(&mut self, width: u32, height: u32);
    fn clear(&mut self, color: Vector3<f32>);
    /// Draws `count` vertices starting at `first` as a non-indexed triangle list.
    fn draw_triangles(&mut self, first: usize, count: usize);
    fn read_pixels(&mut self) -> RgbaImage;
}
