use crate::core::geometry::{Vertex, vertex_bytes};
use crate::core::math::transform::TransformFactory;
use crate::error::Result;
use crate::gpu::{BufferId, RenderBackend, TextureId};
use crate::pipeline::shader_program::ShaderProgram;
use crate::scene::camera::Camera;
use crate::scene::texture::{SamplerState, Texture};
use log::info;
use nalgebra::Matrix4;

/// A mesh uploaded to the render context, drawn with its own shader program.
pub struct Model {
    program: ShaderProgram,
    vertex_buffer: BufferId,
    vertex_count: usize,
    texture: Option<TextureId>,
    sampler: SamplerState,
    world: Matrix4<f32>,
    auto_rotate: bool,
}

impl Model {
    /// Uploads `vertices` and `texture` and links a program from the given sources.
    ///
    /// Anything already allocated is released again if a later step fails.
    pub fn new<B: RenderBackend>(
        backend: &mut B,
        vertices: &[Vertex],
        texture: Option<&Texture>,
        vertex_source: &str,
        fragment_source: &str,
    ) -> Result<Self> {
        let vertex_buffer = backend.create_vertex_buffer(&vertex_bytes(vertices))?;

        let texture_id = match texture.map(|t| backend.create_texture(t)).transpose() {
            Ok(id) => id,
            Err(e) => {
                backend.delete_buffer(vertex_buffer);
                return Err(e);
            }
        };

        let mut program = match ShaderProgram::new(backend, vertex_source, fragment_source) {
            Ok(program) => program,
            Err(e) => {
                backend.delete_buffer(vertex_buffer);
                if let Some(id) = texture_id {
                    backend.delete_texture(id);
                }
                return Err(e);
            }
        };
        program.set_vertex_buffer(vertex_buffer);
        program.set_texture(texture_id);

        info!(
            "Model ready: {} vertices, {}",
            vertices.len(),
            if texture_id.is_some() { "textured" } else { "untextured" }
        );

        Ok(Self {
            program,
            vertex_buffer,
            vertex_count: vertices.len(),
            texture: texture_id,
            sampler: SamplerState::default(),
            world: Matrix4::identity(),
            auto_rotate: false,
        })
    }

    /// Advances per-frame animation.
    pub fn update(&mut self, time: f32) {
        if self.auto_rotate {
            self.world = TransformFactory::rotation_y(time * 4.0) * TransformFactory::rotation_z(time * 6.0);
        }
    }

    pub fn draw<B: RenderBackend>(&mut self, backend: &mut B, camera: &Camera, time: f32) {
        self.program.set_world(self.world);
        self.program.set_view(camera.view());
        self.program.set_projection(camera.projection());
        if self.program.use_program(backend, time) {
            backend.draw_triangles(0, self.vertex_count);
        }
    }

    /// Right-multiplies the world matrix by `matrix`.
    pub fn transform(&mut self, matrix: &Matrix4<f32>) {
        self.world = self.world * matrix;
    }

    pub fn set_transform(&mut self, matrix: Matrix4<f32>) {
        self.world = matrix;
    }

    pub fn set_auto_rotate(&mut self, enabled: bool) {
        self.auto_rotate = enabled;
    }

    pub fn set_sampler<B: RenderBackend>(&mut self, backend: &mut B, sampler: SamplerState) {
        self.sampler = sampler;
        if let Some(texture) = self.texture {
            backend.set_sampler(texture, sampler);
        }
    }

    /// See [`ShaderProgram::provide_fragment_source`].
    pub fn provide_fragment_source<B: RenderBackend>(
        &mut self,
        backend: &mut B,
        source: &str,
    ) -> Result<bool> {
        self.program.provide_fragment_source(backend, source)
    }

    /// Frees the buffer, texture and program on the render context.
    pub fn release<B: RenderBackend>(mut self, backend: &mut B) {
        self.program.release(backend);
        backend.delete_buffer(self.vertex_buffer);
        if let Some(texture) = self.texture {
            backend.delete_texture(texture);
        }
    }

    pub fn program(&self) -> &ShaderProgram {
        &self.program
    }

    pub fn vertex_count(&self) -> usize {
        self.vertex_count
    }

    pub fn world(&self) -> Matrix4<f32> {
        self.world
    }

    pub fn auto_rotate(&self) -> bool {
        self.auto_rotate
    }

    pub fn sampler(&self) -> SamplerState {
        self.sampler
    }
}
