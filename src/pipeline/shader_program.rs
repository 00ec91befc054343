use crate::core::geometry::{VertexAttribute, VertexLayout};
use crate::core::math::transform::to_column_major;
use crate::error::{Error, Result};
use crate::gpu::{BufferId, ProgramId, RenderBackend, ShaderId, ShaderStage, TextureId, UniformLocation};
use crate::pipeline::compile_log::CompileLog;
use log::{debug, info, warn};
use nalgebra::Matrix4;

pub const MODEL_VIEW_UNIFORM: &str = "mv_matrix";
pub const PROJECTION_UNIFORM: &str = "projection";
pub const TIME_UNIFORM: &str = "time";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgramState {
    Unlinked,
    Compiling,
    Linked,
    /// The last attempt failed. A previously linked program may still be active.
    Failed,
}

/// Locations queried from one linked program.
#[derive(Debug, Default, Clone)]
struct Locations {
    attributes: Vec<(VertexAttribute, UniformLocation)>,
    model_view: Option<UniformLocation>,
    projection: Option<UniformLocation>,
    time: Option<UniformLocation>,
}

impl Locations {
    fn query<B: RenderBackend>(backend: &B, program: ProgramId) -> Self {
        let mut attributes = Vec::with_capacity(VertexLayout::ATTRIBUTES.len());
        for attribute in VertexLayout::ATTRIBUTES {
            match backend.attrib_location(program, attribute.name) {
                Some(location) => attributes.push((attribute, location)),
                None => debug!(
                    "Attribute {} is not active in program {}",
                    attribute.name,
                    program.get()
                ),
            }
        }
        Self {
            attributes,
            model_view: backend.uniform_location(program, MODEL_VIEW_UNIFORM),
            projection: backend.uniform_location(program, PROJECTION_UNIFORM),
            time: backend.uniform_location(program, TIME_UNIFORM),
        }
    }
}

/// A vertex/fragment program whose fragment stage can be replaced at runtime.
///
/// Replacement is build-then-swap: the new fragment shader is compiled and
/// linked into a fresh program, and only a successful link releases the old
/// objects. A failed attempt leaves the last good program, and its fragment
/// source, in place.
pub struct ShaderProgram {
    state: ProgramState,
    vertex_source: String,
    fragment_source: String,

    vertex_shader: Option<ShaderId>,
    fragment_shader: Option<ShaderId>,
    program: Option<ProgramId>,
    locations: Locations,

    vertex_log: CompileLog,
    fragment_log: CompileLog,

    world: Matrix4<f32>,
    view: Matrix4<f32>,
    projection: Matrix4<f32>,
    texture: Option<TextureId>,
    vertex_buffer: Option<BufferId>,
}

impl ShaderProgram {
    /// Compiles both stages and links them.
    ///
    /// Fails with [`Error::ShaderCompile`] when either stage does not build.
    pub fn new<B: RenderBackend>(
        backend: &mut B,
        vertex_source: &str,
        fragment_source: &str,
    ) -> Result<Self> {
        let mut shader = Self {
            state: ProgramState::Unlinked,
            vertex_source: vertex_source.to_string(),
            fragment_source: String::new(),
            vertex_shader: None,
            fragment_shader: None,
            program: None,
            locations: Locations::default(),
            vertex_log: CompileLog::default(),
            fragment_log: CompileLog::default(),
            world: Matrix4::identity(),
            view: Matrix4::identity(),
            projection: Matrix4::identity(),
            texture: None,
            vertex_buffer: None,
        };

        shader.state = ProgramState::Compiling;
        let vs = backend.create_shader(ShaderStage::Vertex)?;
        let compiled = backend.compile_shader(vs, vertex_source);
        shader.vertex_log = CompileLog::parse(backend.shader_info_log(vs));
        debug!("Vertex shader log: {:?}", shader.vertex_log.raw());
        if !compiled {
            backend.delete_shader(vs);
            shader.state = ProgramState::Failed;
            return Err(Error::ShaderCompile {
                stage: ShaderStage::Vertex,
                log: shader.vertex_log,
            });
        }
        shader.vertex_shader = Some(vs);

        match shader.provide_fragment_source(backend, fragment_source) {
            Ok(true) => Ok(shader),
            Ok(false) => {
                let log = shader.fragment_log.clone();
                shader.release(backend);
                Err(Error::ShaderCompile {
                    stage: ShaderStage::Fragment,
                    log,
                })
            }
            Err(e) => {
                shader.release(backend);
                Err(e)
            }
        }
    }

    /// Compiles `source` as the new fragment stage and swaps it in if it links.
    ///
    /// Returns whether the swap happened. The compile log is available from
    /// [`fragment_log`](Self::fragment_log) either way. Only allocation
    /// failures are errors.
    pub fn provide_fragment_source<B: RenderBackend>(
        &mut self,
        backend: &mut B,
        source: &str,
    ) -> Result<bool> {
        let Some(vertex_shader) = self.vertex_shader else {
            self.state = ProgramState::Failed;
            return Ok(false);
        };
        self.state = ProgramState::Compiling;

        let fs = match backend.create_shader(ShaderStage::Fragment) {
            Ok(fs) => fs,
            Err(e) => {
                self.state = ProgramState::Failed;
                return Err(e);
            }
        };
        let compiled = backend.compile_shader(fs, source);
        let compile_log = backend.shader_info_log(fs);
        debug!("Fragment shader log: {compile_log:?}");

        if !compiled {
            backend.delete_shader(fs);
            self.fragment_log = CompileLog::parse(compile_log);
            self.state = ProgramState::Failed;
            warn!(
                "Fragment shader failed to compile with {} error(s); keeping the previous program",
                self.fragment_log.error_count()
            );
            return Ok(false);
        }

        let program = match backend.create_program() {
            Ok(program) => program,
            Err(e) => {
                backend.delete_shader(fs);
                self.state = ProgramState::Failed;
                return Err(e);
            }
        };
        backend.attach_shader(program, vertex_shader);
        backend.attach_shader(program, fs);

        if !backend.link_program(program) {
            let link_log = backend.program_info_log(program);
            backend.delete_program(program);
            backend.delete_shader(fs);
            self.fragment_log = CompileLog::parse(format!("{compile_log}{link_log}"));
            self.state = ProgramState::Failed;
            warn!("Program failed to link: {}", link_log.trim());
            return Ok(false);
        }

        // The new program is confirmed; only now release the old one.
        if let Some(old) = self.program.replace(program) {
            backend.delete_program(old);
        }
        if let Some(old) = self.fragment_shader.replace(fs) {
            backend.delete_shader(old);
        }
        self.locations = Locations::query(backend, program);
        self.fragment_source = source.to_string();
        self.fragment_log = CompileLog::parse(compile_log);
        self.state = ProgramState::Linked;
        info!("Linked program {}", program.get());
        Ok(true)
    }

    /// Makes the program current, uploads its uniforms and binds vertex data.
    ///
    /// Returns false when no program has ever linked.
    pub fn use_program<B: RenderBackend>(&self, backend: &mut B, time: f32) -> bool {
        let Some(program) = self.program else {
            return false;
        };
        backend.use_program(program);

        if let Some(location) = self.locations.model_view {
            let model_view = self.view * self.world;
            backend.uniform_mat4(location, &to_column_major(&model_view));
        }
        if let Some(location) = self.locations.projection {
            backend.uniform_mat4(location, &to_column_major(&self.projection));
        }
        if let Some(location) = self.locations.time {
            backend.uniform_f32(location, time);
        }
        backend.bind_texture(self.texture);

        if let Some(buffer) = self.vertex_buffer {
            for (attribute, location) in &self.locations.attributes {
                backend.vertex_attrib_pointer(*location, buffer, attribute, VertexLayout::STRIDE);
            }
        }
        true
    }

    /// Deletes every GPU object this program owns.
    pub fn release<B: RenderBackend>(&mut self, backend: &mut B) {
        if let Some(program) = self.program.take() {
            backend.delete_program(program);
        }
        if let Some(fs) = self.fragment_shader.take() {
            backend.delete_shader(fs);
        }
        if let Some(vs) = self.vertex_shader.take() {
            backend.delete_shader(vs);
        }
        self.state = ProgramState::Unlinked;
    }

    pub fn set_world(&mut self, world: Matrix4<f32>) {
        self.world = world;
    }

    pub fn set_view(&mut self, view: Matrix4<f32>) {
        self.view = view;
    }

    pub fn set_projection(&mut self, projection: Matrix4<f32>) {
        self.projection = projection;
    }

    pub fn set_texture(&mut self, texture: Option<TextureId>) {
        self.texture = texture;
    }

    pub fn set_vertex_buffer(&mut self, buffer: BufferId) {
        self.vertex_buffer = Some(buffer);
    }

    pub fn state(&self) -> ProgramState {
        self.state
    }

    /// The active program, which survives failed replacements.
    pub fn program_id(&self) -> Option<ProgramId> {
        self.program
    }

    pub fn vertex_source(&self) -> &str {
        &self.vertex_source
    }

    /// Source of the fragment stage currently linked.
    pub fn fragment_source(&self) -> &str {
        &self.fragment_source
    }

    pub fn vertex_log(&self) -> &CompileLog {
        &self.vertex_log
    }

    /// Log of the most recent fragment attempt; empty after a clean build.
    pub fn fragment_log(&self) -> &CompileLog {
        &self.fragment_log
    }

    pub fn attribute_location(&self, name: &str) -> Option<UniformLocation> {
        self.locations
            .attributes
            .iter()
            .find(|(attribute, _)| attribute.name == name)
            .map(|(_, location)| *location)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::HeadlessBackend;
    use crate::scene::presets;

    const BROKEN: &str = "#version 450\n\
                          layout(location = 0) out vec4 fragColor;\n\
                          void main() {\n    vec3 c = vec3(1.0)\n    fragColor = vec4(c, 1.0);\n}\n";

    fn program(backend: &mut HeadlessBackend) -> ShaderProgram {
        ShaderProgram::new(backend, presets::VERTEX_SHADER, presets::DEFAULT_FRAGMENT_SHADER)
            .unwrap()
    }

    #[test]
    fn construction_links_and_binds_the_attribute_layout() {
        let mut backend = HeadlessBackend::new(4, 4);
        let shader = program(&mut backend);
        assert_eq!(shader.state(), ProgramState::Linked);
        assert!(shader.program_id().is_some());
        assert!(shader.fragment_log().is_empty());
        for attribute in VertexLayout::ATTRIBUTES {
            assert!(shader.attribute_location(attribute.name).is_some());
        }
        assert_eq!(shader.fragment_source(), presets::DEFAULT_FRAGMENT_SHADER);
    }

    #[test]
    fn failed_replacement_keeps_the_last_good_program() {
        let mut backend = HeadlessBackend::new(4, 4);
        let mut shader = program(&mut backend);
        let before = shader.program_id();

        assert!(!shader.provide_fragment_source(&mut backend, BROKEN).unwrap());
        assert_eq!(shader.state(), ProgramState::Failed);
        assert_eq!(shader.program_id(), before);
        assert_eq!(shader.fragment_source(), presets::DEFAULT_FRAGMENT_SHADER);

        let log = shader.fragment_log();
        assert!(!log.is_empty());
        let tagged = log.raw().lines().filter(|l| l.starts_with("ERROR:")).count();
        assert_eq!(log.error_count(), tagged);
        assert!(shader.use_program(&mut backend, 0.0));
        assert_eq!(backend.current_program(), before);
    }

    #[test]
    fn successful_replacement_swaps_and_releases_the_old_program() {
        let mut backend = HeadlessBackend::new(4, 4);
        let mut shader = program(&mut backend);
        let before = shader.program_id();
        let live = (backend.live_programs(), backend.live_shaders());

        let source = presets::find("normals").unwrap().source;
        assert!(shader.provide_fragment_source(&mut backend, source).unwrap());
        assert_eq!(shader.state(), ProgramState::Linked);
        assert_ne!(shader.program_id(), before);
        assert_eq!(shader.fragment_source(), source);
        assert_eq!((backend.live_programs(), backend.live_shaders()), live);
        assert!(shader.attribute_location("vPosition").is_some());
    }

    #[test]
    fn broken_initial_fragment_is_an_error() {
        let mut backend = HeadlessBackend::new(4, 4);
        match ShaderProgram::new(&mut backend, presets::VERTEX_SHADER, BROKEN) {
            Err(Error::ShaderCompile { stage, log }) => {
                assert_eq!(stage, ShaderStage::Fragment);
                assert_eq!(log.error_count(), 1);
            }
            Err(other) => panic!("unexpected error {other}"),
            Ok(_) => panic!("broken fragment linked"),
        }
        assert_eq!(backend.live_programs(), 0);
        assert_eq!(backend.live_shaders(), 0);
    }

    #[test]
    fn time_uniform_is_uploaded_on_use() {
        let mut backend = HeadlessBackend::new(4, 4);
        let mut shader = program(&mut backend);
        let animated = presets::find("sinusoid").unwrap().source;
        assert!(shader.provide_fragment_source(&mut backend, animated).unwrap());
        assert!(shader.use_program(&mut backend, 0.25));
        let id = shader.program_id().unwrap();
        assert_eq!(backend.float_uniform(id, TIME_UNIFORM), Some(0.25));
    }

    #[test]
    fn allocation_failure_keeps_the_active_program() {
        let mut backend = HeadlessBackend::new(4, 4).with_name_limit(3);
        let mut shader = program(&mut backend);
        let before = shader.program_id();
        let source = presets::find("normals").unwrap().source;
        assert!(matches!(
            shader.provide_fragment_source(&mut backend, source),
            Err(Error::ResourceAllocation(_))
        ));
        assert_eq!(shader.program_id(), before);
    }
}
