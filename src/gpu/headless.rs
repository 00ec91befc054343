use crate::core::framebuffer::FrameBuffer;
use crate::core::geometry::VertexAttribute;
use crate::core::math::transform::from_column_major;
use crate::core::math::vector::VectorExt;
use crate::core::pipeline::Shader;
use crate::core::rasterizer::Rasterizer;
use crate::error::{Error, Result};
use crate::gpu::backend::{
    BufferId, ProgramId, RenderBackend, ShaderId, ShaderStage, TextureId, UniformLocation,
};
use crate::gpu::glsl::{self, Interface};
use crate::scene::texture::{SamplerState, Texture};
use image::RgbaImage;
use log::{debug, warn};
use nalgebra::{Matrix3, Matrix4, Vector2, Vector3, Vector4};
use std::collections::HashMap;
use std::ops::{Add, Mul};

const AMBIENT: f32 = 0.2;
const UNTEXTURED_ALBEDO: f32 = 0.8;

struct ShaderObject {
    stage: ShaderStage,
    compiled: bool,
    log: String,
    interface: Interface,
}

#[derive(Clone, Copy)]
enum UniformValue {
    Mat4(Matrix4<f32>),
    Float(f32),
}

#[derive(Default)]
struct ProgramObject {
    shaders: Vec<ShaderId>,
    linked: bool,
    log: String,
    /// Vertex inputs; the location is the attribute location.
    attributes: Vec<(String, u32)>,
    uniforms: Vec<String>,
    values: HashMap<UniformLocation, UniformValue>,
    bindings: HashMap<UniformLocation, AttribBinding>,
}

impl ProgramObject {
    fn mat4(&self, name: &str) -> Option<Matrix4<f32>> {
        let index = self.uniforms.iter().position(|u| u == name)?;
        match self.values.get(&UniformLocation(index as u32)) {
            Some(UniformValue::Mat4(m)) => Some(*m),
            _ => None,
        }
    }

    fn float(&self, name: &str) -> Option<f32> {
        let index = self.uniforms.iter().position(|u| u == name)?;
        match self.values.get(&UniformLocation(index as u32)) {
            Some(UniformValue::Float(v)) => Some(*v),
            _ => None,
        }
    }

    fn attribute(&self, name: &str) -> Option<UniformLocation> {
        self.attributes
            .iter()
            .find(|(attribute, _)| attribute == name)
            .map(|(_, location)| UniformLocation(*location))
    }

    fn binding(&self, name: &str) -> Option<AttribBinding> {
        self.bindings.get(&self.attribute(name)?).copied()
    }
}

#[derive(Clone, Copy)]
struct AttribBinding {
    buffer: BufferId,
    attribute: VertexAttribute,
    stride: usize,
}

struct TextureObject {
    texture: Texture,
    sampler: SamplerState,
}

/// CPU render context backed by the software rasterizer.
///
/// Shader sources are compiled and reflected by [`glsl`], so compile and link
/// results match what a driver would report. Draws do not execute the GLSL:
/// they run a fixed transform and a textured head-light preview whatever the
/// fragment source says.
pub struct HeadlessBackend {
    next_name: u32,
    name_limit: Option<u32>,
    shaders: HashMap<ShaderId, ShaderObject>,
    programs: HashMap<ProgramId, ProgramObject>,
    buffers: HashMap<BufferId, Vec<u8>>,
    textures: HashMap<TextureId, TextureObject>,
    current_program: Option<ProgramId>,
    bound_texture: Option<TextureId>,
    framebuffer: FrameBuffer,
    rasterizer: Rasterizer,
    draw_calls: usize,
}

impl HeadlessBackend {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            next_name: 1,
            name_limit: None,
            shaders: HashMap::new(),
            programs: HashMap::new(),
            buffers: HashMap::new(),
            textures: HashMap::new(),
            current_program: None,
            bound_texture: None,
            framebuffer: FrameBuffer::new(width.max(1) as usize, height.max(1) as usize),
            rasterizer: Rasterizer::new(),
            draw_calls: 0,
        }
    }

    /// Refuses to hand out any name above `limit`.
    pub fn with_name_limit(mut self, limit: u32) -> Self {
        self.name_limit = Some(limit);
        self
    }

    fn allocate(&mut self, what: &'static str) -> Result<u32> {
        if self.name_limit.is_some_and(|limit| self.next_name > limit) {
            warn!("Out of object names while allocating {what}");
            return Err(Error::ResourceAllocation(what));
        }
        let name = self.next_name;
        self.next_name += 1;
        Ok(name)
    }

    pub fn live_programs(&self) -> usize {
        self.programs.len()
    }

    pub fn live_shaders(&self) -> usize {
        self.shaders.len()
    }

    pub fn current_program(&self) -> Option<ProgramId> {
        self.current_program
    }

    pub fn draw_calls(&self) -> usize {
        self.draw_calls
    }

    /// Last value uploaded to a `float` uniform of `program`.
    pub fn float_uniform(&self, program: ProgramId, name: &str) -> Option<f32> {
        self.programs.get(&program)?.float(name)
    }

    fn current_program_mut(&mut self) -> Option<&mut ProgramObject> {
        let id = self.current_program?;
        self.programs.get_mut(&id)
    }

    fn read_attribute(&self, binding: &AttribBinding, vertex: usize) -> Option<Vector3<f32>> {
        let data = self.buffers.get(&binding.buffer)?;
        let start = vertex * binding.stride + binding.attribute.offset;
        let mut out = Vector3::zeros();
        for c in 0..binding.attribute.components.min(3) {
            let at = start + c * 4;
            let bytes = data.get(at..at + 4)?;
            out[c] = bytemuck::pod_read_unaligned::<f32>(bytes);
        }
        Some(out)
    }
}

#[derive(Debug, Clone, Copy)]
struct PreviewInput {
    position: Vector3<f32>,
    normal: Vector3<f32>,
    texcoord: Vector2<f32>,
}

#[derive(Debug, Clone, Copy)]
struct PreviewVarying {
    normal: Vector3<f32>,
    texcoord: Vector2<f32>,
}

impl Add for PreviewVarying {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            normal: self.normal + rhs.normal,
            texcoord: self.texcoord + rhs.texcoord,
        }
    }
}

impl Mul<f32> for PreviewVarying {
    type Output = Self;

    fn mul(self, rhs: f32) -> Self {
        Self {
            normal: self.normal * rhs,
            texcoord: self.texcoord * rhs,
        }
    }
}

/// `projection * model_view * position`, shaded by a light at the eye.
struct PreviewShader<'a> {
    mvp: Matrix4<f32>,
    normal_matrix: Matrix3<f32>,
    texture: Option<&'a TextureObject>,
}

impl Shader for PreviewShader<'_> {
    type Varying = PreviewVarying;
    type Input = PreviewInput;

    fn vertex(&self, input: &PreviewInput) -> (Vector4<f32>, PreviewVarying) {
        let clip = self.mvp * input.position.push(1.0);
        let varying = PreviewVarying {
            normal: self.normal_matrix * input.normal,
            texcoord: input.texcoord,
        };
        (clip, varying)
    }

    fn fragment(&self, varying: PreviewVarying) -> Vector3<f32> {
        let albedo = match self.texture {
            Some(t) => t.texture.sample(varying.texcoord, t.sampler),
            None => Vector3::repeat(UNTEXTURED_ALBEDO),
        };
        let n = varying.normal.normalized_or_self();
        // Meshes without normals are lit as if facing the eye.
        let diffuse = if n == Vector3::zeros() { 1.0 } else { n.z.max(0.0) };
        albedo * (AMBIENT + (1.0 - AMBIENT) * diffuse)
    }
}

impl RenderBackend for HeadlessBackend {
    fn create_shader(&mut self, stage: ShaderStage) -> Result<ShaderId> {
        let name = self.allocate("a shader object")?;
        let id = ShaderId::new(name).ok_or(Error::ResourceAllocation("a shader object"))?;
        self.shaders.insert(
            id,
            ShaderObject {
                stage,
                compiled: false,
                log: String::new(),
                interface: Interface::default(),
            },
        );
        Ok(id)
    }

    fn compile_shader(&mut self, shader: ShaderId, source: &str) -> bool {
        let Some(object) = self.shaders.get_mut(&shader) else {
            return false;
        };
        match glsl::compile(object.stage, source) {
            Ok(interface) => {
                object.compiled = true;
                object.log.clear();
                object.interface = interface;
            }
            Err(diagnostics) => {
                object.compiled = false;
                object.log = glsl::format_log(&diagnostics);
                object.interface = Interface::default();
            }
        }
        debug!(
            "Compiled {} shader {}: {}",
            object.stage,
            shader.get(),
            if object.compiled { "ok" } else { "failed" }
        );
        object.compiled
    }

    fn shader_info_log(&self, shader: ShaderId) -> String {
        self.shaders
            .get(&shader)
            .map(|s| s.log.clone())
            .unwrap_or_default()
    }

    fn delete_shader(&mut self, shader: ShaderId) {
        self.shaders.remove(&shader);
    }

    fn create_program(&mut self) -> Result<ProgramId> {
        let name = self.allocate("a program object")?;
        let id = ProgramId::new(name).ok_or(Error::ResourceAllocation("a program object"))?;
        self.programs.insert(id, ProgramObject::default());
        Ok(id)
    }

    fn attach_shader(&mut self, program: ProgramId, shader: ShaderId) {
        if let Some(p) = self.programs.get_mut(&program)
            && !p.shaders.contains(&shader)
        {
            p.shaders.push(shader);
        }
    }

    fn link_program(&mut self, program: ProgramId) -> bool {
        let Some(p) = self.programs.get(&program) else {
            return false;
        };

        let mut errors = Vec::new();
        let mut attributes = Vec::new();
        let mut varyings_written = Vec::new();
        let mut varyings_read = Vec::new();
        let mut uniforms: Vec<String> = Vec::new();
        for stage in [ShaderStage::Vertex, ShaderStage::Fragment] {
            let attached: Vec<&ShaderObject> = p
                .shaders
                .iter()
                .filter_map(|id| self.shaders.get(id))
                .filter(|s| s.stage == stage)
                .collect();
            match attached.as_slice() {
                [] => errors.push(format!("error: no {stage} shader attached")),
                [object] if !object.compiled => {
                    errors.push(format!("error: {stage} shader was not successfully compiled"))
                }
                [object] => {
                    match stage {
                        ShaderStage::Vertex => {
                            attributes = object.interface.inputs.clone();
                            varyings_written = object.interface.outputs.clone();
                        }
                        ShaderStage::Fragment => varyings_read = object.interface.inputs.clone(),
                    }
                    for u in &object.interface.uniforms {
                        if !uniforms.contains(u) {
                            uniforms.push(u.clone());
                        }
                    }
                }
                _ => errors.push(format!("error: more than one {stage} shader attached")),
            }
        }
        for (name, location) in &varyings_read {
            if !varyings_written.contains(location) {
                errors.push(format!(
                    "error: fragment input '{name}' at location {location} is not written by the vertex shader"
                ));
            }
        }

        let Some(p) = self.programs.get_mut(&program) else {
            return false;
        };
        p.linked = errors.is_empty();
        p.log = errors.iter().map(|e| format!("{e}\n")).collect();
        p.attributes = if p.linked { attributes } else { Vec::new() };
        p.uniforms = if p.linked { uniforms } else { Vec::new() };
        p.values.clear();
        p.bindings.clear();
        p.linked
    }

    fn program_info_log(&self, program: ProgramId) -> String {
        self.programs
            .get(&program)
            .map(|p| p.log.clone())
            .unwrap_or_default()
    }

    fn delete_program(&mut self, program: ProgramId) {
        self.programs.remove(&program);
        if self.current_program == Some(program) {
            self.current_program = None;
        }
    }

    fn use_program(&mut self, program: ProgramId) {
        match self.programs.get(&program) {
            Some(p) if p.linked => self.current_program = Some(program),
            _ => warn!("Ignoring use of program {} which is not linked", program.get()),
        }
    }

    fn attrib_location(&self, program: ProgramId, name: &str) -> Option<UniformLocation> {
        self.programs.get(&program)?.attribute(name)
    }

    fn uniform_location(&self, program: ProgramId, name: &str) -> Option<UniformLocation> {
        let p = self.programs.get(&program)?;
        let index = p.uniforms.iter().position(|u| u == name)?;
        Some(UniformLocation(index as u32))
    }

    fn uniform_mat4(&mut self, location: UniformLocation, column_major: &[f32; 16]) {
        let matrix = from_column_major(column_major);
        if let Some(p) = self.current_program_mut() {
            p.values.insert(location, UniformValue::Mat4(matrix));
        }
    }

    fn uniform_f32(&mut self, location: UniformLocation, value: f32) {
        if let Some(p) = self.current_program_mut() {
            p.values.insert(location, UniformValue::Float(value));
        }
    }

    fn create_vertex_buffer(&mut self, data: &[u8]) -> Result<BufferId> {
        let name = self.allocate("a vertex buffer")?;
        let id = BufferId::new(name).ok_or(Error::ResourceAllocation("a vertex buffer"))?;
        self.buffers.insert(id, data.to_vec());
        Ok(id)
    }

    fn delete_buffer(&mut self, buffer: BufferId) {
        self.buffers.remove(&buffer);
    }

    fn vertex_attrib_pointer(
        &mut self,
        location: UniformLocation,
        buffer: BufferId,
        attribute: &VertexAttribute,
        stride: usize,
    ) {
        let binding = AttribBinding {
            buffer,
            attribute: *attribute,
            stride,
        };
        if let Some(p) = self.current_program_mut() {
            p.bindings.insert(location, binding);
        }
    }

    fn create_texture(&mut self, texture: &Texture) -> Result<TextureId> {
        let name = self.allocate("a texture")?;
        let id = TextureId::new(name).ok_or(Error::ResourceAllocation("a texture"))?;
        self.textures.insert(
            id,
            TextureObject {
                texture: texture.clone(),
                sampler: SamplerState::default(),
            },
        );
        Ok(id)
    }

    fn set_sampler(&mut self, texture: TextureId, sampler: SamplerState) {
        if let Some(t) = self.textures.get_mut(&texture) {
            t.sampler = sampler;
        }
    }

    fn bind_texture(&mut self, texture: Option<TextureId>) {
        self.bound_texture = texture;
    }

    fn delete_texture(&mut self, texture: TextureId) {
        self.textures.remove(&texture);
        if self.bound_texture == Some(texture) {
            self.bound_texture = None;
        }
    }

    fn viewport(&mut self, width: u32, height: u32) {
        let (width, height) = (width.max(1) as usize, height.max(1) as usize);
        if self.framebuffer.width != width || self.framebuffer.height != height {
            self.framebuffer = FrameBuffer::new(width, height);
        }
    }

    fn clear(&mut self, color: Vector3<f32>) {
        self.framebuffer.clear(color, f32::INFINITY);
    }

    fn draw_triangles(&mut self, first: usize, count: usize) {
        let Some(program) = self.current_program.and_then(|id| self.programs.get(&id)) else {
            warn!("Draw call without a linked program in use");
            return;
        };
        let Some(position) = program.binding("vPosition") else {
            warn!("Draw call without a bound vPosition attribute");
            return;
        };
        let normal = program.binding("vNormal");
        let texcoord = program.binding("vTexture");

        let model_view = program.mat4("mv_matrix").unwrap_or_else(Matrix4::identity);
        let projection = program.mat4("projection").unwrap_or_else(Matrix4::identity);

        let mut inputs = Vec::with_capacity(count);
        for vertex in first..first + count {
            let Some(p) = self.read_attribute(&position, vertex) else {
                warn!("Draw call reads past the end of the vertex buffer");
                return;
            };
            let n = normal
                .and_then(|b| self.read_attribute(&b, vertex))
                .unwrap_or_else(Vector3::zeros);
            let t = texcoord
                .and_then(|b| self.read_attribute(&b, vertex))
                .unwrap_or_else(Vector3::zeros);
            inputs.push(PreviewInput {
                position: p,
                normal: n,
                texcoord: t.xy(),
            });
        }

        let shader = PreviewShader {
            mvp: projection * model_view,
            normal_matrix: model_view.fixed_view::<3, 3>(0, 0).into_owned(),
            texture: self.bound_texture.and_then(|id| self.textures.get(&id)),
        };
        self.rasterizer
            .draw_triangles(&self.framebuffer, &shader, &inputs);
        self.draw_calls += 1;
    }

    fn read_pixels(&mut self) -> RgbaImage {
        self.framebuffer.to_rgba_image()
    }
}
