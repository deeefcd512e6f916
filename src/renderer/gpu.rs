//! Driver seam: every GPU call the backend makes goes through [`GraphicsDevice`].

use std::num::NonZeroU32;

use crate::renderer::vertex::VertexAttrib;

macro_rules! gpu_id {
    ($($name:ident),* $(,)?) => {
        $(
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
            pub struct $name(pub NonZeroU32);

            impl $name {
                pub fn raw(self) -> u32 {
                    self.0.get()
                }
            }
        )*
    };
}

gpu_id!(ShaderId, ProgramId, BufferId, TextureId, VertexArrayId, FramebufferId);

/// A resolved uniform location. Absent uniforms are `None` at the call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UniformLoc(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferTarget {
    Vertex,
    Index,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferUsage {
    Static,
    Dynamic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexType {
    U16,
    U32,
}

impl IndexType {
    pub fn bytes(self) -> u32 {
        match self {
            IndexType::U16 => 2,
            IndexType::U32 => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topology {
    Triangles,
    Lines,
    Points,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceCaps {
    /// Fragment derivatives, needed to rebuild tangent frames for bump maps.
    pub derivatives: bool,
    pub vertex_arrays: bool,
    pub program_binary: bool,
    pub glsl_version: &'static str,
}

impl Default for DeviceCaps {
    fn default() -> Self {
        Self {
            derivatives: true,
            vertex_arrays: true,
            program_binary: false,
            glsl_version: "#version 330 core",
        }
    }
}

/// Driver-native linked program image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramBinary {
    pub format: u32,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Copy)]
pub struct TextureUpload<'a> {
    pub width: u32,
    pub height: u32,
    pub pixels: &'a [u8],
    pub mipmaps: bool,
    pub nearest: bool,
    pub clamp: bool,
}

/// Must only be driven from the thread that owns the graphics context.
pub trait GraphicsDevice {
    fn caps(&self) -> DeviceCaps;

    fn compile_shader(
        &mut self,
        stage: ShaderStage,
        name: &str,
        source: &str,
    ) -> Result<ShaderId, String>;
    fn delete_shader(&mut self, shader: ShaderId);
    fn link_program(&mut self, vert: ShaderId, frag: ShaderId) -> Result<ProgramId, String>;
    fn program_binary(&mut self, program: ProgramId) -> Option<ProgramBinary>;
    fn load_program_binary(&mut self, binary: &ProgramBinary) -> Result<ProgramId, String>;
    fn delete_program(&mut self, program: ProgramId);
    fn attrib_location(&mut self, program: ProgramId, name: &str) -> Option<u32>;
    fn uniform_location(&mut self, program: ProgramId, name: &str) -> Option<UniformLoc>;
    fn use_program(&mut self, program: Option<ProgramId>);

    fn uniform_i32(&mut self, loc: UniformLoc, value: i32);
    fn uniform_vec4(&mut self, loc: UniformLoc, value: &[f32; 4]);
    fn uniform_vec4_array(&mut self, loc: UniformLoc, values: &[[f32; 4]]);
    fn uniform_mat4(&mut self, loc: UniformLoc, value: &[f32; 16]);

    fn create_vertex_array(&mut self) -> Option<VertexArrayId>;
    fn delete_vertex_array(&mut self, vao: VertexArrayId);
    fn bind_vertex_array(&mut self, vao: Option<VertexArrayId>);

    fn create_buffer(
        &mut self,
        target: BufferTarget,
        data: &[u8],
        usage: BufferUsage,
    ) -> Result<BufferId, String>;
    fn update_buffer(&mut self, target: BufferTarget, buffer: BufferId, offset: u32, data: &[u8]);
    fn delete_buffer(&mut self, buffer: BufferId);
    fn bind_buffer(&mut self, target: BufferTarget, buffer: Option<BufferId>);
    fn vertex_attrib(&mut self, location: u32, attrib: &VertexAttrib, stride: i32);
    fn disable_vertex_attrib(&mut self, location: u32);

    fn create_texture(&mut self, upload: &TextureUpload<'_>) -> Result<TextureId, String>;
    fn delete_texture(&mut self, texture: TextureId);
    fn bind_texture(&mut self, unit: u32, texture: Option<TextureId>);

    /// Depth-only render target sampled later as the shadow map.
    fn create_depth_target(&mut self, size: u32) -> Result<(FramebufferId, TextureId), String>;
    fn delete_framebuffer(&mut self, framebuffer: FramebufferId);
    fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferId>);

    fn viewport(&mut self, x: i32, y: i32, width: i32, height: i32);
    fn scissor(&mut self, rect: Option<[i32; 4]>);
    fn set_blend(&mut self, enabled: bool);
    fn set_cull(&mut self, enabled: bool);
    fn set_depth_test(&mut self, enabled: bool);
    fn set_depth_mask(&mut self, write: bool);
    fn set_multisample(&mut self, enabled: bool);
    fn clear(&mut self, color: Option<[f32; 4]>, depth: bool);

    fn draw_indexed(&mut self, topology: Topology, index_type: IndexType, count: u32, byte_offset: u32);
}
