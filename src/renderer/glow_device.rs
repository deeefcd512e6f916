//! [`GraphicsDevice`] over a live OpenGL context via `glow`.
//!
//! All `unsafe` GL calls of the crate live in this file. The context must be
//! current on the calling thread for every method.

use glow::{HasContext, PixelUnpackData};

use crate::renderer::gpu::{
    BufferId, BufferTarget, BufferUsage, DeviceCaps, FramebufferId, GraphicsDevice, IndexType,
    ProgramBinary, ProgramId, ShaderId, ShaderStage, TextureId, TextureUpload, Topology,
    UniformLoc, VertexArrayId,
};
use crate::renderer::vertex::{AttribType, VertexAttrib};

pub struct GlowDevice {
    gl: glow::Context,
    caps: DeviceCaps,
}

impl GlowDevice {
    pub fn new(gl: glow::Context) -> Self {
        let caps = Self::query_caps(&gl);
        log::info!(
            "OpenGL {:?}: derivatives={} vao={} program_binary={}",
            gl.version(),
            caps.derivatives,
            caps.vertex_arrays,
            caps.program_binary
        );
        Self { gl, caps }
    }

    fn query_caps(gl: &glow::Context) -> DeviceCaps {
        let version = gl.version();
        let extensions = gl.supported_extensions();
        let es3 = version.is_embedded && version.major >= 3;
        DeviceCaps {
            derivatives: !version.is_embedded
                || es3
                || extensions.contains("GL_OES_standard_derivatives"),
            vertex_arrays: !version.is_embedded
                || es3
                || extensions.contains("GL_OES_vertex_array_object"),
            program_binary: es3
                || (version.major, version.minor) >= (4, 1)
                || extensions.contains("GL_ARB_get_program_binary"),
            glsl_version: if version.is_embedded {
                "#version 300 es\nprecision highp float;"
            } else {
                "#version 330 core"
            },
        }
    }

    pub fn gl(&self) -> &glow::Context {
        &self.gl
    }
}

fn buffer_target(target: BufferTarget) -> u32 {
    match target {
        BufferTarget::Vertex => glow::ARRAY_BUFFER,
        BufferTarget::Index => glow::ELEMENT_ARRAY_BUFFER,
    }
}

fn attrib_type(ty: AttribType) -> (u32, bool) {
    match ty {
        AttribType::F16 => (glow::HALF_FLOAT, false),
        AttribType::F32 => (glow::FLOAT, false),
        AttribType::I16Norm => (glow::SHORT, true),
        AttribType::U16Norm => (glow::UNSIGNED_SHORT, true),
        AttribType::U8Norm => (glow::UNSIGNED_BYTE, true),
        AttribType::U8 => (glow::UNSIGNED_BYTE, false),
    }
}

fn program(id: ProgramId) -> glow::Program {
    glow::NativeProgram(id.0)
}

fn location(loc: UniformLoc) -> glow::UniformLocation {
    glow::NativeUniformLocation(loc.0)
}

impl GraphicsDevice for GlowDevice {
    fn caps(&self) -> DeviceCaps {
        self.caps
    }

    fn compile_shader(
        &mut self,
        stage: ShaderStage,
        name: &str,
        source: &str,
    ) -> Result<ShaderId, String> {
        let kind = match stage {
            ShaderStage::Vertex => glow::VERTEX_SHADER,
            ShaderStage::Fragment => glow::FRAGMENT_SHADER,
        };
        unsafe {
            let shader = self.gl.create_shader(kind)?;
            self.gl.shader_source(shader, source);
            self.gl.compile_shader(shader);
            if !self.gl.get_shader_compile_status(shader) {
                let log = self.gl.get_shader_info_log(shader);
                self.gl.delete_shader(shader);
                return Err(format!("{name}: {log}"));
            }
            Ok(ShaderId(shader.0))
        }
    }

    fn delete_shader(&mut self, shader: ShaderId) {
        unsafe { self.gl.delete_shader(glow::NativeShader(shader.0)) }
    }

    fn link_program(&mut self, vert: ShaderId, frag: ShaderId) -> Result<ProgramId, String> {
        let (vs, fs) = (glow::NativeShader(vert.0), glow::NativeShader(frag.0));
        unsafe {
            let prog = self.gl.create_program()?;
            self.gl.attach_shader(prog, vs);
            self.gl.attach_shader(prog, fs);
            self.gl.link_program(prog);
            self.gl.detach_shader(prog, vs);
            self.gl.detach_shader(prog, fs);
            if !self.gl.get_program_link_status(prog) {
                let log = self.gl.get_program_info_log(prog);
                self.gl.delete_program(prog);
                return Err(log);
            }
            Ok(ProgramId(prog.0))
        }
    }

    fn program_binary(&mut self, program_id: ProgramId) -> Option<ProgramBinary> {
        if !self.caps.program_binary {
            return None;
        }
        unsafe { self.gl.get_program_binary(program(program_id)) }.map(|bin| ProgramBinary {
            format: bin.format,
            data: bin.buffer,
        })
    }

    fn load_program_binary(&mut self, binary: &ProgramBinary) -> Result<ProgramId, String> {
        if !self.caps.program_binary {
            return Err("program binaries unsupported".to_string());
        }
        unsafe {
            let prog = self.gl.create_program()?;
            let native = glow::ProgramBinary {
                buffer: binary.data.clone(),
                format: binary.format,
            };
            self.gl.program_binary(prog, &native);
            if !self.gl.get_program_link_status(prog) {
                self.gl.delete_program(prog);
                return Err("driver rejected cached binary".to_string());
            }
            Ok(ProgramId(prog.0))
        }
    }

    fn delete_program(&mut self, program_id: ProgramId) {
        unsafe { self.gl.delete_program(program(program_id)) }
    }

    fn attrib_location(&mut self, program_id: ProgramId, name: &str) -> Option<u32> {
        unsafe { self.gl.get_attrib_location(program(program_id), name) }
    }

    fn uniform_location(&mut self, program_id: ProgramId, name: &str) -> Option<UniformLoc> {
        unsafe { self.gl.get_uniform_location(program(program_id), name) }.map(|loc| UniformLoc(loc.0))
    }

    fn use_program(&mut self, program_id: Option<ProgramId>) {
        unsafe { self.gl.use_program(program_id.map(program)) }
    }

    fn uniform_i32(&mut self, loc: UniformLoc, value: i32) {
        unsafe { self.gl.uniform_1_i32(Some(&location(loc)), value) }
    }

    fn uniform_vec4(&mut self, loc: UniformLoc, value: &[f32; 4]) {
        unsafe {
            self.gl
                .uniform_4_f32(Some(&location(loc)), value[0], value[1], value[2], value[3])
        }
    }

    fn uniform_vec4_array(&mut self, loc: UniformLoc, values: &[[f32; 4]]) {
        unsafe {
            self.gl
                .uniform_4_f32_slice(Some(&location(loc)), bytemuck::cast_slice(values))
        }
    }

    fn uniform_mat4(&mut self, loc: UniformLoc, value: &[f32; 16]) {
        unsafe {
            self.gl
                .uniform_matrix_4_f32_slice(Some(&location(loc)), false, value)
        }
    }

    fn create_vertex_array(&mut self) -> Option<VertexArrayId> {
        if !self.caps.vertex_arrays {
            return None;
        }
        unsafe { self.gl.create_vertex_array() }
            .map(|vao| VertexArrayId(vao.0))
            .map_err(|err| log::warn!("Vertex array creation failed: {err}"))
            .ok()
    }

    fn delete_vertex_array(&mut self, vao: VertexArrayId) {
        unsafe { self.gl.delete_vertex_array(glow::NativeVertexArray(vao.0)) }
    }

    fn bind_vertex_array(&mut self, vao: Option<VertexArrayId>) {
        if self.caps.vertex_arrays {
            unsafe {
                self.gl
                    .bind_vertex_array(vao.map(|v| glow::NativeVertexArray(v.0)))
            }
        }
    }

    fn create_buffer(
        &mut self,
        target: BufferTarget,
        data: &[u8],
        usage: BufferUsage,
    ) -> Result<BufferId, String> {
        let usage = match usage {
            BufferUsage::Static => glow::STATIC_DRAW,
            BufferUsage::Dynamic => glow::DYNAMIC_DRAW,
        };
        unsafe {
            let buffer = self.gl.create_buffer()?;
            self.gl.bind_buffer(buffer_target(target), Some(buffer));
            self.gl
                .buffer_data_u8_slice(buffer_target(target), data, usage);
            Ok(BufferId(buffer.0))
        }
    }

    fn update_buffer(&mut self, target: BufferTarget, buffer: BufferId, offset: u32, data: &[u8]) {
        unsafe {
            self.gl
                .bind_buffer(buffer_target(target), Some(glow::NativeBuffer(buffer.0)));
            self.gl
                .buffer_sub_data_u8_slice(buffer_target(target), offset as i32, data);
        }
    }

    fn delete_buffer(&mut self, buffer: BufferId) {
        unsafe { self.gl.delete_buffer(glow::NativeBuffer(buffer.0)) }
    }

    fn bind_buffer(&mut self, target: BufferTarget, buffer: Option<BufferId>) {
        unsafe {
            self.gl
                .bind_buffer(buffer_target(target), buffer.map(|b| glow::NativeBuffer(b.0)))
        }
    }

    fn vertex_attrib(&mut self, loc: u32, attrib: &VertexAttrib, stride: i32) {
        let (ty, normalized) = attrib_type(attrib.ty);
        unsafe {
            self.gl.enable_vertex_attrib_array(loc);
            self.gl.vertex_attrib_pointer_f32(
                loc,
                attrib.components,
                ty,
                normalized,
                stride,
                attrib.offset,
            );
        }
    }

    fn disable_vertex_attrib(&mut self, loc: u32) {
        unsafe { self.gl.disable_vertex_attrib_array(loc) }
    }

    fn create_texture(&mut self, upload: &TextureUpload<'_>) -> Result<TextureId, String> {
        let wrap = if upload.clamp {
            glow::CLAMP_TO_EDGE
        } else {
            glow::REPEAT
        };
        let (min_filter, mag_filter) = match (upload.nearest, upload.mipmaps) {
            (true, true) => (glow::NEAREST_MIPMAP_NEAREST, glow::NEAREST),
            (true, false) => (glow::NEAREST, glow::NEAREST),
            (false, true) => (glow::LINEAR_MIPMAP_LINEAR, glow::LINEAR),
            (false, false) => (glow::LINEAR, glow::LINEAR),
        };
        unsafe {
            let tex = self.gl.create_texture()?;
            self.gl.bind_texture(glow::TEXTURE_2D, Some(tex));
            self.gl.pixel_store_i32(glow::UNPACK_ALIGNMENT, 1);
            self.gl.tex_image_2d(
                glow::TEXTURE_2D,
                0,
                glow::RGBA8 as i32,
                upload.width as i32,
                upload.height as i32,
                0,
                glow::RGBA,
                glow::UNSIGNED_BYTE,
                PixelUnpackData::Slice(Some(upload.pixels)),
            );
            if upload.mipmaps {
                self.gl.generate_mipmap(glow::TEXTURE_2D);
            }
            self.gl
                .tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_S, wrap as i32);
            self.gl
                .tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_T, wrap as i32);
            self.gl
                .tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MIN_FILTER, min_filter as i32);
            self.gl
                .tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MAG_FILTER, mag_filter as i32);
            Ok(TextureId(tex.0))
        }
    }

    fn delete_texture(&mut self, texture: TextureId) {
        unsafe { self.gl.delete_texture(glow::NativeTexture(texture.0)) }
    }

    fn bind_texture(&mut self, unit: u32, texture: Option<TextureId>) {
        unsafe {
            self.gl.active_texture(glow::TEXTURE0 + unit);
            self.gl
                .bind_texture(glow::TEXTURE_2D, texture.map(|t| glow::NativeTexture(t.0)));
        }
    }

    fn create_depth_target(&mut self, size: u32) -> Result<(FramebufferId, TextureId), String> {
        let size = size as i32;
        unsafe {
            let tex = self.gl.create_texture()?;
            self.gl.bind_texture(glow::TEXTURE_2D, Some(tex));
            self.gl.tex_image_2d(
                glow::TEXTURE_2D,
                0,
                glow::DEPTH_COMPONENT24 as i32,
                size,
                size,
                0,
                glow::DEPTH_COMPONENT,
                glow::UNSIGNED_INT,
                PixelUnpackData::Slice(None),
            );
            for (param, value) in [
                (glow::TEXTURE_MIN_FILTER, glow::NEAREST),
                (glow::TEXTURE_MAG_FILTER, glow::NEAREST),
                (glow::TEXTURE_WRAP_S, glow::CLAMP_TO_EDGE),
                (glow::TEXTURE_WRAP_T, glow::CLAMP_TO_EDGE),
            ] {
                self.gl
                    .tex_parameter_i32(glow::TEXTURE_2D, param, value as i32);
            }

            let fb = self.gl.create_framebuffer()?;
            self.gl.bind_framebuffer(glow::FRAMEBUFFER, Some(fb));
            self.gl.framebuffer_texture_2d(
                glow::FRAMEBUFFER,
                glow::DEPTH_ATTACHMENT,
                glow::TEXTURE_2D,
                Some(tex),
                0,
            );
            self.gl.draw_buffers(&[glow::NONE]);
            self.gl.read_buffer(glow::NONE);
            let status = self.gl.check_framebuffer_status(glow::FRAMEBUFFER);
            self.gl.bind_framebuffer(glow::FRAMEBUFFER, None);
            if status != glow::FRAMEBUFFER_COMPLETE {
                self.gl.delete_framebuffer(fb);
                self.gl.delete_texture(tex);
                return Err(format!("shadow framebuffer incomplete: 0x{status:X}"));
            }
            Ok((FramebufferId(fb.0), TextureId(tex.0)))
        }
    }

    fn delete_framebuffer(&mut self, framebuffer: FramebufferId) {
        unsafe { self.gl.delete_framebuffer(glow::NativeFramebuffer(framebuffer.0)) }
    }

    fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferId>) {
        unsafe {
            self.gl.bind_framebuffer(
                glow::FRAMEBUFFER,
                framebuffer.map(|f| glow::NativeFramebuffer(f.0)),
            )
        }
    }

    fn viewport(&mut self, x: i32, y: i32, width: i32, height: i32) {
        unsafe { self.gl.viewport(x, y, width, height) }
    }

    fn scissor(&mut self, rect: Option<[i32; 4]>) {
        unsafe {
            match rect {
                Some([x, y, w, h]) => {
                    self.gl.enable(glow::SCISSOR_TEST);
                    self.gl.scissor(x, y, w, h);
                }
                None => self.gl.disable(glow::SCISSOR_TEST),
            }
        }
    }

    fn set_blend(&mut self, enabled: bool) {
        unsafe {
            if enabled {
                self.gl.enable(glow::BLEND);
                self.gl
                    .blend_func(glow::SRC_ALPHA, glow::ONE_MINUS_SRC_ALPHA);
            } else {
                self.gl.disable(glow::BLEND);
            }
        }
    }

    fn set_cull(&mut self, enabled: bool) {
        unsafe {
            if enabled {
                self.gl.enable(glow::CULL_FACE);
                self.gl.cull_face(glow::BACK);
            } else {
                self.gl.disable(glow::CULL_FACE);
            }
        }
    }

    fn set_depth_test(&mut self, enabled: bool) {
        unsafe {
            if enabled {
                self.gl.enable(glow::DEPTH_TEST);
                self.gl.depth_func(glow::LEQUAL);
            } else {
                self.gl.disable(glow::DEPTH_TEST);
            }
        }
    }

    fn set_depth_mask(&mut self, write: bool) {
        unsafe { self.gl.depth_mask(write) }
    }

    fn set_multisample(&mut self, enabled: bool) {
        if self.caps.glsl_version.contains("es") {
            return;
        }
        unsafe {
            if enabled {
                self.gl.enable(glow::MULTISAMPLE);
            } else {
                self.gl.disable(glow::MULTISAMPLE);
            }
        }
    }

    fn clear(&mut self, color: Option<[f32; 4]>, depth: bool) {
        let mut mask = 0;
        unsafe {
            if let Some([r, g, b, a]) = color {
                self.gl.clear_color(r, g, b, a);
                mask |= glow::COLOR_BUFFER_BIT;
            }
            if depth {
                self.gl.clear_depth_f32(1.0);
                mask |= glow::DEPTH_BUFFER_BIT;
            }
            if mask != 0 {
                self.gl.clear(mask);
            }
        }
    }

    fn draw_indexed(&mut self, topology: Topology, index_type: IndexType, count: u32, byte_offset: u32) {
        let mode = match topology {
            Topology::Triangles => glow::TRIANGLES,
            Topology::Lines => glow::LINES,
            Topology::Points => glow::POINTS,
        };
        let ty = match index_type {
            IndexType::U16 => glow::UNSIGNED_SHORT,
            IndexType::U32 => glow::UNSIGNED_INT,
        };
        unsafe {
            self.gl
                .draw_elements(mode, count as i32, ty, byte_offset as i32)
        }
    }
}

