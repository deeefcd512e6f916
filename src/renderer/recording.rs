//! Headless [`GraphicsDevice`] that records driver traffic instead of
//! issuing it. Backs the `"null"` backend and the test-suite.

use std::collections::{HashMap, HashSet};
use std::num::NonZeroU32;

use crate::renderer::gpu::{
    BufferId, BufferTarget, BufferUsage, DeviceCaps, FramebufferId, GraphicsDevice, IndexType,
    ProgramBinary, ProgramId, ShaderId, ShaderStage, TextureId, TextureUpload, Topology,
    UniformLoc, VertexArrayId,
};
use crate::renderer::vertex::VertexAttrib;

const BINARY_FORMAT: u32 = 0x5245_4344;

/// Texture units captured in each [`DrawRecord`].
pub const RECORDED_UNITS: usize = 6;

/// Per-kind call counters.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DeviceStats {
    pub shaders_compiled: u32,
    pub programs_linked: u32,
    pub link_failures: u32,
    pub binaries_loaded: u32,
    pub program_binds: u32,
    pub uniform_uploads: u32,
    pub sampler_binds: u32,
    pub buffers_created: u32,
    pub buffers_deleted: u32,
    pub buffer_updates: u32,
    pub textures_created: u32,
    pub textures_deleted: u32,
    pub texture_binds: u32,
    pub vertex_arrays_created: u32,
    pub attrib_binds: u32,
    pub framebuffer_binds: u32,
    pub viewports: u32,
    pub blend_enables: u32,
    pub blend_disables: u32,
    pub cull_enables: u32,
    pub cull_disables: u32,
    pub depth_mask_changes: u32,
    pub multisample_changes: u32,
    pub clears: u32,
    pub draws: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawRecord {
    /// `"vert+frag"` label of the program bound at draw time.
    pub program: Option<String>,
    pub topology: Topology,
    pub index_type: IndexType,
    pub count: u32,
    pub byte_offset: u32,
    /// Element buffer the draw actually read from.
    pub index_buffer: Option<BufferId>,
    /// Texture on each sampler unit at draw time.
    pub textures: [Option<TextureId>; RECORDED_UNITS],
}

#[derive(Debug)]
struct ProgramRecord {
    label: String,
    uniforms: HashMap<String, UniformLoc>,
}

#[derive(Debug)]
pub struct RecordingDevice {
    caps: DeviceCaps,
    next_id: u32,
    shaders: HashMap<ShaderId, String>,
    programs: HashMap<ProgramId, ProgramRecord>,
    uniform_names: HashMap<UniformLoc, String>,
    uploads_by_name: HashMap<String, u32>,
    current_program: Option<ProgramId>,
    failing_shaders: HashSet<String>,
    missing_uniforms: HashSet<String>,
    live_buffers: HashSet<BufferId>,
    live_textures: HashSet<TextureId>,
    /// Element buffer binding per vertex array; `None` keys the default one.
    element_buffers: HashMap<Option<VertexArrayId>, BufferId>,
    bound_vao: Option<VertexArrayId>,
    active_unit: u32,
    unit_textures: HashMap<u32, TextureId>,
    stats: DeviceStats,
    draws: Vec<DrawRecord>,
}

impl RecordingDevice {
    pub fn new() -> Self {
        Self::with_caps(DeviceCaps::default())
    }

    pub fn with_caps(caps: DeviceCaps) -> Self {
        Self {
            caps,
            next_id: 0,
            shaders: HashMap::new(),
            programs: HashMap::new(),
            uniform_names: HashMap::new(),
            uploads_by_name: HashMap::new(),
            current_program: None,
            failing_shaders: HashSet::new(),
            missing_uniforms: HashSet::new(),
            live_buffers: HashSet::new(),
            live_textures: HashSet::new(),
            element_buffers: HashMap::new(),
            bound_vao: None,
            active_unit: 0,
            unit_textures: HashMap::new(),
            stats: DeviceStats::default(),
            draws: Vec::new(),
        }
    }

    /// Makes every program linked from the named shader fail.
    pub fn fail_link_for(mut self, shader_name: impl Into<String>) -> Self {
        self.failing_shaders.insert(shader_name.into());
        self
    }

    /// Reports the named uniform as absent from every program.
    pub fn omit_uniform(mut self, name: impl Into<String>) -> Self {
        self.missing_uniforms.insert(name.into());
        self
    }

    pub fn stats(&self) -> &DeviceStats {
        &self.stats
    }

    pub fn draws(&self) -> &[DrawRecord] {
        &self.draws
    }

    /// Clears counters and the draw log; live objects are kept.
    pub fn reset_stats(&mut self) {
        self.stats = DeviceStats::default();
        self.uploads_by_name.clear();
        self.draws.clear();
    }

    /// Uploads recorded against uniforms of the given GLSL name.
    pub fn uploads_of(&self, name: &str) -> u32 {
        self.uploads_by_name.get(name).copied().unwrap_or(0)
    }

    pub fn live_buffers(&self) -> usize {
        self.live_buffers.len()
    }

    pub fn live_textures(&self) -> usize {
        self.live_textures.len()
    }

    pub fn live_programs(&self) -> usize {
        self.programs.len()
    }

    pub fn program_label(&self, program: ProgramId) -> Option<&str> {
        self.programs.get(&program).map(|p| p.label.as_str())
    }

    /// Element buffer of the currently bound vertex array.
    pub fn bound_index_buffer(&self) -> Option<BufferId> {
        self.element_buffers.get(&self.bound_vao).copied()
    }

    pub fn bound_texture(&self, unit: u32) -> Option<TextureId> {
        self.unit_textures.get(&unit).copied()
    }

    /// Binding to the index target lands in the bound vertex array, as in GL.
    fn bind_target(&mut self, target: BufferTarget, buffer: Option<BufferId>) {
        if target != BufferTarget::Index {
            return;
        }
        match buffer {
            Some(buffer) => {
                self.element_buffers.insert(self.bound_vao, buffer);
            }
            None => {
                self.element_buffers.remove(&self.bound_vao);
            }
        }
    }

    /// Texture creation binds on whichever unit is active.
    fn bind_on_active_unit(&mut self, texture: TextureId) {
        self.unit_textures.insert(self.active_unit, texture);
    }

    fn alloc(&mut self) -> NonZeroU32 {
        self.next_id += 1;
        NonZeroU32::new(self.next_id).unwrap_or(NonZeroU32::MIN)
    }

    fn record_upload(&mut self, loc: UniformLoc) {
        self.stats.uniform_uploads += 1;
        if let Some(name) = self.uniform_names.get(&loc) {
            *self.uploads_by_name.entry(name.clone()).or_default() += 1;
        }
    }

    fn register_program(&mut self, label: String) -> ProgramId {
        let id = ProgramId(self.alloc());
        self.programs.insert(
            id,
            ProgramRecord {
                label,
                uniforms: HashMap::new(),
            },
        );
        id
    }
}

impl Default for RecordingDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphicsDevice for RecordingDevice {
    fn caps(&self) -> DeviceCaps {
        self.caps
    }

    fn compile_shader(
        &mut self,
        _stage: ShaderStage,
        name: &str,
        source: &str,
    ) -> Result<ShaderId, String> {
        if source.trim().is_empty() {
            return Err(format!("{name}: empty source"));
        }
        self.stats.shaders_compiled += 1;
        let id = ShaderId(self.alloc());
        self.shaders.insert(id, name.to_string());
        Ok(id)
    }

    fn delete_shader(&mut self, shader: ShaderId) {
        self.shaders.remove(&shader);
    }

    fn link_program(&mut self, vert: ShaderId, frag: ShaderId) -> Result<ProgramId, String> {
        let (Some(vs), Some(fs)) = (self.shaders.get(&vert), self.shaders.get(&frag)) else {
            self.stats.link_failures += 1;
            return Err("unknown shader object".to_string());
        };
        if self.failing_shaders.contains(vs) || self.failing_shaders.contains(fs) {
            self.stats.link_failures += 1;
            return Err(format!("forced link failure for {vs}+{fs}"));
        }
        let label = format!("{vs}+{fs}");
        self.stats.programs_linked += 1;
        Ok(self.register_program(label))
    }

    fn program_binary(&mut self, program: ProgramId) -> Option<ProgramBinary> {
        if !self.caps.program_binary {
            return None;
        }
        self.programs.get(&program).map(|p| ProgramBinary {
            format: BINARY_FORMAT,
            data: p.label.as_bytes().to_vec(),
        })
    }

    fn load_program_binary(&mut self, binary: &ProgramBinary) -> Result<ProgramId, String> {
        if !self.caps.program_binary || binary.format != BINARY_FORMAT {
            return Err("binary format rejected".to_string());
        }
        let label = String::from_utf8(binary.data.clone()).map_err(|e| e.to_string())?;
        if label.split('+').any(|name| self.failing_shaders.contains(name)) {
            return Err(format!("forced link failure for {label}"));
        }
        self.stats.binaries_loaded += 1;
        Ok(self.register_program(label))
    }

    fn delete_program(&mut self, program: ProgramId) {
        if let Some(record) = self.programs.remove(&program) {
            for loc in record.uniforms.values() {
                self.uniform_names.remove(loc);
            }
        }
        if self.current_program == Some(program) {
            self.current_program = None;
        }
    }

    fn attrib_location(&mut self, program: ProgramId, name: &str) -> Option<u32> {
        self.programs.get(&program)?;
        crate::renderer::vertex::AttribChannel::ALL
            .iter()
            .find(|c| c.shader_name() == name)
            .map(|c| *c as u32)
    }

    fn uniform_location(&mut self, program: ProgramId, name: &str) -> Option<UniformLoc> {
        if self.missing_uniforms.contains(name) || !self.programs.contains_key(&program) {
            return None;
        }
        let existing = self
            .programs
            .get(&program)
            .and_then(|p| p.uniforms.get(name).copied());
        if existing.is_some() {
            return existing;
        }
        let loc = UniformLoc(self.alloc().get());
        self.uniform_names.insert(loc, name.to_string());
        if let Some(record) = self.programs.get_mut(&program) {
            record.uniforms.insert(name.to_string(), loc);
        }
        Some(loc)
    }

    fn use_program(&mut self, program: Option<ProgramId>) {
        self.stats.program_binds += 1;
        self.current_program = program;
    }

    fn uniform_i32(&mut self, _loc: UniformLoc, _value: i32) {
        self.stats.sampler_binds += 1;
    }

    fn uniform_vec4(&mut self, loc: UniformLoc, _value: &[f32; 4]) {
        self.record_upload(loc);
    }

    fn uniform_vec4_array(&mut self, loc: UniformLoc, _values: &[[f32; 4]]) {
        self.record_upload(loc);
    }

    fn uniform_mat4(&mut self, loc: UniformLoc, _value: &[f32; 16]) {
        self.record_upload(loc);
    }

    fn create_vertex_array(&mut self) -> Option<VertexArrayId> {
        if !self.caps.vertex_arrays {
            return None;
        }
        self.stats.vertex_arrays_created += 1;
        Some(VertexArrayId(self.alloc()))
    }

    fn delete_vertex_array(&mut self, _vao: VertexArrayId) {}

    fn bind_vertex_array(&mut self, vao: Option<VertexArrayId>) {
        if self.caps.vertex_arrays {
            self.bound_vao = vao;
        }
    }

    fn create_buffer(
        &mut self,
        target: BufferTarget,
        data: &[u8],
        _usage: BufferUsage,
    ) -> Result<BufferId, String> {
        if data.is_empty() {
            return Err("zero-sized buffer".to_string());
        }
        self.stats.buffers_created += 1;
        let id = BufferId(self.alloc());
        self.live_buffers.insert(id);
        self.bind_target(target, Some(id));
        Ok(id)
    }

    fn update_buffer(&mut self, target: BufferTarget, buffer: BufferId, _offset: u32, _data: &[u8]) {
        if self.live_buffers.contains(&buffer) {
            self.stats.buffer_updates += 1;
            self.bind_target(target, Some(buffer));
        }
    }

    fn delete_buffer(&mut self, buffer: BufferId) {
        if self.live_buffers.remove(&buffer) {
            self.stats.buffers_deleted += 1;
            self.element_buffers.retain(|_, bound| *bound != buffer);
        }
    }

    fn bind_buffer(&mut self, target: BufferTarget, buffer: Option<BufferId>) {
        self.bind_target(target, buffer);
    }

    fn vertex_attrib(&mut self, _location: u32, _attrib: &VertexAttrib, _stride: i32) {
        self.stats.attrib_binds += 1;
    }

    fn disable_vertex_attrib(&mut self, _location: u32) {}

    fn create_texture(&mut self, upload: &TextureUpload<'_>) -> Result<TextureId, String> {
        let expected = upload.width as usize * upload.height as usize * 4;
        if upload.pixels.len() != expected {
            return Err(format!(
                "pixel data has {} bytes, expected {expected}",
                upload.pixels.len()
            ));
        }
        self.stats.textures_created += 1;
        let id = TextureId(self.alloc());
        self.live_textures.insert(id);
        self.bind_on_active_unit(id);
        Ok(id)
    }

    fn delete_texture(&mut self, texture: TextureId) {
        if self.live_textures.remove(&texture) {
            self.stats.textures_deleted += 1;
            self.unit_textures.retain(|_, bound| *bound != texture);
        }
    }

    fn bind_texture(&mut self, unit: u32, texture: Option<TextureId>) {
        self.stats.texture_binds += 1;
        self.active_unit = unit;
        match texture {
            Some(texture) => {
                self.unit_textures.insert(unit, texture);
            }
            None => {
                self.unit_textures.remove(&unit);
            }
        }
    }

    fn create_depth_target(&mut self, size: u32) -> Result<(FramebufferId, TextureId), String> {
        if size == 0 {
            return Err("zero-sized depth target".to_string());
        }
        let fb = FramebufferId(self.alloc());
        let tex = TextureId(self.alloc());
        self.live_textures.insert(tex);
        self.bind_on_active_unit(tex);
        Ok((fb, tex))
    }

    fn delete_framebuffer(&mut self, _framebuffer: FramebufferId) {}

    fn bind_framebuffer(&mut self, _framebuffer: Option<FramebufferId>) {
        self.stats.framebuffer_binds += 1;
    }

    fn viewport(&mut self, _x: i32, _y: i32, _width: i32, _height: i32) {
        self.stats.viewports += 1;
    }

    fn scissor(&mut self, _rect: Option<[i32; 4]>) {}

    fn set_blend(&mut self, enabled: bool) {
        if enabled {
            self.stats.blend_enables += 1;
        } else {
            self.stats.blend_disables += 1;
        }
    }

    fn set_cull(&mut self, enabled: bool) {
        if enabled {
            self.stats.cull_enables += 1;
        } else {
            self.stats.cull_disables += 1;
        }
    }

    fn set_depth_test(&mut self, _enabled: bool) {}

    fn set_depth_mask(&mut self, _write: bool) {
        self.stats.depth_mask_changes += 1;
    }

    fn set_multisample(&mut self, _enabled: bool) {
        self.stats.multisample_changes += 1;
    }

    fn clear(&mut self, _color: Option<[f32; 4]>, _depth: bool) {
        self.stats.clears += 1;
    }

    fn draw_indexed(&mut self, topology: Topology, index_type: IndexType, count: u32, byte_offset: u32) {
        self.stats.draws += 1;
        let program = self
            .current_program
            .and_then(|p| self.programs.get(&p))
            .map(|p| p.label.clone());
        let mut textures = [None; RECORDED_UNITS];
        for (unit, slot) in textures.iter_mut().enumerate() {
            *slot = self.bound_texture(unit as u32);
        }
        self.draws.push(DrawRecord {
            program,
            topology,
            index_type,
            count,
            byte_offset,
            index_buffer: self.bound_index_buffer(),
            textures,
        });
    }
}
