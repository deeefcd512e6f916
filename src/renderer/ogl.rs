//! The OpenGL draw backend. Generic over the device so the same dispatch
//! engine runs on a live context (`"ogl"`) or headless (`"null"`).

use glam::{Mat4, Vec4};

use crate::asset::{Assets, Font, Handle, Model, TextureData};
use crate::error::DrawError;
use crate::renderer::backend::{
    BackendUnavailable, BatchMode, DrawBackend, DrawStats, GfxResourceHooks, PrimDesc,
    PrimGeomUpdate, QuadDesc, SymbolDesc, SystemInterface, NULL_BACKEND,
};
use crate::renderer::glow_device::GlowDevice;
use crate::renderer::gpu::{GraphicsDevice, TextureId};
use crate::renderer::internal::{
    shadow_bias_matrix, CornerBuffers, GpuResources, ModelGpu, PrimBuffers, ProgramCache,
    ProgramTable, ProgramTableStats, RenderState, RenderTarget, ShadowTarget, TargetSetup,
    VariantKey,
};
use crate::renderer::recording::RecordingDevice;
use crate::renderer::render_context::{Context, ModelWork};
use crate::settings::DrawSettings;

pub(crate) struct FontAtlas {
    pub font: Font,
    pub texture: TextureId,
}

pub struct OglBackend<D: GraphicsDevice> {
    pub(crate) name: &'static str,
    pub(crate) device: D,
    pub(crate) sys: Box<dyn SystemInterface>,
    pub(crate) settings: DrawSettings,
    pub(crate) programs: Option<ProgramTable>,
    pub(crate) program_cache: Option<ProgramCache>,
    pub(crate) state: RenderState,
    pub(crate) resources: GpuResources,
    pub(crate) shadow: Option<ShadowTarget>,
    pub(crate) prims: Option<PrimBuffers>,
    pub(crate) corners: Option<CornerBuffers>,
    pub(crate) font: Option<FontAtlas>,
    pub(crate) frame: u64,
    pub(crate) stats: DrawStats,
}

impl<D: GraphicsDevice> OglBackend<D> {
    pub fn new(name: &'static str, device: D, sys: Box<dyn SystemInterface>, settings: DrawSettings) -> Self {
        let program_cache = settings.program_cache_dir.clone().map(ProgramCache::new);
        Self {
            name,
            device,
            sys,
            settings,
            programs: None,
            program_cache,
            state: RenderState::new(),
            resources: GpuResources::new(),
            shadow: None,
            prims: None,
            corners: None,
            font: None,
            frame: 0,
            stats: DrawStats::default(),
        }
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    pub fn settings(&self) -> &DrawSettings {
        &self.settings
    }

    pub fn is_initialized(&self) -> bool {
        self.programs.is_some()
    }

    pub fn program_stats(&self) -> Option<ProgramTableStats> {
        self.programs.as_ref().map(ProgramTable::stats)
    }

    pub fn has_program(&self, key: VariantKey) -> bool {
        self.programs.as_ref().is_some_and(|table| table.contains(key))
    }

    /// `"vert+frag"` name of the program a batch would use right now, or
    /// `None` when the batch would be skipped.
    pub fn program_label(&self, assets: &Assets, work: &ModelWork, batch_index: usize, mode: BatchMode, ctx: &Context) -> Option<String> {
        let (index, _) = self.resolve_variant(assets, work, batch_index, mode, ctx)?;
        self.programs
            .as_ref()
            .map(|table| table.variant(index).label.clone())
    }

    pub(crate) fn target_setup(&self) -> TargetSetup {
        TargetSetup {
            screen: [self.sys.width() as i32, self.sys.height() as i32],
            shadow_fb: self.shadow.as_ref().map(|s| s.framebuffer),
            shadow_size: self.shadow.as_ref().map_or(0, |s| s.size as i32),
        }
    }

    pub(crate) fn set_target(&mut self, target: RenderTarget) {
        let setup = self.target_setup();
        self.state.set_target(&mut self.device, target, &setup);
    }

    /// Uploads (once) and returns the GPU texture of an asset.
    pub(crate) fn texture_for(&mut self, assets: &Assets, handle: Handle<TextureData>) -> Option<TextureId> {
        if let Some(id) = self.resources.texture(handle) {
            return Some(id);
        }
        let texture = assets.textures.get(handle)?;
        self.upload_texture(handle, texture)
    }

    fn upload_texture(&mut self, handle: Handle<TextureData>, texture: &TextureData) -> Option<TextureId> {
        if let Some(id) = self.resources.texture(handle) {
            return Some(id);
        }
        self.state.detach_for_upload(&mut self.device);
        self.resources.prepare_texture(&mut self.device, handle, texture)
    }

    pub(crate) fn white_texture(&mut self) -> Option<TextureId> {
        if let Some(id) = self.resources.white() {
            return Some(id);
        }
        self.state.detach_for_upload(&mut self.device);
        self.resources.white_texture(&mut self.device)
    }

    /// Uploads (once) and returns the GPU buffers of a model.
    pub(crate) fn model_gpu(&mut self, handle: Handle<Model>, model: &Model) -> ModelGpu {
        let gpu = self.resources.model(handle);
        if gpu.vbo.is_some() {
            return gpu;
        }
        self.state.detach_for_upload(&mut self.device);
        self.resources.prepare_model(&mut self.device, handle, model)
    }

    fn upload_font(&mut self, font: &Font) {
        let atlas = font.atlas();
        let upload = crate::renderer::gpu::TextureUpload {
            width: atlas.width,
            height: atlas.height,
            pixels: &atlas.pixels,
            mipmaps: false,
            nearest: true,
            clamp: true,
        };
        match self.device.create_texture(&upload) {
            Ok(texture) => {
                self.font = Some(FontAtlas {
                    font: font.clone(),
                    texture,
                })
            }
            Err(reason) => log::warn!(
                "{}",
                DrawError::Resource {
                    what: "font atlas",
                    reason
                }
            ),
        }
    }

    fn teardown(&mut self) {
        if let Some(mut table) = self.programs.take() {
            table.destroy(&mut self.device);
        }
        if let Some(shadow) = self.shadow.take() {
            shadow.destroy(&mut self.device);
        }
        if let Some(prims) = self.prims.take() {
            prims.destroy(&mut self.device);
        }
        if let Some(corners) = self.corners.take() {
            corners.destroy(&mut self.device);
        }
        if let Some(font) = self.font.take() {
            self.device.delete_texture(font.texture);
        }
        self.resources.release_all(&mut self.device);
        self.device.use_program(None);
        self.state.invalidate();
    }
}

impl<D: GraphicsDevice> GfxResourceHooks for OglBackend<D> {
    fn prepare_texture(&mut self, handle: Handle<TextureData>, texture: &TextureData) {
        self.upload_texture(handle, texture);
    }

    fn release_texture(&mut self, handle: Handle<TextureData>) {
        if let Some(id) = self.resources.texture(handle) {
            self.state.forget_texture(id);
        }
        self.resources.release_texture(&mut self.device, handle);
    }

    fn prepare_model(&mut self, handle: Handle<Model>, model: &Model) {
        self.model_gpu(handle, model);
    }

    fn release_model(&mut self, handle: Handle<Model>) {
        let freed = self.resources.release_model(&mut self.device, handle);
        if let Some(table) = self.programs.as_mut() {
            for buffer in freed {
                table.forget_buffer(buffer);
            }
        }
    }
}

impl<D: GraphicsDevice> DrawBackend for OglBackend<D> {
    fn name(&self) -> &str {
        self.name
    }

    fn init(&mut self, shadow_map_size: u32, font: Option<&Font>) {
        if self.programs.is_some() {
            log::warn!("Backend {:?} initialised twice; resetting first", self.name);
            self.teardown();
        }
        self.programs = Some(ProgramTable::build(&mut self.device, self.program_cache.as_mut()));

        if shadow_map_size > 0 {
            match ShadowTarget::create(&mut self.device, shadow_map_size) {
                Ok(target) => self.shadow = Some(target),
                Err(err) => log::warn!("Shadows disabled: {err}"),
            }
        }
        match CornerBuffers::create(&mut self.device) {
            Ok(corners) => self.corners = Some(corners),
            Err(err) => log::warn!("Screen quads disabled: {err}"),
        }
        if let Some(font) = font {
            self.upload_font(font);
        }
        self.resources.white_texture(&mut self.device);
        self.state.invalidate();
        log::info!(
            "Backend {:?} ready: {}x{}, shadow map {}",
            self.name,
            self.sys.width(),
            self.sys.height(),
            self.shadow.as_ref().map_or(0, |s| s.size)
        );
    }

    fn reset(&mut self) {
        self.teardown();
        log::info!("Backend {:?} reset", self.name);
    }

    fn screen_width(&self) -> u32 {
        self.sys.width()
    }

    fn screen_height(&self) -> u32 {
        self.sys.height()
    }

    fn shadow_bias_matrix(&self) -> Mat4 {
        shadow_bias_matrix()
    }

    fn init_prims(&mut self, max_vertices: u32, max_indices: u32) {
        if let Some(old) = self.prims.take() {
            if let Some(table) = self.programs.as_mut() {
                table.forget_buffer(old.vbo);
                table.forget_buffer(old.ibo);
            }
            old.destroy(&mut self.device);
        }
        self.state.detach_for_upload(&mut self.device);
        match PrimBuffers::create(&mut self.device, max_vertices, max_indices) {
            Ok(prims) => self.prims = Some(prims),
            Err(err) => log::warn!("Primitives disabled: {err}"),
        }
    }

    fn prim_geom(&mut self, update: &PrimGeomUpdate<'_>) {
        match self.prims.as_ref() {
            Some(prims) => {
                self.state.detach_for_upload(&mut self.device);
                prims.update(&mut self.device, update);
            }
            None => log::trace!("prim_geom before init_prims"),
        }
    }

    fn begin(&mut self, clear_color: Vec4) {
        self.frame += 1;
        self.set_target(RenderTarget::Default);
        self.state.set_depth_mask(&mut self.device, true);
        self.device.clear(Some(clear_color.to_array()), true);
    }

    fn end(&mut self) {
        self.sys.swap();
        self.stats.frames += 1;
    }

    fn batch(&mut self, assets: &Assets, work: &ModelWork, batch_index: usize, mode: BatchMode, ctx: &Context) {
        if self.draw_batch(assets, work, batch_index, mode, ctx) {
            self.stats.batches += 1;
            if mode == BatchMode::ShadowCast {
                self.stats.shadow_casts += 1;
            }
        } else {
            self.stats.skipped += 1;
        }
    }

    fn prim(&mut self, desc: &PrimDesc, ctx: &Context, assets: &Assets) {
        if self.draw_prim(desc, ctx, assets) {
            self.stats.prims += 1;
        } else {
            self.stats.skipped += 1;
        }
    }

    fn quad(&mut self, desc: &QuadDesc, assets: &Assets) {
        if self.draw_quad(desc, assets) {
            self.stats.quads += 1;
        } else {
            self.stats.skipped += 1;
        }
    }

    fn symbol(&mut self, desc: &SymbolDesc) {
        if self.draw_symbol(desc) {
            self.stats.symbols += 1;
        } else {
            self.stats.skipped += 1;
        }
    }

    fn stats(&self) -> DrawStats {
        self.stats
    }
}

impl<D: GraphicsDevice> Drop for OglBackend<D> {
    fn drop(&mut self) {
        if self.programs.is_some() {
            self.teardown();
        }
    }
}

pub(crate) fn create_ogl(
    sys: Box<dyn SystemInterface>,
    settings: &DrawSettings,
) -> Result<Box<dyn DrawBackend>, BackendUnavailable> {
    if sys.get_proc_address(c"glGetString").is_null() {
        return Err(BackendUnavailable {
            error: DrawError::ContextUnavailable("no GL loader".to_string()),
            sys,
        });
    }
    // SAFETY: the loader resolved a core entry point, so a context is current
    // on this thread and stays current for the backend's lifetime.
    let gl = unsafe { glow::Context::from_loader_function_cstr(|name| sys.get_proc_address(name)) };
    let device = GlowDevice::new(gl);
    Ok(Box::new(OglBackend::new("ogl", device, sys, settings.clone())))
}

pub(crate) fn create_null(
    sys: Box<dyn SystemInterface>,
    settings: &DrawSettings,
) -> Result<Box<dyn DrawBackend>, BackendUnavailable> {
    Ok(Box::new(OglBackend::new(
        NULL_BACKEND,
        RecordingDevice::new(),
        sys,
        settings.clone(),
    )))
}
