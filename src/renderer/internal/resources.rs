//! Backend-owned side-table of GPU copies, indexed by asset handle.

use crate::asset::{Handle, IndexWidth, Model, TextureData, TextureFlags};
use crate::error::DrawError;
use crate::renderer::gpu::{BufferId, BufferTarget, BufferUsage, GraphicsDevice, TextureId, TextureUpload};

/// Joints the skinning shaders can address in one skeleton.
pub(crate) const MAX_SKELETON_JOINTS: usize = 64;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ModelGpu {
    pub vbo: Option<BufferId>,
    pub ibo16: Option<BufferId>,
    pub ibo32: Option<BufferId>,
}

impl ModelGpu {
    pub(crate) fn index_buffer(&self, width: IndexWidth) -> Option<BufferId> {
        match width {
            IndexWidth::U16 => self.ibo16,
            IndexWidth::U32 => self.ibo32,
        }
    }

    fn buffers(&self) -> impl Iterator<Item = BufferId> {
        [self.vbo, self.ibo16, self.ibo32].into_iter().flatten()
    }
}

#[derive(Debug, Default)]
pub(crate) struct GpuResources {
    models: Vec<ModelGpu>,
    textures: Vec<Option<TextureId>>,
    white: Option<TextureId>,
}

fn slot<T: Default>(table: &mut Vec<T>, index: usize) -> &mut T {
    if table.len() <= index {
        table.resize_with(index + 1, T::default);
    }
    &mut table[index]
}

fn buffer<D: GraphicsDevice + ?Sized>(
    device: &mut D,
    target: BufferTarget,
    data: &[u8],
    what: &'static str,
) -> Result<BufferId, DrawError> {
    device
        .create_buffer(target, data, BufferUsage::Static)
        .map_err(|reason| DrawError::Resource { what, reason })
}

impl GpuResources {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn model(&self, handle: Handle<Model>) -> ModelGpu {
        self.models.get(handle.index()).copied().unwrap_or_default()
    }

    pub(crate) fn texture(&self, handle: Handle<TextureData>) -> Option<TextureId> {
        self.textures.get(handle.index()).copied().flatten()
    }

    /// Uploads the model once; later calls return the existing buffers.
    pub(crate) fn prepare_model<D: GraphicsDevice + ?Sized>(
        &mut self,
        device: &mut D,
        handle: Handle<Model>,
        model: &Model,
    ) -> ModelGpu {
        let existing = self.model(handle);
        if existing.vbo.is_some() {
            return existing;
        }
        if model.joint_count() > MAX_SKELETON_JOINTS {
            log::warn!(
                "Model {:?} has {} joints; skinning addresses only {}",
                model.name,
                model.joint_count(),
                MAX_SKELETON_JOINTS
            );
        }
        match Self::upload_model(device, model) {
            Ok(gpu) => {
                *slot(&mut self.models, handle.index()) = gpu;
                gpu
            }
            Err(err) => {
                log::warn!("Model {:?} not uploaded: {err}", model.name);
                ModelGpu::default()
            }
        }
    }

    fn upload_model<D: GraphicsDevice + ?Sized>(device: &mut D, model: &Model) -> Result<ModelGpu, DrawError> {
        let mut gpu = ModelGpu {
            vbo: Some(buffer(device, BufferTarget::Vertex, &model.vertices, "vertex buffer")?),
            ..ModelGpu::default()
        };
        let mut indices = || -> Result<(), DrawError> {
            if !model.indices16.is_empty() {
                let data = bytemuck::cast_slice(&model.indices16);
                gpu.ibo16 = Some(buffer(device, BufferTarget::Index, data, "16-bit index buffer")?);
            }
            if !model.indices32.is_empty() {
                let data = bytemuck::cast_slice(&model.indices32);
                gpu.ibo32 = Some(buffer(device, BufferTarget::Index, data, "32-bit index buffer")?);
            }
            Ok(())
        };
        if let Err(err) = indices() {
            gpu.buffers().for_each(|b| device.delete_buffer(b));
            return Err(err);
        }
        Ok(gpu)
    }

    /// Frees the model's buffers and returns them so cached bindings can be
    /// dropped. Releasing an absent model does nothing.
    pub(crate) fn release_model<D: GraphicsDevice + ?Sized>(
        &mut self,
        device: &mut D,
        handle: Handle<Model>,
    ) -> Vec<BufferId> {
        let Some(entry) = self.models.get_mut(handle.index()) else {
            return Vec::new();
        };
        let freed: Vec<_> = std::mem::take(entry).buffers().collect();
        for &b in &freed {
            device.delete_buffer(b);
        }
        freed
    }

    pub(crate) fn prepare_texture<D: GraphicsDevice + ?Sized>(
        &mut self,
        device: &mut D,
        handle: Handle<TextureData>,
        texture: &TextureData,
    ) -> Option<TextureId> {
        if let Some(id) = self.texture(handle) {
            return Some(id);
        }
        match Self::upload_texture(device, texture) {
            Ok(id) => {
                *slot(&mut self.textures, handle.index()) = Some(id);
                Some(id)
            }
            Err(err) => {
                log::warn!("Texture {:?} not uploaded: {err}", texture.name);
                None
            }
        }
    }

    fn upload_texture<D: GraphicsDevice + ?Sized>(device: &mut D, texture: &TextureData) -> Result<TextureId, DrawError> {
        device
            .create_texture(&TextureUpload {
                width: texture.width,
                height: texture.height,
                pixels: &texture.pixels,
                mipmaps: texture.flags.contains(TextureFlags::MIPMAPS),
                nearest: texture.flags.contains(TextureFlags::NEAREST),
                clamp: texture.flags.contains(TextureFlags::CLAMP),
            })
            .map_err(|reason| DrawError::Resource {
                what: "texture",
                reason,
            })
    }

    pub(crate) fn release_texture<D: GraphicsDevice + ?Sized>(&mut self, device: &mut D, handle: Handle<TextureData>) {
        if let Some(id) = self.textures.get_mut(handle.index()).and_then(Option::take) {
            device.delete_texture(id);
        }
    }

    pub(crate) fn white(&self) -> Option<TextureId> {
        self.white
    }

    /// 1x1 opaque white stand-in for materials without a base map.
    pub(crate) fn white_texture<D: GraphicsDevice + ?Sized>(&mut self, device: &mut D) -> Option<TextureId> {
        if self.white.is_none() {
            let white = TextureData::solid("white", 1, 1, [255; 4]);
            self.white = Self::upload_texture(device, &white)
                .map_err(|err| log::warn!("White texture not uploaded: {err}"))
                .ok();
        }
        self.white
    }

    pub(crate) fn release_all<D: GraphicsDevice + ?Sized>(&mut self, device: &mut D) {
        for gpu in self.models.drain(..) {
            gpu.buffers().for_each(|b| device.delete_buffer(b));
        }
        for id in self.textures.drain(..).flatten() {
            device.delete_texture(id);
        }
        if let Some(id) = self.white.take() {
            device.delete_texture(id);
        }
    }
}
