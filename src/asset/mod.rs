pub mod cache;
pub mod font;
pub mod handle;
pub mod model;
pub mod texture;

pub use cache::AssetCache;
pub use font::Font;
pub use handle::Handle;
pub use model::{Aabb, IndexWidth, MaterialSwap, Model, ModelBatch, Skin, MAX_BATCH_JOINTS};
pub use texture::{TextureData, TextureFlags};

use crate::renderer::GfxResourceHooks;

/// CPU-side resource manager. GPU copies live in the backend's side-table and
/// are released through the backend's [`GfxResourceHooks`] on unload.
pub struct Assets {
    pub models: AssetCache<Model>,
    pub textures: AssetCache<TextureData>,
}

impl Assets {
    pub fn new() -> Self {
        Self {
            models: AssetCache::new(),
            textures: AssetCache::new(),
        }
    }

    pub fn add_model(&mut self, model: Model) -> Handle<Model> {
        self.models.insert(model)
    }

    pub fn add_texture(&mut self, texture: TextureData) -> Handle<TextureData> {
        self.textures.insert(texture)
    }

    pub fn unload_model<H>(&mut self, handle: Handle<Model>, gfx: &mut H) -> Option<Model>
    where
        H: GfxResourceHooks + ?Sized,
    {
        gfx.release_model(handle);
        self.models.remove(handle)
    }

    pub fn unload_texture<H>(
        &mut self,
        handle: Handle<TextureData>,
        gfx: &mut H,
    ) -> Option<TextureData>
    where
        H: GfxResourceHooks + ?Sized,
    {
        gfx.release_texture(handle);
        self.textures.remove(handle)
    }

    /// Releases every GPU copy, e.g. before the backend is reset.
    pub fn release_all<H>(&self, gfx: &mut H)
    where
        H: GfxResourceHooks + ?Sized,
    {
        for (handle, _) in self.models.iter() {
            gfx.release_model(handle);
        }
        for (handle, _) in self.textures.iter() {
            gfx.release_texture(handle);
        }
    }
}

impl Default for Assets {
    fn default() -> Self {
        Self::new()
    }
}
