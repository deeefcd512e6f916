use glam::{Mat4, Vec4};

use crate::error::DrawError;
use crate::renderer::gpu::{FramebufferId, GraphicsDevice, TextureId};

/// Maps clip space [-1, 1] to shadow-map texture space [0, 1].
pub(crate) fn shadow_bias_matrix() -> Mat4 {
    Mat4::from_cols(
        Vec4::new(0.5, 0.0, 0.0, 0.0),
        Vec4::new(0.0, 0.5, 0.0, 0.0),
        Vec4::new(0.0, 0.0, 0.5, 0.0),
        Vec4::new(0.5, 0.5, 0.5, 1.0),
    )
}

/// The single depth target shadow casters render into.
#[derive(Debug)]
pub(crate) struct ShadowTarget {
    pub framebuffer: FramebufferId,
    pub depth: TextureId,
    pub size: u32,
    cleared_frame: Option<u64>,
}

impl ShadowTarget {
    pub(crate) fn create<D: GraphicsDevice + ?Sized>(device: &mut D, size: u32) -> Result<Self, DrawError> {
        let (framebuffer, depth) = device
            .create_depth_target(size)
            .map_err(|reason| DrawError::Resource {
                what: "shadow target",
                reason,
            })?;
        Ok(Self {
            framebuffer,
            depth,
            size,
            cleared_frame: None,
        })
    }

    /// True exactly once per frame: the first caster clears the map.
    pub(crate) fn needs_clear(&mut self, frame: u64) -> bool {
        if self.cleared_frame == Some(frame) {
            return false;
        }
        self.cleared_frame = Some(frame);
        true
    }

    pub(crate) fn destroy<D: GraphicsDevice + ?Sized>(self, device: &mut D) {
        device.delete_framebuffer(self.framebuffer);
        device.delete_texture(self.depth);
    }
}
