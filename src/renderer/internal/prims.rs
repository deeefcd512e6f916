//! Streamed world-space primitives, screen quads and bitmap glyphs.

use glam::Vec4;

use crate::asset::Assets;
use crate::error::DrawError;
use crate::renderer::backend::{PrimDesc, PrimGeomUpdate, PrimKind, QuadDesc, SymbolDesc};
use crate::renderer::gpu::{BufferId, BufferTarget, BufferUsage, GraphicsDevice, IndexType, TextureId, Topology};
use crate::renderer::internal::batch::push_tone;
use crate::renderer::internal::params::{MatSlot, SamplerSlot, VecSlot};
use crate::renderer::internal::programs::ProgramVariant;
use crate::renderer::internal::state::{BlendMode, CullMode, RenderState, RenderTarget};
use crate::renderer::ogl::OglBackend;
use crate::renderer::render_context::Context;
use crate::renderer::vertex::PrimVertex;

const CORNER_IDS: [f32; 4] = [0.0, 1.0, 2.0, 3.0];
const CORNER_INDICES: [u16; 6] = [0, 1, 2, 0, 2, 3];

fn dynamic_buffer<D: GraphicsDevice + ?Sized>(
    device: &mut D,
    target: BufferTarget,
    bytes: usize,
    what: &'static str,
) -> Result<BufferId, DrawError> {
    device
        .create_buffer(target, &vec![0u8; bytes], BufferUsage::Dynamic)
        .map_err(|reason| DrawError::Resource { what, reason })
}

/// Dynamic vertex/index pair rewritten by `prim_geom`.
#[derive(Debug)]
pub(crate) struct PrimBuffers {
    pub vbo: BufferId,
    pub ibo: BufferId,
    pub max_vertices: u32,
    pub max_indices: u32,
}

impl PrimBuffers {
    pub(crate) fn create<D: GraphicsDevice + ?Sized>(
        device: &mut D,
        max_vertices: u32,
        max_indices: u32,
    ) -> Result<Self, DrawError> {
        let vertex_bytes = max_vertices as usize * std::mem::size_of::<PrimVertex>();
        let vbo = dynamic_buffer(device, BufferTarget::Vertex, vertex_bytes, "primitive vertices")?;
        let ibo = match dynamic_buffer(device, BufferTarget::Index, max_indices as usize * 2, "primitive indices") {
            Ok(ibo) => ibo,
            Err(err) => {
                device.delete_buffer(vbo);
                return Err(err);
            }
        };
        Ok(Self {
            vbo,
            ibo,
            max_vertices,
            max_indices,
        })
    }

    /// Writes the update; ranges past the allocated size are dropped whole.
    pub(crate) fn update<D: GraphicsDevice + ?Sized>(&self, device: &mut D, update: &PrimGeomUpdate<'_>) {
        if !update.vertices.is_empty() {
            let end = update.vertex_offset as usize + update.vertices.len();
            if end <= self.max_vertices as usize {
                let offset = update.vertex_offset * std::mem::size_of::<PrimVertex>() as u32;
                device.update_buffer(BufferTarget::Vertex, self.vbo, offset, bytemuck::cast_slice(update.vertices));
            } else {
                log::warn!("Primitive vertices {end} exceed capacity {}", self.max_vertices);
            }
        }
        if !update.indices.is_empty() {
            let end = update.index_offset as usize + update.indices.len();
            if end <= self.max_indices as usize {
                device.update_buffer(
                    BufferTarget::Index,
                    self.ibo,
                    update.index_offset * 2,
                    bytemuck::cast_slice(update.indices),
                );
            } else {
                log::warn!("Primitive indices {end} exceed capacity {}", self.max_indices);
            }
        }
    }

    pub(crate) fn destroy<D: GraphicsDevice + ?Sized>(self, device: &mut D) {
        device.delete_buffer(self.vbo);
        device.delete_buffer(self.ibo);
    }
}

/// Static corner ids shared by quads and glyphs.
#[derive(Debug)]
pub(crate) struct CornerBuffers {
    pub vbo: BufferId,
    pub ibo: BufferId,
}

impl CornerBuffers {
    pub(crate) fn create<D: GraphicsDevice + ?Sized>(device: &mut D) -> Result<Self, DrawError> {
        let resource = |reason| DrawError::Resource {
            what: "corner buffers",
            reason,
        };
        let vbo = device
            .create_buffer(BufferTarget::Vertex, bytemuck::cast_slice(&CORNER_IDS), BufferUsage::Static)
            .map_err(resource)?;
        match device.create_buffer(
            BufferTarget::Index,
            bytemuck::cast_slice(&CORNER_INDICES),
            BufferUsage::Static,
        ) {
            Ok(ibo) => Ok(Self { vbo, ibo }),
            Err(reason) => {
                device.delete_buffer(vbo);
                Err(resource(reason))
            }
        }
    }

    pub(crate) fn destroy<D: GraphicsDevice + ?Sized>(self, device: &mut D) {
        device.delete_buffer(self.vbo);
        device.delete_buffer(self.ibo);
    }
}

fn topology(kind: PrimKind) -> Topology {
    match kind {
        PrimKind::Triangles => Topology::Triangles,
        PrimKind::Lines => Topology::Lines,
        PrimKind::Points => Topology::Points,
    }
}

/// Screen-space quad through the shared corner buffers.
fn draw_corners<D: GraphicsDevice + ?Sized>(
    device: &mut D,
    state: &mut RenderState,
    variant: &mut ProgramVariant,
    corners: &CornerBuffers,
    screen: [f32; 2],
    quad: (&[f32; 4], &[f32; 4], Vec4),
    texture: TextureId,
    semi: bool,
) -> bool {
    let Some(program) = variant.program else {
        return false;
    };
    let (rect, tex_rect, color) = quad;
    state.use_program(device, program);
    let params = &mut variant.params;
    let [w, h] = screen;
    params.set_vec4(device, VecSlot::ScreenSize, Vec4::new(w, h, 1.0 / w.max(1.0), 1.0 / h.max(1.0)));
    params.set_vec4(device, VecSlot::QuadRect, Vec4::from_array(*rect));
    params.set_vec4(device, VecSlot::QuadTex, Vec4::from_array(*tex_rect));
    params.set_vec4(device, VecSlot::QuadColor, color);
    state.bind_texture(device, SamplerSlot::Base.unit(), texture);
    state.set_blend(device, if semi { BlendMode::Semi } else { BlendMode::Opaque });
    state.set_cull(device, CullMode::DoubleSided);
    variant.bind_geometry(device, corners.vbo, corners.ibo);
    device.draw_indexed(Topology::Triangles, IndexType::U16, CORNER_INDICES.len() as u32, 0);
    true
}

impl<D: GraphicsDevice> OglBackend<D> {
    pub(crate) fn draw_prim(&mut self, desc: &PrimDesc, ctx: &Context, assets: &Assets) -> bool {
        let Some(prims) = self.prims.as_ref() else {
            return false;
        };
        let (vbo, ibo) = (prims.vbo, prims.ibo);
        let end = desc.first_index as u64 + desc.index_count as u64;
        if desc.index_count == 0 || end > prims.max_indices as u64 {
            return false;
        }
        if !self.programs.as_ref().is_some_and(|t| t.prim.is_valid()) {
            return false;
        }

        self.set_target(RenderTarget::Default);
        let msaa = self.settings.msaa;
        self.state.set_multisample(&mut self.device, msaa);
        let texture = desc
            .texture
            .and_then(|h| self.texture_for(assets, h))
            .or_else(|| self.white_texture());

        let Some(table) = self.programs.as_mut() else {
            return false;
        };
        let variant = &mut table.prim;
        let Some(program) = variant.program else {
            return false;
        };
        self.state.use_program(&mut self.device, program);
        let params = &mut variant.params;
        params.set_mat4(&mut self.device, MatSlot::ViewProj, &ctx.view.view_proj);
        params.set_mat4(&mut self.device, MatSlot::World, &desc.world);
        params.set_vec4(&mut self.device, VecSlot::QuadColor, desc.color);
        push_tone(params, &mut self.device, ctx);
        if let Some(tex) = texture {
            self.state.bind_texture(&mut self.device, SamplerSlot::Base.unit(), tex);
        }

        self.state.set_blend(
            &mut self.device,
            if desc.semi { BlendMode::Semi } else { BlendMode::Opaque },
        );
        self.state.set_cull(
            &mut self.device,
            if desc.double_sided || desc.kind != PrimKind::Triangles {
                CullMode::DoubleSided
            } else {
                CullMode::Back
            },
        );
        self.state.set_depth_mask(&mut self.device, !desc.semi);

        variant.bind_geometry(&mut self.device, vbo, ibo);
        self.device.draw_indexed(
            topology(desc.kind),
            IndexType::U16,
            desc.index_count,
            desc.first_index * 2,
        );
        true
    }

    pub(crate) fn draw_quad(&mut self, desc: &QuadDesc, assets: &Assets) -> bool {
        if self.corners.is_none() || !self.programs.as_ref().is_some_and(|t| t.quad.is_valid()) {
            return false;
        }
        let texture = desc
            .texture
            .and_then(|h| self.texture_for(assets, h))
            .or_else(|| self.white_texture());
        let Some(texture) = texture else {
            return false;
        };
        self.set_target(RenderTarget::Screen);
        let screen = [self.sys.width() as f32, self.sys.height() as f32];
        let (Some(table), Some(corners)) = (self.programs.as_mut(), self.corners.as_ref()) else {
            return false;
        };
        draw_corners(
            &mut self.device,
            &mut self.state,
            &mut table.quad,
            corners,
            screen,
            (&desc.rect, &desc.tex_rect, desc.color),
            texture,
            desc.semi,
        )
    }

    pub(crate) fn draw_symbol(&mut self, desc: &SymbolDesc) -> bool {
        let Some(atlas) = self.font.as_ref() else {
            return false;
        };
        let Some(tex_rect) = atlas.font.glyph_rect(desc.ch) else {
            return false;
        };
        let texture = atlas.texture;
        if self.corners.is_none() || !self.programs.as_ref().is_some_and(|t| t.symbol.is_valid()) {
            return false;
        }
        self.set_target(RenderTarget::Screen);
        let screen = [self.sys.width() as f32, self.sys.height() as f32];
        let rect = [desc.x, desc.y, desc.width, desc.height];
        let (Some(table), Some(corners)) = (self.programs.as_mut(), self.corners.as_ref()) else {
            return false;
        };
        draw_corners(
            &mut self.device,
            &mut self.state,
            &mut table.symbol,
            corners,
            screen,
            (&rect, &tex_rect, desc.color),
            texture,
            true,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::RecordingDevice;

    #[test]
    fn oversized_updates_are_dropped() {
        let mut dev = RecordingDevice::new();
        let prims = PrimBuffers::create(&mut dev, 4, 6).unwrap();
        let verts = [PrimVertex::default(); 4];
        prims.update(
            &mut dev,
            &PrimGeomUpdate {
                vertex_offset: 1,
                vertices: &verts,
                index_offset: 0,
                indices: &[0, 1, 2],
            },
        );
        assert_eq!(dev.stats().buffer_updates, 1);
    }

    #[test]
    fn corner_buffers_are_static_pair() {
        let mut dev = RecordingDevice::new();
        let corners = CornerBuffers::create(&mut dev).unwrap();
        assert_eq!(dev.live_buffers(), 2);
        corners.destroy(&mut dev);
        assert_eq!(dev.live_buffers(), 0);
    }
}
