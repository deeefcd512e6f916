use std::collections::HashMap;

use crate::error::DrawError;
use crate::renderer::gpu::{
    BufferId, BufferTarget, DeviceCaps, GraphicsDevice, ProgramId, ShaderId, ShaderStage,
    VertexArrayId,
};
use crate::renderer::internal::params::ParamCache;
use crate::renderer::internal::program_cache::{source_digest, ProgramCache};
use crate::renderer::internal::selector::{all_keys, select_key, SelectInput, VariantKey, KEY_SPACE};
use crate::renderer::vertex::{corner_layout, AttribChannel, PrimVertex, VertexLayout};

const MODEL_VERT: &str = include_str!("../../shader/model.vert");
const MODEL_FRAG: &str = include_str!("../../shader/model.frag");
const PRIM_VERT: &str = include_str!("../../shader/prim.vert");
const PRIM_FRAG: &str = include_str!("../../shader/prim.frag");
const QUAD_VERT: &str = include_str!("../../shader/quad.vert");
const QUAD_FRAG: &str = include_str!("../../shader/quad.frag");
const SYMBOL_FRAG: &str = include_str!("../../shader/symbol.frag");

/// One entry of the closed program list.
#[derive(Debug, Clone)]
pub(crate) struct ProgramDesc {
    pub key: Option<VariantKey>,
    pub vert_name: String,
    pub frag_name: String,
    pub vert_source: String,
    pub frag_source: String,
    pub layout: VertexLayout,
}

impl ProgramDesc {
    fn digest(&self) -> u64 {
        source_digest(&self.vert_source, &self.frag_source)
    }

    fn model(key: VariantKey, header: &str) -> Self {
        let defines = key.defines();
        Self {
            key: Some(key),
            vert_name: key.vertex_name(),
            frag_name: key.fragment_name(),
            vert_source: format!("{header}\n{defines}{MODEL_VERT}"),
            frag_source: format!("{header}\n{defines}{MODEL_FRAG}"),
            layout: key.encoding().layout(),
        }
    }

    fn fixed(vert: (&str, &str), frag: (&str, &str), header: &str, layout: VertexLayout) -> Self {
        Self {
            key: None,
            vert_name: vert.0.to_string(),
            frag_name: frag.0.to_string(),
            vert_source: format!("{header}\n{}", vert.1),
            frag_source: format!("{header}\n{}", frag.1),
            layout,
        }
    }

    pub fn label(&self) -> String {
        format!("{}+{}", self.vert_name, self.frag_name)
    }
}

/// A linked (or permanently failed) program with its location tables.
#[derive(Debug)]
pub(crate) struct ProgramVariant {
    pub key: Option<VariantKey>,
    pub label: String,
    /// `None` marks a variant that failed to build; it is never drawn.
    pub program: Option<ProgramId>,
    pub attribs: [Option<u32>; AttribChannel::COUNT],
    pub params: ParamCache,
    pub layout: VertexLayout,
    vao: Option<VertexArrayId>,
    vao_buffers: Option<(BufferId, BufferId)>,
}

impl ProgramVariant {
    fn failed(desc: &ProgramDesc) -> Self {
        Self {
            key: desc.key,
            label: desc.label(),
            program: None,
            attribs: [None; AttribChannel::COUNT],
            params: ParamCache::default(),
            layout: desc.layout,
            vao: None,
            vao_buffers: None,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.program.is_some()
    }

    pub fn has_vao(&self) -> bool {
        self.vao.is_some()
    }

    /// Binds vertex and index buffers. With a VAO the attribute pointers are
    /// only re-specified when the buffers differ from the last call.
    pub fn bind_geometry<D: GraphicsDevice + ?Sized>(&mut self, device: &mut D, vbo: BufferId, ibo: BufferId) {
        if let Some(vao) = self.vao {
            device.bind_vertex_array(Some(vao));
            if self.vao_buffers == Some((vbo, ibo)) {
                return;
            }
            self.vao_buffers = Some((vbo, ibo));
        }
        device.bind_buffer(BufferTarget::Vertex, Some(vbo));
        device.bind_buffer(BufferTarget::Index, Some(ibo));
        for attrib in self.layout.attribs {
            if let Some(loc) = self.attribs[attrib.channel as usize] {
                device.vertex_attrib(loc, attrib, self.layout.stride);
            }
        }
    }

    /// Forgets the VAO's buffer binding, e.g. after those buffers were freed.
    pub fn forget_buffers(&mut self, buffer: BufferId) {
        if matches!(self.vao_buffers, Some((v, i)) if v == buffer || i == buffer) {
            self.vao_buffers = None;
        }
    }

    fn destroy<D: GraphicsDevice + ?Sized>(&mut self, device: &mut D) {
        if let Some(vao) = self.vao.take() {
            device.delete_vertex_array(vao);
        }
        if let Some(program) = self.program.take() {
            device.delete_program(program);
        }
        self.params.reset();
        self.vao_buffers = None;
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ProgramTableStats {
    pub linked: u32,
    pub from_cache: u32,
    pub failed: u32,
}

/// Every program the backend draws with, built once at init.
#[derive(Debug)]
pub(crate) struct ProgramTable {
    variants: Vec<ProgramVariant>,
    lookup: Vec<Option<usize>>,
    pub prim: ProgramVariant,
    pub quad: ProgramVariant,
    pub symbol: ProgramVariant,
    stats: ProgramTableStats,
}

pub(crate) fn descriptors(caps: &DeviceCaps) -> (Vec<ProgramDesc>, [ProgramDesc; 3]) {
    let header = caps.glsl_version;
    let models = all_keys()
        .into_iter()
        .map(|key| ProgramDesc::model(key, header))
        .collect();
    let fixed = [
        ProgramDesc::fixed(("prim", PRIM_VERT), ("prim", PRIM_FRAG), header, PrimVertex::layout()),
        ProgramDesc::fixed(("quad", QUAD_VERT), ("quad", QUAD_FRAG), header, corner_layout()),
        ProgramDesc::fixed(("quad", QUAD_VERT), ("symbol", SYMBOL_FRAG), header, corner_layout()),
    ];
    (models, fixed)
}

struct Builder<'a, D: GraphicsDevice + ?Sized> {
    device: &'a mut D,
    cache: Option<&'a mut ProgramCache>,
    shaders: HashMap<(ShaderStage, String), Option<ShaderId>>,
    stats: ProgramTableStats,
}

impl<'a, D: GraphicsDevice + ?Sized> Builder<'a, D> {
    fn shader(&mut self, stage: ShaderStage, name: &str, source: &str) -> Option<ShaderId> {
        let key = (stage, name.to_string());
        if let Some(shader) = self.shaders.get(&key) {
            return *shader;
        }
        let shader = match self.device.compile_shader(stage, name, source) {
            Ok(shader) => Some(shader),
            Err(log) => {
                let err = DrawError::ShaderCompile {
                    name: format!("{name} ({stage:?})"),
                    log,
                };
                log::warn!("{err}");
                None
            }
        };
        self.shaders.insert(key, shader);
        shader
    }

    fn from_cache(&mut self, desc: &ProgramDesc) -> Option<ProgramId> {
        let cache = self.cache.as_deref()?;
        match cache.load(&desc.vert_name, &desc.frag_name, desc.digest()) {
            Ok(Some(binary)) => match self.device.load_program_binary(&binary) {
                Ok(program) => Some(program),
                Err(reason) => {
                    log::debug!("Cached binary for {} rejected: {reason}", desc.label());
                    cache.evict(&desc.vert_name, &desc.frag_name);
                    None
                }
            },
            Ok(None) => None,
            Err(err) => {
                log::warn!("Ignoring program cache entry for {}: {err}", desc.label());
                cache.evict(&desc.vert_name, &desc.frag_name);
                None
            }
        }
    }

    fn link(&mut self, desc: &ProgramDesc) -> Option<ProgramId> {
        let vert = self.shader(ShaderStage::Vertex, &desc.vert_name, &desc.vert_source)?;
        let frag = self.shader(ShaderStage::Fragment, &desc.frag_name, &desc.frag_source)?;
        match self.device.link_program(vert, frag) {
            Ok(program) => Some(program),
            Err(log) => {
                let err = DrawError::ProgramLink {
                    label: desc.label(),
                    log,
                };
                log::warn!("{err}");
                None
            }
        }
    }

    fn build(&mut self, desc: &ProgramDesc) -> ProgramVariant {
        let mut variant = ProgramVariant::failed(desc);
        let program = match self.from_cache(desc) {
            Some(program) => {
                self.stats.from_cache += 1;
                program
            }
            None => match self.link(desc) {
                Some(program) => {
                    self.store(desc, program);
                    self.stats.linked += 1;
                    program
                }
                None => {
                    self.stats.failed += 1;
                    return variant;
                }
            },
        };

        self.device.use_program(Some(program));
        for channel in AttribChannel::ALL {
            variant.attribs[channel as usize] =
                self.device.attrib_location(program, channel.shader_name());
        }
        variant.params = ParamCache::resolve(&mut *self.device, program);
        variant.vao = self.device.create_vertex_array();
        variant.program = Some(program);
        variant
    }

    fn store(&mut self, desc: &ProgramDesc, program: ProgramId) {
        let Some(cache) = self.cache.as_deref_mut() else {
            return;
        };
        let Some(binary) = self.device.program_binary(program) else {
            return;
        };
        if let Err(err) = cache.store(&desc.vert_name, &desc.frag_name, desc.digest(), &binary) {
            log::warn!("Could not cache program {}: {err}", desc.label());
        }
    }

    fn finish(self) -> ProgramTableStats {
        for shader in self.shaders.into_values().flatten() {
            self.device.delete_shader(shader);
        }
        self.device.use_program(None);
        self.stats
    }
}

impl ProgramTable {
    pub(crate) fn build<D: GraphicsDevice + ?Sized>(device: &mut D, cache: Option<&mut ProgramCache>) -> Self {
        let caps = device.caps();
        let (models, [prim, quad, symbol]) = descriptors(&caps);
        let mut builder = Builder {
            device,
            cache,
            shaders: HashMap::new(),
            stats: ProgramTableStats::default(),
        };

        let mut lookup = vec![None; KEY_SPACE];
        let mut variants = Vec::with_capacity(models.len());
        for desc in &models {
            let variant = builder.build(desc);
            if let Some(key) = desc.key {
                lookup[key.index()] = Some(variants.len());
            }
            variants.push(variant);
        }
        let prim = builder.build(&prim);
        let quad = builder.build(&quad);
        let symbol = builder.build(&symbol);
        let stats = builder.finish();

        let table = Self {
            variants,
            lookup,
            prim,
            quad,
            symbol,
            stats,
        };
        log::info!(
            "Program table: {} variants, {} linked, {} from cache, {} failed",
            table.len() + 3,
            stats.linked,
            stats.from_cache,
            stats.failed
        );
        table
    }

    pub(crate) fn stats(&self) -> ProgramTableStats {
        self.stats
    }

    pub(crate) fn len(&self) -> usize {
        self.variants.len()
    }

    /// Index of the usable variant for `input`, or `None` when the batch has
    /// to be skipped.
    pub(crate) fn select(&self, input: &SelectInput) -> Option<usize> {
        let key = select_key(input)?;
        let index = (*self.lookup.get(key.index())?)?;
        self.variants[index].is_valid().then_some(index)
    }

    /// Whether `key` names a linked model variant.
    pub(crate) fn contains(&self, key: VariantKey) -> bool {
        self.lookup
            .get(key.index())
            .copied()
            .flatten()
            .is_some_and(|index| self.variants[index].is_valid())
    }

    pub(crate) fn variant(&self, index: usize) -> &ProgramVariant {
        &self.variants[index]
    }

    pub(crate) fn variant_mut(&mut self, index: usize) -> &mut ProgramVariant {
        &mut self.variants[index]
    }

    pub(crate) fn forget_buffer(&mut self, buffer: BufferId) {
        for variant in self.variants.iter_mut() {
            variant.forget_buffers(buffer);
        }
        for variant in [&mut self.prim, &mut self.quad, &mut self.symbol] {
            variant.forget_buffers(buffer);
        }
    }

    pub(crate) fn destroy<D: GraphicsDevice + ?Sized>(&mut self, device: &mut D) {
        for variant in self.variants.iter_mut() {
            variant.destroy(device);
        }
        for variant in [&mut self.prim, &mut self.quad, &mut self.symbol] {
            variant.destroy(device);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::backend::BatchMode;
    use crate::renderer::internal::selector::EnvFlags;
    use crate::renderer::material::MaterialFlags;
    use crate::renderer::vertex::VertexEncoding;
    use crate::renderer::RecordingDevice;

    fn opaque_input() -> SelectInput {
        SelectInput {
            mode: BatchMode::Standard,
            encoding: VertexEncoding::Compact,
            skinned: false,
            material: MaterialFlags::CAST_SHADOWS | MaterialFlags::RECEIVE_SHADOWS,
            env: EnvFlags::empty(),
        }
    }

    #[test]
    fn every_descriptor_builds_on_a_healthy_device() {
        let mut dev = RecordingDevice::new();
        let table = ProgramTable::build(&mut dev, None);
        assert_eq!(table.stats().failed, 0);
        assert_eq!(table.stats().linked as usize, table.len() + 3);
        assert!(table.prim.is_valid() && table.quad.is_valid() && table.symbol.is_valid());
        assert!(table.prim.has_vao());
    }

    #[test]
    fn no_vertex_arrays_without_the_capability() {
        let caps = DeviceCaps {
            vertex_arrays: false,
            ..DeviceCaps::default()
        };
        let mut dev = RecordingDevice::with_caps(caps);
        let table = ProgramTable::build(&mut dev, None);
        assert!(!table.quad.has_vao());
        assert_eq!(dev.stats().vertex_arrays_created, 0);
    }

    #[test]
    fn shared_shaders_compile_once() {
        let mut dev = RecordingDevice::new();
        let table = ProgramTable::build(&mut dev, None);
        assert!((dev.stats().shaders_compiled as usize) < 2 * (table.len() + 3));
    }

    #[test]
    fn failed_variant_is_never_selected() {
        let mut dev = RecordingDevice::new().fail_link_for("hemi_opaque");
        let table = ProgramTable::build(&mut dev, None);
        assert!(table.stats().failed > 0);
        assert!(table.select(&opaque_input()).is_none());
        let semi = SelectInput {
            material: opaque_input().material | MaterialFlags::ALPHA,
            ..opaque_input()
        };
        assert!(table.select(&semi).is_some());
    }

    #[test]
    fn cached_binaries_are_reused() {
        let caps = DeviceCaps {
            program_binary: true,
            ..DeviceCaps::default()
        };
        let dir = std::env::temp_dir().join(format!("gl_batch_programs_{}", std::process::id()));
        let mut cache = ProgramCache::new(&dir);

        let mut dev = RecordingDevice::with_caps(caps);
        let first = ProgramTable::build(&mut dev, Some(&mut cache));
        assert_eq!(first.stats().from_cache, 0);

        let mut dev = RecordingDevice::with_caps(caps);
        let second = ProgramTable::build(&mut dev, Some(&mut cache));
        assert_eq!(second.stats().linked, 0);
        assert_eq!(second.stats().from_cache, first.stats().linked);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn changed_sources_relink_instead_of_loading_the_cache() {
        let caps = DeviceCaps {
            program_binary: true,
            ..DeviceCaps::default()
        };
        let dir = std::env::temp_dir().join(format!("gl_batch_programs_edit_{}", std::process::id()));
        let mut cache = ProgramCache::new(&dir);

        let mut dev = RecordingDevice::with_caps(caps);
        let first = ProgramTable::build(&mut dev, Some(&mut cache));

        let edited = DeviceCaps {
            glsl_version: "#version 410 core",
            ..caps
        };
        let mut dev = RecordingDevice::with_caps(edited);
        let second = ProgramTable::build(&mut dev, Some(&mut cache));
        assert_eq!(second.stats().from_cache, 0);
        assert_eq!(second.stats().linked, first.stats().linked);
        assert_eq!(dev.stats().binaries_loaded, 0);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn destroy_releases_programs() {
        let mut dev = RecordingDevice::new();
        let mut table = ProgramTable::build(&mut dev, None);
        table.destroy(&mut dev);
        assert_eq!(dev.live_programs(), 0);
        assert!(table.select(&opaque_input()).is_none());
    }
}
