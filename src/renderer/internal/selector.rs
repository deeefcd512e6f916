//! Maps a batch's feature vector to one model program variant.
//!
//! The decision is pure: [`select_key`] turns the inputs into a canonical
//! [`VariantKey`], and the program table resolves keys through a flat array
//! built once at init.

use bitflags::bitflags;

use crate::renderer::backend::BatchMode;
use crate::renderer::material::MaterialFlags;
use crate::renderer::vertex::VertexEncoding;

bitflags! {
    /// Canonical identity of a model program variant. Only keys produced by
    /// [`all_keys`] name a program.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct VariantKey: u16 {
        const CAST = 1 << 0;
        const SEMI = 1 << 1;
        const EXTENDED = 1 << 2;
        const SKIN = 1 << 3;
        const RECV = 1 << 4;
        const VERTEX_LIT = 1 << 5;
        const BUMP = 1 << 6;
        const SPEC = 1 << 7;
        const CUTOUT = 1 << 8;
        /// Alpha-tested shadow caster.
        const CAST_ALPHA = 1 << 9;
    }
}

/// Number of slots in the flat key table.
pub(crate) const KEY_SPACE: usize = 1 << 10;

bitflags! {
    /// Per-frame and per-batch conditions outside the material.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct EnvFlags: u8 {
        const VERTEX_LIGHTING = 1 << 0;
        /// Derivatives supported and a bump texture is bound.
        const BUMP_AVAILABLE = 1 << 1;
        const SPEC_ENABLED = 1 << 2;
        const SHADOW_MAP = 1 << 3;
        /// Shadows enabled and the batch lies inside the fade distance.
        const SHADOW_IN_RANGE = 1 << 4;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SelectInput {
    pub mode: BatchMode,
    pub encoding: VertexEncoding,
    pub skinned: bool,
    pub material: MaterialFlags,
    pub env: EnvFlags,
}

/// Whether the batch is blended: alpha materials blend unless the discard
/// pass draws them opaque without a force-blend override.
pub fn is_semi(mode: BatchMode, material: MaterialFlags) -> bool {
    material.contains(MaterialFlags::ALPHA)
        && !(mode == BatchMode::Discard && !material.contains(MaterialFlags::FORCE_BLEND))
}

/// Returns `None` only for shadow-cast requests the batch cannot honour.
pub fn select_key(input: &SelectInput) -> Option<VariantKey> {
    let mut key = VariantKey::empty();
    key.set(VariantKey::EXTENDED, input.encoding == VertexEncoding::Extended);
    key.set(VariantKey::SKIN, input.skinned);

    if input.mode == BatchMode::ShadowCast {
        if !input.material.contains(MaterialFlags::CAST_SHADOWS)
            || !input.env.contains(EnvFlags::SHADOW_MAP)
        {
            return None;
        }
        key |= VariantKey::CAST;
        key.set(
            VariantKey::CAST_ALPHA,
            input.material.contains(MaterialFlags::ALPHA),
        );
        return Some(key);
    }

    let recv = input
        .env
        .contains(EnvFlags::SHADOW_MAP | EnvFlags::SHADOW_IN_RANGE)
        && input.material.contains(MaterialFlags::RECEIVE_SHADOWS);
    let vertex_lit = input.env.contains(EnvFlags::VERTEX_LIGHTING);
    let spec = input.env.contains(EnvFlags::SPEC_ENABLED)
        && (input.material.contains(MaterialFlags::BASE_ALPHA_SPEC)
            || input.material.contains(MaterialFlags::SPECULAR));
    // Per-pixel only: vertex lighting has no tangent frame.
    let bump = !vertex_lit && input.env.contains(EnvFlags::BUMP_AVAILABLE);

    key.set(VariantKey::RECV, recv);
    key.set(VariantKey::VERTEX_LIT, vertex_lit);
    key.set(VariantKey::SPEC, spec);
    key.set(VariantKey::BUMP, bump);

    if is_semi(input.mode, input.material) {
        key |= VariantKey::SEMI;
        key.set(
            VariantKey::CUTOUT,
            input.material.contains(MaterialFlags::CUTOUT),
        );
    }
    Some(key)
}

/// Every key that names a model program, in table order.
pub(crate) fn all_keys() -> Vec<VariantKey> {
    let mut keys = Vec::new();
    for enc in [VariantKey::empty(), VariantKey::EXTENDED] {
        for skin in [VariantKey::empty(), VariantKey::SKIN] {
            for alpha in [VariantKey::empty(), VariantKey::CAST_ALPHA] {
                keys.push(VariantKey::CAST | enc | skin | alpha);
            }
        }
    }
    let features = [
        // Vertex lighting: specular only.
        (VariantKey::VERTEX_LIT, VariantKey::empty()),
        (VariantKey::VERTEX_LIT, VariantKey::SPEC),
        (VariantKey::empty(), VariantKey::empty()),
        (VariantKey::empty(), VariantKey::SPEC),
        (VariantKey::empty(), VariantKey::BUMP),
        (VariantKey::empty(), VariantKey::BUMP | VariantKey::SPEC),
    ];
    for blend in [
        VariantKey::empty(),
        VariantKey::SEMI,
        VariantKey::SEMI | VariantKey::CUTOUT,
    ] {
        for (lighting, feature) in features {
            for enc in [VariantKey::empty(), VariantKey::EXTENDED] {
                for skin in [VariantKey::empty(), VariantKey::SKIN] {
                    for recv in [VariantKey::empty(), VariantKey::RECV] {
                        keys.push(blend | lighting | feature | enc | skin | recv);
                    }
                }
            }
        }
    }
    keys
}

impl VariantKey {
    pub(crate) fn index(self) -> usize {
        self.bits() as usize
    }

    pub fn encoding(self) -> VertexEncoding {
        if self.contains(VariantKey::EXTENDED) {
            VertexEncoding::Extended
        } else {
            VertexEncoding::Compact
        }
    }

    pub fn vertex_name(self) -> String {
        let skin = if self.contains(VariantKey::SKIN) {
            "skin"
        } else {
            "rigid"
        };
        let tag = self.encoding().tag();
        if self.contains(VariantKey::CAST) {
            return format!("cast_{tag}_{skin}");
        }
        let mut name = format!("model_{tag}_{skin}");
        if self.contains(VariantKey::VERTEX_LIT) {
            name.push_str("_vlit");
            if self.contains(VariantKey::SPEC) {
                name.push_str("_spec");
            }
        }
        if self.contains(VariantKey::RECV) {
            name.push_str("_recv");
        }
        name
    }

    pub fn fragment_name(self) -> String {
        if self.contains(VariantKey::CAST) {
            return if self.contains(VariantKey::CAST_ALPHA) {
                "cast_alpha".to_string()
            } else {
                "cast".to_string()
            };
        }
        let mut name = String::from(if self.contains(VariantKey::VERTEX_LIT) {
            "vlit"
        } else {
            "hemi"
        });
        if self.contains(VariantKey::BUMP) {
            name.push_str("_bump");
        }
        if self.contains(VariantKey::SPEC) {
            name.push_str("_spec");
        }
        if self.contains(VariantKey::CUTOUT) {
            name.push_str("_cutout");
        }
        name.push_str(if self.contains(VariantKey::SEMI) {
            "_semi"
        } else {
            "_opaque"
        });
        if self.contains(VariantKey::RECV) {
            name.push_str("_recv");
        }
        name
    }

    /// `"vert+frag"`, the name pair identifying the program.
    pub fn label(self) -> String {
        format!("{}+{}", self.vertex_name(), self.fragment_name())
    }

    /// Preprocessor switches prepended to the shared model sources.
    pub(crate) fn defines(self) -> String {
        const SWITCHES: [(VariantKey, &str); 10] = [
            (VariantKey::CAST, "CAST"),
            (VariantKey::SEMI, "SEMI"),
            (VariantKey::EXTENDED, "EXTENDED"),
            (VariantKey::SKIN, "SKIN"),
            (VariantKey::RECV, "RECV"),
            (VariantKey::VERTEX_LIT, "VERTEX_LIT"),
            (VariantKey::BUMP, "BUMP"),
            (VariantKey::SPEC, "SPEC"),
            (VariantKey::CUTOUT, "CUTOUT"),
            (VariantKey::CAST_ALPHA, "CAST_ALPHA"),
        ];
        SWITCHES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| format!("#define {name}\n"))
            .collect()
    }
}
