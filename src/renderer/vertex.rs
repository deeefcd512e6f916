use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};
use half::f16;

/// The two interchangeable packings of model geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexEncoding {
    /// Half-float position and texcoord, byte colour and weights.
    Compact,
    /// Quantised 16-bit position, float texcoord, 16-bit colour and weights.
    Extended,
}

impl VertexEncoding {
    pub const ALL: [VertexEncoding; 2] = [VertexEncoding::Compact, VertexEncoding::Extended];

    /// Short tag used in shader program names.
    pub fn tag(self) -> &'static str {
        match self {
            VertexEncoding::Compact => "h",
            VertexEncoding::Extended => "s",
        }
    }

    pub fn layout(self) -> VertexLayout {
        match self {
            VertexEncoding::Compact => VertexCompact::layout(),
            VertexEncoding::Extended => VertexExtended::layout(),
        }
    }
}

/// Logical vertex channels; the discriminant is the attribute slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttribChannel {
    Position = 0,
    OctNormal,
    Color,
    TexCoord,
    Weights,
    Joints,
    PrimExtra,
    InstanceId,
}

impl AttribChannel {
    pub const COUNT: usize = 8;

    pub const ALL: [AttribChannel; Self::COUNT] = [
        AttribChannel::Position,
        AttribChannel::OctNormal,
        AttribChannel::Color,
        AttribChannel::TexCoord,
        AttribChannel::Weights,
        AttribChannel::Joints,
        AttribChannel::PrimExtra,
        AttribChannel::InstanceId,
    ];

    /// Attribute name in the GLSL sources.
    pub fn shader_name(self) -> &'static str {
        match self {
            AttribChannel::Position => "vtxPos",
            AttribChannel::OctNormal => "vtxOct",
            AttribChannel::Color => "vtxClr",
            AttribChannel::TexCoord => "vtxTex",
            AttribChannel::Weights => "vtxWgt",
            AttribChannel::Joints => "vtxJnt",
            AttribChannel::PrimExtra => "vtxPrm",
            AttribChannel::InstanceId => "vtxId",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttribType {
    F16,
    F32,
    I16Norm,
    U16Norm,
    U8Norm,
    /// Raw bytes read as floats (joint indices).
    U8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexAttrib {
    pub channel: AttribChannel,
    pub components: i32,
    pub ty: AttribType,
    pub offset: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexLayout {
    pub stride: i32,
    pub attribs: &'static [VertexAttrib],
}

impl VertexLayout {
    pub fn attrib(&self, channel: AttribChannel) -> Option<&VertexAttrib> {
        self.attribs.iter().find(|a| a.channel == channel)
    }
}

const fn attr(channel: AttribChannel, components: i32, ty: AttribType, offset: i32) -> VertexAttrib {
    VertexAttrib {
        channel,
        components,
        ty,
        offset,
    }
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable, Debug)]
pub struct VertexCompact {
    pub pos: [f16; 4],
    pub oct: [f16; 2],
    pub clr: [u8; 4],
    pub tex: [f16; 2],
    pub wgt: [u8; 4],
    pub jnt: [u8; 4],
}

impl VertexCompact {
    const ATTRS: [VertexAttrib; 6] = [
        attr(AttribChannel::Position, 3, AttribType::F16, 0),
        attr(AttribChannel::OctNormal, 2, AttribType::F16, 8),
        attr(AttribChannel::Color, 4, AttribType::U8Norm, 12),
        attr(AttribChannel::TexCoord, 2, AttribType::F16, 16),
        attr(AttribChannel::Weights, 4, AttribType::U8Norm, 20),
        attr(AttribChannel::Joints, 4, AttribType::U8, 24),
    ];

    pub fn layout() -> VertexLayout {
        VertexLayout {
            stride: std::mem::size_of::<VertexCompact>() as i32,
            attribs: &Self::ATTRS,
        }
    }

    pub fn new(pos: Vec3, normal: Vec3, tex: Vec2) -> Self {
        let oct = encode_oct(normal);
        Self {
            pos: [
                f16::from_f32(pos.x),
                f16::from_f32(pos.y),
                f16::from_f32(pos.z),
                f16::ONE,
            ],
            oct: [f16::from_f32(oct.x), f16::from_f32(oct.y)],
            clr: [255; 4],
            tex: [f16::from_f32(tex.x), f16::from_f32(tex.y)],
            wgt: [0; 4],
            jnt: [0; 4],
        }
    }

    /// Weights are renormalised into bytes; joints index the batch joint list.
    pub fn with_skin(mut self, weights: [f32; 4], joints: [u8; 4]) -> Self {
        self.wgt = weights.map(|w| (w.clamp(0.0, 1.0) * 255.0).round() as u8);
        self.jnt = joints;
        self
    }
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable, Debug)]
pub struct VertexExtended {
    pub pos: [i16; 4],
    pub oct: [i16; 2],
    pub clr: [u16; 4],
    pub tex: [f32; 2],
    pub wgt: [u16; 4],
    pub jnt: [u8; 4],
}

impl VertexExtended {
    const ATTRS: [VertexAttrib; 6] = [
        attr(AttribChannel::Position, 3, AttribType::I16Norm, 0),
        attr(AttribChannel::OctNormal, 2, AttribType::I16Norm, 8),
        attr(AttribChannel::Color, 4, AttribType::U16Norm, 12),
        attr(AttribChannel::TexCoord, 2, AttribType::F32, 20),
        attr(AttribChannel::Weights, 4, AttribType::U16Norm, 28),
        attr(AttribChannel::Joints, 4, AttribType::U8, 36),
    ];

    pub fn layout() -> VertexLayout {
        VertexLayout {
            stride: std::mem::size_of::<VertexExtended>() as i32,
            attribs: &Self::ATTRS,
        }
    }

    /// Quantises `pos` into [-1, 1] relative to `base`/`scale`; the vertex
    /// shader reverses this with the model's dequantisation uniforms.
    pub fn new(pos: Vec3, normal: Vec3, tex: Vec2, base: Vec3, scale: Vec3) -> Self {
        let q = (pos - base) / scale.max(Vec3::splat(f32::EPSILON));
        let oct = encode_oct(normal);
        Self {
            pos: [snorm16(q.x), snorm16(q.y), snorm16(q.z), i16::MAX],
            oct: [snorm16(oct.x), snorm16(oct.y)],
            clr: [u16::MAX; 4],
            tex: tex.to_array(),
            wgt: [0; 4],
            jnt: [0; 4],
        }
    }

    pub fn with_skin(mut self, weights: [f32; 4], joints: [u8; 4]) -> Self {
        self.wgt = weights.map(|w| (w.clamp(0.0, 1.0) * 65535.0).round() as u16);
        self.jnt = joints;
        self
    }
}

/// Streamed geometry for world-space primitives.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable, Debug, Default)]
pub struct PrimVertex {
    pub pos: [f32; 3],
    pub tex: [f32; 2],
    pub clr: [f32; 4],
    pub prm: [f32; 3],
}

impl PrimVertex {
    const ATTRS: [VertexAttrib; 4] = [
        attr(AttribChannel::Position, 3, AttribType::F32, 0),
        attr(AttribChannel::TexCoord, 2, AttribType::F32, 12),
        attr(AttribChannel::Color, 4, AttribType::F32, 20),
        attr(AttribChannel::PrimExtra, 3, AttribType::F32, 36),
    ];

    pub fn layout() -> VertexLayout {
        VertexLayout {
            stride: std::mem::size_of::<PrimVertex>() as i32,
            attribs: &Self::ATTRS,
        }
    }
}

/// Corner-index layout shared by screen quads and glyphs.
pub(crate) fn corner_layout() -> VertexLayout {
    const ATTRS: [VertexAttrib; 1] = [attr(AttribChannel::InstanceId, 1, AttribType::F32, 0)];
    VertexLayout {
        stride: 4,
        attribs: &ATTRS,
    }
}

fn snorm16(v: f32) -> i16 {
    (v.clamp(-1.0, 1.0) * 32767.0).round() as i16
}

/// Octahedral normal encoding into [-1, 1]^2.
pub fn encode_oct(n: Vec3) -> Vec2 {
    let n = n.normalize_or_zero();
    let l1 = n.x.abs() + n.y.abs() + n.z.abs();
    if l1 == 0.0 {
        return Vec2::ZERO;
    }
    let p = Vec2::new(n.x, n.y) / l1;
    if n.z >= 0.0 {
        p
    } else {
        let sign = Vec2::new(p.x.signum(), p.y.signum());
        (Vec2::ONE - Vec2::new(p.y.abs(), p.x.abs())) * sign
    }
}

pub fn decode_oct(e: Vec2) -> Vec3 {
    let z = 1.0 - e.x.abs() - e.y.abs();
    let (x, y) = if z < 0.0 {
        let sign = Vec2::new(e.x.signum(), e.y.signum());
        let folded = (Vec2::ONE - Vec2::new(e.y.abs(), e.x.abs())) * sign;
        (folded.x, folded.y)
    } else {
        (e.x, e.y)
    };
    Vec3::new(x, y, z).normalize_or_zero()
}
