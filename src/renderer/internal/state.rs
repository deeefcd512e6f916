use crate::renderer::gpu::{FramebufferId, GraphicsDevice, ProgramId, TextureId};

const TEXTURE_UNITS: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BlendMode {
    Opaque,
    Semi,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CullMode {
    DoubleSided,
    Back,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RenderTarget {
    Default,
    Shadow,
    /// Default framebuffer without depth, for quads and glyphs.
    Screen,
}

/// Everything a framebuffer switch needs to reconfigure viewport and depth.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TargetSetup {
    pub screen: [i32; 2],
    pub shadow_fb: Option<FramebufferId>,
    pub shadow_size: i32,
}

/// Cached fixed-function state. `None` means unknown: the next request
/// always reaches the driver.
#[derive(Debug, Default)]
pub(crate) struct RenderState {
    blend: Option<BlendMode>,
    cull: Option<CullMode>,
    target: Option<RenderTarget>,
    program: Option<ProgramId>,
    depth_mask: Option<bool>,
    multisample: Option<bool>,
    textures: [Option<TextureId>; TEXTURE_UNITS],
    active_unit: Option<u32>,
    /// Window size the default-framebuffer viewport was last set for.
    screen: Option<[i32; 2]>,
}

impl RenderState {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn set_blend<D: GraphicsDevice + ?Sized>(&mut self, device: &mut D, mode: BlendMode) {
        if self.blend != Some(mode) {
            device.set_blend(mode == BlendMode::Semi);
            self.blend = Some(mode);
        }
    }

    pub(crate) fn set_cull<D: GraphicsDevice + ?Sized>(&mut self, device: &mut D, mode: CullMode) {
        if self.cull != Some(mode) {
            device.set_cull(mode == CullMode::Back);
            self.cull = Some(mode);
        }
    }

    pub(crate) fn set_depth_mask<D: GraphicsDevice + ?Sized>(&mut self, device: &mut D, write: bool) {
        if self.depth_mask != Some(write) {
            device.set_depth_mask(write);
            self.depth_mask = Some(write);
        }
    }

    pub(crate) fn set_multisample<D: GraphicsDevice + ?Sized>(&mut self, device: &mut D, enabled: bool) {
        if self.multisample != Some(enabled) {
            device.set_multisample(enabled);
            self.multisample = Some(enabled);
        }
    }

    /// Binds `program` unless it is already current.
    pub(crate) fn use_program<D: GraphicsDevice + ?Sized>(&mut self, device: &mut D, program: ProgramId) {
        if self.program != Some(program) {
            device.use_program(Some(program));
            self.program = Some(program);
        }
    }

    pub(crate) fn bind_texture<D: GraphicsDevice + ?Sized>(
        &mut self,
        device: &mut D,
        unit: u32,
        texture: TextureId,
    ) {
        let Some(bound) = self.textures.get_mut(unit as usize) else {
            device.bind_texture(unit, Some(texture));
            self.active_unit = Some(unit);
            return;
        };
        if *bound != Some(texture) {
            device.bind_texture(unit, Some(texture));
            *bound = Some(texture);
            self.active_unit = Some(unit);
        }
    }

    /// Buffer and texture creation bind through the driver's live state:
    /// index data lands in the bound vertex array and a new texture replaces
    /// the one on the active unit. Call before any upload.
    pub(crate) fn detach_for_upload<D: GraphicsDevice + ?Sized>(&mut self, device: &mut D) {
        device.bind_vertex_array(None);
        if let Some(bound) = self
            .active_unit
            .and_then(|unit| self.textures.get_mut(unit as usize))
        {
            *bound = None;
        }
    }

    /// Drops a texture from the unit cache once it has been deleted.
    pub(crate) fn forget_texture(&mut self, texture: TextureId) {
        for bound in self.textures.iter_mut() {
            if *bound == Some(texture) {
                *bound = None;
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn current_target(&self) -> Option<RenderTarget> {
        self.target
    }

    /// Switches framebuffer, then forces blend and cull back to opaque and
    /// back-face culling.
    pub(crate) fn set_target<D: GraphicsDevice + ?Sized>(
        &mut self,
        device: &mut D,
        target: RenderTarget,
        setup: &TargetSetup,
    ) {
        let [w, h] = setup.screen;
        if self.target == Some(target) {
            if target != RenderTarget::Shadow && self.screen != Some(setup.screen) {
                device.viewport(0, 0, w, h);
                if target == RenderTarget::Screen {
                    device.scissor(Some([0, 0, w, h]));
                }
                self.screen = Some(setup.screen);
            }
            return;
        }
        match target {
            RenderTarget::Default => {
                device.bind_framebuffer(None);
                device.viewport(0, 0, w, h);
                device.scissor(None);
                device.set_depth_test(true);
                self.set_depth_mask(device, true);
            }
            RenderTarget::Shadow => {
                device.bind_framebuffer(setup.shadow_fb);
                device.viewport(0, 0, setup.shadow_size, setup.shadow_size);
                device.scissor(None);
                device.set_depth_test(true);
                self.set_depth_mask(device, true);
            }
            RenderTarget::Screen => {
                device.bind_framebuffer(None);
                device.viewport(0, 0, w, h);
                device.scissor(Some([0, 0, w, h]));
                device.set_depth_test(false);
                self.set_depth_mask(device, false);
            }
        }
        if target != RenderTarget::Shadow {
            self.screen = Some(setup.screen);
        }
        self.target = Some(target);
        self.blend = None;
        self.cull = None;
        self.set_blend(device, BlendMode::Opaque);
        self.set_cull(device, CullMode::Back);
    }

    /// Drops every cached value, e.g. after the context was handed to
    /// foreign code or the programs were destroyed.
    pub(crate) fn invalidate(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::RecordingDevice;

    fn setup() -> TargetSetup {
        TargetSetup {
            screen: [640, 480],
            shadow_fb: None,
            shadow_size: 1024,
        }
    }

    #[test]
    fn repeated_semi_enables_blend_once() {
        let mut dev = RecordingDevice::new();
        let mut state = RenderState::new();
        for _ in 0..10 {
            state.set_blend(&mut dev, BlendMode::Semi);
        }
        assert_eq!(dev.stats().blend_enables, 1);
    }

    #[test]
    fn toggling_reaches_driver_each_time() {
        let mut dev = RecordingDevice::new();
        let mut state = RenderState::new();
        state.set_cull(&mut dev, CullMode::Back);
        state.set_cull(&mut dev, CullMode::DoubleSided);
        state.set_cull(&mut dev, CullMode::Back);
        assert_eq!(dev.stats().cull_enables, 2);
        assert_eq!(dev.stats().cull_disables, 1);
    }

    #[test]
    fn target_switch_resets_blend_and_cull_baseline() {
        let mut dev = RecordingDevice::new();
        let mut state = RenderState::new();
        state.set_target(&mut dev, RenderTarget::Default, &setup());
        state.set_blend(&mut dev, BlendMode::Semi);
        state.set_cull(&mut dev, CullMode::DoubleSided);
        dev.reset_stats();

        state.set_target(&mut dev, RenderTarget::Shadow, &setup());
        assert_eq!(dev.stats().framebuffer_binds, 1);
        assert_eq!(dev.stats().viewports, 1);
        assert_eq!(dev.stats().blend_disables, 1);
        assert_eq!(dev.stats().cull_enables, 1);

        // Baseline is cached: asking for it again is free.
        state.set_blend(&mut dev, BlendMode::Opaque);
        state.set_cull(&mut dev, CullMode::Back);
        assert_eq!(dev.stats().blend_disables, 1);
        assert_eq!(dev.stats().cull_enables, 1);
    }

    #[test]
    fn texture_units_are_cached_independently() {
        let mut dev = RecordingDevice::new();
        let mut state = RenderState::new();
        let tex = TextureId(std::num::NonZeroU32::MIN);
        state.bind_texture(&mut dev, 0, tex);
        state.bind_texture(&mut dev, 0, tex);
        state.bind_texture(&mut dev, 1, tex);
        assert_eq!(dev.stats().texture_binds, 2);
        state.forget_texture(tex);
        state.bind_texture(&mut dev, 0, tex);
        assert_eq!(dev.stats().texture_binds, 3);
    }

    #[test]
    fn resized_window_reissues_the_viewport() {
        let mut dev = RecordingDevice::new();
        let mut state = RenderState::new();
        state.set_target(&mut dev, RenderTarget::Default, &setup());
        dev.reset_stats();

        let resized = TargetSetup {
            screen: [1920, 1080],
            ..setup()
        };
        state.set_target(&mut dev, RenderTarget::Default, &resized);
        state.set_target(&mut dev, RenderTarget::Default, &resized);
        assert_eq!(dev.stats().viewports, 1);
        assert_eq!(dev.stats().framebuffer_binds, 0);
        assert_eq!(dev.stats().blend_disables, 0);
    }

    #[test]
    fn upload_forgets_the_active_unit_only() {
        let mut dev = RecordingDevice::new();
        let mut state = RenderState::new();
        let a = TextureId(std::num::NonZeroU32::MIN);
        let b = TextureId(std::num::NonZeroU32::MAX);
        state.bind_texture(&mut dev, 0, a);
        state.bind_texture(&mut dev, 5, b);
        state.detach_for_upload(&mut dev);
        dev.reset_stats();

        state.bind_texture(&mut dev, 0, a);
        assert_eq!(dev.stats().texture_binds, 0);
        state.bind_texture(&mut dev, 5, b);
        assert_eq!(dev.stats().texture_binds, 1);
    }

    #[test]
    fn same_target_is_a_no_op() {
        let mut dev = RecordingDevice::new();
        let mut state = RenderState::new();
        state.set_target(&mut dev, RenderTarget::Screen, &setup());
        state.set_target(&mut dev, RenderTarget::Screen, &setup());
        assert_eq!(dev.stats().framebuffer_binds, 1);
        assert_eq!(state.current_target(), Some(RenderTarget::Screen));
    }
}
