use bitflags::bitflags;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TextureFlags: u32 {
        const MIPMAPS = 1 << 0;
        const NEAREST = 1 << 1;
        const CLAMP = 1 << 2;
    }
}

/// Decoded RGBA8 pixels as handed over by the asset loader.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureData {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
    pub flags: TextureFlags,
}

impl TextureData {
    pub fn from_rgba8(
        name: impl Into<String>,
        width: u32,
        height: u32,
        pixels: Vec<u8>,
        flags: TextureFlags,
    ) -> Result<Self, String> {
        let name = name.into();
        let expected = width as usize * height as usize * 4;
        if width == 0 || height == 0 || pixels.len() != expected {
            return Err(format!(
                "texture {name:?}: {}x{} needs {expected} bytes, got {}",
                width,
                height,
                pixels.len()
            ));
        }
        Ok(Self {
            name,
            width,
            height,
            pixels,
            flags,
        })
    }

    pub fn solid(name: impl Into<String>, width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let pixels = rgba
            .iter()
            .copied()
            .cycle()
            .take(width.max(1) as usize * height.max(1) as usize * 4)
            .collect();
        Self {
            name: name.into(),
            width: width.max(1),
            height: height.max(1),
            pixels,
            flags: TextureFlags::empty(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_rgba8_rejects_short_pixel_data() {
        assert!(TextureData::from_rgba8("bad", 2, 2, vec![0; 15], TextureFlags::empty()).is_err());
        assert!(TextureData::from_rgba8("ok", 2, 2, vec![0; 16], TextureFlags::empty()).is_ok());
    }

    #[test]
    fn solid_fills_every_texel() {
        let tex = TextureData::solid("white", 2, 3, [255, 255, 255, 255]);
        assert_eq!(tex.pixels.len(), 24);
        assert!(tex.pixels.iter().all(|&b| b == 255));
    }
}
