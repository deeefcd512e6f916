use super::{TextureData, TextureFlags};

/// Fixed-cell bitmap font: one coverage byte per texel, glyphs laid out in a
/// grid of `columns` cells starting at `first_char`.
#[derive(Debug, Clone)]
pub struct Font {
    pub glyph_width: u32,
    pub glyph_height: u32,
    pub first_char: u32,
    pub glyph_count: u32,
    pub columns: u32,
    pub coverage: Vec<u8>,
}

impl Font {
    pub fn rows(&self) -> u32 {
        self.glyph_count.div_ceil(self.columns.max(1))
    }

    pub fn atlas_width(&self) -> u32 {
        self.columns.max(1) * self.glyph_width
    }

    pub fn atlas_height(&self) -> u32 {
        self.rows() * self.glyph_height
    }

    /// Atlas texcoords `[u0, v0, u1, v1]` for `ch`, if the font covers it.
    pub fn glyph_rect(&self, ch: char) -> Option<[f32; 4]> {
        let code = ch as u32;
        if code < self.first_char || code >= self.first_char + self.glyph_count {
            return None;
        }
        let index = code - self.first_char;
        let columns = self.columns.max(1);
        let (col, row) = (index % columns, index / columns);
        let w = self.atlas_width() as f32;
        let h = self.atlas_height().max(1) as f32;
        let u0 = (col * self.glyph_width) as f32 / w;
        let v0 = (row * self.glyph_height) as f32 / h;
        Some([
            u0,
            v0,
            u0 + self.glyph_width as f32 / w,
            v0 + self.glyph_height as f32 / h,
        ])
    }

    /// White texels with coverage in alpha, ready for upload.
    pub fn atlas(&self) -> TextureData {
        let (w, h) = (self.atlas_width(), self.atlas_height());
        let mut pixels = Vec::with_capacity(w as usize * h as usize * 4);
        for i in 0..(w as usize * h as usize) {
            let a = self.coverage.get(i).copied().unwrap_or(0);
            pixels.extend_from_slice(&[255, 255, 255, a]);
        }
        TextureData {
            name: "font".to_string(),
            width: w.max(1),
            height: h.max(1),
            pixels,
            flags: TextureFlags::NEAREST | TextureFlags::CLAMP,
        }
    }
}
