// v_video.rs — the global palette

use bytemuck::{Pod, Zeroable};

pub const PALETTE_SIZE: usize = 256;
/// Size of an RGB palette lump (PLAYPAL style, first palette only).
pub const PALETTE_LUMP_SIZE: usize = PALETTE_SIZE * 3;

/// One palette entry, laid out as the driver expects it in memory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct RgbaColor {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
    pub alpha: u8,
}

impl RgbaColor {
    pub const fn new(red: u8, green: u8, blue: u8, alpha: u8) -> Self {
        RgbaColor { red, green, blue, alpha }
    }

    #[inline]
    pub fn to_bytes(self) -> [u8; 4] {
        bytemuck::cast(self)
    }
}

/// Palette index -> colour.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    colors: [RgbaColor; PALETTE_SIZE],
}

impl Default for Palette {
    fn default() -> Self {
        Self::greyscale()
    }
}

impl Palette {
    pub fn new(colors: [RgbaColor; PALETTE_SIZE]) -> Self {
        Palette { colors }
    }

    /// Index i -> (i, i, i, 255). Used before the real palette is loaded.
    pub fn greyscale() -> Self {
        let mut colors = [RgbaColor::default(); PALETTE_SIZE];
        for (i, c) in colors.iter_mut().enumerate() {
            *c = RgbaColor::new(i as u8, i as u8, i as u8, 0xff);
        }
        Palette { colors }
    }

    /// Decodes the first palette of an RGB palette lump. Returns None if the
    /// lump is too short to hold 256 colours.
    pub fn from_rgb_lump(raw: &[u8]) -> Option<Self> {
        if raw.len() < PALETTE_LUMP_SIZE {
            return None;
        }
        let mut colors = [RgbaColor::default(); PALETTE_SIZE];
        for (c, rgb) in colors.iter_mut().zip(raw.chunks_exact(3)) {
            *c = RgbaColor::new(rgb[0], rgb[1], rgb[2], 0xff);
        }
        Some(Palette { colors })
    }

    #[inline]
    pub fn get_color(&self, index: u8) -> RgbaColor {
        self.colors[index as usize]
    }

    pub fn set_color(&mut self, index: u8, color: RgbaColor) {
        self.colors[index as usize] = color;
    }

    pub fn colors(&self) -> &[RgbaColor; PALETTE_SIZE] {
        &self.colors
    }

    /// Raw RGBA bytes, 1024 of them.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.colors[..])
    }
}
