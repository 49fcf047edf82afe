// hw_defs.rs — hardware texture cache records shared by the drivers

use std::sync::Arc;

use rb2_common::w_wad::LumpNum;
use rb2_common::z_zone::{Zone, ZoneId};

use crate::hw_drv::TextureHandle;
use crate::r_draw::Colormap;

/// Palette index treated as "transparent" inside patches.
pub const HWR_PATCHES_CHROMAKEY_COLORINDEX: u8 = 255;
/// Index written in place of the key colour so transparent texels still
/// filter toward something sensible.
pub const HWR_CHROMAKEY_EQUIVALENTCOLORINDEX: u8 = 130;

/// Driver pixel formats. Discriminants are the values the drivers switch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(i32)]
pub enum TextureFormat {
    Alpha8 = 0x02,
    Intensity8 = 0x03,
    AlphaIntensity44 = 0x04,
    #[default]
    P8 = 0x05,
    Rgba = 0x06,
    Rgb565 = 0x0a,
    Argb1555 = 0x0b,
    Argb4444 = 0x0c,
    AlphaIntensity88 = 0x0d,
    /// 8-bit palette index + 8-bit alpha.
    Ap88 = 0x0e,
}

impl TextureFormat {
    /// Bytes per pixel of the system-memory copy.
    pub const fn bpp(self) -> usize {
        match self {
            TextureFormat::Alpha8
            | TextureFormat::Intensity8
            | TextureFormat::AlphaIntensity44
            | TextureFormat::P8 => 1,
            TextureFormat::Rgba => 4,
            TextureFormat::Rgb565
            | TextureFormat::Argb1555
            | TextureFormat::Argb4444
            | TextureFormat::AlphaIntensity88
            | TextureFormat::Ap88 => 2,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            TextureFormat::Alpha8 => "A8",
            TextureFormat::Intensity8 => "I8",
            TextureFormat::AlphaIntensity44 => "AI44",
            TextureFormat::P8 => "P8",
            TextureFormat::Rgba => "RGBA",
            TextureFormat::Rgb565 => "RGB565",
            TextureFormat::Argb1555 => "ARGB1555",
            TextureFormat::Argb4444 => "ARGB4444",
            TextureFormat::AlphaIntensity88 => "AI88",
            TextureFormat::Ap88 => "AP88",
        }
    }

    /// Case-insensitive lookup of `name()`, used by the format cvars.
    pub fn from_name(name: &str) -> Option<TextureFormat> {
        const ALL: [TextureFormat; 10] = [
            TextureFormat::Alpha8,
            TextureFormat::Intensity8,
            TextureFormat::AlphaIntensity44,
            TextureFormat::P8,
            TextureFormat::Rgba,
            TextureFormat::Rgb565,
            TextureFormat::Argb1555,
            TextureFormat::Argb4444,
            TextureFormat::AlphaIntensity88,
            TextureFormat::Ap88,
        ];
        ALL.iter().copied().find(|f| f.name().eq_ignore_ascii_case(name.trim()))
    }
}

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct TextureFlags: u32 {
        const WRAPX       = 0x00000001;
        const WRAPY       = 0x00000002;
        const WRAPXY      = Self::WRAPX.bits() | Self::WRAPY.bits();
        /// Key colour was replaced; the driver should alpha-test it away.
        const CHROMAKEYED = 0x00000010;
        /// At least one texel has zero alpha.
        const TRANSPARENT = 0x00000040;
    }
}

/// Chroma key pair used by the compositor and the block fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChromaKey {
    pub index: u8,
    pub equivalent: u8,
}

impl Default for ChromaKey {
    fn default() -> Self {
        ChromaKey {
            index: HWR_PATCHES_CHROMAKEY_COLORINDEX,
            equivalent: HWR_CHROMAKEY_EQUIVALENTCOLORINDEX,
        }
    }
}

/// Driver-side residency. Only valid while `epoch` matches the cache's
/// current driver epoch; a driver flush bumps the epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Downloaded {
    pub handle: TextureHandle,
    pub epoch: u32,
}

/// Lifecycle of a mipmap as seen by the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MipState {
    /// No pixels anywhere.
    Empty,
    /// Pixels in system memory, not yet on the driver.
    Resident,
    /// On the driver and still in system memory.
    Uploaded,
    /// On the driver, system copy reclaimed.
    Purged,
}

/// One uploadable image: the system-memory pixels plus driver state.
#[derive(Debug, Clone, Default)]
pub struct GlMipmap {
    pub width: u16,
    pub height: u16,
    pub format: TextureFormat,
    pub flags: TextureFlags,
    /// System-memory pixels, `width * height * format.bpp()` bytes. May go
    /// stale when the zone purges; always check against the zone.
    pub data: Option<ZoneId>,
    pub downloaded: Option<Downloaded>,
    /// Translation applied while compositing, for colormapped variants.
    pub colormap: Option<Arc<Colormap>>,
}

impl GlMipmap {
    #[inline]
    pub fn has_data(&self, zone: &Zone) -> bool {
        self.data.map_or(false, |id| zone.is_valid(id))
    }

    #[inline]
    pub fn is_downloaded(&self, epoch: u32) -> bool {
        self.downloaded.map_or(false, |d| d.epoch == epoch)
    }

    pub fn state(&self, zone: &Zone, epoch: u32) -> MipState {
        match (self.has_data(zone), self.is_downloaded(epoch)) {
            (false, false) => MipState::Empty,
            (true, false) => MipState::Resident,
            (true, true) => MipState::Uploaded,
            (false, true) => MipState::Purged,
        }
    }

    /// Size in bytes of a full pixel block for the current dimensions.
    pub fn block_size(&self) -> usize {
        self.width as usize * self.height as usize * self.format.bpp()
    }
}

/// Index into the colormapped-variant arena of the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MipmapId(pub usize);

/// Per-lump record for patches, flats and fade masks.
#[derive(Debug, Clone, Default)]
pub struct GlPatch {
    pub lump: LumpNum,
    pub width: i16,
    pub height: i16,
    pub leftoffset: i16,
    pub topoffset: i16,
    /// Texture coordinate of the right/bottom edge of the image.
    pub max_s: f32,
    pub max_t: f32,
    pub mipmap: GlMipmap,
    /// Colormapped variants, in creation order.
    pub colormaps: Vec<MipmapId>,
}

impl GlPatch {
    pub fn new(lump: LumpNum) -> Self {
        GlPatch { lump, ..Default::default() }
    }
}

/// Composite wall texture record, indexed like the texture table.
#[derive(Debug, Clone, Default)]
pub struct GlTexture {
    pub mipmap: GlMipmap,
    /// 1 / (width * FRACUNIT): maps world fixed-point units to s.
    pub scale_x: f32,
    pub scale_y: f32,
}
