// hw_patch.rs — pixel blocks and patch compositing for the hardware cache
//
// A patch is drawn into a block with nearest-neighbour scaling: the block
// covers `texture_width x texture_height` logical pixels at
// `block_width x block_height` physical resolution. All stepping is 16.16
// fixed point so the output is the same on every platform.

use rb2_common::common::{com_fatal, com_warning};
use rb2_common::m_fixed::Fixed;
use rb2_common::v_video::{Palette, RgbaColor};
use rb2_common::w_wad::{LumpNum, ResourceStore};
use rb2_common::z_zone::{PuTag, Zone, ZoneId};

use crate::hw_defs::{ChromaKey, GlMipmap, GlPatch, TextureFlags, TextureFormat};
use crate::r_draw::Colormap;
use crate::r_patch::Patch;

// ============================================================
// Blocks
// ============================================================

/// Fills a fresh block with the "empty" pattern of its format:
/// - 1 byte: the key index, so untouched texels stay transparent;
/// - 2 bytes: alpha 0 over the key's equivalent index;
/// - 4 bytes: all zero (transparent black).
pub fn fill_block(block: &mut [u8], format: TextureFormat, chroma: ChromaKey) {
    match format.bpp() {
        1 => block.fill(chroma.index),
        2 => {
            let texel = ((0x00u16 << 8) | chroma.equivalent as u16).to_ne_bytes();
            for px in block.chunks_exact_mut(2) {
                px.copy_from_slice(&texel);
            }
        }
        _ => block.fill(0),
    }
}

/// Fills a block with the opaque key-equivalent colour. Sky textures start
/// from this so gaps between patches don't show through.
pub fn fill_block_opaque(block: &mut [u8], format: TextureFormat, chroma: ChromaKey, palette: &Palette) {
    match format.bpp() {
        1 => block.fill(chroma.equivalent),
        2 => {
            let texel = ((0xffu16 << 8) | chroma.equivalent as u16).to_ne_bytes();
            for px in block.chunks_exact_mut(2) {
                px.copy_from_slice(&texel);
            }
        }
        _ => {
            let c = palette.get_color(chroma.equivalent);
            let texel = RgbaColor::new(c.red, c.green, c.blue, 0xff).to_bytes();
            for px in block.chunks_exact_mut(4) {
                px.copy_from_slice(&texel);
            }
        }
    }
}

/// Pixel block for the given size and format, filled with the empty pattern.
pub fn allocate_block(width: u16, height: u16, format: TextureFormat, chroma: ChromaKey) -> Vec<u8> {
    let mut block = vec![0u8; width as usize * height as usize * format.bpp()];
    fill_block(&mut block, format, chroma);
    block
}

/// Allocates the system-memory block for `mip`'s current size and format
/// in the zone, locked (`PU_HWRCACHE`).
pub fn make_block(zone: &mut Zone, mip: &mut GlMipmap, chroma: ChromaKey) -> ZoneId {
    let block = allocate_block(mip.width, mip.height, mip.format, chroma);
    let id = zone.malloc_from(block, PuTag::HwrCache);
    mip.data = Some(id);
    id
}

// ============================================================
// Compositing
// ============================================================

/// Where and how big a patch lands in a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatchPlacement {
    pub block_width: i32,
    pub block_height: i32,
    /// Bytes per block row.
    pub block_modulo: usize,
    /// Logical size the block represents.
    pub texture_width: i32,
    pub texture_height: i32,
    /// Top-left of the patch in logical pixels. May be negative.
    pub origin_x: i32,
    pub origin_y: i32,
}

impl PatchPlacement {
    /// Block and logical size are equal, patch at the origin.
    pub fn unscaled(width: i32, height: i32, bpp: usize) -> Self {
        PatchPlacement {
            block_width: width,
            block_height: height,
            block_modulo: width.max(0) as usize * bpp,
            texture_width: width,
            texture_height: height,
            origin_x: 0,
            origin_y: 0,
        }
    }
}

/// Draws `patch` into `block`. Texels equal to the key index are replaced by
/// the equivalent index when `flags` has CHROMAKEYED; otherwise `colormap`
/// (if any) remaps them. Output is packed per `bpp`:
/// - 1: palette index;
/// - 2: (0xff << 8) | index, native-endian u16;
/// - 3: palette RGB;
/// - 4: palette RGB with alpha forced opaque.
///
/// Fatal on any other `bpp`.
pub fn draw_patch_in_cache(
    block: &mut [u8],
    place: &PatchPlacement,
    patch: &Patch<'_>,
    bpp: usize,
    flags: TextureFlags,
    colormap: Option<&Colormap>,
    palette: &Palette,
    chroma: ChromaKey,
) {
    let x1 = place.origin_x;
    let mut x2 = x1 + patch.width as i32;
    let x = x1.max(0);
    if x2 > place.texture_width {
        x2 = place.texture_width;
    }

    if place.texture_width <= 0 || place.texture_height <= 0 || place.block_width <= 0 || place.block_height <= 0 {
        return;
    }

    let col = x * place.block_width / place.texture_width;
    let ncols = (x2 - x) * place.block_width / place.texture_width;
    if ncols <= 0 {
        return;
    }

    let mut xfrac = if x1 < 0 { Fixed::from_int(-x1) } else { Fixed::ZERO };
    let xfracstep = Fixed::ratio(place.texture_width, place.block_width);
    let yfracstep = Fixed::ratio(place.texture_height, place.block_height);

    if !(1..=4).contains(&bpp) {
        com_fatal(&format!("draw_patch_in_cache: no drawer defined for this bpp ({})", bpp));
    }

    // texture height -> block height
    let scale_y = Fixed::ratio(place.block_height, place.texture_height);

    let modulo = place.block_modulo;
    let mut col_ofs = col as usize * bpp;

    for _ in 0..ncols {
        let src_col = xfrac.to_int();
        if src_col >= 0 && src_col < patch.width as i32 {
            for post in patch.posts(src_col as usize) {
                let mut count = scale_y.scale_int(post.length as i32).round();
                let mut position = place.origin_y + post.topdelta;
                let mut yfrac = Fixed::ZERO;

                if position < 0 {
                    yfrac = Fixed::from_int(-position);
                    count += scale_y.scale_int(position).round();
                    position = 0;
                }

                position = scale_y.scale_int(position).round();
                if position < 0 {
                    position = 0;
                }
                if position + count >= place.block_height {
                    count = place.block_height - position;
                }

                let mut dest = col_ofs + position as usize * modulo;
                while count > 0 {
                    count -= 1;

                    // scaled reads can run past the post; the lump bounds are
                    // the only hard limit
                    let src = post.data_ofs + yfrac.to_int().max(0) as usize;
                    let mut texel = patch.texel(src).unwrap_or(chroma.index);

                    if texel == chroma.index && flags.contains(TextureFlags::CHROMAKEYED) {
                        texel = chroma.equivalent;
                    } else if let Some(cm) = colormap {
                        texel = cm.map(texel);
                    }

                    let Some(out) = block.get_mut(dest..dest + bpp) else {
                        break;
                    };
                    match bpp {
                        2 => out.copy_from_slice(&((0xffu16 << 8) | texel as u16).to_ne_bytes()),
                        3 => {
                            let c = palette.get_color(texel);
                            out.copy_from_slice(&[c.red, c.green, c.blue]);
                        }
                        4 => {
                            let c = palette.get_color(texel);
                            out.copy_from_slice(&RgbaColor::new(c.red, c.green, c.blue, 0xff).to_bytes());
                        }
                        _ => out[0] = texel,
                    }

                    dest += modulo;
                    yfrac += yfracstep;
                }
            }
        }
        col_ofs += bpp;
        xfrac += xfracstep;
    }
}

// ============================================================
// Standalone patches
// ============================================================

/// Fills in `gpatch`'s geometry from `patch` and (re)builds `mip` at the
/// patch's own resolution. A fresh mip (width 0) takes the patch size and
/// `patchformat`; an existing one keeps its size, format and flags.
/// Any previous system copy is freed first.
pub fn make_patch(
    zone: &mut Zone,
    palette: &Palette,
    chroma: ChromaKey,
    patchformat: TextureFormat,
    patch: &Patch<'_>,
    gpatch: &mut GlPatchGeometry,
    mip: &mut GlMipmap,
    makebitmap: bool,
) {
    if mip.width == 0 {
        gpatch.width = patch.width;
        gpatch.height = patch.height;
        gpatch.leftoffset = patch.leftoffset;
        gpatch.topoffset = patch.topoffset;

        mip.width = patch.width as u16;
        mip.height = patch.height as u16;
        mip.flags = TextureFlags::empty();
        mip.format = patchformat;
    }

    if let Some(old) = mip.data.take() {
        zone.free(old);
    }

    if makebitmap {
        let id = make_block(zone, mip, chroma);
        let bpp = mip.format.bpp();
        let place = PatchPlacement::unscaled(gpatch.width as i32, gpatch.height as i32, bpp);
        let place = PatchPlacement { block_modulo: mip.width as usize * bpp, ..place };
        if let Some(block) = zone.get_mut(id) {
            draw_patch_in_cache(block, &place, patch, bpp, mip.flags, mip.colormap.as_deref(), palette, chroma);
        }
    }

    gpatch.max_s = 1.0;
    gpatch.max_t = 1.0;
}

/// The geometry half of a `GlPatch`, split out so a patch record and one of
/// its colormapped variants can be borrowed at the same time.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GlPatchGeometry {
    pub width: i16,
    pub height: i16,
    pub leftoffset: i16,
    pub topoffset: i16,
    pub max_s: f32,
    pub max_t: f32,
}

impl GlPatchGeometry {
    pub fn of(gpatch: &GlPatch) -> Self {
        GlPatchGeometry {
            width: gpatch.width,
            height: gpatch.height,
            leftoffset: gpatch.leftoffset,
            topoffset: gpatch.topoffset,
            max_s: gpatch.max_s,
            max_t: gpatch.max_t,
        }
    }

    pub fn store(&self, gpatch: &mut GlPatch) {
        gpatch.width = self.width;
        gpatch.height = self.height;
        gpatch.leftoffset = self.leftoffset;
        gpatch.topoffset = self.topoffset;
        gpatch.max_s = self.max_s;
        gpatch.max_t = self.max_t;
    }
}

/// Reads and parses a patch lump, then runs `make_patch` on it. Unreadable
/// or malformed lumps are fatal: the cache cannot continue without them.
pub fn load_patch(
    zone: &mut Zone,
    wad: &dyn ResourceStore,
    palette: &Palette,
    chroma: ChromaKey,
    patchformat: TextureFormat,
    lump: LumpNum,
    gpatch: &mut GlPatchGeometry,
    mip: &mut GlMipmap,
) {
    let raw = wad
        .cache_lump(lump)
        .unwrap_or_else(|e| com_fatal(&format!("load_patch: {}", e)));
    let patch = Patch::parse(&raw)
        .unwrap_or_else(|e| com_fatal(&format!("load_patch: lump {}:{}: {}", lump.wad, lump.lump, e)));
    if patch.width == 0 || patch.height == 0 {
        com_warning(&format!("Patch {}:{} has no pixels\n", lump.wad, lump.lump));
    }
    make_patch(zone, palette, chroma, patchformat, &patch, gpatch, mip, true);
}
