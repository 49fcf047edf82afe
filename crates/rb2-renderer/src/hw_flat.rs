// hw_flat.rs — flats and fade masks
//
// Neither has a header: the lump size alone decides the dimensions.

use rayon::prelude::*;

use rb2_common::common::{com_fatal, com_warning};
use rb2_common::v_video::Palette;
use rb2_common::w_wad::{LumpNum, ResourceStore};
use rb2_common::z_zone::Zone;

use crate::hw_defs::{ChromaKey, GlMipmap, TextureFlags, TextureFormat};
use crate::hw_patch::make_block;

/// Side of a square flat, from its lump size. Unknown sizes are 64x64.
pub fn flat_size_for_length(len: usize) -> u16 {
    match len {
        4194304 => 2048,
        1048576 => 1024,
        262144 => 512,
        65536 => 256,
        16384 => 128,
        1024 => 32,
        _ => 64,
    }
}

/// Fade mask dimensions, from its lump size.
pub fn fade_mask_size_for_length(len: usize) -> Option<(u16, u16)> {
    match len {
        256000 => Some((640, 400)),
        64000 => Some((320, 200)),
        16000 => Some((160, 100)),
        4000 => Some((80, 50)),
        _ => None,
    }
}

/// Loads a flat as a P8 wrapping, chroma-keyed square. The block is exactly
/// width*width bytes: a short lump leaves the tail keyed out, a long lump
/// is cut.
pub fn cache_flat(zone: &mut Zone, wad: &dyn ResourceStore, chroma: ChromaKey, mip: &mut GlMipmap, lump: LumpNum) {
    let len = wad
        .lump_length(lump)
        .unwrap_or_else(|e| com_fatal(&format!("cache_flat: {}", e)));
    let size = flat_size_for_length(len);

    mip.width = size;
    mip.height = size;
    mip.format = TextureFormat::P8;
    mip.flags = TextureFlags::WRAPXY | TextureFlags::CHROMAKEYED;

    if let Some(old) = mip.data.take() {
        zone.free(old);
    }
    let id = make_block(zone, mip, chroma);
    if let Some(block) = zone.get_mut(id) {
        if let Err(e) = wad.read_lump(lump, block) {
            com_fatal(&format!("cache_flat: {}", e));
        }
    }
}

/// Nearest-neighbour resample of an 8-bit mask into `block`. The output is
/// the red channel of each source index's palette colour.
pub fn draw_fade_mask_in_cache(
    block: &mut [u8],
    block_width: usize,
    block_height: usize,
    source: &[u8],
    fmwidth: usize,
    fmheight: usize,
    palette: &Palette,
) {
    if block_width == 0 || block_height == 0 || fmwidth == 0 || fmheight == 0 {
        return;
    }

    let stepx = ((fmwidth as u64) << 16) / block_width as u64;
    let stepy = ((fmheight as u64) << 16) / block_height as u64;

    block
        .par_chunks_mut(block_width)
        .take(block_height)
        .enumerate()
        .for_each(|(j, row)| {
            let srow = ((j as u64 * stepy) >> 16) as usize * fmwidth;
            for (i, out) in row.iter_mut().enumerate() {
                let sx = ((i as u64 * stepx) >> 16) as usize;
                let index = source.get(srow + sx).copied().unwrap_or(0);
                *out = palette.get_color(index).red;
            }
        });
}

/// Loads a fade mask as an Alpha8 image. A lump of unknown size is warned
/// about and cached as an empty 0x0 image.
pub fn cache_fade_mask(
    zone: &mut Zone,
    wad: &dyn ResourceStore,
    palette: &Palette,
    chroma: ChromaKey,
    mip: &mut GlMipmap,
    lump: LumpNum,
) {
    let raw = wad
        .cache_lump(lump)
        .unwrap_or_else(|e| com_fatal(&format!("cache_fade_mask: {}", e)));

    let (fmwidth, fmheight) = match fade_mask_size_for_length(raw.len()) {
        Some(dims) => dims,
        None => {
            com_warning("Fade mask lump of incorrect size, ignored\n");
            (0, 0)
        }
    };

    mip.width = fmwidth;
    mip.height = fmheight;
    mip.format = TextureFormat::Alpha8;
    mip.flags = TextureFlags::empty();

    if let Some(old) = mip.data.take() {
        zone.free(old);
    }
    let id = make_block(zone, mip, chroma);
    if fmwidth == 0 {
        return;
    }
    if let Some(block) = zone.get_mut(id) {
        draw_fade_mask_in_cache(
            block,
            fmwidth as usize,
            fmheight as usize,
            &raw,
            fmwidth as usize,
            fmheight as usize,
            palette,
        );
    }
}
