// hw_texture.rs — composite wall textures for the hardware renderer

use rayon::prelude::*;

use rb2_common::common::{com_dprintf, com_fatal};
use rb2_common::m_fixed::FRACUNIT;
use rb2_common::v_video::Palette;
use rb2_common::w_wad::ResourceStore;
use rb2_common::z_zone::Zone;

use crate::hw_defs::{ChromaKey, GlTexture, TextureFlags, TextureFormat};
use crate::hw_patch::{draw_patch_in_cache, fill_block_opaque, make_block, PatchPlacement};
use crate::r_patch::Patch;
use crate::r_textures::Texture;

/// Builds the system-memory image of `texture` into `grtex`: allocates a
/// block of the texture's size in `textureformat`, then draws every patch
/// in order so later patches overwrite earlier ones.
///
/// Skies get an opaque pre-fill and no chroma keying. RGBA results with any
/// zero-alpha texel are flagged TRANSPARENT.
pub fn generate_texture(
    zone: &mut Zone,
    wad: &dyn ResourceStore,
    palette: &Palette,
    chroma: ChromaKey,
    textureformat: TextureFormat,
    texture: &Texture,
    grtex: &mut GlTexture,
) {
    let sky = texture.is_sky();
    let mip = &mut grtex.mipmap;

    mip.flags = if sky {
        TextureFlags::WRAPXY
    } else {
        TextureFlags::CHROMAKEYED | TextureFlags::WRAPXY
    };
    mip.width = texture.width;
    mip.height = texture.height;
    mip.format = textureformat;
    mip.colormap = None;

    if let Some(old) = mip.data.take() {
        zone.free(old);
    }
    let id = make_block(zone, mip, chroma);
    let bpp = textureformat.bpp();
    let flags = mip.flags;

    if sky {
        if let Some(block) = zone.get_mut(id) {
            fill_block_opaque(block, textureformat, chroma, palette);
        }
    }

    let place = PatchPlacement::unscaled(texture.width as i32, texture.height as i32, bpp);
    for tp in &texture.patches {
        let raw = wad
            .cache_lump(tp.lump)
            .unwrap_or_else(|e| com_fatal(&format!("generate_texture: {}: {}", texture.name, e)));
        let patch = Patch::parse(&raw).unwrap_or_else(|e| {
            com_fatal(&format!(
                "generate_texture: {}: patch {}:{}: {}",
                texture.name, tp.lump.wad, tp.lump.lump, e
            ))
        });

        let place = PatchPlacement { origin_x: tp.originx as i32, origin_y: tp.originy as i32, ..place };
        if let Some(block) = zone.get_mut(id) {
            draw_patch_in_cache(block, &place, &patch, bpp, flags, None, palette, chroma);
        }
    }

    if bpp == 4 {
        let transparent = zone
            .get(id)
            .map_or(false, |block| block.par_chunks_exact(4).any(|px| px[3] == 0));
        if transparent {
            grtex.mipmap.flags |= TextureFlags::TRANSPARENT;
        }
    }

    grtex.scale_x = 1.0 / (texture.width as f32 * FRACUNIT as f32);
    grtex.scale_y = 1.0 / (texture.height as f32 * FRACUNIT as f32);

    com_dprintf(&format!(
        "generate_texture: {} {}x{} {}{}\n",
        texture.name,
        texture.width,
        texture.height,
        textureformat.name(),
        if sky { " (sky)" } else { "" }
    ));
}
