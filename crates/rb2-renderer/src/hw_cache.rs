// hw_cache.rs — hardware texture, patch and flat cache
//
// Every get_* call ends the same way: generate if there are neither pixels
// nor a current upload, upload if the driver copy is stale, bind, then
// demote the system copy to PU_HWRCACHE_UNLOCKED so the zone may reclaim it.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use rb2_common::common::{com_dprintf, com_fatal, com_printf};
use rb2_common::v_video::Palette;
use rb2_common::w_wad::{LumpNum, ResourceStore};
use rb2_common::z_zone::{PuTag, Zone};

use crate::hw_defs::{Downloaded, GlMipmap, GlPatch, GlTexture, MipState, MipmapId, TextureFormat};
use crate::hw_drv::{HwDriver, MipUpload};
use crate::hw_flat::{cache_fade_mask, cache_flat};
use crate::hw_main::HwRenderer;
use crate::hw_patch::{load_patch, GlPatchGeometry};
use crate::hw_texture::generate_texture;
use crate::r_draw::{Colormap, ColormapId};
use crate::r_patch::Patch;

/// Counters for the work the cache has done since startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HwCacheStats {
    pub textures_generated: u32,
    pub patches_generated: u32,
    pub flats_loaded: u32,
    pub fademasks_loaded: u32,
    pub uploads: u32,
    /// Full flushes: level changes and palette changes.
    pub flushes: u32,
}

impl HwCacheStats {
    pub fn generations(&self) -> u32 {
        self.textures_generated + self.patches_generated + self.flats_loaded + self.fademasks_loaded
    }
}

/// Cache tables of one renderer.
///
/// Patch records are kept per wad, ordered by lump index. Colormapped
/// variants live in one arena and are found through `(lump, colormap id)`;
/// each patch record also lists its variants in creation order.
#[derive(Debug, Default)]
pub struct HwCache {
    /// One entry per level texture, sized by `prep_level_cache`.
    pub textures: Vec<GlTexture>,
    patches: Vec<BTreeMap<u16, GlPatch>>,
    variants: Vec<GlMipmap>,
    variant_index: HashMap<(LumpNum, ColormapId), MipmapId>,
    default_colormap: Option<ColormapId>,
    /// Driver generation. Uploads from an older epoch are gone.
    epoch: u32,
    pub stats: HwCacheStats,
}

impl HwCache {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn epoch(&self) -> u32 {
        self.epoch
    }

    pub fn set_default_colormap(&mut self, id: Option<ColormapId>) {
        self.default_colormap = id;
    }

    pub fn patch(&self, lump: LumpNum) -> Option<&GlPatch> {
        self.patches.get(lump.wad as usize)?.get(&lump.lump)
    }

    pub fn variant(&self, id: MipmapId) -> Option<&GlMipmap> {
        self.variants.get(id.0)
    }

    pub fn variant_for(&self, lump: LumpNum, colormap: &Colormap) -> Option<&GlMipmap> {
        let id = self.variant_index.get(&(lump, colormap.id()))?;
        self.variant(*id)
    }

    pub fn num_patches(&self) -> usize {
        self.patches.iter().map(BTreeMap::len).sum()
    }

    pub fn num_variants(&self) -> usize {
        self.variants.len()
    }

    /// Drops every colormapped variant and frees its pixels. Variants are
    /// keyed by colormap identity, so once the colormaps they were built
    /// from are flushed they can never be hit again.
    pub fn drop_variants(&mut self, zone: &mut Zone) {
        for mip in self.variants.drain(..) {
            if let Some(id) = mip.data {
                zone.free(id);
            }
        }
        self.variant_index.clear();
        for gpatch in self.patches.iter_mut().flat_map(BTreeMap::values_mut) {
            gpatch.colormaps.clear();
        }
    }

    /// Forgets all uploads: the driver is told to drop its copies and every
    /// recorded `Downloaded` goes stale.
    fn invalidate_driver(&mut self, driver: &mut dyn HwDriver) {
        driver.clear_mipmap_cache();
        self.epoch = self.epoch.wrapping_add(1);
    }
}

/// Finds or creates the record for `lump`.
fn patch_entry(patches: &mut Vec<BTreeMap<u16, GlPatch>>, lump: LumpNum) -> &mut GlPatch {
    let wad = lump.wad as usize;
    if patches.len() <= wad {
        patches.resize_with(wad + 1, BTreeMap::new);
    }
    patches[wad].entry(lump.lump).or_insert_with(|| GlPatch::new(lump))
}

fn check_lump(wad: &dyn ResourceStore, lump: LumpNum, func: &str) {
    if let Err(e) = wad.lump_length(lump) {
        com_fatal(&format!("{}: {} ({}:{})", func, e, lump.wad, lump.lump));
    }
}

#[inline]
fn needs_generation(mip: &GlMipmap, zone: &Zone, epoch: u32) -> bool {
    !mip.has_data(zone) && !mip.is_downloaded(epoch)
}

/// Uploads `mip` unless the driver already holds it for this epoch, binds
/// it, and unlocks the system copy.
fn upload_and_bind(driver: &mut dyn HwDriver, zone: &mut Zone, mip: &mut GlMipmap, epoch: u32, stats: &mut HwCacheStats) {
    let handle = match mip.downloaded {
        Some(d) if d.epoch == epoch => d.handle,
        _ => {
            let data = mip.data.and_then(|id| zone.get(id)).unwrap_or_default();
            let handle = driver.set_texture(&MipUpload {
                width: mip.width,
                height: mip.height,
                format: mip.format,
                flags: mip.flags,
                data,
            });
            log::trace!("upload {}x{} {} -> {}", mip.width, mip.height, mip.format.name(), handle.0);
            mip.downloaded = Some(Downloaded { handle, epoch });
            stats.uploads += 1;
            handle
        }
    };
    driver.bind_texture(handle);

    if let Some(id) = mip.data {
        zone.change_tag(id, PuTag::HwrCacheUnlocked);
    }
}

fn state_char(state: MipState) -> char {
    match state {
        MipState::Empty => '-',
        MipState::Resident => 'R',
        MipState::Uploaded => 'U',
        MipState::Purged => 'P',
    }
}

impl HwRenderer {
    /// Makes texture `tex` resident and bound.
    pub fn get_texture(&mut self, tex: usize) -> &GlTexture {
        let numtextures = self.cache.textures.len();
        if tex >= numtextures {
            com_fatal(&format!("get_texture: tex >= numtextures ({} >= {})", tex, numtextures));
        }

        let HwRenderer { zone, wad, driver, palette, textures, cache, config, .. } = self;
        let epoch = cache.epoch;
        let grtex = &mut cache.textures[tex];

        if needs_generation(&grtex.mipmap, zone, epoch) {
            let texture = textures
                .get(tex)
                .unwrap_or_else(|| com_fatal(&format!("get_texture: no definition for texture ({})", tex)));
            generate_texture(zone, &**wad, palette, config.chroma, config.textureformat, texture, grtex);
            cache.stats.textures_generated += 1;
        }

        upload_and_bind(&mut **driver, zone, &mut grtex.mipmap, epoch, &mut cache.stats);
        &cache.textures[tex]
    }

    /// Makes the patch at `lump` resident and bound, without a colormap.
    pub fn get_patch(&mut self, lump: LumpNum) -> &GlPatch {
        check_lump(&*self.wad, lump, "get_patch");

        let HwRenderer { zone, wad, driver, palette, cache, config, .. } = self;
        let epoch = cache.epoch;
        let gpatch = patch_entry(&mut cache.patches, lump);

        if needs_generation(&gpatch.mipmap, zone, epoch) {
            let mut geo = GlPatchGeometry::of(gpatch);
            load_patch(zone, &**wad, palette, config.chroma, config.patchformat, lump, &mut geo, &mut gpatch.mipmap);
            geo.store(gpatch);
            cache.stats.patches_generated += 1;
        }

        upload_and_bind(&mut **driver, zone, &mut gpatch.mipmap, epoch, &mut cache.stats);
        gpatch
    }

    /// Like `get_patch`, but drawn through `colormap`. No colormap, or the
    /// default one, is the plain patch. Variants are keyed by colormap
    /// identity: two colormaps with equal tables are still two variants.
    pub fn get_mapped_patch(&mut self, lump: LumpNum, colormap: Option<&Arc<Colormap>>) -> &GlMipmap {
        let colormap = match colormap {
            Some(c) if Some(c.id()) != self.cache.default_colormap => c,
            _ => return &self.get_patch(lump).mipmap,
        };
        check_lump(&*self.wad, lump, "get_mapped_patch");

        let HwRenderer { zone, wad, driver, palette, cache, config, .. } = self;
        let epoch = cache.epoch;
        let HwCache { patches, variants, variant_index, stats, .. } = cache;
        let gpatch = patch_entry(patches, lump);

        let id = match variant_index.get(&(lump, colormap.id())) {
            Some(&id) => id,
            None => {
                let id = MipmapId(variants.len());
                variants.push(GlMipmap { colormap: Some(Arc::clone(colormap)), ..Default::default() });
                variant_index.insert((lump, colormap.id()), id);
                gpatch.colormaps.push(id);
                id
            }
        };

        let mip = &mut variants[id.0];
        if needs_generation(mip, zone, epoch) {
            let mut geo = GlPatchGeometry::of(gpatch);
            load_patch(zone, &**wad, palette, config.chroma, config.patchformat, lump, &mut geo, mip);
            geo.store(gpatch);
            stats.patches_generated += 1;
        }

        upload_and_bind(&mut **driver, zone, mip, epoch, stats);
        &variants[id.0]
    }

    /// Makes the flat at `lump` resident and bound.
    pub fn get_flat(&mut self, lump: LumpNum) -> &GlMipmap {
        check_lump(&*self.wad, lump, "get_flat");

        let HwRenderer { zone, wad, driver, cache, config, .. } = self;
        let epoch = cache.epoch;
        let mip = &mut patch_entry(&mut cache.patches, lump).mipmap;

        if needs_generation(mip, zone, epoch) {
            cache_flat(zone, &**wad, config.chroma, mip, lump);
            cache.stats.flats_loaded += 1;
        }

        upload_and_bind(&mut **driver, zone, mip, epoch, &mut cache.stats);
        mip
    }

    /// Makes the fade mask at `lump` resident and bound.
    pub fn get_fade_mask(&mut self, lump: LumpNum) -> &GlMipmap {
        check_lump(&*self.wad, lump, "get_fade_mask");

        let HwRenderer { zone, wad, driver, palette, cache, config, .. } = self;
        let epoch = cache.epoch;
        let mip = &mut patch_entry(&mut cache.patches, lump).mipmap;

        if needs_generation(mip, zone, epoch) {
            cache_fade_mask(zone, &**wad, palette, config.chroma, mip, lump);
            cache.stats.fademasks_loaded += 1;
        }

        upload_and_bind(&mut **driver, zone, mip, epoch, &mut cache.stats);
        mip
    }

    /// Patch record for `lump`, created on first use. Fills in the header
    /// geometry of a new record but builds no pixels.
    pub fn get_cached_patch(&mut self, lump: LumpNum) -> &GlPatch {
        check_lump(&*self.wad, lump, "get_cached_patch");

        let HwRenderer { wad, cache, .. } = self;
        let gpatch = patch_entry(&mut cache.patches, lump);
        if gpatch.width == 0 {
            let raw = wad
                .cache_lump(lump)
                .unwrap_or_else(|e| com_fatal(&format!("get_cached_patch: {}", e)));
            let patch = Patch::parse(&raw).unwrap_or_else(|e| {
                com_fatal(&format!("get_cached_patch: {} ({}:{})", e, lump.wad, lump.lump))
            });
            gpatch.width = patch.width;
            gpatch.height = patch.height;
            gpatch.leftoffset = patch.leftoffset;
            gpatch.topoffset = patch.topoffset;
        }
        gpatch
    }

    /// Lets the zone reclaim the patch's pixels. The upload is untouched.
    pub fn unlock_cached_patch(&mut self, lump: LumpNum) {
        let HwRenderer { zone, cache, .. } = self;
        let Some(gpatch) = cache.patches.get(lump.wad as usize).and_then(|t| t.get(&lump.lump)) else {
            return;
        };
        if let Some(id) = gpatch.mipmap.data {
            zone.change_tag(id, PuTag::HwrCacheUnlocked);
        }
    }

    /// Drops everything: driver uploads, converted pixels, patch records and
    /// variants. Texture entries are reset but the table keeps its size.
    pub fn free_texture_cache(&mut self) {
        self.cache.invalidate_driver(&mut *self.driver);

        self.zone.free_tags(PuTag::HwrCache, PuTag::HwrCache);
        self.zone.free_tags(PuTag::HwrCacheUnlocked, PuTag::HwrCacheUnlocked);

        let cache = &mut self.cache;
        for grtex in cache.textures.iter_mut() {
            *grtex = GlTexture::default();
        }
        cache.patches.clear();
        cache.variants.clear();
        cache.variant_index.clear();
        cache.stats.flushes += 1;
    }

    /// New level: flush, then size the texture table to `numtextures`.
    pub fn prep_level_cache(&mut self, numtextures: usize) {
        self.free_texture_cache();
        self.cache.textures.clear();
        self.cache.textures.resize_with(numtextures, GlTexture::default);
        com_dprintf(&format!("prep_level_cache: {} textures\n", numtextures));
    }

    /// Installs a new palette. Anything converted to RGBA was resolved
    /// through the old one, so converted pixels and uploads are dropped.
    /// Translation colormaps are palette indices and survive.
    pub fn set_palette(&mut self, palette: Palette) {
        self.driver.set_palette(&palette);
        self.palette = palette;

        if self.config.patchformat == TextureFormat::Rgba || self.config.textureformat == TextureFormat::Rgba {
            self.cache.invalidate_driver(&mut *self.driver);
            self.zone.free_tags(PuTag::HwrCache, PuTag::HwrCache);
            self.zone.free_tags(PuTag::HwrCacheUnlocked, PuTag::HwrCacheUnlocked);
            self.cache.stats.flushes += 1;
        }
    }

    /// Console listing of every cache entry that holds pixels or an upload.
    /// Returns the total texel count.
    pub fn texture_list(&self) -> usize {
        let zone = &self.zone;
        let epoch = self.cache.epoch;
        let mut texels = 0usize;

        let mut line = |kind: char, mip: &GlMipmap, name: &str| {
            let state = mip.state(zone, epoch);
            if state == MipState::Empty {
                return;
            }
            texels += mip.width as usize * mip.height as usize;
            com_printf(&format!(
                "{} {:4} {:4} {:<6} {}: {}\n",
                kind,
                mip.width,
                mip.height,
                mip.format.name(),
                state_char(state),
                name
            ));
        };

        com_printf("------------------\n");
        for (i, grtex) in self.cache.textures.iter().enumerate() {
            let name = self.textures.get(i).map_or("?", |t| t.name.as_str());
            line('T', &grtex.mipmap, name);
        }
        for tree in &self.cache.patches {
            for gpatch in tree.values() {
                let name = format!("{}:{}", gpatch.lump.wad, gpatch.lump.lump);
                line('P', &gpatch.mipmap, &name);
                for id in &gpatch.colormaps {
                    if let Some(mip) = self.cache.variants.get(id.0) {
                        line('C', mip, &name);
                    }
                }
            }
        }
        com_printf(&format!("Total texel count (not counting mipmaps): {}\n", texels));
        texels
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hw_defs::TextureFlags;
    use crate::hw_drv::NullDriver;
    use crate::hw_main::HwConfig;
    use crate::r_draw::{GtcFlags, Skin, TranslationSkin};
    use crate::r_patch::encode_patch;
    use crate::r_textures::{TexPatch, Texture, TextureList};
    use rb2_common::v_video::RgbaColor;
    use rb2_common::w_wad::{Lump, WadStore};

    const SPRITE: LumpNum = LumpNum::new(0, 0);
    const FLAT128: LumpNum = LumpNum::new(0, 1);
    const FLAT32: LumpNum = LumpNum::new(0, 2);
    const ODDFLAT: LumpNum = LumpNum::new(0, 3);
    const FADE: LumpNum = LumpNum::new(0, 4);
    const BADFADE: LumpNum = LumpNum::new(0, 5);

    fn store() -> WadStore {
        let mut store = WadStore::new();
        store
            .add_wad(
                "test",
                vec![
                    Lump::new("SPRITE", encode_patch(2, 1, 3, 4, &[Some(5), None])),
                    Lump::new("FLAT128", vec![1; 16384]),
                    Lump::new("FLAT32", vec![2; 1024]),
                    Lump::new("ODDFLAT", vec![3; 5000]),
                    Lump::new("FADE", vec![4; 4000]),
                    Lump::new("BADFADE", vec![4; 17]),
                ],
            )
            .unwrap();
        store
    }

    fn renderer_with(config: HwConfig) -> HwRenderer {
        let mut hw = HwRenderer::new(Box::new(store()), Box::new(NullDriver::new()), config);
        let mut textures = TextureList::new();
        textures.add(Texture::new("REDWALL", 2, 1, vec![TexPatch { originx: 0, originy: 0, lump: SPRITE }]));
        hw.set_textures(textures);
        hw
    }

    fn renderer() -> HwRenderer {
        renderer_with(HwConfig::default())
    }

    fn remap(from: u8, to: u8) -> Arc<Colormap> {
        let mut table = *Colormap::identity().table();
        table[from as usize] = to;
        Arc::new(Colormap::new(table))
    }

    #[test]
    fn test_get_patch_generates_once() {
        let mut hw = renderer();
        let gpatch = hw.get_patch(SPRITE);
        assert_eq!((gpatch.width, gpatch.height), (2, 1));
        assert_eq!((gpatch.leftoffset, gpatch.topoffset), (3, 4));
        assert_eq!((gpatch.max_s, gpatch.max_t), (1.0, 1.0));

        hw.get_patch(SPRITE);
        assert_eq!(hw.cache.stats.patches_generated, 1);
        assert_eq!(hw.cache.stats.uploads, 1);
    }

    #[test]
    fn test_patch_pixels_are_unlocked_after_upload() {
        let mut hw = renderer();
        let id = hw.get_patch(SPRITE).mipmap.data.unwrap();
        assert_eq!(hw.zone.tag_of(id), Some(PuTag::HwrCacheUnlocked));
        assert_eq!(hw.zone.get(id).unwrap(), &[5, 5, 5, 255, 0, 0, 0, 0]);
    }

    #[test]
    fn test_purged_upload_is_not_regenerated() {
        let mut hw = renderer();
        hw.get_patch(SPRITE);
        hw.zone.free_tags(PuTag::HwrCacheUnlocked, PuTag::HwrCacheUnlocked);

        let epoch = hw.cache.epoch();
        assert_eq!(hw.cache.patch(SPRITE).unwrap().mipmap.state(&hw.zone, epoch), MipState::Purged);
        hw.get_patch(SPRITE);
        assert_eq!(hw.cache.stats.patches_generated, 1);
        assert_eq!(hw.cache.stats.uploads, 1);
    }

    #[test]
    fn test_mapped_patch_variants() {
        let mut hw = renderer();
        let maps = [remap(5, 7), remap(5, 8), remap(5, 9)];
        for (i, map) in maps.iter().enumerate() {
            let mip = hw.get_mapped_patch(SPRITE, Some(map));
            assert_eq!(mip.width, 2);
            let data = hw.zone.get(hw.cache.variant(MipmapId(i)).unwrap().data.unwrap()).unwrap();
            let want = 7 + i as u8;
            assert_eq!(&data[0..4], &[want, want, want, 255]);
        }
        assert_eq!(hw.cache.num_variants(), 3);
        assert_eq!(hw.cache.patch(SPRITE).unwrap().colormaps, vec![MipmapId(0), MipmapId(1), MipmapId(2)]);

        // same identity again: a hit
        hw.get_mapped_patch(SPRITE, Some(&maps[1]));
        assert_eq!(hw.cache.stats.patches_generated, 3);
        assert!(hw.cache.variant_for(SPRITE, &maps[2]).is_some());

        // an equal table with a new identity is a new variant
        hw.get_mapped_patch(SPRITE, Some(&remap(5, 7)));
        assert_eq!(hw.cache.num_variants(), 4);
    }

    #[test]
    fn test_default_colormap_never_grows_chain() {
        let mut hw = renderer();
        let default = Arc::new(Colormap::identity());
        hw.set_default_colormap(Some(&default));

        hw.get_mapped_patch(SPRITE, None);
        hw.get_mapped_patch(SPRITE, Some(&default));
        assert_eq!(hw.cache.num_variants(), 0);
        assert!(hw.cache.patch(SPRITE).unwrap().colormaps.is_empty());
        assert_eq!(hw.cache.stats.patches_generated, 1);
    }

    #[test]
    fn test_palette_changes_reuse_translated_variants() {
        let config = HwConfig {
            patchformat: TextureFormat::Ap88,
            textureformat: TextureFormat::P8,
            ..HwConfig::default()
        };
        for config in [config, HwConfig::default()] {
            let mut hw = renderer_with(config);
            hw.skins.push(Skin::new("sonic", 160));
            for _ in 0..50 {
                let map = hw.get_translation_colormap(TranslationSkin::Skin(0), 18, GtcFlags::CACHE);
                hw.get_mapped_patch(SPRITE, Some(&map));
                hw.set_palette(Palette::greyscale());
            }
            assert_eq!(hw.cache.num_variants(), 1);
            assert_eq!(hw.cache.patch(SPRITE).unwrap().colormaps.len(), 1);
        }
    }

    #[test]
    fn test_translation_flush_drops_variants() {
        let mut hw = renderer();
        hw.skins.push(Skin::new("sonic", 160));
        let map = hw.get_translation_colormap(TranslationSkin::Skin(0), 18, GtcFlags::CACHE);
        let id = hw.get_mapped_patch(SPRITE, Some(&map)).data.unwrap();

        hw.flush_translation_colormap_cache();
        assert_eq!(hw.cache.num_variants(), 0);
        assert!(hw.cache.patch(SPRITE).unwrap().colormaps.is_empty());
        assert!(hw.cache.variant_for(SPRITE, &map).is_none());
        assert!(!hw.zone.is_valid(id));

        // a fresh colormap builds exactly one new variant
        let map = hw.get_translation_colormap(TranslationSkin::Skin(0), 18, GtcFlags::CACHE);
        hw.get_mapped_patch(SPRITE, Some(&map));
        hw.get_mapped_patch(SPRITE, Some(&map));
        assert_eq!(hw.cache.num_variants(), 1);
    }

    #[test]
    fn test_flat_sizes_through_cache() {
        let mut hw = renderer();
        let mip = hw.get_flat(FLAT128);
        assert_eq!((mip.width, mip.height, mip.format), (128, 128, TextureFormat::P8));
        assert_eq!(mip.flags, TextureFlags::WRAPXY | TextureFlags::CHROMAKEYED);
        assert_eq!(hw.get_flat(FLAT32).width, 32);
        assert_eq!(hw.get_flat(ODDFLAT).width, 64);
        hw.get_flat(FLAT32);
        assert_eq!(hw.cache.stats.flats_loaded, 3);
    }

    #[test]
    fn test_fade_masks_through_cache() {
        let mut hw = renderer();
        let mip = hw.get_fade_mask(FADE);
        assert_eq!((mip.width, mip.height, mip.format), (80, 50, TextureFormat::Alpha8));
        let mip = hw.get_fade_mask(BADFADE);
        assert_eq!((mip.width, mip.height), (0, 0));
        assert_eq!(hw.cache.stats.fademasks_loaded, 2);
    }

    #[test]
    fn test_get_texture() {
        let mut hw = renderer();
        let epoch = hw.cache.epoch();
        let grtex = hw.get_texture(0);
        assert_eq!(grtex.mipmap.flags, TextureFlags::CHROMAKEYED | TextureFlags::WRAPXY | TextureFlags::TRANSPARENT);
        assert!(grtex.mipmap.is_downloaded(epoch));
        hw.get_texture(0);
        assert_eq!(hw.cache.stats.textures_generated, 1);
    }

    #[test]
    fn test_free_texture_cache_regenerates() {
        let mut hw = renderer();
        hw.get_texture(0);
        hw.get_patch(SPRITE);
        let epoch = hw.cache.epoch();

        hw.free_texture_cache();
        assert_eq!(hw.cache.textures.len(), 1);
        assert_eq!(hw.cache.num_patches(), 0);
        assert_ne!(hw.cache.epoch(), epoch);
        assert_eq!(hw.zone.block_count(), 0);

        hw.get_texture(0);
        assert_eq!(hw.cache.stats.textures_generated, 2);
        assert_eq!(hw.cache.stats.uploads, 3);
    }

    #[test]
    #[should_panic(expected = "get_texture: tex >= numtextures (1 >= 1)")]
    fn test_get_texture_out_of_range() {
        let mut hw = renderer();
        hw.get_texture(1);
    }

    #[test]
    #[should_panic(expected = "get_patch")]
    fn test_get_patch_bad_lump() {
        let mut hw = renderer();
        hw.get_patch(LumpNum::new(3, 0));
    }

    #[test]
    fn test_prep_level_cache_resizes() {
        let mut hw = renderer();
        hw.get_texture(0);
        hw.prep_level_cache(4);
        assert_eq!(hw.cache.textures.len(), 4);
        assert!(hw.cache.textures.iter().all(|t| t.mipmap.data.is_none()));
    }

    #[test]
    fn test_set_palette_flushes_rgba() {
        let mut hw = renderer();
        hw.get_patch(SPRITE);
        let mut pal = Palette::greyscale();
        pal.set_color(5, RgbaColor::new(1, 2, 3, 255));
        hw.set_palette(pal);

        let id = hw.get_patch(SPRITE).mipmap.data.unwrap();
        assert_eq!(&hw.zone.get(id).unwrap()[0..4], &[1, 2, 3, 255]);
        assert_eq!(hw.cache.stats.patches_generated, 2);
        // the record itself survives
        assert_eq!(hw.cache.num_patches(), 1);
    }

    #[test]
    fn test_set_palette_keeps_paletted() {
        let config = HwConfig {
            patchformat: TextureFormat::Ap88,
            textureformat: TextureFormat::P8,
            ..HwConfig::default()
        };
        let mut hw = renderer_with(config);
        hw.get_patch(SPRITE);
        hw.set_palette(Palette::greyscale());
        hw.get_patch(SPRITE);
        assert_eq!(hw.cache.stats.patches_generated, 1);
        assert_eq!(hw.cache.stats.uploads, 1);
    }

    #[test]
    fn test_get_cached_patch_is_metadata_only() {
        let mut hw = renderer();
        let gpatch = hw.get_cached_patch(SPRITE);
        assert_eq!((gpatch.width, gpatch.height, gpatch.leftoffset, gpatch.topoffset), (2, 1, 3, 4));
        assert!(gpatch.mipmap.data.is_none());
        assert_eq!(hw.cache.stats.generations(), 0);
    }

    #[test]
    fn test_unlock_cached_patch() {
        let mut hw = renderer();
        let id = hw.get_patch(SPRITE).mipmap.data.unwrap();
        hw.zone.change_tag(id, PuTag::HwrCache);
        hw.unlock_cached_patch(SPRITE);
        assert_eq!(hw.zone.tag_of(id), Some(PuTag::HwrCacheUnlocked));
        // unknown lumps are ignored
        hw.unlock_cached_patch(LumpNum::new(0, 40));
    }

    #[test]
    fn test_texture_list_counts_texels() {
        let mut hw = renderer();
        assert_eq!(hw.texture_list(), 0);
        hw.get_texture(0);
        hw.get_flat(FLAT32);
        hw.get_mapped_patch(SPRITE, Some(&remap(5, 6)));
        assert_eq!(hw.texture_list(), 2 + 32 * 32 + 2);
    }
}
