// hw_main.rs — hardware renderer context, configuration and startup

use std::sync::Arc;

use rb2_common::common::{com_dprintf, com_printf, com_set_developer, com_warning, DISTNAME, DISTVER};
use rb2_common::cvar::{CvarContext, CVAR_ARCHIVE, CVAR_LATCH, CVAR_NOSET, CVAR_ZERO};
use rb2_common::v_video::Palette;
use rb2_common::w_wad::ResourceStore;
use rb2_common::z_zone::Zone;

use crate::hw_cache::HwCache;
use crate::hw_defs::{ChromaKey, TextureFormat, HWR_CHROMAKEY_EQUIVALENTCOLORINDEX, HWR_PATCHES_CHROMAKEY_COLORINDEX};
use crate::hw_drv::HwDriver;
use crate::r_draw::{Colormap, GtcFlags, Skin, TranslationCache, TranslationSkin};
use crate::r_textures::TextureList;

/// Palette lump read at startup.
pub const PALETTE_LUMP: &str = "PLAYPAL";

/// Renderer settings, snapshotted from the cvars.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HwConfig {
    /// Format of patches and sprites.
    pub patchformat: TextureFormat,
    /// Format of composite wall textures.
    pub textureformat: TextureFormat,
    pub chroma: ChromaKey,
    /// Zone budget in bytes, 0 = unlimited.
    pub zone_limit: usize,
    pub developer: bool,
}

impl Default for HwConfig {
    fn default() -> Self {
        HwConfig {
            patchformat: TextureFormat::Rgba,
            textureformat: TextureFormat::Rgba,
            chroma: ChromaKey::default(),
            zone_limit: 0,
            developer: false,
        }
    }
}

fn format_cvar(cvars: &CvarContext, name: &str, allowed: &[TextureFormat], default: TextureFormat) -> TextureFormat {
    let value = cvars.variable_string(name);
    match TextureFormat::from_name(value) {
        Some(f) if allowed.contains(&f) => f,
        _ => {
            com_warning(&format!("{}: bad texture format \"{}\", using {}\n", name, value, default.name()));
            default
        }
    }
}

fn index_cvar(cvars: &CvarContext, name: &str, default: u8) -> u8 {
    let v = cvars.variable_value(name);
    if (0.0..=255.0).contains(&v) {
        v as u8
    } else {
        com_warning(&format!("{}: {} is not a palette index, using {}\n", name, v, default));
        default
    }
}

impl HwConfig {
    pub fn from_cvars(cvars: &CvarContext) -> Self {
        HwConfig {
            patchformat: format_cvar(
                cvars,
                "gr_patchformat",
                &[TextureFormat::Rgba, TextureFormat::Ap88],
                TextureFormat::Rgba,
            ),
            textureformat: format_cvar(
                cvars,
                "gr_textureformat",
                &[TextureFormat::Rgba, TextureFormat::P8],
                TextureFormat::Rgba,
            ),
            chroma: ChromaKey {
                index: index_cvar(cvars, "gr_chromakey", HWR_PATCHES_CHROMAKEY_COLORINDEX),
                equivalent: index_cvar(cvars, "gr_chromakeyequiv", HWR_CHROMAKEY_EQUIVALENTCOLORINDEX),
            },
            zone_limit: cvars.variable_value("zone_heapsize").max(0.0) as usize * 1024,
            developer: cvars.variable_value("developer") != 0.0,
        }
    }
}

/// Registers the renderer's cvars with their defaults.
pub fn hw_register_cvars(cvars: &mut CvarContext) {
    cvars.get("gr_patchformat", "rgba", CVAR_ARCHIVE | CVAR_LATCH);
    cvars.get("gr_textureformat", "rgba", CVAR_ARCHIVE | CVAR_LATCH);
    cvars.get("gr_chromakey", &HWR_PATCHES_CHROMAKEY_COLORINDEX.to_string(), CVAR_LATCH);
    cvars.get("gr_chromakeyequiv", &HWR_CHROMAKEY_EQUIVALENTCOLORINDEX.to_string(), CVAR_LATCH);
    cvars.get("zone_heapsize", "0", CVAR_NOSET);
    cvars.get("developer", "0", CVAR_ZERO);
}

/// Everything the hardware texture cache works on. One value per renderer
/// instance; nothing here is process-global.
pub struct HwRenderer {
    pub zone: Zone,
    pub wad: Box<dyn ResourceStore>,
    pub driver: Box<dyn HwDriver>,
    pub palette: Palette,
    pub textures: TextureList,
    pub cache: HwCache,
    pub translations: TranslationCache,
    pub skins: Vec<Skin>,
    pub config: HwConfig,
}

impl HwRenderer {
    pub fn new(wad: Box<dyn ResourceStore>, driver: Box<dyn HwDriver>, config: HwConfig) -> Self {
        HwRenderer {
            zone: Zone::with_limit(config.zone_limit),
            wad,
            driver,
            palette: Palette::default(),
            textures: TextureList::new(),
            cache: HwCache::new(),
            translations: TranslationCache::new(),
            skins: Vec::new(),
            config,
        }
    }

    /// Registers the cvars, reads the configuration and the palette lump,
    /// and hands the palette to the driver.
    pub fn startup(wad: Box<dyn ResourceStore>, driver: Box<dyn HwDriver>, cvars: &mut CvarContext) -> Self {
        hw_register_cvars(cvars);
        let config = HwConfig::from_cvars(cvars);
        com_set_developer(config.developer);

        let mut hw = HwRenderer::new(wad, driver, config);
        com_printf(&format!("{} {:.2} hardware renderer\n", DISTNAME, DISTVER));
        com_printf(&format!(
            "patches {}, textures {}\n",
            config.patchformat.name(),
            config.textureformat.name()
        ));

        if let Some(palette) = hw.load_palette_lump(PALETTE_LUMP) {
            hw.set_palette(palette);
        } else {
            com_warning(&format!("{} not found, using a greyscale palette\n", PALETTE_LUMP));
            let palette = hw.palette.clone();
            hw.driver.set_palette(&palette);
        }
        hw
    }

    /// Decodes the first palette of an RGB palette lump.
    pub fn load_palette_lump(&self, name: &str) -> Option<Palette> {
        let lump = self.wad.find_lump(name)?;
        let raw = self.wad.cache_lump(lump).ok()?;
        Palette::from_rgb_lump(&raw)
    }

    /// Re-reads the cvars. Format or chroma key changes invalidate
    /// everything cached; a new zone budget applies to later allocations.
    pub fn apply_cvars(&mut self, cvars: &mut CvarContext) {
        cvars.apply_latched();
        let config = HwConfig::from_cvars(cvars);
        com_set_developer(config.developer);

        let rebuild = config.patchformat != self.config.patchformat
            || config.textureformat != self.config.textureformat
            || config.chroma != self.config.chroma;
        if config.zone_limit != self.config.zone_limit {
            self.zone.set_limit(config.zone_limit);
        }
        self.config = config;

        if rebuild {
            com_dprintf("renderer formats changed, flushing texture cache\n");
            let numtextures = self.cache.textures.len();
            self.prep_level_cache(numtextures);
        }
    }

    /// Installs the level's texture definitions and sizes the texture cache
    /// to match.
    pub fn set_textures(&mut self, textures: TextureList) {
        let n = textures.len();
        self.textures = textures;
        self.prep_level_cache(n);
    }

    /// Level-load entry point: fresh texture cache, fresh translations.
    pub fn setup_level(&mut self) {
        let n = self.textures.len();
        self.prep_level_cache(n);
        self.flush_translation_colormap_cache();
    }

    /// Base lighting colormap. Passing it to `get_mapped_patch` means
    /// "no remap".
    pub fn set_default_colormap(&mut self, colormap: Option<&Arc<Colormap>>) {
        self.cache.set_default_colormap(colormap.map(|c| c.id()));
    }

    pub fn get_translation_colormap(&self, skin: TranslationSkin, color: u8, flags: GtcFlags) -> Arc<Colormap> {
        self.translations.get_translation_colormap(&self.skins, skin, color, flags)
    }

    /// Forgets the cached translations along with the sprite variants
    /// built from them.
    pub fn flush_translation_colormap_cache(&mut self) {
        self.translations.flush();
        self.cache.drop_variants(&mut self.zone);
    }
}
