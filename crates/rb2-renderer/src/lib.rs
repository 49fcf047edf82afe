#![allow(clippy::too_many_arguments, clippy::needless_range_loop, clippy::manual_range_contains,
         clippy::new_without_default)]
// Hardware renderer texture cache and sprite translation colormaps

// Shared definitions and the driver seam
pub mod hw_defs;
pub mod hw_drv;

// Source graphics
pub mod r_patch;
pub mod r_textures;
pub mod r_draw;

// Conversion and caching
pub mod hw_patch;
pub mod hw_texture;
pub mod hw_flat;
pub mod hw_cache;
pub mod hw_main;
pub mod hw_dump;

pub use hw_main::{HwConfig, HwRenderer};
