#![allow(clippy::too_many_arguments, clippy::needless_range_loop, clippy::manual_range_contains,
         clippy::new_without_default)]

pub mod common;
pub mod cvar;
pub mod m_fixed;
pub mod z_zone;
pub mod w_wad;
pub mod v_video;
