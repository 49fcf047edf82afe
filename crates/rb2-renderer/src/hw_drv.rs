// hw_drv.rs — interface between the texture cache and a rendering driver

use std::collections::HashMap;

use rb2_common::v_video::Palette;

use crate::hw_defs::{TextureFlags, TextureFormat};

/// Driver-side texture name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureHandle(pub u32);

/// What the cache hands to `set_texture`.
#[derive(Debug, Clone, Copy)]
pub struct MipUpload<'a> {
    pub width: u16,
    pub height: u16,
    pub format: TextureFormat,
    pub flags: TextureFlags,
    /// `width * height * format.bpp()` bytes, or empty when the image has
    /// no pixels.
    pub data: &'a [u8],
}

/// Calls the cache makes into the driver. Drivers may keep their own copy of
/// the pixels; the cache never assumes the system copy outlives an upload.
pub trait HwDriver {
    /// Uploads pixels, returning the name to bind them with.
    fn set_texture(&mut self, upload: &MipUpload<'_>) -> TextureHandle;

    /// Makes an uploaded texture current.
    fn bind_texture(&mut self, handle: TextureHandle);

    /// New palette for paletted formats.
    fn set_palette(&mut self, palette: &Palette);

    /// Drops every uploaded texture. All handles become invalid.
    fn clear_mipmap_cache(&mut self);
}

#[derive(Debug, Clone)]
pub struct UploadedTexture {
    pub width: u16,
    pub height: u16,
    pub format: TextureFormat,
    pub flags: TextureFlags,
    pub data: Vec<u8>,
}

/// Headless driver: keeps uploads in memory and counts calls. Used by the
/// dedicated server path and by tests.
#[derive(Debug, Default)]
pub struct NullDriver {
    next_handle: u32,
    pub textures: HashMap<TextureHandle, UploadedTexture>,
    pub bound: Option<TextureHandle>,
    pub uploads: u32,
    pub binds: u32,
    pub palette_changes: u32,
    pub clears: u32,
}

impl NullDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn texture(&self, handle: TextureHandle) -> Option<&UploadedTexture> {
        self.textures.get(&handle)
    }
}

impl HwDriver for NullDriver {
    fn set_texture(&mut self, upload: &MipUpload<'_>) -> TextureHandle {
        self.next_handle += 1;
        let handle = TextureHandle(self.next_handle);
        self.textures.insert(
            handle,
            UploadedTexture {
                width: upload.width,
                height: upload.height,
                format: upload.format,
                flags: upload.flags,
                data: upload.data.to_vec(),
            },
        );
        self.uploads += 1;
        handle
    }

    fn bind_texture(&mut self, handle: TextureHandle) {
        self.bound = Some(handle);
        self.binds += 1;
    }

    fn set_palette(&mut self, _palette: &Palette) {
        self.palette_changes += 1;
    }

    fn clear_mipmap_cache(&mut self) {
        self.textures.clear();
        self.bound = None;
        self.clears += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_driver_tracks_uploads() {
        let mut drv = NullDriver::new();
        let pixels = [1u8, 2, 3, 4];
        let h = drv.set_texture(&MipUpload {
            width: 1,
            height: 1,
            format: TextureFormat::Rgba,
            flags: TextureFlags::WRAPXY,
            data: &pixels,
        });
        drv.bind_texture(h);
        assert_eq!(drv.bound, Some(h));
        assert_eq!(drv.texture(h).unwrap().data, pixels);

        let h2 = drv.set_texture(&MipUpload {
            width: 0,
            height: 0,
            format: TextureFormat::Alpha8,
            flags: TextureFlags::empty(),
            data: &[],
        });
        assert_ne!(h, h2);
        assert_eq!(drv.uploads, 2);

        drv.clear_mipmap_cache();
        assert!(drv.textures.is_empty());
        assert_eq!(drv.bound, None);
        assert_eq!(drv.clears, 1);
    }
}
