// hw_dump.rs — write cached mipmaps out as PNG for debugging

use std::path::Path;

use thiserror::Error;

use rb2_common::common::com_printf;
use rb2_common::v_video::{Palette, RgbaColor};
use rb2_common::z_zone::Zone;

use crate::hw_defs::{GlMipmap, TextureFormat};

#[derive(Debug, Error)]
pub enum DumpError {
    #[error("mipmap has no pixels in memory")]
    NoData,
    #[error("cannot convert {0} pixels")]
    Unsupported(&'static str),
    #[error(transparent)]
    Image(#[from] image::ImageError),
}

/// Expands `data` (laid out as `mip` describes) to straight RGBA.
pub fn mipmap_to_rgba(mip: &GlMipmap, data: &[u8], palette: &Palette) -> Result<Vec<u8>, DumpError> {
    let texels = mip.width as usize * mip.height as usize;
    let bpp = mip.format.bpp();
    let data = data.get(..texels * bpp).ok_or(DumpError::NoData)?;

    let colors: Vec<RgbaColor> = match mip.format {
        TextureFormat::Rgba => return Ok(data.to_vec()),
        TextureFormat::P8 => data.iter().map(|&i| palette.get_color(i)).collect(),
        TextureFormat::Ap88 => data
            .chunks_exact(2)
            .map(|px| {
                let v = u16::from_ne_bytes([px[0], px[1]]);
                RgbaColor { alpha: (v >> 8) as u8, ..palette.get_color(v as u8) }
            })
            .collect(),
        TextureFormat::Alpha8 => data.iter().map(|&a| RgbaColor::new(0xff, 0xff, 0xff, a)).collect(),
        other => return Err(DumpError::Unsupported(other.name())),
    };
    Ok(bytemuck::cast_slice(&colors).to_vec())
}

/// Converts `mip`'s system copy and saves it as a PNG at `path`.
pub fn write_mipmap_png(path: &Path, mip: &GlMipmap, zone: &Zone, palette: &Palette) -> Result<(), DumpError> {
    let data = mip.data.and_then(|id| zone.get(id)).ok_or(DumpError::NoData)?;
    let rgba = mipmap_to_rgba(mip, data, palette)?;
    let img = image::RgbaImage::from_raw(mip.width as u32, mip.height as u32, rgba).ok_or(DumpError::NoData)?;
    img.save_with_format(path, image::ImageFormat::Png)?;
    com_printf(&format!("Wrote {}\n", path.display()));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rb2_common::z_zone::PuTag;

    fn mip(width: u16, height: u16, format: TextureFormat) -> GlMipmap {
        GlMipmap { width, height, format, ..Default::default() }
    }

    fn palette() -> Palette {
        let mut pal = Palette::greyscale();
        pal.set_color(7, RgbaColor::new(70, 80, 90, 255));
        pal
    }

    #[test]
    fn test_p8_to_rgba() {
        let out = mipmap_to_rgba(&mip(2, 1, TextureFormat::P8), &[7, 1], &palette()).unwrap();
        assert_eq!(out, vec![70, 80, 90, 255, 1, 1, 1, 255]);
    }

    #[test]
    fn test_ap88_to_rgba() {
        let mut data = Vec::new();
        data.extend_from_slice(&((0xffu16 << 8) | 7).to_ne_bytes());
        data.extend_from_slice(&130u16.to_ne_bytes());
        let out = mipmap_to_rgba(&mip(2, 1, TextureFormat::Ap88), &data, &palette()).unwrap();
        assert_eq!(out, vec![70, 80, 90, 255, 130, 130, 130, 0]);
    }

    #[test]
    fn test_alpha8_and_unsupported() {
        let out = mipmap_to_rgba(&mip(1, 1, TextureFormat::Alpha8), &[9], &palette()).unwrap();
        assert_eq!(out, vec![255, 255, 255, 9]);
        assert!(matches!(
            mipmap_to_rgba(&mip(1, 1, TextureFormat::Rgb565), &[0, 0], &palette()),
            Err(DumpError::Unsupported("RGB565"))
        ));
        assert!(matches!(
            mipmap_to_rgba(&mip(2, 2, TextureFormat::Rgba), &[0; 4], &palette()),
            Err(DumpError::NoData)
        ));
    }

    #[test]
    fn test_write_png() {
        let mut zone = Zone::new();
        let mut m = mip(2, 1, TextureFormat::P8);
        m.data = Some(zone.malloc_from(vec![7, 3], PuTag::HwrCache));

        let path = std::env::temp_dir().join(format!("rb2_dump_{}.png", std::process::id()));
        write_mipmap_png(&path, &m, &zone, &palette()).unwrap();
        let img = image::open(&path).unwrap().to_rgba8();
        std::fs::remove_file(&path).ok();

        assert_eq!(img.dimensions(), (2, 1));
        assert_eq!(img.get_pixel(0, 0).0, [70, 80, 90, 255]);
        assert_eq!(img.get_pixel(1, 0).0, [3, 3, 3, 255]);
    }

    #[test]
    fn test_write_png_without_data() {
        let zone = Zone::new();
        let m = mip(2, 1, TextureFormat::P8);
        let path = std::env::temp_dir().join("rb2_dump_missing.png");
        assert!(matches!(write_mipmap_png(&path, &m, &zone, &palette()), Err(DumpError::NoData)));
    }
}
