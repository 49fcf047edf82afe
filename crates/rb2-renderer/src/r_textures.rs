// r_textures.rs — composite wall texture definitions
//
// A texture is a named canvas assembled from patches at fixed offsets. The
// hardware cache only reads these; they come either from code or from the
// TEXTURE1/TEXTURE2 + PNAMES lumps.

use std::collections::HashMap;

use thiserror::Error;

use rb2_common::common::com_dprintf;
use rb2_common::w_wad::{LumpNum, ResourceStore, WadError};

const MAPTEXTURE_HEADER_SIZE: usize = 22;
const MAPPATCH_SIZE: usize = 10;
const PNAME_SIZE: usize = 8;

/// One patch placement inside a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TexPatch {
    pub originx: i16,
    pub originy: i16,
    pub lump: LumpNum,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Texture {
    pub name: String,
    pub width: u16,
    pub height: u16,
    pub patches: Vec<TexPatch>,
}

impl Texture {
    pub fn new(name: &str, width: u16, height: u16, patches: Vec<TexPatch>) -> Self {
        Texture { name: name.to_ascii_uppercase(), width, height, patches }
    }

    /// Sky textures are named SKY plus one or two characters.
    pub fn is_sky(&self) -> bool {
        self.name.len() <= 5 && self.name.get(..3).map_or(false, |p| p.eq_ignore_ascii_case("SKY"))
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TextureError {
    #[error(transparent)]
    Wad(#[from] WadError),
    #[error("{lump}: truncated at offset {offset}")]
    Truncated { lump: String, offset: usize },
    #[error("texture {texture}: patch index {index} is not in PNAMES")]
    BadPatchIndex { texture: String, index: i16 },
    #[error("texture {texture}: missing patch {patch}")]
    MissingPatch { texture: String, patch: String },
}

/// All textures of the current level, indexed by texture number.
#[derive(Debug, Default)]
pub struct TextureList {
    textures: Vec<Texture>,
    by_name: HashMap<String, usize>,
}

impl TextureList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a texture and returns its number. A later texture with the same
    /// name shadows the earlier one for name lookups.
    pub fn add(&mut self, texture: Texture) -> usize {
        let num = self.textures.len();
        self.by_name.insert(texture.name.clone(), num);
        self.textures.push(texture);
        num
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.textures.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }

    #[inline]
    pub fn get(&self, num: usize) -> Option<&Texture> {
        self.textures.get(num)
    }

    pub fn check_texture_num_for_name(&self, name: &str) -> Option<usize> {
        self.by_name.get(&name.to_ascii_uppercase()).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Texture> {
        self.textures.iter()
    }

    /// Loads a TEXTURE1-format lump, resolving patch numbers through the
    /// PNAMES lump. Returns how many textures were added.
    pub fn load_texture_lump(
        &mut self,
        wad: &dyn ResourceStore,
        texture_lump: &str,
        pnames_lump: &str,
    ) -> Result<usize, TextureError> {
        let pnames = read_pnames(wad, pnames_lump)?;
        let num = wad.find_lump(texture_lump).ok_or_else(|| WadError::NoSuchName(texture_lump.to_string()))?;
        let raw = wad.cache_lump(num)?;

        let truncated = |offset| TextureError::Truncated { lump: texture_lump.to_string(), offset };

        let numtextures = read_i32(&raw, 0).ok_or_else(|| truncated(0))?.max(0) as usize;
        let mut added = 0;
        for i in 0..numtextures {
            let ofs = read_i32(&raw, 4 + i * 4).ok_or_else(|| truncated(4 + i * 4))?.max(0) as usize;
            let header = raw.get(ofs..ofs + MAPTEXTURE_HEADER_SIZE).ok_or_else(|| truncated(ofs))?;

            let name = lump_name(&header[0..8]);
            let width = i16::from_le_bytes([header[12], header[13]]).max(0) as u16;
            let height = i16::from_le_bytes([header[14], header[15]]).max(0) as u16;
            let patchcount = i16::from_le_bytes([header[20], header[21]]).max(0) as usize;

            let mut patches = Vec::with_capacity(patchcount);
            for p in 0..patchcount {
                let pofs = ofs + MAPTEXTURE_HEADER_SIZE + p * MAPPATCH_SIZE;
                let mp = raw.get(pofs..pofs + MAPPATCH_SIZE).ok_or_else(|| truncated(pofs))?;
                let index = i16::from_le_bytes([mp[4], mp[5]]);
                let pname = usize::try_from(index)
                    .ok()
                    .and_then(|i| pnames.get(i))
                    .ok_or_else(|| TextureError::BadPatchIndex { texture: name.clone(), index })?;
                let lump = wad
                    .find_lump(pname)
                    .ok_or_else(|| TextureError::MissingPatch { texture: name.clone(), patch: pname.clone() })?;
                patches.push(TexPatch {
                    originx: i16::from_le_bytes([mp[0], mp[1]]),
                    originy: i16::from_le_bytes([mp[2], mp[3]]),
                    lump,
                });
            }

            self.add(Texture::new(&name, width, height, patches));
            added += 1;
        }

        com_dprintf(&format!("{}: {} textures\n", texture_lump, added));
        Ok(added)
    }
}

fn read_i32(raw: &[u8], ofs: usize) -> Option<i32> {
    raw.get(ofs..ofs + 4).map(|b| i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

fn lump_name(raw: &[u8]) -> String {
    let len = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    String::from_utf8_lossy(&raw[..len]).to_ascii_uppercase()
}

fn read_pnames(wad: &dyn ResourceStore, pnames_lump: &str) -> Result<Vec<String>, TextureError> {
    let num = wad.find_lump(pnames_lump).ok_or_else(|| WadError::NoSuchName(pnames_lump.to_string()))?;
    let raw = wad.cache_lump(num)?;
    let count = read_i32(&raw, 0)
        .ok_or(TextureError::Truncated { lump: pnames_lump.to_string(), offset: 0 })?
        .max(0) as usize;
    (0..count)
        .map(|i| {
            let ofs = 4 + i * PNAME_SIZE;
            raw.get(ofs..ofs + PNAME_SIZE)
                .map(lump_name)
                .ok_or(TextureError::Truncated { lump: pnames_lump.to_string(), offset: ofs })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rb2_common::w_wad::{Lump, WadStore};

    fn name8(s: &str) -> [u8; 8] {
        let mut n = [0u8; 8];
        n[..s.len()].copy_from_slice(s.as_bytes());
        n
    }

    fn texture_lump(defs: &[(&str, i16, i16, &[(i16, i16, i16)])]) -> Vec<u8> {
        let mut raw = Vec::new();
        raw.extend_from_slice(&(defs.len() as i32).to_le_bytes());
        let table = raw.len();
        raw.resize(table + defs.len() * 4, 0);
        for (i, (name, w, h, patches)) in defs.iter().enumerate() {
            let ofs = raw.len() as i32;
            raw[table + i * 4..][..4].copy_from_slice(&ofs.to_le_bytes());
            raw.extend_from_slice(&name8(name));
            raw.extend_from_slice(&0i32.to_le_bytes());
            raw.extend_from_slice(&w.to_le_bytes());
            raw.extend_from_slice(&h.to_le_bytes());
            raw.extend_from_slice(&0i32.to_le_bytes());
            raw.extend_from_slice(&(patches.len() as i16).to_le_bytes());
            for (x, y, p) in patches.iter() {
                raw.extend_from_slice(&x.to_le_bytes());
                raw.extend_from_slice(&y.to_le_bytes());
                raw.extend_from_slice(&p.to_le_bytes());
                raw.extend_from_slice(&[0u8; 4]);
            }
        }
        raw
    }

    fn pnames_lump(names: &[&str]) -> Vec<u8> {
        let mut raw = (names.len() as i32).to_le_bytes().to_vec();
        for n in names {
            raw.extend_from_slice(&name8(n));
        }
        raw
    }

    #[test]
    fn test_sky_names() {
        assert!(Texture::new("SKY1", 256, 128, vec![]).is_sky());
        assert!(Texture::new("sky", 256, 128, vec![]).is_sky());
        assert!(Texture::new("SKY99", 256, 128, vec![]).is_sky());
        assert!(!Texture::new("SKYWALL1", 64, 64, vec![]).is_sky());
        assert!(!Texture::new("SK", 64, 64, vec![]).is_sky());
    }

    #[test]
    fn test_add_and_lookup() {
        let mut list = TextureList::new();
        let a = list.add(Texture::new("wall", 64, 64, vec![]));
        let b = list.add(Texture::new("WALL", 32, 32, vec![]));
        assert_eq!((a, b), (0, 1));
        assert_eq!(list.check_texture_num_for_name("Wall"), Some(1));
        assert_eq!(list.get(0).unwrap().width, 64);
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_load_texture_lump() {
        let mut store = WadStore::new();
        store
            .add_wad(
                "base",
                vec![
                    Lump::new("PNAMES", pnames_lump(&["brick", "trim"])),
                    Lump::new("TEXTURE1", texture_lump(&[("BRICKS", 128, 64, &[(0, 0, 0), (64, -8, 1)][..])])),
                    Lump::new("BRICK", vec![0; 8]),
                    Lump::new("TRIM", vec![0; 8]),
                ],
            )
            .unwrap();

        let mut list = TextureList::new();
        assert_eq!(list.load_texture_lump(&store, "TEXTURE1", "PNAMES"), Ok(1));
        let tex = list.get(0).unwrap();
        assert_eq!((tex.name.as_str(), tex.width, tex.height), ("BRICKS", 128, 64));
        assert_eq!(
            tex.patches,
            vec![
                TexPatch { originx: 0, originy: 0, lump: LumpNum::new(0, 2) },
                TexPatch { originx: 64, originy: -8, lump: LumpNum::new(0, 3) },
            ]
        );
    }

    #[test]
    fn test_load_texture_lump_errors() {
        let mut store = WadStore::new();
        store
            .add_wad(
                "base",
                vec![
                    Lump::new("PNAMES", pnames_lump(&["nothere"])),
                    Lump::new("TEXTURE1", texture_lump(&[("A", 8, 8, &[(0, 0, 0)][..])])),
                    Lump::new("TEXTURE2", texture_lump(&[("B", 8, 8, &[(0, 0, 3)][..])])),
                ],
            )
            .unwrap();

        let mut list = TextureList::new();
        assert_eq!(
            list.load_texture_lump(&store, "TEXTURE1", "PNAMES"),
            Err(TextureError::MissingPatch { texture: "A".into(), patch: "NOTHERE".into() })
        );
        assert_eq!(
            list.load_texture_lump(&store, "TEXTURE2", "PNAMES"),
            Err(TextureError::BadPatchIndex { texture: "B".into(), index: 3 })
        );
        assert_eq!(
            list.load_texture_lump(&store, "TEXTURE3", "PNAMES"),
            Err(TextureError::Wad(WadError::NoSuchName("TEXTURE3".into())))
        );
    }
}
