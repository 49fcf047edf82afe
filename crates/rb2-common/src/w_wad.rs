// w_wad.rs — lump resource store
//
// Lumps are addressed by (wad file, index within file). The renderer only
// sees the `ResourceStore` trait; `WadStore` is the in-memory implementation
// used by the engine and by tests.

use std::borrow::Cow;

use thiserror::Error;

use crate::common::com_dprintf;

/// IWAD / PWAD header magic.
pub const IWAD_IDENT: &[u8; 4] = b"IWAD";
pub const PWAD_IDENT: &[u8; 4] = b"PWAD";
pub const WAD_HEADER_SIZE: usize = 12;
pub const WAD_DIRENTRY_SIZE: usize = 16;

pub const MAX_WADFILES: usize = 48;

/// Namespaced lump id: which loaded wad, and which lump inside it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LumpNum {
    pub wad: u16,
    pub lump: u16,
}

impl LumpNum {
    pub const fn new(wad: u16, lump: u16) -> Self {
        LumpNum { wad, lump }
    }

    /// Packed form: wad number in the high 16 bits.
    pub const fn from_packed(packed: u32) -> Self {
        LumpNum { wad: (packed >> 16) as u16, lump: (packed & 0xffff) as u16 }
    }

    pub const fn packed(self) -> u32 {
        ((self.wad as u32) << 16) | self.lump as u32
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WadError {
    #[error("wad file {0} is not loaded")]
    NoSuchWad(u16),
    #[error("lump {lump} does not exist in wad {wad}")]
    NoSuchLump { wad: u16, lump: u16 },
    #[error("lump \"{0}\" not found")]
    NoSuchName(String),
    #[error("{0}: not an IWAD or PWAD")]
    BadHeader(String),
    #[error("{name}: directory entry {index} points outside the file")]
    BadDirectory { name: String, index: usize },
    #[error("too many wad files loaded ({0})")]
    TooManyWads(usize),
}

/// Everything the texture cache needs from the file system.
pub trait ResourceStore {
    fn num_wads(&self) -> usize;

    fn lump_length(&self, lump: LumpNum) -> Result<usize, WadError>;

    /// Copies the lump into `dest`, returning the number of bytes written
    /// (the smaller of the lump length and `dest.len()`).
    fn read_lump(&self, lump: LumpNum, dest: &mut [u8]) -> Result<usize, WadError>;

    /// Whole lump contents, borrowed when the store keeps lumps in memory.
    fn cache_lump(&self, lump: LumpNum) -> Result<Cow<'_, [u8]>, WadError>;

    /// Last loaded wad wins, like the lump search order of the engine.
    fn find_lump(&self, name: &str) -> Option<LumpNum>;
}

#[derive(Debug, Clone)]
pub struct Lump {
    pub name: String,
    pub data: Vec<u8>,
}

impl Lump {
    pub fn new(name: &str, data: Vec<u8>) -> Self {
        Lump { name: name.to_ascii_uppercase(), data }
    }
}

#[derive(Debug, Clone)]
pub struct WadFile {
    pub filename: String,
    pub lumps: Vec<Lump>,
}

#[derive(Debug, Default)]
pub struct WadStore {
    wads: Vec<WadFile>,
}

fn read_i32(raw: &[u8], ofs: usize) -> i32 {
    i32::from_le_bytes([raw[ofs], raw[ofs + 1], raw[ofs + 2], raw[ofs + 3]])
}

fn lump_name(raw: &[u8]) -> String {
    let len = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    String::from_utf8_lossy(&raw[..len]).to_ascii_uppercase()
}

impl WadStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a wad built from in-memory lumps. Returns its wad number.
    pub fn add_wad(&mut self, filename: &str, lumps: Vec<Lump>) -> Result<u16, WadError> {
        if self.wads.len() >= MAX_WADFILES {
            return Err(WadError::TooManyWads(self.wads.len()));
        }
        self.wads.push(WadFile { filename: filename.to_string(), lumps });
        Ok((self.wads.len() - 1) as u16)
    }

    /// Parses an IWAD/PWAD image and registers it.
    pub fn load_wad_bytes(&mut self, filename: &str, raw: &[u8]) -> Result<u16, WadError> {
        if raw.len() < WAD_HEADER_SIZE || (&raw[0..4] != IWAD_IDENT && &raw[0..4] != PWAD_IDENT) {
            return Err(WadError::BadHeader(filename.to_string()));
        }

        let numlumps = read_i32(raw, 4).max(0) as usize;
        let infotableofs = read_i32(raw, 8).max(0) as usize;
        let dir_end = infotableofs + numlumps * WAD_DIRENTRY_SIZE;
        if dir_end > raw.len() {
            return Err(WadError::BadHeader(filename.to_string()));
        }

        let mut lumps = Vec::with_capacity(numlumps);
        for index in 0..numlumps {
            let entry = &raw[infotableofs + index * WAD_DIRENTRY_SIZE..][..WAD_DIRENTRY_SIZE];
            let filepos = read_i32(entry, 0).max(0) as usize;
            let size = read_i32(entry, 4).max(0) as usize;
            if filepos + size > raw.len() {
                return Err(WadError::BadDirectory { name: filename.to_string(), index });
            }
            lumps.push(Lump {
                name: lump_name(&entry[8..16]),
                data: raw[filepos..filepos + size].to_vec(),
            });
        }

        com_dprintf(&format!("Added file {} ({} lumps)\n", filename, numlumps));
        self.add_wad(filename, lumps)
    }

    pub fn wad(&self, wad: u16) -> Option<&WadFile> {
        self.wads.get(wad as usize)
    }

    fn lump(&self, lump: LumpNum) -> Result<&Lump, WadError> {
        let wad = self.wads.get(lump.wad as usize).ok_or(WadError::NoSuchWad(lump.wad))?;
        wad.lumps
            .get(lump.lump as usize)
            .ok_or(WadError::NoSuchLump { wad: lump.wad, lump: lump.lump })
    }

    pub fn get_num_for_name(&self, name: &str) -> Result<LumpNum, WadError> {
        self.find_lump(name).ok_or_else(|| WadError::NoSuchName(name.to_string()))
    }
}

impl ResourceStore for WadStore {
    fn num_wads(&self) -> usize {
        self.wads.len()
    }

    fn lump_length(&self, lump: LumpNum) -> Result<usize, WadError> {
        Ok(self.lump(lump)?.data.len())
    }

    fn read_lump(&self, lump: LumpNum, dest: &mut [u8]) -> Result<usize, WadError> {
        let data = &self.lump(lump)?.data;
        let n = data.len().min(dest.len());
        dest[..n].copy_from_slice(&data[..n]);
        Ok(n)
    }

    fn cache_lump(&self, lump: LumpNum) -> Result<Cow<'_, [u8]>, WadError> {
        Ok(Cow::Borrowed(self.lump(lump)?.data.as_slice()))
    }

    fn find_lump(&self, name: &str) -> Option<LumpNum> {
        let name = name.to_ascii_uppercase();
        self.wads.iter().enumerate().rev().find_map(|(w, wad)| {
            wad.lumps
                .iter()
                .rposition(|l| l.name == name)
                .map(|l| LumpNum::new(w as u16, l as u16))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_wad_image(lumps: &[(&str, &[u8])]) -> Vec<u8> {
        let mut raw = vec![0u8; WAD_HEADER_SIZE];
        raw[0..4].copy_from_slice(PWAD_IDENT);
        let mut dir = Vec::new();
        for (name, data) in lumps {
            let pos = raw.len() as i32;
            raw.extend_from_slice(data);
            dir.extend_from_slice(&pos.to_le_bytes());
            dir.extend_from_slice(&(data.len() as i32).to_le_bytes());
            let mut n = [0u8; 8];
            n[..name.len()].copy_from_slice(name.as_bytes());
            dir.extend_from_slice(&n);
        }
        let dirofs = raw.len() as i32;
        raw.extend_from_slice(&dir);
        raw[4..8].copy_from_slice(&(lumps.len() as i32).to_le_bytes());
        raw[8..12].copy_from_slice(&dirofs.to_le_bytes());
        raw
    }

    #[test]
    fn test_lumpnum_packing() {
        let l = LumpNum::new(3, 517);
        assert_eq!(l.packed(), (3 << 16) | 517);
        assert_eq!(LumpNum::from_packed(l.packed()), l);
    }

    #[test]
    fn test_load_wad_bytes() {
        let image = make_wad_image(&[("FLOOR1", &[1u8, 2, 3, 4][..]), ("fademask", &[9u8; 10][..])]);
        let mut store = WadStore::new();
        let wad = store.load_wad_bytes("test.wad", &image).unwrap();
        assert_eq!(wad, 0);
        assert_eq!(store.num_wads(), 1);

        let fade = store.find_lump("FADEMASK").unwrap();
        assert_eq!(fade, LumpNum::new(0, 1));
        assert_eq!(store.lump_length(fade).unwrap(), 10);

        let mut buf = [0u8; 2];
        assert_eq!(store.read_lump(LumpNum::new(0, 0), &mut buf).unwrap(), 2);
        assert_eq!(buf, [1, 2]);
        assert_eq!(&*store.cache_lump(LumpNum::new(0, 0)).unwrap(), &[1, 2, 3, 4]);
    }

    #[test]
    fn test_bad_header() {
        let mut store = WadStore::new();
        assert_eq!(
            store.load_wad_bytes("junk", b"JUNKJUNKJUNK"),
            Err(WadError::BadHeader("junk".to_string()))
        );
    }

    #[test]
    fn test_later_wad_overrides_name() {
        let mut store = WadStore::new();
        store.add_wad("base", vec![Lump::new("STEP1", vec![1])]).unwrap();
        store.add_wad("patch", vec![Lump::new("step1", vec![2])]).unwrap();
        assert_eq!(store.find_lump("Step1"), Some(LumpNum::new(1, 0)));
        assert_eq!(store.get_num_for_name("NOPE"), Err(WadError::NoSuchName("NOPE".into())));
    }

    #[test]
    fn test_missing_lump() {
        let mut store = WadStore::new();
        store.add_wad("base", vec![]).unwrap();
        assert_eq!(
            store.lump_length(LumpNum::new(0, 4)),
            Err(WadError::NoSuchLump { wad: 0, lump: 4 })
        );
        assert_eq!(store.lump_length(LumpNum::new(2, 0)), Err(WadError::NoSuchWad(2)));
    }
}
