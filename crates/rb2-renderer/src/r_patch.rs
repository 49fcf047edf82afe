// r_patch.rs — column-major patch lump format
//
// Layout: i16 width, height, leftoffset, topoffset; then `width` i32 column
// offsets from the start of the lump. Each column is a run of posts:
// topdelta, length, one pad byte, `length` palette indices, one pad byte.
// A topdelta of 0xff ends the column.

use thiserror::Error;

pub const PATCH_HEADER_SIZE: usize = 8;
/// Ends a column.
pub const POST_END: u8 = 0xff;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PatchError {
    #[error("patch lump too short ({0} bytes)")]
    TooShort(usize),
    #[error("patch has invalid size {width}x{height}")]
    BadSize { width: i16, height: i16 },
    #[error("column {column} starts at {offset}, outside the lump")]
    BadColumn { column: usize, offset: usize },
}

#[inline]
fn read_i16(raw: &[u8], ofs: usize) -> i16 {
    i16::from_le_bytes([raw[ofs], raw[ofs + 1]])
}

#[inline]
fn read_u32(raw: &[u8], ofs: usize) -> u32 {
    u32::from_le_bytes([raw[ofs], raw[ofs + 1], raw[ofs + 2], raw[ofs + 3]])
}

/// A validated view over a patch lump. Nothing is copied.
#[derive(Debug, Clone, Copy)]
pub struct Patch<'a> {
    raw: &'a [u8],
    pub width: i16,
    pub height: i16,
    pub leftoffset: i16,
    pub topoffset: i16,
}

/// One vertical run of opaque texels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Post {
    /// Row of the first texel. Already adjusted for tall patches.
    pub topdelta: i32,
    pub length: usize,
    /// Offset of the first texel within the lump.
    pub data_ofs: usize,
}

impl<'a> Patch<'a> {
    /// Checks the header and column table. Post contents are checked lazily
    /// by the iterator.
    pub fn parse(raw: &'a [u8]) -> Result<Self, PatchError> {
        if raw.len() < PATCH_HEADER_SIZE {
            return Err(PatchError::TooShort(raw.len()));
        }
        let width = read_i16(raw, 0);
        let height = read_i16(raw, 2);
        if width < 0 || height < 0 {
            return Err(PatchError::BadSize { width, height });
        }
        if raw.len() < PATCH_HEADER_SIZE + width as usize * 4 {
            return Err(PatchError::TooShort(raw.len()));
        }
        let patch = Patch {
            raw,
            width,
            height,
            leftoffset: read_i16(raw, 4),
            topoffset: read_i16(raw, 6),
        };
        for column in 0..width as usize {
            let offset = patch.column_offset(column);
            if offset >= raw.len() {
                return Err(PatchError::BadColumn { column, offset });
            }
        }
        Ok(patch)
    }

    #[inline]
    pub fn raw(&self) -> &'a [u8] {
        self.raw
    }

    #[inline]
    pub fn column_offset(&self, column: usize) -> usize {
        read_u32(self.raw, PATCH_HEADER_SIZE + column * 4) as usize
    }

    /// Texel at `ofs` in the lump, if it lies inside it.
    #[inline]
    pub fn texel(&self, ofs: usize) -> Option<u8> {
        self.raw.get(ofs).copied()
    }

    pub fn posts(&self, column: usize) -> PostIter<'a> {
        PostIter { raw: self.raw, ofs: self.column_offset(column), prevdelta: -1 }
    }
}

/// Walks the posts of one column.
#[derive(Debug, Clone)]
pub struct PostIter<'a> {
    raw: &'a [u8],
    ofs: usize,
    prevdelta: i32,
}

impl<'a> Iterator for PostIter<'a> {
    type Item = Post;

    fn next(&mut self) -> Option<Post> {
        if self.ofs + 3 > self.raw.len() {
            return None;
        }
        let header = self.raw[self.ofs];
        if header == POST_END {
            return None;
        }
        let mut topdelta = header as i32;
        // tall patches: a delta that doesn't advance is relative
        if topdelta <= self.prevdelta {
            topdelta += self.prevdelta;
        }
        self.prevdelta = topdelta;
        let length = self.raw[self.ofs + 1] as usize;
        let post = Post { topdelta, length, data_ofs: self.ofs + 3 };
        self.ofs += length + 4;
        Some(post)
    }
}

/// Builds a patch lump from row-major pixels, `None` being transparent.
/// Opaque runs become posts; rows from 255 down are not representable
/// with absolute deltas and are dropped.
pub fn encode_patch(
    width: i16,
    height: i16,
    leftoffset: i16,
    topoffset: i16,
    pixels: &[Option<u8>],
) -> Vec<u8> {
    let (w, h) = (width.max(0) as usize, height.max(0) as usize);
    let mut raw = Vec::with_capacity(PATCH_HEADER_SIZE + w * 4 + w * (h + 5));
    raw.extend_from_slice(&width.to_le_bytes());
    raw.extend_from_slice(&height.to_le_bytes());
    raw.extend_from_slice(&leftoffset.to_le_bytes());
    raw.extend_from_slice(&topoffset.to_le_bytes());
    raw.resize(PATCH_HEADER_SIZE + w * 4, 0);

    for x in 0..w {
        let ofs = raw.len() as u32;
        raw[PATCH_HEADER_SIZE + x * 4..][..4].copy_from_slice(&ofs.to_le_bytes());

        let mut y = 0;
        while y < h {
            if pixels.get(y * w + x).copied().flatten().is_none() {
                y += 1;
                continue;
            }
            let start = y;
            if start >= POST_END as usize {
                break;
            }
            while y < h && y - start < 254 && pixels.get(y * w + x).copied().flatten().is_some() {
                y += 1;
            }
            raw.push(start as u8);
            raw.push((y - start) as u8);
            raw.push(0);
            raw.extend((start..y).map(|row| pixels[row * w + x].unwrap_or(0)));
            raw.push(0);
        }
        raw.push(POST_END);
    }
    raw
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_header() {
        let raw = encode_patch(2, 3, -4, 7, &[Some(1), None, Some(2), Some(3), None, Some(4)]);
        let patch = Patch::parse(&raw).unwrap();
        assert_eq!((patch.width, patch.height), (2, 3));
        assert_eq!((patch.leftoffset, patch.topoffset), (-4, 7));
    }

    #[test]
    fn test_posts_split_on_holes() {
        // column 0: 1, 2, _ ; column 1: _, _, 9
        let raw = encode_patch(2, 3, 0, 0, &[Some(1), None, Some(2), None, None, Some(9)]);
        let patch = Patch::parse(&raw).unwrap();

        let posts: Vec<Post> = patch.posts(0).collect();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].topdelta, 0);
        assert_eq!(posts[0].length, 2);
        assert_eq!(patch.texel(posts[0].data_ofs), Some(1));
        assert_eq!(patch.texel(posts[0].data_ofs + 1), Some(2));

        let posts: Vec<Post> = patch.posts(1).collect();
        assert_eq!(posts, vec![Post { topdelta: 2, length: 1, data_ofs: posts[0].data_ofs }]);
        assert_eq!(patch.texel(posts[0].data_ofs), Some(9));
    }

    #[test]
    fn test_tall_patch_relative_delta() {
        // hand-built column: post at 10 (len 1), then delta 5 <= 10 -> 15
        let mut raw = vec![0u8; PATCH_HEADER_SIZE + 4];
        raw[0] = 1;
        raw[2] = 20;
        let ofs = raw.len() as u32;
        raw[8..12].copy_from_slice(&ofs.to_le_bytes());
        raw.extend_from_slice(&[10, 1, 0, 42, 0, 5, 1, 0, 43, 0, POST_END]);

        let patch = Patch::parse(&raw).unwrap();
        let deltas: Vec<i32> = patch.posts(0).map(|p| p.topdelta).collect();
        assert_eq!(deltas, vec![10, 15]);
    }

    #[test]
    fn test_truncated_lumps() {
        assert_eq!(Patch::parse(&[1, 0]).unwrap_err(), PatchError::TooShort(2));
        // claims 4 columns but has no column table
        assert_eq!(Patch::parse(&[4, 0, 1, 0, 0, 0, 0, 0]).unwrap_err(), PatchError::TooShort(8));
        assert_eq!(
            Patch::parse(&[0xff, 0xff, 1, 0, 0, 0, 0, 0]).unwrap_err(),
            PatchError::BadSize { width: -1, height: 1 }
        );

        let mut raw = encode_patch(1, 1, 0, 0, &[Some(3)]);
        raw[8..12].copy_from_slice(&1000u32.to_le_bytes());
        assert_eq!(Patch::parse(&raw).unwrap_err(), PatchError::BadColumn { column: 0, offset: 1000 });
    }

    #[test]
    fn test_post_iter_stops_at_lump_end() {
        let mut raw = encode_patch(1, 2, 0, 0, &[Some(3), Some(4)]);
        // drop the terminator and the trailing pad
        raw.truncate(raw.len() - 2);
        let patch = Patch::parse(&raw).unwrap();
        assert_eq!(patch.posts(0).count(), 1);
    }
}
