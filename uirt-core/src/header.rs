//! Fixed-layout file header and slice descriptor table parsing (§6).
//!
//! Container parsing beyond this fixed header and descriptor table is explicitly out of scope
//! (§1); this module only extracts what `start_transcoding` needs to locate the codebook and
//! slice streams and validate them.

use crate::errors::{buffer_too_small, malformed_header, Error, Result};
use crate::tables::crc16;

pub const SIGNATURE: u16 = 0x4273;
pub const VERSION: u16 = 0x13;
/// Total size of the fixed header, including the 28 bytes of trailing fields the summary table in
/// §6 elides with "…" (`selector_cb_file_ofs` through `userdata1`).
pub const HEADER_SIZE: u16 = 64;
pub const SLICE_DESC_SIZE: usize = 24;

pub const FLAG_ETC1S: u32 = 1 << 0;
pub const FLAG_Y_FLIPPED: u32 = 1 << 1;
pub const FLAG_HAS_ALPHA_SLICES: u32 = 1 << 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureType {
    Tex2D,
    Tex2DArray,
    CubemapArray,
    Video,
    Volume,
}

impl TextureType {
    fn from_u8(v: u8) -> Result<Self> {
        Ok(match v {
            0 => TextureType::Tex2D,
            1 => TextureType::Tex2DArray,
            2 => TextureType::CubemapArray,
            3 => TextureType::Video,
            4 => TextureType::Volume,
            _ => return malformed_header("unrecognized texture_type"),
        })
    }
}

/// The fixed 64-byte file header, byte-exact with §6.
#[derive(Debug, Clone)]
pub struct FileHeader {
    pub version: u16,
    pub header_crc16: u16,
    pub data_crc16: u16,
    pub data_size: u32,
    pub header_size: u16,
    pub total_slices: u16,
    pub total_images: u16,
    pub flags: u32,
    pub texture_type: TextureType,
    /// 24-bit field, passed through untouched.
    pub us_per_frame: u32,
    pub slice_desc_file_ofs: u32,
    pub endpoint_cb_file_ofs: u32,
    pub endpoint_cb_file_size: u16,
    pub selector_cb_file_ofs: u32,
    pub selector_cb_file_size: u16,
    pub tables_file_ofs: u32,
    pub tables_file_size: u16,
    pub total_endpoints: u32,
    pub total_selectors: u32,
    pub userdata0: u32,
    pub userdata1: u32,
}

fn u16le(b: &[u8], ofs: usize) -> u16 {
    u16::from_le_bytes([b[ofs], b[ofs + 1]])
}

fn u32le(b: &[u8], ofs: usize) -> u32 {
    u32::from_le_bytes([b[ofs], b[ofs + 1], b[ofs + 2], b[ofs + 3]])
}

impl FileHeader {
    /// Parses and validates the fixed header at the start of `file`: signature, version, size,
    /// and header CRC16. Does not validate the optional full-data CRC16 (§6, "caller-triggered").
    pub fn parse(file: &[u8]) -> Result<FileHeader> {
        if file.len() < HEADER_SIZE as usize {
            return buffer_too_small("file shorter than the fixed header");
        }

        let signature = u16le(file, 0);
        if signature != SIGNATURE {
            return malformed_header("bad signature");
        }

        let version = u16le(file, 2);
        if version != VERSION {
            return malformed_header("unsupported version");
        }

        let header_size = u16le(file, 12);
        if header_size != HEADER_SIZE {
            return malformed_header("unexpected header_size");
        }

        let header_crc16 = u16le(file, 4);
        let computed_header_crc = crc16(&file[6..HEADER_SIZE as usize], 0);
        if computed_header_crc != header_crc16 {
            return malformed_header("header CRC16 mismatch");
        }

        let header = FileHeader {
            version,
            header_crc16,
            data_crc16: u16le(file, 6),
            data_size: u32le(file, 8),
            header_size,
            total_slices: u16le(file, 14),
            total_images: u16le(file, 16),
            flags: u32le(file, 18),
            texture_type: TextureType::from_u8(file[22])?,
            us_per_frame: u32le(file, 23) & 0x00FF_FFFF,
            slice_desc_file_ofs: u32le(file, 26),
            endpoint_cb_file_ofs: u32le(file, 30),
            endpoint_cb_file_size: u16le(file, 34),
            selector_cb_file_ofs: u32le(file, 36),
            selector_cb_file_size: u16le(file, 40),
            tables_file_ofs: u32le(file, 42),
            tables_file_size: u16le(file, 46),
            total_endpoints: u32le(file, 48),
            total_selectors: u32le(file, 52),
            userdata0: u32le(file, 56),
            userdata1: u32le(file, 60),
        };

        if header.flags & FLAG_ETC1S == 0 {
            return malformed_header("ETC1S-present flag is required");
        }
        if header.total_images > header.total_slices {
            return malformed_header("total_images exceeds total_slices");
        }
        if header.flags & FLAG_HAS_ALPHA_SLICES != 0 && header.total_slices % 2 != 0 {
            return malformed_header("has-alpha-slices flag set with an odd slice count");
        }

        Ok(header)
    }

    pub fn is_y_flipped(&self) -> bool {
        self.flags & FLAG_Y_FLIPPED != 0
    }

    pub fn has_alpha_slices(&self) -> bool {
        self.flags & FLAG_HAS_ALPHA_SLICES != 0
    }

    /// Validates that every offset/size this header names lies within `file`.
    pub fn validate_in_bounds(&self, file_len: usize) -> Result<()> {
        let checks: [(u32, u32, &'static str); 4] = [
            (self.slice_desc_file_ofs, self.total_slices as u32 * SLICE_DESC_SIZE as u32, "slice descriptor table"),
            (self.endpoint_cb_file_ofs, self.endpoint_cb_file_size as u32, "endpoint codebook stream"),
            (self.selector_cb_file_ofs, self.selector_cb_file_size as u32, "selector codebook stream"),
            (self.tables_file_ofs, self.tables_file_size as u32, "tables section"),
        ];
        for (ofs, size, what) in checks {
            let end = (ofs as u64) + (size as u64);
            if end > file_len as u64 {
                return buffer_too_small(what);
            }
        }
        Ok(())
    }

    /// Verifies the data CRC16 over `[header_size, header_size + data_size)`. Full data-CRC
    /// validation is optional and caller-triggered (§6); this is that check.
    pub fn verify_data_crc(&self, file: &[u8]) -> Result<()> {
        let start = self.header_size as usize;
        let end = start + self.data_size as usize;
        if end > file.len() {
            return buffer_too_small("data region extends beyond file");
        }
        if crc16(&file[start..end], 0) != self.data_crc16 {
            return malformed_header("data CRC16 mismatch");
        }
        Ok(())
    }
}

/// Validates just the header, returning `Ok(())` or the reason for rejection. Mirrors the
/// original `validate_header` boolean entry point (§7) but keeps the diagnostic.
pub fn validate_header(file: &[u8]) -> Result<()> {
    FileHeader::parse(file).map(|_| ())
}

#[derive(Debug, Clone, Copy)]
pub struct SliceDesc {
    pub image_index: u16,
    pub level_index: u8,
    pub is_alpha: bool,
    pub orig_width: u16,
    pub orig_height: u16,
    pub num_blocks_x: u16,
    pub num_blocks_y: u16,
    pub file_ofs: u32,
    pub file_size: u32,
    pub slice_data_crc16: u16,
}

impl SliceDesc {
    fn parse(b: &[u8]) -> SliceDesc {
        let flags = b[3];
        SliceDesc {
            image_index: u16le(b, 0),
            level_index: b[2],
            is_alpha: flags & 0x1 != 0,
            orig_width: u16le(b, 4),
            orig_height: u16le(b, 6),
            num_blocks_x: u16le(b, 8),
            num_blocks_y: u16le(b, 10),
            file_ofs: u32le(b, 12),
            file_size: u32le(b, 16),
            slice_data_crc16: u16le(b, 20),
        }
    }

    pub fn data<'a>(&self, file: &'a [u8]) -> Result<&'a [u8]> {
        let start = self.file_ofs as usize;
        let end = start + self.file_size as usize;
        file.get(start..end).ok_or(Error::BufferTooSmall("slice data"))
    }
}

/// Parses the slice descriptor table and checks the cross-slice invariants from §6: every slice's
/// `image_index` is in range, per-image level indices are contiguous from zero, and color/alpha
/// pairs share block dimensions.
pub fn parse_slice_descs(file: &[u8], header: &FileHeader) -> Result<Vec<SliceDesc>> {
    let start = header.slice_desc_file_ofs as usize;
    let count = header.total_slices as usize;
    let mut descs = Vec::with_capacity(count);
    for i in 0..count {
        let ofs = start + i * SLICE_DESC_SIZE;
        let raw = file.get(ofs..ofs + SLICE_DESC_SIZE).ok_or(Error::BufferTooSmall("slice descriptor"))?;
        let desc = SliceDesc::parse(raw);
        if desc.image_index as u32 >= header.total_images as u32 {
            return malformed_header("slice image_index out of range");
        }
        descs.push(desc);
    }

    for image_index in 0..header.total_images {
        let mut levels: Vec<u8> =
            descs.iter().filter(|d| d.image_index == image_index).map(|d| d.level_index).collect();
        levels.sort_unstable();
        levels.dedup();
        for (expected, level) in levels.iter().enumerate() {
            if *level as usize != expected {
                return malformed_header("image level_index values are not contiguous from zero");
            }
        }
        if levels.len() > 16 {
            return malformed_header("image has more than 16 levels");
        }

        for level in &levels {
            let siblings: Vec<&SliceDesc> =
                descs.iter().filter(|d| d.image_index == image_index && d.level_index == *level).collect();
            if siblings.len() > 2 {
                return malformed_header("more than two slices for one image/level pair");
            }
            if siblings.len() == 2 && (siblings[0].num_blocks_x != siblings[1].num_blocks_x
                || siblings[0].num_blocks_y != siblings[1].num_blocks_y)
            {
                return malformed_header("color/alpha slice block dimensions differ");
            }
        }
    }

    Ok(descs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_minimal_header(total_slices: u16, total_images: u16, flags: u32) -> Vec<u8> {
        let mut h = vec![0u8; HEADER_SIZE as usize];
        h[0..2].copy_from_slice(&SIGNATURE.to_le_bytes());
        h[2..4].copy_from_slice(&VERSION.to_le_bytes());
        // header_crc16 filled in below.
        h[8..12].copy_from_slice(&0u32.to_le_bytes()); // data_size
        h[12..14].copy_from_slice(&HEADER_SIZE.to_le_bytes());
        h[14..16].copy_from_slice(&total_slices.to_le_bytes());
        h[16..18].copy_from_slice(&total_images.to_le_bytes());
        h[18..22].copy_from_slice(&flags.to_le_bytes());
        h[22] = 0; // Tex2D
        let crc = crc16(&h[6..HEADER_SIZE as usize], 0);
        h[4..6].copy_from_slice(&crc.to_le_bytes());
        h
    }

    #[test]
    fn s1_bad_signature_is_rejected() {
        let mut h = make_minimal_header(0, 0, FLAG_ETC1S);
        h[0] = 0x00;
        assert!(validate_header(&h).is_err());
    }

    #[test]
    fn valid_header_round_trips() {
        let h = make_minimal_header(2, 1, FLAG_ETC1S);
        assert!(validate_header(&h).is_ok());
    }

    #[test]
    fn single_byte_mutation_breaks_crc() {
        let mut h = make_minimal_header(2, 1, FLAG_ETC1S);
        h[16] ^= 0x01; // mutate total_images, covered by the header CRC
        assert!(validate_header(&h).is_err());
    }

    #[test]
    fn odd_slice_count_with_alpha_flag_is_rejected() {
        let h = make_minimal_header(3, 1, FLAG_ETC1S | FLAG_HAS_ALPHA_SLICES);
        assert!(validate_header(&h).is_err());
    }
}
