//! Endpoint and selector codebook decoding (§4.D).

use crate::errors::{codebook_corrupt, Result};
use crate::io::BitReader;
use crate::io::huffman::{read_huffman_table, HuffmanTable};
use crate::tables::{COLOR5_PAL0_PREV_HI, COLOR5_PAL1_PREV_HI, RAW_TO_LINEAR};

/// A `(color5, inten5)` pair; immutable once the endpoint codebook is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointEntry {
    pub color5: [u8; 3],
    pub inten5: u8,
}

/// A 4x4 grid of raw 2-bit selector codes plus its derived linearized flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectorEntry {
    /// `codes[y][x]`, raw (non-linearized) 2-bit ETC1 selector codes.
    pub codes: [[u8; 4]; 4],
    pub lo_selector: u8,
    pub hi_selector: u8,
    pub num_unique_selectors: u8,
}

impl SelectorEntry {
    pub fn from_raw_codes(codes: [[u8; 4]; 4]) -> SelectorEntry {
        let mut lo = 3u8;
        let mut hi = 0u8;
        let mut seen = [false; 4];
        for row in &codes {
            for &raw in row {
                let lin = RAW_TO_LINEAR[raw as usize];
                lo = lo.min(lin);
                hi = hi.max(lin);
                seen[lin as usize] = true;
            }
        }
        SelectorEntry { codes, lo_selector: lo, hi_selector: hi, num_unique_selectors: seen.iter().filter(|&&s| s).count() as u8 }
    }

    pub fn linearized(&self, x: usize, y: usize) -> u8 {
        RAW_TO_LINEAR[self.codes[y][x] as usize]
    }
}

pub struct EndpointCodebook {
    pub entries: Vec<EndpointEntry>,
}

impl EndpointCodebook {
    pub fn decode(reader: &mut BitReader<'_>, num_endpoints: usize) -> Result<EndpointCodebook> {
        let dm0 = read_huffman_table(reader)?;
        let dm1 = read_huffman_table(reader)?;
        let dm2 = read_huffman_table(reader)?;
        let im = read_huffman_table(reader)?;
        let grayscale = reader.get_bit()?;

        let delta_models = [&dm0, &dm1, &dm2];
        let pick_model = |prev: u8| -> &HuffmanTable {
            if prev <= COLOR5_PAL0_PREV_HI {
                delta_models[0]
            }
            else if prev <= COLOR5_PAL1_PREV_HI {
                delta_models[1]
            }
            else {
                delta_models[2]
            }
        };

        let mut entries = Vec::with_capacity(num_endpoints);
        let mut prev = [16u8, 16, 16];
        let mut prev_inten = 0u8;

        for _ in 0..num_endpoints {
            let inten_delta = im.decode(reader)?;
            let inten5 = ((prev_inten as u32 + inten_delta) % 8) as u8;

            let num_channels = if grayscale { 1 } else { 3 };
            let mut color5 = [0u8; 3];
            for c in 0..num_channels {
                let delta = pick_model(prev[c]).decode(reader)?;
                color5[c] = ((prev[c] as u32 + delta) % 32) as u8;
            }
            if grayscale {
                color5[1] = color5[0];
                color5[2] = color5[0];
            }

            prev = color5;
            prev_inten = inten5;
            entries.push(EndpointEntry { color5, inten5 });
        }

        Ok(EndpointCodebook { entries })
    }
}

pub struct SelectorCodebook {
    pub entries: Vec<SelectorEntry>,
}

fn read_raw_entry(reader: &mut BitReader<'_>) -> Result<[[u8; 4]; 4]> {
    let mut codes = [[0u8; 4]; 4];
    for row in codes.iter_mut() {
        for cell in row.iter_mut() {
            *cell = reader.get_bits(2)? as u8;
        }
    }
    Ok(codes)
}

impl SelectorCodebook {
    pub fn decode(
        reader: &mut BitReader<'_>,
        num_selectors: usize,
        global_codebook: Option<&[SelectorEntry]>,
    ) -> Result<SelectorCodebook> {
        let is_global_mode = reader.get_bit()?;

        let entries = if is_global_mode {
            Self::decode_global_or_hybrid(reader, num_selectors, global_codebook)?
        }
        else {
            Self::decode_raw_or_delta(reader, num_selectors)?
        };

        Ok(SelectorCodebook { entries })
    }

    fn lookup_global(global: Option<&[SelectorEntry]>, pal_index: u32) -> Result<SelectorEntry> {
        global
            .and_then(|g| g.get(pal_index as usize))
            .copied()
            .ok_or(crate::errors::Error::CodebookCorrupt("global selector palette index out of range"))
    }

    /// Applies one of the (rotation/flip/inversion) modifier combinations to a looked-up global
    /// selector grid.
    fn apply_modifier(entry: SelectorEntry, modifier: u32) -> SelectorEntry {
        let flip_x = modifier & 1 != 0;
        let flip_y = modifier & 2 != 0;
        let invert = modifier & 4 != 0;

        let mut codes = [[0u8; 4]; 4];
        for (y, row) in codes.iter_mut().enumerate() {
            for (x, cell) in row.iter_mut().enumerate() {
                let sx = if flip_x { 3 - x } else { x };
                let sy = if flip_y { 3 - y } else { y };
                let mut raw = entry.codes[sy][sx];
                if invert {
                    let lin = 3 - RAW_TO_LINEAR[raw as usize];
                    raw = crate::tables::LINEAR_TO_RAW[lin as usize];
                }
                *cell = raw;
            }
        }
        SelectorEntry::from_raw_codes(codes)
    }

    fn decode_global_or_hybrid(
        reader: &mut BitReader<'_>,
        num_selectors: usize,
        global_codebook: Option<&[SelectorEntry]>,
    ) -> Result<Vec<SelectorEntry>> {
        let is_hybrid = reader.get_bit()?;

        if !is_hybrid {
            let pal_bits = reader.get_bits(4)?;
            let mod_bits = reader.get_bits(4)?;
            let mod_table = if mod_bits > 0 { Some(read_huffman_table(reader)?) } else { None };

            let mut entries = Vec::with_capacity(num_selectors);
            for _ in 0..num_selectors {
                let pal_index = reader.get_bits(pal_bits)?;
                let base = Self::lookup_global(global_codebook, pal_index)?;
                let modifier = match &mod_table {
                    Some(t) => t.decode(reader)?,
                    None => 0,
                };
                entries.push(Self::apply_modifier(base, modifier));
            }
            return Ok(entries);
        }

        let mut entries = Vec::with_capacity(num_selectors);
        let pal_bits = reader.get_bits(4)?;
        let mod_bits = reader.get_bits(4)?;
        let uses_global_cb_bitflags_model = read_huffman_table(reader)?;
        let mod_table = if mod_bits > 0 { Some(read_huffman_table(reader)?) } else { None };

        let mut remaining = num_selectors;
        let mut cur_flags = 0u32;
        let mut flags_remaining = 0u32;
        while remaining > 0 {
            let chunk = remaining.min(8);
            if flags_remaining == 0 {
                cur_flags = uses_global_cb_bitflags_model.decode(reader)?;
                flags_remaining = 8;
            }
            for _ in 0..chunk {
                let used_global_cb = cur_flags & 1 != 0;
                cur_flags >>= 1;
                flags_remaining -= 1;
                if used_global_cb {
                    let pal_index = reader.get_bits(pal_bits)?;
                    let base = Self::lookup_global(global_codebook, pal_index)?;
                    let modifier = match &mod_table {
                        Some(t) => t.decode(reader)?,
                        None => 0,
                    };
                    entries.push(Self::apply_modifier(base, modifier));
                }
                else {
                    entries.push(SelectorEntry::from_raw_codes(read_raw_entry(reader)?));
                }
            }
            remaining -= chunk;
        }

        Ok(entries)
    }

    fn decode_raw_or_delta(reader: &mut BitReader<'_>, num_selectors: usize) -> Result<Vec<SelectorEntry>> {
        let is_delta = reader.get_bit()?;
        let mut entries = Vec::with_capacity(num_selectors);

        if !is_delta {
            for _ in 0..num_selectors {
                entries.push(SelectorEntry::from_raw_codes(read_raw_entry(reader)?));
            }
            return Ok(entries);
        }

        if num_selectors == 0 {
            return Ok(entries);
        }

        let delta_table = read_huffman_table(reader)?;
        let first = read_raw_entry(reader)?;
        entries.push(SelectorEntry::from_raw_codes(first));
        let mut prev_bytes = flatten(&first);

        for _ in 1..num_selectors {
            let mut bytes = [0u8; 4];
            for b in bytes.iter_mut() {
                let delta = delta_table.decode(reader)? as u8;
                *b = delta;
            }
            for i in 0..4 {
                bytes[i] ^= prev_bytes[i];
            }
            let codes = unflatten(&bytes);
            entries.push(SelectorEntry::from_raw_codes(codes));
            prev_bytes = bytes;
        }

        Ok(entries)
    }
}

fn flatten(codes: &[[u8; 4]; 4]) -> [u8; 4] {
    let mut bytes = [0u8; 4];
    for (y, row) in codes.iter().enumerate() {
        let mut b = 0u8;
        for (x, &c) in row.iter().enumerate() {
            b |= c << (x * 2);
        }
        bytes[y] = b;
    }
    bytes
}

fn unflatten(bytes: &[u8; 4]) -> [[u8; 4]; 4] {
    let mut codes = [[0u8; 4]; 4];
    for (y, row) in codes.iter_mut().enumerate() {
        let b = bytes[y];
        for (x, cell) in row.iter_mut().enumerate() {
            *cell = (b >> (x * 2)) & 0x3;
        }
    }
    codes
}

pub fn check_alphabet_bound(value: u32, bound: usize, what: &'static str) -> Result<u32> {
    if (value as usize) >= bound {
        return codebook_corrupt(what);
    }
    Ok(value)
}
