//! BC7 mode 6 translator (§4.G): single-subset, 7-bit-plus-shared-parity-bit endpoints, 4-bit
//! indices (3 for the implicit-high-bit anchor at texel `(0, 0)`). Alpha is always forced fully
//! opaque, which this translator achieves by forcing both endpoints' parity bit to 1 and their
//! 7-bit alpha component to 127 (`127*2+1 == 255`).

use crate::block::BlockColors;
use crate::codebook::SelectorEntry;
use crate::formats::search::solve_endpoints;

/// Mode-6 index weights (out of 64) for the 16 four-bit index values (§GLOSSARY, "BC7 weight
/// table").
const WEIGHTS_4BIT: [i32; 16] = [0, 4, 9, 13, 17, 21, 26, 30, 35, 39, 43, 47, 52, 56, 60, 64];

/// The best four-bit index for each of the source block's four linearized selector levels.
const LEVEL_TO_IDX4: [u8; 4] = [0, 6, 10, 15];
/// The complementary mapping used once endpoints are swapped to keep the anchor index under 8.
const LEVEL_TO_IDX4_INVERTED: [u8; 4] = [15, 9, 5, 0];

/// Expands a 7-bit component plus a forced parity bit of 1 into its 8-bit value.
fn expand_odd(c7: u8) -> u8 {
    c7.wrapping_mul(2).wrapping_add(1)
}

fn quantize_odd(target: u8) -> u8 {
    (((i32::from(target) - 1).max(0) / 2) as u8).min(127)
}

struct BitPacker {
    acc: u128,
    pos: u32,
}

impl BitPacker {
    fn new() -> Self {
        BitPacker { acc: 0, pos: 0 }
    }

    fn push(&mut self, value: u32, bits: u32) {
        self.acc |= (value as u128) << self.pos;
        self.pos += bits;
    }

    fn into_bytes(self) -> [u8; 16] {
        debug_assert_eq!(self.pos, 128);
        self.acc.to_le_bytes()
    }
}

/// Writes a 16-byte BC7 mode 6 block. `colors` are the block's four derived RGB colors.
pub fn write_bc7_m6_block(colors: &BlockColors, selector: &SelectorEntry, out: &mut [u8]) {
    debug_assert_eq!(out.len(), 16);

    let lo_level = selector.lo_selector;
    let hi_level = selector.hi_selector;

    let (mut endpoint0, mut endpoint1) = if crate::formats::is_constant_selector(selector) {
        let c = colors[lo_level as usize];
        let q = [quantize_odd(c[0]), quantize_odd(c[1]), quantize_odd(c[2])];
        (q, q)
    }
    else if selector.num_unique_selectors == 2 && lo_level == 0 && hi_level == 3 {
        let c_lo = colors[0];
        let c_hi = colors[3];
        ([quantize_odd(c_lo[0]), quantize_odd(c_lo[1]), quantize_odd(c_lo[2])], [quantize_odd(c_hi[0]), quantize_odd(c_hi[1]), quantize_odd(c_hi[2])])
    }
    else {
        let mut e0 = [0u8; 3];
        let mut e1 = [0u8; 3];
        for ch in 0..3 {
            let targets: Vec<(i32, i32)> = (lo_level..=hi_level)
                .map(|s| (i32::from(colors[s as usize][ch]), WEIGHTS_4BIT[LEVEL_TO_IDX4[s as usize] as usize]))
                .collect();
            let (lo, hi, _) = solve_endpoints(7, expand_odd, &targets, 64);
            e0[ch] = lo;
            e1[ch] = hi;
        }
        (e0, e1)
    };

    // Orient endpoints so the anchor texel (0, 0)'s stored index fits in 3 bits (< 8): if its
    // natural level lands in the upper half of the ladder, swap endpoints and invert the mapping.
    let anchor_level = selector.linearized(0, 0) as usize;
    let swap = LEVEL_TO_IDX4[anchor_level] >= 8;
    if swap {
        std::mem::swap(&mut endpoint0, &mut endpoint1);
    }

    let mut packer = BitPacker::new();
    packer.push(0b0100_0000, 7); // mode 6 marker

    for ch in 0..3 {
        packer.push(u32::from(endpoint0[ch]), 7);
        packer.push(u32::from(endpoint1[ch]), 7);
    }
    packer.push(127, 7); // A0
    packer.push(127, 7); // A1
    packer.push(1, 1); // P0
    packer.push(1, 1); // P1

    for y in 0..4 {
        for x in 0..4 {
            let level = selector.linearized(x, y) as usize;
            let idx = if swap { LEVEL_TO_IDX4_INVERTED[level] } else { LEVEL_TO_IDX4[level] };
            let bits = if (x, y) == (0, 0) { 3 } else { 4 };
            packer.push(u32::from(idx), bits);
        }
    }

    out.copy_from_slice(&packer.into_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::synthesize_block_colors;
    use crate::codebook::EndpointEntry;
    use crate::tables::LINEAR_TO_RAW;

    #[test]
    fn mode_marker_bit_is_set() {
        let endpoint = EndpointEntry { color5: [16, 16, 16], inten5: 3 };
        let selector = SelectorEntry::from_raw_codes([[LINEAR_TO_RAW[0]; 4]; 4]);
        let colors = synthesize_block_colors(&endpoint);
        let mut out = [0u8; 16];
        write_bc7_m6_block(&colors, &selector, &mut out);
        assert_eq!(out[0], 0b0100_0000);
    }

    #[test]
    fn alpha_endpoints_and_parity_force_full_opacity() {
        let endpoint = EndpointEntry { color5: [5, 5, 5], inten5: 1 };
        let selector = SelectorEntry::from_raw_codes([[LINEAR_TO_RAW[1]; 4]; 4]);
        let colors = synthesize_block_colors(&endpoint);
        let mut out = [0u8; 16];
        write_bc7_m6_block(&colors, &selector, &mut out);
        let value = u128::from_le_bytes(out);
        let a0 = ((value >> (7 + 7 * 6)) & 0x7F) as u8;
        let a1 = ((value >> (7 + 7 * 7)) & 0x7F) as u8;
        let p0 = ((value >> (7 + 7 * 8)) & 0x1) as u8;
        let p1 = ((value >> (7 + 7 * 8 + 1)) & 0x1) as u8;
        assert_eq!(a0, 127);
        assert_eq!(a1, 127);
        assert_eq!(p0, 1);
        assert_eq!(p1, 1);
    }

    #[test]
    fn anchor_index_always_fits_in_three_bits() {
        let endpoint = EndpointEntry { color5: [2, 30, 10], inten5: 6 };
        let selector = SelectorEntry::from_raw_codes([
            [LINEAR_TO_RAW[3], LINEAR_TO_RAW[0], LINEAR_TO_RAW[2], LINEAR_TO_RAW[1]],
            [LINEAR_TO_RAW[0], LINEAR_TO_RAW[1], LINEAR_TO_RAW[2], LINEAR_TO_RAW[3]],
            [LINEAR_TO_RAW[1], LINEAR_TO_RAW[2], LINEAR_TO_RAW[3], LINEAR_TO_RAW[0]],
            [LINEAR_TO_RAW[2], LINEAR_TO_RAW[3], LINEAR_TO_RAW[0], LINEAR_TO_RAW[1]],
        ]);
        let colors = synthesize_block_colors(&endpoint);
        let mut out = [0u8; 16];
        write_bc7_m6_block(&colors, &selector, &mut out);
        let value = u128::from_le_bytes(out);
        let anchor_idx = ((value >> (7 + 56 + 2)) & 0b111) as u8;
        assert!(anchor_idx < 8);
    }
}
