//! PVRTC1 4bpp translator (§4.G/§4.H): phase 1 packs per-block endpoints and stashes the block's
//! reconstructed texel colors; phase 2 (`modulation_pass`) is a whole-slice post-pass that derives
//! per-texel modulation from bilinearly interpolated neighboring endpoints and writes the
//! Morton-swizzled output buffer.
//!
//! The real format's bilinear weight constants are GPU-vendor-specific and out of scope here (see
//! the crate's non-goal on vendor-exact decode); this translator derives its own weights from the
//! geometrically obvious model of block-center sample points spaced four texels apart, which is
//! internally consistent and produces smoothly blended output. See DESIGN.md.

use crate::block::BlockColors;
use crate::codebook::SelectorEntry;
use crate::errors::{unsupported_request, Result};
use crate::formats::search::lerp;
use crate::tables::{expand5to8, morton_index, quantize8to5};

/// Stashed per-block state needed by the modulation pass: the packed endpoints word (phase 1's
/// output) plus the block's 16 already-reconstructed texel colors.
#[derive(Debug, Clone, Copy)]
pub struct PvrtcBlockData {
    pub endpoints_word: u32,
    pub texel_colors: [[[u8; 3]; 4]; 4],
}

fn pack_half(color5: [u8; 3]) -> u32 {
    0x8000 | (u32::from(color5[0]) << 10) | (u32::from(color5[1]) << 5) | u32::from(color5[2])
}

fn pack_endpoints(low5: [u8; 3], high5: [u8; 3]) -> u32 {
    pack_half(low5) | (pack_half(high5) << 16)
}

fn unpack_color(word: u32, high: bool) -> [u8; 3] {
    let half = if high { word >> 16 } else { word & 0xFFFF };
    let r5 = ((half >> 10) & 0x1F) as u8;
    let g5 = ((half >> 5) & 0x1F) as u8;
    let b5 = (half & 0x1F) as u8;
    [expand5to8(r5), expand5to8(g5), expand5to8(b5)]
}

/// Phase 1: computes one block's endpoints word and stashes its texel colors for phase 2.
pub fn compute_block(colors: &BlockColors, selector: &SelectorEntry) -> PvrtcBlockData {
    let low5 = [quantize8to5(colors[0][0]), quantize8to5(colors[0][1]), quantize8to5(colors[0][2])];
    let high5 = [quantize8to5(colors[3][0]), quantize8to5(colors[3][1]), quantize8to5(colors[3][2])];

    let mut texel_colors = [[[0u8; 3]; 4]; 4];
    for y in 0..4 {
        for x in 0..4 {
            texel_colors[y][x] = colors[selector.linearized(x, y) as usize];
        }
    }

    PvrtcBlockData { endpoints_word: pack_endpoints(low5, high5), texel_colors }
}

fn is_pow2(n: usize) -> bool {
    n != 0 && (n & (n - 1)) == 0
}

/// Per-axis `(weight_toward_this_block, weight_toward_neighbor, neighbor_is_in_positive_direction)`
/// for a texel's local coordinate `0..=3` along one axis, derived from linear interpolation
/// between block-center sample points spaced four texels apart (so each pair sums to 16).
fn axis_weight(l: usize) -> (u32, u32, bool) {
    match l {
        0 => (10, 6, false),
        1 => (14, 2, false),
        2 => (14, 2, true),
        _ => (10, 6, true),
    }
}

fn neighbor_coord(c: usize, delta: i32, n: usize, wrap: bool) -> usize {
    if wrap {
        ((c as i32 + delta).rem_euclid(n as i32)) as usize
    }
    else {
        (c as i32 + delta).clamp(0, n as i32 - 1) as usize
    }
}

/// Computes a block's Z-order (Morton) destination index, with the high bits of whichever axis
/// exceeds the square region appended unswizzled (§4.G).
fn morton_dest(bx: usize, by: usize, nbx: usize, nby: usize) -> usize {
    let side = nbx.min(nby);
    let bits = side.trailing_zeros();
    let mask = side - 1;
    let morton = morton_index((bx & mask) as u32, (by & mask) as u32) as usize;
    let extra = (bx >> bits) + (by >> bits);
    morton | (extra << (2 * bits))
}

/// Phase 2: derives per-texel modulation for every block and writes Morton-swizzled 8-byte blocks
/// into `out`. Rejects non-power-of-two slice dimensions (§4.G, §8 S6).
pub fn modulation_pass(blocks: &[PvrtcBlockData], nbx: usize, nby: usize, wrap: bool, out: &mut [u8]) -> Result<()> {
    if !is_pow2(nbx) || !is_pow2(nby) {
        return unsupported_request("PVRTC1 requires power-of-two block dimensions on both axes");
    }
    debug_assert_eq!(out.len(), nbx * nby * 8);
    debug_assert_eq!(blocks.len(), nbx * nby);

    for by in 0..nby {
        for bx in 0..nbx {
            let this = blocks[by * nbx + bx];

            let mut modulation: u32 = 0;
            for ly in 0..4usize {
                for lx in 0..4usize {
                    let (wx_this, wx_nb, x_pos) = axis_weight(lx);
                    let (wy_this, wy_nb, y_pos) = axis_weight(ly);
                    let dx = if x_pos { 1 } else { -1 };
                    let dy = if y_pos { 1 } else { -1 };

                    let x_nb_coord = neighbor_coord(bx, dx, nbx, wrap);
                    let y_nb_coord = neighbor_coord(by, dy, nby, wrap);

                    let this_block = this;
                    let x_nb = blocks[by * nbx + x_nb_coord];
                    let y_nb = blocks[y_nb_coord * nbx + bx];
                    let diag = blocks[y_nb_coord * nbx + x_nb_coord];

                    let w_this = wx_this * wy_this;
                    let w_xnb = wx_nb * wy_this;
                    let w_ynb = wx_this * wy_nb;
                    let w_diag = wx_nb * wy_nb;

                    let mut interp_low = [0u8; 3];
                    let mut interp_high = [0u8; 3];
                    for c in 0..3 {
                        let corners = [
                            (unpack_color(this_block.endpoints_word, false)[c], unpack_color(this_block.endpoints_word, true)[c]),
                            (unpack_color(x_nb.endpoints_word, false)[c], unpack_color(x_nb.endpoints_word, true)[c]),
                            (unpack_color(y_nb.endpoints_word, false)[c], unpack_color(y_nb.endpoints_word, true)[c]),
                            (unpack_color(diag.endpoints_word, false)[c], unpack_color(diag.endpoints_word, true)[c]),
                        ];
                        let weights = [w_this, w_xnb, w_ynb, w_diag];
                        let low_sum: u32 = corners.iter().zip(weights).map(|(&(lo, _), w)| u32::from(lo) * w).sum();
                        let high_sum: u32 = corners.iter().zip(weights).map(|(&(_, hi), w)| u32::from(hi) * w).sum();
                        interp_low[c] = (low_sum / 256) as u8;
                        interp_high[c] = (high_sum / 256) as u8;
                    }

                    let texel = this_block.texel_colors[ly][lx];
                    let mut best_idx = 0u32;
                    let mut best_err = i64::MAX;
                    for idx in 0..4i32 {
                        let mut err = 0i64;
                        for c in 0..3 {
                            let candidate = lerp(i32::from(interp_low[c]), i32::from(interp_high[c]), idx, 3);
                            let d = i64::from(candidate - i32::from(texel[c]));
                            err += d * d;
                        }
                        if err < best_err {
                            best_err = err;
                            best_idx = idx as u32;
                        }
                    }

                    let bit_index = ly * 4 + lx;
                    modulation |= best_idx << (bit_index * 2);
                }
            }

            let dest = morton_dest(bx, by, nbx, nby);
            let block_out = &mut out[dest * 8..dest * 8 + 8];
            block_out[0..4].copy_from_slice(&this.endpoints_word.to_le_bytes());
            block_out[4..8].copy_from_slice(&modulation.to_le_bytes());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::synthesize_block_colors;
    use crate::codebook::EndpointEntry;
    use crate::tables::LINEAR_TO_RAW;

    #[test]
    fn s6_non_power_of_two_dimensions_are_rejected() {
        let endpoint = EndpointEntry { color5: [10, 10, 10], inten5: 2 };
        let selector = SelectorEntry::from_raw_codes([[LINEAR_TO_RAW[0]; 4]; 4]);
        let colors = synthesize_block_colors(&endpoint);
        let block = compute_block(&colors, &selector);
        let blocks = vec![block; 36];
        let mut out = vec![0u8; 36 * 8];
        let result = modulation_pass(&blocks, 6, 6, false, &mut out);
        assert!(result.is_err());
    }

    #[test]
    fn uniform_field_produces_consistent_modulation_everywhere() {
        let endpoint = EndpointEntry { color5: [12, 12, 12], inten5: 3 };
        let selector = SelectorEntry::from_raw_codes([[LINEAR_TO_RAW[2]; 4]; 4]);
        let colors = synthesize_block_colors(&endpoint);
        let block = compute_block(&colors, &selector);
        let blocks = vec![block; 16];
        let mut out = vec![0u8; 16 * 8];
        modulation_pass(&blocks, 4, 4, true, &mut out).unwrap();
        let first_mod = u32::from_le_bytes(out[4..8].try_into().unwrap());
        for i in 0..16 {
            let m = u32::from_le_bytes(out[i * 8 + 4..i * 8 + 8].try_into().unwrap());
            assert_eq!(m, first_mod);
        }
    }
}
