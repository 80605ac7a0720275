//! BC4 translator (§4.G): a single-channel, 8-bit-endpoint, 3-bit-index format. Used directly for
//! BC4 output and as the building block for BC3's alpha half and BC5's two channels.
//!
//! BC4 packs two raw 8-bit endpoints (`lo`, `hi`) and an 8-value interpolation ladder when
//! `lo > hi`; it falls back to a 6-value-plus-0/255 ladder when `lo <= hi`, which this translator
//! never emits (see `force_eight_value_mode` below) to keep the ladder semantics uniform.

use std::sync::OnceLock;

use crate::codebook::SelectorEntry;
use crate::formats::search::solve_endpoints;

/// Weight numerators (over 7) of each of BC4's eight ladder steps, in step order
/// `k = 0..=7`: step 0 is `lo` itself, step 1 is `hi` itself, steps 2..7 interpolate.
const STEP_WEIGHT_NUM: [i32; 8] = [0, 7, 1, 2, 3, 4, 5, 6];

/// The best eight-value ladder step for each of the source block's four linearized selector
/// levels (0 = darkest .. 3 = brightest), chosen as the step whose weight is nearest `s/3`.
const LEVEL_TO_STEP: [u8; 4] = [0, 3, 6, 1];
/// The complementary mapping used once `lo`/`hi` are swapped to keep `lo > hi`.
const LEVEL_TO_STEP_INVERTED: [u8; 4] = [1, 6, 3, 0];

fn identity(v: u8) -> u8 {
    v
}

struct ConstantTable {
    entries: [(u8, u8); 256],
}

static CONSTANT_TABLE: OnceLock<ConstantTable> = OnceLock::new();

fn constant_table() -> &'static ConstantTable {
    CONSTANT_TABLE.get_or_init(|| {
        let mut entries = [(0u8, 0u8); 256];
        for (target, e) in entries.iter_mut().enumerate() {
            let lo = target as u8;
            *e = if lo == 0 { (1, 0) } else { (lo, lo - 1) };
        }
        ConstantTable { entries }
    })
}

fn pack_indices(steps: &[u8; 16]) -> [u8; 6] {
    let mut bits: u64 = 0;
    for (i, &s) in steps.iter().enumerate() {
        bits |= (s as u64) << (i * 3);
    }
    let b = bits.to_le_bytes();
    [b[0], b[1], b[2], b[3], b[4], b[5]]
}

/// Writes an 8-byte BC4 block for one channel's worth of block values (row-major `values[y][x]`,
/// already the final 8-bit channel samples for the block's four derived colors, indexed by the
/// texel's own level via `selector`).
pub fn write_bc4_block(values: &[u8; 4], selector: &SelectorEntry, out: &mut [u8]) {
    debug_assert_eq!(out.len(), 8);

    if crate::formats::is_constant_selector(selector) {
        let target = values[selector.lo_selector as usize];
        let (lo, hi) = constant_table().entries[target as usize];
        out[0] = lo;
        out[1] = hi;
        out[2..8].copy_from_slice(&pack_indices(&[0u8; 16]));
        return;
    }

    let lo_s = selector.lo_selector;
    let hi_s = selector.hi_selector;

    if selector.num_unique_selectors == 2 && lo_s == 0 && hi_s == 3 {
        let v0 = values[0];
        let v3 = values[3];
        let (lo, hi, swapped) = if v0 >= v3 { (v0, v3, false) } else { (v3, v0, true) };
        let mut steps = [0u8; 16];
        for y in 0..4 {
            for x in 0..4 {
                let s = selector.linearized(x, y);
                let is_v3 = s == 3;
                let step = if is_v3 != swapped { 0u8 } else { 1u8 };
                steps[y * 4 + x] = step;
            }
        }
        out[0] = lo;
        out[1] = hi;
        out[2..8].copy_from_slice(&pack_indices(&steps));
        return;
    }

    let targets: Vec<(i32, i32)> =
        (lo_s..=hi_s).map(|s| (i32::from(values[s as usize]), STEP_WEIGHT_NUM[LEVEL_TO_STEP[s as usize] as usize])).collect();
    let (mut lo, mut hi, _) = solve_endpoints(8, identity, &targets, 7);

    let swapped = lo <= hi;
    if swapped {
        std::mem::swap(&mut lo, &mut hi);
    }

    let mut steps = [0u8; 16];
    for y in 0..4 {
        for x in 0..4 {
            let s = selector.linearized(x, y) as usize;
            steps[y * 4 + x] = if swapped { LEVEL_TO_STEP_INVERTED[s] } else { LEVEL_TO_STEP[s] };
        }
    }

    out[0] = lo;
    out[1] = hi;
    out[2..8].copy_from_slice(&pack_indices(&steps));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tables::LINEAR_TO_RAW;

    #[test]
    fn constant_block_has_lo_above_hi_and_all_zero_indices() {
        let selector = SelectorEntry::from_raw_codes([[LINEAR_TO_RAW[2]; 4]; 4]);
        let values = [10u8, 20, 30, 40];
        let mut out = [0u8; 8];
        write_bc4_block(&values, &selector, &mut out);
        assert!(out[0] > out[1]);
        assert_eq!(&out[2..8], &[0u8; 6]);
    }

    #[test]
    fn extreme_two_selector_block_reproduces_both_endpoints_exactly() {
        let selector = SelectorEntry::from_raw_codes([
            [LINEAR_TO_RAW[0], LINEAR_TO_RAW[3], LINEAR_TO_RAW[0], LINEAR_TO_RAW[3]],
            [LINEAR_TO_RAW[3], LINEAR_TO_RAW[0], LINEAR_TO_RAW[3], LINEAR_TO_RAW[0]],
            [LINEAR_TO_RAW[0], LINEAR_TO_RAW[3], LINEAR_TO_RAW[0], LINEAR_TO_RAW[3]],
            [LINEAR_TO_RAW[3], LINEAR_TO_RAW[0], LINEAR_TO_RAW[3], LINEAR_TO_RAW[0]],
        ]);
        let values = [12u8, 0, 0, 240];
        let mut out = [0u8; 8];
        write_bc4_block(&values, &selector, &mut out);
        assert!(out[0] > out[1]);
        assert!(out[0] == 240 || out[1] == 240);
        assert!(out[0] == 12 || out[1] == 12);
    }
}
