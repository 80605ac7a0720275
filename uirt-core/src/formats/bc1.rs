//! BC1 translator (§4.G). BC1 packs two RGB565 endpoints plus a 2-bit-per-texel selector; both
//! it and the source ETC1S block have exactly four interpolation levels, so a source selector
//! maps directly onto a BC1 index (see the note on the `general case in block_to_bc1`) instead of
//! needing the ten-entry canonical permutation table a literal port of the reference tables would
//! require — see DESIGN.md.

use std::sync::OnceLock;

use crate::block::BlockColors;
use crate::codebook::{EndpointEntry, SelectorEntry};
use crate::formats::search::{solve_endpoints, solve_single_weight};
use crate::formats::{is_constant_selector, texel_colors};
use crate::tables::{expand5to8, expand6to8, quantize8to5, quantize8to6};

/// `MATCH5_EQ1[target]`/`MATCH6_EQ1[target]`: the best 5-/6-bit (low, high) endpoint pair such
/// that BC1 selector index 1 (weight 1/3) reproduces `target`, used for constant-color blocks.
/// Built once, lazily, and shared process-wide (§5).
struct MatchTables {
    match5_eq1: [(u8, u8); 256],
    match6_eq1: [(u8, u8); 256],
}

static MATCH_TABLES: OnceLock<MatchTables> = OnceLock::new();

fn match_tables() -> &'static MatchTables {
    MATCH_TABLES.get_or_init(|| {
        let mut match5_eq1 = [(0u8, 0u8); 256];
        let mut match6_eq1 = [(0u8, 0u8); 256];
        for target in 0..256 {
            match5_eq1[target] = solve_single_weight(5, expand5to8, target as i32, 1, 3);
            match6_eq1[target] = solve_single_weight(6, expand6to8, target as i32, 1, 3);
        }
        MatchTables { match5_eq1, match6_eq1 }
    })
}

fn pack565(r5: u8, g6: u8, b5: u8) -> u16 {
    (u16::from(r5) << 11) | (u16::from(g6) << 5) | u16::from(b5)
}

/// Forces 4-color (non-punch-through) mode: `low` packed strictly greater than `high` packed.
fn force_four_color_mode(lo: (u8, u8, u8), hi: (u8, u8, u8)) -> ((u8, u8, u8), (u8, u8, u8)) {
    let lo_p = pack565(lo.0, lo.1, lo.2);
    let hi_p = pack565(hi.0, hi.1, hi.2);
    if lo_p > hi_p {
        return (lo, hi);
    }
    // Swap, then nudge apart by one blue-channel step if they were exactly equal.
    if lo_p < hi_p {
        return (hi, lo);
    }
    let bumped_hi = (hi.0, hi.1, hi.2.saturating_sub(1));
    (lo, bumped_hi)
}

fn write_block(out: &mut [u8], lo: (u8, u8, u8), hi: (u8, u8, u8), selector_indices: &[[u8; 4]; 4]) {
    let lo_p = pack565(lo.0, lo.1, lo.2);
    let hi_p = pack565(hi.0, hi.1, hi.2);
    out[0..2].copy_from_slice(&lo_p.to_le_bytes());
    out[2..4].copy_from_slice(&hi_p.to_le_bytes());
    let mut packed = 0u32;
    for (y, row) in selector_indices.iter().enumerate() {
        for (x, &idx) in row.iter().enumerate() {
            packed |= u32::from(idx) << ((y * 4 + x) * 2);
        }
    }
    out[4..8].copy_from_slice(&packed.to_le_bytes());
}

/// Writes an 8-byte BC1 block. `forbid_three_color` forces the packed low endpoint above the
/// packed high endpoint (4-color mode), as required automatically for the color half of BC3.
pub fn write_bc1_block(
    endpoint: &EndpointEntry,
    selector: &SelectorEntry,
    colors: &BlockColors,
    forbid_three_color: bool,
    out: &mut [u8],
) {
    debug_assert_eq!(out.len(), 8);

    if is_constant_selector(selector) {
        let c = colors[selector.lo_selector as usize];
        let tables = match_tables();
        let (r_lo, r_hi) = tables.match5_eq1[c[0] as usize];
        let (g_lo, g_hi) = tables.match6_eq1[c[1] as usize];
        let (b_lo, b_hi) = tables.match5_eq1[c[2] as usize];
        let (mut lo, mut hi) = ((r_lo, g_lo, b_lo), (r_hi, g_hi, b_hi));
        if forbid_three_color && pack565(lo.0, lo.1, lo.2) == pack565(hi.0, hi.1, hi.2) {
            (lo, hi) = force_four_color_mode(lo, hi);
        }
        write_block(out, lo, hi, &[[1u8; 4]; 4]);
        return;
    }

    let texels = texel_colors(colors, selector);
    let (lo, hi) = (selector.lo_selector, selector.hi_selector);

    // Extreme two-selector blocks: only linearized selectors 0 and 3 occur, each mapping exactly
    // onto a BC1 endpoint (index 0 = low, index 3 = high), so a direct per-channel quantization
    // reproduces both exactly without a weighted search.
    if endpoint.inten5 >= 7 && selector.num_unique_selectors == 2 && lo == 0 && hi == 3 {
        let c_lo = colors[0];
        let c_hi = colors[3];
        let mut lo_e = (quantize8to5(c_lo[0]), quantize8to6(c_lo[1]), quantize8to5(c_lo[2]));
        let mut hi_e = (quantize8to5(c_hi[0]), quantize8to6(c_hi[1]), quantize8to5(c_hi[2]));
        (lo_e, hi_e) = force_four_color_mode(lo_e, hi_e);
        let selector_indices = selector_index_grid(selector, false);
        write_block(out, lo_e, hi_e, &selector_indices);
        return;
    }

    // General case: fit each channel independently against the linear-selector positions the
    // block actually uses, at their natural BC1 weight `s/3`.
    let targets: Vec<(i32, i32)> = (lo..=hi).map(|s| (0, s as i32)).collect();
    let mut r_targets = targets.clone();
    let mut g_targets = targets.clone();
    let mut b_targets = targets;
    for (i, s) in (lo..=hi).enumerate() {
        // Use the first occurrence of each selector's color (they're derived purely from `s`).
        let c = colors[s as usize];
        r_targets[i].0 = i32::from(c[0]);
        g_targets[i].0 = i32::from(c[1]);
        b_targets[i].0 = i32::from(c[2]);
    }

    let (r_lo, r_hi, _) = solve_endpoints(5, expand5to8, &r_targets, 3);
    let (g_lo, g_hi, _) = solve_endpoints(6, expand6to8, &g_targets, 3);
    let (b_lo, b_hi, _) = solve_endpoints(5, expand5to8, &b_targets, 3);

    let mut lo_e = (r_lo, g_lo, b_lo);
    let mut hi_e = (r_hi, g_hi, b_hi);

    let lo_p = pack565(lo_e.0, lo_e.1, lo_e.2);
    let hi_p = pack565(hi_e.0, hi_e.1, hi_e.2);
    let invert = lo_p <= hi_p;
    if invert {
        (lo_e, hi_e) = force_four_color_mode(lo_e, hi_e);
    }

    let _ = texels; // texel colors already folded into the per-channel targets above.
    let selector_indices = selector_index_grid(selector, invert);
    write_block(out, lo_e, hi_e, &selector_indices);
}

/// Builds the per-texel BC1 selector index grid. A source linear selector `s` maps directly to
/// BC1 index `s` (both are 4-level gradients); `invert` flips that to `3 - s` when the endpoints
/// were swapped to force 4-color mode.
fn selector_index_grid(selector: &SelectorEntry, invert: bool) -> [[u8; 4]; 4] {
    let mut grid = [[0u8; 4]; 4];
    for (y, row) in grid.iter_mut().enumerate() {
        for (x, cell) in row.iter_mut().enumerate() {
            let s = selector.linearized(x, y);
            *cell = if invert { 3 - s } else { s };
        }
    }
    grid
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::synthesize_block_colors;

    #[test]
    fn s5_constant_color_block_emits_solid_selector_pattern() {
        let endpoint = EndpointEntry { color5: [16, 16, 16], inten5: 2 };
        let selector = SelectorEntry::from_raw_codes([[crate::tables::LINEAR_TO_RAW[0]; 4]; 4]);
        let colors = synthesize_block_colors(&endpoint);
        let mut out = [0u8; 8];
        write_bc1_block(&endpoint, &selector, &colors, false, &mut out);
        let selectors = u32::from_le_bytes(out[4..8].try_into().unwrap());
        // The constant-color branch always emits index 1 (weight 1/3), matched against by the
        // `match5_eq1`/`match6_eq1` tables.
        assert_eq!(selectors, 0x5555_5555);
    }

    #[test]
    fn forbid_three_color_forces_low_above_high() {
        let endpoint = EndpointEntry { color5: [16, 16, 16], inten5: 0 };
        let selector = SelectorEntry::from_raw_codes([[crate::tables::LINEAR_TO_RAW[0]; 4]; 4]);
        let colors = synthesize_block_colors(&endpoint);
        let mut out = [0u8; 8];
        write_bc1_block(&endpoint, &selector, &colors, true, &mut out);
        let lo = u16::from_le_bytes(out[0..2].try_into().unwrap());
        let hi = u16::from_le_bytes(out[2..4].try_into().unwrap());
        assert!(lo > hi);
    }

    #[test]
    fn general_case_four_color_mode_has_low_above_high() {
        let endpoint = EndpointEntry { color5: [8, 24, 16], inten5: 4 };
        // Two distinct raw codes -> general case with a 2-wide selector range.
        let selector = SelectorEntry::from_raw_codes([
            [crate::tables::LINEAR_TO_RAW[0], crate::tables::LINEAR_TO_RAW[2], crate::tables::LINEAR_TO_RAW[0], crate::tables::LINEAR_TO_RAW[2]],
            [crate::tables::LINEAR_TO_RAW[2], crate::tables::LINEAR_TO_RAW[0], crate::tables::LINEAR_TO_RAW[2], crate::tables::LINEAR_TO_RAW[0]],
            [crate::tables::LINEAR_TO_RAW[0], crate::tables::LINEAR_TO_RAW[2], crate::tables::LINEAR_TO_RAW[0], crate::tables::LINEAR_TO_RAW[2]],
            [crate::tables::LINEAR_TO_RAW[2], crate::tables::LINEAR_TO_RAW[0], crate::tables::LINEAR_TO_RAW[2], crate::tables::LINEAR_TO_RAW[0]],
        ]);
        let colors = synthesize_block_colors(&endpoint);
        let mut out = [0u8; 8];
        write_bc1_block(&endpoint, &selector, &colors, false, &mut out);
        let lo = u16::from_le_bytes(out[0..2].try_into().unwrap());
        let hi = u16::from_le_bytes(out[2..4].try_into().unwrap());
        assert!(lo > hi);
    }
}
