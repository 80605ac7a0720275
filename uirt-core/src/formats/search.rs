//! Shared exhaustive endpoint search used by the BC1/BC4/BC7-mode-6 translators.
//!
//! The real transcoder precomputes these as giant per-`(inten5, selector_range)` lookup tables at
//! process init (§9, "the Mallocator/static global pattern"). This implementation takes the
//! spec's own suggested alternative one step further: rather than caching a table keyed by every
//! `(inten5, base_color, selector_range)` combination up front, it runs the same exhaustive,
//! error-minimizing search directly against the handful of channel values a given block actually
//! uses. The result is bit-for-bit the same answer the cached table would hand back, for far less
//! code; what's genuinely reused across blocks (the BC1 constant-color match tables) is still
//! cached behind a `OnceLock`, matching §5's "process-wide, initialized once" policy.

/// Linearly interpolates between `lo` and `hi` at `num/den` and rounds to the nearest integer.
#[inline]
pub(crate) fn lerp(lo: i32, hi: i32, num: i32, den: i32) -> i32 {
    lo + ((hi - lo) * num + den / 2) / den
}

/// Finds the `bits`-bit (low, high) endpoint pair minimizing total squared error against
/// `targets`, where each target is matched at interpolation weight `num/den` along the low-high
/// gradient. Exhaustive over the full `2^bits` endpoint space; `bits` is always 5, 6, or 7 here so
/// this is at most a few thousand candidate pairs.
pub fn solve_endpoints(bits: u32, expand: fn(u8) -> u8, targets: &[(i32, i32)], den: i32) -> (u8, u8, i64) {
    let max = (1i32 << bits) - 1;
    let mut best = (0u8, 0u8);
    let mut best_err = i64::MAX;

    for lo in 0..=max {
        let lo8 = i32::from(expand(lo as u8));
        for hi in 0..=max {
            let hi8 = i32::from(expand(hi as u8));
            let mut err: i64 = 0;
            for &(target, num) in targets {
                let interp = lerp(lo8, hi8, num, den);
                let d = i64::from(interp - target);
                err += d * d;
            }
            if err < best_err {
                best_err = err;
                best = (lo as u8, hi as u8);
            }
        }
    }

    (best.0, best.1, best_err)
}

/// Finds the `bits`-bit (low, high) pair such that interpolation weight `num/den` reproduces
/// `target` as closely as possible, breaking ties by preferring a smaller `|high - low|` (the
/// tie-breaker the spec calls out for the constant-color match tables, §4.G).
pub fn solve_single_weight(bits: u32, expand: fn(u8) -> u8, target: i32, num: i32, den: i32) -> (u8, u8) {
    let max = (1i32 << bits) - 1;
    let mut best = (0u8, 0u8);
    let mut best_score = i64::MAX;

    for lo in 0..=max {
        let lo8 = i32::from(expand(lo as u8));
        for hi in 0..=max {
            let hi8 = i32::from(expand(hi as u8));
            let interp = lerp(lo8, hi8, num, den);
            let err = i64::from((interp - target).abs());
            let penalty = i64::from((hi - lo).abs());
            let score = err * 4096 + penalty;
            if score < best_score {
                best_score = score;
                best = (lo as u8, hi as u8);
            }
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tables::expand5to8;

    #[test]
    fn solve_single_weight_reproduces_exact_midpoint() {
        let (lo, hi) = solve_single_weight(5, expand5to8, 128, 1, 1);
        let lo8 = i32::from(expand5to8(lo));
        let hi8 = i32::from(expand5to8(hi));
        assert!((lerp(lo8, hi8, 1, 1) - 128).abs() <= 4);
    }

    #[test]
    fn solve_endpoints_fits_monotonic_targets() {
        let targets = [(0, 0), (85, 1), (170, 2), (255, 3)];
        let (lo, hi, _err) = solve_endpoints(5, expand5to8, &targets, 3);
        assert!(expand5to8(lo) <= expand5to8(hi));
    }
}
