//! Per-target-format block translators (§4.G) and the PVRTC1 global modulation pass (§4.H).
//!
//! Each translator turns one reconstructed logical ETC1S-like block into a bit-exact block of a
//! target GPU format. None of them re-compress pixels; they repack or re-quantize the same four
//! derived block colors into the target format's endpoint/index representation.

mod bc1;
mod bc4;
mod bc7m6;
mod eac_a8;
mod etc1;
pub mod pvrtc1;
mod search;

pub use bc1::write_bc1_block;
pub use bc4::write_bc4_block;
pub use bc7m6::write_bc7_m6_block;
pub use eac_a8::write_eac_a8_block;
pub use etc1::write_etc1_block;

use crate::block::BlockColors;
use crate::codebook::SelectorEntry;

/// Every target format this transcoder can produce (§6, "Target formats and bytes-per-block").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetFormat {
    Etc1,
    Bc1,
    Bc4,
    Bc3,
    Bc5,
    Bc7M6,
    Pvrtc1,
    Etc2EacA8,
}

impl TargetFormat {
    pub fn bytes_per_block(self) -> usize {
        match self {
            TargetFormat::Etc1 => 8,
            TargetFormat::Bc1 => 8,
            TargetFormat::Bc4 => 8,
            TargetFormat::Bc7M6 => 16,
            TargetFormat::Pvrtc1 => 8,
            TargetFormat::Etc2EacA8 => 16,
            TargetFormat::Bc3 => 16,
            TargetFormat::Bc5 => 16,
        }
    }

    /// Whether this format carries its own alpha channel (as opposed to one synthesized from a
    /// separate alpha slice, §6).
    pub fn has_alpha(self) -> bool {
        matches!(self, TargetFormat::Bc3 | TargetFormat::Bc5 | TargetFormat::Etc2EacA8)
    }
}

/// Decode-time flags a caller passes into `transcode_image_level` (§8, testable property 6).
#[derive(Debug, Clone, Copy, Default)]
pub struct DecodeFlags {
    /// Forces BC1 output into 4-color mode (low > high packed endpoint), used automatically for
    /// the color half of BC3.
    pub bc1_forbid_three_color_blocks: bool,
    /// PVRTC1 modulation addressing at slice edges wraps instead of clamping (§4.H).
    pub pvrtc_wrap_addressing: bool,
}

/// A canonical selector range key: one of the six `(lo, hi)` pairs used to key every format
/// translation table (§GLOSSARY).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectorRange {
    R03,
    R13,
    R02,
    R12,
    R23,
    R01,
}

impl SelectorRange {
    pub fn from_lo_hi(lo: u8, hi: u8) -> SelectorRange {
        match (lo, hi) {
            (0, 3) => SelectorRange::R03,
            (1, 3) => SelectorRange::R13,
            (0, 2) => SelectorRange::R02,
            (1, 2) => SelectorRange::R12,
            (2, 3) => SelectorRange::R23,
            (0, 1) => SelectorRange::R01,
            // lo == hi (constant selector): any range containing it works; callers special-case
            // constant-selector blocks before consulting this, but fall back sanely here too.
            _ => SelectorRange::R03,
        }
    }

    pub fn lo_hi(self) -> (u8, u8) {
        match self {
            SelectorRange::R03 => (0, 3),
            SelectorRange::R13 => (1, 3),
            SelectorRange::R02 => (0, 2),
            SelectorRange::R12 => (1, 2),
            SelectorRange::R23 => (2, 3),
            SelectorRange::R01 => (0, 1),
        }
    }
}

/// Forces a constant-color synthesized opaque block's format-agnostic inputs: an endpoint with
/// `lo_selector == hi_selector`.
pub fn is_constant_selector(selector: &SelectorEntry) -> bool {
    selector.lo_selector == selector.hi_selector
}

/// The 16 texel colors of a block, row-major `[y][x]`, derived from the block's four synthesized
/// colors and its per-texel linearized selectors.
pub fn texel_colors(colors: &BlockColors, selector: &SelectorEntry) -> [[[u8; 3]; 4]; 4] {
    let mut out = [[[0u8; 3]; 4]; 4];
    for y in 0..4 {
        for x in 0..4 {
            out[y][x] = colors[selector.linearized(x, y) as usize];
        }
    }
    out
}
