//! Canonical Huffman prefix-code tables (§4.B).
//!
//! Codes are assigned in ascending `(length, symbol)` order, the standard canonical-Huffman
//! construction. Decoding walks the code bit by bit (MSB of the code formed first), which is
//! `O(max_code_len)` in the worst case; a direct-indexed fast table is an equally valid
//! implementation the spec leaves to the implementer, but this one stays simple and is exercised
//! the same way in every codebook and slice stream.

use std::collections::HashMap;

use super::bitreader::BitReader;
use crate::errors::{codebook_corrupt, stream_corrupt, Result};

const MAX_CODE_LEN: u32 = 16;

/// A canonical Huffman decode table built from a vector of per-symbol code lengths.
pub struct HuffmanTable {
    /// (code_len, code) -> symbol.
    codes: HashMap<(u32, u32), u32>,
    max_len: u32,
    /// A table with exactly one symbol has no bits to decode; that symbol is stored here and
    /// `decode` returns it without consuming anything.
    single_symbol: Option<u32>,
}

impl HuffmanTable {
    /// Builds a canonical table from code lengths, one per symbol (0 = symbol unused).
    ///
    /// Fails unless the lengths form a valid, complete or empty/single-symbol prefix set: the
    /// Kraft sum `sum(2^-len_i)` must equal exactly `2^max_len` out of `2^max_len`, unless there
    /// are zero or one symbols with nonzero length.
    pub fn from_code_lengths(lengths: &[u8]) -> Result<HuffmanTable> {
        let max_len = lengths.iter().copied().map(u32::from).max().unwrap_or(0);
        if max_len > MAX_CODE_LEN {
            return codebook_corrupt("huffman code length exceeds 16 bits");
        }

        let mut symbols: Vec<(u32, u32)> =
            lengths.iter().enumerate().filter(|(_, &l)| l > 0).map(|(s, &l)| (u32::from(l), s as u32)).collect();
        symbols.sort_unstable();

        if symbols.len() == 1 {
            return Ok(HuffmanTable { codes: HashMap::new(), max_len: 0, single_symbol: Some(symbols[0].1) });
        }

        if symbols.len() > 1 {
            let kraft: u64 = symbols.iter().map(|&(len, _)| 1u64 << (max_len - len)).sum();
            if kraft != 1u64 << max_len {
                return codebook_corrupt("huffman code lengths are not a valid prefix set");
            }
        }

        let mut codes = HashMap::with_capacity(symbols.len());
        let mut code: u32 = 0;
        let mut prev_len = symbols.first().map(|&(l, _)| l).unwrap_or(0);
        for (len, symbol) in symbols {
            code <<= len - prev_len;
            codes.insert((len, code), symbol);
            code += 1;
            prev_len = len;
        }

        Ok(HuffmanTable { codes, max_len, single_symbol: None })
    }

    pub fn decode(&self, reader: &mut BitReader<'_>) -> Result<u32> {
        if let Some(symbol) = self.single_symbol {
            return Ok(symbol);
        }
        if self.codes.is_empty() {
            return codebook_corrupt("huffman decode from an empty table");
        }
        let mut code: u32 = 0;
        for len in 1..=self.max_len {
            code = (code << 1) | u32::from(reader.get_bit()?);
            if let Some(&symbol) = self.codes.get(&(len, code)) {
                return Ok(symbol);
            }
        }
        stream_corrupt("no matching huffman code found within max code length")
    }
}

/// Reads a canonical Huffman table serialized as: a VLC(4) symbol count, followed by one VLC(3)
/// code length per symbol (`0` marks an unused symbol). Every Huffman table embedded in the
/// endpoint, selector, and slice streams (§4.D, §4.E) is framed this way.
pub fn read_huffman_table(reader: &mut BitReader<'_>) -> Result<HuffmanTable> {
    let num_symbols = reader.decode_vlc(4)? as usize;
    let mut lengths = Vec::with_capacity(num_symbols);
    for _ in 0..num_symbols {
        lengths.push(reader.decode_vlc(3)? as u8);
    }
    HuffmanTable::from_code_lengths(&lengths)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_symbol_table_always_decodes_without_consuming_bits() {
        let table = HuffmanTable::from_code_lengths(&[1]).unwrap();
        let mut r = BitReader::new(&[0xFF, 0xFF]);
        assert_eq!(table.decode(&mut r).unwrap(), 0);
    }

    #[test]
    fn rejects_incomplete_prefix_set() {
        // Two length-1 codes would need exactly 2 symbols to be complete; giving lengths that
        // sum short of the Kraft equality should fail.
        assert!(HuffmanTable::from_code_lengths(&[1, 3]).is_err());
    }

    #[test]
    fn decodes_canonical_three_symbol_table() {
        // lengths: a=1, b=2, c=2 -> codes a=0, b=10, c=11 (MSB-first as bits arrive).
        let table = HuffmanTable::from_code_lengths(&[1, 2, 2]).unwrap();

        // Symbol 'a': single 0 bit.
        let mut r = BitReader::new(&[0b0000_0000]);
        assert_eq!(table.decode(&mut r).unwrap(), 0);

        // Symbol 'b': bits 1,0 (first bit read is LSB of the byte).
        let mut r = BitReader::new(&[0b0000_0001]);
        assert_eq!(table.decode(&mut r).unwrap(), 1);

        // Symbol 'c': bits 1,1.
        let mut r = BitReader::new(&[0b0000_0011]);
        assert_eq!(table.decode(&mut r).unwrap(), 2);
    }
}
