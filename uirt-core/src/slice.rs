//! Slice decoder (§4.E): reads the per-slice stream of `(endpoint_index, selector_index)` pairs
//! under a 2D spatial predictor for endpoints and an approximate-MTF + RLE scheme for selectors.

use crate::block::LogicalBlock;
use crate::errors::{stream_corrupt, Result};
use crate::io::BitReader;
use crate::io::huffman::HuffmanTable;
use crate::mtf::ApproxMtf;
use crate::tables::{ENDPOINT_PRED_REPEAT_LAST_SYMBOL, SELECTOR_HISTORY_BUF_RLE_COUNT_THRESH};

/// Huffman tables and sizing needed to decode one slice's block stream; shared across all slices
/// of a file once built by `start_transcoding`.
pub struct SliceTables<'a> {
    pub endpoint_pred: &'a HuffmanTable,
    pub delta_endpoint: &'a HuffmanTable,
    pub selector: &'a HuffmanTable,
    pub selector_history_rle: &'a HuffmanTable,
    pub num_endpoints: usize,
    pub num_selectors: usize,
    pub selector_history_buf_size: usize,
}

struct SliceDecoder<'r, 'a> {
    reader: BitReader<'r>,
    tables: &'a SliceTables<'a>,

    prev_endpoint_index: u32,
    prev_selector_index: u32,

    prev_row: Vec<u32>,
    cur_row: Vec<u32>,

    /// One 8-bit predictor packet per 2-wide column group, valid for the current 2-row band.
    packets: Vec<u8>,
    last_decoded_packet: u8,
    endpoint_pred_repeat_count: u32,

    mtf: ApproxMtf,
    cur_selector_rle_count: u32,
}

impl<'r, 'a> SliceDecoder<'r, 'a> {
    fn new(data: &'r [u8], tables: &'a SliceTables<'a>, nbx: usize) -> Self {
        SliceDecoder {
            reader: BitReader::new(data),
            tables,
            prev_endpoint_index: 0,
            prev_selector_index: 0,
            prev_row: vec![0; nbx],
            cur_row: vec![0; nbx],
            packets: vec![0; nbx.div_ceil(2)],
            last_decoded_packet: 0,
            endpoint_pred_repeat_count: 0,
            mtf: ApproxMtf::new(tables.selector_history_buf_size),
            cur_selector_rle_count: 0,
        }
    }

    fn next_packet(&mut self) -> Result<u8> {
        if self.endpoint_pred_repeat_count > 0 {
            self.endpoint_pred_repeat_count -= 1;
            return Ok(self.last_decoded_packet);
        }

        let sym = self.tables.endpoint_pred.decode(&mut self.reader)?;
        if sym == ENDPOINT_PRED_REPEAT_LAST_SYMBOL {
            let count = self.reader.decode_vlc(3)?;
            self.endpoint_pred_repeat_count = count;
            return Ok(self.last_decoded_packet);
        }

        self.last_decoded_packet = sym as u8;
        Ok(self.last_decoded_packet)
    }

    fn decode_endpoint_index(&mut self, x: usize, y: usize) -> Result<u32> {
        let group_x = x / 2;
        if x % 2 == 0 && y % 2 == 0 {
            let packet = self.next_packet()?;
            self.packets[group_x] = packet;
        }
        let packet = self.packets[group_x];
        let sub_pos = (y % 2) * 2 + (x % 2);
        let pred_bits = (packet >> (sub_pos * 2)) & 0x3;

        let endpoint_index = match pred_bits {
            0 => {
                if x == 0 {
                    return stream_corrupt("left predictor referenced at x=0");
                }
                self.prev_endpoint_index
            }
            1 => {
                if y == 0 {
                    return stream_corrupt("up predictor referenced at y=0");
                }
                self.prev_row[x]
            }
            2 => {
                if x == 0 || y == 0 {
                    return stream_corrupt("up-left predictor referenced at a boundary");
                }
                self.prev_row[x - 1]
            }
            _ => {
                let d = self.tables.delta_endpoint.decode(&mut self.reader)?;
                (self.prev_endpoint_index + d) % self.tables.num_endpoints as u32
            }
        };

        self.prev_endpoint_index = endpoint_index;
        Ok(endpoint_index)
    }

    fn decode_selector_index(&mut self, blocks_remaining: usize) -> Result<u32> {
        if self.cur_selector_rle_count > 0 {
            self.cur_selector_rle_count -= 1;
            return Ok(self.prev_selector_index);
        }

        let s = self.tables.selector.decode(&mut self.reader)? as usize;
        let num_selectors = self.tables.num_selectors;
        let history_size = self.tables.selector_history_buf_size;

        let selector_index = if s < num_selectors {
            self.mtf.add(s as u32);
            s as u32
        }
        else if s == num_selectors + history_size {
            let run_sym = self.tables.selector_history_rle.decode(&mut self.reader)?;
            let run_len = if run_sym == 127 {
                127 + self.reader.decode_vlc(7)? + SELECTOR_HISTORY_BUF_RLE_COUNT_THRESH
            }
            else {
                run_sym + SELECTOR_HISTORY_BUF_RLE_COUNT_THRESH
            };
            if run_len as usize > blocks_remaining {
                return stream_corrupt("selector RLE run exceeds remaining blocks in slice");
            }
            self.cur_selector_rle_count = run_len - 1;
            self.prev_selector_index
        }
        else if s < num_selectors + history_size {
            let k = s - num_selectors;
            let idx = self.mtf.get(k).ok_or(crate::errors::Error::StreamCorrupt(
                "selector history index out of the buffer's populated range",
            ))?;
            self.mtf.use_entry(k);
            idx
        }
        else {
            return stream_corrupt("selector symbol out of the valid alphabet range");
        };

        self.prev_selector_index = selector_index;
        Ok(selector_index)
    }

    fn finish(&mut self) {
        self.reader.stop();
    }
}

/// Decodes one slice's `nbx * nby` grid of logical blocks, row-major.
pub fn decode_slice(data: &[u8], tables: &SliceTables<'_>, nbx: usize, nby: usize) -> Result<Vec<LogicalBlock>> {
    let mut dec = SliceDecoder::new(data, tables, nbx);
    let total_blocks = nbx * nby;
    let mut out = Vec::with_capacity(total_blocks);

    let mut decoded = 0usize;
    for y in 0..nby {
        for x in 0..nbx {
            let endpoint_index = dec.decode_endpoint_index(x, y)?;
            let blocks_remaining = total_blocks - decoded;
            let selector_index = dec.decode_selector_index(blocks_remaining)?;

            dec.cur_row[x] = endpoint_index;
            out.push(LogicalBlock { endpoint_index, selector_index });
            decoded += 1;
        }
        std::mem::swap(&mut dec.prev_row, &mut dec.cur_row);
    }

    if dec.endpoint_pred_repeat_count != 0 {
        return stream_corrupt("dangling endpoint predictor repeat count at end of slice");
    }
    if dec.cur_selector_rle_count != 0 {
        return stream_corrupt("dangling selector RLE repeat count at end of slice");
    }

    dec.finish();
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::huffman::HuffmanTable;
    use crate::test_support::BitWriter;

    fn single(sym_len: u8) -> HuffmanTable {
        HuffmanTable::from_code_lengths(&[sym_len]).unwrap()
    }

    #[test]
    fn s3_left_predictor_at_x0_is_stream_corrupt() {
        let endpoint_pred = single(1); // any decode returns symbol 0 = "all left" packed byte
        let delta_endpoint = single(1);
        let selector = single(1); // always symbol 0: direct selector index 0

        let selector_history_rle = single(1);
        let tables = SliceTables {
            endpoint_pred: &endpoint_pred,
            delta_endpoint: &delta_endpoint,
            selector: &selector,
            selector_history_rle: &selector_history_rle,
            num_endpoints: 1,
            num_selectors: 1,
            selector_history_buf_size: 0,
        };

        let data = vec![0u8; 4];
        let result = decode_slice(&data, &tables, 2, 1);
        assert!(result.is_err());
    }

    #[test]
    fn s2_single_block_delta_zero_decodes_to_endpoint_zero() {
        // A uniform-length-2 table over symbols {0,1,2,3}: symbol N has code N, read MSB-first as
        // bits arrive. Symbol 3 (the packed byte 0b11, "delta" at position (0,0)) is 2 ones.
        let endpoint_pred = HuffmanTable::from_code_lengths(&[2, 2, 2, 2]).unwrap();
        let mut w = BitWriter::new();
        w.put_bits(0b11, 2);
        let data = w.into_bytes();

        let delta_endpoint = single(1);
        let selector = single(1);

        let selector_history_rle = single(1);
        let tables = SliceTables {
            endpoint_pred: &endpoint_pred,
            delta_endpoint: &delta_endpoint,
            selector: &selector,
            selector_history_rle: &selector_history_rle,
            num_endpoints: 1,
            num_selectors: 1,
            selector_history_buf_size: 0,
        };

        let blocks = decode_slice(&data, &tables, 1, 1).unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].endpoint_index, 0);
        assert_eq!(blocks[0].selector_index, 0);
    }
}
