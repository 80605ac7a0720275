//! Top-level transcoder (§5): builds the endpoint/selector codebooks and the three slice-stream
//! Huffman tables once, then decodes and translates individual image levels on demand.

use log::{debug, warn};

use crate::block::{synthesize_block_colors, BlockColors};
use crate::codebook::{check_alphabet_bound, EndpointCodebook, EndpointEntry, SelectorCodebook, SelectorEntry};
use crate::errors::{unsupported_request, Error, Result};
use crate::formats::{self, pvrtc1, DecodeFlags, TargetFormat};
use crate::header::{FileHeader, SliceDesc};
use crate::io::huffman::{read_huffman_table, HuffmanTable};
use crate::io::BitReader;
use crate::slice::{decode_slice, SliceTables};

const CONSTANT_ALPHA: [u8; 4] = [255, 255, 255, 255];

/// Holds the codebooks and slice-stream Huffman tables built once by [`Transcoder::start_transcoding`]
/// and reused for every slice in the file.
pub struct Transcoder {
    ready: bool,
    endpoints: Vec<EndpointEntry>,
    selectors: Vec<SelectorEntry>,
    endpoint_pred: Option<HuffmanTable>,
    delta_endpoint: Option<HuffmanTable>,
    selector_table: Option<HuffmanTable>,
    selector_history_rle: Option<HuffmanTable>,
    selector_history_buf_size: usize,
}

impl Transcoder {
    pub fn new() -> Transcoder {
        Transcoder {
            ready: false,
            endpoints: Vec::new(),
            selectors: Vec::new(),
            endpoint_pred: None,
            delta_endpoint: None,
            selector_table: None,
            selector_history_rle: None,
            selector_history_buf_size: 0,
        }
    }

    /// Builds the endpoint and selector codebooks and the slice-stream Huffman tables from the
    /// header-named sections of `file`. Must be called once before any
    /// [`Self::transcode_image_level`] call.
    pub fn start_transcoding(&mut self, file: &[u8], header: &FileHeader) -> Result<()> {
        header.validate_in_bounds(file.len())?;

        let endpoint_bytes = section(file, header.endpoint_cb_file_ofs, header.endpoint_cb_file_size);
        let mut er = BitReader::new(endpoint_bytes);
        let endpoint_cb = EndpointCodebook::decode(&mut er, header.total_endpoints as usize)?;

        let selector_bytes = section(file, header.selector_cb_file_ofs, header.selector_cb_file_size);
        let mut sr = BitReader::new(selector_bytes);
        let selector_cb = SelectorCodebook::decode(&mut sr, header.total_selectors as usize, None)?;

        let tables_bytes = section(file, header.tables_file_ofs, header.tables_file_size);
        let mut tr = BitReader::new(tables_bytes);
        let endpoint_pred = read_huffman_table(&mut tr)?;
        let delta_endpoint = read_huffman_table(&mut tr)?;
        let selector_table = read_huffman_table(&mut tr)?;
        let selector_history_rle = read_huffman_table(&mut tr)?;
        let selector_history_buf_size = tr.get_bits(13)? as usize;

        self.endpoints = endpoint_cb.entries;
        self.selectors = selector_cb.entries;
        self.endpoint_pred = Some(endpoint_pred);
        self.delta_endpoint = Some(delta_endpoint);
        self.selector_table = Some(selector_table);
        self.selector_history_rle = Some(selector_history_rle);
        self.selector_history_buf_size = selector_history_buf_size;
        self.ready = true;
        debug!(
            "transcoder ready: {} endpoints, {} selectors, selector history buffer size {}",
            self.endpoints.len(),
            self.selectors.len(),
            self.selector_history_buf_size
        );
        Ok(())
    }

    fn slice_tables(&self) -> SliceTables<'_> {
        SliceTables {
            endpoint_pred: self.endpoint_pred.as_ref().expect("start_transcoding was called"),
            delta_endpoint: self.delta_endpoint.as_ref().expect("start_transcoding was called"),
            selector: self.selector_table.as_ref().expect("start_transcoding was called"),
            selector_history_rle: self.selector_history_rle.as_ref().expect("start_transcoding was called"),
            num_endpoints: self.endpoints.len(),
            num_selectors: self.selectors.len(),
            selector_history_buf_size: self.selector_history_buf_size,
        }
    }

    /// Decodes one slice into its block endpoints, colors, and selectors, resolving each logical
    /// block's endpoint/selector indices against the shared codebooks.
    fn decode_block_colors(&self, data: &[u8], nbx: usize, nby: usize) -> Result<Vec<(EndpointEntry, BlockColors, SelectorEntry)>> {
        let tables = self.slice_tables();
        let logical = decode_slice(data, &tables, nbx, nby)?;
        let mut out = Vec::with_capacity(logical.len());
        for block in logical {
            let e = check_alphabet_bound(block.endpoint_index, self.endpoints.len(), "endpoint index out of codebook range")?;
            let s = check_alphabet_bound(block.selector_index, self.selectors.len(), "selector index out of codebook range")?;
            let endpoint = self.endpoints[e as usize];
            let selector = self.selectors[s as usize];
            out.push((endpoint, synthesize_block_colors(&endpoint), selector));
        }
        Ok(out)
    }

    /// Transcodes one image/level pair into `target`, writing a tightly packed block buffer into
    /// `out` (Morton-swizzled for [`TargetFormat::Pvrtc1`], row-major otherwise).
    #[allow(clippy::too_many_arguments)]
    pub fn transcode_image_level(
        &self,
        file: &[u8],
        descs: &[SliceDesc],
        image_index: u16,
        level_index: u8,
        target: TargetFormat,
        flags: DecodeFlags,
        out: &mut [u8],
    ) -> Result<()> {
        if !self.ready {
            warn!("transcode_image_level called before start_transcoding");
            return Err(Error::NotReady);
        }

        let color_desc = descs
            .iter()
            .find(|d| d.image_index == image_index && d.level_index == level_index && !d.is_alpha)
            .ok_or(Error::UnsupportedRequest("no color slice for the requested image/level"))?;
        let alpha_desc =
            descs.iter().find(|d| d.image_index == image_index && d.level_index == level_index && d.is_alpha);

        let nbx = color_desc.num_blocks_x as usize;
        let nby = color_desc.num_blocks_y as usize;
        let total_blocks = nbx * nby;

        let expected_len = if target == TargetFormat::Pvrtc1 { total_blocks * 8 } else { total_blocks * target.bytes_per_block() };
        if out.len() != expected_len {
            return unsupported_request("output buffer size does not match the requested format and slice dimensions");
        }

        let color_blocks = self.decode_block_colors(color_desc.data(file)?, nbx, nby)?;

        let alpha_values: Vec<[u8; 4]> = if target.has_alpha() {
            match alpha_desc {
                Some(desc) => {
                    if desc.num_blocks_x as usize != nbx || desc.num_blocks_y as usize != nby {
                        return unsupported_request("alpha slice block dimensions differ from the color slice");
                    }
                    self.decode_block_colors(desc.data(file)?, nbx, nby)?
                        .iter()
                        .map(|(_, colors, _)| [colors[0][0], colors[1][0], colors[2][0], colors[3][0]])
                        .collect()
                }
                None => vec![CONSTANT_ALPHA; total_blocks],
            }
        }
        else {
            Vec::new()
        };

        if target == TargetFormat::Pvrtc1 {
            let stashed: Vec<pvrtc1::PvrtcBlockData> =
                color_blocks.iter().map(|(_, colors, selector)| pvrtc1::compute_block(colors, selector)).collect();
            return pvrtc1::modulation_pass(&stashed, nbx, nby, flags.pvrtc_wrap_addressing, out);
        }

        let block_bytes = target.bytes_per_block();
        for (i, (endpoint, colors, selector)) in color_blocks.iter().enumerate() {
            let out_block = &mut out[i * block_bytes..(i + 1) * block_bytes];
            write_one(target, endpoint, colors, selector, alpha_values.get(i), flags, out_block);
        }

        Ok(())
    }
}

impl Default for Transcoder {
    fn default() -> Self {
        Transcoder::new()
    }
}

fn section(file: &[u8], ofs: u32, size: u16) -> &[u8] {
    &file[ofs as usize..ofs as usize + size as usize]
}

fn red_channel(colors: &BlockColors) -> [u8; 4] {
    [colors[0][0], colors[1][0], colors[2][0], colors[3][0]]
}

fn green_channel(colors: &BlockColors) -> [u8; 4] {
    [colors[0][1], colors[1][1], colors[2][1], colors[3][1]]
}

fn write_one(
    target: TargetFormat,
    endpoint: &EndpointEntry,
    colors: &BlockColors,
    selector: &SelectorEntry,
    alpha: Option<&[u8; 4]>,
    flags: DecodeFlags,
    out: &mut [u8],
) {
    match target {
        TargetFormat::Etc1 => formats::write_etc1_block(endpoint, selector, out),
        TargetFormat::Bc1 => formats::write_bc1_block(endpoint, selector, colors, flags.bc1_forbid_three_color_blocks, out),
        TargetFormat::Bc4 => formats::write_bc4_block(&red_channel(colors), selector, out),
        TargetFormat::Bc7M6 => formats::write_bc7_m6_block(colors, selector, out),
        TargetFormat::Bc3 => {
            formats::write_bc4_block(alpha.expect("has_alpha"), selector, &mut out[0..8]);
            formats::write_bc1_block(endpoint, selector, colors, true, &mut out[8..16]);
        }
        TargetFormat::Bc5 => {
            formats::write_bc4_block(&red_channel(colors), selector, &mut out[0..8]);
            formats::write_bc4_block(&green_channel(colors), selector, &mut out[8..16]);
        }
        TargetFormat::Etc2EacA8 => {
            formats::write_eac_a8_block(alpha.expect("has_alpha"), selector, &mut out[0..8]);
            formats::write_etc1_block(endpoint, selector, &mut out[8..16]);
        }
        TargetFormat::Pvrtc1 => unreachable!("handled by the modulation pass"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::{FileHeader, SLICE_DESC_SIZE};
    use crate::tables::crc16;
    use crate::test_support::BitWriter;

    /// Builds a minimal single-block, single-image `.uirt` file: one grayscale endpoint
    /// (`color5=[16,16,16]`, `inten5=0`), one constant all-zero-raw-code selector (linearized
    /// level 2), and slice-stream tables forced so the lone block's endpoint/selector indices
    /// both resolve to 0 from two bits of slice data.
    fn build_minimal_file() -> (Vec<u8>, FileHeader) {
        let mut endpoint_cb = BitWriter::new();
        for _ in 0..4 {
            endpoint_cb.put_single_symbol_table(); // dm0, dm1, dm2, im
        }
        endpoint_cb.put_bit(true); // grayscale
        let endpoint_cb = endpoint_cb.into_bytes();

        let mut selector_cb = BitWriter::new();
        selector_cb.put_bit(false); // not global mode
        selector_cb.put_bit(false); // not delta (raw)
        selector_cb.put_bits(0, 32); // all-zero 4x4 raw codes
        let selector_cb = selector_cb.into_bytes();

        let mut tables = BitWriter::new();
        // endpoint_pred: 4 equal-length-2 symbols, so decoding "11" yields symbol 3 (packed byte
        // 0b11, "delta" predictor at block (0,0), avoiding the x=0/y=0 predictor errors).
        tables.put_vlc(4, 4);
        for _ in 0..4 {
            tables.put_vlc(2, 3);
        }
        tables.put_single_symbol_table(); // delta_endpoint: always symbol 0, delta 0
        tables.put_single_symbol_table(); // selector: always symbol 0
        tables.put_single_symbol_table(); // selector_history_rle: always symbol 0
        tables.put_bits(0, 13); // selector_history_buf_size
        let tables = tables.into_bytes();

        let mut slice_data = BitWriter::new();
        slice_data.put_bits(0b11, 2);
        let slice_data = slice_data.into_bytes();

        let header_size = crate::header::HEADER_SIZE as usize;
        let slice_desc_ofs = header_size;
        let endpoint_cb_ofs = slice_desc_ofs + SLICE_DESC_SIZE;
        let selector_cb_ofs = endpoint_cb_ofs + endpoint_cb.len();
        let tables_ofs = selector_cb_ofs + selector_cb.len();
        let slice_data_ofs = tables_ofs + tables.len();

        let mut file = vec![0u8; slice_data_ofs + slice_data.len()];
        file[0..2].copy_from_slice(&crate::header::SIGNATURE.to_le_bytes());
        file[2..4].copy_from_slice(&crate::header::VERSION.to_le_bytes());
        file[8..12].copy_from_slice(&0u32.to_le_bytes()); // data_size
        file[12..14].copy_from_slice(&crate::header::HEADER_SIZE.to_le_bytes());
        file[14..16].copy_from_slice(&1u16.to_le_bytes()); // total_slices
        file[16..18].copy_from_slice(&1u16.to_le_bytes()); // total_images
        file[18..22].copy_from_slice(&crate::header::FLAG_ETC1S.to_le_bytes());
        file[22] = 0; // Tex2D
        file[26..30].copy_from_slice(&(slice_desc_ofs as u32).to_le_bytes());
        file[30..34].copy_from_slice(&(endpoint_cb_ofs as u32).to_le_bytes());
        file[34..36].copy_from_slice(&(endpoint_cb.len() as u16).to_le_bytes());
        file[36..40].copy_from_slice(&(selector_cb_ofs as u32).to_le_bytes());
        file[40..42].copy_from_slice(&(selector_cb.len() as u16).to_le_bytes());
        file[42..46].copy_from_slice(&(tables_ofs as u32).to_le_bytes());
        file[46..48].copy_from_slice(&(tables.len() as u16).to_le_bytes());
        file[48..52].copy_from_slice(&1u32.to_le_bytes()); // total_endpoints
        file[52..56].copy_from_slice(&1u32.to_le_bytes()); // total_selectors
        let crc = crc16(&file[6..header_size], 0);
        file[4..6].copy_from_slice(&crc.to_le_bytes());

        file[endpoint_cb_ofs..endpoint_cb_ofs + endpoint_cb.len()].copy_from_slice(&endpoint_cb);
        file[selector_cb_ofs..selector_cb_ofs + selector_cb.len()].copy_from_slice(&selector_cb);
        file[tables_ofs..tables_ofs + tables.len()].copy_from_slice(&tables);
        file[slice_data_ofs..slice_data_ofs + slice_data.len()].copy_from_slice(&slice_data);

        // Slice descriptor: one color slice, image 0, level 0, a single 1x1-block grid.
        let desc = &mut file[slice_desc_ofs..slice_desc_ofs + SLICE_DESC_SIZE];
        desc[0..2].copy_from_slice(&0u16.to_le_bytes()); // image_index
        desc[2] = 0; // level_index
        desc[3] = 0; // flags: not alpha
        desc[4..6].copy_from_slice(&4u16.to_le_bytes()); // orig_width
        desc[6..8].copy_from_slice(&4u16.to_le_bytes()); // orig_height
        desc[8..10].copy_from_slice(&1u16.to_le_bytes()); // num_blocks_x
        desc[10..12].copy_from_slice(&1u16.to_le_bytes()); // num_blocks_y
        desc[12..16].copy_from_slice(&(slice_data_ofs as u32).to_le_bytes());
        desc[16..20].copy_from_slice(&(slice_data.len() as u32).to_le_bytes());

        let header = FileHeader::parse(&file).expect("constructed header parses");
        (file, header)
    }

    #[test]
    fn end_to_end_transcodes_single_block_to_etc1() {
        let (file, header) = build_minimal_file();
        let mut transcoder = Transcoder::new();
        transcoder.start_transcoding(&file, &header).unwrap();

        let descs = crate::header::parse_slice_descs(&file, &header).unwrap();
        let mut out = [0u8; 8];
        transcoder
            .transcode_image_level(&file, &descs, 0, 0, TargetFormat::Etc1, DecodeFlags::default(), &mut out)
            .unwrap();

        let endpoint = EndpointEntry { color5: [16, 16, 16], inten5: 0 };
        let selector = SelectorEntry::from_raw_codes([[0u8; 4]; 4]);
        let mut expected = [0u8; 8];
        formats::write_etc1_block(&endpoint, &selector, &mut expected);
        assert_eq!(out, expected);
    }

    #[test]
    fn transcode_before_start_transcoding_errors() {
        let transcoder = Transcoder::new();
        let descs: Vec<SliceDesc> = Vec::new();
        let mut out = [0u8; 8];
        let result =
            transcoder.transcode_image_level(&[], &descs, 0, 0, TargetFormat::Etc1, DecodeFlags::default(), &mut out);
        assert!(matches!(result, Err(Error::NotReady)));
    }
}
