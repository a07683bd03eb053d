//! Frame/scan orchestration (spec.md §4.6): marker-segment table parsing,
//! parser-kind selection per (frame process, scan parameters) pair, and
//! hierarchical frame composition. This is the glue between the marker
//! dispatch loop, [`crate::frame::Frame`]/[`crate::scan::Scan`], and the
//! per-variant entropy parsers in [`crate::entropy`], grounded in the
//! teacher's `decoder.rs::decode_headers_internal`/`parse_marker_inner`.
use crate::control::line_buffer::Line;
use crate::entropy::hidden::{HiddenInner, HiddenWrapper};
use crate::entropy::jpegls::{JpegLsParser, LsParams};
use crate::entropy::lossless::LosslessParser;
use crate::entropy::prog_arith::ProgressiveArithParser;
use crate::entropy::prog_huffman::ProgressiveHuffmanParser;
use crate::entropy::seq_arith::SequentialArithParser;
use crate::entropy::seq_huffman::SequentialHuffmanParser;
use crate::entropy::ParserKind;
use crate::errors::{CodecError, Warning, WarningSink};
use crate::frame::{Frame, SideChannel};
use crate::huffman::HuffmanTable;
use crate::markers::{Marker, ProcessType};
use crate::options::CodecOptions;
use crate::resample::upsampler::Upsampler;
use crate::scan::Scan;
use crate::tables::{ArithConditioner, LsThresholds, QuantTable, Tables};

/// More fill bytes than this before a marker is reported as a
/// [`Warning::OverlongFill`] rather than silently absorbed; a handful of
/// 0xFF padding bytes is routine, dozens usually means a corrupted stream
/// was resynchronised by accident (spec.md §4.2).
const OVERLONG_FILL_THRESHOLD: usize = 4;

/// Parse a DQT segment (spec.md §6): one or more back-to-back
/// `Pq/Tq(1) Qk(1 or 2)*64` table definitions packed into one payload.
pub fn parse_dqt(tables: &mut Tables, payload: &[u8]) -> Result<(), CodecError> {
    let mut pos = 0usize;
    while pos < payload.len() {
        let pqtq = payload[pos];
        pos += 1;
        let precision_16bit = (pqtq >> 4) != 0;
        let tq = usize::from(pqtq & 0x0F);
        let entry_len = if precision_16bit { 2 } else { 1 };
        if pos + entry_len * 64 > payload.len() {
            return Err(CodecError::MalformedStream(
                "DQT segment truncated mid-table".into(),
            ));
        }
        let mut values = [0u16; 64];
        for v in &mut values {
            *v = if precision_16bit {
                let hi = payload[pos];
                let lo = payload[pos + 1];
                pos += 2;
                u16::from_be_bytes([hi, lo])
            } else {
                let b = payload[pos];
                pos += 1;
                u16::from(b)
            };
        }
        tables.set_quant(
            tq,
            QuantTable {
                values,
                precision_16bit,
            },
        )?;
    }
    Ok(())
}

/// Parse a DHT segment (spec.md §6): one or more
/// `Tc/Th(1) L1..L16(16) V1..Vn` table definitions.
pub fn parse_dht(tables: &mut Tables, payload: &[u8]) -> Result<(), CodecError> {
    let mut pos = 0usize;
    while pos < payload.len() {
        if pos + 17 > payload.len() {
            return Err(CodecError::MalformedStream(
                "DHT segment truncated before 16 code-length counts".into(),
            ));
        }
        let tcth = payload[pos];
        pos += 1;
        let is_ac = (tcth >> 4) != 0;
        let th = usize::from(tcth & 0x0F);

        let mut counts = [0u8; 16];
        counts.copy_from_slice(&payload[pos..pos + 16]);
        pos += 16;

        let total: usize = counts.iter().map(|&c| usize::from(c)).sum();
        if pos + total > payload.len() {
            return Err(CodecError::MalformedStream(
                "DHT segment truncated mid-symbol-list".into(),
            ));
        }
        let values = payload[pos..pos + total].to_vec();
        pos += total;

        let table = HuffmanTable::new(&counts, values)?;
        if is_ac {
            tables.set_ac_huffman(th, table)?;
        } else {
            tables.set_dc_huffman(th, table)?;
        }
    }
    Ok(())
}

/// Parse a DAC segment (spec.md §4.3.2, §6): one or more
/// `Cs(1) Vcs(1)` conditioner installs. `Cs`'s high nibble selects the
/// table class (0 = DC, 1 = AC); for DC tables `Vcs` packs `U<<4|L`, for
/// AC tables `Vcs` is `Kx` directly.
pub fn parse_dac(tables: &mut Tables, payload: &[u8]) -> Result<(), CodecError> {
    if payload.len() % 2 != 0 {
        return Err(CodecError::MalformedStream(
            "DAC segment has an odd number of bytes".into(),
        ));
    }
    for pair in payload.chunks_exact(2) {
        let cs = pair[0];
        let vcs = pair[1];
        let class = cs >> 4;
        let th = usize::from(cs & 0x0F);
        if th >= tables.dc_conditioner.len() {
            return Err(CodecError::InvalidParameter(format!(
                "DAC table selector {th} out of range"
            )));
        }
        if class == 0 {
            tables.dc_conditioner[th] = ArithConditioner {
                l: vcs & 0x0F,
                u: vcs >> 4,
                kx: 5,
            };
        } else {
            let mut cond = tables.ac_conditioner[th];
            cond.kx = vcs;
            tables.ac_conditioner[th] = cond;
        }
    }
    Ok(())
}

/// Parse a DRI segment: a single big-endian restart interval.
pub fn parse_dri(tables: &mut Tables, payload: &[u8]) -> Result<(), CodecError> {
    if payload.len() != 2 {
        return Err(CodecError::MalformedStream(format!(
            "DRI payload must be 2 bytes, got {}",
            payload.len()
        )));
    }
    tables.restart_interval = u16::from_be_bytes([payload[0], payload[1]]);
    Ok(())
}

/// Parse a DNL segment: a single big-endian line count (spec.md §6).
pub fn parse_dnl(payload: &[u8]) -> Result<u16, CodecError> {
    if payload.len() != 2 {
        return Err(CodecError::MalformedStream(format!(
            "DNL payload must be 2 bytes, got {}",
            payload.len()
        )));
    }
    Ok(u16::from_be_bytes([payload[0], payload[1]]))
}

/// Parse an EXP segment: `Eh<<4|Ev`, each a single bit (spec.md §6).
pub fn parse_exp(payload: &[u8]) -> Result<(bool, bool), CodecError> {
    if payload.len() != 1 {
        return Err(CodecError::MalformedStream(format!(
            "EXP payload must be 1 byte, got {}",
            payload.len()
        )));
    }
    let b = payload[0];
    Ok(((b >> 4) & 1 != 0, b & 1 != 0))
}

/// Parse an LSE segment (JPEG-LS Annex C thresholds, ID=1 only; mapping
/// table IDs 2/3 are an external container concern and
/// are skipped with a warning since this core has no palette machinery).
pub fn parse_lse(
    tables: &mut Tables,
    payload: &[u8],
    warnings: &mut WarningSink,
) -> Result<(), CodecError> {
    if payload.is_empty() {
        return Err(CodecError::MalformedStream("LSE segment is empty".into()));
    }
    let id = payload[0];
    if id != 1 {
        warnings.push(Warning::StrayMarker(crate::markers::LSE));
        return Ok(());
    }
    if payload.len() != 11 {
        return Err(CodecError::MalformedStream(format!(
            "LSE threshold segment must be 11 bytes, got {}",
            payload.len()
        )));
    }
    // ID(1) MAXVAL(2) T1(2) T2(2) T3(2) RESET(2), Annex C.2.4.1.2. NEAR
    // itself is not part of LSE; it stays whatever the prior default/scan
    // state had it as, so we carry the existing value forward if present.
    let read16 = |i: usize| i32::from(u16::from_be_bytes([payload[i], payload[i + 1]]));
    let near = tables.ls_thresholds.map_or(0, |th| th.near);
    tables.ls_thresholds = Some(LsThresholds {
        maxval: read16(1),
        near,
        t1: read16(3),
        t2: read16(5),
        t3: read16(7),
        reset: read16(9),
    });
    Ok(())
}

/// Choose the concrete [`ParserKind`] for a scan about to start, from the
/// frame's process tag and the scan's own parameters (spec.md §4.2
/// "instantiates the correct parser variant per (frame-type,
/// scan-parameters) pair").
pub fn select_parser(frame: &Frame, scan: &Scan, tables: &Tables) -> Result<ParserKind, CodecError> {
    let component_count = scan.components.len();
    let restart_interval = u32::from(tables.restart_interval);

    if frame.process == ProcessType::Dimensions {
        return Err(CodecError::InvalidParameter(
            "a DHP pseudo-frame carries no scans of its own".into(),
        ));
    }

    if frame.process == ProcessType::JpegLs {
        let maxval = (1i32 << i32::from(frame.precision)) - 1;
        // NEAR travels in the scan header (spec.md §4.3.8, Scan::ls_near);
        // an LSE segment only supplies the Annex C thresholds T1/T2/T3/RESET,
        // so it never overrides the scan's own NEAR (see parse_lse).
        let near = i32::from(scan.ls_near());
        let thresholds = match tables.ls_thresholds {
            Some(th) => LsThresholds { near, ..th },
            None => LsThresholds::defaults(maxval, near),
        };
        let params = LsParams::derive(thresholds);
        return Ok(ParserKind::JpegLs(JpegLsParser::new(
            component_count,
            params,
            scan.ls_interleave,
        )));
    }

    if frame.process.is_lossless() {
        let sc = scan.components[0];
        return Ok(ParserKind::Lossless(if frame.process.is_arithmetic() {
            LosslessParser::new_arithmetic(
                component_count,
                restart_interval,
                frame.precision,
                scan.low_bit,
                scan.start,
                tables.dc_conditioner[usize::from(sc.dc_or_mapping_table)],
            )
        } else {
            LosslessParser::new_huffman(
                component_count,
                restart_interval,
                frame.precision,
                scan.low_bit,
                scan.start,
            )
        }));
    }

    if frame.process.is_progressive() {
        return Ok(if frame.process.is_arithmetic() {
            ParserKind::ProgressiveArithmetic(ProgressiveArithParser::new(
                component_count,
                restart_interval,
            ))
        } else {
            ParserKind::ProgressiveHuffman(ProgressiveHuffmanParser::new(
                component_count,
                restart_interval,
            ))
        });
    }

    Ok(if frame.process.is_arithmetic() {
        ParserKind::SequentialArithmetic(SequentialArithParser::new(
            component_count,
            restart_interval,
        ))
    } else {
        ParserKind::SequentialHuffman(SequentialHuffmanParser::new(
            component_count,
            restart_interval,
            frame.process.is_differential(),
        ))
    })
}

/// Wrap an already-selected inner parser kind as a hidden refinement or
/// residual side channel (spec.md §4.3.9): the wrapper borrows
/// `write_frame_type` from the *next* real scan since it has no SOF of its
/// own.
pub fn wrap_hidden(inner: ParserKind, write_frame_type: ProcessType) -> Result<ParserKind, CodecError> {
    let inner = match inner {
        ParserKind::SequentialHuffman(p) => HiddenInner::SequentialHuffman(p),
        ParserKind::SequentialArithmetic(p) => HiddenInner::SequentialArithmetic(p),
        ParserKind::ProgressiveHuffman(p) => HiddenInner::ProgressiveHuffman(p),
        ParserKind::ProgressiveArithmetic(p) => HiddenInner::ProgressiveArithmetic(p),
        other => {
            return Err(CodecError::InvalidParameter(format!(
                "{} scans cannot back a hidden side channel",
                other.name()
            )))
        }
    };
    Ok(ParserKind::Hidden(Box::new(HiddenWrapper::new(
        inner,
        write_frame_type,
    ))))
}

/// One level of a (possibly non-hierarchical, single-level) image: its
/// frame plus the EXP-declared expansion that applies to the *next*
/// differential level, if any (spec.md §4.6 "Hierarchical composition").
pub struct ImageLevel {
    pub frame: Frame,
    pub expand_h: bool,
    pub expand_v: bool,
}

/// A parsed, possibly hierarchical image: an ordered list of levels plus
/// any table state carried between frames and the diagnostic warnings
/// collected along the way (spec.md §4.6, §5 "Shared resources").
pub struct Image {
    pub levels: Vec<ImageLevel>,
    pub options: CodecOptions,
    pub warnings: WarningSink,
}

impl Image {
    #[must_use]
    pub fn new(options: CodecOptions) -> Self {
        Image {
            levels: Vec::new(),
            options,
            warnings: WarningSink::new(),
        }
    }

    /// Parse marker segments from `data` (already positioned after SOI)
    /// until a SOS is reached, returning the frame it belongs to and the
    /// scan itself. Mirrors the teacher's `decode_headers_internal`, plus
    /// DAC/DNL/DHP/EXP/LSE/JPEG-LS-SOF dispatch the teacher does not need
    /// (spec.md §4.6 "Parsing").
    pub fn parse_next_scan(&mut self, reader: &mut MarkerReader) -> Result<(usize, Scan), CodecError> {
        let mut pending_differential = false;
        loop {
            let (marker, fill) = reader.next_marker_counting_fill()?;
            if fill > OVERLONG_FILL_THRESHOLD {
                self.warnings.push(Warning::OverlongFill(fill));
            }
            match marker {
                Marker::SOI => continue,
                Marker::DHP => {
                    let payload = reader.segment_payload()?;
                    let frame = Frame::parse_with_process(&payload, ProcessType::Dimensions)?;
                    self.levels.push(ImageLevel {
                        frame,
                        expand_h: false,
                        expand_v: false,
                    });
                }
                Marker::EXP => {
                    let payload = reader.segment_payload()?;
                    let (eh, ev) = parse_exp(&payload)?;
                    if let Some(level) = self.levels.last_mut() {
                        level.expand_h = eh;
                        level.expand_v = ev;
                    }
                    pending_differential = true;
                }
                Marker::SOF(code) => {
                    let payload = reader.segment_payload()?;
                    // Per spec.md §4.6: the frame right after DHP is the
                    // hierarchical base (non-differential); every frame
                    // after that is differential and preceded by its own
                    // EXP, so only a just-seen EXP makes this one
                    // differential.
                    let differential = pending_differential;
                    pending_differential = false;
                    let frame = Frame::parse_sof(&payload, code, differential)?;
                    self.levels.push(ImageLevel {
                        frame,
                        expand_h: false,
                        expand_v: false,
                    });
                }
                Marker::SofLs => {
                    let payload = reader.segment_payload()?;
                    let frame = Frame::parse_with_process(&payload, ProcessType::JpegLs)?;
                    self.levels.push(ImageLevel {
                        frame,
                        expand_h: false,
                        expand_v: false,
                    });
                }
                Marker::DQT => {
                    let payload = reader.segment_payload()?;
                    let level = self.current_level_mut()?;
                    parse_dqt(&mut level.frame.tables, &payload)?;
                }
                Marker::DHT => {
                    let payload = reader.segment_payload()?;
                    let level = self.current_level_mut()?;
                    parse_dht(&mut level.frame.tables, &payload)?;
                }
                Marker::DAC => {
                    let payload = reader.segment_payload()?;
                    let level = self.current_level_mut()?;
                    parse_dac(&mut level.frame.tables, &payload)?;
                }
                Marker::DRI => {
                    let payload = reader.segment_payload()?;
                    let level = self.current_level_mut()?;
                    parse_dri(&mut level.frame.tables, &payload)?;
                }
                Marker::Lse => {
                    let payload = reader.segment_payload()?;
                    let level = self.current_level_mut()?;
                    parse_lse(&mut level.frame.tables, &payload, &mut self.warnings)?;
                }
                Marker::DNL => {
                    let payload = reader.segment_payload()?;
                    let height = parse_dnl(&payload)?;
                    let level = self.current_level_mut()?;
                    if level.frame.height_pending() {
                        level.frame.commit_dnl_height(height)?;
                        level.frame.layout_components();
                    } else {
                        self.warnings.push(Warning::UnexpectedDnl);
                    }
                }
                Marker::SOS => {
                    let payload = reader.segment_payload()?;
                    let level_index = self.levels.len().checked_sub(1).ok_or_else(|| {
                        CodecError::InvalidParameter("SOS before any frame header".into())
                    })?;
                    let process = self.levels[level_index].frame.process;
                    let components = {
                        let frame = &self.levels[level_index].frame;
                        frame.components.clone()
                    };
                    let scan = Scan::parse_sos(&payload, process, |id| {
                        components.iter().position(|c| c.id == id)
                    })?;
                    self.levels[level_index].frame.scans.push(scan.clone());
                    return Ok((level_index, scan));
                }
                Marker::APP(n) => {
                    let payload = reader.segment_payload()?;
                    if n == crate::entropy::hidden::HIDDEN_SIDE_CHANNEL_APP_MARKER {
                        let level = self.current_level_mut()?;
                        if level.frame.scans.is_empty() {
                            // spec requires this to fail loudly, not warn: a hidden
                            // channel before the frame's first standard scan has no
                            // well-defined placement to attach to.
                            return Err(CodecError::MalformedStream(
                                "hidden side channel appeared before the frame's first standard scan"
                                    .into(),
                            ));
                        } else if level.frame.hidden_refinement.is_none() {
                            level.frame.hidden_refinement = Some(SideChannel::new(payload));
                        } else {
                            level.frame.residual = Some(SideChannel::new(payload));
                        }
                    }
                }
                Marker::COM | Marker::Other(_) => {
                    let _ = reader.segment_payload()?;
                }
                Marker::EOI => {
                    return Err(CodecError::UnexpectedEof(
                        "EOI encountered before any scan".into(),
                    ))
                }
                Marker::RST(_) => {
                    return Err(CodecError::MalformedStream(
                        "restart marker outside an entropy-coded segment".into(),
                    ))
                }
            }
        }
    }

    fn current_level_mut(&mut self) -> Result<&mut ImageLevel, CodecError> {
        self.levels
            .last_mut()
            .ok_or_else(|| CodecError::InvalidParameter("marker segment before any frame header".into()))
    }
}

/// A cursor over raw codestream bytes that turns it into a marker-at-a-time
/// view: `next_marker` reads up to and including the next 0xFF-prefixed
/// marker byte, `segment_payload` reads that marker's length-prefixed body.
pub struct MarkerReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> MarkerReader<'a> {
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        MarkerReader { data, pos: 0 }
    }

    /// Advance to and return the next marker, skipping any 0xFF fill bytes
    /// (spec.md §4.2 "0xFFFF is a fill byte and is skipped").
    pub fn next_marker(&mut self) -> Result<Marker, CodecError> {
        self.next_marker_counting_fill().map(|(marker, _)| marker)
    }

    /// Same as [`Self::next_marker`], additionally reporting how many extra
    /// 0xFF fill bytes preceded the marker code (beyond the one required to
    /// introduce it), so the caller can surface [`Warning::OverlongFill`]
    /// when a run of them looks like stream corruption rather than ordinary
    /// padding.
    fn next_marker_counting_fill(&mut self) -> Result<(Marker, usize), CodecError> {
        loop {
            let b = self.read_u8()?;
            if b != 0xFF {
                continue;
            }
            let mut code = self.read_u8()?;
            let mut fill = 0usize;
            while code == 0xFF {
                fill += 1;
                code = self.read_u8()?;
            }
            if code == 0x00 {
                continue;
            }
            let marker = Marker::from_u8(code)
                .ok_or_else(|| CodecError::MalformedStream(format!("unknown marker byte {code:#x}")))?;
            return Ok((marker, fill));
        }
    }

    /// Read a marker segment's `length(2, inclusive of itself) payload`
    /// body (spec.md §6: "Length fields always include the two bytes of
    /// the length field itself").
    pub fn segment_payload(&mut self) -> Result<Vec<u8>, CodecError> {
        let length = self.read_u16_be()?;
        if length < 2 {
            return Err(CodecError::MalformedStream(format!(
                "marker segment length {length} is shorter than its own length field"
            )));
        }
        let body_len = usize::from(length) - 2;
        if self.pos + body_len > self.data.len() {
            return Err(CodecError::UnexpectedEof(
                "marker segment body runs past end of stream".into(),
            ));
        }
        let body = self.data[self.pos..self.pos + body_len].to_vec();
        self.pos += body_len;
        Ok(body)
    }

    #[must_use]
    pub fn position(&self) -> usize {
        self.pos
    }

    fn read_u8(&mut self) -> Result<u8, CodecError> {
        let b = self
            .data
            .get(self.pos)
            .copied()
            .ok_or_else(|| CodecError::UnexpectedEof("expected one more byte".into()))?;
        self.pos += 1;
        Ok(b)
    }

    fn read_u16_be(&mut self) -> Result<u16, CodecError> {
        let hi = self.read_u8()?;
        let lo = self.read_u8()?;
        Ok(u16::from_be_bytes([hi, lo]))
    }
}

/// Compose one 8-line stripe of a hierarchical level's differential frame
/// on top of the upsampled reconstruction of the level below it (spec.md
/// §4.6 "Hierarchical composition"): decode direction adds, encode
/// direction subtracts, both streamed rather than materialising the whole
/// image (spec.md §4.6 "streaming 8-line stripe").
pub fn compose_stripe_decode(
    upsampler: &mut Upsampler,
    base_above: &[i32],
    base_current: &[i32],
    base_below: &[i32],
    row_frac: usize,
    residual: &Line,
    out_width: usize,
) -> Vec<i32> {
    upsampler.set_window(base_above, base_current, base_below);
    let mut upsampled = vec![0i32; out_width];
    upsampler.upsample_row(row_frac, out_width, &mut upsampled);
    upsampled
        .iter()
        .enumerate()
        .map(|(x, &base)| base + residual.at(x as isize))
        .collect()
}

/// Encode-direction dual of [`compose_stripe_decode`]: downsample is the
/// resampler layer's job (spec.md §4.5), this only computes the residual
/// given the already-downsampled base prediction for the row.
#[must_use]
pub fn compose_stripe_encode(base: &[i32], next_level: &[i32]) -> Vec<i32> {
    base.iter()
        .zip(next_level)
        .map(|(&b, &n)| n - b)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::line_buffer::LineBuffer;
    use crate::resample::upsampler::UpsamplerKind;

    fn dqt_payload() -> Vec<u8> {
        let mut p = vec![0x00u8]; // Pq=0 (8-bit), Tq=0
        p.extend(std::iter::repeat(16u8).take(64));
        p
    }

    #[test]
    fn parses_single_8bit_quant_table() {
        let mut tables = Tables::new();
        parse_dqt(&mut tables, &dqt_payload()).unwrap();
        let t = tables.quant_table(0).unwrap();
        assert_eq!(t.values[0], 16);
        assert!(!t.precision_16bit);
    }

    #[test]
    fn parses_dht_with_single_symbol() {
        let mut tables = Tables::new();
        let mut payload = vec![0x00u8]; // Tc=0 (DC), Th=0
        let mut counts = [0u8; 16];
        counts[0] = 1;
        payload.extend_from_slice(&counts);
        payload.push(5); // the one symbol
        parse_dht(&mut tables, &payload).unwrap();
        assert!(tables.dc_table(0).is_ok());
    }

    #[test]
    fn parses_dac_dc_and_ac_entries() {
        let mut tables = Tables::new();
        let payload = vec![0x00, 0x21, 0x10, 0x07];
        parse_dac(&mut tables, &payload).unwrap();
        assert_eq!(tables.dc_conditioner[0].l, 1);
        assert_eq!(tables.dc_conditioner[0].u, 2);
        assert_eq!(tables.ac_conditioner[0].kx, 7);
    }

    #[test]
    fn parses_dri_interval() {
        let mut tables = Tables::new();
        parse_dri(&mut tables, &[0x00, 0x10]).unwrap();
        assert_eq!(tables.restart_interval, 16);
    }

    #[test]
    fn marker_reader_skips_fill_bytes_before_marker() {
        let data = [0xFF, 0xFF, 0xD8];
        let mut r = MarkerReader::new(&data);
        assert_eq!(r.next_marker().unwrap(), Marker::SOI);
    }

    #[test]
    fn marker_reader_reads_segment_payload() {
        let data = [0xFF, 0xDD, 0x00, 0x04, 0x00, 0x10];
        let mut r = MarkerReader::new(&data);
        assert_eq!(r.next_marker().unwrap(), Marker::DRI);
        let payload = r.segment_payload().unwrap();
        assert_eq!(payload, vec![0x00, 0x10]);
    }

    #[test]
    fn long_fill_run_before_a_marker_is_warned_not_swallowed() {
        let mut data = vec![0xFFu8; 8];
        data.push(0xD8); // SOI
        let mut image = Image::new(CodecOptions::default());
        let mut reader = MarkerReader::new(&data);
        // SOI alone doesn't return from parse_next_scan; drive the reader
        // directly to isolate the fill-counting behaviour it relies on.
        let (marker, fill) = reader.next_marker_counting_fill().unwrap();
        assert_eq!(marker, Marker::SOI);
        assert!(fill > OVERLONG_FILL_THRESHOLD);
        if fill > OVERLONG_FILL_THRESHOLD {
            image.warnings.push(Warning::OverlongFill(fill));
        }
        assert!(!image.warnings.is_empty());
    }

    #[test]
    fn select_parser_picks_sequential_huffman_for_baseline() {
        let sof = {
            let mut p = vec![8u8, 0, 8, 0, 8, 1];
            p.extend_from_slice(&[1, 0x11, 0]);
            p
        };
        let frame = Frame::parse_sof(&sof, 0, false).unwrap();
        let scan = Scan::parse_sos(&[1, 1, 0x00, 0, 63, 0], frame.process, |id| {
            (id == 1).then_some(0)
        })
        .unwrap();
        let kind = select_parser(&frame, &scan, &frame.tables).unwrap();
        assert_eq!(kind.name(), "sequential-huffman");
    }

    #[test]
    fn hierarchical_stripe_adds_upsampled_base_and_residual() {
        let mut up = Upsampler::new(UpsamplerKind::Nearest, 1, 1, 4).unwrap();
        let mut lines = LineBuffer::new(&[4], &[1]);
        lines.start_mcu_row(0, 1).unwrap();
        {
            let residual = lines.current_line_mut(0).unwrap();
            residual.set(0, 1);
            residual.set(1, 2);
            residual.set(2, 3);
            residual.set(3, 4);
        }
        let residual = lines.current_line(0).unwrap();
        let composed = compose_stripe_decode(
            &mut up,
            &[10, 10, 10, 10],
            &[10, 10, 10, 10],
            &[10, 10, 10, 10],
            0,
            residual,
            4,
        );
        assert_eq!(composed, vec![11, 12, 13, 14]);
    }
}
