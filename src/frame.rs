//! The frame object (spec.md §3 "Frame"): one of the thirteen process tags,
//! dimensions (with DNL-pending height), precision, component list, ordered
//! scans, and optional hidden-refinement/residual side streams.
use crate::components::{Component, MAX_COMPONENTS};
use crate::errors::CodecError;
use crate::markers::ProcessType;
use crate::scan::Scan;
use crate::tables::Tables;

/// A hidden non-standard side-stream (spec.md §4.3.9, §9 "Open question"):
/// its bytes live in an APP marker payload rather than the main codestream.
#[derive(Clone, Default)]
pub struct SideChannel {
    pub bytes: Vec<u8>,
    pub cursor: usize,
}

impl SideChannel {
    #[must_use]
    pub fn new(bytes: Vec<u8>) -> Self {
        SideChannel { bytes, cursor: 0 }
    }
}

/// One frame: parsed from a SOFn/JPEG-LS-SOF marker, or built by an encoder
/// before scans are attached.
pub struct Frame {
    pub process: ProcessType,
    pub precision: u8,
    /// 0 until committed by SOFn (non-zero) or a later DNL (spec.md §3
    /// invariant: "A frame's height is monotonic").
    pub height: u16,
    pub width: u16,
    pub components: Vec<Component>,
    pub tables: Tables,
    pub scans: Vec<Scan>,
    pub hierarchical_differential: bool,
    /// Set by EXP (spec.md §6): whether the next differential frame doubles
    /// width/height relative to this one.
    pub expand_h: bool,
    pub expand_v: bool,
    pub hidden_refinement: Option<SideChannel>,
    pub residual: Option<SideChannel>,
}

impl Frame {
    /// Parse the fixed SOF payload: `P(1) Y(2) X(2) Nf(1)` followed by
    /// `Nf * (Ci Hi/Vi Tqi)` (spec.md §6 "Marker-segment syntax").
    pub fn parse_sof(payload: &[u8], code: u8, differential: bool) -> Result<Frame, CodecError> {
        let process = ProcessType::from_sof(code, differential).ok_or_else(|| {
            CodecError::InvalidParameter(format!("unsupported SOF process code {code:#x}"))
        })?;
        Frame::parse_with_process(payload, process)
    }

    /// Parse a SOF-shaped payload with an already-known process tag: used
    /// directly for the JPEG-LS SOF (0xFFF7) and the DHP hierarchical
    /// pseudo-frame (0xFFDE), neither of which carries a T.81 Table B.1
    /// process code for [`ProcessType::from_sof`] to decode.
    pub fn parse_with_process(payload: &[u8], process: ProcessType) -> Result<Frame, CodecError> {
        if payload.len() < 6 {
            return Err(CodecError::UnexpectedEof(
                "SOF payload shorter than the fixed 6-byte header".into(),
            ));
        }
        let precision = payload[0];
        let height = u16::from_be_bytes([payload[1], payload[2]]);
        let width = u16::from_be_bytes([payload[3], payload[4]]);
        let nf = payload[5] as usize;

        if width == 0 {
            return Err(CodecError::InvalidParameter(
                "frame width must be non-zero".into(),
            ));
        }
        if nf == 0 || nf > 255 {
            return Err(CodecError::InvalidParameter(format!(
                "frame declares {nf} components"
            )));
        }
        if payload.len() < 6 + nf * 3 {
            return Err(CodecError::UnexpectedEof(
                "SOF component list truncated".into(),
            ));
        }

        if (process.is_progressive() || process.is_arithmetic()) && nf > MAX_COMPONENTS {
            return Err(CodecError::InvalidParameter(format!(
                "{nf} components exceeds the 4-component cap for progressive/arithmetic frames"
            )));
        }

        let mut components = Vec::with_capacity(nf);
        for i in 0..nf {
            let base = 6 + i * 3;
            let bytes = [payload[base], payload[base + 1], payload[base + 2]];
            components.push(Component::from_sof_bytes(bytes, i)?);
        }

        Ok(Frame {
            process,
            precision,
            height,
            width,
            components,
            tables: Tables::new(),
            scans: Vec::new(),
            hierarchical_differential: process.is_differential(),
            expand_h: false,
            expand_v: false,
            hidden_refinement: None,
            residual: None,
        })
    }

    /// Serialise the SOF payload for this frame (encoder direction).
    #[must_use]
    pub fn write_sof(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(6 + self.components.len() * 3);
        out.push(self.precision);
        out.extend_from_slice(&self.height.to_be_bytes());
        out.extend_from_slice(&self.width.to_be_bytes());
        out.push(self.components.len() as u8);
        for c in &self.components {
            out.push(c.id);
            out.push((c.h << 4) | c.v);
            out.push(c.quant_table);
        }
        out
    }

    /// Commit the final height from a DNL segment (spec.md §4.6). Only
    /// valid while height is still pending (0).
    pub fn commit_dnl_height(&mut self, height: u16) -> Result<(), CodecError> {
        if self.height != 0 {
            return Err(CodecError::InvalidParameter(
                "DNL seen but frame height was already committed".into(),
            ));
        }
        if height == 0 {
            return Err(CodecError::MalformedStream(
                "DNL declared a height of zero".into(),
            ));
        }
        self.height = height;
        Ok(())
    }

    #[must_use]
    pub fn height_pending(&self) -> bool {
        self.height == 0
    }

    #[must_use]
    pub fn max_sampling(&self) -> (u8, u8) {
        let h = self.components.iter().map(|c| c.h).max().unwrap_or(1);
        let v = self.components.iter().map(|c| c.v).max().unwrap_or(1);
        (h, v)
    }

    pub fn component_mut(&mut self, id: u8) -> Result<&mut Component, CodecError> {
        self.components
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| CodecError::ObjectDoesntExist(format!("component id {id}")))
    }

    /// Recompute every component's pixel dimensions from the frame's
    /// overall size and maximum sampling factors (spec.md §3 invariant).
    pub fn layout_components(&mut self) {
        let (h_max, v_max) = self.max_sampling();
        let (h_max, v_max) = (usize::from(h_max), usize::from(v_max));
        for c in &mut self.components {
            c.width = (usize::from(self.width) * usize::from(c.h)).div_ceil(h_max);
            c.height = (usize::from(self.height) * usize::from(c.v)).div_ceil(v_max);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sof_payload() -> Vec<u8> {
        let mut p = vec![8, 0, 16, 0, 16, 1];
        p.extend_from_slice(&[1, 0x11, 0]);
        p
    }

    #[test]
    fn parses_minimal_single_component_sof() {
        let frame = Frame::parse_sof(&sof_payload(), 0, false).unwrap();
        assert_eq!(frame.process, ProcessType::BaselineHuffman);
        assert_eq!(frame.width, 16);
        assert_eq!(frame.components.len(), 1);
    }

    #[test]
    fn height_commit_is_monotonic() {
        let mut p = sof_payload();
        p[1] = 0;
        p[2] = 0;
        let mut frame = Frame::parse_sof(&p, 0, false).unwrap();
        assert!(frame.height_pending());
        frame.commit_dnl_height(40).unwrap();
        assert_eq!(frame.height, 40);
        assert!(frame.commit_dnl_height(50).is_err());
    }

    #[test]
    fn rejects_progressive_with_too_many_components() {
        let mut p = vec![8u8, 0, 4, 0, 4, 5];
        for i in 0..5u8 {
            p.extend_from_slice(&[i, 0x11, 0]);
        }
        let err = Frame::parse_sof(&p, 2, false).unwrap_err();
        assert!(matches!(err, CodecError::InvalidParameter(_)));
    }
}
