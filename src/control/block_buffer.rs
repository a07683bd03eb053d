//! The block buffer: per-component linked rows of quantised 8x8 blocks
//! (spec.md §4.4 "Block buffer").
use crate::control::FreeList;
use crate::errors::CodecError;

pub const BLOCK_LEN: usize = 64;

/// A single quantised 8x8 DCT block, stored in natural (not zig-zag) order.
#[derive(Clone)]
pub struct QuantisedBlock {
    pub coeffs: [i32; BLOCK_LEN],
}

impl Default for QuantisedBlock {
    fn default() -> Self {
        QuantisedBlock {
            coeffs: [0; BLOCK_LEN],
        }
    }
}

impl QuantisedBlock {
    pub fn clear(&mut self) {
        self.coeffs = [0; BLOCK_LEN];
    }
}

/// One MCU-height of blocks for one component: `blocks_per_row` quantised
/// blocks, chained to the next row by the buffer's free list rather than an
/// intrusive pointer (spec.md §9 "Manual arenas").
#[derive(Clone, Default)]
pub struct QuantisedRow {
    pub blocks: Vec<QuantisedBlock>,
}

impl QuantisedRow {
    fn new(blocks_per_row: usize) -> Self {
        QuantisedRow {
            blocks: vec![QuantisedBlock::default(); blocks_per_row],
        }
    }

    fn reset(&mut self, blocks_per_row: usize) {
        self.blocks.resize_with(blocks_per_row, QuantisedBlock::default);
        for b in &mut self.blocks {
            b.clear();
        }
    }
}

struct ComponentState {
    top_row: Vec<QuantisedRow>,
    /// Index into `top_row` the parser is currently reading/writing.
    cursor: usize,
    blocks_per_row: usize,
    next_y: usize,
    free: FreeList<QuantisedRow>,
}

/// Owns every component's quantised rows for the duration of a scan
/// (spec.md §4.4).
pub struct BlockBuffer {
    components: Vec<ComponentState>,
    /// Parallel residual rows for the non-standard residual side-channel
    /// extension (spec.md §4.4 "parallel set of topResidualRow").
    residual: Vec<Option<ComponentState>>,
}

impl BlockBuffer {
    #[must_use]
    pub fn new(component_count: usize) -> Self {
        BlockBuffer {
            components: (0..component_count)
                .map(|_| ComponentState {
                    top_row: Vec::new(),
                    cursor: 0,
                    blocks_per_row: 0,
                    next_y: 0,
                    free: FreeList::new(),
                })
                .collect(),
            residual: (0..component_count).map(|_| None).collect(),
        }
    }

    /// `start_mcu_quantizer_row`: allocate the next row of blocks for every
    /// component in `blocks_per_row`, reusing free-list entries when
    /// available. Returns `false` once the image height is exhausted.
    pub fn start_mcu_row(
        &mut self,
        blocks_per_row: &[usize],
        rows_per_mcu: usize,
        image_rows: usize,
    ) -> Result<bool, CodecError> {
        if blocks_per_row.len() != self.components.len() {
            return Err(CodecError::InvalidParameter(
                "blocks_per_row length mismatches component count".into(),
            ));
        }
        let mut any_remaining = false;
        for (state, &bpr) in self.components.iter_mut().zip(blocks_per_row) {
            if state.next_y >= image_rows {
                continue;
            }
            any_remaining = true;
            state.blocks_per_row = bpr;
            let mut row = state.free.take_or_else(|| QuantisedRow::new(bpr));
            row.reset(bpr);
            state.top_row.push(row);
            state.cursor = state.top_row.len() - 1;
            state.next_y += rows_per_mcu;
        }
        Ok(any_remaining)
    }

    pub fn current_row(&self, component: usize) -> Result<&QuantisedRow, CodecError> {
        let state = self.component_state(component)?;
        state
            .top_row
            .get(state.cursor)
            .ok_or_else(|| CodecError::OutOfSync("no current quantised row allocated".into()))
    }

    pub fn current_row_mut(&mut self, component: usize) -> Result<&mut QuantisedRow, CodecError> {
        let state = self.component_state_mut(component)?;
        let cursor = state.cursor;
        state
            .top_row
            .get_mut(cursor)
            .ok_or_else(|| CodecError::OutOfSync("no current quantised row allocated".into()))
    }

    /// Reclaim every row that is no longer needed (called once the
    /// resampler/color-transform has consumed it), returning it to the
    /// free list for the next MCU row.
    pub fn reclaim_consumed_rows(&mut self, component: usize, keep_last: usize) -> Result<(), CodecError> {
        let state = self.component_state_mut(component)?;
        while state.top_row.len() > keep_last {
            let row = state.top_row.remove(0);
            state.free.recycle(row);
            if state.cursor > 0 {
                state.cursor -= 1;
            }
        }
        Ok(())
    }

    fn component_state(&self, index: usize) -> Result<&ComponentState, CodecError> {
        self.components
            .get(index)
            .ok_or_else(|| CodecError::InvalidParameter(format!("component index {index}")))
    }

    fn component_state_mut(&mut self, index: usize) -> Result<&mut ComponentState, CodecError> {
        self.components
            .get_mut(index)
            .ok_or_else(|| CodecError::InvalidParameter(format!("component index {index}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocates_and_recycles_rows() {
        let mut buf = BlockBuffer::new(1);
        assert!(buf.start_mcu_row(&[2], 8, 16).unwrap());
        assert_eq!(buf.current_row(0).unwrap().blocks.len(), 2);
        buf.reclaim_consumed_rows(0, 0).unwrap();
        assert!(buf.start_mcu_row(&[2], 8, 16).unwrap());
        // second row reuses the freed allocation
        assert_eq!(buf.current_row(0).unwrap().blocks.len(), 2);
    }

    #[test]
    fn stops_once_image_height_exhausted() {
        let mut buf = BlockBuffer::new(1);
        assert!(buf.start_mcu_row(&[1], 8, 8).unwrap());
        assert!(!buf.start_mcu_row(&[1], 8, 8).unwrap());
    }
}
