//! The output of one kernel pass: a row-major grid of escape counts.
//!
//! The storage is carved out of 32-byte aligned chunks so that the
//! vector kernels can use aligned stores for every lane group.

use std::fmt;
use std::slice;

use crate::viewport::Position;

/// Cells per storage chunk; also the widest lane group any kernel uses.
const CHUNK: usize = 8;

#[repr(C, align(32))]
#[derive(Copy, Clone)]
struct Chunk([u32; CHUNK]);

/// A grid of iteration counts, plus the bookkeeping the exchange
/// needs: which slot the buffer is, which pass last filled it, and
/// where that pass was looking.
pub struct Field {
    width: usize,
    height: usize,
    chunks: Vec<Chunk>,
    slot: usize,
    generation: u64,
    position: Option<Position>,
}

impl Field {
    /// A zeroed `width` by `height` field that belongs to slot 0 and
    /// has never been filled.
    pub fn new(width: usize, height: usize) -> Field {
        Field::for_slot(width, height, 0)
    }

    pub(crate) fn for_slot(width: usize, height: usize, slot: usize) -> Field {
        let cells = width * height;
        Field {
            width,
            height,
            chunks: vec![Chunk([0; CHUNK]); (cells + CHUNK - 1) / CHUNK],
            slot,
            generation: 0,
            position: None,
        }
    }

    /// Number of cells per row.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of rows.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Total number of cells.
    pub fn len(&self) -> usize {
        self.width * self.height
    }

    /// True for a field with no cells.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Which of the exchange's buffers this is.  Slots are handed
    /// around, never copied, so the label follows the memory.
    pub fn slot(&self) -> usize {
        self.slot
    }

    /// The number of the pass that filled this buffer, counting from
    /// one.  Zero means it has never been filled.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The position the filling pass rendered, if any pass has.
    pub fn position(&self) -> Option<Position> {
        self.position
    }

    pub(crate) fn stamp(&mut self, generation: u64, position: Position) {
        self.generation = generation;
        self.position = Some(position);
    }

    /// All counts, row after row.
    pub fn counts(&self) -> &[u32] {
        // A chunk is a plain run of CHUNK u32s with no padding, and
        // `len` never exceeds the cells the chunks hold.
        unsafe { slice::from_raw_parts(self.chunks.as_ptr() as *const u32, self.len()) }
    }

    /// Mutable access for kernels.
    pub fn counts_mut(&mut self) -> &mut [u32] {
        let len = self.len();
        unsafe { slice::from_raw_parts_mut(self.chunks.as_mut_ptr() as *mut u32, len) }
    }

    /// The counts of row `iy`.
    pub fn row(&self, iy: usize) -> &[u32] {
        &self.counts()[iy * self.width..(iy + 1) * self.width]
    }

    /// Mutable access to row `iy`.
    pub fn row_mut(&mut self, iy: usize) -> &mut [u32] {
        let width = self.width;
        &mut self.counts_mut()[iy * width..(iy + 1) * width]
    }

    /// The count at column `ix`, row `iy`.
    pub fn get(&self, ix: usize, iy: usize) -> u32 {
        self.counts()[iy * self.width + ix]
    }
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Field")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("slot", &self.slot)
            .field("generation", &self.generation)
            .field("position", &self.position)
            .finish()
    }
}
