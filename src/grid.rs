//! Host-side cell grids and pixel buffers
//!
//! Cells are one byte each (`0` dead, `1` alive), row-major, indexed
//! `y * width + x`. The backing storage is padded up to a whole number of
//! 32-bit words so the same bytes can be mirrored verbatim into a device
//! buffer where four cells share one word.

use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::error::{LifeError, Result};

/// Colour of a dead cell, and of the pixel buffer before the first generation
pub const BACKGROUND_COLOUR: [u8; 4] = [49, 68, 72, 255];

/// Colour of a live cell
pub const ALIVE_COLOUR: [u8; 4] = [255, 255, 255, 255];

/// Fixed dimensions shared by both grids and the pixel buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridDims {
    pub width: u32,
    pub height: u32,
}

impl GridDims {
    pub fn new(width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(LifeError::InvalidConfig(format!(
                "grid must be at least 1x1, got {}x{}",
                width, height
            )));
        }
        Ok(Self { width, height })
    }

    pub fn cell_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Number of 32-bit words holding the packed cells
    pub fn word_count(&self) -> usize {
        self.cell_count().div_ceil(4)
    }

    /// Size of a cell buffer in bytes, padded to whole words
    pub fn cell_bytes(&self) -> usize {
        self.word_count() * 4
    }

    pub fn pixel_bytes(&self) -> usize {
        self.cell_count() * 4
    }

    pub fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }
}

fn reserve_zeroed(label: &str, len: usize) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    bytes
        .try_reserve_exact(len)
        .map_err(|e| LifeError::allocation(label, len as u64, e))?;
    bytes.resize(len, 0);
    Ok(bytes)
}

/// One generation of cell states
#[derive(Clone, PartialEq, Eq)]
pub struct CellGrid {
    dims: GridDims,
    cells: Vec<u8>,
}

impl CellGrid {
    /// All-dead grid
    pub fn empty(dims: GridDims) -> Result<Self> {
        Ok(Self {
            dims,
            cells: reserve_zeroed("cell grid", dims.cell_bytes())?,
        })
    }

    /// Random grid: one Bernoulli trial per cell, reproducible for a given seed
    pub fn seeded(dims: GridDims, seed: u64, alive_probability: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&alive_probability) {
            return Err(LifeError::InvalidConfig(format!(
                "alive probability {} outside [0, 1]",
                alive_probability
            )));
        }

        let mut grid = Self::empty(dims)?;
        let mut rng = StdRng::seed_from_u64(seed);
        let count = dims.cell_count();
        for cell in grid.cells[..count].iter_mut() {
            *cell = rng.random_bool(alive_probability) as u8;
        }
        Ok(grid)
    }

    /// Grid with the given coordinates alive
    pub fn with_live_cells(dims: GridDims, live: &[(u32, u32)]) -> Result<Self> {
        let mut grid = Self::empty(dims)?;
        for &(x, y) in live {
            grid.set(x, y, true);
        }
        Ok(grid)
    }

    /// Copy that reports allocation failure instead of aborting
    pub fn try_clone(&self) -> Result<Self> {
        let mut cells = reserve_zeroed("cell grid", self.cells.len())?;
        cells.copy_from_slice(&self.cells);
        Ok(Self {
            dims: self.dims,
            cells,
        })
    }

    pub fn dims(&self) -> GridDims {
        self.dims
    }

    pub fn get(&self, x: u32, y: u32) -> bool {
        self.cells[self.dims.index(x, y)] != 0
    }

    pub fn set(&mut self, x: u32, y: u32, alive: bool) {
        let index = self.dims.index(x, y);
        self.cells[index] = alive as u8;
    }

    /// Cell states without the word padding
    pub fn cells(&self) -> &[u8] {
        &self.cells[..self.dims.cell_count()]
    }

    pub fn live_count(&self) -> usize {
        self.cells().iter().filter(|&&c| c != 0).count()
    }

    /// Padded bytes, as mirrored to the device
    pub fn as_bytes(&self) -> &[u8] {
        &self.cells
    }

    pub(crate) fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.cells
    }
}

impl std::fmt::Debug for CellGrid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "CellGrid {}x{}", self.dims.width, self.dims.height)?;
        if self.dims.cell_count() > 4096 {
            return writeln!(f, "  ({} live)", self.live_count());
        }
        for row in self.cells().chunks(self.dims.width as usize) {
            let line: String = row.iter().map(|&c| if c != 0 { '#' } else { '.' }).collect();
            writeln!(f, "  {}", line)?;
        }
        Ok(())
    }
}

/// Rendered RGBA image, one pixel per cell
#[derive(Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    dims: GridDims,
    bytes: Vec<u8>,
}

impl PixelBuffer {
    pub fn filled(dims: GridDims, colour: [u8; 4]) -> Result<Self> {
        let mut bytes = reserve_zeroed("pixel buffer", dims.pixel_bytes())?;
        for pixel in bytes.chunks_exact_mut(4) {
            pixel.copy_from_slice(&colour);
        }
        Ok(Self { dims, bytes })
    }

    pub fn dims(&self) -> GridDims {
        self.dims
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let offset = self.dims.index(x, y) * 4;
        let mut rgba = [0; 4];
        rgba.copy_from_slice(&self.bytes[offset..offset + 4]);
        rgba
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub(crate) fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }
}

impl std::fmt::Debug for PixelBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PixelBuffer")
            .field("dims", &self.dims)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}
