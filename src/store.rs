//! # Grid State Store
//!
//! Owns the two cell grids (A/front and B/back), the pixel buffer, and once
//! [`GridStore::mirror_to_device`] has run, their device mirrors plus the
//! three scalar kernel arguments.
//!
//! ## Lifecycle
//!
//! 1. [`GridStore::initialize`] seeds grid A and copies it into grid B.
//! 2. [`GridStore::mirror_to_device`] allocates every device buffer from the
//!    host contents. It runs exactly once.
//! 3. [`GridStore::read_back_pixels`] fetches the image after each generation.

use crate::backend::{scalar_bytes, BufferUsage, ComputeBackend};
use crate::error::{LifeError, Result};
use crate::grid::{CellGrid, GridDims, PixelBuffer, BACKGROUND_COLOUR};

/// Which of the two permanently allocated cell buffers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridSide {
    A,
    B,
}

/// Device mirrors of the store, bound into both kernels
#[derive(Debug)]
pub struct DeviceGrids<Buf> {
    pub grid_a: Buf,
    pub grid_b: Buf,
    pub pixels: Buf,
    pub worker_count: Buf,
    pub width: Buf,
    pub height: Buf,
}

impl<Buf> DeviceGrids<Buf> {
    pub fn side(&self, side: GridSide) -> &Buf {
        match side {
            GridSide::A => &self.grid_a,
            GridSide::B => &self.grid_b,
        }
    }
}

#[derive(Debug)]
pub struct GridStore<Buf> {
    // Device buffers go first so they are released before the host copies.
    device: Option<DeviceGrids<Buf>>,
    grid_a: CellGrid,
    grid_b: CellGrid,
    pixels: PixelBuffer,
}

impl<Buf> GridStore<Buf> {
    /// Seeds a random grid and duplicates it so both buffers start identical
    pub fn initialize(width: u32, height: u32, seed: u64, alive_probability: f64) -> Result<Self> {
        let dims = GridDims::new(width, height)?;
        Self::from_grid(CellGrid::seeded(dims, seed, alive_probability)?)
    }

    /// Starts from a given grid instead of a random one
    pub fn from_grid(grid: CellGrid) -> Result<Self> {
        let grid_b = grid.try_clone()?;
        let pixels = PixelBuffer::filled(grid.dims(), BACKGROUND_COLOUR)?;
        Ok(Self {
            device: None,
            grid_a: grid,
            grid_b,
            pixels,
        })
    }

    pub fn dims(&self) -> GridDims {
        self.grid_a.dims()
    }

    pub fn is_mirrored(&self) -> bool {
        self.device.is_some()
    }

    pub fn device_grids(&self) -> Result<&DeviceGrids<Buf>> {
        self.device
            .as_ref()
            .ok_or(LifeError::InvalidState("grids have not been mirrored to the device"))
    }

    /// Host copy of a grid as of its last upload or read-back
    pub fn grid(&self, side: GridSide) -> &CellGrid {
        match side {
            GridSide::A => &self.grid_a,
            GridSide::B => &self.grid_b,
        }
    }

    /// Last image read back from the device
    pub fn pixels(&self) -> &PixelBuffer {
        &self.pixels
    }

    /// Allocates the device buffers, initialised from the host copies
    pub fn mirror_to_device<B>(&mut self, backend: &B, worker_count: u32) -> Result<()>
    where
        B: ComputeBackend<Buffer = Buf>,
    {
        if self.device.is_some() {
            return Err(LifeError::InvalidState("grids are already mirrored to the device"));
        }

        let dims = self.dims();
        let device = DeviceGrids {
            grid_a: backend.create_buffer("cells A", BufferUsage::Cells, self.grid_a.as_bytes())?,
            grid_b: backend.create_buffer("cells B", BufferUsage::Cells, self.grid_b.as_bytes())?,
            pixels: backend.create_buffer("pixels", BufferUsage::Pixels, self.pixels.as_bytes())?,
            worker_count: backend.create_buffer(
                "worker count",
                BufferUsage::Scalar,
                &scalar_bytes(worker_count),
            )?,
            width: backend.create_buffer("grid width", BufferUsage::Scalar, &scalar_bytes(dims.width))?,
            height: backend.create_buffer(
                "grid height",
                BufferUsage::Scalar,
                &scalar_bytes(dims.height),
            )?,
        };

        log::info!(
            "Mirrored {}x{} grid to {} ({} bytes per grid, {} bytes of pixels)",
            dims.width,
            dims.height,
            backend.describe(),
            dims.cell_bytes(),
            dims.pixel_bytes()
        );
        self.device = Some(device);
        Ok(())
    }

    /// Downloads the pixel buffer, blocking until the producing dispatch is done
    pub fn read_back_pixels<B>(&mut self, backend: &B) -> Result<&PixelBuffer>
    where
        B: ComputeBackend<Buffer = Buf>,
    {
        let device = self
            .device
            .as_ref()
            .ok_or(LifeError::InvalidState("pixels read back before mirroring"))?;
        backend.read_buffer(&device.pixels, self.pixels.as_bytes_mut())?;
        Ok(&self.pixels)
    }

    /// Downloads one cell grid into its host copy
    pub fn read_back_cells<B>(&mut self, backend: &B, side: GridSide) -> Result<&CellGrid>
    where
        B: ComputeBackend<Buffer = Buf>,
    {
        let device = self
            .device
            .as_ref()
            .ok_or(LifeError::InvalidState("cells read back before mirroring"))?;
        let (buffer, grid) = match side {
            GridSide::A => (&device.grid_a, &mut self.grid_a),
            GridSide::B => (&device.grid_b, &mut self.grid_b),
        };
        backend.read_buffer(buffer, grid.as_bytes_mut())?;
        Ok(grid)
    }
}
