//! # Device Layer
//!
//! The pipeline talks to the compute device only through [`ComputeBackend`]:
//! allocate an initialised buffer, build the kernel program, bind a kernel's
//! arguments once, enqueue it over a 1-D range of workers and read a buffer
//! back synchronously.
//!
//! Release is ownership: dropping a buffer, kernel or program handle frees it,
//! and dropping the backend releases the queue and then the device context.
//!
//! - [`GpuBackend`] runs the WGSL kernel through wgpu.
//! - [`HostBackend`] runs the same contract sequentially on the CPU and keeps a
//!   [`ResourceLedger`] of every acquire/release.

pub mod gpu;
pub mod host;

pub use gpu::{GpuBackend, GpuBuffer, GpuKernel, GpuProgram};
pub use host::{
    HostBackend, HostBuffer, HostKernel, HostProgram, LedgerEvent, ResourceKind, ResourceLedger,
};

use crate::error::Result;

/// What a buffer is used for, which decides its device usage flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferUsage {
    /// Packed cell grid, read and written by kernels, readable by the host
    Cells,
    /// RGBA image written by kernels, readable by the host
    Pixels,
    /// A single `u32` kernel parameter
    Scalar,
}

/// The six arguments every transition kernel is bound to
#[derive(Debug)]
pub struct KernelArgs<'a, Buf> {
    pub source: &'a Buf,
    pub destination: &'a Buf,
    pub pixels: &'a Buf,
    pub worker_count: &'a Buf,
    pub width: &'a Buf,
    pub height: &'a Buf,
}

impl<Buf> Clone for KernelArgs<'_, Buf> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<Buf> Copy for KernelArgs<'_, Buf> {}

/// Minimal device surface the simulation core depends on
pub trait ComputeBackend {
    type Buffer;
    type Program;
    type Kernel;

    /// Human-readable device description for logs
    fn describe(&self) -> String;

    /// Allocates a buffer initialised with `contents`
    fn create_buffer(&self, label: &str, usage: BufferUsage, contents: &[u8])
        -> Result<Self::Buffer>;

    /// Builds the kernel program, surfacing the build log on failure
    fn build_program(&self, source: &str, entry_point: &str) -> Result<Self::Program>;

    /// Binds a kernel's arguments once; the binding never changes afterwards
    fn bind_kernel(
        &self,
        program: &Self::Program,
        label: &str,
        args: KernelArgs<'_, Self::Buffer>,
    ) -> Result<Self::Kernel>;

    /// Launches `kernel` across `worker_count` workers
    fn enqueue(&self, kernel: &Self::Kernel, worker_count: u32) -> Result<()>;

    /// Copies `buffer` into `dst`, blocking until all prior work has completed
    fn read_buffer(&self, buffer: &Self::Buffer, dst: &mut [u8]) -> Result<()>;
}

/// Encodes a scalar kernel argument, padded to 16 bytes for uniform binding
pub(crate) fn scalar_bytes(value: u32) -> Vec<u8> {
    bytemuck::cast_slice(&[value, 0, 0, 0]).to_vec()
}

/// Decodes a scalar produced by [`scalar_bytes`]
pub(crate) fn read_scalar(bytes: &[u8]) -> u32 {
    bytemuck::pod_read_unaligned(&bytes[..4])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_encoding() {
        let bytes = scalar_bytes(2000);
        assert_eq!(bytes.len(), 16);
        assert_eq!(read_scalar(&bytes), 2000);
        assert_eq!(&bytes[4..], &[0; 12]);
    }
}
