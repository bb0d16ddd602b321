//! Generation scheduler
//!
//! Strict Forward/Reverse alternation with one dispatch in flight. The
//! blocking pixel read-back after each launch is what keeps generation N
//! complete before N+1 is issued.

use crate::backend::ComputeBackend;
use crate::dispatch::{KernelPair, Role};
use crate::error::Result;
use crate::store::GridStore;

#[derive(Debug, Clone)]
pub struct GenerationScheduler {
    role: Role,
    generation: u64,
    worker_count: u32,
}

impl GenerationScheduler {
    pub fn new(worker_count: u32) -> Self {
        Self {
            role: Role::Forward,
            generation: 0,
            worker_count,
        }
    }

    /// Invocation the next step will launch
    pub fn role(&self) -> Role {
        self.role
    }

    /// Completed generations
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn worker_count(&self) -> u32 {
        self.worker_count
    }

    /// Advances one generation: launch, wait on the pixel read-back, flip.
    ///
    /// On error the role and generation are left untouched.
    pub fn step<B: ComputeBackend>(
        &mut self,
        backend: &B,
        kernels: &KernelPair<B::Kernel>,
        store: &mut GridStore<B::Buffer>,
    ) -> Result<()> {
        log::trace!(
            "generation {}: launching {:?} over {} workers",
            self.generation,
            self.role,
            self.worker_count
        );
        backend.enqueue(kernels.get(self.role), self.worker_count)?;
        store.read_back_pixels(backend)?;

        self.role = self.role.flipped();
        self.generation += 1;
        Ok(())
    }
}
