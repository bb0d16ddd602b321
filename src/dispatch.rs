//! Kernel dispatch pair
//!
//! Two invocations of the same program, bound once at setup. Forward reads
//! grid A and writes grid B, reverse reads B and writes A; both write the
//! shared pixel buffer. Swapping roles means picking the other invocation,
//! never rebinding arguments.
//!
//! Each invocation is bound on its own with [`bind_invocation`] so the caller
//! decides where the first one lives if binding the second fails.

use crate::backend::{ComputeBackend, KernelArgs};
use crate::error::Result;
use crate::store::{DeviceGrids, GridSide};

/// Which precompiled invocation is active for a generation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Forward,
    Reverse,
}

impl Role {
    pub fn flipped(self) -> Self {
        match self {
            Role::Forward => Role::Reverse,
            Role::Reverse => Role::Forward,
        }
    }

    /// Role that runs generation `generation` (counting from 0)
    pub fn for_generation(generation: u64) -> Self {
        if generation % 2 == 0 {
            Role::Forward
        } else {
            Role::Reverse
        }
    }

    pub fn source(self) -> GridSide {
        match self {
            Role::Forward => GridSide::A,
            Role::Reverse => GridSide::B,
        }
    }

    pub fn destination(self) -> GridSide {
        match self {
            Role::Forward => GridSide::B,
            Role::Reverse => GridSide::A,
        }
    }
}

/// Binds the invocation for `role`: its source and destination grids, the
/// shared pixel buffer and the three scalars
pub fn bind_invocation<B: ComputeBackend>(
    backend: &B,
    program: &B::Program,
    grids: &DeviceGrids<B::Buffer>,
    role: Role,
) -> Result<B::Kernel> {
    let label = match role {
        Role::Forward => "conway forward (A -> B)",
        Role::Reverse => "conway reverse (B -> A)",
    };
    backend.bind_kernel(
        program,
        label,
        KernelArgs {
            source: grids.side(role.source()),
            destination: grids.side(role.destination()),
            pixels: &grids.pixels,
            worker_count: &grids.worker_count,
            width: &grids.width,
            height: &grids.height,
        },
    )
}

#[derive(Debug)]
pub struct KernelPair<K> {
    forward: K,
    reverse: K,
}

impl<K> KernelPair<K> {
    pub fn new(forward: K, reverse: K) -> Self {
        Self { forward, reverse }
    }

    pub fn get(&self, role: Role) -> &K {
        match role {
            Role::Forward => &self.forward,
            Role::Reverse => &self.reverse,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roles_swap_buffers() {
        assert_eq!(Role::Forward.source(), GridSide::A);
        assert_eq!(Role::Forward.destination(), GridSide::B);
        assert_eq!(Role::Reverse.source(), GridSide::B);
        assert_eq!(Role::Reverse.destination(), GridSide::A);
        assert_eq!(Role::Forward.flipped(), Role::Reverse);
        assert_eq!(Role::Reverse.flipped().flipped(), Role::Reverse);
    }

    #[test]
    fn test_role_parity() {
        for generation in 0..10u64 {
            assert_ne!(
                Role::for_generation(generation),
                Role::for_generation(generation + 1)
            );
        }
        assert_eq!(Role::for_generation(0), Role::Forward);
    }
}
