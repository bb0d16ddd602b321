//! # Resource Lifecycle
//!
//! [`LifePipeline`] owns every device resource of a run. Teardown is driven by
//! `Drop` and follows field order: data buffers, kernel handles, the compiled
//! program, then the backend (which releases its queue before its context).
//! The same order holds on normal exit, window close, fatal device error and
//! any early return, including a failure half-way through construction.

use crate::backend::ComputeBackend;
use crate::config::LifeConfig;
use crate::dispatch::{bind_invocation, KernelPair, Role};
use crate::error::Result;
use crate::grid::{CellGrid, GridDims, PixelBuffer};
use crate::kernel::{ENTRY_POINT, KERNEL_SOURCE};
use crate::scheduler::GenerationScheduler;
use crate::store::GridStore;

pub struct LifePipeline<B: ComputeBackend> {
    scheduler: GenerationScheduler,
    // Release order.
    store: GridStore<B::Buffer>,
    kernels: KernelPair<B::Kernel>,
    _program: B::Program,
    backend: B,
}

impl<B: ComputeBackend> LifePipeline<B> {
    /// Seeds a random grid from `config` and brings the device up
    pub fn new(backend: B, config: &LifeConfig) -> Result<Self> {
        config.validate()?;
        let grid = CellGrid::seeded(config.dims()?, config.seed, config.alive_probability)?;
        Self::assemble(backend, grid, config.worker_count, KERNEL_SOURCE)
    }

    /// Starts from an explicit grid; seed and probability in `config` are ignored
    pub fn with_grid(backend: B, config: &LifeConfig, grid: CellGrid) -> Result<Self> {
        config.validate()?;
        Self::assemble(backend, grid, config.worker_count, KERNEL_SOURCE)
    }

    /// Like [`LifePipeline::new`] with a replacement kernel source
    pub fn with_kernel_source(backend: B, config: &LifeConfig, source: &str) -> Result<Self> {
        config.validate()?;
        let grid = CellGrid::seeded(config.dims()?, config.seed, config.alive_probability)?;
        Self::assemble(backend, grid, config.worker_count, source)
    }

    // Locals are declared so that an early return drops them in teardown
    // order too: store, then the forward kernel, then the program, all
    // before the backend argument.
    fn assemble(backend: B, grid: CellGrid, worker_count: u32, source: &str) -> Result<Self> {
        log::info!("Building kernel `{}` on {}", ENTRY_POINT, backend.describe());
        let program = backend.build_program(source, ENTRY_POINT)?;
        log::info!("Kernel built");

        let forward;
        let mut store = GridStore::from_grid(grid)?;
        store.mirror_to_device(&backend, worker_count)?;
        forward = bind_invocation(&backend, &program, store.device_grids()?, Role::Forward)?;
        let reverse = bind_invocation(&backend, &program, store.device_grids()?, Role::Reverse)?;
        let kernels = KernelPair::new(forward, reverse);

        log::info!(
            "Pipeline ready: {}x{} cells, {} workers, {} live",
            store.dims().width,
            store.dims().height,
            worker_count,
            store.grid(Role::Forward.source()).live_count()
        );

        Ok(Self {
            scheduler: GenerationScheduler::new(worker_count),
            store,
            kernels,
            _program: program,
            backend,
        })
    }

    /// Advances one generation and refreshes the host pixel buffer
    pub fn step(&mut self) -> Result<&PixelBuffer> {
        self.scheduler
            .step(&self.backend, &self.kernels, &mut self.store)?;
        Ok(self.store.pixels())
    }

    pub fn generation(&self) -> u64 {
        self.scheduler.generation()
    }

    /// Invocation the next step will launch
    pub fn role(&self) -> Role {
        self.scheduler.role()
    }

    pub fn dims(&self) -> GridDims {
        self.store.dims()
    }

    pub fn worker_count(&self) -> u32 {
        self.scheduler.worker_count()
    }

    /// Image produced by the most recent generation
    pub fn pixels(&self) -> &PixelBuffer {
        self.store.pixels()
    }

    /// Reads the most recent generation's cells back from the device
    pub fn current_cells(&mut self) -> Result<&CellGrid> {
        // The next step reads from whichever grid was written last.
        let side = self.scheduler.role().source();
        self.store.read_back_cells(&self.backend, side)
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Tears everything down now instead of at end of scope
    pub fn shutdown(self) {
        drop(self);
    }
}

impl<B: ComputeBackend> Drop for LifePipeline<B> {
    fn drop(&mut self) {
        log::debug!(
            "Releasing {} after {} generations: buffers, kernels, program, queue, context",
            self.backend.describe(),
            self.scheduler.generation()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{HostBackend, ResourceKind};
    use crate::error::LifeError;

    const TEARDOWN: [ResourceKind; 5] = [
        ResourceKind::Buffer,
        ResourceKind::Kernel,
        ResourceKind::Program,
        ResourceKind::Queue,
        ResourceKind::Context,
    ];

    fn small_config() -> LifeConfig {
        LifeConfig::default()
            .with_size(16, 12)
            .with_workers(9)
            .with_seed(7)
    }

    fn assert_all_released_once(ledger: &crate::backend::ResourceLedger) {
        for kind in TEARDOWN {
            assert_eq!(ledger.acquired(kind), ledger.released(kind), "{:?}", kind);
        }
        let mut released: Vec<u64> = ledger
            .events()
            .iter()
            .filter_map(|e| match e {
                crate::backend::LedgerEvent::Released(_, id) => Some(*id),
                _ => None,
            })
            .collect();
        let total = released.len();
        released.sort_unstable();
        released.dedup();
        assert_eq!(released.len(), total, "a handle was released twice");
        assert_eq!(ledger.outstanding(), 0);
    }

    #[test]
    fn test_teardown_order_after_normal_run() {
        let backend = HostBackend::new();
        let ledger = backend.ledger();
        let mut pipeline = LifePipeline::new(backend, &small_config()).unwrap();
        for _ in 0..5 {
            pipeline.step().unwrap();
        }
        assert_eq!(ledger.acquired(ResourceKind::Buffer), 6);
        assert_eq!(ledger.acquired(ResourceKind::Kernel), 2);
        assert_eq!(ledger.released(ResourceKind::Buffer), 0);

        pipeline.shutdown();
        assert_all_released_once(&ledger);
        assert_eq!(ledger.release_order(), TEARDOWN.to_vec());
    }

    #[test]
    fn test_teardown_after_dispatch_failure() {
        let backend = HostBackend::new();
        backend.fail_dispatch_after(2);
        let ledger = backend.ledger();
        let mut pipeline = LifePipeline::new(backend, &small_config()).unwrap();

        pipeline.step().unwrap();
        pipeline.step().unwrap();
        let err = pipeline.step().map(|_| ()).unwrap_err();
        assert!(matches!(err, LifeError::Dispatch(_)));
        assert_eq!(pipeline.generation(), 2);

        drop(pipeline);
        assert_all_released_once(&ledger);
        assert_eq!(ledger.release_order(), TEARDOWN.to_vec());
    }

    #[test]
    fn test_teardown_after_second_binding_fails() {
        let backend = HostBackend::new();
        backend.fail_bind_after(1);
        let ledger = backend.ledger();

        let result = LifePipeline::new(backend, &small_config());
        assert!(matches!(result, Err(LifeError::Dispatch(_))));
        assert_eq!(ledger.acquired(ResourceKind::Kernel), 1);
        assert_all_released_once(&ledger);
        assert_eq!(ledger.release_order(), TEARDOWN.to_vec());
    }

    #[test]
    fn test_teardown_after_compile_failure() {
        let backend = HostBackend::new();
        let ledger = backend.ledger();
        let result = LifePipeline::with_kernel_source(backend, &small_config(), "fn nothing() {}");

        let err = result.err().unwrap();
        assert!(err.build_log().is_some());
        assert_all_released_once(&ledger);
        assert_eq!(ledger.acquired(ResourceKind::Buffer), 0);
        assert_eq!(
            ledger.release_order(),
            vec![ResourceKind::Queue, ResourceKind::Context]
        );
    }

    #[test]
    fn test_invalid_config_releases_backend() {
        let backend = HostBackend::new();
        let ledger = backend.ledger();
        let config = small_config().with_workers(0);
        assert!(matches!(
            LifePipeline::new(backend, &config),
            Err(LifeError::InvalidConfig(_))
        ));
        assert_all_released_once(&ledger);
    }

    #[test]
    fn test_current_cells_follow_latest_generation() {
        let dims = GridDims::new(5, 5).unwrap();
        let blinker = CellGrid::with_live_cells(dims, &[(1, 2), (2, 2), (3, 2)]).unwrap();
        let mut pipeline =
            LifePipeline::with_grid(HostBackend::new(), &small_config(), blinker.clone()).unwrap();

        assert_eq!(pipeline.current_cells().unwrap(), &blinker);
        pipeline.step().unwrap();
        assert!(pipeline.current_cells().unwrap().get(2, 1));
        assert!(!pipeline.current_cells().unwrap().get(1, 2));
        pipeline.step().unwrap();
        assert_eq!(pipeline.current_cells().unwrap(), &blinker);
    }
}
