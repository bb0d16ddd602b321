use gridlife::backend::{GpuBackend, HostBackend};
use gridlife::grid::{CellGrid, GridDims};
use gridlife::{LifeConfig, LifeError, LifePipeline};

/// Opens a wgpu device, or `None` on machines without any adapter
fn gpu() -> Option<GpuBackend> {
    match pollster::block_on(GpuBackend::new()) {
        Ok(backend) => Some(backend),
        Err(LifeError::PlatformUnavailable(reason)) => {
            eprintln!("skipping: no compute adapter ({})", reason);
            None
        }
        Err(e) => panic!("opening the compute device failed: {}", e),
    }
}

fn assert_backends_agree(width: u32, height: u32, workers: u32, seed: u64, generations: u64) {
    let Some(backend) = gpu() else {
        return;
    };
    let dims = GridDims::new(width, height).unwrap();
    let start = CellGrid::seeded(dims, seed, 0.4).unwrap();
    let config = LifeConfig::default().with_workers(workers);

    let mut device = LifePipeline::with_grid(backend, &config, start.clone()).unwrap();
    let mut host = LifePipeline::with_grid(HostBackend::new(), &config, start).unwrap();

    for generation in 1..=generations {
        let device_pixels = device.step().unwrap().clone();
        let host_pixels = host.step().unwrap();
        assert_eq!(
            &device_pixels, host_pixels,
            "{}x{}/{} pixels differ at generation {}",
            width, height, workers, generation
        );
        assert_eq!(
            device.current_cells().unwrap(),
            host.current_cells().unwrap(),
            "{}x{}/{} cells differ at generation {}",
            width,
            height,
            workers,
            generation
        );
    }
}

#[test]
fn gpu_matches_host_on_odd_grid() {
    assert_backends_agree(37, 23, 7, 5, 20);
}

#[test]
fn gpu_matches_host_on_single_column() {
    assert_backends_agree(1, 5, 3, 11, 20);
}

#[test]
fn gpu_matches_host_on_single_row() {
    assert_backends_agree(100, 1, 1, 3, 20);
}

#[test]
fn gpu_matches_host_with_more_workers_than_cells() {
    assert_backends_agree(3, 3, 100, 8, 20);
}

#[test]
fn gpu_blinker_wraps_across_edges() {
    let Some(backend) = gpu() else {
        return;
    };
    // Horizontal blinker through column 0 and the last column.
    let dims = GridDims::new(5, 5).unwrap();
    let start = CellGrid::with_live_cells(dims, &[(4, 0), (0, 0), (1, 0)]).unwrap();
    let expected = CellGrid::with_live_cells(dims, &[(0, 4), (0, 0), (0, 1)]).unwrap();
    let config = LifeConfig::default().with_workers(2);

    let mut pipeline = LifePipeline::with_grid(backend, &config, start).unwrap();
    pipeline.step().unwrap();
    assert_eq!(pipeline.current_cells().unwrap(), &expected);
}
