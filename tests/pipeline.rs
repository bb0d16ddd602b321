use std::collections::HashSet;

use gridlife::backend::HostBackend;
use gridlife::dispatch::Role;
use gridlife::grid::{CellGrid, GridDims, ALIVE_COLOUR, BACKGROUND_COLOUR};
use gridlife::kernel::run_worker;
use gridlife::{LifeConfig, LifePipeline};

fn host_pipeline(config: &LifeConfig, grid: CellGrid) -> LifePipeline<HostBackend> {
    LifePipeline::with_grid(HostBackend::new(), config, grid).unwrap()
}

/// Plain B3/S23 on a torus, one cell at a time
fn reference_step(grid: &CellGrid) -> CellGrid {
    let dims = grid.dims();
    let (w, h) = (dims.width as i64, dims.height as i64);
    let mut next = CellGrid::empty(dims).unwrap();
    for y in 0..h {
        for x in 0..w {
            let mut n = 0;
            for dy in [-1, 0, 1] {
                for dx in [-1, 0, 1] {
                    if (dx, dy) != (0, 0)
                        && grid.get((x + dx).rem_euclid(w) as u32, (y + dy).rem_euclid(h) as u32)
                    {
                        n += 1;
                    }
                }
            }
            let alive = grid.get(x as u32, y as u32);
            next.set(x as u32, y as u32, n == 3 || (alive && n == 2));
        }
    }
    next
}

#[test]
fn blinker_turns_vertical_in_one_generation() {
    let dims = GridDims::new(4, 4).unwrap();
    let horizontal = CellGrid::with_live_cells(dims, &[(0, 2), (1, 2), (2, 2)]).unwrap();
    let vertical = CellGrid::with_live_cells(dims, &[(1, 1), (1, 2), (1, 3)]).unwrap();
    let config = LifeConfig::default().with_workers(3);
    let mut pipeline = host_pipeline(&config, horizontal.clone());

    let pixels = pipeline.step().unwrap().clone();
    assert_eq!(pipeline.current_cells().unwrap(), &vertical);
    for y in 0..4 {
        for x in 0..4 {
            let expected = if vertical.get(x, y) {
                ALIVE_COLOUR
            } else {
                BACKGROUND_COLOUR
            };
            assert_eq!(pixels.pixel(x, y), expected, "pixel ({}, {})", x, y);
        }
    }

    pipeline.step().unwrap();
    assert_eq!(pipeline.current_cells().unwrap(), &horizontal);
}

#[test]
fn seven_workers_cover_a_hundred_cells_exactly_once() {
    let dims = GridDims::new(10, 10).unwrap();
    let source = CellGrid::seeded(dims, 11, 0.4).unwrap();
    const SENTINEL: u8 = 0xAA;

    let mut owners = vec![None; dims.cell_count()];
    for worker in 0..7 {
        let mut destination = vec![SENTINEL; dims.cell_bytes()];
        let mut pixels = vec![SENTINEL; dims.pixel_bytes()];
        run_worker(
            worker,
            7,
            dims.width,
            dims.height,
            source.as_bytes(),
            &mut destination,
            &mut pixels,
        );
        for cell in 0..dims.cell_count() {
            let cell_written = destination[cell] != SENTINEL;
            let pixel_written = pixels[cell * 4..cell * 4 + 4].iter().all(|b| *b != SENTINEL);
            assert_eq!(cell_written, pixel_written, "cell {}", cell);
            if cell_written {
                assert_eq!(owners[cell], None, "cell {} written twice", cell);
                owners[cell] = Some(worker);
            }
        }
    }
    assert!(owners.iter().all(Option::is_some), "unwritten cells: {:?}", owners);
}

#[test]
fn every_pixel_matches_its_cell() {
    let dims = GridDims::new(10, 10).unwrap();
    let config = LifeConfig::default().with_workers(7);
    let mut pipeline = host_pipeline(&config, CellGrid::seeded(dims, 5, 0.5).unwrap());

    for _ in 0..3 {
        let pixels = pipeline.step().unwrap().clone();
        let cells = pipeline.current_cells().unwrap();
        for y in 0..10 {
            for x in 0..10 {
                let expected = if cells.get(x, y) {
                    ALIVE_COLOUR
                } else {
                    BACKGROUND_COLOUR
                };
                assert_eq!(pixels.pixel(x, y), expected);
            }
        }
    }
}

#[test]
fn matches_reference_for_many_generations() {
    let dims = GridDims::new(23, 17).unwrap();
    let mut expected = CellGrid::seeded(dims, 2024, 0.3).unwrap();
    let config = LifeConfig::default().with_workers(5);
    let mut pipeline = host_pipeline(&config, expected.clone());

    for generation in 1..=20 {
        pipeline.step().unwrap();
        expected = reference_step(&expected);
        assert_eq!(
            pipeline.current_cells().unwrap(),
            &expected,
            "generation {}",
            generation
        );
    }
}

#[test]
fn worker_count_does_not_change_the_result() {
    let dims = GridDims::new(31, 9).unwrap();
    let start = CellGrid::seeded(dims, 77, 0.35).unwrap();

    let mut results = HashSet::new();
    for workers in [1, 2, 7, 64, 500] {
        let config = LifeConfig::default().with_workers(workers);
        let mut pipeline = host_pipeline(&config, start.clone());
        for _ in 0..8 {
            pipeline.step().unwrap();
        }
        results.insert(pipeline.current_cells().unwrap().cells().to_vec());
    }
    assert_eq!(results.len(), 1);
}

#[test]
fn same_seed_same_run() {
    let config = LifeConfig::default()
        .with_size(40, 30)
        .with_workers(13)
        .with_seed(123_456);
    let mut first = LifePipeline::new(HostBackend::new(), &config).unwrap();
    let mut second = LifePipeline::new(HostBackend::new(), &config).unwrap();
    assert_eq!(first.current_cells().unwrap(), second.current_cells().unwrap());

    for _ in 0..10 {
        let a = first.step().unwrap().clone();
        let b = second.step().unwrap();
        assert_eq!(&a, b);
    }
}

#[test]
fn roles_alternate_across_the_run() {
    let config = LifeConfig::default().with_size(12, 12).with_workers(4).with_seed(3);
    let mut pipeline = LifePipeline::new(HostBackend::new(), &config).unwrap();

    for generation in 0..9 {
        assert_eq!(pipeline.generation(), generation);
        assert_eq!(pipeline.role(), Role::for_generation(generation));
        let before = pipeline.role();
        pipeline.step().unwrap();
        assert_ne!(pipeline.role(), before);
    }
    assert_eq!(pipeline.backend().dispatch_count(), 9);
}

#[test]
fn stalled_frame_still_advances_one_generation() {
    use gridlife::pump::{AdvancePolicy, FramePump, ManualClock};
    use std::time::Duration;

    let config = LifeConfig::default().with_size(16, 16).with_workers(6).with_seed(9);
    let mut pipeline = LifePipeline::new(HostBackend::new(), &config).unwrap();
    let clock = ManualClock::new();
    let mut pump = FramePump::new(
        &clock,
        config.step_size,
        config.max_frame_delta,
        AdvancePolicy::PerFrame,
    );

    for stall in [Duration::from_secs(10), Duration::from_micros(10), Duration::from_millis(16)] {
        clock.advance(stall);
        let tick = pump.tick();
        assert_eq!(tick.generations, 1);
        assert!(tick.elapsed <= config.max_frame_delta);
        for _ in 0..tick.generations {
            pipeline.step().unwrap();
        }
    }
    assert_eq!(pipeline.generation(), 3);
}
