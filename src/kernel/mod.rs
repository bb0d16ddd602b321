//! Transition kernel
//!
//! The WGSL source runs on the GPU backend. [`run_worker`] is the host
//! rendition of the same contract, executed by the host backend: identical
//! rule, identical word ownership, identical colours.
//!
//! ## Contract
//!
//! Arguments are `(source, destination, pixels, worker_count, width, height)`.
//! Worker `w` owns destination words `w, w + worker_count, w + 2 * worker_count, ...`
//! (four cells per word) and writes each of its cells and the matching pixel
//! exactly once, so the grid is covered for any `worker_count >= 1`.

use crate::grid::{ALIVE_COLOUR, BACKGROUND_COLOUR};

/// WGSL source of the transition kernel
pub const KERNEL_SOURCE: &str = include_str!("conway.wgsl");

/// Entry point inside [`KERNEL_SOURCE`]
pub const ENTRY_POINT: &str = "conway";

/// Must match `@workgroup_size` in the shader
pub const WORKGROUP_SIZE: u32 = 64;

/// Words of the destination grid owned by `worker`
pub fn words_for_worker(
    worker: usize,
    worker_count: usize,
    word_count: usize,
) -> impl Iterator<Item = usize> {
    (worker..word_count).step_by(worker_count.max(1))
}

/// B3/S23
pub fn next_state(alive: bool, neighbours: u32) -> bool {
    matches!((alive, neighbours), (true, 2) | (true, 3) | (false, 3))
}

fn live_neighbours(source: &[u8], width: u32, height: u32, x: u32, y: u32) -> u32 {
    let (width, height) = (width as i64, height as i64);
    let mut count = 0;
    for dy in -1i64..=1 {
        for dx in -1i64..=1 {
            if dx == 0 && dy == 0 {
                continue;
            }
            let nx = (x as i64 + dx).rem_euclid(width);
            let ny = (y as i64 + dy).rem_euclid(height);
            if source[(ny * width + nx) as usize] != 0 {
                count += 1;
            }
        }
    }
    count
}

/// Runs one worker of the transition over byte-per-cell buffers
///
/// `source` and `destination` are padded cell buffers, `pixels` holds four
/// bytes per cell.
pub fn run_worker(
    worker: u32,
    worker_count: u32,
    width: u32,
    height: u32,
    source: &[u8],
    destination: &mut [u8],
    pixels: &mut [u8],
) {
    let cell_count = width as usize * height as usize;
    let word_count = cell_count.div_ceil(4);

    for word in words_for_worker(worker as usize, worker_count as usize, word_count) {
        for lane in 0..4 {
            let index = word * 4 + lane;
            if index >= cell_count {
                destination[index] = 0;
                continue;
            }

            let x = (index % width as usize) as u32;
            let y = (index / width as usize) as u32;
            let alive = source[index] != 0;
            let next = next_state(alive, live_neighbours(source, width, height, x, y));

            destination[index] = next as u8;
            let colour = if next { ALIVE_COLOUR } else { BACKGROUND_COLOUR };
            pixels[index * 4..index * 4 + 4].copy_from_slice(&colour);
        }
    }
}
