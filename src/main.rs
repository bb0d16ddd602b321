use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use clap::ValueEnum;

use gridlife::backend::{ComputeBackend, GpuBackend, HostBackend};
use gridlife::config::{default_seed, LifeConfig};
use gridlife::headless::run_headless;
use gridlife::pump::AdvancePolicy;
use gridlife::{LifeApp, LifeError, LifePipeline};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Backend {
    /// wgpu compute on the best available adapter
    Gpu,
    /// Sequential CPU execution of the same kernel
    Host,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Advance {
    /// One generation per displayed frame
    PerFrame,
    /// One generation per consumed time step
    FixedStep,
}

#[derive(clap::Parser, Debug)]
#[command(name = "gridlife")]
#[command(about = "Conway's Game of Life on a compute device")]
struct Args {
    /// Grid width in cells (and window width in pixels).
    #[clap(long, default_value = "1000")]
    width: u32,

    /// Grid height in cells.
    #[clap(long, default_value = "1000")]
    height: u32,

    /// Parallel workers per dispatch, independent of the grid size.
    #[clap(long, default_value = "2000")]
    workers: u32,

    /// Seed for the initial grid. Defaults to the current time.
    #[clap(long)]
    seed: Option<u64>,

    /// Probability that a cell starts alive.
    #[clap(long, default_value = "0.2")]
    alive_probability: f64,

    /// Simulation time step in microseconds.
    #[clap(long, default_value = "500")]
    step_us: u64,

    /// Upper bound on a single frame's elapsed time, in milliseconds.
    #[clap(long, default_value = "20")]
    max_frame_delta_ms: u64,

    #[clap(long, value_enum, default_value = "per-frame")]
    advance: Advance,

    /// Generation cap per frame for the fixed-step policy.
    #[clap(long, default_value = "8")]
    max_steps_per_frame: u32,

    #[clap(long, value_enum, default_value = "gpu")]
    backend: Backend,

    /// Run without a window.
    #[clap(long)]
    headless: bool,

    /// Generations to run in headless mode.
    #[clap(long, default_value = "1000")]
    generations: u64,

    /// Seconds between frame statistics reports.
    #[clap(long, default_value = "5")]
    stats_interval: u64,
}

impl Args {
    fn to_config(&self) -> LifeConfig {
        let advance = match self.advance {
            Advance::PerFrame => AdvancePolicy::PerFrame,
            Advance::FixedStep => AdvancePolicy::FixedStep {
                max_steps_per_frame: self.max_steps_per_frame,
            },
        };
        LifeConfig {
            width: self.width,
            height: self.height,
            worker_count: self.workers,
            seed: self.seed.unwrap_or_else(default_seed),
            alive_probability: self.alive_probability,
            step_size: Duration::from_micros(self.step_us),
            max_frame_delta: Duration::from_millis(self.max_frame_delta_ms),
            advance,
            stats_interval: Duration::from_secs(self.stats_interval),
            ..LifeConfig::default()
        }
    }
}

fn run<B: ComputeBackend>(backend: B, config: &LifeConfig, args: &Args) -> anyhow::Result<()> {
    let mut pipeline =
        LifePipeline::new(backend, config).context("failed to set up the simulation")?;

    if args.headless {
        let report = run_headless(&mut pipeline, args.generations, config.population_log_interval)
            .context("simulation failed")?;
        log::info!(
            "{} generations in {:.2?} ({:.0} per second)",
            report.generations,
            report.elapsed,
            report.generations_per_second()
        );
        println!(
            "generations: {}, live cells: {} -> {}",
            report.generations, report.initial_live, report.final_live
        );
        pipeline.shutdown();
        return Ok(());
    }

    LifeApp::new(pipeline, config)?
        .run()
        .context("simulation stopped")?;
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = <Args as clap::Parser>::parse();
    log::debug!("gridlife args:\n{:#?}", args);

    let config = args.to_config();
    log::info!(
        "{}x{} grid, {} workers, seed {}, {:?} advance",
        config.width,
        config.height,
        config.worker_count,
        config.seed,
        config.advance
    );

    let result = match args.backend {
        Backend::Gpu => pollster::block_on(GpuBackend::new())
            .context("failed to open a compute device")
            .and_then(|backend| run(backend, &config, &args)),
        Backend::Host => run(HostBackend::new(), &config, &args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", diagnostic(&e));
            ExitCode::FAILURE
        }
    }
}

/// Fatal error text for stderr, independent of the log filter
fn diagnostic(error: &anyhow::Error) -> String {
    let mut text = format!("error: {:#}", error);
    if let Some(build_log) = error
        .downcast_ref::<LifeError>()
        .and_then(LifeError::build_log)
    {
        text.push_str("\nkernel build log:\n");
        text.push_str(build_log);
    }
    text
}
