use std::sync::Arc;
use std::time::Duration;

use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::{ElementState, KeyEvent, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowAttributes, WindowId},
};

use crate::backend::ComputeBackend;
use crate::config::LifeConfig;
use crate::error::{LifeError, Result};
use crate::lifecycle::LifePipeline;
use crate::performance::FrameStats;
use crate::pump::{Clock, FramePump, MonotonicClock};
use crate::render::Presenter;

/// Windowed run: one frame pump tick, the resulting generations and one
/// present per redraw, until Escape or the close button
pub struct LifeApp<B: ComputeBackend> {
    event_loop: EventLoop<()>,
    app_state: AppState<B>,
}

struct AppState<B: ComputeBackend> {
    presenter: Option<Presenter>,
    window: Option<Arc<Window>>,
    pipeline: Option<LifePipeline<B>>,
    pump: FramePump<MonotonicClock>,
    stats: FrameStats,
    last_frame: Duration,
    population_log_interval: u64,
    next_population_log: u64,
    error: Option<LifeError>,
}

impl<B: ComputeBackend> LifeApp<B> {
    pub fn new(pipeline: LifePipeline<B>, config: &LifeConfig) -> Result<Self> {
        let event_loop = EventLoop::new().map_err(|e| LifeError::Window(e.to_string()))?;
        let pump = FramePump::new(
            MonotonicClock::new(),
            config.step_size,
            config.max_frame_delta,
            config.advance,
        );

        Ok(Self {
            event_loop,
            app_state: AppState {
                presenter: None,
                window: None,
                pipeline: Some(pipeline),
                pump,
                stats: FrameStats::new(config.stats_interval),
                last_frame: Duration::ZERO,
                population_log_interval: config.population_log_interval,
                next_population_log: config.population_log_interval,
                error: None,
            },
        })
    }

    /// Runs the event loop to completion, then tears the pipeline down.
    ///
    /// Returns the first fatal error raised while running, if any.
    pub fn run(mut self) -> Result<()> {
        self.event_loop.set_control_flow(ControlFlow::Poll);
        let outcome = self
            .event_loop
            .run_app(&mut self.app_state)
            .map_err(|e| LifeError::Window(e.to_string()));

        let state = &mut self.app_state;
        if let Some(pipeline) = state.pipeline.take() {
            log::info!("Stopped after {} generations", pipeline.generation());
            pipeline.shutdown();
        }
        state.presenter = None;

        match state.error.take() {
            Some(e) => Err(e),
            None => outcome,
        }
    }
}

impl<B: ComputeBackend> AppState<B> {
    fn fail(&mut self, event_loop: &ActiveEventLoop, error: LifeError) {
        log::error!("{}", error);
        if self.error.is_none() {
            self.error = Some(error);
        }
        event_loop.exit();
    }

    fn create_window(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let Some(pipeline) = self.pipeline.as_ref() else {
            return Ok(());
        };
        let dims = pipeline.dims();

        let window = event_loop
            .create_window(
                WindowAttributes::default()
                    .with_title("Game of Life")
                    .with_inner_size(PhysicalSize::new(dims.width, dims.height)),
            )
            .map_err(|e| LifeError::Window(e.to_string()))?;
        let window = Arc::new(window);

        let presenter = pollster::block_on(Presenter::new(window.clone(), dims))?;
        self.presenter = Some(presenter);
        self.window = Some(window);
        self.last_frame = self.pump.clock().now();
        Ok(())
    }

    fn redraw(&mut self) -> Result<()> {
        let (Some(pipeline), Some(presenter)) = (self.pipeline.as_mut(), self.presenter.as_mut())
        else {
            return Ok(());
        };

        let tick = self.pump.tick();
        for _ in 0..tick.generations {
            pipeline.step()?;
        }
        presenter.present(pipeline.pixels())?;

        if self.population_log_interval > 0 && pipeline.generation() >= self.next_population_log {
            let generation = pipeline.generation();
            let live = pipeline.current_cells()?.live_count();
            log::info!("Generation {}: {} live cells", generation, live);
            self.next_population_log = generation + self.population_log_interval;
        }

        let now = self.pump.clock().now();
        self.stats.record_frame(now.saturating_sub(self.last_frame));
        self.last_frame = now;
        Ok(())
    }
}

impl<B: ComputeBackend> ApplicationHandler for AppState<B> {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(e) = self.create_window(event_loop) {
            self.fail(event_loop, e);
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(KeyCode::Escape),
                        state: ElementState::Pressed,
                        ..
                    },
                ..
            } => {
                event_loop.exit();
            }
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::Resized(PhysicalSize { width, height }) => {
                if let Some(presenter) = self.presenter.as_mut() {
                    presenter.resize(width, height);
                }
            }
            WindowEvent::RedrawRequested => {
                if event_loop.exiting() {
                    return;
                }
                if let Err(e) = self.redraw() {
                    self.fail(event_loop, e);
                }
            }
            _ => (),
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(ref window) = self.window {
            window.request_redraw();
        }
    }
}
