use std::env;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use pixels::Error as PixelsError;
use thiserror::Error;
use tracing::{info, warn};
use winit::dpi::LogicalSize;
use winit::error::{EventLoopError, OsError};
use winit::event::{Event, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop, EventLoopWindowTarget};
use winit::window::{Window, WindowBuilder};

use super::input::InputCollector;
use super::metrics::MetricsAccumulator;
use super::{MetricsHandle, Renderer, Scene, SceneCommand, SceneWorld, Vec2};

pub const SLOW_FRAME_ENV_VAR: &str = "ISO_SLOW_FRAME_MS";

#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub window_title: String,
    pub window_width: u32,
    pub window_height: u32,
    pub target_tps: u32,
    pub max_frame_delta: Duration,
    pub max_ticks_per_frame: u32,
    pub metrics_log_interval: Duration,
    pub simulated_slow_frame_ms: u64,
    pub max_render_fps: Option<u32>,
    pub clear_color: [u8; 4],
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            window_title: "Isometric Renderer".to_string(),
            window_width: 800,
            window_height: 600,
            target_tps: 60,
            max_frame_delta: Duration::from_millis(250),
            max_ticks_per_frame: 5,
            metrics_log_interval: Duration::from_secs(1),
            simulated_slow_frame_ms: 0,
            max_render_fps: None,
            clear_color: [0, 0, 0, 255],
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("failed to create event loop: {0}")]
    CreateEventLoop(#[source] EventLoopError),
    #[error("failed to create application window: {0}")]
    CreateWindow(#[source] OsError),
    #[error("failed to initialize renderer: {0}")]
    CreateRenderer(#[source] PixelsError),
    #[error("event loop failed: {0}")]
    EventLoopRun(#[source] EventLoopError),
}

pub fn run_app(
    config: LoopConfig,
    world: SceneWorld,
    scene: Box<dyn Scene>,
) -> Result<(), AppError> {
    run_app_with_metrics(config, world, scene, MetricsHandle::default())
}

pub fn run_app_with_metrics(
    config: LoopConfig,
    world: SceneWorld,
    scene: Box<dyn Scene>,
    metrics_handle: MetricsHandle,
) -> Result<(), AppError> {
    let event_loop = EventLoop::new().map_err(AppError::CreateEventLoop)?;
    let window = Arc::new(
        WindowBuilder::new()
            .with_title(config.window_title.clone())
            .with_inner_size(LogicalSize::new(
                config.window_width as f64,
                config.window_height as f64,
            ))
            .build(&event_loop)
            .map_err(AppError::CreateWindow)?,
    );
    let renderer = Renderer::new(Arc::clone(&window), config.clear_color)
        .map_err(AppError::CreateRenderer)?;

    event_loop.set_control_flow(ControlFlow::Poll);
    let mut state = LoopState::start(config, window, renderer, world, scene, metrics_handle);

    event_loop
        .run(move |event, target| match event {
            Event::WindowEvent { window_id, event } if window_id == state.window.id() => {
                state.handle_window_event(event, target);
            }
            Event::AboutToWait => state.window.request_redraw(),
            Event::LoopExiting => state.shutdown(),
            _ => {}
        })
        .map_err(AppError::EventLoopRun)
}

struct LoopState {
    window: Arc<Window>,
    window_title: String,
    renderer: Renderer,
    world: SceneWorld,
    scene: Box<dyn Scene>,
    scene_loaded: bool,
    input: InputCollector,
    clock: FrameClock,
    slow_frame_delay: Duration,
    metrics: MetricsAccumulator,
    metrics_handle: MetricsHandle,
    applied_title: Option<String>,
}

impl LoopState {
    fn start(
        config: LoopConfig,
        window: Arc<Window>,
        renderer: Renderer,
        mut world: SceneWorld,
        mut scene: Box<dyn Scene>,
        metrics_handle: MetricsHandle,
    ) -> Self {
        let clock = FrameClock::new(&config, Instant::now());
        let slow_frame_delay = resolve_slow_frame_delay(config.simulated_slow_frame_ms);
        let metrics_interval = non_zero_or(config.metrics_log_interval, Duration::from_secs(1));

        let viewport = renderer.viewport();
        world.set_viewport(viewport);
        scene.load(&mut world);
        info!(
            rows = world.tiles().rows(),
            cols = world.tiles().cols(),
            layers = world.tiles().layers(),
            tiles = world.tiles().occupied_count(),
            images = world.images().len(),
            "scene_loaded"
        );
        info!(
            target_tps = config.target_tps.max(1),
            max_frame_delta_ms = clock.max_frame_delta.as_millis() as u64,
            max_ticks_per_frame = clock.max_ticks_per_frame,
            metrics_log_interval_ms = metrics_interval.as_millis() as u64,
            slow_frame_delay_ms = slow_frame_delay.as_millis() as u64,
            render_fps_cap = %render_cap_label(config.max_render_fps),
            "loop_config"
        );

        Self {
            window,
            window_title: config.window_title,
            renderer,
            world,
            scene,
            scene_loaded: true,
            input: InputCollector::new(viewport.width, viewport.height),
            clock,
            slow_frame_delay,
            metrics: MetricsAccumulator::new(metrics_interval),
            metrics_handle,
            applied_title: None,
        }
    }

    fn handle_window_event(&mut self, event: WindowEvent, target: &EventLoopWindowTarget<()>) {
        match event {
            WindowEvent::CloseRequested => self.quit(target, "window_close"),
            WindowEvent::Resized(size) => self.resize(size.width, size.height, target),
            WindowEvent::ScaleFactorChanged { .. } => {
                let size = self.window.inner_size();
                self.resize(size.width, size.height, target);
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.input.set_cursor_position(Some(Vec2 {
                    x: position.x as f32,
                    y: position.y as f32,
                }));
            }
            WindowEvent::CursorLeft { .. } => self.input.set_cursor_position(None),
            WindowEvent::MouseInput { state, button, .. } => {
                self.input.handle_mouse_button(button, state);
            }
            WindowEvent::KeyboardInput { event, .. } => {
                self.input.handle_key_event(&event);
                if self.input.quit_requested() {
                    self.quit(target, "escape_key");
                }
            }
            WindowEvent::RedrawRequested => self.redraw(target),
            _ => {}
        }
    }

    fn quit(&mut self, target: &EventLoopWindowTarget<()>, reason: &'static str) {
        self.input.request_quit();
        info!(reason, "shutdown_requested");
        target.exit();
    }

    fn resize(&mut self, width: u32, height: u32, target: &EventLoopWindowTarget<()>) {
        self.input.set_window_size(width, height);
        if let Err(error) = self.renderer.resize(width, height) {
            warn!(error = %error, "renderer_resize_failed");
            target.exit();
            return;
        }
        self.world.set_viewport(self.renderer.viewport());
    }

    fn redraw(&mut self, target: &EventLoopWindowTarget<()>) {
        if self.input.quit_requested() {
            return;
        }
        if self.slow_frame_delay > Duration::ZERO {
            thread::sleep(self.slow_frame_delay);
        }

        let now = Instant::now();
        let steps = self.clock.advance(now);
        let fixed_dt_seconds = self.clock.fixed_dt_seconds();
        for _ in 0..steps.ticks {
            let snapshot = self.input.snapshot_for_tick();
            let command = self
                .scene
                .update(fixed_dt_seconds, &snapshot, &mut self.world);
            self.metrics.record_tick();
            if command == SceneCommand::Quit {
                self.quit(target, "scene_command");
                return;
            }
        }
        if steps.dropped_backlog > Duration::ZERO {
            warn!(
                dropped_backlog_ms = steps.dropped_backlog.as_millis() as u64,
                max_ticks_per_frame = self.clock.max_ticks_per_frame,
                "sim_clamp_triggered"
            );
        }

        if self.world.refresh_visible_window() {
            self.metrics.record_rebuild();
        }

        let pacing = self.clock.pacing_sleep(Instant::now());
        if pacing > Duration::ZERO {
            thread::sleep(pacing);
        }
        self.renderer.sync_images(self.world.images());
        if let Err(error) = self.world.render(&mut self.renderer) {
            warn!(error = %error, "renderer_draw_failed");
            target.exit();
        }
        self.clock.mark_presented(Instant::now());

        self.apply_title();
        self.metrics
            .record_frame(steps.frame_dt, self.world.render_list().len());
        if let Some(snapshot) = self.metrics.maybe_snapshot(now) {
            self.metrics_handle.publish(snapshot);
            info!(
                fps = snapshot.fps,
                tps = snapshot.tps,
                frame_time_ms = snapshot.frame_time_ms,
                window_rebuilds = snapshot.window_rebuilds,
                drawables = snapshot.drawables,
                "loop_metrics"
            );
        }
    }

    fn apply_title(&mut self) {
        let title = self.scene.debug_title(&self.world);
        if title == self.applied_title {
            return;
        }
        self.window
            .set_title(title.as_deref().unwrap_or(&self.window_title));
        self.applied_title = title;
    }

    fn shutdown(&mut self) {
        if self.scene_loaded {
            self.scene.unload(&mut self.world);
            self.scene_loaded = false;
        }
        info!("shutdown");
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FrameSteps {
    ticks: u32,
    frame_dt: Duration,
    dropped_backlog: Duration,
}

#[derive(Debug)]
struct FrameClock {
    fixed_dt: Duration,
    max_frame_delta: Duration,
    max_ticks_per_frame: u32,
    render_frame_target: Option<Duration>,
    accumulator: Duration,
    last_frame: Instant,
    last_present: Instant,
}

impl FrameClock {
    fn new(config: &LoopConfig, now: Instant) -> Self {
        let target_tps = config.target_tps.max(1);
        Self {
            fixed_dt: Duration::from_secs_f64(1.0 / target_tps as f64),
            max_frame_delta: non_zero_or(config.max_frame_delta, Duration::from_millis(250)),
            max_ticks_per_frame: config.max_ticks_per_frame.max(1),
            render_frame_target: config
                .max_render_fps
                .filter(|fps| *fps > 0)
                .map(|fps| Duration::from_secs_f64(1.0 / fps as f64)),
            accumulator: Duration::ZERO,
            last_frame: now,
            last_present: now,
        }
    }

    fn fixed_dt_seconds(&self) -> f32 {
        self.fixed_dt.as_secs_f32()
    }

    /// Adds the clamped frame time and takes as many whole ticks as the cap
    /// allows. Time beyond the cap is dropped rather than carried.
    fn advance(&mut self, now: Instant) -> FrameSteps {
        let frame_dt = now.saturating_duration_since(self.last_frame);
        self.last_frame = now;
        self.accumulator = self
            .accumulator
            .saturating_add(frame_dt.min(self.max_frame_delta));

        let mut ticks = 0;
        while self.accumulator >= self.fixed_dt && ticks < self.max_ticks_per_frame {
            self.accumulator -= self.fixed_dt;
            ticks += 1;
        }
        let dropped_backlog = if self.accumulator >= self.fixed_dt {
            std::mem::take(&mut self.accumulator)
        } else {
            Duration::ZERO
        };

        FrameSteps {
            ticks,
            frame_dt,
            dropped_backlog,
        }
    }

    fn pacing_sleep(&self, now: Instant) -> Duration {
        let Some(target) = self.render_frame_target else {
            return Duration::ZERO;
        };
        target.saturating_sub(now.saturating_duration_since(self.last_present))
    }

    fn mark_presented(&mut self, now: Instant) {
        self.last_present = now;
    }
}

fn non_zero_or(value: Duration, fallback: Duration) -> Duration {
    if value.is_zero() {
        fallback
    } else {
        value
    }
}

fn render_cap_label(cap: Option<u32>) -> String {
    cap.filter(|fps| *fps > 0)
        .map_or_else(|| "off".to_string(), |fps| fps.to_string())
}

fn resolve_slow_frame_delay(config_slow_frame_ms: u64) -> Duration {
    let millis = match env::var(SLOW_FRAME_ENV_VAR) {
        Ok(raw) => parse_slow_frame_ms(&raw).unwrap_or_else(|| {
            warn!(
                env_var = SLOW_FRAME_ENV_VAR,
                value = raw.as_str(),
                "slow_frame_env_invalid_using_config"
            );
            config_slow_frame_ms
        }),
        Err(env::VarError::NotPresent) => config_slow_frame_ms,
        Err(error) => {
            warn!(
                env_var = SLOW_FRAME_ENV_VAR,
                error = %error,
                "slow_frame_env_unreadable_using_config"
            );
            config_slow_frame_ms
        }
    };
    Duration::from_millis(millis)
}

fn parse_slow_frame_ms(raw: &str) -> Option<u64> {
    raw.trim().parse().ok()
}
