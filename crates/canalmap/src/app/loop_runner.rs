use std::io;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use pixels::Error as PixelsError;
use thiserror::Error;
use tokio::runtime::{Builder, Runtime};
use tracing::{debug, info, warn};
use winit::dpi::LogicalSize;
use winit::error::{EventLoopError, OsError};
use winit::event::{Event, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::window::WindowBuilder;

use crate::interaction::{InputEvent, Key, ModeKind, ModeRequest};
use crate::session::{MapSession, SessionEvent};

use super::hooks::{HookCommand, SessionHooks};
use super::input::{InputCollector, InputSnapshot, Shortcut};
use super::metrics::MetricsAccumulator;
use super::pacing::{slow_frame_delay, FramePacer};
use super::{MapRenderer, MetricsHandle};

const ROUTE_WORKER_THREAD_NAME: &str = "route-worker";

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
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            window_title: "Canal Map".to_string(),
            window_width: 1280,
            window_height: 720,
            target_tps: 60,
            max_frame_delta: Duration::from_millis(250),
            max_ticks_per_frame: 5,
            metrics_log_interval: Duration::from_secs(1),
            simulated_slow_frame_ms: 0,
            max_render_fps: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("failed to start route worker runtime: {0}")]
    RouteRuntime(#[source] io::Error),
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
    session: MapSession,
    hooks: Box<dyn SessionHooks>,
) -> Result<(), AppError> {
    let metrics_handle = MetricsHandle::default();
    run_app_with_metrics(config, session, hooks, metrics_handle)
}

pub fn run_app_with_metrics(
    config: LoopConfig,
    mut session: MapSession,
    mut hooks: Box<dyn SessionHooks>,
    metrics_handle: MetricsHandle,
) -> Result<(), AppError> {
    let runtime = build_route_runtime().map_err(AppError::RouteRuntime)?;
    session.use_local_dispatch(runtime.handle().clone());
    let mut route_runtime = Some(runtime);

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
    let mut renderer = MapRenderer::new(Arc::clone(&window)).map_err(AppError::CreateRenderer)?;

    event_loop.set_control_flow(ControlFlow::Poll);

    let mut pacer = FramePacer::new(&config, Instant::now());
    let fixed_dt_seconds = pacer.fixed_dt().as_secs_f64();
    let metrics_log_interval = if config.metrics_log_interval.is_zero() {
        Duration::from_secs(1)
    } else {
        config.metrics_log_interval
    };
    let debug_frame_delay = slow_frame_delay(config.simulated_slow_frame_ms);

    let viewport = renderer.viewport();
    let mut input_collector = InputCollector::new(viewport.width, viewport.height);
    session.handle_input(
        InputEvent::Resize {
            width: viewport.width,
            height: viewport.height,
        },
        Instant::now(),
    );
    hooks.on_load(&mut session);
    info!(
        parcels = session.index().parcel_count(),
        water_nodes = session.water_nodes().len(),
        markers = session.markers().len(),
        skipped = session.skipped_records().len(),
        "map_loaded"
    );

    info!(
        fixed_dt_ms = pacer.fixed_dt().as_secs_f64() * 1000.0,
        max_frame_delta_ms = pacer.max_frame_delta().as_millis() as u64,
        max_ticks_per_frame = pacer.max_ticks_per_frame(),
        metrics_log_interval_ms = metrics_log_interval.as_millis() as u64,
        slow_frame_delay_ms = debug_frame_delay.as_millis() as u64,
        render_fps_cap = %pacer.render_cap_label(),
        "loop_config"
    );

    let mut metrics_accumulator = MetricsAccumulator::new(metrics_log_interval);
    let mut last_applied_title: Option<String> = None;

    event_loop
        .run(move |event, window_target| match event {
            Event::WindowEvent { window_id, event } if window_id == window.id() => match event {
                WindowEvent::CloseRequested => {
                    input_collector.mark_quit_requested();
                    info!(reason = "window_close", "shutdown_requested");
                    window_target.exit();
                }
                WindowEvent::Resized(new_size) => {
                    input_collector.set_window_size(new_size.width, new_size.height);
                    if let Err(error) = renderer.resize(new_size.width, new_size.height) {
                        warn!(error = %error, "renderer_resize_failed");
                        window_target.exit();
                    }
                }
                WindowEvent::ScaleFactorChanged { .. } => {
                    let size = window.inner_size();
                    input_collector.set_window_size(size.width, size.height);
                    if let Err(error) = renderer.resize(size.width, size.height) {
                        warn!(error = %error, "renderer_resize_failed");
                        window_target.exit();
                    }
                }
                WindowEvent::CursorMoved { position, .. } => {
                    input_collector.set_cursor_position_px(position.x, position.y);
                }
                WindowEvent::CursorLeft { .. } => {
                    input_collector.clear_cursor_position();
                }
                WindowEvent::MouseInput { state, button, .. } => {
                    input_collector.handle_mouse_input(button, state);
                }
                WindowEvent::MouseWheel { delta, .. } => {
                    input_collector.handle_mouse_wheel(delta);
                }
                WindowEvent::KeyboardInput { event, .. } => {
                    input_collector.handle_keyboard_input(&event);
                    if input_collector.quit_requested() {
                        info!(reason = "quit_key", "shutdown_requested");
                        window_target.exit();
                    }
                }
                WindowEvent::RedrawRequested => {
                    if !debug_frame_delay.is_zero() {
                        thread::sleep(debug_frame_delay);
                    }

                    let now = Instant::now();
                    let budget = pacer.begin_frame(now);
                    for _ in 0..budget.ticks {
                        let tick_now = Instant::now();
                        let input = input_collector.snapshot_for_tick();
                        forward_input(&mut session, &input, tick_now);
                        let command = hooks.on_tick(&mut session, &input, fixed_dt_seconds);
                        session.tick(tick_now, fixed_dt_seconds);
                        for event in session.drain_events() {
                            log_session_event(&event);
                            match &event {
                                SessionEvent::RouteReady { .. } => {
                                    metrics_accumulator.record_route(true)
                                }
                                SessionEvent::RouteFailed { .. } => {
                                    metrics_accumulator.record_route(false)
                                }
                                SessionEvent::BackgroundRouteFinished { result, .. } => {
                                    metrics_accumulator.record_route(result.is_ok())
                                }
                                _ => {}
                            }
                            hooks.on_event(&mut session, &event);
                        }
                        metrics_accumulator.record_tick(session.animations().len());
                        if command == HookCommand::Quit {
                            info!(reason = "hook", "shutdown_requested");
                            window_target.exit();
                            break;
                        }
                    }
                    if !budget.dropped_backlog.is_zero() {
                        warn!(
                            dropped_backlog_ms = budget.dropped_backlog.as_millis() as u64,
                            max_ticks_per_frame = pacer.max_ticks_per_frame(),
                            "sim_clamp_triggered"
                        );
                    }

                    let present_delay = pacer.present_delay(Instant::now());
                    if !present_delay.is_zero() {
                        thread::sleep(present_delay);
                    }

                    if let Err(error) = renderer.render(&session) {
                        warn!(error = %error, "renderer_draw_failed");
                        window_target.exit();
                    }
                    pacer.mark_presented(Instant::now());
                    let next_title = hooks.title(&session);
                    if next_title != last_applied_title {
                        window.set_title(next_title.as_deref().unwrap_or(&config.window_title));
                        last_applied_title = next_title;
                    }
                    metrics_accumulator.record_frame(budget.raw_frame_dt);

                    if let Some(snapshot) = metrics_accumulator.maybe_snapshot(now) {
                        metrics_handle.publish(snapshot);
                        info!(
                            fps = snapshot.fps,
                            tps = snapshot.tps,
                            frame_time_ms = snapshot.frame_time_ms,
                            worst_frame_time_ms = snapshot.worst_frame_time_ms,
                            animated_entities = snapshot.animated_entities,
                            routes_delivered = snapshot.routes_delivered,
                            routes_failed = snapshot.routes_failed,
                            mode = session.controller().mode_kind().as_str(),
                            "loop_metrics"
                        );
                    }
                }
                _ => {}
            },
            Event::AboutToWait => {
                window.request_redraw();
            }
            Event::LoopExiting => {
                hooks.on_unload(&mut session);
                session.cancel_route();
                if let Some(runtime) = route_runtime.take() {
                    runtime.shutdown_background();
                }
                info!("shutdown");
            }
            _ => {}
        })
        .map_err(AppError::EventLoopRun)
}

fn build_route_runtime() -> io::Result<Runtime> {
    Builder::new_multi_thread()
        .worker_threads(1)
        .thread_name(ROUTE_WORKER_THREAD_NAME)
        .enable_time()
        .build()
}

/// Applies one tick's shortcuts and controller events to the session.
fn forward_input(session: &mut MapSession, input: &InputSnapshot, now: Instant) {
    for shortcut in input.shortcuts() {
        apply_shortcut(session, *shortcut);
    }
    for event in input.events() {
        if *event == InputEvent::Key(Key::Escape) && session.cancel_route() {
            info!("route_request_cancelled_by_user");
        }
        session.handle_input(*event, now);
    }
}

/// Mode shortcuts toggle: pressing the key of the active mode returns to normal.
fn apply_shortcut(session: &mut MapSession, shortcut: Shortcut) {
    let current = session.controller().mode_kind();
    let request = match shortcut {
        Shortcut::PlaceWaterPoint if current == ModeKind::PlaceWaterPoint => ModeRequest::Normal,
        Shortcut::PlaceWaterPoint => ModeRequest::PlaceWaterPoint,
        Shortcut::CreateWaterRoute if current == ModeKind::CreateWaterRoute => ModeRequest::Normal,
        Shortcut::CreateWaterRoute => ModeRequest::CreateWaterRoute,
        Shortcut::ToggleAnimation => {
            let enabled = !session.animations().is_enabled();
            session.animations_mut().set_enabled(enabled);
            info!(enabled, "animation_toggled");
            return;
        }
        Shortcut::Quit => return,
    };
    session.controller_mut().request_mode(request);
}

fn log_session_event(event: &SessionEvent) {
    match event {
        SessionEvent::RouteReady { generation, path } => info!(
            generation,
            path = %path.id(),
            distance_m = path.total_distance_m(),
            duration_s = path.estimated_duration_s(),
            water_only = path.water_only(),
            "route_ready"
        ),
        SessionEvent::RouteFailed { generation, error } => info!(
            generation,
            error = %error,
            message = error.user_message(),
            "route_failed"
        ),
        SessionEvent::BackgroundRouteFinished { key, result } => match result {
            Ok(path) => debug!(key = key.as_str(), path = %path.id(), "background_route_ready"),
            Err(error) => debug!(key = key.as_str(), error = %error, "background_route_failed"),
        },
        SessionEvent::Notice(message) => info!(message = message.as_str(), "notice"),
        other => debug!(event = ?other, "session_event"),
    }
}
