use std::cell::RefCell;
use std::env;
use std::rc::Rc;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use pixels::Error as PixelsError;
use thiserror::Error;
use tracing::{error, info, warn};
use winit::dpi::LogicalSize;
use winit::error::{EventLoopError, OsError};
use winit::event::{
    ElementState, Event, MouseButton, MouseScrollDelta, Touch, TouchPhase, WindowEvent,
};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::WindowBuilder;

use crate::assets::{load_atlas_set, AssetError, AtlasSet, AtlasSpec};

use super::metrics::MetricsAccumulator;
use super::scene::SceneRuntime;
use super::{
    Camera2D, InputAction, InputPort, InputSnapshot, JoystickHandle, ListenerKind, Renderer,
    Scene, SceneCommand, Vec2, Viewport, VirtualJoystick, WorldRect, CAMERA_DEFAULT_MAX_ZOOM,
    CAMERA_ZOOM_STEP_FACTOR, JOYSTICK_SIZE_PX,
};

pub const SLOW_FRAME_ENV_VAR: &str = "ISOWORLD_SLOW_FRAME_MS";

const MOUSE_POINTER_ID: u64 = u64::MAX;
/// Finger spreads narrower than this are ignored by pinch zoom.
const PINCH_MIN_DISTANCE_PX: f32 = 1.0;

/// Initial camera framing. The world rectangle bounds panning and zoom-out.
#[derive(Debug, Clone, Copy)]
pub struct CameraConfig {
    pub world: WorldRect,
    pub initial_zoom: f32,
    pub max_zoom: f32,
    pub focus: Vec2,
}

impl Default for CameraConfig {
    fn default() -> Self {
        let focus = Vec2::new(0.0, 1120.0);
        Self {
            world: WorldRect::centered_on(focus, 4800.0, 2600.0),
            initial_zoom: 0.48,
            max_zoom: CAMERA_DEFAULT_MAX_ZOOM,
            focus,
        }
    }
}

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
    pub drag_threshold_px: f32,
    pub joystick_size_px: f32,
    pub camera: CameraConfig,
    pub atlases: Vec<AtlasSpec>,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            window_title: "Isoworld".to_string(),
            window_width: 1280,
            window_height: 720,
            target_tps: 60,
            max_frame_delta: Duration::from_millis(250),
            max_ticks_per_frame: 5,
            metrics_log_interval: Duration::from_secs(1),
            simulated_slow_frame_ms: 0,
            max_render_fps: None,
            drag_threshold_px: 4.0,
            joystick_size_px: JOYSTICK_SIZE_PX,
            camera: CameraConfig::default(),
            atlases: Vec::new(),
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
    #[error("failed to spawn asset loader thread: {0}")]
    SpawnAssetLoader(#[source] std::io::Error),
    #[error(transparent)]
    Assets(#[from] AssetError),
    #[error("asset loader exited without a result")]
    AssetLoaderDisconnected,
    #[error("event loop failed: {0}")]
    EventLoopRun(#[source] EventLoopError),
}

/// Whether the world may be drawn and ticked yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimePhase {
    Loading,
    Ready,
    Failed,
}

impl RuntimePhase {
    fn name(self) -> &'static str {
        match self {
            RuntimePhase::Loading => "loading",
            RuntimePhase::Ready => "ready",
            RuntimePhase::Failed => "failed",
        }
    }
}

/// Host-side hooks into a running loop.
#[derive(Debug, Clone, Default)]
pub struct RuntimeHandles {
    pub joystick: JoystickHandle,
}

pub fn run_app(config: LoopConfig, scene: Box<dyn Scene>) -> Result<(), AppError> {
    run_app_with_handles(config, scene, RuntimeHandles::default())
}

pub fn run_app_with_handles(
    config: LoopConfig,
    scene: Box<dyn Scene>,
    handles: RuntimeHandles,
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
    let mut renderer = Renderer::new(Arc::clone(&window)).map_err(AppError::CreateRenderer)?;
    let initial_size = renderer.viewport();

    let mut camera = Camera2D::new(
        config.camera.world,
        initial_size,
        config.camera.initial_zoom,
        config.camera.max_zoom,
    );
    camera.center_on(config.camera.focus);
    let mut runtime = SceneRuntime::new(scene, camera);

    let atlas_results = spawn_asset_loader(config.atlases.clone())?;
    let mut phase = RuntimePhase::Loading;
    info!(
        atlas_count = config.atlases.len(),
        phase = phase.name(),
        "assets_loading"
    );

    event_loop.set_control_flow(ControlFlow::Poll);

    let target_tps = config.target_tps.max(1);
    let max_frame_delta =
        normalize_non_zero_duration(config.max_frame_delta, Duration::from_millis(250));
    let max_ticks_per_frame = config.max_ticks_per_frame.max(1);
    let metrics_log_interval =
        normalize_non_zero_duration(config.metrics_log_interval, Duration::from_secs(1));
    let fixed_dt = Duration::from_secs_f64(1.0 / target_tps as f64);
    let fixed_dt_seconds = fixed_dt.as_secs_f32();
    let slow_frame_delay = resolve_slow_frame_delay(config.simulated_slow_frame_ms);
    let effective_render_cap = normalize_render_fps_cap(config.max_render_fps);
    let render_frame_target = target_frame_duration(effective_render_cap);
    let joystick = VirtualJoystick::new(
        handles.joystick.clone(),
        config.joystick_size_px,
        (initial_size.width, initial_size.height),
    );
    let mut input_collector = InputCollector::new(initial_size, joystick, config.drag_threshold_px);
    input_collector.start_listeners();

    info!(
        target_tps,
        max_frame_delta_ms = max_frame_delta.as_millis() as u64,
        max_ticks_per_frame,
        metrics_log_interval_ms = metrics_log_interval.as_millis() as u64,
        slow_frame_delay_ms = slow_frame_delay.as_millis() as u64,
        render_fps_cap = %format_render_cap(effective_render_cap),
        "loop_config"
    );

    let fatal_error: Rc<RefCell<Option<AppError>>> = Rc::new(RefCell::new(None));
    let fatal_error_in_loop = Rc::clone(&fatal_error);
    let window_for_loop = Arc::clone(&window);

    let mut accumulator = Duration::ZERO;
    let mut last_frame_instant = Instant::now();
    let mut last_present_instant = Instant::now();
    let mut metrics_accumulator = MetricsAccumulator::new(metrics_log_interval);

    let run_result = event_loop.run(move |event, window_target| match event {
        Event::WindowEvent { window_id, event } if window_id == window_for_loop.id() => {
            match event {
                WindowEvent::CloseRequested => {
                    input_collector.mark_quit_requested();
                    info!(reason = "window_close", "shutdown_requested");
                    window_target.exit();
                }
                WindowEvent::Resized(new_size) => {
                    apply_resize(
                        &mut renderer,
                        &mut runtime,
                        &mut input_collector,
                        new_size.width,
                        new_size.height,
                    );
                }
                WindowEvent::ScaleFactorChanged { .. } => {
                    let size = window_for_loop.inner_size();
                    apply_resize(
                        &mut renderer,
                        &mut runtime,
                        &mut input_collector,
                        size.width,
                        size.height,
                    );
                }
                WindowEvent::CursorMoved { position, .. } => {
                    input_collector.handle_cursor_moved(Vec2::new(
                        position.x as f32,
                        position.y as f32,
                    ));
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
                WindowEvent::Touch(touch) => {
                    input_collector.handle_touch(touch);
                }
                WindowEvent::KeyboardInput { event, .. } => {
                    input_collector.handle_keyboard_input(&event);
                    if input_collector.quit_requested {
                        info!(reason = "escape_key", "shutdown_requested");
                        window_target.exit();
                    }
                }
                WindowEvent::RedrawRequested => {
                    if phase == RuntimePhase::Loading {
                        match poll_asset_loader(&atlas_results) {
                            AssetPoll::Pending => {}
                            AssetPoll::Loaded(atlases) => {
                                let skipped = atlases.skipped().len();
                                runtime.load(Arc::new(atlases));
                                phase = RuntimePhase::Ready;
                                info!(
                                    entity_count = runtime.world().entity_count(),
                                    skipped_atlases = skipped,
                                    phase = phase.name(),
                                    "scene_loaded"
                                );
                            }
                            AssetPoll::Failed(err) => {
                                phase = RuntimePhase::Failed;
                                error!(error = %err, phase = phase.name(), "asset_load_failed");
                                *fatal_error_in_loop.borrow_mut() = Some(err);
                                window_target.exit();
                            }
                        }
                    }

                    if slow_frame_delay > Duration::ZERO {
                        // Debug perturbation only; this is not the FPS cap.
                        thread::sleep(slow_frame_delay);
                    }

                    let now = Instant::now();
                    let raw_frame_dt = now.saturating_duration_since(last_frame_instant);
                    last_frame_instant = now;

                    let clamped_frame_dt = clamp_frame_delta(raw_frame_dt, max_frame_delta);
                    accumulator = accumulator.saturating_add(clamped_frame_dt);

                    if phase == RuntimePhase::Ready {
                        let camera_input = input_collector.take_camera_input();
                        apply_camera_input(runtime.world_mut().camera_mut(), camera_input);
                    } else {
                        input_collector.discard_pending();
                    }

                    let step_plan = plan_sim_steps(accumulator, fixed_dt, max_ticks_per_frame);
                    for _ in 0..step_plan.ticks_to_run {
                        let input_snapshot = input_collector.snapshot_for_tick();
                        if runtime.update(fixed_dt_seconds, &input_snapshot) == SceneCommand::Quit {
                            info!(reason = "scene_command", "shutdown_requested");
                            window_target.exit();
                        }
                        metrics_accumulator.record_tick();
                    }
                    accumulator = step_plan.remaining_accumulator;

                    if step_plan.dropped_backlog > Duration::ZERO {
                        warn!(
                            dropped_backlog_ms = step_plan.dropped_backlog.as_millis() as u64,
                            max_ticks_per_frame, "sim_clamp_triggered"
                        );
                    }

                    // Single FPS cap sleep point for render pacing.
                    let elapsed_since_last_present =
                        Instant::now().saturating_duration_since(last_present_instant);
                    let cap_sleep =
                        compute_cap_sleep(elapsed_since_last_present, render_frame_target);
                    if cap_sleep > Duration::ZERO {
                        thread::sleep(cap_sleep);
                    }

                    let joystick = input_collector
                        .accepts(ListenerKind::TouchJoystick)
                        .then_some(&input_collector.joystick);
                    if let Err(error) = renderer.render_frame(runtime.world(), phase, joystick) {
                        warn!(error = %error, "renderer_draw_failed");
                        window_target.exit();
                    }
                    last_present_instant = Instant::now();
                    metrics_accumulator.record_frame(raw_frame_dt);

                    if let Some(snapshot) = metrics_accumulator.maybe_snapshot(now) {
                        info!(
                            fps = snapshot.fps,
                            tps = snapshot.tps,
                            frame_time_ms = snapshot.frame_time_ms,
                            worst_frame_time_ms = snapshot.worst_frame_time_ms,
                            entity_count = runtime.world().entity_count(),
                            phase = phase.name(),
                            "loop_metrics"
                        );
                    }
                }
                _ => {}
            }
        }
        Event::AboutToWait => {
            window_for_loop.request_redraw();
        }
        Event::LoopExiting => {
            shutdown_scene(&mut input_collector, &mut runtime);
            renderer.release();
            info!(phase = phase.name(), "shutdown");
        }
        _ => {}
    });

    if let Some(err) = fatal_error.borrow_mut().take() {
        return Err(err);
    }
    run_result.map_err(AppError::EventLoopRun)
}

fn apply_resize(
    renderer: &mut Renderer,
    runtime: &mut SceneRuntime,
    input_collector: &mut InputCollector,
    width: u32,
    height: u32,
) {
    if width == 0 || height == 0 {
        return;
    }
    if let Err(error) = renderer.resize(width, height) {
        warn!(error = %error, width, height, "renderer_resize_failed");
    }
    resize_viewports(
        runtime.world_mut().camera_mut(),
        input_collector,
        width,
        height,
    );
}

/// Camera bounds and pointer layout follow the window even when the surface
/// could not be rebuilt.
fn resize_viewports(
    camera: &mut Camera2D,
    input_collector: &mut InputCollector,
    width: u32,
    height: u32,
) {
    camera.resize(width, height);
    input_collector.set_window_size(width, height);
}

/// Input stops before the scene unloads so no event reaches a torn-down scene.
fn shutdown_scene(input_collector: &mut InputCollector, runtime: &mut SceneRuntime) {
    let removed = input_collector.stop_listeners();
    runtime.unload();
    info!(listeners = removed.len(), "scene_shutdown");
}

fn spawn_asset_loader(
    specs: Vec<AtlasSpec>,
) -> Result<Receiver<Result<AtlasSet, AssetError>>, AppError> {
    let (sender, receiver) = mpsc::channel();
    thread::Builder::new()
        .name("asset-loader".to_string())
        .spawn(move || {
            let _ = sender.send(load_atlas_set(&specs));
        })
        .map_err(AppError::SpawnAssetLoader)?;
    Ok(receiver)
}

enum AssetPoll {
    Pending,
    Loaded(AtlasSet),
    Failed(AppError),
}

fn poll_asset_loader(receiver: &Receiver<Result<AtlasSet, AssetError>>) -> AssetPoll {
    match receiver.try_recv() {
        Ok(Ok(atlases)) => AssetPoll::Loaded(atlases),
        Ok(Err(err)) => AssetPoll::Failed(AppError::Assets(err)),
        Err(TryRecvError::Empty) => AssetPoll::Pending,
        Err(TryRecvError::Disconnected) => AssetPoll::Failed(AppError::AssetLoaderDisconnected),
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct CameraInput {
    pan_px: Vec2,
    zoom_steps: i32,
    zoom_anchor_px: Option<Vec2>,
}

fn apply_camera_input(camera: &mut Camera2D, input: CameraInput) {
    if input.pan_px != Vec2::ZERO {
        camera.pan_by_screen_delta(input.pan_px);
    }
    if input.zoom_steps != 0 {
        camera.zoom_at(input.zoom_anchor_px, input.zoom_steps);
    }
}

#[derive(Debug, Clone, Copy)]
struct PointerDrag {
    pointer: u64,
    origin: Vec2,
    last: Vec2,
    panning: bool,
}

/// Two touch pointers down at once; distance changes become zoom steps.
#[derive(Debug, Clone, Copy)]
struct Pinch {
    pointers: [(u64, Vec2); 2],
    last_distance: f32,
}

impl Pinch {
    fn new(first: (u64, Vec2), second: (u64, Vec2)) -> Self {
        Self {
            pointers: [first, second],
            last_distance: (second.1 - first.1).length(),
        }
    }

    fn contains(&self, pointer: u64) -> bool {
        self.pointers.iter().any(|(id, _)| *id == pointer)
    }

    fn other(&self, pointer: u64) -> (u64, Vec2) {
        if self.pointers[0].0 == pointer {
            self.pointers[1]
        } else {
            self.pointers[0]
        }
    }

    fn midpoint(&self) -> Vec2 {
        (self.pointers[0].1 + self.pointers[1].1) * 0.5
    }
}

#[derive(Debug)]
struct InputCollector {
    quit_requested: bool,
    port: InputPort,
    joystick: VirtualJoystick,
    action_states: super::input::ActionStates,
    interact_key_is_down: bool,
    interact_pressed_edge: bool,
    zoom_in_key_is_down: bool,
    zoom_out_key_is_down: bool,
    pending_zoom_steps: i32,
    pending_pan_px: Vec2,
    drag_threshold_px: f32,
    drag: Option<PointerDrag>,
    pinch: Option<Pinch>,
    pinch_zoom_carry: f32,
    pinch_anchor_px: Option<Vec2>,
    cursor_position_px: Option<Vec2>,
    click_pressed_edge: bool,
    window_width: u32,
    window_height: u32,
}

impl Default for InputCollector {
    fn default() -> Self {
        let viewport = Viewport {
            width: 1280,
            height: 720,
        };
        let joystick = VirtualJoystick::new(
            JoystickHandle::default(),
            JOYSTICK_SIZE_PX,
            (viewport.width, viewport.height),
        );
        Self::new(viewport, joystick, 4.0)
    }
}

impl InputCollector {
    fn new(viewport: Viewport, joystick: VirtualJoystick, drag_threshold_px: f32) -> Self {
        Self {
            quit_requested: false,
            port: InputPort::default(),
            joystick,
            action_states: super::input::ActionStates::default(),
            interact_key_is_down: false,
            interact_pressed_edge: false,
            zoom_in_key_is_down: false,
            zoom_out_key_is_down: false,
            pending_zoom_steps: 0,
            pending_pan_px: Vec2::ZERO,
            drag_threshold_px: drag_threshold_px.max(0.0),
            drag: None,
            pinch: None,
            pinch_zoom_carry: 0.0,
            pinch_anchor_px: None,
            cursor_position_px: None,
            click_pressed_edge: false,
            window_width: viewport.width,
            window_height: viewport.height,
        }
    }

    fn start_listeners(&mut self) {
        self.port.start();
    }

    fn stop_listeners(&mut self) -> Vec<ListenerKind> {
        let removed = self.port.stop();
        self.action_states.clear();
        self.drag = None;
        self.pinch = None;
        self.joystick.cancel();
        removed
    }

    fn accepts(&self, kind: ListenerKind) -> bool {
        self.port.accepts(kind)
    }

    fn mark_quit_requested(&mut self) {
        self.quit_requested = true;
    }

    fn handle_keyboard_input(&mut self, key_event: &winit::event::KeyEvent) {
        if !self.accepts(ListenerKind::Keyboard) {
            return;
        }
        let is_pressed = key_event.state == ElementState::Pressed;
        self.update_action_state_from_physical_key(key_event.physical_key, is_pressed);
        self.handle_interact_key_state(is_interact_key(key_event.physical_key), key_event.state);
        self.handle_zoom_in_key_state(is_zoom_in_key(key_event.physical_key), key_event.state);
        self.handle_zoom_out_key_state(is_zoom_out_key(key_event.physical_key), key_event.state);
    }

    fn update_action_state_from_physical_key(&mut self, key: PhysicalKey, is_pressed: bool) {
        match key {
            PhysicalKey::Code(KeyCode::KeyW) | PhysicalKey::Code(KeyCode::ArrowUp) => {
                self.action_states.set(InputAction::MoveUp, is_pressed);
            }
            PhysicalKey::Code(KeyCode::KeyS) | PhysicalKey::Code(KeyCode::ArrowDown) => {
                self.action_states.set(InputAction::MoveDown, is_pressed);
            }
            PhysicalKey::Code(KeyCode::KeyA) | PhysicalKey::Code(KeyCode::ArrowLeft) => {
                self.action_states.set(InputAction::MoveLeft, is_pressed);
            }
            PhysicalKey::Code(KeyCode::KeyD) | PhysicalKey::Code(KeyCode::ArrowRight) => {
                self.action_states.set(InputAction::MoveRight, is_pressed);
            }
            key if is_interact_key(key) => {
                self.action_states.set(InputAction::Interact, is_pressed);
            }
            PhysicalKey::Code(KeyCode::Escape) => {
                self.action_states.set(InputAction::Quit, is_pressed);
                if is_pressed {
                    self.mark_quit_requested();
                }
            }
            _ => {}
        }
    }

    fn handle_interact_key_state(&mut self, is_interact: bool, state: ElementState) {
        if !is_interact {
            return;
        }
        match state {
            ElementState::Pressed => {
                if !self.interact_key_is_down {
                    self.interact_pressed_edge = true;
                }
                self.interact_key_is_down = true;
            }
            ElementState::Released => self.interact_key_is_down = false,
        }
    }

    fn handle_zoom_in_key_state(&mut self, is_zoom_in_key: bool, state: ElementState) {
        if !is_zoom_in_key {
            return;
        }
        match state {
            ElementState::Pressed => {
                if !self.zoom_in_key_is_down {
                    self.pending_zoom_steps = self.pending_zoom_steps.saturating_add(1);
                }
                self.zoom_in_key_is_down = true;
            }
            ElementState::Released => self.zoom_in_key_is_down = false,
        }
    }

    fn handle_zoom_out_key_state(&mut self, is_zoom_out_key: bool, state: ElementState) {
        if !is_zoom_out_key {
            return;
        }
        match state {
            ElementState::Pressed => {
                if !self.zoom_out_key_is_down {
                    self.pending_zoom_steps = self.pending_zoom_steps.saturating_sub(1);
                }
                self.zoom_out_key_is_down = true;
            }
            ElementState::Released => self.zoom_out_key_is_down = false,
        }
    }

    fn set_window_size(&mut self, width: u32, height: u32) {
        self.window_width = width;
        self.window_height = height;
        self.joystick.layout(width, height);
    }

    fn clear_cursor_position(&mut self) {
        self.cursor_position_px = None;
    }

    fn handle_cursor_moved(&mut self, point: Vec2) {
        self.cursor_position_px = Some(point);
        self.pointer_moved(MOUSE_POINTER_ID, point);
    }

    fn handle_mouse_wheel(&mut self, delta: MouseScrollDelta) {
        if !self.accepts(ListenerKind::PointerWheel) {
            return;
        }
        let steps = zoom_steps_from_scroll_delta(delta);
        self.pending_zoom_steps = self.pending_zoom_steps.saturating_add(steps);
    }

    fn handle_mouse_input(&mut self, button: MouseButton, state: ElementState) {
        if button != MouseButton::Left {
            return;
        }
        let Some(point) = self.cursor_position_px else {
            return;
        };
        match state {
            ElementState::Pressed => self.pointer_pressed(MOUSE_POINTER_ID, point),
            ElementState::Released => self.pointer_released(MOUSE_POINTER_ID),
        }
    }

    fn handle_touch(&mut self, touch: Touch) {
        let point = Vec2::new(touch.location.x as f32, touch.location.y as f32);
        match touch.phase {
            TouchPhase::Started => {
                self.cursor_position_px = Some(point);
                self.pointer_pressed(touch.id, point);
            }
            TouchPhase::Moved => {
                self.cursor_position_px = Some(point);
                self.pointer_moved(touch.id, point);
            }
            TouchPhase::Ended | TouchPhase::Cancelled => self.pointer_released(touch.id),
        }
    }

    fn pointer_pressed(&mut self, pointer: u64, point: Vec2) {
        if self.accepts(ListenerKind::TouchJoystick) && self.joystick.press(pointer, point) {
            return;
        }
        if !self.accepts(ListenerKind::PointerDrag) || self.pinch.is_some() {
            return;
        }
        if let Some(drag) = self.drag {
            if drag.pointer != pointer {
                self.pinch = Some(Pinch::new((drag.pointer, drag.last), (pointer, point)));
                self.pinch_zoom_carry = 0.0;
                self.drag = None;
            }
            return;
        }
        self.drag = Some(PointerDrag {
            pointer,
            origin: point,
            last: point,
            panning: false,
        });
    }

    fn pointer_moved(&mut self, pointer: u64, point: Vec2) {
        if self.joystick.drag_to(pointer, point) || self.pinch_moved(pointer, point) {
            return;
        }
        let threshold = self.drag_threshold_px;
        let Some(drag) = self.drag.as_mut().filter(|drag| drag.pointer == pointer) else {
            return;
        };
        if !drag.panning && (point - drag.origin).length() > threshold {
            drag.panning = true;
        }
        if drag.panning {
            self.pending_pan_px = self.pending_pan_px + (point - drag.last);
        }
        drag.last = point;
    }

    fn pointer_released(&mut self, pointer: u64) {
        if self.joystick.release(pointer) {
            return;
        }
        if let Some(pinch) = self.pinch.filter(|pinch| pinch.contains(pointer)) {
            // The remaining finger keeps panning and never turns into a click.
            let (remaining, last) = pinch.other(pointer);
            self.pinch = None;
            self.drag = Some(PointerDrag {
                pointer: remaining,
                origin: last,
                last,
                panning: true,
            });
            return;
        }
        match self.drag {
            Some(drag) if drag.pointer == pointer => {
                if !drag.panning {
                    self.click_pressed_edge = true;
                }
                self.drag = None;
            }
            _ => {}
        }
    }

    fn pinch_moved(&mut self, pointer: u64, point: Vec2) -> bool {
        let Some(pinch) = self.pinch.as_mut() else {
            return false;
        };
        let Some(slot) = pinch.pointers.iter_mut().find(|(id, _)| *id == pointer) else {
            return false;
        };
        slot.1 = point;

        let distance = (pinch.pointers[1].1 - pinch.pointers[0].1).length();
        if pinch.last_distance > PINCH_MIN_DISTANCE_PX && distance > PINCH_MIN_DISTANCE_PX {
            self.pinch_zoom_carry +=
                (distance / pinch.last_distance).ln() / CAMERA_ZOOM_STEP_FACTOR.ln();
        }
        pinch.last_distance = distance;
        self.pinch_anchor_px = Some(pinch.midpoint());

        let whole = self.pinch_zoom_carry.trunc();
        self.pinch_zoom_carry -= whole;
        self.pending_zoom_steps = self.pending_zoom_steps.saturating_add(whole as i32);
        true
    }

    fn take_camera_input(&mut self) -> CameraInput {
        let input = CameraInput {
            pan_px: self.pending_pan_px,
            zoom_steps: self.pending_zoom_steps,
            zoom_anchor_px: self.pinch_anchor_px.take().or(self.cursor_position_px),
        };
        self.pending_pan_px = Vec2::ZERO;
        self.pending_zoom_steps = 0;
        input
    }

    /// Drops edges and camera motion gathered while the world is not ready.
    fn discard_pending(&mut self) {
        self.pending_pan_px = Vec2::ZERO;
        self.pending_zoom_steps = 0;
        self.pinch_zoom_carry = 0.0;
        self.pinch_anchor_px = None;
        self.click_pressed_edge = false;
        self.interact_pressed_edge = false;
    }

    fn snapshot_for_tick(&mut self) -> InputSnapshot {
        let snapshot = InputSnapshot::new(
            self.quit_requested,
            self.action_states,
            self.interact_pressed_edge,
            self.cursor_position_px,
            self.click_pressed_edge,
            self.joystick_vector(),
            (self.window_width, self.window_height),
        );
        self.interact_pressed_edge = false;
        self.click_pressed_edge = false;
        snapshot
    }

    fn joystick_vector(&self) -> Vec2 {
        if self.accepts(ListenerKind::TouchJoystick) {
            self.joystick.handle().get()
        } else {
            Vec2::ZERO
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct StepPlan {
    ticks_to_run: u32,
    remaining_accumulator: Duration,
    dropped_backlog: Duration,
}

fn plan_sim_steps(
    mut accumulator: Duration,
    fixed_dt: Duration,
    max_ticks_per_frame: u32,
) -> StepPlan {
    let mut ticks_to_run = 0u32;

    while accumulator >= fixed_dt && ticks_to_run < max_ticks_per_frame {
        accumulator = accumulator.saturating_sub(fixed_dt);
        ticks_to_run = ticks_to_run.saturating_add(1);
    }

    if accumulator >= fixed_dt {
        StepPlan {
            ticks_to_run,
            remaining_accumulator: Duration::ZERO,
            dropped_backlog: accumulator,
        }
    } else {
        StepPlan {
            ticks_to_run,
            remaining_accumulator: accumulator,
            dropped_backlog: Duration::ZERO,
        }
    }
}

fn clamp_frame_delta(frame_dt: Duration, max_frame_delta: Duration) -> Duration {
    frame_dt.min(max_frame_delta)
}

fn normalize_non_zero_duration(value: Duration, fallback: Duration) -> Duration {
    if value.is_zero() {
        fallback
    } else {
        value
    }
}

fn normalize_render_fps_cap(cap: Option<u32>) -> Option<u32> {
    cap.filter(|value| *value > 0)
}

fn target_frame_duration(max_render_fps: Option<u32>) -> Option<Duration> {
    max_render_fps.map(|fps| Duration::from_secs_f64(1.0 / fps as f64))
}

fn compute_cap_sleep(elapsed: Duration, target: Option<Duration>) -> Duration {
    match target {
        Some(frame_target) if elapsed < frame_target => frame_target - elapsed,
        _ => Duration::ZERO,
    }
}

fn format_render_cap(cap: Option<u32>) -> String {
    match cap {
        Some(value) => value.to_string(),
        None => "off".to_string(),
    }
}

fn resolve_slow_frame_delay(config_slow_frame_ms: u64) -> Duration {
    match env::var(SLOW_FRAME_ENV_VAR) {
        Ok(value) => match value.parse::<u64>() {
            Ok(ms) => Duration::from_millis(ms),
            Err(_) => {
                warn!(
                    env_var = SLOW_FRAME_ENV_VAR,
                    value = value.as_str(),
                    "invalid slow-frame env var value; falling back to config"
                );
                Duration::from_millis(config_slow_frame_ms)
            }
        },
        Err(env::VarError::NotPresent) => Duration::from_millis(config_slow_frame_ms),
        Err(err) => {
            warn!(
                env_var = SLOW_FRAME_ENV_VAR,
                error = %err,
                "unable to read slow-frame env var; falling back to config"
            );
            Duration::from_millis(config_slow_frame_ms)
        }
    }
}

fn is_interact_key(key: PhysicalKey) -> bool {
    matches!(
        key,
        PhysicalKey::Code(KeyCode::KeyE)
            | PhysicalKey::Code(KeyCode::Enter)
            | PhysicalKey::Code(KeyCode::NumpadEnter)
            | PhysicalKey::Code(KeyCode::Space)
    )
}

fn is_zoom_in_key(key: PhysicalKey) -> bool {
    matches!(
        key,
        PhysicalKey::Code(KeyCode::Equal) | PhysicalKey::Code(KeyCode::NumpadAdd)
    )
}

fn is_zoom_out_key(key: PhysicalKey) -> bool {
    matches!(
        key,
        PhysicalKey::Code(KeyCode::Minus) | PhysicalKey::Code(KeyCode::NumpadSubtract)
    )
}

fn zoom_steps_from_scroll_delta(delta: MouseScrollDelta) -> i32 {
    match delta {
        MouseScrollDelta::LineDelta(_, y) => y.round() as i32,
        MouseScrollDelta::PixelDelta(position) => {
            if position.y > 0.0 {
                1
            } else if position.y < 0.0 {
                -1
            } else {
                0
            }
        }
    }
}
