mod camera;
mod input;
mod iso;
mod loop_runner;
mod metrics;
mod rendering;
mod scene;
mod shared;

pub use camera::{Camera2D, WorldRect, CAMERA_DEFAULT_MAX_ZOOM, CAMERA_ZOOM_STEP_FACTOR};
pub use input::{
    InputAction, InputPort, JoystickHandle, ListenerKind, VirtualJoystick, JOYSTICK_SIZE_PX,
};
pub use iso::{depth_key, grid_to_iso, iso_to_grid, GridPos, ELEVATION_STEP_PX};
pub use loop_runner::{
    run_app, run_app_with_handles, AppError, CameraConfig, LoopConfig, RuntimeHandles,
    RuntimePhase, SLOW_FRAME_ENV_VAR,
};
pub use rendering::{
    screen_to_world, sprite_screen_rect, world_to_screen, world_to_screen_px, Renderer,
    ScreenRect, Viewport,
};
pub use scene::{
    AnimationDesc, Entity, EntityId, EntityKind, GroundLayer, GroundTile, InputSnapshot,
    IsoTransform, Scene, SceneCommand, SceneVisualState, SceneWorld, ScreenParticle, SpriteRef,
    Vec2, Visual,
};
