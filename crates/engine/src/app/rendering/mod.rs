mod renderer;
mod transform;

pub use renderer::Renderer;
pub use transform::{
    screen_to_world, sprite_screen_rect, world_to_screen, world_to_screen_px, ScreenRect,
    Viewport,
};
