use crate::app::{Camera2D, Vec2};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

/// Pixel rectangle, `right`/`bottom` exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenRect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl ScreenRect {
    pub fn contains(&self, point: Vec2) -> bool {
        let x = point.x.floor() as i32;
        let y = point.y.floor() as i32;
        x >= self.left && x < self.right && y >= self.top && y < self.bottom
    }

    pub fn is_empty(&self) -> bool {
        self.left >= self.right || self.top >= self.bottom
    }
}

pub fn world_to_screen(world: Vec2, camera: &Camera2D) -> Vec2 {
    let viewport = camera.viewport();
    let center = camera.center();
    Vec2 {
        x: (world.x - center.x) * camera.zoom() + viewport.width as f32 * 0.5,
        y: (world.y - center.y) * camera.zoom() + viewport.height as f32 * 0.5,
    }
}

pub fn world_to_screen_px(world: Vec2, camera: &Camera2D) -> (i32, i32) {
    let screen = world_to_screen(world, camera);
    (screen.x.round() as i32, screen.y.round() as i32)
}

pub fn screen_to_world(screen: Vec2, camera: &Camera2D) -> Vec2 {
    let viewport = camera.viewport();
    let center = camera.center();
    let zoom = camera.zoom();
    Vec2 {
        x: (screen.x - viewport.width as f32 * 0.5) / zoom + center.x,
        y: (screen.y - viewport.height as f32 * 0.5) / zoom + center.y,
    }
}

/// Unrotated screen bounds of a `frame_size` sprite placed at `world` with
/// the given anchor (0..1 within the frame) and scale.
pub fn sprite_screen_rect(
    world: Vec2,
    frame_size: (u32, u32),
    scale: f32,
    anchor: Vec2,
    camera: &Camera2D,
) -> ScreenRect {
    let pixel_scale = scale.abs() * camera.zoom();
    let width = frame_size.0 as f32 * pixel_scale;
    let height = frame_size.1 as f32 * pixel_scale;
    let anchor_px = world_to_screen(world, camera);
    let left = anchor_px.x - anchor.x * width;
    let top = anchor_px.y - anchor.y * height;
    ScreenRect {
        left: left.floor() as i32,
        top: top.floor() as i32,
        right: (left + width).ceil() as i32,
        bottom: (top + height).ceil() as i32,
    }
}
