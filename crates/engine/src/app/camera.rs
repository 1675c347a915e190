use super::rendering::{screen_to_world, Viewport};
use super::Vec2;

pub const CAMERA_ZOOM_STEP_FACTOR: f32 = 1.1;
pub const CAMERA_DEFAULT_MAX_ZOOM: f32 = 2.0;
const CAMERA_ZOOM_FLOOR: f32 = 0.01;

/// Axis-aligned world area the camera is allowed to show, in iso pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldRect {
    pub min_x: f32,
    pub min_y: f32,
    pub width: f32,
    pub height: f32,
}

impl WorldRect {
    pub fn centered_on(center: Vec2, width: f32, height: f32) -> Self {
        Self {
            min_x: center.x - width * 0.5,
            min_y: center.y - height * 0.5,
            width,
            height,
        }
    }

    pub fn center(&self) -> Vec2 {
        Vec2 {
            x: self.min_x + self.width * 0.5,
            y: self.min_y + self.height * 0.5,
        }
    }

    pub fn max_x(&self) -> f32 {
        self.min_x + self.width
    }

    pub fn max_y(&self) -> f32 {
        self.min_y + self.height
    }

    fn is_degenerate(&self) -> bool {
        !(self.width.is_finite() && self.height.is_finite())
            || self.width <= 0.0
            || self.height <= 0.0
    }
}

/// Pan/zoom state over a fixed world rectangle.
///
/// Zoom stays within `[min_zoom, max_zoom]` where `min_zoom` is the smallest
/// scale at which the world still covers the whole viewport. The centre is
/// clamped so world edges never enter view.
#[derive(Debug, Clone, Copy)]
pub struct Camera2D {
    center: Vec2,
    zoom: f32,
    min_zoom: f32,
    max_zoom: f32,
    viewport: Viewport,
    world: WorldRect,
}

impl Default for Camera2D {
    fn default() -> Self {
        let viewport = Viewport {
            width: 1280,
            height: 720,
        };
        let world = WorldRect::centered_on(Vec2::default(), 1280.0, 720.0);
        Self::new(world, viewport, 1.0, CAMERA_DEFAULT_MAX_ZOOM)
    }
}

impl Camera2D {
    pub fn new(world: WorldRect, viewport: Viewport, zoom: f32, max_zoom: f32) -> Self {
        let mut camera = Self {
            center: world.center(),
            zoom,
            min_zoom: CAMERA_ZOOM_FLOOR,
            max_zoom,
            viewport,
            world,
        };
        camera.recompute_bounds();
        camera.set_zoom_clamped(zoom);
        camera
    }

    pub fn center(&self) -> Vec2 {
        self.center
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    pub fn min_zoom(&self) -> f32 {
        self.min_zoom
    }

    pub fn max_zoom(&self) -> f32 {
        self.max_zoom.max(self.min_zoom)
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn world(&self) -> WorldRect {
        self.world
    }

    /// Applies a viewport resize immediately.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.viewport = Viewport { width, height };
        self.recompute_bounds();
        if self.zoom < self.min_zoom || !self.zoom.is_finite() {
            self.zoom = self.min_zoom;
        } else if self.zoom > self.max_zoom() {
            self.zoom = self.max_zoom();
        }
        self.clamp_center();
    }

    pub fn set_zoom_clamped(&mut self, zoom: f32) {
        self.zoom = if zoom.is_finite() {
            zoom.clamp(self.min_zoom, self.max_zoom())
        } else {
            self.min_zoom
        };
        self.clamp_center();
    }

    /// Zooms by `CAMERA_ZOOM_STEP_FACTOR^steps`, keeping the world point under
    /// `anchor_px` fixed on screen when the clamp allows it.
    pub fn zoom_at(&mut self, anchor_px: Option<Vec2>, steps: i32) {
        if steps == 0 {
            return;
        }
        let anchor_px = anchor_px.unwrap_or_else(|| self.viewport_center_px());
        let anchor_world = screen_to_world(anchor_px, self);
        let factor = CAMERA_ZOOM_STEP_FACTOR.powi(steps.clamp(-64, 64));
        self.set_zoom_clamped(self.zoom * factor);

        let half = self.viewport_center_px();
        self.center = Vec2 {
            x: anchor_world.x - (anchor_px.x - half.x) / self.zoom,
            y: anchor_world.y - (anchor_px.y - half.y) / self.zoom,
        };
        self.clamp_center();
    }

    /// Moves the view so content follows a pointer drag of `delta_px`.
    pub fn pan_by_screen_delta(&mut self, delta_px: Vec2) {
        if delta_px == Vec2::default() {
            return;
        }
        self.center = Vec2 {
            x: self.center.x - delta_px.x / self.zoom,
            y: self.center.y - delta_px.y / self.zoom,
        };
        self.clamp_center();
    }

    pub fn center_on(&mut self, world_point: Vec2) {
        self.center = world_point;
        self.clamp_center();
    }

    pub fn visible_world_rect(&self) -> WorldRect {
        let width = self.viewport.width as f32 / self.zoom;
        let height = self.viewport.height as f32 / self.zoom;
        WorldRect::centered_on(self.center, width, height)
    }

    fn viewport_center_px(&self) -> Vec2 {
        Vec2 {
            x: self.viewport.width as f32 * 0.5,
            y: self.viewport.height as f32 * 0.5,
        }
    }

    fn recompute_bounds(&mut self) {
        self.min_zoom = min_zoom_for(self.viewport, self.world);
    }

    fn clamp_center(&mut self) {
        if self.world.is_degenerate() {
            return;
        }
        let half_w = self.viewport.width as f32 / (2.0 * self.zoom);
        let half_h = self.viewport.height as f32 / (2.0 * self.zoom);
        let world_center = self.world.center();
        self.center.x = clamp_axis(
            self.center.x,
            half_w,
            self.world.min_x,
            self.world.max_x(),
            world_center.x,
        );
        self.center.y = clamp_axis(
            self.center.y,
            half_h,
            self.world.min_y,
            self.world.max_y(),
            world_center.y,
        );
    }
}

/// `max(vw / world_w, vh / world_h)`, never below the zoom floor.
pub(crate) fn min_zoom_for(viewport: Viewport, world: WorldRect) -> f32 {
    if world.is_degenerate() {
        return CAMERA_ZOOM_FLOOR;
    }
    let by_width = viewport.width as f32 / world.width;
    let by_height = viewport.height as f32 / world.height;
    let min_zoom = by_width.max(by_height);
    if min_zoom.is_finite() {
        min_zoom.max(CAMERA_ZOOM_FLOOR)
    } else {
        CAMERA_ZOOM_FLOOR
    }
}

fn clamp_axis(value: f32, half_view: f32, min: f32, max: f32, world_center: f32) -> f32 {
    if !half_view.is_finite() || half_view * 2.0 >= max - min {
        return world_center;
    }
    if !value.is_finite() {
        return world_center;
    }
    value.clamp(min + half_view, max - half_view)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn village_world() -> WorldRect {
        WorldRect::centered_on(Vec2 { x: 0.0, y: 1120.0 }, 4800.0, 2600.0)
    }

    fn viewport(width: u32, height: u32) -> Viewport {
        Viewport { width, height }
    }

    #[test]
    fn min_zoom_is_largest_axis_ratio() {
        let min_zoom = min_zoom_for(viewport(1920, 1080), village_world());
        assert!((min_zoom - 1080.0 / 2600.0).abs() < 1e-6);
    }

    #[test]
    fn resize_forces_stale_zoom_up_to_new_minimum() {
        let mut camera = Camera2D::new(village_world(), viewport(1920, 1080), 0.48, 2.0);
        camera.zoom = 0.18;

        camera.resize(800, 600);

        let expected = (800.0_f32 / 4800.0).max(600.0_f32 / 2600.0);
        assert_eq!(camera.min_zoom(), expected);
        assert_eq!(camera.zoom(), expected);
        assert!((camera.zoom() - 0.2308).abs() < 1e-4);
    }

    #[test]
    fn resize_keeps_zoom_that_is_already_in_range() {
        let mut camera = Camera2D::new(village_world(), viewport(1920, 1080), 0.9, 2.0);
        camera.resize(800, 600);
        assert_eq!(camera.zoom(), 0.9);
    }

    #[test]
    fn zero_sized_viewport_does_not_divide_by_zero() {
        let mut camera = Camera2D::new(village_world(), viewport(1280, 720), 0.5, 2.0);
        camera.resize(0, 0);
        assert!(camera.zoom().is_finite());
        assert!(camera.min_zoom() > 0.0);
        assert!(camera.center().x.is_finite() && camera.center().y.is_finite());
    }

    #[test]
    fn degenerate_world_uses_zoom_floor() {
        let world = WorldRect {
            min_x: 0.0,
            min_y: 0.0,
            width: 0.0,
            height: 100.0,
        };
        assert_eq!(min_zoom_for(viewport(800, 600), world), CAMERA_ZOOM_FLOOR);
    }

    #[test]
    fn zoom_is_clamped_to_bounds() {
        let mut camera = Camera2D::new(village_world(), viewport(1280, 720), 1.0, 2.0);
        camera.set_zoom_clamped(10.0);
        assert_eq!(camera.zoom(), 2.0);
        camera.set_zoom_clamped(0.0001);
        assert_eq!(camera.zoom(), camera.min_zoom());
        camera.zoom_at(None, -40);
        assert_eq!(camera.zoom(), camera.min_zoom());
    }

    #[test]
    fn world_edges_never_enter_view() {
        let mut camera = Camera2D::new(village_world(), viewport(1280, 720), 1.0, 2.0);
        camera.pan_by_screen_delta(Vec2 {
            x: 100_000.0,
            y: -100_000.0,
        });
        let visible = camera.visible_world_rect();
        let world = camera.world();
        assert!(visible.min_x >= world.min_x - 1e-3);
        assert!(visible.max_y() <= world.max_y() + 1e-3);
    }

    #[test]
    fn zoom_at_cursor_keeps_anchor_world_point_fixed() {
        let mut camera = Camera2D::new(village_world(), viewport(1280, 720), 1.0, 2.0);
        let anchor = Vec2 { x: 700.0, y: 400.0 };
        let before = screen_to_world(anchor, &camera);
        camera.zoom_at(Some(anchor), 2);
        let after = screen_to_world(anchor, &camera);
        assert!((before.x - after.x).abs() < 0.01);
        assert!((before.y - after.y).abs() < 0.01);
        assert!((camera.zoom() - 1.21).abs() < 1e-5);
    }

    #[test]
    fn drag_moves_content_with_pointer() {
        let mut camera = Camera2D::new(village_world(), viewport(1280, 720), 1.0, 2.0);
        let start = camera.center();
        camera.pan_by_screen_delta(Vec2 { x: 50.0, y: 20.0 });
        assert!((camera.center().x - (start.x - 50.0)).abs() < 1e-3);
        assert!((camera.center().y - (start.y - 20.0)).abs() < 1e-3);
    }
}
