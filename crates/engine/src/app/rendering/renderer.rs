use std::collections::HashSet;
use std::sync::Arc;

use pixels::{Error, Pixels, SurfaceTexture};
use tracing::{info, warn};
use winit::window::Window;

use crate::app::{
    Entity, GroundTile, RuntimePhase, SceneWorld, ScreenParticle, Vec2, VirtualJoystick,
};
use crate::assets::{AtlasFrame, AtlasSet, SpriteAtlas};

use super::transform::{sprite_screen_rect, world_to_screen, ScreenRect};
use super::Viewport;

const CLEAR_COLOR_WORLD: [u8; 4] = [42, 31, 43, 255];
const CLEAR_COLOR_LOADING: [u8; 4] = [30, 24, 32, 255];
const CLEAR_COLOR_FAILED: [u8; 4] = [64, 18, 24, 255];
const PLACEHOLDER_COLOR: [u8; 4] = [220, 220, 240, 255];
const PLACEHOLDER_HALF_SIZE_PX: i32 = 5;
const HOVER_TINT: [u8; 3] = [255, 222, 150];
const JOYSTICK_BASE_COLOR: [u8; 3] = [255, 255, 255];
const JOYSTICK_BASE_ALPHA: f32 = 0.18;
const JOYSTICK_RING_ALPHA: f32 = 0.45;
const JOYSTICK_KNOB_ALPHA: f32 = 0.6;
const JOYSTICK_KNOB_ACTIVE_ALPHA: f32 = 0.85;

/// Where and how to stamp one atlas frame, in screen pixels.
#[derive(Debug, Clone, Copy)]
struct SpritePlacement {
    anchor_screen: Vec2,
    anchor: Vec2,
    pixel_scale: f32,
    rotation: f32,
    alpha: f32,
    tint: Option<[u8; 3]>,
    flip_x: bool,
}

/// Software renderer: composes ground, objects, particles and the on-screen
/// joystick into a `pixels` frame buffer.
pub struct Renderer {
    window: Arc<Window>,
    pixels: Option<Pixels<'static>>,
    viewport: Viewport,
    warned_missing_frames: HashSet<String>,
    draw_indices: Vec<usize>,
}

impl Renderer {
    pub fn new(window: Arc<Window>) -> Result<Self, Error> {
        let size = window.inner_size();
        let pixels = Self::build_pixels(Arc::clone(&window), size.width, size.height)?;
        Ok(Self {
            window,
            pixels: Some(pixels),
            viewport: Viewport {
                width: size.width,
                height: size.height,
            },
            warned_missing_frames: HashSet::new(),
            draw_indices: Vec::new(),
        })
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), Error> {
        if width == 0 || height == 0 || self.pixels.is_none() {
            return Ok(());
        }
        self.pixels = Some(Self::build_pixels(Arc::clone(&self.window), width, height)?);
        self.viewport = Viewport { width, height };
        Ok(())
    }

    /// Drops the GPU surface. Later draws are no-ops.
    pub fn release(&mut self) {
        if self.pixels.take().is_some() {
            info!(
                width = self.viewport.width,
                height = self.viewport.height,
                "renderer_released"
            );
        }
    }

    fn build_pixels(
        window: Arc<Window>,
        width: u32,
        height: u32,
    ) -> Result<Pixels<'static>, Error> {
        let surface = SurfaceTexture::new(width.max(1), height.max(1), window);
        Pixels::new(width.max(1), height.max(1), surface)
    }

    pub(crate) fn render_frame(
        &mut self,
        world: &SceneWorld,
        phase: RuntimePhase,
        joystick: Option<&VirtualJoystick>,
    ) -> Result<(), Error> {
        let Some(pixels) = self.pixels.as_mut() else {
            return Ok(());
        };
        let width = self.viewport.width;
        let height = self.viewport.height;
        let frame = pixels.frame_mut();

        match phase {
            RuntimePhase::Loading => clear(frame, CLEAR_COLOR_LOADING),
            RuntimePhase::Failed => clear(frame, CLEAR_COLOR_FAILED),
            RuntimePhase::Ready => {
                clear(frame, CLEAR_COLOR_WORLD);
                if let Some(atlases) = world.atlases() {
                    draw_ground(
                        frame,
                        width,
                        height,
                        world,
                        atlases,
                        &mut self.warned_missing_frames,
                    );
                    collect_sorted_visible_entity_draw_indices(
                        world,
                        atlases,
                        Viewport { width, height },
                        &mut self.draw_indices,
                    );
                    for &index in &self.draw_indices {
                        draw_entity(
                            frame,
                            width,
                            height,
                            world,
                            &world.entities()[index],
                            atlases,
                            &mut self.warned_missing_frames,
                        );
                    }
                }
                for particle in world.particles() {
                    draw_particle(frame, width, height, particle);
                }
                if let Some(joystick) = joystick {
                    draw_joystick(frame, width, height, joystick);
                }
            }
        }

        pixels.render()
    }
}

fn clear(frame: &mut [u8], color: [u8; 4]) {
    for pixel in frame.chunks_exact_mut(4) {
        pixel.copy_from_slice(&color);
    }
}

fn draw_ground(
    frame: &mut [u8],
    width: u32,
    height: u32,
    world: &SceneWorld,
    atlases: &AtlasSet,
    warned_missing_frames: &mut HashSet<String>,
) {
    let camera = world.camera();
    let ground = world.ground_layer();
    let screen = ScreenRect {
        left: 0,
        top: 0,
        right: width as i32,
        bottom: height as i32,
    };
    for tile in &ground.tiles {
        match atlases.frame(&tile.frame) {
            Some((source, atlas)) => {
                let rect = sprite_screen_rect(
                    tile.position,
                    (source.w, source.h),
                    tile.scale,
                    tile.anchor,
                    camera,
                );
                if !rects_overlap(rect, screen) {
                    continue;
                }
                blit_sprite(
                    frame,
                    width,
                    height,
                    atlas,
                    source,
                    SpritePlacement {
                        anchor_screen: world_to_screen(tile.position, camera),
                        anchor: tile.anchor,
                        pixel_scale: tile.scale * camera.zoom(),
                        rotation: 0.0,
                        alpha: 1.0,
                        tint: tile.tint,
                        flip_x: false,
                    },
                );
            }
            None => {
                warn_missing_frame_once(warned_missing_frames, &tile.frame, "ground");
                draw_tile_fallback(frame, width, height, world, tile, ground.tile_half_width);
            }
        }
    }
}

fn draw_tile_fallback(
    frame: &mut [u8],
    width: u32,
    height: u32,
    world: &SceneWorld,
    tile: &GroundTile,
    tile_half_width: f32,
) {
    let camera = world.camera();
    let center = world_to_screen(tile.position, camera);
    let half_w = tile_half_width * camera.zoom();
    let half_h = half_w * 0.5;
    if half_h <= 0.0 {
        return;
    }
    let color = match tile.tint {
        Some(tint) => tint_rgb(
            [
                tile.fallback_color[0],
                tile.fallback_color[1],
                tile.fallback_color[2],
            ],
            Some(tint),
        ),
        None => [
            tile.fallback_color[0],
            tile.fallback_color[1],
            tile.fallback_color[2],
        ],
    };
    let top = (center.y - half_h).floor() as i32;
    let bottom = (center.y + half_h).ceil() as i32;
    for y in top.max(0)..bottom.min(height as i32) {
        let dy = ((y as f32 + 0.5) - center.y).abs();
        let span = half_w * (1.0 - dy / half_h);
        if span <= 0.0 {
            continue;
        }
        let left = (center.x - span).round() as i32;
        let right = (center.x + span).round() as i32;
        for x in left.max(0)..right.min(width as i32) {
            let rgba = [color[0], color[1], color[2], 255];
            write_pixel_rgba_clipped(frame, width as usize, x, y, rgba);
        }
    }
}

fn collect_sorted_visible_entity_draw_indices(
    world: &SceneWorld,
    atlases: &AtlasSet,
    viewport: Viewport,
    out: &mut Vec<usize>,
) {
    let screen = ScreenRect {
        left: 0,
        top: 0,
        right: viewport.width as i32,
        bottom: viewport.height as i32,
    };
    out.clear();
    for (index, entity) in world.entities().iter().enumerate() {
        let visible = match atlases.frame(&entity.sprite.frame) {
            Some((source, _)) => rects_overlap(entity_screen_rect(world, entity, source), screen),
            None => true,
        };
        if visible {
            out.push(index);
        }
    }
    out.sort_by(|left, right| {
        let left_entity = &world.entities()[*left];
        let right_entity = &world.entities()[*right];
        left_entity
            .depth()
            .cmp(&right_entity.depth())
            .then_with(|| left_entity.id.cmp(&right_entity.id))
    });
}

fn entity_screen_rect(world: &SceneWorld, entity: &Entity, source: &AtlasFrame) -> ScreenRect {
    let anchor = entity.sprite.anchor.unwrap_or(source.anchor_or_default());
    let rect = sprite_screen_rect(
        entity.transform.draw_position(),
        (source.w, source.h),
        entity.sprite.scale,
        anchor,
        world.camera(),
    );
    if entity.visual.rotation == 0.0 {
        return rect;
    }
    // Rotated sprites may poke out of the unrotated box; pad by half the diagonal.
    let pad = (((rect.right - rect.left).pow(2) + (rect.bottom - rect.top).pow(2)) as f32)
        .sqrt()
        .ceil() as i32
        / 2;
    ScreenRect {
        left: rect.left - pad,
        top: rect.top - pad,
        right: rect.right + pad,
        bottom: rect.bottom + pad,
    }
}

fn draw_entity(
    frame: &mut [u8],
    width: u32,
    height: u32,
    world: &SceneWorld,
    entity: &Entity,
    atlases: &AtlasSet,
    warned_missing_frames: &mut HashSet<String>,
) {
    let camera = world.camera();
    let position = entity.transform.draw_position();
    let Some((source, atlas)) = atlases.frame(&entity.sprite.frame) else {
        warn_missing_frame_once(warned_missing_frames, &entity.sprite.frame, "entity");
        let (cx, cy) = super::world_to_screen_px(position, camera);
        draw_square(frame, width, height, cx, cy, PLACEHOLDER_HALF_SIZE_PX, PLACEHOLDER_COLOR);
        return;
    };
    let hovered = world.visual_state().hovered_entity == Some(entity.id);
    let tint = if hovered {
        Some(HOVER_TINT)
    } else {
        entity.visual.tint
    };
    blit_sprite(
        frame,
        width,
        height,
        atlas,
        source,
        SpritePlacement {
            anchor_screen: world_to_screen(position, camera),
            anchor: entity.sprite.anchor.unwrap_or(source.anchor_or_default()),
            pixel_scale: entity.sprite.scale * camera.zoom(),
            rotation: entity.visual.rotation,
            alpha: entity.visual.alpha,
            tint,
            flip_x: entity.sprite.flip_x,
        },
    );
}

fn draw_particle(frame: &mut [u8], width: u32, height: u32, particle: &ScreenParticle) {
    fill_ellipse(
        frame,
        width,
        height,
        particle.position,
        (particle.radius_x, particle.radius_y),
        particle.rotation,
        particle.color,
        particle.alpha,
    );
}

fn draw_joystick(frame: &mut [u8], width: u32, height: u32, joystick: &VirtualJoystick) {
    let center = joystick.center();
    let radius = joystick.radius();
    fill_ellipse(
        frame,
        width,
        height,
        center,
        (radius, radius),
        0.0,
        JOYSTICK_BASE_COLOR,
        JOYSTICK_BASE_ALPHA,
    );
    draw_ring(frame, width, height, center, radius, JOYSTICK_BASE_COLOR, JOYSTICK_RING_ALPHA);
    let knob_alpha = if joystick.is_active() {
        JOYSTICK_KNOB_ACTIVE_ALPHA
    } else {
        JOYSTICK_KNOB_ALPHA
    };
    let knob_radius = joystick.knob_radius();
    fill_ellipse(
        frame,
        width,
        height,
        joystick.knob_position(),
        (knob_radius, knob_radius),
        0.0,
        JOYSTICK_BASE_COLOR,
        knob_alpha,
    );
}

fn rects_overlap(a: ScreenRect, b: ScreenRect) -> bool {
    !a.is_empty()
        && !b.is_empty()
        && a.left < b.right
        && b.left < a.right
        && a.top < b.bottom
        && b.top < a.bottom
}

fn warn_missing_frame_once(warned: &mut HashSet<String>, frame: &str, layer: &'static str) {
    if !warned.insert(frame.to_string()) {
        return;
    }
    warn!(frame, layer, "renderer_frame_missing_using_placeholder");
}

fn normalized_sprite_scale(scale: f32) -> f32 {
    if scale.is_finite() && scale > 0.0 {
        scale
    } else {
        1.0
    }
}

/// Nearest-neighbour stamp of `source` with anchor-relative rotation,
/// horizontal mirroring about the anchor, multiplicative tint and alpha.
fn blit_sprite(
    frame: &mut [u8],
    width: u32,
    height: u32,
    atlas: &SpriteAtlas,
    source: &AtlasFrame,
    placement: SpritePlacement,
) {
    if source.w == 0 || source.h == 0 || width == 0 || height == 0 {
        return;
    }
    let alpha_scale = placement.alpha.clamp(0.0, 1.0);
    if alpha_scale <= 0.0 {
        return;
    }
    let scale = normalized_sprite_scale(placement.pixel_scale);
    let dst_w = source.w as f32 * scale;
    let dst_h = source.h as f32 * scale;
    let pivot = Vec2::new(placement.anchor.x * dst_w, placement.anchor.y * dst_h);
    let rotation = if placement.rotation.is_finite() {
        placement.rotation
    } else {
        0.0
    };
    let (sin, cos) = rotation.sin_cos();

    let corners = [
        Vec2::new(-pivot.x, -pivot.y),
        Vec2::new(dst_w - pivot.x, -pivot.y),
        Vec2::new(-pivot.x, dst_h - pivot.y),
        Vec2::new(dst_w - pivot.x, dst_h - pivot.y),
    ];
    let mut min = Vec2::new(f32::MAX, f32::MAX);
    let mut max = Vec2::new(f32::MIN, f32::MIN);
    for corner in corners {
        let x = placement.anchor_screen.x + corner.x * cos - corner.y * sin;
        let y = placement.anchor_screen.y + corner.x * sin + corner.y * cos;
        min = Vec2::new(min.x.min(x), min.y.min(y));
        max = Vec2::new(max.x.max(x), max.y.max(y));
    }
    let draw_left = (min.x.floor() as i32).max(0);
    let draw_top = (min.y.floor() as i32).max(0);
    let draw_right = (max.x.ceil() as i32).min(width as i32);
    let draw_bottom = (max.y.ceil() as i32).min(height as i32);
    if draw_left >= draw_right || draw_top >= draw_bottom {
        return;
    }

    let inv_scale = scale.recip();
    for out_y in draw_top..draw_bottom {
        for out_x in draw_left..draw_right {
            let dx = out_x as f32 + 0.5 - placement.anchor_screen.x;
            let dy = out_y as f32 + 0.5 - placement.anchor_screen.y;
            let mut local_x = dx * cos + dy * sin;
            let local_y = -dx * sin + dy * cos;
            if placement.flip_x {
                local_x = -local_x;
            }
            let u = (local_x + pivot.x) * inv_scale;
            let v = (local_y + pivot.y) * inv_scale;
            if u < 0.0 || v < 0.0 || u >= source.w as f32 || v >= source.h as f32 {
                continue;
            }
            let texel = atlas.pixel(source.x + u as u32, source.y + v as u32);
            if texel[3] == 0 {
                continue;
            }
            let alpha = texel[3] as f32 / 255.0 * alpha_scale;
            let color = tint_rgb([texel[0], texel[1], texel[2]], placement.tint);
            blend_pixel(frame, width as usize, out_x, out_y, color, alpha);
        }
    }
}

fn tint_rgb(color: [u8; 3], tint: Option<[u8; 3]>) -> [u8; 3] {
    match tint {
        Some(tint) => [
            ((color[0] as u16 * tint[0] as u16) / 255) as u8,
            ((color[1] as u16 * tint[1] as u16) / 255) as u8,
            ((color[2] as u16 * tint[2] as u16) / 255) as u8,
        ],
        None => color,
    }
}

#[allow(clippy::too_many_arguments)]
fn fill_ellipse(
    frame: &mut [u8],
    width: u32,
    height: u32,
    center: Vec2,
    radii: (f32, f32),
    rotation: f32,
    color: [u8; 3],
    alpha: f32,
) {
    let (rx, ry) = radii;
    if !(rx > 0.0 && ry > 0.0) || alpha <= 0.0 {
        return;
    }
    let reach = rx.max(ry);
    let (sin, cos) = rotation.sin_cos();
    let left = ((center.x - reach).floor() as i32).max(0);
    let right = ((center.x + reach).ceil() as i32).min(width as i32);
    let top = ((center.y - reach).floor() as i32).max(0);
    let bottom = ((center.y + reach).ceil() as i32).min(height as i32);
    for y in top..bottom {
        for x in left..right {
            let dx = x as f32 + 0.5 - center.x;
            let dy = y as f32 + 0.5 - center.y;
            let local_x = dx * cos + dy * sin;
            let local_y = -dx * sin + dy * cos;
            let inside = (local_x / rx).powi(2) + (local_y / ry).powi(2) <= 1.0;
            if inside {
                blend_pixel(frame, width as usize, x, y, color, alpha);
            }
        }
    }
}

fn draw_ring(
    frame: &mut [u8],
    width: u32,
    height: u32,
    center: Vec2,
    radius: f32,
    color: [u8; 3],
    alpha: f32,
) {
    let left = ((center.x - radius - 1.0).floor() as i32).max(0);
    let right = ((center.x + radius + 1.0).ceil() as i32).min(width as i32);
    let top = ((center.y - radius - 1.0).floor() as i32).max(0);
    let bottom = ((center.y + radius + 1.0).ceil() as i32).min(height as i32);
    for y in top..bottom {
        for x in left..right {
            let distance =
                Vec2::new(x as f32 + 0.5 - center.x, y as f32 + 0.5 - center.y).length();
            if (distance - radius).abs() <= 1.0 {
                blend_pixel(frame, width as usize, x, y, color, alpha);
            }
        }
    }
}

fn blend_pixel(frame: &mut [u8], width: usize, x: i32, y: i32, color: [u8; 3], alpha: f32) {
    if alpha >= 1.0 {
        write_pixel_rgba_clipped(frame, width, x, y, [color[0], color[1], color[2], 255]);
        return;
    }
    let Some(offset) = pixel_offset(frame, width, x, y) else {
        return;
    };
    let dst = &mut frame[offset..offset + 4];
    for channel in 0..3 {
        let blended = color[channel] as f32 * alpha + dst[channel] as f32 * (1.0 - alpha);
        dst[channel] = blended.round().clamp(0.0, 255.0) as u8;
    }
    dst[3] = 255;
}

fn pixel_offset(frame: &[u8], width: usize, x: i32, y: i32) -> Option<usize> {
    if x < 0 || y < 0 || x as usize >= width {
        return None;
    }
    let pixel = (y as usize).checked_mul(width)?.checked_add(x as usize)?;
    let byte_offset = pixel.checked_mul(4)?;
    let end = byte_offset.checked_add(4)?;
    (end <= frame.len()).then_some(byte_offset)
}

fn write_pixel_rgba_clipped(frame: &mut [u8], width: usize, x: i32, y: i32, color: [u8; 4]) {
    if let Some(offset) = pixel_offset(frame, width, x, y) {
        frame[offset..offset + 4].copy_from_slice(&color);
    }
}

fn draw_square(
    frame: &mut [u8],
    width: u32,
    height: u32,
    cx: i32,
    cy: i32,
    half_size: i32,
    color: [u8; 4],
) {
    for y in (cy - half_size).max(0)..=(cy + half_size).min(height as i32 - 1) {
        for x in (cx - half_size).max(0)..=(cx + half_size).min(width as i32 - 1) {
            write_pixel_rgba_clipped(frame, width as usize, x, y, color);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::{
        AnimationDesc, Camera2D, EntityKind, GridPos, IsoTransform, SpriteRef, WorldRect,
    };

    fn blank_frame(width: u32, height: u32) -> Vec<u8> {
        let mut frame = vec![0u8; width as usize * height as usize * 4];
        clear(&mut frame, [0, 0, 0, 255]);
        frame
    }

    fn pixel_at(frame: &[u8], width: u32, x: u32, y: u32) -> [u8; 4] {
        let offset = ((y * width + x) * 4) as usize;
        [
            frame[offset],
            frame[offset + 1],
            frame[offset + 2],
            frame[offset + 3],
        ]
    }

    /// Left texel red, right texel blue.
    fn two_tone_atlas() -> (SpriteAtlas, AtlasFrame) {
        let mut atlas = SpriteAtlas::solid("test", 2, 1, [200, 0, 0, 255]);
        atlas.paint(1, 0, [0, 0, 200, 255]);
        let frame = AtlasFrame {
            x: 0,
            y: 0,
            w: 2,
            h: 1,
            anchor: None,
        };
        (atlas, frame)
    }

    fn placement(anchor_screen: Vec2, scale: f32) -> SpritePlacement {
        SpritePlacement {
            anchor_screen,
            anchor: Vec2::new(0.0, 0.0),
            pixel_scale: scale,
            rotation: 0.0,
            alpha: 1.0,
            tint: None,
            flip_x: false,
        }
    }

    #[test]
    fn blit_scales_from_top_left_anchor() {
        let (atlas, source) = two_tone_atlas();
        let mut frame = blank_frame(8, 4);
        blit_sprite(&mut frame, 8, 4, &atlas, &source, placement(Vec2::new(0.0, 0.0), 2.0));

        assert_eq!(pixel_at(&frame, 8, 0, 0), [200, 0, 0, 255]);
        assert_eq!(pixel_at(&frame, 8, 1, 1), [200, 0, 0, 255]);
        assert_eq!(pixel_at(&frame, 8, 2, 0), [0, 0, 200, 255]);
        assert_eq!(pixel_at(&frame, 8, 4, 0), [0, 0, 0, 255]);
        assert_eq!(pixel_at(&frame, 8, 0, 2), [0, 0, 0, 255]);
    }

    #[test]
    fn flip_mirrors_about_anchor() {
        let (atlas, source) = two_tone_atlas();
        let mut frame = blank_frame(8, 4);
        let mut flipped = placement(Vec2::new(2.0, 0.0), 1.0);
        flipped.anchor = Vec2::new(0.5, 0.0);
        flipped.flip_x = true;
        blit_sprite(&mut frame, 8, 4, &atlas, &source, flipped);

        assert_eq!(pixel_at(&frame, 8, 1, 0), [0, 0, 200, 255]);
        assert_eq!(pixel_at(&frame, 8, 2, 0), [200, 0, 0, 255]);
    }

    #[test]
    fn alpha_and_tint_blend_over_background() {
        let (atlas, source) = two_tone_atlas();
        let mut frame = blank_frame(4, 1);
        let mut faded = placement(Vec2::new(0.0, 0.0), 1.0);
        faded.alpha = 0.5;
        faded.tint = Some([255, 255, 0]);
        blit_sprite(&mut frame, 4, 1, &atlas, &source, faded);

        assert_eq!(pixel_at(&frame, 4, 0, 0), [100, 0, 0, 255]);
        assert_eq!(pixel_at(&frame, 4, 1, 0), [0, 0, 0, 255]);
    }

    #[test]
    fn blit_clips_at_frame_edges_without_panicking() {
        let (atlas, source) = two_tone_atlas();
        let mut frame = blank_frame(4, 4);
        blit_sprite(&mut frame, 4, 4, &atlas, &source, placement(Vec2::new(-3.0, -3.0), 3.0));
        blit_sprite(&mut frame, 4, 4, &atlas, &source, placement(Vec2::new(3.0, 3.0), 3.0));
        let mut rotated = placement(Vec2::new(2.0, 2.0), 4.0);
        rotated.rotation = 1.0;
        blit_sprite(&mut frame, 4, 4, &atlas, &source, rotated);
    }

    #[test]
    fn ellipse_respects_rotation() {
        let mut frame = blank_frame(20, 20);
        fill_ellipse(
            &mut frame,
            20,
            20,
            Vec2::new(10.0, 10.0),
            (8.0, 2.0),
            std::f32::consts::FRAC_PI_2,
            [255, 255, 255],
            1.0,
        );
        assert_eq!(pixel_at(&frame, 20, 10, 3), [255, 255, 255, 255]);
        assert_eq!(pixel_at(&frame, 20, 3, 10), [0, 0, 0, 255]);
    }

    #[test]
    fn draw_order_follows_depth_then_id() {
        let mut world = SceneWorld::default();
        *world.camera_mut() = Camera2D::new(
            WorldRect::centered_on(Vec2::ZERO, 4000.0, 4000.0),
            Viewport {
                width: 800,
                height: 600,
            },
            1.0,
            2.0,
        );
        let spawn = |world: &mut SceneWorld, cell: GridPos| {
            world.spawn(
                EntityKind::Prop,
                IsoTransform {
                    cell,
                    ..IsoTransform::default()
                },
                SpriteRef::new("missing", 1.0),
                AnimationDesc::None,
            )
        };
        let front = spawn(&mut world, GridPos::new(3, 3));
        let back = spawn(&mut world, GridPos::new(0, 1));
        let tie = spawn(&mut world, GridPos::new(1, 0));
        world.apply_pending();

        let mut indices = Vec::new();
        collect_sorted_visible_entity_draw_indices(
            &world,
            &AtlasSet::default(),
            Viewport {
                width: 800,
                height: 600,
            },
            &mut indices,
        );
        let ids: Vec<_> = indices.iter().map(|&i| world.entities()[i].id).collect();
        assert_eq!(ids, vec![back, tie, front]);
    }
}
