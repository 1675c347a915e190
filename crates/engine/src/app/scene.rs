use std::collections::HashMap;
use std::ops::{Add, Mul, Sub};
use std::sync::Arc;

use super::input::{ActionStates, InputAction};
use super::iso::{depth_key, GridPos, ELEVATION_STEP_PX};
use super::rendering::sprite_screen_rect;
use super::Camera2D;
use crate::assets::AtlasSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneCommand {
    None,
    Quit,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct InputSnapshot {
    quit_requested: bool,
    actions: ActionStates,
    interact_pressed: bool,
    cursor_position_px: Option<Vec2>,
    click_pressed: bool,
    joystick: Vec2,
    window_width: u32,
    window_height: u32,
}

impl InputSnapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    pub(crate) fn new(
        quit_requested: bool,
        actions: ActionStates,
        interact_pressed: bool,
        cursor_position_px: Option<Vec2>,
        click_pressed: bool,
        joystick: Vec2,
        window_size: (u32, u32),
    ) -> Self {
        Self {
            quit_requested,
            actions,
            interact_pressed,
            cursor_position_px,
            click_pressed,
            joystick,
            window_width: window_size.0,
            window_height: window_size.1,
        }
    }

    pub fn quit_requested(&self) -> bool {
        self.quit_requested
    }

    pub fn is_down(&self, action: InputAction) -> bool {
        self.actions.is_down(action)
    }

    pub fn with_action_down(mut self, action: InputAction, is_down: bool) -> Self {
        self.actions.set(action, is_down);
        self
    }

    pub fn with_interact_pressed(mut self, interact_pressed: bool) -> Self {
        self.interact_pressed = interact_pressed;
        self
    }

    pub fn with_cursor_position_px(mut self, cursor_position_px: Option<Vec2>) -> Self {
        self.cursor_position_px = cursor_position_px;
        self
    }

    pub fn with_click_pressed(mut self, click_pressed: bool) -> Self {
        self.click_pressed = click_pressed;
        self
    }

    pub fn with_joystick(mut self, joystick: Vec2) -> Self {
        self.joystick = joystick;
        self
    }

    pub fn with_window_size(mut self, window_size: (u32, u32)) -> Self {
        self.window_width = window_size.0;
        self.window_height = window_size.1;
        self
    }

    /// Unit vector from held movement keys; opposite keys cancel.
    pub fn keyboard_intent(&self) -> Vec2 {
        self.actions.intent_vector()
    }

    pub fn joystick(&self) -> Vec2 {
        self.joystick
    }

    pub fn interact_pressed(&self) -> bool {
        self.interact_pressed
    }

    pub fn cursor_position_px(&self) -> Option<Vec2> {
        self.cursor_position_px
    }

    /// A pointer press released without dragging, this tick.
    pub fn click_pressed(&self) -> bool {
        self.click_pressed
    }

    pub fn window_size(&self) -> (u32, u32) {
        (self.window_width, self.window_height)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn length(self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    /// Scales down to `max_len` when longer; shorter vectors pass through.
    pub fn clamp_length(self, max_len: f32) -> Self {
        let len = self.length();
        if len > max_len && len > 0.0 {
            self * (max_len / len)
        } else {
            self
        }
    }
}

impl Add for Vec2 {
    type Output = Vec2;

    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vec2 {
    type Output = Vec2;

    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f32> for Vec2 {
    type Output = Vec2;

    fn mul(self, rhs: f32) -> Vec2 {
        Vec2::new(self.x * rhs, self.y * rhs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Prop,
    Avatar,
}

/// Where an entity stands. `position` is the logical iso point; `offset` is
/// purely visual (jitter) and never affects collision or depth.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct IsoTransform {
    pub cell: GridPos,
    pub position: Vec2,
    pub elevation: i32,
    pub offset: Vec2,
}

impl IsoTransform {
    pub fn draw_position(&self) -> Vec2 {
        Vec2 {
            x: self.position.x + self.offset.x,
            y: self.position.y + self.offset.y - self.elevation as f32 * ELEVATION_STEP_PX,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpriteRef {
    pub frame: String,
    pub scale: f32,
    /// Overrides the atlas anchor when set.
    pub anchor: Option<Vec2>,
    pub flip_x: bool,
}

impl SpriteRef {
    pub fn new(frame: impl Into<String>, scale: f32) -> Self {
        Self {
            frame: frame.into(),
            scale,
            anchor: None,
            flip_x: false,
        }
    }

    pub fn with_anchor(mut self, anchor: Vec2) -> Self {
        self.anchor = Some(anchor);
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AnimationDesc {
    #[default]
    None,
    Sway,
    Flicker,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Visual {
    pub alpha: f32,
    pub rotation: f32,
    pub tint: Option<[u8; 3]>,
}

impl Default for Visual {
    fn default() -> Self {
        Self {
            alpha: 1.0,
            rotation: 0.0,
            tint: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub id: EntityId,
    pub kind: EntityKind,
    pub transform: IsoTransform,
    pub sprite: SpriteRef,
    pub animation: AnimationDesc,
    pub visual: Visual,
    pub interactive: bool,
    depth: i64,
}

impl Entity {
    pub fn depth(&self) -> i64 {
        self.depth
    }

    fn refresh_depth(&mut self) {
        self.depth = depth_key(
            self.transform.cell.x,
            self.transform.cell.y,
            self.transform.elevation,
        );
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroundTile {
    pub position: Vec2,
    pub frame: String,
    pub scale: f32,
    pub anchor: Vec2,
    pub tint: Option<[u8; 3]>,
    /// Diamond colour used when the frame is unavailable.
    pub fallback_color: [u8; 4],
}

/// Static terrain, built once and drawn beneath every entity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroundLayer {
    pub tile_half_width: f32,
    pub tiles: Vec<GroundTile>,
}

/// Screen-space ellipse drawn above the world.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenParticle {
    pub position: Vec2,
    pub rotation: f32,
    pub radius_x: f32,
    pub radius_y: f32,
    pub color: [u8; 3],
    pub alpha: f32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SceneVisualState {
    pub hovered_entity: Option<EntityId>,
}

#[derive(Debug, Default)]
pub struct EntityIdAllocator {
    next: u64,
}

impl EntityIdAllocator {
    pub fn allocate(&mut self) -> EntityId {
        let id = EntityId(self.next);
        self.next = self.next.saturating_add(1);
        id
    }
}

/// Entity side table plus the shared scene resources a frame needs.
#[derive(Debug, Default)]
pub struct SceneWorld {
    allocator: EntityIdAllocator,
    entities: Vec<Entity>,
    /// Position of each live entity in `entities`.
    index: HashMap<EntityId, usize>,
    pending_spawns: Vec<Entity>,
    pending_despawns: Vec<EntityId>,
    camera: Camera2D,
    ground: GroundLayer,
    particles: Vec<ScreenParticle>,
    atlases: Option<Arc<AtlasSet>>,
    visual_state: SceneVisualState,
}

impl SceneWorld {
    pub fn spawn(
        &mut self,
        kind: EntityKind,
        transform: IsoTransform,
        sprite: SpriteRef,
        animation: AnimationDesc,
    ) -> EntityId {
        let id = self.allocator.allocate();
        let mut entity = Entity {
            id,
            kind,
            transform,
            sprite,
            animation,
            visual: Visual::default(),
            interactive: false,
            depth: 0,
        };
        entity.refresh_depth();
        self.pending_spawns.push(entity);
        id
    }

    pub fn despawn(&mut self, id: EntityId) -> bool {
        let exists_now = self.index.contains_key(&id);
        let pending_spawn = self.pending_spawns.iter().any(|entity| entity.id == id);
        if !exists_now && !pending_spawn {
            return false;
        }
        self.pending_despawns.push(id);
        true
    }

    pub fn apply_pending(&mut self) {
        if !self.pending_despawns.is_empty() {
            self.pending_despawns.sort();
            self.pending_despawns.dedup();
            let pending = &self.pending_despawns;
            self.entities
                .retain(|entity| pending.binary_search(&entity.id).is_err());
            self.pending_spawns
                .retain(|entity| pending.binary_search(&entity.id).is_err());
            if let Some(hovered) = self.visual_state.hovered_entity {
                if pending.binary_search(&hovered).is_ok() {
                    self.visual_state.hovered_entity = None;
                }
            }
            self.pending_despawns.clear();
            self.reindex();
        }
        if !self.pending_spawns.is_empty() {
            self.entities.append(&mut self.pending_spawns);
            self.sort_by_depth();
        }
    }

    /// Recomputes every depth key and orders the object layer back to front.
    /// Ties keep spawn order.
    pub fn sort_by_depth(&mut self) {
        for entity in &mut self.entities {
            entity.refresh_depth();
        }
        self.entities
            .sort_by(|left, right| left.depth.cmp(&right.depth).then(left.id.cmp(&right.id)));
        self.reindex();
    }

    fn reindex(&mut self) {
        self.index.clear();
        self.index.extend(
            self.entities
                .iter()
                .enumerate()
                .map(|(position, entity)| (entity.id, position)),
        );
    }

    /// Drops entities, ground and particles; keeps the camera and atlases.
    pub fn clear(&mut self) {
        self.entities.clear();
        self.index.clear();
        self.pending_spawns.clear();
        self.pending_despawns.clear();
        self.ground = GroundLayer::default();
        self.particles.clear();
        self.visual_state = SceneVisualState::default();
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn find_entity(&self, id: EntityId) -> Option<&Entity> {
        let position = *self.index.get(&id)?;
        self.entities.get(position).filter(|entity| entity.id == id)
    }

    pub fn find_entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        let position = *self.index.get(&id)?;
        self.entities.get_mut(position).filter(|entity| entity.id == id)
    }

    pub fn camera(&self) -> &Camera2D {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera2D {
        &mut self.camera
    }

    pub fn set_ground_layer(&mut self, ground: GroundLayer) {
        self.ground = ground;
    }

    pub fn ground_layer(&self) -> &GroundLayer {
        &self.ground
    }

    pub fn particles(&self) -> &[ScreenParticle] {
        &self.particles
    }

    pub fn particles_mut(&mut self) -> &mut Vec<ScreenParticle> {
        &mut self.particles
    }

    pub fn set_atlases(&mut self, atlases: Arc<AtlasSet>) {
        self.atlases = Some(atlases);
    }

    pub fn atlases(&self) -> Option<&AtlasSet> {
        self.atlases.as_deref()
    }

    pub fn set_hovered_visual(&mut self, hovered: Option<EntityId>) {
        self.visual_state.hovered_entity = hovered;
    }

    pub fn visual_state(&self) -> &SceneVisualState {
        &self.visual_state
    }

    /// Topmost (greatest depth, then latest spawn) entity whose sprite
    /// bounds contain `cursor_px` and that passes `filter`.
    pub fn pick_topmost_at_screen<F>(&self, cursor_px: Vec2, filter: F) -> Option<EntityId>
    where
        F: Fn(&Entity) -> bool,
    {
        let atlases = self.atlases()?;
        self.entities
            .iter()
            .filter(|entity| filter(entity))
            .filter(|entity| {
                let Some((frame, _)) = atlases.frame(&entity.sprite.frame) else {
                    return false;
                };
                let anchor = entity.sprite.anchor.unwrap_or(frame.anchor_or_default());
                sprite_screen_rect(
                    entity.transform.draw_position(),
                    (frame.w, frame.h),
                    entity.sprite.scale,
                    anchor,
                    &self.camera,
                )
                .contains(cursor_px)
            })
            .max_by(|left, right| left.depth.cmp(&right.depth).then(left.id.cmp(&right.id)))
            .map(|entity| entity.id)
    }
}

pub trait Scene {
    fn load(&mut self, world: &mut SceneWorld);
    fn update(
        &mut self,
        fixed_dt_seconds: f32,
        input: &InputSnapshot,
        world: &mut SceneWorld,
    ) -> SceneCommand;
    fn unload(&mut self, world: &mut SceneWorld);
}

pub(crate) struct SceneRuntime {
    scene: Box<dyn Scene>,
    world: SceneWorld,
    is_loaded: bool,
}

impl SceneRuntime {
    pub(crate) fn new(scene: Box<dyn Scene>, camera: Camera2D) -> Self {
        Self {
            scene,
            world: SceneWorld {
                camera,
                ..SceneWorld::default()
            },
            is_loaded: false,
        }
    }

    pub(crate) fn load(&mut self, atlases: Arc<AtlasSet>) {
        if self.is_loaded {
            return;
        }
        self.world.set_atlases(atlases);
        self.scene.load(&mut self.world);
        self.world.apply_pending();
        self.is_loaded = true;
    }

    pub(crate) fn update(&mut self, fixed_dt_seconds: f32, input: &InputSnapshot) -> SceneCommand {
        if !self.is_loaded {
            return SceneCommand::None;
        }
        let command = self.scene.update(fixed_dt_seconds, input, &mut self.world);
        self.world.apply_pending();
        command
    }

    pub(crate) fn unload(&mut self) {
        if !self.is_loaded {
            return;
        }
        self.scene.unload(&mut self.world);
        self.world.clear();
        self.is_loaded = false;
    }

    pub(crate) fn is_loaded(&self) -> bool {
        self.is_loaded
    }

    pub(crate) fn world(&self) -> &SceneWorld {
        &self.world
    }

    pub(crate) fn world_mut(&mut self) -> &mut SceneWorld {
        &mut self.world
    }
}
