use engine::{grid_to_iso, iso_to_grid, GridPos, IsoTransform, SpriteRef, Vec2};

use super::map::CollisionMap;

const WALK_SPEED_PX_PER_SECOND: f32 = 240.0;
const INTENT_DEAD_ZONE: f32 = 0.1;
const SIT_AFTER_IDLE_SECONDS: f32 = 3.0;
const IDLE_TIMER_EPSILON: f32 = 1e-4;
const FRAMES_PER_SECOND: f32 = 60.0;
const WALK_FRAMES: u32 = 11;
const WALK_FRAMES_PER_TICK: f32 = 0.15;
const SIT_FRAMES: u32 = 3;
const SIT_FRAMES_PER_TICK: f32 = 0.08;
const AVATAR_SCALE: f32 = 0.5;
const AVATAR_ANCHOR: Vec2 = Vec2 { x: 0.5, y: 0.85 };

/// Eight compass facings in screen space; north is up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) enum Facing {
    North,
    NorthEast,
    East,
    SouthEast,
    #[default]
    South,
    SouthWest,
    West,
    NorthWest,
}

impl Facing {
    /// Facing for a screen-space velocity, `None` when it is zero.
    pub(crate) fn from_velocity(velocity: Vec2) -> Option<Self> {
        let sign = |value: f32| -> i8 {
            if value > 0.0 {
                1
            } else if value < 0.0 {
                -1
            } else {
                0
            }
        };
        match (sign(velocity.x), sign(velocity.y)) {
            (0, -1) => Some(Facing::North),
            (1, -1) => Some(Facing::NorthEast),
            (1, 0) => Some(Facing::East),
            (1, 1) => Some(Facing::SouthEast),
            (0, 1) => Some(Facing::South),
            (-1, 1) => Some(Facing::SouthWest),
            (-1, 0) => Some(Facing::West),
            (-1, -1) => Some(Facing::NorthWest),
            _ => None,
        }
    }

    /// Sheet art faces west; east-facing poses are mirrored.
    pub(crate) fn faces_east(self) -> bool {
        matches!(self, Facing::NorthEast | Facing::East | Facing::SouthEast)
    }

    /// Column of the turnaround row holding this facing's standing pose.
    pub(crate) fn idle_column(self) -> u32 {
        match self {
            Facing::South => 0,
            Facing::SouthWest => 1,
            Facing::West => 3,
            Facing::NorthWest => 4,
            Facing::North => 5,
            Facing::NorthEast => 7,
            Facing::East => 8,
            Facing::SouthEast => 10,
        }
    }

    pub(crate) fn name(self) -> &'static str {
        match self {
            Facing::North => "north",
            Facing::NorthEast => "north_east",
            Facing::East => "east",
            Facing::SouthEast => "south_east",
            Facing::South => "south",
            Facing::SouthWest => "south_west",
            Facing::West => "west",
            Facing::NorthWest => "north_west",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) enum AnimState {
    #[default]
    Idle,
    Walk,
    Sit,
}

/// Keyboard and joystick intents summed, then clamped to unit length.
pub(crate) fn combined_intent(keyboard: Vec2, joystick: Vec2) -> Vec2 {
    (keyboard + joystick).clamp_length(1.0)
}

/// The player's cat: continuous iso position, facing and pose.
#[derive(Debug, Clone)]
pub(crate) struct AvatarController {
    position: Vec2,
    tile_size: f32,
    map_size: u32,
    facing: Facing,
    state: AnimState,
    idle_seconds: f32,
    frame_phase: f32,
}

impl AvatarController {
    pub(crate) fn new(spawn: GridPos, tile_size: f32, map_size: u32) -> Self {
        let spawn = spawn.clamped_to_square(map_size);
        Self {
            position: grid_to_iso(spawn.x as f32, spawn.y as f32, tile_size),
            tile_size,
            map_size,
            facing: Facing::default(),
            state: AnimState::Idle,
            idle_seconds: 0.0,
            frame_phase: 0.0,
        }
    }

    pub(crate) fn position(&self) -> Vec2 {
        self.position
    }

    pub(crate) fn cell(&self) -> GridPos {
        iso_to_grid(self.position, self.tile_size)
    }

    pub(crate) fn facing(&self) -> Facing {
        self.facing
    }

    pub(crate) fn state(&self) -> AnimState {
        self.state
    }

    /// Test hook for placing the avatar at an exact iso point.
    #[cfg(test)]
    pub(crate) fn teleport(&mut self, position: Vec2) {
        self.position = position;
    }

    /// One fixed step: move with wall sliding, clamp, then advance the pose.
    pub(crate) fn update(&mut self, intent: Vec2, dt_seconds: f32, collision: &CollisionMap) {
        let intent = intent.clamp_length(1.0);
        let moving = intent.length() > INTENT_DEAD_ZONE;
        let velocity = if moving {
            intent * (WALK_SPEED_PX_PER_SECOND * dt_seconds)
        } else {
            Vec2::ZERO
        };

        if moving {
            self.resolve_movement(velocity, collision);
        }
        self.clamp_to_grid();
        self.advance_pose(moving, velocity, dt_seconds);
    }

    fn resolve_movement(&mut self, velocity: Vec2, collision: &CollisionMap) {
        let start_cell = self.cell();

        let try_x = Vec2::new(self.position.x + velocity.x, self.position.y);
        if self.may_enter(try_x, start_cell, collision) {
            self.position = try_x;
        }

        let try_y = Vec2::new(self.position.x, self.position.y + velocity.y);
        if self.may_enter(try_y, start_cell, collision) {
            self.position = try_y;
        }
    }

    /// Staying inside the starting cell is always allowed; a different cell
    /// must be in bounds and walkable.
    fn may_enter(&self, candidate: Vec2, start_cell: GridPos, collision: &CollisionMap) -> bool {
        let cell = iso_to_grid(candidate, self.tile_size);
        cell == start_cell || (cell.in_square(self.map_size) && collision.is_walkable(cell))
    }

    fn clamp_to_grid(&mut self) {
        let cell = self.cell();
        if cell.in_square(self.map_size) {
            return;
        }
        let safe = cell.clamped_to_square(self.map_size);
        self.position = grid_to_iso(safe.x as f32, safe.y as f32, self.tile_size);
    }

    fn advance_pose(&mut self, moving: bool, velocity: Vec2, dt_seconds: f32) {
        let frames = dt_seconds * FRAMES_PER_SECOND;
        if moving {
            if let Some(facing) = Facing::from_velocity(velocity) {
                self.facing = facing;
            }
            self.idle_seconds = 0.0;
            self.set_state(AnimState::Walk);
            self.frame_phase += WALK_FRAMES_PER_TICK * frames;
            return;
        }

        self.idle_seconds += dt_seconds;
        match self.state {
            AnimState::Sit => {
                self.frame_phase += SIT_FRAMES_PER_TICK * frames;
            }
            _ if self.idle_seconds + IDLE_TIMER_EPSILON >= SIT_AFTER_IDLE_SECONDS => {
                self.set_state(AnimState::Sit);
            }
            _ => self.set_state(AnimState::Idle),
        }
    }

    fn set_state(&mut self, state: AnimState) {
        if self.state != state {
            self.state = state;
            self.frame_phase = 0.0;
        }
    }

    pub(crate) fn frame_name(&self) -> String {
        match self.state {
            AnimState::Walk => format!("cat_walk_{}", cycle_frame(self.frame_phase, WALK_FRAMES)),
            AnimState::Sit => format!("cat_sit_{}", cycle_frame(self.frame_phase, SIT_FRAMES)),
            AnimState::Idle => format!("cat_turn_{}", self.facing.idle_column()),
        }
    }

    pub(crate) fn sprite(&self) -> SpriteRef {
        let mut sprite =
            SpriteRef::new(self.frame_name(), AVATAR_SCALE).with_anchor(AVATAR_ANCHOR);
        sprite.flip_x = self.facing.faces_east();
        sprite
    }

    pub(crate) fn transform(&self, elevation: i32) -> IsoTransform {
        IsoTransform {
            cell: self.cell(),
            position: self.position,
            elevation,
            offset: Vec2::ZERO,
        }
    }
}

fn cycle_frame(phase: f32, frame_count: u32) -> u32 {
    if !phase.is_finite() || phase < 0.0 || frame_count == 0 {
        return 0;
    }
    (phase.floor() as u64 % frame_count as u64) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f32 = 1.0 / 60.0;

    fn avatar_at(cell: GridPos) -> (AvatarController, CollisionMap) {
        (AvatarController::new(cell, 64.0, 36), CollisionMap::open(36))
    }

    #[test]
    fn walks_four_pixels_per_frame() {
        let (mut avatar, collision) = avatar_at(GridPos::new(12, 14));
        let start = avatar.position();
        avatar.update(Vec2::new(1.0, 0.0), DT, &collision);
        assert!((avatar.position().x - start.x - 4.0).abs() < 1e-3);
        assert_eq!(avatar.position().y, start.y);
        assert_eq!(avatar.state(), AnimState::Walk);
        assert_eq!(avatar.facing(), Facing::East);
    }

    #[test]
    fn dead_zone_intent_does_not_move() {
        let (mut avatar, collision) = avatar_at(GridPos::new(12, 14));
        let start = avatar.position();
        avatar.update(Vec2::new(0.05, 0.05), DT, &collision);
        assert_eq!(avatar.position(), start);
        assert_eq!(avatar.state(), AnimState::Idle);
    }

    #[test]
    fn facing_follows_velocity_signs_and_persists() {
        let (mut avatar, collision) = avatar_at(GridPos::new(12, 14));
        avatar.update(Vec2::new(-0.7, -0.7), DT, &collision);
        assert_eq!(avatar.facing(), Facing::NorthWest);
        assert!(!avatar.sprite().flip_x);

        avatar.update(Vec2::new(0.7, 0.7), DT, &collision);
        assert_eq!(avatar.facing(), Facing::SouthEast);
        assert!(avatar.sprite().flip_x);

        avatar.update(Vec2::ZERO, DT, &collision);
        assert_eq!(avatar.facing(), Facing::SouthEast);
        assert_eq!(avatar.frame_name(), "cat_turn_10");
    }

    #[test]
    fn blocked_cell_is_not_entered() {
        let (mut avatar, mut collision) = avatar_at(GridPos::new(12, 14));
        collision.block(GridPos::new(13, 14));
        for _ in 0..120 {
            avatar.update(Vec2::new(1.0, 0.5).clamp_length(1.0), DT, &collision);
            assert_ne!(avatar.cell(), GridPos::new(13, 14));
        }
    }

    #[test]
    fn out_of_bounds_position_snaps_to_nearest_cell() {
        let (mut avatar, collision) = avatar_at(GridPos::new(0, 0));
        avatar.teleport(grid_to_iso(-3.0, 2.0, 64.0));
        avatar.update(Vec2::ZERO, DT, &collision);
        assert_eq!(avatar.position(), grid_to_iso(0.0, 2.0, 64.0));
        assert_eq!(avatar.cell(), GridPos::new(0, 2));
    }

    #[test]
    fn walk_cycle_advances_at_fixed_rate() {
        let (mut avatar, collision) = avatar_at(GridPos::new(12, 14));
        for _ in 0..6 {
            avatar.update(Vec2::new(0.0, 1.0), DT, &collision);
        }
        // 6 ticks * 0.15 = 0.9, the seventh crosses into the next frame.
        assert_eq!(avatar.frame_name(), "cat_walk_0");
        avatar.update(Vec2::new(0.0, 1.0), DT, &collision);
        assert_eq!(avatar.frame_name(), "cat_walk_1");
    }

    #[test]
    fn combined_intent_is_clamped() {
        let intent = combined_intent(Vec2::new(1.0, 0.0), Vec2::new(1.0, 0.0));
        assert_eq!(intent, Vec2::new(1.0, 0.0));
        let partial = combined_intent(Vec2::ZERO, Vec2::new(0.3, 0.0));
        assert_eq!(partial, Vec2::new(0.3, 0.0));
    }
}
