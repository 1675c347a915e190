use std::f32::consts::TAU;

use engine::{GridPos, ScreenParticle, Vec2};

use super::map::fract_hash;

pub(crate) const PARTICLE_COUNT: usize = 50;
/// Margin around the viewport a particle may drift through before recycling.
pub(crate) const RESPAWN_MARGIN_PX: f32 = 50.0;
const FRAMES_PER_SECOND: f32 = 60.0;
const FALL_FACTOR: f32 = 0.5;
const WOBBLE_AMPLITUDE_PX: f32 = 0.5;
const WOBBLE_RATE: f32 = 0.05;
const PETAL_SPEED_FACTOR: f32 = 0.7;
const FOREST_EDGE_CELLS: i32 = 5;
const PLAZA_RADIUS_CELLS: f32 = 6.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) enum ParticleKind {
    #[default]
    Dust,
    Leaves,
    Petals,
}

impl ParticleKind {
    pub(crate) fn name(self) -> &'static str {
        match self {
            ParticleKind::Dust => "dust",
            ParticleKind::Leaves => "leaves",
            ParticleKind::Petals => "petals",
        }
    }

    fn color(self) -> [u8; 3] {
        match self {
            ParticleKind::Dust => [0xf5, 0xf5, 0xf5],
            ParticleKind::Leaves => [0xba, 0x5c, 0x12],
            ParticleKind::Petals => [0xff, 0xd1, 0xdc],
        }
    }

    fn radii(self) -> (f32, f32) {
        match self {
            ParticleKind::Dust => (1.5, 1.5),
            ParticleKind::Leaves => (4.0, 8.0),
            ParticleKind::Petals => (3.0, 5.0),
        }
    }

    fn alpha(self) -> f32 {
        match self {
            ParticleKind::Dust => 0.4,
            ParticleKind::Leaves => 0.7,
            ParticleKind::Petals => 0.8,
        }
    }

    fn speed_factor(self) -> f32 {
        match self {
            ParticleKind::Petals => PETAL_SPEED_FACTOR,
            ParticleKind::Dust | ParticleKind::Leaves => 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Biome {
    Forest,
    Plaza,
    Default,
}

impl Biome {
    pub(crate) fn particle_kind(self) -> ParticleKind {
        match self {
            Biome::Forest => ParticleKind::Leaves,
            Biome::Plaza => ParticleKind::Petals,
            Biome::Default => ParticleKind::Dust,
        }
    }
}

/// Edge band of the map is forest, the disc around the centre is plaza.
pub(crate) fn biome_at(cell: GridPos, map_size: u32) -> Biome {
    let size = map_size.min(i32::MAX as u32) as i32;
    if cell.x < FOREST_EDGE_CELLS
        || cell.y < FOREST_EDGE_CELLS
        || cell.x > size - 1 - FOREST_EDGE_CELLS
        || cell.y > size - 1 - FOREST_EDGE_CELLS
    {
        return Biome::Forest;
    }
    let center = map_size as f32 * 0.5 - 0.5;
    let dx = cell.x as f32 - center;
    let dy = cell.y as f32 - center;
    if (dx * dx + dy * dy).sqrt() <= PLAZA_RADIUS_CELLS {
        Biome::Plaza
    } else {
        Biome::Default
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Particle {
    pub(crate) position: Vec2,
    speed: f32,
    spin: f32,
    rotation: f32,
    wobble: f32,
}

/// Fixed pool of screen-space motes sharing one kind.
#[derive(Debug, Clone)]
pub(crate) struct ParticleSystem {
    particles: Vec<Particle>,
    kind: ParticleKind,
    width: f32,
    height: f32,
    serial: u64,
}

impl ParticleSystem {
    pub(crate) fn new(viewport: (u32, u32)) -> Self {
        let mut system = Self {
            particles: Vec::with_capacity(PARTICLE_COUNT),
            kind: ParticleKind::default(),
            width: viewport.0 as f32,
            height: viewport.1 as f32,
            serial: 0,
        };
        for _ in 0..PARTICLE_COUNT {
            let x = system.next_unit() * system.width;
            let y = system.next_unit() * system.height;
            let speed = 0.5 + system.next_unit() * 1.5;
            let spin = (system.next_unit() - 0.5) * 0.1;
            let rotation = system.next_unit() * TAU;
            let wobble = system.next_unit() * TAU;
            system.particles.push(Particle {
                position: Vec2::new(x, y),
                speed,
                spin,
                rotation,
                wobble,
            });
        }
        system
    }

    pub(crate) fn kind(&self) -> ParticleKind {
        self.kind
    }

    /// Switches every particle at once; position and phase carry over.
    pub(crate) fn set_kind(&mut self, kind: ParticleKind) -> bool {
        if self.kind == kind {
            return false;
        }
        self.kind = kind;
        true
    }

    pub(crate) fn resize(&mut self, viewport: (u32, u32)) {
        self.width = viewport.0 as f32;
        self.height = viewport.1 as f32;
    }

    pub(crate) fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub(crate) fn update(&mut self, dt_seconds: f32) {
        let frames = dt_seconds * FRAMES_PER_SECOND;
        let factor = self.kind.speed_factor();
        for index in 0..self.particles.len() {
            let particle = &mut self.particles[index];
            let velocity = particle.speed * factor;
            particle.position.x -= FALL_FACTOR * velocity * frames;
            particle.position.y += FALL_FACTOR * velocity * frames;
            particle.position.x += particle.wobble.sin() * WOBBLE_AMPLITUDE_PX;
            particle.rotation = (particle.rotation + particle.spin * frames) % TAU;
            particle.wobble = (particle.wobble + WOBBLE_RATE * frames) % TAU;

            if !self.in_bounds(self.particles[index].position) {
                let respawn = self.respawn_point();
                self.particles[index].position = respawn;
            }
        }
    }

    pub(crate) fn in_bounds(&self, position: Vec2) -> bool {
        position.x >= -RESPAWN_MARGIN_PX
            && position.x <= self.width + RESPAWN_MARGIN_PX
            && position.y >= -RESPAWN_MARGIN_PX
            && position.y <= self.height + RESPAWN_MARGIN_PX
    }

    /// Half of the respawns enter along the top edge, half along the right.
    fn respawn_point(&mut self) -> Vec2 {
        if self.next_unit() > 0.5 {
            Vec2::new(
                self.next_unit() * (self.width + RESPAWN_MARGIN_PX),
                -RESPAWN_MARGIN_PX,
            )
        } else {
            Vec2::new(
                self.width + RESPAWN_MARGIN_PX,
                self.next_unit() * (self.height + RESPAWN_MARGIN_PX * 2.0) - RESPAWN_MARGIN_PX,
            )
        }
    }

    pub(crate) fn write_screen(&self, out: &mut Vec<ScreenParticle>) {
        let (radius_x, radius_y) = self.kind.radii();
        let color = self.kind.color();
        let alpha = self.kind.alpha();
        out.clear();
        out.extend(self.particles.iter().map(|particle| ScreenParticle {
            position: particle.position,
            rotation: particle.rotation,
            radius_x,
            radius_y,
            color,
            alpha,
        }));
    }

    /// Deterministic `[0, 1)` draw from a running serial.
    fn next_unit(&mut self) -> f32 {
        self.serial = self.serial.wrapping_add(1);
        let value = fract_hash(self.serial as f64, 7.0, 12.9898, 78.233, 43758.5453).abs() as f32;
        value.min(1.0 - f32::EPSILON)
    }
}
