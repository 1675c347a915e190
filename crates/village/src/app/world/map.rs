use std::fmt::Write as _;

use engine::{
    grid_to_iso, AnimationDesc, GridPos, GroundLayer, GroundTile, Vec2, ELEVATION_STEP_PX,
};
use sha2::{Digest, Sha256};
use thiserror::Error;

use super::props::{filler_placement, tree_placement, Prop, PropDef, PropSource};
use super::WorldConfig;

const PLAZA_CENTER: f64 = 17.5;
const PLAZA_RADIUS: f64 = 6.0;
const PLAZA_RIM_WIDTH: f64 = 1.2;
const WATER_RADIUS: f64 = 15.0;
const WATER_NOISE_AMPLITUDE: f64 = 1.5;
const PATH_SAMPLES: u32 = 100;
const PATHS: [[(f64, f64); 4]; 2] = [
    [(0.0, 0.0), (25.0, 5.0), (5.0, 30.0), (35.0, 35.0)],
    [(35.0, 0.0), (10.0, 5.0), (30.0, 30.0), (0.0, 35.0)],
];

const BELT_MIN_DISTANCE: u32 = 3;
const TREE_THRESHOLD: f64 = 0.3;
const PINE_THRESHOLD: f64 = 0.6;
const FILLER_THRESHOLD: f64 = 0.75;
const FILLER_BUSH_THRESHOLD: f64 = 0.92;
const FILLER_FLOWERS_THRESHOLD: f64 = 0.84;

const TILE_ANCHOR: Vec2 = Vec2 { x: 0.5, y: 0.75 };
const TILE_SCALE: f32 = 0.505;
const GRASS_TINT: [u8; 3] = [0xE8, 0xF5, 0xE9];
const GRASS_TINT_THRESHOLD: f64 = 0.8;

/// `(sin(x*kx + y*ky) * amplitude) mod 1`, keeping the sign of the sine.
pub(crate) fn fract_hash(x: f64, y: f64, kx: f64, ky: f64, amplitude: f64) -> f64 {
    ((x * kx + y * ky).sin() * amplitude) % 1.0
}

fn texture_hash(x: i32, y: i32) -> f64 {
    fract_hash(x as f64, y as f64, 12.9898, 78.233, 43758.5453)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Terrain {
    Grass,
    Dirt,
    Stone,
    Water,
    Wood,
    Outskirts,
}

impl Terrain {
    pub(crate) const fn code(self) -> u8 {
        match self {
            Terrain::Grass => 0,
            Terrain::Dirt => 1,
            Terrain::Stone => 2,
            Terrain::Water => 3,
            Terrain::Wood => 4,
            Terrain::Outskirts => 5,
        }
    }

    #[cfg(test)]
    pub(crate) fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Terrain::Grass),
            1 => Some(Terrain::Dirt),
            2 => Some(Terrain::Stone),
            3 => Some(Terrain::Water),
            4 => Some(Terrain::Wood),
            5 => Some(Terrain::Outskirts),
            _ => None,
        }
    }

    pub(crate) fn frame_name(self) -> &'static str {
        match self {
            Terrain::Grass => "terrain_grass",
            Terrain::Dirt => "terrain_dirt",
            Terrain::Stone => "terrain_stone",
            Terrain::Water => "terrain_water",
            Terrain::Wood => "terrain_wood",
            Terrain::Outskirts => "terrain_outskirts",
        }
    }

    fn fallback_color(self) -> [u8; 4] {
        match self {
            Terrain::Grass => [106, 168, 79, 255],
            Terrain::Dirt => [166, 124, 82, 255],
            Terrain::Stone => [158, 158, 150, 255],
            Terrain::Water => [72, 132, 196, 255],
            Terrain::Wood => [140, 98, 57, 255],
            Terrain::Outskirts => [58, 92, 52, 255],
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub(crate) enum TerrainGridError {
    #[error("terrain grid size must be non-zero")]
    ZeroSize,
    #[error("terrain grid of size {size} needs {expected} cells, got {actual}")]
    ShapeMismatch {
        size: u32,
        expected: usize,
        actual: usize,
    },
}

/// Square grid of terrain codes. Anything outside is outskirts.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct TerrainGrid {
    size: u32,
    cells: Vec<Terrain>,
}

impl TerrainGrid {
    pub(crate) fn new(size: u32, cells: Vec<Terrain>) -> Result<Self, TerrainGridError> {
        if size == 0 {
            return Err(TerrainGridError::ZeroSize);
        }
        let expected = (size as usize) * (size as usize);
        if cells.len() != expected {
            return Err(TerrainGridError::ShapeMismatch {
                size,
                expected,
                actual: cells.len(),
            });
        }
        Ok(Self { size, cells })
    }

    pub(crate) fn filled(size: u32, terrain: Terrain) -> Result<Self, TerrainGridError> {
        Self::new(size, vec![terrain; (size as usize) * (size as usize)])
    }

    pub(crate) fn size(&self) -> u32 {
        self.size
    }

    pub(crate) fn get(&self, x: i32, y: i32) -> Terrain {
        self.index(x, y)
            .map(|index| self.cells[index])
            .unwrap_or(Terrain::Outskirts)
    }

    pub(crate) fn set(&mut self, x: i32, y: i32, terrain: Terrain) -> bool {
        match self.index(x, y) {
            Some(index) => {
                self.cells[index] = terrain;
                true
            }
            None => false,
        }
    }

    fn set_if_grass(&mut self, x: i32, y: i32, terrain: Terrain) {
        if self.get(x, y) == Terrain::Grass {
            self.set(x, y, terrain);
        }
    }

    fn index(&self, x: i32, y: i32) -> Option<usize> {
        if !GridPos::new(x, y).in_square(self.size) {
            return None;
        }
        Some(y as usize * self.size as usize + x as usize)
    }
}

/// Per-cell elevation levels, parallel to the terrain grid.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ElevationGrid {
    size: u32,
    levels: Vec<i32>,
}

impl ElevationGrid {
    pub(crate) fn flat(size: u32) -> Self {
        Self {
            size,
            levels: vec![0; (size as usize) * (size as usize)],
        }
    }

    pub(crate) fn level_at(&self, x: i32, y: i32) -> i32 {
        if !GridPos::new(x, y).in_square(self.size) {
            return 0;
        }
        self.levels[y as usize * self.size as usize + x as usize]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct MapData {
    pub(crate) size: u32,
    pub(crate) tile_size: f32,
    pub(crate) buffer_cells: u32,
    pub(crate) terrain: TerrainGrid,
    pub(crate) elevation: ElevationGrid,
    pub(crate) props: Vec<Prop>,
}

impl MapData {
    /// Hex SHA-256 over terrain, elevation and every prop placement.
    pub(crate) fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.size.to_le_bytes());
        hasher.update(self.tile_size.to_bits().to_le_bytes());
        hasher.update(self.buffer_cells.to_le_bytes());
        for terrain in &self.terrain.cells {
            hasher.update([terrain.code()]);
        }
        for level in &self.elevation.levels {
            hasher.update(level.to_le_bytes());
        }
        for prop in &self.props {
            hasher.update(prop.id.as_bytes());
            hasher.update([0u8]);
            for value in [
                prop.x,
                prop.y,
                prop.placement.offset.x,
                prop.placement.offset.y,
                prop.placement.scale,
                prop.placement.rotation,
            ] {
                hasher.update(value.to_bits().to_le_bytes());
            }
            hasher.update(prop.z.to_le_bytes());
            hasher.update([
                u8::from(prop.collidable),
                animation_code(prop.animation),
                source_code(prop.source),
            ]);
        }
        to_hex_lower(&hasher.finalize())
    }

    /// Diamond tiles for the playable grid plus the outskirts ring.
    pub(crate) fn ground_layer(&self) -> GroundLayer {
        let buffer = self.buffer_cells.min(i32::MAX as u32 / 4) as i32;
        let size = self.size.min(i32::MAX as u32 / 4) as i32;
        let mut tiles = Vec::with_capacity(((size + buffer * 2) as usize).pow(2));
        for y in -buffer..size + buffer {
            for x in -buffer..size + buffer {
                let terrain = self.terrain.get(x, y);
                let level = self.elevation.level_at(x, y);
                let iso = grid_to_iso(x as f32, y as f32, self.tile_size);
                let tint = (terrain == Terrain::Grass
                    && texture_hash(x, y) > GRASS_TINT_THRESHOLD)
                    .then_some(GRASS_TINT);
                tiles.push(GroundTile {
                    position: Vec2::new(iso.x, iso.y - level as f32 * ELEVATION_STEP_PX),
                    frame: terrain.frame_name().to_string(),
                    scale: TILE_SCALE,
                    anchor: TILE_ANCHOR,
                    tint,
                    fallback_color: terrain.fallback_color(),
                });
            }
        }
        GroundLayer {
            tile_half_width: self.tile_size,
            tiles,
        }
    }
}

/// Builds the village: plaza, two dirt paths, noisy water edge, then the
/// named props followed by outskirts vegetation. Same inputs, same map.
pub(crate) fn generate_map(
    config: &WorldConfig,
    prop_defs: &[PropDef],
) -> Result<MapData, TerrainGridError> {
    let mut terrain = TerrainGrid::filled(config.map_size, Terrain::Grass)?;
    let size = terrain.size().min(i32::MAX as u32 / 4) as i32;

    for y in 0..size {
        for x in 0..size {
            let dist = distance_from_plaza(x, y);
            if dist <= PLAZA_RADIUS {
                let terrain_here = if dist > PLAZA_RADIUS - PLAZA_RIM_WIDTH {
                    Terrain::Dirt
                } else {
                    Terrain::Stone
                };
                terrain.set(x, y, terrain_here);
            }
        }
    }

    for controls in &PATHS {
        for i in 0..=PATH_SAMPLES {
            let t = i as f64 / PATH_SAMPLES as f64;
            let (cx, cy) = cubic_bezier(controls, t);
            let (tx, ty) = (cx.floor() as i32, cy.floor() as i32);
            if !GridPos::new(tx, ty).in_square(terrain.size()) {
                continue;
            }
            terrain.set_if_grass(tx, ty, Terrain::Dirt);
            terrain.set_if_grass(tx + 1, ty, Terrain::Dirt);
        }
    }

    for y in 0..size {
        for x in 0..size {
            let (fx, fy) = (x as f64, y as f64);
            let noise = (fx * 0.5 + fy * 0.3).sin() + (fx * 0.3 - fy * 0.5).cos();
            if distance_from_plaza(x, y) > WATER_RADIUS + noise * WATER_NOISE_AMPLITUDE {
                terrain.set_if_grass(x, y, Terrain::Water);
            }
        }
    }

    let mut props: Vec<Prop> = prop_defs.iter().map(Prop::named).collect();
    props.extend(outskirts_vegetation(terrain.size(), config.buffer_cells));

    Ok(MapData {
        size: terrain.size(),
        tile_size: config.tile_size,
        buffer_cells: config.buffer_cells,
        elevation: ElevationGrid::flat(terrain.size()),
        terrain,
        props,
    })
}

fn outskirts_vegetation(size: u32, buffer_cells: u32) -> Vec<Prop> {
    let size = size.min(i32::MAX as u32 / 4) as i32;
    let buffer = buffer_cells.min(i32::MAX as u32 / 4) as i32;
    let mut props = Vec::new();
    for y in -buffer..size + buffer {
        for x in -buffer..size + buffer {
            let distance = distance_outside(x, y, size);
            if distance == 0 {
                continue;
            }
            let (fx, fy) = (x as f64, y as f64);
            if distance >= BELT_MIN_DISTANCE {
                let h = fract_hash(fx, fy, 45.123, 91.532, 54321.123).abs();
                if h > TREE_THRESHOLD {
                    let id = if h > PINE_THRESHOLD {
                        "tree_pine"
                    } else {
                        "tree_oak"
                    };
                    props.push(vegetation_prop(id, x, y, PropSource::Vegetation));
                }
            } else {
                let h2 = texture_hash(x, y).abs();
                if h2 > FILLER_THRESHOLD {
                    let id = if h2 > FILLER_BUSH_THRESHOLD {
                        "filler_bush"
                    } else if h2 > FILLER_FLOWERS_THRESHOLD {
                        "filler_flowers"
                    } else {
                        "filler_grass"
                    };
                    props.push(vegetation_prop(id, x, y, PropSource::Decor));
                }
            }
        }
    }
    props
}

fn vegetation_prop(id: &str, x: i32, y: i32, source: PropSource) -> Prop {
    let placement = match source {
        PropSource::Decor => filler_placement(x, y),
        _ => tree_placement(x, y),
    };
    Prop {
        id: id.to_string(),
        x: x as f32,
        y: y as f32,
        z: 0,
        collidable: false,
        animation: AnimationDesc::None,
        source,
        placement,
    }
}

/// Chebyshev distance from the playable square; zero inside it.
fn distance_outside(x: i32, y: i32, size: i32) -> u32 {
    let axis = |value: i32| -> u32 {
        if value < 0 {
            value.unsigned_abs()
        } else if value >= size {
            (value - size + 1) as u32
        } else {
            0
        }
    };
    axis(x).max(axis(y))
}

fn distance_from_plaza(x: i32, y: i32) -> f64 {
    let dx = x as f64 - PLAZA_CENTER;
    let dy = y as f64 - PLAZA_CENTER;
    (dx * dx + dy * dy).sqrt()
}

fn cubic_bezier(controls: &[(f64, f64); 4], t: f64) -> (f64, f64) {
    let u = 1.0 - t;
    let weights = [u * u * u, 3.0 * u * u * t, 3.0 * u * t * t, t * t * t];
    controls
        .iter()
        .zip(weights)
        .fold((0.0, 0.0), |(x, y), (&(px, py), w)| (x + px * w, y + py * w))
}

/// Round-half-up cell a (possibly fractional) prop position occupies.
pub(crate) fn prop_cell(x: f32, y: f32) -> GridPos {
    let round = |value: f32| -> i32 {
        if value.is_finite() {
            (value + 0.5).floor() as i32
        } else {
            0
        }
    };
    GridPos::new(round(x), round(y))
}

/// Cells the avatar may not enter: water plus any collidable prop.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CollisionMap {
    size: u32,
    blocked: Vec<bool>,
}

impl CollisionMap {
    pub(crate) fn open(size: u32) -> Self {
        Self {
            size,
            blocked: vec![false; (size as usize) * (size as usize)],
        }
    }

    pub(crate) fn from_map(map: &MapData) -> Self {
        let mut collision = Self::open(map.size);
        let size = map.size as i32;
        for y in 0..size {
            for x in 0..size {
                if map.terrain.get(x, y) == Terrain::Water {
                    collision.block(GridPos::new(x, y));
                }
            }
        }
        for prop in map.props.iter().filter(|prop| prop.collidable) {
            collision.block(prop_cell(prop.x, prop.y));
        }
        collision
    }

    pub(crate) fn block(&mut self, cell: GridPos) {
        if cell.in_square(self.size) {
            let index = cell.y as usize * self.size as usize + cell.x as usize;
            self.blocked[index] = true;
        }
    }

    pub(crate) fn is_walkable(&self, cell: GridPos) -> bool {
        if !cell.in_square(self.size) {
            return false;
        }
        !self.blocked[cell.y as usize * self.size as usize + cell.x as usize]
    }
}

fn animation_code(animation: AnimationDesc) -> u8 {
    match animation {
        AnimationDesc::None => 0,
        AnimationDesc::Sway => 1,
        AnimationDesc::Flicker => 2,
    }
}

fn source_code(source: PropSource) -> u8 {
    match source {
        PropSource::Named => 0,
        PropSource::Vegetation => 1,
        PropSource::Decor => 2,
    }
}

fn to_hex_lower(bytes: &[u8]) -> String {
    let mut output = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(&mut output, "{byte:02x}");
    }
    output
}
