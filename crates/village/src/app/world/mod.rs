mod avatar;
mod interaction;
mod map;
mod particles;
mod props;
mod scene_impl;
mod world_file;

use engine::{CameraConfig, GridPos};

pub(crate) use interaction::{InteractionHandler, InteractionMap, InteractionRequested};
pub(crate) use map::{generate_map, MapData, TerrainGridError};
pub(crate) use props::default_prop_defs;
pub(crate) use scene_impl::VillageScene;
pub(crate) use world_file::{load_world_file, WorldDescription, WorldFileError};

/// Fixed dimensions of the village and where the cat starts.
#[derive(Debug, Clone)]
pub(crate) struct WorldConfig {
    pub(crate) map_size: u32,
    /// Half-width of a tile diamond in iso pixels.
    pub(crate) tile_size: f32,
    pub(crate) buffer_cells: u32,
    pub(crate) avatar_spawn: GridPos,
    pub(crate) camera: CameraConfig,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            map_size: 36,
            tile_size: 64.0,
            buffer_cells: 8,
            avatar_spawn: GridPos::new(12, 14),
            camera: CameraConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests;
