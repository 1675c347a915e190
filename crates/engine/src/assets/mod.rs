mod atlas;

pub use atlas::{load_atlas_set, AssetError, AtlasFrame, AtlasSet, AtlasSpec, SpriteAtlas};
