use engine::{
    resolve_app_paths, AppPaths, AtlasSpec, LoopConfig, RuntimeHandles, Scene, StartupError,
};
use thiserror::Error;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use super::world::{
    default_prop_defs, generate_map, load_world_file, InteractionHandler, InteractionMap,
    InteractionRequested, TerrainGridError, VillageScene, WorldConfig, WorldDescription,
    WorldFileError,
};

const WORLD_FILE: &str = "village/world.xml";

pub(crate) struct AppWiring {
    pub(crate) config: LoopConfig,
    pub(crate) scene: Box<dyn Scene>,
    pub(crate) handles: RuntimeHandles,
}

#[derive(Debug, Error)]
pub(crate) enum BootstrapError {
    #[error(transparent)]
    Startup(#[from] StartupError),
    #[error(transparent)]
    WorldFile(#[from] WorldFileError),
    #[error("failed to generate village map: {0}")]
    Map(#[from] TerrainGridError),
}

pub(crate) fn build_app() -> Result<AppWiring, BootstrapError> {
    init_tracing();
    info!("=== Isoworld Startup ===");

    let paths = resolve_app_paths()?;
    info!(root = %paths.root.display(), "startup");

    let world_path = paths.asset_path(WORLD_FILE);
    let description = load_world_file(&world_path)?.unwrap_or_else(|| {
        info!(path = %world_path.display(), "world_file_absent_using_defaults");
        WorldDescription::default()
    });
    let prop_defs = description.props.unwrap_or_else(default_prop_defs);
    let interactions = description
        .interactions
        .unwrap_or_else(InteractionMap::default_village);

    let world = WorldConfig::default();
    let map = generate_map(&world, &prop_defs)?;
    info!(
        size = map.size,
        props = map.props.len(),
        interactions = interactions.len(),
        fingerprint = %map.fingerprint(),
        "map_generated"
    );

    let config = LoopConfig {
        camera: world.camera,
        atlases: atlas_specs(&paths),
        ..LoopConfig::default()
    };
    let scene = VillageScene::new(world, map, interactions, host_handler());

    Ok(AppWiring {
        config,
        scene: Box::new(scene),
        handles: RuntimeHandles::default(),
    })
}

fn atlas_specs(paths: &AppPaths) -> Vec<AtlasSpec> {
    let sheet = |name: &str, stem: &str, required: bool| AtlasSpec {
        name: name.to_string(),
        image: paths.asset_path(&format!("village/{stem}.png")),
        metadata: paths.asset_path(&format!("village/{stem}.json")),
        required,
    };
    vec![
        sheet("village", "village-sprites", true),
        sheet("cat", "cat", true),
        sheet("decor", "decor", false),
    ]
}

/// Stands in for the embedding page: logs each request as the JSON
/// payload a host would receive.
fn host_handler() -> InteractionHandler {
    Box::new(|event: &InteractionRequested| match serde_json::to_string(event) {
        Ok(payload) => info!(%payload, "host_interaction_event"),
        Err(err) => warn!(error = %err, "host_interaction_event_unserializable"),
    })
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn decor_sheet_is_the_only_optional_atlas() {
        let paths = AppPaths {
            root: PathBuf::from("root"),
            base_content_dir: PathBuf::from("root").join("assets").join("base"),
        };
        let specs = atlas_specs(&paths);
        let names: Vec<_> = specs.iter().map(|spec| spec.name.as_str()).collect();
        assert_eq!(names, ["village", "cat", "decor"]);
        assert!(specs[0].required && specs[1].required && !specs[2].required);
        assert_eq!(
            specs[1].metadata,
            paths.base_content_dir.join("village").join("cat.json")
        );
    }
}
