use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;
use std::sync::Arc;

use engine::{
    world_to_screen, AtlasFrame, AtlasSet, EntityKind, GridPos, InputAction, InputSnapshot,
    Scene, SceneWorld, SpriteAtlas, Vec2,
};

use super::avatar::{AnimState, AvatarController};
use super::interaction::{InteractionMap, InteractionRequested, InteractionTag, LocationKey};
use super::map::{generate_map, CollisionMap, MapData};
use super::particles::{biome_at, Biome, ParticleKind, ParticleSystem};
use super::props::default_prop_defs;
use super::world_file::parse_world_document;
use super::{VillageScene, WorldConfig};

const DT: f32 = 1.0 / 60.0;

fn village_map(config: &WorldConfig) -> MapData {
    generate_map(config, &default_prop_defs()).expect("village map")
}

fn recording_scene(
    config: WorldConfig,
) -> (VillageScene, Rc<RefCell<Vec<InteractionRequested>>>) {
    let events = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&events);
    let map = village_map(&config);
    let scene = VillageScene::new(
        config,
        map,
        InteractionMap::default_village(),
        Box::new(move |event| sink.borrow_mut().push(*event)),
    );
    (scene, events)
}

fn prop_atlas(frames: &[&str]) -> Arc<AtlasSet> {
    let mut atlas = SpriteAtlas::solid("village", 100, 100, [200, 180, 160, 255]);
    for name in frames {
        atlas.insert_frame(
            *name,
            AtlasFrame {
                x: 0,
                y: 0,
                w: 100,
                h: 100,
                anchor: None,
            },
        );
    }
    let mut set = AtlasSet::default();
    set.insert(atlas);
    Arc::new(set)
}

fn tick(scene: &mut VillageScene, world: &mut SceneWorld, input: &InputSnapshot) {
    scene.update(DT, input, world);
    world.apply_pending();
}

#[test]
fn diagonal_into_water_slides_along_the_open_axis() {
    let mut collision = CollisionMap::open(36);
    collision.block(GridPos::new(11, 9));
    let mut avatar = AvatarController::new(GridPos::new(10, 10), 64.0, 36);
    avatar.teleport(Vec2::new(63.0, 640.0));
    assert_eq!(avatar.cell(), GridPos::new(10, 10));

    avatar.update(Vec2::new(1.0, 1.0).clamp_length(1.0), DT, &collision);

    assert_eq!(avatar.position().x, 63.0);
    assert!(avatar.position().y > 640.0);
    assert_ne!(avatar.cell(), GridPos::new(11, 9));
}

#[test]
fn avatar_sits_after_three_idle_seconds() {
    let collision = CollisionMap::open(36);
    let mut avatar = AvatarController::new(GridPos::new(12, 14), 64.0, 36);
    avatar.update(Vec2::new(0.0, -1.0), DT, &collision);
    assert_eq!(avatar.state(), AnimState::Walk);

    for _ in 0..179 {
        avatar.update(Vec2::ZERO, DT, &collision);
    }
    assert_eq!(avatar.state(), AnimState::Idle);

    avatar.update(Vec2::ZERO, DT, &collision);
    assert_eq!(avatar.state(), AnimState::Sit);
    assert_eq!(avatar.frame_name(), "cat_sit_0");

    for _ in 0..600 {
        avatar.update(Vec2::ZERO, DT, &collision);
    }
    assert_eq!(avatar.state(), AnimState::Sit);

    avatar.update(Vec2::new(1.0, 0.0), DT, &collision);
    assert_eq!(avatar.state(), AnimState::Walk);
}

#[test]
fn generation_is_bit_identical_across_runs() {
    let config = WorldConfig::default();
    let first = village_map(&config);
    let second = village_map(&config);
    assert_eq!(first, second);
    assert_eq!(first.fingerprint(), second.fingerprint());

    let mut moved = default_prop_defs();
    moved[0].x += 1.0;
    let other = generate_map(&config, &moved).expect("map");
    assert_ne!(first.fingerprint(), other.fingerprint());
}

#[test]
fn avatar_never_stands_on_a_blocked_cell() {
    let config = WorldConfig::default();
    let map = village_map(&config);
    let collision = CollisionMap::from_map(&map);
    let mut avatar = AvatarController::new(config.avatar_spawn, map.tile_size, map.size);
    assert!(collision.is_walkable(avatar.cell()));

    let headings = [
        Vec2::new(1.0, 0.0),
        Vec2::new(0.7, 0.7),
        Vec2::new(0.0, 1.0),
        Vec2::new(-0.7, 0.7),
        Vec2::new(-1.0, 0.0),
        Vec2::new(-0.7, -0.7),
        Vec2::new(0.0, -1.0),
        Vec2::new(0.7, -0.7),
    ];
    for step in 0..4000 {
        let heading = headings[(step / 90 + step / 7) % headings.len()];
        avatar.update(heading, DT, &collision);
        let cell = avatar.cell();
        assert!(cell.in_square(map.size), "step {step} left the map at {cell:?}");
        assert!(collision.is_walkable(cell), "step {step} entered {cell:?}");
    }
}

#[test]
fn particles_stay_within_extended_bounds() {
    let mut system = ParticleSystem::new((800, 600));
    for step in 0..5000 {
        if step == 2500 {
            system.resize((320, 240));
        }
        if step % 700 == 0 {
            let kind = [ParticleKind::Dust, ParticleKind::Petals, ParticleKind::Leaves][step % 3];
            system.set_kind(kind);
        }
        system.update(DT);
        for particle in system.particles() {
            assert!(
                system.in_bounds(particle.position),
                "step {step}: {:?}",
                particle.position
            );
        }
    }
}

#[test]
fn biome_follows_edge_band_and_plaza_disc() {
    assert_eq!(biome_at(GridPos::new(2, 20), 36), Biome::Forest);
    assert_eq!(biome_at(GridPos::new(20, 4), 36), Biome::Forest);
    assert_eq!(biome_at(GridPos::new(31, 20), 36), Biome::Forest);
    assert_eq!(biome_at(GridPos::new(30, 30), 36), Biome::Default);
    assert_eq!(biome_at(GridPos::new(17, 17), 36), Biome::Plaza);
    assert_eq!(biome_at(GridPos::new(12, 14), 36), Biome::Default);
    assert_eq!(Biome::Forest.particle_kind(), ParticleKind::Leaves);
}

#[test]
fn world_file_props_replace_the_default_layout() {
    let description = parse_world_document(
        Path::new("world.xml"),
        r#"<World><Props><Prop id="well" x="5" y="5" collidable="true"/></Props></World>"#,
    )
    .expect("parse");
    let config = WorldConfig::default();
    let props = description.props.expect("props");
    let map = generate_map(&config, &props).expect("map");
    let named: Vec<_> = map
        .props
        .iter()
        .filter(|prop| prop.source == super::props::PropSource::Named)
        .collect();
    assert_eq!(named.len(), 1);
    assert_eq!((named[0].x, named[0].y), (5.0, 5.0));
    assert!(!CollisionMap::from_map(&map).is_walkable(GridPos::new(5, 5)));
}

#[test]
fn load_spawns_props_avatar_and_ground() {
    let (mut scene, _) = recording_scene(WorldConfig::default());
    let mut world = SceneWorld::default();
    scene.load(&mut world);
    world.apply_pending();

    assert_eq!(world.ground_layer().tiles.len(), 52 * 52);
    let avatar_id = scene.avatar_entity().expect("avatar spawned");
    let avatar = world.find_entity(avatar_id).expect("avatar entity");
    assert_eq!(avatar.kind, EntityKind::Avatar);
    assert_eq!(avatar.transform.cell, GridPos::new(12, 14));

    // No decor sheet loaded, so filler props are skipped.
    assert!(world
        .entities()
        .iter()
        .all(|entity| !entity.sprite.frame.starts_with("filler_")));
    let cottage = world
        .entities()
        .iter()
        .find(|entity| entity.sprite.frame == "cottage_large")
        .expect("cottage");
    assert!(cottage.interactive);
}

#[test]
fn walking_updates_entity_depth_and_particles() {
    let (mut scene, _) = recording_scene(WorldConfig::default());
    let mut world = SceneWorld::default();
    scene.load(&mut world);
    world.apply_pending();

    let input = InputSnapshot::empty()
        .with_action_down(InputAction::MoveDown, true)
        .with_window_size((640, 480));
    for _ in 0..40 {
        tick(&mut scene, &mut world, &input);
    }

    let avatar_id = scene.avatar_entity().expect("avatar");
    let entity = world.find_entity(avatar_id).expect("entity");
    assert_eq!(entity.transform.cell, scene.avatar().cell());
    assert!(entity.sprite.frame.starts_with("cat_walk_"));
    assert_eq!(world.particles().len(), 50);
    let depths: Vec<i64> = world.entities().iter().map(|entity| entity.depth()).collect();
    assert!(depths.windows(2).all(|pair| pair[0] <= pair[1]));
    assert_eq!(
        scene.particle_system().map(|system| system.kind()),
        Some(biome_at(scene.avatar().cell(), 36).particle_kind())
    );
}

#[test]
fn joystick_alone_steers_the_avatar() {
    let (mut scene, _) = recording_scene(WorldConfig::default());
    let mut world = SceneWorld::default();
    scene.load(&mut world);
    world.apply_pending();
    let start = scene.avatar().position();

    let input = InputSnapshot::empty().with_joystick(Vec2::new(-1.0, 0.0));
    for _ in 0..10 {
        tick(&mut scene, &mut world, &input);
    }

    assert!(scene.avatar().position().x < start.x);
    assert_eq!(scene.avatar().position().y, start.y);
    assert_eq!(scene.avatar().state(), AnimState::Walk);
}

#[test]
fn interact_key_next_to_a_house_emits_its_tag() {
    let config = WorldConfig {
        avatar_spawn: GridPos::new(9, 9),
        ..WorldConfig::default()
    };
    let (mut scene, events) = recording_scene(config);
    let mut world = SceneWorld::default();
    scene.load(&mut world);
    world.apply_pending();

    tick(&mut scene, &mut world, &InputSnapshot::empty());
    assert!(events.borrow().is_empty());

    tick(
        &mut scene,
        &mut world,
        &InputSnapshot::empty().with_interact_pressed(true),
    );
    assert_eq!(
        *events.borrow(),
        vec![InteractionRequested {
            location_key: LocationKey::new(8, 8),
            interaction_tag: InteractionTag::Gallery,
        }]
    );
}

#[test]
fn interact_key_away_from_houses_does_nothing() {
    let (mut scene, events) = recording_scene(WorldConfig::default());
    let mut world = SceneWorld::default();
    scene.load(&mut world);
    world.apply_pending();

    tick(
        &mut scene,
        &mut world,
        &InputSnapshot::empty().with_interact_pressed(true),
    );
    assert!(events.borrow().is_empty());
}

#[test]
fn clicking_a_mapped_house_hovers_and_emits_while_unmapped_props_stay_inert() {
    let (mut scene, events) = recording_scene(WorldConfig::default());
    let mut world = SceneWorld::default();
    world.set_atlases(prop_atlas(&["cottage_medium", "well"]));
    scene.load(&mut world);
    world.apply_pending();

    let point_above = |world: &SceneWorld, frame: &str, cell: GridPos| {
        let entity = world
            .entities()
            .iter()
            .find(|entity| entity.sprite.frame == frame && entity.transform.cell == cell)
            .expect("prop entity");
        let anchor = world_to_screen(entity.transform.draw_position(), world.camera());
        (entity.id, Vec2::new(anchor.x, anchor.y - 4.0))
    };

    let (tavern, tavern_point) = point_above(&world, "cottage_medium", GridPos::new(28, 28));
    let hover = InputSnapshot::empty().with_cursor_position_px(Some(tavern_point));
    tick(&mut scene, &mut world, &hover);
    assert_eq!(world.visual_state().hovered_entity, Some(tavern));
    assert!(events.borrow().is_empty());

    tick(&mut scene, &mut world, &hover.with_click_pressed(true));
    assert_eq!(
        events.borrow().last().map(|event| event.interaction_tag),
        Some(InteractionTag::Tavern)
    );

    let (_, well_point) = point_above(&world, "well", GridPos::new(18, 18));
    let click_well = InputSnapshot::empty()
        .with_cursor_position_px(Some(well_point))
        .with_click_pressed(true);
    tick(&mut scene, &mut world, &click_well);
    assert_eq!(events.borrow().len(), 1);
    assert_eq!(world.visual_state().hovered_entity, None);
}
