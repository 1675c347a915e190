use engine::{
    grid_to_iso, AnimationDesc, EntityId, EntityKind, InputSnapshot, IsoTransform, Scene,
    SceneCommand, SceneWorld, SpriteRef,
};
use tracing::{debug, info, warn};

use super::avatar::{combined_intent, AvatarController};
use super::interaction::{InteractionDispatcher, InteractionHandler, InteractionMap};
use super::map::{prop_cell, CollisionMap, MapData};
use super::particles::{biome_at, ParticleSystem};
use super::props::{Prop, PropSource, PROP_ANCHOR};
use super::WorldConfig;

const DECOR_ATLAS: &str = "decor";
const FRAMES_PER_SECOND: f32 = 60.0;
const ANIMATION_CLOCK_PER_FRAME: f32 = 0.02;
const SWAY_AMPLITUDE: f32 = 0.005;
const FLICKER_BASE_ALPHA: f32 = 0.85;
const FLICKER_AMPLITUDE: f32 = 0.15;

#[derive(Debug, Clone, Copy)]
struct AnimatedProp {
    entity: EntityId,
    grid_x: f32,
    animation: AnimationDesc,
}

/// The village world: generated ground and props, the cat, drifting
/// particles and house interactions.
pub(crate) struct VillageScene {
    config: WorldConfig,
    map: MapData,
    collision: CollisionMap,
    avatar: AvatarController,
    avatar_entity: Option<EntityId>,
    particles: Option<ParticleSystem>,
    animated: Vec<AnimatedProp>,
    animation_clock: f32,
    dispatcher: InteractionDispatcher,
}

impl VillageScene {
    pub(crate) fn new(
        config: WorldConfig,
        map: MapData,
        interactions: InteractionMap,
        handler: InteractionHandler,
    ) -> Self {
        let collision = CollisionMap::from_map(&map);
        let avatar = AvatarController::new(config.avatar_spawn, map.tile_size, map.size);
        Self {
            config,
            map,
            collision,
            avatar,
            avatar_entity: None,
            particles: None,
            animated: Vec::new(),
            animation_clock: 0.0,
            dispatcher: InteractionDispatcher::new(interactions, handler),
        }
    }

    fn spawn_prop(&self, world: &mut SceneWorld, prop: &Prop) -> EntityId {
        let transform = IsoTransform {
            cell: prop_cell(prop.x, prop.y),
            position: grid_to_iso(prop.x, prop.y, self.map.tile_size),
            elevation: prop.z,
            offset: prop.placement.offset,
        };
        let sprite = SpriteRef::new(prop.id.clone(), prop.placement.scale).with_anchor(PROP_ANCHOR);
        world.spawn(EntityKind::Prop, transform, sprite, prop.animation)
    }

    fn avatar_transform(&self) -> IsoTransform {
        let cell = self.avatar.cell();
        self.avatar
            .transform(self.map.elevation.level_at(cell.x, cell.y))
    }

    fn sync_avatar_entity(&self, world: &mut SceneWorld) {
        let Some(id) = self.avatar_entity else {
            return;
        };
        if let Some(entity) = world.find_entity_mut(id) {
            entity.transform = self.avatar_transform();
            entity.sprite = self.avatar.sprite();
        }
    }

    fn update_particles(&mut self, dt_seconds: f32, input: &InputSnapshot, world: &mut SceneWorld) {
        let viewport = input.window_size();
        let particles = self
            .particles
            .get_or_insert_with(|| ParticleSystem::new(viewport));
        particles.resize(viewport);

        let biome = biome_at(self.avatar.cell(), self.map.size);
        if particles.set_kind(biome.particle_kind()) {
            info!(kind = particles.kind().name(), "particle_kind_changed");
        }
        particles.update(dt_seconds);
        particles.write_screen(world.particles_mut());
    }

    fn animate_props(&mut self, dt_seconds: f32, world: &mut SceneWorld) {
        let frames = dt_seconds * FRAMES_PER_SECOND;
        self.animation_clock += ANIMATION_CLOCK_PER_FRAME * frames;
        let t = self.animation_clock;
        for prop in &self.animated {
            let Some(entity) = world.find_entity_mut(prop.entity) else {
                continue;
            };
            match prop.animation {
                AnimationDesc::Sway => {
                    entity.visual.rotation +=
                        (t + prop.grid_x * 0.5).sin() * SWAY_AMPLITUDE * frames;
                }
                AnimationDesc::Flicker => {
                    entity.visual.alpha =
                        FLICKER_BASE_ALPHA + (t * 4.0 + prop.grid_x).sin() * FLICKER_AMPLITUDE;
                }
                AnimationDesc::None => {}
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn avatar(&self) -> &AvatarController {
        &self.avatar
    }

    #[cfg(test)]
    pub(crate) fn avatar_entity(&self) -> Option<EntityId> {
        self.avatar_entity
    }

    #[cfg(test)]
    pub(crate) fn particle_system(&self) -> Option<&ParticleSystem> {
        self.particles.as_ref()
    }
}

impl Scene for VillageScene {
    fn load(&mut self, world: &mut SceneWorld) {
        world.set_ground_layer(self.map.ground_layer());

        let decor_available = world
            .atlases()
            .is_some_and(|atlases| atlases.has_atlas(DECOR_ATLAS));
        if !decor_available {
            warn!(atlas = DECOR_ATLAS, "decor_atlas_missing_skipping_filler");
        }

        let mut spawned = Vec::with_capacity(self.map.props.len());
        for prop in &self.map.props {
            if prop.source == PropSource::Decor && !decor_available {
                continue;
            }
            spawned.push((self.spawn_prop(world, prop), prop));
        }
        world.apply_pending();

        for (id, prop) in &spawned {
            let interactive = prop.collidable && prop.source == PropSource::Named;
            if let Some(entity) = world.find_entity_mut(*id) {
                entity.visual.rotation = prop.placement.rotation;
                entity.interactive = interactive;
            }
            if interactive {
                self.dispatcher.register_prop(*id, prop_cell(prop.x, prop.y));
            }
            if prop.animation != AnimationDesc::None {
                self.animated.push(AnimatedProp {
                    entity: *id,
                    grid_x: prop.x,
                    animation: prop.animation,
                });
            }
        }

        self.avatar_entity = Some(world.spawn(
            EntityKind::Avatar,
            self.avatar_transform(),
            self.avatar.sprite(),
            AnimationDesc::None,
        ));

        info!(
            props = spawned.len(),
            animated = self.animated.len(),
            interactions = self.dispatcher.target_count(),
            spawn_x = self.config.avatar_spawn.x,
            spawn_y = self.config.avatar_spawn.y,
            "village_loaded"
        );
    }

    fn update(
        &mut self,
        fixed_dt_seconds: f32,
        input: &InputSnapshot,
        world: &mut SceneWorld,
    ) -> SceneCommand {
        if input.quit_requested() {
            return SceneCommand::Quit;
        }

        let previous_cell = self.avatar.cell();
        let intent = combined_intent(input.keyboard_intent(), input.joystick());
        self.avatar.update(intent, fixed_dt_seconds, &self.collision);
        if self.avatar.cell() != previous_cell {
            debug!(
                x = self.avatar.cell().x,
                y = self.avatar.cell().y,
                facing = self.avatar.facing().name(),
                "avatar_cell_changed"
            );
        }
        self.sync_avatar_entity(world);
        world.sort_by_depth();

        self.update_particles(fixed_dt_seconds, input, world);
        self.animate_props(fixed_dt_seconds, world);
        self.dispatcher.update(input, world, self.avatar.cell());

        SceneCommand::None
    }

    fn unload(&mut self, _world: &mut SceneWorld) {
        self.dispatcher.clear();
        self.animated.clear();
        self.avatar_entity = None;
        self.particles = None;
        info!("village_unloaded");
    }
}
