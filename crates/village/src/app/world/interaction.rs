use std::collections::BTreeMap;
use std::fmt;

use engine::{EntityId, GridPos, InputSnapshot, SceneWorld};
use serde::{Serialize, Serializer};
use tracing::{debug, info};

const INTERACT_REACH_CELLS: u32 = 1;

/// What the host should open when a location is activated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) enum InteractionTag {
    Gallery,
    GameRoom,
    CatRoom,
    Tavern,
}

impl InteractionTag {
    pub(crate) const ALL: [InteractionTag; 4] = [
        InteractionTag::Gallery,
        InteractionTag::GameRoom,
        InteractionTag::CatRoom,
        InteractionTag::Tavern,
    ];

    pub(crate) fn name(self) -> &'static str {
        match self {
            InteractionTag::Gallery => "gallery",
            InteractionTag::GameRoom => "gameRoom",
            InteractionTag::CatRoom => "catRoom",
            InteractionTag::Tavern => "tavern",
        }
    }

    pub(crate) fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tag| tag.name() == name)
    }
}

/// Grid coordinate of an interactive prop, rendered as `"x,y"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct LocationKey {
    pub(crate) x: i32,
    pub(crate) y: i32,
}

impl LocationKey {
    pub(crate) const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    fn cell(self) -> GridPos {
        GridPos::new(self.x, self.y)
    }
}

impl From<GridPos> for LocationKey {
    fn from(cell: GridPos) -> Self {
        Self::new(cell.x, cell.y)
    }
}

impl fmt::Display for LocationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.x, self.y)
    }
}

impl Serialize for LocationKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Event handed to the host callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct InteractionRequested {
    pub(crate) location_key: LocationKey,
    pub(crate) interaction_tag: InteractionTag,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct InteractionMap {
    entries: BTreeMap<LocationKey, InteractionTag>,
}

impl InteractionMap {
    pub(crate) fn default_village() -> Self {
        let mut map = Self::default();
        map.insert(LocationKey::new(8, 8), InteractionTag::Gallery);
        map.insert(LocationKey::new(28, 6), InteractionTag::GameRoom);
        map.insert(LocationKey::new(6, 28), InteractionTag::CatRoom);
        map.insert(LocationKey::new(28, 28), InteractionTag::Tavern);
        map
    }

    pub(crate) fn insert(
        &mut self,
        key: LocationKey,
        tag: InteractionTag,
    ) -> Option<InteractionTag> {
        self.entries.insert(key, tag)
    }

    pub(crate) fn get(&self, key: LocationKey) -> Option<InteractionTag> {
        self.entries.get(&key).copied()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

pub(crate) type InteractionHandler = Box<dyn FnMut(&InteractionRequested)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct InteractionTarget {
    entity: EntityId,
    key: LocationKey,
    tag: InteractionTag,
}

/// Routes pointer and interact-key activations on props to the host.
pub(crate) struct InteractionDispatcher {
    map: InteractionMap,
    targets: Vec<InteractionTarget>,
    hovered: Option<EntityId>,
    handler: InteractionHandler,
}

impl InteractionDispatcher {
    pub(crate) fn new(map: InteractionMap, handler: InteractionHandler) -> Self {
        Self {
            map,
            targets: Vec::new(),
            hovered: None,
            handler,
        }
    }

    /// Records the prop entity standing on `cell`; returns whether the map
    /// has an interaction for it.
    pub(crate) fn register_prop(&mut self, entity: EntityId, cell: GridPos) -> bool {
        let key = LocationKey::from(cell);
        let Some(tag) = self.map.get(key) else {
            return false;
        };
        self.targets.push(InteractionTarget { entity, key, tag });
        true
    }

    pub(crate) fn clear(&mut self) {
        self.targets.clear();
        self.hovered = None;
    }

    pub(crate) fn target_count(&self) -> usize {
        self.targets.len()
    }

    pub(crate) fn update(
        &mut self,
        input: &InputSnapshot,
        world: &mut SceneWorld,
        avatar: GridPos,
    ) {
        let picked = input
            .cursor_position_px()
            .and_then(|cursor| world.pick_topmost_at_screen(cursor, |entity| entity.interactive));
        let picked_target = picked.and_then(|entity| self.target_for(entity));

        let hovered = picked_target.map(|target| target.entity);
        if hovered != self.hovered {
            self.hovered = hovered;
            world.set_hovered_visual(hovered);
        }

        if input.click_pressed() {
            match (picked, picked_target) {
                (_, Some(target)) => self.emit(target),
                (Some(entity), None) => debug!(entity = entity.0, "interaction_unmapped_prop"),
                (None, None) => {}
            }
        }

        if input.interact_pressed() {
            if let Some(target) = self.nearest_in_reach(avatar) {
                self.emit(target);
            }
        }
    }

    fn target_for(&self, entity: EntityId) -> Option<InteractionTarget> {
        self.targets
            .iter()
            .find(|target| target.entity == entity)
            .copied()
    }

    fn nearest_in_reach(&self, avatar: GridPos) -> Option<InteractionTarget> {
        self.targets
            .iter()
            .map(|target| (target.key.cell().chebyshev_distance(avatar), target))
            .filter(|(distance, _)| *distance <= INTERACT_REACH_CELLS)
            .min_by_key(|(distance, target)| (*distance, target.key))
            .map(|(_, target)| *target)
    }

    fn emit(&mut self, target: InteractionTarget) {
        let event = InteractionRequested {
            location_key: target.key,
            interaction_tag: target.tag,
        };
        info!(
            location_key = %event.location_key,
            interaction_tag = event.interaction_tag.name(),
            "interaction_requested"
        );
        (self.handler)(&event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_serializes_with_camel_case_fields() {
        let event = InteractionRequested {
            location_key: LocationKey::new(28, 6),
            interaction_tag: InteractionTag::GameRoom,
        };
        let json = serde_json::to_string(&event).expect("serialize");
        assert_eq!(json, r#"{"locationKey":"28,6","interactionTag":"gameRoom"}"#);
    }

    #[test]
    fn tag_names_round_trip() {
        for tag in InteractionTag::ALL {
            assert_eq!(InteractionTag::from_name(tag.name()), Some(tag));
        }
        assert_eq!(InteractionTag::from_name("library"), None);
    }

    #[test]
    fn default_map_covers_the_four_houses() {
        let map = InteractionMap::default_village();
        assert_eq!(map.len(), 4);
        assert_eq!(map.get(LocationKey::new(6, 28)), Some(InteractionTag::CatRoom));
        assert_eq!(map.get(LocationKey::new(18, 18)), None);
    }

    #[test]
    fn only_mapped_props_register() {
        let mut dispatcher =
            InteractionDispatcher::new(InteractionMap::default_village(), Box::new(|_| {}));
        assert!(dispatcher.register_prop(EntityId(1), GridPos::new(8, 8)));
        assert!(!dispatcher.register_prop(EntityId(2), GridPos::new(18, 18)));
        assert_eq!(dispatcher.target_count(), 1);
    }
}
