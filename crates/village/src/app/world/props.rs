use engine::{AnimationDesc, Vec2};

use super::map::fract_hash;

/// Anchor shared by every prop sprite: bottom-centre, slightly above the base.
pub(crate) const PROP_ANCHOR: Vec2 = Vec2 { x: 0.5, y: 0.95 };

const NAMED_JITTER_PX: f32 = 10.0;
const TREE_SCALE: f32 = 0.35;
const PROP_SCALE: f32 = 0.4;
const NAMED_ROTATION_SPREAD: f32 = 0.05;
const VEGETATION_JITTER_PX: f32 = 30.0;
const TREE_SCALE_SPREAD: f32 = 0.1;
const FILLER_SCALE: f32 = 0.3;
const FILLER_SCALE_SPREAD: f32 = 0.1;

/// Where a prop came from. Decor props live on the optional decor sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PropSource {
    Named,
    Vegetation,
    Decor,
}

/// Hand-placed prop as written in the default list or the world file.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PropDef {
    pub(crate) id: String,
    pub(crate) x: f32,
    pub(crate) y: f32,
    pub(crate) z: i32,
    pub(crate) collidable: bool,
    pub(crate) animation: AnimationDesc,
}

impl PropDef {
    fn new(id: &str, x: f32, y: f32) -> Self {
        Self {
            id: id.to_string(),
            x,
            y,
            z: 0,
            collidable: false,
            animation: AnimationDesc::None,
        }
    }

    fn solid(id: &str, x: f32, y: f32) -> Self {
        Self {
            collidable: true,
            ..Self::new(id, x, y)
        }
    }

    fn animated(mut self, animation: AnimationDesc) -> Self {
        self.animation = animation;
        self
    }
}

/// Pixel offset, scale and base rotation fixed at generation time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Placement {
    pub(crate) offset: Vec2,
    pub(crate) scale: f32,
    pub(crate) rotation: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Prop {
    pub(crate) id: String,
    pub(crate) x: f32,
    pub(crate) y: f32,
    pub(crate) z: i32,
    pub(crate) collidable: bool,
    pub(crate) animation: AnimationDesc,
    pub(crate) source: PropSource,
    pub(crate) placement: Placement,
}

impl Prop {
    pub(crate) fn named(def: &PropDef) -> Self {
        Self {
            id: def.id.clone(),
            x: def.x,
            y: def.y,
            z: def.z,
            collidable: def.collidable,
            animation: def.animation,
            source: PropSource::Named,
            placement: named_placement(def),
        }
    }
}

pub(crate) fn is_tree(id: &str) -> bool {
    id.contains("tree")
}

/// Props of the reference village: plaza decor, houses, workstations,
/// forest clusters and clutter.
pub(crate) fn default_prop_defs() -> Vec<PropDef> {
    vec![
        PropDef::solid("well", 18.0, 18.0),
        PropDef::solid("bench", 15.0, 18.0),
        PropDef::solid("bench", 21.0, 18.0),
        PropDef::solid("lamp_post", 15.0, 15.0),
        PropDef::solid("lamp_post", 21.0, 15.0),
        PropDef::solid("lamp_post", 15.0, 21.0),
        PropDef::solid("lamp_post", 21.0, 21.0),
        PropDef::new("flowers_pink", 17.0, 17.0),
        PropDef::new("flowers_red", 19.0, 19.0),
        PropDef::solid("cottage_large", 8.0, 8.0),
        PropDef::solid("cottage_medium", 28.0, 6.0),
        PropDef::solid("cottage_small", 6.0, 28.0),
        PropDef::solid("cottage_medium", 28.0, 28.0),
        PropDef::solid("forge", 26.0, 29.0).animated(AnimationDesc::Flicker),
        PropDef::solid("anvil", 27.0, 30.0),
        PropDef::new("laundry_line", 30.0, 8.0).animated(AnimationDesc::Sway),
        PropDef::solid("tent", 29.0, 12.0),
        PropDef::solid("tree_pine", 1.0, 1.0),
        PropDef::solid("tree_pine", 2.0, 1.0),
        PropDef::solid("tree_oak", 3.0, 2.0),
        PropDef::solid("tree_pine", 34.0, 1.0),
        PropDef::solid("tree_pine", 33.0, 1.0),
        PropDef::solid("tree_oak", 32.0, 10.0),
        PropDef::solid("tree_pine", 1.0, 34.0),
        PropDef::solid("tree_pine", 2.0, 34.0),
        PropDef::solid("tree_oak", 3.0, 33.0),
        PropDef::solid("tree_pine", 34.0, 34.0),
        PropDef::solid("tree_pine", 33.0, 34.0),
        PropDef::solid("tree_oak", 32.0, 32.0),
        PropDef::solid("rock_large", 4.0, 18.0),
        PropDef::new("bush_small", 18.0, 4.0),
        PropDef::new("stump", 32.0, 32.0),
    ]
}

/// `sin(0.5x + y) * 10` jitter on both axes, size class scale with a hashed
/// ±5% perturbation and a hashed rotation within ±0.025 rad.
pub(crate) fn named_placement(def: &PropDef) -> Placement {
    let x = def.x as f64;
    let y = def.y as f64;
    let jitter = ((x * 0.5 + y).sin() as f32) * NAMED_JITTER_PX;
    let scale_base = if is_tree(&def.id) {
        TREE_SCALE
    } else {
        PROP_SCALE
    };
    let scale_r = unit_hash(x, y, 3.917, 7.131, 24634.6345);
    let rotation_r = unit_hash(x, y, 9.173, 2.719, 13758.937);
    Placement {
        offset: Vec2::new(jitter, jitter),
        scale: scale_base * (0.95 + scale_r * 0.1),
        rotation: (rotation_r - 0.5) * NAMED_ROTATION_SPREAD,
    }
}

/// Buffer-belt tree: independent X and Y jitter within ±15 px.
pub(crate) fn tree_placement(x: i32, y: i32) -> Placement {
    let (jx, jy, r) = vegetation_hashes(x, y);
    Placement {
        offset: Vec2::new((jx - 0.5) * VEGETATION_JITTER_PX, (jy - 0.5) * VEGETATION_JITTER_PX),
        scale: TREE_SCALE + r * TREE_SCALE_SPREAD,
        rotation: 0.0,
    }
}

pub(crate) fn filler_placement(x: i32, y: i32) -> Placement {
    let (jx, jy, r) = vegetation_hashes(x, y);
    Placement {
        offset: Vec2::new((jx - 0.5) * VEGETATION_JITTER_PX, (jy - 0.5) * VEGETATION_JITTER_PX),
        scale: FILLER_SCALE + r * FILLER_SCALE_SPREAD,
        rotation: 0.0,
    }
}

fn vegetation_hashes(x: i32, y: i32) -> (f32, f32, f32) {
    let (x, y) = (x as f64, y as f64);
    (
        unit_hash(x, y, 63.7264, 10.873, 623.6736),
        unit_hash(x, y, 36.7539, 50.3658, 306.2759),
        unit_hash(x, y, 27.1723, 91.9543, 8573.1275),
    )
}

/// `|fract_hash|`, in `[0, 1)`.
fn unit_hash(x: f64, y: f64, kx: f64, ky: f64, amplitude: f64) -> f32 {
    fract_hash(x, y, kx, ky, amplitude).abs() as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_list_marks_houses_collidable_and_forge_flickering() {
        let defs = default_prop_defs();
        let cottage = defs
            .iter()
            .find(|def| def.id == "cottage_large")
            .expect("cottage");
        assert!(cottage.collidable);
        assert_eq!((cottage.x, cottage.y), (8.0, 8.0));

        let forge = defs.iter().find(|def| def.id == "forge").expect("forge");
        assert_eq!(forge.animation, AnimationDesc::Flicker);

        let flowers = defs
            .iter()
            .find(|def| def.id == "flowers_pink")
            .expect("flowers");
        assert!(!flowers.collidable);
    }

    #[test]
    fn named_placement_uses_sine_jitter_and_size_class() {
        let def = PropDef::solid("well", 18.0, 18.0);
        let placement = named_placement(&def);
        let expected_jitter = (27.0f64).sin() as f32 * 10.0;
        assert!((placement.offset.x - expected_jitter).abs() < 1e-5);
        assert_eq!(placement.offset.x, placement.offset.y);
        assert!(placement.scale >= 0.4 * 0.95 && placement.scale < 0.4 * 1.05);
        assert!(placement.rotation.abs() <= 0.025);

        let tree = named_placement(&PropDef::solid("tree_pine", 1.0, 1.0));
        assert!(tree.scale >= 0.35 * 0.95 && tree.scale < 0.35 * 1.05);
    }

    #[test]
    fn vegetation_jitter_axes_are_independent_and_bounded() {
        let mut differing = 0;
        for y in -8..0 {
            for x in -8..44 {
                let placement = tree_placement(x, y);
                assert!(placement.offset.x.abs() <= 15.0);
                assert!(placement.offset.y.abs() <= 15.0);
                assert!(placement.scale >= 0.35 && placement.scale < 0.45);
                if (placement.offset.x - placement.offset.y).abs() > 1e-3 {
                    differing += 1;
                }
            }
        }
        assert!(differing > 0);
    }
}
