use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use image::ImageReader;
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::app::Vec2;
use crate::sprite_keys::{validate_frame_name, SpriteKeyError};

const DEFAULT_FRAME_ANCHOR: Vec2 = Vec2 { x: 0.5, y: 0.5 };

/// One sheet to load: a PNG plus JSON-hash frame metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtlasSpec {
    pub name: String,
    pub image: PathBuf,
    pub metadata: PathBuf,
    /// A required sheet that fails to load aborts startup; an optional one
    /// is skipped with a warning.
    pub required: bool,
}

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("failed to read atlas metadata '{path}': {source}")]
    ReadMetadata {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse atlas metadata '{path}' at {json_path}: {source}")]
    ParseMetadata {
        path: PathBuf,
        json_path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to open atlas image '{path}': {source}")]
    OpenImage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode atlas image '{path}': {source}")]
    DecodeImage {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("atlas '{atlas}' has invalid frame name '{frame}': {source}")]
    InvalidFrameName {
        atlas: String,
        frame: String,
        #[source]
        source: SpriteKeyError,
    },
    #[error(
        "atlas '{atlas}' frame '{frame}' ({x},{y} {w}x{h}) exceeds image bounds {width}x{height}"
    )]
    FrameOutOfBounds {
        atlas: String,
        frame: String,
        x: u32,
        y: u32,
        w: u32,
        h: u32,
        width: u32,
        height: u32,
    },
    #[error("atlas '{atlas}' defines no frames")]
    NoFrames { atlas: String },
}

#[derive(Debug, Deserialize)]
struct AtlasFile {
    frames: BTreeMap<String, FrameEntry>,
}

#[derive(Debug, Deserialize)]
struct FrameEntry {
    frame: FrameRect,
    #[serde(default)]
    anchor: Option<AnchorEntry>,
}

#[derive(Debug, Deserialize)]
struct FrameRect {
    x: u32,
    y: u32,
    w: u32,
    h: u32,
}

#[derive(Debug, Deserialize)]
struct AnchorEntry {
    x: f32,
    y: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AtlasFrame {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
    pub anchor: Option<Vec2>,
}

impl AtlasFrame {
    pub fn anchor_or_default(&self) -> Vec2 {
        self.anchor.unwrap_or(DEFAULT_FRAME_ANCHOR)
    }
}

/// Decoded RGBA sheet with named sub-rectangles.
#[derive(Debug, Clone)]
pub struct SpriteAtlas {
    name: String,
    width: u32,
    height: u32,
    rgba: Vec<u8>,
    frames: HashMap<String, AtlasFrame>,
}

impl SpriteAtlas {
    /// Single-colour sheet without frames; frames are added with
    /// [`SpriteAtlas::insert_frame`].
    pub fn solid(name: impl Into<String>, width: u32, height: u32, color: [u8; 4]) -> Self {
        let pixel_count = width as usize * height as usize;
        Self {
            name: name.into(),
            width,
            height,
            rgba: color.repeat(pixel_count),
            frames: HashMap::new(),
        }
    }

    pub fn insert_frame(&mut self, name: impl Into<String>, frame: AtlasFrame) {
        self.frames.insert(name.into(), frame);
    }

    /// Overwrites one texel. Out-of-sheet writes are ignored.
    pub fn paint(&mut self, x: u32, y: u32, color: [u8; 4]) {
        if x >= self.width || y >= self.height {
            return;
        }
        let offset = (y as usize * self.width as usize + x as usize) * 4;
        if let Some(px) = self.rgba.get_mut(offset..offset + 4) {
            px.copy_from_slice(&color);
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn frame(&self, name: &str) -> Option<&AtlasFrame> {
        self.frames.get(name)
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// RGBA at sheet coordinates; transparent outside the sheet.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        if x >= self.width || y >= self.height {
            return [0, 0, 0, 0];
        }
        let offset = (y as usize * self.width as usize + x as usize) * 4;
        match self.rgba.get(offset..offset + 4) {
            Some(px) => [px[0], px[1], px[2], px[3]],
            None => [0, 0, 0, 0],
        }
    }
}

/// All loaded sheets. Frame lookups search sheets in load order.
#[derive(Debug, Clone, Default)]
pub struct AtlasSet {
    atlases: Vec<SpriteAtlas>,
    skipped: Vec<String>,
}

impl AtlasSet {
    pub fn insert(&mut self, atlas: SpriteAtlas) {
        self.atlases.retain(|existing| existing.name != atlas.name);
        self.atlases.push(atlas);
    }

    pub fn frame(&self, name: &str) -> Option<(&AtlasFrame, &SpriteAtlas)> {
        self.atlases
            .iter()
            .find_map(|atlas| atlas.frame(name).map(|frame| (frame, atlas)))
    }

    pub fn has_atlas(&self, name: &str) -> bool {
        self.atlases.iter().any(|atlas| atlas.name == name)
    }

    /// Optional sheets that failed to load.
    pub fn skipped(&self) -> &[String] {
        &self.skipped
    }

    pub fn len(&self) -> usize {
        self.atlases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atlases.is_empty()
    }
}

pub fn load_atlas_set(specs: &[AtlasSpec]) -> Result<AtlasSet, AssetError> {
    let mut set = AtlasSet::default();
    for spec in specs {
        match load_atlas(spec) {
            Ok(atlas) => {
                info!(
                    atlas = spec.name.as_str(),
                    frame_count = atlas.frame_count(),
                    width = atlas.width,
                    height = atlas.height,
                    "atlas_loaded"
                );
                set.insert(atlas);
            }
            Err(error) if !spec.required => {
                warn!(atlas = spec.name.as_str(), error = %error, "optional_atlas_skipped");
                set.skipped.push(spec.name.clone());
            }
            Err(error) => return Err(error),
        }
    }
    Ok(set)
}

fn load_atlas(spec: &AtlasSpec) -> Result<SpriteAtlas, AssetError> {
    let raw = fs::read_to_string(&spec.metadata).map_err(|source| AssetError::ReadMetadata {
        path: spec.metadata.clone(),
        source,
    })?;
    let parsed = parse_atlas_metadata(&spec.metadata, &raw)?;
    let (width, height, rgba) = decode_rgba(&spec.image)?;

    if parsed.frames.is_empty() {
        return Err(AssetError::NoFrames {
            atlas: spec.name.clone(),
        });
    }

    let mut frames = HashMap::with_capacity(parsed.frames.len());
    for (frame_name, entry) in parsed.frames {
        validate_frame_name(&frame_name).map_err(|source| AssetError::InvalidFrameName {
            atlas: spec.name.clone(),
            frame: frame_name.clone(),
            source,
        })?;
        let rect = entry.frame;
        let fits = rect.w > 0
            && rect.h > 0
            && rect.x.checked_add(rect.w).is_some_and(|right| right <= width)
            && rect.y.checked_add(rect.h).is_some_and(|bottom| bottom <= height);
        if !fits {
            return Err(AssetError::FrameOutOfBounds {
                atlas: spec.name.clone(),
                frame: frame_name,
                x: rect.x,
                y: rect.y,
                w: rect.w,
                h: rect.h,
                width,
                height,
            });
        }
        frames.insert(
            frame_name,
            AtlasFrame {
                x: rect.x,
                y: rect.y,
                w: rect.w,
                h: rect.h,
                anchor: entry.anchor.map(|anchor| Vec2::new(anchor.x, anchor.y)),
            },
        );
    }

    Ok(SpriteAtlas {
        name: spec.name.clone(),
        width,
        height,
        rgba,
        frames,
    })
}

fn parse_atlas_metadata(path: &Path, raw: &str) -> Result<AtlasFile, AssetError> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    serde_path_to_error::deserialize::<_, AtlasFile>(&mut deserializer).map_err(|error| {
        let json_path = match error.path().to_string() {
            path if path.is_empty() => ".".to_string(),
            path => path,
        };
        AssetError::ParseMetadata {
            path: path.to_path_buf(),
            json_path,
            source: error.into_inner(),
        }
    })
}

fn decode_rgba(path: &Path) -> Result<(u32, u32, Vec<u8>), AssetError> {
    let reader = ImageReader::open(path).map_err(|source| AssetError::OpenImage {
        path: path.to_path_buf(),
        source,
    })?;
    let decoded = reader.decode().map_err(|source| AssetError::DecodeImage {
        path: path.to_path_buf(),
        source,
    })?;
    let image = decoded.to_rgba8();
    Ok((image.width(), image.height(), image.into_raw()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgba};
    use tempfile::TempDir;

    fn write_sheet(dir: &TempDir, stem: &str, size: (u32, u32), metadata: &str) -> AtlasSpec {
        let image_path = dir.path().join(format!("{stem}.png"));
        let metadata_path = dir.path().join(format!("{stem}.json"));
        let sheet = ImageBuffer::from_pixel(size.0, size.1, Rgba([10u8, 20, 30, 255]));
        sheet.save(&image_path).expect("save png");
        fs::write(&metadata_path, metadata).expect("write metadata");
        AtlasSpec {
            name: stem.to_string(),
            image: image_path,
            metadata: metadata_path,
            required: true,
        }
    }

    const TWO_FRAMES: &str = r#"{
        "frames": {
            "tree_oak": {
                "frame": { "x": 0, "y": 0, "w": 8, "h": 16 },
                "anchor": { "x": 0.5, "y": 0.95 }
            },
            "rock": { "frame": { "x": 8, "y": 0, "w": 8, "h": 8 }, "rotated": false }
        },
        "meta": { "image": "props.png" }
    }"#;

    #[test]
    fn loads_frames_and_anchors_from_json_hash() {
        let dir = tempfile::tempdir().expect("tempdir");
        let spec = write_sheet(&dir, "props", (16, 16), TWO_FRAMES);

        let set = load_atlas_set(&[spec]).expect("atlas set");

        let (tree, atlas) = set.frame("tree_oak").expect("tree frame");
        assert_eq!(atlas.name(), "props");
        assert_eq!((tree.w, tree.h), (8, 16));
        assert_eq!(tree.anchor_or_default(), Vec2::new(0.5, 0.95));
        let (rock, _) = set.frame("rock").expect("rock frame");
        assert_eq!(rock.anchor_or_default(), Vec2::new(0.5, 0.5));
        assert_eq!(atlas.pixel(3, 3), [10, 20, 30, 255]);
        assert_eq!(atlas.pixel(99, 3), [0, 0, 0, 0]);
    }

    #[test]
    fn missing_required_sheet_is_fatal() {
        let dir = tempfile::tempdir().expect("tempdir");
        let spec = AtlasSpec {
            name: "village".to_string(),
            image: dir.path().join("missing.png"),
            metadata: dir.path().join("missing.json"),
            required: true,
        };
        let error = load_atlas_set(&[spec]).expect_err("required atlas must fail");
        assert!(matches!(error, AssetError::ReadMetadata { .. }));
    }

    #[test]
    fn missing_optional_sheet_is_skipped() {
        let dir = tempfile::tempdir().expect("tempdir");
        let required = write_sheet(&dir, "props", (16, 16), TWO_FRAMES);
        let optional = AtlasSpec {
            name: "decor".to_string(),
            image: dir.path().join("decor.png"),
            metadata: dir.path().join("decor.json"),
            required: false,
        };

        let set = load_atlas_set(&[required, optional]).expect("atlas set");

        assert_eq!(set.len(), 1);
        assert!(set.has_atlas("props"));
        assert!(!set.has_atlas("decor"));
        assert_eq!(set.skipped(), ["decor".to_string()]);
    }

    #[test]
    fn malformed_metadata_reports_json_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let spec = write_sheet(
            &dir,
            "broken",
            (16, 16),
            r#"{ "frames": { "rock": { "frame": { "x": 0, "y": 0, "w": "wide", "h": 8 } } } }"#,
        );
        match load_atlas_set(&[spec]) {
            Err(AssetError::ParseMetadata { json_path, .. }) => {
                assert_eq!(json_path, "frames.rock.frame.w");
            }
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn frame_outside_sheet_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let spec = write_sheet(
            &dir,
            "small",
            (8, 8),
            r#"{ "frames": { "big": { "frame": { "x": 4, "y": 0, "w": 8, "h": 8 } } } }"#,
        );
        let error = load_atlas_set(&[spec]).expect_err("bounds check");
        assert!(matches!(error, AssetError::FrameOutOfBounds { .. }));
    }

    #[test]
    fn invalid_frame_name_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let spec = write_sheet(
            &dir,
            "names",
            (8, 8),
            r#"{ "frames": { "bad name": { "frame": { "x": 0, "y": 0, "w": 8, "h": 8 } } } }"#,
        );
        let error = load_atlas_set(&[spec]).expect_err("name check");
        assert!(matches!(error, AssetError::InvalidFrameName { .. }));
    }
}
