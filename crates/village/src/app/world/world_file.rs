use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use engine::AnimationDesc;
use roxmltree::{Document, Node};
use thiserror::Error;

use super::interaction::{InteractionMap, InteractionTag, LocationKey};
use super::props::PropDef;

const INTERACTION_TAG_NAMES: &str = "gallery, gameRoom, catRoom, tavern";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WorldFileErrorKind {
    XmlMalformed,
    InvalidRoot,
    UnknownElement,
    DuplicateSection,
    UnknownAttribute,
    MissingAttribute,
    InvalidValue,
    DuplicateKey,
}

#[derive(Debug, Error)]
pub(crate) enum WorldFileError {
    #[error("failed to read world file '{}': {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{kind:?}: {message} (file={}, line={line}, column={column})", .path.display())]
    Parse {
        kind: WorldFileErrorKind,
        message: String,
        path: PathBuf,
        line: usize,
        column: usize,
    },
}

impl WorldFileError {
    #[cfg(test)]
    pub(crate) fn kind(&self) -> Option<WorldFileErrorKind> {
        match self {
            WorldFileError::Read { .. } => None,
            WorldFileError::Parse { kind, .. } => Some(*kind),
        }
    }
}

/// Overrides read from `world.xml`. A missing section keeps the built-in
/// default for that part of the world.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct WorldDescription {
    pub(crate) props: Option<Vec<PropDef>>,
    pub(crate) interactions: Option<InteractionMap>,
}

/// `Ok(None)` when the file does not exist.
pub(crate) fn load_world_file(path: &Path) -> Result<Option<WorldDescription>, WorldFileError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(source) if source.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(WorldFileError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    parse_world_document(path, &raw).map(Some)
}

pub(crate) fn parse_world_document(
    path: &Path,
    raw: &str,
) -> Result<WorldDescription, WorldFileError> {
    let doc = Document::parse(raw).map_err(|error| WorldFileError::Parse {
        kind: WorldFileErrorKind::XmlMalformed,
        message: format!("malformed XML: {error}"),
        path: path.to_path_buf(),
        line: error.pos().row as usize,
        column: error.pos().col as usize,
    })?;
    let parser = Parser { path, doc: &doc };

    let root = doc.root_element();
    if root.tag_name().name() != "World" {
        return Err(parser.error_at(
            WorldFileErrorKind::InvalidRoot,
            "root element must be <World>".to_string(),
            root,
        ));
    }

    let mut description = WorldDescription::default();
    for section in root.children().filter(|node| node.is_element()) {
        match section.tag_name().name() {
            "Props" => {
                if description.props.is_some() {
                    return Err(parser.duplicate_section(section));
                }
                description.props = Some(parser.parse_props(section)?);
            }
            "Interactions" => {
                if description.interactions.is_some() {
                    return Err(parser.duplicate_section(section));
                }
                description.interactions = Some(parser.parse_interactions(section)?);
            }
            other => {
                return Err(parser.error_at(
                    WorldFileErrorKind::UnknownElement,
                    format!("unknown section <{other}>; expected <Props> or <Interactions>"),
                    section,
                ))
            }
        }
    }
    Ok(description)
}

struct Parser<'a, 'input> {
    path: &'a Path,
    doc: &'a Document<'input>,
}

impl Parser<'_, '_> {
    fn parse_props(&self, section: Node) -> Result<Vec<PropDef>, WorldFileError> {
        let mut props = Vec::new();
        for node in self.elements_named(section, "Prop")? {
            self.reject_unknown_attributes(
                node,
                &["id", "x", "y", "z", "collidable", "animation"],
            )?;
            let id = self.required(node, "id")?;
            if !is_valid_prop_id(id) {
                return Err(self.error_at(
                    WorldFileErrorKind::InvalidValue,
                    format!("prop id '{id}' must be non-empty lowercase ascii, digits or '_'"),
                    node,
                ));
            }
            let x = self.finite_f32(node, "x")?;
            let y = self.finite_f32(node, "y")?;
            let z = match node.attribute("z") {
                Some(raw) => raw.trim().parse::<i32>().map_err(|_| {
                    self.error_at(
                        WorldFileErrorKind::InvalidValue,
                        format!("z '{raw}' is not an integer"),
                        node,
                    )
                })?,
                None => 0,
            };
            let collidable = match node.attribute("collidable") {
                Some("true") => true,
                Some("false") | None => false,
                Some(other) => {
                    return Err(self.error_at(
                        WorldFileErrorKind::InvalidValue,
                        format!("collidable '{other}' must be true or false"),
                        node,
                    ))
                }
            };
            let animation = match node.attribute("animation") {
                None | Some("none") => AnimationDesc::None,
                Some("sway") => AnimationDesc::Sway,
                Some("flicker") => AnimationDesc::Flicker,
                Some(other) => {
                    return Err(self.error_at(
                        WorldFileErrorKind::InvalidValue,
                        format!("animation '{other}'; allowed values: none, sway, flicker"),
                        node,
                    ))
                }
            };
            props.push(PropDef {
                id: id.to_string(),
                x,
                y,
                z,
                collidable,
                animation,
            });
        }
        Ok(props)
    }

    fn parse_interactions(&self, section: Node) -> Result<InteractionMap, WorldFileError> {
        let mut map = InteractionMap::default();
        for node in self.elements_named(section, "Interaction")? {
            self.reject_unknown_attributes(node, &["x", "y", "tag"])?;
            let x = self.integer(node, "x")?;
            let y = self.integer(node, "y")?;
            let raw_tag = self.required(node, "tag")?;
            let tag = InteractionTag::from_name(raw_tag).ok_or_else(|| {
                self.error_at(
                    WorldFileErrorKind::InvalidValue,
                    format!("interaction tag '{raw_tag}'; allowed values: {INTERACTION_TAG_NAMES}"),
                    node,
                )
            })?;
            let key = LocationKey::new(x, y);
            if map.insert(key, tag).is_some() {
                return Err(self.error_at(
                    WorldFileErrorKind::DuplicateKey,
                    format!("location {key} is mapped more than once"),
                    node,
                ));
            }
        }
        Ok(map)
    }

    fn elements_named<'n, 'i>(
        &self,
        section: Node<'n, 'i>,
        expected: &str,
    ) -> Result<Vec<Node<'n, 'i>>, WorldFileError> {
        let mut nodes = Vec::new();
        for child in section.children().filter(|node| node.is_element()) {
            if child.tag_name().name() != expected {
                return Err(self.error_at(
                    WorldFileErrorKind::UnknownElement,
                    format!(
                        "unexpected <{}> in <{}>; expected <{expected}>",
                        child.tag_name().name(),
                        section.tag_name().name()
                    ),
                    child,
                ));
            }
            nodes.push(child);
        }
        Ok(nodes)
    }

    fn reject_unknown_attributes(
        &self,
        node: Node,
        allowed: &[&str],
    ) -> Result<(), WorldFileError> {
        match node
            .attributes()
            .find(|attribute| !allowed.contains(&attribute.name()))
        {
            Some(attribute) => Err(self.error_at(
                WorldFileErrorKind::UnknownAttribute,
                format!(
                    "unknown attribute '{}' on <{}>",
                    attribute.name(),
                    node.tag_name().name()
                ),
                node,
            )),
            None => Ok(()),
        }
    }

    fn required<'n, 'i>(&self, node: Node<'n, 'i>, name: &str) -> Result<&'n str, WorldFileError> {
        node.attribute(name).ok_or_else(|| {
            self.error_at(
                WorldFileErrorKind::MissingAttribute,
                format!("missing required attribute '{name}' on <{}>", node.tag_name().name()),
                node,
            )
        })
    }

    fn finite_f32(&self, node: Node, name: &str) -> Result<f32, WorldFileError> {
        let raw = self.required(node, name)?;
        match raw.trim().parse::<f32>() {
            Ok(value) if value.is_finite() => Ok(value),
            _ => Err(self.error_at(
                WorldFileErrorKind::InvalidValue,
                format!("{name} '{raw}' is not a finite number"),
                node,
            )),
        }
    }

    fn integer(&self, node: Node, name: &str) -> Result<i32, WorldFileError> {
        let raw = self.required(node, name)?;
        raw.trim().parse::<i32>().map_err(|_| {
            self.error_at(
                WorldFileErrorKind::InvalidValue,
                format!("{name} '{raw}' is not an integer"),
                node,
            )
        })
    }

    fn duplicate_section(&self, node: Node) -> WorldFileError {
        self.error_at(
            WorldFileErrorKind::DuplicateSection,
            format!("section <{}> appears more than once", node.tag_name().name()),
            node,
        )
    }

    fn error_at(&self, kind: WorldFileErrorKind, message: String, node: Node) -> WorldFileError {
        let pos = self.doc.text_pos_at(node.range().start);
        WorldFileError::Parse {
            kind,
            message,
            path: self.path.to_path_buf(),
            line: pos.row as usize,
            column: pos.col as usize,
        }
    }
}

fn is_valid_prop_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> Result<WorldDescription, WorldFileError> {
        parse_world_document(Path::new("world.xml"), raw)
    }

    #[test]
    fn props_and_interactions_parse_with_defaults() {
        let description = parse(
            r#"<World>
                <Props>
                    <Prop id="well" x="18" y="18" collidable="true"/>
                    <Prop id="forge" x="26.5" y="29" z="1" animation="flicker"/>
                </Props>
                <Interactions>
                    <Interaction x="18" y="18" tag="tavern"/>
                </Interactions>
            </World>"#,
        )
        .expect("parse");

        let props = description.props.expect("props");
        assert_eq!(props.len(), 2);
        assert!(props[0].collidable);
        assert_eq!(props[0].z, 0);
        assert_eq!(props[1].x, 26.5);
        assert_eq!(props[1].z, 1);
        assert_eq!(props[1].animation, AnimationDesc::Flicker);
        assert!(!props[1].collidable);

        let interactions = description.interactions.expect("interactions");
        assert_eq!(
            interactions.get(LocationKey::new(18, 18)),
            Some(InteractionTag::Tavern)
        );
    }

    #[test]
    fn absent_sections_stay_unset() {
        let description = parse("<World><Props/></World>").expect("parse");
        assert_eq!(description.props, Some(Vec::new()));
        assert_eq!(description.interactions, None);
    }

    #[test]
    fn malformed_xml_reports_line_and_column() {
        let err = parse("<World>\n  <Props>\n</World>").expect_err("malformed");
        assert_eq!(err.kind(), Some(WorldFileErrorKind::XmlMalformed));
        match err {
            WorldFileError::Parse { line, .. } => assert_eq!(line, 3),
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn bad_attribute_points_at_its_element() {
        let err = parse(
            "<World>\n<Props>\n  <Prop id=\"well\" x=\"abc\" y=\"1\"/>\n</Props></World>",
        )
        .expect_err("invalid x");
        match err {
            WorldFileError::Parse {
                kind, line, column, ..
            } => {
                assert_eq!(kind, WorldFileErrorKind::InvalidValue);
                assert_eq!((line, column), (3, 3));
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn structural_mistakes_are_rejected() {
        let cases = [
            ("<Village/>", WorldFileErrorKind::InvalidRoot),
            ("<World><Trees/></World>", WorldFileErrorKind::UnknownElement),
            ("<World><Props/><Props/></World>", WorldFileErrorKind::DuplicateSection),
            (
                r#"<World><Props><Prop id="a" x="1" y="1" color="red"/></Props></World>"#,
                WorldFileErrorKind::UnknownAttribute,
            ),
            (
                r#"<World><Props><Prop x="1" y="1"/></Props></World>"#,
                WorldFileErrorKind::MissingAttribute,
            ),
            (
                concat!(
                    r#"<World><Interactions>"#,
                    r#"<Interaction x="1" y="1" tag="library"/>"#,
                    r#"</Interactions></World>"#,
                ),
                WorldFileErrorKind::InvalidValue,
            ),
            (
                concat!(
                    r#"<World><Interactions>"#,
                    r#"<Interaction x="1" y="1" tag="tavern"/>"#,
                    r#"<Interaction x="1" y="1" tag="gallery"/>"#,
                    r#"</Interactions></World>"#,
                ),
                WorldFileErrorKind::DuplicateKey,
            ),
        ];
        for (raw, expected) in cases {
            let err = parse(raw).expect_err(raw);
            assert_eq!(err.kind(), Some(expected), "{raw}");
        }
    }

    #[test]
    fn missing_file_is_not_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let loaded = load_world_file(&dir.path().join("world.xml")).expect("load");
        assert!(loaded.is_none());

        let path = dir.path().join("present.xml");
        fs::write(&path, "<World><Interactions/></World>").expect("write");
        let loaded = load_world_file(&path).expect("load").expect("present");
        assert_eq!(loaded.interactions.map(|map| map.len()), Some(0));
    }
}
