use thiserror::Error;

const MAX_FRAME_NAME_LEN: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpriteKeyError {
    #[error("frame name must not be empty")]
    Empty,
    #[error("frame name is {len} characters long; at most {max} allowed", max = MAX_FRAME_NAME_LEN)]
    TooLong { len: usize },
    #[error("frame name must not start with '/'")]
    LeadingSlash,
    #[error("frame name must not contain '..'")]
    ParentTraversal,
    #[error("frame name contains invalid character '{character}'")]
    InvalidCharacter { character: char },
}

/// Validates a frame or atlas name read from atlas metadata.
pub(crate) fn validate_frame_name(name: &str) -> Result<(), SpriteKeyError> {
    if name.is_empty() {
        return Err(SpriteKeyError::Empty);
    }
    let len = name.chars().count();
    if len > MAX_FRAME_NAME_LEN {
        return Err(SpriteKeyError::TooLong { len });
    }
    if name.starts_with('/') {
        return Err(SpriteKeyError::LeadingSlash);
    }
    if name.contains("..") {
        return Err(SpriteKeyError::ParentTraversal);
    }
    match name
        .chars()
        .find(|ch| !(ch.is_ascii_alphanumeric() || matches!(ch, '_' | '/' | '-' | '.')))
    {
        Some(character) => Err(SpriteKeyError::InvalidCharacter { character }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_atlas_style_frame_names() {
        for name in ["tree_pine", "cat/walk-03", "Tile_Grass.png", "a1"] {
            assert!(validate_frame_name(name).is_ok(), "name={name}");
        }
    }

    #[test]
    fn rejects_unsafe_frame_names() {
        for name in ["", "/abs", "a/../b", r"a\b", "with space", "é"] {
            assert!(validate_frame_name(name).is_err(), "name={name}");
        }
    }

    #[test]
    fn rejects_overlong_names_with_length() {
        let name = "x".repeat(MAX_FRAME_NAME_LEN + 1);
        assert_eq!(
            validate_frame_name(&name),
            Err(SpriteKeyError::TooLong {
                len: MAX_FRAME_NAME_LEN + 1
            })
        );
    }
}
