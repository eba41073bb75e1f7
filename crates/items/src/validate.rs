use std::path::{Component, Path};

use crate::ItemError;

/// Checks that an item name can be safely joined under a root directory.
///
/// Names come straight off the wire, so anything that could land outside
/// the root is refused: the name must be non-empty, relative, and free of
/// `..` segments. Prefix components (`C:`, `\\server`) count as non-relative.
pub fn validate_relative_path(name: &str) -> Result<(), ItemError> {
    if name.is_empty() {
        return Err(ItemError::InvalidPath("item name is empty".into()));
    }

    for component in Path::new(name).components() {
        let problem = match component {
            Component::Normal(_) | Component::CurDir => continue,
            Component::ParentDir => "references a parent directory",
            Component::RootDir | Component::Prefix(_) => "is not relative",
        };
        return Err(ItemError::InvalidPath(format!("\"{name}\" {problem}")));
    }

    Ok(())
}
