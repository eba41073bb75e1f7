//! The built-in `directory` item: a zero-size metadata entry that recreates
//! an empty directory on the receiving side.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use skiff_protocol::headers::str_field;

use crate::item::{Item, ItemHandler, OpenMode};
use crate::{ItemError, validate_relative_path};

/// A directory entry. Carries no content packets.
pub struct DirectoryItem {
    name: String,
    /// Set on the receiving side; `None` when the item is only being sent.
    root: Option<PathBuf>,
}

impl DirectoryItem {
    /// Builds an item for sending.
    pub fn new(name: impl Into<String>) -> Result<Self, ItemError> {
        let name = name.into();
        validate_relative_path(&name)?;
        Ok(Self { name, root: None })
    }

    fn incoming(root: &Path, properties: &Map<String, Value>) -> Result<Self, ItemError> {
        let name = str_field(properties, "name")
            .ok_or(ItemError::MissingProperty("name"))?
            .to_string();
        validate_relative_path(&name)?;
        Ok(Self {
            name,
            root: Some(root.to_path_buf()),
        })
    }
}

impl Item for DirectoryItem {
    fn name(&self) -> &str {
        &self.name
    }

    fn item_type(&self) -> &str {
        "directory"
    }

    fn size(&self) -> u64 {
        0
    }

    fn properties(&self) -> Map<String, Value> {
        let mut props = Map::new();
        props.insert("name".into(), Value::String(self.name.clone()));
        props.insert("type".into(), Value::String("directory".into()));
        props.insert("size".into(), Value::String("0".into()));
        // Kept for peers that predate the "type" field.
        props.insert("directory".into(), Value::Bool(true));
        props
    }

    fn open(&mut self, mode: OpenMode) -> Result<(), ItemError> {
        match (mode, &self.root) {
            (OpenMode::Read, _) => Ok(()),
            (OpenMode::Write, Some(root)) => {
                std::fs::create_dir_all(root.join(&self.name))?;
                Ok(())
            }
            (OpenMode::Write, None) => Err(ItemError::Unsupported(
                "directory item has no destination root".into(),
            )),
        }
    }

    fn read(&mut self) -> Result<Vec<u8>, ItemError> {
        Err(ItemError::Unsupported(
            "directory items have no content".into(),
        ))
    }

    fn write(&mut self, _data: &[u8]) -> Result<(), ItemError> {
        Err(ItemError::Unsupported(
            "directory items have no content".into(),
        ))
    }

    fn close(&mut self) -> Result<(), ItemError> {
        Ok(())
    }
}

/// Handler for the `directory` type tag.
pub struct DirectoryHandler {
    root: PathBuf,
}

impl DirectoryHandler {
    /// Creates a handler that recreates directories under `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ItemHandler for DirectoryHandler {
    fn create_item(
        &self,
        _item_type: &str,
        properties: &Map<String, Value>,
    ) -> Result<Box<dyn Item>, ItemError> {
        Ok(Box::new(DirectoryItem::incoming(&self.root, properties)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn props(json: &str) -> Map<String, Value> {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn sending_item_has_zero_size() {
        let item = DirectoryItem::new("photos/2024").unwrap();
        assert_eq!(item.size(), 0);
        assert_eq!(item.item_type(), "directory");
    }

    #[test]
    fn properties_carry_legacy_directory_flag() {
        let item = DirectoryItem::new("d").unwrap();
        let props = item.properties();
        assert_eq!(props["type"], "directory");
        assert_eq!(props["directory"], true);
        assert_eq!(props["size"], "0");
    }

    #[test]
    fn open_for_write_creates_directory() {
        let dir = TempDir::new().unwrap();
        let handler = DirectoryHandler::new(dir.path());

        let mut item = handler
            .create_item("directory", &props(r#"{"name":"a/b/c"}"#))
            .unwrap();
        item.open(OpenMode::Write).unwrap();
        item.close().unwrap();

        assert!(dir.path().join("a/b/c").is_dir());
    }

    #[test]
    fn handler_rejects_traversal() {
        let dir = TempDir::new().unwrap();
        let handler = DirectoryHandler::new(dir.path());
        let result = handler.create_item("directory", &props(r#"{"name":"../up"}"#));
        assert!(matches!(result, Err(ItemError::InvalidPath(_))));
    }

    #[test]
    fn content_operations_are_unsupported() {
        let mut item = DirectoryItem::new("d").unwrap();
        assert!(matches!(item.read(), Err(ItemError::Unsupported(_))));
        assert!(matches!(item.write(b"x"), Err(ItemError::Unsupported(_))));
    }
}
