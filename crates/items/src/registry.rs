use std::collections::HashMap;
use std::path::Path;

use crate::directory::DirectoryHandler;
use crate::file::FileHandler;
use crate::item::ItemHandler;

/// Maps item type tags to the handlers that can materialize them.
///
/// The receiving side consults the registry for every item header; an
/// unregistered tag is a terminal protocol error for the transfer.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Box<dyn ItemHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with the built-in `file` and `directory` handlers
    /// rooted at `root`.
    pub fn with_filesystem_handlers(root: &Path) -> Self {
        let mut registry = Self::new();
        registry.register("file", Box::new(FileHandler::new(root)));
        registry.register("directory", Box::new(DirectoryHandler::new(root)));
        registry
    }

    /// Registers a handler for a type tag, replacing any previous one.
    pub fn register(&mut self, item_type: impl Into<String>, handler: Box<dyn ItemHandler>) {
        self.handlers.insert(item_type.into(), handler);
    }

    /// Looks up the handler for a type tag.
    pub fn find(&self, item_type: &str) -> Option<&dyn ItemHandler> {
        self.handlers.get(item_type).map(Box::as_ref)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn empty_registry_finds_nothing() {
        let registry = HandlerRegistry::new();
        assert!(registry.find("file").is_none());
    }

    #[test]
    fn filesystem_registry_has_builtin_tags() {
        let dir = TempDir::new().unwrap();
        let registry = HandlerRegistry::with_filesystem_handlers(dir.path());
        assert!(registry.find("file").is_some());
        assert!(registry.find("directory").is_some());
        assert!(registry.find("widget").is_none());
    }

    #[test]
    fn register_replaces_existing_handler() {
        let dir = TempDir::new().unwrap();
        let mut registry = HandlerRegistry::new();
        registry.register("file", Box::new(FileHandler::new(dir.path())));
        registry.register("file", Box::new(FileHandler::new(dir.path().join("other"))));
        assert!(registry.find("file").is_some());
    }
}
