//! The built-in `file` item: regular file content streamed in fixed-size
//! chunks.

use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use skiff_protocol::headers::{str_field, u64_field};

use crate::item::{Item, ItemHandler, OpenMode};
use crate::{CHUNK_SIZE, ItemError, validate_relative_path};

enum FileState {
    Closed,
    Reading(fs::File),
    Writing(fs::File),
}

/// A regular file, identified by a `/`-separated relative name under some
/// root directory.
pub struct FileItem {
    name: String,
    path: PathBuf,
    size: u64,
    executable: bool,
    state: FileState,
}

impl FileItem {
    /// Builds an item for sending from a file under `root`.
    ///
    /// `name` is the relative path that will identify the file on the
    /// receiving side; size and the executable bit are read from disk.
    pub fn from_path(root: &Path, name: &str) -> Result<Self, ItemError> {
        validate_relative_path(name)?;
        let path = root.join(name);
        let metadata = fs::metadata(&path)?;

        #[cfg(unix)]
        let executable = {
            use std::os::unix::fs::PermissionsExt;
            metadata.permissions().mode() & 0o111 != 0
        };
        #[cfg(not(unix))]
        let executable = false;

        Ok(Self {
            name: name.to_string(),
            path,
            size: metadata.len(),
            executable,
            state: FileState::Closed,
        })
    }

    /// Builds an item for receiving under `root` from header properties.
    fn incoming(root: &Path, properties: &Map<String, Value>) -> Result<Self, ItemError> {
        let name = str_field(properties, "name")
            .ok_or(ItemError::MissingProperty("name"))?
            .to_string();
        validate_relative_path(&name)?;
        let size = u64_field(properties, "size").ok_or(ItemError::MissingProperty("size"))?;
        let executable = properties
            .get("executable")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        Ok(Self {
            path: root.join(&name),
            name,
            size,
            executable,
            state: FileState::Closed,
        })
    }
}

impl Item for FileItem {
    fn name(&self) -> &str {
        &self.name
    }

    fn item_type(&self) -> &str {
        "file"
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn properties(&self) -> Map<String, Value> {
        let mut props = Map::new();
        props.insert("name".into(), Value::String(self.name.clone()));
        props.insert("type".into(), Value::String("file".into()));
        props.insert("size".into(), Value::String(self.size.to_string()));
        props.insert("executable".into(), Value::Bool(self.executable));
        props
    }

    fn open(&mut self, mode: OpenMode) -> Result<(), ItemError> {
        self.state = match mode {
            OpenMode::Read => FileState::Reading(fs::File::open(&self.path)?),
            OpenMode::Write => {
                if let Some(parent) = self.path.parent() {
                    fs::create_dir_all(parent)?;
                }
                FileState::Writing(fs::File::create(&self.path)?)
            }
        };
        Ok(())
    }

    fn read(&mut self) -> Result<Vec<u8>, ItemError> {
        let FileState::Reading(file) = &mut self.state else {
            return Err(ItemError::NotOpen);
        };
        let mut buf = vec![0u8; CHUNK_SIZE];
        let n = file.read(&mut buf)?;
        buf.truncate(n);
        Ok(buf)
    }

    fn write(&mut self, data: &[u8]) -> Result<(), ItemError> {
        let FileState::Writing(file) = &mut self.state else {
            return Err(ItemError::NotOpen);
        };
        file.write_all(data)?;
        Ok(())
    }

    fn close(&mut self) -> Result<(), ItemError> {
        match std::mem::replace(&mut self.state, FileState::Closed) {
            FileState::Closed | FileState::Reading(_) => Ok(()),
            FileState::Writing(mut file) => {
                file.flush()?;

                #[cfg(unix)]
                if self.executable {
                    use std::os::unix::fs::PermissionsExt;
                    let mut perms = file.metadata()?.permissions();
                    perms.set_mode(perms.mode() | 0o111);
                    file.set_permissions(perms)?;
                }

                Ok(())
            }
        }
    }
}

/// Handler for the `file` type tag.
pub struct FileHandler {
    root: PathBuf,
}

impl FileHandler {
    /// Creates a handler that writes received files under `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ItemHandler for FileHandler {
    fn create_item(
        &self,
        _item_type: &str,
        properties: &Map<String, Value>,
    ) -> Result<Box<dyn Item>, ItemError> {
        Ok(Box::new(FileItem::incoming(&self.root, properties)?))
    }
}
