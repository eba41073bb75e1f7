//! Items are the units a transfer moves: files, directories, and whatever
//! else a registered handler can materialize from a type tag plus a property
//! map. The transfer core only ever talks to the [`Item`] trait; the
//! built-in filesystem handlers live in [`file`] and [`directory`].

mod bundle;
pub mod directory;
pub mod file;
mod item;
mod registry;
mod validate;

pub use bundle::Bundle;
pub use directory::{DirectoryHandler, DirectoryItem};
pub use file::{FileHandler, FileItem};
pub use item::{Item, ItemHandler, OpenMode};
pub use registry::HandlerRegistry;
pub use validate::validate_relative_path;

/// Chunk size for item content reads (64 KiB).
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Errors produced by items and handlers.
#[derive(Debug, thiserror::Error)]
pub enum ItemError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("missing property: {0}")]
    MissingProperty(&'static str),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("item is not open")]
    NotOpen,

    #[error("{0}")]
    Unsupported(String),
}
