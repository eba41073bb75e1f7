//! The item seam between the transfer core and concrete content types.

use serde_json::{Map, Value};

use crate::ItemError;

/// Direction an item is opened for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Sender side: content will be pulled with [`Item::read`].
    Read,
    /// Receiver side: content will be pushed with [`Item::write`].
    Write,
}

/// A single transferable unit.
///
/// The transfer core drives items through a strict open → read/write → close
/// lifecycle. `read` and `write` operate on already-open handles and must be
/// bounded-latency; `close` on an item that was never opened is a no-op.
pub trait Item: Send {
    /// Human-readable label, also used in error messages.
    fn name(&self) -> &str;

    /// Type tag consulted against the handler registry on the receiving side.
    fn item_type(&self) -> &str;

    /// Content length in bytes. Zero means metadata only: the item produces
    /// no content packets.
    fn size(&self) -> u64;

    /// Properties serialized into the item header.
    ///
    /// Must include at least `name`, `type`, and `size` (as a decimal
    /// string); handlers may add whatever else they need. Properties a
    /// receiver does not understand are passed through untouched.
    fn properties(&self) -> Map<String, Value>;

    fn open(&mut self, mode: OpenMode) -> Result<(), ItemError>;

    /// Returns the next content chunk. Must be non-empty until the item is
    /// drained; an empty return signals exhaustion.
    fn read(&mut self) -> Result<Vec<u8>, ItemError>;

    fn write(&mut self, data: &[u8]) -> Result<(), ItemError>;

    fn close(&mut self) -> Result<(), ItemError>;
}

/// Factory turning a type tag plus header properties into a live item on the
/// receiving side.
pub trait ItemHandler: Send + Sync {
    fn create_item(
        &self,
        item_type: &str,
        properties: &Map<String, Value>,
    ) -> Result<Box<dyn Item>, ItemError>;
}
