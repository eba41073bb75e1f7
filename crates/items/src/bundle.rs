use crate::Item;

/// An ordered collection of items selected for a single transfer.
///
/// Immutable once the transfer starts; the sending transfer owns the bundle
/// for its duration and borrows items one at a time.
#[derive(Default)]
pub struct Bundle {
    items: Vec<Box<dyn Item>>,
}

impl Bundle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an item to the bundle.
    pub fn add(&mut self, item: Box<dyn Item>) {
        self.items.push(item);
    }

    /// Number of items in the bundle.
    pub fn item_count(&self) -> u64 {
        self.items.len() as u64
    }

    /// Sum of all item sizes in bytes.
    pub fn total_size(&self) -> u64 {
        self.items.iter().map(|i| i.size()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Mutable access to the item at `index`, if any.
    pub fn item_mut(&mut self, index: u64) -> Option<&mut Box<dyn Item>> {
        self.items.get_mut(index as usize)
    }
}

impl FromIterator<Box<dyn Item>> for Bundle {
    fn from_iter<T: IntoIterator<Item = Box<dyn Item>>>(iter: T) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}
