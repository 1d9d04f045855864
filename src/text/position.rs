use crate::Error;
use crate::store::{BranchPtr, Content, ItemPtr, Store};
use crate::value::{Attrs, Value};

/// A cursor between two items of a sequence. `index` counts the
/// visible content to its left; `current_attrs` folds the format
/// markers passed so far.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemPosition {
    pub parent: BranchPtr,
    pub left: Option<ItemPtr>,
    pub right: Option<ItemPtr>,
    pub index: u32,
    pub current_attrs: Attrs,
}

impl ItemPosition {
    pub fn start(store: &Store, parent: BranchPtr) -> Self {
        ItemPosition{
            parent,
            left: None,
            right: store.branch(parent).start,
            index: 0,
            current_attrs: Attrs::new(),
        }
    }

    /// Moves past the item on the right. Returns false at the end.
    pub fn forward(&mut self, store: &Store) -> bool {
        let right = match self.right {
            Some(right) => right,
            None => return false,
        };
        let item = store.item(right);
        if !item.deleted {
            match item.content {
                Content::Format(ref key, ref value) => update_attrs(&mut self.current_attrs, key, value),
                ref content => self.index += content.offset_len(store.offset_kind),
            }
        }
        self.left = Some(right);
        self.right = item.right;
        true
    }
}

/// `Null` removes a key, any other value sets it.
pub fn update_attrs(attrs: &mut Attrs, key: &str, value: &Value) {
    if value.is_null() {
        attrs.remove(key);
    } else {
        attrs.insert(key.to_owned(), value.clone());
    }
}

/// Positions a cursor `index` units into a sequence, splitting the item
/// the index falls into.
pub fn find_position(store: &mut Store, parent: BranchPtr, index: u32) -> Result<ItemPosition, Error> {
    let kind = store.offset_kind;
    let mut pos = ItemPosition::start(store, parent);
    let mut remaining = index;
    while remaining > 0 {
        let right = pos.right.ok_or(Error::OutOfBounds)?;
        let split_at = {
            let item = store.item(right);
            let len = item.content.offset_len(kind);
            if !item.deleted && remaining < len {
                Some(item.content.clock_offset(remaining, kind)?)
            } else {
                None
            }
        };
        if let Some(offset) = split_at {
            store.split(right, offset);
        }
        let before = pos.index;
        pos.forward(store);
        remaining -= pos.index - before;
    }
    Ok(pos)
}

/// Fails unless `at` is within the sequence and on a character
/// boundary of the configured offset kind.
pub fn check_boundary(store: &Store, parent: BranchPtr, at: u32) -> Result<(), Error> {
    let kind = store.offset_kind;
    let mut acc = 0;
    for ptr in store.iter(parent) {
        let item = store.item(ptr);
        if item.deleted { continue }
        let len = item.content.offset_len(kind);
        if at < acc + len {
            item.content.clock_offset(at - acc, kind)?;
            return Ok(())
        }
        acc += len;
    }
    try_assert!(at == acc, Error::OutOfBounds);
    Ok(())
}
