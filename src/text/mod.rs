//! Rich text: a sequence of characters and embeds with formatting.
//!
//! Formatting is stored as format markers, non-countable items that
//! carry one attribute each. The attributes of a run are whatever the
//! markers before it fold to. Because markers are ordinary items, two
//! replicas formatting the same span concurrently still converge.

mod position;

pub use self::position::ItemPosition;
pub(crate) use self::position::{check_boundary, find_position, update_attrs};

use crate::Error;
use crate::delta::{self, Delta};
use crate::snapshot::Snapshot;
use crate::store::{BranchPtr, Content, Store};
use crate::transaction::{ReadTxn, Transact, Transaction};
use crate::value::{Attrs, Value};

/// A handle to a root text of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextRef {
    branch: BranchPtr,
}

impl TextRef {
    pub(crate) fn new(branch: BranchPtr) -> Self {
        TextRef{branch}
    }

    pub(crate) fn branch(&self) -> BranchPtr {
        self.branch
    }

    /// Returns the length of the text in the document's offset kind.
    pub fn len<R: ReadTxn>(&self, txn: &R) -> u32 {
        txn.store().branch_len(self.branch)
    }

    /// Root texts live as long as their document.
    pub fn alive<R: ReadTxn>(&self, txn: &R) -> bool {
        txn.store().is_alive(self.branch)
    }

    pub fn is_empty<R: ReadTxn>(&self, txn: &R) -> bool {
        self.len(txn) == 0
    }

    /// Returns the characters of the text. Embeds are skipped.
    pub fn get_string<R: ReadTxn>(&self, txn: &R) -> String {
        get_string(txn.store(), self.branch)
    }

    /// Inserts `chunk` at `index`. The inserted text carries exactly
    /// `attrs`; with `None` it carries no formatting at all.
    /// Returns an error if the index is out-of-bounds.
    pub fn insert<T: Transact>(&self, txn: T, index: u32, chunk: &str, attrs: Option<Attrs>) -> Result<(), Error> {
        txn.transact_mut(|txn| insert(txn, self.branch, index, Content::String(chunk.to_owned()), attrs))
    }

    /// Appends `chunk` to the end of the text.
    pub fn push<T: Transact>(&self, txn: T, chunk: &str, attrs: Option<Attrs>) -> Result<(), Error> {
        txn.transact_mut(|txn| {
            let index = txn.store().branch_len(self.branch);
            insert(txn, self.branch, index, Content::String(chunk.to_owned()), attrs)
        })
    }

    /// Inserts a single opaque value at `index`.
    pub fn insert_embed<T: Transact>(&self, txn: T, index: u32, embed: Value, attrs: Option<Attrs>) -> Result<(), Error> {
        txn.transact_mut(|txn| insert(txn, self.branch, index, Content::Embed(embed), attrs))
    }

    /// Merges `attrs` into the formatting of `len` units starting at
    /// `index`. A `Null` value removes the attribute.
    pub fn format<T: Transact>(&self, txn: T, index: u32, len: u32, attrs: Attrs) -> Result<(), Error> {
        txn.transact_mut(|txn| format(txn, self.branch, index, len, &attrs))
    }

    /// Deletes `len` units starting at `index`.
    /// Returns an error without changing anything if the range
    /// reaches past the end of the text.
    pub fn delete<T: Transact>(&self, txn: T, index: u32, len: u32) -> Result<(), Error> {
        txn.transact_mut(|txn| remove_range(txn, self.branch, index, len))
    }

    pub fn apply_delta<T: Transact>(&self, txn: T, delta: Vec<Delta>) -> Result<(), Error> {
        txn.transact_mut(|txn| delta::apply(txn, self.branch, delta))
    }

    /// The edit script that turns the text visible at `from` into the
    /// text visible at `to`. `None` stands for the empty text and the
    /// current text respectively.
    pub fn to_delta<R: ReadTxn>(&self, txn: &R, from: Option<&Snapshot>, to: Option<&Snapshot>) -> Result<Vec<Delta>, Error> {
        delta::diff(txn.store(), self.branch, from, to)
    }

    /// Formatting of the character at `index`.
    pub fn attributes_at<R: ReadTxn>(&self, txn: &R, index: u32) -> Result<Attrs, Error> {
        attributes_at(txn.store(), self.branch, index)
    }
}

pub(crate) fn get_string(store: &Store, branch: BranchPtr) -> String {
    let mut s = String::new();
    for ptr in store.iter(branch) {
        let item = store.item(ptr);
        if let Content::String(ref chunk) = item.content {
            if !item.deleted {
                s.push_str(chunk);
            }
        }
    }
    s
}

pub(crate) fn attributes_at(store: &Store, branch: BranchPtr, index: u32) -> Result<Attrs, Error> {
    let mut attrs = Attrs::new();
    let mut acc = 0;
    for ptr in store.iter(branch) {
        let item = store.item(ptr);
        if item.deleted { continue }
        match item.content {
            Content::Format(ref key, ref value) => update_attrs(&mut attrs, key, value),
            ref content => {
                acc += content.offset_len(store.offset_kind);
                if index < acc {
                    return Ok(attrs)
                }
            }
        }
    }
    Err(Error::OutOfBounds)
}

pub(crate) fn insert(txn: &mut Transaction, branch: BranchPtr, index: u32, content: Content, attrs: Option<Attrs>) -> Result<(), Error> {
    let mut pos = find_position(txn.store_mut(), branch, index)?;
    insert_at(txn, &mut pos, content, attrs.unwrap_or_default());
    Ok(())
}

pub(crate) fn format(txn: &mut Transaction, branch: BranchPtr, index: u32, len: u32, attrs: &Attrs) -> Result<(), Error> {
    let end = index.checked_add(len).ok_or(Error::OutOfBounds)?;
    check_boundary(txn.store(), branch, index)?;
    check_boundary(txn.store(), branch, end)?;
    if len == 0 { return Ok(()) }
    let mut pos = find_position(txn.store_mut(), branch, index)?;
    format_at(txn, &mut pos, len, attrs)
}

pub(crate) fn remove_range(txn: &mut Transaction, branch: BranchPtr, index: u32, len: u32) -> Result<(), Error> {
    let end = index.checked_add(len).ok_or(Error::OutOfBounds)?;
    check_boundary(txn.store(), branch, index)?;
    check_boundary(txn.store(), branch, end)?;
    if len == 0 { return Ok(()) }
    let mut pos = find_position(txn.store_mut(), branch, index)?;
    delete_at(txn, &mut pos, len)
}

/// Inserts content at the cursor so that it carries exactly `attrs`,
/// then restores the formatting that was in effect for what follows.
pub(crate) fn insert_at(txn: &mut Transaction, pos: &mut ItemPosition, content: Content, mut attrs: Attrs) {
    if content.len() == 0 { return }
    for key in pos.current_attrs.keys() {
        attrs.entry(key.clone()).or_insert(Value::Null);
    }
    minimize_attr_changes(txn.store(), pos, &attrs);
    let negated = insert_attributes(txn, pos, &attrs);
    let ptr = txn.create_item(pos, content, None);
    pos.right = Some(ptr);
    pos.forward(txn.store());
    insert_negated_attributes(txn, pos, negated);
}

/// Applies `attrs` to the next `len` units after the cursor.
pub(crate) fn format_at(txn: &mut Transaction, pos: &mut ItemPosition, mut len: u32, attrs: &Attrs) -> Result<(), Error> {
    let kind = txn.store().offset_kind;
    minimize_attr_changes(txn.store(), pos, attrs);
    let mut negated = insert_attributes(txn, pos, attrs);
    while let Some(right) = pos.right {
        let (deleted, content) = {
            let item = txn.store().item(right);
            (item.deleted, item.content.clone())
        };
        let is_format = match content { Content::Format(_, _) => true, _ => false };
        if !(len > 0 || (!negated.is_empty() && (deleted || is_format))) {
            break
        }
        if !deleted {
            match content {
                Content::Format(key, value) => if let Some(attr) = attrs.get(&key) {
                    if *attr == value {
                        negated.remove(&key);
                    } else {
                        if len == 0 { break }
                        negated.insert(key, value);
                    }
                    txn.delete(right);
                },
                content => {
                    let item_len = content.offset_len(kind);
                    if len < item_len {
                        let offset = content.clock_offset(len, kind)?;
                        txn.store_mut().split(right, offset);
                    }
                    let item_len = txn.store().item(right).content.offset_len(kind);
                    len -= item_len.min(len);
                }
            }
        }
        pos.forward(txn.store());
    }
    insert_negated_attributes(txn, pos, negated);
    Ok(())
}

/// Deletes the next `len` units of countable content after the cursor.
pub(crate) fn delete_at(txn: &mut Transaction, pos: &mut ItemPosition, mut len: u32) -> Result<(), Error> {
    let kind = txn.store().offset_kind;
    while len > 0 {
        let right = match pos.right {
            Some(right) => right,
            None => break,
        };
        let split_at = {
            let item = txn.store().item(right);
            if item.is_visible() {
                let item_len = item.content.offset_len(kind);
                if len < item_len { Some(item.content.clock_offset(len, kind)?) } else { Some(item.len) }
            } else {
                None
            }
        };
        if let Some(offset) = split_at {
            if offset < txn.store().item(right).len {
                txn.store_mut().split(right, offset);
            }
            len -= txn.store().item(right).content.offset_len(kind).min(len);
            txn.delete(right);
        }
        pos.forward(txn.store());
    }
    Ok(())
}

/// Skips tombstones and markers that already hold the wanted values.
fn minimize_attr_changes(store: &Store, pos: &mut ItemPosition, attrs: &Attrs) {
    while let Some(right) = pos.right {
        let item = store.item(right);
        let redundant = item.deleted || match item.content {
            Content::Format(ref key, ref value) => attrs.get(key).unwrap_or(&Value::Null) == value,
            _ => false,
        };
        if !redundant { break }
        pos.forward(store);
    }
}

/// Inserts a marker for every attribute that differs from the cursor's
/// current formatting. Returns the values needed to undo them.
fn insert_attributes(txn: &mut Transaction, pos: &mut ItemPosition, attrs: &Attrs) -> Attrs {
    let mut negated = Attrs::new();
    for (key, value) in attrs {
        let current = pos.current_attrs.get(key).cloned().unwrap_or(Value::Null);
        if current != *value {
            negated.insert(key.clone(), current);
            let ptr = txn.create_item(pos, Content::Format(key.clone(), value.clone()), None);
            pos.right = Some(ptr);
            pos.forward(txn.store());
        }
    }
    negated
}

fn insert_negated_attributes(txn: &mut Transaction, pos: &mut ItemPosition, mut negated: Attrs) {
    while let Some(right) = pos.right {
        {
            let store = txn.store();
            let item = store.item(right);
            if !item.deleted {
                match item.content {
                    Content::Format(ref key, ref value) if negated.get(key).unwrap_or(&Value::Null) == value => {
                        negated.remove(key);
                    }
                    _ => break,
                }
            }
        }
        pos.forward(txn.store());
    }
    for (key, value) in negated {
        let ptr = txn.create_item(pos, Content::Format(key, value), None);
        pos.right = Some(ptr);
        pos.forward(txn.store());
    }
}
