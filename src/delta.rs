//! Edit scripts over a sequence: `Retain`, `Insert` and `Delete`
//! applied left to right with a single cursor.

use crate::Error;
use crate::doc::OffsetKind;
use crate::id::ItemId;
use crate::snapshot::Snapshot;
use crate::store::{str_len, BranchPtr, Content, Item, Store};
use crate::text::{self, check_boundary, update_attrs, ItemPosition};
use crate::transaction::{ReadTxn, Transaction};
use crate::value::{Attrs, Value, EMPTY_ATTRS};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Delta {
    /// A string inserts text, any other value inserts an embed.
    Insert(Value, Option<Attrs>),
    Retain(u32, Option<Attrs>),
    Delete(u32),
}

impl Delta {
    pub fn insert<V: Into<Value>>(value: V) -> Self {
        Delta::Insert(value.into(), None)
    }

    pub fn insert_with<V: Into<Value>>(value: V, attrs: Attrs) -> Self {
        Delta::Insert(value.into(), Some(attrs))
    }

    pub fn retain(len: u32) -> Self {
        Delta::Retain(len, None)
    }

    pub fn retain_with(len: u32, attrs: Attrs) -> Self {
        Delta::Retain(len, Some(attrs))
    }

    pub fn delete(len: u32) -> Self {
        Delta::Delete(len)
    }

    /// Length in UTF-16 code units.
    pub fn len(&self) -> u32 {
        self.len_in(OffsetKind::Utf16)
    }

    pub fn len_in(&self, kind: OffsetKind) -> u32 {
        match *self {
            Delta::Insert(Value::String(ref s), _) => str_len(s, kind),
            Delta::Insert(_, _) => 1,
            Delta::Retain(len, _) | Delta::Delete(len) => len,
        }
    }
}

/// Applies `delta` to a sequence. Every retain and delete is checked
/// against the current content before anything changes, so a script
/// that runs past the end or splits a character leaves the sequence
/// untouched.
pub(crate) fn apply(txn: &mut Transaction, branch: BranchPtr, delta: Vec<Delta>) -> Result<(), Error> {
    // offsets into the existing content; inserts consume none of it
    let mut consumed: u32 = 0;
    for op in &delta {
        match *op {
            Delta::Insert(_, _) => {}
            Delta::Retain(n, _) | Delta::Delete(n) => {
                consumed = consumed.checked_add(n).ok_or(Error::OutOfBounds)?;
                check_boundary(txn.store(), branch, consumed)?;
            }
        }
    }

    let mut pos = ItemPosition::start(txn.store(), branch);
    for op in delta {
        match op {
            Delta::Insert(Value::String(s), attrs) =>
                text::insert_at(txn, &mut pos, Content::String(s), attrs.unwrap_or_default()),
            Delta::Insert(embed, attrs) =>
                text::insert_at(txn, &mut pos, Content::Embed(embed), attrs.unwrap_or_default()),
            Delta::Retain(0, _) | Delta::Delete(0) => {}
            Delta::Retain(n, attrs) =>
                text::format_at(txn, &mut pos, n, attrs.as_ref().unwrap_or(&EMPTY_ATTRS))?,
            Delta::Delete(n) =>
                text::delete_at(txn, &mut pos, n)?,
        }
    }
    Ok(())
}

/// Which items a side of a diff can see.
#[derive(Clone, Copy)]
enum View<'a> {
    Empty,
    Current,
    At(&'a Snapshot),
}

impl<'a> View<'a> {
    fn sees(&self, item: &Item, id: &ItemId) -> bool {
        match *self {
            View::Empty => false,
            View::Current => !item.deleted,
            View::At(snapshot) => snapshot.is_visible(id),
        }
    }

    fn boundaries(&self, item: &Item, cuts: &mut BTreeSet<u32>) {
        if let View::At(snapshot) = *self {
            let start = item.id.clock;
            let end = start + item.len;
            let known = snapshot.state_vector.get(item.id.client);
            if start < known && known < end {
                cuts.insert(known);
            }
            for (from, to) in snapshot.delete_set.ranges_within(item.id.client, start, end) {
                cuts.insert(from);
                cuts.insert(to);
            }
        }
    }
}

/// Computes the script that turns the content visible at `from` into
/// the content visible at `to`.
pub(crate) fn diff(store: &Store, branch: BranchPtr, from: Option<&Snapshot>, to: Option<&Snapshot>) -> Result<Vec<Delta>, Error> {
    try_assert!(!store.gc || (from.is_none() && to.is_none()), Error::GcEnabled);
    let lo = from.map_or(View::Empty, View::At);
    let hi = to.map_or(View::Current, View::At);

    let mut lo_attrs = Attrs::new();
    let mut hi_attrs = Attrs::new();
    let mut builder = DeltaBuilder::new();

    for ptr in store.iter(branch) {
        let item = store.item(ptr);
        let mut cuts = BTreeSet::new();
        cuts.insert(item.id.clock);
        cuts.insert(item.id.clock + item.len);
        lo.boundaries(item, &mut cuts);
        hi.boundaries(item, &mut cuts);
        let cuts: Vec<u32> = cuts.into_iter().collect();

        for window in cuts.windows(2) {
            let id = ItemId::new(item.id.client, window[0]);
            let (in_lo, in_hi) = (lo.sees(item, &id), hi.sees(item, &id));
            match item.content {
                Content::Format(ref key, ref value) => {
                    if in_lo { update_attrs(&mut lo_attrs, key, value) }
                    if in_hi { update_attrs(&mut hi_attrs, key, value) }
                }
                Content::String(_) | Content::Embed(_) => {
                    let piece = item.content.slice(window[0] - item.id.clock, window[1] - item.id.clock);
                    let len = piece.offset_len(store.offset_kind);
                    match (in_lo, in_hi) {
                        (false, true) => builder.push(Delta::Insert(content_value(piece), attrs_or_none(&hi_attrs))),
                        (true, false) => builder.push(Delta::Delete(len)),
                        (true, true) => builder.push(Delta::Retain(len, changed_attrs(&lo_attrs, &hi_attrs))),
                        (false, false) => {}
                    }
                }
                _ => {}
            }
        }
    }
    Ok(builder.finish())
}

fn content_value(content: Content) -> Value {
    match content {
        Content::String(s) => Value::String(s),
        Content::Embed(value) | Content::Any(value) => value,
        _ => Value::Null,
    }
}

fn attrs_or_none(attrs: &Attrs) -> Option<Attrs> {
    if attrs.is_empty() { None } else { Some(attrs.clone()) }
}

/// Attributes of `hi` that differ from `lo`; keys that disappeared map
/// to `Null`.
fn changed_attrs(lo: &Attrs, hi: &Attrs) -> Option<Attrs> {
    let mut changed = Attrs::new();
    for (key, value) in hi {
        if lo.get(key) != Some(value) {
            changed.insert(key.clone(), value.clone());
        }
    }
    for key in lo.keys() {
        if !hi.contains_key(key) {
            changed.insert(key.clone(), Value::Null);
        }
    }
    attrs_or_none(&changed)
}

/// Collects operations, merging neighbours that can be expressed as one.
struct DeltaBuilder {
    ops: Vec<Delta>,
}

impl DeltaBuilder {
    fn new() -> Self {
        DeltaBuilder{ops: Vec::new()}
    }

    fn push(&mut self, op: Delta) {
        if let Some(last) = self.ops.last_mut() {
            match (last, &op) {
                (&mut Delta::Insert(Value::String(ref mut s), ref a), &Delta::Insert(Value::String(ref t), ref b)) if a == b => {
                    s.push_str(t);
                    return
                }
                (&mut Delta::Retain(ref mut n, ref a), &Delta::Retain(m, ref b)) if a == b => {
                    *n += m;
                    return
                }
                (&mut Delta::Delete(ref mut n), &Delta::Delete(m)) => {
                    *n += m;
                    return
                }
                _ => {}
            }
        }
        self.ops.push(op);
    }

    fn finish(mut self) -> Vec<Delta> {
        while let Some(&Delta::Retain(_, None)) = self.ops.last() {
            self.ops.pop();
        }
        self.ops
    }
}
