//! The item store owns every item and branch of a document.
//!
//! Items and branches live in arenas and refer to each other by
//! index, so the parent, sibling and child links of the tree never
//! form ownership cycles. A per-client `BTreeMap<Clock, ItemPtr>`
//! answers id lookups.

mod integrate;
mod item;

pub use self::item::{Content, Item, ItemPtr};
pub use self::item::{byte_index, str_len};
pub use self::integrate::PendingUpdate;

use crate::doc::OffsetKind;
use crate::id::{ClientId, Clock, DeleteSet, ItemId, StateVector};
use crate::value::{Attrs, Value};
use std::collections::BTreeMap;
use std::mem;

pub type BranchPtr = usize;

#[derive(Debug, Clone, PartialEq)]
pub enum TypeKind {
    /// A root that was created by decoding an update before anyone
    /// asked for it by name.
    Undefined,
    Text,
    XmlFragment,
    XmlElement(String),
    XmlText,
}

/// One shared type instance: a root, or a node nested in an XML tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Branch {
    pub kind: TypeKind,
    pub start: Option<ItemPtr>,
    pub map: BTreeMap<String, ItemPtr>,
    pub item: Option<ItemPtr>,
    pub name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Store {
    pub client_id: ClientId,
    pub offset_kind: OffsetKind,
    pub gc: bool,
    pub state: StateVector,
    items: Vec<Item>,
    branches: Vec<Branch>,
    roots: BTreeMap<String, BranchPtr>,
    blocks: BTreeMap<ClientId, BTreeMap<Clock, ItemPtr>>,
    pending: Option<PendingUpdate>,
}

/// Walks the items of a branch sequence from left to right.
pub struct Iter<'a> {
    store: &'a Store,
    next: Option<ItemPtr>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = ItemPtr;

    fn next(&mut self) -> Option<ItemPtr> {
        let ptr = try_opt!(self.next);
        self.next = self.store.items[ptr].right;
        Some(ptr)
    }
}

impl Store {
    pub fn new(client_id: ClientId, offset_kind: OffsetKind, gc: bool) -> Self {
        Store{
            client_id,
            offset_kind,
            gc,
            state: StateVector::new(),
            items: Vec::new(),
            branches: Vec::new(),
            roots: BTreeMap::new(),
            blocks: BTreeMap::new(),
            pending: None,
        }
    }

    pub fn item(&self, ptr: ItemPtr) -> &Item {
        &self.items[ptr]
    }

    pub fn item_mut(&mut self, ptr: ItemPtr) -> &mut Item {
        &mut self.items[ptr]
    }

    pub fn branch(&self, ptr: BranchPtr) -> &Branch {
        &self.branches[ptr]
    }

    pub fn branch_mut(&mut self, ptr: BranchPtr) -> &mut Branch {
        &mut self.branches[ptr]
    }

    pub fn pending(&self) -> Option<&PendingUpdate> {
        self.pending.as_ref()
    }

    /// Returns the root branch called `name`, creating it if needed.
    /// A root first seen in an update has no kind until it is asked
    /// for, at which point it takes the requested one.
    pub fn root(&mut self, name: &str, kind: TypeKind) -> BranchPtr {
        if let Some(&ptr) = self.roots.get(name) {
            let branch = &mut self.branches[ptr];
            if branch.kind == TypeKind::Undefined {
                branch.kind = kind;
            }
            return ptr
        }
        let ptr = self.new_branch(kind);
        self.branches[ptr].name = Some(name.to_owned());
        self.roots.insert(name.to_owned(), ptr);
        ptr
    }

    pub fn new_branch(&mut self, kind: TypeKind) -> BranchPtr {
        self.branches.push(Branch{kind, start: None, map: BTreeMap::new(), item: None, name: None});
        self.branches.len() - 1
    }

    /// Adds an item to the arena and the block index without linking it
    /// into its branch.
    pub fn push_item(&mut self, item: Item) -> ItemPtr {
        let ptr = self.items.len();
        self.blocks.entry(item.id.client).or_insert_with(BTreeMap::new).insert(item.id.clock, ptr);
        self.items.push(item);
        ptr
    }

    /// Finds the item whose clock range contains `id`.
    pub fn find(&self, id: &ItemId) -> Option<ItemPtr> {
        let blocks = try_opt!(self.blocks.get(&id.client));
        let (_, &ptr) = try_opt!(blocks.range(..=id.clock).next_back());
        if self.items[ptr].contains(id) { Some(ptr) } else { None }
    }

    /// Items of `client` in clock order, starting with the one that
    /// contains `clock`.
    pub fn blocks_from(&self, client: ClientId, clock: Clock) -> Vec<ItemPtr> {
        let blocks = match self.blocks.get(&client) {
            Some(blocks) => blocks,
            None => return vec![],
        };
        let mut ptrs: Vec<ItemPtr> = blocks.range(clock..).map(|(_, &ptr)| ptr).collect();
        if let Some(ptr) = self.find(&ItemId::new(client, clock)) {
            if self.items[ptr].id.clock < clock {
                ptrs.insert(0, ptr);
            }
        }
        ptrs
    }

    pub fn clients(&self) -> Vec<ClientId> {
        self.blocks.keys().cloned().collect()
    }

    /// Splits an item so that its first `offset` clock units stay in
    /// place and the rest becomes a new item to its right.
    pub fn split(&mut self, ptr: ItemPtr, offset: u32) -> ItemPtr {
        let right_content = self.items[ptr].content.split(offset);
        let right = {
            let item = &mut self.items[ptr];
            let right = Item{
                id: ItemId::new(item.id.client, item.id.clock + offset),
                len: item.len - offset,
                origin: Some(ItemId::new(item.id.client, item.id.clock + offset - 1)),
                right_origin: item.right_origin,
                left: Some(ptr),
                right: item.right,
                parent: item.parent,
                parent_sub: item.parent_sub.clone(),
                content: right_content,
                deleted: item.deleted,
            };
            item.len = offset;
            right
        };
        let next = right.right;
        let right_ptr = self.push_item(right);
        self.items[ptr].right = Some(right_ptr);
        if let Some(next) = next {
            self.items[next].left = Some(right_ptr);
        }
        right_ptr
    }

    /// The item starting exactly at `id`, splitting if necessary.
    pub fn clean_start(&mut self, id: &ItemId) -> Option<ItemPtr> {
        let ptr = try_opt!(self.find(id));
        let offset = id.clock - self.items[ptr].id.clock;
        if offset > 0 { Some(self.split(ptr, offset)) } else { Some(ptr) }
    }

    /// The item ending exactly at `id`, splitting if necessary.
    pub fn clean_end(&mut self, id: &ItemId) -> Option<ItemPtr> {
        let ptr = try_opt!(self.find(id));
        let item = &self.items[ptr];
        if id.clock + 1 < item.id.clock + item.len {
            let offset = id.clock - item.id.clock + 1;
            self.split(ptr, offset);
        }
        Some(ptr)
    }

    /// Marks an item deleted and records it in `ds`. Deleting a node
    /// deletes everything nested in it.
    pub fn delete_item(&mut self, ptr: ItemPtr, ds: &mut DeleteSet) -> bool {
        if self.items[ptr].deleted {
            return false
        }
        let item = &mut self.items[ptr];
        item.deleted = true;
        ds.insert(&item.id, item.len);
        trace!("deleted {} (len {})", item.id, item.len);

        let node = match item.content {
            Content::Node(branch) => Some(branch),
            _ => None,
        };
        if let Some(branch) = node {
            let mut nested: Vec<ItemPtr> = self.iter(branch).collect();
            nested.extend(self.branches[branch].map.values().cloned());
            for child in nested {
                self.delete_item(child, ds);
            }
        }
        true
    }

    /// Deleted ids known to this store.
    pub fn delete_set(&self) -> DeleteSet {
        let mut ds = DeleteSet::new();
        for item in self.items.iter().filter(|item| item.deleted) {
            ds.insert(&item.id, item.len);
        }
        ds
    }

    /// Drops the content of deleted items covered by `ds`. Nodes keep
    /// their branch so late children still find a parent.
    pub fn gc(&mut self, ds: &DeleteSet) {
        let mut collected = 0;
        for (client, ranges) in ds.iter() {
            for &(clock, len) in ranges {
                for ptr in self.blocks_from(client, clock) {
                    let item = &mut self.items[ptr];
                    if item.id.clock >= clock + len { break }
                    if !item.deleted || item.id.clock < clock || item.id.clock + item.len > clock + len {
                        continue
                    }
                    match item.content {
                        Content::Node(_) | Content::Deleted(_) => {}
                        _ => {
                            item.content = Content::Deleted(item.len);
                            collected += 1;
                        }
                    }
                }
            }
        }
        if collected > 0 {
            debug!("garbage collected {} items", collected);
        }
    }

    pub fn iter(&self, branch: BranchPtr) -> Iter {
        Iter{store: self, next: self.branches[branch].start}
    }

    /// Length of the visible content of a sequence, in offset units.
    pub fn branch_len(&self, branch: BranchPtr) -> u32 {
        self.iter(branch)
            .map(|ptr| &self.items[ptr])
            .filter(|item| !item.deleted)
            .map(|item| item.content.offset_len(self.offset_kind))
            .sum()
    }

    /// Visible node children of a branch.
    pub fn children(&self, branch: BranchPtr) -> Vec<BranchPtr> {
        self.iter(branch)
            .map(|ptr| &self.items[ptr])
            .filter(|item| !item.deleted)
            .filter_map(|item| match item.content {
                Content::Node(child) => Some(child),
                _ => None,
            })
            .collect()
    }

    pub fn map_get(&self, branch: BranchPtr, key: &str) -> Option<&Value> {
        let ptr = try_opt!(self.branches[branch].map.get(key));
        let item = &self.items[*ptr];
        match item.content {
            Content::Any(ref value) if !item.deleted => Some(value),
            _ => None,
        }
    }

    pub fn map_entries(&self, branch: BranchPtr) -> Attrs {
        let mut attrs = Attrs::new();
        for key in self.branches[branch].map.keys() {
            if let Some(value) = self.map_get(branch, key) {
                attrs.insert(key.clone(), value.clone());
            }
        }
        attrs
    }

    /// The branch a node item nests, if `ptr` is one.
    pub fn node_branch(&self, ptr: ItemPtr) -> Option<BranchPtr> {
        match self.items[ptr].content {
            Content::Node(branch) => Some(branch),
            _ => None,
        }
    }

    /// The branch that contains the node `branch` as a child.
    pub fn parent_of(&self, branch: BranchPtr) -> Option<BranchPtr> {
        let ptr = try_opt!(self.branches[branch].item);
        Some(self.items[ptr].parent)
    }

    /// A root is always alive. A nested node is alive while its item
    /// is not deleted.
    pub fn is_alive(&self, branch: BranchPtr) -> bool {
        match self.branches.get(branch) {
            Some(&Branch{item: Some(ptr), ..}) => !self.items[ptr].deleted,
            Some(branch) => branch.name.is_some(),
            None => false,
        }
    }

    /// A node branch with no item behind it: its creation was rolled back.
    pub fn is_detached(&self, branch: BranchPtr) -> bool {
        match self.branches.get(branch) {
            Some(branch) => branch.item.is_none() && branch.name.is_none(),
            None => true,
        }
    }

    /// Swaps in `backup` while keeping every branch slot handed out
    /// after it was taken, so handles to those branches stay valid.
    /// Roots created since come back empty and nested nodes created
    /// since are left detached.
    pub fn restore(&mut self, backup: Store) {
        let live = mem::replace(self, backup).branches;
        for branch in live.into_iter().skip(self.branches.len()) {
            let ptr = self.new_branch(branch.kind);
            if let Some(name) = branch.name {
                self.roots.insert(name.clone(), ptr);
                self.branches[ptr].name = Some(name);
            }
        }
    }
}
