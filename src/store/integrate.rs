use crate::encoding::update::{Block, BlockContent, ParentRef, Update};
use crate::id::{ClientId, Clock, DeleteSet, ItemId};
use crate::store::{BranchPtr, Content, Item, ItemPtr, Store, TypeKind};
use std::cmp::{max, min};
use std::collections::HashSet;
use std::mem;

/// Remote data whose causal dependencies have not arrived yet.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PendingUpdate {
    pub blocks: Vec<Block>,
    pub delete_set: DeleteSet,
}

enum Readiness {
    Ready(u32),
    Known,
    Missing,
}

impl Store {
    /// Links a pushed item into its parent. On entry `left` and `right`
    /// hold the items at the item's origin and right origin; concurrent
    /// inserts between them are ordered by the YATA rules.
    pub fn integrate(&mut self, ptr: ItemPtr, ds: &mut DeleteSet) {
        let (id, origin, right_origin, parent, parent_sub) = {
            let item = &self.items[ptr];
            (item.id, item.origin, item.right_origin, item.parent, item.parent_sub.clone())
        };
        let mut left = self.items[ptr].left;
        let right = self.items[ptr].right;

        let conflict = match left {
            None => right.map_or(true, |r| self.items[r].left.is_some()),
            Some(l) => self.items[l].right != right,
        };
        if conflict {
            let mut next = match (left, parent_sub.as_ref()) {
                (Some(l), _) => self.items[l].right,
                (None, Some(key)) => self.map_chain_start(parent, key),
                (None, None) => self.branches[parent].start,
            };
            let mut before_origin = HashSet::new();
            let mut conflicting = HashSet::new();
            while let Some(o) = next {
                if Some(o) == right { break }
                before_origin.insert(o);
                conflicting.insert(o);
                let other = &self.items[o];
                if other.origin == origin {
                    if other.id.client < id.client {
                        left = Some(o);
                        conflicting.clear();
                    } else if other.right_origin == right_origin {
                        break;
                    }
                } else {
                    match other.origin.and_then(|oid| self.find(&oid)) {
                        Some(origin_ptr) if before_origin.contains(&origin_ptr) => {
                            if !conflicting.contains(&origin_ptr) {
                                left = Some(o);
                                conflicting.clear();
                            }
                        }
                        _ => break,
                    }
                }
                next = other.right;
            }
        }

        let right = match left {
            Some(l) => mem::replace(&mut self.items[l].right, Some(ptr)),
            None => match parent_sub.as_ref() {
                Some(key) => self.map_chain_start(parent, key),
                None => mem::replace(&mut self.branches[parent].start, Some(ptr)),
            },
        };
        self.items[ptr].left = left;
        self.items[ptr].right = right;

        match right {
            Some(r) => self.items[r].left = Some(ptr),
            None => if let Some(ref key) = parent_sub {
                self.branches[parent].map.insert(key.clone(), ptr);
                if let Some(l) = left {
                    self.delete_item(l, ds);
                }
            },
        }
        trace!("integrated {} into branch {} after {:?}", id, parent, left.map(|l| self.items[l].id));

        let parent_deleted = self.branches[parent].item.map_or(false, |p| self.items[p].deleted);
        if parent_deleted || (parent_sub.is_some() && right.is_some()) {
            self.delete_item(ptr, ds);
        }
    }

    fn map_chain_start(&self, parent: BranchPtr, key: &str) -> Option<ItemPtr> {
        let mut ptr = *try_opt!(self.branches[parent].map.get(key));
        while let Some(left) = self.items[ptr].left {
            ptr = left;
        }
        Some(ptr)
    }

    /// Integrates remote items and deletions. Anything whose causal
    /// dependencies are missing is kept until a later update fills the gap.
    pub fn apply_update(&mut self, update: Update, ds: &mut DeleteSet) {
        let mut pending = self.pending.take().unwrap_or_default();
        pending.blocks.extend(update.blocks);
        pending.blocks.sort_by_key(|block| (block.id.client, block.id.clock));
        pending.delete_set.merge(&update.delete_set);

        let mut integrated = 0;
        loop {
            let mut progress = false;
            let mut waiting = Vec::new();
            for block in mem::replace(&mut pending.blocks, vec![]) {
                match self.readiness(&block) {
                    Readiness::Ready(offset) => {
                        self.integrate_block(block, offset, ds);
                        integrated += 1;
                        progress = true;
                    }
                    Readiness::Known => {}
                    Readiness::Missing => waiting.push(block),
                }
            }
            pending.blocks = waiting;
            if !progress || pending.blocks.is_empty() { break }
        }

        let deletes = mem::replace(&mut pending.delete_set, DeleteSet::new());
        pending.delete_set = self.apply_delete_set(&deletes, ds);

        debug!("applied update: {} items integrated, state {:?}", integrated, self.state);
        if pending.blocks.is_empty() && pending.delete_set.is_empty() {
            self.pending = None;
        } else {
            warn!("update left {} items and {:?} deletions pending", pending.blocks.len(), pending.delete_set);
            self.pending = Some(pending);
        }
    }

    fn readiness(&self, block: &Block) -> Readiness {
        let known = self.state.get(block.id.client);
        if block.id.clock > known {
            return Readiness::Missing
        }
        if block.id.clock + block.len() <= known {
            return Readiness::Known
        }
        let parent = match block.parent {
            Some(ParentRef::Node(id)) => Some(id),
            _ => None,
        };
        let dependencies = [block.origin, block.right_origin, parent];
        if dependencies.iter().flatten().any(|id| !self.state.contains(id)) {
            return Readiness::Missing
        }
        Readiness::Ready(known - block.id.clock)
    }

    fn integrate_block(&mut self, mut block: Block, offset: u32, ds: &mut DeleteSet) {
        if offset > 0 {
            block.id.clock += offset;
            block.origin = Some(ItemId::new(block.id.client, block.id.clock - 1));
            block.content = block.content.splice(offset);
        }
        let len = block.len();
        let left = block.origin.and_then(|id| self.clean_end(&id));
        let right = block.right_origin.and_then(|id| self.clean_start(&id));

        let parent = match block.parent {
            Some(ParentRef::Root(ref name)) => Some((self.root(name, TypeKind::Undefined), block.parent_sub.clone())),
            Some(ParentRef::Node(ref id)) => self.find(id)
                .and_then(|ptr| self.node_branch(ptr))
                .map(|branch| (branch, block.parent_sub.clone())),
            None => left.or(right).map(|ptr| (self.items[ptr].parent, self.items[ptr].parent_sub.clone())),
        };
        let (parent, parent_sub) = match parent {
            Some(parent) => parent,
            None => {
                warn!("dropping {}: its parent is unknown", block.id);
                self.state.observe(&block.id, len);
                return
            }
        };

        let mut node = None;
        let mut tombstone = false;
        let content = match block.content {
            BlockContent::String(s) => Content::String(s),
            BlockContent::Embed(value) => Content::Embed(value),
            BlockContent::Format(key, value) => Content::Format(key, value),
            BlockContent::Any(value) => Content::Any(value),
            BlockContent::Deleted(len) => {
                tombstone = true;
                Content::Deleted(len)
            }
            BlockContent::Node(kind) => {
                let branch = self.new_branch(kind);
                node = Some(branch);
                Content::Node(branch)
            }
        };

        let ptr = self.push_item(Item{
            id: block.id,
            len,
            origin: block.origin,
            right_origin: block.right_origin,
            left,
            right,
            parent,
            parent_sub,
            content,
            deleted: false,
        });
        if let Some(branch) = node {
            self.branches[branch].item = Some(ptr);
        }
        self.state.observe(&block.id, len);
        self.integrate(ptr, ds);
        if tombstone {
            self.delete_item(ptr, ds);
        }
    }

    /// Deletes every known id in `incoming` and returns the ranges that
    /// refer to clocks this store has not seen yet.
    fn apply_delete_set(&mut self, incoming: &DeleteSet, ds: &mut DeleteSet) -> DeleteSet {
        let mut unapplied = DeleteSet::new();
        for (client, ranges) in incoming.iter() {
            let known = self.state.get(client);
            for &(clock, len) in ranges {
                let end = clock + len;
                if clock < known {
                    self.delete_range(client, clock, min(end, known), ds);
                }
                if end > known {
                    let start = max(clock, known);
                    unapplied.insert(&ItemId::new(client, start), end - start);
                }
            }
        }
        unapplied
    }

    fn delete_range(&mut self, client: ClientId, start: Clock, end: Clock, ds: &mut DeleteSet) {
        let mut clock = start;
        while clock < end {
            let ptr = match self.find(&ItemId::new(client, clock)) {
                Some(ptr) => ptr,
                None => {
                    clock += 1;
                    continue
                }
            };
            let (item_clock, item_end, deleted) = {
                let item = &self.items[ptr];
                (item.id.clock, item.id.clock + item.len, item.deleted)
            };
            if !deleted {
                let ptr = if item_clock < clock { self.split(ptr, clock - item_clock) } else { ptr };
                if item_end > end {
                    self.split(ptr, end - clock);
                }
                self.delete_item(ptr, ds);
            }
            clock = item_end;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc::OffsetKind;

    fn root_block(client: ClientId, clock: Clock, s: &str) -> Block {
        Block{
            id: ItemId::new(client, clock),
            origin: None,
            right_origin: None,
            parent: Some(ParentRef::Root("text".to_owned())),
            parent_sub: None,
            content: BlockContent::String(s.to_owned()),
        }
    }

    fn after(client: ClientId, clock: Clock, origin: ItemId, s: &str) -> Block {
        Block{
            id: ItemId::new(client, clock),
            origin: Some(origin),
            right_origin: None,
            parent: None,
            parent_sub: None,
            content: BlockContent::String(s.to_owned()),
        }
    }

    fn text(store: &mut Store) -> String {
        let branch = store.root("text", TypeKind::Text);
        store.iter(branch)
            .map(|ptr| store.item(ptr))
            .filter(|item| !item.deleted)
            .filter_map(|item| match item.content {
                Content::String(ref s) => Some(s.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_concurrent_inserts_order_by_client() {
        let mut store1 = Store::new(9, OffsetKind::Utf16, true);
        let mut store2 = Store::new(9, OffsetKind::Utf16, true);
        let mut ds = DeleteSet::new();

        store1.apply_update(Update{blocks: vec![root_block(1, 0, "a"), root_block(2, 0, "b")], delete_set: DeleteSet::new()}, &mut ds);
        store2.apply_update(Update{blocks: vec![root_block(2, 0, "b")], delete_set: DeleteSet::new()}, &mut ds);
        store2.apply_update(Update{blocks: vec![root_block(1, 0, "a")], delete_set: DeleteSet::new()}, &mut ds);

        assert!(text(&mut store1) == "ab");
        assert!(text(&mut store2) == "ab");
    }

    #[test]
    fn test_out_of_order_blocks_wait() {
        let mut store = Store::new(9, OffsetKind::Utf16, true);
        let mut ds = DeleteSet::new();

        store.apply_update(Update{blocks: vec![after(1, 2, ItemId::new(1, 1), "c")], delete_set: DeleteSet::new()}, &mut ds);
        assert!(text(&mut store) == "");
        assert!(store.pending().map(|p| p.blocks.len()) == Some(1));

        store.apply_update(Update{blocks: vec![root_block(1, 0, "ab")], delete_set: DeleteSet::new()}, &mut ds);
        assert!(text(&mut store) == "abc");
        assert!(store.pending().is_none());
    }

    #[test]
    fn test_partially_known_block() {
        let mut store = Store::new(9, OffsetKind::Utf16, true);
        let mut ds = DeleteSet::new();
        store.apply_update(Update{blocks: vec![root_block(1, 0, "ab")], delete_set: DeleteSet::new()}, &mut ds);
        store.apply_update(Update{blocks: vec![root_block(1, 0, "ab")], delete_set: DeleteSet::new()}, &mut ds);
        assert!(text(&mut store) == "ab");

        store.apply_update(Update{blocks: vec![root_block(1, 0, "abcd")], delete_set: DeleteSet::new()}, &mut ds);
        assert!(text(&mut store) == "abcd");
        assert!(store.state.get(1) == 4);
    }

    #[test]
    fn test_pending_deletes() {
        let mut store = Store::new(9, OffsetKind::Utf16, true);
        let mut ds = DeleteSet::new();
        let mut deletes = DeleteSet::new();
        deletes.insert(&ItemId::new(1, 1), 3);

        store.apply_update(Update{blocks: vec![root_block(1, 0, "ab")], delete_set: deletes}, &mut ds);
        assert!(text(&mut store) == "a");
        assert!(store.pending().map(|p| p.delete_set.contains(&ItemId::new(1, 3))) == Some(true));

        store.apply_update(Update{blocks: vec![after(1, 2, ItemId::new(1, 1), "cde")], delete_set: DeleteSet::new()}, &mut ds);
        assert!(text(&mut store) == "ae");
        assert!(store.pending().is_none());
    }
}
