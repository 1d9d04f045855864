//! Transactions group edits into one atomic, observable step.
//!
//! A `Transaction` holds the only mutable borrow of its `Document`
//! while it is open and commits itself when dropped. Text operations
//! accept anything that implements `Transact`: a document (the call
//! runs in its own short transaction) or an open transaction.

use crate::Error;
use crate::doc::Document;
use crate::encoding::update::{encode_update, Update};
use crate::encoding::{EncoderV1, EncoderV2};
use crate::id::{DeleteSet, StateVector};
use crate::store::{Content, Item, ItemPtr, Store, TypeKind};
use crate::text::{ItemPosition, TextRef};
use crate::xml::XmlFragment;
use std::fmt;

/// Tag attached to a transaction to tell where its changes came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Origin(Vec<u8>);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnState {
    Open,
    Committed,
    RolledBack,
}

pub struct Transaction<'doc> {
    doc: &'doc mut Document,
    state: TxnState,
    origin: Option<Origin>,
    before_state: StateVector,
    delete_set: DeleteSet,
    backup: Option<Box<Store>>,
    implicit: bool,
}

/// Read access to a document's contents.
pub trait ReadTxn {
    fn store(&self) -> &Store;
}

pub trait Transact {
    fn transact_mut<F, R>(self, f: F) -> Result<R, Error>
        where F: FnOnce(&mut Transaction) -> Result<R, Error>;
}

impl ReadTxn for Document {
    fn store(&self) -> &Store {
        &self.store
    }
}

impl<'doc> ReadTxn for Transaction<'doc> {
    fn store(&self) -> &Store {
        &self.doc.store
    }
}

impl<'a> Transact for &'a mut Document {
    fn transact_mut<F, R>(self, f: F) -> Result<R, Error>
        where F: FnOnce(&mut Transaction) -> Result<R, Error>
    {
        let mut txn = self.transact_implicit(None);
        let result = f(&mut txn);
        txn.commit()?;
        result
    }
}

impl<'a, 'doc> Transact for &'a mut Transaction<'doc> {
    fn transact_mut<F, R>(self, f: F) -> Result<R, Error>
        where F: FnOnce(&mut Transaction) -> Result<R, Error>
    {
        self.ensure_open()?;
        f(self)
    }
}

impl<'doc> Transaction<'doc> {
    pub(crate) fn new(doc: &'doc mut Document, origin: Option<Origin>, implicit: bool) -> Self {
        let before_state = doc.store.state.clone();
        Transaction{
            doc,
            state: TxnState::Open,
            origin,
            before_state,
            delete_set: DeleteSet::new(),
            backup: None,
            implicit,
        }
    }

    pub fn state(&self) -> TxnState {
        self.state
    }

    pub fn origin(&self) -> Option<&Origin> {
        self.origin.as_ref()
    }

    pub fn before_state(&self) -> &StateVector {
        &self.before_state
    }

    pub fn after_state(&self) -> &StateVector {
        &self.doc.store.state
    }

    pub fn state_vector(&self) -> StateVector {
        self.doc.store.state.clone()
    }

    /// Ids deleted by this transaction.
    pub fn delete_set(&self) -> &DeleteSet {
        &self.delete_set
    }

    pub fn get_text(&mut self, name: &str) -> TextRef {
        TextRef::new(self.store_mut().root(name, TypeKind::Text))
    }

    pub fn get_xml_fragment(&mut self, name: &str) -> XmlFragment {
        XmlFragment::integrated(self.store_mut().root(name, TypeKind::XmlFragment))
    }

    pub fn apply_update_v1(&mut self, bytes: &[u8]) -> Result<(), Error> {
        self.ensure_open()?;
        let update = Update::decode_v1(bytes)?;
        self.apply_update(update)
    }

    pub fn apply_update_v2(&mut self, bytes: &[u8]) -> Result<(), Error> {
        self.ensure_open()?;
        let update = Update::decode_v2(bytes)?;
        self.apply_update(update)
    }

    /// Changes made through this transaction so far.
    pub fn encode_update_v1(&self) -> Vec<u8> {
        encode_update::<EncoderV1>(&self.doc.store, &self.before_state, &self.delete_set)
    }

    pub fn encode_update_v2(&self) -> Vec<u8> {
        encode_update::<EncoderV2>(&self.doc.store, &self.before_state, &self.delete_set)
    }

    /// Collects the content deleted so far in this transaction right
    /// away, even on a document that keeps deleted content for
    /// snapshots. Snapshot reads can no longer see what it removes.
    pub fn gc(&mut self) -> Result<(), Error> {
        self.ensure_open()?;
        let (store, ds) = self.parts();
        store.gc(ds);
        Ok(())
    }

    pub fn commit(&mut self) -> Result<(), Error> {
        self.ensure_open()?;
        if self.doc.store.gc {
            self.doc.store.gc(&self.delete_set);
        }
        self.state = TxnState::Committed;
        self.backup = None;
        debug!("committed transaction (client {}, origin {:?}): {:?} -> {:?}, deleted {:?}",
            self.doc.store.client_id, self.origin, self.before_state, self.doc.store.state, self.delete_set);
        Ok(())
    }

    /// Restores the document to the state it had when the transaction
    /// was opened.
    pub fn rollback(&mut self) -> Result<(), Error> {
        self.ensure_open()?;
        try_assert!(!self.implicit, Error::TransactionRequired);
        if let Some(backup) = self.backup.take() {
            self.doc.store.restore(*backup);
        }
        self.delete_set = DeleteSet::new();
        self.state = TxnState::RolledBack;
        debug!("rolled back transaction (client {})", self.doc.store.client_id);
        Ok(())
    }

    pub(crate) fn ensure_open(&self) -> Result<(), Error> {
        try_assert!(self.state == TxnState::Open, Error::TransactionCommitted);
        Ok(())
    }

    pub(crate) fn apply_update(&mut self, update: Update) -> Result<(), Error> {
        self.ensure_open()?;
        let (store, ds) = self.parts();
        store.apply_update(update, ds);
        Ok(())
    }

    pub(crate) fn store_mut(&mut self) -> &mut Store {
        self.parts().0
    }

    pub(crate) fn parts(&mut self) -> (&mut Store, &mut DeleteSet) {
        if self.backup.is_none() && !self.implicit {
            self.backup = Some(Box::new(self.doc.store.clone()));
        }
        (&mut self.doc.store, &mut self.delete_set)
    }

    /// Creates a local item between `pos.left` and `pos.right`.
    pub(crate) fn create_item(&mut self, pos: &ItemPosition, content: Content, parent_sub: Option<String>) -> ItemPtr {
        let (store, ds) = self.parts();
        let len = content.len();
        let node = match content {
            Content::Node(branch) => Some(branch),
            _ => None,
        };
        let id = store.state.next_id(store.client_id, len);
        let origin = pos.left.map(|ptr| store.item(ptr).last_id());
        let right_origin = pos.right.map(|ptr| store.item(ptr).id);
        let ptr = store.push_item(Item{
            id,
            len,
            origin,
            right_origin,
            left: pos.left,
            right: pos.right,
            parent: pos.parent,
            parent_sub,
            content,
            deleted: false,
        });
        if let Some(branch) = node {
            store.branch_mut(branch).item = Some(ptr);
        }
        store.integrate(ptr, ds);
        ptr
    }

    pub(crate) fn delete(&mut self, ptr: ItemPtr) -> bool {
        let (store, ds) = self.parts();
        store.delete_item(ptr, ds)
    }
}

impl<'doc> Drop for Transaction<'doc> {
    fn drop(&mut self) {
        if self.state == TxnState::Open {
            let _ = self.commit();
        }
    }
}

impl<'doc> fmt::Debug for Transaction<'doc> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("state", &self.state)
            .field("origin", &self.origin)
            .field("before_state", &self.before_state)
            .field("delete_set", &self.delete_set)
            .finish()
    }
}

impl Origin {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl AsRef<[u8]> for Origin {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl<'a> From<&'a str> for Origin {
    fn from(s: &'a str) -> Self {
        Origin(s.as_bytes().to_vec())
    }
}

impl From<String> for Origin {
    fn from(s: String) -> Self {
        Origin(s.into_bytes())
    }
}

impl<'a> From<&'a [u8]> for Origin {
    fn from(bytes: &'a [u8]) -> Self {
        Origin(bytes.to_vec())
    }
}

impl From<Vec<u8>> for Origin {
    fn from(bytes: Vec<u8>) -> Self {
        Origin(bytes)
    }
}
