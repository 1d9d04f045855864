use crate::Error;
use crate::encoding::update::{encode_update, Update};
use crate::encoding::{EncoderV1, EncoderV2};
use crate::id::{ClientId, StateVector};
use crate::snapshot::Snapshot;
use crate::store::{Store, TypeKind};
use crate::text::TextRef;
use crate::transaction::{Origin, Transaction};
use crate::xml::XmlFragment;
use rand;

/// Largest integer a double can hold exactly. Random client ids stay
/// below it so they survive a trip through JavaScript or JSON.
const MAX_SAFE_INTEGER: u64 = (1 << 53) - 1;

/// How text lengths and indexes are counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OffsetKind {
    Utf16,
    Bytes,
}

impl Default for OffsetKind {
    fn default() -> Self {
        OffsetKind::Utf16
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    pub client_id: Option<ClientId>,
    pub gc: bool,
    pub offset_kind: OffsetKind,
}

impl Default for Options {
    fn default() -> Self {
        Options{client_id: None, gc: true, offset_kind: OffsetKind::Utf16}
    }
}

/// A replica of a document. All reads go through `&Document` or a
/// transaction, all writes through a transaction.
#[derive(Debug)]
pub struct Document {
    options: Options,
    pub(crate) store: Store,
}

impl Document {
    pub fn new() -> Self {
        Document::with_options(Options::default())
    }

    pub fn with_client_id(client_id: ClientId) -> Self {
        Document::with_options(Options{client_id: Some(client_id), ..Options::default()})
    }

    pub fn with_options(mut options: Options) -> Self {
        let client_id = options.client_id.unwrap_or_else(|| rand::random::<u64>() & MAX_SAFE_INTEGER);
        options.client_id = Some(client_id);
        let store = Store::new(client_id, options.offset_kind, options.gc);
        Document{options, store}
    }

    pub fn client_id(&self) -> ClientId {
        self.store.client_id
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn get_text(&mut self, name: &str) -> TextRef {
        TextRef::new(self.store.root(name, TypeKind::Text))
    }

    pub fn get_xml_fragment(&mut self, name: &str) -> XmlFragment {
        XmlFragment::integrated(self.store.root(name, TypeKind::XmlFragment))
    }

    pub fn transact(&mut self) -> Transaction {
        Transaction::new(self, None, false)
    }

    pub fn transact_with<O: Into<Origin>>(&mut self, origin: O) -> Transaction {
        Transaction::new(self, Some(origin.into()), false)
    }

    pub fn state_vector(&self) -> StateVector {
        self.store.state.clone()
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot::new(self.store.state.clone(), self.store.delete_set())
    }

    pub fn equal_snapshots(a: &Snapshot, b: &Snapshot) -> bool {
        a == b
    }

    pub fn encode_state_vector_v1(&self) -> Vec<u8> {
        self.store.state.encode_v1()
    }

    pub fn encode_state_vector_v2(&self) -> Vec<u8> {
        self.store.state.encode_v2()
    }

    /// Everything `sv` is missing. An empty vector yields the full state.
    pub fn encode_state_as_update_v1(&self, sv: &StateVector) -> Vec<u8> {
        encode_update::<EncoderV1>(&self.store, sv, &self.store.delete_set())
    }

    pub fn encode_state_as_update_v2(&self, sv: &StateVector) -> Vec<u8> {
        encode_update::<EncoderV2>(&self.store, sv, &self.store.delete_set())
    }

    /// Items created after `snapshot` was taken, with the current delete set.
    pub fn encode_state_from_snapshot_v1(&self, snapshot: &Snapshot) -> Vec<u8> {
        self.encode_state_as_update_v1(&snapshot.state_vector)
    }

    pub fn encode_state_from_snapshot_v2(&self, snapshot: &Snapshot) -> Vec<u8> {
        self.encode_state_as_update_v2(&snapshot.state_vector)
    }

    pub fn apply_update_v1(&mut self, bytes: &[u8]) -> Result<(), Error> {
        let update = Update::decode_v1(bytes)?;
        self.transact_implicit(None).apply_update(update)
    }

    pub fn apply_update_v2(&mut self, bytes: &[u8]) -> Result<(), Error> {
        let update = Update::decode_v2(bytes)?;
        self.transact_implicit(None).apply_update(update)
    }

    pub fn apply_update_v1_with<O: Into<Origin>>(&mut self, bytes: &[u8], origin: O) -> Result<(), Error> {
        let update = Update::decode_v1(bytes)?;
        self.transact_implicit(Some(origin.into())).apply_update(update)
    }

    pub fn apply_update_v2_with<O: Into<Origin>>(&mut self, bytes: &[u8], origin: O) -> Result<(), Error> {
        let update = Update::decode_v2(bytes)?;
        self.transact_implicit(Some(origin.into())).apply_update(update)
    }

    /// A transaction that commits when dropped and cannot be rolled back.
    pub(crate) fn transact_implicit(&mut self, origin: Option<Origin>) -> Transaction {
        Transaction::new(self, origin, true)
    }
}

impl Default for Document {
    fn default() -> Self {
        Document::new()
    }
}
