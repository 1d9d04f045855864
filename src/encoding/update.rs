//! Update records and their wire layout.
//!
//! ```text
//! u8 version
//! section: varint client_count
//!   per client (ascending id), section:
//!     varint client_id, varint item_count
//!     per item: varint clock, u8 info, [origin id], [right origin id],
//!               [parent: root name | node id, parent_sub] (only without origins),
//!               content
//! section: delete set
//! ```
//!
//! The low nibble of `info` holds the content kind, the high bits flag
//! which optional fields follow.

use crate::Error;
use crate::encoding::{Decoder, Encoder};
use crate::id::{ClientId, DeleteSet, ItemId, StateVector};
use crate::store::{byte_index, Content, ItemPtr, Store, TypeKind};
use crate::value::Value;

const HAS_ORIGIN: u8 = 0x80;
const HAS_RIGHT_ORIGIN: u8 = 0x40;
const HAS_PARENT_SUB: u8 = 0x20;

const KIND_STRING: u8 = 1;
const KIND_EMBED: u8 = 2;
const KIND_FORMAT: u8 = 3;
const KIND_NODE: u8 = 4;
const KIND_ANY: u8 = 5;
const KIND_DELETED: u8 = 6;

const PARENT_NODE: u8 = 0;
const PARENT_ROOT: u8 = 1;

const TYPE_UNDEFINED: u8 = 0;
const TYPE_TEXT: u8 = 1;
const TYPE_XML_FRAGMENT: u8 = 2;
const TYPE_XML_ELEMENT: u8 = 3;
const TYPE_XML_TEXT: u8 = 4;

#[derive(Debug, Clone, PartialEq)]
pub enum ParentRef {
    Root(String),
    Node(ItemId),
}

#[derive(Debug, Clone, PartialEq)]
pub enum BlockContent {
    String(String),
    Embed(Value),
    Format(String, Value),
    Node(TypeKind),
    Any(Value),
    Deleted(u32),
}

/// A decoded item that has not been integrated into a store yet.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub id: ItemId,
    pub origin: Option<ItemId>,
    pub right_origin: Option<ItemId>,
    pub parent: Option<ParentRef>,
    pub parent_sub: Option<String>,
    pub content: BlockContent,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Update {
    pub blocks: Vec<Block>,
    pub delete_set: DeleteSet,
}

impl BlockContent {
    pub fn len(&self) -> u32 {
        match *self {
            BlockContent::String(ref s) => s.chars().count() as u32,
            BlockContent::Deleted(len) => len,
            _ => 1,
        }
    }

    /// Drops the first `offset` clock units.
    pub fn splice(self, offset: u32) -> BlockContent {
        match self {
            BlockContent::String(s) => {
                let byte = byte_index(&s, offset);
                BlockContent::String(s[byte..].to_owned())
            }
            BlockContent::Deleted(len) => BlockContent::Deleted(len - offset),
            other => other,
        }
    }
}

impl Block {
    pub fn len(&self) -> u32 {
        self.content.len()
    }
}

impl Update {
    pub fn decode_v1(bytes: &[u8]) -> Result<Update, Error> {
        decode_update::<super::DecoderV1>(bytes)
    }

    pub fn decode_v2(bytes: &[u8]) -> Result<Update, Error> {
        decode_update::<super::DecoderV2>(bytes)
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty() && self.delete_set.is_empty()
    }
}

impl StateVector {
    pub fn encode_v1(&self) -> Vec<u8> {
        encode_state_vector::<super::EncoderV1>(self)
    }

    pub fn encode_v2(&self) -> Vec<u8> {
        encode_state_vector::<super::EncoderV2>(self)
    }

    pub fn decode_v1(bytes: &[u8]) -> Result<StateVector, Error> {
        decode_state_vector::<super::DecoderV1>(bytes)
    }

    pub fn decode_v2(bytes: &[u8]) -> Result<StateVector, Error> {
        decode_state_vector::<super::DecoderV2>(bytes)
    }
}

/// Renders a V1 update as a readable list of its records, for
/// inspecting what a peer sent without applying it.
pub fn debug_update_v1(bytes: &[u8]) -> Result<String, Error> {
    Ok(format!("{:#?}", Update::decode_v1(bytes)?))
}

pub fn debug_update_v2(bytes: &[u8]) -> Result<String, Error> {
    Ok(format!("{:#?}", Update::decode_v2(bytes)?))
}

/// Encodes every item `sv` has not seen, plus `ds`.
pub fn encode_update<E: Encoder>(store: &Store, sv: &StateVector, ds: &DeleteSet) -> Vec<u8> {
    let clients: Vec<(ClientId, Vec<ItemPtr>)> = store.clients().into_iter()
        .map(|client| (client, store.blocks_from(client, sv.get(client))))
        .filter(|&(_, ref ptrs)| !ptrs.is_empty())
        .collect();

    let mut encoder = E::new();
    encoder.write_header();
    encoder.section(|e| {
        e.write_var(clients.len() as u64);
        for &(client, ref ptrs) in &clients {
            let start = sv.get(client);
            e.section(|e| {
                e.write_var(client);
                e.write_var(ptrs.len() as u64);
                for &ptr in ptrs {
                    let clock = store.item(ptr).id.clock;
                    let offset = if clock < start { start - clock } else { 0 };
                    write_item(e, store, ptr, offset);
                }
            });
        }
    });
    encoder.section(|e| write_delete_set(e, ds));
    encoder.into_vec()
}

pub fn decode_update<'a, D: Decoder<'a>>(bytes: &'a [u8]) -> Result<Update, Error> {
    let mut decoder = D::new(bytes);
    decoder.read_header()?;
    let blocks = decoder.section(|d| {
        let clients = d.read_len()?;
        let mut blocks = Vec::new();
        for _ in 0..clients {
            d.section(|d| {
                let client = d.read_var()?;
                let count = d.read_len()?;
                for _ in 0..count {
                    blocks.push(read_block(d, client)?);
                }
                Ok(())
            })?;
        }
        Ok(blocks)
    })?;
    let delete_set = decoder.section(|d| read_delete_set(d))?;
    decoder.finish()?;
    Ok(Update{blocks, delete_set})
}

pub fn encode_state_vector<E: Encoder>(sv: &StateVector) -> Vec<u8> {
    let mut encoder = E::new();
    encoder.write_header();
    write_state_vector(&mut encoder, sv);
    encoder.into_vec()
}

pub fn decode_state_vector<'a, D: Decoder<'a>>(bytes: &'a [u8]) -> Result<StateVector, Error> {
    let mut decoder = D::new(bytes);
    decoder.read_header()?;
    let sv = read_state_vector(&mut decoder)?;
    decoder.finish()?;
    Ok(sv)
}

pub fn write_state_vector<E: Encoder>(e: &mut E, sv: &StateVector) {
    e.write_var(sv.len() as u64);
    for (client, clock) in sv.iter() {
        e.write_var(client);
        e.write_var(u64::from(clock));
    }
}

pub fn read_state_vector<'a, D: Decoder<'a>>(d: &mut D) -> Result<StateVector, Error> {
    let len = d.read_len()?;
    let mut sv = StateVector::new();
    for _ in 0..len {
        let client = d.read_var()?;
        let clock = d.read_u32()?;
        sv.set_max(client, clock);
    }
    Ok(sv)
}

pub fn write_delete_set<E: Encoder>(e: &mut E, ds: &DeleteSet) {
    let clients: Vec<_> = ds.iter().collect();
    e.write_var(clients.len() as u64);
    for (client, ranges) in clients {
        e.write_var(client);
        e.write_var(ranges.len() as u64);
        for &(clock, len) in ranges {
            e.write_var(u64::from(clock));
            e.write_var(u64::from(len));
        }
    }
}

pub fn read_delete_set<'a, D: Decoder<'a>>(d: &mut D) -> Result<DeleteSet, Error> {
    let clients = d.read_len()?;
    let mut ds = DeleteSet::new();
    for _ in 0..clients {
        let client = d.read_var()?;
        let ranges = d.read_len()?;
        for _ in 0..ranges {
            let clock = d.read_u32()?;
            let len = d.read_u32()?;
            try_assert!(clock.checked_add(len).is_some(), Error::InvalidValue);
            ds.insert(&ItemId::new(client, clock), len);
        }
    }
    Ok(ds)
}

fn write_item<E: Encoder>(e: &mut E, store: &Store, ptr: ItemPtr, offset: u32) {
    let item = store.item(ptr);
    let clock = item.id.clock + offset;
    let origin = if offset > 0 { Some(ItemId::new(item.id.client, clock - 1)) } else { item.origin };
    let right_origin = item.right_origin;
    let orphan = origin.is_none() && right_origin.is_none();

    let mut info = match item.content {
        Content::String(_) => KIND_STRING,
        Content::Embed(_) => KIND_EMBED,
        Content::Format(_, _) => KIND_FORMAT,
        Content::Node(_) => KIND_NODE,
        Content::Any(_) => KIND_ANY,
        Content::Deleted(_) => KIND_DELETED,
    };
    if origin.is_some() { info |= HAS_ORIGIN }
    if right_origin.is_some() { info |= HAS_RIGHT_ORIGIN }
    if orphan && item.parent_sub.is_some() { info |= HAS_PARENT_SUB }

    e.write_var(u64::from(clock));
    e.write_u8(info);
    if let Some(ref id) = origin { e.write_id(id) }
    if let Some(ref id) = right_origin { e.write_id(id) }
    if orphan {
        let parent = store.branch(item.parent);
        match parent.item {
            Some(node) => {
                e.write_u8(PARENT_NODE);
                e.write_id(&store.item(node).id);
            }
            None => {
                e.write_u8(PARENT_ROOT);
                e.write_string(parent.name.as_ref().map(String::as_str).unwrap_or(""));
            }
        }
        if let Some(ref key) = item.parent_sub {
            e.write_string(key);
        }
    }

    match item.content {
        Content::String(ref s) => e.write_string(&s[byte_index(s, offset)..]),
        Content::Embed(ref value) | Content::Any(ref value) => e.write_value(value),
        Content::Format(ref key, ref value) => {
            e.write_string(key);
            e.write_value(value);
        }
        Content::Node(branch) => write_type(e, &store.branch(branch).kind),
        Content::Deleted(len) => e.write_var(u64::from(len - offset)),
    }
}

fn read_block<'a, D: Decoder<'a>>(d: &mut D, client: ClientId) -> Result<Block, Error> {
    let clock = d.read_u32()?;
    let info = d.read_u8()?;
    let origin = if info & HAS_ORIGIN != 0 { Some(d.read_id()?) } else { None };
    let right_origin = if info & HAS_RIGHT_ORIGIN != 0 { Some(d.read_id()?) } else { None };

    let (parent, parent_sub) = if origin.is_none() && right_origin.is_none() {
        let parent = match d.read_u8()? {
            PARENT_NODE => ParentRef::Node(d.read_id()?),
            PARENT_ROOT => ParentRef::Root(d.read_string()?),
            _ => return Err(Error::InvalidValue),
        };
        let parent_sub = if info & HAS_PARENT_SUB != 0 { Some(d.read_string()?) } else { None };
        (Some(parent), parent_sub)
    } else {
        (None, None)
    };

    let content = match info & 0x0f {
        KIND_STRING => BlockContent::String(d.read_string()?),
        KIND_EMBED => BlockContent::Embed(d.read_value()?),
        KIND_FORMAT => {
            let key = d.read_string()?;
            BlockContent::Format(key, d.read_value()?)
        }
        KIND_NODE => BlockContent::Node(read_type(d)?),
        KIND_ANY => BlockContent::Any(d.read_value()?),
        KIND_DELETED => BlockContent::Deleted(d.read_u32()?),
        kind => return Err(Error::InvalidContent(kind)),
    };

    let len = content.len();
    try_assert!(len > 0, Error::InvalidValue);
    try_assert!(clock.checked_add(len).is_some(), Error::InvalidValue);
    Ok(Block{id: ItemId::new(client, clock), origin, right_origin, parent, parent_sub, content})
}

fn write_type<E: Encoder>(e: &mut E, kind: &TypeKind) {
    match *kind {
        TypeKind::Undefined => e.write_u8(TYPE_UNDEFINED),
        TypeKind::Text => e.write_u8(TYPE_TEXT),
        TypeKind::XmlFragment => e.write_u8(TYPE_XML_FRAGMENT),
        TypeKind::XmlElement(ref tag) => {
            e.write_u8(TYPE_XML_ELEMENT);
            e.write_string(tag);
        }
        TypeKind::XmlText => e.write_u8(TYPE_XML_TEXT),
    }
}

fn read_type<'a, D: Decoder<'a>>(d: &mut D) -> Result<TypeKind, Error> {
    Ok(match d.read_u8()? {
        TYPE_UNDEFINED => TypeKind::Undefined,
        TYPE_TEXT => TypeKind::Text,
        TYPE_XML_FRAGMENT => TypeKind::XmlFragment,
        TYPE_XML_ELEMENT => TypeKind::XmlElement(d.read_string()?),
        TYPE_XML_TEXT => TypeKind::XmlText,
        tag => return Err(Error::InvalidContent(tag)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::{DecoderV1, DecoderV2, EncoderV1, EncoderV2};

    #[test]
    fn test_state_vector_layout_v1() {
        let mut sv = StateVector::new();
        sv.observe(&ItemId::new(200, 0), 3);
        let bytes = sv.encode_v1();
        assert!(bytes == vec![1, 1, 129, 72, 3]);
        assert!(StateVector::decode_v1(&bytes) == Ok(sv.clone()));
        assert_matches!(StateVector::decode_v2(&bytes), Err(Error::VersionMismatch{expected: 2, found: 1}));
        assert!(StateVector::decode_v2(&sv.encode_v2()) == Ok(sv));
    }

    #[test]
    fn test_empty_update_v1() {
        let store = Store::new(1, crate::doc::OffsetKind::Utf16, true);
        let bytes = encode_update::<EncoderV1>(&store, &StateVector::new(), &DeleteSet::new());
        assert!(bytes == vec![1, 0, 0]);
        assert!(decode_update::<DecoderV1>(&bytes) == Ok(Update::default()));
    }

    #[test]
    fn test_empty_update_v2() {
        let store = Store::new(1, crate::doc::OffsetKind::Utf16, true);
        let bytes = encode_update::<EncoderV2>(&store, &StateVector::new(), &DeleteSet::new());
        assert!(bytes == vec![2, 1, 0, 1, 0]);
        assert!(decode_update::<DecoderV2>(&bytes) == Ok(Update::default()));
    }

    #[test]
    fn test_decode_rejects_unknown_content() {
        // one client (7) with one item at clock 0, kind 0x0e, root parent "t"
        let bytes = vec![1, 1, 7, 1, 0, 0x0e, PARENT_ROOT, 1, b't', 0];
        assert_matches!(decode_update::<DecoderV1>(&bytes), Err(Error::InvalidContent(0x0e)));
    }

    #[test]
    fn test_decode_block() {
        let bytes = vec![1, 1, 7, 1, 4, KIND_STRING, PARENT_ROOT, 1, b't', 2, b'h', b'i', 1, 7, 1, 0, 1];
        let update = decode_update::<DecoderV1>(&bytes).unwrap();
        assert!(update.blocks == vec![Block{
            id: ItemId::new(7, 4),
            origin: None,
            right_origin: None,
            parent: Some(ParentRef::Root("t".to_owned())),
            parent_sub: None,
            content: BlockContent::String("hi".to_owned()),
        }]);
        assert!(update.delete_set.contains(&ItemId::new(7, 0)));
    }

    #[test]
    fn test_decode_truncated() {
        let bytes = vec![1, 1, 7, 1, 4, KIND_STRING, PARENT_ROOT, 1, b't', 2, b'h'];
        assert_matches!(decode_update::<DecoderV1>(&bytes), Err(Error::UnexpectedEof));
    }

    #[test]
    fn test_update_layout() {
        let mut doc = crate::doc::Document::with_client_id(5);
        let text = doc.get_text("t");
        text.push(&mut doc, "ab", None).unwrap();

        // version, clients, client 5 with one item at clock 0,
        // info = string kind with no optional fields, root parent "t",
        // content "ab", then an empty delete set
        let v1 = doc.encode_state_as_update_v1(&StateVector::new());
        assert!(v1 == vec![1, 1, 5, 1, 0, KIND_STRING, PARENT_ROOT, 1, b't', 2, b'a', b'b', 0]);

        // the same fields, with the update, client and delete set
        // sections prefixed by their byte length
        let v2 = doc.encode_state_as_update_v2(&StateVector::new());
        assert!(v2 == vec![2, 12, 1, 10, 5, 1, 0, KIND_STRING, PARENT_ROOT, 1, b't', 2, b'a', b'b', 1, 0]);

        let rendered = debug_update_v1(&v1).unwrap();
        assert!(rendered.contains("\"ab\""));
        assert!(rendered.contains("Root("));
        assert!(debug_update_v2(&v2).unwrap() == rendered);
        assert_matches!(debug_update_v2(&v1), Err(Error::VersionMismatch{..}));
    }

    #[test]
    fn test_splice() {
        let content = BlockContent::String("héllo".to_owned());
        assert!(content.splice(2) == BlockContent::String("llo".to_owned()));
        assert!(BlockContent::Deleted(4).splice(1) == BlockContent::Deleted(3));
    }
}
