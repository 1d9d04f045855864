use crate::doc::OffsetKind;
use crate::id::ItemId;
use crate::store::BranchPtr;
use crate::value::Value;
use crate::Error;

pub type ItemPtr = usize;

/// One run of replicated content. Items of a branch form a doubly
/// linked list through `left` and `right`.
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub id: ItemId,
    pub len: u32,
    pub origin: Option<ItemId>,
    pub right_origin: Option<ItemId>,
    pub left: Option<ItemPtr>,
    pub right: Option<ItemPtr>,
    pub parent: BranchPtr,
    pub parent_sub: Option<String>,
    pub content: Content,
    pub deleted: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Content {
    String(String),
    Embed(Value),
    Format(String, Value),
    Node(BranchPtr),
    Any(Value),
    Deleted(u32),
}

impl Item {
    pub fn last_id(&self) -> ItemId {
        ItemId::new(self.id.client, self.id.clock + self.len - 1)
    }

    pub fn contains(&self, id: &ItemId) -> bool {
        self.id.client == id.client && self.id.clock <= id.clock && id.clock < self.id.clock + self.len
    }

    pub fn is_countable(&self) -> bool {
        self.content.is_countable()
    }

    /// True for content that takes up room in the sequence right now.
    pub fn is_visible(&self) -> bool {
        !self.deleted && self.content.is_countable()
    }
}

impl Content {
    pub fn len(&self) -> u32 {
        match *self {
            Content::String(ref s) => s.chars().count() as u32,
            Content::Deleted(len) => len,
            _ => 1,
        }
    }

    pub fn is_countable(&self) -> bool {
        match *self {
            Content::String(_) | Content::Embed(_) | Content::Node(_) => true,
            _ => false,
        }
    }

    /// Length of countable content measured in `kind` units.
    pub fn offset_len(&self, kind: OffsetKind) -> u32 {
        match *self {
            Content::String(ref s) => str_len(s, kind),
            Content::Embed(_) | Content::Node(_) => 1,
            _ => 0,
        }
    }

    /// Converts an offset in `kind` units into a clock offset within
    /// this content. Offsets inside a character are rejected.
    pub fn clock_offset(&self, units: u32, kind: OffsetKind) -> Result<u32, Error> {
        match *self {
            Content::String(ref s) => char_offset(s, units, kind),
            _ if units <= 1 => Ok(units),
            _ => Err(Error::OutOfBounds),
        }
    }

    /// Splits the content at `offset` clock units, keeping the left
    /// part and returning the right part.
    pub fn split(&mut self, offset: u32) -> Content {
        match *self {
            Content::String(ref mut s) => {
                let byte = byte_index(s, offset);
                Content::String(s.split_off(byte))
            }
            Content::Deleted(ref mut len) => {
                let right = *len - offset;
                *len = offset;
                Content::Deleted(right)
            }
            ref other => other.clone(),
        }
    }

    /// Content covering clock offsets `[from, to)` without touching self.
    pub fn slice(&self, from: u32, to: u32) -> Content {
        match *self {
            Content::String(ref s) => {
                let start = byte_index(s, from);
                let end = byte_index(s, to);
                Content::String(s[start..end].to_owned())
            }
            Content::Deleted(_) => Content::Deleted(to - from),
            ref other => other.clone(),
        }
    }
}

pub fn str_len(s: &str, kind: OffsetKind) -> u32 {
    match kind {
        OffsetKind::Utf16 => s.encode_utf16().count() as u32,
        OffsetKind::Bytes => s.len() as u32,
    }
}

pub fn byte_index(s: &str, chars: u32) -> usize {
    s.char_indices().nth(chars as usize).map(|(i, _)| i).unwrap_or_else(|| s.len())
}

fn char_offset(s: &str, units: u32, kind: OffsetKind) -> Result<u32, Error> {
    let mut acc = 0;
    for (i, c) in s.chars().enumerate() {
        if acc == units {
            return Ok(i as u32)
        }
        acc += match kind {
            OffsetKind::Utf16 => c.len_utf16() as u32,
            OffsetKind::Bytes => c.len_utf8() as u32,
        };
        try_assert!(acc <= units, Error::OutOfBounds);
    }
    try_assert!(acc == units, Error::OutOfBounds);
    Ok(s.chars().count() as u32)
}
