//! XML-like trees of fragments, elements and text nodes.
//!
//! A handle is either prelim, owning its content until it is inserted
//! into a document, or integrated, pointing at a branch of a document.
//! Reads take anything that implements `ReadTxn`. Writes on an
//! integrated handle need an open transaction; writes on a prelim
//! handle edit its local content and ignore the transaction.

use crate::Error;
use crate::delta::{self, Delta};
use crate::snapshot::Snapshot;
use crate::store::{BranchPtr, Content, Store, TypeKind};
use crate::text::{self, find_position, ItemPosition};
use crate::transaction::{ReadTxn, Transaction};
use crate::value::{Attrs, Value};

#[derive(Debug, Clone, PartialEq)]
pub enum XmlNode {
    Element(XmlElement),
    Text(XmlText),
    Fragment(XmlFragment),
}

#[derive(Debug, Clone, PartialEq)]
enum Shared<P> {
    Prelim(P),
    Integrated(BranchPtr),
}

#[derive(Debug, Clone, PartialEq, Default)]
struct FragmentContent {
    children: Vec<XmlNode>,
}

#[derive(Debug, Clone, PartialEq)]
struct ElementContent {
    tag: String,
    attributes: Attrs,
    children: Vec<XmlNode>,
}

#[derive(Debug, Clone, PartialEq, Default)]
struct TextContent {
    text: String,
    attributes: Attrs,
}

#[derive(Debug, Clone, PartialEq)]
pub struct XmlFragment(Shared<FragmentContent>);

#[derive(Debug, Clone, PartialEq)]
pub struct XmlElement(Shared<ElementContent>);

#[derive(Debug, Clone, PartialEq)]
pub struct XmlText(Shared<TextContent>);

impl XmlNode {
    pub(crate) fn from_branch(store: &Store, branch: BranchPtr) -> XmlNode {
        match store.branch(branch).kind {
            TypeKind::XmlElement(_) => XmlNode::Element(XmlElement(Shared::Integrated(branch))),
            TypeKind::XmlText | TypeKind::Text => XmlNode::Text(XmlText(Shared::Integrated(branch))),
            TypeKind::XmlFragment | TypeKind::Undefined => XmlNode::Fragment(XmlFragment::integrated(branch)),
        }
    }

    /// True until the node is inserted into a document.
    pub fn prelim(&self) -> bool {
        self.branch().is_none()
    }

    /// False for prelim nodes, nodes that were deleted, and nodes whose
    /// insertion was rolled back.
    pub fn alive<R: ReadTxn>(&self, txn: &R) -> bool {
        alive(txn, self.branch())
    }

    pub(crate) fn branch(&self) -> Option<BranchPtr> {
        match *self {
            XmlNode::Element(XmlElement(ref shared)) => shared.branch(),
            XmlNode::Text(XmlText(ref shared)) => shared.branch(),
            XmlNode::Fragment(XmlFragment(ref shared)) => shared.branch(),
        }
    }

    pub fn get_string<R: ReadTxn>(&self, txn: &R) -> String {
        match *self {
            XmlNode::Element(ref element) => element.get_string(txn),
            XmlNode::Text(ref text) => text.get_string(txn),
            XmlNode::Fragment(ref fragment) => fragment.get_string(txn),
        }
    }

    pub fn next_sibling<R: ReadTxn>(&self, txn: &R) -> Option<XmlNode> {
        sibling(txn.store(), self.branch()?, true)
    }

    pub fn prev_sibling<R: ReadTxn>(&self, txn: &R) -> Option<XmlNode> {
        sibling(txn.store(), self.branch()?, false)
    }

    pub fn parent<R: ReadTxn>(&self, txn: &R) -> Option<XmlNode> {
        parent(txn.store(), self.branch()?)
    }

    pub fn into_element(self) -> Option<XmlElement> {
        match self {
            XmlNode::Element(element) => Some(element),
            _ => None,
        }
    }

    pub fn into_text(self) -> Option<XmlText> {
        match self {
            XmlNode::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn into_fragment(self) -> Option<XmlFragment> {
        match self {
            XmlNode::Fragment(fragment) => Some(fragment),
            _ => None,
        }
    }
}

impl From<XmlElement> for XmlNode {
    fn from(element: XmlElement) -> Self {
        XmlNode::Element(element)
    }
}

impl From<XmlText> for XmlNode {
    fn from(text: XmlText) -> Self {
        XmlNode::Text(text)
    }
}

impl From<XmlFragment> for XmlNode {
    fn from(fragment: XmlFragment) -> Self {
        XmlNode::Fragment(fragment)
    }
}

impl<P> Shared<P> {
    fn branch(&self) -> Option<BranchPtr> {
        match *self {
            Shared::Prelim(_) => None,
            Shared::Integrated(branch) => Some(branch),
        }
    }
}

impl XmlFragment {
    pub fn new() -> Self {
        XmlFragment(Shared::Prelim(FragmentContent::default()))
    }

    pub(crate) fn integrated(branch: BranchPtr) -> Self {
        XmlFragment(Shared::Integrated(branch))
    }

    pub fn prelim(&self) -> bool {
        self.0.branch().is_none()
    }

    pub fn alive<R: ReadTxn>(&self, txn: &R) -> bool {
        alive(txn, self.0.branch())
    }

    pub fn len<R: ReadTxn>(&self, txn: &R) -> u32 {
        match self.0 {
            Shared::Prelim(ref content) => content.children.len() as u32,
            Shared::Integrated(branch) => txn.store().children(branch).len() as u32,
        }
    }

    pub fn get<R: ReadTxn>(&self, txn: &R, index: u32) -> Option<XmlNode> {
        match self.0 {
            Shared::Prelim(ref content) => content.children.get(index as usize).cloned(),
            Shared::Integrated(branch) => child_at(txn.store(), branch, index),
        }
    }

    pub fn children<R: ReadTxn>(&self, txn: &R) -> Vec<XmlNode> {
        match self.0 {
            Shared::Prelim(ref content) => content.children.clone(),
            Shared::Integrated(branch) => children(txn.store(), branch),
        }
    }

    pub fn first_child<R: ReadTxn>(&self, txn: &R) -> Option<XmlNode> {
        self.get(txn, 0)
    }

    pub fn insert<C: Into<XmlNode>>(&mut self, txn: Option<&mut Transaction>, index: u32, child: C) -> Result<XmlNode, Error> {
        match self.0 {
            Shared::Prelim(ref mut content) => prelim_insert(&mut content.children, index, child.into()),
            Shared::Integrated(branch) => insert_child(require(txn, branch)?, branch, index, child.into()),
        }
    }

    pub fn push<C: Into<XmlNode>>(&mut self, txn: Option<&mut Transaction>, child: C) -> Result<XmlNode, Error> {
        match self.0 {
            Shared::Prelim(ref mut content) => {
                let index = content.children.len() as u32;
                prelim_insert(&mut content.children, index, child.into())
            }
            Shared::Integrated(branch) => {
                let txn = require(txn, branch)?;
                let index = txn.store().branch_len(branch);
                insert_child(txn, branch, index, child.into())
            }
        }
    }

    pub fn delete(&mut self, txn: Option<&mut Transaction>, index: u32, len: u32) -> Result<(), Error> {
        match self.0 {
            Shared::Prelim(ref mut content) => prelim_delete(&mut content.children, index, len),
            Shared::Integrated(branch) => text::remove_range(require(txn, branch)?, branch, index, len),
        }
    }

    /// The children rendered one after another.
    pub fn get_string<R: ReadTxn>(&self, txn: &R) -> String {
        match self.0 {
            Shared::Prelim(ref content) => content.children.iter().map(|child| child.get_string(txn)).collect(),
            Shared::Integrated(branch) => render(txn.store(), branch),
        }
    }

    pub fn parent<R: ReadTxn>(&self, txn: &R) -> Option<XmlNode> {
        parent(txn.store(), self.0.branch()?)
    }
}

impl Default for XmlFragment {
    fn default() -> Self {
        XmlFragment::new()
    }
}

impl XmlElement {
    pub fn new(tag: &str) -> Self {
        XmlElement(Shared::Prelim(ElementContent{
            tag: tag.to_owned(),
            attributes: Attrs::new(),
            children: Vec::new(),
        }))
    }

    pub fn prelim(&self) -> bool {
        self.0.branch().is_none()
    }

    pub fn alive<R: ReadTxn>(&self, txn: &R) -> bool {
        alive(txn, self.0.branch())
    }

    pub fn tag<R: ReadTxn>(&self, txn: &R) -> String {
        match self.0 {
            Shared::Prelim(ref content) => content.tag.clone(),
            Shared::Integrated(branch) => match txn.store().branch(branch).kind {
                TypeKind::XmlElement(ref tag) => tag.clone(),
                _ => String::new(),
            },
        }
    }

    pub fn len<R: ReadTxn>(&self, txn: &R) -> u32 {
        match self.0 {
            Shared::Prelim(ref content) => content.children.len() as u32,
            Shared::Integrated(branch) => txn.store().children(branch).len() as u32,
        }
    }

    pub fn get<R: ReadTxn>(&self, txn: &R, index: u32) -> Option<XmlNode> {
        match self.0 {
            Shared::Prelim(ref content) => content.children.get(index as usize).cloned(),
            Shared::Integrated(branch) => child_at(txn.store(), branch, index),
        }
    }

    pub fn children<R: ReadTxn>(&self, txn: &R) -> Vec<XmlNode> {
        match self.0 {
            Shared::Prelim(ref content) => content.children.clone(),
            Shared::Integrated(branch) => children(txn.store(), branch),
        }
    }

    pub fn first_child<R: ReadTxn>(&self, txn: &R) -> Option<XmlNode> {
        self.get(txn, 0)
    }

    pub fn insert<C: Into<XmlNode>>(&mut self, txn: Option<&mut Transaction>, index: u32, child: C) -> Result<XmlNode, Error> {
        match self.0 {
            Shared::Prelim(ref mut content) => prelim_insert(&mut content.children, index, child.into()),
            Shared::Integrated(branch) => insert_child(require(txn, branch)?, branch, index, child.into()),
        }
    }

    pub fn push<C: Into<XmlNode>>(&mut self, txn: Option<&mut Transaction>, child: C) -> Result<XmlNode, Error> {
        match self.0 {
            Shared::Prelim(ref mut content) => {
                let index = content.children.len() as u32;
                prelim_insert(&mut content.children, index, child.into())
            }
            Shared::Integrated(branch) => {
                let txn = require(txn, branch)?;
                let index = txn.store().branch_len(branch);
                insert_child(txn, branch, index, child.into())
            }
        }
    }

    pub fn delete(&mut self, txn: Option<&mut Transaction>, index: u32, len: u32) -> Result<(), Error> {
        match self.0 {
            Shared::Prelim(ref mut content) => prelim_delete(&mut content.children, index, len),
            Shared::Integrated(branch) => text::remove_range(require(txn, branch)?, branch, index, len),
        }
    }

    pub fn set_attribute<V: Into<Value>>(&mut self, txn: Option<&mut Transaction>, key: &str, value: V) -> Result<(), Error> {
        match self.0 {
            Shared::Prelim(ref mut content) => {
                content.attributes.insert(key.to_owned(), value.into());
                Ok(())
            }
            Shared::Integrated(branch) => {
                set_attribute(require(txn, branch)?, branch, key.to_owned(), value.into());
                Ok(())
            }
        }
    }

    pub fn get_attribute<R: ReadTxn>(&self, txn: &R, key: &str) -> Option<Value> {
        match self.0 {
            Shared::Prelim(ref content) => content.attributes.get(key).cloned(),
            Shared::Integrated(branch) => txn.store().map_get(branch, key).cloned(),
        }
    }

    pub fn remove_attribute(&mut self, txn: Option<&mut Transaction>, key: &str) -> Result<(), Error> {
        match self.0 {
            Shared::Prelim(ref mut content) => {
                content.attributes.remove(key);
                Ok(())
            }
            Shared::Integrated(branch) => {
                remove_attribute(require(txn, branch)?, branch, key);
                Ok(())
            }
        }
    }

    pub fn attributes<R: ReadTxn>(&self, txn: &R) -> Attrs {
        match self.0 {
            Shared::Prelim(ref content) => content.attributes.clone(),
            Shared::Integrated(branch) => txn.store().map_entries(branch),
        }
    }

    /// `<tag k="v">children</tag>` with attributes sorted by key.
    pub fn get_string<R: ReadTxn>(&self, txn: &R) -> String {
        match self.0 {
            Shared::Prelim(ref content) => {
                let inner: String = content.children.iter().map(|child| child.get_string(txn)).collect();
                element_string(&content.tag, &content.attributes, &inner)
            }
            Shared::Integrated(branch) => render(txn.store(), branch),
        }
    }

    pub fn next_sibling<R: ReadTxn>(&self, txn: &R) -> Option<XmlNode> {
        sibling(txn.store(), self.0.branch()?, true)
    }

    pub fn prev_sibling<R: ReadTxn>(&self, txn: &R) -> Option<XmlNode> {
        sibling(txn.store(), self.0.branch()?, false)
    }

    pub fn parent<R: ReadTxn>(&self, txn: &R) -> Option<XmlNode> {
        parent(txn.store(), self.0.branch()?)
    }
}

impl XmlText {
    pub fn new(text: &str) -> Self {
        XmlText(Shared::Prelim(TextContent{text: text.to_owned(), attributes: Attrs::new()}))
    }

    pub fn prelim(&self) -> bool {
        self.0.branch().is_none()
    }

    pub fn alive<R: ReadTxn>(&self, txn: &R) -> bool {
        alive(txn, self.0.branch())
    }

    /// Prelim text is always measured in UTF-16 code units.
    pub fn len<R: ReadTxn>(&self, txn: &R) -> u32 {
        match self.0 {
            Shared::Prelim(ref content) => content.text.encode_utf16().count() as u32,
            Shared::Integrated(branch) => txn.store().branch_len(branch),
        }
    }

    pub fn is_empty<R: ReadTxn>(&self, txn: &R) -> bool {
        self.len(txn) == 0
    }

    pub fn get_string<R: ReadTxn>(&self, txn: &R) -> String {
        match self.0 {
            Shared::Prelim(ref content) => content.text.clone(),
            Shared::Integrated(branch) => text::get_string(txn.store(), branch),
        }
    }

    pub fn insert(&mut self, txn: Option<&mut Transaction>, index: u32, chunk: &str, attrs: Option<Attrs>) -> Result<(), Error> {
        match self.0 {
            Shared::Prelim(ref mut content) => {
                try_assert!(attrs.is_none(), Error::InvalidPrelimOp);
                let at = utf16_byte_index(&content.text, index)?;
                content.text.insert_str(at, chunk);
                Ok(())
            }
            Shared::Integrated(branch) =>
                text::insert(require(txn, branch)?, branch, index, Content::String(chunk.to_owned()), attrs),
        }
    }

    pub fn push(&mut self, txn: Option<&mut Transaction>, chunk: &str, attrs: Option<Attrs>) -> Result<(), Error> {
        match self.0 {
            Shared::Prelim(ref mut content) => {
                try_assert!(attrs.is_none(), Error::InvalidPrelimOp);
                content.text.push_str(chunk);
                Ok(())
            }
            Shared::Integrated(branch) => {
                let txn = require(txn, branch)?;
                let index = txn.store().branch_len(branch);
                text::insert(txn, branch, index, Content::String(chunk.to_owned()), attrs)
            }
        }
    }

    pub fn insert_embed(&mut self, txn: Option<&mut Transaction>, index: u32, embed: Value, attrs: Option<Attrs>) -> Result<(), Error> {
        let branch = self.integrated_branch()?;
        text::insert(require(txn, branch)?, branch, index, Content::Embed(embed), attrs)
    }

    pub fn format(&mut self, txn: Option<&mut Transaction>, index: u32, len: u32, attrs: Attrs) -> Result<(), Error> {
        let branch = self.integrated_branch()?;
        text::format(require(txn, branch)?, branch, index, len, &attrs)
    }

    pub fn delete(&mut self, txn: Option<&mut Transaction>, index: u32, len: u32) -> Result<(), Error> {
        match self.0 {
            Shared::Prelim(ref mut content) => {
                let from = utf16_byte_index(&content.text, index)?;
                let to = utf16_byte_index(&content.text, index.checked_add(len).ok_or(Error::OutOfBounds)?)?;
                content.text.replace_range(from..to, "");
                Ok(())
            }
            Shared::Integrated(branch) => text::remove_range(require(txn, branch)?, branch, index, len),
        }
    }

    pub fn apply_delta(&mut self, txn: Option<&mut Transaction>, delta: Vec<Delta>) -> Result<(), Error> {
        let branch = self.integrated_branch()?;
        delta::apply(require(txn, branch)?, branch, delta)
    }

    /// Embeds show up as inserts of their value.
    pub fn to_delta<R: ReadTxn>(&self, txn: &R, from: Option<&Snapshot>, to: Option<&Snapshot>) -> Result<Vec<Delta>, Error> {
        let branch = self.integrated_branch()?;
        delta::diff(txn.store(), branch, from, to)
    }

    pub fn attributes_at<R: ReadTxn>(&self, txn: &R, index: u32) -> Result<Attrs, Error> {
        match self.0 {
            Shared::Prelim(ref content) => {
                try_assert!(index < content.text.encode_utf16().count() as u32, Error::OutOfBounds);
                Ok(Attrs::new())
            }
            Shared::Integrated(branch) => text::attributes_at(txn.store(), branch, index),
        }
    }

    pub fn set_attribute<V: Into<Value>>(&mut self, txn: Option<&mut Transaction>, key: &str, value: V) -> Result<(), Error> {
        match self.0 {
            Shared::Prelim(ref mut content) => {
                content.attributes.insert(key.to_owned(), value.into());
                Ok(())
            }
            Shared::Integrated(branch) => {
                set_attribute(require(txn, branch)?, branch, key.to_owned(), value.into());
                Ok(())
            }
        }
    }

    pub fn get_attribute<R: ReadTxn>(&self, txn: &R, key: &str) -> Option<Value> {
        match self.0 {
            Shared::Prelim(ref content) => content.attributes.get(key).cloned(),
            Shared::Integrated(branch) => txn.store().map_get(branch, key).cloned(),
        }
    }

    pub fn remove_attribute(&mut self, txn: Option<&mut Transaction>, key: &str) -> Result<(), Error> {
        match self.0 {
            Shared::Prelim(ref mut content) => {
                content.attributes.remove(key);
                Ok(())
            }
            Shared::Integrated(branch) => {
                remove_attribute(require(txn, branch)?, branch, key);
                Ok(())
            }
        }
    }

    pub fn attributes<R: ReadTxn>(&self, txn: &R) -> Attrs {
        match self.0 {
            Shared::Prelim(ref content) => content.attributes.clone(),
            Shared::Integrated(branch) => txn.store().map_entries(branch),
        }
    }

    pub fn next_sibling<R: ReadTxn>(&self, txn: &R) -> Option<XmlNode> {
        sibling(txn.store(), self.0.branch()?, true)
    }

    pub fn prev_sibling<R: ReadTxn>(&self, txn: &R) -> Option<XmlNode> {
        sibling(txn.store(), self.0.branch()?, false)
    }

    pub fn parent<R: ReadTxn>(&self, txn: &R) -> Option<XmlNode> {
        parent(txn.store(), self.0.branch()?)
    }

    fn integrated_branch(&self) -> Result<BranchPtr, Error> {
        self.0.branch().ok_or(Error::InvalidPrelimOp)
    }
}

fn require<'a, 'doc>(txn: Option<&'a mut Transaction<'doc>>, branch: BranchPtr) -> Result<&'a mut Transaction<'doc>, Error> {
    let txn = txn.ok_or(Error::TransactionRequired)?;
    txn.ensure_open()?;
    try_assert!(!txn.store().is_detached(branch), Error::Detached);
    Ok(txn)
}

fn alive<R: ReadTxn>(txn: &R, branch: Option<BranchPtr>) -> bool {
    branch.map_or(false, |branch| txn.store().is_alive(branch))
}

fn prelim_insert(children: &mut Vec<XmlNode>, index: u32, child: XmlNode) -> Result<XmlNode, Error> {
    try_assert!(child.prelim(), Error::NotPrelim);
    try_assert!(index as usize <= children.len(), Error::OutOfBounds);
    children.insert(index as usize, child.clone());
    Ok(child)
}

fn prelim_delete(children: &mut Vec<XmlNode>, index: u32, len: u32) -> Result<(), Error> {
    let from = index as usize;
    let to = from + len as usize;
    try_assert!(to <= children.len(), Error::OutOfBounds);
    children.drain(from..to);
    Ok(())
}

fn insert_child(txn: &mut Transaction, parent: BranchPtr, index: u32, child: XmlNode) -> Result<XmlNode, Error> {
    try_assert!(child.prelim(), Error::NotPrelim);
    let pos = find_position(txn.store_mut(), parent, index)?;
    let branch = integrate_node(txn, &pos, child)?;
    Ok(XmlNode::from_branch(txn.store(), branch))
}

/// Creates the branch of a prelim node at `pos`, then its attributes,
/// text and children.
fn integrate_node(txn: &mut Transaction, pos: &ItemPosition, node: XmlNode) -> Result<BranchPtr, Error> {
    let (kind, attributes, children, content) = match node {
        XmlNode::Element(XmlElement(Shared::Prelim(element))) =>
            (TypeKind::XmlElement(element.tag), element.attributes, element.children, None),
        XmlNode::Text(XmlText(Shared::Prelim(text))) =>
            (TypeKind::XmlText, text.attributes, Vec::new(), Some(text.text)),
        XmlNode::Fragment(XmlFragment(Shared::Prelim(fragment))) =>
            (TypeKind::XmlFragment, Attrs::new(), fragment.children, None),
        _ => return Err(Error::NotPrelim),
    };

    let branch = txn.store_mut().new_branch(kind);
    txn.create_item(pos, Content::Node(branch), None);
    for (key, value) in attributes {
        set_attribute(txn, branch, key, value);
    }
    if let Some(s) = content {
        let mut at = ItemPosition::start(txn.store(), branch);
        text::insert_at(txn, &mut at, Content::String(s), Attrs::new());
    }
    let mut at = ItemPosition::start(txn.store(), branch);
    for child in children {
        let child = integrate_node(txn, &at, child)?;
        at.left = txn.store().branch(child).item;
    }
    Ok(branch)
}

/// Map entries append to the key's chain; integration deletes the entry
/// they replace.
fn set_attribute(txn: &mut Transaction, branch: BranchPtr, key: String, value: Value) {
    let left = txn.store().branch(branch).map.get(&key).cloned();
    let pos = ItemPosition{parent: branch, left, right: None, index: 0, current_attrs: Attrs::new()};
    txn.create_item(&pos, Content::Any(value), Some(key));
}

fn remove_attribute(txn: &mut Transaction, branch: BranchPtr, key: &str) {
    let ptr = some!(txn.store().branch(branch).map.get(key).cloned());
    txn.delete(ptr);
}

fn children(store: &Store, branch: BranchPtr) -> Vec<XmlNode> {
    store.children(branch).into_iter().map(|child| XmlNode::from_branch(store, child)).collect()
}

fn child_at(store: &Store, branch: BranchPtr, index: u32) -> Option<XmlNode> {
    let child = *store.children(branch).get(index as usize)?;
    Some(XmlNode::from_branch(store, child))
}

/// The nearest live node next to `branch` in its parent's sequence.
fn sibling(store: &Store, branch: BranchPtr, forward: bool) -> Option<XmlNode> {
    let step = |ptr| {
        let item = store.item(ptr);
        if forward { item.right } else { item.left }
    };
    let mut next = step(store.branch(branch).item?);
    while let Some(ptr) = next {
        let item = store.item(ptr);
        if let Content::Node(node) = item.content {
            if !item.deleted {
                return Some(XmlNode::from_branch(store, node))
            }
        }
        next = step(ptr);
    }
    None
}

fn parent(store: &Store, branch: BranchPtr) -> Option<XmlNode> {
    store.parent_of(branch).map(|parent| XmlNode::from_branch(store, parent))
}

fn render(store: &Store, branch: BranchPtr) -> String {
    let inner = || store.children(branch).into_iter().map(|child| render(store, child)).collect::<String>();
    match store.branch(branch).kind {
        TypeKind::XmlElement(ref tag) => element_string(tag, &store.map_entries(branch), &inner()),
        TypeKind::XmlText | TypeKind::Text => text::get_string(store, branch),
        TypeKind::XmlFragment | TypeKind::Undefined => inner(),
    }
}

fn element_string(tag: &str, attributes: &Attrs, inner: &str) -> String {
    let mut out = format!("<{}", tag);
    for (key, value) in attributes {
        out.push_str(&format!(" {}=\"{}\"", key, value));
    }
    out.push('>');
    out.push_str(inner);
    out.push_str(&format!("</{}>", tag));
    out
}

/// Byte offset of the `index`th UTF-16 code unit of `s`.
fn utf16_byte_index(s: &str, index: u32) -> Result<usize, Error> {
    let mut units = 0;
    for (at, c) in s.char_indices() {
        if units == index {
            return Ok(at)
        }
        units += c.len_utf16() as u32;
        try_assert!(units <= index, Error::OutOfBounds);
    }
    try_assert!(units == index, Error::OutOfBounds);
    Ok(s.len())
}
