extern crate base64;
#[macro_use] extern crate failure;
#[macro_use] extern crate lazy_static;
#[macro_use] extern crate log;
extern crate rand;
extern crate serde;
#[macro_use] extern crate serde_derive;
extern crate serde_json;

#[cfg(test)]
#[macro_use]
extern crate assert_matches;

#[macro_use] mod macros;

pub mod delta;
pub mod doc;
pub mod encoding;
pub mod id;
pub mod snapshot;
pub mod store;
pub mod text;
pub mod transaction;
pub mod value;
pub mod xml;

mod error;
mod map_tuple_vec;

pub use error::Error;
pub use delta::Delta;
pub use doc::{Document, OffsetKind, Options};
pub use encoding::update::{debug_update_v1, debug_update_v2};
pub use id::{ClientId, Clock, DeleteSet, ItemId, StateVector};
pub use snapshot::Snapshot;
pub use text::TextRef;
pub use transaction::{Origin, ReadTxn, Transact, Transaction, TxnState};
pub use value::{parse_attrs, Attrs, Value};
pub use xml::{XmlElement, XmlFragment, XmlNode, XmlText};
