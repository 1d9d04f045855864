#![allow(dead_code)]

extern crate env_logger;
extern crate rmp_serde;
extern crate serde;
extern crate serde_json;

use quilt::{Attrs, Document, Options, Value};

pub fn test_serde<T>(value: T)
    where T: ::std::fmt::Debug + serde::Serialize + serde::de::DeserializeOwned + PartialEq
 {
    let json = serde_json::to_string(&value).unwrap();
    let value2 = serde_json::from_str(&json).unwrap();
    assert_eq!(value, value2);

    let msgpack = rmp_serde::to_vec(&value).unwrap();
    let value3 = rmp_serde::from_slice(&msgpack).unwrap();
    assert_eq!(value, value3);
}

/// Routes log output through the test harness; safe to call from every test.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn doc_without_gc(client_id: u64) -> Document {
    Document::with_options(Options{client_id: Some(client_id), gc: false, ..Options::default()})
}

/// Sends `to` everything it is missing from `from`.
pub fn sync(from: &Document, to: &mut Document) {
    let update = from.encode_state_as_update_v1(&to.state_vector());
    to.apply_update_v1(&update).unwrap();
}

pub fn attrs(pairs: &[(&str, Value)]) -> Attrs {
    pairs.iter().map(|&(key, ref value)| (key.to_owned(), value.clone())).collect()
}
