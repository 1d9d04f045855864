//! Serialize and Deserialize a BTreeMap as a Vec of tuples.
//! Client ids are integers, and formats such as JSON only
//! accept string keys in objects.

use serde::{Serialize, Serializer, Deserialize, Deserializer};
use serde::ser::SerializeSeq;
use serde::de::{Visitor, SeqAccess};

use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;

pub fn serialize<K, V, S>(data: &BTreeMap<K, V>, serializer: S) -> Result<S::Ok, S::Error>
    where S: Serializer,
          K: Ord + Serialize,
          V: Serialize,
{
    let mut seq = serializer.serialize_seq(Some(data.len()))?;
    for kv_pair in data.iter() {
        seq.serialize_element(&kv_pair)?;
    }
    seq.end()
}

pub fn deserialize<'de, K, V, D>(deserializer: D) -> Result<BTreeMap<K, V>, D::Error>
    where D: Deserializer<'de>,
          K: Ord + Deserialize<'de>,
          V: Deserialize<'de>,
{
    struct TupleVisitor<K: Ord, V> {
        marker: PhantomData<BTreeMap<K, V>>,
    }

    impl<'de, K, V> Visitor<'de> for TupleVisitor<K, V> where
        K: Ord + Deserialize<'de>,
        V: Deserialize<'de>,
    {
        type Value = BTreeMap<K, V>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a list of (client, value) tuples")
        }

        fn visit_seq<Vis>(self, mut visitor: Vis) -> Result<Self::Value, Vis::Error> where Vis: SeqAccess<'de> {
            let mut map = BTreeMap::new();
            while let Some((key, value)) = visitor.next_element()? {
                map.insert(key, value);
            }
            Ok(map)
        }
    }

    deserializer.deserialize_seq(TupleVisitor{marker: PhantomData})
}
