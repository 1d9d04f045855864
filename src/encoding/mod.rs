//! Binary encodings of updates, state vectors and snapshots.
//!
//! Two generations share one layout and differ in their primitives:
//! `EncoderV1` writes big-endian VLQ integers and JSON value payloads,
//! `EncoderV2` writes LEB128 integers, binary type-tagged values and
//! prefixes every section with its byte length.

pub mod update;
pub mod vlq;

use crate::Error;
use crate::id::ItemId;
use crate::value::Value;
use serde_json;
use std::collections::BTreeMap;
use std::str;

pub const VERSION_V1: u8 = 1;
pub const VERSION_V2: u8 = 2;

const TAG_NULL: u8 = 0;
const TAG_FALSE: u8 = 1;
const TAG_TRUE: u8 = 2;
const TAG_INTEGER: u8 = 3;
const TAG_FLOAT: u8 = 4;
const TAG_STRING: u8 = 5;
const TAG_BUFFER: u8 = 6;
const TAG_ARRAY: u8 = 7;
const TAG_MAP: u8 = 8;

/// The JSON form of a value in V1 payloads: `"Null"` or a single-key
/// object naming the variant, e.g. `{"Integer":3}`. Floats JSON cannot
/// hold are written as the strings `"NaN"`, `"inf"` and `"-inf"`.
fn tagged_json(value: &Value) -> serde_json::Value {
    let (tag, json) = match *value {
        Value::Null => return serde_json::Value::from("Null"),
        Value::Bool(b) => ("Bool", serde_json::Value::Bool(b)),
        Value::Integer(i) => ("Integer", serde_json::Value::from(i)),
        Value::Float(f) if f.is_nan() => ("Float", serde_json::Value::from("NaN")),
        Value::Float(f) if f.is_infinite() =>
            ("Float", serde_json::Value::from(if f > 0.0 { "inf" } else { "-inf" })),
        Value::Float(f) => ("Float", serde_json::Value::from(f)),
        Value::String(ref s) => ("String", serde_json::Value::from(s.as_str())),
        Value::Buffer(ref bytes) => ("Buffer", serde_json::Value::from(bytes.clone())),
        Value::Array(ref vec) => ("Array", serde_json::Value::Array(vec.iter().map(tagged_json).collect())),
        Value::Map(ref map) =>
            ("Map", serde_json::Value::Object(map.iter().map(|(k, v)| (k.clone(), tagged_json(v))).collect())),
    };
    let mut object = serde_json::Map::new();
    object.insert(tag.to_owned(), json);
    serde_json::Value::Object(object)
}

fn from_tagged_json(json: serde_json::Value) -> Result<Value, Error> {
    let mut object = match json {
        serde_json::Value::String(ref tag) if tag == "Null" => return Ok(Value::Null),
        serde_json::Value::Object(object) => object,
        _ => return Err(Error::InvalidValue),
    };
    try_assert!(object.len() == 1, Error::InvalidValue);
    let tag = object.keys().next().cloned().ok_or(Error::InvalidValue)?;
    let json = object.remove(&tag).ok_or(Error::InvalidValue)?;
    Ok(match (tag.as_str(), json) {
        ("Bool", serde_json::Value::Bool(b)) => Value::Bool(b),
        ("Integer", serde_json::Value::Number(n)) => Value::Integer(n.as_i64().ok_or(Error::InvalidValue)?),
        ("Float", serde_json::Value::Number(n)) => Value::Float(n.as_f64().ok_or(Error::InvalidValue)?),
        ("Float", serde_json::Value::String(s)) => match s.as_str() {
            "NaN" => Value::Float(f64::NAN),
            "inf" => Value::Float(f64::INFINITY),
            "-inf" => Value::Float(f64::NEG_INFINITY),
            _ => return Err(Error::InvalidValue),
        },
        ("String", serde_json::Value::String(s)) => Value::String(s),
        ("Buffer", serde_json::Value::Array(vec)) => Value::Buffer(vec.into_iter()
            .map(|byte| byte.as_u64().filter(|&b| b <= 255).map(|b| b as u8).ok_or(Error::InvalidValue))
            .collect::<Result<_, _>>()?),
        ("Array", serde_json::Value::Array(vec)) =>
            Value::Array(vec.into_iter().map(from_tagged_json).collect::<Result<_, _>>()?),
        ("Map", serde_json::Value::Object(map)) => Value::Map(map.into_iter()
            .map(|(k, v)| from_tagged_json(v).map(|v| (k, v)))
            .collect::<Result<_, _>>()?),
        _ => return Err(Error::InvalidValue),
    })
}

pub trait Encoder: Sized {
    const VERSION: u8;

    fn new() -> Self;
    fn write_var(&mut self, value: u64);
    fn write_value(&mut self, value: &Value);
    fn buf(&mut self) -> &mut Vec<u8>;
    fn into_vec(self) -> Vec<u8>;

    /// Writes whatever `f` produces as one section. Only the second
    /// generation frames sections with their length.
    fn section<F: FnOnce(&mut Self)>(&mut self, f: F);

    fn write_u8(&mut self, value: u8) {
        self.buf().push(value);
    }

    fn write_bytes(&mut self, bytes: &[u8]) {
        self.write_var(bytes.len() as u64);
        self.buf().extend_from_slice(bytes);
    }

    fn write_string(&mut self, s: &str) {
        self.write_bytes(s.as_bytes());
    }

    fn write_id(&mut self, id: &ItemId) {
        self.write_var(id.client);
        self.write_var(u64::from(id.clock));
    }

    fn write_header(&mut self) {
        self.write_u8(Self::VERSION);
    }
}

pub trait Decoder<'a>: Sized {
    const VERSION: u8;

    fn new(bytes: &'a [u8]) -> Self;
    fn read_var(&mut self) -> Result<u64, Error>;
    fn read_value(&mut self) -> Result<Value, Error>;
    fn rest(&self) -> &'a [u8];
    fn advance(&mut self, n: usize);
    fn section<T, F>(&mut self, f: F) -> Result<T, Error>
        where F: FnOnce(&mut Self) -> Result<T, Error>;

    fn is_empty(&self) -> bool {
        self.rest().is_empty()
    }

    fn read_u8(&mut self) -> Result<u8, Error> {
        let byte = *self.rest().first().ok_or(Error::UnexpectedEof)?;
        self.advance(1);
        Ok(byte)
    }

    fn read_raw(&mut self, len: usize) -> Result<&'a [u8], Error> {
        let rest = self.rest();
        try_assert!(rest.len() >= len, Error::UnexpectedEof);
        self.advance(len);
        Ok(&rest[..len])
    }

    fn read_u32(&mut self) -> Result<u32, Error> {
        let value = self.read_var()?;
        try_assert!(value <= u64::from(u32::max_value()), Error::InvalidValue);
        Ok(value as u32)
    }

    fn read_len(&mut self) -> Result<usize, Error> {
        let len = self.read_var()?;
        try_assert!(len <= self.rest().len() as u64, Error::UnexpectedEof);
        Ok(len as usize)
    }

    fn read_bytes(&mut self) -> Result<&'a [u8], Error> {
        let len = self.read_len()?;
        self.read_raw(len)
    }

    fn read_string(&mut self) -> Result<String, Error> {
        let bytes = self.read_bytes()?;
        Ok(str::from_utf8(bytes)?.to_owned())
    }

    fn read_id(&mut self) -> Result<ItemId, Error> {
        let client = self.read_var()?;
        let clock = self.read_u32()?;
        Ok(ItemId::new(client, clock))
    }

    fn read_header(&mut self) -> Result<(), Error> {
        let found = self.read_u8()?;
        try_assert!(found == Self::VERSION, Error::VersionMismatch{expected: Self::VERSION, found});
        Ok(())
    }

    fn finish(&self) -> Result<(), Error> {
        try_assert!(self.is_empty(), Error::InvalidValue);
        Ok(())
    }
}

pub struct EncoderV1 {
    buf: Vec<u8>,
}

pub struct EncoderV2 {
    buf: Vec<u8>,
}

pub struct DecoderV1<'a> {
    bytes: &'a [u8],
}

pub struct DecoderV2<'a> {
    bytes: &'a [u8],
}

impl Encoder for EncoderV1 {
    const VERSION: u8 = VERSION_V1;

    fn new() -> Self {
        EncoderV1{buf: Vec::new()}
    }

    fn write_var(&mut self, value: u64) {
        self.buf.extend_from_slice(&vlq::encode_u64(value));
    }

    fn write_value(&mut self, value: &Value) {
        self.write_string(&tagged_json(value).to_string());
    }

    fn buf(&mut self) -> &mut Vec<u8> {
        &mut self.buf
    }

    fn into_vec(self) -> Vec<u8> {
        self.buf
    }

    fn section<F: FnOnce(&mut Self)>(&mut self, f: F) {
        f(self)
    }
}

impl Encoder for EncoderV2 {
    const VERSION: u8 = VERSION_V2;

    fn new() -> Self {
        EncoderV2{buf: Vec::new()}
    }

    fn write_var(&mut self, value: u64) {
        self.buf.extend_from_slice(&vlq::encode_leb128(value));
    }

    fn write_value(&mut self, value: &Value) {
        match *value {
            Value::Null => self.write_u8(TAG_NULL),
            Value::Bool(false) => self.write_u8(TAG_FALSE),
            Value::Bool(true) => self.write_u8(TAG_TRUE),
            Value::Integer(i) => {
                self.write_u8(TAG_INTEGER);
                self.write_var(((i << 1) ^ (i >> 63)) as u64);
            }
            Value::Float(f) => {
                self.write_u8(TAG_FLOAT);
                self.buf.extend_from_slice(&f.to_bits().to_le_bytes());
            }
            Value::String(ref s) => {
                self.write_u8(TAG_STRING);
                self.write_string(s);
            }
            Value::Buffer(ref bytes) => {
                self.write_u8(TAG_BUFFER);
                self.write_bytes(bytes);
            }
            Value::Array(ref vec) => {
                self.write_u8(TAG_ARRAY);
                self.write_var(vec.len() as u64);
                for element in vec {
                    self.write_value(element);
                }
            }
            Value::Map(ref map) => {
                self.write_u8(TAG_MAP);
                self.write_var(map.len() as u64);
                for (key, element) in map {
                    self.write_string(key);
                    self.write_value(element);
                }
            }
        }
    }

    fn buf(&mut self) -> &mut Vec<u8> {
        &mut self.buf
    }

    fn into_vec(self) -> Vec<u8> {
        self.buf
    }

    fn section<F: FnOnce(&mut Self)>(&mut self, f: F) {
        let mut section = EncoderV2::new();
        f(&mut section);
        self.write_bytes(&section.buf);
    }
}

impl<'a> Decoder<'a> for DecoderV1<'a> {
    const VERSION: u8 = VERSION_V1;

    fn new(bytes: &'a [u8]) -> Self {
        DecoderV1{bytes}
    }

    fn read_var(&mut self) -> Result<u64, Error> {
        let (value, rest) = vlq::decode_u64(self.bytes)?;
        self.bytes = rest;
        Ok(value)
    }

    fn read_value(&mut self) -> Result<Value, Error> {
        let json = self.read_bytes()?;
        from_tagged_json(serde_json::from_slice(json)?)
    }

    fn rest(&self) -> &'a [u8] {
        self.bytes
    }

    fn advance(&mut self, n: usize) {
        self.bytes = &self.bytes[n..];
    }

    fn section<T, F>(&mut self, f: F) -> Result<T, Error>
        where F: FnOnce(&mut Self) -> Result<T, Error>
    {
        f(self)
    }
}

impl<'a> DecoderV2<'a> {
    fn read_value_tagged(&mut self, tag: u8) -> Result<Value, Error> {
        Ok(match tag {
            TAG_NULL => Value::Null,
            TAG_FALSE => Value::Bool(false),
            TAG_TRUE => Value::Bool(true),
            TAG_INTEGER => {
                let zigzag = self.read_var()?;
                Value::Integer(((zigzag >> 1) as i64) ^ -((zigzag & 1) as i64))
            }
            TAG_FLOAT => {
                let raw = self.read_raw(8)?;
                let mut bits = [0u8; 8];
                bits.copy_from_slice(raw);
                Value::Float(f64::from_bits(u64::from_le_bytes(bits)))
            }
            TAG_STRING => Value::String(self.read_string()?),
            TAG_BUFFER => Value::Buffer(self.read_bytes()?.to_vec()),
            TAG_ARRAY => {
                let len = self.read_len()?;
                let mut vec = Vec::with_capacity(len);
                for _ in 0..len {
                    vec.push(self.read_value()?);
                }
                Value::Array(vec)
            }
            TAG_MAP => {
                let len = self.read_len()?;
                let mut map = BTreeMap::new();
                for _ in 0..len {
                    let key = self.read_string()?;
                    map.insert(key, self.read_value()?);
                }
                Value::Map(map)
            }
            _ => return Err(Error::InvalidValue),
        })
    }
}

impl<'a> Decoder<'a> for DecoderV2<'a> {
    const VERSION: u8 = VERSION_V2;

    fn new(bytes: &'a [u8]) -> Self {
        DecoderV2{bytes}
    }

    fn read_var(&mut self) -> Result<u64, Error> {
        let (value, rest) = vlq::decode_leb128(self.bytes)?;
        self.bytes = rest;
        Ok(value)
    }

    fn read_value(&mut self) -> Result<Value, Error> {
        let tag = self.read_u8()?;
        self.read_value_tagged(tag)
    }

    fn rest(&self) -> &'a [u8] {
        self.bytes
    }

    fn advance(&mut self, n: usize) {
        self.bytes = &self.bytes[n..];
    }

    fn section<T, F>(&mut self, f: F) -> Result<T, Error>
        where F: FnOnce(&mut Self) -> Result<T, Error>
    {
        let bytes = self.read_bytes()?;
        let mut section = DecoderV2::new(bytes);
        let value = f(&mut section)?;
        section.finish()?;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_values() -> Vec<Value> {
        let mut map = BTreeMap::new();
        map.insert("k".to_owned(), Value::Buffer(vec![0, 255]));
        vec![
            Value::Null,
            Value::Bool(true),
            Value::Integer(-300),
            Value::Integer(i64::max_value()),
            Value::Float(1.25),
            Value::from("héllo"),
            Value::Array(vec![Value::Bool(false), Value::Integer(7)]),
            Value::Map(map),
        ]
    }

    #[test]
    fn test_non_finite_floats() {
        let values = vec![Value::Float(f64::INFINITY), Value::Float(f64::NEG_INFINITY), Value::Float(-0.5)];
        let mut v1 = EncoderV1::new();
        let mut v2 = EncoderV2::new();
        for value in values.iter().chain(Some(&Value::Float(f64::NAN))) {
            v1.write_value(value);
            v2.write_value(value);
        }
        let (v1, v2) = (v1.into_vec(), v2.into_vec());
        let mut d1 = DecoderV1::new(&v1);
        let mut d2 = DecoderV2::new(&v2);
        for value in &values {
            assert!(d1.read_value().unwrap() == *value);
            assert!(d2.read_value().unwrap() == *value);
        }
        assert_matches!(d1.read_value(), Ok(Value::Float(f)) if f.is_nan());
        assert_matches!(d2.read_value(), Ok(Value::Float(f)) if f.is_nan());
        assert!(d1.is_empty() && d2.is_empty());
    }

    #[test]
    fn test_tagged_json_shape() {
        let json = tagged_json(&Value::Array(vec![Value::Null, Value::Float(f64::INFINITY), Value::Buffer(vec![7])]));
        assert!(json.to_string() == r#"{"Array":["Null",{"Float":"inf"},{"Buffer":[7]}]}"#);
        assert_matches!(from_tagged_json(serde_json::json!({"Float": "big"})), Err(Error::InvalidValue));
        assert_matches!(from_tagged_json(serde_json::json!({"Buffer": [256]})), Err(Error::InvalidValue));
        assert_matches!(from_tagged_json(serde_json::json!({"Bool": true, "Null": null})), Err(Error::InvalidValue));
    }

    #[test]
    fn test_values_v1() {
        let mut encoder = EncoderV1::new();
        for value in sample_values() {
            encoder.write_value(&value);
        }
        let bytes = encoder.into_vec();
        let mut decoder = DecoderV1::new(&bytes);
        for value in sample_values() {
            assert_eq!(decoder.read_value().unwrap(), value);
        }
        assert!(decoder.is_empty());
    }

    #[test]
    fn test_values_v2() {
        let mut encoder = EncoderV2::new();
        for value in sample_values() {
            encoder.write_value(&value);
        }
        let bytes = encoder.into_vec();
        let mut decoder = DecoderV2::new(&bytes);
        for value in sample_values() {
            assert_eq!(decoder.read_value().unwrap(), value);
        }
        assert!(decoder.is_empty());
    }

    #[test]
    fn test_sections_v2_are_length_prefixed() {
        let mut encoder = EncoderV2::new();
        encoder.section(|e| {
            e.write_var(300);
            e.write_string("ab");
        });
        let bytes = encoder.into_vec();
        assert!(bytes == vec![5, 172, 2, 2, b'a', b'b']);

        let mut decoder = DecoderV2::new(&bytes);
        let (n, s) = decoder.section(|d| Ok((d.read_var()?, d.read_string()?))).unwrap();
        assert!(n == 300);
        assert!(s == "ab");
        assert!(decoder.is_empty());
    }

    #[test]
    fn test_header_mismatch() {
        let mut decoder = DecoderV2::new(&[1]);
        assert_matches!(decoder.read_header(), Err(Error::VersionMismatch{expected: 2, found: 1}));
    }

    #[test]
    fn test_truncated_input() {
        let mut decoder = DecoderV1::new(&[5, b'a']);
        assert_matches!(decoder.read_string(), Err(Error::UnexpectedEof));
        let mut decoder = DecoderV2::new(&[TAG_STRING, 1, 0xff]);
        assert_matches!(decoder.read_value(), Err(Error::InvalidUtf8));
        let mut decoder = DecoderV2::new(&[42]);
        assert_matches!(decoder.read_value(), Err(Error::InvalidValue));
    }
}
