use crate::Error;
use serde_json;
use std::collections::BTreeMap;
use std::fmt;

/// Formatting attributes of a text run or an XML node.
pub type Attrs = BTreeMap<String, Value>;

#[derive(Debug,PartialEq,Clone,Serialize,Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Buffer(Vec<u8>),
    Array(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

lazy_static! {
    pub static ref EMPTY_ATTRS: Attrs = Attrs::new();
}

/// Builds an attribute map from a JSON object string such as
/// `{"bold":true,"font":"serif"}`.
pub fn parse_attrs(json: &str) -> Result<Attrs, Error> {
    let parsed: serde_json::Value = serde_json::from_str(json).map_err(|_| Error::InvalidFormat)?;
    match Value::from_json(parsed) {
        Value::Map(attrs) => Ok(attrs),
        _ => Err(Error::InvalidFormat),
    }
}

impl Value {
    pub fn is_null(&self) -> bool {
        match *self {
            Value::Null => true,
            _ => false,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match *self {
            Value::String(ref s) => Some(s),
            _ => None,
        }
    }

    /// JSON numbers that fit in an i64 become integers, everything
    /// else numeric becomes a float.
    pub fn from_json(json: serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => Value::Float(n.as_f64().unwrap_or(0.0)),
            },
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(vec) =>
                Value::Array(vec.into_iter().map(Value::from_json).collect()),
            serde_json::Value::Object(map) =>
                Value::Map(map.into_iter().map(|(k, v)| (k, Value::from_json(v))).collect()),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match *self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(b),
            Value::Integer(i) => serde_json::Value::from(i),
            Value::Float(f) => serde_json::Value::from(f),
            Value::String(ref s) => serde_json::Value::String(s.clone()),
            Value::Buffer(ref bytes) =>
                serde_json::Value::Array(bytes.iter().map(|b| serde_json::Value::from(*b)).collect()),
            Value::Array(ref vec) =>
                serde_json::Value::Array(vec.iter().map(Value::to_json).collect()),
            Value::Map(ref map) =>
                serde_json::Value::Object(map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Value::String(ref s) => f.write_str(s),
            _ => write!(f, "{}", self.to_json()),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self { Value::Bool(b) }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self { Value::Integer(i) }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self { Value::Integer(i64::from(i)) }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self { Value::Float(f) }
}

impl<'a> From<&'a str> for Value {
    fn from(s: &'a str) -> Self { Value::String(s.to_owned()) }
}

impl From<String> for Value {
    fn from(s: String) -> Self { Value::String(s) }
}

impl From<Vec<Value>> for Value {
    fn from(vec: Vec<Value>) -> Self { Value::Array(vec) }
}

impl From<Attrs> for Value {
    fn from(map: Attrs) -> Self { Value::Map(map) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_attrs() {
        let attrs = parse_attrs(r#"{"bold":true,"size":12,"ratio":0.5,"font":"serif","link":null}"#).unwrap();
        assert!(attrs.len() == 5);
        assert!(attrs["bold"] == Value::Bool(true));
        assert!(attrs["size"] == Value::Integer(12));
        assert!(attrs["ratio"] == Value::Float(0.5));
        assert!(attrs["font"] == Value::from("serif"));
        assert!(attrs["link"] == Value::Null);
    }

    #[test]
    fn test_parse_attrs_nested() {
        let attrs = parse_attrs(r#"{"mention":{"id":[1,2]}}"#).unwrap();
        let mut inner = Attrs::new();
        inner.insert("id".into(), Value::Array(vec![Value::Integer(1), Value::Integer(2)]));
        assert!(attrs["mention"] == Value::Map(inner));
    }

    #[test]
    fn test_parse_attrs_invalid() {
        assert_matches!(parse_attrs("[1,2,3]"), Err(Error::InvalidFormat));
        assert_matches!(parse_attrs("\"bold\""), Err(Error::InvalidFormat));
        assert_matches!(parse_attrs("{bold:"), Err(Error::InvalidFormat));
    }

    #[test]
    fn test_display() {
        assert!(Value::from("serif").to_string() == "serif");
        assert!(Value::Integer(3).to_string() == "3");
        assert!(Value::Bool(false).to_string() == "false");
        assert!(Value::Array(vec![Value::Null, Value::from("a")]).to_string() == r#"[null,"a"]"#);
    }
}
