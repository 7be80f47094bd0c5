use std::collections::BTreeMap;
use std::fmt::{self, Formatter};
use std::ops::Deref;

use rocket::serde::json::serde_json::Number;
use serde::{
    de::{self, MapAccess, SeqAccess, Visitor},
    Deserialize, Deserializer, Serialize,
};

/// Largest magnitude below which every integer has an exact `f64` form (2^53).
const MAX_EXACT_FLOAT_INTEGER: f64 = 9_007_199_254_740_992.0;

/// A single value inside a ballot.
///
/// Maps are kept in a [`BTreeMap`], so the field order of the submitted
/// document is never observable once parsed.
///
/// Integers that fit `i64` or `u64` are kept exactly. Any other number is
/// read as an `f64`, and integral values beyond 2^53 are refused because
/// distinct inputs would collapse onto the same encoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum BallotValue {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    List(Vec<BallotValue>),
    Map(BTreeMap<String, BallotValue>),
}

impl From<&str> for BallotValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for BallotValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<bool> for BallotValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<u64> for BallotValue {
    fn from(n: u64) -> Self {
        Self::Number(n.into())
    }
}

impl From<i64> for BallotValue {
    fn from(n: i64) -> Self {
        Self::Number(n.into())
    }
}

impl<'de> Deserialize<'de> for BallotValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(BallotValueVisitor)
    }
}

struct BallotValueVisitor;

impl<'de> Visitor<'de> for BallotValueVisitor {
    type Value = BallotValue;

    fn expecting(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("a JSON value")
    }

    fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(BallotValue::Null)
    }

    fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(BallotValue::Null)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Self::Value, D::Error> {
        BallotValue::deserialize(deserializer)
    }

    fn visit_bool<E: de::Error>(self, b: bool) -> Result<Self::Value, E> {
        Ok(BallotValue::Bool(b))
    }

    fn visit_i64<E: de::Error>(self, n: i64) -> Result<Self::Value, E> {
        Ok(BallotValue::Number(n.into()))
    }

    fn visit_u64<E: de::Error>(self, n: u64) -> Result<Self::Value, E> {
        Ok(BallotValue::Number(n.into()))
    }

    fn visit_f64<E: de::Error>(self, n: f64) -> Result<Self::Value, E> {
        if n.fract() == 0.0 && n.abs() > MAX_EXACT_FLOAT_INTEGER {
            return Err(E::custom(format!(
                "integer {n} is outside the exactly representable range"
            )));
        }
        Number::from_f64(n)
            .map(BallotValue::Number)
            .ok_or_else(|| E::custom(format!("number {n} is not finite")))
    }

    fn visit_str<E: de::Error>(self, s: &str) -> Result<Self::Value, E> {
        Ok(BallotValue::String(s.to_string()))
    }

    fn visit_string<E: de::Error>(self, s: String) -> Result<Self::Value, E> {
        Ok(BallotValue::String(s))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
        let mut items = Vec::new();
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(BallotValue::List(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
        let mut fields = BTreeMap::new();
        while let Some((name, value)) = map.next_entry::<String, BallotValue>()? {
            fields.insert(name, value);
        }
        Ok(BallotValue::Map(fields))
    }
}

/// The content of a ballot: a mapping from field name to value.
///
/// The content is opaque to the service; it only has to be encodable
/// deterministically so that signatures can be checked.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ballot(BTreeMap<String, BallotValue>);

impl Ballot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style field insertion.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<BallotValue>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    pub fn fields(&self) -> &BTreeMap<String, BallotValue> {
        &self.0
    }
}

impl Deref for Ballot {
    type Target = BTreeMap<String, BallotValue>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
