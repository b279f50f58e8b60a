//! Attribute values and their encode/decode codecs.
//!
//! An attribute value is an [`AttributeType`] paired with a JSON payload.
//! Values are type-checked against the attribute's declared [`ValueKind`]
//! when set, unless checking is disabled on the owning bag. Encoding and
//! decoding run through an [`AttributeCodec`] selected by declared value
//! kind, with built-ins for the primitive kinds and a process-wide override
//! table for custom codecs keyed by attribute type.

use crate::error::{Error, Result};
use crate::types::{AttributeType, ValueKind};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Encode/decode strategy for attribute values.
///
/// `encode` maps a runtime value to its stored form, `decode` the reverse.
/// The built-in codecs are identity transforms plus validation; custom
/// codecs may reshape the payload (e.g. compacting an enumeration to an
/// ordinal).
pub trait AttributeCodec: Send + Sync {
    /// Returns true if the value is acceptable for this codec.
    fn validates(&self, value: &Value) -> bool;

    /// Encode a runtime value into its stored representation.
    fn encode(&self, value: &Value) -> Result<Value> {
        Ok(value.clone())
    }

    /// Decode a stored representation back into a runtime value.
    fn decode(&self, raw: &Value) -> Result<Value> {
        Ok(raw.clone())
    }
}

struct KindCodec(ValueKind);

/// Minimal ISO-8601 `YYYY-MM-DD` shape check.
fn is_iso_date(s: &str) -> bool {
    let bytes = s.as_bytes();
    if bytes.len() != 10 || bytes[4] != b'-' || bytes[7] != b'-' {
        return false;
    }
    let digits = |r: std::ops::Range<usize>| bytes[r].iter().all(u8::is_ascii_digit);
    if !digits(0..4) || !digits(5..7) || !digits(8..10) {
        return false;
    }
    let month: u32 = s[5..7].parse().unwrap_or(0);
    let day: u32 = s[8..10].parse().unwrap_or(0);
    (1..=12).contains(&month) && (1..=31).contains(&day)
}

impl AttributeCodec for KindCodec {
    fn validates(&self, value: &Value) -> bool {
        match self.0 {
            ValueKind::String | ValueKind::Tag => value.is_string(),
            ValueKind::Integer => value.is_i64() || value.is_u64(),
            // An integer is an acceptable float payload.
            ValueKind::Float => value.is_number(),
            ValueKind::Boolean => value.is_boolean(),
            ValueKind::Date => value.as_str().is_some_and(is_iso_date),
        }
    }
}

fn builtin_codec(kind: ValueKind) -> Arc<dyn AttributeCodec> {
    Arc::new(KindCodec(kind))
}

static CUSTOM_CODECS: Lazy<RwLock<HashMap<AttributeType, Arc<dyn AttributeCodec>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Register a custom codec for an attribute type, replacing the built-in
/// selected by its declared value kind.
pub fn register_codec(attribute: AttributeType, codec: Arc<dyn AttributeCodec>) {
    CUSTOM_CODECS.write().insert(attribute, codec);
}

/// The codec in effect for an attribute type: the custom registration if
/// present, else the built-in for its declared value kind.
#[must_use]
pub fn codec_for(attribute: AttributeType) -> Arc<dyn AttributeCodec> {
    if let Some(codec) = CUSTOM_CODECS.read().get(&attribute) {
        return Arc::clone(codec);
    }
    builtin_codec(attribute.value_kind())
}

/// A mutable bag of attribute values keyed by attribute type.
///
/// Serialized as a name-keyed map so documents survive registry resets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttributeBag {
    values: BTreeMap<AttributeType, Value>,
    #[serde(skip)]
    type_checking_disabled: bool,
}

impl AttributeBag {
    /// Create an empty bag with type-checking enabled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Disable declared-kind checking for values set through this bag.
    pub fn disable_type_checking(&mut self) {
        self.type_checking_disabled = true;
    }

    /// Set an attribute value, encoding it through the attribute's codec.
    /// Fails with an attribute-type error when checking is enabled and the
    /// value does not match the declared kind.
    pub fn set(&mut self, attribute: AttributeType, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        let codec = codec_for(attribute);
        if !self.type_checking_disabled && !codec.validates(&value) {
            return Err(Error::attribute_type(format!(
                "value {value} does not match declared kind '{}' of attribute '{}'",
                attribute.value_kind().as_str(),
                attribute.name()
            )));
        }
        self.values.insert(attribute, codec.encode(&value)?);
        Ok(())
    }

    /// Get an attribute value, decoded through the attribute's codec.
    #[must_use]
    pub fn get(&self, attribute: AttributeType) -> Option<Value> {
        let raw = self.values.get(&attribute)?;
        codec_for(attribute).decode(raw).ok()
    }

    /// Get an attribute's value as a string slice, if present and a string.
    #[must_use]
    pub fn get_str(&self, attribute: AttributeType) -> Option<String> {
        self.get(attribute)?.as_str().map(str::to_owned)
    }

    /// Get an attribute's value as an integer, if present and numeric.
    #[must_use]
    pub fn get_i64(&self, attribute: AttributeType) -> Option<i64> {
        self.get(attribute)?.as_i64()
    }

    /// Get an attribute's value as a float, if present and numeric.
    #[must_use]
    pub fn get_f64(&self, attribute: AttributeType) -> Option<f64> {
        self.get(attribute)?.as_f64()
    }

    /// Get an attribute's value as a boolean, if present and boolean.
    #[must_use]
    pub fn get_bool(&self, attribute: AttributeType) -> Option<bool> {
        self.get(attribute)?.as_bool()
    }

    /// Whether the bag holds a value for the attribute.
    #[must_use]
    pub fn contains(&self, attribute: AttributeType) -> bool {
        self.values.contains_key(&attribute)
    }

    /// Remove and return an attribute value.
    pub fn remove(&mut self, attribute: AttributeType) -> Option<Value> {
        self.values.remove(&attribute)
    }

    /// Iterate over (attribute, stored value) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (AttributeType, &Value)> {
        self.values.iter().map(|(k, v)| (*k, v))
    }

    /// Number of attributes in the bag.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if the bag is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
