//! Decoding a merged tree into caller types.
//!
//! The decoder is weakly typed: environment overrides always arrive as
//! strings, so a string is parsed when the target asks for a number or a
//! boolean, numbers and booleans are rendered when the target asks for a
//! string, and a comma-separated string fills a list. Anything that still
//! does not fit is an error carrying the dotted path of the offending key.
//!
//! Coercion needs the target type. Fields under `#[serde(flatten)]` and
//! untagged enums are buffered by serde before the target is known, so they
//! receive values as stored: a string override does not become a number
//! there. Use a nested field instead of `flatten` for overridable numbers.

use crate::config::tree::KEY_SEPARATOR;
use crate::error::ConfigError;
use serde::de::{
    self, DeserializeOwned, DeserializeSeed, EnumAccess, Expected, IntoDeserializer, MapAccess,
    SeqAccess, Unexpected, VariantAccess, Visitor,
};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Decode `value` into `T`. `scope` is the dotted key `value` was taken
/// from, used to qualify error paths.
pub fn decode<T: DeserializeOwned>(value: Value, scope: Option<&str>) -> Result<T, ConfigError> {
    let root = scope.unwrap_or_default().to_string();
    T::deserialize(ValueDeserializer::new(value, root)).map_err(|err| err.into_config_error(scope))
}

/// Decode failure with the path where it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
struct DecodeError {
    path: Option<String>,
    message: String,
}

impl DecodeError {
    fn new(path: &str, message: impl fmt::Display) -> Self {
        Self {
            path: None,
            message: message.to_string(),
        }
        .at(path)
    }

    /// Attach `path` unless a deeper path is already recorded.
    fn at(mut self, path: &str) -> Self {
        if self.path.is_none() && !path.is_empty() {
            self.path = Some(path.to_string());
        }
        self
    }

    fn into_config_error(self, scope: Option<&str>) -> ConfigError {
        let key = self.path.clone().or_else(|| scope.map(str::to_string));
        ConfigError::Unmarshal {
            message: match &key {
                Some(key) => format!("key '{key}': {}", self.message),
                None => self.message,
            },
            key,
        }
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.path {
            Some(path) => write!(f, "{path}: {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for DecodeError {}

impl de::Error for DecodeError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Self {
            path: None,
            message: msg.to_string(),
        }
    }
}

fn child_path(parent: &str, segment: impl fmt::Display) -> String {
    if parent.is_empty() {
        segment.to_string()
    } else {
        format!("{parent}{KEY_SEPARATOR}{segment}")
    }
}

fn unexpected(value: &Value) -> Unexpected<'_> {
    match value {
        Value::Null => Unexpected::Unit,
        Value::Bool(b) => Unexpected::Bool(*b),
        Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                Unexpected::Unsigned(u)
            } else if let Some(i) = n.as_i64() {
                Unexpected::Signed(i)
            } else {
                Unexpected::Float(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        Value::String(s) => Unexpected::Str(s),
        Value::Array(_) => Unexpected::Seq,
        Value::Object(_) => Unexpected::Map,
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Split a comma-separated override into list items.
fn split_list(raw: &str) -> Vec<Value> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| Value::String(item.to_string()))
        .collect()
}

/// Owned deserializer over one node of the tree.
struct ValueDeserializer {
    value: Value,
    path: String,
}

impl ValueDeserializer {
    fn new(value: Value, path: String) -> Self {
        Self { value, path }
    }

    fn invalid_type(&self, exp: &dyn Expected) -> DecodeError {
        invalid_type(&self.value, exp, &self.path)
    }

    fn number<T>(&self, expected: &'static str) -> Result<T, DecodeError>
    where
        T: FromStr + DeserializeOwned,
        T::Err: fmt::Display,
    {
        match &self.value {
            Value::Number(_) => {
                T::deserialize(&self.value).map_err(|err| DecodeError::new(&self.path, err))
            }
            Value::String(raw) => raw.trim().parse::<T>().map_err(|err| {
                DecodeError::new(
                    &self.path,
                    format_args!("cannot convert {raw:?} to {expected}: {err}"),
                )
            }),
            _ => Err(self.invalid_type(&expected)),
        }
    }
}

fn invalid_type(value: &Value, exp: &dyn Expected, path: &str) -> DecodeError {
    <DecodeError as de::Error>::invalid_type(unexpected(value), exp).at(path)
}

fn visit_map<'de, V: Visitor<'de>>(
    map: Map<String, Value>,
    path: &str,
    visitor: V,
) -> Result<V::Value, DecodeError> {
    let len = map.len();
    let mut access = MapDeserializer {
        iter: map.into_iter(),
        pending: None,
        path: path.to_string(),
    };
    let value = visitor.visit_map(&mut access).map_err(|e: DecodeError| e.at(path))?;
    if access.iter.len() == 0 {
        Ok(value)
    } else {
        Err(<DecodeError as de::Error>::invalid_length(len, &"fewer entries in mapping").at(path))
    }
}

fn visit_seq<'de, V: Visitor<'de>>(
    items: Vec<Value>,
    path: &str,
    visitor: V,
) -> Result<V::Value, DecodeError> {
    let len = items.len();
    let mut access = SeqDeserializer {
        iter: items.into_iter(),
        index: 0,
        path: path.to_string(),
    };
    let value = visitor.visit_seq(&mut access).map_err(|e: DecodeError| e.at(path))?;
    if access.iter.len() == 0 {
        Ok(value)
    } else {
        Err(<DecodeError as de::Error>::invalid_length(len, &"fewer elements in list").at(path))
    }
}

macro_rules! deserialize_number {
    ($method:ident, $visit:ident, $ty:ty) => {
        fn $method<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DecodeError> {
            let parsed = self.number::<$ty>(stringify!($ty))?;
            visitor.$visit(parsed).map_err(|e: DecodeError| e.at(&self.path))
        }
    };
}

impl<'de> de::Deserializer<'de> for ValueDeserializer {
    type Error = DecodeError;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DecodeError> {
        let path = self.path.clone();
        let result = match self.value {
            Value::Null => visitor.visit_unit(),
            Value::Bool(b) => visitor.visit_bool(b),
            Value::Number(ref n) => {
                if let Some(u) = n.as_u64() {
                    visitor.visit_u64(u)
                } else if let Some(i) = n.as_i64() {
                    visitor.visit_i64(i)
                } else {
                    visitor.visit_f64(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            Value::String(s) => visitor.visit_string(s),
            Value::Array(items) => return visit_seq(items, &path, visitor),
            Value::Object(map) => return visit_map(map, &path, visitor),
        };
        result.map_err(|e: DecodeError| e.at(&path))
    }

    deserialize_number!(deserialize_i8, visit_i8, i8);
    deserialize_number!(deserialize_i16, visit_i16, i16);
    deserialize_number!(deserialize_i32, visit_i32, i32);
    deserialize_number!(deserialize_i64, visit_i64, i64);
    deserialize_number!(deserialize_i128, visit_i128, i128);
    deserialize_number!(deserialize_u8, visit_u8, u8);
    deserialize_number!(deserialize_u16, visit_u16, u16);
    deserialize_number!(deserialize_u32, visit_u32, u32);
    deserialize_number!(deserialize_u64, visit_u64, u64);
    deserialize_number!(deserialize_u128, visit_u128, u128);
    deserialize_number!(deserialize_f32, visit_f32, f32);
    deserialize_number!(deserialize_f64, visit_f64, f64);

    fn deserialize_bool<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DecodeError> {
        let parsed = match &self.value {
            Value::Bool(b) => *b,
            Value::String(raw) => parse_bool(raw).ok_or_else(|| {
                DecodeError::new(&self.path, format_args!("cannot convert {raw:?} to bool"))
            })?,
            Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
            _ => return Err(self.invalid_type(&visitor)),
        };
        visitor.visit_bool(parsed).map_err(|e: DecodeError| e.at(&self.path))
    }

    fn deserialize_char<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DecodeError> {
        self.deserialize_string(visitor)
    }

    fn deserialize_str<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DecodeError> {
        self.deserialize_string(visitor)
    }

    fn deserialize_string<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DecodeError> {
        let text = match &self.value {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            _ => return Err(self.invalid_type(&visitor)),
        };
        visitor.visit_string(text).map_err(|e: DecodeError| e.at(&self.path))
    }

    fn deserialize_bytes<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DecodeError> {
        self.deserialize_any(visitor)
    }

    fn deserialize_byte_buf<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DecodeError> {
        self.deserialize_any(visitor)
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DecodeError> {
        if self.value.is_null() {
            let path = self.path;
            visitor.visit_none().map_err(|e: DecodeError| e.at(&path))
        } else {
            visitor.visit_some(self)
        }
    }

    fn deserialize_unit<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DecodeError> {
        match self.value {
            Value::Null => visitor.visit_unit().map_err(|e: DecodeError| e.at(&self.path)),
            _ => Err(self.invalid_type(&visitor)),
        }
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, DecodeError> {
        self.deserialize_unit(visitor)
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, DecodeError> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_seq<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DecodeError> {
        let items = match self.value {
            Value::Array(items) => items,
            Value::Null => Vec::new(),
            Value::String(ref raw) => split_list(raw),
            ref other => return Err(invalid_type(other, &visitor, &self.path)),
        };
        visit_seq(items, &self.path, visitor)
    }

    fn deserialize_tuple<V: Visitor<'de>>(
        self,
        _len: usize,
        visitor: V,
    ) -> Result<V::Value, DecodeError> {
        self.deserialize_seq(visitor)
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _len: usize,
        visitor: V,
    ) -> Result<V::Value, DecodeError> {
        self.deserialize_seq(visitor)
    }

    fn deserialize_map<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DecodeError> {
        let map = match self.value {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            ref other => return Err(invalid_type(other, &visitor, &self.path)),
        };
        visit_map(map, &self.path, visitor)
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, DecodeError> {
        self.deserialize_map(visitor)
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, DecodeError> {
        let path = self.path.clone();
        let (variant, value) = match self.value {
            Value::String(variant) => (variant, None),
            Value::Object(map) if map.len() == 1 => match map.into_iter().next() {
                Some((variant, value)) => (variant, Some(value)),
                None => return Err(DecodeError::new(&path, "expected an enum variant")),
            },
            other => {
                return Err(<DecodeError as de::Error>::invalid_type(
                    unexpected(&other),
                    &"a string or a single-key mapping",
                )
                .at(&path));
            }
        };

        visitor
            .visit_enum(EnumDeserializer {
                variant,
                value,
                path: path.clone(),
            })
            .map_err(|e: DecodeError| e.at(&path))
    }

    fn deserialize_identifier<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DecodeError> {
        self.deserialize_string(visitor)
    }

    fn deserialize_ignored_any<V: Visitor<'de>>(
        self,
        visitor: V,
    ) -> Result<V::Value, DecodeError> {
        visitor.visit_unit()
    }
}

struct SeqDeserializer {
    iter: std::vec::IntoIter<Value>,
    index: usize,
    path: String,
}

impl<'de> SeqAccess<'de> for SeqDeserializer {
    type Error = DecodeError;

    fn next_element_seed<T: DeserializeSeed<'de>>(
        &mut self,
        seed: T,
    ) -> Result<Option<T::Value>, DecodeError> {
        let Some(value) = self.iter.next() else {
            return Ok(None);
        };
        let path = child_path(&self.path, self.index);
        self.index += 1;
        seed.deserialize(ValueDeserializer::new(value, path)).map(Some)
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.iter.len())
    }
}

struct MapDeserializer {
    iter: serde_json::map::IntoIter,
    pending: Option<(String, Value)>,
    path: String,
}

impl<'de> MapAccess<'de> for MapDeserializer {
    type Error = DecodeError;

    fn next_key_seed<K: DeserializeSeed<'de>>(
        &mut self,
        seed: K,
    ) -> Result<Option<K::Value>, DecodeError> {
        let Some((key, value)) = self.iter.next() else {
            return Ok(None);
        };
        let path = child_path(&self.path, &key);
        let parsed = seed.deserialize(ValueDeserializer::new(Value::String(key), path.clone()))?;
        self.pending = Some((path, value));
        Ok(Some(parsed))
    }

    fn next_value_seed<V: DeserializeSeed<'de>>(
        &mut self,
        seed: V,
    ) -> Result<V::Value, DecodeError> {
        match self.pending.take() {
            Some((path, value)) => seed.deserialize(ValueDeserializer::new(value, path)),
            None => Err(DecodeError::new(&self.path, "value requested before key")),
        }
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.iter.len())
    }
}

struct EnumDeserializer {
    variant: String,
    value: Option<Value>,
    path: String,
}

impl<'de> EnumAccess<'de> for EnumDeserializer {
    type Error = DecodeError;
    type Variant = VariantDeserializer;

    fn variant_seed<V: DeserializeSeed<'de>>(
        self,
        seed: V,
    ) -> Result<(V::Value, VariantDeserializer), DecodeError> {
        let variant_de: de::value::StringDeserializer<DecodeError> =
            self.variant.clone().into_deserializer();
        let variant = seed.deserialize(variant_de)?;
        let path = child_path(&self.path, &self.variant);
        Ok((
            variant,
            VariantDeserializer {
                value: self.value,
                path,
            },
        ))
    }
}

struct VariantDeserializer {
    value: Option<Value>,
    path: String,
}

impl<'de> VariantAccess<'de> for VariantDeserializer {
    type Error = DecodeError;

    fn unit_variant(self) -> Result<(), DecodeError> {
        match self.value {
            None | Some(Value::Null) => Ok(()),
            Some(other) => Err(<DecodeError as de::Error>::invalid_type(
                unexpected(&other),
                &"unit variant",
            )
            .at(&self.path)),
        }
    }

    fn newtype_variant_seed<T: DeserializeSeed<'de>>(
        self,
        seed: T,
    ) -> Result<T::Value, DecodeError> {
        match self.value {
            Some(value) => seed.deserialize(ValueDeserializer::new(value, self.path)),
            None => Err(<DecodeError as de::Error>::invalid_type(
                Unexpected::UnitVariant,
                &"newtype variant",
            )
            .at(&self.path)),
        }
    }

    fn tuple_variant<V: Visitor<'de>>(
        self,
        _len: usize,
        visitor: V,
    ) -> Result<V::Value, DecodeError> {
        let value = self.value.unwrap_or(Value::Null);
        de::Deserializer::deserialize_seq(ValueDeserializer::new(value, self.path), visitor)
    }

    fn struct_variant<V: Visitor<'de>>(
        self,
        _fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, DecodeError> {
        let value = self.value.unwrap_or(Value::Null);
        de::Deserializer::deserialize_map(ValueDeserializer::new(value, self.path), visitor)
    }
}
