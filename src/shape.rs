//! Lenient readers for the shapes the Episciences API produces.
//!
//! The API serializes XML-derived records, so most fields may come back as a
//! single object or as an array of one, and scalars may be strings or numbers.
//! Everything here degrades to an empty or absent value instead of failing.

use serde::de::{DeserializeOwned, Deserializer};
use serde::Deserialize;
use serde_json::Value;

/// A field that may hold one `T` or a list of `T`.
///
/// Deserializing never fails: malformed elements are skipped and a value of
/// the wrong shape becomes an empty list.
#[derive(Debug, Clone, PartialEq)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    /// Flatten into a list, keeping element order
    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(item) => vec![item],
            OneOrMany::Many(items) => items,
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        match self {
            OneOrMany::One(item) => std::slice::from_ref(item).iter(),
            OneOrMany::Many(items) => items.iter(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            OneOrMany::One(_) => 1,
            OneOrMany::Many(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: DeserializeOwned> OneOrMany<T> {
    /// Build from an arbitrary JSON value
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Null => OneOrMany::Many(Vec::new()),
            Value::Array(items) => OneOrMany::Many(
                items
                    .into_iter()
                    .filter_map(|item| serde_json::from_value(item).ok())
                    .collect(),
            ),
            other => serde_json::from_value(other)
                .map(OneOrMany::One)
                .unwrap_or_else(|_| OneOrMany::Many(Vec::new())),
        }
    }
}

impl<T> Default for OneOrMany<T> {
    fn default() -> Self {
        OneOrMany::Many(Vec::new())
    }
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for OneOrMany<T> {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(Self::from_value(value))
    }
}

/// Coerce an optional one-or-many field to a list.
pub fn as_array<T>(field: Option<OneOrMany<T>>) -> Vec<T> {
    field.map(OneOrMany::into_vec).unwrap_or_default()
}

/// Borrowing variant of [`as_array`].
pub fn as_slice<T>(field: &Option<OneOrMany<T>>) -> &[T] {
    match field {
        Some(OneOrMany::One(item)) => std::slice::from_ref(item),
        Some(OneOrMany::Many(items)) => items,
        None => &[],
    }
}

/// Read text out of a string, a number, or a `{"value": ...}` wrapper.
pub fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Object(map) => map.get("value").and_then(text_of),
        _ => None,
    }
}

/// Convert JSON value to string, dropping nulls
pub fn value_to_string(val: &Value) -> Option<String> {
    match val {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null => None,
        _ => Some(val.to_string()),
    }
}

/// Read an unsigned integer from a number or a numeric string.
pub fn value_to_u64(val: &Value) -> Option<u64> {
    match val {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// `deserialize_with` helper: string or number into `Option<String>`.
pub fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value_to_string(&value).filter(|s| !s.is_empty()))
}

/// `deserialize_with` helper: number or numeric string into `Option<u64>`.
pub fn flexible_u64<'de, D>(deserializer: D) -> std::result::Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value_to_u64(&value))
}

/// `deserialize_with` helper: `true`, `1`, `"1"` and `"true"` are true.
pub fn flexible_bool<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Bool(b) => b,
        Value::Number(n) => n.as_i64().is_some_and(|n| n != 0),
        Value::String(s) => matches!(s.trim(), "1" | "true"),
        _ => false,
    })
}

/// `deserialize_with` helper: a value of the wrong shape becomes `None`
/// instead of failing the enclosing record.
pub fn lenient<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Name {
        surname: String,
    }

    #[test]
    fn test_one_and_array_of_one_are_equivalent() {
        let one: OneOrMany<Name> = serde_json::from_value(json!({"surname": "Doe"})).unwrap();
        let many: OneOrMany<Name> =
            serde_json::from_value(json!([{"surname": "Doe"}])).unwrap();
        assert_eq!(one.into_vec(), many.into_vec());
    }

    #[test]
    fn test_malformed_elements_are_skipped() {
        let items: OneOrMany<Name> =
            serde_json::from_value(json!([{"surname": "Doe"}, 12, {"given": "x"}])).unwrap();
        assert_eq!(items.len(), 1);

        let wrong: OneOrMany<Name> = serde_json::from_value(json!("oops")).unwrap();
        assert!(wrong.is_empty());
    }

    #[test]
    fn test_as_array_on_missing_field() {
        let missing: Option<OneOrMany<Name>> = None;
        assert!(as_array(missing).is_empty());
        assert!(as_slice::<Name>(&None).is_empty());
    }

    #[test]
    fn test_text_of() {
        assert_eq!(text_of(&json!("plain")), Some("plain".to_string()));
        assert_eq!(text_of(&json!({"value": {"value": "deep"}})), Some("deep".to_string()));
        assert_eq!(text_of(&json!(2024)), Some("2024".to_string()));
        assert_eq!(text_of(&json!([1, 2])), None);
    }

    #[test]
    fn test_flexible_scalars() {
        #[derive(Deserialize)]
        struct Flags {
            #[serde(default, deserialize_with = "flexible_bool")]
            imported: bool,
            #[serde(default, deserialize_with = "flexible_u64")]
            year: Option<u64>,
            #[serde(default, deserialize_with = "string_or_number")]
            num: Option<String>,
        }

        let flags: Flags =
            serde_json::from_value(json!({"imported": "1", "year": "2024", "num": 3})).unwrap();
        assert!(flags.imported);
        assert_eq!(flags.year, Some(2024));
        assert_eq!(flags.num.as_deref(), Some("3"));

        let flags: Flags = serde_json::from_value(json!({"imported": 0})).unwrap();
        assert!(!flags.imported);
        assert_eq!(flags.year, None);
        assert_eq!(flags.num, None);
    }

    #[test]
    fn test_lenient_nested_struct() {
        #[derive(Deserialize)]
        struct Holder {
            #[serde(default, deserialize_with = "lenient")]
            name: Option<Name>,
            #[serde(default)]
            other: Option<u32>,
        }

        let ok: Holder = serde_json::from_value(json!({"name": {"surname": "Doe"}, "other": 1})).unwrap();
        assert_eq!(ok.name, Some(Name { surname: "Doe".to_string() }));

        let wrong: Holder = serde_json::from_value(json!({"name": "Doe", "other": 2})).unwrap();
        assert_eq!(wrong.name, None);
        assert_eq!(wrong.other, Some(2));

        let missing: Holder = serde_json::from_value(json!({})).unwrap();
        assert_eq!(missing.name, None);
    }
}
