use serde::{Deserialize, Deserializer, Serialize, Serializer, de::DeserializeOwned, de::Error};

use crate::consts::UNSET;

/// A canonical-schema value that may be unset.
///
/// Converters write `-1` for anything they do not know, and some older files
/// leave the key out entirely. Both are read back as "no value", but the two
/// spellings are kept apart so a file is written back the way it was read:
///
/// * `Absent` - the key was missing; it stays missing on write
///   (fields use `skip_serializing_if = "Field::is_absent"`).
/// * `Unset` - the key held `-1` (or `null`); it is written as `-1`.
/// * `Set` - a real value.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Field<T> {
    #[default]
    Absent,
    Unset,
    Set(T),
}

impl<T> Field<T> {
    pub fn is_absent(&self) -> bool {
        matches!(self, Field::Absent)
    }

    pub fn is_set(&self) -> bool {
        matches!(self, Field::Set(_))
    }

    pub fn get(&self) -> Option<&T> {
        match self {
            Field::Set(value) => Some(value),
            _ => None,
        }
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            Field::Set(value) => Some(value),
            _ => None,
        }
    }
}

impl<T: Serialize> Serialize for Field<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Field::Set(value) => value.serialize(serializer),
            Field::Absent | Field::Unset => serializer.serialize_i64(UNSET),
        }
    }
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for Field<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        if is_sentinel(&value) {
            return Ok(Field::Unset);
        }
        serde_json::from_value(value)
            .map(Field::Set)
            .map_err(D::Error::custom)
    }
}

fn is_sentinel(value: &serde_json::Value) -> bool {
    value.is_null() || value.as_i64() == Some(UNSET) || value.as_f64() == Some(UNSET as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    struct Probe {
        #[serde(default, skip_serializing_if = "Field::is_absent")]
        text: Field<String>,
        #[serde(default, skip_serializing_if = "Field::is_absent")]
        order: Field<i64>,
    }

    #[test]
    fn test_field_sentinel_roundtrip() {
        let probe: Probe = serde_json::from_str(r#"{"text": -1, "order": 3}"#).unwrap();
        assert_eq!(probe.text, Field::Unset);
        assert_eq!(probe.order, Field::Set(3));
        assert_eq!(
            serde_json::to_string(&probe).unwrap(),
            r#"{"text":-1,"order":3}"#
        );
    }

    #[test]
    fn test_field_absent_stays_absent() {
        let probe: Probe = serde_json::from_str(r#"{"order": -1}"#).unwrap();
        assert!(probe.text.is_absent());
        assert_eq!(probe.order, Field::Unset);
        assert_eq!(serde_json::to_string(&probe).unwrap(), r#"{"order":-1}"#);
    }

    #[test]
    fn test_field_null_reads_as_unset() {
        let probe: Probe = serde_json::from_str(r#"{"text": null}"#).unwrap();
        assert_eq!(probe.text, Field::Unset);
        assert_eq!(probe.text.get(), None);
    }

    #[test]
    fn test_field_wrong_type_is_error() {
        assert!(serde_json::from_str::<Probe>(r#"{"order": "first"}"#).is_err());
    }
}
