//! Derived aggregates maintained in the metadata record.
//!
//! Gender counts are kept incrementally on person writes and can be
//! rebuilt from a full person scan. The event-type and attribute-name
//! vocabularies are append-only: grown on first use by a committed
//! record, never shrunk when the last user disappears. That loses
//! nothing correct and keeps removal cheap.

use crate::codec::{map_field, value_from_cbor};
use ciborium::value::Value;
use serde::{Deserialize, Serialize};

/// Gender code as stored in person payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gender {
    /// Gender not recorded or unrecognized.
    Unknown,
    /// Male.
    Male,
    /// Female.
    Female,
}

impl Gender {
    /// Returns the stable payload code.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Gender::Unknown => 0,
            Gender::Male => 1,
            Gender::Female => 2,
        }
    }

    /// Decodes a payload code; unrecognized codes map to `Unknown`.
    #[must_use]
    pub const fn from_code(code: i128) -> Self {
        match code {
            1 => Gender::Male,
            2 => Gender::Female,
            _ => Gender::Unknown,
        }
    }
}

/// Incrementally maintained gender counts over the person table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenderStats {
    /// Persons with no recognized gender.
    pub unknown: u64,
    /// Male persons.
    pub male: u64,
    /// Female persons.
    pub female: u64,
}

impl GenderStats {
    /// Counts a newly stored person.
    pub fn add(&mut self, gender: Gender) {
        match gender {
            Gender::Unknown => self.unknown += 1,
            Gender::Male => self.male += 1,
            Gender::Female => self.female += 1,
        }
    }

    /// Uncounts a removed person.
    pub fn remove(&mut self, gender: Gender) {
        let slot = match gender {
            Gender::Unknown => &mut self.unknown,
            Gender::Male => &mut self.male,
            Gender::Female => &mut self.female,
        };
        *slot = slot.saturating_sub(1);
    }

    /// Recomputes the counts from a full person scan.
    pub fn rebuild<I>(&mut self, genders: I)
    where
        I: IntoIterator<Item = Gender>,
    {
        *self = Self::default();
        for gender in genders {
            self.add(gender);
        }
    }

    /// Total persons counted.
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.unknown + self.male + self.female
    }
}

/// Reads the gender code from a person payload.
///
/// Malformed payloads count as `Unknown` rather than failing the write.
#[must_use]
pub fn gender_of(payload: &[u8]) -> Gender {
    let Ok(value) = value_from_cbor(payload) else {
        return Gender::Unknown;
    };
    match map_field(&value, "gender") {
        Some(Value::Integer(code)) => Gender::from_code(i128::from(*code)),
        _ => Gender::Unknown,
    }
}

/// Reads the custom event-type name from an event payload, if any.
///
/// Recognizes both the migrated tagged shape
/// `{"type": {"code": n, "custom": s}}` and the legacy bare string.
#[must_use]
pub fn event_type_of(payload: &[u8]) -> Option<String> {
    let value = value_from_cbor(payload).ok()?;
    match map_field(&value, "type")? {
        Value::Text(name) => Some(name.clone()),
        tagged @ Value::Map(_) => match map_field(tagged, "custom") {
            Some(Value::Text(name)) if !name.is_empty() => Some(name.clone()),
            _ => None,
        },
        _ => None,
    }
}

/// Reads the attribute names used by a person payload.
#[must_use]
pub fn attribute_names_of(payload: &[u8]) -> Vec<String> {
    let Ok(value) = value_from_cbor(payload) else {
        return Vec::new();
    };
    let Some(Value::Array(attributes)) = map_field(&value, "attributes") else {
        return Vec::new();
    };
    attributes
        .iter()
        .filter_map(|attr| match map_field(attr, "name") {
            Some(Value::Text(name)) => Some(name.clone()),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::to_cbor;

    fn payload(entries: Vec<(&str, Value)>) -> Vec<u8> {
        let value = Value::Map(
            entries
                .into_iter()
                .map(|(k, v)| (Value::Text(k.to_string()), v))
                .collect(),
        );
        to_cbor(&value).unwrap()
    }

    #[test]
    fn stats_add_remove() {
        let mut stats = GenderStats::default();
        stats.add(Gender::Female);
        stats.add(Gender::Female);
        stats.add(Gender::Male);
        assert_eq!(stats.female, 2);
        assert_eq!(stats.male, 1);
        assert_eq!(stats.total(), 3);

        stats.remove(Gender::Female);
        assert_eq!(stats.female, 1);
    }

    #[test]
    fn remove_saturates_at_zero() {
        let mut stats = GenderStats::default();
        stats.remove(Gender::Male);
        assert_eq!(stats.male, 0);
    }

    #[test]
    fn rebuild_resets_counts() {
        let mut stats = GenderStats::default();
        stats.add(Gender::Male);
        stats.rebuild(vec![Gender::Female, Gender::Unknown]);
        assert_eq!(stats.male, 0);
        assert_eq!(stats.female, 1);
        assert_eq!(stats.unknown, 1);
    }

    #[test]
    fn gender_of_reads_code() {
        let p = payload(vec![("gender", Value::Integer(2.into()))]);
        assert_eq!(gender_of(&p), Gender::Female);

        let p = payload(vec![("gender", Value::Integer(99.into()))]);
        assert_eq!(gender_of(&p), Gender::Unknown);
    }

    #[test]
    fn gender_of_tolerates_malformed() {
        assert_eq!(gender_of(&[0xff, 0x01]), Gender::Unknown);
        let p = payload(vec![("gender", Value::Text("female".into()))]);
        assert_eq!(gender_of(&p), Gender::Unknown);
    }

    #[test]
    fn event_type_of_tagged_and_legacy() {
        let tagged = payload(vec![(
            "type",
            Value::Map(vec![
                (Value::Text("code".into()), Value::Integer(0.into())),
                (Value::Text("custom".into()), Value::Text("Census".into())),
            ]),
        )]);
        assert_eq!(event_type_of(&tagged), Some("Census".to_string()));

        let legacy = payload(vec![("type", Value::Text("Birth".into()))]);
        assert_eq!(event_type_of(&legacy), Some("Birth".to_string()));

        let empty_custom = payload(vec![(
            "type",
            Value::Map(vec![(Value::Text("custom".into()), Value::Text(String::new().into()))]),
        )]);
        assert_eq!(event_type_of(&empty_custom), None);
    }

    #[test]
    fn attribute_names_extraction() {
        let p = payload(vec![(
            "attributes",
            Value::Array(vec![
                Value::Map(vec![(
                    Value::Text("name".into()),
                    Value::Text("Occupation".into()),
                )]),
                Value::Map(vec![(
                    Value::Text("name".into()),
                    Value::Text("Religion".into()),
                )]),
            ]),
        )]);
        assert_eq!(attribute_names_of(&p), vec!["Occupation", "Religion"]);

        let none = payload(vec![("gender", Value::Integer(1.into()))]);
        assert!(attribute_names_of(&none).is_empty());
    }
}
