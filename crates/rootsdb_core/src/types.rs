//! Core type definitions for the object store.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// The kinds of primary objects a store holds.
///
/// Each kind owns one primary table and one unique Gramps-ID index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ObjectKind {
    /// A person record.
    Person,
    /// A family record linking people.
    Family,
    /// An event (birth, death, marriage, ...).
    Event,
    /// A place.
    Place,
    /// A source citation target.
    Source,
    /// A media reference.
    Media,
    /// A free-form note.
    Note,
}

impl ObjectKind {
    /// All object kinds, in table order.
    pub const ALL: [ObjectKind; 7] = [
        ObjectKind::Person,
        ObjectKind::Family,
        ObjectKind::Event,
        ObjectKind::Place,
        ObjectKind::Source,
        ObjectKind::Media,
        ObjectKind::Note,
    ];

    /// Returns the primary table name for this kind.
    #[must_use]
    pub const fn table_name(self) -> &'static str {
        match self {
            ObjectKind::Person => "person",
            ObjectKind::Family => "family",
            ObjectKind::Event => "event",
            ObjectKind::Place => "place",
            ObjectKind::Source => "source",
            ObjectKind::Media => "media",
            ObjectKind::Note => "note",
        }
    }

    /// Returns the conventional Gramps-ID prefix for this kind.
    #[must_use]
    pub const fn id_prefix(self) -> &'static str {
        match self {
            ObjectKind::Person => "I",
            ObjectKind::Family => "F",
            ObjectKind::Event => "E",
            ObjectKind::Place => "P",
            ObjectKind::Source => "S",
            ObjectKind::Media => "O",
            ObjectKind::Note => "N",
        }
    }

    /// Returns the stable wire code for this kind.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        match self {
            ObjectKind::Person => 0,
            ObjectKind::Family => 1,
            ObjectKind::Event => 2,
            ObjectKind::Place => 3,
            ObjectKind::Source => 4,
            ObjectKind::Media => 5,
            ObjectKind::Note => 6,
        }
    }

    /// Decodes a wire code back to a kind.
    #[must_use]
    pub const fn from_u8(code: u8) -> Option<Self> {
        match code {
            0 => Some(ObjectKind::Person),
            1 => Some(ObjectKind::Family),
            2 => Some(ObjectKind::Event),
            3 => Some(ObjectKind::Place),
            4 => Some(ObjectKind::Source),
            5 => Some(ObjectKind::Media),
            6 => Some(ObjectKind::Note),
            _ => None,
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}

/// Opaque engine-assigned identifier; the primary key of every table.
///
/// Handles are 128-bit values that are:
/// - unique within a store
/// - stable for the object's lifetime
/// - never reused
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Handle([u8; 16]);

impl Handle {
    /// Creates a new random handle.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4().into_bytes())
    }

    /// Creates a handle from raw bytes.
    #[inline]
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Returns the raw bytes.
    #[inline]
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Creates a handle from a slice.
    ///
    /// Returns `None` if the slice is not exactly 16 bytes.
    #[must_use]
    pub fn from_slice(slice: &[u8]) -> Option<Self> {
        if slice.len() == 16 {
            let mut bytes = [0u8; 16];
            bytes.copy_from_slice(slice);
            Some(Self(bytes))
        } else {
            None
        }
    }
}

impl Default for Handle {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({})", Uuid::from_bytes(self.0).simple())
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", Uuid::from_bytes(self.0).simple())
    }
}

/// Human-facing secondary identifier, unique per object kind.
///
/// Independent of the handle; callers may supply their own or let the
/// engine assign the next free one (e.g. `I0042` for a person).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GrampsId(String);

impl GrampsId {
    /// Creates an ID from a string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Formats the engine-assigned ID for a kind and serial number.
    #[must_use]
    pub fn formatted(kind: ObjectKind, serial: u32) -> Self {
        Self(format!("{}{:04}", kind.id_prefix(), serial))
    }

    /// Returns the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GrampsId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for GrampsId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}
