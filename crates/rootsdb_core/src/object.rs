//! Stored object envelope and its wire framing.
//!
//! The engine-visible part of every record is the envelope: handle,
//! Gramps-ID, and an opaque payload. The payload is never interpreted
//! here; index extractors and migration steps are the only components
//! that look inside it, and only through the registered CBOR paths.

use crate::error::{StoreError, StoreResult};
use crate::types::{GrampsId, Handle};

/// Largest Gramps-ID the wire framing can carry, in bytes.
pub const MAX_ID_BYTES: usize = u16::MAX as usize;
/// Largest payload the wire framing can carry, in bytes.
pub const MAX_PAYLOAD_BYTES: usize = u32::MAX as usize;

/// A record as stored in a primary table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    /// Engine-assigned primary key.
    pub handle: Handle,
    /// Human-facing secondary key, unique within the object's kind.
    pub gramps_id: GrampsId,
    /// Opaque serialized record.
    pub payload: Vec<u8>,
}

impl StoredObject {
    /// Creates a stored object.
    #[must_use]
    pub fn new(handle: Handle, gramps_id: GrampsId, payload: Vec<u8>) -> Self {
        Self {
            handle,
            gramps_id,
            payload,
        }
    }

    /// Checks that the ID and payload fit the framing's length fields.
    ///
    /// Called before any mutation accepts the object, so an oversized
    /// field is rejected up front instead of corrupting a snapshot.
    pub fn check_sizes(&self) -> StoreResult<()> {
        let id_len = self.gramps_id.as_str().len();
        if id_len > MAX_ID_BYTES {
            return Err(StoreError::codec(format!(
                "gramps id of {id_len} bytes exceeds the {MAX_ID_BYTES}-byte limit"
            )));
        }
        if self.payload.len() > MAX_PAYLOAD_BYTES {
            return Err(StoreError::codec(format!(
                "payload of {} bytes exceeds the {MAX_PAYLOAD_BYTES}-byte limit",
                self.payload.len()
            )));
        }
        Ok(())
    }

    /// Appends the wire encoding of this object to `buf`.
    ///
    /// Fails without truncating if a field does not fit its length
    /// prefix.
    pub fn encode_into(&self, buf: &mut Vec<u8>) -> StoreResult<()> {
        self.check_sizes()?;
        buf.extend_from_slice(self.handle.as_bytes());

        let id_bytes = self.gramps_id.as_str().as_bytes();
        buf.extend_from_slice(&(id_bytes.len() as u16).to_le_bytes());
        buf.extend_from_slice(id_bytes);

        buf.extend_from_slice(&(self.payload.len() as u32).to_le_bytes());
        buf.extend_from_slice(&self.payload);
        Ok(())
    }

    /// Decodes one object starting at `*cursor`, advancing the cursor.
    pub fn decode_from(data: &[u8], cursor: &mut usize) -> StoreResult<Self> {
        let handle_end = cursor
            .checked_add(16)
            .filter(|&end| end <= data.len())
            .ok_or_else(|| StoreError::corrupt("object truncated in handle"))?;
        let handle = Handle::from_slice(&data[*cursor..handle_end])
            .ok_or_else(|| StoreError::corrupt("object truncated in handle"))?;
        *cursor = handle_end;

        if *cursor + 2 > data.len() {
            return Err(StoreError::corrupt("object truncated in ID length"));
        }
        let id_len = u16::from_le_bytes([data[*cursor], data[*cursor + 1]]) as usize;
        *cursor += 2;

        if *cursor + id_len > data.len() {
            return Err(StoreError::corrupt("object truncated in ID"));
        }
        let gramps_id = std::str::from_utf8(&data[*cursor..*cursor + id_len])
            .map_err(|_| StoreError::corrupt("object ID is not UTF-8"))?;
        let gramps_id = GrampsId::new(gramps_id);
        *cursor += id_len;

        if *cursor + 4 > data.len() {
            return Err(StoreError::corrupt("object truncated in payload length"));
        }
        let payload_len = u32::from_le_bytes([
            data[*cursor],
            data[*cursor + 1],
            data[*cursor + 2],
            data[*cursor + 3],
        ]) as usize;
        *cursor += 4;

        if *cursor + payload_len > data.len() {
            return Err(StoreError::corrupt("object truncated in payload"));
        }
        let payload = data[*cursor..*cursor + payload_len].to_vec();
        *cursor += payload_len;

        Ok(Self {
            handle,
            gramps_id,
            payload,
        })
    }
}

/// A record handed to `add_<kind>`, before the engine fills in keys.
///
/// Handle and ID are assigned at add-time when absent.
#[derive(Debug, Clone, Default)]
pub struct NewObject {
    /// Caller-supplied handle, or `None` to have one assigned.
    pub handle: Option<Handle>,
    /// Caller-supplied Gramps-ID, or `None` to have one assigned.
    pub gramps_id: Option<GrampsId>,
    /// Opaque serialized record.
    pub payload: Vec<u8>,
}

impl NewObject {
    /// Creates a new object from a payload, leaving key assignment to
    /// the engine.
    #[must_use]
    pub fn from_payload(payload: Vec<u8>) -> Self {
        Self {
            handle: None,
            gramps_id: None,
            payload,
        }
    }

    /// Pins the handle instead of letting the engine assign one.
    #[must_use]
    pub fn with_handle(mut self, handle: Handle) -> Self {
        self.handle = Some(handle);
        self
    }

    /// Pins the Gramps-ID instead of letting the engine assign one.
    #[must_use]
    pub fn with_gramps_id(mut self, id: GrampsId) -> Self {
        self.gramps_id = Some(id);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample() -> StoredObject {
        StoredObject::new(
            Handle::from_bytes([7u8; 16]),
            GrampsId::new("I0001"),
            vec![1, 2, 3, 4],
        )
    }

    #[test]
    fn encode_decode_roundtrip() {
        let obj = sample();
        let mut buf = Vec::new();
        obj.encode_into(&mut buf).unwrap();

        let mut cursor = 0;
        let decoded = StoredObject::decode_from(&buf, &mut cursor).unwrap();
        assert_eq!(decoded, obj);
        assert_eq!(cursor, buf.len());
    }

    #[test]
    fn decode_truncated_fails() {
        let obj = sample();
        let mut buf = Vec::new();
        obj.encode_into(&mut buf).unwrap();

        for cut in [0, 10, 17, buf.len() - 1] {
            let mut cursor = 0;
            let result = StoredObject::decode_from(&buf[..cut], &mut cursor);
            assert!(result.is_err(), "cut at {cut} should fail");
        }
    }

    #[test]
    fn empty_payload_roundtrip() {
        let obj = StoredObject::new(Handle::new(), GrampsId::new("N0001"), Vec::new());
        let mut buf = Vec::new();
        obj.encode_into(&mut buf).unwrap();

        let mut cursor = 0;
        let decoded = StoredObject::decode_from(&buf, &mut cursor).unwrap();
        assert_eq!(decoded, obj);
    }

    proptest! {
        #[test]
        fn roundtrip_arbitrary(id in "[A-Z][0-9]{1,6}", payload in proptest::collection::vec(any::<u8>(), 0..512)) {
            let obj = StoredObject::new(Handle::new(), GrampsId::new(id), payload);
            let mut buf = Vec::new();
            obj.encode_into(&mut buf).unwrap();

            let mut cursor = 0;
            let decoded = StoredObject::decode_from(&buf, &mut cursor).unwrap();
            prop_assert_eq!(decoded, obj);
        }
    }

    #[test]
    fn oversized_id_fails_to_encode() {
        let obj = StoredObject::new(
            Handle::new(),
            GrampsId::new("I".repeat(70_000)),
            vec![1, 2, 3],
        );

        assert!(matches!(obj.check_sizes(), Err(StoreError::Codec { .. })));

        let mut buf = Vec::new();
        let result = obj.encode_into(&mut buf);
        assert!(matches!(result, Err(StoreError::Codec { .. })));
        assert!(buf.is_empty(), "a failed encode must not emit bytes");
    }

    #[test]
    fn max_length_id_roundtrip() {
        let obj = StoredObject::new(
            Handle::new(),
            GrampsId::new("I".repeat(MAX_ID_BYTES)),
            vec![5],
        );
        let mut buf = Vec::new();
        obj.encode_into(&mut buf).unwrap();

        let mut cursor = 0;
        let decoded = StoredObject::decode_from(&buf, &mut cursor).unwrap();
        assert_eq!(decoded, obj);
    }

    #[test]
    fn builder() {
        let handle = Handle::new();
        let obj = NewObject::from_payload(vec![9])
            .with_handle(handle)
            .with_gramps_id(GrampsId::new("I0009"));

        assert_eq!(obj.handle, Some(handle));
        assert_eq!(obj.gramps_id, Some(GrampsId::new("I0009")));
    }
}
