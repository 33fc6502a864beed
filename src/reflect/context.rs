use core::fmt;
use std::sync::Arc;

use foldhash::fast::FixedState;
use hashbrown::HashMap;
use thiserror::Error;

use crate::reflect::path::{MemberPath, PathError};
use crate::reflect::reflected::Reflected;

/// Strings longer than this are rejected by the intern tables. Guards the
/// packed table against absurd lengths in corrupted input.
pub const MAX_MAPPED_STRING_LENGTH: usize = 1 << 20;

// -----------------------------------------------------------------------------
// Errors

/// Failures of the string and object intern tables.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ContextError {
    #[error("string `{value}` was not mapped during the mapping pass")]
    UnmappedString { value: String },

    #[error("object was not mapped during the mapping pass")]
    UnmappedObject,

    #[error("string index {index} out of range")]
    StringIndexOutOfRange { index: u32 },

    #[error("object index {index} out of range")]
    ObjectIndexOutOfRange { index: u32 },

    #[error("mapped string exceeds maximum length")]
    StringTooLong,

    #[error("string contains an embedded NUL byte")]
    EmbeddedNul,

    #[error("string table is not NUL-terminated")]
    UnterminatedStringTable,

    #[error("string table contains invalid UTF-8")]
    InvalidUtf8,

    #[error("member path exceeds maximum depth")]
    PathTooDeep,
}

impl From<PathError> for ContextError {
    fn from(_: PathError) -> Self {
        ContextError::PathTooDeep
    }
}

// -----------------------------------------------------------------------------
// Stage

/// Pass of a binary serialization run.
///
/// A context starts in `Mapping`. Advancing to `Serialization` or
/// `Deserialization` freezes the intern tables; there is no way back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Dry run that discovers and counts strings and objects.
    Mapping,
    /// Emission. Lookups against the frozen tables, insertions fail.
    Serialization,
    /// Decoding. Lookups resolve against the decoded tables.
    Deserialization,
}

// -----------------------------------------------------------------------------
// Mismatch records

/// The decoded (or undecodable) old value of a mismatched member.
pub enum MismatchedValue {
    /// The stored type is registered, so the payload was decoded into a
    /// fresh instance of it.
    Decoded(Box<dyn Reflected>),
    /// The stored type is unknown; the raw payload is kept instead.
    Raw(Box<[u8]>),
}

impl fmt::Debug for MismatchedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MismatchedValue::Decoded(obj) => {
                write!(f, "Decoded({})", obj.type_desc().name())
            }
            MismatchedValue::Raw(bytes) => write!(f, "Raw({} bytes)", bytes.len()),
        }
    }
}

/// A member whose stored type does not match the runtime member type.
///
/// Recorded during binary deserialization instead of failing, so callers can
/// migrate old data by hand.
#[derive(Debug)]
pub struct MemberTypeMismatch {
    /// Where in the object tree the mismatch occurred.
    pub path: MemberPath,
    /// Type name found in the persisted data.
    pub stored_type: String,
    /// The old value, decoded when possible.
    pub value: MismatchedValue,
}

// -----------------------------------------------------------------------------
// SerializationContext

struct MappedString {
    value: String,
    occurrences: u32,
}

struct MappedObject {
    object: Arc<dyn Reflected>,
    occurrences: u32,
}

/// Shared state of a binary serialization or deserialization run.
///
/// Interns strings and shared objects during the mapping pass, hands out
/// stable indices during emission, and resolves indices while decoding.
/// Object table order is append order; children are appended before the
/// objects that reference them, which is what makes single-pass decoding
/// possible. The string table order may be rearranged by
/// [`optimize_string_table`](Self::optimize_string_table), the object table
/// never is.
pub struct SerializationContext {
    stage: Stage,
    version: u32,
    strings: Vec<MappedString>,
    string_indices: HashMap<String, u32, FixedState>,
    objects: Vec<MappedObject>,
    object_indices: HashMap<usize, u32, FixedState>,
    // Decode-side packed table.
    string_buffer: Box<[u8]>,
    string_spans: Vec<(u32, u32)>,
    mismatches: Vec<MemberTypeMismatch>,
    path: MemberPath,
}

fn object_identity(object: &Arc<dyn Reflected>) -> usize {
    Arc::as_ptr(object) as *const () as usize
}

impl SerializationContext {
    pub fn new(version: u32) -> Self {
        Self {
            stage: Stage::Mapping,
            version,
            strings: Vec::new(),
            string_indices: HashMap::default(),
            objects: Vec::new(),
            object_indices: HashMap::default(),
            string_buffer: Box::from([]),
            string_spans: Vec::new(),
            mismatches: Vec::new(),
            path: MemberPath::new(),
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Format version of the data being read or written.
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Advances to `stage`.
    ///
    /// # Panics
    ///
    /// Panics unless the transition starts at `Mapping` (re-entering the
    /// current stage is a no-op). A finished context cannot be rewound.
    pub fn init_stage(&mut self, stage: Stage) {
        if stage == self.stage {
            return;
        }
        assert!(
            self.stage == Stage::Mapping,
            "cannot switch serialization stage from {:?} to {:?}",
            self.stage,
            stage
        );
        self.stage = stage;
    }

    // -------------------------------------------------------------------------
    // String table

    /// Interns `value` (mapping pass) or looks up its index (later passes).
    pub fn map_string(&mut self, value: &str) -> Result<u32, ContextError> {
        if self.stage != Stage::Mapping {
            return match self.string_indices.get(value) {
                Some(&index) => Ok(index),
                None => Err(ContextError::UnmappedString {
                    value: value.to_owned(),
                }),
            };
        }

        if value.len() > MAX_MAPPED_STRING_LENGTH {
            return Err(ContextError::StringTooLong);
        }
        if value.as_bytes().contains(&0) {
            return Err(ContextError::EmbeddedNul);
        }

        if let Some(&index) = self.string_indices.get(value) {
            self.strings[index as usize].occurrences += 1;
            return Ok(index);
        }
        let index = self.strings.len() as u32;
        self.strings.push(MappedString {
            value: value.to_owned(),
            occurrences: 1,
        });
        self.string_indices.insert(value.to_owned(), index);
        Ok(index)
    }

    /// Resolves a string index, against the packed decode table when one
    /// was loaded, against the intern table otherwise.
    pub fn unmap_string(&self, index: u32) -> Result<&str, ContextError> {
        if !self.string_spans.is_empty() || !self.string_buffer.is_empty() {
            let &(offset, len) = self
                .string_spans
                .get(index as usize)
                .ok_or(ContextError::StringIndexOutOfRange { index })?;
            let bytes = &self.string_buffer[offset as usize..(offset + len) as usize];
            return core::str::from_utf8(bytes).map_err(|_| ContextError::InvalidUtf8);
        }
        self.strings
            .get(index as usize)
            .map(|s| s.value.as_str())
            .ok_or(ContextError::StringIndexOutOfRange { index })
    }

    pub fn string_count(&self) -> u32 {
        if self.string_spans.is_empty() {
            self.strings.len() as u32
        } else {
            self.string_spans.len() as u32
        }
    }

    /// How many times the string at `index` was mapped. Meaningful after
    /// the mapping pass.
    pub fn string_occurrences(&self, index: u32) -> Option<u32> {
        self.strings.get(index as usize).map(|s| s.occurrences)
    }

    /// Reorders the string table so the most frequently mapped strings get
    /// the smallest (shortest varint) indices. Ties keep first-seen order.
    ///
    /// # Panics
    ///
    /// Panics outside the mapping pass: emitted indices must not move.
    pub fn optimize_string_table(&mut self) {
        assert!(
            self.stage == Stage::Mapping,
            "string table can only be optimized during the mapping pass"
        );
        let mut order: Vec<u32> = (0..self.strings.len() as u32).collect();
        order.sort_by_key(|&i| core::cmp::Reverse(self.strings[i as usize].occurrences));

        let mut reordered = Vec::with_capacity(self.strings.len());
        self.string_indices.clear();
        for &old_index in &order {
            let entry = core::mem::replace(
                &mut self.strings[old_index as usize],
                MappedString {
                    value: String::new(),
                    occurrences: 0,
                },
            );
            self.string_indices
                .insert(entry.value.clone(), reordered.len() as u32);
            reordered.push(entry);
        }
        self.strings = reordered;
    }

    /// Emits the packed table: every string in index order, each terminated
    /// by a NUL byte.
    pub fn write_string_table(&self, out: &mut Vec<u8>) {
        for entry in &self.strings {
            out.extend_from_slice(entry.value.as_bytes());
            out.push(0);
        }
    }

    /// Loads a packed string table for decoding.
    ///
    /// Framing guards: the table must end with a NUL terminator, every
    /// segment must be valid UTF-8 and fit the length cap. On failure the
    /// table is left empty.
    pub fn init_string_table(&mut self, buffer: Vec<u8>) -> Result<(), ContextError> {
        self.string_spans.clear();
        self.string_buffer = Box::from([]);

        if buffer.is_empty() {
            return Ok(());
        }
        if buffer.last() != Some(&0) {
            return Err(ContextError::UnterminatedStringTable);
        }

        let mut spans = Vec::new();
        let mut start = 0usize;
        for (pos, &byte) in buffer.iter().enumerate() {
            if byte != 0 {
                continue;
            }
            let len = pos - start;
            if len > MAX_MAPPED_STRING_LENGTH {
                return Err(ContextError::StringTooLong);
            }
            if core::str::from_utf8(&buffer[start..pos]).is_err() {
                return Err(ContextError::InvalidUtf8);
            }
            spans.push((start as u32, len as u32));
            start = pos + 1;
        }

        self.string_buffer = buffer.into_boxed_slice();
        self.string_spans = spans;
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Object table

    /// Interns a shared object by pointer identity (mapping pass) or looks
    /// up its index (later passes).
    pub fn map_object(&mut self, object: &Arc<dyn Reflected>) -> Result<u32, ContextError> {
        let identity = object_identity(object);
        if self.stage != Stage::Mapping {
            return match self.object_indices.get(&identity) {
                Some(&index) => Ok(index),
                None => Err(ContextError::UnmappedObject),
            };
        }
        if let Some(&index) = self.object_indices.get(&identity) {
            self.objects[index as usize].occurrences += 1;
            return Ok(index);
        }
        let index = self.objects.len() as u32;
        self.objects.push(MappedObject {
            object: Arc::clone(object),
            occurrences: 1,
        });
        self.object_indices.insert(identity, index);
        Ok(index)
    }

    pub fn is_object_mapped(&self, object: &Arc<dyn Reflected>) -> bool {
        self.object_indices.contains_key(&object_identity(object))
    }

    /// Appends a freshly decoded object to the table.
    ///
    /// # Panics
    ///
    /// Panics outside the deserialization pass.
    pub fn push_object(&mut self, object: Arc<dyn Reflected>) -> u32 {
        assert!(
            self.stage == Stage::Deserialization,
            "objects can only be pushed while deserializing"
        );
        let index = self.objects.len() as u32;
        self.object_indices.insert(object_identity(&object), index);
        self.objects.push(MappedObject {
            object,
            occurrences: 1,
        });
        index
    }

    pub fn unmap_object(&self, index: u32) -> Result<Arc<dyn Reflected>, ContextError> {
        self.objects
            .get(index as usize)
            .map(|o| Arc::clone(&o.object))
            .ok_or(ContextError::ObjectIndexOutOfRange { index })
    }

    pub fn object_count(&self) -> u32 {
        self.objects.len() as u32
    }

    /// How many times the object at `index` was mapped. Meaningful after
    /// the mapping pass.
    pub fn object_occurrences(&self, index: u32) -> Option<u32> {
        self.objects.get(index as usize).map(|o| o.occurrences)
    }

    // -------------------------------------------------------------------------
    // Current path and mismatch records

    pub fn push_path_name(&mut self, name: &str) -> Result<(), ContextError> {
        self.path.push_name(name).map_err(ContextError::from)
    }

    pub fn push_path_index(&mut self, index: u32) -> Result<(), ContextError> {
        self.path.push_index(index).map_err(ContextError::from)
    }

    pub fn pop_path(&mut self) {
        self.path.pop();
    }

    /// Path of the member currently being processed.
    pub fn current_path(&self) -> &MemberPath {
        &self.path
    }

    pub fn push_member_type_mismatch(&mut self, record: MemberTypeMismatch) {
        log::warn!(
            "member '{}': stored type '{}' does not match, keeping old value aside",
            record.path,
            record.stored_type
        );
        self.mismatches.push(record);
    }

    /// Mismatches recorded so far, in encounter order.
    pub fn member_type_mismatches(&self) -> &[MemberTypeMismatch] {
        &self.mismatches
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reflect::serializer::CURRENT_VERSION;

    #[test]
    fn map_string_counts_occurrences() {
        let mut ctx = SerializationContext::new(CURRENT_VERSION);
        let a = ctx.map_string("alpha").unwrap();
        let b = ctx.map_string("beta").unwrap();
        assert_ne!(a, b);
        assert_eq!(ctx.map_string("alpha").unwrap(), a);
        assert_eq!(ctx.map_string("alpha").unwrap(), a);
        assert_eq!(ctx.string_occurrences(a), Some(3));
        assert_eq!(ctx.string_occurrences(b), Some(1));
        assert_eq!(ctx.string_count(), 2);
    }

    #[test]
    fn unmapped_string_fails_after_mapping_pass() {
        let mut ctx = SerializationContext::new(CURRENT_VERSION);
        ctx.map_string("known").unwrap();
        ctx.init_stage(Stage::Serialization);
        assert!(ctx.map_string("known").is_ok());
        assert_eq!(
            ctx.map_string("unknown"),
            Err(ContextError::UnmappedString {
                value: "unknown".into()
            })
        );
    }

    #[test]
    #[should_panic(expected = "cannot switch serialization stage")]
    fn stage_cannot_rewind() {
        let mut ctx = SerializationContext::new(CURRENT_VERSION);
        ctx.init_stage(Stage::Serialization);
        ctx.init_stage(Stage::Deserialization);
    }

    #[test]
    fn optimize_prefers_frequent_strings() {
        let mut ctx = SerializationContext::new(CURRENT_VERSION);
        ctx.map_string("rare").unwrap();
        for _ in 0..5 {
            ctx.map_string("common").unwrap();
        }
        ctx.optimize_string_table();
        assert_eq!(ctx.unmap_string(0).unwrap(), "common");
        assert_eq!(ctx.unmap_string(1).unwrap(), "rare");
        assert_eq!(ctx.map_string("common").unwrap(), 0);
    }

    #[test]
    fn string_table_round_trip() {
        let mut write = SerializationContext::new(CURRENT_VERSION);
        write.map_string("one").unwrap();
        write.map_string("two").unwrap();
        write.map_string("").unwrap();
        let mut packed = Vec::new();
        write.write_string_table(&mut packed);

        let mut read = SerializationContext::new(CURRENT_VERSION);
        read.init_string_table(packed).unwrap();
        assert_eq!(read.string_count(), 3);
        assert_eq!(read.unmap_string(0).unwrap(), "one");
        assert_eq!(read.unmap_string(1).unwrap(), "two");
        assert_eq!(read.unmap_string(2).unwrap(), "");
        assert_eq!(
            read.unmap_string(3),
            Err(ContextError::StringIndexOutOfRange { index: 3 })
        );
    }

    #[test]
    fn string_table_requires_terminator() {
        let mut ctx = SerializationContext::new(CURRENT_VERSION);
        assert_eq!(
            ctx.init_string_table(b"oops".to_vec()),
            Err(ContextError::UnterminatedStringTable)
        );
        assert_eq!(ctx.string_count(), 0);
    }

    #[test]
    fn string_table_rejects_invalid_utf8() {
        let mut ctx = SerializationContext::new(CURRENT_VERSION);
        assert_eq!(
            ctx.init_string_table(vec![0xff, 0xfe, 0x00]),
            Err(ContextError::InvalidUtf8)
        );
    }

    #[test]
    fn embedded_nul_is_rejected() {
        let mut ctx = SerializationContext::new(CURRENT_VERSION);
        assert_eq!(ctx.map_string("a\0b"), Err(ContextError::EmbeddedNul));
    }

    #[test]
    fn path_tracking_is_bounded() {
        let mut ctx = SerializationContext::new(CURRENT_VERSION);
        for _ in 0..crate::reflect::path::MAX_PATH_DEPTH {
            ctx.push_path_name("deep").unwrap();
        }
        assert_eq!(ctx.push_path_name("one more"), Err(ContextError::PathTooDeep));
        ctx.pop_path();
        assert!(ctx.push_path_index(0).is_ok());
    }
}
