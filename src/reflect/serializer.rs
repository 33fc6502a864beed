//! Top-level binary format.
//!
//! Layout, in order:
//!
//! 1. magic (`u32`, little endian)
//! 2. format version (varint)
//! 3. string table: byte size (varint), then every string NUL-terminated
//! 4. object table: entry count (varint), then per entry a type-name
//!    string index (varint) and the object payload
//! 5. root list: count (varint), then object table indices (varints)
//!
//! The object table is written in mapping order, which puts every object
//! before the objects that reference it. Decoding is therefore a single
//! forward pass: by the time an entry's payload mentions object index `i`,
//! entry `i` is already decoded.

use std::sync::Arc;

use crate::reflect::context::{SerializationContext, Stage};
use crate::reflect::error::{DeserializeError, SerializeError};
use crate::reflect::reflected::Reflected;
use crate::reflect::registry::TypeRegistry;
use crate::reflect::stream::{ByteReader, write_uint};

const MAGIC: u32 = u32::from_le_bytes(*b"vcRT");

/// Version written by this build. Readers accept only versions up to this.
pub const CURRENT_VERSION: u32 = 1;

/// Result of [`deserialize`]: the decoded roots plus the context, which
/// keeps the object table and any recorded member type mismatches
/// inspectable.
pub struct Deserialized {
    pub roots: Vec<Arc<dyn Reflected>>,
    pub context: SerializationContext,
}

// -----------------------------------------------------------------------------
// Serialize

/// Serializes an object graph. Shared pointers reachable from several
/// roots (or several times from one) are written once and referenced by
/// index.
///
/// # Panics
///
/// Panics when `roots` is empty.
pub fn serialize(roots: &[Arc<dyn Reflected>], out: &mut Vec<u8>) -> Result<(), SerializeError> {
    assert!(!roots.is_empty(), "nothing to serialize");

    let mut context = SerializationContext::new(CURRENT_VERSION);

    // Mapping pass: walk the graph, intern strings and objects.
    let mut root_indices = Vec::with_capacity(roots.len());
    for root in roots {
        let ty = root.type_desc();
        ty.map_refs(root.as_ref(), &mut context)?;
        context.map_string(ty.name())?;
        root_indices.push(context.map_object(root)?);
    }
    context.optimize_string_table();

    out.extend_from_slice(&MAGIC.to_le_bytes());
    write_uint(out, u64::from(CURRENT_VERSION));

    let mut table = Vec::new();
    context.write_string_table(&mut table);
    write_uint(out, table.len() as u64);
    out.extend_from_slice(&table);

    // Emission pass.
    context.init_stage(Stage::Serialization);
    let object_count = context.object_count();
    write_uint(out, u64::from(object_count));
    for index in 0..object_count {
        let object = context
            .unmap_object(index)
            .map_err(SerializeError::Context)?;
        let ty = object.type_desc();
        let name_index = context.map_string(ty.name())?;
        write_uint(out, u64::from(name_index));
        ty.serialize_binary(object.as_ref(), out, &mut context)?;
    }

    write_uint(out, root_indices.len() as u64);
    for index in root_indices {
        write_uint(out, u64::from(index));
    }
    Ok(())
}

/// Serializes a single root. See [`serialize`].
pub fn serialize_object(
    root: &Arc<dyn Reflected>,
    out: &mut Vec<u8>,
) -> Result<(), SerializeError> {
    serialize(core::slice::from_ref(root), out)
}

// -----------------------------------------------------------------------------
// Deserialize

/// Decodes an object graph produced by [`serialize`].
///
/// Every type named in the object table must be registered and
/// constructible. Unknown members and mismatched member types inside the
/// payloads are tolerated; see the context's mismatch records.
pub fn deserialize(data: &[u8]) -> Result<Deserialized, DeserializeError> {
    let mut reader = ByteReader::new(data);

    let magic = u32::from_le_bytes(reader.read_array()?);
    if magic != MAGIC {
        return Err(DeserializeError::BadMagic);
    }
    let version = reader.read_uint()?;
    let version = u32::try_from(version).map_err(|_| DeserializeError::Corrupted {
        reason: "version overflows u32",
    })?;
    if version > CURRENT_VERSION {
        return Err(DeserializeError::UnsupportedVersion { version });
    }

    let mut context = SerializationContext::new(version);
    let table_size = reader.read_len()?;
    context.init_string_table(reader.take(table_size)?.to_vec())?;
    context.init_stage(Stage::Deserialization);

    let object_count = reader.read_len()?;
    for _ in 0..object_count {
        let name_index = reader.read_uint()?;
        let name_index = u32::try_from(name_index).map_err(|_| DeserializeError::Corrupted {
            reason: "string index overflows u32",
        })?;
        let name = context.unmap_string(name_index)?.to_owned();
        let ty = TypeRegistry::find_by_name(&name)
            .ok_or_else(|| DeserializeError::UnknownType { name: name.clone() })?;
        let mut object = ty
            .try_create_object()
            .ok_or_else(|| DeserializeError::NotConstructible { name: name.clone() })?;
        ty.deserialize_binary(object.as_mut(), &mut reader, &mut context)?;
        context.push_object(Arc::from(object));
    }

    let root_count = reader.read_len()?;
    let mut roots = Vec::with_capacity(root_count);
    for _ in 0..root_count {
        let index = reader.read_uint()?;
        let index = u32::try_from(index).map_err(|_| DeserializeError::Corrupted {
            reason: "object index overflows u32",
        })?;
        roots.push(context.unmap_object(index)?);
    }

    Ok(Deserialized { roots, context })
}

/// Decodes and returns only the roots. See [`deserialize`].
pub fn deserialize_objects(data: &[u8]) -> Result<Vec<Arc<dyn Reflected>>, DeserializeError> {
    Ok(deserialize(data)?.roots)
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::impl_class;
    use crate::reflect::context::MismatchedValue;
    use crate::reflect::path::MemberPath;

    #[derive(Default, Debug)]
    struct MaterialDesc {
        label: String,
        shininess: f32,
    }
    impl_class!(MaterialDesc { members: [label, shininess] });

    #[derive(Default)]
    struct MeshEntity {
        material: Arc<MaterialDesc>,
        detail: Arc<MaterialDesc>,
        id: u32,
    }
    impl_class!(MeshEntity { members: [material, detail, id] });

    #[derive(Default)]
    struct WideProfile {
        threads: i32,
        verbose: bool,
        legacy: i32,
    }
    impl_class!(WideProfile { members: [threads, verbose, legacy] });

    #[derive(Default)]
    struct SlimProfile {
        threads: i32,
        verbose: bool,
    }
    impl_class!(SlimProfile { members: [threads, verbose] });

    #[derive(Default)]
    struct OldTuning {
        gain: i32,
    }
    impl_class!(OldTuning { members: [gain] });

    #[derive(Default)]
    struct NewTuning {
        gain: f32,
    }
    impl_class!(NewTuning { members: [gain] });

    fn round_trip(root: Arc<dyn Reflected>) -> Deserialized {
        let mut data = Vec::new();
        serialize_object(&root, &mut data).unwrap();
        deserialize(&data).unwrap()
    }

    #[test]
    fn shared_pointers_stay_shared() {
        let material = Arc::new(MaterialDesc {
            label: String::from("steel"),
            shininess: 0.8,
        });
        let mesh = MeshEntity {
            material: Arc::clone(&material),
            detail: Arc::clone(&material),
            id: 42,
        };

        let decoded = round_trip(Arc::new(mesh));
        // One entry for the material, one for the root.
        assert_eq!(decoded.context.object_count(), 2);

        let mesh = decoded.roots[0]
            .clone()
            .as_any_arc()
            .downcast::<MeshEntity>()
            .ok()
            .unwrap();
        assert_eq!(mesh.id, 42);
        assert_eq!(mesh.material.label, "steel");
        assert!(Arc::ptr_eq(&mesh.material, &mesh.detail));
    }

    #[test]
    fn repeated_roots_decode_to_one_object() {
        let profile: Arc<dyn Reflected> = Arc::new(WideProfile {
            threads: 4,
            verbose: true,
            legacy: 0,
        });
        let mut data = Vec::new();
        serialize(&[Arc::clone(&profile), profile], &mut data).unwrap();

        let decoded = deserialize(&data).unwrap();
        assert_eq!(decoded.roots.len(), 2);
        assert_eq!(decoded.context.object_count(), 1);
        assert!(Arc::ptr_eq(&decoded.roots[0], &decoded.roots[1]));
    }

    #[test]
    fn unknown_stored_members_are_skipped() {
        let wide = WideProfile {
            threads: 8,
            verbose: true,
            legacy: 99,
        };

        let mut ctx = SerializationContext::new(CURRENT_VERSION);
        wide.map_refs(&mut ctx).unwrap();
        let mut table = Vec::new();
        ctx.write_string_table(&mut table);
        ctx.init_stage(Stage::Serialization);
        let mut payload = Vec::new();
        wide.serialize_binary(&mut payload, &mut ctx).unwrap();

        let mut decode_ctx = SerializationContext::new(CURRENT_VERSION);
        decode_ctx.init_string_table(table).unwrap();
        decode_ctx.init_stage(Stage::Deserialization);
        let mut slim = SlimProfile::default();
        slim.deserialize_binary(&mut ByteReader::new(&payload), &mut decode_ctx)
            .unwrap();

        assert_eq!(slim.threads, 8);
        assert!(slim.verbose);
        assert!(decode_ctx.member_type_mismatches().is_empty());
    }

    #[test]
    fn changed_member_type_is_recorded_not_applied() {
        let old = OldTuning { gain: 5 };

        let mut ctx = SerializationContext::new(CURRENT_VERSION);
        old.map_refs(&mut ctx).unwrap();
        let mut table = Vec::new();
        ctx.write_string_table(&mut table);
        ctx.init_stage(Stage::Serialization);
        let mut payload = Vec::new();
        old.serialize_binary(&mut payload, &mut ctx).unwrap();

        let mut decode_ctx = SerializationContext::new(CURRENT_VERSION);
        decode_ctx.init_string_table(table).unwrap();
        decode_ctx.init_stage(Stage::Deserialization);
        let mut new = NewTuning { gain: 1.5 };
        new.deserialize_binary(&mut ByteReader::new(&payload), &mut decode_ctx)
            .unwrap();

        // The member keeps its previous value.
        assert_eq!(new.gain, 1.5);

        let records = decode_ctx.member_type_mismatches();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].path, MemberPath::from_name("gain"));
        assert_eq!(records[0].stored_type, "i32");
        let MismatchedValue::Decoded(value) = &records[0].value else {
            panic!("stored type is registered, expected a decoded value");
        };
        assert_eq!(value.as_any().downcast_ref::<i32>(), Some(&5));
    }

    #[test]
    fn rejects_foreign_and_truncated_data() {
        assert!(matches!(
            deserialize(b"RIFF1234"),
            Err(DeserializeError::BadMagic)
        ));
        assert!(matches!(
            deserialize(&MAGIC.to_le_bytes()[..2]),
            Err(DeserializeError::UnexpectedEnd)
        ));

        let mut future = MAGIC.to_le_bytes().to_vec();
        write_uint(&mut future, u64::from(CURRENT_VERSION) + 1);
        assert!(matches!(
            deserialize(&future),
            Err(DeserializeError::UnsupportedVersion { version }) if version == CURRENT_VERSION + 1
        ));

        let material: Arc<dyn Reflected> = Arc::new(MaterialDesc::default());
        let mut data = Vec::new();
        serialize_object(&material, &mut data).unwrap();
        data.truncate(data.len() - 1);
        assert!(deserialize(&data).is_err());
    }

    #[test]
    #[should_panic(expected = "pushed while deserializing")]
    fn push_object_requires_decoding_stage() {
        let mut ctx = SerializationContext::new(CURRENT_VERSION);
        ctx.push_object(Arc::new(MaterialDesc::default()));
    }
}
