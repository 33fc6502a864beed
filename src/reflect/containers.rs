//! Reflection impls for arrays and pointer-like containers.
//!
//! `Vec<T>` is a dynamic array, `[T; N]` a native array, `Option<Box<T>>` a
//! nullable owning pointer, `Arc<T>` a shared pointer. Shared pointers are
//! the only place the binary format deduplicates: they serialize as an
//! index into the context's object table.

use std::borrow::Cow;
use std::sync::Arc;

use crate::config::{Config, ConfigArray, ConfigValue};
use crate::reflect::context::SerializationContext;
use crate::reflect::error::{DeserializeError, SerializeError};
use crate::reflect::kind::TypeKind;
use crate::reflect::reflected::{Reflected, Typed};
use crate::reflect::stream::{ByteReader, write_uint};
use crate::reflect::type_desc::TypeInfo;

// -----------------------------------------------------------------------------
// Vec<T>

impl<T: Typed + Default> Typed for Vec<T> {
    fn type_info() -> TypeInfo {
        let element = T::static_type();
        TypeInfo {
            name: Cow::Owned(format!("DynArray<{}>", element.name())),
            kind: TypeKind::DynamicArray,
            size: size_of::<Vec<T>>(),
            alignment: align_of::<Vec<T>>(),
            construct: Some(|| Box::new(Vec::<T>::new()) as Box<dyn Reflected>),
            can_be_memcopied: false,
            class: None,
        }
    }
}

impl<T: Typed + Default> Reflected for Vec<T> {
    crate::__reflected_common!();

    fn serialize(&self, config: &mut Config) -> Result<ConfigValue, SerializeError> {
        let mut array = ConfigArray::new();
        for (index, element) in self.iter().enumerate() {
            let value = element
                .serialize(config)
                .map_err(|source| SerializeError::Element {
                    index,
                    source: Box::new(source),
                })?;
            config.add_array_value(&mut array, value);
        }
        Ok(ConfigValue::from(array))
    }

    fn deserialize(
        &mut self,
        config: &Config,
        value: &ConfigValue,
    ) -> Result<(), DeserializeError> {
        let Some(head) = value.as_array() else {
            return Err(DeserializeError::ValueTypeMismatch {
                expected: "array",
                found: value.kind_name(),
            });
        };
        let mut stored = Vec::new();
        config.iterate_array(head, |_, element| {
            stored.push(element.clone());
            true
        });

        self.clear();
        for (index, element_value) in stored.iter().enumerate() {
            let mut element = T::default();
            element
                .deserialize(config, element_value)
                .map_err(|source| DeserializeError::Element {
                    index,
                    source: Box::new(source),
                })?;
            self.push(element);
        }
        Ok(())
    }

    fn map_refs(&self, context: &mut SerializationContext) -> Result<(), SerializeError> {
        for element in self {
            element.map_refs(context)?;
        }
        Ok(())
    }

    fn serialize_binary(
        &self,
        out: &mut Vec<u8>,
        context: &mut SerializationContext,
    ) -> Result<(), SerializeError> {
        write_uint(out, self.len() as u64);
        for (index, element) in self.iter().enumerate() {
            element
                .serialize_binary(out, context)
                .map_err(|source| SerializeError::Element {
                    index,
                    source: Box::new(source),
                })?;
        }
        Ok(())
    }

    fn deserialize_binary(
        &mut self,
        reader: &mut ByteReader<'_>,
        context: &mut SerializationContext,
    ) -> Result<(), DeserializeError> {
        let count = reader.read_len()?;
        self.clear();
        for index in 0..count {
            let mut element = T::default();
            element
                .deserialize_binary(reader, context)
                .map_err(|source| DeserializeError::Element {
                    index,
                    source: Box::new(source),
                })?;
            self.push(element);
        }
        Ok(())
    }

    fn reflect_eq(&self, other: &dyn Reflected) -> bool {
        let Some(other) = other.as_any().downcast_ref::<Vec<T>>() else {
            return false;
        };
        self.len() == other.len()
            && self
                .iter()
                .zip(other.iter())
                .all(|(a, b)| a.reflect_eq(b))
    }

    fn clone_from_reflected(&mut self, source: &dyn Reflected) -> bool {
        let Some(source) = source.as_any().downcast_ref::<Vec<T>>() else {
            return false;
        };
        self.clear();
        self.resize_with(source.len(), T::default);
        let mut success = true;
        for (dest, src) in self.iter_mut().zip(source.iter()) {
            success &= dest.clone_from_reflected(src);
        }
        success
    }

    fn element(&self, index: usize) -> Option<&dyn Reflected> {
        self.get(index).map(|e| e as &dyn Reflected)
    }
}

// -----------------------------------------------------------------------------
// [T; N]

impl<T: Typed + Default, const N: usize> Typed for [T; N] {
    fn type_info() -> TypeInfo {
        let element = T::static_type();
        TypeInfo {
            name: Cow::Owned(format!("NativeArray<{},{N}>", element.name())),
            kind: TypeKind::NativeArray,
            size: size_of::<[T; N]>(),
            alignment: align_of::<[T; N]>(),
            construct: Some(|| {
                Box::new(core::array::from_fn::<T, N, _>(|_| T::default())) as Box<dyn Reflected>
            }),
            can_be_memcopied: false,
            class: None,
        }
    }
}

impl<T: Typed + Default, const N: usize> Reflected for [T; N] {
    crate::__reflected_common!();

    fn serialize(&self, config: &mut Config) -> Result<ConfigValue, SerializeError> {
        let mut array = ConfigArray::new();
        for (index, element) in self.iter().enumerate() {
            let value = element
                .serialize(config)
                .map_err(|source| SerializeError::Element {
                    index,
                    source: Box::new(source),
                })?;
            config.add_array_value(&mut array, value);
        }
        Ok(ConfigValue::from(array))
    }

    fn deserialize(
        &mut self,
        config: &Config,
        value: &ConfigValue,
    ) -> Result<(), DeserializeError> {
        let Some(head) = value.as_array() else {
            return Err(DeserializeError::ValueTypeMismatch {
                expected: "array",
                found: value.kind_name(),
            });
        };
        let mut stored = Vec::new();
        config.iterate_array(head, |_, element| {
            stored.push(element.clone());
            true
        });
        if stored.len() != N {
            return Err(DeserializeError::ArrayCountMismatch {
                expected: N,
                found: stored.len(),
            });
        }
        for (index, (slot, element_value)) in self.iter_mut().zip(stored.iter()).enumerate() {
            slot.deserialize(config, element_value)
                .map_err(|source| DeserializeError::Element {
                    index,
                    source: Box::new(source),
                })?;
        }
        Ok(())
    }

    fn map_refs(&self, context: &mut SerializationContext) -> Result<(), SerializeError> {
        for element in self {
            element.map_refs(context)?;
        }
        Ok(())
    }

    // Element count is part of the type, so the binary payload is just the
    // elements.
    fn serialize_binary(
        &self,
        out: &mut Vec<u8>,
        context: &mut SerializationContext,
    ) -> Result<(), SerializeError> {
        for (index, element) in self.iter().enumerate() {
            element
                .serialize_binary(out, context)
                .map_err(|source| SerializeError::Element {
                    index,
                    source: Box::new(source),
                })?;
        }
        Ok(())
    }

    fn deserialize_binary(
        &mut self,
        reader: &mut ByteReader<'_>,
        context: &mut SerializationContext,
    ) -> Result<(), DeserializeError> {
        for (index, slot) in self.iter_mut().enumerate() {
            slot.deserialize_binary(reader, context)
                .map_err(|source| DeserializeError::Element {
                    index,
                    source: Box::new(source),
                })?;
        }
        Ok(())
    }

    fn reflect_eq(&self, other: &dyn Reflected) -> bool {
        let Some(other) = other.as_any().downcast_ref::<[T; N]>() else {
            return false;
        };
        self.iter().zip(other.iter()).all(|(a, b)| a.reflect_eq(b))
    }

    fn clone_from_reflected(&mut self, source: &dyn Reflected) -> bool {
        let Some(source) = source.as_any().downcast_ref::<[T; N]>() else {
            return false;
        };
        let mut success = true;
        for (dest, src) in self.iter_mut().zip(source.iter()) {
            success &= dest.clone_from_reflected(src);
        }
        success
    }

    fn element(&self, index: usize) -> Option<&dyn Reflected> {
        self.get(index).map(|e| e as &dyn Reflected)
    }
}

// -----------------------------------------------------------------------------
// Option<Box<T>>, the owning nullable pointer

impl<T: Typed + Default> Typed for Option<Box<T>> {
    fn type_info() -> TypeInfo {
        let pointee = T::static_type();
        TypeInfo {
            name: Cow::Owned(format!("UniquePtr<{}>", pointee.name())),
            kind: TypeKind::UniquePointer,
            size: size_of::<Option<Box<T>>>(),
            alignment: align_of::<Option<Box<T>>>(),
            construct: Some(|| Box::new(None::<Box<T>>) as Box<dyn Reflected>),
            can_be_memcopied: false,
            class: None,
        }
    }
}

impl<T: Typed + Default> Reflected for Option<Box<T>> {
    crate::__reflected_common!();

    // An empty pointer serializes as the integer 0, a filled one as its
    // pointee.
    fn serialize(&self, config: &mut Config) -> Result<ConfigValue, SerializeError> {
        match self {
            None => Ok(ConfigValue::Int(0)),
            Some(inner) => (**inner).serialize(config),
        }
    }

    fn deserialize(
        &mut self,
        config: &Config,
        value: &ConfigValue,
    ) -> Result<(), DeserializeError> {
        match value {
            ConfigValue::Int(_) => {
                *self = None;
                Ok(())
            }
            ConfigValue::Object(_) => {
                let inner = self.get_or_insert_with(|| Box::new(T::default()));
                (**inner).deserialize(config, value)
            }
            other => Err(DeserializeError::ValueTypeMismatch {
                expected: "object or 0",
                found: other.kind_name(),
            }),
        }
    }

    fn map_refs(&self, context: &mut SerializationContext) -> Result<(), SerializeError> {
        if let Some(inner) = self {
            (**inner).map_refs(context)?;
        }
        Ok(())
    }

    fn serialize_binary(
        &self,
        out: &mut Vec<u8>,
        context: &mut SerializationContext,
    ) -> Result<(), SerializeError> {
        match self {
            None => {
                out.push(0);
                Ok(())
            }
            Some(inner) => {
                out.push(1);
                (**inner).serialize_binary(out, context)
            }
        }
    }

    fn deserialize_binary(
        &mut self,
        reader: &mut ByteReader<'_>,
        context: &mut SerializationContext,
    ) -> Result<(), DeserializeError> {
        match reader.read_u8()? {
            0 => {
                *self = None;
                Ok(())
            }
            1 => {
                let inner = self.get_or_insert_with(|| Box::new(T::default()));
                (**inner).deserialize_binary(reader, context)
            }
            _ => Err(DeserializeError::Corrupted {
                reason: "invalid pointer flag byte",
            }),
        }
    }

    fn reflect_eq(&self, other: &dyn Reflected) -> bool {
        let Some(other) = other.as_any().downcast_ref::<Option<Box<T>>>() else {
            return false;
        };
        match (self, other) {
            (None, None) => true,
            (Some(a), Some(b)) => (**a).reflect_eq(&**b),
            _ => false,
        }
    }

    fn clone_from_reflected(&mut self, source: &dyn Reflected) -> bool {
        let Some(source) = source.as_any().downcast_ref::<Option<Box<T>>>() else {
            return false;
        };
        match source {
            None => {
                *self = None;
                true
            }
            Some(src) => {
                let inner = self.get_or_insert_with(|| Box::new(T::default()));
                (**inner).clone_from_reflected(&**src)
            }
        }
    }

    fn is_null(&self) -> bool {
        self.is_none()
    }
}

// -----------------------------------------------------------------------------
// Arc<T>, the shared pointer

impl<T: Typed + Default> Typed for Arc<T> {
    fn type_info() -> TypeInfo {
        let pointee = T::static_type();
        TypeInfo {
            name: Cow::Owned(format!("SharedPtr<{}>", pointee.name())),
            kind: TypeKind::SharedPointer,
            size: size_of::<Arc<T>>(),
            alignment: align_of::<Arc<T>>(),
            construct: Some(|| Box::new(Arc::new(T::default())) as Box<dyn Reflected>),
            can_be_memcopied: false,
            class: None,
        }
    }
}

impl<T: Typed + Default> Reflected for Arc<T> {
    crate::__reflected_common!();

    // The config format inlines the pointee; sharing is only preserved by
    // the binary format.
    fn serialize(&self, config: &mut Config) -> Result<ConfigValue, SerializeError> {
        (**self).serialize(config)
    }

    fn deserialize(
        &mut self,
        config: &Config,
        value: &ConfigValue,
    ) -> Result<(), DeserializeError> {
        let mut fresh = T::default();
        fresh.deserialize(config, value)?;
        *self = Arc::new(fresh);
        Ok(())
    }

    fn map_refs(&self, context: &mut SerializationContext) -> Result<(), SerializeError> {
        let as_dyn: Arc<dyn Reflected> = self.clone();
        if !context.is_object_mapped(&as_dyn) {
            // Children first, so the object table decodes in one pass.
            (**self).map_refs(context)?;
            context.map_string((**self).type_desc().name())?;
        }
        context.map_object(&as_dyn)?;
        Ok(())
    }

    fn serialize_binary(
        &self,
        out: &mut Vec<u8>,
        context: &mut SerializationContext,
    ) -> Result<(), SerializeError> {
        let as_dyn: Arc<dyn Reflected> = self.clone();
        let index = context.map_object(&as_dyn)?;
        write_uint(out, u64::from(index));
        Ok(())
    }

    fn deserialize_binary(
        &mut self,
        reader: &mut ByteReader<'_>,
        context: &mut SerializationContext,
    ) -> Result<(), DeserializeError> {
        let index = reader.read_uint()?;
        let index = u32::try_from(index).map_err(|_| DeserializeError::Corrupted {
            reason: "object index overflows u32",
        })?;
        let object = context.unmap_object(index)?;
        let found = object.type_desc().name().to_owned();
        match object.as_any_arc().downcast::<T>() {
            Ok(arc) => {
                *self = arc;
                Ok(())
            }
            Err(_) => Err(DeserializeError::PointerTypeMismatch {
                expected: T::static_type().name().to_owned(),
                found,
            }),
        }
    }

    fn reflect_eq(&self, other: &dyn Reflected) -> bool {
        let Some(other) = other.as_any().downcast_ref::<Arc<T>>() else {
            return false;
        };
        Arc::ptr_eq(self, other) || (**self).reflect_eq(&**other)
    }

    fn clone_from_reflected(&mut self, source: &dyn Reflected) -> bool {
        let Some(source) = source.as_any().downcast_ref::<Arc<T>>() else {
            return false;
        };
        // Cloning a shared pointer shares ownership.
        *self = Arc::clone(source);
        true
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reflect::context::Stage;
    use crate::reflect::registry::TypeRegistry;
    use crate::reflect::serializer::CURRENT_VERSION;

    #[test]
    fn container_type_names() {
        assert_eq!(TypeRegistry::of::<Vec<i32>>().name(), "DynArray<i32>");
        assert_eq!(TypeRegistry::of::<[f32; 4]>().name(), "NativeArray<f32,4>");
        assert_eq!(
            TypeRegistry::of::<Option<Box<String>>>().name(),
            "UniquePtr<String>"
        );
        assert_eq!(TypeRegistry::of::<Arc<String>>().name(), "SharedPtr<String>");
        assert_eq!(
            TypeRegistry::of::<Vec<Vec<u8>>>().name(),
            "DynArray<DynArray<u8>>"
        );
    }

    #[test]
    fn vec_config_round_trip() {
        let mut config = Config::new();
        let source = vec![1_i32, 2, 3];
        let value = source.serialize(&mut config).unwrap();
        let mut out: Vec<i32> = vec![9, 9, 9, 9];
        out.deserialize(&config, &value).unwrap();
        assert_eq!(out, source);
    }

    #[test]
    fn native_array_checks_element_count() {
        let mut config = Config::new();
        let value = vec![1_i32, 2, 3].serialize(&mut config).unwrap();
        let mut out = [0_i32; 4];
        let err = out.deserialize(&config, &value).unwrap_err();
        assert!(matches!(
            err,
            DeserializeError::ArrayCountMismatch { expected: 4, found: 3 }
        ));
    }

    #[test]
    fn unique_ptr_null_round_trip() {
        let mut config = Config::new();
        let empty: Option<Box<String>> = None;
        let value = empty.serialize(&mut config).unwrap();
        assert_eq!(value, ConfigValue::Int(0));
        assert!(empty.is_null());

        let mut out: Option<Box<String>> = Some(Box::new(String::from("stale")));
        out.deserialize(&config, &value).unwrap();
        assert!(out.is_none());
    }

    #[test]
    fn vec_binary_round_trip() {
        let mut ctx = SerializationContext::new(CURRENT_VERSION);
        let source = vec![String::from("a"), String::from("b"), String::from("a")];
        source.map_refs(&mut ctx).unwrap();
        ctx.init_stage(Stage::Serialization);

        let mut out = Vec::new();
        source.serialize_binary(&mut out, &mut ctx).unwrap();

        let mut reader = ByteReader::new(&out);
        let mut decoded: Vec<String> = Vec::new();
        decoded.deserialize_binary(&mut reader, &mut ctx).unwrap();
        assert_eq!(decoded, source);
    }

    #[test]
    fn shared_ptr_maps_once_per_identity() {
        let shared = Arc::new(String::from("payload"));
        let holder = vec![Arc::clone(&shared), Arc::clone(&shared)];

        let mut ctx = SerializationContext::new(CURRENT_VERSION);
        holder.map_refs(&mut ctx).unwrap();
        assert_eq!(ctx.object_count(), 1);
        assert_eq!(ctx.object_occurrences(0), Some(2));

        let distinct = Arc::new(String::from("payload"));
        distinct.map_refs(&mut ctx).unwrap();
        // Equal contents, different identity: a second table entry.
        assert_eq!(ctx.object_count(), 2);
    }

    #[test]
    fn element_access_for_paths() {
        let values = vec![10_i32, 20];
        assert!(values.element(1).is_some());
        assert!(values.element(2).is_none());
        assert!(1_i32.element(0).is_none());
    }

    #[test]
    fn reflect_eq_deep() {
        let a = vec![vec![1_u8, 2], vec![3]];
        let b = vec![vec![1_u8, 2], vec![3]];
        let c = vec![vec![1_u8, 2], vec![4]];
        assert!(a.reflect_eq(&b));
        assert!(!a.reflect_eq(&c));
        assert!(!a.reflect_eq(&vec![1_u8, 2]));
    }

    #[test]
    fn clone_from_reflected_resizes() {
        let source = vec![String::from("x"), String::from("y")];
        let mut dest: Vec<String> = Vec::new();
        assert!(dest.clone_from_reflected(&source));
        assert_eq!(dest, source);
    }
}
