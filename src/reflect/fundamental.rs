//! Reflection impls for `bool`, the integer and float widths, and `String`.

use std::borrow::Cow;

use crate::config::{Config, ConfigValue};
use crate::reflect::context::SerializationContext;
use crate::reflect::error::{DeserializeError, SerializeError};
use crate::reflect::kind::TypeKind;
use crate::reflect::reflected::{Reflected, Typed};
use crate::reflect::stream::{ByteReader, write_uint};
use crate::reflect::type_desc::TypeInfo;

fn fundamental_info<T: Reflected + Default>(name: &'static str) -> TypeInfo {
    TypeInfo {
        name: Cow::Borrowed(name),
        kind: TypeKind::Fundamental,
        size: size_of::<T>(),
        alignment: align_of::<T>(),
        construct: Some(|| Box::new(T::default()) as Box<dyn Reflected>),
        can_be_memcopied: true,
        class: None,
    }
}

macro_rules! impl_common_eq_clone {
    ($t:ty) => {
        fn reflect_eq(&self, other: &dyn Reflected) -> bool {
            other.as_any().downcast_ref::<$t>().is_some_and(|o| self == o)
        }

        fn clone_from_reflected(&mut self, source: &dyn Reflected) -> bool {
            match source.as_any().downcast_ref::<$t>() {
                Some(v) => {
                    self.clone_from(v);
                    true
                }
                None => false,
            }
        }
    };
}

// -----------------------------------------------------------------------------
// bool

impl Typed for bool {
    fn type_info() -> TypeInfo {
        fundamental_info::<bool>("bool")
    }
}

impl Reflected for bool {
    crate::__reflected_common!();

    fn serialize(&self, _config: &mut Config) -> Result<ConfigValue, SerializeError> {
        Ok(ConfigValue::Bool(*self))
    }

    fn deserialize(
        &mut self,
        _config: &Config,
        value: &ConfigValue,
    ) -> Result<(), DeserializeError> {
        match value {
            ConfigValue::Bool(v) => {
                *self = *v;
                Ok(())
            }
            other => Err(DeserializeError::ValueTypeMismatch {
                expected: "bool",
                found: other.kind_name(),
            }),
        }
    }

    fn serialize_binary(
        &self,
        out: &mut Vec<u8>,
        _context: &mut SerializationContext,
    ) -> Result<(), SerializeError> {
        out.push(u8::from(*self));
        Ok(())
    }

    fn deserialize_binary(
        &mut self,
        reader: &mut ByteReader<'_>,
        _context: &mut SerializationContext,
    ) -> Result<(), DeserializeError> {
        *self = match reader.read_u8()? {
            0 => false,
            1 => true,
            _ => {
                return Err(DeserializeError::Corrupted {
                    reason: "invalid bool byte",
                });
            }
        };
        Ok(())
    }

    impl_common_eq_clone!(bool);
}

// -----------------------------------------------------------------------------
// Integers

macro_rules! impl_reflected_int {
    ($t:ty, $name:literal) => {
        impl Typed for $t {
            fn type_info() -> TypeInfo {
                fundamental_info::<$t>($name)
            }
        }

        impl Reflected for $t {
            crate::__reflected_common!();

            fn serialize(&self, _config: &mut Config) -> Result<ConfigValue, SerializeError> {
                Ok(ConfigValue::Int(*self as i64))
            }

            fn deserialize(
                &mut self,
                _config: &Config,
                value: &ConfigValue,
            ) -> Result<(), DeserializeError> {
                match value {
                    ConfigValue::Int(v) => {
                        *self = <$t>::try_from(*v).map_err(|_| {
                            DeserializeError::IntOutOfRange {
                                value: *v,
                                target: $name,
                            }
                        })?;
                        Ok(())
                    }
                    other => Err(DeserializeError::ValueTypeMismatch {
                        expected: "int",
                        found: other.kind_name(),
                    }),
                }
            }

            fn serialize_binary(
                &self,
                out: &mut Vec<u8>,
                _context: &mut SerializationContext,
            ) -> Result<(), SerializeError> {
                out.extend_from_slice(&self.to_le_bytes());
                Ok(())
            }

            fn deserialize_binary(
                &mut self,
                reader: &mut ByteReader<'_>,
                _context: &mut SerializationContext,
            ) -> Result<(), DeserializeError> {
                *self = <$t>::from_le_bytes(reader.read_array()?);
                Ok(())
            }

            impl_common_eq_clone!($t);
        }
    };
}

impl_reflected_int!(i8, "i8");
impl_reflected_int!(i16, "i16");
impl_reflected_int!(i32, "i32");
impl_reflected_int!(i64, "i64");
impl_reflected_int!(u8, "u8");
impl_reflected_int!(u16, "u16");
impl_reflected_int!(u32, "u32");

// u64 keeps the i64 bit pattern through the config format instead of
// failing on values above `i64::MAX`.
impl Typed for u64 {
    fn type_info() -> TypeInfo {
        fundamental_info::<u64>("u64")
    }
}

impl Reflected for u64 {
    crate::__reflected_common!();

    fn serialize(&self, _config: &mut Config) -> Result<ConfigValue, SerializeError> {
        Ok(ConfigValue::Int(*self as i64))
    }

    fn deserialize(
        &mut self,
        _config: &Config,
        value: &ConfigValue,
    ) -> Result<(), DeserializeError> {
        match value {
            ConfigValue::Int(v) => {
                *self = *v as u64;
                Ok(())
            }
            other => Err(DeserializeError::ValueTypeMismatch {
                expected: "int",
                found: other.kind_name(),
            }),
        }
    }

    fn serialize_binary(
        &self,
        out: &mut Vec<u8>,
        _context: &mut SerializationContext,
    ) -> Result<(), SerializeError> {
        out.extend_from_slice(&self.to_le_bytes());
        Ok(())
    }

    fn deserialize_binary(
        &mut self,
        reader: &mut ByteReader<'_>,
        _context: &mut SerializationContext,
    ) -> Result<(), DeserializeError> {
        *self = u64::from_le_bytes(reader.read_array()?);
        Ok(())
    }

    impl_common_eq_clone!(u64);
}

// -----------------------------------------------------------------------------
// Floats

macro_rules! impl_reflected_float {
    ($t:ty, $name:literal) => {
        impl Typed for $t {
            fn type_info() -> TypeInfo {
                fundamental_info::<$t>($name)
            }
        }

        impl Reflected for $t {
            crate::__reflected_common!();

            fn serialize(&self, _config: &mut Config) -> Result<ConfigValue, SerializeError> {
                Ok(ConfigValue::Float(f64::from(*self)))
            }

            // Accepts ints too: a whole float prints without a fraction and
            // re-parses as an int.
            fn deserialize(
                &mut self,
                _config: &Config,
                value: &ConfigValue,
            ) -> Result<(), DeserializeError> {
                match value {
                    ConfigValue::Float(v) => {
                        *self = *v as $t;
                        Ok(())
                    }
                    ConfigValue::Int(v) => {
                        *self = *v as $t;
                        Ok(())
                    }
                    other => Err(DeserializeError::ValueTypeMismatch {
                        expected: "float",
                        found: other.kind_name(),
                    }),
                }
            }

            fn serialize_binary(
                &self,
                out: &mut Vec<u8>,
                _context: &mut SerializationContext,
            ) -> Result<(), SerializeError> {
                out.extend_from_slice(&self.to_le_bytes());
                Ok(())
            }

            fn deserialize_binary(
                &mut self,
                reader: &mut ByteReader<'_>,
                _context: &mut SerializationContext,
            ) -> Result<(), DeserializeError> {
                *self = <$t>::from_le_bytes(reader.read_array()?);
                Ok(())
            }

            impl_common_eq_clone!($t);
        }
    };
}

impl_reflected_float!(f32, "f32");
impl_reflected_float!(f64, "f64");

// -----------------------------------------------------------------------------
// String

impl Typed for String {
    fn type_info() -> TypeInfo {
        TypeInfo {
            name: Cow::Borrowed("String"),
            kind: TypeKind::String,
            size: size_of::<String>(),
            alignment: align_of::<String>(),
            construct: Some(|| Box::new(String::new()) as Box<dyn Reflected>),
            can_be_memcopied: false,
            class: None,
        }
    }
}

impl Reflected for String {
    crate::__reflected_common!();

    fn serialize(&self, _config: &mut Config) -> Result<ConfigValue, SerializeError> {
        Ok(ConfigValue::from(self.as_str()))
    }

    fn deserialize(
        &mut self,
        _config: &Config,
        value: &ConfigValue,
    ) -> Result<(), DeserializeError> {
        match value {
            ConfigValue::String(v) => {
                self.clear();
                self.push_str(v);
                Ok(())
            }
            other => Err(DeserializeError::ValueTypeMismatch {
                expected: "string",
                found: other.kind_name(),
            }),
        }
    }

    fn map_refs(&self, context: &mut SerializationContext) -> Result<(), SerializeError> {
        context.map_string(self)?;
        Ok(())
    }

    // Binary strings are an index into the shared string table.
    fn serialize_binary(
        &self,
        out: &mut Vec<u8>,
        context: &mut SerializationContext,
    ) -> Result<(), SerializeError> {
        let index = context.map_string(self)?;
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
            reason: "string index overflows u32",
        })?;
        let value = context.unmap_string(index)?;
        self.clear();
        self.push_str(value);
        Ok(())
    }

    impl_common_eq_clone!(String);
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
    fn fundamental_types_register() {
        let ty = TypeRegistry::of::<i32>();
        assert_eq!(ty.name(), "i32");
        assert_eq!(ty.kind(), TypeKind::Fundamental);
        assert_eq!(ty.size(), 4);
        assert!(ty.can_be_memcopied());
        assert!(ty.is_constructible());
        // Interning: same reference every time.
        assert!(core::ptr::eq(ty, TypeRegistry::of::<i32>()));
    }

    #[test]
    fn int_config_round_trip() {
        let mut config = Config::new();
        let value = 1234_i32.serialize(&mut config).unwrap();
        assert_eq!(value, ConfigValue::Int(1234));
        let mut out = 0_i32;
        out.deserialize(&config, &value).unwrap();
        assert_eq!(out, 1234);
    }

    #[test]
    fn int_range_is_checked() {
        let config = Config::new();
        let mut out = 0_u8;
        let err = out.deserialize(&config, &ConfigValue::Int(300)).unwrap_err();
        assert!(matches!(
            err,
            DeserializeError::IntOutOfRange { value: 300, target: "u8" }
        ));
        let err = out.deserialize(&config, &ConfigValue::Int(-1)).unwrap_err();
        assert!(matches!(err, DeserializeError::IntOutOfRange { .. }));
    }

    #[test]
    fn float_accepts_int_values() {
        let config = Config::new();
        let mut out = 0.0_f32;
        out.deserialize(&config, &ConfigValue::Int(3)).unwrap();
        assert_eq!(out, 3.0);
        out.deserialize(&config, &ConfigValue::Float(0.5)).unwrap();
        assert_eq!(out, 0.5);
    }

    #[test]
    fn type_mismatch_is_reported() {
        let config = Config::new();
        let mut out = false;
        let err = out
            .deserialize(&config, &ConfigValue::Int(1))
            .unwrap_err();
        assert!(matches!(
            err,
            DeserializeError::ValueTypeMismatch { expected: "bool", found: "int" }
        ));
    }

    #[test]
    fn u64_round_trips_past_i64_range() {
        let mut config = Config::new();
        let big = u64::MAX - 5;
        let value = big.serialize(&mut config).unwrap();
        let mut out = 0_u64;
        out.deserialize(&config, &value).unwrap();
        assert_eq!(out, big);
    }

    #[test]
    fn scalar_binary_round_trip() {
        let mut ctx = SerializationContext::new(CURRENT_VERSION);
        ctx.init_stage(Stage::Serialization);

        let mut out = Vec::new();
        true.serialize_binary(&mut out, &mut ctx).unwrap();
        (-7_i32).serialize_binary(&mut out, &mut ctx).unwrap();
        2.5_f64.serialize_binary(&mut out, &mut ctx).unwrap();

        let mut reader = ByteReader::new(&out);
        let mut b = false;
        let mut i = 0_i32;
        let mut f = 0.0_f64;
        b.deserialize_binary(&mut reader, &mut ctx).unwrap();
        i.deserialize_binary(&mut reader, &mut ctx).unwrap();
        f.deserialize_binary(&mut reader, &mut ctx).unwrap();
        assert!(reader.is_empty());
        assert_eq!((b, i, f), (true, -7, 2.5));
    }

    #[test]
    fn string_binary_goes_through_the_table() {
        let mut ctx = SerializationContext::new(CURRENT_VERSION);
        let text = String::from("interned");
        text.map_refs(&mut ctx).unwrap();
        ctx.init_stage(Stage::Serialization);

        let mut out = Vec::new();
        text.serialize_binary(&mut out, &mut ctx).unwrap();
        // Single small table index.
        assert_eq!(out.len(), 1);

        let mut reader = ByteReader::new(&out);
        let mut decoded = String::new();
        decoded.deserialize_binary(&mut reader, &mut ctx).unwrap();
        assert_eq!(decoded, "interned");
    }

    #[test]
    fn unmapped_string_fails_to_serialize() {
        let mut ctx = SerializationContext::new(CURRENT_VERSION);
        ctx.init_stage(Stage::Serialization);
        let mut out = Vec::new();
        let err = String::from("never mapped")
            .serialize_binary(&mut out, &mut ctx)
            .unwrap_err();
        assert!(matches!(err, SerializeError::Context(_)));
    }

    #[test]
    fn reflect_eq_rejects_other_types() {
        assert!(1_i32.reflect_eq(&1_i32));
        assert!(!1_i32.reflect_eq(&1_i64));
        assert!(!1_i32.reflect_eq(&2_i32));
    }

    #[test]
    fn clone_from_reflected_copies() {
        let mut target = String::from("old");
        assert!(target.clone_from_reflected(&String::from("new")));
        assert_eq!(target, "new");
        assert!(!target.clone_from_reflected(&42_i32));
    }
}
