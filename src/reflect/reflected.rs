use core::any::Any;
use std::sync::Arc;

use crate::config::{Config, ConfigValue};
use crate::reflect::context::SerializationContext;
use crate::reflect::error::{DeserializeError, SerializeError};
use crate::reflect::registry::TypeRegistry;
use crate::reflect::stream::ByteReader;
use crate::reflect::type_desc::{Type, TypeInfo};

// -----------------------------------------------------------------------------
// Reflected

/// Object-safe surface of every reflectable value.
///
/// Implementations come from the built-in impls (fundamentals, `String`,
/// containers, pointers) and from the [`impl_class!`](crate::impl_class) and
/// [`impl_enum!`](crate::impl_enum) macros. Class impls delegate to the
/// algorithms on [`Type`], so calling through `dyn Reflected` and calling
/// through the type description behave identically.
pub trait Reflected: Any + Send + Sync {
    /// The registered description of this value's runtime type.
    fn type_desc(&self) -> &'static Type;

    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn as_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;

    /// Writes this value into a config tree.
    fn serialize(&self, config: &mut Config) -> Result<ConfigValue, SerializeError>;

    /// Reads this value back from a config tree.
    fn deserialize(
        &mut self,
        config: &Config,
        value: &ConfigValue,
    ) -> Result<(), DeserializeError>;

    /// Mapping pass of binary serialization: interns every string and
    /// shared object this value will need when emitted.
    fn map_refs(&self, context: &mut SerializationContext) -> Result<(), SerializeError> {
        let _ = context;
        Ok(())
    }

    /// Emits this value against a context that already ran the mapping
    /// pass.
    fn serialize_binary(
        &self,
        out: &mut Vec<u8>,
        context: &mut SerializationContext,
    ) -> Result<(), SerializeError>;

    /// Decodes this value in place.
    fn deserialize_binary(
        &mut self,
        reader: &mut ByteReader<'_>,
        context: &mut SerializationContext,
    ) -> Result<(), DeserializeError>;

    /// Deep equality. `false` when `other` has a different runtime type.
    fn reflect_eq(&self, other: &dyn Reflected) -> bool;

    /// Deep copy from `source` into `self`. Returns `false` (leaving an
    /// unspecified but valid value) when the types differ or any part
    /// fails; the whole object is still visited.
    fn clone_from_reflected(&mut self, source: &dyn Reflected) -> bool;

    /// Whether this value is an empty pointer. Non-pointer kinds are never
    /// null.
    fn is_null(&self) -> bool {
        false
    }

    /// Element access for array kinds, `None` otherwise.
    fn element(&self, index: usize) -> Option<&dyn Reflected> {
        let _ = index;
        None
    }
}

// -----------------------------------------------------------------------------
// Typed

/// Statically-known reflectable types.
///
/// Splitting this off [`Reflected`] keeps the latter object safe while
/// still letting generic code reach the type description without a value.
pub trait Typed: Reflected {
    /// Describes the type for registration. Called once per process by the
    /// registry; user code should go through [`static_type`](Self::static_type).
    fn type_info() -> TypeInfo
    where
        Self: Sized;

    /// The interned description, registering it on first use.
    fn static_type() -> &'static Type
    where
        Self: Sized,
    {
        TypeRegistry::of::<Self>()
    }
}

/// Resolves the registered type of a class member through an accessor,
/// without naming the member's type. Macro support.
pub fn member_type<C, F: Typed>(_accessor: impl FnOnce(&C) -> &F) -> &'static Type {
    F::static_type()
}
