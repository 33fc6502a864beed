use core::any::TypeId;
use std::sync::{LazyLock, PoisonError, RwLock};

use foldhash::fast::FixedState;
use hashbrown::HashMap;

use crate::reflect::reflected::Typed;
use crate::reflect::type_desc::{Type, TypeInfo};

// -----------------------------------------------------------------------------
// Auto registration

/// A deferred registration submitted by [`impl_class!`](crate::impl_class)
/// or [`impl_enum!`](crate::impl_enum).
///
/// Submissions are collected at link time and drained on the first by-name
/// query, so types can be found by name without anything having touched
/// them first.
pub struct TypeRegistration {
    getter: fn() -> &'static Type,
}

impl TypeRegistration {
    pub const fn new(getter: fn() -> &'static Type) -> Self {
        Self { getter }
    }
}

#[cfg(feature = "auto_register")]
inventory::collect!(TypeRegistration);

// -----------------------------------------------------------------------------
// TypeRegistry

struct Registry {
    by_id: HashMap<TypeId, &'static Type, FixedState>,
    by_name: HashMap<String, &'static Type, FixedState>,
}

static REGISTRY: LazyLock<RwLock<Registry>> = LazyLock::new(|| {
    RwLock::new(Registry {
        by_id: HashMap::default(),
        by_name: HashMap::default(),
    })
});

/// Process-wide registry of reflected types.
///
/// Registered types are leaked and live forever, so `&'static Type`
/// references double as identity. Duplicate type names are a registration
/// bug and panic.
pub struct TypeRegistry;

impl TypeRegistry {
    /// The interned type of `T`, registering it on first use.
    ///
    /// Registration resolves member and element types first, so the whole
    /// dependency closure of `T` ends up registered.
    pub fn of<T: Typed>() -> &'static Type {
        let id = TypeId::of::<T>();
        if let Some(ty) = Self::lookup(id) {
            return ty;
        }
        // Built outside the lock: describing T recurses into member types.
        let info = T::type_info();
        Self::register(id, info)
    }

    fn lookup(id: TypeId) -> Option<&'static Type> {
        REGISTRY
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .by_id
            .get(&id)
            .copied()
    }

    fn register(id: TypeId, info: TypeInfo) -> &'static Type {
        let ty = Type::initialize(info);

        let mut registry = REGISTRY.write().unwrap_or_else(PoisonError::into_inner);
        // Another thread may have won the race while we were building.
        if let Some(existing) = registry.by_id.get(&id) {
            return existing;
        }
        assert!(
            !registry.by_name.contains_key(ty.name()),
            "duplicate reflected type name `{}`",
            ty.name()
        );

        let ty: &'static Type = Box::leak(Box::new(ty));
        registry.by_id.insert(id, ty);
        registry.by_name.insert(ty.name().to_owned(), ty);
        drop(registry);

        log::debug!("registered type `{}`", ty.name());

        if let Some(class) = ty.as_class()
            && let Some(parent) = class.parent()
            && let Some(parent_class) = parent.ty().as_class()
        {
            parent_class.add_child(ty);
        }
        ty
    }

    /// Looks a type up by its registered name, draining pending
    /// auto-registrations first.
    pub fn find_by_name(name: &str) -> Option<&'static Type> {
        #[cfg(feature = "auto_register")]
        Self::drain_submissions();
        REGISTRY
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .by_name
            .get(name)
            .copied()
    }

    /// Every type registered so far, in no particular order.
    pub fn types() -> Vec<&'static Type> {
        #[cfg(feature = "auto_register")]
        Self::drain_submissions();
        REGISTRY
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .by_id
            .values()
            .copied()
            .collect()
    }

    #[cfg(feature = "auto_register")]
    fn drain_submissions() {
        use std::sync::Once;
        static ONCE: Once = Once::new();
        ONCE.call_once(|| {
            for registration in inventory::iter::<TypeRegistration> {
                (registration.getter)();
            }
        });
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use std::borrow::Cow;

    use super::*;
    use crate::config::{Config, ConfigValue};
    use crate::reflect::context::SerializationContext;
    use crate::reflect::error::{DeserializeError, SerializeError};
    use crate::reflect::kind::TypeKind;
    use crate::reflect::reflected::Reflected;
    use crate::reflect::stream::ByteReader;

    // Two Rust types that claim the same reflected name. Registered by hand
    // so no auto-registration entry exists for them.
    macro_rules! clashing_type {
        ($ty:ident) => {
            struct $ty;

            impl Reflected for $ty {
                crate::__reflected_common!();

                fn serialize(
                    &self,
                    _config: &mut Config,
                ) -> Result<ConfigValue, SerializeError> {
                    Ok(ConfigValue::None)
                }

                fn deserialize(
                    &mut self,
                    _config: &Config,
                    _value: &ConfigValue,
                ) -> Result<(), DeserializeError> {
                    Ok(())
                }

                fn serialize_binary(
                    &self,
                    _out: &mut Vec<u8>,
                    _context: &mut SerializationContext,
                ) -> Result<(), SerializeError> {
                    Ok(())
                }

                fn deserialize_binary(
                    &mut self,
                    _reader: &mut ByteReader<'_>,
                    _context: &mut SerializationContext,
                ) -> Result<(), DeserializeError> {
                    Ok(())
                }

                fn reflect_eq(&self, _other: &dyn Reflected) -> bool {
                    false
                }

                fn clone_from_reflected(&mut self, _source: &dyn Reflected) -> bool {
                    false
                }
            }

            impl Typed for $ty {
                fn type_info() -> TypeInfo {
                    TypeInfo {
                        name: Cow::Borrowed("NameClash"),
                        kind: TypeKind::Fundamental,
                        size: 1,
                        alignment: 1,
                        construct: None,
                        can_be_memcopied: true,
                        class: None,
                    }
                }
            }
        };
    }

    clashing_type!(ClashFirst);
    clashing_type!(ClashSecond);

    #[test]
    fn of_interns_one_description_per_type() {
        let a = TypeRegistry::of::<i16>();
        let b = TypeRegistry::of::<i16>();
        assert!(core::ptr::eq(a, b));
        assert!(TypeRegistry::types().iter().any(|t| core::ptr::eq(*t, a)));
    }

    #[test]
    fn find_by_name_sees_touched_types() {
        let ty = TypeRegistry::of::<bool>();
        let found = TypeRegistry::find_by_name("bool").unwrap();
        assert!(core::ptr::eq(ty, found));
        assert!(TypeRegistry::find_by_name("NoSuchType").is_none());
    }

    #[test]
    #[should_panic(expected = "duplicate reflected type name")]
    fn duplicate_names_are_rejected() {
        let _ = TypeRegistry::of::<ClashFirst>();
        let _ = TypeRegistry::of::<ClashSecond>();
    }
}
