//! Declarative registration macros.
//!
//! [`impl_class!`](crate::impl_class) wires a plain struct into the
//! reflection system; [`impl_enum!`](crate::impl_enum) does the same for a
//! field-less enum. Both also submit an auto-registration entry when the
//! `auto_register` feature is on, so the type is findable by name without
//! being touched first.

#[cfg(feature = "auto_register")]
#[doc(hidden)]
pub mod __private {
    pub use inventory;
}

/// Shared `Any` plumbing of every generated or built-in `Reflected` impl.
#[doc(hidden)]
#[macro_export]
macro_rules! __reflected_common {
    () => {
        fn type_desc(&self) -> &'static $crate::reflect::Type {
            <Self as $crate::reflect::Typed>::static_type()
        }

        fn as_any(&self) -> &dyn ::core::any::Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn ::core::any::Any {
            self
        }

        fn as_any_arc(
            self: ::std::sync::Arc<Self>,
        ) -> ::std::sync::Arc<dyn ::core::any::Any + Send + Sync> {
            self
        }
    };
}

#[cfg(feature = "auto_register")]
#[doc(hidden)]
#[macro_export]
macro_rules! __submit_type_registration {
    ($ty:ident) => {
        $crate::reflect::macros::__private::inventory::submit! {
            $crate::reflect::TypeRegistration::new(|| {
                <$ty as $crate::reflect::Typed>::static_type()
            })
        }
    };
}

#[cfg(not(feature = "auto_register"))]
#[doc(hidden)]
#[macro_export]
macro_rules! __submit_type_registration {
    ($ty:ident) => {};
}

/// Registers a struct as a reflected class.
///
/// Lists the serializable members by name; their types are picked up from
/// the struct definition and must themselves be reflected. The struct needs
/// `Default` (except for `kind: abstract`) and every listed member must be
/// reachable from the macro invocation.
///
/// An optional `kind:` selects `polymorphic` (serializes a type marker) or
/// `abstract` (non-constructible base). An optional `parent:` names the
/// base class and the field embedding it; inherited members then serialize
/// before this class's own. A member followed by `[non_null]` is flagged
/// [`MemberFlags::NON_NULL`](crate::reflect::MemberFlags::NON_NULL) and
/// checked against the default instance in debug builds.
///
/// # Examples
///
/// ```
/// use vc_rtti::impl_class;
///
/// #[derive(Default)]
/// struct Point {
///     x: f32,
///     y: f32,
/// }
/// impl_class!(Point { members: [x, y] });
///
/// #[derive(Default)]
/// struct Sprite {
///     point: Point,
///     layer: i32,
/// }
/// impl_class!(Sprite {
///     kind: polymorphic,
///     parent: Point via point,
///     members: [layer],
/// });
/// ```
#[macro_export]
macro_rules! impl_class {
    ($ty:ident { members: [ $($member:ident $([ $($flag:ident),+ $(,)? ])?),* $(,)? ] $(,)? }) => {
        $crate::impl_class!(@imp $ty, simple, (), [ $($member [ $($($flag),+)? ]),* ]);
    };
    ($ty:ident { kind: $kind:tt, members: [ $($member:ident $([ $($flag:ident),+ $(,)? ])?),* $(,)? ] $(,)? }) => {
        $crate::impl_class!(@imp $ty, $kind, (), [ $($member [ $($($flag),+)? ]),* ]);
    };
    ($ty:ident { parent: $parent:ident via $field:ident, members: [ $($member:ident $([ $($flag:ident),+ $(,)? ])?),* $(,)? ] $(,)? }) => {
        $crate::impl_class!(@imp $ty, simple, ($parent via $field), [ $($member [ $($($flag),+)? ]),* ]);
    };
    ($ty:ident { kind: $kind:tt, parent: $parent:ident via $field:ident, members: [ $($member:ident $([ $($flag:ident),+ $(,)? ])?),* $(,)? ] $(,)? }) => {
        $crate::impl_class!(@imp $ty, $kind, ($parent via $field), [ $($member [ $($($flag),+)? ]),* ]);
    };

    (@kind simple) => { $crate::reflect::TypeKind::SimpleClass };
    (@kind polymorphic) => { $crate::reflect::TypeKind::PolymorphicClass };
    (@kind abstract) => { $crate::reflect::TypeKind::AbstractClass };

    (@flag non_null) => { $crate::reflect::MemberFlags::NON_NULL };

    (@construct abstract, $ty:ident) => {
        ::core::option::Option::None
    };
    (@construct $kind:tt, $ty:ident) => {{
        fn construct() -> ::std::boxed::Box<dyn $crate::reflect::Reflected> {
            ::std::boxed::Box::new(<$ty as ::core::default::Default>::default())
        }
        ::core::option::Option::Some(
            construct as fn() -> ::std::boxed::Box<dyn $crate::reflect::Reflected>,
        )
    }};

    (@parent $ty:ident, ()) => {
        ::core::option::Option::None
    };
    (@parent $ty:ident, ($parent:ident via $field:ident)) => {{
        fn upcast(object: &dyn $crate::reflect::Reflected) -> &dyn $crate::reflect::Reflected {
            let ::core::option::Option::Some(object) =
                object.as_any().downcast_ref::<$ty>()
            else {
                ::core::panic!("parent accessor used with a different class");
            };
            &object.$field
        }
        fn upcast_mut(
            object: &mut dyn $crate::reflect::Reflected,
        ) -> &mut dyn $crate::reflect::Reflected {
            let ::core::option::Option::Some(object) =
                object.as_any_mut().downcast_mut::<$ty>()
            else {
                ::core::panic!("parent accessor used with a different class");
            };
            &mut object.$field
        }
        ::core::option::Option::Some($crate::reflect::ParentLink::new(
            <$parent as $crate::reflect::Typed>::static_type(),
            upcast,
            upcast_mut,
        ))
    }};

    (@member $ty:ident, $member:ident, [ $($flag:ident),* ]) => {{
        fn get(object: &dyn $crate::reflect::Reflected) -> &dyn $crate::reflect::Reflected {
            let ::core::option::Option::Some(object) =
                object.as_any().downcast_ref::<$ty>()
            else {
                ::core::panic!("member accessor used with a different class");
            };
            &object.$member
        }
        fn get_mut(
            object: &mut dyn $crate::reflect::Reflected,
        ) -> &mut dyn $crate::reflect::Reflected {
            let ::core::option::Option::Some(object) =
                object.as_any_mut().downcast_mut::<$ty>()
            else {
                ::core::panic!("member accessor used with a different class");
            };
            &mut object.$member
        }
        $crate::reflect::Member::new(
            ::core::stringify!($member),
            $crate::reflect::member_type(|object: &$ty| &object.$member),
            get,
            get_mut,
        )
        .with_flags(
            $crate::reflect::MemberFlags::empty()
                $( | $crate::impl_class!(@flag $flag) )*
        )
    }};

    (@imp $ty:ident, $kind:tt, ($($parent:tt)*), [ $($member:ident [ $($flag:ident),* ]),* ]) => {
        impl $crate::reflect::Typed for $ty {
            fn type_info() -> $crate::reflect::TypeInfo {
                $crate::reflect::TypeInfo {
                    name: ::std::borrow::Cow::Borrowed(::core::stringify!($ty)),
                    kind: $crate::impl_class!(@kind $kind),
                    size: ::core::mem::size_of::<$ty>(),
                    alignment: ::core::mem::align_of::<$ty>(),
                    construct: $crate::impl_class!(@construct $kind, $ty),
                    can_be_memcopied: false,
                    class: ::core::option::Option::Some($crate::reflect::ClassTypeInfo {
                        parent: $crate::impl_class!(@parent $ty, ($($parent)*)),
                        members: ::std::vec![
                            $( $crate::impl_class!(@member $ty, $member, [ $($flag),* ]) ),*
                        ],
                    }),
                }
            }
        }

        // Class behavior lives in the algorithms on `Type`; the trait impl
        // only dispatches.
        impl $crate::reflect::Reflected for $ty {
            $crate::__reflected_common!();

            fn serialize(
                &self,
                config: &mut $crate::config::Config,
            ) -> ::core::result::Result<
                $crate::config::ConfigValue,
                $crate::reflect::SerializeError,
            > {
                <Self as $crate::reflect::Typed>::static_type().serialize(self, config)
            }

            fn deserialize(
                &mut self,
                config: &$crate::config::Config,
                value: &$crate::config::ConfigValue,
            ) -> ::core::result::Result<(), $crate::reflect::DeserializeError> {
                <Self as $crate::reflect::Typed>::static_type().deserialize(self, config, value)
            }

            fn map_refs(
                &self,
                context: &mut $crate::reflect::SerializationContext,
            ) -> ::core::result::Result<(), $crate::reflect::SerializeError> {
                <Self as $crate::reflect::Typed>::static_type().map_refs(self, context)
            }

            fn serialize_binary(
                &self,
                out: &mut ::std::vec::Vec<u8>,
                context: &mut $crate::reflect::SerializationContext,
            ) -> ::core::result::Result<(), $crate::reflect::SerializeError> {
                <Self as $crate::reflect::Typed>::static_type()
                    .serialize_binary(self, out, context)
            }

            fn deserialize_binary(
                &mut self,
                reader: &mut $crate::reflect::ByteReader<'_>,
                context: &mut $crate::reflect::SerializationContext,
            ) -> ::core::result::Result<(), $crate::reflect::DeserializeError> {
                <Self as $crate::reflect::Typed>::static_type()
                    .deserialize_binary(self, reader, context)
            }

            fn reflect_eq(&self, other: &dyn $crate::reflect::Reflected) -> bool {
                let ty = <Self as $crate::reflect::Typed>::static_type();
                ::core::ptr::eq(ty, other.type_desc()) && ty.compare(self, other)
            }

            fn clone_from_reflected(
                &mut self,
                source: &dyn $crate::reflect::Reflected,
            ) -> bool {
                let ty = <Self as $crate::reflect::Typed>::static_type();
                ::core::ptr::eq(ty, source.type_desc()) && ty.clone_object(self, source)
            }
        }

        $crate::__submit_type_registration!($ty);
    };
}

/// Registers a field-less enum as a reflected enumeration.
///
/// Variants serialize by name in both formats (the binary format stores a
/// string table index). The enum needs `Default`, `Clone` and `PartialEq`.
///
/// # Examples
///
/// ```
/// use vc_rtti::impl_enum;
///
/// #[derive(Default, Clone, Copy, PartialEq, Debug)]
/// enum BlendMode {
///     #[default]
///     Opaque,
///     Additive,
///     Multiply,
/// }
/// impl_enum!(BlendMode { Opaque, Additive, Multiply });
/// ```
#[macro_export]
macro_rules! impl_enum {
    ($ty:ident { $($variant:ident),+ $(,)? }) => {
        const _: () = {
            fn variant_name(value: &$ty) -> &'static str {
                match value {
                    $( $ty::$variant => ::core::stringify!($variant), )+
                }
            }

            fn variant_from_name(name: &str) -> ::core::option::Option<$ty> {
                match name {
                    $( ::core::stringify!($variant) => {
                        ::core::option::Option::Some($ty::$variant)
                    } )+
                    _ => ::core::option::Option::None,
                }
            }

            impl $crate::reflect::Typed for $ty {
                fn type_info() -> $crate::reflect::TypeInfo {
                    $crate::reflect::TypeInfo {
                        name: ::std::borrow::Cow::Borrowed(::core::stringify!($ty)),
                        kind: $crate::reflect::TypeKind::Enumeration,
                        size: ::core::mem::size_of::<$ty>(),
                        alignment: ::core::mem::align_of::<$ty>(),
                        construct: {
                            fn construct() -> ::std::boxed::Box<dyn $crate::reflect::Reflected> {
                                ::std::boxed::Box::new(
                                    <$ty as ::core::default::Default>::default(),
                                )
                            }
                            ::core::option::Option::Some(
                                construct
                                    as fn() -> ::std::boxed::Box<dyn $crate::reflect::Reflected>,
                            )
                        },
                        can_be_memcopied: true,
                        class: ::core::option::Option::None,
                    }
                }
            }

            impl $crate::reflect::Reflected for $ty {
                $crate::__reflected_common!();

                fn serialize(
                    &self,
                    _config: &mut $crate::config::Config,
                ) -> ::core::result::Result<
                    $crate::config::ConfigValue,
                    $crate::reflect::SerializeError,
                > {
                    ::core::result::Result::Ok($crate::config::ConfigValue::from(
                        variant_name(self),
                    ))
                }

                fn deserialize(
                    &mut self,
                    _config: &$crate::config::Config,
                    value: &$crate::config::ConfigValue,
                ) -> ::core::result::Result<(), $crate::reflect::DeserializeError> {
                    let ::core::option::Option::Some(name) = value.as_str() else {
                        return ::core::result::Result::Err(
                            $crate::reflect::DeserializeError::ValueTypeMismatch {
                                expected: "string",
                                found: value.kind_name(),
                            },
                        );
                    };
                    match variant_from_name(name) {
                        ::core::option::Option::Some(variant) => {
                            *self = variant;
                            ::core::result::Result::Ok(())
                        }
                        ::core::option::Option::None => ::core::result::Result::Err(
                            $crate::reflect::DeserializeError::UnknownEnumVariant {
                                name: name.to_owned(),
                            },
                        ),
                    }
                }

                fn map_refs(
                    &self,
                    context: &mut $crate::reflect::SerializationContext,
                ) -> ::core::result::Result<(), $crate::reflect::SerializeError> {
                    context.map_string(variant_name(self))?;
                    ::core::result::Result::Ok(())
                }

                fn serialize_binary(
                    &self,
                    out: &mut ::std::vec::Vec<u8>,
                    context: &mut $crate::reflect::SerializationContext,
                ) -> ::core::result::Result<(), $crate::reflect::SerializeError> {
                    let index = context.map_string(variant_name(self))?;
                    $crate::reflect::write_uint(out, u64::from(index));
                    ::core::result::Result::Ok(())
                }

                fn deserialize_binary(
                    &mut self,
                    reader: &mut $crate::reflect::ByteReader<'_>,
                    context: &mut $crate::reflect::SerializationContext,
                ) -> ::core::result::Result<(), $crate::reflect::DeserializeError> {
                    let index = reader.read_uint()?;
                    let ::core::result::Result::Ok(index) = u32::try_from(index) else {
                        return ::core::result::Result::Err(
                            $crate::reflect::DeserializeError::Corrupted {
                                reason: "string index overflows u32",
                            },
                        );
                    };
                    let name = context.unmap_string(index)?;
                    match variant_from_name(name) {
                        ::core::option::Option::Some(variant) => {
                            *self = variant;
                            ::core::result::Result::Ok(())
                        }
                        ::core::option::Option::None => ::core::result::Result::Err(
                            $crate::reflect::DeserializeError::UnknownEnumVariant {
                                name: name.to_owned(),
                            },
                        ),
                    }
                }

                fn reflect_eq(&self, other: &dyn $crate::reflect::Reflected) -> bool {
                    other
                        .as_any()
                        .downcast_ref::<$ty>()
                        .is_some_and(|o| o == self)
                }

                fn clone_from_reflected(
                    &mut self,
                    source: &dyn $crate::reflect::Reflected,
                ) -> bool {
                    match source.as_any().downcast_ref::<$ty>() {
                        ::core::option::Option::Some(v) => {
                            *self = v.clone();
                            true
                        }
                        ::core::option::Option::None => false,
                    }
                }
            }
        };

        $crate::__submit_type_registration!($ty);
    };
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::config::{Config, ConfigFormat, ConfigValue};
    use crate::reflect::serializer::CURRENT_VERSION;
    use crate::reflect::{
        ByteReader, DeserializeError, MemberFlags, Reflected, SerializationContext, TypeKind,
        TypeRegistry, Typed,
    };
    use crate::reflect::context::Stage;
    use crate::{impl_class, impl_enum};

    #[derive(Default, Clone, Copy, PartialEq, Debug)]
    enum GearMode {
        #[default]
        Park,
        Drive,
        Reverse,
    }
    impl_enum!(GearMode { Park, Drive, Reverse });

    #[derive(Default)]
    struct GearboxSetup {
        mode: GearMode,
        ratio: f32,
    }
    impl_class!(GearboxSetup { members: [mode, ratio] });

    struct LinkedBuffer {
        data: Option<Box<i32>>,
    }

    // The non-null member check runs against this default.
    impl Default for LinkedBuffer {
        fn default() -> Self {
            Self {
                data: Some(Box::new(0)),
            }
        }
    }
    impl_class!(LinkedBuffer { members: [data [non_null]] });

    #[test]
    fn enum_serializes_by_variant_name() {
        let mut config = Config::new();
        let value = GearMode::Drive.serialize(&mut config).unwrap();
        assert_eq!(value, ConfigValue::String("Drive".into()));

        let mut decoded = GearMode::Park;
        decoded.deserialize(&config, &value).unwrap();
        assert_eq!(decoded, GearMode::Drive);
    }

    #[test]
    fn enum_rejects_unknown_variants() {
        let config = Config::new();
        let mut out = GearMode::Park;
        let err = out
            .deserialize(&config, &ConfigValue::String("Neutral".into()))
            .unwrap_err();
        assert!(matches!(
            err,
            DeserializeError::UnknownEnumVariant { name } if name == "Neutral"
        ));

        let err = out
            .deserialize(&config, &ConfigValue::Int(1))
            .unwrap_err();
        assert!(matches!(err, DeserializeError::ValueTypeMismatch { .. }));
    }

    #[test]
    fn enum_binary_round_trip() {
        let mut ctx = SerializationContext::new(CURRENT_VERSION);
        let mode = GearMode::Reverse;
        mode.map_refs(&mut ctx).unwrap();
        ctx.init_stage(Stage::Serialization);

        let mut out = Vec::new();
        mode.serialize_binary(&mut out, &mut ctx).unwrap();

        let mut decoded = GearMode::Park;
        decoded
            .deserialize_binary(&mut ByteReader::new(&out), &mut ctx)
            .unwrap();
        assert_eq!(decoded, mode);
    }

    #[test]
    fn class_with_enum_member_round_trips_through_text() {
        let setup = GearboxSetup {
            mode: GearMode::Reverse,
            ratio: 3.5,
        };
        let mut config = Config::new();
        let value = setup.serialize(&mut config).unwrap();
        assert!(config.set_root_value(&value));
        let text = config.to_string(ConfigFormat::Compact);
        assert_eq!(text, "mode=\"Reverse\" ratio=3.5");

        let parsed = Config::parse(&text).unwrap();
        let root = ConfigValue::Object(parsed.root());
        let mut decoded = GearboxSetup::default();
        decoded.deserialize(&parsed, &root).unwrap();
        assert_eq!(decoded.mode, GearMode::Reverse);
        assert_eq!(decoded.ratio, 3.5);
    }

    #[test]
    fn non_null_marker_sets_the_member_flag() {
        let ty = LinkedBuffer::static_type();
        let member = ty.find_member("data").unwrap();
        assert!(member.flags().contains(MemberFlags::NON_NULL));
        assert_eq!(
            ty.find_member("data").unwrap().ty().name(),
            "UniquePtr<i32>"
        );
    }

    #[test]
    #[cfg(feature = "auto_register")]
    fn macro_types_register_automatically() {
        let by_name = TypeRegistry::find_by_name("GearboxSetup").unwrap();
        assert!(core::ptr::eq(by_name, GearboxSetup::static_type()));
        assert_eq!(by_name.kind(), TypeKind::SimpleClass);

        let gear = TypeRegistry::find_by_name("GearMode").unwrap();
        assert_eq!(gear.kind(), TypeKind::Enumeration);
        assert!(gear.can_be_memcopied());
    }
}
