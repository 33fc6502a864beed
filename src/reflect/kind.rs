use core::fmt;

/// Category of a registered [`Type`](crate::reflect::Type).
///
/// Every registered type has exactly one kind, fixed at registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    /// `bool`, integers, floating point.
    Fundamental,
    /// A closed set of named variants.
    Enumeration,
    /// UTF-8 string.
    String,
    /// Fixed-size array, element count part of the type.
    NativeArray,
    /// Growable array.
    DynamicArray,
    /// Owning pointer with at most one owner, nullable.
    UniquePointer,
    /// Reference-counted pointer, nullable.
    SharedPointer,
    /// Class without a parent link and without polymorphic identity.
    SimpleClass,
    /// Class participating in an inheritance hierarchy, instantiable.
    PolymorphicClass,
    /// Class that cannot be instantiated, only serves as a base.
    AbstractClass,
}

impl TypeKind {
    /// Whether this kind carries class metadata (members, parent link).
    pub fn is_class(self) -> bool {
        matches!(
            self,
            TypeKind::SimpleClass | TypeKind::PolymorphicClass | TypeKind::AbstractClass
        )
    }
}

impl fmt::Display for TypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TypeKind::Fundamental => "fundamental",
            TypeKind::Enumeration => "enumeration",
            TypeKind::String => "string",
            TypeKind::NativeArray => "native array",
            TypeKind::DynamicArray => "dynamic array",
            TypeKind::UniquePointer => "unique pointer",
            TypeKind::SharedPointer => "shared pointer",
            TypeKind::SimpleClass => "simple class",
            TypeKind::PolymorphicClass => "polymorphic class",
            TypeKind::AbstractClass => "abstract class",
        };
        f.write_str(name)
    }
}
